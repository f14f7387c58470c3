use std::borrow::Cow;
use std::future::Future;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use reqwest::{Client, Method, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info};

use crate::error::ApiError;
use crate::models::{
    AttendanceRequest, CollectionEvent, DonationRequest, NewCollectionEvent, NewWorkshopEvent,
    User, UserEnvelope, WorkshopEvent,
};

const CLIENT_UA: &str = concat!("greenmates-colab/", env!("CARGO_PKG_VERSION"));

/// The GreenMates REST contract.
///
/// Commands and the event feed only ever talk to this trait, so a single
/// client can be built in `main` and handed down, and tests can swap in an
/// in-memory implementation.
pub trait GreenMatesApi: Send + Sync + 'static {
    fn get_user(&self, federated_id: &str) -> impl Future<Output = Result<User, ApiError>> + Send;

    fn create_user(&self, user: &User) -> impl Future<Output = Result<(), ApiError>> + Send;

    fn create_workshop(
        &self,
        workshop: &NewWorkshopEvent,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;

    fn create_collection(
        &self,
        collection: &NewCollectionEvent,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;

    fn list_workshops(
        &self,
        federated_id: &str,
    ) -> impl Future<Output = Result<Vec<WorkshopEvent>, ApiError>> + Send;

    fn list_collections(
        &self,
        federated_id: &str,
    ) -> impl Future<Output = Result<Vec<CollectionEvent>, ApiError>> + Send;

    fn add_donation(
        &self,
        collection_id: &str,
        donation: &DonationRequest,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;

    fn add_assistant(
        &self,
        workshop_id: &str,
        attendance: &AttendanceRequest,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;
}

pub struct HttpClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl HttpClient {
    pub fn new(base_url: &str, timeout: Duration, token: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.filter(|t| !t.trim().is_empty()),
        })
    }

    fn default_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(CLIENT_UA));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers
    }

    fn url(&self, endpoint: &str) -> Result<Url, ApiError> {
        let url = Url::parse(&format!("{}{}", self.base_url, endpoint)).map_err(|e| {
            ApiError::InvalidEndpoint {
                endpoint: endpoint.to_string(),
                reason: e.to_string(),
            }
        })?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(ApiError::InvalidEndpoint {
                endpoint: endpoint.to_string(),
                reason: format!("unsupported scheme {other:?}"),
            }),
        }
    }

    /// Issue one request and return the raw body of a 2xx response.
    async fn send<B: Serialize + ?Sized>(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<&B>,
    ) -> Result<String, ApiError> {
        let url = self.url(endpoint)?;
        let mutating = method != Method::GET;
        if mutating && self.token.is_none() {
            return Err(ApiError::MissingToken(endpoint.to_string()));
        }

        let mut request = self
            .client
            .request(method.clone(), url)
            .headers(self.default_headers());
        if let Some(ref token) = self.token {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        debug!("{} {}", method, endpoint);
        let resp = request
            .send()
            .await
            .map_err(|source| ApiError::NetworkFailure {
                endpoint: endpoint.to_string(),
                source,
            })?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|source| ApiError::NetworkFailure {
                endpoint: endpoint.to_string(),
                source,
            })?;
        debug!("Raw response from {} (status {}): {}", endpoint, status, text);

        if !status.is_success() {
            return Err(ApiError::UnexpectedStatus {
                endpoint: endpoint.to_string(),
                status,
                body: text,
            });
        }
        Ok(text)
    }

    async fn fetch<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T, ApiError> {
        let text = self.send::<()>(Method::GET, endpoint, None).await?;
        if text.trim().is_empty() {
            return Err(ApiError::EmptyBody(endpoint.to_string()));
        }
        serde_json::from_str(&text).map_err(|source| ApiError::DecodeFailure {
            endpoint: endpoint.to_string(),
            source,
        })
    }

    /// Writes answer with whatever the server likes; only the status matters.
    async fn execute<B: Serialize + ?Sized>(
        &self,
        method: Method,
        endpoint: &str,
        body: &B,
    ) -> Result<(), ApiError> {
        self.send(method, endpoint, Some(body)).await.map(|_| ())
    }
}

fn segment<'a>(what: &str, value: &'a str) -> Result<Cow<'a, str>, ApiError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ApiError::validation(format!("{what} must not be empty")));
    }
    Ok(urlencoding::encode(value))
}

impl GreenMatesApi for HttpClient {
    async fn get_user(&self, federated_id: &str) -> Result<User, ApiError> {
        let endpoint = format!("/api/collaborator/{}", segment("federated id", federated_id)?);
        let envelope: UserEnvelope = self.fetch(&endpoint).await?;
        Ok(envelope.collaborator)
    }

    async fn create_user(&self, user: &User) -> Result<(), ApiError> {
        self.execute(Method::POST, "/api/collaborator", user).await?;
        info!("Registered collaborator {}", user.username);
        Ok(())
    }

    async fn create_workshop(&self, workshop: &NewWorkshopEvent) -> Result<(), ApiError> {
        self.execute(Method::POST, "/api/course", workshop).await?;
        info!("Created workshop {:?}", workshop.title);
        Ok(())
    }

    async fn create_collection(&self, collection: &NewCollectionEvent) -> Result<(), ApiError> {
        self.execute(Method::POST, "/api/recollect", collection).await?;
        info!("Created collection starting {}", collection.start_time);
        Ok(())
    }

    async fn list_workshops(&self, federated_id: &str) -> Result<Vec<WorkshopEvent>, ApiError> {
        let endpoint = format!(
            "/api/course/collaborator_courses/{}",
            segment("federated id", federated_id)?
        );
        let workshops: Vec<WorkshopEvent> = self.fetch(&endpoint).await?;
        debug!("Fetched {} workshops", workshops.len());
        Ok(workshops)
    }

    async fn list_collections(&self, federated_id: &str) -> Result<Vec<CollectionEvent>, ApiError> {
        let endpoint = format!(
            "/api/recollect/collaborator_recollects/{}",
            segment("federated id", federated_id)?
        );
        let collections: Vec<CollectionEvent> = self.fetch(&endpoint).await?;
        debug!("Fetched {} collections", collections.len());
        Ok(collections)
    }

    async fn add_donation(
        &self,
        collection_id: &str,
        donation: &DonationRequest,
    ) -> Result<(), ApiError> {
        let endpoint = format!(
            "/api/recollect/add_to_recollect/{}",
            segment("collection id", collection_id)?
        );
        self.execute(Method::PATCH, &endpoint, donation).await
    }

    async fn add_assistant(
        &self,
        workshop_id: &str,
        attendance: &AttendanceRequest,
    ) -> Result<(), ApiError> {
        let endpoint = format!(
            "/api/course/add_assistant/{}",
            segment("workshop id", workshop_id)?
        );
        self.execute(Method::PATCH, &endpoint, attendance).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use axum::extract::{Path, State};
    use axum::http::{HeaderMap as AxumHeaders, StatusCode};
    use axum::routing::{get, patch, post};
    use axum::{Json, Router};
    use serde_json::{json, Value};

    use super::*;
    use crate::models::Materials;

    type Seen = Arc<Mutex<Vec<(String, Option<String>, Value)>>>;

    async fn spawn_api(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn client(base: &str, token: Option<&str>) -> HttpClient {
        HttpClient::new(base, Duration::from_secs(5), token.map(str::to_string)).unwrap()
    }

    fn bearer(headers: &AxumHeaders) -> Option<String> {
        headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    }

    fn recording_router(seen: Seen) -> Router {
        Router::new()
            .route(
                "/api/recollect/add_to_recollect/{id}",
                patch(
                    |State(seen): State<Seen>,
                     Path(id): Path<String>,
                     headers: AxumHeaders,
                     Json(body): Json<Value>| async move {
                        seen.lock().unwrap().push((id, bearer(&headers), body));
                        StatusCode::NO_CONTENT
                    },
                ),
            )
            .route(
                "/api/collaborator",
                post(
                    |State(seen): State<Seen>, headers: AxumHeaders, Json(body): Json<Value>| async move {
                        seen.lock()
                            .unwrap()
                            .push(("collaborator".into(), bearer(&headers), body));
                        (StatusCode::CREATED, Json(json!({"message": "ok"})))
                    },
                ),
            )
            .with_state(seen)
    }

    #[tokio::test]
    async fn test_lists_collections_for_a_user() {
        let router = Router::new().route(
            "/api/recollect/collaborator_recollects/{id}",
            get(|Path(id): Path<String>| async move {
                Json(json!([{
                    "RecollectID": "rec-1",
                    "CollaboratorFBID": id,
                    "StartTime": "2025-01-01T10:00:00.000Z",
                    "EndTime": "2025-01-01T12:00:00Z",
                    "Longitude": -99.1,
                    "Latitude": 19.4,
                    "Limit": 10,
                    "DonationArray": [{
                        "UserFBID": "fb-ana",
                        "Username": "ana",
                        "Cardboard": 5, "Glass": 0, "Tetrapack": 0,
                        "Plastic": 0, "Paper": 0, "Metal": 0
                    }]
                }]))
            }),
        );
        let base = spawn_api(router).await;

        let collections = client(&base, None).list_collections("fb org").await.unwrap();
        assert_eq!(collections.len(), 1);
        assert_eq!(collections[0].organizer_id, "fb org");
        assert_eq!(collections[0].donations[0].materials.cardboard, 5);
    }

    #[tokio::test]
    async fn test_fetches_wrapped_user() {
        let router = Router::new().route(
            "/api/collaborator/{id}",
            get(|Path(id): Path<String>| async move {
                Json(json!({"collaborator": {
                    "CollaboratorID": "7", "FBID": id, "Username": "ana", "Email": "ana@example.com"
                }}))
            }),
        );
        let base = spawn_api(router).await;

        let user = client(&base, None).get_user("fb-ana").await.unwrap();
        assert_eq!(user.collaborator_id, "7");
        assert_eq!(user.federated_id, "fb-ana");
    }

    #[tokio::test]
    async fn test_mutating_calls_carry_the_bearer_token() {
        let seen: Seen = Arc::default();
        let base = spawn_api(recording_router(Arc::clone(&seen))).await;
        let api = client(&base, Some("tok-123"));

        let donation = DonationRequest {
            contributor_id: "fb-ana".into(),
            materials: Materials {
                cardboard: 5,
                ..Materials::default()
            },
        };
        api.add_donation("rec-1", &donation).await.unwrap();
        api.create_user(&User {
            collaborator_id: String::new(),
            federated_id: "fb-ana".into(),
            username: "ana".into(),
            email: "ana@example.com".into(),
        })
        .await
        .unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].0, "rec-1");
        assert_eq!(seen[0].1.as_deref(), Some("Bearer tok-123"));
        assert_eq!(seen[0].2["UserFBID"], "fb-ana");
        assert_eq!(seen[0].2["Cardboard"], 5);
        assert_eq!(seen[1].1.as_deref(), Some("Bearer tok-123"));
        assert_eq!(seen[1].2["FBID"], "fb-ana");
    }

    #[tokio::test]
    async fn test_mutating_call_without_token_never_leaves_the_client() {
        let seen: Seen = Arc::default();
        let base = spawn_api(recording_router(Arc::clone(&seen))).await;
        let api = client(&base, None);

        let err = api
            .add_donation(
                "rec-1",
                &DonationRequest {
                    contributor_id: "fb-ana".into(),
                    materials: Materials::default(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::MissingToken(_)));
        assert!(seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_body_is_reported() {
        let router = Router::new().route("/api/course/collaborator_courses/{id}", get(|| async { "" }));
        let base = spawn_api(router).await;

        let err = client(&base, None).list_workshops("fb-ana").await.unwrap_err();
        assert!(matches!(err, ApiError::EmptyBody(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn test_schema_mismatch_is_a_decode_failure() {
        let router = Router::new().route(
            "/api/course/collaborator_courses/{id}",
            get(|| async { Json(json!({"courses": []})) }),
        );
        let base = spawn_api(router).await;

        let err = client(&base, None).list_workshops("fb-ana").await.unwrap_err();
        assert!(matches!(err, ApiError::DecodeFailure { .. }), "got {err:?}");
    }

    #[tokio::test]
    async fn test_server_error_keeps_status_and_body() {
        let router = Router::new().route(
            "/api/collaborator/{id}",
            get(|| async { (StatusCode::NOT_FOUND, "collaborator not found") }),
        );
        let base = spawn_api(router).await;

        match client(&base, None).get_user("fb-ghost").await.unwrap_err() {
            ApiError::UnexpectedStatus { status, body, .. } => {
                assert_eq!(status, StatusCode::NOT_FOUND);
                assert_eq!(body, "collaborator not found");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unreachable_host_is_a_network_failure() {
        let api = HttpClient::new("http://127.0.0.1:1", Duration::from_secs(2), None).unwrap();
        let result = tokio::time::timeout(Duration::from_secs(10), api.list_collections("fb-ana"))
            .await
            .expect("request was not bounded by the client timeout");
        assert!(matches!(result, Err(ApiError::NetworkFailure { .. })));
    }

    #[tokio::test]
    async fn test_bad_base_url_is_an_invalid_endpoint() {
        let api = client("not a url", None);
        let err = api.list_collections("fb-ana").await.unwrap_err();
        assert!(matches!(err, ApiError::InvalidEndpoint { .. }), "got {err:?}");

        let api = client("ftp://greenmates.example", None);
        let err = api.list_collections("fb-ana").await.unwrap_err();
        assert!(matches!(err, ApiError::InvalidEndpoint { .. }), "got {err:?}");
    }

    #[tokio::test]
    async fn test_blank_ids_are_rejected_locally() {
        let api = client("http://127.0.0.1:1", Some("tok"));
        let err = api.list_workshops("  ").await.unwrap_err();
        assert!(err.is_validation());
        let err = api
            .add_assistant("", &AttendanceRequest { contributor_id: "fb-ana".into() })
            .await
            .unwrap_err();
        assert!(err.is_validation());
    }
}
