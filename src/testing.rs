//! In-memory GreenMates API for exercising the feed and commands.

use std::sync::Mutex;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use reqwest::StatusCode;

use crate::client::GreenMatesApi;
use crate::error::ApiError;
use crate::models::{
    Assistant, AttendanceRequest, CollectionEvent, Donation, DonationRequest, NewCollectionEvent,
    NewWorkshopEvent, Pillar, User, WorkshopEvent,
};

#[derive(Default)]
struct Backend {
    users: Vec<User>,
    collections: Vec<CollectionEvent>,
    workshops: Vec<WorkshopEvent>,
    calls: Vec<String>,
    offline: bool,
    lists_down: bool,
    next_id: u32,
}

/// Behaves like the server: writes land in its lists and show up on the
/// next read.
#[derive(Default)]
pub struct FakeApi {
    backend: Mutex<Backend>,
    delay: Option<Duration>,
}

pub fn collection(id: &str, limit: i64) -> CollectionEvent {
    CollectionEvent {
        id: id.to_string(),
        organizer_id: "fb-org".into(),
        start_time: Utc.with_ymd_and_hms(2025, 1, 1, 10, 0, 0).unwrap(),
        end_time: Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap(),
        longitude: -99.1332,
        latitude: 19.4326,
        capacity_limit: limit,
        donations: vec![],
    }
}

pub fn workshop(id: &str, limit: i64) -> WorkshopEvent {
    WorkshopEvent {
        id: id.to_string(),
        organizer_id: "fb-org".into(),
        title: "Huerto urbano".into(),
        pillar: Pillar::Consumo,
        start_time: Utc.with_ymd_and_hms(2025, 2, 1, 16, 0, 0).unwrap(),
        end_time: Utc.with_ymd_and_hms(2025, 2, 1, 18, 0, 0).unwrap(),
        longitude: -99.1332,
        latitude: 19.4326,
        capacity_limit: limit,
        assistants: vec![],
    }
}

impl FakeApi {
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn put_collection(&self, event: CollectionEvent) {
        self.backend.lock().unwrap().collections.push(event);
    }

    pub fn put_workshop(&self, event: WorkshopEvent) {
        self.backend.lock().unwrap().workshops.push(event);
    }

    pub fn clear(&self) {
        let mut backend = self.backend.lock().unwrap();
        backend.collections.clear();
        backend.workshops.clear();
    }

    pub fn go_offline(&self) {
        self.backend.lock().unwrap().offline = true;
    }

    /// Reads fail from now on; writes keep working.
    pub fn fail_lists(&self) {
        self.backend.lock().unwrap().lists_down = true;
    }

    pub fn calls(&self) -> Vec<String> {
        self.backend.lock().unwrap().calls.clone()
    }

    pub fn calls_to(&self, name: &str) -> usize {
        self.calls().iter().filter(|c| c.as_str() == name).count()
    }

    pub fn collection(&self, id: &str) -> Option<CollectionEvent> {
        self.backend
            .lock()
            .unwrap()
            .collections
            .iter()
            .find(|c| c.id == id)
            .cloned()
    }

    async fn enter(&self, call: &str) -> Result<(), ApiError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let mut backend = self.backend.lock().unwrap();
        backend.calls.push(call.to_string());
        if backend.offline {
            return Err(ApiError::UnexpectedStatus {
                endpoint: call.to_string(),
                status: StatusCode::SERVICE_UNAVAILABLE,
                body: "offline".into(),
            });
        }
        Ok(())
    }

    async fn enter_list(&self, call: &str) -> Result<(), ApiError> {
        self.enter(call).await?;
        if self.backend.lock().unwrap().lists_down {
            return Err(ApiError::UnexpectedStatus {
                endpoint: call.to_string(),
                status: StatusCode::INTERNAL_SERVER_ERROR,
                body: "lists unavailable".into(),
            });
        }
        Ok(())
    }

    fn not_found(what: &str, id: &str) -> ApiError {
        ApiError::UnexpectedStatus {
            endpoint: format!("{what}/{id}"),
            status: StatusCode::NOT_FOUND,
            body: format!("{what} {id} not found"),
        }
    }
}

impl GreenMatesApi for FakeApi {
    async fn get_user(&self, federated_id: &str) -> Result<User, ApiError> {
        self.enter("get_user").await?;
        let backend = self.backend.lock().unwrap();
        backend
            .users
            .iter()
            .find(|u| u.federated_id == federated_id)
            .cloned()
            .ok_or_else(|| Self::not_found("collaborator", federated_id))
    }

    async fn create_user(&self, user: &User) -> Result<(), ApiError> {
        self.enter("create_user").await?;
        let mut backend = self.backend.lock().unwrap();
        backend.next_id += 1;
        let mut user = user.clone();
        user.collaborator_id = backend.next_id.to_string();
        backend.users.push(user);
        Ok(())
    }

    async fn create_workshop(&self, workshop: &NewWorkshopEvent) -> Result<(), ApiError> {
        self.enter("create_workshop").await?;
        let mut backend = self.backend.lock().unwrap();
        backend.next_id += 1;
        let id = format!("course-{}", backend.next_id);
        backend.workshops.push(WorkshopEvent {
            id,
            organizer_id: workshop.organizer_id.clone(),
            title: workshop.title.clone(),
            pillar: workshop.pillar,
            start_time: workshop.start_time,
            end_time: workshop.end_time,
            longitude: workshop.longitude,
            latitude: workshop.latitude,
            capacity_limit: i64::from(workshop.capacity_limit),
            assistants: vec![],
        });
        Ok(())
    }

    async fn create_collection(&self, collection: &NewCollectionEvent) -> Result<(), ApiError> {
        self.enter("create_collection").await?;
        let mut backend = self.backend.lock().unwrap();
        backend.next_id += 1;
        let id = format!("rec-{}", backend.next_id);
        backend.collections.push(CollectionEvent {
            id,
            organizer_id: collection.organizer_id.clone(),
            start_time: collection.start_time,
            end_time: collection.end_time,
            longitude: collection.longitude,
            latitude: collection.latitude,
            capacity_limit: i64::from(collection.capacity_limit),
            donations: vec![],
        });
        Ok(())
    }

    /// Like the server, only the events the given user organizes.
    async fn list_workshops(&self, federated_id: &str) -> Result<Vec<WorkshopEvent>, ApiError> {
        self.enter_list("list_workshops").await?;
        let backend = self.backend.lock().unwrap();
        Ok(backend
            .workshops
            .iter()
            .filter(|w| w.organizer_id == federated_id)
            .cloned()
            .collect())
    }

    async fn list_collections(&self, federated_id: &str) -> Result<Vec<CollectionEvent>, ApiError> {
        self.enter_list("list_collections").await?;
        let backend = self.backend.lock().unwrap();
        Ok(backend
            .collections
            .iter()
            .filter(|c| c.organizer_id == federated_id)
            .cloned()
            .collect())
    }

    async fn add_donation(
        &self,
        collection_id: &str,
        donation: &DonationRequest,
    ) -> Result<(), ApiError> {
        self.enter("add_donation").await?;
        let mut backend = self.backend.lock().unwrap();
        let name = backend
            .users
            .iter()
            .find(|u| u.federated_id == donation.contributor_id)
            .map(|u| u.username.clone())
            .unwrap_or_default();
        let event = backend
            .collections
            .iter_mut()
            .find(|c| c.id == collection_id)
            .ok_or_else(|| Self::not_found("recollect", collection_id))?;
        event.donations.push(Donation {
            contributor_id: donation.contributor_id.clone(),
            contributor_name: name,
            materials: donation.materials,
        });
        Ok(())
    }

    async fn add_assistant(
        &self,
        workshop_id: &str,
        attendance: &AttendanceRequest,
    ) -> Result<(), ApiError> {
        self.enter("add_assistant").await?;
        let mut backend = self.backend.lock().unwrap();
        let event = backend
            .workshops
            .iter_mut()
            .find(|w| w.id == workshop_id)
            .ok_or_else(|| Self::not_found("course", workshop_id))?;
        event.assistants.push(Assistant {
            contributor_id: attendance.contributor_id.clone(),
            contributor_name: String::new(),
            email: String::new(),
        });
        Ok(())
    }
}
