use base64::prelude::*;
use tracing::debug;

/// Read the federated id out of an identity-provider ID token.
///
/// Only the payload is decoded; the signature is the API's business. The
/// provider puts the subject in `user_id` and mirrors it in `sub`.
pub fn federated_id_from_token(token: &str) -> Option<String> {
    let payload = token.split('.').nth(1)?;
    let bytes = BASE64_URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| debug!("Token payload is not base64: {}", e))
        .ok()?;
    let claims: serde_json::Value = serde_json::from_slice(&bytes)
        .map_err(|e| debug!("Token payload is not JSON: {}", e))
        .ok()?;

    ["user_id", "sub"]
        .iter()
        .filter_map(|key| claims.get(*key).and_then(|v| v.as_str()))
        .find(|id| !id.is_empty())
        .map(str::to_string)
}

/// The configured federated id wins; otherwise fall back to the token's subject.
pub fn resolve_federated_id(configured: Option<&str>, token: Option<&str>) -> Option<String> {
    configured
        .filter(|id| !id.trim().is_empty())
        .map(|id| id.trim().to_string())
        .or_else(|| token.and_then(federated_id_from_token))
}
