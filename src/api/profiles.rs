use async_trait::async_trait;

use super::{ApiClient, ProfileStore};
use crate::error::AuthError;
use crate::models::{ProfilePatch, ProfileRecord};

const PROFILES_PATH: &str = "/rest/v1/profiles";

/// Profile store over the backend's REST table interface
#[derive(Clone)]
pub struct HttpProfileStore {
    client: ApiClient,
}

impl HttpProfileStore {
    /// Share the identity provider's client so requests run as the user.
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }
}

pub(crate) fn by_id_path(id: &str) -> String {
    format!("{PROFILES_PATH}?id=eq.{id}")
}

#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
impl ProfileStore for HttpProfileStore {
    async fn get_profile_by_user_id(&self, id: &str) -> Result<Option<ProfileRecord>, AuthError> {
        let rows: Vec<ProfileRecord> = self
            .client
            .get(&format!("{}&select=*", by_id_path(id)))
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn insert_profile(&self, record: &ProfileRecord) -> Result<(), AuthError> {
        self.client.post_no_response(PROFILES_PATH, record).await
    }

    async fn update_profile(&self, id: &str, patch: &ProfilePatch) -> Result<(), AuthError> {
        self.client.patch_no_response(&by_id_path(id), patch).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserRole;

    #[test]
    fn test_filter_path() {
        assert_eq!(by_id_path("abc"), "/rest/v1/profiles?id=eq.abc");
    }

    #[test]
    fn test_patch_omits_missing_fields() {
        let patch = ProfilePatch {
            full_name: Some("Reem".into()),
            role: Some(UserRole::Vendor),
            ..ProfilePatch::default()
        };
        let json = serde_json::to_value(&patch).unwrap();
        assert_eq!(json, serde_json::json!({"full_name": "Reem", "role": "vendor"}));
    }
}
