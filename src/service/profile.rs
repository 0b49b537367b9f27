use std::sync::Arc;

use crate::auth::{Session, UserId};
use crate::core::profile::UserProfile;
use crate::store::{ProfileStore, Result};

/// The user directory behind the share dialog.
pub struct ProfileService {
    store: Arc<dyn ProfileStore>,
}

impl ProfileService {
    pub fn new(store: Arc<dyn ProfileStore>) -> Self {
        Self { store }
    }

    /// Make sure the signed-in user is listed in the directory, with
    /// whatever the session knows about them.
    pub async fn record_session(&self, session: &Session) -> Result<()> {
        let mut profile = self
            .store
            .get_profile(session.user_id)
            .await?
            .unwrap_or_else(|| UserProfile::new(session.user_id));
        if session.display_name.is_some() {
            profile.display_name = session.display_name.clone();
        }
        if session.email.is_some() {
            profile.email = session.email.clone();
        }
        self.store.upsert_profile(profile).await
    }

    pub async fn set_display_name(&self, user: UserId, display_name: &str) -> Result<()> {
        let mut profile = self
            .store
            .get_profile(user)
            .await?
            .unwrap_or_else(|| UserProfile::new(user));
        let display_name = display_name.trim();
        profile.display_name = if display_name.is_empty() {
            None
        } else {
            Some(display_name.to_string())
        };
        self.store.upsert_profile(profile).await
    }

    pub async fn get(&self, user: UserId) -> Result<Option<UserProfile>> {
        self.store.get_profile(user).await
    }

    /// Everyone except the viewer, ready for a share picker.
    pub async fn directory(&self, viewer: &UserId) -> Result<Vec<UserProfile>> {
        let mut profiles = self.store.list_profiles().await?;
        profiles.retain(|p| p.user_id != *viewer);
        profiles.sort_by(|a, b| {
            a.label()
                .to_lowercase()
                .cmp(&b.label().to_lowercase())
                .then_with(|| a.user_id.cmp(&b.user_id))
        });
        Ok(profiles)
    }

    /// Directory entries whose name or email contains the query,
    /// case-insensitively. An empty query is the whole directory.
    pub async fn search(&self, viewer: &UserId, query: &str) -> Result<Vec<UserProfile>> {
        let mut profiles = self.directory(viewer).await?;
        profiles.retain(|p| p.matches(query));
        Ok(profiles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;

    fn ada() -> UserId {
        UserId::from_email("ada@example.com")
    }

    fn service() -> ProfileService {
        ProfileService::new(Arc::new(MemoryStore::new()))
    }

    async fn seed(service: &ProfileService, name: &str, email: &str) -> UserId {
        let user = UserId::from_email(email);
        let session = Session {
            user_id: user,
            display_name: Some(name.to_string()),
            email: Some(email.to_string()),
            guest: false,
        };
        service.record_session(&session).await.unwrap();
        user
    }

    #[tokio::test]
    async fn directory_excludes_the_viewer() {
        let service = service();
        let viewer = seed(&service, "Ada", "ada@example.com").await;
        seed(&service, "Grace", "grace@example.com").await;
        seed(&service, "Edsger", "edsger@example.com").await;

        let listed = service.directory(&viewer).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert!(listed.iter().all(|p| p.user_id != viewer));
    }

    #[tokio::test]
    async fn directory_is_sorted_by_label() {
        let service = service();
        let viewer = ada();
        seed(&service, "grace", "grace@example.com").await;
        seed(&service, "Edsger", "edsger@example.com").await;

        let listed = service.directory(&viewer).await.unwrap();
        let labels: Vec<String> = listed.iter().map(|p| p.label()).collect();
        assert_eq!(labels, ["Edsger", "grace"]);
    }

    #[tokio::test]
    async fn search_matches_name_or_email() {
        let service = service();
        let viewer = ada();
        seed(&service, "Grace Hopper", "grace@navy.mil").await;
        seed(&service, "Edsger", "edsger@example.com").await;

        let by_name = service.search(&viewer, "hopper").await.unwrap();
        assert_eq!(by_name.len(), 1);

        let by_email = service.search(&viewer, "NAVY").await.unwrap();
        assert_eq!(by_email.len(), 1);

        let none = service.search(&viewer, "turing").await.unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn record_session_keeps_existing_fields() {
        let service = service();
        let user = seed(&service, "Ada", "ada@example.com").await;

        // A later session without a display name must not erase it.
        let bare = Session {
            user_id: user,
            display_name: None,
            email: Some("ada@example.com".into()),
            guest: false,
        };
        service.record_session(&bare).await.unwrap();

        let profile = service.get(user).await.unwrap().unwrap();
        assert_eq!(profile.display_name.as_deref(), Some("Ada"));
    }

    #[tokio::test]
    async fn display_name_can_be_cleared() {
        let service = service();
        let user = seed(&service, "Ada", "ada@example.com").await;

        service.set_display_name(user, "  ").await.unwrap();
        let profile = service.get(user).await.unwrap().unwrap();
        assert!(profile.display_name.is_none());
        assert_eq!(profile.label(), "ada@example.com");
    }
}
