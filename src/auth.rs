use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use uuid::Uuid;

/// UUID v5 namespace for deriving stable user ids from email addresses.
const USER_ID_NAMESPACE: Uuid = Uuid::from_bytes([
    0x8f, 0x2d, 0x51, 0xc4, 0x7a, 0x0e, 0x4b, 0x9a, 0x91, 0x3f, 0x5e, 0x6b, 0x20, 0xd8, 0x44,
    0x17,
]);

/// Identity of a user, assigned by the identity provider.
///
/// Everything below the auth boundary takes one of these explicitly; there is
/// no ambient "current user" anywhere in the crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(Uuid);

impl UserId {
    /// Stable id for an email identity. The same address always maps to the
    /// same id, regardless of case and surrounding whitespace.
    pub fn from_email(email: &str) -> Self {
        let normalized = email.trim().to_ascii_lowercase();
        Self(Uuid::new_v5(&USER_ID_NAMESPACE, normalized.as_bytes()))
    }

    /// Fresh throwaway id for a guest session.
    pub fn guest() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: UserId,
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub guest: bool,
}

/// Boundary to the authentication provider.
///
/// `current` answers "who is signed in right now"; `watch` is the auth state
/// stream, delivering `None` on sign-out. Callers handle the absent case at
/// this boundary and pass the concrete [`UserId`] down.
pub trait IdentityProvider: Send + Sync {
    fn current(&self) -> Option<Session>;
    fn watch(&self) -> watch::Receiver<Option<Session>>;
}

/// In-process identity provider.
///
/// Email sign-in derives the id from the address, so signing in again later
/// reaches the same documents. Guest sign-in mints a random id each time.
/// No credentials are checked here; that belongs to a real provider behind
/// the same trait.
pub struct LocalIdentity {
    state: watch::Sender<Option<Session>>,
}

impl LocalIdentity {
    pub fn new() -> Self {
        let (state, _) = watch::channel(None);
        Self { state }
    }

    pub fn sign_in(&self, email: &str, display_name: Option<&str>) -> Session {
        let session = Session {
            user_id: UserId::from_email(email),
            display_name: display_name.map(str::to_string),
            email: Some(email.trim().to_ascii_lowercase()),
            guest: false,
        };
        log::info!("signed in as {}", session.user_id);
        self.state.send_replace(Some(session.clone()));
        session
    }

    pub fn sign_in_guest(&self) -> Session {
        let session = Session {
            user_id: UserId::guest(),
            display_name: None,
            email: None,
            guest: true,
        };
        log::info!("signed in as guest {}", session.user_id);
        self.state.send_replace(Some(session.clone()));
        session
    }

    pub fn sign_out(&self) {
        log::info!("signed out");
        self.state.send_replace(None);
    }
}

impl Default for LocalIdentity {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentityProvider for LocalIdentity {
    fn current(&self) -> Option<Session> {
        self.state.borrow().clone()
    }

    fn watch(&self) -> watch::Receiver<Option<Session>> {
        self.state.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_email_same_id() {
        let a = UserId::from_email("ada@example.com");
        let b = UserId::from_email("  Ada@Example.COM ");
        assert_eq!(a, b);
    }

    #[test]
    fn different_emails_different_ids() {
        let a = UserId::from_email("ada@example.com");
        let b = UserId::from_email("grace@example.com");
        assert_ne!(a, b);
    }

    #[test]
    fn guest_ids_are_unique() {
        assert_ne!(UserId::guest(), UserId::guest());
    }

    #[test]
    fn sign_out_clears_session() {
        let identity = LocalIdentity::new();
        identity.sign_in("ada@example.com", Some("Ada"));
        assert!(identity.current().is_some());
        identity.sign_out();
        assert!(identity.current().is_none());
    }

    #[test]
    fn guest_session_is_flagged() {
        let identity = LocalIdentity::new();
        let session = identity.sign_in_guest();
        assert!(session.guest);
        assert!(session.email.is_none());
    }

    #[tokio::test]
    async fn watch_observes_auth_changes() {
        let identity = LocalIdentity::new();
        let mut rx = identity.watch();
        assert!(rx.borrow().is_none());

        let session = identity.sign_in("ada@example.com", None);
        rx.changed().await.unwrap();
        assert_eq!(
            rx.borrow().as_ref().map(|s| s.user_id),
            Some(session.user_id)
        );

        identity.sign_out();
        rx.changed().await.unwrap();
        assert!(rx.borrow().is_none());
    }
}
