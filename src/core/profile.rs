use serde::{Deserialize, Serialize};

use crate::auth::UserId;

/// Directory entry for the share dialog. Kept flat and public within the
/// store; authorization is the backend's concern, not this record's.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: UserId,
    pub display_name: Option<String>,
    pub email: Option<String>,
}

impl UserProfile {
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            display_name: None,
            email: None,
        }
    }

    /// Name to show in lists: display name, else email, else the id.
    pub fn label(&self) -> String {
        if let Some(name) = &self.display_name {
            if !name.is_empty() {
                return name.clone();
            }
        }
        if let Some(email) = &self.email {
            if !email.is_empty() {
                return email.clone();
            }
        }
        self.user_id.to_string()
    }

    /// Case-insensitive substring match against display name and email.
    pub fn matches(&self, query: &str) -> bool {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return true;
        }
        let name_hit = self
            .display_name
            .as_ref()
            .is_some_and(|n| n.to_lowercase().contains(&query));
        let email_hit = self
            .email
            .as_ref()
            .is_some_and(|e| e.to_lowercase().contains(&query));
        name_hit || email_hit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(name: Option<&str>, email: Option<&str>) -> UserProfile {
        UserProfile {
            user_id: UserId::from_email(email.unwrap_or("someone@example.com")),
            display_name: name.map(str::to_string),
            email: email.map(str::to_string),
        }
    }

    #[test]
    fn match_is_case_insensitive() {
        let p = profile(Some("Ada Lovelace"), Some("ada@example.com"));
        assert!(p.matches("ADA"));
        assert!(p.matches("lovelace"));
        assert!(p.matches("Example.com"));
        assert!(!p.matches("grace"));
    }

    #[test]
    fn empty_query_matches_everyone() {
        let p = profile(None, Some("ada@example.com"));
        assert!(p.matches(""));
        assert!(p.matches("   "));
    }

    #[test]
    fn label_prefers_display_name() {
        assert_eq!(
            profile(Some("Ada"), Some("ada@example.com")).label(),
            "Ada"
        );
        assert_eq!(
            profile(None, Some("ada@example.com")).label(),
            "ada@example.com"
        );
    }
}
