use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::UserId;

/// A label a user files their own tasks under. Never shared; tasks keep the
/// id even after the category is gone and simply render uncategorized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: Uuid,
    pub owner: UserId,
    pub name: String,
    /// Display color as a hex string, e.g. "#7a5cff".
    pub color: String,
    pub created: NaiveDateTime,
}

impl Category {
    pub fn new(owner: UserId, name: impl Into<String>, color: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner,
            name: name.into(),
            color: color.into(),
            created: chrono::Local::now().naive_local(),
        }
    }
}

/// Creation payload; the store assigns the id.
#[derive(Debug, Clone)]
pub struct NewCategory {
    pub owner: UserId,
    pub name: String,
    pub color: String,
}

impl NewCategory {
    pub fn new(owner: UserId, name: impl Into<String>, color: impl Into<String>) -> Self {
        Self {
            owner,
            name: name.into(),
            color: color.into(),
        }
    }
}
