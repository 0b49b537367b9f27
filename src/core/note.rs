use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::UserId;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub id: Uuid,
    pub owner: UserId,
    pub title: String,
    pub content: String,
    pub shared_with: Vec<UserId>,
    /// Soft-deleted notes stay in the store and show up in the trash view.
    /// Deleting again from there purges the document for good.
    pub deleted: bool,
    pub created: NaiveDateTime,
}

impl Note {
    pub fn new(owner: UserId, title: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner,
            title: title.into(),
            content: String::new(),
            shared_with: Vec::new(),
            deleted: false,
            created: chrono::Local::now().naive_local(),
        }
    }

    pub fn is_shared_with(&self, user: &UserId) -> bool {
        self.shared_with.iter().any(|u| u == user)
    }
}

/// Creation payload; the store assigns the id.
#[derive(Debug, Clone)]
pub struct NewNote {
    pub owner: UserId,
    pub title: String,
    pub content: String,
}

impl NewNote {
    pub fn new(owner: UserId, title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            owner,
            title: title.into(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct NotePatch {
    pub title: Option<String>,
    pub content: Option<String>,
    pub shared_with: Option<Vec<UserId>>,
    pub deleted: Option<bool>,
}

impl NotePatch {
    pub fn apply(&self, note: &mut Note) {
        if let Some(title) = &self.title {
            note.title = title.clone();
        }
        if let Some(content) = &self.content {
            note.content = content.clone();
        }
        if let Some(shared_with) = &self.shared_with {
            note.shared_with = shared_with.clone();
        }
        if let Some(deleted) = self.deleted {
            note.deleted = deleted;
        }
    }
}
