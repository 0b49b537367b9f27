use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::UserId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "high" => Some(Self::High),
            "medium" => Some(Self::Medium),
            "low" => Some(Self::Low),
            _ => None,
        }
    }
}

impl Default for Priority {
    fn default() -> Self {
        Self::Medium
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subtask {
    pub id: Uuid,
    pub name: String,
    pub completed: bool,
}

impl Subtask {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            completed: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub owner: UserId,
    pub name: String,
    pub completed: bool,
    /// Position in the owner's list. Dense and 0-based after every reorder.
    pub order: u32,
    pub category: Option<Uuid>,
    pub priority: Priority,
    /// Display order of sub-tasks is insertion order; they carry no position.
    pub subtasks: Vec<Subtask>,
    pub shared_with: Vec<UserId>,
    pub created: NaiveDateTime,
}

impl Task {
    pub fn new(owner: UserId, name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner,
            name: name.into(),
            completed: false,
            order: 0,
            category: None,
            priority: Priority::default(),
            subtasks: Vec::new(),
            shared_with: Vec::new(),
            created: chrono::Local::now().naive_local(),
        }
    }

    pub fn is_shared_with(&self, user: &UserId) -> bool {
        self.shared_with.iter().any(|u| u == user)
    }

    pub fn visible_to(&self, user: &UserId) -> bool {
        self.owner == *user || self.is_shared_with(user)
    }

    pub fn subtask_mut(&mut self, id: Uuid) -> Option<&mut Subtask> {
        self.subtasks.iter_mut().find(|s| s.id == id)
    }
}

/// Fields the caller controls at creation. The store assigns the id and the
/// position at the end of the owner's list.
#[derive(Debug, Clone)]
pub struct NewTask {
    pub owner: UserId,
    pub name: String,
    pub category: Option<Uuid>,
    pub priority: Priority,
}

impl NewTask {
    pub fn new(owner: UserId, name: impl Into<String>) -> Self {
        Self {
            owner,
            name: name.into(),
            category: None,
            priority: Priority::default(),
        }
    }
}

/// Partial update. `None` leaves a field untouched.
///
/// Positions are deliberately absent: a reorder renumbers the whole list and
/// goes through the batched order update instead.
#[derive(Debug, Clone, Default)]
pub struct TaskPatch {
    pub name: Option<String>,
    pub completed: Option<bool>,
    pub priority: Option<Priority>,
    pub category: Option<Option<Uuid>>,
    pub subtasks: Option<Vec<Subtask>>,
    pub shared_with: Option<Vec<UserId>>,
}

impl TaskPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.completed.is_none()
            && self.priority.is_none()
            && self.category.is_none()
            && self.subtasks.is_none()
            && self.shared_with.is_none()
    }

    pub fn apply(&self, task: &mut Task) {
        if let Some(name) = &self.name {
            task.name = name.clone();
        }
        if let Some(completed) = self.completed {
            task.completed = completed;
        }
        if let Some(priority) = self.priority {
            task.priority = priority;
        }
        if let Some(category) = self.category {
            task.category = category;
        }
        if let Some(subtasks) = &self.subtasks {
            task.subtasks = subtasks.clone();
        }
        if let Some(shared_with) = &self.shared_with {
            task.shared_with = shared_with.clone();
        }
    }
}
