pub mod file;
pub mod memory;

use std::pin::Pin;
use std::task::{Context, Poll};

use async_trait::async_trait;
use chrono::NaiveDate;
use futures::Stream;
use thiserror::Error;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::auth::UserId;
use crate::core::category::{Category, NewCategory};
use crate::core::habit::{Habit, NewHabit};
use crate::core::note::{NewNote, Note, NotePatch};
use crate::core::profile::UserProfile;
use crate::core::task::{NewTask, Task, TaskPatch};

pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors surfaced by the document store and the services over it.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no document with id {0}")]
    NotFound(Uuid),

    #[error("invalid request: {0}")]
    Invalid(String),

    #[error("permission denied: {0}")]
    Denied(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StoreError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid(message.into())
    }

    pub fn denied(message: impl Into<String>) -> Self {
        Self::Denied(message.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Equality query over the task collection; set fields combine with AND.
///
/// Owner and shared-with are alternatives on purpose. The query model this
/// mirrors cannot OR across fields, so a viewer's full list is always two
/// subscriptions merged client side.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TaskFilter {
    pub owner: Option<UserId>,
    pub shared_with: Option<UserId>,
    pub category: Option<Uuid>,
    pub completed: Option<bool>,
}

impl TaskFilter {
    pub fn owned_by(user: UserId) -> Self {
        Self {
            owner: Some(user),
            ..Self::default()
        }
    }

    pub fn shared_with(user: UserId) -> Self {
        Self {
            shared_with: Some(user),
            ..Self::default()
        }
    }

    pub fn with_category(mut self, category: Uuid) -> Self {
        self.category = Some(category);
        self
    }

    pub fn with_completed(mut self, completed: bool) -> Self {
        self.completed = Some(completed);
        self
    }

    pub fn matches(&self, task: &Task) -> bool {
        if let Some(owner) = &self.owner {
            if task.owner != *owner {
                return false;
            }
        }
        if let Some(user) = &self.shared_with {
            if !task.is_shared_with(user) {
                return false;
            }
        }
        if let Some(category) = &self.category {
            if task.category != Some(*category) {
                return false;
            }
        }
        if let Some(completed) = self.completed {
            if task.completed != completed {
                return false;
            }
        }
        true
    }
}

/// Equality query over the note collection; same AND semantics as tasks.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct NoteFilter {
    pub owner: Option<UserId>,
    pub shared_with: Option<UserId>,
    pub deleted: Option<bool>,
}

impl NoteFilter {
    pub fn owned_by(user: UserId) -> Self {
        Self {
            owner: Some(user),
            ..Self::default()
        }
    }

    pub fn shared_with(user: UserId) -> Self {
        Self {
            shared_with: Some(user),
            ..Self::default()
        }
    }

    pub fn with_deleted(mut self, deleted: bool) -> Self {
        self.deleted = Some(deleted);
        self
    }

    pub fn matches(&self, note: &Note) -> bool {
        if let Some(owner) = &self.owner {
            if note.owner != *owner {
                return false;
            }
        }
        if let Some(user) = &self.shared_with {
            if !note.is_shared_with(user) {
                return false;
            }
        }
        if let Some(deleted) = self.deleted {
            if note.deleted != deleted {
                return false;
            }
        }
        true
    }
}

/// Live query handle.
///
/// Every delivery replaces the previous result set wholesale; there is no
/// incremental patching. Dropping the handle unregisters the watcher and
/// stops deliveries.
pub struct Subscription<T> {
    rx: mpsc::UnboundedReceiver<Vec<T>>,
    _guard: WatchGuard,
}

impl<T> Subscription<T> {
    pub(crate) fn new(rx: mpsc::UnboundedReceiver<Vec<T>>, guard: WatchGuard) -> Self {
        Self { rx, _guard: guard }
    }

    /// Wait for the next result set. `None` once the store is gone.
    pub async fn next(&mut self) -> Option<Vec<T>> {
        self.rx.recv().await
    }

    /// Take an already-queued result set without waiting.
    pub fn try_next(&mut self) -> Option<Vec<T>> {
        self.rx.try_recv().ok()
    }
}

impl<T> Stream for Subscription<T> {
    type Item = Vec<T>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

/// Runs its cancel action when dropped.
pub(crate) struct WatchGuard {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl WatchGuard {
    pub(crate) fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }
}

impl Drop for WatchGuard {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

/// Task collection boundary.
///
/// Subscriptions deliver the full matching result set immediately and then
/// after every commit that changes it. Writes are last-write-wins; there is
/// no version checking.
#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn subscribe_tasks(&self, filter: TaskFilter) -> Result<Subscription<Task>>;

    /// Insert a task at the end of the owner's list (highest order + 1).
    async fn create_task(&self, new: NewTask) -> Result<Task>;

    async fn get_task(&self, id: Uuid) -> Result<Option<Task>>;

    async fn update_task(&self, id: Uuid, patch: TaskPatch) -> Result<()>;

    /// Apply every `(id, order)` pair as one commit: all of them or none,
    /// observed by watchers as a single change.
    async fn update_task_orders(&self, changes: &[(Uuid, u32)]) -> Result<()>;

    async fn delete_task(&self, id: Uuid) -> Result<()>;
}

#[async_trait]
pub trait CategoryStore: Send + Sync {
    async fn subscribe_categories(&self, owner: UserId) -> Result<Subscription<Category>>;
    async fn create_category(&self, new: NewCategory) -> Result<Category>;
    async fn delete_category(&self, id: Uuid) -> Result<()>;
}

#[async_trait]
pub trait NoteStore: Send + Sync {
    async fn subscribe_notes(&self, filter: NoteFilter) -> Result<Subscription<Note>>;
    async fn create_note(&self, new: NewNote) -> Result<Note>;
    async fn get_note(&self, id: Uuid) -> Result<Option<Note>>;
    async fn update_note(&self, id: Uuid, patch: NotePatch) -> Result<()>;
    /// Permanent removal. Soft delete is an update with `deleted = true`.
    async fn delete_note(&self, id: Uuid) -> Result<()>;
}

#[async_trait]
pub trait HabitStore: Send + Sync {
    async fn subscribe_habits(&self, owner: UserId) -> Result<Subscription<Habit>>;
    async fn create_habit(&self, new: NewHabit) -> Result<Habit>;
    async fn get_habit(&self, id: Uuid) -> Result<Option<Habit>>;
    /// Replace the completion history. Days are sorted and deduplicated.
    async fn set_habit_completions(&self, id: Uuid, completions: Vec<NaiveDate>) -> Result<()>;
    async fn delete_habit(&self, id: Uuid) -> Result<()>;
}

/// User directory, read on demand for the share dialog. Not subscribed.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn upsert_profile(&self, profile: UserProfile) -> Result<()>;
    async fn get_profile(&self, user: UserId) -> Result<Option<UserProfile>>;
    async fn list_profiles(&self) -> Result<Vec<UserProfile>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task_for(owner: UserId) -> Task {
        Task::new(owner, "Buy milk")
    }

    #[test]
    fn owner_filter_matches_only_owner() {
        let ada = UserId::from_email("ada@example.com");
        let grace = UserId::from_email("grace@example.com");
        let filter = TaskFilter::owned_by(ada);

        assert!(filter.matches(&task_for(ada)));
        assert!(!filter.matches(&task_for(grace)));
    }

    #[test]
    fn shared_filter_checks_membership_not_ownership() {
        let ada = UserId::from_email("ada@example.com");
        let grace = UserId::from_email("grace@example.com");
        let mut task = task_for(grace);
        task.shared_with.push(ada);

        assert!(TaskFilter::shared_with(ada).matches(&task));
        assert!(!TaskFilter::shared_with(ada).matches(&task_for(grace)));
        // Owning a task does not make it "shared with" the owner.
        assert!(!TaskFilter::shared_with(ada).matches(&task_for(ada)));
    }

    #[test]
    fn filter_fields_combine_with_and() {
        let ada = UserId::from_email("ada@example.com");
        let category = Uuid::new_v4();
        let mut task = task_for(ada);
        task.category = Some(category);
        task.completed = true;

        let filter = TaskFilter::owned_by(ada)
            .with_category(category)
            .with_completed(true);
        assert!(filter.matches(&task));

        assert!(!filter.with_completed(false).matches(&task));
        assert!(
            !TaskFilter::owned_by(ada)
                .with_category(Uuid::new_v4())
                .matches(&task)
        );
    }

    #[test]
    fn note_filter_splits_trash_from_active() {
        let ada = UserId::from_email("ada@example.com");
        let mut note = Note::new(ada, "Groceries");
        note.deleted = true;

        assert!(NoteFilter::owned_by(ada).with_deleted(true).matches(&note));
        assert!(!NoteFilter::owned_by(ada).with_deleted(false).matches(&note));
        assert!(NoteFilter::owned_by(ada).matches(&note));
    }
}
