use std::sync::Arc;

use uuid::Uuid;

use crate::auth::UserId;
use crate::core::task::{NewTask, Priority, Subtask, Task, TaskPatch};
use crate::store::{Result, StoreError, TaskStore};

/// Task operations on behalf of an explicit acting user.
///
/// Edits address tasks by id and are open to anyone the task is visible to;
/// only changing who a task is shared with is reserved to its owner.
pub struct TaskService {
    store: Arc<dyn TaskStore>,
}

impl TaskService {
    pub fn new(store: Arc<dyn TaskStore>) -> Self {
        Self { store }
    }

    /// Create a task at the end of the user's list.
    pub async fn add(&self, user: UserId, name: &str, category: Option<Uuid>) -> Result<Task> {
        let name = name.trim();
        if name.is_empty() {
            return Err(StoreError::invalid("task name is empty"));
        }
        let mut new = NewTask::new(user, name);
        new.category = category;
        self.store.create_task(new).await
    }

    pub async fn rename(&self, id: Uuid, name: &str) -> Result<()> {
        let name = name.trim();
        if name.is_empty() {
            return Err(StoreError::invalid("task name is empty"));
        }
        self.patch(
            id,
            TaskPatch {
                name: Some(name.to_string()),
                ..TaskPatch::default()
            },
        )
        .await
    }

    pub async fn set_completed(&self, id: Uuid, completed: bool) -> Result<()> {
        self.patch(
            id,
            TaskPatch {
                completed: Some(completed),
                ..TaskPatch::default()
            },
        )
        .await
    }

    pub async fn set_priority(&self, id: Uuid, priority: Priority) -> Result<()> {
        self.patch(
            id,
            TaskPatch {
                priority: Some(priority),
                ..TaskPatch::default()
            },
        )
        .await
    }

    pub async fn set_category(&self, id: Uuid, category: Option<Uuid>) -> Result<()> {
        self.patch(
            id,
            TaskPatch {
                category: Some(category),
                ..TaskPatch::default()
            },
        )
        .await
    }

    pub async fn add_subtask(&self, id: Uuid, name: &str) -> Result<Subtask> {
        let name = name.trim();
        if name.is_empty() {
            return Err(StoreError::invalid("sub-task name is empty"));
        }
        let task = self.load(id).await?;
        let subtask = Subtask::new(name);
        let mut subtasks = task.subtasks;
        subtasks.push(subtask.clone());
        self.patch(
            id,
            TaskPatch {
                subtasks: Some(subtasks),
                ..TaskPatch::default()
            },
        )
        .await?;
        Ok(subtask)
    }

    pub async fn set_subtask_completed(
        &self,
        id: Uuid,
        subtask: Uuid,
        completed: bool,
    ) -> Result<()> {
        let mut task = self.load(id).await?;
        task.subtask_mut(subtask)
            .ok_or(StoreError::NotFound(subtask))?
            .completed = completed;
        self.patch(
            id,
            TaskPatch {
                subtasks: Some(task.subtasks),
                ..TaskPatch::default()
            },
        )
        .await
    }

    pub async fn remove_subtask(&self, id: Uuid, subtask: Uuid) -> Result<()> {
        let task = self.load(id).await?;
        let mut subtasks = task.subtasks;
        let before = subtasks.len();
        subtasks.retain(|s| s.id != subtask);
        if subtasks.len() == before {
            return Err(StoreError::NotFound(subtask));
        }
        self.patch(
            id,
            TaskPatch {
                subtasks: Some(subtasks),
                ..TaskPatch::default()
            },
        )
        .await
    }

    /// Replace who the task is shared with. Owner only; the owner themselves
    /// and duplicate entries are silently dropped from the list.
    pub async fn set_shared_with(
        &self,
        acting: &UserId,
        id: Uuid,
        users: Vec<UserId>,
    ) -> Result<()> {
        let task = self.load(id).await?;
        if task.owner != *acting {
            return Err(StoreError::denied("only the owner can change sharing"));
        }

        let mut cleaned: Vec<UserId> = Vec::new();
        for user in users {
            if user != task.owner && !cleaned.contains(&user) {
                cleaned.push(user);
            }
        }
        self.patch(
            id,
            TaskPatch {
                shared_with: Some(cleaned),
                ..TaskPatch::default()
            },
        )
        .await
    }

    pub async fn remove(&self, id: Uuid) -> Result<()> {
        self.store.delete_task(id).await
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<Task>> {
        self.store.get_task(id).await
    }

    async fn load(&self, id: Uuid) -> Result<Task> {
        self.store.get_task(id).await?.ok_or(StoreError::NotFound(id))
    }

    async fn patch(&self, id: Uuid, patch: TaskPatch) -> Result<()> {
        self.store.update_task(id, patch).await
    }
}
