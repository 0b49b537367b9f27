use std::sync::Arc;

use chrono::NaiveDate;
use uuid::Uuid;

use crate::auth::UserId;
use crate::core::habit::{Habit, NewHabit};
use crate::store::{HabitStore, Result, StoreError, Subscription};

pub struct HabitService {
    store: Arc<dyn HabitStore>,
}

impl HabitService {
    pub fn new(store: Arc<dyn HabitStore>) -> Self {
        Self { store }
    }

    pub async fn add(&self, user: UserId, name: &str) -> Result<Habit> {
        let name = name.trim();
        if name.is_empty() {
            return Err(StoreError::invalid("habit name is empty"));
        }
        self.store.create_habit(NewHabit::new(user, name)).await
    }

    /// Mark the habit done for one day. Logging the same day twice is a
    /// no-op, not an error.
    pub async fn log_completion(&self, id: Uuid, date: NaiveDate) -> Result<()> {
        let mut habit = self.load(id).await?;
        if !habit.log(date) {
            return Ok(());
        }
        self.store
            .set_habit_completions(id, habit.completions)
            .await
    }

    pub async fn unlog_completion(&self, id: Uuid, date: NaiveDate) -> Result<()> {
        let mut habit = self.load(id).await?;
        if !habit.unlog(date) {
            return Ok(());
        }
        self.store
            .set_habit_completions(id, habit.completions)
            .await
    }

    pub async fn remove(&self, id: Uuid) -> Result<()> {
        self.store.delete_habit(id).await
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<Habit>> {
        self.store.get_habit(id).await
    }

    pub async fn subscribe(&self, user: UserId) -> Result<Subscription<Habit>> {
        self.store.subscribe_habits(user).await
    }

    async fn load(&self, id: Uuid) -> Result<Habit> {
        self.store
            .get_habit(id)
            .await?
            .ok_or(StoreError::NotFound(id))
    }
}
