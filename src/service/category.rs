use std::sync::Arc;

use uuid::Uuid;

use crate::auth::UserId;
use crate::core::category::{Category, NewCategory};
use crate::store::{CategoryStore, Result, StoreError, Subscription};

pub struct CategoryService {
    store: Arc<dyn CategoryStore>,
}

impl CategoryService {
    pub fn new(store: Arc<dyn CategoryStore>) -> Self {
        Self { store }
    }

    pub async fn add(&self, user: UserId, name: &str, color: &str) -> Result<Category> {
        let name = name.trim();
        if name.is_empty() {
            return Err(StoreError::invalid("category name is empty"));
        }
        self.store
            .create_category(NewCategory::new(user, name, color))
            .await
    }

    /// Remove the category. Tasks filed under it are left alone and render
    /// uncategorized from then on.
    pub async fn remove(&self, id: Uuid) -> Result<()> {
        self.store.delete_category(id).await
    }

    pub async fn subscribe(&self, user: UserId) -> Result<Subscription<Category>> {
        self.store.subscribe_categories(user).await
    }
}
