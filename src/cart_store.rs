//! Client-side cart state for a browsing session.
//!
//! The store is an explicit object owned by the embedding application,
//! not module-level state. When a session exists the store is handed a
//! [`CartSyncer`] and every add is pushed to the server before local
//! state changes; without one it is a guest cart, purely in memory.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartEntry {
    pub product_id: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("cart sync request failed")]
    Request(#[from] reqwest::Error),

    #[error("cart sync rejected: {0}")]
    Rejected(String),
}

/// Capability to mirror cart additions to a server-side cart record.
#[async_trait]
pub trait CartSyncer: Send + Sync {
    async fn sync_add(&self, product_id: Uuid, quantity: i32) -> Result<(), SyncError>;
}

pub struct CartStore {
    items: Vec<CartEntry>,
    syncer: Option<Arc<dyn CartSyncer>>,
}

impl CartStore {
    /// A guest cart: never persisted, dropped with the session.
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            syncer: None,
        }
    }

    pub fn with_syncer(syncer: Arc<dyn CartSyncer>) -> Self {
        Self {
            items: Vec::new(),
            syncer: Some(syncer),
        }
    }

    /// Add a product, accumulating quantity if it is already present.
    /// The server is updated first; local state is untouched when the
    /// sync fails.
    pub async fn add(&mut self, product_id: Uuid, quantity: i32) -> Result<(), SyncError> {
        if let Some(syncer) = &self.syncer {
            syncer.sync_add(product_id, quantity).await?;
        }

        if let Some(entry) = self
            .items
            .iter_mut()
            .find(|entry| entry.product_id == product_id)
        {
            entry.quantity += quantity;
        } else {
            self.items.push(CartEntry {
                product_id,
                quantity,
            });
        }

        Ok(())
    }

    pub fn remove(&mut self, product_id: Uuid) {
        self.items.retain(|entry| entry.product_id != product_id);
    }

    /// Replace the quantity of an existing entry. Unknown products are
    /// ignored; the UI clamps quantities before calling.
    pub fn update_quantity(&mut self, product_id: Uuid, quantity: i32) {
        if let Some(entry) = self
            .items
            .iter_mut()
            .find(|entry| entry.product_id == product_id)
        {
            entry.quantity = quantity;
        }
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn items(&self) -> &[CartEntry] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl Default for CartStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Syncer that posts additions to the storefront API with a session token.
pub struct HttpCartSyncer {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl HttpCartSyncer {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            token: token.into(),
        }
    }
}

#[async_trait]
impl CartSyncer for HttpCartSyncer {
    async fn sync_add(&self, product_id: Uuid, quantity: i32) -> Result<(), SyncError> {
        let response = self
            .client
            .post(format!("{}/api/cart", self.base_url))
            .bearer_auth(&self.token)
            .json(&json!({ "productId": product_id, "quantity": quantity }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SyncError::Rejected(response.status().to_string()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct RecordingSyncer {
        calls: Mutex<Vec<(Uuid, i32)>>,
    }

    #[async_trait]
    impl CartSyncer for RecordingSyncer {
        async fn sync_add(&self, product_id: Uuid, quantity: i32) -> Result<(), SyncError> {
            self.calls.lock().unwrap().push((product_id, quantity));
            Ok(())
        }
    }

    struct FailingSyncer;

    #[async_trait]
    impl CartSyncer for FailingSyncer {
        async fn sync_add(&self, _product_id: Uuid, _quantity: i32) -> Result<(), SyncError> {
            Err(SyncError::Rejected("401 Unauthorized".into()))
        }
    }

    #[tokio::test]
    async fn add_accumulates_quantity_for_same_product() {
        let mut store = CartStore::new();
        let product = Uuid::new_v4();

        store.add(product, 2).await.unwrap();
        store.add(product, 3).await.unwrap();

        assert_eq!(store.items().len(), 1);
        assert_eq!(store.items()[0].quantity, 5);
    }

    #[tokio::test]
    async fn remove_and_update_and_clear() {
        let mut store = CartStore::new();
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();

        store.add(first, 1).await.unwrap();
        store.add(second, 4).await.unwrap();

        store.update_quantity(second, 2);
        assert_eq!(store.items()[1].quantity, 2);

        store.remove(first);
        assert_eq!(store.items().len(), 1);
        assert_eq!(store.items()[0].product_id, second);

        store.clear();
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn update_quantity_of_unknown_product_is_a_no_op() {
        let mut store = CartStore::new();
        store.update_quantity(Uuid::new_v4(), 3);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn add_pushes_to_syncer_before_local_state() {
        let syncer = Arc::new(RecordingSyncer {
            calls: Mutex::new(Vec::new()),
        });
        let mut store = CartStore::with_syncer(syncer.clone());
        let product = Uuid::new_v4();

        store.add(product, 2).await.unwrap();

        assert_eq!(syncer.calls.lock().unwrap().as_slice(), &[(product, 2)]);
        assert_eq!(store.items().len(), 1);
    }

    #[tokio::test]
    async fn failed_sync_leaves_local_state_untouched() {
        let mut store = CartStore::with_syncer(Arc::new(FailingSyncer));

        let result = store.add(Uuid::new_v4(), 1).await;

        assert!(result.is_err());
        assert!(store.is_empty());
    }
}
