//! In-memory stores used when no database is configured, and by tests.

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::database::error::DatabaseError;
use crate::database::repository::{
    OrderMutation, OrderStore, ProductCatalog, UpdatedOrder, UserDirectory,
};
use crate::orders::types::{NewOrder, Order, OrderStatus, Product, User};

/// Thread-safe in-memory order store.
///
/// Each order sits behind its own mutex so updates to one order serialize
/// without blocking the rest of the map.
#[derive(Default, Clone)]
pub struct InMemoryOrderStore {
    orders: Arc<RwLock<HashMap<Uuid, Arc<Mutex<Order>>>>>,
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.orders.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.orders.read().await.is_empty()
    }

    async fn snapshot(&self) -> Vec<Order> {
        let entries: Vec<Arc<Mutex<Order>>> = {
            let orders = self.orders.read().await;
            orders.values().cloned().collect()
        };

        let mut snapshot = Vec::with_capacity(entries.len());
        for entry in entries {
            snapshot.push(entry.lock().await.clone());
        }
        snapshot.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        snapshot
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn save(&self, order: NewOrder) -> Result<Order, DatabaseError> {
        let order = order.into_order(Uuid::new_v4());
        let mut orders = self.orders.write().await;
        orders.insert(order.id, Arc::new(Mutex::new(order.clone())));
        Ok(order)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Order>, DatabaseError> {
        let entry = self.orders.read().await.get(&id).cloned();
        match entry {
            Some(entry) => Ok(Some(entry.lock().await.clone())),
            None => Ok(None),
        }
    }

    async fn update_by_id(
        &self,
        id: Uuid,
        mutation: OrderMutation,
    ) -> Result<Option<UpdatedOrder>, DatabaseError> {
        let entry = match self.orders.read().await.get(&id).cloned() {
            Some(entry) => entry,
            None => return Ok(None),
        };

        let mut order = entry.lock().await;
        let applied = match mutation(&*order) {
            Some(patch) => {
                order.apply_patch(&patch);
                true
            }
            None => false,
        };

        Ok(Some(UpdatedOrder {
            order: order.clone(),
            applied,
        }))
    }

    async fn find_all(&self) -> Result<Vec<Order>, DatabaseError> {
        Ok(self.snapshot().await)
    }

    async fn find_by_status(&self, statuses: &[OrderStatus]) -> Result<Vec<Order>, DatabaseError> {
        Ok(self
            .snapshot()
            .await
            .into_iter()
            .filter(|order| statuses.contains(&order.order_status))
            .collect())
    }
}

/// Seed document accepted by [`InMemoryCatalog::from_seed_json`].
#[derive(Debug, Default, Deserialize)]
pub struct CatalogSeed {
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub products: Vec<Product>,
}

/// In-memory user directory and product catalog.
#[derive(Default, Clone)]
pub struct InMemoryCatalog {
    users: Arc<RwLock<HashMap<String, User>>>,
    products: Arc<RwLock<HashMap<String, Product>>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_seed(seed: CatalogSeed) -> Self {
        let users = seed
            .users
            .into_iter()
            .map(|user| (user.id.clone(), user))
            .collect();
        let products = seed
            .products
            .into_iter()
            .map(|product| (product.id.clone(), product))
            .collect();
        Self {
            users: Arc::new(RwLock::new(users)),
            products: Arc::new(RwLock::new(products)),
        }
    }

    pub fn from_seed_json(raw: &str) -> Result<Self, serde_json::Error> {
        let seed: CatalogSeed = serde_json::from_str(raw)?;
        Ok(Self::from_seed(seed))
    }

    pub async fn insert_user(&self, user: User) {
        self.users.write().await.insert(user.id.clone(), user);
    }

    /// Inserts or replaces a product. Existing orders keep their snapshots.
    pub async fn upsert_product(&self, product: Product) {
        self.products
            .write()
            .await
            .insert(product.id.clone(), product);
    }

    pub async fn counts(&self) -> (usize, usize) {
        (
            self.users.read().await.len(),
            self.products.read().await.len(),
        )
    }
}

#[async_trait]
impl UserDirectory for InMemoryCatalog {
    async fn find_user_by_id(&self, id: &str) -> Result<Option<User>, DatabaseError> {
        Ok(self.users.read().await.get(id).cloned())
    }
}

#[async_trait]
impl ProductCatalog for InMemoryCatalog {
    async fn find_product_by_id(&self, id: &str) -> Result<Option<Product>, DatabaseError> {
        Ok(self.products.read().await.get(id).cloned())
    }
}
