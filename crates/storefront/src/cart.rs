//! Cart store with change notifications.
//!
//! One snapshot per session, keyed by the session's cart key. Every path
//! that changes a cart (sign-in, add/update/remove, explicit refresh, cart
//! page view) ends in [`CartStore::refresh`], which refetches the whole cart
//! from the API and publishes a [`CartEvent`]. Pages subscribe through
//! `GET /cart/events`.
//!
//! Concurrent refreshes for the same key both run; whichever finishes last
//! overwrites the snapshot. Empty carts are not stored, and a snapshot
//! nobody reads lapses together with its session.

use std::sync::Arc;
use std::time::Duration;

use kala_core::CartSnapshot;
use moka::future::Cache;
use secrecy::SecretString;
use tokio::sync::broadcast;
use tracing::instrument;

use crate::api::ApiClient;
use crate::middleware::SESSION_EXPIRY_SECONDS;

/// Buffered events per subscriber before it starts lagging.
const EVENT_CAPACITY: usize = 64;

/// A change to one session's cart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CartEvent {
    /// A fresh snapshot was stored.
    Updated { key: String, count: u32 },
    /// The cart was dropped (logout).
    Cleared { key: String },
}

impl CartEvent {
    /// Cart key the event belongs to.
    #[must_use]
    pub fn key(&self) -> &str {
        match self {
            Self::Updated { key, .. } | Self::Cleared { key } => key,
        }
    }

    /// Item count after the change.
    #[must_use]
    pub const fn count(&self) -> u32 {
        match self {
            Self::Updated { count, .. } => *count,
            Self::Cleared { .. } => 0,
        }
    }
}

/// Shared cart snapshots plus a broadcast channel of changes.
#[derive(Clone)]
pub struct CartStore {
    inner: Arc<CartStoreInner>,
}

struct CartStoreInner {
    api: ApiClient,
    snapshots: Cache<String, CartSnapshot>,
    events: broadcast::Sender<CartEvent>,
}

impl CartStore {
    #[must_use]
    pub fn new(api: ApiClient) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(CartStoreInner {
                api,
                snapshots: Cache::builder()
                    .max_capacity(100_000)
                    .time_to_idle(Duration::from_secs(SESSION_EXPIRY_SECONDS.unsigned_abs()))
                    .build(),
                events,
            }),
        }
    }

    /// Refetch the cart and replace the stored snapshot.
    ///
    /// A guest (no token) or a failed fetch yields the empty snapshot.
    #[instrument(skip(self, token))]
    pub async fn refresh(&self, key: &str, token: Option<&SecretString>) -> CartSnapshot {
        let snapshot = match token {
            Some(token) => match self.inner.api.get_cart(token).await {
                Ok(cart) => CartSnapshot::from_cart(cart),
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to fetch cart");
                    CartSnapshot::empty()
                }
            },
            None => CartSnapshot::empty(),
        };

        self.store(key, snapshot.clone()).await;
        snapshot
    }

    /// Replace the snapshot for `key` and notify subscribers.
    pub async fn store(&self, key: &str, snapshot: CartSnapshot) {
        let count = snapshot.count;
        if snapshot.is_empty() {
            self.inner.snapshots.invalidate(key).await;
        } else {
            self.inner.snapshots.insert(key.to_owned(), snapshot).await;
        }
        self.publish(CartEvent::Updated {
            key: key.to_owned(),
            count,
        });
    }

    /// Drop the snapshot for `key`.
    pub async fn clear(&self, key: &str) {
        self.inner.snapshots.invalidate(key).await;
        self.publish(CartEvent::Cleared {
            key: key.to_owned(),
        });
    }

    /// The last stored snapshot, or the empty cart.
    pub async fn snapshot(&self, key: &str) -> CartSnapshot {
        self.inner.snapshots.get(key).await.unwrap_or_default()
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<CartEvent> {
        self.inner.events.subscribe()
    }

    fn publish(&self, event: CartEvent) {
        // No subscribers is not an error
        let _ = self.inner.events.send(event);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use axum::routing::get;
    use axum::{Json, Router};
    use kala_core::Toman;
    use kala_core::models::{Cart, CartItem};
    use serde_json::json;

    use super::*;
    use crate::config::{ApiConfig, parse_base_url};

    fn offline_store() -> CartStore {
        // Nothing listens on port 9; only used where no request is made
        let api = ApiClient::new(&ApiConfig {
            base_url: parse_base_url("http://127.0.0.1:9/").unwrap(),
            timeout: Duration::from_millis(200),
        })
        .unwrap();
        CartStore::new(api)
    }

    fn snapshot(quantity: u32) -> CartSnapshot {
        let cart: Cart = serde_json::from_value(json!({
            "items": [{"id": "c1", "productId": "p1", "quantity": quantity, "price": 1000}]
        }))
        .unwrap();
        CartSnapshot::from_cart(cart)
    }

    #[tokio::test]
    async fn test_last_write_wins() {
        let store = offline_store();
        store.store("k", snapshot(1)).await;
        store.store("k", snapshot(3)).await;
        assert_eq!(store.snapshot("k").await.count, 3);
    }

    #[tokio::test]
    async fn test_subscribers_see_updates_and_clear() {
        let store = offline_store();
        let mut rx = store.subscribe();

        store.store("k", snapshot(2)).await;
        store.clear("k").await;

        assert_eq!(
            rx.recv().await.unwrap(),
            CartEvent::Updated {
                key: "k".to_owned(),
                count: 2
            }
        );
        let cleared = rx.recv().await.unwrap();
        assert_eq!(cleared.key(), "k");
        assert_eq!(cleared.count(), 0);
        assert!(store.snapshot("k").await.is_empty());
    }

    #[tokio::test]
    async fn test_guest_refresh_is_empty() {
        let store = offline_store();
        store.store("k", snapshot(2)).await;
        let refreshed = store.refresh("k", None).await;
        assert_eq!(refreshed, CartSnapshot::empty());
        assert_eq!(store.snapshot("k").await.count, 0);
    }

    #[tokio::test]
    async fn test_guest_sessions_hold_nothing() {
        let store = offline_store();
        for i in 0..1_000 {
            store.refresh(&format!("guest-{i}"), None).await;
        }
        store.store("k", snapshot(1)).await;

        store.inner.snapshots.run_pending_tasks().await;
        assert_eq!(store.inner.snapshots.entry_count(), 1);
    }

    #[tokio::test]
    async fn test_failed_fetch_is_empty() {
        let store = offline_store();
        let refreshed = store
            .refresh("k", Some(&SecretString::from("token")))
            .await;
        assert_eq!(refreshed.count, 0);
        assert_eq!(refreshed.total, Toman::ZERO);
        assert!(refreshed.items.is_empty());
    }

    #[tokio::test]
    async fn test_refresh_fetches_cart() {
        let app = Router::new().route(
            "/cart",
            get(|| async {
                Json(json!({"success": true, "data": {
                    "items": [
                        {"id": "a", "productId": "p1", "quantity": 2, "price": 5000},
                        {"id": "b", "productId": "p2", "quantity": 1, "price": 2000}
                    ],
                    "summary": {"payable": 11000}
                }}))
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

        let api = ApiClient::new(&ApiConfig {
            base_url: parse_base_url(&format!("http://{addr}")).unwrap(),
            timeout: Duration::from_secs(5),
        })
        .unwrap();
        let store = CartStore::new(api);

        let snapshot = store
            .refresh("k", Some(&SecretString::from("token")))
            .await;
        assert_eq!(snapshot.count, 3);
        assert_eq!(snapshot.total, Toman::from_whole(11_000));
        assert_eq!(
            snapshot.items.iter().map(CartItem::line_total).sum::<Toman>(),
            Toman::from_whole(12_000)
        );
    }
}
