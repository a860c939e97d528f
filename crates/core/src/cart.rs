//! Cart snapshot.
//!
//! Rebuilt wholesale from `GET /cart` on each refresh. No merge or diff
//! with the previous snapshot.

use serde::Serialize;

use crate::models::{Cart, CartItem};
use crate::types::Toman;

/// What the page tree sees of the cart.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CartSnapshot {
    pub items: Vec<CartItem>,
    pub total: Toman,
    /// Sum of item quantities.
    pub count: u32,
}

impl CartSnapshot {
    /// The empty cart; also what a failed fetch yields.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build from an API cart.
    ///
    /// The total prefers the API's payable summary, then its subtotal, and
    /// only falls back to summing lines when both are zero.
    #[must_use]
    pub fn from_cart(cart: Cart) -> Self {
        let count = cart
            .items
            .iter()
            .fold(0_u32, |acc, item| acc.saturating_add(item.quantity));

        let total = cart
            .summary
            .map(|s| s.payable)
            .filter(|t| *t > Toman::ZERO)
            .or_else(|| Some(cart.subtotal).filter(|t| *t > Toman::ZERO))
            .unwrap_or_else(|| cart.items.iter().map(CartItem::line_total).sum());

        Self {
            items: cart.items,
            total,
            count,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_count_is_sum_of_quantities() {
        let cart: Cart = serde_json::from_value(json!({
            "items": [
                {"_id": "c1", "productId": "p1", "quantity": 2, "price": 10000},
                {"_id": "c2", "productId": "p2", "quantity": 3, "price": 5000}
            ],
            "subtotal": 35000
        }))
        .unwrap();
        let snapshot = CartSnapshot::from_cart(cart);
        assert_eq!(snapshot.count, 5);
        assert_eq!(snapshot.total, Toman::from_whole(35_000));
    }

    #[test]
    fn test_total_prefers_summary() {
        let cart: Cart = serde_json::from_value(json!({
            "items": [{"id": 1, "product": 7, "quantity": 1, "price": 10000}],
            "subtotal": 10000,
            "summary": {"payable": 8000}
        }))
        .unwrap();
        assert_eq!(CartSnapshot::from_cart(cart).total, Toman::from_whole(8_000));
    }

    #[test]
    fn test_total_falls_back_to_lines() {
        let cart: Cart = serde_json::from_value(json!({
            "items": [{"id": 1, "productId": 7, "quantity": 4, "price": 2500}]
        }))
        .unwrap();
        assert_eq!(CartSnapshot::from_cart(cart).total, Toman::from_whole(10_000));
    }

    #[test]
    fn test_empty_cart() {
        let snapshot = CartSnapshot::from_cart(Cart::default());
        assert_eq!(snapshot, CartSnapshot::empty());
        assert_eq!(snapshot.count, 0);
        assert_eq!(snapshot.total, Toman::ZERO);
        assert!(snapshot.items.is_empty());
    }
}
