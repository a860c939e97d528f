//! Order progress view-model.
//!
//! Maps an order's status and per-stage timestamps to the five-step
//! progress display on the order page. Recomputed on every render from the
//! latest fetched order; nothing is stored.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::Order;
use crate::types::OrderStatus;

/// The five displayed stages, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Placed,
    Paid,
    Preparing,
    Shipped,
    Delivered,
}

impl Stage {
    pub const ALL: [Self; 5] = [
        Self::Placed,
        Self::Paid,
        Self::Preparing,
        Self::Shipped,
        Self::Delivered,
    ];

    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Placed => "Order placed",
            Self::Paid => "Payment confirmed",
            Self::Preparing => "Preparing",
            Self::Shipped => "Shipped",
            Self::Delivered => "Delivered",
        }
    }

    fn timestamp(self, order: &Order) -> Option<DateTime<Utc>> {
        match self {
            Self::Placed => order.created_at,
            Self::Paid => order.paid_at,
            Self::Preparing => order.preparing_at,
            Self::Shipped => order.shipped_at,
            Self::Delivered => order.delivered_at,
        }
    }
}

/// Display state of a single stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepState {
    Completed,
    Current,
    Pending,
    Cancelled,
}

impl StepState {
    /// CSS class for the step node.
    #[must_use]
    pub const fn css_class(&self) -> &'static str {
        match self {
            Self::Completed => "step-completed",
            Self::Current => "step-current",
            Self::Pending => "step-pending",
            Self::Cancelled => "step-cancelled",
        }
    }
}

/// One rendered stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Step {
    pub stage: Stage,
    pub state: StepState,
    pub at: Option<DateTime<Utc>>,
}

/// Position of a status on the stage line.
///
/// `None` for `Cancelled`, which has no position.
#[must_use]
pub const fn stage_index(status: OrderStatus) -> Option<usize> {
    match status {
        OrderStatus::PendingPayment => Some(0),
        OrderStatus::Paid => Some(1),
        OrderStatus::Processing | OrderStatus::Preparing => Some(2),
        OrderStatus::Shipped => Some(3),
        OrderStatus::Delivered => Some(4),
        OrderStatus::Cancelled => None,
    }
}

/// Whether reaching `status` means the stage at its index has happened,
/// as opposed to being in progress.
const fn stage_done(status: OrderStatus) -> bool {
    match status {
        OrderStatus::Paid | OrderStatus::Shipped | OrderStatus::Delivered => true,
        OrderStatus::PendingPayment
        | OrderStatus::Processing
        | OrderStatus::Preparing
        | OrderStatus::Cancelled => false,
    }
}

/// Progress of an order along the five stages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderProgress {
    pub status: OrderStatus,
    pub steps: Vec<Step>,
    /// Index of the current node; `None` when cancelled.
    pub current_index: Option<usize>,
    /// Number of `Completed` steps.
    pub completed_count: usize,
    /// Position of the current node along the whole five-node track,
    /// 0..=100: `current_index / 4`, so `shipped` is 75 and `delivered` 100.
    ///
    /// This is not the line fill. The fill between reached nodes is
    /// [`reached_fraction`](Self::reached_fraction), which is 4/4 (100%)
    /// for `shipped`.
    pub percent: u8,
}

impl OrderProgress {
    /// Build the progress for a fetched order.
    #[must_use]
    pub fn for_order(order: &Order) -> Self {
        Self::build(order.status, |stage| stage.timestamp(order))
    }

    /// Build the progress from a status alone.
    #[must_use]
    pub fn for_status(status: OrderStatus) -> Self {
        Self::build(status, |_| None)
    }

    fn build(status: OrderStatus, at: impl Fn(Stage) -> Option<DateTime<Utc>>) -> Self {
        let index = stage_index(status);
        let last = Stage::ALL.len() - 1;

        let steps: Vec<Step> = Stage::ALL
            .into_iter()
            .enumerate()
            .map(|(i, stage)| {
                let state = match index {
                    None => StepState::Cancelled,
                    Some(current) if i < current => StepState::Completed,
                    Some(current) if i == current && stage_done(status) => StepState::Completed,
                    Some(current) if i == current => StepState::Current,
                    Some(_) => StepState::Pending,
                };
                Step {
                    stage,
                    state,
                    at: at(stage),
                }
            })
            .collect();

        let completed_count = steps
            .iter()
            .filter(|s| s.state == StepState::Completed)
            .count();

        let percent = index.map_or(0, |i| {
            u8::try_from(i * 100 / last).unwrap_or(100)
        });

        Self {
            status,
            steps,
            current_index: index,
            completed_count,
            percent,
        }
    }

    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        self.current_index.is_none()
    }

    /// Completed nodes over nodes up to and including the current one,
    /// as `(numerator, denominator)`. `(0, 0)` when cancelled.
    #[must_use]
    pub fn reached_fraction(&self) -> (usize, usize) {
        self.current_index
            .map_or((0, 0), |i| (self.completed_count, i + 1))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::types::{OrderId, Toman};

    fn states(progress: &OrderProgress) -> Vec<StepState> {
        progress.steps.iter().map(|s| s.state).collect()
    }

    fn order(status: OrderStatus) -> Order {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
        Order {
            id: OrderId::new("o-1"),
            order_number: None,
            status,
            items: Vec::new(),
            total_price: Toman::from_whole(10_000),
            shipping_cost: Toman::ZERO,
            discount: Toman::ZERO,
            payable: None,
            tracking_code: None,
            address: None,
            customer: None,
            created_at: Some(at),
            paid_at: Some(at),
            preparing_at: Some(at),
            shipped_at: Some(at),
            delivered_at: None,
            cancelled_at: None,
        }
    }

    #[test]
    fn test_shipped() {
        let progress = OrderProgress::for_status(OrderStatus::Shipped);
        assert_eq!(
            states(&progress),
            vec![
                StepState::Completed,
                StepState::Completed,
                StepState::Completed,
                StepState::Completed,
                StepState::Pending,
            ]
        );
        // Every reached node is done: the line is full up to "shipped"
        assert_eq!(progress.reached_fraction(), (4, 4));
        // ...which sits three quarters along the track
        assert_eq!(progress.percent, 75);
    }

    #[test]
    fn test_cancelled_ignores_timestamps() {
        let progress = OrderProgress::for_order(&order(OrderStatus::Cancelled));
        assert!(progress.is_cancelled());
        assert!(
            progress
                .steps
                .iter()
                .all(|s| s.state == StepState::Cancelled)
        );
        assert_eq!(progress.percent, 0);
        assert_eq!(progress.reached_fraction(), (0, 0));
    }

    #[test]
    fn test_pending_payment_is_current() {
        let progress = OrderProgress::for_status(OrderStatus::PendingPayment);
        assert_eq!(progress.steps[0].state, StepState::Current);
        assert_eq!(progress.steps[1].state, StepState::Pending);
        assert_eq!(progress.completed_count, 0);
    }

    #[test]
    fn test_processing_and_preparing_share_a_stage() {
        for status in [OrderStatus::Processing, OrderStatus::Preparing] {
            let progress = OrderProgress::for_status(status);
            assert_eq!(progress.current_index, Some(2));
            assert_eq!(progress.steps[2].state, StepState::Current);
            assert_eq!(progress.percent, 50);
        }
    }

    #[test]
    fn test_delivered_is_complete() {
        let progress = OrderProgress::for_status(OrderStatus::Delivered);
        assert!(progress.steps.iter().all(|s| s.state == StepState::Completed));
        assert_eq!(progress.percent, 100);
        assert_eq!(progress.reached_fraction(), (5, 5));
    }

    #[test]
    fn test_timestamps_attached() {
        let progress = OrderProgress::for_order(&order(OrderStatus::Shipped));
        assert!(progress.steps[3].at.is_some());
        assert!(progress.steps[4].at.is_none());
    }
}
