//! Payment gateway return parameters.
//!
//! The gateway sends the browser back to `/result?status&orderId&refNum&
//! amount&reason`. Nothing in that query string is signed, so the parsed
//! value is display-only. The server-side callback is authoritative.

use serde::Deserialize;

use crate::types::phone::to_ascii_digits;
use crate::types::{OrderId, Toman};

/// Raw query parameters as sent by the gateway.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PaymentReturnQuery {
    pub status: Option<String>,
    #[serde(alias = "order_id")]
    pub order_id: Option<String>,
    #[serde(alias = "ref_num", alias = "RefNum")]
    pub ref_num: Option<String>,
    pub amount: Option<String>,
    pub reason: Option<String>,
}

/// Outcome reported by the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportedOutcome {
    Success,
    Failed,
    /// Present but not a value we know.
    Unrecognized(String),
    Missing,
}

impl ReportedOutcome {
    fn parse(raw: Option<&str>) -> Self {
        let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
            return Self::Missing;
        };
        match raw.to_ascii_lowercase().as_str() {
            "success" | "ok" | "paid" | "true" | "1" => Self::Success,
            "failed" | "failure" | "error" | "cancelled" | "canceled" | "false" | "0" => {
                Self::Failed
            }
            _ => Self::Unrecognized(raw.to_owned()),
        }
    }

    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Success => "Payment reported as successful",
            Self::Failed => "Payment reported as failed",
            Self::Unrecognized(_) | Self::Missing => "Payment result unknown",
        }
    }

    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

/// Parsed, unverified payment return.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentReturn {
    pub outcome: ReportedOutcome,
    pub order_id: Option<OrderId>,
    pub ref_num: Option<String>,
    /// Amount in Rial as reported by the gateway.
    pub amount_rial: Option<i64>,
    pub reason: Option<String>,
}

impl PaymentReturn {
    #[must_use]
    pub fn from_query(query: &PaymentReturnQuery) -> Self {
        Self {
            outcome: ReportedOutcome::parse(query.status.as_deref()),
            order_id: non_empty(query.order_id.as_deref()).map(OrderId::new),
            ref_num: non_empty(query.ref_num.as_deref()).map(str::to_owned),
            amount_rial: non_empty(query.amount.as_deref())
                .and_then(|amount| to_ascii_digits(amount).replace(',', "").parse().ok()),
            reason: non_empty(query.reason.as_deref()).map(str::to_owned),
        }
    }

    /// Reported amount converted back to Toman.
    #[must_use]
    pub fn amount_toman(&self) -> Option<Toman> {
        self.amount_rial.map(|rial| Toman::from_whole(rial / 10))
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_success() {
        let query = PaymentReturnQuery {
            status: Some("OK".to_owned()),
            order_id: Some("o-9".to_owned()),
            ref_num: Some("GmshtyjwKSu5".to_owned()),
            amount: Some("900000".to_owned()),
            reason: None,
        };
        let ret = PaymentReturn::from_query(&query);
        assert!(ret.outcome.is_success());
        assert_eq!(ret.order_id, Some(OrderId::new("o-9")));
        assert_eq!(ret.amount_toman(), Some(Toman::from_whole(90_000)));
    }

    #[test]
    fn test_parse_garbage() {
        let query = PaymentReturnQuery {
            status: Some("maybe".to_owned()),
            amount: Some("lots".to_owned()),
            order_id: Some("  ".to_owned()),
            ..PaymentReturnQuery::default()
        };
        let ret = PaymentReturn::from_query(&query);
        assert_eq!(ret.outcome, ReportedOutcome::Unrecognized("maybe".to_owned()));
        assert_eq!(ret.amount_rial, None);
        assert_eq!(ret.order_id, None);
    }

    #[test]
    fn test_missing_status() {
        let ret = PaymentReturn::from_query(&PaymentReturnQuery::default());
        assert_eq!(ret.outcome, ReportedOutcome::Missing);
        assert!(!ret.outcome.is_success());
    }
}
