//! Status enums for various entities.
//!
//! These are closed sets. A wire value outside the set is a deserialization
//! error; nothing falls back to a default variant.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

/// Order lifecycle status as reported by the API.
///
/// The API owns the transitions; this type only drives labels, badge colors
/// and the progress display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    PendingPayment,
    Paid,
    Processing,
    Preparing,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    /// Every status, in lifecycle order with `Cancelled` last.
    pub const ALL: [Self; 7] = [
        Self::PendingPayment,
        Self::Paid,
        Self::Processing,
        Self::Preparing,
        Self::Shipped,
        Self::Delivered,
        Self::Cancelled,
    ];

    /// Wire name (`pending_payment`, ...).
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::PendingPayment => "pending_payment",
            Self::Paid => "paid",
            Self::Processing => "processing",
            Self::Preparing => "preparing",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        }
    }

    /// Human-readable label.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::PendingPayment => "Awaiting payment",
            Self::Paid => "Paid",
            Self::Processing => "Processing",
            Self::Preparing => "Preparing",
            Self::Shipped => "Shipped",
            Self::Delivered => "Delivered",
            Self::Cancelled => "Cancelled",
        }
    }

    /// CSS classes for the status badge.
    #[must_use]
    pub const fn badge_class(&self) -> &'static str {
        match self {
            Self::PendingPayment => "bg-yellow-100 text-yellow-800",
            Self::Paid => "bg-blue-100 text-blue-800",
            Self::Processing | Self::Preparing => "bg-indigo-100 text-indigo-800",
            Self::Shipped => "bg-purple-100 text-purple-800",
            Self::Delivered => "bg-green-100 text-green-800",
            Self::Cancelled => "bg-red-100 text-red-800",
        }
    }

    /// Whether the order can still be cancelled from the back-office.
    #[must_use]
    pub const fn is_cancellable(&self) -> bool {
        matches!(
            self,
            Self::PendingPayment | Self::Paid | Self::Processing | Self::Preparing
        )
    }

    /// Whether the customer can still pay for the order.
    #[must_use]
    pub const fn awaits_payment(&self) -> bool {
        matches!(self, Self::PendingPayment)
    }

    /// Whether a tracking code is meaningful for this status.
    #[must_use]
    pub const fn accepts_tracking_code(&self) -> bool {
        matches!(self, Self::Shipped | Self::Delivered)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("invalid order status: {s}"))
    }
}

/// Admin role with different permission levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdminRole {
    /// Full access including destructive content operations.
    SuperAdmin,
    /// Full access to orders, products and content.
    Admin,
    /// Read-only access.
    Viewer,
}

impl AdminRole {
    /// Whether the role may change orders, products or banners.
    #[must_use]
    pub const fn can_write(&self) -> bool {
        matches!(self, Self::SuperAdmin | Self::Admin)
    }
}

impl fmt::Display for AdminRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SuperAdmin => write!(f, "super_admin"),
            Self::Admin => write!(f, "admin"),
            Self::Viewer => write!(f, "viewer"),
        }
    }
}

impl FromStr for AdminRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "super_admin" | "superadmin" => Ok(Self::SuperAdmin),
            "admin" => Ok(Self::Admin),
            "viewer" => Ok(Self::Viewer),
            _ => Err(format!("invalid admin role: {s}")),
        }
    }
}

/// The three banner collections managed from the back-office.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BannerKind {
    /// Home page hero slider.
    Sliders,
    /// Small promotional banners.
    SmallBanners,
    /// Banners shown between product rows.
    ProductsBanners,
}

impl BannerKind {
    /// Path segment used both by the API and the admin routes.
    #[must_use]
    pub const fn slug(&self) -> &'static str {
        match self {
            Self::Sliders => "sliders",
            Self::SmallBanners => "small-banners",
            Self::ProductsBanners => "products-banners",
        }
    }

    /// Page title.
    #[must_use]
    pub const fn title(&self) -> &'static str {
        match self {
            Self::Sliders => "Sliders",
            Self::SmallBanners => "Small banners",
            Self::ProductsBanners => "Products banners",
        }
    }
}

impl FromStr for BannerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sliders" => Ok(Self::Sliders),
            "small-banners" => Ok(Self::SmallBanners),
            "products-banners" => Ok(Self::ProductsBanners),
            _ => Err(format!("invalid banner kind: {s}")),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_order_status_wire_names() {
        for status in OrderStatus::ALL {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.as_str()));
            assert_eq!(status.as_str().parse::<OrderStatus>().unwrap(), status);
        }
    }

    #[test]
    fn test_unknown_order_status_is_rejected() {
        assert!(serde_json::from_str::<OrderStatus>("\"refunded\"").is_err());
        assert!("refunded".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn test_cancellable() {
        assert!(OrderStatus::Paid.is_cancellable());
        assert!(!OrderStatus::Shipped.is_cancellable());
        assert!(!OrderStatus::Cancelled.is_cancellable());
    }

    #[test]
    fn test_admin_role_roundtrip() {
        assert_eq!("admin".parse::<AdminRole>().unwrap(), AdminRole::Admin);
        assert_eq!(AdminRole::SuperAdmin.to_string(), "super_admin");
        assert!("owner".parse::<AdminRole>().is_err());
        assert!(!AdminRole::Viewer.can_write());
    }

    #[test]
    fn test_banner_kind_slug() {
        assert_eq!(BannerKind::SmallBanners.slug(), "small-banners");
        assert_eq!(
            "products-banners".parse::<BannerKind>().unwrap(),
            BannerKind::ProductsBanners
        );
        assert_eq!(
            serde_json::to_string(&BannerKind::Sliders).unwrap(),
            "\"sliders\""
        );
    }
}
