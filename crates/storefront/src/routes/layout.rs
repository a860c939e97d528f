//! Data every full page needs for the shared header.

use tower_sessions::Session;

use crate::middleware::take_flash;
use crate::models::CurrentCustomer;

/// Header state plus the one-shot flash message.
#[derive(Clone, Default)]
pub struct Layout {
    pub signed_in: bool,
    pub flash: Option<String>,
}

impl Layout {
    /// Build the layout, consuming any queued flash message.
    pub async fn load(session: &Session, customer: Option<&CurrentCustomer>) -> Self {
        Self {
            signed_in: customer.is_some(),
            flash: take_flash(session).await,
        }
    }
}
