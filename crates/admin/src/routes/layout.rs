//! Shared page chrome: navigation, signed-in admin and flash message.

use kala_core::{AdminRole, BannerKind, Pagination};
use tower_sessions::Session;

use crate::middleware::take_flash;
use crate::models::CurrentAdmin;

/// Page numbers shown in the pager.
const PAGE_WINDOW: u32 = 7;

/// Signed-in admin as shown in the header.
#[derive(Clone)]
pub struct AdminView {
    pub username: String,
    pub role_label: &'static str,
    pub can_write: bool,
    pub is_super_admin: bool,
}

impl From<&CurrentAdmin> for AdminView {
    fn from(admin: &CurrentAdmin) -> Self {
        Self {
            username: admin.username.clone(),
            role_label: match admin.role {
                AdminRole::SuperAdmin => "Super admin",
                AdminRole::Admin => "Admin",
                AdminRole::Viewer => "Viewer",
            },
            can_write: admin.role.can_write(),
            is_super_admin: admin.role == AdminRole::SuperAdmin,
        }
    }
}

/// A sidebar link.
#[derive(Clone)]
pub struct NavLink {
    pub href: String,
    pub label: &'static str,
    pub active: bool,
}

/// Header and sidebar state plus the one-shot flash message.
#[derive(Clone, Default)]
pub struct Layout {
    pub admin: Option<AdminView>,
    pub nav: Vec<NavLink>,
    pub flash: Option<String>,
}

impl Layout {
    /// Build the layout for `current_path`, consuming any queued flash message.
    pub async fn load(session: &Session, admin: Option<&CurrentAdmin>, current_path: &str) -> Self {
        Self {
            admin: admin.map(AdminView::from),
            nav: admin.map(|_| nav_links(current_path)).unwrap_or_default(),
            flash: take_flash(session).await,
        }
    }

    /// Whether the signed-in admin may change data.
    #[must_use]
    pub fn can_write(&self) -> bool {
        self.admin.as_ref().is_some_and(|a| a.can_write)
    }

    #[must_use]
    pub fn is_super_admin(&self) -> bool {
        self.admin.as_ref().is_some_and(|a| a.is_super_admin)
    }
}

fn nav_links(current_path: &str) -> Vec<NavLink> {
    let mut links = vec![
        ("/".to_owned(), "Dashboard"),
        ("/orders".to_owned(), "Orders"),
        ("/products".to_owned(), "Products"),
    ];
    links.extend(
        [
            BannerKind::Sliders,
            BannerKind::SmallBanners,
            BannerKind::ProductsBanners,
        ]
        .map(|kind| (format!("/banners/{}", kind.slug()), kind.title())),
    );

    links
        .into_iter()
        .map(|(href, label)| NavLink {
            active: if href == "/" {
                current_path == "/"
            } else {
                current_path == href || current_path.starts_with(&format!("{href}/"))
            },
            href,
            label,
        })
        .collect()
}

/// A numbered pager link.
#[derive(Clone)]
pub struct PageLink {
    pub number: u32,
    pub href: String,
    pub current: bool,
}

/// Pager display data.
#[derive(Clone)]
pub struct PagerView {
    pub links: Vec<PageLink>,
    pub prev_href: Option<String>,
    pub next_href: Option<String>,
    pub summary: String,
}

impl PagerView {
    /// Pager for `base` keeping `extra` query pairs. `None` for a single page.
    #[must_use]
    pub fn build(pagination: &Pagination, base: &str, extra: &[(&str, &str)]) -> Option<Self> {
        if pagination.total_pages <= 1 {
            return None;
        }
        let href = |page: u32| {
            let mut query = url::form_urlencoded::Serializer::new(String::new());
            query.extend_pairs(extra.iter().copied().filter(|(_, v)| !v.is_empty()));
            query.append_pair("page", &page.to_string());
            format!("{base}?{}", query.finish())
        };

        Some(Self {
            links: pagination
                .window(PAGE_WINDOW)
                .into_iter()
                .map(|number| PageLink {
                    number,
                    href: href(number),
                    current: number == pagination.page,
                })
                .collect(),
            prev_href: pagination.prev_page().map(href),
            next_href: pagination.next_page().map(href),
            summary: format!("{} results", pagination.total),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_nav_marks_section() {
        let links = nav_links("/orders/o1");
        let active: Vec<_> = links.iter().filter(|l| l.active).map(|l| l.label).collect();
        assert_eq!(active, ["Orders"]);

        let links = nav_links("/");
        assert!(links[0].active);
        assert_eq!(links.iter().filter(|l| l.active).count(), 1);
        assert_eq!(links[4].href, "/banners/small-banners");
    }

    #[test]
    fn test_pager_keeps_filters() {
        let pagination = Pagination::new(2, 20, 45);
        let pager = PagerView::build(&pagination, "/orders", &[("status", "paid"), ("search", "")])
            .unwrap();
        assert_eq!(pager.prev_href.as_deref(), Some("/orders?status=paid&page=1"));
        assert_eq!(pager.next_href.as_deref(), Some("/orders?status=paid&page=3"));
        assert!(PagerView::build(&Pagination::new(1, 20, 5), "/orders", &[]).is_none());
    }
}
