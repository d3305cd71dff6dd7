//! View models shared by the admin templates.

use chrono::{DateTime, FixedOffset, Utc};
use tower_sessions::Session;
use url::form_urlencoded;
use validator::ValidationErrors;

use marketline_core::Pagination;

use crate::models::CurrentAdmin;
use crate::services::flash::{self, Flash};

/// Admin user view for templates.
#[derive(Debug, Clone)]
pub struct AdminUserView {
    pub name: String,
    pub email: String,
    pub initials: String,
}

impl From<&CurrentAdmin> for AdminUserView {
    fn from(admin: &CurrentAdmin) -> Self {
        Self {
            name: admin.name.clone(),
            email: admin.email.clone(),
            initials: initials(&admin.name),
        }
    }
}

/// Up to two uppercase initials for the avatar.
fn initials(name: &str) -> String {
    let words: Vec<&str> = name.split_whitespace().collect();
    let picked = match words.as_slice() {
        [] => Vec::new(),
        [only] => vec![*only],
        [first, .., last] => vec![*first, *last],
    };
    picked
        .iter()
        .filter_map(|word| word.chars().next())
        .flat_map(char::to_uppercase)
        .collect()
}

/// Sidebar, header and notices around every signed-in page.
#[derive(Debug, Clone)]
pub struct AdminLayout {
    pub title: String,
    pub admin_user: AdminUserView,
    pub current_path: String,
    pub flashes: Vec<Flash>,
}

impl AdminLayout {
    /// Gather the chrome for a page about to be rendered.
    ///
    /// Takes the queued notices, so call it only when the page is actually
    /// rendered.
    pub async fn load(
        session: &Session,
        admin: &CurrentAdmin,
        current_path: &str,
        title: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            admin_user: AdminUserView::from(admin),
            current_path: current_path.to_string(),
            flashes: flash::take(session).await,
        }
    }

    /// Whether a sidebar entry should be highlighted.
    #[must_use]
    pub fn is_active(&self, section: &str) -> bool {
        if section == "/" {
            return self.current_path == "/";
        }
        self.current_path == section
            || self
                .current_path
                .strip_prefix(section)
                .is_some_and(|rest| rest.starts_with('/'))
    }
}

/// Option for a select filter.
#[derive(Debug, Clone)]
pub struct FilterOption {
    pub value: String,
    pub label: String,
    pub selected: bool,
}

impl FilterOption {
    /// Create an option, selected when `value` equals `current`.
    #[must_use]
    pub fn new(value: impl Into<String>, label: impl Into<String>, current: &str) -> Self {
        let value = value.into();
        Self {
            selected: value == current,
            label: label.into(),
            value,
        }
    }
}

/// One numbered page link.
#[derive(Debug, Clone)]
pub struct PageLink {
    pub number: u32,
    pub url: String,
    pub current: bool,
}

/// Pagination controls under a table.
#[derive(Debug, Clone)]
pub struct PageLinks {
    pub prev: Option<String>,
    pub next: Option<String>,
    pub pages: Vec<PageLink>,
    pub summary: String,
}

impl PageLinks {
    /// Links for `pagination`, keeping the active filter `params`.
    #[must_use]
    pub fn new(pagination: &Pagination, path: &str, params: &[(&str, String)]) -> Self {
        let url = |page: u32| page_url(path, params, page);
        let total_pages = pagination.total_pages();

        Self {
            prev: pagination.has_prev().then(|| url(pagination.prev_page())),
            next: pagination.has_next().then(|| url(pagination.next_page())),
            pages: if total_pages > 1 {
                pagination
                    .window(3)
                    .into_iter()
                    .map(|number| PageLink {
                        number,
                        url: url(number),
                        current: number == pagination.page,
                    })
                    .collect()
            } else {
                Vec::new()
            },
            summary: format!(
                "Page {} of {} ({} total)",
                pagination.page.min(total_pages),
                total_pages,
                pagination.total
            ),
        }
    }
}

/// Listing URL for `page` with the non-empty filter `params`.
///
/// Also used as the `return_to` of row actions.
#[must_use]
pub fn page_url(path: &str, params: &[(&str, String)], page: u32) -> String {
    let mut query = form_urlencoded::Serializer::new(String::new());
    for (key, value) in params.iter().filter(|(_, value)| !value.is_empty()) {
        query.append_pair(key, value);
    }
    if page > 1 {
        query.append_pair("page", &page.to_string());
    }

    match query.finish() {
        query if query.is_empty() => path.to_string(),
        query => format!("{path}?{query}"),
    }
}

/// `dd/mm/yyyy hh:mm` in shop time (UTC+7).
#[must_use]
pub fn format_datetime(value: &DateTime<Utc>) -> String {
    FixedOffset::east_opt(7 * 3600).map_or_else(
        || value.format("%d/%m/%Y %H:%M").to_string(),
        |offset| value.with_timezone(&offset).format("%d/%m/%Y %H:%M").to_string(),
    )
}

/// Flatten validator errors into messages for the form alert.
///
/// Messages are ordered by field name so the alert is stable.
#[must_use]
pub fn validation_messages(errors: &ValidationErrors) -> Vec<String> {
    let mut messages: Vec<(String, String)> = errors
        .field_errors()
        .into_iter()
        .flat_map(|(field, errors)| {
            errors.iter().map(move |error| {
                let message = error.message.as_ref().map_or_else(
                    || format!("{} is invalid", field.replace('_', " ")),
                    ToString::to_string,
                );
                (field.to_string(), message)
            })
        })
        .collect();
    messages.sort_by(|a, b| a.0.cmp(&b.0));
    messages.into_iter().map(|(_, message)| message).collect()
}

/// Trim a form value, mapping blank input to `None`.
#[must_use]
pub fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

/// Current page from a query string value, defaulting to the first.
#[must_use]
pub fn page_or_first(page: Option<u32>) -> u32 {
    page.filter(|&p| p > 0).unwrap_or(1)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use validator::Validate;

    use super::*;
    use crate::state::tests::{test_admin, test_session};

    #[test]
    fn test_initials() {
        assert_eq!(initials("Vo Minh Chau"), "VC");
        assert_eq!(initials("lan"), "L");
        assert_eq!(initials("  "), "");
    }

    #[tokio::test]
    async fn test_layout_highlights_section() {
        let layout =
            AdminLayout::load(&test_session(), &test_admin(), "/products/4/edit", "Edit").await;

        assert!(layout.is_active("/products"));
        assert!(!layout.is_active("/"));
        assert!(!layout.is_active("/product"));
        assert_eq!(layout.admin_user.initials, "VC");
    }

    #[test]
    fn test_filter_option_selection() {
        assert!(FilterOption::new("pending", "Pending", "pending").selected);
        assert!(!FilterOption::new("shipping", "Shipping", "pending").selected);
    }

    #[test]
    fn test_page_links_keep_filters() {
        let links = PageLinks::new(
            &Pagination::new(2, 20, 90),
            "/orders",
            &[("status", "pending".to_string()), ("q", String::new())],
        );
        assert_eq!(links.prev.as_deref(), Some("/orders?status=pending"));
        assert_eq!(links.next.as_deref(), Some("/orders?status=pending&page=3"));
        assert_eq!(links.summary, "Page 2 of 5 (90 total)");
        assert!(links.pages.iter().any(|p| p.current && p.number == 2));
    }

    #[test]
    fn test_page_url_drops_blank_filters() {
        assert_eq!(
            page_url("/products", &[("q", "mug".to_string()), ("category_id", String::new())], 2),
            "/products?q=mug&page=2"
        );
        assert_eq!(page_url("/products", &[], 1), "/products");
    }

    #[test]
    fn test_single_page_has_no_numbers() {
        let links = PageLinks::new(&Pagination::new(1, 20, 4), "/invoices", &[]);
        assert!(links.pages.is_empty());
        assert!(links.prev.is_none() && links.next.is_none());
    }

    #[test]
    fn test_datetime_in_shop_time() {
        let value = "2026-01-31T18:15:00Z".parse::<DateTime<Utc>>().unwrap();
        assert_eq!(format_datetime(&value), "01/02/2026 01:15");
    }

    #[derive(Validate)]
    struct Sample {
        #[validate(length(min = 1, message = "Name is required"))]
        name: String,
        #[validate(range(min = 1))]
        amount: i64,
    }

    #[test]
    fn test_validation_messages_sorted_by_field() {
        let errors = Sample {
            name: String::new(),
            amount: 0,
        }
        .validate()
        .unwrap_err();
        assert_eq!(
            validation_messages(&errors),
            vec!["amount is invalid".to_string(), "Name is required".to_string()]
        );
    }

    #[test]
    fn test_page_or_first() {
        assert_eq!(page_or_first(None), 1);
        assert_eq!(page_or_first(Some(0)), 1);
        assert_eq!(page_or_first(Some(4)), 4);
    }
}
