//! Dashboard route handler.

use askama::Template;
use axum::{
    Router,
    extract::State,
    response::Html,
    routing::get,
};
use tower_sessions::Session;
use tracing::instrument;

use crate::api::{DashboardStats, Order, OrderQuery};
use crate::error::{Result, render};
use crate::filters;
use crate::middleware::RequireAdminAuth;
use crate::routes::recover;
use crate::state::AppState;
use crate::views::{AdminLayout, format_datetime};

/// Orders shown in the "recent orders" table.
const RECENT_ORDERS: u32 = 8;

/// Dashboard metrics.
#[derive(Debug, Clone)]
pub struct DashboardMetrics {
    pub orders: String,
    pub pending_orders: String,
    pub revenue: String,
    pub customers: String,
    pub products: String,
    pub low_stock: String,
}

impl From<&DashboardStats> for DashboardMetrics {
    fn from(stats: &DashboardStats) -> Self {
        Self {
            orders: stats.total_orders.to_string(),
            pending_orders: stats.pending_orders.to_string(),
            revenue: stats.total_revenue.to_string(),
            customers: stats.total_customers.to_string(),
            products: stats.total_products.to_string(),
            low_stock: stats.low_stock_products.to_string(),
        }
    }
}

/// Recent order view for dashboard.
#[derive(Debug, Clone)]
pub struct RecentOrderView {
    pub id: String,
    pub code: String,
    pub customer_name: String,
    pub total: String,
    pub status: String,
    pub status_class: String,
    pub placed_at: String,
}

impl From<&Order> for RecentOrderView {
    fn from(order: &Order) -> Self {
        Self {
            id: order.id.to_string(),
            code: order.code.clone(),
            customer_name: order.customer_name().to_string(),
            total: order.total.to_string(),
            status: order.status.label().to_string(),
            status_class: order.status.badge_class().to_string(),
            placed_at: format_datetime(&order.created_at),
        }
    }
}

/// Dashboard template.
#[derive(Template)]
#[template(path = "dashboard.html")]
pub struct DashboardTemplate {
    pub layout: AdminLayout,
    pub metrics: DashboardMetrics,
    pub recent_orders: Vec<RecentOrderView>,
    pub load_error: Option<String>,
}

/// Build the dashboard router.
pub fn router() -> Router<AppState> {
    Router::new().route("/", get(index))
}

/// Dashboard page handler.
///
/// GET /
#[instrument(skip_all, fields(admin_id = %admin.id))]
pub async fn index(
    RequireAdminAuth(admin): RequireAdminAuth,
    State(state): State<AppState>,
    session: Session,
) -> Result<Html<String>> {
    let recent_query = OrderQuery {
        page: 1,
        limit: RECENT_ORDERS,
        ..OrderQuery::default()
    };

    let (stats, orders) = tokio::join!(
        state.api().stats(&admin.token),
        state.api().list_orders(&admin.token, &recent_query),
    );
    let (stats, stats_error) = recover(stats, "dashboard stats")?;
    let (orders, orders_error) = recover(orders, "recent orders")?;

    let template = DashboardTemplate {
        layout: AdminLayout::load(&session, &admin, "/", "Dashboard").await,
        metrics: DashboardMetrics::from(&stats.unwrap_or_default()),
        recent_orders: orders
            .map(|page| page.items.iter().map(RecentOrderView::from).collect())
            .unwrap_or_default(),
        load_error: stats_error.or(orders_error),
    };

    render(&template)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::routing::get as stub_get;
    use marketline_core::Vnd;

    use super::*;
    use crate::api::tests::stub_backend;
    use crate::state::tests::{test_admin, test_session, test_state};

    #[test]
    fn test_metrics_format_revenue() {
        let stats = DashboardStats {
            total_orders: 120,
            total_revenue: Vnd::from_dong(15_250_000),
            ..DashboardStats::default()
        };
        let metrics = DashboardMetrics::from(&stats);
        assert_eq!(metrics.orders, "120");
        assert_eq!(metrics.revenue, "15.250.000 ₫");
        assert_eq!(metrics.low_stock, "0");
    }

    #[tokio::test]
    async fn test_dashboard_survives_failed_stats() {
        let backend = Router::new()
            .route(
                "/api/admin/stats",
                stub_get(|| async { axum::http::StatusCode::SERVICE_UNAVAILABLE }),
            )
            .route(
                "/api/admin/orders",
                stub_get(|| async {
                    axum::Json(serde_json::json!({
                        "items": [{
                            "id": 31,
                            "code": "ML-0031",
                            "shipping": { "full_name": "Pham Van An", "phone": "0900000000", "address": "2 Hai Ba Trung" },
                            "payment_method": "cod",
                            "status": "pending",
                            "subtotal": 200000,
                            "total": 230000,
                            "created_at": "2026-05-10T02:00:00Z"
                        }],
                        "page": 1,
                        "limit": 8,
                        "total": 1
                    }))
                }),
            );
        let state = test_state(stub_backend(backend).await);

        let Html(html) = index(RequireAdminAuth(test_admin()), State(state), test_session())
            .await
            .unwrap();
        assert!(html.contains("ML-0031"));
        assert!(html.contains("230.000 ₫"));
        assert!(html.contains("The backend is unavailable"));
    }
}
