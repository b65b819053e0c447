//! Order history route handlers.
//!
//! These routes require authentication; orders are read-only after creation.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Path, State},
    response::IntoResponse,
};
use tower_sessions::Session;
use tracing::instrument;

use inkwell_core::OrderId;

use crate::api::types::{Order, OrderItem, TrackingInfo};
use crate::error::Result;
use crate::filters;
use crate::middleware::RequireAuth;
use crate::state::AppState;
use crate::stores::AuthStore;

// =============================================================================
// View Types
// =============================================================================

/// Order line display data for templates.
#[derive(Clone)]
pub struct OrderItemView {
    pub name: String,
    pub quantity: u32,
    pub price: String,
    pub line_total: String,
}

impl From<&OrderItem> for OrderItemView {
    fn from(item: &OrderItem) -> Self {
        Self {
            name: item.product_name.clone(),
            quantity: item.quantity,
            price: item.product_price.display(),
            line_total: item.line_total().display(),
        }
    }
}

/// Order display data for templates.
#[derive(Clone)]
pub struct OrderView {
    pub id: OrderId,
    pub number: String,
    pub placed_on: String,
    pub status: &'static str,
    pub payment_status: &'static str,
    pub items: Vec<OrderItemView>,
    pub subtotal: String,
    pub shipping_cost: String,
    pub tax: String,
    pub total: String,
    pub recipient: String,
    pub address: String,
    pub is_shipped: bool,
}

impl From<&Order> for OrderView {
    fn from(order: &Order) -> Self {
        let mut address = order.address_line1.clone();
        if !order.address_line2.is_empty() {
            address.push_str(", ");
            address.push_str(&order.address_line2);
        }
        address.push_str(&format!(
            ", {} {} {}, {}",
            order.city, order.state, order.postal_code, order.country
        ));

        Self {
            id: order.id,
            number: order.order_number.clone(),
            placed_on: order.created_at.format("%B %-d, %Y").to_string(),
            status: order.status.label(),
            payment_status: order.payment_status.label(),
            items: order.items.iter().map(OrderItemView::from).collect(),
            subtotal: order.subtotal.display(),
            shipping_cost: order.shipping_cost.display(),
            tax: order.tax.display(),
            total: order.total.display(),
            recipient: format!("{} {}", order.first_name, order.last_name),
            address,
            is_shipped: order.status.is_shipped(),
        }
    }
}

/// Shipment tracking display data for templates.
#[derive(Clone)]
pub struct TrackingView {
    pub tracking_number: Option<String>,
    pub carrier: Option<String>,
    pub shipped_on: Option<String>,
    pub delivered_on: Option<String>,
}

impl From<&TrackingInfo> for TrackingView {
    fn from(tracking: &TrackingInfo) -> Self {
        Self {
            tracking_number: tracking.tracking_number.clone(),
            carrier: tracking.carrier.clone(),
            shipped_on: tracking
                .shipped_at
                .map(|t| t.format("%B %-d, %Y").to_string()),
            delivered_on: tracking
                .delivered_at
                .map(|t| t.format("%B %-d, %Y").to_string()),
        }
    }
}

/// Order history page template.
#[derive(Template, WebTemplate)]
#[template(path = "orders/index.html")]
pub struct OrdersIndexTemplate {
    pub signed_in: bool,
    pub orders: Vec<OrderView>,
}

/// Order detail page template.
#[derive(Template, WebTemplate)]
#[template(path = "orders/show.html")]
pub struct OrderShowTemplate {
    pub signed_in: bool,
    pub order: OrderView,
    pub tracking: Option<TrackingView>,
}

// =============================================================================
// Handlers
// =============================================================================

/// Display order history.
#[instrument(skip(state, session))]
pub async fn index(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(_user): RequireAuth,
) -> Result<impl IntoResponse> {
    let auth_store = AuthStore::new(&session);
    let mut creds = auth_store.credentials().await;
    let result = state.api().orders(&mut creds).await;
    auth_store.save_credentials(&creds).await?;

    let orders = result?;

    Ok(OrdersIndexTemplate {
        signed_in: true,
        orders: orders.iter().map(OrderView::from).collect(),
    })
}

/// Display order detail, with tracking once shipped.
#[instrument(skip(state, session), fields(order_id = %id))]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(_user): RequireAuth,
    Path(id): Path<OrderId>,
) -> Result<impl IntoResponse> {
    let auth_store = AuthStore::new(&session);
    let mut creds = auth_store.credentials().await;
    let result = state.api().order(&mut creds, id).await;
    auth_store.save_credentials(&creds).await?;

    let order = result?;

    // Tracking is best-effort; the order page stands on its own
    let tracking = if order.status.is_shipped() {
        let mut creds = auth_store.credentials().await;
        let result = state.api().order_tracking(&mut creds, id).await;
        auth_store.save_credentials(&creds).await?;
        result.map_or_else(
            |e| {
                tracing::warn!("Failed to fetch tracking for order {id}: {e}");
                None
            },
            |tracking| Some(TrackingView::from(&tracking)),
        )
    } else {
        None
    };

    Ok(OrderShowTemplate {
        signed_in: true,
        order: OrderView::from(&order),
        tracking,
    })
}
