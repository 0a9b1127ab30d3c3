//! Order lifecycle.
//!
//! Orders are created once from a checkout submission, then only their
//! status moves. Line items are frozen snapshots of the catalog at checkout
//! time; later menu edits never reach back into a placed order. Orders are
//! never deleted.
//!
//! Status transitions are deliberately unconstrained, any status may be set
//! to any other by an admin.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{
    database::{DocumentStore, ORDERS},
    error::AppError,
};

const NOT_FOUND: AppError = AppError::NotFound("Order not found. Please check your Order ID.");

/// Collisions on the timestamp+suffix id are possible for concurrent
/// creators within the same second, detected by the store's unique insert
/// and resolved by re-deriving, never by overwriting.
const MAX_ID_ATTEMPTS: u32 = 8;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    Pending,
    Preparing,
    Ready,
    Completed,
    Cancelled,
}

impl FromStr for OrderStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, AppError> {
        match s {
            "Pending" => Ok(OrderStatus::Pending),
            "Preparing" => Ok(OrderStatus::Preparing),
            "Ready" => Ok(OrderStatus::Ready),
            "Completed" => Ok(OrderStatus::Completed),
            "Cancelled" => Ok(OrderStatus::Cancelled),
            other => Err(AppError::Validation(format!("Invalid order status: {other}"))),
        }
    }
}

/// Frozen snapshot of one catalog item at checkout time.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    pub item_id: String,
    pub name: String,
    pub price: f64,
    pub quantity: u32,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct CustomerDetails {
    pub name: String,
    pub contact: String,
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub order_id: String,
    pub customer_details: CustomerDetails,
    pub items: Vec<LineItem>,
    // Client-supplied and not recomputed against the line items, a known
    // integrity gap in the checkout contract.
    pub total_amount: f64,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The public tracking view: status plus the frozen receipt, nothing else.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackedOrder {
    pub id: String,
    pub status: OrderStatus,
    pub items: Vec<LineItem>,
    pub total: f64,
    pub customer: TrackedCustomer,
    pub placed_at: DateTime<Utc>,
}

#[derive(Serialize)]
pub struct TrackedCustomer {
    pub name: String,
    pub phone: String,
}

impl From<Order> for TrackedOrder {
    fn from(order: Order) -> Self {
        TrackedOrder {
            id: order.order_id,
            status: order.status,
            items: order.items,
            total: order.total_amount,
            customer: TrackedCustomer {
                name: order.customer_details.name,
                phone: order.customer_details.contact,
            },
            placed_at: order.created_at,
        }
    }
}

pub async fn create(
    store: &dyn DocumentStore,
    customer: CustomerDetails,
    items: Vec<LineItem>,
    total_amount: f64,
) -> Result<Order, AppError> {
    if customer.name.trim().is_empty() || customer.contact.trim().is_empty() {
        return Err(AppError::Validation(
            "Customer name and contact are required".to_string(),
        ));
    }
    if items.is_empty() {
        return Err(AppError::Validation("Order must contain at least one item".to_string()));
    }
    if !total_amount.is_finite() || total_amount < 0.0 {
        return Err(AppError::Validation(
            "Total amount must be a non-negative number".to_string(),
        ));
    }

    let now = Utc::now();
    let mut order = Order {
        order_id: generate_order_id(now),
        customer_details: customer,
        items,
        total_amount,
        status: OrderStatus::Pending,
        created_at: now,
        updated_at: now,
    };

    for attempt in 1..=MAX_ID_ATTEMPTS {
        let document = serde_json::to_string(&order)?;
        if store.insert(ORDERS, &order.order_id, document).await? {
            return Ok(order);
        }

        warn!(
            "Order id collision on {} (attempt {attempt}), re-deriving",
            order.order_id
        );
        order.order_id = generate_order_id(Utc::now());
    }

    Err(AppError::Conflict("Failed to allocate a unique order id".to_string()))
}

pub async fn track(store: &dyn DocumentStore, order_id: &str) -> Result<TrackedOrder, AppError> {
    Ok(find(store, order_id).await?.into())
}

/// Everything still in flight (status other than Completed), newest first.
pub async fn list_open(store: &dyn DocumentStore) -> Result<Vec<Order>, AppError> {
    let mut orders = store
        .all(ORDERS)
        .await?
        .iter()
        .map(|document| serde_json::from_str(document))
        .collect::<Result<Vec<Order>, _>>()?;

    orders.retain(|order| order.status != OrderStatus::Completed);
    orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    Ok(orders)
}

pub async fn set_status(
    store: &dyn DocumentStore,
    order_id: &str,
    new_status: &str,
) -> Result<Order, AppError> {
    // Parse before the lookup so a bad status never touches the store.
    let status = new_status.parse::<OrderStatus>()?;

    let mut order = find(store, order_id).await?;
    order.status = status;
    order.updated_at = Utc::now();

    let document = serde_json::to_string(&order)?;
    store.put(ORDERS, order_id, document).await?;

    Ok(order)
}

async fn find(store: &dyn DocumentStore, order_id: &str) -> Result<Order, AppError> {
    let document = store.get(ORDERS, order_id).await?.ok_or(NOT_FOUND)?;

    Ok(serde_json::from_str(&document)?)
}

/// `ORD-` + creation time in seconds + a 6-digit random suffix. Readable,
/// roughly sorted by time, and unique enough that collisions stay rare, the
/// store's unique insert catches the rest.
fn generate_order_id(now: DateTime<Utc>) -> String {
    let suffix: u32 = rand::thread_rng().gen_range(0..1_000_000);

    format!("ORD-{}{suffix:06}", now.timestamp())
}
