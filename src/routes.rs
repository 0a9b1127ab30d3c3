use std::sync::Arc;

use axum::{
    Json,
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    auth::{self, Admin, AuthResponse},
    error::AppError,
    menu::{self, MenuItem},
    orders::{self, CustomerDetails, LineItem, Order, TrackedOrder},
    state,
    utils::read_menu_form,
};

type AppState = State<Arc<state::State>>;

#[derive(Serialize)]
pub struct Confirmation {
    message: &'static str,
}

pub async fn root_handler() -> &'static str {
    "Campus Dining API is running."
}

// --- Menu ---

#[derive(Deserialize)]
pub struct MenuListParams {
    available: Option<bool>,
}

pub async fn menu_list_handler(
    State(state): AppState,
    Query(params): Query<MenuListParams>,
) -> Result<Json<Vec<MenuItem>>, AppError> {
    let items = menu::list(state.store.as_ref(), params.available.unwrap_or(false)).await?;

    Ok(Json(items))
}

pub async fn menu_get_handler(
    State(state): AppState,
    Path(id): Path<u64>,
) -> Result<Json<MenuItem>, AppError> {
    Ok(Json(menu::get(state.store.as_ref(), id).await?))
}

pub async fn menu_create_handler(
    State(state): AppState,
    Admin(admin): Admin,
    multipart: Multipart,
) -> Result<(StatusCode, Json<MenuItem>), AppError> {
    let (form, image) = read_menu_form(multipart).await?;
    let item = menu::create(state.store.as_ref(), &state.assets, form, image).await?;

    info!("{} created menu item {} ({})", admin.username, item.id, item.name);

    Ok((StatusCode::CREATED, Json(item)))
}

pub async fn menu_update_handler(
    State(state): AppState,
    Admin(_admin): Admin,
    Path(id): Path<u64>,
    multipart: Multipart,
) -> Result<Json<MenuItem>, AppError> {
    let (form, image) = read_menu_form(multipart).await?;
    let item = menu::update(state.store.as_ref(), &state.assets, id, form, image).await?;

    Ok(Json(item))
}

pub async fn menu_delete_handler(
    State(state): AppState,
    Admin(admin): Admin,
    Path(id): Path<u64>,
) -> Result<Json<Confirmation>, AppError> {
    menu::delete(state.store.as_ref(), &state.assets, id).await?;

    info!("{} removed menu item {id}", admin.username);

    Ok(Json(Confirmation {
        message: "Menu item removed successfully.",
    }))
}

// --- Orders ---

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceOrderRequest {
    #[serde(default)]
    customer_name: String,
    #[serde(default)]
    customer_email: String,
    #[serde(default)]
    items: Vec<LineItem>,
    total_amount: Option<f64>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderPlaced {
    message: &'static str,
    order_id: String,
    qr_code_data: String,
}

pub async fn order_create_handler(
    State(state): AppState,
    Json(payload): Json<PlaceOrderRequest>,
) -> Result<(StatusCode, Json<OrderPlaced>), AppError> {
    let total_amount = payload
        .total_amount
        .ok_or_else(|| AppError::Validation("Total amount is required".to_string()))?;
    let customer = CustomerDetails {
        name: payload.customer_name,
        contact: payload.customer_email,
    };
    let order = orders::create(state.store.as_ref(), customer, payload.items, total_amount).await?;

    info!("Order {} placed, total {}", order.order_id, order.total_amount);

    // Payment stub: the client renders this string as a QR code.
    let qr_code_data = format!("ORDER_ID:{}|AMOUNT:{}", order.order_id, order.total_amount);

    Ok((
        StatusCode::CREATED,
        Json(OrderPlaced {
            message: "Order placed successfully.",
            order_id: order.order_id,
            qr_code_data,
        }),
    ))
}

pub async fn order_track_handler(
    State(state): AppState,
    Path(id): Path<String>,
) -> Result<Json<TrackedOrder>, AppError> {
    Ok(Json(orders::track(state.store.as_ref(), &id).await?))
}

pub async fn order_admin_list_handler(
    State(state): AppState,
    Admin(_admin): Admin,
) -> Result<Json<Vec<Order>>, AppError> {
    Ok(Json(orders::list_open(state.store.as_ref()).await?))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdateRequest {
    new_status: String,
}

pub async fn order_status_handler(
    State(state): AppState,
    Admin(admin): Admin,
    Path(id): Path<String>,
    Json(payload): Json<StatusUpdateRequest>,
) -> Result<Json<Order>, AppError> {
    let order = orders::set_status(state.store.as_ref(), &id, &payload.new_status).await?;

    info!("{} moved order {} to {:?}", admin.username, order.order_id, order.status);

    Ok(Json(order))
}

// --- Auth ---

#[derive(Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
}

#[derive(Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    name: String,
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
}

pub async fn login_handler(
    State(state): AppState,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let response = auth::login(&state, &payload.username, &payload.password).await?;

    Ok(Json(response))
}

pub async fn register_handler(
    State(state): AppState,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), AppError> {
    let response =
        auth::register(&state, &payload.name, &payload.username, &payload.password).await?;

    Ok((StatusCode::CREATED, Json(response)))
}
