use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post, put},
    Router,
};
use uuid::Uuid;

use super::state::AppState;
use crate::auth::{MessageResponse, UserRole, UserSession};
use crate::error::AppError;
use crate::models::{
    AddToCartRequest, CartView, CheckoutRequest, CreateStoreItemRequest, ItemListQuery, Order,
    OrderDetail, OrderListQuery, StoreItem, UpdateCartRequest, UpdateOrderStatusRequest,
    UpdateStoreItemRequest,
};

/// Catalogue, member cart and orders
pub fn store_routes() -> Router<AppState> {
    Router::new()
        .route("/items", get(list_items).post(create_item))
        .route("/items/:id", get(get_item).put(update_item).delete(deactivate_item))
        .route("/cart", get(view_cart).post(add_to_cart))
        .route("/cart/:item_id", put(update_cart_line).delete(remove_from_cart))
        .route("/checkout", post(checkout))
        .route("/orders", get(list_orders))
        .route("/orders/me", get(my_orders))
        .route("/orders/:id", get(get_order))
        .route("/orders/:id/status", put(update_order_status))
}

#[tracing::instrument(skip(state))]
async fn list_items(
    State(state): State<AppState>,
    Query(query): Query<ItemListQuery>,
) -> Result<Json<Vec<StoreItem>>, AppError> {
    let items = state.store.list_items(&query).await?;
    Ok(Json(items))
}

#[tracing::instrument(skip(state))]
async fn get_item(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<StoreItem>, AppError> {
    let item = state.store.get_item(id).await?;
    Ok(Json(item))
}

#[tracing::instrument(skip(state, session, request), fields(user_id = %session.user_id))]
async fn create_item(
    State(state): State<AppState>,
    session: UserSession,
    Json(request): Json<CreateStoreItemRequest>,
) -> Result<(StatusCode, Json<StoreItem>), AppError> {
    session.require(&[UserRole::Admin])?;
    let item = state.store.create_item(request).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

#[tracing::instrument(skip(state, session, request), fields(user_id = %session.user_id))]
async fn update_item(
    State(state): State<AppState>,
    session: UserSession,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateStoreItemRequest>,
) -> Result<Json<StoreItem>, AppError> {
    session.require(&[UserRole::Admin])?;
    let item = state.store.update_item(id, request).await?;
    Ok(Json(item))
}

#[tracing::instrument(skip(state, session), fields(user_id = %session.user_id))]
async fn deactivate_item(
    State(state): State<AppState>,
    session: UserSession,
    Path(id): Path<Uuid>,
) -> Result<Json<MessageResponse>, AppError> {
    session.require(&[UserRole::Admin])?;
    state.store.deactivate_item(id).await?;
    Ok(Json(MessageResponse::new("Store item deactivated")))
}

#[tracing::instrument(skip(state, session), fields(user_id = %session.user_id))]
async fn view_cart(State(state): State<AppState>, session: UserSession) -> Result<Json<CartView>, AppError> {
    session.require(&[UserRole::Member])?;
    let cart = state.store.cart(session.user_id).await?;
    Ok(Json(cart))
}

#[tracing::instrument(skip(state, session), fields(user_id = %session.user_id))]
async fn add_to_cart(
    State(state): State<AppState>,
    session: UserSession,
    Json(request): Json<AddToCartRequest>,
) -> Result<Json<CartView>, AppError> {
    session.require(&[UserRole::Member])?;
    let cart = state.store.add_to_cart(session.user_id, request).await?;
    Ok(Json(cart))
}

#[tracing::instrument(skip(state, session), fields(user_id = %session.user_id))]
async fn update_cart_line(
    State(state): State<AppState>,
    session: UserSession,
    Path(item_id): Path<Uuid>,
    Json(request): Json<UpdateCartRequest>,
) -> Result<Json<CartView>, AppError> {
    session.require(&[UserRole::Member])?;
    let cart = state.store.update_cart_line(session.user_id, item_id, request).await?;
    Ok(Json(cart))
}

#[tracing::instrument(skip(state, session), fields(user_id = %session.user_id))]
async fn remove_from_cart(
    State(state): State<AppState>,
    session: UserSession,
    Path(item_id): Path<Uuid>,
) -> Result<Json<CartView>, AppError> {
    session.require(&[UserRole::Member])?;
    let cart = state.store.remove_from_cart(session.user_id, item_id).await?;
    Ok(Json(cart))
}

#[tracing::instrument(skip(state, session, body), fields(user_id = %session.user_id))]
async fn checkout(
    State(state): State<AppState>,
    session: UserSession,
    body: Option<Json<CheckoutRequest>>,
) -> Result<(StatusCode, Json<OrderDetail>), AppError> {
    session.require(&[UserRole::Member])?;
    let request = body.map(|Json(request)| request).unwrap_or_default();
    let order = state.store.checkout(session.user_id, request).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

#[tracing::instrument(skip(state, session), fields(user_id = %session.user_id))]
async fn my_orders(State(state): State<AppState>, session: UserSession) -> Result<Json<Vec<Order>>, AppError> {
    session.require(&[UserRole::Member])?;
    let orders = state.store.member_orders(session.user_id).await?;
    Ok(Json(orders))
}

#[tracing::instrument(skip(state, session), fields(user_id = %session.user_id))]
async fn list_orders(
    State(state): State<AppState>,
    session: UserSession,
    Query(query): Query<OrderListQuery>,
) -> Result<Json<Vec<Order>>, AppError> {
    session.require(&[UserRole::Admin])?;
    let orders = state.store.list_orders(&query).await?;
    Ok(Json(orders))
}

#[tracing::instrument(skip(state, session), fields(user_id = %session.user_id))]
async fn get_order(
    State(state): State<AppState>,
    session: UserSession,
    Path(id): Path<Uuid>,
) -> Result<Json<OrderDetail>, AppError> {
    let order = state.store.get_order(&session, id).await?;
    Ok(Json(order))
}

#[tracing::instrument(skip(state, session), fields(user_id = %session.user_id))]
async fn update_order_status(
    State(state): State<AppState>,
    session: UserSession,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateOrderStatusRequest>,
) -> Result<Json<Order>, AppError> {
    session.require(&[UserRole::Admin])?;
    let order = state.store.update_status(id, request).await?;
    Ok(Json(order))
}
