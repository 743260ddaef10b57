//! Customer endpoints, including the discovery-backed order calls.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};

use crate::domain::orders::{orders_for_customer_path, ORDERS_PATH};
use crate::domain::{Customer, NewCustomer, OrderRequest, OrderResponse};
use crate::http::request::request_id;
use crate::http::response::ApiError;
use crate::http::server::AppState;

fn parse_id(raw: &str) -> Result<i64, ApiError> {
    raw.parse::<i64>().map_err(|e| {
        ApiError::bad_request(format!("ID conversion to integer failed with error: {}", e))
    })
}

pub async fn list_customers(State(state): State<AppState>) -> Json<Vec<Customer>> {
    Json(state.customers.list())
}

pub async fn get_customer(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Customer>, ApiError> {
    let id = parse_id(&id)?;
    state
        .customers
        .get(id)
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("Customer with id {} not found.", id)))
}

pub async fn create_customer(
    State(state): State<AppState>,
    body: Result<Json<NewCustomer>, JsonRejection>,
) -> Result<(StatusCode, Json<Customer>), ApiError> {
    let Json(new) = body.map_err(|rejection| {
        tracing::debug!(error = %rejection, "Rejected customer body");
        ApiError::bad_request("Could not create customer from JSON.")
    })?;
    let customer = state.customers.create(new);
    tracing::info!(customer_id = customer.id, "Customer created");
    Ok((StatusCode::CREATED, Json(customer)))
}

/// Orders of one customer, fetched from the orders service.
pub async fn customer_orders(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Vec<OrderResponse>>, ApiError> {
    let id = parse_id(&id)?;
    let orders: Vec<OrderResponse> = state
        .collaborators
        .get_json(&state.orders, &orders_for_customer_path(id), request_id(&headers))
        .await?;
    Ok(Json(orders))
}

/// Places a sample order for the customer with the orders service.
pub async fn new_order(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<(StatusCode, Json<OrderResponse>), ApiError> {
    let id = parse_id(&id)?;
    let order: OrderResponse = state
        .collaborators
        .post_json(&state.orders, ORDERS_PATH, &OrderRequest::sample(id), request_id(&headers))
        .await?;
    tracing::info!(customer_id = id, order_id = order.id, "Order placed");
    Ok((StatusCode::CREATED, Json(order)))
}
