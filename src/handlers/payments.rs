// src/handlers/payments.rs

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::{error::AppError, MessageResponse},
    config::AppState,
    models::payment::{CreatePaymentPayload, Payment, PaymentDetail, PaymentFilter},
};

// POST /api/payments
#[utoipa::path(
    post,
    path = "/api/payments",
    tag = "Payments",
    request_body = CreatePaymentPayload,
    responses(
        (status = 201, description = "Payment recorded and applied", body = PaymentDetail),
        (status = 400, description = "Invalid amount or allocations"),
        (status = 404, description = "Customer or invoice not found"),
        (status = 409, description = "Payment would exceed the invoice total")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_payment(
    State(app_state): State<AppState>,
    Json(payload): Json<CreatePaymentPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let payment = app_state.payment_service.create_payment(payload).await?;
    Ok((StatusCode::CREATED, Json(payment)))
}

// GET /api/payments
#[utoipa::path(
    get,
    path = "/api/payments",
    tag = "Payments",
    params(PaymentFilter),
    responses(
        (status = 200, description = "Payments, newest first", body = Vec<Payment>)
    ),
    security(("api_jwt" = []))
)]
pub async fn list_payments(
    State(app_state): State<AppState>,
    Query(filter): Query<PaymentFilter>,
) -> Result<impl IntoResponse, AppError> {
    let payments = app_state.payment_service.list_payments(&filter).await?;
    Ok((StatusCode::OK, Json(payments)))
}

// GET /api/payments/{id}
#[utoipa::path(
    get,
    path = "/api/payments/{id}",
    tag = "Payments",
    params(("id" = Uuid, Path, description = "Payment id")),
    responses(
        (status = 200, description = "Payment with its allocations", body = PaymentDetail),
        (status = 404, description = "Payment not found")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_payment(
    State(app_state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let payment = app_state.payment_service.get_payment(id).await?;
    Ok((StatusCode::OK, Json(payment)))
}

// DELETE /api/payments/{id}
#[utoipa::path(
    delete,
    path = "/api/payments/{id}",
    tag = "Payments",
    params(("id" = Uuid, Path, description = "Payment id")),
    responses(
        (status = 200, description = "Payment deleted, invoice statuses recomputed", body = MessageResponse),
        (status = 404, description = "Payment not found")
    ),
    security(("api_jwt" = []))
)]
pub async fn delete_payment(
    State(app_state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    app_state.payment_service.delete_payment(id).await?;
    Ok(Json(MessageResponse::new("Payment deleted successfully")))
}
