// src/handlers/dashboard.rs

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use crate::{
    common::error::AppError,
    config::AppState,
    models::dashboard::{DashboardSummary, OutstandingReport, PaymentsReport, ReportRange, SalesReport},
};

// GET /api/dashboard
#[utoipa::path(
    get,
    path = "/api/dashboard",
    tag = "Dashboard",
    responses(
        (status = 200, description = "Totals, counts and recent invoices", body = DashboardSummary),
        (status = 401, description = "Missing or invalid token")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_summary(State(app_state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let summary = app_state.report_service.get_summary().await?;
    Ok((StatusCode::OK, Json(summary)))
}

// GET /api/reports/sales
#[utoipa::path(
    get,
    path = "/api/reports/sales",
    tag = "Reports",
    params(ReportRange),
    responses(
        (status = 200, description = "Invoices created in the range", body = SalesReport)
    ),
    security(("api_jwt" = []))
)]
pub async fn sales_report(
    State(app_state): State<AppState>,
    Query(range): Query<ReportRange>,
) -> Result<impl IntoResponse, AppError> {
    let report = app_state.report_service.sales_report(&range).await?;
    Ok((StatusCode::OK, Json(report)))
}

// GET /api/reports/payments
#[utoipa::path(
    get,
    path = "/api/reports/payments",
    tag = "Reports",
    params(ReportRange),
    responses(
        (status = 200, description = "Payments in the range, grouped by mode", body = PaymentsReport)
    ),
    security(("api_jwt" = []))
)]
pub async fn payments_report(
    State(app_state): State<AppState>,
    Query(range): Query<ReportRange>,
) -> Result<impl IntoResponse, AppError> {
    let report = app_state.report_service.payments_report(&range).await?;
    Ok((StatusCode::OK, Json(report)))
}

// GET /api/reports/outstanding
#[utoipa::path(
    get,
    path = "/api/reports/outstanding",
    tag = "Reports",
    responses(
        (status = 200, description = "Unpaid balances with ageing", body = OutstandingReport)
    ),
    security(("api_jwt" = []))
)]
pub async fn outstanding_report(State(app_state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let report = app_state.report_service.outstanding_report().await?;
    Ok((StatusCode::OK, Json(report)))
}
