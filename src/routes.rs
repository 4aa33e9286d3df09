// src/routes.rs

use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{config::AppState, docs::ApiDoc, handlers, middleware::auth::auth_guard};

pub fn build_router(app_state: AppState) -> Router {
    // Public
    let auth_routes = Router::new()
        .route("/login", post(handlers::auth::login))
        .route("/verify", post(handlers::auth::verify));

    // Everything below sits behind the bearer guard
    let user_routes = Router::new()
        .route("/", post(handlers::auth::create_user))
        .route("/me", get(handlers::auth::get_me));

    let customer_routes = Router::new()
        .route(
            "/",
            post(handlers::customers::create_customer).get(handlers::customers::list_customers),
        )
        .route(
            "/{id}",
            get(handlers::customers::get_customer)
                .put(handlers::customers::update_customer)
                .delete(handlers::customers::delete_customer),
        );

    let product_routes = Router::new()
        .route(
            "/",
            post(handlers::products::create_product).get(handlers::products::list_products),
        )
        .route(
            "/{id}",
            get(handlers::products::get_product)
                .put(handlers::products::update_product)
                .delete(handlers::products::delete_product),
        );

    let invoice_routes = Router::new()
        .route(
            "/",
            post(handlers::invoices::create_invoice).get(handlers::invoices::list_invoices),
        )
        .route(
            "/{id}",
            get(handlers::invoices::get_invoice)
                .put(handlers::invoices::update_invoice)
                .delete(handlers::invoices::delete_invoice),
        );

    let payment_routes = Router::new()
        .route(
            "/",
            post(handlers::payments::create_payment).get(handlers::payments::list_payments),
        )
        .route(
            "/{id}",
            get(handlers::payments::get_payment).delete(handlers::payments::delete_payment),
        );

    let report_routes = Router::new()
        .route("/sales", get(handlers::dashboard::sales_report))
        .route("/payments", get(handlers::dashboard::payments_report))
        .route("/outstanding", get(handlers::dashboard::outstanding_report));

    let protected = Router::new()
        .nest("/api/users", user_routes)
        .nest("/api/customers", customer_routes)
        .nest("/api/products", product_routes)
        .nest("/api/invoices", invoice_routes)
        .nest("/api/payments", payment_routes)
        .nest("/api/reports", report_routes)
        .route("/api/dashboard", get(handlers::dashboard::get_summary))
        .layer(axum_middleware::from_fn_with_state(app_state.clone(), auth_guard));

    Router::new()
        .route("/api/health", get(|| async { "OK" }))
        .nest("/api/auth", auth_routes)
        .merge(protected)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .with_state(app_state)
}
