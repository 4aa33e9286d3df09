// src/docs.rs

use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use utoipa::OpenApi;

use crate::common;
use crate::handlers;
use crate::models;

#[derive(OpenApi)]
#[openapi(
    paths(
        // --- Auth ---
        handlers::auth::login,
        handlers::auth::verify,

        // --- Users ---
        handlers::auth::get_me,
        handlers::auth::create_user,

        // --- Customers ---
        handlers::customers::create_customer,
        handlers::customers::list_customers,
        handlers::customers::get_customer,
        handlers::customers::update_customer,
        handlers::customers::delete_customer,

        // --- Products ---
        handlers::products::create_product,
        handlers::products::list_products,
        handlers::products::get_product,
        handlers::products::update_product,
        handlers::products::delete_product,

        // --- Invoices ---
        handlers::invoices::create_invoice,
        handlers::invoices::list_invoices,
        handlers::invoices::get_invoice,
        handlers::invoices::update_invoice,
        handlers::invoices::delete_invoice,

        // --- Payments ---
        handlers::payments::create_payment,
        handlers::payments::list_payments,
        handlers::payments::get_payment,
        handlers::payments::delete_payment,

        // --- Dashboard & reports ---
        handlers::dashboard::get_summary,
        handlers::dashboard::sales_report,
        handlers::dashboard::payments_report,
        handlers::dashboard::outstanding_report,
    ),
    components(
        schemas(
            common::MessageResponse,

            // --- Auth ---
            models::auth::User,
            models::auth::RegisterUserPayload,
            models::auth::LoginUserPayload,
            models::auth::AuthResponse,

            // --- Customers ---
            models::customer::Customer,
            models::customer::CustomerListEntry,
            models::customer::CustomerDetail,
            models::customer::CreateCustomerPayload,
            models::customer::UpdateCustomerPayload,

            // --- Products ---
            models::product::Product,
            models::product::ProductListEntry,
            models::product::CreateProductPayload,
            models::product::UpdateProductPayload,

            // --- Invoices ---
            models::invoice::InvoiceStatus,
            models::invoice::Invoice,
            models::invoice::InvoiceLineItem,
            models::invoice::LineItemView,
            models::invoice::InvoicePaymentEntry,
            models::invoice::InvoiceDetail,
            models::invoice::InvoiceItemPayload,
            models::invoice::CreateInvoicePayload,
            models::invoice::UpdateInvoicePayload,

            // --- Payments ---
            models::payment::PaymentMode,
            models::payment::PaymentStatus,
            models::payment::Payment,
            models::payment::PaymentAllocation,
            models::payment::PaymentAllocationEntry,
            models::payment::PaymentDetail,
            models::payment::AllocationPayload,
            models::payment::CreatePaymentPayload,

            // --- Dashboard & reports ---
            models::dashboard::DashboardSummary,
            models::dashboard::StatusCount,
            models::dashboard::SalesReport,
            models::dashboard::SalesReportRow,
            models::dashboard::PaymentsReport,
            models::dashboard::PaymentReportRow,
            models::dashboard::ModeTotal,
            models::dashboard::OutstandingClass,
            models::dashboard::OutstandingRow,
            models::dashboard::OutstandingReport,
        )
    ),
    tags(
        (name = "Auth", description = "Login and credential checks"),
        (name = "Users", description = "Current user and user management"),
        (name = "Customers", description = "Customer records"),
        (name = "Products", description = "Product catalog"),
        (name = "Invoices", description = "Invoices and their line items"),
        (name = "Payments", description = "Payments and invoice allocations"),
        (name = "Dashboard", description = "Headline figures"),
        (name = "Reports", description = "Sales, payments and outstanding reports")
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme("api_jwt", SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_every_route() {
        let doc = ApiDoc::openapi();
        for path in [
            "/api/auth/login",
            "/api/invoices",
            "/api/invoices/{id}",
            "/api/payments/{id}",
            "/api/reports/outstanding",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }
}
