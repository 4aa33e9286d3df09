pub mod auth;
pub use auth::AuthService;
pub mod customer_service;
pub use customer_service::CustomerService;
pub mod product_service;
pub use product_service::ProductService;
pub mod invoice_service;
pub use invoice_service::InvoiceService;
pub mod payment_service;
pub use payment_service::PaymentService;
pub mod report_service;
pub use report_service::ReportService;
