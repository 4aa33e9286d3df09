pub mod auth;
pub mod customer;
pub mod dashboard;
pub mod invoice;
pub mod payment;
pub mod product;
