pub mod store;
pub use store::{
    BillingStore, LedgerTotals, OutstandingInvoice, PaymentRow, SalesRow, SharedStore, StoreTx,
};
pub mod pg_store;
pub use pg_store::PgStore;
pub mod memory_store;
pub use memory_store::{FaultPoint, MemoryStore};
