// src/services/report_service.rs

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;

use crate::{
    common::error::AppError,
    db::SharedStore,
    ledger::{self, round_currency},
    models::{
        dashboard::{
            DashboardSummary, ModeTotal, OutstandingClass, OutstandingReport, OutstandingRow,
            PaymentReportRow, PaymentsReport, ReportRange, SalesReport, SalesReportRow, StatusCount,
        },
        invoice::InvoiceStatus,
    },
};

const RECENT_INVOICES: i64 = 5;

#[derive(Clone)]
pub struct ReportService {
    store: SharedStore,
}

impl ReportService {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    pub async fn get_summary(&self) -> Result<DashboardSummary, AppError> {
        let mut tx = self.store.begin().await?;
        let totals = tx.ledger_totals().await?;
        let counts = tx.status_counts().await?;

        // every status is listed, including the empty ones
        let invoices_by_status = InvoiceStatus::ALL
            .iter()
            .map(|status| StatusCount {
                status: *status,
                count: counts
                    .iter()
                    .find(|(s, _)| s == status)
                    .map(|(_, count)| *count)
                    .unwrap_or(0),
            })
            .collect();

        Ok(DashboardSummary {
            total_sales: round_currency(totals.total_sales),
            outstanding: round_currency(totals.outstanding),
            total_received: round_currency(totals.total_received),
            customer_count: tx.count_customers().await?,
            product_count: tx.count_products().await?,
            invoice_count: totals.invoice_count,
            invoices_by_status,
            recent_invoices: tx.recent_invoices(RECENT_INVOICES).await?,
        })
    }

    /// One row per invoice created inside the range.
    pub async fn sales_report(&self, range: &ReportRange) -> Result<SalesReport, AppError> {
        let mut tx = self.store.begin().await?;
        let sales = tx.sales_between(range).await?;

        let mut report = SalesReport {
            rows: Vec::with_capacity(sales.len()),
            total_subtotal: Decimal::ZERO,
            total_discount: Decimal::ZERO,
            total_tax: Decimal::ZERO,
            total_sales: Decimal::ZERO,
        };
        for sale in sales {
            report.total_subtotal += sale.subtotal;
            report.total_discount += sale.discount_amount;
            report.total_tax += sale.tax_amount;
            report.total_sales += sale.grand_total;
            report.rows.push(SalesReportRow {
                invoice_id: sale.invoice_id,
                invoice_number: sale.invoice_number,
                customer_name: sale.customer_name,
                date: sale.created_at.date_naive(),
                subtotal: round_currency(sale.subtotal),
                discount: round_currency(sale.discount_amount),
                tax: round_currency(sale.tax_amount),
                total: round_currency(sale.grand_total),
                status: sale.status,
            });
        }

        report.total_subtotal = round_currency(report.total_subtotal);
        report.total_discount = round_currency(report.total_discount);
        report.total_tax = round_currency(report.total_tax);
        report.total_sales = round_currency(report.total_sales);
        Ok(report)
    }

    /// Payments dated inside the range. Failed payments are left out.
    pub async fn payments_report(&self, range: &ReportRange) -> Result<PaymentsReport, AppError> {
        let mut tx = self.store.begin().await?;
        let payments = tx.payments_between(range).await?;

        let mut rows = Vec::with_capacity(payments.len());
        let mut by_mode: Vec<ModeTotal> = Vec::new();
        let mut total_payments = Decimal::ZERO;

        for payment in payments {
            total_payments += payment.amount;
            match by_mode.iter_mut().find(|m| m.payment_mode == payment.payment_mode) {
                Some(mode) => mode.total += payment.amount,
                None => by_mode.push(ModeTotal {
                    payment_mode: payment.payment_mode,
                    total: payment.amount,
                }),
            }
            rows.push(PaymentReportRow {
                payment_id: payment.payment_id,
                payment_number: payment.payment_number,
                customer_name: payment.customer_name,
                date: payment.payment_date,
                payment_mode: payment.payment_mode,
                amount: round_currency(payment.amount),
            });
        }

        for mode in &mut by_mode {
            mode.total = round_currency(mode.total);
        }
        Ok(PaymentsReport {
            rows,
            by_mode,
            total_payments: round_currency(total_payments),
        })
    }

    pub async fn outstanding_report(&self) -> Result<OutstandingReport, AppError> {
        self.outstanding_report_at(Utc::now().date_naive()).await
    }

    /// Every invoice with something left to pay. Overdue means the due date is
    /// before `today`; the stored status is not consulted.
    pub async fn outstanding_report_at(&self, today: NaiveDate) -> Result<OutstandingReport, AppError> {
        let mut tx = self.store.begin().await?;
        let invoices = tx.outstanding_invoices().await?;

        let mut rows = Vec::with_capacity(invoices.len());
        let mut total_outstanding = Decimal::ZERO;
        let mut overdue_amount = Decimal::ZERO;

        for invoice in invoices {
            let balance = ledger::balance(invoice.grand_total, invoice.total_paid);
            let days_overdue = invoice
                .due_date
                .map(|due| (today - due).num_days().max(0))
                .unwrap_or(0);
            let classification = if days_overdue > 0 {
                overdue_amount += balance;
                OutstandingClass::Overdue
            } else {
                OutstandingClass::Current
            };
            total_outstanding += balance;

            rows.push(OutstandingRow {
                invoice_id: invoice.invoice_id,
                invoice_number: invoice.invoice_number,
                customer_name: invoice.customer_name,
                grand_total: round_currency(invoice.grand_total),
                paid: round_currency(invoice.total_paid),
                balance: round_currency(balance),
                due_date: invoice.due_date,
                days_overdue,
                classification,
            });
        }

        rows.sort_by(|a, b| b.days_overdue.cmp(&a.days_overdue));
        Ok(OutstandingReport {
            rows,
            total_outstanding: round_currency(total_outstanding),
            overdue_amount: round_currency(overdue_amount),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use uuid::Uuid;

    use super::*;
    use crate::{
        db::{BillingStore, MemoryStore},
        models::{
            customer::{CreateCustomerPayload, Customer},
            invoice::{CreateInvoicePayload, InvoiceItemPayload},
            payment::{CreatePaymentPayload, PaymentMode, PaymentStatus},
            product::{CreateProductPayload, Product},
        },
        services::{invoice_service::InvoiceService, payment_service::PaymentService},
    };

    fn d(v: i64) -> Decimal {
        Decimal::from(v)
    }

    struct Fixture {
        reports: ReportService,
        invoices: InvoiceService,
        payments: PaymentService,
        customer: Customer,
        product: Product,
    }

    async fn fixture() -> Fixture {
        let store = MemoryStore::new();
        let customer = Customer::from_payload(CreateCustomerPayload {
            name: "Acme".to_string(),
            email: "acme@example.com".to_string(),
            phone: None,
            address: None,
            city: None,
            country: None,
            postal_code: None,
        });
        let product = Product::from_payload(CreateProductPayload {
            name: "Widget".to_string(),
            description: None,
            price: Decimal::new(3333, 2),
            sku: None,
            category: None,
            unit: None,
        });
        let mut tx = store.begin().await.unwrap();
        tx.insert_customer(&customer).await.unwrap();
        tx.insert_product(&product).await.unwrap();
        tx.commit().await.unwrap();

        let shared: SharedStore = Arc::new(store);
        Fixture {
            reports: ReportService::new(shared.clone()),
            invoices: InvoiceService::new(shared.clone()),
            payments: PaymentService::new(shared),
            customer,
            product,
        }
    }

    async fn invoice(f: &Fixture, number: &str, quantity: i32, due: Option<NaiveDate>) -> Uuid {
        f.invoices
            .create_invoice(CreateInvoicePayload {
                customer_id: f.customer.id,
                invoice_number: number.to_string(),
                items: vec![InvoiceItemPayload {
                    product_id: f.product.id,
                    quantity,
                    unit_price: Some(d(100)),
                    discount: None,
                }],
                due_date: due,
                notes: None,
                tax: None,
                discount: None,
            })
            .await
            .unwrap()
            .invoice
            .id
    }

    async fn pay(f: &Fixture, invoice_id: Uuid, amount: i64, mode: PaymentMode, status: Option<PaymentStatus>) {
        f.payments
            .create_payment(CreatePaymentPayload {
                customer_id: Some(f.customer.id),
                invoice_id: if status == Some(PaymentStatus::Failed) { None } else { Some(invoice_id) },
                payment_number: None,
                amount: d(amount),
                payment_mode: mode,
                payment_date: None,
                reference: None,
                notes: None,
                status,
                allocations: vec![],
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn summary_adds_up() {
        let f = fixture().await;
        let first = invoice(&f, "INV-1", 10, None).await;
        invoice(&f, "INV-2", 5, None).await;
        pay(&f, first, 400, PaymentMode::Cash, None).await;

        let summary = f.reports.get_summary().await.unwrap();
        assert_eq!(summary.total_sales, d(1500));
        assert_eq!(summary.total_received, d(400));
        assert_eq!(summary.outstanding, d(1100));
        assert_eq!(summary.invoice_count, 2);
        assert_eq!(summary.customer_count, 1);
        assert_eq!(summary.product_count, 1);
        assert_eq!(summary.recent_invoices[0].invoice_number, "INV-2");

        let partial = summary
            .invoices_by_status
            .iter()
            .find(|s| s.status == InvoiceStatus::Partial)
            .unwrap();
        assert_eq!(partial.count, 1);
    }

    #[tokio::test]
    async fn summary_keeps_five_newest_and_lists_every_status() {
        let f = fixture().await;
        for n in 1..=7 {
            invoice(&f, &format!("INV-{n}"), 1, None).await;
        }

        let summary = f.reports.get_summary().await.unwrap();
        assert_eq!(summary.invoice_count, 7);
        assert_eq!(summary.total_sales, d(700));
        assert_eq!(summary.outstanding, d(700));
        assert_eq!(summary.total_received, d(0));

        let numbers: Vec<&str> = summary.recent_invoices.iter().map(|i| i.invoice_number.as_str()).collect();
        assert_eq!(numbers, ["INV-7", "INV-6", "INV-5", "INV-4", "INV-3"]);

        assert_eq!(summary.invoices_by_status.len(), InvoiceStatus::ALL.len());
        for entry in &summary.invoices_by_status {
            let expected = if entry.status == InvoiceStatus::Pending { 7 } else { 0 };
            assert_eq!(entry.count, expected, "{:?}", entry.status);
        }
    }

    #[tokio::test]
    async fn payments_report_groups_by_mode_and_skips_failed() {
        let f = fixture().await;
        let inv = invoice(&f, "INV-1", 10, None).await;
        pay(&f, inv, 100, PaymentMode::Cash, None).await;
        pay(&f, inv, 50, PaymentMode::Cash, None).await;
        pay(&f, inv, 200, PaymentMode::Upi, None).await;
        pay(&f, inv, 999, PaymentMode::Card, Some(PaymentStatus::Failed)).await;

        let report = f.reports.payments_report(&ReportRange::default()).await.unwrap();
        assert_eq!(report.rows.len(), 3);
        assert_eq!(report.total_payments, d(350));

        let cash = report
            .by_mode
            .iter()
            .find(|m| m.payment_mode == PaymentMode::Cash)
            .unwrap();
        assert_eq!(cash.total, d(150));
        assert!(report.by_mode.iter().all(|m| m.payment_mode != PaymentMode::Card));
    }

    #[tokio::test]
    async fn sales_report_respects_range() {
        let f = fixture().await;
        invoice(&f, "INV-1", 1, None).await;

        let today = Utc::now().date_naive();
        let all = f
            .reports
            .sales_report(&ReportRange {
                from: Some(today),
                to: Some(today),
            })
            .await
            .unwrap();
        assert_eq!(all.rows.len(), 1);
        assert_eq!(all.total_sales, d(100));
        assert_eq!(all.rows[0].customer_name, "Acme");

        let tomorrow = today.succ_opt().unwrap();
        let none = f
            .reports
            .sales_report(&ReportRange {
                from: Some(tomorrow),
                to: None,
            })
            .await
            .unwrap();
        assert!(none.rows.is_empty());
        assert_eq!(none.total_sales, d(0));
    }

    #[tokio::test]
    async fn outstanding_report_computes_overdue_live() {
        let f = fixture().await;
        let today = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();
        let late = invoice(&f, "INV-1", 10, NaiveDate::from_ymd_opt(2025, 3, 1)).await;
        invoice(&f, "INV-2", 5, NaiveDate::from_ymd_opt(2025, 3, 31)).await;
        let settled = invoice(&f, "INV-3", 1, None).await;
        pay(&f, late, 250, PaymentMode::Cash, None).await;
        pay(&f, settled, 100, PaymentMode::Cash, None).await;

        let report = f.reports.outstanding_report_at(today).await.unwrap();
        assert_eq!(report.rows.len(), 2);
        assert_eq!(report.rows[0].invoice_number, "INV-1");
        assert_eq!(report.rows[0].days_overdue, 9);
        assert_eq!(report.rows[0].classification, OutstandingClass::Overdue);
        assert_eq!(report.rows[0].balance, d(750));
        assert_eq!(report.rows[1].classification, OutstandingClass::Current);
        assert_eq!(report.total_outstanding, d(1250));
        assert_eq!(report.overdue_amount, d(750));
    }

    #[tokio::test]
    async fn amounts_are_rounded_for_display_only() {
        let f = fixture().await;
        f.invoices
            .create_invoice(CreateInvoicePayload {
                customer_id: f.customer.id,
                invoice_number: "INV-1".to_string(),
                items: vec![InvoiceItemPayload {
                    product_id: f.product.id,
                    quantity: 1,
                    unit_price: None,
                    discount: Some(d(10)),
                }],
                due_date: None,
                notes: None,
                tax: Some(Decimal::new(75, 1)),
                discount: None,
            })
            .await
            .unwrap();

        // 33.33 - 3.333 = 29.997, +7.5% tax = 32.246775
        let summary = f.reports.get_summary().await.unwrap();
        assert_eq!(summary.total_sales, Decimal::new(3225, 2));
        assert_eq!(summary.recent_invoices[0].grand_total, Decimal::new(32246775, 6));
    }
}
