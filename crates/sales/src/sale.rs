use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use storeops_core::money::{self, Money};
use storeops_core::{
    Aggregate, AggregateId, AggregateRoot, CustomerId, DomainError, EventSourced, LocationId,
    ProductId, UserId, aggregate_id,
};
use storeops_events::Event;
use storeops_inventory::InventoryRecordId;

aggregate_id!(
    /// Sale identifier.
    SaleId
);

/// Payment status derived from amount paid versus the sale total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Unpaid,
    Partial,
    Paid,
}

impl PaymentStatus {
    pub fn of(amount_paid: Money, total: Money) -> Self {
        if amount_paid <= Money::ZERO {
            PaymentStatus::Unpaid
        } else if amount_paid >= total {
            PaymentStatus::Paid
        } else {
            PaymentStatus::Partial
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Card,
    Mobile,
    BankTransfer,
    StoreCredit,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub method: PaymentMethod,
    pub amount: Money,
    pub received_by: UserId,
    pub paid_at: DateTime<Utc>,
}

/// Caller-supplied header totals. Taxes and discounts are never computed here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleTotals {
    pub subtotal: Money,
    pub tax_amount: Money,
    pub discount_amount: Money,
    pub total_amount: Money,
}

impl SaleTotals {
    pub fn validate(&self) -> Result<(), DomainError> {
        let amounts = [
            self.subtotal,
            self.tax_amount,
            self.discount_amount,
            self.total_amount,
        ];
        if amounts.iter().all(|a| a.is_zero()) {
            return Err(DomainError::validation("sale totals cannot all be zero"));
        }
        if amounts.iter().any(|a| a.is_sign_negative()) {
            return Err(DomainError::validation("sale totals cannot be negative"));
        }
        let expected = money::add(self.subtotal, self.tax_amount)? - self.discount_amount;
        if !money::approx_eq(expected, self.total_amount) {
            return Err(DomainError::validation(format!(
                "total {} does not match subtotal + tax - discount ({})",
                self.total_amount, expected
            )));
        }
        Ok(())
    }
}

/// A line as supplied at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSaleLine {
    pub product_id: ProductId,
    pub record_id: InventoryRecordId,
    pub quantity: i64,
    pub unit_price: Money,
    pub discount_amount: Money,
}

impl NewSaleLine {
    /// `quantity * unit_price - discount_amount`.
    pub fn total_price(&self) -> Result<Money, DomainError> {
        Ok(money::extend(self.unit_price, self.quantity)? - self.discount_amount)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleLine {
    pub line_no: u32,
    pub product_id: ProductId,
    pub record_id: InventoryRecordId,
    pub quantity: i64,
    pub unit_price: Money,
    pub discount_amount: Money,
    pub total_price: Money,
    pub returned_quantity: i64,
}

impl SaleLine {
    pub fn returnable_quantity(&self) -> i64 {
        self.quantity - self.returned_quantity
    }
}

/// One line of a return request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnRequestLine {
    pub line_no: u32,
    pub quantity: i64,
}

/// A validated, priced return line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnedLine {
    pub line_no: u32,
    pub product_id: ProductId,
    pub quantity: i64,
    pub refund_amount: Money,
}

/// Result of pricing a return against the sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnQuote {
    pub lines: Vec<ReturnedLine>,
    pub refund_amount: Money,
}

/// Aggregate root: Sale.
///
/// Header and lines are immutable once recorded. The stream only grows by
/// payments and return counters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sale {
    id: SaleId,
    receipt_number: String,
    store_id: Option<LocationId>,
    customer_id: Option<CustomerId>,
    cashier_id: Option<UserId>,
    lines: Vec<SaleLine>,
    totals: SaleTotals,
    amount_paid: Money,
    payment_status: PaymentStatus,
    payments: Vec<Payment>,
    loyalty_points_used: i64,
    loyalty_points_earned: i64,
    refunded_amount: Money,
    sold_at: Option<DateTime<Utc>>,
    version: u64,
    created: bool,
}

impl Sale {
    pub fn receipt_number(&self) -> &str {
        &self.receipt_number
    }

    pub fn store_id(&self) -> Option<LocationId> {
        self.store_id
    }

    pub fn customer_id(&self) -> Option<CustomerId> {
        self.customer_id
    }

    pub fn cashier_id(&self) -> Option<UserId> {
        self.cashier_id
    }

    pub fn lines(&self) -> &[SaleLine] {
        &self.lines
    }

    pub fn totals(&self) -> &SaleTotals {
        &self.totals
    }

    pub fn amount_paid(&self) -> Money {
        self.amount_paid
    }

    pub fn payment_status(&self) -> PaymentStatus {
        self.payment_status
    }

    pub fn payments(&self) -> &[Payment] {
        &self.payments
    }

    pub fn loyalty_points_used(&self) -> i64 {
        self.loyalty_points_used
    }

    pub fn loyalty_points_earned(&self) -> i64 {
        self.loyalty_points_earned
    }

    pub fn refunded_amount(&self) -> Money {
        self.refunded_amount
    }

    pub fn sold_at(&self) -> Option<DateTime<Utc>> {
        self.sold_at
    }

    pub fn line(&self, line_no: u32) -> Option<&SaleLine> {
        self.lines.iter().find(|l| l.line_no == line_no)
    }

    /// Validate and price a return without changing state.
    ///
    /// Repeated lines are summed. Each line refunds `total_price / quantity`
    /// per unit; the overall refund is rounded to cents.
    pub fn quote_return(&self, request: &[ReturnRequestLine]) -> Result<ReturnQuote, DomainError> {
        if !self.created {
            return Err(DomainError::not_found("sale", self.id));
        }
        if request.is_empty() {
            return Err(DomainError::validation("return must contain at least one item"));
        }

        let mut requested: BTreeMap<u32, i64> = BTreeMap::new();
        for line in request {
            if line.quantity <= 0 {
                return Err(DomainError::validation("return quantity must be positive"));
            }
            let entry = requested.entry(line.line_no).or_default();
            *entry = money::add_units(*entry, line.quantity)?;
        }

        let mut lines = Vec::with_capacity(requested.len());
        let mut refund = Money::ZERO;
        for (line_no, quantity) in requested {
            let line = self
                .line(line_no)
                .ok_or_else(|| DomainError::not_found("sale item", line_no))?;
            if quantity > line.returnable_quantity() {
                return Err(DomainError::validation(format!(
                    "cannot return {quantity} of line {line_no}: {} sold, {} already returned",
                    line.quantity, line.returned_quantity
                )));
            }

            let unit_refund = line.total_price / Money::from(line.quantity);
            let line_refund = money::extend(unit_refund, quantity)?;
            refund = money::add(refund, line_refund)?;
            lines.push(ReturnedLine {
                line_no,
                product_id: line.product_id,
                quantity,
                refund_amount: money::round_money(line_refund),
            });
        }

        Ok(ReturnQuote {
            lines,
            refund_amount: money::round_money(refund),
        })
    }
}

impl AggregateRoot for Sale {
    type Id = SaleId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: RecordSale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordSale {
    pub sale_id: SaleId,
    pub receipt_number: String,
    pub store_id: LocationId,
    pub customer_id: Option<CustomerId>,
    pub cashier_id: UserId,
    pub lines: Vec<NewSaleLine>,
    pub totals: SaleTotals,
    pub loyalty_points_used: i64,
    pub loyalty_points_earned: i64,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SaleCommand {
    RecordSale(RecordSale),
    RecordPayment {
        method: PaymentMethod,
        amount: Money,
        actor_id: UserId,
        occurred_at: DateTime<Utc>,
    },
    ApplyReturn {
        return_id: AggregateId,
        lines: Vec<ReturnRequestLine>,
        occurred_at: DateTime<Utc>,
    },
}

/// Event: SaleRecorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleRecorded {
    pub sale_id: SaleId,
    pub receipt_number: String,
    pub store_id: LocationId,
    pub customer_id: Option<CustomerId>,
    pub cashier_id: UserId,
    pub lines: Vec<SaleLine>,
    pub totals: SaleTotals,
    pub loyalty_points_used: i64,
    pub loyalty_points_earned: i64,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SaleEvent {
    SaleRecorded(SaleRecorded),
    PaymentRecorded {
        sale_id: SaleId,
        payment: Payment,
        amount_paid_after: Money,
        status_after: PaymentStatus,
    },
    ReturnApplied {
        sale_id: SaleId,
        return_id: AggregateId,
        lines: Vec<ReturnedLine>,
        refund_amount: Money,
        occurred_at: DateTime<Utc>,
    },
}

impl Event for SaleEvent {
    fn event_type(&self) -> &'static str {
        match self {
            SaleEvent::SaleRecorded(_) => "sales.sale.recorded",
            SaleEvent::PaymentRecorded { .. } => "sales.sale.payment_recorded",
            SaleEvent::ReturnApplied { .. } => "sales.sale.return_applied",
        }
    }

    fn schema_version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            SaleEvent::SaleRecorded(e) => e.occurred_at,
            SaleEvent::PaymentRecorded { payment, .. } => payment.paid_at,
            SaleEvent::ReturnApplied { occurred_at, .. } => *occurred_at,
        }
    }
}

impl Aggregate for Sale {
    type Command = SaleCommand;
    type Event = SaleEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            SaleEvent::SaleRecorded(e) => {
                self.id = e.sale_id;
                self.receipt_number = e.receipt_number.clone();
                self.store_id = Some(e.store_id);
                self.customer_id = e.customer_id;
                self.cashier_id = Some(e.cashier_id);
                self.lines = e.lines.clone();
                self.totals = e.totals;
                self.loyalty_points_used = e.loyalty_points_used;
                self.loyalty_points_earned = e.loyalty_points_earned;
                self.sold_at = Some(e.occurred_at);
                self.payment_status = PaymentStatus::Unpaid;
                self.created = true;
            }
            SaleEvent::PaymentRecorded {
                payment,
                amount_paid_after,
                status_after,
                ..
            } => {
                self.payments.push(payment.clone());
                self.amount_paid = *amount_paid_after;
                self.payment_status = *status_after;
            }
            SaleEvent::ReturnApplied {
                lines,
                refund_amount,
                ..
            } => {
                for returned in lines {
                    if let Some(line) = self.lines.iter_mut().find(|l| l.line_no == returned.line_no) {
                        line.returned_quantity += returned.quantity;
                    }
                }
                self.refunded_amount += *refund_amount;
            }
        }
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            SaleCommand::RecordSale(cmd) => self.handle_record(cmd),
            SaleCommand::RecordPayment {
                method,
                amount,
                actor_id,
                occurred_at,
            } => {
                if !self.created {
                    return Err(DomainError::not_found("sale", self.id));
                }
                if *amount <= Money::ZERO {
                    return Err(DomainError::validation("payment amount must be positive"));
                }
                // Over-payment is accepted; change is given at the till.
                let amount_paid_after = money::add(self.amount_paid, *amount)?;
                Ok(vec![SaleEvent::PaymentRecorded {
                    sale_id: self.id,
                    payment: Payment {
                        method: *method,
                        amount: *amount,
                        received_by: *actor_id,
                        paid_at: *occurred_at,
                    },
                    amount_paid_after,
                    status_after: PaymentStatus::of(amount_paid_after, self.totals.total_amount),
                }])
            }
            SaleCommand::ApplyReturn {
                return_id,
                lines,
                occurred_at,
            } => {
                let quote = self.quote_return(lines)?;
                money::add(self.refunded_amount, quote.refund_amount)?;
                Ok(vec![SaleEvent::ReturnApplied {
                    sale_id: self.id,
                    return_id: *return_id,
                    lines: quote.lines,
                    refund_amount: quote.refund_amount,
                    occurred_at: *occurred_at,
                }])
            }
        }
    }
}

impl Sale {
    fn handle_record(&self, cmd: &RecordSale) -> Result<Vec<SaleEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("sale already recorded"));
        }
        if cmd.sale_id != self.id {
            return Err(DomainError::invariant("sale_id mismatch"));
        }
        if cmd.receipt_number.trim().is_empty() {
            return Err(DomainError::validation("receipt_number cannot be empty"));
        }
        if cmd.lines.is_empty() {
            return Err(DomainError::validation("sale must contain at least one item"));
        }
        if cmd.loyalty_points_used < 0 || cmd.loyalty_points_earned < 0 {
            return Err(DomainError::validation("loyalty points cannot be negative"));
        }
        cmd.totals.validate()?;

        let mut lines = Vec::with_capacity(cmd.lines.len());
        for (idx, line) in cmd.lines.iter().enumerate() {
            if line.quantity <= 0 {
                return Err(DomainError::validation("quantity must be positive"));
            }
            if line.unit_price.is_sign_negative() || line.discount_amount.is_sign_negative() {
                return Err(DomainError::validation(
                    "unit_price and discount_amount cannot be negative",
                ));
            }
            if line.record_id != InventoryRecordId::for_stock(line.product_id, cmd.store_id) {
                return Err(DomainError::validation(format!(
                    "inventory item {} does not hold product {} at store {}",
                    line.record_id, line.product_id, cmd.store_id
                )));
            }
            let total_price = line.total_price()?;
            if total_price.is_sign_negative() {
                return Err(DomainError::validation(
                    "line discount exceeds the line amount",
                ));
            }
            lines.push(SaleLine {
                line_no: idx as u32 + 1,
                product_id: line.product_id,
                record_id: line.record_id,
                quantity: line.quantity,
                unit_price: line.unit_price,
                discount_amount: line.discount_amount,
                total_price,
                returned_quantity: 0,
            });
        }

        Ok(vec![SaleEvent::SaleRecorded(SaleRecorded {
            sale_id: cmd.sale_id,
            receipt_number: cmd.receipt_number.clone(),
            store_id: cmd.store_id,
            customer_id: cmd.customer_id,
            cashier_id: cmd.cashier_id,
            lines,
            totals: cmd.totals,
            loyalty_points_used: cmd.loyalty_points_used,
            loyalty_points_earned: cmd.loyalty_points_earned,
            occurred_at: cmd.occurred_at,
        })])
    }
}

impl EventSourced for Sale {
    const AGGREGATE_TYPE: &'static str = "sales.sale";

    fn empty(id: AggregateId) -> Self {
        Self {
            id: SaleId(id),
            receipt_number: String::new(),
            store_id: None,
            customer_id: None,
            cashier_id: None,
            lines: Vec::new(),
            totals: SaleTotals {
                subtotal: Money::ZERO,
                tax_amount: Money::ZERO,
                discount_amount: Money::ZERO,
                total_amount: Money::ZERO,
            },
            amount_paid: Money::ZERO,
            payment_status: PaymentStatus::Unpaid,
            payments: Vec::new(),
            loyalty_points_used: 0,
            loyalty_points_earned: 0,
            refunded_amount: Money::ZERO,
            sold_at: None,
            version: 0,
            created: false,
        }
    }

    fn exists(&self) -> bool {
        self.created
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Money {
        s.parse().unwrap()
    }

    fn totals(subtotal: &str, tax: &str, discount: &str, total: &str) -> SaleTotals {
        SaleTotals {
            subtotal: dec(subtotal),
            tax_amount: dec(tax),
            discount_amount: dec(discount),
            total_amount: dec(total),
        }
    }

    fn sale_line(store: LocationId, quantity: i64, unit_price: &str) -> NewSaleLine {
        let product_id = ProductId::new();
        NewSaleLine {
            product_id,
            record_id: InventoryRecordId::for_stock(product_id, store),
            quantity,
            unit_price: dec(unit_price),
            discount_amount: Money::ZERO,
        }
    }

    fn record(lines: Vec<NewSaleLine>, store_id: LocationId, totals: SaleTotals) -> Result<Sale, DomainError> {
        let sale_id = SaleId::new();
        let mut sale = Sale::empty(sale_id.0);
        let events = sale.handle(&SaleCommand::RecordSale(RecordSale {
            sale_id,
            receipt_number: "S260101-0001".to_string(),
            store_id,
            customer_id: None,
            cashier_id: UserId::new(),
            lines,
            totals,
            loyalty_points_used: 0,
            loyalty_points_earned: 0,
            occurred_at: Utc::now(),
        }))?;
        for e in &events {
            sale.apply(e);
        }
        Ok(sale)
    }

    fn pay(sale: &mut Sale, amount: &str) -> Result<(), DomainError> {
        let events = sale.handle(&SaleCommand::RecordPayment {
            method: PaymentMethod::Cash,
            amount: dec(amount),
            actor_id: UserId::new(),
            occurred_at: Utc::now(),
        })?;
        for e in &events {
            sale.apply(e);
        }
        Ok(())
    }

    #[test]
    fn totals_must_reconcile_within_a_cent() {
        assert!(totals("10.00", "1.00", "0.50", "10.50").validate().is_ok());
        assert!(totals("10.00", "1.00", "0.50", "10.51").validate().is_ok());
        assert!(totals("10.00", "1.00", "0.50", "10.60").validate().is_err());
        assert!(totals("0", "0", "0", "0").validate().is_err());
    }

    #[test]
    fn record_sale_numbers_lines_and_computes_line_totals() {
        let store = LocationId::new();
        let mut line = sale_line(store, 3, "2.50");
        line.discount_amount = dec("0.50");
        let sale = record(vec![line], store, totals("7.00", "0", "0", "7.00")).unwrap();

        assert_eq!(sale.lines()[0].line_no, 1);
        assert_eq!(sale.lines()[0].total_price, dec("7.00"));
        assert_eq!(sale.payment_status(), PaymentStatus::Unpaid);
    }

    #[test]
    fn record_sale_rejects_mismatched_inventory_item() {
        let store = LocationId::new();
        let line = sale_line(LocationId::new(), 1, "5");
        let err = record(vec![line], store, totals("5", "0", "0", "5")).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn payments_drive_payment_status() {
        let store = LocationId::new();
        let mut sale = record(
            vec![sale_line(store, 2, "5.00")],
            store,
            totals("10.00", "0", "0", "10.00"),
        )
        .unwrap();

        pay(&mut sale, "4.00").unwrap();
        assert_eq!(sale.payment_status(), PaymentStatus::Partial);
        pay(&mut sale, "7.00").unwrap();
        assert_eq!(sale.payment_status(), PaymentStatus::Paid);
        assert_eq!(sale.amount_paid(), dec("11.00"));
        assert_eq!(sale.payments().len(), 2);
    }

    #[test]
    fn returns_are_bounded_by_sold_quantity() {
        let store = LocationId::new();
        let mut sale = record(
            vec![sale_line(store, 3, "10.00")],
            store,
            totals("30.00", "0", "0", "30.00"),
        )
        .unwrap();

        let quote = sale
            .quote_return(&[ReturnRequestLine { line_no: 1, quantity: 2 }])
            .unwrap();
        assert_eq!(quote.refund_amount, dec("20.00"));

        let events = sale
            .handle(&SaleCommand::ApplyReturn {
                return_id: AggregateId::new(),
                lines: vec![ReturnRequestLine { line_no: 1, quantity: 2 }],
                occurred_at: Utc::now(),
            })
            .unwrap();
        for e in &events {
            sale.apply(e);
        }
        assert_eq!(sale.lines()[0].returned_quantity, 2);
        assert_eq!(sale.refunded_amount(), dec("20.00"));

        let err = sale
            .quote_return(&[ReturnRequestLine { line_no: 1, quantity: 2 }])
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn oversized_amounts_are_rejected_not_panicking() {
        let huge = SaleTotals {
            subtotal: Money::MAX,
            tax_amount: Money::MAX,
            discount_amount: Money::ZERO,
            total_amount: Money::MAX,
        };
        assert!(matches!(huge.validate(), Err(DomainError::Validation(_))));

        let store = LocationId::new();
        let mut line = sale_line(store, i64::MAX, "0");
        line.unit_price = Money::MAX;
        let err = record(vec![line], store, totals("1", "0", "0", "1")).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn repeated_return_lines_are_summed_with_overflow_checks() {
        let store = LocationId::new();
        let sale = record(
            vec![sale_line(store, 3, "10.00")],
            store,
            totals("30.00", "0", "0", "30.00"),
        )
        .unwrap();

        let err = sale
            .quote_return(&[
                ReturnRequestLine { line_no: 1, quantity: i64::MAX },
                ReturnRequestLine { line_no: 1, quantity: i64::MAX },
            ])
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn refund_uses_discounted_unit_price() {
        let store = LocationId::new();
        let mut line = sale_line(store, 3, "10.00");
        line.discount_amount = dec("1.00");
        let sale = record(vec![line], store, totals("29.00", "0", "0", "29.00")).unwrap();

        let quote = sale
            .quote_return(&[ReturnRequestLine { line_no: 1, quantity: 1 }])
            .unwrap();
        assert_eq!(quote.refund_amount, dec("9.67"));
    }

    #[test]
    fn sale_cannot_be_recorded_twice() {
        let store = LocationId::new();
        let sale = record(
            vec![sale_line(store, 1, "1.00")],
            store,
            totals("1.00", "0", "0", "1.00"),
        )
        .unwrap();
        let err = sale
            .handle(&SaleCommand::RecordSale(RecordSale {
                sale_id: *sale.id(),
                receipt_number: "S260101-0002".to_string(),
                store_id: store,
                customer_id: None,
                cashier_id: UserId::new(),
                lines: vec![sale_line(store, 1, "1.00")],
                totals: totals("1.00", "0", "0", "1.00"),
                loyalty_points_used: 0,
                loyalty_points_earned: 0,
                occurred_at: Utc::now(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn full_return_refunds_the_line_total(
                quantity in 1i64..50,
                cents in 0i64..100_000,
                discount_cents in 0i64..1_000,
            ) {
                let store = LocationId::new();
                let mut line = sale_line(store, quantity, "0");
                line.unit_price = Money::new(cents, 2);
                line.discount_amount = Money::new(discount_cents, 2).min(line.unit_price * Money::from(quantity));
                let total = line.total_price().unwrap();
                prop_assume!(total > Money::ZERO);

                let sale = record(
                    vec![line],
                    store,
                    SaleTotals {
                        subtotal: total,
                        tax_amount: Money::ZERO,
                        discount_amount: Money::ZERO,
                        total_amount: total,
                    },
                )
                .unwrap();

                let quote = sale
                    .quote_return(&[ReturnRequestLine { line_no: 1, quantity }])
                    .unwrap();
                prop_assert!(money::approx_eq(quote.refund_amount, total));
            }
        }
    }
}
