//! Point-of-sale checkout.
//!
//! One unit of work covers the receipt number, the sale, every stock
//! decrement, the payment and the loyalty postings. Any failure drops all of
//! them.

use std::collections::BTreeMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use storeops_core::{
    CustomerId, DomainError, EventSourced, LocationId, Money, ProductId, UserId, money,
};
use storeops_inventory::{
    ApplyDelta, DeltaType, InventoryRecord, InventoryRecordId, LocationKind, MovementEntry,
    ReasonCode, StockLocation,
};
use storeops_loyalty::{LoyaltyAccount, LoyaltyProgram, TransactionKind};
use storeops_sales::{
    NewSaleLine, PaymentMethod, RecordSale, Sale, SaleCommand, SaleId, SaleTotals,
};

use super::commit;
use super::ledger::apply_delta;
use super::loyalty::{default_program_id, enroll_in, enrolled, post};
use crate::error::WorkflowResult;
use crate::event_store::EventStore;
use crate::numbering::{DocumentSeries, next_number};
use crate::unit_of_work::UnitOfWork;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRequest {
    pub method: PaymentMethod,
    pub amount: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutRequest {
    pub store_id: LocationId,
    pub customer_id: Option<CustomerId>,
    pub lines: Vec<NewSaleLine>,
    pub totals: SaleTotals,
    pub payment: PaymentRequest,
    /// Points to redeem; requires a customer.
    pub redeem_points: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct CheckoutOutcome {
    pub sale: Sale,
    pub movements: Vec<MovementEntry>,
    /// The customer's account after this sale, when loyalty applied.
    pub loyalty: Option<LoyaltyAccount>,
}

#[derive(Debug, Clone)]
pub struct CheckoutService<S> {
    store: S,
}

impl<S: EventStore> CheckoutService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    #[instrument(
        skip(self, request),
        fields(store_id = %request.store_id, lines = request.lines.len(), total = %request.totals.total_amount),
        err(level = "warn")
    )]
    pub fn checkout(&self, request: CheckoutRequest, cashier_id: UserId) -> WorkflowResult<CheckoutOutcome> {
        if request.lines.is_empty() {
            return Err(DomainError::validation("a sale needs at least one item").into());
        }
        request.totals.validate()?;
        let redeem = request.redeem_points.unwrap_or(0);
        if redeem < 0 {
            return Err(DomainError::validation("redeemed points cannot be negative").into());
        }
        if redeem > 0 && request.customer_id.is_none() {
            return Err(DomainError::validation("redeeming points requires a customer").into());
        }

        let now = Utc::now();
        let mut uow = UnitOfWork::new(&self.store);
        uow.load::<StockLocation>(request.store_id.0)?
            .ensure_active_kind(LocationKind::Store)?;
        ensure_available(&mut uow, request.store_id, &request.lines)?;

        let loyalty = match request.customer_id {
            Some(customer_id) => loyalty_context(&mut uow, customer_id)?,
            None => None,
        };
        let earned = match &loyalty {
            Some((_, program)) if program.is_active() => program.points_for(request.totals.total_amount)?,
            _ => 0,
        };
        if let Some(customer_id) = request.customer_id.filter(|_| redeem > 0) {
            let available = loyalty.as_ref().map(|(account, _)| account.points()).unwrap_or(0);
            if redeem > available {
                return Err(DomainError::InsufficientLoyaltyPoints {
                    customer_id,
                    requested: redeem,
                    available,
                }
                .into());
            }
        }

        let receipt_number = next_number(&mut uow, DocumentSeries::Receipt, now)?;
        let sale_id = SaleId::new();
        uow.execute::<Sale>(
            sale_id.0,
            SaleCommand::RecordSale(RecordSale {
                sale_id,
                receipt_number: receipt_number.clone(),
                store_id: request.store_id,
                customer_id: request.customer_id,
                cashier_id,
                lines: request.lines.clone(),
                totals: request.totals,
                loyalty_points_used: redeem,
                loyalty_points_earned: earned,
                occurred_at: now,
            }),
        )?;

        let mut movements = Vec::with_capacity(request.lines.len());
        for line in &request.lines {
            movements.push(apply_delta(
                &mut uow,
                ApplyDelta {
                    product_id: line.product_id,
                    location_id: request.store_id,
                    delta_type: DeltaType::Remove,
                    quantity: line.quantity,
                    reason: ReasonCode::Sale,
                    actor_id: cashier_id,
                    reference: Some(receipt_number.clone()),
                    notes: None,
                    prices: None,
                    occurred_at: now,
                },
            )?);
        }

        if request.payment.amount > Money::ZERO {
            uow.execute::<Sale>(
                sale_id.0,
                SaleCommand::RecordPayment {
                    method: request.payment.method,
                    amount: request.payment.amount,
                    actor_id: cashier_id,
                    occurred_at: now,
                },
            )?;
        }

        let mut account_after = None;
        if let Some((account, program)) = &loyalty {
            if redeem > 0 {
                post(
                    &mut uow,
                    account,
                    program,
                    TransactionKind::Redeem,
                    redeem,
                    Some(receipt_number.clone()),
                    Some("Redeemed at checkout".to_string()),
                )?;
            }
            if earned > 0 {
                post(
                    &mut uow,
                    account,
                    program,
                    TransactionKind::Earn,
                    earned,
                    Some(receipt_number.clone()),
                    Some("Earned at checkout".to_string()),
                )?;
            }
            account_after = Some(uow.load::<LoyaltyAccount>(account.customer_id().0)?);
        }

        let sale = uow.load::<Sale>(sale_id.0)?;
        commit(uow, "sales.checkout")?;
        info!(
            receipt = %receipt_number,
            payment_status = ?sale.payment_status(),
            points_used = redeem,
            points_earned = earned,
            "sale recorded"
        );
        Ok(CheckoutOutcome {
            sale,
            movements,
            loyalty: account_after,
        })
    }

    pub fn get(&self, sale_id: SaleId) -> WorkflowResult<Sale> {
        UnitOfWork::new(&self.store).get::<Sale>(sale_id.0, "sale")
    }
}

/// Requested quantity per product against what is sellable at the store: on
/// hand minus reserved, and nothing while quarantined or damaged.
fn ensure_available<S: EventStore + ?Sized>(
    uow: &mut UnitOfWork<'_, S>,
    store_id: LocationId,
    lines: &[NewSaleLine],
) -> WorkflowResult<()> {
    let mut requested: BTreeMap<ProductId, i64> = BTreeMap::new();
    for line in lines {
        let entry = requested.entry(line.product_id).or_default();
        *entry = money::add_units(*entry, line.quantity)?;
    }
    for (product_id, quantity) in requested {
        let record = uow.load::<InventoryRecord>(InventoryRecordId::for_stock(product_id, store_id).0)?;
        let available = if record.exists() {
            record.sellable_quantity()
        } else {
            0
        };
        if available < quantity {
            return Err(DomainError::InsufficientStock {
                product_id,
                location_id: store_id,
                requested: quantity,
                available,
            }
            .into());
        }
    }
    Ok(())
}

/// The customer's account and program, enrolling into the default program
/// when the customer has no account yet. `None` when no program applies.
fn loyalty_context<S: EventStore + ?Sized>(
    uow: &mut UnitOfWork<'_, S>,
    customer_id: CustomerId,
) -> WorkflowResult<Option<(LoyaltyAccount, LoyaltyProgram)>> {
    if let Some(found) = enrolled(uow, customer_id)? {
        return Ok(Some(found));
    }
    let program = uow.load::<LoyaltyProgram>(default_program_id().0)?;
    if !program.exists() || !program.is_active() {
        return Ok(None);
    }
    let account = enroll_in(uow, customer_id, &program)?;
    Ok(Some((account, program)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use rust_decimal::Decimal;
    use storeops_sales::PaymentStatus;

    use crate::event_store::InMemoryEventStore;
    use crate::workflows::{LedgerService, LocationService, LoyaltyService, OpeningStock};

    struct Fixture {
        checkout: CheckoutService<Arc<InMemoryEventStore>>,
        ledger: LedgerService<Arc<InMemoryEventStore>>,
        loyalty: LoyaltyService<Arc<InMemoryEventStore>>,
        shop: LocationId,
        product: ProductId,
        cashier: UserId,
    }

    impl Fixture {
        fn new(on_hand: i64) -> Self {
            let store = Arc::new(InMemoryEventStore::new());
            let shop = LocationService::new(store.clone())
                .register("ST", "Store", LocationKind::Store)
                .unwrap();
            let ledger = LedgerService::new(store.clone());
            let product = ProductId::new();
            let cashier = UserId::new();
            ledger
                .receive_stock(
                    OpeningStock {
                        product_id: product,
                        location_id: shop,
                        quantity: on_hand,
                        cost_price: None,
                        retail_price: None,
                        notes: None,
                    },
                    cashier,
                )
                .unwrap();
            Self {
                checkout: CheckoutService::new(store.clone()),
                loyalty: LoyaltyService::new(store),
                ledger,
                shop,
                product,
                cashier,
            }
        }

        fn line(&self, quantity: i64) -> NewSaleLine {
            NewSaleLine {
                product_id: self.product,
                record_id: InventoryRecordId::for_stock(self.product, self.shop),
                quantity,
                unit_price: Decimal::new(1000, 2),
                discount_amount: Decimal::ZERO,
            }
        }

        fn request(&self, lines: Vec<NewSaleLine>, total: Money, paid: Money) -> CheckoutRequest {
            CheckoutRequest {
                store_id: self.shop,
                customer_id: None,
                lines,
                totals: SaleTotals {
                    subtotal: total,
                    tax_amount: Decimal::ZERO,
                    discount_amount: Decimal::ZERO,
                    total_amount: total,
                },
                payment: PaymentRequest {
                    method: PaymentMethod::Cash,
                    amount: paid,
                },
                redeem_points: None,
            }
        }

        fn on_hand(&self) -> i64 {
            self.ledger
                .record(InventoryRecordId::for_stock(self.product, self.shop))
                .unwrap()
                .quantity
        }
    }

    #[test]
    fn checkout_decrements_stock_and_records_payment() {
        let f = Fixture::new(5);
        let outcome = f
            .checkout
            .checkout(f.request(vec![f.line(2)], Decimal::new(2000, 2), Decimal::new(2000, 2)), f.cashier)
            .unwrap();

        assert!(outcome.sale.receipt_number().starts_with('S'));
        assert_eq!(outcome.sale.payment_status(), PaymentStatus::Paid);
        assert_eq!(outcome.movements[0].reason, ReasonCode::Sale);
        assert_eq!(outcome.movements[0].reference.as_deref(), Some(outcome.sale.receipt_number()));
        assert_eq!(f.on_hand(), 3);
        assert!(outcome.loyalty.is_none());
    }

    #[test]
    fn quantities_of_the_same_product_are_checked_together() {
        let f = Fixture::new(3);
        let err = f
            .checkout
            .checkout(
                f.request(vec![f.line(2), f.line(2)], Decimal::new(4000, 2), Decimal::ZERO),
                f.cashier,
            )
            .unwrap_err();
        assert!(matches!(
            err.as_domain(),
            Some(DomainError::InsufficientStock { requested: 4, available: 3, .. })
        ));
        assert_eq!(f.on_hand(), 3);
    }

    #[test]
    fn reserved_stock_is_not_sellable() {
        let f = Fixture::new(3);
        f.ledger
            .reserve(InventoryRecordId::for_stock(f.product, f.shop), 2)
            .unwrap();
        let err = f
            .checkout
            .checkout(f.request(vec![f.line(2)], Decimal::new(2000, 2), Decimal::ZERO), f.cashier)
            .unwrap_err();
        assert!(matches!(err.as_domain(), Some(DomainError::InsufficientStock { available: 1, .. })));
    }

    #[test]
    fn quarantined_stock_is_not_sellable() {
        let f = Fixture::new(3);
        f.ledger
            .quarantine(InventoryRecordId::for_stock(f.product, f.shop), "recall".to_string(), f.cashier)
            .unwrap();
        let err = f
            .checkout
            .checkout(f.request(vec![f.line(1)], Decimal::new(1000, 2), Decimal::ZERO), f.cashier)
            .unwrap_err();
        assert!(matches!(err.as_domain(), Some(DomainError::InsufficientStock { available: 0, .. })));
        assert_eq!(f.on_hand(), 3);
    }

    #[test]
    fn quantities_beyond_the_integer_range_are_validation_errors() {
        let f = Fixture::new(3);
        let err = f
            .checkout
            .checkout(
                f.request(
                    vec![f.line(i64::MAX), f.line(i64::MAX)],
                    Decimal::new(1000, 2),
                    Decimal::ZERO,
                ),
                f.cashier,
            )
            .unwrap_err();
        assert!(matches!(err.as_domain(), Some(DomainError::Validation(_))));
        assert_eq!(f.on_hand(), 3);
    }

    #[test]
    fn inconsistent_totals_are_rejected_before_anything_happens() {
        let f = Fixture::new(3);
        let mut request = f.request(vec![f.line(1)], Decimal::new(1000, 2), Decimal::ZERO);
        request.totals.total_amount = Decimal::new(1100, 2);
        let err = f.checkout.checkout(request, f.cashier).unwrap_err();
        assert!(matches!(err.as_domain(), Some(DomainError::Validation(_))));
        assert_eq!(f.on_hand(), 3);
    }

    #[test]
    fn customers_are_enrolled_and_earn_points() {
        let f = Fixture::new(5);
        f.loyalty.ensure_default_program(Decimal::ONE).unwrap();
        let customer = CustomerId::new();
        let mut request = f.request(vec![f.line(1)], Decimal::new(1050, 2), Decimal::new(500, 2));
        request.customer_id = Some(customer);

        let outcome = f.checkout.checkout(request, f.cashier).unwrap();
        assert_eq!(outcome.sale.payment_status(), PaymentStatus::Partial);
        assert_eq!(outcome.sale.loyalty_points_earned(), 10);
        assert_eq!(outcome.loyalty.map(|a| a.points()), Some(10));
        assert_eq!(f.loyalty.account(customer).unwrap().points(), 10);
    }

    #[test]
    fn redeeming_more_than_the_balance_commits_nothing() {
        let f = Fixture::new(5);
        f.loyalty.ensure_default_program(Decimal::ONE).unwrap();
        let customer = CustomerId::new();
        f.loyalty.enroll(customer, None).unwrap();
        f.loyalty
            .post_transaction(customer, TransactionKind::Bonus, 5, None, None)
            .unwrap();

        let mut request = f.request(vec![f.line(1)], Decimal::new(1000, 2), Decimal::ZERO);
        request.customer_id = Some(customer);
        request.redeem_points = Some(6);
        let err = f.checkout.checkout(request, f.cashier).unwrap_err();
        assert!(matches!(
            err.as_domain(),
            Some(DomainError::InsufficientLoyaltyPoints { requested: 6, available: 5, .. })
        ));
        assert_eq!(f.on_hand(), 5);
        assert_eq!(f.loyalty.account(customer).unwrap().points(), 5);
    }

    #[test]
    fn checkout_at_unknown_store_is_not_found() {
        let f = Fixture::new(5);
        let mut request = f.request(vec![f.line(1)], Decimal::new(1000, 2), Decimal::ZERO);
        request.store_id = LocationId::new();
        let err = f.checkout.checkout(request, f.cashier).unwrap_err();
        assert!(matches!(err.as_domain(), Some(DomainError::NotFound { entity: "location", .. })));
    }
}
