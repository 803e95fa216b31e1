//! Loyalty programs and accounts.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use storeops_core::{AggregateId, AggregateRoot, CustomerId, DomainError, EventSourced, Money};
use storeops_loyalty::{
    CreateProgram, LoyaltyAccount, LoyaltyAccountCommand, LoyaltyProgram, LoyaltyProgramCommand,
    LoyaltyProgramId, LoyaltyTier, PostTransaction, TransactionKind,
};

use super::commit;
use crate::error::WorkflowResult;
use crate::event_store::EventStore;
use crate::unit_of_work::UnitOfWork;

pub const DEFAULT_PROGRAM_NAME: &str = "Default";

/// Stream id of the program checkout enrolls new customers into.
pub fn default_program_id() -> LoyaltyProgramId {
    LoyaltyProgramId(AggregateId::derived(LoyaltyProgram::AGGREGATE_TYPE, "default"))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProgram {
    pub name: String,
    pub points_per_currency_unit: Money,
    #[serde(default)]
    pub tiers: Vec<LoyaltyTier>,
}

/// Post one transaction to an enrolled account within `uow`, using the tier
/// table of the account's program.
pub(crate) fn post<S: EventStore + ?Sized>(
    uow: &mut UnitOfWork<'_, S>,
    account: &LoyaltyAccount,
    program: &LoyaltyProgram,
    kind: TransactionKind,
    points: i64,
    reference: Option<String>,
    description: Option<String>,
) -> WorkflowResult<()> {
    uow.execute::<LoyaltyAccount>(
        account.customer_id().0,
        LoyaltyAccountCommand::PostTransaction(PostTransaction {
            kind,
            points,
            reference,
            description,
            tiers: program.tiers().to_vec(),
            occurred_at: Utc::now(),
        }),
    )?;
    Ok(())
}

/// The customer's account and its program, if the customer is enrolled.
pub(crate) fn enrolled<S: EventStore + ?Sized>(
    uow: &mut UnitOfWork<'_, S>,
    customer_id: CustomerId,
) -> WorkflowResult<Option<(LoyaltyAccount, LoyaltyProgram)>> {
    let account = uow.load::<LoyaltyAccount>(customer_id.0)?;
    if !account.exists() {
        return Ok(None);
    }
    let program_id = account
        .program_id()
        .ok_or_else(|| DomainError::invariant("enrolled account without program"))?;
    let program = uow.get::<LoyaltyProgram>(program_id.0, "loyalty program")?;
    Ok(Some((account, program)))
}

/// Enroll `customer_id` into `program` within `uow`.
pub(crate) fn enroll_in<S: EventStore + ?Sized>(
    uow: &mut UnitOfWork<'_, S>,
    customer_id: CustomerId,
    program: &LoyaltyProgram,
) -> WorkflowResult<LoyaltyAccount> {
    program.ensure_active()?;
    uow.execute::<LoyaltyAccount>(
        customer_id.0,
        LoyaltyAccountCommand::Enroll {
            customer_id,
            program_id: *program.id(),
            tiers: program.tiers().to_vec(),
            occurred_at: Utc::now(),
        },
    )?;
    uow.load::<LoyaltyAccount>(customer_id.0)
}

#[derive(Debug, Clone)]
pub struct LoyaltyService<S> {
    store: S,
}

impl<S: EventStore> LoyaltyService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    #[instrument(skip(self, program), fields(name = %program.name), err(level = "warn"))]
    pub fn create_program(&self, program: NewProgram) -> WorkflowResult<LoyaltyProgram> {
        self.create_program_with_id(LoyaltyProgramId::new(), program)
    }

    /// Create the default program unless it already exists.
    #[instrument(skip(self), err(level = "warn"))]
    pub fn ensure_default_program(&self, points_per_currency_unit: Money) -> WorkflowResult<LoyaltyProgram> {
        let program_id = default_program_id();
        let existing = UnitOfWork::new(&self.store).load::<LoyaltyProgram>(program_id.0)?;
        if existing.exists() {
            return Ok(existing);
        }
        let program = self.create_program_with_id(
            program_id,
            NewProgram {
                name: DEFAULT_PROGRAM_NAME.to_string(),
                points_per_currency_unit,
                tiers: Vec::new(),
            },
        )?;
        info!(%points_per_currency_unit, "default loyalty program created");
        Ok(program)
    }

    #[instrument(skip(self), err(level = "warn"))]
    pub fn deactivate_program(&self, program_id: LoyaltyProgramId) -> WorkflowResult<LoyaltyProgram> {
        let mut uow = UnitOfWork::new(&self.store);
        uow.get::<LoyaltyProgram>(program_id.0, "loyalty program")?;
        uow.execute::<LoyaltyProgram>(
            program_id.0,
            LoyaltyProgramCommand::Deactivate {
                occurred_at: Utc::now(),
            },
        )?;
        let program = uow.load::<LoyaltyProgram>(program_id.0)?;
        commit(uow, "loyalty.deactivate_program")?;
        Ok(program)
    }

    pub fn program(&self, program_id: LoyaltyProgramId) -> WorkflowResult<LoyaltyProgram> {
        UnitOfWork::new(&self.store).get::<LoyaltyProgram>(program_id.0, "loyalty program")
    }

    /// Enroll a customer; the default program when none is given.
    #[instrument(skip(self), err(level = "warn"))]
    pub fn enroll(
        &self,
        customer_id: CustomerId,
        program_id: Option<LoyaltyProgramId>,
    ) -> WorkflowResult<LoyaltyAccount> {
        let program_id = program_id.unwrap_or_else(default_program_id);
        let mut uow = UnitOfWork::new(&self.store);
        let program = uow.get::<LoyaltyProgram>(program_id.0, "loyalty program")?;
        let account = enroll_in(&mut uow, customer_id, &program)?;
        commit(uow, "loyalty.enroll")?;
        Ok(account)
    }

    /// Manual BONUS / ADJUST / EXPIRE posting. EARN and REDEEM belong to
    /// checkout.
    #[instrument(skip(self, reference, description), err(level = "warn"))]
    pub fn post_transaction(
        &self,
        customer_id: CustomerId,
        kind: TransactionKind,
        points: i64,
        reference: Option<String>,
        description: Option<String>,
    ) -> WorkflowResult<LoyaltyAccount> {
        if matches!(kind, TransactionKind::Earn | TransactionKind::Redeem) {
            return Err(DomainError::validation(format!(
                "{kind:?} transactions are posted by checkout"
            ))
            .into());
        }
        let mut uow = UnitOfWork::new(&self.store);
        let (account, program) = enrolled(&mut uow, customer_id)?
            .ok_or_else(|| DomainError::not_found("loyalty account", customer_id))?;
        post(&mut uow, &account, &program, kind, points, reference, description)?;
        let account = uow.load::<LoyaltyAccount>(customer_id.0)?;
        commit(uow, "loyalty.post_transaction")?;
        Ok(account)
    }

    pub fn account(&self, customer_id: CustomerId) -> WorkflowResult<LoyaltyAccount> {
        UnitOfWork::new(&self.store).get::<LoyaltyAccount>(customer_id.0, "loyalty account")
    }

    fn create_program_with_id(
        &self,
        program_id: LoyaltyProgramId,
        program: NewProgram,
    ) -> WorkflowResult<LoyaltyProgram> {
        let mut uow = UnitOfWork::new(&self.store);
        uow.execute::<LoyaltyProgram>(
            program_id.0,
            LoyaltyProgramCommand::Create(CreateProgram {
                program_id,
                name: program.name,
                points_per_currency_unit: program.points_per_currency_unit,
                tiers: program.tiers,
                occurred_at: Utc::now(),
            }),
        )?;
        let created = uow.load::<LoyaltyProgram>(program_id.0)?;
        commit(uow, "loyalty.create_program")?;
        Ok(created)
    }
}
