use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use storeops_core::{
    Aggregate, AggregateId, AggregateRoot, CustomerId, DomainError, EventSourced, money,
};
use storeops_events::Event;

use crate::program::{LoyaltyProgramId, LoyaltyTier, tier_for};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionKind {
    Earn,
    Redeem,
    Bonus,
    Adjust,
    Expire,
}

impl TransactionKind {
    /// Signed balance change for a posting of `points`.
    ///
    /// EARN/BONUS/REDEEM/EXPIRE take a positive magnitude; ADJUST is signed.
    pub fn signed_points(self, points: i64) -> Result<i64, DomainError> {
        match self {
            TransactionKind::Earn | TransactionKind::Bonus if points > 0 => Ok(points),
            TransactionKind::Redeem | TransactionKind::Expire if points > 0 => Ok(-points),
            TransactionKind::Adjust if points == i64::MIN => {
                Err(DomainError::overflow(format!("adjustment of {points} points")))
            }
            TransactionKind::Adjust if points != 0 => Ok(points),
            TransactionKind::Adjust => Err(DomainError::validation("adjustment cannot be zero")),
            _ => Err(DomainError::validation(format!(
                "{self:?} points must be positive"
            ))),
        }
    }
}

/// One posted loyalty transaction. `points` is signed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoyaltyTransaction {
    pub sequence: u64,
    pub customer_id: CustomerId,
    pub program_id: LoyaltyProgramId,
    pub kind: TransactionKind,
    pub points: i64,
    pub reference: Option<String>,
    pub description: Option<String>,
    pub balance_after: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Aggregate root: LoyaltyAccount, one stream per customer.
///
/// `points() == transactions().map(|t| t.points).sum()` at every version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoyaltyAccount {
    id: CustomerId,
    program_id: Option<LoyaltyProgramId>,
    points: i64,
    tier: Option<String>,
    transactions: Vec<LoyaltyTransaction>,
    enrolled_at: Option<DateTime<Utc>>,
    version: u64,
    created: bool,
}

impl LoyaltyAccount {
    pub fn customer_id(&self) -> CustomerId {
        self.id
    }

    pub fn program_id(&self) -> Option<LoyaltyProgramId> {
        self.program_id
    }

    pub fn points(&self) -> i64 {
        self.points
    }

    pub fn tier(&self) -> Option<&str> {
        self.tier.as_deref()
    }

    pub fn transactions(&self) -> &[LoyaltyTransaction] {
        &self.transactions
    }

    pub fn enrolled_at(&self) -> Option<DateTime<Utc>> {
        self.enrolled_at
    }
}

impl AggregateRoot for LoyaltyAccount {
    type Id = CustomerId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostTransaction {
    pub kind: TransactionKind,
    pub points: i64,
    pub reference: Option<String>,
    pub description: Option<String>,
    /// Tier table of the account's program, used to re-evaluate the tier.
    pub tiers: Vec<LoyaltyTier>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoyaltyAccountCommand {
    Enroll {
        customer_id: CustomerId,
        program_id: LoyaltyProgramId,
        tiers: Vec<LoyaltyTier>,
        occurred_at: DateTime<Utc>,
    },
    PostTransaction(PostTransaction),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoyaltyAccountEvent {
    Enrolled {
        customer_id: CustomerId,
        program_id: LoyaltyProgramId,
        occurred_at: DateTime<Utc>,
    },
    TransactionPosted(LoyaltyTransaction),
    TierChanged {
        customer_id: CustomerId,
        from: Option<String>,
        to: Option<String>,
        occurred_at: DateTime<Utc>,
    },
}

impl Event for LoyaltyAccountEvent {
    fn event_type(&self) -> &'static str {
        match self {
            LoyaltyAccountEvent::Enrolled { .. } => "loyalty.account.enrolled",
            LoyaltyAccountEvent::TransactionPosted(_) => "loyalty.account.transaction_posted",
            LoyaltyAccountEvent::TierChanged { .. } => "loyalty.account.tier_changed",
        }
    }

    fn schema_version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            LoyaltyAccountEvent::TransactionPosted(t) => t.occurred_at,
            LoyaltyAccountEvent::Enrolled { occurred_at, .. }
            | LoyaltyAccountEvent::TierChanged { occurred_at, .. } => *occurred_at,
        }
    }
}

impl Aggregate for LoyaltyAccount {
    type Command = LoyaltyAccountCommand;
    type Event = LoyaltyAccountEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            LoyaltyAccountEvent::Enrolled {
                customer_id,
                program_id,
                occurred_at,
            } => {
                self.id = *customer_id;
                self.program_id = Some(*program_id);
                self.enrolled_at = Some(*occurred_at);
                self.created = true;
            }
            LoyaltyAccountEvent::TransactionPosted(t) => {
                self.points += t.points;
                self.transactions.push(t.clone());
            }
            LoyaltyAccountEvent::TierChanged { to, .. } => self.tier = to.clone(),
        }
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            LoyaltyAccountCommand::Enroll {
                customer_id,
                program_id,
                tiers,
                occurred_at,
            } => {
                if self.created {
                    return Err(DomainError::conflict(format!(
                        "customer {customer_id} is already enrolled"
                    )));
                }
                if *customer_id != self.id {
                    return Err(DomainError::invariant("customer_id mismatch"));
                }
                let mut events = vec![LoyaltyAccountEvent::Enrolled {
                    customer_id: *customer_id,
                    program_id: *program_id,
                    occurred_at: *occurred_at,
                }];
                if let Some(entry) = tier_for(tiers, 0) {
                    events.push(LoyaltyAccountEvent::TierChanged {
                        customer_id: *customer_id,
                        from: None,
                        to: Some(entry.name.clone()),
                        occurred_at: *occurred_at,
                    });
                }
                Ok(events)
            }
            LoyaltyAccountCommand::PostTransaction(cmd) => self.handle_post(cmd),
        }
    }
}

impl LoyaltyAccount {
    fn handle_post(&self, cmd: &PostTransaction) -> Result<Vec<LoyaltyAccountEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found("loyalty account", self.id));
        }
        let program_id = self
            .program_id
            .ok_or_else(|| DomainError::invariant("enrolled account without program"))?;

        let delta = cmd.kind.signed_points(cmd.points)?;
        let balance_after = money::add_units(self.points, delta)?;
        if balance_after < 0 {
            return Err(DomainError::InsufficientLoyaltyPoints {
                customer_id: self.id,
                requested: -delta,
                available: self.points,
            });
        }

        let mut events = vec![LoyaltyAccountEvent::TransactionPosted(LoyaltyTransaction {
            sequence: self.transactions.len() as u64 + 1,
            customer_id: self.id,
            program_id,
            kind: cmd.kind,
            points: delta,
            reference: cmd.reference.clone(),
            description: cmd.description.clone(),
            balance_after,
            occurred_at: cmd.occurred_at,
        })];

        let next_tier = tier_for(&cmd.tiers, balance_after).map(|t| t.name.clone());
        if next_tier != self.tier {
            events.push(LoyaltyAccountEvent::TierChanged {
                customer_id: self.id,
                from: self.tier.clone(),
                to: next_tier,
                occurred_at: cmd.occurred_at,
            });
        }
        Ok(events)
    }
}

impl EventSourced for LoyaltyAccount {
    const AGGREGATE_TYPE: &'static str = "loyalty.account";

    fn empty(id: AggregateId) -> Self {
        Self {
            id: CustomerId(id),
            program_id: None,
            points: 0,
            tier: None,
            transactions: Vec::new(),
            enrolled_at: None,
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
    use proptest::prelude::*;

    fn tiers() -> Vec<LoyaltyTier> {
        vec![
            LoyaltyTier {
                name: "Bronze".to_string(),
                required_points: 0,
            },
            LoyaltyTier {
                name: "Silver".to_string(),
                required_points: 100,
            },
        ]
    }

    fn enrolled() -> LoyaltyAccount {
        let customer_id = CustomerId::new();
        let mut account = LoyaltyAccount::empty(customer_id.0);
        let events = account
            .handle(&LoyaltyAccountCommand::Enroll {
                customer_id,
                program_id: LoyaltyProgramId::new(),
                tiers: tiers(),
                occurred_at: Utc::now(),
            })
            .unwrap();
        for e in &events {
            account.apply(e);
        }
        account
    }

    fn post(account: &mut LoyaltyAccount, kind: TransactionKind, points: i64) -> Result<(), DomainError> {
        let events = account.handle(&LoyaltyAccountCommand::PostTransaction(PostTransaction {
            kind,
            points,
            reference: None,
            description: None,
            tiers: tiers(),
            occurred_at: Utc::now(),
        }))?;
        for e in &events {
            account.apply(e);
        }
        Ok(())
    }

    #[test]
    fn enrolment_assigns_entry_tier() {
        let account = enrolled();
        assert_eq!(account.tier(), Some("Bronze"));
        assert_eq!(account.points(), 0);
    }

    #[test]
    fn earning_promotes_and_redeeming_demotes() {
        let mut account = enrolled();
        post(&mut account, TransactionKind::Earn, 120).unwrap();
        assert_eq!(account.tier(), Some("Silver"));

        post(&mut account, TransactionKind::Redeem, 30).unwrap();
        assert_eq!(account.points(), 90);
        assert_eq!(account.tier(), Some("Bronze"));
        assert_eq!(account.transactions()[1].points, -30);
        assert_eq!(account.transactions()[1].balance_after, 90);
    }

    #[test]
    fn redeeming_more_than_the_balance_fails() {
        let mut account = enrolled();
        post(&mut account, TransactionKind::Earn, 10).unwrap();
        let before = account.clone();

        let err = post(&mut account, TransactionKind::Redeem, 11).unwrap_err();
        assert_eq!(
            err,
            DomainError::InsufficientLoyaltyPoints {
                customer_id: account.customer_id(),
                requested: 11,
                available: 10,
            }
        );
        assert_eq!(account, before);
    }

    #[test]
    fn negative_adjustment_cannot_overdraw() {
        let mut account = enrolled();
        post(&mut account, TransactionKind::Bonus, 5).unwrap();
        assert!(post(&mut account, TransactionKind::Adjust, -6).is_err());
        post(&mut account, TransactionKind::Adjust, -5).unwrap();
        assert_eq!(account.points(), 0);
    }

    #[test]
    fn postings_beyond_the_point_range_are_rejected() {
        let mut account = enrolled();
        post(&mut account, TransactionKind::Bonus, i64::MAX).unwrap();
        let before = account.clone();

        let err = post(&mut account, TransactionKind::Bonus, i64::MAX).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
        assert_eq!(account, before);

        let err = post(&mut account, TransactionKind::Adjust, i64::MIN).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
        assert_eq!(account.points(), i64::MAX);
    }

    #[test]
    fn magnitudes_must_be_positive() {
        let mut account = enrolled();
        assert!(matches!(
            post(&mut account, TransactionKind::Earn, -1),
            Err(DomainError::Validation(_))
        ));
        assert!(matches!(
            post(&mut account, TransactionKind::Adjust, 0),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn posting_requires_enrolment() {
        let mut account = LoyaltyAccount::empty(AggregateId::new());
        assert!(matches!(
            post(&mut account, TransactionKind::Earn, 1),
            Err(DomainError::NotFound { .. })
        ));
    }

    fn kind_strategy() -> impl Strategy<Value = TransactionKind> {
        prop_oneof![
            Just(TransactionKind::Earn),
            Just(TransactionKind::Redeem),
            Just(TransactionKind::Bonus),
            Just(TransactionKind::Adjust),
            Just(TransactionKind::Expire),
        ]
    }

    proptest! {
        #[test]
        fn balance_always_equals_sum_of_transactions(
            ops in prop::collection::vec((kind_strategy(), -200i64..200), 0..60)
        ) {
            let mut account = enrolled();
            for (kind, points) in ops {
                let _ = post(&mut account, kind, points);
                let sum: i64 = account.transactions().iter().map(|t| t.points).sum();
                prop_assert_eq!(account.points(), sum);
                prop_assert!(account.points() >= 0);
            }
        }
    }
}
