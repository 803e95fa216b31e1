use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use storeops_core::money::{self, Money};
use storeops_core::{
    Aggregate, AggregateId, AggregateRoot, DomainError, EventSourced, aggregate_id,
};
use storeops_events::Event;

aggregate_id!(
    /// Loyalty program identifier.
    LoyaltyProgramId
);

/// A named tier reached at `required_points`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoyaltyTier {
    pub name: String,
    pub required_points: i64,
}

/// Highest tier whose threshold is at or below `points`.
pub fn tier_for(tiers: &[LoyaltyTier], points: i64) -> Option<&LoyaltyTier> {
    tiers
        .iter()
        .filter(|t| t.required_points <= points)
        .max_by_key(|t| t.required_points)
}

/// Aggregate root: LoyaltyProgram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoyaltyProgram {
    id: LoyaltyProgramId,
    name: String,
    points_per_currency_unit: Money,
    tiers: Vec<LoyaltyTier>,
    is_active: bool,
    version: u64,
    created: bool,
}

impl LoyaltyProgram {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn points_per_currency_unit(&self) -> Money {
        self.points_per_currency_unit
    }

    /// Tiers ordered by ascending threshold.
    pub fn tiers(&self) -> &[LoyaltyTier] {
        &self.tiers
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub fn ensure_active(&self) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found("loyalty program", self.id));
        }
        if !self.is_active {
            return Err(DomainError::validation(format!(
                "loyalty program {} is inactive",
                self.name
            )));
        }
        Ok(())
    }

    /// `floor(amount * points_per_currency_unit)`.
    pub fn points_for(&self, amount: Money) -> Result<i64, DomainError> {
        if amount <= Money::ZERO {
            return Ok(0);
        }
        amount
            .checked_mul(self.points_per_currency_unit)
            .and_then(money::floor_to_i64)
            .ok_or_else(|| DomainError::validation("loyalty points out of range"))
    }
}

impl AggregateRoot for LoyaltyProgram {
    type Id = LoyaltyProgramId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateProgram {
    pub program_id: LoyaltyProgramId,
    pub name: String,
    pub points_per_currency_unit: Money,
    pub tiers: Vec<LoyaltyTier>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoyaltyProgramCommand {
    Create(CreateProgram),
    Deactivate { occurred_at: DateTime<Utc> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoyaltyProgramEvent {
    ProgramCreated(CreateProgram),
    ProgramDeactivated {
        program_id: LoyaltyProgramId,
        occurred_at: DateTime<Utc>,
    },
}

impl Event for LoyaltyProgramEvent {
    fn event_type(&self) -> &'static str {
        match self {
            LoyaltyProgramEvent::ProgramCreated(_) => "loyalty.program.created",
            LoyaltyProgramEvent::ProgramDeactivated { .. } => "loyalty.program.deactivated",
        }
    }

    fn schema_version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            LoyaltyProgramEvent::ProgramCreated(e) => e.occurred_at,
            LoyaltyProgramEvent::ProgramDeactivated { occurred_at, .. } => *occurred_at,
        }
    }
}

impl Aggregate for LoyaltyProgram {
    type Command = LoyaltyProgramCommand;
    type Event = LoyaltyProgramEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            LoyaltyProgramEvent::ProgramCreated(e) => {
                self.id = e.program_id;
                self.name = e.name.clone();
                self.points_per_currency_unit = e.points_per_currency_unit;
                self.tiers = e.tiers.clone();
                self.tiers.sort_by_key(|t| t.required_points);
                self.is_active = true;
                self.created = true;
            }
            LoyaltyProgramEvent::ProgramDeactivated { .. } => self.is_active = false,
        }
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            LoyaltyProgramCommand::Create(cmd) => {
                if self.created {
                    return Err(DomainError::conflict("loyalty program already exists"));
                }
                if cmd.program_id != self.id {
                    return Err(DomainError::invariant("program_id mismatch"));
                }
                if cmd.name.trim().is_empty() {
                    return Err(DomainError::validation("name cannot be empty"));
                }
                if cmd.points_per_currency_unit.is_sign_negative() {
                    return Err(DomainError::validation(
                        "points_per_currency_unit cannot be negative",
                    ));
                }
                let mut names = HashSet::new();
                let mut thresholds = HashSet::new();
                for tier in &cmd.tiers {
                    if tier.name.trim().is_empty() {
                        return Err(DomainError::validation("tier name cannot be empty"));
                    }
                    if tier.required_points < 0 {
                        return Err(DomainError::validation(
                            "tier required_points cannot be negative",
                        ));
                    }
                    if !names.insert(tier.name.as_str()) || !thresholds.insert(tier.required_points) {
                        return Err(DomainError::validation(format!(
                            "duplicate tier {} ({} points)",
                            tier.name, tier.required_points
                        )));
                    }
                }
                Ok(vec![LoyaltyProgramEvent::ProgramCreated(CreateProgram {
                    name: cmd.name.trim().to_string(),
                    ..cmd.clone()
                })])
            }
            LoyaltyProgramCommand::Deactivate { occurred_at } => {
                if !self.created {
                    return Err(DomainError::not_found("loyalty program", self.id));
                }
                if !self.is_active {
                    return Ok(vec![]);
                }
                Ok(vec![LoyaltyProgramEvent::ProgramDeactivated {
                    program_id: self.id,
                    occurred_at: *occurred_at,
                }])
            }
        }
    }
}

impl EventSourced for LoyaltyProgram {
    const AGGREGATE_TYPE: &'static str = "loyalty.program";

    fn empty(id: AggregateId) -> Self {
        Self {
            id: LoyaltyProgramId(id),
            name: String::new(),
            points_per_currency_unit: Money::ZERO,
            tiers: Vec::new(),
            is_active: false,
            version: 0,
            created: false,
        }
    }

    fn exists(&self) -> bool {
        self.created
    }
}
