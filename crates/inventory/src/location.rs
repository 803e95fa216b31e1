use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use storeops_core::{
    Aggregate, AggregateId, AggregateRoot, DomainError, EventSourced, LocationId,
};
use storeops_events::Event;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LocationKind {
    Warehouse,
    Store,
}

/// Aggregate root: StockLocation.
///
/// Locations are never deleted; deactivation only blocks new workflow activity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockLocation {
    id: LocationId,
    code: String,
    name: String,
    kind: LocationKind,
    is_active: bool,
    version: u64,
    created: bool,
}

impl StockLocation {
    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> LocationKind {
        self.kind
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    /// Reject new workflow activity at an inactive location.
    pub fn ensure_active(&self) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found("location", self.id));
        }
        if !self.is_active {
            return Err(DomainError::validation(format!(
                "location {} ({}) is inactive",
                self.code, self.id
            )));
        }
        Ok(())
    }

    /// Require an active location of the given kind.
    pub fn ensure_active_kind(&self, kind: LocationKind) -> Result<(), DomainError> {
        self.ensure_active()?;
        if self.kind != kind {
            return Err(DomainError::validation(format!(
                "location {} is a {:?}, expected a {:?}",
                self.code, self.kind, kind
            )));
        }
        Ok(())
    }
}

impl AggregateRoot for StockLocation {
    type Id = LocationId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterLocation {
    pub location_id: LocationId,
    pub code: String,
    pub name: String,
    pub kind: LocationKind,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LocationCommand {
    Register(RegisterLocation),
    Deactivate { occurred_at: DateTime<Utc> },
    Reactivate { occurred_at: DateTime<Utc> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationRegistered {
    pub location_id: LocationId,
    pub code: String,
    pub name: String,
    pub kind: LocationKind,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LocationEvent {
    Registered(LocationRegistered),
    Deactivated {
        location_id: LocationId,
        occurred_at: DateTime<Utc>,
    },
    Reactivated {
        location_id: LocationId,
        occurred_at: DateTime<Utc>,
    },
}

impl Event for LocationEvent {
    fn event_type(&self) -> &'static str {
        match self {
            LocationEvent::Registered(_) => "inventory.location.registered",
            LocationEvent::Deactivated { .. } => "inventory.location.deactivated",
            LocationEvent::Reactivated { .. } => "inventory.location.reactivated",
        }
    }

    fn schema_version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            LocationEvent::Registered(e) => e.occurred_at,
            LocationEvent::Deactivated { occurred_at, .. } => *occurred_at,
            LocationEvent::Reactivated { occurred_at, .. } => *occurred_at,
        }
    }
}

impl Aggregate for StockLocation {
    type Command = LocationCommand;
    type Event = LocationEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            LocationEvent::Registered(e) => {
                self.id = e.location_id;
                self.code = e.code.clone();
                self.name = e.name.clone();
                self.kind = e.kind;
                self.is_active = true;
                self.created = true;
            }
            LocationEvent::Deactivated { .. } => self.is_active = false,
            LocationEvent::Reactivated { .. } => self.is_active = true,
        }
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            LocationCommand::Register(cmd) => {
                if self.created {
                    return Err(DomainError::conflict("location already exists"));
                }
                if cmd.location_id != self.id {
                    return Err(DomainError::invariant("location_id mismatch"));
                }
                if cmd.code.trim().is_empty() {
                    return Err(DomainError::validation("code cannot be empty"));
                }
                if cmd.name.trim().is_empty() {
                    return Err(DomainError::validation("name cannot be empty"));
                }
                Ok(vec![LocationEvent::Registered(LocationRegistered {
                    location_id: self.id,
                    code: cmd.code.trim().to_string(),
                    name: cmd.name.trim().to_string(),
                    kind: cmd.kind,
                    occurred_at: cmd.occurred_at,
                })])
            }
            LocationCommand::Deactivate { occurred_at } => {
                if !self.created {
                    return Err(DomainError::not_found("location", self.id));
                }
                if !self.is_active {
                    return Ok(vec![]);
                }
                Ok(vec![LocationEvent::Deactivated {
                    location_id: self.id,
                    occurred_at: *occurred_at,
                }])
            }
            LocationCommand::Reactivate { occurred_at } => {
                if !self.created {
                    return Err(DomainError::not_found("location", self.id));
                }
                if self.is_active {
                    return Ok(vec![]);
                }
                Ok(vec![LocationEvent::Reactivated {
                    location_id: self.id,
                    occurred_at: *occurred_at,
                }])
            }
        }
    }
}

impl EventSourced for StockLocation {
    const AGGREGATE_TYPE: &'static str = "inventory.location";

    fn empty(id: AggregateId) -> Self {
        Self {
            id: LocationId(id),
            code: String::new(),
            name: String::new(),
            kind: LocationKind::Warehouse,
            is_active: false,
            version: 0,
            created: false,
        }
    }

    fn exists(&self) -> bool {
        self.created
    }
}
