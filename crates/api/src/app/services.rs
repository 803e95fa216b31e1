//! Workflow wiring: one event store handle, shared by every service.

use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use storeops_infra::event_store::{EventStore, InMemoryEventStore, PostgresEventStore};
use storeops_infra::workflows::{
    AuditService, CheckoutService, LedgerService, LocationService, LoyaltyService,
    ReceivingService, ReturnService, TransferService,
};

use crate::config::{AppConfig, StoreBackend};

pub type SharedStore = Arc<dyn EventStore>;

/// Every workflow component, built over the same store.
#[derive(Clone)]
pub struct AppServices {
    pub locations: LocationService<SharedStore>,
    pub ledger: LedgerService<SharedStore>,
    pub transfers: TransferService<SharedStore>,
    pub audits: AuditService<SharedStore>,
    pub receiving: ReceivingService<SharedStore>,
    pub checkout: CheckoutService<SharedStore>,
    pub returns: ReturnService<SharedStore>,
    pub loyalty: LoyaltyService<SharedStore>,
    postgres: Option<PostgresEventStore>,
}

impl AppServices {
    pub fn new(store: SharedStore) -> Self {
        Self {
            locations: LocationService::new(store.clone()),
            ledger: LedgerService::new(store.clone()),
            transfers: TransferService::new(store.clone()),
            audits: AuditService::new(store.clone()),
            receiving: ReceivingService::new(store.clone()),
            checkout: CheckoutService::new(store.clone()),
            returns: ReturnService::new(store.clone()),
            loyalty: LoyaltyService::new(store),
            postgres: None,
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryEventStore::new()))
    }

    /// Open the configured store and make sure the default loyalty program
    /// exists.
    pub async fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        let services = match &config.store {
            StoreBackend::Memory => {
                info!("using in-memory event store");
                Self::in_memory()
            }
            StoreBackend::Postgres {
                database_url,
                max_connections,
            } => {
                let pg = PostgresEventStore::connect(database_url, *max_connections)
                    .await
                    .context("failed to open postgres event store")?;
                info!(max_connections, "using postgres event store");
                let mut services = Self::new(Arc::new(pg.clone()));
                services.postgres = Some(pg);
                services
            }
        };

        let loyalty = services.loyalty.clone();
        let rate = config.default_loyalty_rate;
        tokio::task::spawn_blocking(move || loyalty.ensure_default_program(rate))
            .await
            .context("default loyalty program bootstrap panicked")?
            .context("failed to bootstrap the default loyalty program")?;
        Ok(services)
    }

    /// Release store resources.
    pub async fn shutdown(&self) {
        if let Some(pg) = &self.postgres {
            pg.close().await;
            info!("postgres pool closed");
        }
    }
}
