use std::time::Duration;

use deadpool_redis::Pool as RedisPool;
use sea_orm::DatabaseConnection;

use crate::domain::retry::RetryPolicy;
use crate::infra::cache::RedisSettingsCache;
use crate::infra::db::{DbInvoiceRepository, DbSettingsRepository, DbSubmissionLogRepository};
use crate::infra::einvoice_api::HttpEinvoiceClient;
use crate::usecase::reconcile::ReconcileUseCase;
use crate::usecase::settings::SettingsStore;
use crate::usecase::submission::SubmissionOrchestrator;

pub type AppSettingsStore = SettingsStore<DbSettingsRepository, RedisSettingsCache>;

pub type AppOrchestrator = SubmissionOrchestrator<
    DbInvoiceRepository,
    DbSubmissionLogRepository,
    AppSettingsStore,
    HttpEinvoiceClient,
>;

pub type AppReconciler = ReconcileUseCase<
    DbInvoiceRepository,
    DbSubmissionLogRepository,
    AppSettingsStore,
    HttpEinvoiceClient,
>;

/// Shared application state passed to every handler via axum `State`.
///
/// The e-invoice client owns the process-wide token cache and rate limiter,
/// so cloning the state shares them.
#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub redis: RedisPool,
    pub einvoice: HttpEinvoiceClient,
    pub settings_cache_ttl_secs: u64,
    pub rate_limit_max_wait: Duration,
    pub retry_policy: RetryPolicy,
    pub reconcile_batch_size: u64,
}

impl AppState {
    pub fn invoice_repo(&self) -> DbInvoiceRepository {
        DbInvoiceRepository {
            db: self.db.clone(),
        }
    }

    pub fn log_repo(&self) -> DbSubmissionLogRepository {
        DbSubmissionLogRepository {
            db: self.db.clone(),
        }
    }

    pub fn settings_repo(&self) -> DbSettingsRepository {
        DbSettingsRepository {
            db: self.db.clone(),
        }
    }

    pub fn settings_cache(&self) -> RedisSettingsCache {
        RedisSettingsCache {
            pool: self.redis.clone(),
            ttl_secs: self.settings_cache_ttl_secs,
        }
    }

    pub fn settings_store(&self) -> AppSettingsStore {
        SettingsStore {
            repo: self.settings_repo(),
            cache: self.settings_cache(),
        }
    }

    pub fn orchestrator(&self) -> AppOrchestrator {
        SubmissionOrchestrator {
            invoices: self.invoice_repo(),
            logs: self.log_repo(),
            settings: self.settings_store(),
            api: self.einvoice.clone(),
            rate_limit_max_wait: self.rate_limit_max_wait,
        }
    }

    pub fn reconciler(&self) -> AppReconciler {
        ReconcileUseCase {
            orchestrator: self.orchestrator(),
            policy: self.retry_policy,
            batch_size: self.reconcile_batch_size,
        }
    }
}
