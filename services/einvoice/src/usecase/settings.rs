use std::collections::BTreeMap;

use gst_domain::id::InvoiceId;

use crate::domain::einvoice::ConnectionResult;
use crate::domain::repository::{
    EinvoicePort, SettingsCache, SettingsProvider, SettingsRepository, SubmissionLogRepository,
};
use crate::domain::settings::{GstSettings, GstSettingsUpdate, masked_view};
use crate::domain::types::{NewLogEntry, TransactionType};
use crate::error::GstServiceError;

// ── SettingsStore ────────────────────────────────────────────────────────────

/// Settings read through the look-aside cache; the table is the source of truth.
pub struct SettingsStore<R: SettingsRepository, C: SettingsCache> {
    pub repo: R,
    pub cache: C,
}

impl<R: SettingsRepository, C: SettingsCache> SettingsProvider for SettingsStore<R, C> {
    async fn current(&self) -> Result<GstSettings, GstServiceError> {
        let generation = match self.cache.generation().await {
            Ok(generation) => Some(generation),
            Err(e) => {
                tracing::warn!(error = %e, "settings cache read failed");
                None
            }
        };
        if let Some(generation) = generation {
            match self.cache.get(generation).await {
                Ok(Some(settings)) => return Ok(settings),
                Ok(None) => {}
                Err(e) => tracing::warn!(error = %e, "settings cache read failed"),
            }
        }

        let pairs = self.repo.load_all().await?;
        let settings = GstSettings::from_pairs(&pairs)?;
        if let Some(generation) = generation {
            if let Err(e) = self.cache.put(generation, &settings).await {
                tracing::warn!(error = %e, "settings cache write failed");
            }
        }
        Ok(settings)
    }
}

// ── GetSettings ──────────────────────────────────────────────────────────────

pub struct GetSettingsUseCase<R: SettingsRepository> {
    pub repo: R,
}

impl<R: SettingsRepository> GetSettingsUseCase<R> {
    pub async fn execute(
        &self,
    ) -> Result<BTreeMap<&'static str, serde_json::Value>, GstServiceError> {
        let pairs = self.repo.load_all().await?;
        Ok(masked_view(&pairs))
    }
}

// ── UpdateSettings ───────────────────────────────────────────────────────────

pub struct UpdateSettingsUseCase<R: SettingsRepository, C: SettingsCache> {
    pub repo: R,
    pub cache: C,
}

impl<R: SettingsRepository, C: SettingsCache> UpdateSettingsUseCase<R, C> {
    /// Merges `update` onto the stored pairs and persists the changed keys
    /// only if the merged result is valid.
    pub async fn execute(
        &self,
        update: GstSettingsUpdate,
    ) -> Result<BTreeMap<&'static str, serde_json::Value>, GstServiceError> {
        let incoming = update.to_pairs();
        let stored = self.repo.load_all().await?;

        let mut merged = stored.clone();
        for (key, value) in &incoming {
            merged.insert((*key).to_owned(), value.clone());
        }
        GstSettings::from_pairs(&merged).map_err(|e| match e {
            GstServiceError::Config(msg) => GstServiceError::Validation(msg),
            other => other,
        })?;

        let changed: Vec<(&str, String)> = incoming
            .into_iter()
            .filter(|(key, value)| stored.get(*key) != Some(value))
            .collect();
        if !changed.is_empty() {
            self.repo.upsert_many(&changed).await?;
            let keys: Vec<&str> = changed.iter().map(|(k, _)| *k).collect();
            tracing::info!(?keys, "gst settings updated");
            // Stored but possibly still served stale: the caller must see a failure.
            self.cache.invalidate().await.map_err(|e| {
                tracing::error!(error = %e, "settings cache invalidation failed");
                GstServiceError::Internal(anyhow::anyhow!("settings cache invalidation failed: {e}"))
            })?;
        }
        Ok(masked_view(&merged))
    }
}

// ── TestConnection ───────────────────────────────────────────────────────────

pub struct TestConnectionUseCase<S, L, A>
where
    S: SettingsProvider,
    L: SubmissionLogRepository,
    A: EinvoicePort,
{
    pub settings: S,
    pub logs: L,
    pub api: A,
}

impl<S, L, A> TestConnectionUseCase<S, L, A>
where
    S: SettingsProvider,
    L: SubmissionLogRepository,
    A: EinvoicePort,
{
    pub async fn execute(&self) -> Result<ConnectionResult, GstServiceError> {
        let settings = self.settings.current().await?;
        let request = serde_json::json!({
            "environment": settings.environment,
            "api_base_url": settings.api_base_url,
            "gstin": settings.company.gstin,
        });
        let outcome = self.api.test_connection(&settings).await;
        let no_invoice: Option<InvoiceId> = None;

        match outcome.result {
            Ok(result) => {
                self.logs
                    .append(&NewLogEntry::success(
                        no_invoice,
                        TransactionType::TestConnection,
                        Some(request),
                        outcome.response_payload,
                    ))
                    .await?;
                Ok(result)
            }
            Err(e) => {
                let err = GstServiceError::from(e);
                tracing::warn!(kind = err.kind(), error = %err, "e-invoice connection test failed");
                self.logs
                    .append(&NewLogEntry::failure(
                        no_invoice,
                        TransactionType::TestConnection,
                        Some(request),
                        outcome.response_payload,
                        &err,
                    ))
                    .await?;
                Ok(ConnectionResult {
                    success: false,
                    message: err.to_string(),
                })
            }
        }
    }
}
