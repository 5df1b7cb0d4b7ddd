use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Notify;

use gst_einvoice::domain::einvoice::{ApiErrorDetail, EinvoiceApiError};
use gst_einvoice::domain::repository::{SettingsProvider, SettingsRepository};
use gst_einvoice::domain::settings::{GstSettingsUpdate, MASKED_SECRET, keys};
use gst_einvoice::domain::types::{LogStatus, TransactionType};
use gst_einvoice::error::GstServiceError;
use gst_einvoice::usecase::settings::{
    GetSettingsUseCase, SettingsStore, TestConnectionUseCase, UpdateSettingsUseCase,
};

use crate::helpers::{
    MockEinvoiceApi, MockLogRepo, MockSettingsCache, MockSettingsRepo, SELLER_GSTIN,
    StaticSettings, settings_pairs, test_settings,
};

fn stored() -> MockSettingsRepo {
    MockSettingsRepo::new(settings_pairs("https://irp.test"))
}

/// Repository whose first `load_all` takes its snapshot, reports it, then
/// waits for `release` before returning it.
#[derive(Clone)]
struct HeldFirstRead {
    inner: MockSettingsRepo,
    held: Arc<AtomicBool>,
    loaded: Arc<Notify>,
    release: Arc<Notify>,
}

impl HeldFirstRead {
    fn new(inner: MockSettingsRepo) -> Self {
        Self {
            inner,
            held: Arc::default(),
            loaded: Arc::default(),
            release: Arc::default(),
        }
    }
}

impl SettingsRepository for HeldFirstRead {
    async fn load_all(&self) -> Result<HashMap<String, String>, GstServiceError> {
        let snapshot = self.inner.load_all().await?;
        if !self.held.swap(true, Ordering::SeqCst) {
            self.loaded.notify_one();
            self.release.notified().await;
        }
        Ok(snapshot)
    }

    async fn upsert_many(&self, pairs: &[(&str, String)]) -> Result<(), GstServiceError> {
        self.inner.upsert_many(pairs).await
    }
}

#[tokio::test]
async fn should_mask_secrets_when_reading_settings() {
    let usecase = GetSettingsUseCase { repo: stored() };

    let view = usecase.execute().await.unwrap();

    assert_eq!(view[keys::CLIENT_SECRET], MASKED_SECRET);
    assert_eq!(view[keys::API_PASSWORD], MASKED_SECRET);
    assert_eq!(view[keys::CLIENT_ID], "client-1");
    assert_eq!(view[keys::REQUEST_TIMEOUT], 5);
    assert!(!view.contains_key(keys::WEBHOOK_URL));
}

#[tokio::test]
async fn should_merge_partial_update_and_invalidate_cache() {
    let repo = stored();
    let cache = MockSettingsCache::default();
    let usecase = UpdateSettingsUseCase {
        repo: repo.clone(),
        cache: cache.clone(),
    };

    let view = usecase
        .execute(GstSettingsUpdate {
            retry_attempts: Some(5),
            client_id: Some("client-1".to_owned()),
            ..Default::default()
        })
        .await
        .unwrap();

    assert_eq!(view[keys::RETRY_ATTEMPTS], 5);
    assert_eq!(view[keys::API_BASE_URL], "https://irp.test");
    let upserts = repo.upserts.lock().unwrap().clone();
    assert_eq!(
        upserts,
        vec![vec![(keys::RETRY_ATTEMPTS.to_owned(), "5".to_owned())]],
        "unchanged keys are not rewritten"
    );
    assert_eq!(cache.invalidations.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn should_reject_invalid_gstin_without_touching_stored_settings() {
    let repo = stored();
    let before = repo.pairs.lock().unwrap().clone();
    let cache = MockSettingsCache::default();
    let usecase = UpdateSettingsUseCase {
        repo: repo.clone(),
        cache: cache.clone(),
    };

    let err = usecase
        .execute(GstSettingsUpdate {
            company_gstin: Some("29ABC".to_owned()),
            retry_attempts: Some(7),
            ..Default::default()
        })
        .await
        .unwrap_err();

    assert!(matches!(err, GstServiceError::Validation(_)), "got {err:?}");
    assert_eq!(*repo.pairs.lock().unwrap(), before);
    assert!(repo.upserts.lock().unwrap().is_empty());
    assert_eq!(cache.invalidations.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn should_keep_stored_secret_when_masked_value_is_sent_back() {
    let repo = stored();
    let usecase = UpdateSettingsUseCase {
        repo: repo.clone(),
        cache: MockSettingsCache::default(),
    };

    usecase
        .execute(GstSettingsUpdate {
            client_secret: Some(MASKED_SECRET.to_owned()),
            api_password: Some("rotated".to_owned()),
            ..Default::default()
        })
        .await
        .unwrap();

    let pairs = repo.pairs.lock().unwrap();
    assert_eq!(pairs[keys::CLIENT_SECRET], "secret-1");
    assert_eq!(pairs[keys::API_PASSWORD], "rotated");
}

#[tokio::test]
async fn should_skip_write_when_nothing_changed() {
    let repo = stored();
    let cache = MockSettingsCache::default();
    let usecase = UpdateSettingsUseCase {
        repo: repo.clone(),
        cache: cache.clone(),
    };

    usecase
        .execute(GstSettingsUpdate {
            company_gstin: Some(SELLER_GSTIN.to_ascii_lowercase()),
            ..Default::default()
        })
        .await
        .unwrap();

    assert!(repo.upserts.lock().unwrap().is_empty());
    assert_eq!(cache.invalidations.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn should_serve_settings_from_cache_after_first_read() {
    let repo = stored();
    let cache = MockSettingsCache::default();
    let store = SettingsStore {
        repo: repo.clone(),
        cache: cache.clone(),
    };

    let first = store.current().await.unwrap();
    repo.pairs
        .lock()
        .unwrap()
        .insert(keys::CLIENT_ID.to_owned(), "client-2".to_owned());
    let second = store.current().await.unwrap();

    assert_eq!(first.client_id, "client-1");
    assert_eq!(second, first);
    assert!(cache.value.lock().unwrap().is_some());
}

#[tokio::test]
async fn should_reread_table_after_update_invalidates_cache() {
    let repo = stored();
    let cache = MockSettingsCache::default();
    let store = SettingsStore {
        repo: repo.clone(),
        cache: cache.clone(),
    };
    let update = UpdateSettingsUseCase {
        repo: repo.clone(),
        cache: cache.clone(),
    };

    store.current().await.unwrap();
    update
        .execute(GstSettingsUpdate {
            client_id: Some("client-2".to_owned()),
            ..Default::default()
        })
        .await
        .unwrap();

    assert_eq!(store.current().await.unwrap().client_id, "client-2");
}

#[tokio::test]
async fn should_not_serve_snapshot_loaded_before_rotation() {
    let repo = stored();
    let held = HeldFirstRead::new(repo.clone());
    let cache = MockSettingsCache::default();
    let store = SettingsStore {
        repo: held.clone(),
        cache: cache.clone(),
    };
    let update = UpdateSettingsUseCase {
        repo: repo.clone(),
        cache: cache.clone(),
    };

    let (in_flight, ()) = tokio::join!(store.current(), async {
        held.loaded.notified().await;
        update
            .execute(GstSettingsUpdate {
                client_id: Some("rotated".to_owned()),
                ..Default::default()
            })
            .await
            .unwrap();
        held.release.notify_one();
    });

    assert_eq!(in_flight.unwrap().client_id, "client-1");
    assert_eq!(repo.pairs.lock().unwrap()[keys::CLIENT_ID], "rotated");
    assert_eq!(store.current().await.unwrap().client_id, "rotated");
    assert_eq!(store.current().await.unwrap().client_id, "rotated");
}

#[tokio::test]
async fn should_fail_update_when_cache_cannot_be_invalidated() {
    let repo = stored();
    let cache = MockSettingsCache::default();
    cache.fail_invalidate.store(true, Ordering::SeqCst);
    let usecase = UpdateSettingsUseCase {
        repo: repo.clone(),
        cache: cache.clone(),
    };

    let err = usecase
        .execute(GstSettingsUpdate {
            client_id: Some("rotated".to_owned()),
            ..Default::default()
        })
        .await
        .unwrap_err();

    assert!(matches!(err, GstServiceError::Internal(_)), "got {err:?}");
    assert_eq!(repo.upserts.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn should_report_config_error_for_incomplete_settings() {
    let mut pairs = settings_pairs("https://irp.test");
    pairs.remove(keys::API_USERNAME);
    let store = SettingsStore {
        repo: MockSettingsRepo::new(pairs),
        cache: MockSettingsCache::default(),
    };

    let err = store.current().await.unwrap_err();
    assert!(matches!(err, GstServiceError::Config(_)), "got {err:?}");
}

#[tokio::test]
async fn should_log_successful_connection_test() {
    let logs = MockLogRepo::default();
    let api = MockEinvoiceApi::new();
    let usecase = TestConnectionUseCase {
        settings: StaticSettings(Some(test_settings("https://irp.test"))),
        logs: logs.clone(),
        api: api.clone(),
    };

    let result = usecase.execute().await.unwrap();

    assert!(result.success);
    let entries = logs.entries_handle().lock().unwrap().clone();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].transaction_type, TransactionType::TestConnection);
    assert_eq!(entries[0].status, LogStatus::Success);
    assert_eq!(entries[0].invoice_id, None);
    assert_eq!(entries[0].request_payload.as_ref().unwrap()["gstin"], SELLER_GSTIN);
}

#[tokio::test]
async fn should_report_failed_connection_test_without_error() {
    let logs = MockLogRepo::default();
    let api = MockEinvoiceApi::new();
    api.script_connection(Err(EinvoiceApiError::Rejected(vec![ApiErrorDetail::new(
        "3001",
        "Requested data is not available",
    )])));
    let usecase = TestConnectionUseCase {
        settings: StaticSettings(Some(test_settings("https://irp.test"))),
        logs: logs.clone(),
        api,
    };

    let result = usecase.execute().await.unwrap();

    assert!(!result.success);
    assert!(!result.message.is_empty());
    let entries = logs.entries_handle().lock().unwrap().clone();
    assert_eq!(entries[0].status, LogStatus::Failure);
    assert_eq!(
        entries[0].error_details.as_ref().unwrap()["errors"][0]["code"],
        "3001"
    );
}
