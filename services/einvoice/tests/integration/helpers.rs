use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use serde_json::json;

use gst_domain::id::InvoiceId;
use gst_einvoice::domain::einvoice::{
    ApiOutcome, CancelIrnRequest, ConnectionResult, EinvoiceApiError, WebhookEvent,
};
use gst_einvoice::domain::payload::IrnPayload;
use gst_einvoice::domain::repository::{
    EinvoicePort, InvoiceRepository, SettingsCache, SettingsProvider, SettingsRepository,
    SubmissionLogRepository,
};
use gst_einvoice::domain::settings::{GstSettings, keys};
use gst_einvoice::domain::types::{
    BuyerDetails, CancellationDetails, ClaimKind, InvoiceDocument, InvoiceGstState, InvoiceLine,
    InvoiceStatus, IrnDetails, NewLogEntry, SubmissionLogEntry,
};
use gst_einvoice::error::GstServiceError;
use gst_einvoice::usecase::submission::SubmissionOrchestrator;

pub const SELLER_GSTIN: &str = "29AABCU9603R1ZM";
pub const BUYER_GSTIN: &str = "27AAPFU0939F1ZV";

// ── Fixtures ─────────────────────────────────────────────────────────────────

pub fn settings_pairs(base_url: &str) -> HashMap<String, String> {
    [
        (keys::API_BASE_URL, base_url),
        (keys::CLIENT_ID, "client-1"),
        (keys::CLIENT_SECRET, "secret-1"),
        (keys::API_USERNAME, "api-user"),
        (keys::API_PASSWORD, "api-pass"),
        (keys::REQUEST_TIMEOUT, "5"),
        (keys::RATE_LIMIT_REQUESTS, "0"),
        (keys::COMPANY_GSTIN, SELLER_GSTIN),
        (keys::COMPANY_LEGAL_NAME, "Acme Traders Pvt Ltd"),
        (keys::COMPANY_ADDRESS1, "12 MG Road"),
        (keys::COMPANY_LOCATION, "Bengaluru"),
        (keys::COMPANY_PINCODE, "560001"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_owned(), v.to_owned()))
    .collect()
}

pub fn test_settings(base_url: &str) -> GstSettings {
    GstSettings::from_pairs(&settings_pairs(base_url)).unwrap()
}

pub fn test_document(id: i64) -> InvoiceDocument {
    InvoiceDocument {
        id: InvoiceId(id),
        invoice_no: "INV/2024/042".to_owned(),
        invoice_date: NaiveDate::from_ymd_opt(2024, 3, 15).unwrap(),
        place_of_supply: None,
        buyer: BuyerDetails {
            legal_name: "Globex Industries".to_owned(),
            trade_name: None,
            gstin: Some(BUYER_GSTIN.to_owned()),
            address1: "Plot 7, MIDC".to_owned(),
            address2: None,
            location: "Pune".to_owned(),
            pincode: 411001,
            state_code: "27".to_owned(),
        },
        lines: vec![InvoiceLine {
            sl_no: 1,
            description: "Steel bolts".to_owned(),
            hsn_code: "7318".to_owned(),
            is_service: false,
            quantity: 10.0,
            unit: "NOS".to_owned(),
            unit_price_paise: 10_000,
            discount_paise: 0,
            gst_rate: 18.0,
        }],
    }
}

pub fn irn_details(irn: &str) -> IrnDetails {
    IrnDetails {
        irn: irn.to_owned(),
        ack_no: "ACK1".to_owned(),
        ack_date: "2024-03-15".to_owned(),
        qr_code_url: None,
    }
}

// ── MockInvoiceRepo ──────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct StoredInvoice {
    pub state: InvoiceGstState,
    pub document: InvoiceDocument,
}

/// In-memory invoices with the same guarded-update semantics as the table.
#[derive(Clone, Default)]
pub struct MockInvoiceRepo {
    pub invoices: Arc<Mutex<HashMap<InvoiceId, StoredInvoice>>>,
    /// When set, `record_irn` fails as if the database write was lost.
    pub fail_record_irn: Arc<Mutex<bool>>,
}

impl MockInvoiceRepo {
    pub fn with_invoice(id: i64, status: InvoiceStatus) -> Self {
        let repo = Self::default();
        repo.insert(id, status, None);
        repo
    }

    pub fn insert(&self, id: i64, status: InvoiceStatus, irn: Option<&str>) {
        let id = InvoiceId(id);
        let state = InvoiceGstState {
            id,
            status,
            irn: irn.map(str::to_owned),
            ack_no: None,
            ack_date: None,
            qr_code_url: None,
            cancel_date: None,
            lock_until: None,
        };
        self.invoices.lock().unwrap().insert(
            id,
            StoredInvoice {
                state,
                document: test_document(id.0),
            },
        );
    }

    pub fn state(&self, id: i64) -> InvoiceGstState {
        self.invoices.lock().unwrap()[&InvoiceId(id)].state.clone()
    }

    pub fn set_document(&self, id: i64, document: InvoiceDocument) {
        self.invoices
            .lock()
            .unwrap()
            .get_mut(&InvoiceId(id))
            .unwrap()
            .document = document;
    }

    pub fn set_lock(&self, id: i64, until: Option<DateTime<Utc>>) {
        self.invoices
            .lock()
            .unwrap()
            .get_mut(&InvoiceId(id))
            .unwrap()
            .state
            .lock_until = until;
    }
}

impl InvoiceRepository for MockInvoiceRepo {
    async fn find_state(
        &self,
        id: InvoiceId,
    ) -> Result<Option<InvoiceGstState>, GstServiceError> {
        Ok(self.invoices.lock().unwrap().get(&id).map(|i| i.state.clone()))
    }

    async fn load_document(
        &self,
        id: InvoiceId,
    ) -> Result<Option<InvoiceDocument>, GstServiceError> {
        Ok(self
            .invoices
            .lock()
            .unwrap()
            .get(&id)
            .map(|i| i.document.clone()))
    }

    async fn try_claim(
        &self,
        id: InvoiceId,
        kind: ClaimKind,
        lease_until: DateTime<Utc>,
    ) -> Result<bool, GstServiceError> {
        let now = Utc::now();
        let mut invoices = self.invoices.lock().unwrap();
        let Some(invoice) = invoices.get_mut(&id) else {
            return Ok(false);
        };
        let state = &mut invoice.state;
        let free = state.lock_until.is_none_or(|until| until < now);
        let eligible = match kind {
            ClaimKind::Submission => state.irn.is_none() && state.status.is_submittable(),
            ClaimKind::Cancellation => {
                state.irn.is_some() && state.status == InvoiceStatus::Submitted
            }
        };
        if free && eligible {
            state.lock_until = Some(lease_until);
            Ok(true)
        } else {
            Ok(false)
        }
    }

    async fn record_irn(
        &self,
        id: InvoiceId,
        details: &IrnDetails,
    ) -> Result<bool, GstServiceError> {
        if *self.fail_record_irn.lock().unwrap() {
            return Err(GstServiceError::Internal(anyhow::anyhow!("connection reset")));
        }
        let mut invoices = self.invoices.lock().unwrap();
        let state = &mut invoices.get_mut(&id).unwrap().state;
        if state.irn.is_some() {
            return Ok(false);
        }
        state.status = InvoiceStatus::Submitted;
        state.irn = Some(details.irn.clone());
        state.ack_no = Some(details.ack_no.clone());
        state.ack_date = Some(details.ack_date.clone());
        state.qr_code_url = details.qr_code_url.clone();
        state.lock_until = None;
        Ok(true)
    }

    async fn record_submission_failure(&self, id: InvoiceId) -> Result<(), GstServiceError> {
        let mut invoices = self.invoices.lock().unwrap();
        let state = &mut invoices.get_mut(&id).unwrap().state;
        if state.irn.is_none() {
            state.status = InvoiceStatus::SubmissionFailed;
            state.lock_until = None;
        }
        Ok(())
    }

    async fn record_cancellation(
        &self,
        id: InvoiceId,
        details: &CancellationDetails,
    ) -> Result<(), GstServiceError> {
        let mut invoices = self.invoices.lock().unwrap();
        let state = &mut invoices.get_mut(&id).unwrap().state;
        if state.status == InvoiceStatus::Submitted {
            state.status = InvoiceStatus::Cancelled;
            state.cancel_date = Some(details.cancel_date.clone());
            state.lock_until = None;
        }
        Ok(())
    }

    async fn release_claim(&self, id: InvoiceId) -> Result<(), GstServiceError> {
        if let Some(invoice) = self.invoices.lock().unwrap().get_mut(&id) {
            invoice.state.lock_until = None;
        }
        Ok(())
    }

    async fn list_ids_by_status(
        &self,
        status: InvoiceStatus,
        after: Option<InvoiceId>,
        limit: u64,
    ) -> Result<Vec<InvoiceId>, GstServiceError> {
        let mut ids: Vec<InvoiceId> = self
            .invoices
            .lock()
            .unwrap()
            .values()
            .filter(|i| i.state.status == status)
            .filter(|i| after.is_none_or(|after| i.state.id > after))
            .map(|i| i.state.id)
            .collect();
        ids.sort();
        ids.truncate(limit as usize);
        Ok(ids)
    }
}

// ── MockLogRepo ──────────────────────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct MockLogRepo {
    pub entries: Arc<Mutex<Vec<SubmissionLogEntry>>>,
}

impl MockLogRepo {
    /// Returns a shared handle to the appended entries for post-execution inspection.
    pub fn entries_handle(&self) -> Arc<Mutex<Vec<SubmissionLogEntry>>> {
        Arc::clone(&self.entries)
    }

    pub fn seed(&self, entry: SubmissionLogEntry) {
        self.entries.lock().unwrap().push(entry);
    }
}

impl SubmissionLogRepository for MockLogRepo {
    async fn append(&self, entry: &NewLogEntry) -> Result<(), GstServiceError> {
        let mut entries = self.entries.lock().unwrap();
        let id = entries.len() as i64 + 1;
        entries.push(SubmissionLogEntry {
            id,
            invoice_id: entry.invoice_id,
            transaction_type: entry.transaction_type,
            status: entry.status,
            request_payload: entry.request_payload.clone(),
            response_payload: entry.response_payload.clone(),
            error_details: entry.error_details.clone(),
            created_at: Utc::now(),
        });
        Ok(())
    }

    async fn list_by_invoice(
        &self,
        invoice_id: InvoiceId,
    ) -> Result<Vec<SubmissionLogEntry>, GstServiceError> {
        Ok(self
            .entries
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.invoice_id == Some(invoice_id))
            .cloned()
            .collect())
    }
}

// ── StaticSettings ───────────────────────────────────────────────────────────

/// Fixed settings; `None` behaves like an unconfigured tenant.
pub struct StaticSettings(pub Option<GstSettings>);

impl SettingsProvider for StaticSettings {
    async fn current(&self) -> Result<GstSettings, GstServiceError> {
        self.0
            .clone()
            .ok_or_else(|| GstServiceError::Config("api_base_url is required".to_owned()))
    }
}

// ── MockSettingsRepo / MockSettingsCache ─────────────────────────────────────

#[derive(Clone, Default)]
pub struct MockSettingsRepo {
    pub pairs: Arc<Mutex<HashMap<String, String>>>,
    pub upserts: Arc<Mutex<Vec<Vec<(String, String)>>>>,
}

impl MockSettingsRepo {
    pub fn new(pairs: HashMap<String, String>) -> Self {
        Self {
            pairs: Arc::new(Mutex::new(pairs)),
            upserts: Arc::default(),
        }
    }
}

impl SettingsRepository for MockSettingsRepo {
    async fn load_all(&self) -> Result<HashMap<String, String>, GstServiceError> {
        Ok(self.pairs.lock().unwrap().clone())
    }

    async fn upsert_many(&self, pairs: &[(&str, String)]) -> Result<(), GstServiceError> {
        let mut stored = self.pairs.lock().unwrap();
        for (key, value) in pairs {
            stored.insert((*key).to_owned(), value.clone());
        }
        self.upserts.lock().unwrap().push(
            pairs
                .iter()
                .map(|(k, v)| ((*k).to_owned(), v.clone()))
                .collect(),
        );
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct MockSettingsCache {
    pub generation: Arc<AtomicU64>,
    pub value: Arc<Mutex<Option<(u64, GstSettings)>>>,
    pub invalidations: Arc<AtomicUsize>,
    pub fail_invalidate: Arc<AtomicBool>,
}

impl SettingsCache for MockSettingsCache {
    async fn generation(&self) -> Result<u64, GstServiceError> {
        Ok(self.generation.load(Ordering::SeqCst))
    }

    async fn get(&self, generation: u64) -> Result<Option<GstSettings>, GstServiceError> {
        Ok(self
            .value
            .lock()
            .unwrap()
            .as_ref()
            .filter(|(stored, _)| *stored == generation)
            .map(|(_, settings)| settings.clone()))
    }

    async fn put(&self, generation: u64, settings: &GstSettings) -> Result<(), GstServiceError> {
        *self.value.lock().unwrap() = Some((generation, settings.clone()));
        Ok(())
    }

    async fn invalidate(&self) -> Result<(), GstServiceError> {
        if self.fail_invalidate.load(Ordering::SeqCst) {
            return Err(GstServiceError::Internal(anyhow::anyhow!("redis unavailable")));
        }
        self.invalidations.fetch_add(1, Ordering::SeqCst);
        self.generation.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ── MockEinvoiceApi ──────────────────────────────────────────────────────────

/// Scripted e-invoice system. Unscripted calls succeed.
#[derive(Clone, Default)]
pub struct MockEinvoiceApi {
    pub generate_calls: Arc<AtomicUsize>,
    pub cancel_calls: Arc<AtomicUsize>,
    pub connection_calls: Arc<AtomicUsize>,
    pub cancel_requests: Arc<Mutex<Vec<CancelIrnRequest>>>,
    pub webhooks: Arc<Mutex<Vec<WebhookEvent>>>,
    generate_script: Arc<Mutex<VecDeque<Result<IrnDetails, EinvoiceApiError>>>>,
    cancel_script: Arc<Mutex<VecDeque<Result<CancellationDetails, EinvoiceApiError>>>>,
    connection_script: Arc<Mutex<VecDeque<Result<ConnectionResult, EinvoiceApiError>>>>,
    /// Simulated round-trip time of generate calls.
    latency: Duration,
}

impl MockEinvoiceApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn script_generate(&self, result: Result<IrnDetails, EinvoiceApiError>) {
        self.generate_script.lock().unwrap().push_back(result);
    }

    pub fn script_cancel(&self, result: Result<CancellationDetails, EinvoiceApiError>) {
        self.cancel_script.lock().unwrap().push_back(result);
    }

    pub fn script_connection(&self, result: Result<ConnectionResult, EinvoiceApiError>) {
        self.connection_script.lock().unwrap().push_back(result);
    }

    pub fn generate_count(&self) -> usize {
        self.generate_calls.load(Ordering::SeqCst)
    }

    pub fn cancel_count(&self) -> usize {
        self.cancel_calls.load(Ordering::SeqCst)
    }
}

fn outcome<T>(result: Result<T, EinvoiceApiError>) -> ApiOutcome<T> {
    let status = if result.is_ok() { 1 } else { 0 };
    ApiOutcome::new(result, Some(json!({ "Status": status })))
}

impl EinvoicePort for MockEinvoiceApi {
    async fn test_connection(&self, _settings: &GstSettings) -> ApiOutcome<ConnectionResult> {
        self.connection_calls.fetch_add(1, Ordering::SeqCst);
        let scripted = self.connection_script.lock().unwrap().pop_front();
        outcome(scripted.unwrap_or_else(|| {
            Ok(ConnectionResult {
                success: true,
                message: "connected".to_owned(),
            })
        }))
    }

    async fn generate_irn(
        &self,
        _settings: &GstSettings,
        _payload: &IrnPayload,
    ) -> ApiOutcome<IrnDetails> {
        let n = self.generate_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        let scripted = self.generate_script.lock().unwrap().pop_front();
        outcome(scripted.unwrap_or_else(|| Ok(irn_details(&format!("IRN-{n}")))))
    }

    async fn cancel_irn(
        &self,
        _settings: &GstSettings,
        request: &CancelIrnRequest,
    ) -> ApiOutcome<CancellationDetails> {
        self.cancel_calls.fetch_add(1, Ordering::SeqCst);
        self.cancel_requests.lock().unwrap().push(request.clone());
        let scripted = self.cancel_script.lock().unwrap().pop_front();
        outcome(scripted.unwrap_or_else(|| {
            Ok(CancellationDetails {
                irn: request.irn.clone(),
                cancel_date: "2024-03-16 10:00:00".to_owned(),
            })
        }))
    }

    async fn notify_webhook(&self, _settings: &GstSettings, event: &WebhookEvent) {
        self.webhooks.lock().unwrap().push(event.clone());
    }
}

// ── Orchestrator wiring ──────────────────────────────────────────────────────

pub type TestOrchestrator<A = MockEinvoiceApi> =
    SubmissionOrchestrator<MockInvoiceRepo, MockLogRepo, StaticSettings, A>;

pub fn orchestrator<A: EinvoicePort>(
    invoices: &MockInvoiceRepo,
    logs: &MockLogRepo,
    settings: GstSettings,
    api: A,
) -> TestOrchestrator<A> {
    SubmissionOrchestrator {
        invoices: invoices.clone(),
        logs: logs.clone(),
        settings: StaticSettings(Some(settings)),
        api,
        rate_limit_max_wait: Duration::from_secs(5),
    }
}
