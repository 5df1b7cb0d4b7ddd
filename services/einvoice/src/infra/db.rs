use std::collections::HashMap;

use anyhow::Context as _;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait,
    ActiveValue::{NotSet, Set},
    ColumnTrait, Condition, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, QuerySelect,
    sea_query::{Expr, OnConflict, SimpleExpr},
};

use gst_domain::id::InvoiceId;
use gst_einvoice_schema::{customers, gst_settings, gst_submission_logs, invoice_items, invoices};

use crate::domain::repository::{InvoiceRepository, SettingsRepository, SubmissionLogRepository};
use crate::domain::types::{
    BuyerDetails, CancellationDetails, ClaimKind, InvoiceDocument, InvoiceGstState, InvoiceLine,
    InvoiceStatus, IrnDetails, NewLogEntry, SubmissionLogEntry,
};
use crate::error::GstServiceError;

// ── Invoice repository ───────────────────────────────────────────────────────

#[derive(Clone)]
pub struct DbInvoiceRepository {
    pub db: DatabaseConnection,
}

impl InvoiceRepository for DbInvoiceRepository {
    async fn find_state(
        &self,
        id: InvoiceId,
    ) -> Result<Option<InvoiceGstState>, GstServiceError> {
        let model = invoices::Entity::find_by_id(id.0)
            .one(&self.db)
            .await
            .context("find invoice by id")?;
        model.map(state_from_model).transpose()
    }

    async fn load_document(
        &self,
        id: InvoiceId,
    ) -> Result<Option<InvoiceDocument>, GstServiceError> {
        let Some(invoice) = invoices::Entity::find_by_id(id.0)
            .one(&self.db)
            .await
            .context("find invoice by id")?
        else {
            return Ok(None);
        };
        let customer = customers::Entity::find_by_id(invoice.customer_id)
            .one(&self.db)
            .await
            .context("find invoice customer")?
            .ok_or_else(|| {
                GstServiceError::Validation(format!(
                    "customer {} of invoice {id} does not exist",
                    invoice.customer_id
                ))
            })?;
        let items = invoice_items::Entity::find()
            .filter(invoice_items::Column::InvoiceId.eq(id.0))
            .order_by_asc(invoice_items::Column::SlNo)
            .order_by_asc(invoice_items::Column::Id)
            .all(&self.db)
            .await
            .context("list invoice items")?;

        let pincode = u32::try_from(customer.pincode).map_err(|_| {
            GstServiceError::Validation(format!(
                "customer {} has an invalid pincode {}",
                customer.id, customer.pincode
            ))
        })?;
        let lines = items
            .into_iter()
            .map(|item| {
                let sl_no = u32::try_from(item.sl_no).map_err(|_| {
                    GstServiceError::Validation(format!(
                        "item {} of invoice {id} has an invalid serial number {}",
                        item.id, item.sl_no
                    ))
                })?;
                Ok(InvoiceLine {
                    sl_no,
                    description: item.description,
                    hsn_code: item.hsn_code,
                    is_service: item.is_service,
                    quantity: item.quantity,
                    unit: item.unit,
                    unit_price_paise: item.unit_price_paise,
                    discount_paise: item.discount_paise,
                    gst_rate: item.gst_rate,
                })
            })
            .collect::<Result<Vec<_>, GstServiceError>>()?;

        Ok(Some(InvoiceDocument {
            id,
            invoice_no: invoice.invoice_no,
            invoice_date: invoice.invoice_date,
            place_of_supply: invoice.place_of_supply,
            buyer: BuyerDetails {
                legal_name: customer.legal_name,
                trade_name: customer.trade_name,
                gstin: customer.gstin,
                address1: customer.address1,
                address2: customer.address2,
                location: customer.location,
                pincode,
                state_code: customer.state_code,
            },
            lines,
        }))
    }

    async fn try_claim(
        &self,
        id: InvoiceId,
        kind: ClaimKind,
        lease_until: DateTime<Utc>,
    ) -> Result<bool, GstServiceError> {
        let now = Utc::now();
        let precondition = match kind {
            ClaimKind::Submission => Condition::all()
                .add(invoices::Column::Irn.is_null())
                .add(
                    invoices::Column::Status.is_in(
                        InvoiceStatus::ALL
                            .into_iter()
                            .filter(|status| status.is_submittable())
                            .map(InvoiceStatus::as_str),
                    ),
                ),
            ClaimKind::Cancellation => Condition::all()
                .add(invoices::Column::Irn.is_not_null())
                .add(invoices::Column::Status.eq(InvoiceStatus::Submitted.as_str())),
        };
        let result = invoices::Entity::update_many()
            .col_expr(invoices::Column::SubmissionLockUntil, Expr::value(lease_until))
            .col_expr(invoices::Column::UpdatedAt, Expr::value(now))
            .filter(invoices::Column::Id.eq(id.0))
            .filter(precondition)
            .filter(
                Condition::any()
                    .add(invoices::Column::SubmissionLockUntil.is_null())
                    .add(invoices::Column::SubmissionLockUntil.lt(now)),
            )
            .exec(&self.db)
            .await
            .context("claim invoice lease")?;
        Ok(result.rows_affected == 1)
    }

    async fn record_irn(
        &self,
        id: InvoiceId,
        details: &IrnDetails,
    ) -> Result<bool, GstServiceError> {
        let result = invoices::Entity::update_many()
            .col_expr(
                invoices::Column::Status,
                Expr::value(InvoiceStatus::Submitted.as_str()),
            )
            .col_expr(invoices::Column::Irn, Expr::value(details.irn.clone()))
            .col_expr(invoices::Column::AckNo, Expr::value(details.ack_no.clone()))
            .col_expr(invoices::Column::AckDate, Expr::value(details.ack_date.clone()))
            .col_expr(
                invoices::Column::QrCodeUrl,
                Expr::value(details.qr_code_url.clone()),
            )
            .col_expr(invoices::Column::SubmissionLockUntil, no_lease())
            .col_expr(invoices::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(invoices::Column::Id.eq(id.0))
            .filter(invoices::Column::Irn.is_null())
            .exec(&self.db)
            .await
            .context("record invoice IRN")?;
        Ok(result.rows_affected == 1)
    }

    async fn record_submission_failure(&self, id: InvoiceId) -> Result<(), GstServiceError> {
        invoices::Entity::update_many()
            .col_expr(
                invoices::Column::Status,
                Expr::value(InvoiceStatus::SubmissionFailed.as_str()),
            )
            .col_expr(invoices::Column::SubmissionLockUntil, no_lease())
            .col_expr(invoices::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(invoices::Column::Id.eq(id.0))
            .filter(invoices::Column::Irn.is_null())
            .exec(&self.db)
            .await
            .context("record submission failure")?;
        Ok(())
    }

    async fn record_cancellation(
        &self,
        id: InvoiceId,
        details: &CancellationDetails,
    ) -> Result<(), GstServiceError> {
        invoices::Entity::update_many()
            .col_expr(
                invoices::Column::Status,
                Expr::value(InvoiceStatus::Cancelled.as_str()),
            )
            .col_expr(
                invoices::Column::CancelDate,
                Expr::value(details.cancel_date.clone()),
            )
            .col_expr(invoices::Column::SubmissionLockUntil, no_lease())
            .col_expr(invoices::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(invoices::Column::Id.eq(id.0))
            .filter(invoices::Column::Status.eq(InvoiceStatus::Submitted.as_str()))
            .exec(&self.db)
            .await
            .context("record invoice cancellation")?;
        Ok(())
    }

    async fn release_claim(&self, id: InvoiceId) -> Result<(), GstServiceError> {
        invoices::Entity::update_many()
            .col_expr(invoices::Column::SubmissionLockUntil, no_lease())
            .filter(invoices::Column::Id.eq(id.0))
            .exec(&self.db)
            .await
            .context("release invoice lease")?;
        Ok(())
    }

    async fn list_ids_by_status(
        &self,
        status: InvoiceStatus,
        after: Option<InvoiceId>,
        limit: u64,
    ) -> Result<Vec<InvoiceId>, GstServiceError> {
        let mut query = invoices::Entity::find()
            .select_only()
            .column(invoices::Column::Id)
            .filter(invoices::Column::Status.eq(status.as_str()));
        if let Some(after) = after {
            query = query.filter(invoices::Column::Id.gt(after.0));
        }
        let ids: Vec<i64> = query
            .order_by_asc(invoices::Column::Id)
            .limit(limit)
            .into_tuple()
            .all(&self.db)
            .await
            .context("list invoice ids by status")?;
        Ok(ids.into_iter().map(InvoiceId).collect())
    }
}

fn no_lease() -> SimpleExpr {
    Expr::value(None::<DateTime<Utc>>)
}

fn state_from_model(model: invoices::Model) -> Result<InvoiceGstState, GstServiceError> {
    Ok(InvoiceGstState {
        id: InvoiceId(model.id),
        status: model.status.parse()?,
        irn: model.irn,
        ack_no: model.ack_no,
        ack_date: model.ack_date,
        qr_code_url: model.qr_code_url,
        cancel_date: model.cancel_date,
        lock_until: model.submission_lock_until,
    })
}

// ── Submission log repository ────────────────────────────────────────────────

#[derive(Clone)]
pub struct DbSubmissionLogRepository {
    pub db: DatabaseConnection,
}

impl SubmissionLogRepository for DbSubmissionLogRepository {
    async fn append(&self, entry: &NewLogEntry) -> Result<(), GstServiceError> {
        gst_submission_logs::ActiveModel {
            id: NotSet,
            invoice_id: Set(entry.invoice_id.map(|id| id.0)),
            transaction_type: Set(entry.transaction_type.as_str().to_owned()),
            status: Set(entry.status.as_str().to_owned()),
            request_payload: Set(entry.request_payload.clone()),
            response_payload: Set(entry.response_payload.clone()),
            error_details: Set(entry.error_details.clone()),
            created_at: Set(Utc::now()),
        }
        .insert(&self.db)
        .await
        .context("append submission log")?;
        Ok(())
    }

    async fn list_by_invoice(
        &self,
        invoice_id: InvoiceId,
    ) -> Result<Vec<SubmissionLogEntry>, GstServiceError> {
        let models = gst_submission_logs::Entity::find()
            .filter(gst_submission_logs::Column::InvoiceId.eq(invoice_id.0))
            .order_by_asc(gst_submission_logs::Column::CreatedAt)
            .order_by_asc(gst_submission_logs::Column::Id)
            .all(&self.db)
            .await
            .context("list submission logs")?;
        models.into_iter().map(log_from_model).collect()
    }
}

fn log_from_model(
    model: gst_submission_logs::Model,
) -> Result<SubmissionLogEntry, GstServiceError> {
    Ok(SubmissionLogEntry {
        id: model.id,
        invoice_id: model.invoice_id.map(InvoiceId),
        transaction_type: model.transaction_type.parse()?,
        status: model.status.parse()?,
        request_payload: model.request_payload,
        response_payload: model.response_payload,
        error_details: model.error_details,
        created_at: model.created_at,
    })
}

// ── Settings repository ──────────────────────────────────────────────────────

#[derive(Clone)]
pub struct DbSettingsRepository {
    pub db: DatabaseConnection,
}

impl SettingsRepository for DbSettingsRepository {
    async fn load_all(&self) -> Result<HashMap<String, String>, GstServiceError> {
        let rows = gst_settings::Entity::find()
            .all(&self.db)
            .await
            .context("load gst settings")?;
        Ok(rows
            .into_iter()
            .map(|row| (row.setting_key, row.setting_value))
            .collect())
    }

    async fn upsert_many(&self, pairs: &[(&str, String)]) -> Result<(), GstServiceError> {
        if pairs.is_empty() {
            return Ok(());
        }
        let now = Utc::now();
        let models = pairs.iter().map(|(key, value)| gst_settings::ActiveModel {
            setting_key: Set((*key).to_owned()),
            setting_value: Set(value.clone()),
            updated_at: Set(now),
        });
        gst_settings::Entity::insert_many(models)
            .on_conflict(
                OnConflict::column(gst_settings::Column::SettingKey)
                    .update_columns([
                        gst_settings::Column::SettingValue,
                        gst_settings::Column::UpdatedAt,
                    ])
                    .to_owned(),
            )
            .exec(&self.db)
            .await
            .context("upsert gst settings")?;
        Ok(())
    }
}
