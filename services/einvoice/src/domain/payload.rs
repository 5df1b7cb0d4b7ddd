//! IRN request payload (schema version 1.1) built from persisted invoice data.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Serialize, Serializer};

use gst_domain::gstin::Gstin;

use crate::domain::settings::{CompanyProfile, GstSettings, keys};
use crate::domain::types::{InvoiceDocument, InvoiceLine};
use crate::error::GstServiceError;

pub const SCHEMA_VERSION: &str = "1.1";

static DOC_NO_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Z1-9][A-Z0-9/-]{0,15}$").expect("valid document number regex")
});

/// Notified GST slabs, in percent.
const GST_RATE_SLABS: [f64; 12] = [0.0, 0.1, 0.25, 1.0, 1.5, 3.0, 5.0, 6.0, 7.5, 12.0, 18.0, 28.0];

/// Integer paise serialized as a rupee amount with two decimals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Paise(pub i64);

impl Serialize for Paise {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(self.0 as f64 / 100.0)
    }
}

impl Paise {
    pub fn checked_add(self, rhs: Paise) -> Option<Paise> {
        self.0.checked_add(rhs.0).map(Paise)
    }

    /// Sum of `amounts`, or `None` if it does not fit.
    pub fn checked_sum(amounts: impl IntoIterator<Item = Paise>) -> Option<Paise> {
        amounts.into_iter().try_fold(Paise(0), Paise::checked_add)
    }
}

// ── Wire types ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct IrnPayload {
    pub version: &'static str,
    pub tran_dtls: TranDtls,
    pub doc_dtls: DocDtls,
    pub seller_dtls: SellerDtls,
    pub buyer_dtls: BuyerDtls,
    pub item_list: Vec<ItemDtls>,
    pub val_dtls: ValDtls,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct TranDtls {
    pub tax_sch: &'static str,
    pub sup_typ: &'static str,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DocDtls {
    pub typ: &'static str,
    pub no: String,
    pub dt: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct SellerDtls {
    pub gstin: String,
    pub lgl_nm: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trd_nm: Option<String>,
    pub addr1: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub addr2: Option<String>,
    pub loc: String,
    pub pin: u32,
    pub stcd: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct BuyerDtls {
    pub gstin: String,
    pub lgl_nm: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trd_nm: Option<String>,
    pub pos: String,
    pub addr1: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub addr2: Option<String>,
    pub loc: String,
    pub pin: u32,
    pub stcd: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ItemDtls {
    pub sl_no: String,
    pub prd_desc: String,
    pub is_servc: &'static str,
    pub hsn_cd: String,
    pub qty: f64,
    pub unit: String,
    pub unit_price: Paise,
    pub tot_amt: Paise,
    pub discount: Paise,
    pub ass_amt: Paise,
    pub gst_rt: f64,
    pub igst_amt: Paise,
    pub cgst_amt: Paise,
    pub sgst_amt: Paise,
    pub tot_item_val: Paise,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ValDtls {
    pub ass_val: Paise,
    pub cgst_val: Paise,
    pub sgst_val: Paise,
    pub igst_val: Paise,
    pub tot_inv_val: Paise,
}

// ── Builder ──────────────────────────────────────────────────────────────────

/// Builds the payload for `doc`, or fails with a
/// [`GstServiceError::Validation`] listing every problem found.
///
/// Missing seller profile fields are configuration problems and fail with
/// [`GstServiceError::Config`].
pub fn build_irn_payload(
    settings: &GstSettings,
    doc: &InvoiceDocument,
) -> Result<IrnPayload, GstServiceError> {
    let seller_dtls = seller_details(&settings.company)?;

    let mut problems = Vec::new();
    if !DOC_NO_PATTERN.is_match(&doc.invoice_no) {
        problems.push(format!(
            "invoice number {:?} must be 1-16 characters of A-Z, 0-9, '/' or '-' and not start with 0, '/' or '-'",
            doc.invoice_no
        ));
    }
    let buyer_gstin = match doc.buyer.gstin.as_deref().map(str::trim) {
        None | Some("") => {
            problems.push("buyer GSTIN is required".to_owned());
            None
        }
        Some(raw) => match Gstin::parse(&raw.to_ascii_uppercase()) {
            Ok(g) => Some(g),
            Err(e) => {
                problems.push(format!("buyer {e}"));
                None
            }
        },
    };
    if doc.lines.is_empty() {
        problems.push("invoice has no items".to_owned());
    }

    let place_of_supply = doc
        .place_of_supply
        .clone()
        .filter(|p| !p.trim().is_empty())
        .unwrap_or_else(|| doc.buyer.state_code.clone());
    let intra_state = place_of_supply == seller_dtls.stcd;

    let mut items = Vec::with_capacity(doc.lines.len());
    for line in &doc.lines {
        match item_details(line, intra_state) {
            Ok(item) => items.push(item),
            Err(mut line_problems) => problems.append(&mut line_problems),
        }
    }

    let Some(buyer_gstin) = buyer_gstin.filter(|_| problems.is_empty()) else {
        return Err(GstServiceError::Validation(problems.join("; ")));
    };

    let total = |amount: fn(&ItemDtls) -> Paise| {
        Paise::checked_sum(items.iter().map(amount)).ok_or_else(|| {
            GstServiceError::Validation("invoice totals are out of range".to_owned())
        })
    };
    let val_dtls = ValDtls {
        ass_val: total(|i| i.ass_amt)?,
        cgst_val: total(|i| i.cgst_amt)?,
        sgst_val: total(|i| i.sgst_amt)?,
        igst_val: total(|i| i.igst_amt)?,
        tot_inv_val: total(|i| i.tot_item_val)?,
    };

    Ok(IrnPayload {
        version: SCHEMA_VERSION,
        tran_dtls: TranDtls {
            tax_sch: "GST",
            sup_typ: "B2B",
        },
        doc_dtls: DocDtls {
            typ: "INV",
            no: doc.invoice_no.clone(),
            dt: doc.invoice_date.format("%d/%m/%Y").to_string(),
        },
        seller_dtls,
        buyer_dtls: BuyerDtls {
            gstin: buyer_gstin.to_string(),
            lgl_nm: doc.buyer.legal_name.clone(),
            trd_nm: doc.buyer.trade_name.clone(),
            pos: place_of_supply,
            addr1: doc.buyer.address1.clone(),
            addr2: doc.buyer.address2.clone(),
            loc: doc.buyer.location.clone(),
            pin: doc.buyer.pincode,
            stcd: doc.buyer.state_code.clone(),
        },
        item_list: items,
        val_dtls,
    })
}

fn seller_details(company: &CompanyProfile) -> Result<SellerDtls, GstServiceError> {
    fn field(value: &Option<String>, key: &str) -> Result<String, GstServiceError> {
        value
            .clone()
            .ok_or_else(|| GstServiceError::Config(format!("{key} is not configured")))
    }

    Ok(SellerDtls {
        gstin: company.gstin.to_string(),
        lgl_nm: field(&company.legal_name, keys::COMPANY_LEGAL_NAME)?,
        trd_nm: company.trade_name.clone(),
        addr1: field(&company.address1, keys::COMPANY_ADDRESS1)?,
        addr2: company.address2.clone(),
        loc: field(&company.location, keys::COMPANY_LOCATION)?,
        pin: company.pincode.ok_or_else(|| {
            GstServiceError::Config(format!("{} is not configured", keys::COMPANY_PINCODE))
        })?,
        stcd: company.state_code.clone(),
    })
}

fn item_details(line: &InvoiceLine, intra_state: bool) -> Result<ItemDtls, Vec<String>> {
    let mut problems = Vec::new();
    let sl = line.sl_no;
    let hsn = line.hsn_code.trim();
    if !(4..=8).contains(&hsn.len()) || !hsn.bytes().all(|b| b.is_ascii_digit()) {
        problems.push(format!("item {sl}: HSN code {hsn:?} must be 4-8 digits"));
    }
    if !(line.quantity.is_finite() && line.quantity > 0.0) {
        problems.push(format!("item {sl}: quantity must be greater than zero"));
    }
    if !GST_RATE_SLABS
        .iter()
        .any(|slab| (slab - line.gst_rate).abs() < 1e-9)
    {
        problems.push(format!(
            "item {sl}: GST rate {} is not a notified slab",
            line.gst_rate
        ));
    }
    if line.unit_price_paise < 0 || line.discount_paise < 0 {
        problems.push(format!("item {sl}: amounts must not be negative"));
    }

    let gross = (line.quantity * line.unit_price_paise as f64).round();
    let tot_amt = gross as i64;
    if !(gross.abs() < i64::MAX as f64) {
        problems.push(format!("item {sl}: line total is out of range"));
    } else if line.discount_paise > tot_amt {
        problems.push(format!("item {sl}: discount exceeds the line total"));
    }
    if !problems.is_empty() {
        return Err(problems);
    }

    let ass_amt = tot_amt - line.discount_paise;
    let (igst, cgst, sgst) = if intra_state {
        let half = (ass_amt as f64 * line.gst_rate / 200.0).round() as i64;
        (0, half, half)
    } else {
        let full = (ass_amt as f64 * line.gst_rate / 100.0).round() as i64;
        (full, 0, 0)
    };

    let tot_item_val = Paise::checked_sum([ass_amt, igst, cgst, sgst].map(Paise))
        .ok_or_else(|| vec![format!("item {sl}: tax-inclusive total is out of range")])?;

    Ok(ItemDtls {
        sl_no: sl.to_string(),
        prd_desc: line.description.clone(),
        is_servc: if line.is_service { "Y" } else { "N" },
        hsn_cd: hsn.to_owned(),
        qty: line.quantity,
        unit: if line.unit.trim().is_empty() {
            "NOS".to_owned()
        } else {
            line.unit.trim().to_owned()
        },
        unit_price: Paise(line.unit_price_paise),
        tot_amt: Paise(tot_amt),
        discount: Paise(line.discount_paise),
        ass_amt: Paise(ass_amt),
        gst_rt: line.gst_rate,
        igst_amt: Paise(igst),
        cgst_amt: Paise(cgst),
        sgst_amt: Paise(sgst),
        tot_item_val,
    })
}
