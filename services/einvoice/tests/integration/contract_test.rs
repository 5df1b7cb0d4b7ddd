use gst_einvoice::domain::payload::build_irn_payload;
use gst_testing::fixture::Fixture;

use crate::helpers::{test_document, test_settings};

#[test]
fn should_match_inter_state_payload_contract() {
    let expected = Fixture::load("contracts/einvoice/irn_payload_inter_state.json");
    let payload = build_irn_payload(&test_settings("https://irp.test"), &test_document(42)).unwrap();

    let actual = serde_json::to_value(&payload).unwrap();

    assert_eq!(actual, expected);
}

#[test]
fn should_split_tax_for_intra_state_supply() {
    let mut doc = test_document(42);
    doc.place_of_supply = Some("29".to_owned());

    let payload = build_irn_payload(&test_settings("https://irp.test"), &doc).unwrap();
    let actual = serde_json::to_value(&payload).unwrap();

    assert_eq!(actual["BuyerDtls"]["Pos"], "29");
    assert_eq!(actual["ValDtls"]["CgstVal"], 90.0);
    assert_eq!(actual["ValDtls"]["SgstVal"], 90.0);
    assert_eq!(actual["ValDtls"]["IgstVal"], 0.0);
    assert_eq!(actual["ValDtls"]["TotInvVal"], 1180.0);
}
