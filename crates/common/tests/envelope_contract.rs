use gitgate_common::envelope::{
    Envelope, EnvelopeStatus, CANNOT_CONNECT_MESSAGE, MISSING_AUTHOR_MESSAGE,
};
use gitgate_common::record::RecordLocation;

fn load_contract() -> serde_json::Value {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/../../contracts/envelope.json");
    let content = std::fs::read_to_string(path).expect("contract file should be readable");
    serde_json::from_str(&content).expect("contract file should be valid JSON")
}

#[test]
fn status_literals_match_contract() {
    let contract = load_contract();
    let expected: Vec<&str> = contract["statuses"]
        .as_array()
        .expect("statuses should be an array")
        .iter()
        .map(|v| v.as_str().expect("status should be a string"))
        .collect();

    let actual: Vec<&str> = [EnvelopeStatus::Success, EnvelopeStatus::Failed, EnvelopeStatus::Failure]
        .into_iter()
        .map(EnvelopeStatus::as_str)
        .collect();
    assert_eq!(actual, expected);
}

#[test]
fn fixed_messages_match_contract() {
    let contract = load_contract();
    assert_eq!(contract["messages"]["cannot_connect"], CANNOT_CONNECT_MESSAGE);
    assert_eq!(contract["messages"]["missing_author"], MISSING_AUTHOR_MESSAGE);
}

#[test]
fn record_examples_match_contract() {
    let contract = load_contract();
    for example in contract["examples"].as_array().expect("examples should be an array") {
        let field = |name: &str| example[name].as_str().expect("example field should be a string");
        let location = RecordLocation::new(field("app_name"), field("model_name"), field("id"))
            .expect("contract example should be a valid location");
        assert_eq!(location.relative_path(), field("relative_path"));
        assert_eq!(location.file_name(), field("file_name"));
    }
}

#[test]
fn envelope_body_round_trips_through_contract_literals() {
    let body = serde_json::to_string(&Envelope::failure(MISSING_AUTHOR_MESSAGE))
        .expect("envelope should serialize");
    assert_eq!(body, r#"{"status":"failure","message":"No user name or email provided"}"#);
}
