use itemflow_core::{validate_email, Item, ItemDraft, ItemValidationError, STATUS_NEW};

#[test]
fn draft_defaults_to_new_status() {
    let draft = ItemDraft::new("Test Name", "Test Desc", "test@example.com");
    assert_eq!(draft.status, STATUS_NEW);
    assert!(draft.validate().is_ok());
}

#[test]
fn email_validation_accepts_basic_addresses() {
    for email in [
        "test@example.com",
        "first.last+tag@mail.example.org",
        "a@b.co",
    ] {
        assert!(validate_email(email).is_ok(), "{email} should be valid");
    }
}

#[test]
fn email_validation_rejects_malformed_addresses() {
    for email in [
        "bad-email",
        "",
        "@example.com",
        "user@",
        "user@localhost",
        "user@.com",
        "user@example.",
        "us er@example.com",
        "user@@example.com",
    ] {
        assert_eq!(
            validate_email(email),
            Err(ItemValidationError::InvalidEmail(email.to_string())),
            "{email} should be rejected"
        );
    }
}

#[test]
fn mark_processed_sets_status() {
    let mut item = ItemDraft::new("n", "d", "n@example.com").into_item(7);
    assert_eq!(item.status, STATUS_NEW);
    item.mark_processed();
    assert_eq!(item.status, "PROCESSED");
    assert_eq!(item.id, 7);
}

#[test]
fn draft_deserialization_ignores_id_and_defaults_status() {
    let draft: ItemDraft = serde_json::from_str(
        r#"{"id": 99, "name": "Test Name", "description": "Test Desc", "email": "test@example.com"}"#,
    )
    .unwrap();
    assert_eq!(draft.name, "Test Name");
    assert_eq!(draft.status, STATUS_NEW);
}

#[test]
fn item_serializes_all_fields() {
    let item = Item {
        id: 1,
        name: "Test Name".to_string(),
        description: "Test Desc".to_string(),
        status: "NEW".to_string(),
        email: "test@example.com".to_string(),
    };
    let value = serde_json::to_value(&item).unwrap();
    assert_eq!(value["id"], 1);
    assert_eq!(value["name"], "Test Name");
    assert_eq!(value["status"], "NEW");
    assert_eq!(value["email"], "test@example.com");
}
