use super::*;

#[test]
fn user_serialization_omits_absent_optional_fields() {
    let user = User::new("a@b.com").with_name("A");
    let text = serde_json::to_string(&user).expect("serialize");
    assert_eq!(text, r#"{"email":"a@b.com","name":"A"}"#);
}

#[test]
fn user_deserialization_ignores_unknown_fields() {
    let user: User = serde_json::from_str(
        r#"{"email":"a@b.com","picture":"https://example.com/p.png","id":"123"}"#,
    )
    .expect("deserialize");
    assert_eq!(user.email, "a@b.com");
    assert_eq!(user.name, None);
    assert_eq!(user.picture.as_deref(), Some("https://example.com/p.png"));
    assert_eq!(user.display_name(), "a@b.com");
}

#[test]
fn phase_labels_cover_every_state() {
    assert_eq!(SessionPhase::Unauthenticated.label(), "unauthenticated");
    assert_eq!(SessionPhase::Authenticating.label(), "authenticating");
    assert_eq!(
        SessionPhase::Authenticated(AgentRunStatus::Running).label(),
        "authenticated-running"
    );
    assert!(SessionPhase::Authenticated(AgentRunStatus::Failed).is_authenticated());
    assert!(!SessionPhase::Authenticating.is_authenticated());
}
