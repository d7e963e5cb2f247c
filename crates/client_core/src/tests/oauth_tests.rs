use super::*;

#[test]
fn gmail_request_uses_auth_code_flow_with_mail_scopes() {
    let request = AuthCodeRequest::gmail();
    assert_eq!(request.flow, OAuthFlow::AuthCode);
    assert_eq!(
        request.scope_param(),
        "https://www.googleapis.com/auth/gmail.readonly https://www.googleapis.com/auth/gmail.compose"
    );
}

#[test]
fn authorization_url_requests_offline_code() {
    let url = google_authorization_url("client-123", "postmessage", &AuthCodeRequest::gmail())
        .expect("url");
    assert!(url.as_str().starts_with(GOOGLE_AUTHORIZATION_ENDPOINT));

    let pairs: std::collections::HashMap<String, String> = url
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    assert_eq!(pairs["client_id"], "client-123");
    assert_eq!(pairs["redirect_uri"], "postmessage");
    assert_eq!(pairs["response_type"], "code");
    assert_eq!(pairs["access_type"], "offline");
    assert!(pairs["scope"].contains("gmail.compose"));
}

#[test]
fn authorization_url_requires_client_id_and_code_flow() {
    assert!(matches!(
        google_authorization_url("  ", "postmessage", &AuthCodeRequest::gmail()),
        Err(OAuthError::Provider(_))
    ));

    let implicit = AuthCodeRequest {
        flow: OAuthFlow::Implicit,
        scopes: Vec::new(),
    };
    assert!(matches!(
        google_authorization_url("client", "postmessage", &implicit),
        Err(OAuthError::Provider(_))
    ));
}

#[test]
fn parses_bare_code_and_redirect_url() {
    assert_eq!(
        parse_authorization_response("  4/0AbCdEf \n").expect("bare"),
        "4/0AbCdEf"
    );
    assert_eq!(
        parse_authorization_response("http://localhost:5173/?code=4%2F0Xyz&scope=gmail")
            .expect("redirect"),
        "4/0Xyz"
    );
}

#[test]
fn empty_input_and_access_denied_are_cancellations() {
    assert_eq!(parse_authorization_response(""), Err(OAuthError::Cancelled));
    assert_eq!(
        parse_authorization_response("http://localhost/?error=access_denied"),
        Err(OAuthError::Cancelled)
    );
}

#[test]
fn other_provider_errors_are_reported() {
    let err = parse_authorization_response("http://localhost/?error=invalid_scope")
        .expect_err("provider error");
    assert_eq!(
        err,
        OAuthError::Provider("authorization server returned error 'invalid_scope'".to_string())
    );

    assert!(matches!(
        parse_authorization_response("http://localhost/?state=xyz"),
        Err(OAuthError::Provider(_))
    ));
}
