use pageshelf::auth::{self, Authenticator, SecretSet, SignedRequest, Verification};
use pageshelf::clock::ManualClock;
use pageshelf::AuthError;
use std::sync::Arc;

const NOW: u64 = 1_700_000_000_000;
const PATH: &str = "/api/publish?dry=0";
const BODY: &[u8] = br#"{"tenant":"alice","files":[]}"#;

fn authenticator(secrets: &str) -> (Authenticator, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(NOW));
    let auth = Authenticator::new(SecretSet::from_csv(secrets), 300_000, clock.clone());
    (auth, clock)
}

fn request<'a>(timestamp: &'a str, signature: &'a str) -> SignedRequest<'a> {
    SignedRequest {
        method: "post",
        path_and_query: PATH,
        timestamp: Some(timestamp),
        signature: Some(signature),
        body: BODY,
    }
}

#[test]
fn test_rotated_secrets_all_verify() {
    let (auth, _) = authenticator("old-secret, new-secret");
    let ts = NOW.to_string();

    for secret in ["old-secret", "new-secret"] {
        let signature = auth::sign(secret, "POST", PATH, &ts, BODY);
        assert_eq!(auth.verify(&request(&ts, &signature)), Ok(Verification::Verified));
    }

    let foreign = auth::sign("someone-else", "POST", PATH, &ts, BODY);
    assert_eq!(
        auth.verify(&request(&ts, &foreign)),
        Err(AuthError::SignatureMismatch)
    );
}

#[test]
fn test_any_change_to_the_request_breaks_the_signature() {
    let (auth, _) = authenticator("s3cret");
    let ts = NOW.to_string();
    let signature = auth::sign("s3cret", "POST", PATH, &ts, BODY);

    let tampered_body = SignedRequest {
        body: br#"{"tenant":"mallory","files":[]}"#,
        ..request(&ts, &signature)
    };
    assert_eq!(auth.verify(&tampered_body), Err(AuthError::SignatureMismatch));

    let other_path = SignedRequest {
        path_and_query: "/api/publish?dry=1",
        ..request(&ts, &signature)
    };
    assert_eq!(auth.verify(&other_path), Err(AuthError::SignatureMismatch));

    let other_ts = (NOW + 1).to_string();
    assert_eq!(
        auth.verify(&request(&other_ts, &signature)),
        Err(AuthError::SignatureMismatch)
    );
}

#[test]
fn test_timestamp_window() {
    let (auth, clock) = authenticator("s3cret");

    let stale = (NOW - 301_000).to_string();
    let signature = auth::sign("s3cret", "POST", PATH, &stale, BODY);
    assert!(matches!(
        auth.verify(&request(&stale, &signature)),
        Err(AuthError::StaleTimestamp { .. })
    ));

    let edge = (NOW - 300_000).to_string();
    let signature = auth::sign("s3cret", "POST", PATH, &edge, BODY);
    assert_eq!(auth.verify(&request(&edge, &signature)), Ok(Verification::Verified));

    clock.advance_millis(1);
    assert!(auth.verify(&request(&edge, &signature)).is_err());
}

#[test]
fn test_no_secret_bypasses_verification() {
    let (auth, _) = authenticator("");
    assert!(!auth.is_enforced());

    let unsigned = SignedRequest {
        method: "POST",
        path_and_query: PATH,
        timestamp: None,
        signature: None,
        body: BODY,
    };
    assert_eq!(auth.verify(&unsigned), Ok(Verification::Bypassed));

    let strict = auth.require_signature(true);
    assert!(strict.is_enforced());
    assert_eq!(strict.verify(&unsigned), Err(AuthError::NotConfigured));
}
