//! End-to-end submission pipeline tests against the in-memory backend.

use std::sync::Arc;

use chrono::{Duration, Utc};

use rollcall_core::{
    distance_meters, AttendanceError, AttendanceOutcome, AuthMethod, GeoPoint, IdentityStore,
    SessionStatus, SessionStore,
};
use rollcall_store::MemoryStore;

use crate::common::{
    code_for, secret_of, seed_subject, session_doc, submit_req, world, world_with_failing_sink,
    world_with_gate, TEST_FINGERPRINT,
};

#[tokio::test]
async fn test_end_to_end_accept() {
    let w = world();
    let now = Utc::now();
    let session = session_doc("s1", "org1", now);
    let secret = seed_subject(&w, "stu1", 7).await;
    let code = code_for(&session, &secret);
    w.store.insert_session(session).await.unwrap();

    // ~55 m north of the origin, 10 m accuracy.
    let receipt = w
        .engine
        .submit(submit_req("s1", "stu1", code, 0.0005, 0.0, 10.0))
        .await
        .unwrap();

    assert_eq!(receipt.stats.accepted_count, 1);
    assert_eq!(receipt.stats.attempt_count, 1);
    assert!(receipt.distance_m > 50.0 && receipt.distance_m < 60.0);

    let record = w.store.attendance("s1", "stu1").await.unwrap().unwrap();
    assert_eq!(record.outcome, AttendanceOutcome::Accepted);
    assert!(record.flags.time_ok && record.flags.code_ok && record.flags.location_ok);
    assert_eq!(record.presented_code, code);

    assert_eq!(w.sink.count_of("ATTENDANCE_SUBMITTED"), 1);
    assert_eq!(w.sink.count_of("ATTENDANCE_SUBMIT_FAILED"), 0);
}

#[tokio::test]
async fn test_second_submission_is_duplicate() {
    let w = world();
    let now = Utc::now();
    let session = session_doc("s1", "org1", now);
    let secret = seed_subject(&w, "stu1", 7).await;
    let code = code_for(&session, &secret);
    w.store.insert_session(session).await.unwrap();

    w.engine
        .submit(submit_req("s1", "stu1", code, 0.0, 0.0, 10.0))
        .await
        .unwrap();
    let err = w
        .engine
        .submit(submit_req("s1", "stu1", code, 0.0, 0.0, 10.0))
        .await
        .unwrap_err();

    assert!(matches!(err, AttendanceError::Duplicate));
    assert_eq!(err.code(), "ERR_DUPLICATE");

    let session = w.store.session("s1").await.unwrap().unwrap();
    assert_eq!(session.stats.attempt_count, 1);
    assert_eq!(w.sink.count_of("ATTENDANCE_SUBMITTED"), 1);
    assert_eq!(w.sink.count_of("ATTENDANCE_SUBMIT_FAILED"), 1);
}

#[tokio::test]
async fn test_wrong_code_rejected() {
    let w = world();
    let now = Utc::now();
    let session = session_doc("s1", "org1", now);
    let secret = seed_subject(&w, "stu1", 7).await;
    let code = code_for(&session, &secret);
    w.store.insert_session(session).await.unwrap();

    let wrong = (code + 1) % 1000;
    let err = w
        .engine
        .submit(submit_req("s1", "stu1", wrong, 0.0, 0.0, 10.0))
        .await
        .unwrap_err();

    assert!(matches!(err, AttendanceError::InvalidCode));
    assert_eq!(err.code(), "ERR_INVALID_CODE");
    assert!(w.store.attendance("s1", "stu1").await.unwrap().is_none());
}

#[tokio::test]
async fn test_coarse_fix_rejected_before_distance() {
    let w = world();
    let now = Utc::now();
    let session = session_doc("s1", "org1", now);
    let secret = seed_subject(&w, "stu1", 7).await;
    let code = code_for(&session, &secret);
    w.store.insert_session(session).await.unwrap();

    // Far outside the geofence AND too coarse: the accuracy gate must
    // fire first, before any distance is computed.
    let err = w
        .engine
        .submit(submit_req("s1", "stu1", code, 1.0, 1.0, 60.0))
        .await
        .unwrap_err();

    assert!(matches!(err, AttendanceError::LocationTooCoarse { .. }));
    assert_eq!(err.code(), "ERR_OUT_OF_RANGE");
}

#[tokio::test]
async fn test_geofence_boundary_inclusive() {
    let w = world();
    let now = Utc::now();
    let center = GeoPoint { lat: 0.0, lng: 0.0 };

    // A point ~500 m east along the equator; the session radius is set to
    // the exact computed distance, so the submission sits on the boundary.
    let boundary = GeoPoint {
        lat: 0.0,
        lng: 0.0044966,
    };
    let radius_m = distance_meters(boundary, center);

    let mut session = session_doc("s1", "org1", now);
    session.radius_m = radius_m;
    let secret = seed_subject(&w, "stu1", 7).await;
    let code = code_for(&session, &secret);
    w.store.insert_session(session).await.unwrap();

    let receipt = w
        .engine
        .submit(submit_req("s1", "stu1", code, boundary.lat, boundary.lng, 10.0))
        .await
        .unwrap();
    assert!((receipt.distance_m - radius_m).abs() < 1e-6);
}

#[tokio::test]
async fn test_one_meter_beyond_boundary_rejected() {
    let w = world();
    let now = Utc::now();
    let center = GeoPoint { lat: 0.0, lng: 0.0 };
    let boundary = GeoPoint {
        lat: 0.0,
        lng: 0.0044966,
    };
    let radius_m = distance_meters(boundary, center);

    // Distance scales linearly with longitude on the equator, so this
    // point is one meter past the boundary.
    let beyond = GeoPoint {
        lat: 0.0,
        lng: boundary.lng * (radius_m + 1.0) / radius_m,
    };

    let mut session = session_doc("s1", "org1", now);
    session.radius_m = radius_m;
    let secret = seed_subject(&w, "stu1", 7).await;
    let code = code_for(&session, &secret);
    w.store.insert_session(session).await.unwrap();

    let err = w
        .engine
        .submit(submit_req("s1", "stu1", code, beyond.lat, beyond.lng, 10.0))
        .await
        .unwrap_err();

    match &err {
        AttendanceError::OutOfRange {
            distance_m,
            radius_m: r,
        } => assert!(distance_m > r),
        other => panic!("expected OutOfRange, got {other:?}"),
    }
    assert_eq!(err.code(), "ERR_OUT_OF_RANGE");
}

#[tokio::test]
async fn test_expired_session_rejected() {
    let w = world();
    let now = Utc::now();
    let mut session = session_doc("s1", "org1", now - Duration::seconds(600));
    session.expires_at = now - Duration::seconds(1);
    let secret = seed_subject(&w, "stu1", 7).await;
    let code = code_for(&session, &secret);
    w.store.insert_session(session).await.unwrap();

    let err = w
        .engine
        .submit(submit_req("s1", "stu1", code, 0.0, 0.0, 10.0))
        .await
        .unwrap_err();

    // Expiry is distinct internally but coalesced on the wire.
    assert!(matches!(err, AttendanceError::SessionExpired { .. }));
    assert_eq!(err.code(), "ERR_NOT_AUTHORIZED");
}

#[tokio::test]
async fn test_unexpired_session_accepts_near_cutoff() {
    let w = world();
    let now = Utc::now();
    let mut session = session_doc("s1", "org1", now - Duration::seconds(270));
    session.expires_at = now + Duration::seconds(30);
    let secret = seed_subject(&w, "stu1", 7).await;
    let code = code_for(&session, &secret);
    w.store.insert_session(session).await.unwrap();

    assert!(w
        .engine
        .submit(submit_req("s1", "stu1", code, 0.0, 0.0, 10.0))
        .await
        .is_ok());
}

#[tokio::test]
async fn test_closed_session_rejects_submissions() {
    let w = world();
    let now = Utc::now();
    let mut session = session_doc("s1", "org1", now);
    session.status = SessionStatus::Closed;
    let secret = seed_subject(&w, "stu1", 7).await;
    let code = code_for(&session, &secret);
    w.store.insert_session(session).await.unwrap();

    let err = w
        .engine
        .submit(submit_req("s1", "stu1", code, 0.0, 0.0, 10.0))
        .await
        .unwrap_err();
    assert!(matches!(err, AttendanceError::SessionNotOpen { .. }));
    assert_eq!(err.code(), "ERR_NOT_AUTHORIZED");
}

#[tokio::test]
async fn test_first_use_binding_then_mismatch() {
    let w = world();
    let now = Utc::now();
    let session = session_doc("s1", "org1", now);
    let secret = seed_subject(&w, "stu1", 7).await;
    let code = code_for(&session, &secret);
    w.store.insert_session(session).await.unwrap();

    // No prior binding: the submission binds the presented fingerprint.
    w.engine
        .submit(submit_req("s1", "stu1", code, 0.0, 0.0, 10.0))
        .await
        .unwrap();
    let subject = w.store.participant("stu1").await.unwrap().unwrap();
    let binding = subject.device_binding.expect("binding recorded");
    assert_eq!(binding.fingerprint, TEST_FINGERPRINT);

    // A different device on a later session is refused.
    let session2 = session_doc("s2", "org1", now);
    let code2 = code_for(&session2, &secret);
    w.store.insert_session(session2).await.unwrap();

    let mut req = submit_req("s2", "stu1", code2, 0.0, 0.0, 10.0);
    req.device_fingerprint = "fp-other".to_string();
    let err = w.engine.submit(req).await.unwrap_err();
    assert!(matches!(err, AttendanceError::DeviceMismatch));
    assert_eq!(err.code(), "ERR_DEVICE_MISMATCH");
}

#[tokio::test]
async fn test_negative_integrity_verdict_rejected() {
    let w = world_with_gate(false);
    let now = Utc::now();
    let session = session_doc("s1", "org1", now);
    let secret = seed_subject(&w, "stu1", 7).await;
    let code = code_for(&session, &secret);
    w.store.insert_session(session).await.unwrap();

    let mut req = submit_req("s1", "stu1", code, 0.0, 0.0, 10.0);
    req.auth = AuthMethod::Biometric {
        attestation_token: "opaque-token".to_string(),
    };
    let err = w.engine.submit(req).await.unwrap_err();
    assert!(matches!(err, AttendanceError::AttestationFailed { .. }));
    assert_eq!(err.code(), "ERR_ATTESTATION_FAILED");
}

#[tokio::test]
async fn test_biometric_with_positive_verdict_accepted() {
    let w = world();
    let now = Utc::now();
    let session = session_doc("s1", "org1", now);
    let secret = seed_subject(&w, "stu1", 7).await;
    let code = code_for(&session, &secret);
    w.store.insert_session(session).await.unwrap();

    let mut req = submit_req("s1", "stu1", code, 0.0, 0.0, 10.0);
    req.auth = AuthMethod::Biometric {
        attestation_token: "opaque-token".to_string(),
    };
    assert!(w.engine.submit(req).await.is_ok());
}

#[tokio::test]
async fn test_wrong_pin_rejected() {
    let w = world();
    let now = Utc::now();
    let session = session_doc("s1", "org1", now);
    let secret = seed_subject(&w, "stu1", 7).await;
    let code = code_for(&session, &secret);
    w.store.insert_session(session).await.unwrap();

    let mut req = submit_req("s1", "stu1", code, 0.0, 0.0, 10.0);
    req.auth = AuthMethod::Pin {
        pin: "0000".to_string(),
    };
    let err = w.engine.submit(req).await.unwrap_err();
    assert_eq!(err.code(), "ERR_NOT_AUTHORIZED");
}

#[tokio::test]
async fn test_pin_without_stored_digest_rejected() {
    let w = world();
    let now = Utc::now();
    let session = session_doc("s1", "org1", now);
    let secret = seed_subject(&w, "stu1", 7).await;
    let code = code_for(&session, &secret);

    let mut subject = crate::common::subject_doc("stu1");
    subject.pin_digest = None;
    w.store.upsert_participant(subject).unwrap();
    w.store.insert_session(session).await.unwrap();

    let err = w
        .engine
        .submit(submit_req("s1", "stu1", code, 0.0, 0.0, 10.0))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "ERR_NOT_AUTHORIZED");
}

#[tokio::test]
async fn test_subject_outside_scope_rejected() {
    let w = world();
    let now = Utc::now();
    let mut session = session_doc("s1", "org1", now);
    session.scope.cohorts = vec!["2026".to_string()];
    let secret = seed_subject(&w, "stu1", 7).await; // cohort 2027
    let code = code_for(&session, &secret);
    w.store.insert_session(session).await.unwrap();

    let err = w
        .engine
        .submit(submit_req("s1", "stu1", code, 0.0, 0.0, 10.0))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "ERR_NOT_AUTHORIZED");
}

#[tokio::test]
async fn test_non_subject_cannot_submit() {
    let w = world();
    let now = Utc::now();
    let session = session_doc("s1", "org1", now);
    w.store
        .upsert_participant(crate::common::organizer_doc("org1"))
        .unwrap();
    w.store.insert_session(session).await.unwrap();

    let err = w
        .engine
        .submit(submit_req("s1", "org1", 123, 0.0, 0.0, 10.0))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "ERR_NOT_AUTHORIZED");
}

#[tokio::test]
async fn test_unknown_session_not_found() {
    let w = world();
    seed_subject(&w, "stu1", 7).await;

    let err = w
        .engine
        .submit(submit_req("ghost", "stu1", 123, 0.0, 0.0, 10.0))
        .await
        .unwrap_err();
    assert!(matches!(err, AttendanceError::NotFound { .. }));
    assert_eq!(err.code(), "ERR_NOT_FOUND");
}

#[tokio::test]
async fn test_audit_outage_does_not_block_submission() {
    let (store, engine) = world_with_failing_sink();
    let now = Utc::now();
    let session = session_doc("s1", "org1", now);
    let secret = secret_of(7);
    let code = code_for(&session, &secret);

    store
        .upsert_participant(crate::common::subject_doc("stu1"))
        .unwrap();
    store.set_participant_secret("stu1", secret).unwrap();
    store.insert_session(session).await.unwrap();

    // The sink errors on every event; the submission must still commit.
    let receipt = engine
        .submit(submit_req("s1", "stu1", code, 0.0, 0.0, 10.0))
        .await
        .unwrap();
    assert_eq!(receipt.stats.accepted_count, 1);
}

#[tokio::test]
async fn test_concurrent_submissions_commit_exactly_once() {
    let w = world();
    let now = Utc::now();
    let session = session_doc("s1", "org1", now);
    let secret = seed_subject(&w, "stu1", 7).await;
    let code = code_for(&session, &secret);
    w.store.insert_session(session).await.unwrap();

    let engine = Arc::new(w.engine);
    let store: Arc<MemoryStore> = w.store.clone();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let engine = engine.clone();
        let req = submit_req("s1", "stu1", code, 0.0, 0.0, 10.0);
        handles.push(tokio::spawn(async move { engine.submit(req).await }));
    }

    let mut accepted = 0;
    let mut duplicates = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => accepted += 1,
            Err(AttendanceError::Duplicate) => duplicates += 1,
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }

    assert_eq!(accepted, 1);
    assert_eq!(duplicates, 7);

    let session = store.session("s1").await.unwrap().unwrap();
    assert_eq!(session.stats.accepted_count, 1);
    assert_eq!(session.stats.attempt_count, 1);
}
