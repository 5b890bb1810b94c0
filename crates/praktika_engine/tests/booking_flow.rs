//! End-to-end booking workflow: eligibility questions, reservation,
//! cancellation, and the session-based versus semester-based asymmetry.

mod common;

use chrono::{Duration, Utc};
use uuid::Uuid;

use common::*;
use praktika_core::domain::ProgressMetric;
use praktika_core::reason::DenialReason;
use praktika_engine::EngineError;

#[test]
fn session_based_booking_needs_no_payment() {
    let engine = engine();
    let user = seed_user(&engine, 2014);
    seed_license(&engine, &user, "YOUTH", "KIDS", ProgressMetric::None);
    let session = seed_session(&engine, "YOUTH", 10);

    let decision = engine.can_book_session(user.id, session.id).unwrap();
    assert!(decision.allowed, "denied: {:?}", decision.reason);

    let booking = engine.reserve_booking(user.id, session.id).unwrap();
    assert_eq!(booking.user_id, user.id);
    assert_eq!(engine.store().get_session(session.id).unwrap().booked_count, 1);
}

#[test]
fn semester_based_booking_denied_without_period() {
    let engine = engine();
    let user = seed_user(&engine, 2000);
    seed_license(
        &engine,
        &user,
        "COACH",
        "ASSISTANT",
        ProgressMetric::TaughtHours { hours: 0 },
    );
    let session = seed_session(&engine, "COACH", 10);

    let decision = engine.can_book_session(user.id, session.id).unwrap();
    assert_eq!(decision.reason, Some(DenialReason::EnrollmentPeriodMissing));

    let err = engine.reserve_booking(user.id, session.id).unwrap_err();
    assert_eq!(err.denial(), Some(DenialReason::EnrollmentPeriodMissing));
}

#[test]
fn semester_based_booking_denied_until_payment_verified() {
    let engine = engine();
    let user = seed_user(&engine, 2000);
    let license = seed_license(
        &engine,
        &user,
        "COACH",
        "ASSISTANT",
        ProgressMetric::TaughtHours { hours: 0 },
    );
    let period = seed_period(&engine, &license, false, 1);
    let session = seed_session(&engine, "COACH", 10);

    let decision = engine.can_book_session(user.id, session.id).unwrap();
    assert_eq!(decision.reason, Some(DenialReason::PaymentNotVerified));

    // Payment verification lands; the same request now passes
    engine.store().set_payment_verified(period.id, true).unwrap();
    let decision = engine.can_book_session(user.id, session.id).unwrap();
    assert!(decision.allowed);
    engine.reserve_booking(user.id, session.id).unwrap();
}

#[test]
fn booking_denied_after_deadline() {
    let engine = engine();
    let user = seed_user(&engine, 2014);
    seed_license(&engine, &user, "YOUTH", "KIDS", ProgressMetric::None);
    let mut session = seed_session(&engine, "YOUTH", 10);
    session.booking_deadline = Utc::now() - Duration::hours(1);
    // Reinsert with the stale deadline under a fresh id
    session.id = Uuid::new_v4();
    engine.store().insert_session(&session).unwrap();

    let err = engine.reserve_booking(user.id, session.id).unwrap_err();
    assert_eq!(err.denial(), Some(DenialReason::BookingDeadlinePassed));
}

#[test]
fn duplicate_booking_denied() {
    let engine = engine();
    let user = seed_user(&engine, 2014);
    seed_license(&engine, &user, "YOUTH", "KIDS", ProgressMetric::None);
    let session = seed_session(&engine, "YOUTH", 10);

    engine.reserve_booking(user.id, session.id).unwrap();
    let err = engine.reserve_booking(user.id, session.id).unwrap_err();
    assert_eq!(err.denial(), Some(DenialReason::AlreadyBooked));
    assert_eq!(engine.store().get_session(session.id).unwrap().booked_count, 1);
}

#[test]
fn cancellation_returns_the_seat() {
    let engine = engine();
    let first = seed_user(&engine, 2014);
    let second = seed_user(&engine, 2013);
    seed_license(&engine, &first, "YOUTH", "KIDS", ProgressMetric::None);
    seed_license(&engine, &second, "YOUTH", "KIDS", ProgressMetric::None);
    let session = seed_session(&engine, "YOUTH", 1);

    engine.reserve_booking(first.id, session.id).unwrap();
    let err = engine.reserve_booking(second.id, session.id).unwrap_err();
    assert_eq!(err.denial(), Some(DenialReason::CapacityExhausted));

    assert!(engine.cancel_booking(first.id, session.id).unwrap());
    assert_eq!(engine.store().get_session(session.id).unwrap().booked_count, 0);

    // The freed seat is bookable again
    engine.reserve_booking(second.id, session.id).unwrap();
}

#[test]
fn cancelling_nothing_is_a_noop() {
    let engine = engine();
    let user = seed_user(&engine, 2014);
    seed_license(&engine, &user, "YOUTH", "KIDS", ProgressMetric::None);
    let session = seed_session(&engine, "YOUTH", 5);

    assert!(!engine.cancel_booking(user.id, session.id).unwrap());
}

#[test]
fn mismatched_specialization_denied() {
    let engine = engine();
    let user = seed_user(&engine, 2000);
    seed_license(
        &engine,
        &user,
        "COACH",
        "ASSISTANT",
        ProgressMetric::TaughtHours { hours: 0 },
    );
    // User holds a COACH license but tries a BUDO session without one
    let session = seed_session(&engine, "BUDO", 10);
    let decision = engine.can_book_session(user.id, session.id).unwrap();
    assert_eq!(decision.reason, Some(DenialReason::LicenseInactiveOrMissing));
}

#[test]
fn prefix_resolution_reaches_the_family_model() {
    let engine = engine();
    let model = engine.resolve_specialization_model("COACH_PRO_HEAD").unwrap();
    assert_eq!(model.specialization_id(), "COACH");

    let err = engine.resolve_specialization_model("UNKNOWN_TRACK").unwrap_err();
    assert_eq!(err.denial(), Some(DenialReason::SpecializationUnknown));
}

#[test]
fn requirements_report_missing_pieces() {
    let engine = engine();
    let user = seed_user(&engine, 2000);
    let license = seed_license(
        &engine,
        &user,
        "COACH",
        "ASSISTANT",
        ProgressMetric::TaughtHours { hours: 0 },
    );
    let reqs = engine
        .describe_enrollment_requirements(user.id, "COACH")
        .unwrap();
    assert!(!reqs.can_participate);
    assert!(reqs.missing.contains(&DenialReason::EnrollmentPeriodMissing));

    seed_period(&engine, &license, true, 1);
    let reqs = engine
        .describe_enrollment_requirements(user.id, "COACH")
        .unwrap();
    assert!(reqs.can_participate);
    assert!(reqs.missing.is_empty());
}

#[test]
fn engine_works_on_a_disk_backed_store() {
    use praktika_core::config::ProgramCatalog;
    use praktika_engine::Engine;
    use praktika_store::EngineStore;

    let dir = tempfile::tempdir().unwrap();
    let store = EngineStore::open(&dir.path().join("praktika.db")).unwrap();
    let engine = Engine::new(&ProgramCatalog::default(), store).unwrap();

    let user = seed_user(&engine, 2014);
    seed_license(&engine, &user, "YOUTH", "KIDS", ProgressMetric::None);
    let session = seed_session(&engine, "YOUTH", 2);
    engine.reserve_booking(user.id, session.id).unwrap();
    assert_eq!(engine.store().get_session(session.id).unwrap().booked_count, 1);
}

#[test]
fn corrupt_level_token_is_fatal_not_deniable() {
    let engine = engine();
    let user = seed_user(&engine, 2000);
    let license = seed_license(
        &engine,
        &user,
        "COACH",
        "GRANDMASTER", // not a COACH ladder level
        ProgressMetric::TaughtHours { hours: 0 },
    );
    let err = engine.verify_license_integrity(license.id).unwrap_err();
    match err {
        EngineError::CorruptLevel { level, .. } => assert_eq!(level, "GRANDMASTER"),
        other => panic!("expected CorruptLevel, got {other:?}"),
    }
}
