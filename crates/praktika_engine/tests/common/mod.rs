//! Shared fixtures for the engine integration tests.

#![allow(dead_code)]

use chrono::{Duration, NaiveDate, Utc};
use uuid::Uuid;

use praktika_core::config::ProgramCatalog;
use praktika_core::domain::{
    DeliveryMode, EnrollmentPeriod, License, LicenseStatus, ProgressMetric, Session, User,
    UserRole,
};
use praktika_engine::Engine;
use praktika_store::EngineStore;

/// Opt-in log capture: RUST_LOG=debug cargo test -- --nocapture
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn engine() -> Engine {
    init_tracing();
    let store = EngineStore::open_in_memory().unwrap();
    Engine::new(&ProgramCatalog::default(), store).unwrap()
}

pub fn seed_user(engine: &Engine, birth_year: i32) -> User {
    let user = User {
        id: Uuid::new_v4(),
        display_name: format!("user born {birth_year}"),
        birth_date: NaiveDate::from_ymd_opt(birth_year, 6, 1).unwrap(),
        role: UserRole::Learner,
    };
    engine.store().insert_user(&user).unwrap();
    user
}

pub fn seed_license(
    engine: &Engine,
    user: &User,
    specialization: &str,
    level: &str,
    progress: ProgressMetric,
) -> License {
    let license = License {
        id: Uuid::new_v4(),
        user_id: user.id,
        specialization_id: specialization.to_string(),
        current_level: level.to_string(),
        status: LicenseStatus::Active,
        progress,
        created_at: Utc::now(),
    };
    engine.store().insert_license(&license).unwrap();
    license
}

/// Enrollment period covering today.
pub fn seed_period(engine: &Engine, license: &License, paid: bool, semester: u32) -> EnrollmentPeriod {
    let today = Utc::now().date_naive();
    let period = EnrollmentPeriod {
        id: Uuid::new_v4(),
        license_id: license.id,
        starts_on: today - Duration::days(30),
        ends_on: today + Duration::days(150),
        payment_verified: paid,
        semester_index: semester,
    };
    engine.store().insert_enrollment_period(&period).unwrap();
    period
}

/// Bookable session a week out, deadline tomorrow plus five days.
pub fn seed_session(engine: &Engine, specialization: &str, capacity: u32) -> Session {
    seed_session_with_mode(engine, specialization, capacity, DeliveryMode::InPerson)
}

pub fn seed_session_with_mode(
    engine: &Engine,
    specialization: &str,
    capacity: u32,
    mode: DeliveryMode,
) -> Session {
    let now = Utc::now();
    let session = Session {
        id: Uuid::new_v4(),
        specialization_id: specialization.to_string(),
        starts_at: now + Duration::days(7),
        ends_at: now + Duration::days(7) + Duration::hours(2),
        capacity,
        booked_count: 0,
        booking_deadline: now + Duration::days(6),
        delivery_mode: mode,
    };
    engine.store().insert_session(&session).unwrap();
    session
}
