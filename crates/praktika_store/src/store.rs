//! Engine store v0.4.2 - SQLite-backed persistence
//!
//! Holds every row the engine reads plus the three pieces of state it
//! mutates: `sessions.booked_count`, `licenses.current_level`/`progress`
//! and `assessments.state`. The mutating operations run as single
//! transactions scoped to one row's read-modify-write, so two concurrent
//! requests for the last seat can never both commit and the uniqueness
//! keys collapse concurrent creations onto one row.

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::debug;
use uuid::Uuid;

use praktika_core::domain::{
    AssessmentRecord, AssessmentState, Booking, DeliveryMode, EnrollmentPeriod, License,
    LicenseStatus, ProgressMetric, ProgressionRecord, Session, User, UserRole,
};

use crate::error::{classify, StoreError};

/// Result of a guarded assessment-state transition.
#[derive(Debug, Clone)]
pub enum AssessmentTransition {
    /// The edge was taken and the row updated
    Applied(AssessmentRecord),
    /// The row already was in the target state; nothing changed
    Unchanged(AssessmentRecord),
    /// The current state has no edge to the target; row left untouched
    Refused { current: AssessmentState },
}

/// SQLite store shared by the gates. Cheap to clone; all clones serialize
/// on one connection.
#[derive(Clone)]
pub struct EngineStore {
    conn: Arc<Mutex<Connection>>,
}

impl EngineStore {
    /// Open or create the store at a specific path.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// In-memory store for tests.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();

        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                display_name TEXT NOT NULL,
                birth_date TEXT NOT NULL,
                role TEXT NOT NULL
            )
            "#,
            [],
        )?;

        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS licenses (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL REFERENCES users(id),
                specialization_id TEXT NOT NULL,
                current_level TEXT NOT NULL,
                status TEXT NOT NULL,
                progress TEXT NOT NULL,
                created_at TEXT NOT NULL,
                UNIQUE(user_id, specialization_id)
            )
            "#,
            [],
        )?;

        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS enrollment_periods (
                id TEXT PRIMARY KEY,
                license_id TEXT NOT NULL REFERENCES licenses(id),
                starts_on TEXT NOT NULL,
                ends_on TEXT NOT NULL,
                payment_verified INTEGER NOT NULL DEFAULT 0,
                semester_index INTEGER NOT NULL
            )
            "#,
            [],
        )?;

        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS sessions (
                id TEXT PRIMARY KEY,
                specialization_id TEXT NOT NULL,
                starts_at TEXT NOT NULL,
                ends_at TEXT NOT NULL,
                capacity INTEGER NOT NULL,
                booked_count INTEGER NOT NULL DEFAULT 0,
                booking_deadline TEXT NOT NULL,
                delivery_mode TEXT NOT NULL
            )
            "#,
            [],
        )?;

        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS bookings (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                session_id TEXT NOT NULL,
                created_at TEXT NOT NULL,
                UNIQUE(user_id, session_id)
            )
            "#,
            [],
        )?;

        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS progression_records (
                id TEXT PRIMARY KEY,
                license_id TEXT NOT NULL,
                from_level TEXT NOT NULL,
                to_level TEXT NOT NULL,
                recorded_at TEXT NOT NULL,
                evaluator_id TEXT NOT NULL,
                evidence TEXT NOT NULL,
                UNIQUE(license_id, to_level)
            )
            "#,
            [],
        )?;

        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS xp_awards (
                id TEXT PRIMARY KEY,
                license_id TEXT NOT NULL,
                session_id TEXT NOT NULL,
                xp INTEGER NOT NULL,
                makeup INTEGER NOT NULL DEFAULT 0,
                awarded_at TEXT NOT NULL,
                UNIQUE(license_id, session_id)
            )
            "#,
            [],
        )?;

        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS assessments (
                id TEXT PRIMARY KEY,
                subject_id TEXT NOT NULL,
                kind TEXT NOT NULL,
                state TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                UNIQUE(subject_id, kind)
            )
            "#,
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_licenses_user ON licenses(user_id)",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_periods_license ON enrollment_periods(license_id)",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_bookings_session ON bookings(session_id)",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_records_license ON progression_records(license_id)",
            [],
        )?;

        Ok(())
    }

    // ========================================================================
    // Users
    // ========================================================================

    pub fn insert_user(&self, user: &User) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO users (id, display_name, birth_date, role) VALUES (?1, ?2, ?3, ?4)",
            params![
                user.id.to_string(),
                user.display_name,
                user.birth_date,
                user.role.as_str()
            ],
        )?;
        Ok(())
    }

    pub fn get_user(&self, id: Uuid) -> Result<User, StoreError> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT id, display_name, birth_date, role FROM users WHERE id = ?1",
            params![id.to_string()],
            map_user,
        )
        .optional()?
        .ok_or_else(|| StoreError::not_found("user", id))
    }

    // ========================================================================
    // Licenses
    // ========================================================================

    pub fn insert_license(&self, license: &License) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"
            INSERT INTO licenses (id, user_id, specialization_id, current_level, status, progress, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                license.id.to_string(),
                license.user_id.to_string(),
                license.specialization_id,
                license.current_level,
                license.status.as_str(),
                progress_to_json(&license.progress)?,
                license.created_at,
            ],
        )?;
        Ok(())
    }

    pub fn get_license(&self, id: Uuid) -> Result<License, StoreError> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT id, user_id, specialization_id, current_level, status, progress, created_at \
             FROM licenses WHERE id = ?1",
            params![id.to_string()],
            map_license,
        )
        .optional()?
        .ok_or_else(|| StoreError::not_found("license", id))
    }

    /// The user's license in one specialization, if any.
    pub fn find_license(
        &self,
        user_id: Uuid,
        specialization_id: &str,
    ) -> Result<Option<License>, StoreError> {
        let conn = self.conn.lock().unwrap();
        Ok(conn
            .query_row(
                "SELECT id, user_id, specialization_id, current_level, status, progress, created_at \
                 FROM licenses WHERE user_id = ?1 AND specialization_id = ?2",
                params![user_id.to_string(), specialization_id],
                map_license,
            )
            .optional()?)
    }

    /// Overwrite a license's progress metric (position selection, manual
    /// corrections). Level transitions go through [`Self::apply_transition`].
    pub fn update_progress(
        &self,
        license_id: Uuid,
        progress: &ProgressMetric,
    ) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute(
            "UPDATE licenses SET progress = ?1 WHERE id = ?2",
            params![progress_to_json(progress)?, license_id.to_string()],
        )?;
        if changed == 0 {
            return Err(StoreError::not_found("license", license_id));
        }
        Ok(())
    }

    // ========================================================================
    // Enrollment periods
    // ========================================================================

    pub fn insert_enrollment_period(&self, period: &EnrollmentPeriod) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"
            INSERT INTO enrollment_periods (id, license_id, starts_on, ends_on, payment_verified, semester_index)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                period.id.to_string(),
                period.license_id.to_string(),
                period.starts_on,
                period.ends_on,
                period.payment_verified as i64,
                period.semester_index,
            ],
        )?;
        Ok(())
    }

    /// The period covering `on` for a license, latest start first when
    /// several overlap.
    pub fn current_period_for(
        &self,
        license_id: Uuid,
        on: NaiveDate,
    ) -> Result<Option<EnrollmentPeriod>, StoreError> {
        let conn = self.conn.lock().unwrap();
        Ok(conn
            .query_row(
                "SELECT id, license_id, starts_on, ends_on, payment_verified, semester_index \
                 FROM enrollment_periods \
                 WHERE license_id = ?1 AND starts_on <= ?2 AND ends_on >= ?2 \
                 ORDER BY starts_on DESC LIMIT 1",
                params![license_id.to_string(), on],
                map_period,
            )
            .optional()?)
    }

    /// Record the outcome of payment verification for a period.
    pub fn set_payment_verified(&self, period_id: Uuid, verified: bool) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute(
            "UPDATE enrollment_periods SET payment_verified = ?1 WHERE id = ?2",
            params![verified as i64, period_id.to_string()],
        )?;
        if changed == 0 {
            return Err(StoreError::not_found("enrollment_period", period_id));
        }
        Ok(())
    }

    // ========================================================================
    // Sessions and bookings
    // ========================================================================

    pub fn insert_session(&self, session: &Session) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"
            INSERT INTO sessions (id, specialization_id, starts_at, ends_at, capacity, booked_count, booking_deadline, delivery_mode)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                session.id.to_string(),
                session.specialization_id,
                session.starts_at,
                session.ends_at,
                session.capacity,
                session.booked_count,
                session.booking_deadline,
                session.delivery_mode.as_str(),
            ],
        )?;
        Ok(())
    }

    pub fn get_session(&self, id: Uuid) -> Result<Session, StoreError> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT id, specialization_id, starts_at, ends_at, capacity, booked_count, booking_deadline, delivery_mode \
             FROM sessions WHERE id = ?1",
            params![id.to_string()],
            map_session,
        )
        .optional()?
        .ok_or_else(|| StoreError::not_found("session", id))
    }

    pub fn get_booking(
        &self,
        user_id: Uuid,
        session_id: Uuid,
    ) -> Result<Option<Booking>, StoreError> {
        let conn = self.conn.lock().unwrap();
        Ok(conn
            .query_row(
                "SELECT id, user_id, session_id, created_at FROM bookings \
                 WHERE user_id = ?1 AND session_id = ?2",
                params![user_id.to_string(), session_id.to_string()],
                map_booking,
            )
            .optional()?)
    }

    /// Atomically consume one capacity unit and create the booking row.
    /// Capacity check + increment and uniqueness check + insert commit or
    /// roll back together; the caller retries on [`StoreError::WriteConflict`].
    pub fn reserve_seat(
        &self,
        user_id: Uuid,
        session_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Booking, StoreError> {
        let conn = self.conn.lock().unwrap();
        let tx = conn.unchecked_transaction().map_err(classify)?;

        let row: Option<(u32, u32)> = tx
            .query_row(
                "SELECT capacity, booked_count FROM sessions WHERE id = ?1",
                params![session_id.to_string()],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .optional()
            .map_err(classify)?;
        let (capacity, booked) =
            row.ok_or_else(|| StoreError::not_found("session", session_id))?;

        if booked >= capacity {
            // Dropping the transaction rolls it back
            return Err(StoreError::CapacityExhausted);
        }

        let already: Option<i64> = tx
            .query_row(
                "SELECT 1 FROM bookings WHERE user_id = ?1 AND session_id = ?2",
                params![user_id.to_string(), session_id.to_string()],
                |r| r.get(0),
            )
            .optional()
            .map_err(classify)?;
        if already.is_some() {
            return Err(StoreError::DuplicateBooking);
        }

        let booking = Booking {
            id: Uuid::new_v4(),
            user_id,
            session_id,
            created_at: now,
        };
        tx.execute(
            "INSERT INTO bookings (id, user_id, session_id, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                booking.id.to_string(),
                user_id.to_string(),
                session_id.to_string(),
                booking.created_at,
            ],
        )
        .map_err(classify)?;

        // Guarded increment: if another committer moved the count since our
        // read, fail the whole transaction and let the gate retry
        let changed = tx
            .execute(
                "UPDATE sessions SET booked_count = booked_count + 1 \
                 WHERE id = ?1 AND booked_count = ?2",
                params![session_id.to_string(), booked],
            )
            .map_err(classify)?;
        if changed == 0 {
            return Err(StoreError::WriteConflict);
        }

        tx.commit().map_err(classify)?;
        debug!(user = %user_id, session = %session_id, "seat reserved");
        Ok(booking)
    }

    /// Delete the booking and return the seat in one transaction. Returns
    /// `false` (not an error) when there was nothing to cancel.
    pub fn release_seat(&self, user_id: Uuid, session_id: Uuid) -> Result<bool, StoreError> {
        let conn = self.conn.lock().unwrap();
        let tx = conn.unchecked_transaction().map_err(classify)?;

        let deleted = tx
            .execute(
                "DELETE FROM bookings WHERE user_id = ?1 AND session_id = ?2",
                params![user_id.to_string(), session_id.to_string()],
            )
            .map_err(classify)?;
        if deleted == 0 {
            return Ok(false);
        }

        tx.execute(
            "UPDATE sessions SET booked_count = booked_count - 1 \
             WHERE id = ?1 AND booked_count > 0",
            params![session_id.to_string()],
        )
        .map_err(classify)?;

        tx.commit().map_err(classify)?;
        debug!(user = %user_id, session = %session_id, "seat released");
        Ok(true)
    }

    // ========================================================================
    // Progression ledger rows
    // ========================================================================

    /// Apply a level transition exactly once. Returns `true` when this call
    /// applied it, `false` when a concurrent call already had. The level
    /// update and the history append commit together.
    pub fn apply_transition(
        &self,
        license_id: Uuid,
        from_level: &str,
        to_level: &str,
        evaluator_id: Uuid,
        evidence: &serde_json::Value,
        progress_after: &ProgressMetric,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let conn = self.conn.lock().unwrap();
        let tx = conn.unchecked_transaction().map_err(classify)?;

        let changed = tx
            .execute(
                "UPDATE licenses SET current_level = ?1, progress = ?2 \
                 WHERE id = ?3 AND current_level = ?4",
                params![
                    to_level,
                    progress_to_json(progress_after)?,
                    license_id.to_string(),
                    from_level,
                ],
            )
            .map_err(classify)?;

        if changed == 0 {
            let current: Option<String> = tx
                .query_row(
                    "SELECT current_level FROM licenses WHERE id = ?1",
                    params![license_id.to_string()],
                    |r| r.get(0),
                )
                .optional()
                .map_err(classify)?;
            return match current {
                // A concurrent call won the race to the same level: no-op
                Some(level) if level == to_level => Ok(false),
                Some(_) => Err(StoreError::WriteConflict),
                None => Err(StoreError::not_found("license", license_id)),
            };
        }

        tx.execute(
            r#"
            INSERT INTO progression_records (id, license_id, from_level, to_level, recorded_at, evaluator_id, evidence)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(license_id, to_level) DO NOTHING
            "#,
            params![
                Uuid::new_v4().to_string(),
                license_id.to_string(),
                from_level,
                to_level,
                now,
                evaluator_id.to_string(),
                evidence.to_string(),
            ],
        )
        .map_err(classify)?;

        tx.commit().map_err(classify)?;
        debug!(license = %license_id, from = from_level, to = to_level, "transition applied");
        Ok(true)
    }

    /// Transition history of a license, oldest first.
    pub fn progression_history(
        &self,
        license_id: Uuid,
    ) -> Result<Vec<ProgressionRecord>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, license_id, from_level, to_level, recorded_at, evaluator_id, evidence \
             FROM progression_records WHERE license_id = ?1 ORDER BY recorded_at ASC",
        )?;
        let rows = stmt.query_map(params![license_id.to_string()], map_record)?;
        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }

    /// Record a per-session XP award at most once per (license, session)
    /// and fold it into the license's progress. Returns `false` when the
    /// award was already recorded.
    pub fn record_session_xp(
        &self,
        license_id: Uuid,
        session_id: Uuid,
        xp: u32,
        makeup: bool,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let conn = self.conn.lock().unwrap();
        let tx = conn.unchecked_transaction().map_err(classify)?;

        let inserted = tx
            .execute(
                r#"
                INSERT INTO xp_awards (id, license_id, session_id, xp, makeup, awarded_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                ON CONFLICT(license_id, session_id) DO NOTHING
                "#,
                params![
                    Uuid::new_v4().to_string(),
                    license_id.to_string(),
                    session_id.to_string(),
                    xp,
                    makeup as i64,
                    now,
                ],
            )
            .map_err(classify)?;
        if inserted == 0 {
            return Ok(false);
        }

        let raw: Option<String> = tx
            .query_row(
                "SELECT progress FROM licenses WHERE id = ?1",
                params![license_id.to_string()],
                |r| r.get(0),
            )
            .optional()
            .map_err(classify)?;
        let raw = raw.ok_or_else(|| StoreError::not_found("license", license_id))?;
        let mut metric = progress_from_json(&raw)?;
        match &mut metric {
            ProgressMetric::Xp {
                base_xp, makeup_xp, ..
            } => {
                if makeup {
                    *makeup_xp = makeup_xp.saturating_add(xp);
                } else {
                    *base_xp = base_xp.saturating_add(xp);
                }
            }
            other => {
                return Err(StoreError::Corrupt(format!(
                    "license {license_id} does not accumulate XP (metric: {other:?})"
                )))
            }
        }
        tx.execute(
            "UPDATE licenses SET progress = ?1 WHERE id = ?2",
            params![progress_to_json(&metric)?, license_id.to_string()],
        )
        .map_err(classify)?;

        tx.commit().map_err(classify)?;
        Ok(true)
    }

    // ========================================================================
    // Assessment rows
    // ========================================================================

    /// Create-or-fetch the assessment for a subject key. Concurrent
    /// creations collapse onto one row via the unique key.
    pub fn create_assessment(
        &self,
        subject_id: Uuid,
        kind: &str,
        now: DateTime<Utc>,
    ) -> Result<AssessmentRecord, StoreError> {
        let conn = self.conn.lock().unwrap();
        let tx = conn.unchecked_transaction().map_err(classify)?;

        tx.execute(
            r#"
            INSERT INTO assessments (id, subject_id, kind, state, created_at, updated_at)
            VALUES (?1, ?2, ?3, 'unassessed', ?4, ?4)
            ON CONFLICT(subject_id, kind) DO NOTHING
            "#,
            params![
                Uuid::new_v4().to_string(),
                subject_id.to_string(),
                kind,
                now,
            ],
        )
        .map_err(classify)?;

        let record = select_assessment(&tx, subject_id, kind)?
            .ok_or_else(|| StoreError::not_found("assessment", subject_id))?;
        tx.commit().map_err(classify)?;
        Ok(record)
    }

    pub fn get_assessment(
        &self,
        subject_id: Uuid,
        kind: &str,
    ) -> Result<AssessmentRecord, StoreError> {
        let conn = self.conn.lock().unwrap();
        select_assessment(&conn, subject_id, kind)?
            .ok_or_else(|| StoreError::not_found("assessment", subject_id))
    }

    /// Take one edge of the assessment state machine under row-scoped
    /// exclusive access. Off-edge requests are refused with the row left
    /// untouched; a request whose target is already the current state is a
    /// no-op.
    pub fn transition_assessment(
        &self,
        subject_id: Uuid,
        kind: &str,
        target: AssessmentState,
        sources: &[AssessmentState],
        now: DateTime<Utc>,
    ) -> Result<AssessmentTransition, StoreError> {
        let conn = self.conn.lock().unwrap();
        let tx = conn.unchecked_transaction().map_err(classify)?;

        let record = select_assessment(&tx, subject_id, kind)?
            .ok_or_else(|| StoreError::not_found("assessment", subject_id))?;

        if record.state == target {
            return Ok(AssessmentTransition::Unchanged(record));
        }
        if !sources.contains(&record.state) {
            return Ok(AssessmentTransition::Refused {
                current: record.state,
            });
        }

        let changed = tx
            .execute(
                "UPDATE assessments SET state = ?1, updated_at = ?2 \
                 WHERE subject_id = ?3 AND kind = ?4 AND state = ?5",
                params![
                    target.as_str(),
                    now,
                    subject_id.to_string(),
                    kind,
                    record.state.as_str(),
                ],
            )
            .map_err(classify)?;
        if changed == 0 {
            return Err(StoreError::WriteConflict);
        }

        tx.commit().map_err(classify)?;
        let mut updated = record;
        updated.state = target;
        updated.updated_at = now;
        Ok(AssessmentTransition::Applied(updated))
    }
}

// ============================================================================
// Row mapping
// ============================================================================

fn uuid_col(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<Uuid> {
    let raw: String = row.get(idx)?;
    Uuid::parse_str(&raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn bad_enum(idx: usize, raw: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        idx,
        rusqlite::types::Type::Text,
        format!("unknown enum value '{raw}'").into(),
    )
}

fn map_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    let role_raw: String = row.get(3)?;
    Ok(User {
        id: uuid_col(row, 0)?,
        display_name: row.get(1)?,
        birth_date: row.get(2)?,
        role: UserRole::parse(&role_raw).ok_or_else(|| bad_enum(3, role_raw))?,
    })
}

fn map_license(row: &rusqlite::Row<'_>) -> rusqlite::Result<License> {
    let status_raw: String = row.get(4)?;
    let progress_raw: String = row.get(5)?;
    Ok(License {
        id: uuid_col(row, 0)?,
        user_id: uuid_col(row, 1)?,
        specialization_id: row.get(2)?,
        current_level: row.get(3)?,
        status: LicenseStatus::parse(&status_raw).ok_or_else(|| bad_enum(4, status_raw))?,
        progress: serde_json::from_str(&progress_raw).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
        })?,
        created_at: row.get(6)?,
    })
}

fn map_period(row: &rusqlite::Row<'_>) -> rusqlite::Result<EnrollmentPeriod> {
    Ok(EnrollmentPeriod {
        id: uuid_col(row, 0)?,
        license_id: uuid_col(row, 1)?,
        starts_on: row.get(2)?,
        ends_on: row.get(3)?,
        payment_verified: row.get::<_, i64>(4)? != 0,
        semester_index: row.get(5)?,
    })
}

fn map_session(row: &rusqlite::Row<'_>) -> rusqlite::Result<Session> {
    let mode_raw: String = row.get(7)?;
    Ok(Session {
        id: uuid_col(row, 0)?,
        specialization_id: row.get(1)?,
        starts_at: row.get(2)?,
        ends_at: row.get(3)?,
        capacity: row.get(4)?,
        booked_count: row.get(5)?,
        booking_deadline: row.get(6)?,
        delivery_mode: DeliveryMode::parse(&mode_raw).ok_or_else(|| bad_enum(7, mode_raw))?,
    })
}

fn map_booking(row: &rusqlite::Row<'_>) -> rusqlite::Result<Booking> {
    Ok(Booking {
        id: uuid_col(row, 0)?,
        user_id: uuid_col(row, 1)?,
        session_id: uuid_col(row, 2)?,
        created_at: row.get(3)?,
    })
}

fn map_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<ProgressionRecord> {
    let evidence_raw: String = row.get(6)?;
    Ok(ProgressionRecord {
        id: uuid_col(row, 0)?,
        license_id: uuid_col(row, 1)?,
        from_level: row.get(2)?,
        to_level: row.get(3)?,
        recorded_at: row.get(4)?,
        evaluator_id: uuid_col(row, 5)?,
        evidence: serde_json::from_str(&evidence_raw).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(6, rusqlite::types::Type::Text, Box::new(e))
        })?,
    })
}

fn map_assessment(row: &rusqlite::Row<'_>) -> rusqlite::Result<AssessmentRecord> {
    let state_raw: String = row.get(3)?;
    Ok(AssessmentRecord {
        id: uuid_col(row, 0)?,
        subject_id: uuid_col(row, 1)?,
        kind: row.get(2)?,
        state: AssessmentState::parse(&state_raw).ok_or_else(|| bad_enum(3, state_raw))?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

fn select_assessment(
    conn: &Connection,
    subject_id: Uuid,
    kind: &str,
) -> Result<Option<AssessmentRecord>, StoreError> {
    Ok(conn
        .query_row(
            "SELECT id, subject_id, kind, state, created_at, updated_at FROM assessments \
             WHERE subject_id = ?1 AND kind = ?2",
            params![subject_id.to_string(), kind],
            map_assessment,
        )
        .optional()?)
}

fn progress_to_json(progress: &ProgressMetric) -> Result<String, StoreError> {
    serde_json::to_string(progress)
        .map_err(|e| StoreError::Corrupt(format!("unserializable progress metric: {e}")))
}

fn progress_from_json(raw: &str) -> Result<ProgressMetric, StoreError> {
    serde_json::from_str(raw)
        .map_err(|e| StoreError::Corrupt(format!("unreadable progress metric: {e}")))
}
