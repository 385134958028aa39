/*!
 * Repository layer for database operations.
 *
 * This module provides a high-level API over the document collections:
 * patients, general exercises with their VNEST/SR detail records, and
 * per-patient assignments. It abstracts away the SQL details and provides
 * type-safe access.
 */

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use log::debug;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::de::DeserializeOwned;
use std::str::FromStr;

use super::connection::DatabaseConnection;
use super::models::{
    AssignmentRecord, AssignmentStatus, ExerciseRecord, PatientRecord, SrExerciseRecord,
    TherapyType, VnestExerciseRecord,
};

const EXERCISE_COLUMNS: &str = "id, therapy, reviewed, visibility, created_by, personalized, \
     base_reference, patient_id, adapted_description, created_at";

const VNEST_COLUMNS: &str = "id, level, context, verb, pairs, sentences";

const SR_COLUMNS: &str = "id, question, correct_answer, interval_index, intervals_sec, \
     success_streak, lapses, next_due, status, context";

const ASSIGNMENT_COLUMNS: &str = "patient_id, exercise_id, context, therapy, status, priority, \
     last_performed, times_performed, assigned_at, personalized";

/// Parse a text column through `FromStr`, reporting failures as conversion errors
fn parse_text<T>(row: &Row, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr<Err = anyhow::Error>,
{
    let raw: String = row.get(idx)?;
    raw.parse::<T>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, e.into()))
}

/// Parse a JSON text column
fn parse_json<T: DeserializeOwned>(row: &Row, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn exercise_from_row(row: &Row) -> rusqlite::Result<ExerciseRecord> {
    Ok(ExerciseRecord {
        id: row.get(0)?,
        therapy: parse_text(row, 1)?,
        reviewed: row.get(2)?,
        visibility: parse_text(row, 3)?,
        created_by: row.get(4)?,
        personalized: row.get(5)?,
        base_reference: row.get(6)?,
        patient_id: row.get(7)?,
        adapted_description: row.get(8)?,
        created_at: row.get(9)?,
    })
}

fn vnest_from_row(row: &Row) -> rusqlite::Result<VnestExerciseRecord> {
    Ok(VnestExerciseRecord {
        id: row.get(0)?,
        level: parse_text(row, 1)?,
        context: row.get(2)?,
        verb: row.get(3)?,
        pairs: parse_json(row, 4)?,
        sentences: parse_json(row, 5)?,
    })
}

fn sr_from_row(row: &Row) -> rusqlite::Result<SrExerciseRecord> {
    Ok(SrExerciseRecord {
        id: row.get(0)?,
        question: row.get(1)?,
        correct_answer: row.get(2)?,
        interval_index: row.get::<_, i64>(3)?.max(0) as usize,
        intervals_sec: parse_json(row, 4)?,
        success_streak: row.get(5)?,
        lapses: row.get(6)?,
        next_due: row.get(7)?,
        status: parse_text(row, 8)?,
        context: row.get(9)?,
    })
}

fn assignment_from_row(row: &Row) -> rusqlite::Result<AssignmentRecord> {
    Ok(AssignmentRecord {
        patient_id: row.get(0)?,
        exercise_id: row.get(1)?,
        context: row.get(2)?,
        therapy: parse_text(row, 3)?,
        status: parse_text(row, 4)?,
        priority: row.get(5)?,
        last_performed: row.get(6)?,
        times_performed: row.get(7)?,
        assigned_at: row.get(8)?,
        personalized: row.get(9)?,
    })
}

/// Repository for database operations
#[derive(Clone)]
pub struct Repository {
    /// Database connection
    db: DatabaseConnection,
}

impl Repository {
    /// Create a new repository with the given database connection
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Create a repository with the default database location
    pub fn new_default() -> Result<Self> {
        let db = DatabaseConnection::new_default()?;
        Ok(Self::new(db))
    }

    /// Create a repository with an in-memory database (for testing)
    pub fn new_in_memory() -> Result<Self> {
        let db = DatabaseConnection::new_in_memory()?;
        Ok(Self::new(db))
    }

    /// Access the underlying connection
    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    // =========================================================================
    // Patient Operations
    // =========================================================================

    /// Insert or replace a patient record
    pub async fn upsert_patient(&self, patient: &PatientRecord) -> Result<()> {
        let patient = patient.clone();

        self.db
            .execute_async(move |conn| {
                conn.execute(
                    r#"
                    INSERT INTO patients (id, profile, created_at, updated_at)
                    VALUES (?1, ?2, ?3, ?4)
                    ON CONFLICT(id) DO UPDATE SET profile = excluded.profile,
                                                  updated_at = excluded.updated_at
                    "#,
                    params![
                        patient.id,
                        serde_json::to_string(&patient.profile)?,
                        patient.created_at,
                        patient.updated_at,
                    ],
                )?;
                Ok(())
            })
            .await
    }

    /// Get a patient by ID
    pub async fn get_patient(&self, patient_id: &str) -> Result<Option<PatientRecord>> {
        let patient_id = patient_id.to_string();

        self.db
            .execute_async(move |conn| {
                let result = conn
                    .query_row(
                        "SELECT id, profile, created_at, updated_at FROM patients WHERE id = ?1",
                        [&patient_id],
                        |row| {
                            Ok(PatientRecord {
                                id: row.get(0)?,
                                profile: parse_json(row, 1)?,
                                created_at: row.get(2)?,
                                updated_at: row.get(3)?,
                            })
                        },
                    )
                    .optional()?;
                Ok(result)
            })
            .await
    }

    // =========================================================================
    // Exercise Operations
    // =========================================================================

    /// Create a VNEST exercise: general record and detail record in one transaction
    pub async fn create_vnest_exercise(
        &self,
        general: &ExerciseRecord,
        detail: &VnestExerciseRecord,
    ) -> Result<()> {
        Self::check_pair(general, &detail.id, TherapyType::Vnest)?;
        let general = general.clone();
        let detail = detail.clone();

        self.db
            .transaction_async(move |tx| Self::insert_vnest_sync(tx, &general, &detail))
            .await
    }

    /// Create a VNEST exercise and its pending assignment in one transaction
    ///
    /// The assignment takes the detail's context; nothing is written when any step fails.
    pub async fn create_assigned_vnest_exercise(
        &self,
        general: &ExerciseRecord,
        detail: &VnestExerciseRecord,
        patient_id: &str,
    ) -> Result<AssignmentRecord> {
        Self::check_pair(general, &detail.id, TherapyType::Vnest)?;
        let general = general.clone();
        let detail = detail.clone();
        let patient_id = patient_id.to_string();

        self.db
            .transaction_async(move |tx| {
                Self::insert_vnest_sync(tx, &general, &detail)?;
                Self::insert_pending_sync(tx, &patient_id, &general, Some(detail.context.clone()))
            })
            .await
    }

    fn insert_vnest_sync(conn: &Connection, general: &ExerciseRecord, detail: &VnestExerciseRecord) -> Result<()> {
        Self::insert_exercise_sync(conn, general)?;
        conn.execute(
            &format!("INSERT INTO vnest_exercises ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6)", VNEST_COLUMNS),
            params![
                detail.id,
                detail.level.to_string(),
                detail.context,
                detail.verb,
                serde_json::to_string(&detail.pairs)?,
                serde_json::to_string(&detail.sentences)?,
            ],
        )?;
        debug!("Created VNEST exercise {} ({} / {})", detail.id, detail.context, detail.verb);
        Ok(())
    }

    /// Create an SR exercise: general record and detail record in one transaction
    pub async fn create_sr_exercise(
        &self,
        general: &ExerciseRecord,
        detail: &SrExerciseRecord,
    ) -> Result<()> {
        Self::check_pair(general, &detail.id, TherapyType::Sr)?;
        let general = general.clone();
        let detail = detail.clone();

        self.db
            .transaction_async(move |tx| Self::insert_sr_sync(tx, &general, &detail))
            .await
    }

    /// Create an SR exercise and its pending assignment in one transaction
    ///
    /// The assignment carries the card's context, if it has one.
    pub async fn create_assigned_sr_exercise(
        &self,
        general: &ExerciseRecord,
        detail: &SrExerciseRecord,
        patient_id: &str,
    ) -> Result<AssignmentRecord> {
        Self::check_pair(general, &detail.id, TherapyType::Sr)?;
        let general = general.clone();
        let detail = detail.clone();
        let patient_id = patient_id.to_string();

        self.db
            .transaction_async(move |tx| {
                Self::insert_sr_sync(tx, &general, &detail)?;
                let context = detail.context.clone().filter(|c| !c.trim().is_empty());
                Self::insert_pending_sync(tx, &patient_id, &general, context)
            })
            .await
    }

    fn insert_sr_sync(conn: &Connection, general: &ExerciseRecord, detail: &SrExerciseRecord) -> Result<()> {
        Self::insert_exercise_sync(conn, general)?;
        conn.execute(
            &format!(
                "INSERT INTO sr_exercises ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                SR_COLUMNS
            ),
            params![
                detail.id,
                detail.question,
                detail.correct_answer,
                detail.interval_index as i64,
                serde_json::to_string(&detail.intervals_sec)?,
                detail.success_streak,
                detail.lapses,
                detail.next_due,
                detail.status.to_string(),
                detail.context,
            ],
        )?;
        debug!("Created SR exercise {}", detail.id);
        Ok(())
    }

    fn check_pair(general: &ExerciseRecord, detail_id: &str, therapy: TherapyType) -> Result<()> {
        general.validate()?;
        if general.id != detail_id {
            return Err(anyhow!(
                "General record {} and detail record {} must share the same id",
                general.id,
                detail_id
            ));
        }
        if general.therapy != therapy {
            return Err(anyhow!(
                "Exercise {} is {} but a {} detail was supplied",
                general.id,
                general.therapy,
                therapy
            ));
        }
        Ok(())
    }

    fn insert_exercise_sync(conn: &Connection, general: &ExerciseRecord) -> Result<()> {
        conn.execute(
            &format!(
                "INSERT INTO exercises ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                EXERCISE_COLUMNS
            ),
            params![
                general.id,
                general.therapy.to_string(),
                general.reviewed,
                general.visibility.to_string(),
                general.created_by,
                general.personalized,
                general.base_reference,
                general.patient_id,
                general.adapted_description,
                general.created_at,
            ],
        )?;
        Ok(())
    }

    /// Get a general exercise record by ID
    pub async fn get_exercise(&self, exercise_id: &str) -> Result<Option<ExerciseRecord>> {
        let exercise_id = exercise_id.to_string();

        self.db
            .execute_async(move |conn| {
                let result = conn
                    .query_row(
                        &format!("SELECT {} FROM exercises WHERE id = ?1", EXERCISE_COLUMNS),
                        [&exercise_id],
                        exercise_from_row,
                    )
                    .optional()?;
                Ok(result)
            })
            .await
    }

    /// Get a VNEST detail record by ID
    pub async fn get_vnest_exercise(&self, exercise_id: &str) -> Result<Option<VnestExerciseRecord>> {
        let exercise_id = exercise_id.to_string();

        self.db
            .execute_async(move |conn| {
                let result = conn
                    .query_row(
                        &format!("SELECT {} FROM vnest_exercises WHERE id = ?1", VNEST_COLUMNS),
                        [&exercise_id],
                        vnest_from_row,
                    )
                    .optional()?;
                Ok(result)
            })
            .await
    }

    /// Get an SR detail record by ID
    pub async fn get_sr_exercise(&self, exercise_id: &str) -> Result<Option<SrExerciseRecord>> {
        let exercise_id = exercise_id.to_string();

        self.db
            .execute_async(move |conn| {
                let result = conn
                    .query_row(
                        &format!("SELECT {} FROM sr_exercises WHERE id = ?1", SR_COLUMNS),
                        [&exercise_id],
                        sr_from_row,
                    )
                    .optional()?;
                Ok(result)
            })
            .await
    }

    /// List the VNEST catalog for a context
    pub async fn list_vnest_by_context(&self, context: &str) -> Result<Vec<VnestExerciseRecord>> {
        let context = context.to_string();

        self.db
            .execute_async(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM vnest_exercises WHERE context = ?1 ORDER BY id",
                    VNEST_COLUMNS
                ))?;
                let records = stmt
                    .query_map([&context], vnest_from_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(records)
            })
            .await
    }

    /// Flip the reviewed flag; returns false when the exercise does not exist
    pub async fn set_exercise_reviewed(&self, exercise_id: &str, reviewed: bool) -> Result<bool> {
        let exercise_id = exercise_id.to_string();

        self.db
            .execute_async(move |conn| {
                let updated = conn.execute(
                    "UPDATE exercises SET reviewed = ?1 WHERE id = ?2",
                    params![reviewed, exercise_id],
                )?;
                Ok(updated > 0)
            })
            .await
    }

    /// Persist the schedule fields of an SR card
    pub async fn update_sr_progress(&self, card: &SrExerciseRecord) -> Result<bool> {
        let card = card.clone();

        self.db
            .execute_async(move |conn| {
                let updated = conn.execute(
                    r#"
                    UPDATE sr_exercises
                    SET interval_index = ?1, success_streak = ?2, lapses = ?3,
                        next_due = ?4, status = ?5
                    WHERE id = ?6
                    "#,
                    params![
                        card.interval_index as i64,
                        card.success_streak,
                        card.lapses,
                        card.next_due,
                        card.status.to_string(),
                        card.id,
                    ],
                )?;
                Ok(updated > 0)
            })
            .await
    }

    // =========================================================================
    // Assignment Operations
    // =========================================================================

    /// Insert or replace an assignment record as given
    pub async fn upsert_assignment(&self, assignment: &AssignmentRecord) -> Result<()> {
        let assignment = assignment.clone();

        self.db
            .execute_async(move |conn| Self::upsert_assignment_sync(conn, &assignment))
            .await
    }

    fn upsert_assignment_sync(conn: &Connection, a: &AssignmentRecord) -> Result<()> {
        conn.execute(
            &format!(
                r#"
                INSERT INTO assignments ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                ON CONFLICT(patient_id, exercise_id) DO UPDATE SET
                    context = excluded.context,
                    therapy = excluded.therapy,
                    status = excluded.status,
                    priority = excluded.priority,
                    last_performed = excluded.last_performed,
                    times_performed = excluded.times_performed,
                    assigned_at = excluded.assigned_at,
                    personalized = excluded.personalized
                "#,
                ASSIGNMENT_COLUMNS
            ),
            params![
                a.patient_id,
                a.exercise_id,
                a.context,
                a.therapy.to_string(),
                a.status.to_string(),
                a.priority,
                a.last_performed,
                a.times_performed,
                a.assigned_at,
                a.personalized,
            ],
        )?;
        Ok(())
    }

    fn max_priority_sync(conn: &Connection, patient_id: &str) -> Result<Option<i64>> {
        let max: Option<i64> = conn.query_row(
            "SELECT MAX(priority) FROM assignments WHERE patient_id = ?1",
            [patient_id],
            |row| row.get(0),
        )?;
        Ok(max)
    }

    /// Highest priority currently assigned to a patient
    pub async fn max_priority(&self, patient_id: &str) -> Result<Option<i64>> {
        let patient_id = patient_id.to_string();

        self.db
            .execute_async(move |conn| Self::max_priority_sync(conn, &patient_id))
            .await
    }

    /// Write a pending assignment whose priority is the patient's max + 1 (or 1)
    ///
    /// The priority read and the write happen in the same transaction.
    pub async fn create_pending_assignment(
        &self,
        patient_id: &str,
        exercise: &ExerciseRecord,
        context: Option<String>,
    ) -> Result<AssignmentRecord> {
        let patient_id = patient_id.to_string();
        let exercise = exercise.clone();

        self.db
            .transaction_async(move |tx| Self::insert_pending_sync(tx, &patient_id, &exercise, context))
            .await
    }

    fn insert_pending_sync(
        conn: &Connection,
        patient_id: &str,
        exercise: &ExerciseRecord,
        context: Option<String>,
    ) -> Result<AssignmentRecord> {
        let priority = Self::max_priority_sync(conn, patient_id)?.map_or(1, |max| max + 1);
        let assignment = AssignmentRecord::pending(patient_id, exercise, context, priority);
        Self::upsert_assignment_sync(conn, &assignment)?;
        debug!(
            "Assigned {} to {} with priority {}",
            assignment.exercise_id, assignment.patient_id, assignment.priority
        );
        Ok(assignment)
    }

    /// Get a single assignment
    pub async fn get_assignment(
        &self,
        patient_id: &str,
        exercise_id: &str,
    ) -> Result<Option<AssignmentRecord>> {
        let patient_id = patient_id.to_string();
        let exercise_id = exercise_id.to_string();

        self.db
            .execute_async(move |conn| {
                let result = conn
                    .query_row(
                        &format!(
                            "SELECT {} FROM assignments WHERE patient_id = ?1 AND exercise_id = ?2",
                            ASSIGNMENT_COLUMNS
                        ),
                        [&patient_id, &exercise_id],
                        assignment_from_row,
                    )
                    .optional()?;
                Ok(result)
            })
            .await
    }

    /// List every assignment of a patient, ordered by priority
    pub async fn list_assignments(&self, patient_id: &str) -> Result<Vec<AssignmentRecord>> {
        let patient_id = patient_id.to_string();

        self.db
            .execute_async(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM assignments WHERE patient_id = ?1 ORDER BY priority",
                    ASSIGNMENT_COLUMNS
                ))?;
                let records = stmt
                    .query_map([&patient_id], assignment_from_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(records)
            })
            .await
    }

    /// List a patient's assignments whose context snapshot matches
    pub async fn list_assignments_by_context(
        &self,
        patient_id: &str,
        context: &str,
    ) -> Result<Vec<AssignmentRecord>> {
        let patient_id = patient_id.to_string();
        let context = context.to_string();

        self.db
            .execute_async(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM assignments WHERE patient_id = ?1 AND context = ?2 ORDER BY priority",
                    ASSIGNMENT_COLUMNS
                ))?;
                let records = stmt
                    .query_map([&patient_id, &context], assignment_from_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(records)
            })
            .await
    }

    /// Mark an assignment as performed at the given time
    ///
    /// Returns the updated record, or `None` when the patient has no such assignment.
    pub async fn record_completion(
        &self,
        patient_id: &str,
        exercise_id: &str,
        performed_at: DateTime<Utc>,
    ) -> Result<Option<AssignmentRecord>> {
        let patient_id = patient_id.to_string();
        let exercise_id = exercise_id.to_string();

        self.db
            .transaction_async(move |tx| {
                let updated = tx.execute(
                    r#"
                    UPDATE assignments
                    SET status = ?1, times_performed = times_performed + 1, last_performed = ?2
                    WHERE patient_id = ?3 AND exercise_id = ?4
                    "#,
                    params![
                        AssignmentStatus::Completed.to_string(),
                        performed_at,
                        patient_id,
                        exercise_id
                    ],
                )?;

                if updated == 0 {
                    return Ok(None);
                }

                let record = tx.query_row(
                    &format!(
                        "SELECT {} FROM assignments WHERE patient_id = ?1 AND exercise_id = ?2",
                        ASSIGNMENT_COLUMNS
                    ),
                    [&patient_id, &exercise_id],
                    assignment_from_row,
                )?;
                Ok(Some(record))
            })
            .await
    }
}
