/*!
 * Assignment writer.
 *
 * Resolves an exercise's therapy type and linguistic context, then writes a
 * pending assignment with the next priority for the patient. Completions and
 * SR reviews are recorded here as well.
 */

use chrono::{DateTime, Utc};
use log::{info, warn};

use crate::database::models::{AssignmentRecord, ExerciseRecord, SrExerciseRecord, TherapyType};
use crate::database::Repository;
use crate::errors::AssignmentError;
use crate::exercises::review::apply_review;

/// Writes patient assignments through the repository
#[derive(Clone)]
pub struct AssignmentWriter {
    repo: Repository,
}

impl AssignmentWriter {
    /// Create a writer over a repository
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }

    /// Assign an exercise to a patient
    ///
    /// The exercise must exist and its detail record must carry a context.
    pub async fn assign(&self, patient_id: &str, exercise_id: &str) -> Result<AssignmentRecord, AssignmentError> {
        let result: Result<AssignmentRecord, AssignmentError> = async {
            let general = self.load_general(exercise_id).await?;
            let context = self.resolve_context(&general).await?.ok_or_else(|| AssignmentError::MissingContext {
                exercise_id: exercise_id.to_string(),
                therapy: general.therapy,
            })?;

            self.write(patient_id, &general, Some(context)).await
        }
        .await;

        result.inspect_err(|e| warn!("Error al asignar ejercicio {} a {}: {}", exercise_id, patient_id, e))
    }

    /// Assign an exercise that may have no linguistic context
    ///
    /// Generated SR cards are assigned this way. The context snapshot is taken
    /// from the detail record when one is present.
    pub async fn assign_without_context(
        &self,
        patient_id: &str,
        exercise_id: &str,
    ) -> Result<AssignmentRecord, AssignmentError> {
        let result: Result<AssignmentRecord, AssignmentError> = async {
            let general = self.load_general(exercise_id).await?;
            let context = self.resolve_context(&general).await?;
            self.write(patient_id, &general, context).await
        }
        .await;

        result.inspect_err(|e| warn!("Error al asignar ejercicio {} a {}: {}", exercise_id, patient_id, e))
    }

    /// Record that the patient performed an assigned exercise
    pub async fn record_completion(
        &self,
        patient_id: &str,
        exercise_id: &str,
        performed_at: DateTime<Utc>,
    ) -> Result<AssignmentRecord, AssignmentError> {
        self.repo
            .record_completion(patient_id, exercise_id, performed_at)
            .await?
            .ok_or_else(|| AssignmentError::AssignmentNotFound {
                patient_id: patient_id.to_string(),
                exercise_id: exercise_id.to_string(),
            })
    }

    /// Record one SR recall attempt and persist the new schedule
    pub async fn record_sr_review(
        &self,
        exercise_id: &str,
        success: bool,
        now: DateTime<Utc>,
    ) -> Result<SrExerciseRecord, AssignmentError> {
        let mut card = self
            .repo
            .get_sr_exercise(exercise_id)
            .await?
            .ok_or_else(|| AssignmentError::ExerciseNotFound(exercise_id.to_string()))?;

        apply_review(&mut card, success, now.timestamp());
        self.repo.update_sr_progress(&card).await?;

        info!(
            "SR review for {}: success={}, interval {} / {}, status {}",
            card.id,
            success,
            card.interval_index,
            card.intervals_sec.len(),
            card.status
        );
        Ok(card)
    }

    async fn load_general(&self, exercise_id: &str) -> Result<ExerciseRecord, AssignmentError> {
        self.repo
            .get_exercise(exercise_id)
            .await?
            .ok_or_else(|| AssignmentError::ExerciseNotFound(exercise_id.to_string()))
    }

    async fn resolve_context(&self, general: &ExerciseRecord) -> Result<Option<String>, AssignmentError> {
        let context = match general.therapy {
            TherapyType::Vnest => self.repo.get_vnest_exercise(&general.id).await?.map(|d| d.context),
            TherapyType::Sr => self.repo.get_sr_exercise(&general.id).await?.and_then(|d| d.context),
        };

        Ok(context.filter(|c| !c.trim().is_empty()))
    }

    async fn write(
        &self,
        patient_id: &str,
        general: &ExerciseRecord,
        context: Option<String>,
    ) -> Result<AssignmentRecord, AssignmentError> {
        let record = self.repo.create_pending_assignment(patient_id, general, context).await?;
        info!(
            "Ejercicio {} asignado a {} con prioridad {}",
            record.exercise_id, record.patient_id, record.priority
        );
        Ok(record)
    }
}
