/*!
 * Exercise selection for a patient, context and verb.
 *
 * The selector walks four stages in order and stops at the first that yields
 * an exercise:
 * 1. pending assignments, personalized first, then by ascending priority
 * 2. a random unassigned public catalog entry, which gets assigned
 * 3. the completed assignment performed longest ago
 * 4. an explicit "no exercises available" result
 *
 * Failures never escape as `Err`; they are folded into the outcome.
 */

use anyhow::Result;
use log::{debug, error, info};
use rand::seq::IndexedRandom;
use rand::Rng;
use serde::Serialize;
use std::collections::HashSet;

use crate::database::models::{AssignmentRecord, Visibility, VnestExerciseRecord};
use crate::database::Repository;
use crate::exercises::assignment::AssignmentWriter;

/// Which stage produced the selected exercise
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionOrigin {
    /// An assignment that was still pending
    Pending,
    /// A catalog entry assigned during this selection
    NewlyAssigned,
    /// The completed assignment performed longest ago
    OldestCompleted,
}

/// Result of a selection
///
/// Serializes to the exercise document plus `highlight`, or to `{"error": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SelectionOutcome {
    /// An exercise to present
    Selected {
        #[serde(flatten)]
        exercise: VnestExerciseRecord,
        /// Set for personalized exercises
        highlight: bool,
        #[serde(skip)]
        origin: SelectionOrigin,
    },
    /// Nothing matched at any stage
    Unavailable { error: String },
    /// The store or the assignment writer failed
    Failed { error: String },
}

impl SelectionOutcome {
    /// The selected exercise, if any
    pub fn exercise(&self) -> Option<&VnestExerciseRecord> {
        match self {
            SelectionOutcome::Selected { exercise, .. } => Some(exercise),
            _ => None,
        }
    }

    /// Highlight flag of the selected exercise
    pub fn highlight(&self) -> bool {
        matches!(self, SelectionOutcome::Selected { highlight: true, .. })
    }

    /// Stage that produced the exercise
    pub fn origin(&self) -> Option<SelectionOrigin> {
        match self {
            SelectionOutcome::Selected { origin, .. } => Some(*origin),
            _ => None,
        }
    }

    /// Error message carried by an unavailable or failed outcome
    pub fn error_message(&self) -> Option<&str> {
        match self {
            SelectionOutcome::Unavailable { error } | SelectionOutcome::Failed { error } => Some(error),
            SelectionOutcome::Selected { .. } => None,
        }
    }

    fn selected(exercise: VnestExerciseRecord, highlight: bool, origin: SelectionOrigin) -> Self {
        SelectionOutcome::Selected {
            exercise,
            highlight,
            origin,
        }
    }
}

/// An assignment joined with its VNEST detail
struct MatchedAssignment {
    assignment: AssignmentRecord,
    detail: VnestExerciseRecord,
    personalized: bool,
}

/// Picks the next VNEST exercise for a patient
#[derive(Clone)]
pub struct ExerciseSelector {
    repo: Repository,
    writer: AssignmentWriter,
}

impl ExerciseSelector {
    /// Create a selector over a repository
    pub fn new(repo: Repository) -> Self {
        let writer = AssignmentWriter::new(repo.clone());
        Self { repo, writer }
    }

    /// Select an exercise for the patient in the given context and verb
    pub async fn select<R: Rng + ?Sized>(
        &self,
        patient_id: &str,
        context: &str,
        verb: &str,
        rng: &mut R,
    ) -> SelectionOutcome {
        match self.try_select(patient_id, context, verb, rng).await {
            Ok(outcome) => outcome,
            Err(e) => {
                let error = format!("{:#}", e);
                error!("Exercise selection failed for {} ({} / {}): {}", patient_id, context, verb, error);
                SelectionOutcome::Failed { error }
            }
        }
    }

    async fn try_select<R: Rng + ?Sized>(
        &self,
        patient_id: &str,
        context: &str,
        verb: &str,
        rng: &mut R,
    ) -> Result<SelectionOutcome> {
        let matched = self.matched_assignments(patient_id, context, verb).await?;
        let (pending, completed): (Vec<_>, Vec<_>) = matched.into_iter().partition(|m| m.assignment.is_pending());
        debug!(
            "{} pending / {} completed assignments for {} ({} / {})",
            pending.len(),
            completed.len(),
            patient_id,
            context,
            verb
        );

        if let Some(chosen) = pending
            .into_iter()
            .min_by_key(|m| (!m.personalized, m.assignment.priority))
        {
            return Ok(SelectionOutcome::selected(
                chosen.detail,
                chosen.personalized,
                SelectionOrigin::Pending,
            ));
        }

        let available = self.unassigned_public(patient_id, context, verb).await?;
        if let Some((detail, personalized)) = available.choose(rng).cloned() {
            self.writer.assign(patient_id, &detail.id).await?;
            info!("Assigned new exercise {} to {}", detail.id, patient_id);
            return Ok(SelectionOutcome::selected(
                detail,
                personalized,
                SelectionOrigin::NewlyAssigned,
            ));
        }

        if let Some(oldest) = completed
            .into_iter()
            .filter(|m| m.assignment.last_performed.is_some())
            .min_by_key(|m| m.assignment.last_performed)
        {
            return Ok(SelectionOutcome::selected(
                oldest.detail,
                oldest.personalized,
                SelectionOrigin::OldestCompleted,
            ));
        }

        Ok(SelectionOutcome::Unavailable {
            error: format!(
                "No hay ejercicios disponibles para el verbo '{}' en el contexto '{}'.",
                verb, context
            ),
        })
    }

    /// Assignments in the context whose VNEST detail has the verb
    async fn matched_assignments(
        &self,
        patient_id: &str,
        context: &str,
        verb: &str,
    ) -> Result<Vec<MatchedAssignment>> {
        let mut matched = Vec::new();

        for assignment in self.repo.list_assignments_by_context(patient_id, context).await? {
            let Some(detail) = self.repo.get_vnest_exercise(&assignment.exercise_id).await? else {
                continue;
            };
            if detail.verb != verb {
                continue;
            }

            let personalized = self
                .repo
                .get_exercise(&detail.id)
                .await?
                .is_some_and(|general| general.personalized);

            matched.push(MatchedAssignment {
                assignment,
                detail,
                personalized,
            });
        }

        Ok(matched)
    }

    /// Catalog entries for context and verb that are not private and not yet assigned
    async fn unassigned_public(
        &self,
        patient_id: &str,
        context: &str,
        verb: &str,
    ) -> Result<Vec<(VnestExerciseRecord, bool)>> {
        let assigned: HashSet<String> = self
            .repo
            .list_assignments(patient_id)
            .await?
            .into_iter()
            .map(|a| a.exercise_id)
            .collect();

        let mut available = Vec::new();
        for detail in self.repo.list_vnest_by_context(context).await? {
            if detail.verb != verb || assigned.contains(&detail.id) {
                continue;
            }

            let (visibility, personalized) = match self.repo.get_exercise(&detail.id).await? {
                Some(general) => (general.visibility, general.personalized),
                None => (Visibility::Public, false),
            };

            if visibility != Visibility::Private {
                available.push((detail, personalized));
            }
        }

        Ok(available)
    }
}
