/*!
 * Database entity models and DTOs.
 *
 * These structures map directly to the document collections (patients,
 * general exercises, VNEST and SR details, per-patient assignments) and
 * provide type-safe access to persisted data.
 */

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default spaced-retrieval schedule in seconds
pub const DEFAULT_SR_INTERVALS: [u64; 5] = [15, 30, 60, 120, 300];

/// Number of expanded sentences a VNEST exercise carries
pub const VNEST_SENTENCE_COUNT: usize = 10;

/// Therapy type of an exercise
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TherapyType {
    /// Verb Network Strengthening Treatment
    #[serde(rename = "VNEST")]
    Vnest,
    /// Spaced Retrieval
    #[serde(rename = "SR")]
    Sr,
}

impl fmt::Display for TherapyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TherapyType::Vnest => write!(f, "VNEST"),
            TherapyType::Sr => write!(f, "SR"),
        }
    }
}

impl std::str::FromStr for TherapyType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "VNEST" => Ok(TherapyType::Vnest),
            "SR" => Ok(TherapyType::Sr),
            _ => Err(anyhow!("Invalid therapy type: {}", s)),
        }
    }
}

/// Visibility of a general exercise
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Visibility {
    /// Available to every patient
    #[serde(rename = "publico")]
    Public,
    /// Restricted to its creator or owning patient
    #[default]
    #[serde(rename = "privado")]
    Private,
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Visibility::Public => write!(f, "publico"),
            Visibility::Private => write!(f, "privado"),
        }
    }
}

impl std::str::FromStr for Visibility {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "publico" | "public" => Ok(Visibility::Public),
            "privado" | "private" => Ok(Visibility::Private),
            _ => Err(anyhow!("Invalid visibility: {}", s)),
        }
    }
}

/// Status of a patient assignment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssignmentStatus {
    /// Assigned and not yet performed
    #[serde(rename = "pendiente")]
    Pending,
    /// Performed at least once
    #[serde(rename = "completado")]
    Completed,
}

impl fmt::Display for AssignmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssignmentStatus::Pending => write!(f, "pendiente"),
            AssignmentStatus::Completed => write!(f, "completado"),
        }
    }
}

impl std::str::FromStr for AssignmentStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pendiente" | "pending" => Ok(AssignmentStatus::Pending),
            "completado" | "completed" => Ok(AssignmentStatus::Completed),
            _ => Err(anyhow!("Invalid assignment status: {}", s)),
        }
    }
}

/// Learning status of a spaced-retrieval card
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SrStatus {
    /// Card is still moving through its interval schedule
    #[default]
    Learning,
    /// Card was recalled at the final interval
    Mastered,
}

impl fmt::Display for SrStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SrStatus::Learning => write!(f, "learning"),
            SrStatus::Mastered => write!(f, "mastered"),
        }
    }
}

impl std::str::FromStr for SrStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "learning" => Ok(SrStatus::Learning),
            "mastered" => Ok(SrStatus::Mastered),
            _ => Err(anyhow!("Invalid SR status: {}", s)),
        }
    }
}

/// Difficulty level of a VNEST exercise
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Difficulty {
    #[default]
    #[serde(rename = "facil")]
    Easy,
    #[serde(rename = "medio")]
    Medium,
    #[serde(rename = "dificil")]
    Hard,
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Difficulty::Easy => write!(f, "facil"),
            Difficulty::Medium => write!(f, "medio"),
            Difficulty::Hard => write!(f, "dificil"),
        }
    }
}

impl std::str::FromStr for Difficulty {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "facil" | "fácil" | "easy" => Ok(Difficulty::Easy),
            "medio" | "medium" => Ok(Difficulty::Medium),
            "dificil" | "difícil" | "hard" => Ok(Difficulty::Hard),
            _ => Err(anyhow!("Invalid difficulty level: {}", s)),
        }
    }
}

/// General exercise record shared by every therapy type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExerciseRecord {
    /// Exercise identifier, shared with the detail record
    pub id: String,
    /// Therapy type
    #[serde(rename = "terapia")]
    pub therapy: TherapyType,
    /// Whether a therapist reviewed the content
    #[serde(rename = "revisado")]
    pub reviewed: bool,
    /// Visibility of the exercise
    #[serde(rename = "tipo")]
    pub visibility: Visibility,
    /// Creator (therapist identifier or "IA")
    #[serde(rename = "creado_por")]
    pub created_by: String,
    /// Whether this exercise was personalized for a patient
    #[serde(rename = "personalizado")]
    pub personalized: bool,
    /// Base exercise this one was derived from
    #[serde(rename = "referencia_base")]
    pub base_reference: Option<String>,
    /// Owning patient for private, patient-specific content
    #[serde(rename = "id_paciente")]
    pub patient_id: Option<String>,
    /// Free-text description of the adaptation
    #[serde(rename = "descripcion_adaptado", default)]
    pub adapted_description: String,
    /// Creation timestamp
    #[serde(rename = "fecha_creacion")]
    pub created_at: DateTime<Utc>,
}

impl ExerciseRecord {
    /// Create a new, unreviewed, non-personalized exercise record
    pub fn new(therapy: TherapyType, visibility: Visibility, created_by: impl Into<String>) -> Self {
        Self {
            id: Self::generate_id(),
            therapy,
            reviewed: false,
            visibility,
            created_by: created_by.into(),
            personalized: false,
            base_reference: None,
            patient_id: None,
            adapted_description: String::new(),
            created_at: Utc::now(),
        }
    }

    /// Generate an exercise id: `E` followed by six uppercase hex digits
    pub fn generate_id() -> String {
        let hex = uuid::Uuid::new_v4().simple().to_string();
        format!("E{}", hex[..6].to_uppercase())
    }

    /// Mark the record as personalized from a base exercise for a patient
    pub fn personalized_from(mut self, base_id: impl Into<String>, patient_id: impl Into<String>) -> Self {
        self.personalized = true;
        self.base_reference = Some(base_id.into());
        self.patient_id = Some(patient_id.into());
        self
    }

    /// Check record invariants before it is written
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(anyhow!("Exercise id cannot be empty"));
        }
        if self.personalized && self.base_reference.as_deref().is_none_or(|b| b.trim().is_empty()) {
            return Err(anyhow!(
                "Personalized exercise {} must reference a base exercise",
                self.id
            ));
        }
        Ok(())
    }
}

/// Subject/object pair attached to a VNEST verb
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubjectObjectPair {
    /// Who performs the action
    #[serde(rename = "sujeto", alias = "subject")]
    pub subject: String,
    /// What receives the action
    #[serde(rename = "objeto", alias = "object")]
    pub object: String,
}

/// Expanded sentence presented to the patient
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpandedSentence {
    /// Sentence text
    #[serde(rename = "oracion", alias = "sentence", alias = "texto")]
    pub text: String,
    /// Whether the sentence is semantically correct, when the model says so
    #[serde(rename = "correcta", alias = "correct", default, skip_serializing_if = "Option::is_none")]
    pub correct: Option<bool>,
}

/// VNEST detail record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VnestExerciseRecord {
    /// Exercise identifier, shared with the general record
    pub id: String,
    /// Difficulty level
    #[serde(rename = "nivel")]
    pub level: Difficulty,
    /// Linguistic context (e.g. "Un hospital")
    #[serde(rename = "contexto")]
    pub context: String,
    /// Target verb
    #[serde(rename = "verbo")]
    pub verb: String,
    /// Subject/object pairs
    #[serde(rename = "pares")]
    pub pairs: Vec<SubjectObjectPair>,
    /// Expanded sentences
    #[serde(rename = "oraciones")]
    pub sentences: Vec<ExpandedSentence>,
}

/// Spaced-retrieval detail record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SrExerciseRecord {
    /// Exercise identifier, shared with the general record
    pub id: String,
    /// Question shown to the patient
    #[serde(rename = "pregunta")]
    pub question: String,
    /// Expected answer
    #[serde(rename = "rta_correcta")]
    pub correct_answer: String,
    /// Current position in the interval schedule
    pub interval_index: usize,
    /// Interval schedule in seconds
    pub intervals_sec: Vec<u64>,
    /// Consecutive successful recalls
    pub success_streak: u32,
    /// Number of failed recalls
    pub lapses: u32,
    /// Next due time in epoch seconds (0 means due now)
    pub next_due: i64,
    /// Learning status
    pub status: SrStatus,
    /// Linguistic context, when the card belongs to one
    #[serde(rename = "contexto", default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

impl SrExerciseRecord {
    /// Create a fresh card with the default schedule
    pub fn new(id: impl Into<String>, question: impl Into<String>, correct_answer: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            question: question.into(),
            correct_answer: correct_answer.into(),
            interval_index: 0,
            intervals_sec: DEFAULT_SR_INTERVALS.to_vec(),
            success_streak: 0,
            lapses: 0,
            next_due: 0,
            status: SrStatus::Learning,
            context: None,
        }
    }
}

/// Per-patient assignment record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignmentRecord {
    /// Patient identifier
    #[serde(rename = "id_paciente")]
    pub patient_id: String,
    /// Assigned exercise
    #[serde(rename = "id_ejercicio")]
    pub exercise_id: String,
    /// Context snapshot taken at assignment time
    #[serde(rename = "contexto")]
    pub context: Option<String>,
    /// Therapy type of the exercise
    #[serde(rename = "tipo")]
    pub therapy: TherapyType,
    /// Assignment status
    #[serde(rename = "estado")]
    pub status: AssignmentStatus,
    /// Ordering key, unique and ascending per patient
    #[serde(rename = "prioridad")]
    pub priority: i64,
    /// Last time the patient performed the exercise
    #[serde(rename = "ultima_fecha_realizado")]
    pub last_performed: Option<DateTime<Utc>>,
    /// Number of times performed
    #[serde(rename = "veces_realizado")]
    pub times_performed: i64,
    /// Assignment timestamp
    #[serde(rename = "fecha_asignacion")]
    pub assigned_at: DateTime<Utc>,
    /// Personalization flag copied from the general record
    #[serde(rename = "personalizado")]
    pub personalized: bool,
}

impl AssignmentRecord {
    /// Create a pending assignment
    pub fn pending(
        patient_id: impl Into<String>,
        exercise: &ExerciseRecord,
        context: Option<String>,
        priority: i64,
    ) -> Self {
        Self {
            patient_id: patient_id.into(),
            exercise_id: exercise.id.clone(),
            context,
            therapy: exercise.therapy,
            status: AssignmentStatus::Pending,
            priority,
            last_performed: None,
            times_performed: 0,
            assigned_at: Utc::now(),
            personalized: exercise.personalized,
        }
    }

    /// Whether the assignment is still pending
    pub fn is_pending(&self) -> bool {
        self.status == AssignmentStatus::Pending
    }
}

/// Patient record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientRecord {
    /// Patient identifier (email or uid)
    pub id: String,
    /// Structured profile document
    pub profile: serde_json::Value,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl PatientRecord {
    /// Create a patient with the given profile
    pub fn new(id: impl Into<String>, profile: serde_json::Value) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            profile,
            created_at: now,
            updated_at: now,
        }
    }
}
