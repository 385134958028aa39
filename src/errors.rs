/*!
 * Error types for the aphasia-exercises application.
 *
 * This module contains custom error types for the different parts of the
 * application, using the thiserror crate for ergonomic error definitions.
 * The store layer itself reports `anyhow::Error`, which is wrapped
 * transparently where a typed error is surfaced to callers.
 */

use thiserror::Error;

use crate::database::models::TherapyType;

/// Errors that can occur when working with completion provider APIs
#[derive(Error, Debug)]
pub enum ProviderError {
    /// Error when making an API request fails
    #[error("API request failed: {0}")]
    RequestFailed(String),

    /// Error when parsing an API response fails
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// Error returned by the API itself
    #[error("API responded with error: {status_code} - {message}")]
    ApiError {
        /// HTTP status code
        status_code: u16,
        /// Error message from the API
        message: String,
    },

    /// Error establishing or maintaining a connection
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Error related to rate limiting
    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    /// Error with authentication
    #[error("Authentication error: {0}")]
    AuthenticationError(String),
}

/// Errors surfaced by the assignment writer
#[derive(Error, Debug)]
pub enum AssignmentError {
    /// No general exercise record exists for the id
    #[error("No existe el ejercicio con ID {0}")]
    ExerciseNotFound(String),

    /// The exercise detail record carries no linguistic context
    #[error("No se encontró contexto para {exercise_id} ({therapy})")]
    MissingContext {
        /// Exercise that could not be resolved
        exercise_id: String,
        /// Therapy type of the exercise
        therapy: TherapyType,
    },

    /// The patient has no assignment for the exercise
    #[error("El paciente {patient_id} no tiene asignado el ejercicio {exercise_id}")]
    AssignmentNotFound {
        /// Patient identifier
        patient_id: String,
        /// Exercise identifier
        exercise_id: String,
    },

    /// Failure in the document store
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

/// Errors that can occur while running a generation workflow
#[derive(Error, Debug)]
pub enum GenerationError {
    /// Error from the completion provider
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// The model output could not be parsed, even after repair
    #[error("Malformed JSON in model output: {0}")]
    MalformedJson(String),

    /// A required field is missing from the model output
    #[error("Missing field '{0}' in model output")]
    MissingField(String),

    /// The final VNEST payload does not carry the expected number of sentences
    #[error("Debe haber {expected} oraciones, se recibieron {found}")]
    SentenceCount {
        /// Required number of sentences
        expected: usize,
        /// Number of sentences received
        found: usize,
    },

    /// The SR workflow received no cards
    #[error("El modelo no generó tarjetas SR.")]
    NoCards,

    /// The base exercise does not exist
    #[error("Ejercicio '{0}' no encontrado.")]
    ExerciseNotFound(String),

    /// The base exercise has a therapy the workflow cannot handle
    #[error("Terapia no soportada: {0}")]
    UnsupportedTherapy(String),

    /// A record failed validation before being written
    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    /// The generated exercise could not be assigned
    #[error("Assignment failed: {0}")]
    Assignment(#[from] AssignmentError),

    /// Failure in the document store
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

/// Main application error type that wraps all other errors
#[derive(Error, Debug)]
pub enum AppError {
    /// Error from a file operation
    #[error("File error: {0}")]
    File(String),

    /// Error from a provider
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Error from the assignment writer
    #[error("Assignment error: {0}")]
    Assignment(#[from] AssignmentError),

    /// Error from a generation workflow
    #[error("Generation error: {0}")]
    Generation(#[from] GenerationError),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// No profile was given and none is stored for the patient
    #[error("No hay perfil registrado para el paciente {0}")]
    MissingProfile(String),

    /// Any other error
    #[error("Unknown error: {0}")]
    Unknown(String),
}

// Utility functions for error conversion
impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        Self::Unknown(format!("{:#}", error))
    }
}

impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        Self::File(error.to_string())
    }
}
