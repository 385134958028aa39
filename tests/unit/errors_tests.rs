/*!
 * Tests for error types and conversions
 */

use aphasia_exercises::database::models::TherapyType;
use aphasia_exercises::errors::{AppError, AssignmentError, GenerationError, ProviderError};

#[test]
fn test_providerError_apiError_shouldDisplayStatusAndMessage() {
    let error = ProviderError::ApiError {
        status_code: 429,
        message: "Too many requests".to_string(),
    };
    let display = format!("{}", error);
    assert!(display.contains("429"));
    assert!(display.contains("Too many requests"));
}

#[test]
fn test_assignmentError_missingContext_shouldNameExerciseAndTherapy() {
    let error = AssignmentError::MissingContext {
        exercise_id: "E1A2B3C".to_string(),
        therapy: TherapyType::Sr,
    };
    let display = error.to_string();
    assert!(display.contains("E1A2B3C"));
    assert!(display.contains("SR"));
}

#[test]
fn test_generationError_sentenceCount_shouldShowBothCounts() {
    let error = GenerationError::SentenceCount { expected: 10, found: 7 };
    assert_eq!(error.to_string(), "Debe haber 10 oraciones, se recibieron 7");
}

#[test]
fn test_generationError_fromAssignmentError_shouldWrap() {
    let error: GenerationError = AssignmentError::ExerciseNotFound("E000001".to_string()).into();
    assert!(matches!(error, GenerationError::Assignment(AssignmentError::ExerciseNotFound(_))));
    assert!(error.to_string().contains("E000001"));
}

#[test]
fn test_appError_fromAnyhow_shouldKeepContextChain() {
    let error = anyhow::anyhow!("disk full").context("Failed to save exercise");
    let app: AppError = error.into();
    let display = app.to_string();
    assert!(display.contains("Failed to save exercise"));
    assert!(display.contains("disk full"));
}

#[test]
fn test_appError_fromGenerationError_shouldWrap() {
    let app: AppError = GenerationError::NoCards.into();
    assert!(matches!(app, AppError::Generation(GenerationError::NoCards)));
}
