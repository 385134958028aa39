/*!
 * # aphasia-exercises
 *
 * Therapy exercise management for people with aphasia.
 *
 * ## Features
 *
 * - Select the next VNEST exercise for a patient, context and verb
 * - Assign exercises with per-patient priorities
 * - Track completions and spaced-retrieval review schedules
 * - Generate exercises with a chat completion model:
 *   - VNEST exercises for a linguistic context
 *   - Spaced-retrieval cards from a patient profile
 *   - Personalized copies of existing exercises
 *   - Structured patient profiles from free text
 * - Export the generation pipelines as Mermaid graphs
 *
 * ## Architecture
 *
 * The library is organized in these main modules:
 * - `app_config`: Configuration management
 * - `app_controller`: Main application controller
 * - `database`: SQLite store for patients, exercises and assignments
 * - `exercises`: Selection, assignment and review scheduling
 * - `generation`: LLM-backed generation workflows:
 *   - `generation::vnest`: VNEST exercise generation
 *   - `generation::sr`: Spaced-retrieval cards
 *   - `generation::personalization`: Personalized exercise copies
 *   - `generation::profile`: Profile structuring
 *   - `generation::graph`: Mermaid export
 * - `providers`: Client implementations for completion providers:
 *   - `providers::openai`: OpenAI and Azure OpenAI client
 *   - `providers::ollama`: Ollama API client
 *   - `providers::mock`: Scripted provider for tests
 * - `errors`: Custom error types for the application
 *
 * ## License
 *
 * This project is licensed under the MIT License
 */

// Global lints configuration
// These lints will be allowed but not auto-fixed
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::redundant_closure_for_method_calls)]

// Public modules
pub mod app_config;
pub mod app_controller;
pub mod database;
pub mod errors;
pub mod exercises;
pub mod generation;
pub mod providers;

// Re-export main types for easier usage
pub use app_config::Config;
pub use app_controller::Controller;
pub use database::Repository;
pub use errors::{AppError, AssignmentError, GenerationError, ProviderError};
pub use exercises::{AssignmentWriter, ExerciseSelector, SelectionOutcome};
pub use generation::graph::WorkflowKind;
