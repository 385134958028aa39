/*!
 * Database module for persistent storage of patients and exercises.
 *
 * This module provides SQLite-based persistence for:
 * - Patient records with their structured profiles
 * - General exercise records and their VNEST / SR detail records
 * - Per-patient assignments with priority ordering
 */

pub mod schema;
pub mod connection;
pub mod repository;
pub mod models;

// Re-export main types
pub use connection::{DatabaseConnection, DatabaseStats};
pub use repository::Repository;
