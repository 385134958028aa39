/*!
 * Exercise selection and assignment.
 *
 * - `selector`: picks the next VNEST exercise for a patient
 * - `assignment`: writes assignments with per-patient priorities
 * - `review`: spaced-retrieval schedule updates
 */

pub mod assignment;
pub mod review;
pub mod selector;

pub use assignment::AssignmentWriter;
pub use selector::{ExerciseSelector, SelectionOrigin, SelectionOutcome};
