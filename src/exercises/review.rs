/*!
 * Spaced-retrieval scheduling.
 *
 * A card walks through its interval schedule one step per successful recall.
 * A failed recall sends it back to the first interval.
 */

use crate::database::models::{SrExerciseRecord, SrStatus, DEFAULT_SR_INTERVALS};

/// Apply one recall attempt to a card
///
/// `now` is in epoch seconds. The next due time is `now` plus the interval at
/// the card's new position.
pub fn apply_review(card: &mut SrExerciseRecord, success: bool, now: i64) {
    if card.intervals_sec.is_empty() {
        card.intervals_sec = DEFAULT_SR_INTERVALS.to_vec();
    }
    let last = card.intervals_sec.len() - 1;
    card.interval_index = card.interval_index.min(last);

    if success {
        card.success_streak += 1;
        if card.interval_index == last {
            card.status = SrStatus::Mastered;
        } else {
            card.interval_index += 1;
        }
    } else {
        card.lapses += 1;
        card.success_streak = 0;
        card.interval_index = 0;
        card.status = SrStatus::Learning;
    }

    let interval = card.intervals_sec[card.interval_index];
    card.next_due = now.saturating_add(i64::try_from(interval).unwrap_or(i64::MAX));
}

/// Whether the card should be shown at `now`
pub fn is_due(card: &SrExerciseRecord, now: i64) -> bool {
    card.next_due <= now
}
