//! Human review of tier-2 / tier-3 matches.
//!
//! The session is a small state machine (`Empty` or `Reviewing`) with pure
//! transitions. Resolving an item returns a [`Resolution`]; the caller
//! forwards it to the roster. Pointer and keyboard input go through the same
//! `approve` / `reject` entry points so an item is never resolved twice.

use crate::model::StudentId;
use crate::recognition::{ReviewTier, UncertainMatch};
use crate::roster::ReviewDecision;
use serde::{Deserialize, Serialize};

/// Confidence above which the "approve all likely tier-2" shortcut accepts a match.
pub const BULK_APPROVE_MIN_CONFIDENCE: f64 = 50.0;

#[derive(Debug, Clone, PartialEq, Default)]
pub enum ReviewState {
    #[default]
    Empty,
    Reviewing {
        queue: Vec<UncertainMatch>,
        cursor: usize,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewKeys {
    pub approve: char,
    pub reject: char,
    pub skip: char,
}

impl Default for ReviewKeys {
    fn default() -> Self {
        Self {
            approve: 'a',
            reject: 'x',
            skip: 'u',
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Approve,
    Reject,
    Skip,
}

impl ReviewKeys {
    pub fn action_for(&self, key: &str) -> Option<KeyAction> {
        let mut chars = key.chars();
        let c = chars.next()?.to_ascii_lowercase();
        if chars.next().is_some() {
            return None;
        }
        if c == self.approve.to_ascii_lowercase() {
            Some(KeyAction::Approve)
        } else if c == self.reject.to_ascii_lowercase() {
            Some(KeyAction::Reject)
        } else if c == self.skip.to_ascii_lowercase() {
            Some(KeyAction::Skip)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub item: UncertainMatch,
    pub decision: ReviewDecision,
}

impl Resolution {
    fn approve(item: UncertainMatch) -> Self {
        let decision = ReviewDecision::Approve {
            confidence: item.confidence,
            distance: item.distance,
        };
        Self { item, decision }
    }

    fn reject(item: UncertainMatch) -> Self {
        Self {
            item,
            decision: ReviewDecision::Reject,
        }
    }

    pub fn student_id(&self) -> StudentId {
        self.item.student_id
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum KeyOutcome {
    /// Session closed, queue empty, or not a review key.
    Ignored,
    Skipped { cursor: usize },
    Resolved(Resolution),
}

#[derive(Debug, Clone, Default)]
pub struct ReviewSession {
    state: ReviewState,
    open: bool,
    keys: ReviewKeys,
}

impl ReviewSession {
    pub fn new(keys: ReviewKeys) -> Self {
        Self {
            state: ReviewState::Empty,
            open: false,
            keys,
        }
    }

    /// Replaces any previous session with the uncertain matches of a new result.
    /// Queue order is the backend's order.
    pub fn begin(&mut self, uncertain: Vec<UncertainMatch>) {
        if uncertain.is_empty() {
            self.state = ReviewState::Empty;
            self.open = false;
        } else {
            self.state = ReviewState::Reviewing {
                queue: uncertain,
                cursor: 0,
            };
            self.open = true;
        }
    }

    pub fn state(&self) -> &ReviewState {
        &self.state
    }

    pub fn keys(&self) -> ReviewKeys {
        self.keys
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn is_complete(&self) -> bool {
        matches!(self.state, ReviewState::Empty)
    }

    pub fn queue(&self) -> &[UncertainMatch] {
        match &self.state {
            ReviewState::Empty => &[],
            ReviewState::Reviewing { queue, .. } => queue,
        }
    }

    pub fn cursor(&self) -> usize {
        match &self.state {
            ReviewState::Empty => 0,
            ReviewState::Reviewing { cursor, .. } => *cursor,
        }
    }

    pub fn current(&self) -> Option<&UncertainMatch> {
        match &self.state {
            ReviewState::Empty => None,
            ReviewState::Reviewing { queue, cursor } => queue.get(*cursor),
        }
    }

    pub fn approve(&mut self, student_id: StudentId) -> Option<Resolution> {
        self.take(student_id).map(Resolution::approve)
    }

    pub fn reject(&mut self, student_id: StudentId) -> Option<Resolution> {
        self.take(student_id).map(Resolution::reject)
    }

    /// Approves every queued match satisfying `predicate`, judged against the
    /// queue as it was when the call started.
    pub fn bulk_approve<F>(&mut self, predicate: F) -> Vec<Resolution>
    where
        F: Fn(&UncertainMatch) -> bool,
    {
        let snapshot: Vec<StudentId> = self
            .queue()
            .iter()
            .filter(|m| predicate(m))
            .map(|m| m.student_id)
            .collect();
        snapshot.into_iter().filter_map(|id| self.approve(id)).collect()
    }

    pub fn bulk_reject(&mut self, tier: ReviewTier) -> Vec<Resolution> {
        let snapshot: Vec<StudentId> = self
            .queue()
            .iter()
            .filter(|m| m.tier == tier)
            .map(|m| m.student_id)
            .collect();
        snapshot.into_iter().filter_map(|id| self.reject(id)).collect()
    }

    pub fn handle_key(&mut self, key: &str) -> KeyOutcome {
        if !self.open {
            return KeyOutcome::Ignored;
        }
        let Some(action) = self.keys.action_for(key) else {
            return KeyOutcome::Ignored;
        };
        let Some(current) = self.current().map(|m| m.student_id) else {
            return KeyOutcome::Ignored;
        };
        match action {
            KeyAction::Approve => self
                .approve(current)
                .map(KeyOutcome::Resolved)
                .unwrap_or(KeyOutcome::Ignored),
            KeyAction::Reject => self
                .reject(current)
                .map(KeyOutcome::Resolved)
                .unwrap_or(KeyOutcome::Ignored),
            KeyAction::Skip => {
                let ReviewState::Reviewing { queue, cursor } = &mut self.state else {
                    return KeyOutcome::Ignored;
                };
                *cursor = if *cursor + 1 < queue.len() { *cursor + 1 } else { 0 };
                KeyOutcome::Skipped { cursor: *cursor }
            }
        }
    }

    /// Closes the review without resolving what is left. Returns how many
    /// matches were left unrecorded.
    pub fn dismiss(&mut self) -> usize {
        let left = self.queue().len();
        self.state = ReviewState::Empty;
        self.open = false;
        left
    }

    /// Removes every queued entry for `student_id` and returns the first one.
    /// A student resolves once even if recognition listed them twice.
    fn take(&mut self, student_id: StudentId) -> Option<UncertainMatch> {
        let ReviewState::Reviewing { queue, cursor } = &mut self.state else {
            return None;
        };
        let idx = queue.iter().position(|m| m.student_id == student_id)?;
        let item = queue[idx].clone();
        let before_cursor = queue[..*cursor]
            .iter()
            .filter(|m| m.student_id == student_id)
            .count();
        queue.retain(|m| m.student_id != student_id);
        if queue.is_empty() {
            self.state = ReviewState::Empty;
            self.open = false;
            return Some(item);
        }
        *cursor = cursor.saturating_sub(before_cursor).min(queue.len() - 1);
        Some(item)
    }
}

/// Predicate behind the "approve tier 2 above 50%" bulk action.
pub fn likely_tier2(m: &UncertainMatch) -> bool {
    m.tier == ReviewTier::Tier2 && m.confidence > BULK_APPROVE_MIN_CONFIDENCE
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: i64, confidence: f64, tier: ReviewTier) -> UncertainMatch {
        UncertainMatch {
            student_id: StudentId(id),
            student_name: format!("S{}", id),
            roll_number: None,
            confidence,
            distance: Some(0.5),
            tier,
            photo_path: None,
        }
    }

    fn session(items: Vec<UncertainMatch>) -> ReviewSession {
        let mut s = ReviewSession::new(ReviewKeys::default());
        s.begin(items);
        s
    }

    fn assert_cursor_in_bounds(s: &ReviewSession) {
        let len = s.queue().len();
        if len == 0 {
            assert!(s.is_complete());
            assert_eq!(s.cursor(), 0);
        } else {
            assert!(s.cursor() < len);
        }
    }

    #[test]
    fn empty_result_does_not_open() {
        let s = session(vec![]);
        assert!(!s.is_open());
        assert!(s.is_complete());
    }

    #[test]
    fn approve_returns_match_values_and_is_idempotent() {
        let mut s = session(vec![item(2, 45.0, ReviewTier::Tier2)]);
        let r = s.approve(StudentId(2)).expect("resolution");
        assert_eq!(
            r.decision,
            ReviewDecision::Approve {
                confidence: 45.0,
                distance: Some(0.5)
            }
        );
        assert!(s.approve(StudentId(2)).is_none());
        assert!(s.reject(StudentId(2)).is_none());
        assert!(s.is_complete());
    }

    #[test]
    fn keyboard_approve_on_last_item_resets_cursor() {
        let mut s = session(vec![item(2, 45.0, ReviewTier::Tier2)]);
        let outcome = s.handle_key("A");
        assert!(matches!(outcome, KeyOutcome::Resolved(ref r) if r.student_id() == StudentId(2)));
        assert!(s.queue().is_empty());
        assert_eq!(s.cursor(), 0);
    }

    #[test]
    fn skip_wraps_and_resolve_clamps() {
        let mut s = session(vec![
            item(1, 45.0, ReviewTier::Tier2),
            item(2, 41.0, ReviewTier::Tier2),
            item(3, 35.0, ReviewTier::Tier3),
        ]);
        assert_eq!(s.handle_key("u"), KeyOutcome::Skipped { cursor: 1 });
        assert_eq!(s.handle_key("u"), KeyOutcome::Skipped { cursor: 2 });
        // Rejecting the last item leaves the cursor on the new last item.
        let outcome = s.handle_key("x");
        assert!(matches!(outcome, KeyOutcome::Resolved(ref r) if r.student_id() == StudentId(3)));
        assert_eq!(s.cursor(), 1);
        assert_eq!(s.handle_key("u"), KeyOutcome::Skipped { cursor: 0 });
        assert_cursor_in_bounds(&s);
    }

    #[test]
    fn pointer_resolve_before_cursor_keeps_focus_on_same_item() {
        let mut s = session(vec![
            item(1, 45.0, ReviewTier::Tier2),
            item(2, 41.0, ReviewTier::Tier2),
            item(3, 35.0, ReviewTier::Tier3),
        ]);
        s.handle_key("u");
        s.handle_key("u");
        assert_eq!(s.current().map(|m| m.student_id), Some(StudentId(3)));
        s.approve(StudentId(1));
        assert_eq!(s.current().map(|m| m.student_id), Some(StudentId(3)));
        assert_cursor_in_bounds(&s);
    }

    #[test]
    fn duplicate_student_entries_resolve_once() {
        let mut s = session(vec![
            item(2, 45.0, ReviewTier::Tier2),
            item(2, 41.0, ReviewTier::Tier2),
            item(3, 35.0, ReviewTier::Tier3),
        ]);
        let r = s.approve(StudentId(2)).expect("resolution");
        assert!(matches!(r.decision, ReviewDecision::Approve { confidence, .. } if confidence == 45.0));
        assert!(s.approve(StudentId(2)).is_none());
        assert_eq!(s.queue().len(), 1);
        assert_eq!(s.current().map(|m| m.student_id), Some(StudentId(3)));
        assert_cursor_in_bounds(&s);
    }

    #[test]
    fn duplicates_before_cursor_keep_focus() {
        let mut s = session(vec![
            item(1, 45.0, ReviewTier::Tier2),
            item(1, 44.0, ReviewTier::Tier2),
            item(2, 41.0, ReviewTier::Tier2),
            item(3, 35.0, ReviewTier::Tier3),
        ]);
        s.handle_key("u");
        s.handle_key("u");
        assert_eq!(s.current().map(|m| m.student_id), Some(StudentId(2)));
        s.reject(StudentId(1));
        assert_eq!(s.queue().len(), 2);
        assert_eq!(s.current().map(|m| m.student_id), Some(StudentId(2)));
        assert_cursor_in_bounds(&s);
    }

    #[test]
    fn keys_ignored_when_closed_or_unknown() {
        let mut s = session(vec![item(1, 45.0, ReviewTier::Tier2)]);
        assert_eq!(s.handle_key("q"), KeyOutcome::Ignored);
        assert_eq!(s.handle_key("ax"), KeyOutcome::Ignored);
        assert_eq!(s.dismiss(), 1);
        assert_eq!(s.handle_key("a"), KeyOutcome::Ignored);
    }

    #[test]
    fn bulk_operations_use_snapshot() {
        let mut s = session(vec![
            item(1, 52.0, ReviewTier::Tier2),
            item(2, 45.0, ReviewTier::Tier2),
            item(3, 54.0, ReviewTier::Tier2),
            item(4, 38.0, ReviewTier::Tier3),
        ]);
        let approved = s.bulk_approve(likely_tier2);
        let ids: Vec<_> = approved.iter().map(|r| r.student_id()).collect();
        assert_eq!(ids, vec![StudentId(1), StudentId(3)]);
        assert_cursor_in_bounds(&s);

        let rejected = s.bulk_reject(ReviewTier::Tier2);
        assert_eq!(rejected.len(), 1);
        assert!(rejected.iter().all(|r| r.decision == ReviewDecision::Reject));
        assert_eq!(s.queue().len(), 1);
        assert_eq!(s.queue()[0].tier, ReviewTier::Tier3);
    }

    #[test]
    fn bulk_on_empty_queue_is_noop() {
        let mut s = session(vec![]);
        assert!(s.bulk_approve(|_| true).is_empty());
        assert!(s.bulk_reject(ReviewTier::Tier3).is_empty());
        assert!(s.is_complete());
    }

    #[test]
    fn cursor_stays_in_bounds_through_mixed_operations() {
        let mut s = session((1..=6).map(|i| item(i, 40.0 + i as f64, ReviewTier::Tier2)).collect());
        let script = ["u", "u", "a", "u", "x", "u", "u", "a", "a", "x", "a"];
        for key in script {
            s.handle_key(key);
            assert_cursor_in_bounds(&s);
        }
        assert!(s.is_complete());
    }
}
