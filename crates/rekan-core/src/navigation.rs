//! Current-question pointer and review flags.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Navigation state for one session. Independent of scoring and submission.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Navigator {
    question_count: usize,
    current: usize,
    flagged: BTreeSet<usize>,
}

impl Navigator {
    pub fn new(question_count: usize) -> Self {
        Self {
            question_count,
            current: 0,
            flagged: BTreeSet::new(),
        }
    }

    pub fn current(&self) -> usize {
        self.current
    }

    pub fn question_count(&self) -> usize {
        self.question_count
    }

    fn last(&self) -> usize {
        self.question_count.saturating_sub(1)
    }

    /// Move forward; stays on the last question.
    pub fn go_next(&mut self) -> usize {
        self.current = (self.current + 1).min(self.last());
        self.current
    }

    /// Move back; stays on the first question.
    pub fn go_prev(&mut self) -> usize {
        self.current = self.current.saturating_sub(1);
        self.current
    }

    /// Jump to `index`, clamped into range.
    pub fn go_to(&mut self, index: usize) -> usize {
        self.current = index.min(self.last());
        self.current
    }

    pub fn is_first(&self) -> bool {
        self.current == 0
    }

    pub fn is_last(&self) -> bool {
        self.current == self.last()
    }

    /// Flag or unflag `index`. Returns whether it is flagged afterwards.
    pub fn toggle_flag(&mut self, index: usize) -> bool {
        if self.flagged.remove(&index) {
            false
        } else {
            self.flagged.insert(index);
            true
        }
    }

    pub fn is_flagged(&self, index: usize) -> bool {
        self.flagged.contains(&index)
    }

    pub fn flagged_count(&self) -> usize {
        self.flagged.len()
    }

    pub fn flagged(&self) -> impl Iterator<Item = usize> + '_ {
        self.flagged.iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn saturates_at_both_ends() {
        let mut nav = Navigator::new(3);
        assert_eq!(nav.go_prev(), 0);
        assert_eq!(nav.go_next(), 1);
        assert_eq!(nav.go_next(), 2);
        assert_eq!(nav.go_next(), 2);
        assert!(nav.is_last());
        assert_eq!(nav.go_to(99), 2);
        assert_eq!(nav.go_to(0), 0);
        assert!(nav.is_first());
    }

    #[test]
    fn empty_session_stays_at_zero() {
        let mut nav = Navigator::new(0);
        assert_eq!(nav.go_next(), 0);
        assert_eq!(nav.go_prev(), 0);
        assert_eq!(nav.go_to(5), 0);
    }

    #[test]
    fn toggle_flag_is_symmetric_difference() {
        let mut nav = Navigator::new(5);
        assert!(nav.toggle_flag(3));
        assert!(nav.toggle_flag(1));
        assert!(nav.is_flagged(3));
        assert!(!nav.toggle_flag(3));
        assert!(!nav.is_flagged(3));
        assert_eq!(nav.flagged().collect::<Vec<_>>(), vec![1]);
        assert_eq!(nav.flagged_count(), 1);
    }
}
