use serde::Serialize;

/// Result of one press of the mark button.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum MarkOutcome {
    /// Not signed in; the page asks for the auth popup instead.
    AuthRequired,
    Started { start_ms: u64 },
    /// Bounds are already ordered.
    Ended { start_ms: u64, end_ms: u64 },
    /// Start and end landed on the same instant.
    Discarded,
}

/// Order a captured pair; `None` for a zero-length mark.
pub fn normalize_mark(first_ms: u64, second_ms: u64) -> Option<(u64, u64)> {
    match first_ms.cmp(&second_ms) {
        std::cmp::Ordering::Equal => None,
        std::cmp::Ordering::Less => Some((first_ms, second_ms)),
        std::cmp::Ordering::Greater => Some((second_ms, first_ms)),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MarkingState {
    start_ms: Option<u64>,
}

impl MarkingState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_marking(&self) -> bool {
        self.start_ms.is_some()
    }

    pub fn toggle(&mut self, now_ms: u64, authenticated: bool) -> MarkOutcome {
        if !authenticated {
            return MarkOutcome::AuthRequired;
        }

        match self.start_ms.take() {
            None => {
                self.start_ms = Some(now_ms);
                MarkOutcome::Started { start_ms: now_ms }
            }
            Some(start_ms) => match normalize_mark(start_ms, now_ms) {
                Some((start_ms, end_ms)) => MarkOutcome::Ended { start_ms, end_ms },
                None => MarkOutcome::Discarded,
            },
        }
    }

    pub fn reset(&mut self) {
        self.start_ms = None;
    }

    pub fn label(&self, authenticated: bool) -> &'static str {
        match (authenticated, self.is_marking()) {
            (_, true) => "Marking... tap to end",
            (true, false) => "Mark scene",
            (false, false) => "Sign in",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reversed_mark_is_swapped() {
        let mut marking = MarkingState::new();
        assert_eq!(marking.toggle(9000, true), MarkOutcome::Started { start_ms: 9000 });
        assert!(marking.is_marking());
        assert_eq!(
            marking.toggle(4000, true),
            MarkOutcome::Ended {
                start_ms: 4000,
                end_ms: 9000
            }
        );
        assert!(!marking.is_marking());
    }

    #[test]
    fn zero_length_mark_is_dropped() {
        let mut marking = MarkingState::new();
        marking.toggle(5000, true);
        assert_eq!(marking.toggle(5000, true), MarkOutcome::Discarded);
        assert!(!marking.is_marking());
    }

    #[test]
    fn signed_out_click_asks_for_auth() {
        let mut marking = MarkingState::new();
        assert_eq!(marking.toggle(5000, false), MarkOutcome::AuthRequired);
        assert!(!marking.is_marking());
        assert_eq!(marking.label(false), "Sign in");
    }

    #[test]
    fn normalize_orders_bounds() {
        assert_eq!(normalize_mark(1, 2), Some((1, 2)));
        assert_eq!(normalize_mark(2, 1), Some((1, 2)));
        assert_eq!(normalize_mark(3, 3), None);
    }
}
