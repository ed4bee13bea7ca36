//! Vote toggle engine.
//!
//! Pure computation of what a vote click does to the stored vote row and the
//! denormalized up/down counters. Clicking the same direction twice retracts
//! the vote; clicking the opposite direction flips it, adjusting both
//! counters in one step so the flip commits as a single counter update.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteAction {
    /// Insert a new vote row
    Create,
    /// Flip the existing row's value
    Update,
    /// Remove the row (vote retracted)
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToggleOutcome {
    pub action: VoteAction,
    pub delta_up: i32,
    pub delta_down: i32,
    /// 0 when the vote was retracted
    pub next_value: i16,
}

/// Compute the effect of voting `next` (-1 or 1) given the voter's current
/// vote on the target. Callers apply the outcome inside one transaction.
pub fn toggle(existing: Option<i16>, next: i16) -> ToggleOutcome {
    match existing {
        None => ToggleOutcome {
            action: VoteAction::Create,
            delta_up: i32::from(next == 1),
            delta_down: i32::from(next == -1),
            next_value: next,
        },
        Some(current) if current == next => ToggleOutcome {
            action: VoteAction::Delete,
            delta_up: -i32::from(next == 1),
            delta_down: -i32::from(next == -1),
            next_value: 0,
        },
        Some(_) => ToggleOutcome {
            action: VoteAction::Update,
            delta_up: if next == 1 { 1 } else { -1 },
            delta_down: if next == 1 { -1 } else { 1 },
            next_value: next,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_upvote_creates() {
        assert_eq!(
            toggle(None, 1),
            ToggleOutcome {
                action: VoteAction::Create,
                delta_up: 1,
                delta_down: 0,
                next_value: 1,
            }
        );
    }

    #[test]
    fn first_downvote_creates() {
        assert_eq!(
            toggle(None, -1),
            ToggleOutcome {
                action: VoteAction::Create,
                delta_up: 0,
                delta_down: 1,
                next_value: -1,
            }
        );
    }

    #[test]
    fn repeated_upvote_retracts() {
        assert_eq!(
            toggle(Some(1), 1),
            ToggleOutcome {
                action: VoteAction::Delete,
                delta_up: -1,
                delta_down: 0,
                next_value: 0,
            }
        );
    }

    #[test]
    fn repeated_downvote_retracts() {
        assert_eq!(
            toggle(Some(-1), -1),
            ToggleOutcome {
                action: VoteAction::Delete,
                delta_up: 0,
                delta_down: -1,
                next_value: 0,
            }
        );
    }

    #[test]
    fn up_to_down_flips_both_counters() {
        assert_eq!(
            toggle(Some(1), -1),
            ToggleOutcome {
                action: VoteAction::Update,
                delta_up: -1,
                delta_down: 1,
                next_value: -1,
            }
        );
    }

    #[test]
    fn down_to_up_flips_both_counters() {
        assert_eq!(
            toggle(Some(-1), 1),
            ToggleOutcome {
                action: VoteAction::Update,
                delta_up: 1,
                delta_down: -1,
                next_value: 1,
            }
        );
    }

    #[test]
    fn double_toggle_is_idempotent() {
        // Applying the same direction twice lands back at the pre-vote state
        for next in [-1i16, 1] {
            let first = toggle(None, next);
            let second = toggle(Some(first.next_value), next);

            assert_eq!(second.action, VoteAction::Delete);
            assert_eq!(first.delta_up + second.delta_up, 0);
            assert_eq!(first.delta_down + second.delta_down, 0);
            assert_eq!(second.next_value, 0);
        }
    }
}
