use wayfarer_core::RequestStatus;

use crate::error::{WorkflowError, WorkflowResult};

/// One row of the request state machine.
#[derive(Debug)]
pub struct TransitionRule {
    pub to: RequestStatus,
    pub from: &'static [RequestStatus],
    /// Customers may only drive transitions that are not admin-only, and only on their own requests.
    pub admin_only: bool,
    pub notifies: bool,
    pub materializes_booking: bool,
}

use RequestStatus::*;

pub static RULES: [TransitionRule; 5] = [
    TransitionRule {
        to: Processing,
        from: &[Pending],
        admin_only: true,
        notifies: false,
        materializes_booking: false,
    },
    TransitionRule {
        to: Confirmed,
        from: &[Processing],
        admin_only: true,
        notifies: true,
        materializes_booking: true,
    },
    TransitionRule {
        to: Rejected,
        from: &[Pending, Processing],
        admin_only: true,
        notifies: true,
        materializes_booking: false,
    },
    TransitionRule {
        to: Cancelled,
        from: &[Pending, Processing, Confirmed],
        admin_only: false,
        notifies: true,
        materializes_booking: false,
    },
    TransitionRule {
        to: Completed,
        from: &[Confirmed],
        admin_only: true,
        notifies: true,
        materializes_booking: false,
    },
];

/// `approved` has no rule: nothing may transition into it.
pub fn rule_for(to: RequestStatus) -> Option<&'static TransitionRule> {
    RULES.iter().find(|rule| rule.to == to)
}

/// Looks up the rule for `from -> to`. A stored `approved` is read as `confirmed`.
pub fn check(from: RequestStatus, to: RequestStatus) -> WorkflowResult<&'static TransitionRule> {
    let from = from.canonical();
    if from.is_terminal() {
        return Err(WorkflowError::Validation(format!(
            "request is {}; no further transitions are accepted",
            from
        )));
    }

    let rule = rule_for(to).ok_or_else(|| WorkflowError::invalid_transition(from, to))?;
    if !rule.from.contains(&from) {
        return Err(WorkflowError::invalid_transition(from, to));
    }
    Ok(rule)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn allowed(from: RequestStatus, to: RequestStatus) -> bool {
        check(from, to).is_ok()
    }

    #[test]
    fn test_transition_table() {
        let expected = [
            (Pending, Processing),
            (Processing, Confirmed),
            (Approved, Completed),
            (Approved, Cancelled),
            (Pending, Rejected),
            (Processing, Rejected),
            (Pending, Cancelled),
            (Processing, Cancelled),
            (Confirmed, Cancelled),
            (Confirmed, Completed),
        ];

        for from in RequestStatus::ALL {
            for to in RequestStatus::ALL {
                assert_eq!(
                    allowed(from, to),
                    expected.contains(&(from, to)),
                    "{} -> {}",
                    from,
                    to
                );
            }
        }
    }

    #[test]
    fn test_terminal_states_accept_nothing() {
        for from in [Rejected, Cancelled, Completed] {
            for to in RequestStatus::ALL {
                assert!(matches!(check(from, to), Err(WorkflowError::Validation(_))));
            }
        }
    }

    #[test]
    fn test_nothing_transitions_into_pending_or_approved() {
        assert!(rule_for(Pending).is_none());
        assert!(rule_for(Approved).is_none());
        assert!(check(Processing, Approved).is_err());
    }

    #[test]
    fn test_only_cancel_is_open_to_customers() {
        let open: Vec<_> = RULES.iter().filter(|r| !r.admin_only).map(|r| r.to).collect();
        assert_eq!(open, vec![Cancelled]);
    }
}
