use serde::{Deserialize, Serialize};
use skyhold_core::{CoreError, CoreResult};
use std::fmt;

/// Reservation lifecycle.
///
/// ```text
/// Created ──hold──▶ HeldUnpaid ──pay──▶ Confirmed
///    │  └──────────────pay────────────────▲
///    ├──cancel / deadline──▶ Cancelled
///    └──departure window──▶ Expired (or purged)
/// ```
///
/// Confirmed, Cancelled and Expired are terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReservationStatus {
    Created,
    HeldUnpaid,
    Confirmed,
    Cancelled,
    Expired,
}

use ReservationStatus::*;

/// States a reservation may move to from each state.
const TRANSITIONS: &[(ReservationStatus, &[ReservationStatus])] = &[
    (Created, &[HeldUnpaid, Confirmed, Cancelled, Expired]),
    (HeldUnpaid, &[Confirmed, Cancelled, Expired]),
    (Confirmed, &[]),
    (Cancelled, &[]),
    (Expired, &[]),
];

impl ReservationStatus {
    /// Statuses the expiration sweep and the passenger may still act on.
    pub const OPEN: [ReservationStatus; 2] = [Created, HeldUnpaid];
    /// Statuses whose seat selections make a seat unavailable.
    pub const BLOCKING: [ReservationStatus; 3] = [Created, HeldUnpaid, Confirmed];

    /// Three-letter storage code.
    pub fn code(&self) -> &'static str {
        match self {
            Created => "CRE",
            HeldUnpaid => "RSP",
            Confirmed => "CON",
            Cancelled => "CAN",
            Expired => "EXP",
        }
    }

    pub fn from_code(code: &str) -> CoreResult<Self> {
        match code {
            "CRE" => Ok(Created),
            "RSP" => Ok(HeldUnpaid),
            "CON" => Ok(Confirmed),
            "CAN" => Ok(Cancelled),
            "EXP" => Ok(Expired),
            other => Err(CoreError::Storage(format!("unknown reservation status code {}", other))),
        }
    }

    pub fn is_open(&self) -> bool {
        Self::OPEN.contains(self)
    }

    pub fn is_blocking(&self) -> bool {
        Self::BLOCKING.contains(self)
    }

    pub fn is_terminal(&self) -> bool {
        self.allowed_transitions().is_empty()
    }

    pub fn allowed_transitions(&self) -> &'static [ReservationStatus] {
        TRANSITIONS
            .iter()
            .find(|(from, _)| from == self)
            .map(|(_, to)| *to)
            .unwrap_or(&[])
    }

    pub fn can_transition_to(&self, next: ReservationStatus) -> bool {
        self.allowed_transitions().contains(&next)
    }

    /// Guard a transition against the table.
    pub fn transition(self, next: ReservationStatus) -> CoreResult<ReservationStatus> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(CoreError::InvalidTransition {
                from: self.to_string(),
                to: next.to_string(),
            })
        }
    }
}

impl fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Created => "CREATED",
            HeldUnpaid => "HELD_UNPAID",
            Confirmed => "CONFIRMED",
            Cancelled => "CANCELLED",
            Expired => "EXPIRED",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const ALL: [ReservationStatus; 5] = [Created, HeldUnpaid, Confirmed, Cancelled, Expired];

    #[test]
    fn test_reservation_lifecycle() {
        let status = Created.transition(HeldUnpaid).unwrap();
        let status = status.transition(Confirmed).unwrap();
        assert_eq!(status, Confirmed);
        assert!(status.is_terminal());
    }

    #[test]
    fn test_invalid_transition() {
        let err = Confirmed.transition(Cancelled).unwrap_err();
        assert_eq!(err.to_string(), "Invalid state transition from CONFIRMED to CANCELLED");
        assert!(HeldUnpaid.transition(Created).is_err());
    }

    #[test]
    fn test_status_codes_round_trip() {
        for status in ALL {
            assert_eq!(ReservationStatus::from_code(status.code()).unwrap(), status);
        }
        assert!(ReservationStatus::from_code("XXX").is_err());
    }

    #[test]
    fn test_blocking_and_open_sets() {
        assert!(Confirmed.is_blocking());
        assert!(!Confirmed.is_open());
        assert!(!Cancelled.is_blocking());
        assert!(!Expired.is_blocking());
        assert!(HeldUnpaid.is_open());
    }

    fn any_status() -> impl Strategy<Value = ReservationStatus> {
        prop::sample::select(ALL.to_vec())
    }

    proptest! {
        #[test]
        fn prop_terminal_states_are_absorbing(steps in prop::collection::vec(any_status(), 1..12)) {
            let mut status = Created;
            let mut reached_terminal = false;
            for next in steps {
                match status.transition(next) {
                    Ok(s) => {
                        prop_assert!(!reached_terminal);
                        status = s;
                    }
                    Err(_) => prop_assert!(!status.can_transition_to(next)),
                }
                reached_terminal |= status.is_terminal();
            }
        }

        #[test]
        fn prop_confirmed_never_leaves(next in any_status()) {
            prop_assert!(Confirmed.transition(next).is_err());
        }
    }
}
