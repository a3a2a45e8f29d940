use serde::{Deserialize, Serialize};
use std::fmt::Display;

use crate::InvalidStates;

/// The lifecycle position of a [Loadable](crate::Loadable).
///
/// Exactly one phase is active at a time. A handle created without a source
/// stays at [Phase::None]; a handle created from a source starts at
/// [Phase::Loading] and moves exactly once to [Phase::Ready] or
/// [Phase::Error], where it stays.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// No source is attached
    #[default]
    None,
    /// The source has not settled yet
    Loading,
    /// The source produced a value
    Ready,
    /// The source failed
    Error,
}

impl Phase {
    /// The lowercase label of this phase, as used in serialized form
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::None => "none",
            Phase::Loading => "loading",
            Phase::Ready => "ready",
            Phase::Error => "error",
        }
    }

    /// True for the terminal phases, [Phase::Ready] and [Phase::Error]
    pub fn is_settled(&self) -> bool {
        matches!(self, Phase::Ready | Phase::Error)
    }

    /// Whether a handle in this phase may move to `next`
    pub(crate) fn can_become(&self, next: Phase) -> bool {
        matches!(
            (self, next),
            (Phase::Loading, Phase::Ready) | (Phase::Loading, Phase::Error)
        )
    }
}

impl Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The flag view of a [Phase]: one boolean per phase, exactly one of which is
/// set. This is the shape UI templates usually bind against
/// (`state.loading`, `state.error` and so on).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct States {
    /// Set when no source is attached
    pub none: bool,
    /// Set while the source is pending
    pub loading: bool,
    /// Set once the source produced a value
    pub ready: bool,
    /// Set once the source failed
    pub error: bool,
}

impl States {
    /// The flags of a handle that has no source yet
    pub fn empty() -> Self {
        Phase::None.into()
    }

    /// True when the flag for `phase` is set and every other flag is clear
    pub fn has_only(&self, phase: Phase) -> bool {
        *self == States::from(phase)
    }
}

impl Default for States {
    fn default() -> Self {
        Self::empty()
    }
}

impl From<Phase> for States {
    fn from(phase: Phase) -> Self {
        States {
            none: phase == Phase::None,
            loading: phase == Phase::Loading,
            ready: phase == Phase::Ready,
            error: phase == Phase::Error,
        }
    }
}

impl TryFrom<States> for Phase {
    type Error = InvalidStates;

    fn try_from(states: States) -> Result<Self, InvalidStates> {
        match (states.none, states.loading, states.ready, states.error) {
            (true, false, false, false) => Ok(Phase::None),
            (false, true, false, false) => Ok(Phase::Loading),
            (false, false, true, false) => Ok(Phase::Ready),
            (false, false, false, true) => Ok(Phase::Error),
            _ => Err(InvalidStates(states)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Phase, States};
    use crate::InvalidStates;

    const PHASES: [Phase; 4] = [Phase::None, Phase::Loading, Phase::Ready, Phase::Error];

    #[test]
    fn it_sets_exactly_one_flag_per_phase() {
        for phase in PHASES {
            let states = States::from(phase);
            let set = [states.none, states.loading, states.ready, states.error]
                .into_iter()
                .filter(|flag| *flag)
                .count();

            assert_eq!(set, 1, "{phase} should set a single flag");
            assert!(states.has_only(phase));
            assert_eq!(Phase::try_from(states).unwrap(), phase);

            for other in PHASES.into_iter().filter(|other| *other != phase) {
                assert!(!states.has_only(other));
            }
        }
    }

    #[test]
    fn it_starts_empty_states_at_none() {
        assert!(States::empty().has_only(Phase::None));
        assert_eq!(States::default(), States::empty());
    }

    #[test]
    fn it_rejects_flag_sets_that_are_not_a_partition() {
        let overlapping = States {
            none: false,
            loading: true,
            ready: true,
            error: false,
        };
        let cleared = States {
            none: false,
            loading: false,
            ready: false,
            error: false,
        };

        assert!(matches!(
            Phase::try_from(overlapping),
            Err(InvalidStates(states)) if states == overlapping
        ));
        assert!(Phase::try_from(cleared).is_err());
    }

    #[test]
    fn it_only_allows_loading_to_settle() {
        assert!(Phase::Loading.can_become(Phase::Ready));
        assert!(Phase::Loading.can_become(Phase::Error));

        for settled in [Phase::Ready, Phase::Error] {
            for next in PHASES {
                assert!(!settled.can_become(next));
            }
        }
        for next in PHASES {
            assert!(!Phase::None.can_become(next));
        }
        assert!(!Phase::Loading.can_become(Phase::None));
        assert!(!Phase::Loading.can_become(Phase::Loading));
    }

    #[test]
    fn it_labels_phases_in_lowercase() {
        assert_eq!(Phase::Ready.to_string(), "ready");
        assert_eq!(
            serde_json::to_string(&Phase::Loading).unwrap(),
            "\"loading\""
        );
        assert!(Phase::Error.is_settled());
        assert!(!Phase::Loading.is_settled());
    }
}
