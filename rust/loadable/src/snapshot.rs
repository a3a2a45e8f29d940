use serde::{Deserialize, Serialize};

use crate::{Phase, States};

/// The observed record behind a [Loadable](crate::Loadable): the data, the
/// phase and the error message.
///
/// In serialized form the phase is written as a set of flags:
///
/// ```json
/// { "data": "success", "state": { "none": false, "loading": false, "ready": true, "error": false }, "errorMessage": "" }
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot<T> {
    data: T,
    #[serde(rename = "state", with = "flags")]
    phase: Phase,
    error_message: String,
}

impl<T> Snapshot<T> {
    pub(crate) fn new(data: T, phase: Phase) -> Self {
        Self {
            data,
            phase,
            error_message: String::new(),
        }
    }

    /// The current payload. Until the source succeeds this is the initial
    /// value.
    pub fn data(&self) -> &T {
        &self.data
    }

    /// Consume the snapshot and keep only its payload
    pub fn into_data(self) -> T {
        self.data
    }

    /// The current phase
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// The current phase as flags
    pub fn states(&self) -> States {
        self.phase.into()
    }

    /// The formatted failure reason; empty unless the phase is
    /// [Phase::Error]
    pub fn error_message(&self) -> &str {
        &self.error_message
    }

    /// Store the value of a successful source. Returns false, leaving the
    /// snapshot untouched, when the snapshot is not loading.
    pub(crate) fn resolve(&mut self, data: T) -> bool {
        if !self.phase.can_become(Phase::Ready) {
            return false;
        }

        self.data = data;
        self.phase = Phase::Ready;
        true
    }

    /// Store the formatted reason of a failed source. The data is kept as
    /// it is. Returns false, leaving the snapshot untouched, when the
    /// snapshot is not loading.
    pub(crate) fn reject(&mut self, error_message: String) -> bool {
        if !self.phase.can_become(Phase::Error) {
            return false;
        }

        self.error_message = error_message;
        self.phase = Phase::Error;
        true
    }
}

mod flags {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    use crate::{Phase, States};

    pub fn serialize<S>(phase: &Phase, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        States::from(*phase).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Phase, D::Error>
    where
        D: Deserializer<'de>,
    {
        let states = States::deserialize(deserializer)?;
        Phase::try_from(states).map_err(serde::de::Error::custom)
    }
}
