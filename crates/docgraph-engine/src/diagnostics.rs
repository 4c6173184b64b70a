use std::collections::VecDeque;
use std::fmt;
use std::sync::Mutex;

use docgraph_schema::AccessError;
use tracing::warn;

/// Which traversal hit the failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccessPhase {
    Encode,
    Decode,
    Predicate,
}

impl fmt::Display for AccessPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Encode => write!(f, "encode"),
            Self::Decode => write!(f, "decode"),
            Self::Predicate => write!(f, "predicate"),
        }
    }
}

/// One attribute that could not be read or assigned. The attribute was
/// skipped and the call went on.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccessFailure {
    pub type_name: String,
    pub attribute: String,
    pub phase: AccessPhase,
    pub error: AccessError,
}

/// Collects [`AccessFailure`]s. Every failure is logged at `warn`; it is
/// also kept in memory when recording is on, up to `capacity` of the
/// most recent ones.
#[derive(Debug)]
pub struct Diagnostics {
    record: bool,
    capacity: usize,
    failures: Mutex<VecDeque<AccessFailure>>,
    dropped: Mutex<u64>,
}

impl Diagnostics {
    pub const DEFAULT_CAPACITY: usize = 256;

    pub fn new(record: bool) -> Self {
        Self::with_capacity(record, Self::DEFAULT_CAPACITY)
    }

    pub fn with_capacity(record: bool, capacity: usize) -> Self {
        Self {
            record,
            capacity,
            failures: Mutex::new(VecDeque::new()),
            dropped: Mutex::new(0),
        }
    }

    pub(crate) fn report(&self, type_name: &str, attribute: &str, phase: AccessPhase, error: AccessError) {
        warn!(
            type_name,
            attribute,
            phase = %phase,
            error = %error,
            "attribute access failed; attribute skipped"
        );
        if !self.record {
            return;
        }
        let mut failures = self.failures.lock().expect("lock poisoned");
        if self.capacity == 0 {
            *self.dropped.lock().expect("lock poisoned") += 1;
            return;
        }
        if failures.len() == self.capacity {
            failures.pop_front();
            *self.dropped.lock().expect("lock poisoned") += 1;
        }
        failures.push_back(AccessFailure {
            type_name: type_name.to_string(),
            attribute: attribute.to_string(),
            phase,
            error,
        });
    }

    /// Snapshot of the recorded failures, oldest first.
    pub fn failures(&self) -> Vec<AccessFailure> {
        self.failures.lock().expect("lock poisoned").iter().cloned().collect()
    }

    /// Remove and return the recorded failures.
    pub fn take(&self) -> Vec<AccessFailure> {
        self.failures.lock().expect("lock poisoned").drain(..).collect()
    }

    /// Failures recorded and later dropped to stay within capacity.
    pub fn dropped(&self) -> u64 {
        *self.dropped.lock().expect("lock poisoned")
    }

    pub fn len(&self) -> usize {
        self.failures.lock().expect("lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
