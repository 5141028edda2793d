use std::fmt;

/// One workload to keep up to date. Fixed at startup.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReconciliationTarget {
    pub identifier: String,
    pub namespace: String,
}

impl ReconciliationTarget {
    pub fn new(identifier: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            namespace: namespace.into(),
        }
    }
}

impl fmt::Display for ReconciliationTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.identifier)
    }
}

/// Result of reconciling one target in one tick. Not persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconciliationOutcome {
    Unchanged,
    Updated {
        old_image: String,
        new_image: String,
    },
    Failed {
        reason: String,
    },
}

impl ReconciliationOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, ReconciliationOutcome::Failed { .. })
    }
}
