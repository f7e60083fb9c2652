//! Outcome of an optional, best-effort step

/// Result of a step that is allowed to come back empty.
///
/// Optional steps (hostname lookup, cache reads) never fail the caller, but the
/// caller can still tell whether the step ran, found nothing, or broke.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup<T> {
    /// The step was skipped
    NotAttempted,
    /// The step ran and found nothing
    Absent,
    /// The step ran and produced a value
    Found(T),
    /// The step ran and failed; the message is for logs only
    Failed(String),
}

impl<T> Lookup<T> {
    /// Collapse into an optional value, treating every non-`Found` outcome as absent
    pub fn found(self) -> Option<T> {
        match self {
            Lookup::Found(value) => Some(value),
            _ => None,
        }
    }
}

impl<T> From<Option<T>> for Lookup<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => Lookup::Found(v),
            None => Lookup::Absent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_found_collapses_other_outcomes() {
        assert_eq!(Lookup::Found(3).found(), Some(3));
        assert_eq!(Lookup::<u8>::Absent.found(), None);
        assert_eq!(Lookup::<u8>::NotAttempted.found(), None);
        assert_eq!(Lookup::<u8>::Failed("boom".into()).found(), None);
    }

    #[test]
    fn test_from_option() {
        assert_eq!(Lookup::from(Some("a")), Lookup::Found("a"));
        assert_eq!(Lookup::<&str>::from(None), Lookup::Absent);
    }
}
