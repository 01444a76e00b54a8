use std::fmt;

/// The full error taxonomy for the lens engine.
///
/// Variants split into two families distinguished by [`LensError::is_rollback_safe`]:
/// the rollback-safe family is absorbed by a [`crate::rollback::tentative`] scope when
/// an alternative remains to try; the fatal family always surfaces.
#[derive(Debug, Clone, PartialEq)]
pub enum LensError {
    /// A branch did not match; carries a human-readable description of what
    /// was expected versus what was found, for the error path reported at
    /// the top-level call.
    NoMatch(String),
    /// The reader was exhausted mid-match.
    EndOfInput,
    /// A non-STORE lens was asked to CREATE (no reader, no default).
    NoDefault(String),
    /// `Repeat` produced fewer than `min` iterations.
    TooFewIterations { min: usize, got: usize },
    /// Top-level consumption check failed: the reader or a container still
    /// held unconsumed content after the call.
    NotFullyConsumed { remaining: String },
    /// A container had no candidate item a lens would accept.
    NoTokenToConsume(String),
    /// `Forward`'s recursion depth cap tripped. Fatal: not absorbed by
    /// rollback, since it indicates a grammar that cannot terminate rather
    /// than an ordinary failed alternative.
    InfiniteRecursion { depth: usize },
    /// Programmer error: malformed lens construction (e.g. `Group` without
    /// a type, rebinding an already-bound `Forward`, wrong argument kinds).
    Programmer(String),
}

impl LensError {
    /// Rollback-safe errors are the ones a `tentative` scope may swallow
    /// while trying the next alternative; fatal errors always propagate.
    pub fn is_rollback_safe(&self) -> bool {
        !matches!(
            self,
            LensError::InfiniteRecursion { .. } | LensError::Programmer(_)
        )
    }
}

impl fmt::Display for LensError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LensError::NoMatch(msg) => write!(f, "no match: {msg}"),
            LensError::EndOfInput => write!(f, "end of input"),
            LensError::NoDefault(msg) => write!(f, "no default available: {msg}"),
            LensError::TooFewIterations { min, got } => {
                write!(f, "too few iterations: wanted at least {min}, got {got}")
            }
            LensError::NotFullyConsumed { remaining } => {
                write!(f, "not fully consumed, remaining: {remaining:?}")
            }
            LensError::NoTokenToConsume(msg) => write!(f, "no token to consume: {msg}"),
            LensError::InfiniteRecursion { depth } => {
                write!(
                    f,
                    "infinite recursion detected at depth {depth}; check branch ordering inside Or"
                )
            }
            LensError::Programmer(msg) => write!(f, "programmer error: {msg}"),
        }
    }
}

impl std::error::Error for LensError {}

pub type Result<T> = std::result::Result<T, LensError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rollback_safe_family() {
        assert!(LensError::EndOfInput.is_rollback_safe());
        assert!(LensError::NoDefault("x".into()).is_rollback_safe());
        assert!(LensError::TooFewIterations { min: 1, got: 0 }.is_rollback_safe());
        assert!(LensError::NotFullyConsumed { remaining: "x".into() }.is_rollback_safe());
        assert!(LensError::NoTokenToConsume("x".into()).is_rollback_safe());
        assert!(LensError::NoMatch("x".into()).is_rollback_safe());
    }

    #[test]
    fn fatal_family() {
        assert!(!LensError::InfiniteRecursion { depth: 100 }.is_rollback_safe());
        assert!(!LensError::Programmer("bad".into()).is_rollback_safe());
    }

    #[test]
    fn display_includes_context() {
        let e = LensError::TooFewIterations { min: 3, got: 1 };
        assert!(e.to_string().contains('3'));
        assert!(e.to_string().contains('1'));
    }
}
