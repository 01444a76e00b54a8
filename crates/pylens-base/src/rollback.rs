use std::any::Any;

use crate::error::Result;

/// Anything the rollback engine can snapshot and restore around a tentative
/// operation: the reader, and every container.
///
/// Each implementor owns both its concrete snapshot representation and the
/// comparison needed for the progress check, downcasting internally rather
/// than exposing its state type to callers — this keeps the trait usable
/// behind `dyn Container` while the engine itself stays generic.
pub trait Rollbackable {
    fn snapshot(&self) -> Box<dyn Any>;
    fn restore(&mut self, state: Box<dyn Any>);
    /// Compares two snapshots taken from this same target. Used by the
    /// `_progress` variants below to detect zero-width iterations.
    fn state_eq(&self, a: &dyn Any, b: &dyn Any) -> bool;
}

/// Runs `f` against `target` inside a scope that snapshots it on entry and
/// restores it if `f` fails with a rollback-safe error. Fatal errors
/// propagate with state left exactly as `f` left it (§5 cancellation
/// policy). `f` receives `target` directly rather than capturing it, so the
/// caller never holds two live mutable borrows of the same value.
pub fn tentative<T: Rollbackable, R>(
    target: &mut T,
    f: impl FnOnce(&mut T) -> Result<R>,
) -> Result<R> {
    let snap = target.snapshot();
    match f(target) {
        Ok(v) => Ok(v),
        Err(e) if e.is_rollback_safe() => {
            target.restore(snap);
            Err(e)
        }
        Err(e) => Err(e),
    }
}

/// Like [`tentative`], but over two targets at once — the common case of a
/// reader paired with the container it is feeding.
pub fn tentative_pair<A: Rollbackable, B: Rollbackable, R>(
    a: &mut A,
    b: &mut B,
    f: impl FnOnce(&mut A, &mut B) -> Result<R>,
) -> Result<R> {
    let snap_a = a.snapshot();
    let snap_b = b.snapshot();
    match f(a, b) {
        Ok(v) => Ok(v),
        Err(e) if e.is_rollback_safe() => {
            a.restore(snap_a);
            b.restore(snap_b);
            Err(e)
        }
        Err(e) => Err(e),
    }
}

/// Like [`tentative`], but also reports whether `target`'s state actually
/// changed across a *successful* call. `Repeat` uses this to stop iterating
/// once a child matches without consuming input or mutating a container —
/// the alternative is an infinite loop on a zero-width match.
pub fn tentative_progress<T: Rollbackable, R>(
    target: &mut T,
    f: impl FnOnce(&mut T) -> Result<R>,
) -> (Result<R>, bool) {
    let before = target.snapshot();
    let result = f(target);
    match result {
        Ok(v) => {
            let after = target.snapshot();
            let changed = !target.state_eq(before.as_ref(), after.as_ref());
            (Ok(v), changed)
        }
        Err(e) if e.is_rollback_safe() => {
            target.restore(before);
            (Err(e), false)
        }
        Err(e) => (Err(e), false),
    }
}

/// Two-target variant of [`tentative_progress`].
pub fn tentative_pair_progress<A: Rollbackable, B: Rollbackable, R>(
    a: &mut A,
    b: &mut B,
    f: impl FnOnce(&mut A, &mut B) -> Result<R>,
) -> (Result<R>, bool) {
    let before_a = a.snapshot();
    let before_b = b.snapshot();
    let result = f(a, b);
    match result {
        Ok(v) => {
            let changed =
                !a.state_eq(before_a.as_ref(), a.snapshot().as_ref())
                    || !b.state_eq(before_b.as_ref(), b.snapshot().as_ref());
            (Ok(v), changed)
        }
        Err(e) if e.is_rollback_safe() => {
            a.restore(before_a);
            b.restore(before_b);
            (Err(e), false)
        }
        Err(e) => (Err(e), false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LensError;
    use crate::reader::ConcreteInputReader;

    #[test]
    fn tentative_restores_on_rollback_safe_failure() {
        let mut r = ConcreteInputReader::new("abc");
        let before = r.pos();
        let result: Result<()> = tentative(&mut r, |r| {
            r.consume_char().unwrap();
            Err(LensError::NoMatch("nope".into()))
        });
        assert!(result.is_err());
        assert_eq!(r.pos(), before);
    }

    #[test]
    fn tentative_keeps_state_on_success() {
        let mut r = ConcreteInputReader::new("abc");
        let result = tentative(&mut r, |r| r.consume_char());
        assert_eq!(result.unwrap(), 'a');
        assert_eq!(r.pos(), 1);
    }

    #[test]
    fn tentative_leaves_fatal_error_state_untouched() {
        let mut r = ConcreteInputReader::new("abc");
        let result: Result<()> = tentative(&mut r, |r| {
            r.consume_char().unwrap();
            Err(LensError::Programmer("bug".into()))
        });
        assert!(result.is_err());
        assert_eq!(r.pos(), 1);
    }

    #[test]
    fn tentative_progress_detects_zero_width_match() {
        let mut r = ConcreteInputReader::new("abc");
        let (result, changed) = tentative_progress(&mut r, |_| Ok::<(), LensError>(()));
        assert!(result.is_ok());
        assert!(!changed);
    }

    #[test]
    fn tentative_progress_detects_consumption() {
        let mut r = ConcreteInputReader::new("abc");
        let (result, changed) = tentative_progress(&mut r, |r| r.consume_char());
        assert!(result.is_ok());
        assert!(changed);
    }

    #[test]
    fn tentative_pair_restores_both_targets() {
        let mut r1 = ConcreteInputReader::new("abc");
        let mut r2 = ConcreteInputReader::new("xyz");
        let result: Result<()> = tentative_pair(&mut r1, &mut r2, |a, b| {
            a.consume_char().unwrap();
            b.consume_char().unwrap();
            Err(LensError::NoMatch("nope".into()))
        });
        assert!(result.is_err());
        assert_eq!(r1.pos(), 0);
        assert_eq!(r2.pos(), 0);
    }
}
