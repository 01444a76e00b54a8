use std::cell::Cell;

thread_local! {
    /// §6 "Settings (process-wide). One flag: check_consumption (default
    /// true)". Kept as a stack-scoped thread-local rather than a bare
    /// mutable global (Design Note §9: "scope its changes via a
    /// stack-scoped override to restore the prior value on exit") so a test
    /// that disables the check can't leak that change past its own scope.
    static CHECK_CONSUMPTION: Cell<bool> = const { Cell::new(true) };
}

pub fn check_consumption() -> bool {
    CHECK_CONSUMPTION.with(|c| c.get())
}

/// Runs `f` with `check_consumption` set to `value`, restoring the prior
/// value afterward even if `f` panics.
pub fn with_check_consumption<R>(value: bool, f: impl FnOnce() -> R) -> R {
    let prev = CHECK_CONSUMPTION.with(|c| c.replace(value));
    struct Restore(bool);
    impl Drop for Restore {
        fn drop(&mut self) {
            CHECK_CONSUMPTION.with(|c| c.set(self.0));
        }
    }
    let _restore = Restore(prev);
    f()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_true() {
        assert!(check_consumption());
    }

    #[test]
    fn scoped_override_restores_prior_value() {
        assert!(check_consumption());
        with_check_consumption(false, || {
            assert!(!check_consumption());
        });
        assert!(check_consumption());
    }
}
