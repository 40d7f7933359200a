#![allow(unused_macros)]

/// Helper macro for locking items, mapping a poisoned mutex to [`crate::Error::LockError`]
///
/// ```rust, ignore
///  let mut data = lock!(my_mutex);
///  data.some_field = 42;
/// ```
macro_rules! lock {
    ($lock:expr) => {
        $lock.lock().map_err(|_| crate::Error::LockError)?
    };
}

/// Helper macro for blocking on a condition variable while holding a guard
///
/// ```rust, ignore
///  let mut guard = lock!(state);
///  guard = wait!(condvar, guard);
/// ```
macro_rules! wait {
    ($condvar:expr, $guard:expr) => {
        $condvar.wait($guard).map_err(|_| crate::Error::LockError)?
    };
}
