//! Release discipline shared by everything that owns a registration.
//!
//! Owners release explicitly with [`Release::release`] or through [`scoped`].
//! Dropping an owner that was never released still frees the registration,
//! but logs a leak warning and counts as an outstanding release until then.
//! [`outstanding`] reports how many unreleased owners are alive on the
//! current thread.

use std::cell::Cell;

use tracing::warn;

thread_local! {
    static OUTSTANDING: Cell<usize> = const { Cell::new(0) };
}

/// Something that holds a registration until released.
pub trait Release {
    /// Free the registration. Calling it again is a no-op.
    fn release(&mut self);

    fn is_released(&self) -> bool;
}

/// Number of live, unreleased owners created on this thread.
pub fn outstanding() -> usize {
    OUTSTANDING.with(Cell::get)
}

pub(crate) fn acquired() {
    OUTSTANDING.with(|n| n.set(n.get() + 1));
}

pub(crate) fn released() {
    OUTSTANDING.with(|n| n.set(n.get().saturating_sub(1)));
}

/// Warn that `kind` named `name` reached drop without an explicit release.
pub(crate) fn report_leak(kind: &str, name: &str) {
    warn!(
        target: "liru::leak",
        name,
        "{kind} '{name}' was not explicitly released; releasing on drop"
    );
}

struct ReleaseOnExit<'a, R: Release> {
    resource: &'a mut R,
}

impl<R: Release> Drop for ReleaseOnExit<'_, R> {
    fn drop(&mut self) {
        self.resource.release();
    }
}

/// Run `f` with `resource`, then release it however `f` exits: normal
/// return, an `Err` it returns, or a panic unwinding through it.
pub fn scoped<R: Release, T>(resource: &mut R, f: impl FnOnce(&mut R) -> T) -> T {
    let mut guard = ReleaseOnExit { resource };
    f(&mut *guard.resource)
}
