use std::cell::Cell;

/// Single-flight marker for one kind of suspension point (camera, recognition, save).
#[derive(Debug, Default)]
pub struct BusyFlag {
    active: Cell<bool>,
}

impl BusyFlag {
    pub fn is_active(&self) -> bool {
        self.active.get()
    }

    /// `None` when the flag is already held.
    pub fn enter(&self) -> Option<BusyGuard<'_>> {
        if self.active.replace(true) {
            return None;
        }
        Some(BusyGuard { flag: self })
    }
}

/// Clears its flag on drop, so every exit path (success, error, early
/// return) leaves the flag cleared.
pub struct BusyGuard<'a> {
    flag: &'a BusyFlag,
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.flag.active.set(false);
    }
}
