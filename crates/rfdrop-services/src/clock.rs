//! Sleep abstraction used by every poll loop.

use std::cell::{Cell, RefCell};
use std::time::Duration;

pub trait Clock {
    fn sleep(&self, duration: Duration);
}

impl<C: Clock + ?Sized> Clock for &C {
    fn sleep(&self, duration: Duration) {
        (**self).sleep(duration)
    }
}

/// Real wall-clock sleeping.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Records sleeps instead of performing them.
///
/// An optional hook runs on every sleep so tests can change the world
/// between polls (release a button, deliver a packet).
#[derive(Default)]
pub struct ManualClock {
    slept: Cell<Duration>,
    sleeps: Cell<u64>,
    hook: RefCell<Option<Box<dyn FnMut(u64)>>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `hook(n)` on the n-th sleep (1-based).
    pub fn with_hook(hook: impl FnMut(u64) + 'static) -> Self {
        let clock = Self::default();
        *clock.hook.borrow_mut() = Some(Box::new(hook));
        clock
    }

    /// Total simulated time slept.
    pub fn elapsed(&self) -> Duration {
        self.slept.get()
    }

    /// Number of sleep calls.
    pub fn sleeps(&self) -> u64 {
        self.sleeps.get()
    }
}

impl Clock for ManualClock {
    fn sleep(&self, duration: Duration) {
        self.slept.set(self.slept.get() + duration);
        let n = self.sleeps.get() + 1;
        self.sleeps.set(n);
        if let Some(hook) = self.hook.borrow_mut().as_mut() {
            hook(n);
        }
    }
}
