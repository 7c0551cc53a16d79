use std::time::Duration;

/// Suspends the driving thread between fill and poll rounds.
pub trait Sleeper {
    fn sleep(&mut self, duration: Duration);
}

/// Sleeps the current OS thread.
#[derive(Clone, Copy, Debug, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&mut self, duration: Duration) {
        if !duration.is_zero() {
            std::thread::sleep(duration);
        }
    }
}
