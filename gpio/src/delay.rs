//! Delay providers for bit-banged protocols.
//!
//! Bit-banged serial lines need waits in the microsecond range. [SpinDelay] busy-waits and is
//! the one to use for real transfers; [SleepDelay] yields to the scheduler and is only accurate to
//! the scheduler tick, which some displays tolerate.

use std::fmt::Debug;
use std::hint::spin_loop;
use std::thread::sleep;
use std::time::{Duration, Instant};

/// A blocking delay with microsecond granularity.
pub trait Delay: Debug {
    /// Blocks the calling thread for at least `us` microseconds.
    fn delay_us(&self, us: u32);

    /// Blocks the calling thread for at least `ms` milliseconds.
    fn delay_ms(&self, ms: u32) {
        for _ in 0..ms {
            self.delay_us(1000);
        }
    }
}

/// Busy-waits on [Instant] without giving up the CPU.
#[derive(Debug, Default, Copy, Clone)]
pub struct SpinDelay;

impl Delay for SpinDelay {
    fn delay_us(&self, us: u32) {
        if us == 0 {
            return;
        }
        let deadline = Instant::now() + Duration::from_micros(us as u64);
        while Instant::now() < deadline {
            spin_loop();
        }
    }
}

/// Sleeps the thread. Usually overshoots by the scheduler tick.
#[derive(Debug, Default, Copy, Clone)]
pub struct SleepDelay;

impl Delay for SleepDelay {
    fn delay_us(&self, us: u32) {
        if us == 0 {
            return;
        }
        sleep(Duration::from_micros(us as u64));
    }

    fn delay_ms(&self, ms: u32) {
        sleep(Duration::from_millis(ms as u64));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spin_delay_waits_at_least_requested_time() {
        let start = Instant::now();
        SpinDelay.delay_us(200);
        assert!(start.elapsed() >= Duration::from_micros(200));
    }

    #[test]
    fn zero_delay_returns_immediately() {
        let start = Instant::now();
        SpinDelay.delay_us(0);
        SleepDelay.delay_us(0);
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[test]
    fn sleep_delay_ms_waits_at_least_requested_time() {
        let start = Instant::now();
        SleepDelay.delay_ms(2);
        assert!(start.elapsed() >= Duration::from_millis(2));
    }
}
