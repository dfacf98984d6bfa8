//! Per-provider request throttle.
//!
//! Each provider client owns one `Throttle`. A call records when it went out;
//! the next call sleeps off whatever is left of the interval first. Clients
//! never share a throttle, so their schedules are independent.

use std::thread::sleep;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct Throttle {
    last: Option<Instant>,
    interval: Duration,
}

impl Throttle {
    pub fn new(interval: Duration) -> Self {
        Self {
            last: None,
            interval,
        }
    }

    pub fn from_millis(ms: u64) -> Self {
        Self::new(Duration::from_millis(ms))
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Time left before the next call may go out.
    pub fn remaining(&self) -> Duration {
        match self.last {
            Some(last) => self.interval.saturating_sub(last.elapsed()),
            None => Duration::ZERO,
        }
    }

    /// Block until the interval since the previous call has passed, then mark
    /// this call. Returns how long it slept.
    pub fn wait(&mut self) -> Duration {
        let pause = self.remaining();
        if !pause.is_zero() {
            sleep(pause);
        }
        self.last = Some(Instant::now());
        pause
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_call_does_not_wait() {
        let mut throttle = Throttle::from_millis(1000);
        assert_eq!(throttle.remaining(), Duration::ZERO);
        assert_eq!(throttle.wait(), Duration::ZERO);
    }

    #[test]
    fn test_second_call_waits_out_interval() {
        let mut throttle = Throttle::from_millis(40);
        let start = Instant::now();
        throttle.wait();
        throttle.wait();
        assert!(start.elapsed() >= Duration::from_millis(40));
        assert!(throttle.remaining() <= throttle.interval());
    }

    #[test]
    fn test_throttles_are_independent() {
        let mut slow = Throttle::from_millis(10_000);
        let mut fast = Throttle::from_millis(0);
        slow.wait();
        fast.wait();
        assert_eq!(fast.wait(), Duration::ZERO);
        assert!(slow.remaining() > Duration::from_millis(5_000));
    }
}
