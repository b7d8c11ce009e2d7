use std::time::{Duration, Instant};

// ---------------------------------------------------------------------------
// PeriodicTask – a cancellable fixed-period timer polled by the frame loop
// ---------------------------------------------------------------------------

/// A repeating task that fires at most once per `poll`.
///
/// An overdue task fires once and re-arms one period after the poll, so a
/// stalled frame never produces a burst of catch-up ticks.
#[derive(Debug, Clone)]
pub struct PeriodicTask {
    name: &'static str,
    period: Duration,
    next_due: Option<Instant>,
    fired: u64,
}

impl PeriodicTask {
    pub fn new(name: &'static str, period: Duration) -> Self {
        Self {
            name,
            period: period.max(Duration::from_millis(1)),
            next_due: None,
            fired: 0,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Change the period; a running task re-arms from `now`.
    pub fn set_period(&mut self, period: Duration, now: Instant) {
        self.period = period.max(Duration::from_millis(1));
        if self.next_due.is_some() {
            self.next_due = Some(now + self.period);
        }
    }

    /// Start (or resume) the task. The first firing is immediate.
    pub fn start(&mut self, now: Instant) {
        if self.next_due.is_none() {
            log::debug!("{} task started, period {:?}", self.name, self.period);
            self.next_due = Some(now);
        }
    }

    /// Cancel further firings. Resuming does not replay missed periods.
    pub fn stop(&mut self) {
        if self.next_due.take().is_some() {
            log::debug!("{} task stopped after {} firings", self.name, self.fired);
        }
    }

    pub fn is_running(&self) -> bool {
        self.next_due.is_some()
    }

    /// Total firings since construction.
    pub fn fired(&self) -> u64 {
        self.fired
    }

    /// `true` when the task is due at `now`; re-arms it for the next period.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.next_due {
            Some(due) if now >= due => {
                let next = due + self.period;
                self.next_due = Some(if next > now { next } else { now + self.period });
                self.fired += 1;
                true
            }
            _ => false,
        }
    }

    /// Time until the next firing; `None` when stopped.
    pub fn time_until_due(&self, now: Instant) -> Option<Duration> {
        self.next_due.map(|due| due.saturating_duration_since(now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn test_fires_on_period() {
        let t0 = Instant::now();
        let mut task = PeriodicTask::new("read", ms(100));
        assert!(!task.poll(t0));
        task.start(t0);
        assert!(task.poll(t0));
        assert!(!task.poll(t0 + ms(50)));
        assert!(task.poll(t0 + ms(100)));
        assert!(!task.poll(t0 + ms(150)));
        assert!(task.poll(t0 + ms(205)));
        assert_eq!(task.fired(), 3);
        // Keeps the 100 ms cadence despite the late poll.
        assert_eq!(task.time_until_due(t0 + ms(205)), Some(ms(95)));
    }

    #[test]
    fn test_no_catch_up_burst() {
        let t0 = Instant::now();
        let mut task = PeriodicTask::new("tick", ms(100));
        task.start(t0);
        assert!(task.poll(t0));
        // A long stall fires once, then waits a full period.
        assert!(task.poll(t0 + ms(1000)));
        assert!(!task.poll(t0 + ms(1001)));
        assert!(task.poll(t0 + ms(1100)));
        assert_eq!(task.fired(), 3);
    }

    #[test]
    fn test_stop_and_resume() {
        let t0 = Instant::now();
        let mut task = PeriodicTask::new("tick", ms(100));
        task.start(t0);
        assert!(task.poll(t0));
        task.stop();
        assert!(!task.is_running());
        assert!(!task.poll(t0 + ms(500)));
        assert_eq!(task.time_until_due(t0), None);

        task.start(t0 + ms(500));
        assert!(task.poll(t0 + ms(500)));
        assert!(!task.poll(t0 + ms(550)));
        assert_eq!(task.fired(), 2);
    }

    #[test]
    fn test_start_is_idempotent_and_period_change() {
        let t0 = Instant::now();
        let mut task = PeriodicTask::new("read", ms(100));
        task.start(t0);
        assert!(task.poll(t0));
        task.start(t0 + ms(10));
        assert!(!task.poll(t0 + ms(10)));
        task.set_period(ms(300), t0 + ms(20));
        assert!(!task.poll(t0 + ms(100)));
        assert!(task.poll(t0 + ms(320)));
        assert_eq!(PeriodicTask::new("x", Duration::ZERO).period(), ms(1));
    }
}
