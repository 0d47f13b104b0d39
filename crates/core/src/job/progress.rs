//! Two-phase progress remapping.
//!
//! Engine load progress fills the first 10% of the displayed value and
//! processing progress the remaining 90%, so a cold engine shows movement
//! instead of a stall.

use tokio::sync::watch;

use super::types::{JobId, JobProgress, JobState};

/// Share of the displayed range given to engine loading.
pub const LOAD_SHARE: f64 = 10.0;

/// Share of the displayed range given to processing.
pub const RUN_SHARE: f64 = 90.0;

/// Highest value shown before the job has succeeded.
pub const RUNNING_CAP: f64 = 99.0;

/// Maps raw engine progress onto a monotonic 0-100 scale.
#[derive(Debug, Clone, Default)]
pub struct ProgressMapper {
    last: f64,
}

impl ProgressMapper {
    pub fn new() -> Self {
        Self::default()
    }

    /// The last displayed value.
    pub fn current(&self) -> f64 {
        self.last
    }

    /// Engine load progress, raw 0-100.
    pub fn load(&mut self, raw_percent: f64) -> f64 {
        if !raw_percent.is_finite() {
            return self.last;
        }
        self.advance(raw_percent.clamp(0.0, 100.0).min(LOAD_SHARE))
    }

    /// Processing progress, raw 0-1.
    pub fn run(&mut self, ratio: f64) -> f64 {
        if !ratio.is_finite() {
            return self.last;
        }
        self.advance(LOAD_SHARE + ratio.clamp(0.0, 1.0) * RUN_SHARE)
    }

    /// Marks the job as finished.
    pub fn complete(&mut self) -> f64 {
        self.last = 100.0;
        self.last
    }

    fn advance(&mut self, value: f64) -> f64 {
        let value = value.min(RUNNING_CAP);
        if value > self.last {
            self.last = value;
        }
        self.last
    }
}

/// Publishes a job's state and mapped progress.
///
/// Each publish replaces the previous value, so a slow consumer skips
/// intermediate ticks but always sees the latest one, including the
/// terminal state.
#[derive(Debug)]
pub struct ProgressSink {
    job_id: JobId,
    state: JobState,
    mapper: ProgressMapper,
    tx: watch::Sender<JobProgress>,
}

impl ProgressSink {
    pub fn new(job_id: JobId, tx: watch::Sender<JobProgress>) -> Self {
        Self {
            job_id,
            state: JobState::Pending,
            mapper: ProgressMapper::new(),
            tx,
        }
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    pub fn percent(&self) -> f64 {
        self.mapper.current()
    }

    /// Moves to `state` and publishes it.
    pub fn enter(&mut self, state: JobState) {
        self.state = state;
        match state {
            JobState::Running => {
                self.mapper.run(0.0);
            }
            JobState::Succeeded => {
                self.mapper.complete();
            }
            _ => {}
        }
        self.publish();
    }

    pub fn load(&mut self, raw_percent: f64) {
        let before = self.mapper.current();
        if self.mapper.load(raw_percent) > before {
            self.publish();
        }
    }

    pub fn run(&mut self, ratio: f64) {
        let before = self.mapper.current();
        if self.mapper.run(ratio) > before {
            self.publish();
        }
    }

    fn publish(&self) {
        self.tx.send_replace(JobProgress {
            job_id: self.job_id,
            state: self.state,
            percent: self.mapper.current(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_phase_is_capped_at_ten() {
        let mut mapper = ProgressMapper::new();
        assert_eq!(mapper.load(4.0), 4.0);
        assert_eq!(mapper.load(50.0), 10.0);
        assert_eq!(mapper.load(100.0), 10.0);
    }

    #[test]
    fn test_run_phase_remap() {
        let mut mapper = ProgressMapper::new();
        assert_eq!(mapper.run(0.0), 10.0);
        assert_eq!(mapper.run(0.5), 55.0);
        assert!((mapper.run(0.9) - 91.0).abs() < 1e-9);
    }

    #[test]
    fn test_never_decreases() {
        let mut mapper = ProgressMapper::new();
        mapper.run(0.5);
        assert_eq!(mapper.run(0.2), 55.0);
        assert_eq!(mapper.load(3.0), 55.0);
    }

    #[test]
    fn test_hundred_only_on_complete() {
        let mut mapper = ProgressMapper::new();
        assert_eq!(mapper.run(1.0), RUNNING_CAP);
        assert_eq!(mapper.run(7.0), RUNNING_CAP);
        assert_eq!(mapper.complete(), 100.0);
    }

    #[test]
    fn test_ignores_non_finite_input() {
        let mut mapper = ProgressMapper::new();
        mapper.run(0.5);
        assert_eq!(mapper.run(f64::NAN), 55.0);
        assert_eq!(mapper.load(f64::INFINITY), 55.0);
    }

    fn channel(job_id: JobId) -> (watch::Sender<JobProgress>, watch::Receiver<JobProgress>) {
        watch::channel(JobProgress::pending(job_id))
    }

    #[test]
    fn test_sink_publishes_increases_only() {
        let job_id = JobId::new();
        let (tx, mut rx) = channel(job_id);
        let mut sink = ProgressSink::new(job_id, tx);

        sink.enter(JobState::LoadingEngine);
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().percent, 0.0);

        sink.load(5.0);
        assert_eq!(rx.borrow_and_update().percent, 5.0);

        sink.load(5.0);
        assert!(!rx.has_changed().unwrap());

        sink.enter(JobState::Running);
        sink.run(0.5);
        sink.run(0.4);
        let latest = *rx.borrow_and_update();
        assert_eq!(latest.state, JobState::Running);
        assert_eq!(latest.percent, 55.0);
    }

    #[test]
    fn test_unread_ticks_are_replaced_by_terminal_state() {
        let job_id = JobId::new();
        let (tx, mut rx) = channel(job_id);
        let mut sink = ProgressSink::new(job_id, tx);

        sink.enter(JobState::LoadingEngine);
        sink.load(8.0);
        sink.enter(JobState::Running);
        for step in 1..=10 {
            sink.run(f64::from(step) / 10.0);
        }
        sink.enter(JobState::Succeeded);
        drop(sink);

        // Only the newest value is held, and it survives the sender closing
        let latest = *rx.borrow_and_update();
        assert_eq!(latest.job_id, job_id);
        assert_eq!(latest.state, JobState::Succeeded);
        assert_eq!(latest.percent, 100.0);
    }
}
