//! Step scheduling: which steps are sampled and what they fetch.

use std::sync::Arc;

use tracing::debug;

use crate::config::{MonitorConfig, SelectionPolicy};

/// The scheduling decision for one training step.
///
/// `selected` is non-empty exactly when the step is monitored, so the
/// decision can be handed to the execution engine as the fetch request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepContext {
    /// Training step index.
    pub step: u64,
    /// Tensors to fetch alongside the training update, in candidate order.
    pub selected: Vec<String>,
}

impl StepContext {
    /// A step that fetches nothing.
    pub fn idle(step: u64) -> Self {
        Self {
            step,
            selected: Vec::new(),
        }
    }

    /// Whether the step is sampled.
    pub fn is_monitored(&self) -> bool {
        !self.selected.is_empty()
    }

    /// Whether `name` was requested for this step.
    pub fn requests(&self, name: &str) -> bool {
        self.selected.iter().any(|s| s == name)
    }
}

/// Decides, before a step runs, whether to sample it.
///
/// `decide` is a pure function of the step index and the configuration;
/// the scheduler holds no mutable state, so out-of-order or repeated calls
/// cannot corrupt it.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use sparsewatch_sdk::{MonitorConfig, StepScheduler};
///
/// let config = MonitorConfig::builder()
///     .interval(10)
///     .period(3)
///     .candidates(["conv1", "conv2"])
///     .build()
///     .unwrap();
/// let scheduler = StepScheduler::new(Arc::new(config));
///
/// assert!(scheduler.decide(0).is_monitored());
/// assert!(!scheduler.decide(5).is_monitored());
/// assert_eq!(scheduler.decide(20).selected, vec!["conv1", "conv2"]);
/// ```
#[derive(Debug, Clone)]
pub struct StepScheduler {
    config: Arc<MonitorConfig>,
}

impl StepScheduler {
    /// Create a scheduler over a shared configuration.
    pub fn new(config: Arc<MonitorConfig>) -> Self {
        Self { config }
    }

    /// The configuration this scheduler reads.
    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Whether `step` is sampled.
    pub fn is_monitored_step(&self, step: u64) -> bool {
        self.config.is_enabled() && step % self.config.interval() == 0
    }

    /// Index of the sample taken at `step` (0 for step 0, 1 for the next
    /// monitored step, ...). Only meaningful for monitored steps.
    pub fn sample_index(&self, step: u64) -> u64 {
        step / self.config.interval()
    }

    /// First monitored step strictly after `step`, `None` when disabled or
    /// on overflow.
    pub fn next_monitored_step(&self, step: u64) -> Option<u64> {
        if !self.config.is_enabled() {
            return None;
        }
        let interval = self.config.interval();
        (step / interval).checked_add(1)?.checked_mul(interval)
    }

    /// Decide what to fetch for `step`.
    pub fn decide(&self, step: u64) -> StepContext {
        if !self.is_monitored_step(step) {
            return StepContext::idle(step);
        }

        let selected = self.select(step);
        debug!(step, tensors = selected.len(), "monitored step");
        StepContext { step, selected }
    }

    fn select(&self, step: u64) -> Vec<String> {
        let candidates = self.config.candidates();
        match self.config.selection() {
            SelectionPolicy::All => candidates.to_vec(),
            SelectionPolicy::RoundRobin { per_step } => {
                let len = candidates.len();
                let take = per_step.min(len);
                // Offsets are reduced mod len first so the product cannot overflow.
                let sample = (self.sample_index(step) % len as u64) as usize;
                let start = (sample * (per_step % len)) % len;
                (0..take).map(|i| candidates[(start + i) % len].clone()).collect()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Mode;

    fn scheduler(interval: u64, selection: SelectionPolicy) -> StepScheduler {
        let config = MonitorConfig::builder()
            .interval(interval)
            .period(3)
            .candidates(["a", "b", "c", "d", "e"])
            .selection(selection)
            .build()
            .unwrap();
        StepScheduler::new(Arc::new(config))
    }

    #[test]
    fn step_zero_is_always_monitored() {
        for interval in [1, 2, 7, 1000] {
            assert!(scheduler(interval, SelectionPolicy::All).decide(0).is_monitored());
        }
    }

    #[test]
    fn interval_ten_monitors_multiples_of_ten() {
        let s = scheduler(10, SelectionPolicy::All);
        let monitored: Vec<u64> = (0..35).filter(|&step| s.decide(step).is_monitored()).collect();
        assert_eq!(monitored, vec![0, 10, 20, 30]);
    }

    #[test]
    fn unmonitored_steps_fetch_nothing() {
        let ctx = scheduler(10, SelectionPolicy::All).decide(11);
        assert_eq!(ctx, StepContext::idle(11));
        assert!(!ctx.is_monitored());
    }

    #[test]
    fn all_policy_selects_every_candidate_in_order() {
        let ctx = scheduler(4, SelectionPolicy::All).decide(8);
        assert_eq!(ctx.selected, vec!["a", "b", "c", "d", "e"]);
        assert!(ctx.requests("c"));
        assert!(!ctx.requests("z"));
    }

    #[test]
    fn round_robin_rotates_through_candidates() {
        let s = scheduler(10, SelectionPolicy::RoundRobin { per_step: 2 });
        assert_eq!(s.decide(0).selected, vec!["a", "b"]);
        assert_eq!(s.decide(10).selected, vec!["c", "d"]);
        assert_eq!(s.decide(20).selected, vec!["e", "a"]);
        assert_eq!(s.decide(30).selected, vec!["b", "c"]);
        assert!(!s.decide(15).is_monitored());
    }

    #[test]
    fn round_robin_larger_than_candidates_selects_all() {
        let s = scheduler(1, SelectionPolicy::RoundRobin { per_step: 9 });
        assert_eq!(s.decide(3).selected.len(), 5);
    }

    #[test]
    fn disabled_mode_never_monitors() {
        let config = MonitorConfig::builder()
            .mode(Mode::Disabled)
            .interval(1)
            .candidates(["a"])
            .build()
            .unwrap();
        let s = StepScheduler::new(Arc::new(config));
        assert!((0..100).all(|step| !s.decide(step).is_monitored()));
        assert_eq!(s.next_monitored_step(0), None);
    }

    #[test]
    fn next_monitored_step_rounds_up() {
        let s = scheduler(10, SelectionPolicy::All);
        assert_eq!(s.next_monitored_step(0), Some(10));
        assert_eq!(s.next_monitored_step(9), Some(10));
        assert_eq!(s.next_monitored_step(10), Some(20));
        assert_eq!(s.next_monitored_step(u64::MAX), None);
    }

    #[test]
    fn decide_is_pure() {
        let s = scheduler(3, SelectionPolicy::RoundRobin { per_step: 3 });
        let first = s.decide(9);
        let _ = s.decide(3);
        assert_eq!(s.decide(9), first);
    }

    #[derive(Clone, Default)]
    struct Captured(Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn decide_with_max_level(level: tracing::Level, step: u64) -> String {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(level)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        tracing::subscriber::with_default(subscriber, || {
            scheduler(10, SelectionPolicy::All).decide(step);
        });
        let bytes = captured.0.lock().unwrap().clone();
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn monitored_decision_is_logged_at_debug() {
        let logs = decide_with_max_level(tracing::Level::DEBUG, 20);
        assert!(logs.contains("DEBUG"));
        assert!(logs.contains("monitored step"));
        assert!(logs.contains("tensors=5"));

        assert!(decide_with_max_level(tracing::Level::INFO, 20).is_empty());
        assert!(decide_with_max_level(tracing::Level::DEBUG, 21).is_empty());
    }
}
