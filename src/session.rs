use crate::cadence::estimated_wpm;
use crate::config::TypingConfig;
use crate::driver::TypingSessionDriver;
use crate::host::{KeySink, SessionProbe};
use crate::runtime::FixedTicker;
use crate::schedule::WpmSchedule;
use crate::time_series::TimeSeriesPoint;
use crate::util::{mean, std_dev};
use crate::watcher::{CompletionSnapshot, CompletionWatcher};
use chrono::{DateTime, Local};
use rand::Rng;
use std::time::Duration;

/// Why the driver stopped typing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
#[strum(serialize_all = "snake_case")]
pub enum EndReason {
    /// every word was typed
    Completed,
    /// the host reported the test over
    HostFinished,
    /// the wall-clock safety ceiling was reached
    SafetyTimeout,
    /// the input target stopped accepting keys
    SinkFailed,
}

#[derive(Debug, Clone)]
pub struct SessionMetrics {
    pub typed_chars: usize,
    pub correct_words: usize,
    pub wrong_words: usize,
    pub typo_bursts: usize,
    pub started_at: DateTime<Local>,
    pub elapsed: Duration,
    pub delays_ms: Vec<f64>,
    pub wpm_trace: Vec<TimeSeriesPoint>,
}

impl SessionMetrics {
    pub fn new(started_at: DateTime<Local>) -> Self {
        Self {
            typed_chars: 0,
            correct_words: 0,
            wrong_words: 0,
            typo_bursts: 0,
            started_at,
            elapsed: Duration::ZERO,
            delays_ms: Vec::new(),
            wpm_trace: Vec::new(),
        }
    }

    pub fn words_typed(&self) -> usize {
        self.correct_words + self.wrong_words
    }

    /// Percentage of finished words typed correctly; 0 when none were finished.
    pub fn accuracy(&self) -> f64 {
        match self.words_typed() {
            0 => 0.0,
            total => self.correct_words as f64 / total as f64 * 100.0,
        }
    }

    pub fn final_wpm(&self) -> f64 {
        estimated_wpm(self.typed_chars, self.elapsed)
    }
}

#[derive(Debug, Clone)]
pub struct SessionReport {
    pub metrics: SessionMetrics,
    pub end_reason: EndReason,
    pub last_target_wpm: u32,
    pub accuracy: f64,
    pub final_wpm: f64,
    pub delay_mean_ms: Option<f64>,
    pub delay_std_dev_ms: Option<f64>,
    pub completion: CompletionSnapshot,
}

impl SessionReport {
    pub fn new(
        metrics: SessionMetrics,
        end_reason: EndReason,
        last_target_wpm: u32,
        completion: CompletionSnapshot,
    ) -> Self {
        Self {
            accuracy: metrics.accuracy(),
            final_wpm: metrics.final_wpm(),
            delay_mean_ms: mean(&metrics.delays_ms),
            delay_std_dev_ms: std_dev(&metrics.delays_ms),
            metrics,
            end_reason,
            last_target_wpm,
            completion,
        }
    }
}

/// Run one typing session against a host: start the completion watcher on the
/// configured poll period, drive the words through `sink`, then stop the
/// watcher and fold its final view into the report.
pub async fn run_session<K, P, R>(
    sink: &mut K,
    probe: P,
    words: &[String],
    schedule: &WpmSchedule,
    config: &TypingConfig,
    rng: R,
) -> SessionReport
where
    K: KeySink + ?Sized,
    P: SessionProbe,
    R: Rng,
{
    let watcher = CompletionWatcher::spawn(probe, FixedTicker::new(config.poll_interval()));
    let completion = watcher.handle();

    let mut driver = TypingSessionDriver::new(config, rng);
    let mut report = driver.run(words, schedule, sink, &completion).await;

    let state = watcher.stop().await;
    report.completion = CompletionSnapshot {
        done: state.done,
        last_correct_count: state.last_correct_count,
        last_timer_text: state.last_timer_text,
        stagnation_ms: state.stagnation_ms,
    };
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accuracy_counts_finished_words_only() {
        let mut m = SessionMetrics::new(Local::now());
        assert_eq!(m.accuracy(), 0.0);
        m.correct_words = 3;
        m.wrong_words = 1;
        assert_eq!(m.accuracy(), 75.0);
        assert_eq!(m.words_typed(), 4);
    }

    #[test]
    fn final_wpm_uses_five_char_words() {
        let mut m = SessionMetrics::new(Local::now());
        assert_eq!(m.final_wpm(), 0.0);
        m.typed_chars = 100;
        m.elapsed = Duration::from_secs(12);
        assert_eq!(m.final_wpm(), 100.0);
    }

    #[test]
    fn report_summarises_delays() {
        let mut m = SessionMetrics::new(Local::now());
        m.delays_ms = vec![100.0, 120.0];
        let report = SessionReport::new(
            m,
            EndReason::Completed,
            110,
            CompletionSnapshot::default(),
        );
        assert_eq!(report.delay_mean_ms, Some(110.0));
        assert_eq!(report.delay_std_dev_ms, Some(10.0));
        assert_eq!(report.accuracy, 0.0);
        assert_eq!(report.end_reason.to_string(), "completed");
        assert_eq!(EndReason::SafetyTimeout.to_string(), "safety_timeout");
    }
}
