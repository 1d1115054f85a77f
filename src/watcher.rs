use crate::host::{SessionProbe, SessionSample, ZERO_TIME};
use crate::runtime::Ticker;
use std::time::Duration;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Watcher bookkeeping, owned by the poll task.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompletionState {
    pub done: bool,
    pub last_correct_count: usize,
    pub last_timer_text: String,
    pub last_sample_count: usize,
    /// Time since the correct count last grew. Informational only.
    pub stagnation_ms: u64,
    pub ticks: u64,
    pub failed_samples: u64,
}

impl CompletionState {
    /// Fold in one sample. Returns `true` on the transition to done; once done
    /// the flag never clears.
    pub fn observe(&mut self, sample: &SessionSample, tick: Duration) -> bool {
        self.ticks += 1;
        if sample.correct_count > self.last_sample_count {
            self.last_sample_count = sample.correct_count;
            self.stagnation_ms = 0;
        } else {
            self.stagnation_ms += tick.as_millis() as u64;
        }
        self.last_correct_count = sample.correct_count;
        self.last_timer_text.clone_from(&sample.timer_text);

        let finished = sample.timer_text == ZERO_TIME || sample.result_panel_present;
        let newly_done = finished && !self.done;
        self.done |= finished;
        newly_done
    }

    pub fn snapshot(&self) -> CompletionSnapshot {
        CompletionSnapshot {
            done: self.done,
            last_correct_count: self.last_correct_count,
            last_timer_text: self.last_timer_text.clone(),
            stagnation_ms: self.stagnation_ms,
        }
    }
}

/// What the driver sees of the watcher.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompletionSnapshot {
    pub done: bool,
    pub last_correct_count: usize,
    pub last_timer_text: String,
    pub stagnation_ms: u64,
}

/// Cheap, never-blocking view of the latest watcher snapshot.
#[derive(Debug, Clone)]
pub struct CompletionHandle {
    rx: watch::Receiver<CompletionSnapshot>,
}

impl CompletionHandle {
    /// A handle with no watcher behind it; it never reports done.
    pub fn detached() -> Self {
        let (_tx, rx) = watch::channel(CompletionSnapshot::default());
        Self { rx }
    }

    #[cfg(test)]
    pub(crate) fn from_receiver(rx: watch::Receiver<CompletionSnapshot>) -> Self {
        Self { rx }
    }

    pub fn is_done(&self) -> bool {
        self.rx.borrow().done
    }

    pub fn snapshot(&self) -> CompletionSnapshot {
        self.rx.borrow().clone()
    }
}

/// Polls a [`SessionProbe`] on a fixed tick until the host reports the test
/// is over or the watcher is stopped.
pub struct CompletionWatcher {
    handle: CompletionHandle,
    stop: Option<oneshot::Sender<()>>,
    task: JoinHandle<CompletionState>,
}

impl CompletionWatcher {
    pub fn spawn<P: SessionProbe, T: Ticker>(probe: P, ticker: T) -> Self {
        let (tx, rx) = watch::channel(CompletionSnapshot::default());
        let (stop_tx, stop_rx) = oneshot::channel();
        let task = tokio::spawn(poll_loop(probe, ticker, tx, stop_rx));
        Self {
            handle: CompletionHandle { rx },
            stop: Some(stop_tx),
            task,
        }
    }

    pub fn handle(&self) -> CompletionHandle {
        self.handle.clone()
    }

    /// Stop polling and return the final watcher state.
    pub async fn stop(mut self) -> CompletionState {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        let last = self.handle.snapshot();
        match (&mut self.task).await {
            Ok(state) => state,
            Err(e) => {
                debug!(error = %e, "completion watcher task ended abnormally");
                CompletionState {
                    done: last.done,
                    last_correct_count: last.last_correct_count,
                    last_timer_text: last.last_timer_text,
                    stagnation_ms: last.stagnation_ms,
                    ..CompletionState::default()
                }
            }
        }
    }
}

async fn poll_loop<P: SessionProbe, T: Ticker>(
    probe: P,
    ticker: T,
    tx: watch::Sender<CompletionSnapshot>,
    mut stop: oneshot::Receiver<()>,
) -> CompletionState {
    let tick = ticker.interval();
    let mut iv = ticker.start();
    let mut state = CompletionState::default();

    loop {
        tokio::select! {
            biased;
            _ = &mut stop => break,
            _ = iv.tick() => {}
        }

        match probe.sample_session_state().await {
            Ok(sample) => {
                if state.observe(&sample, tick) {
                    info!(
                        correct = state.last_correct_count,
                        timer = %state.last_timer_text,
                        results_panel = sample.result_panel_present,
                        "host reports session finished"
                    );
                }
                tx.send_replace(state.snapshot());
            }
            Err(e) => {
                state.failed_samples += 1;
                debug!(error = %e, "session state sample failed; retrying next tick");
            }
        }

        if state.done {
            break;
        }
    }
    state
}
