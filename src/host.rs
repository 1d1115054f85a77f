//! Capabilities the typing core consumes from its host, and an in-process
//! host that plays the part of a timed typing test.

use crate::error::HostError;
use async_trait::async_trait;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::{sleep, Instant};

/// Timer text the host shows once the test clock has run out.
pub const ZERO_TIME: &str = "0:00";

const BACKSPACE: char = '\u{8}';

/// Host-observable typing progress.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSample {
    pub correct_count: usize,
    pub timer_text: String,
    pub result_panel_present: bool,
}

/// Destination for keystrokes. Keys land in call order.
#[async_trait]
pub trait KeySink: Send {
    /// Deliver `ch` after waiting `delay`.
    async fn emit_character(&mut self, ch: char, delay: Duration) -> Result<(), HostError>;

    /// Erase the previous character after waiting `delay`.
    async fn emit_backspace(&mut self, delay: Duration) -> Result<(), HostError>;

    /// Drop input focus once a session is over. No-op where it does not apply.
    async fn release_focus(&mut self) -> Result<(), HostError> {
        Ok(())
    }
}

/// Non-blocking read of the host's session state.
#[async_trait]
pub trait SessionProbe: Send + Sync + 'static {
    async fn sample_session_state(&self) -> Result<SessionSample, HostError>;
}

/// Supplies the ground-truth words for a test.
#[async_trait]
pub trait WordSource: Send + Sync {
    async fn word_list(&self) -> Result<Vec<String>, HostError>;
}

#[derive(Debug, Clone, Default)]
pub struct StaticWords(Vec<String>);

impl StaticWords {
    pub fn new<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(words.into_iter().map(Into::into).collect())
    }

    /// Split free text on whitespace.
    pub fn from_text(text: &str) -> Self {
        Self::new(text.split_whitespace())
    }
}

#[async_trait]
impl WordSource for StaticWords {
    async fn word_list(&self) -> Result<Vec<String>, HostError> {
        Ok(self.0.clone())
    }
}

/// Whitespace-separated words read from a text file.
#[derive(Debug, Clone)]
pub struct FileWords {
    path: PathBuf,
}

impl FileWords {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl WordSource for FileWords {
    async fn word_list(&self) -> Result<Vec<String>, HostError> {
        let text = tokio::fs::read_to_string(&self.path).await?;
        Ok(text.split_whitespace().map(str::to_string).collect())
    }
}

/// `m:ss`, rounding partial seconds up so only an expired clock reads `0:00`.
pub fn format_timer(remaining: Duration) -> String {
    let secs = remaining.as_secs() + u64::from(remaining.subsec_nanos() > 0);
    format!("{}:{:02}", secs / 60, secs % 60)
}

#[derive(Debug)]
struct HostState {
    words: Vec<String>,
    committed: Vec<bool>,
    current: String,
    keystrokes: Vec<char>,
    started_at: Option<Instant>,
    finished: bool,
    focused: bool,
    echo: bool,
    failing_samples: usize,
    disconnect_after: Option<usize>,
}

impl HostState {
    fn remaining(&self, test_length: Duration) -> Duration {
        match self.started_at {
            Some(t0) => test_length.saturating_sub(t0.elapsed()),
            None => test_length,
        }
    }

    fn accepts_input(&self, test_length: Duration) -> bool {
        !self.finished
            && self.committed.len() < self.words.len()
            && !(self.started_at.is_some() && self.remaining(test_length).is_zero())
    }

    fn check_connected(&self) -> Result<(), HostError> {
        match self.disconnect_after {
            Some(limit) if self.keystrokes.len() >= limit => Err(HostError::Disconnected),
            _ => Ok(()),
        }
    }

    fn echo(&self, text: &str) {
        if self.echo {
            let mut out = std::io::stdout().lock();
            let _ = out.write_all(text.as_bytes());
            let _ = out.flush();
        }
    }
}

/// An in-process timed typing test.
///
/// Words are committed on space and scored against the word list; the clock
/// starts on the first keystroke and input stops once it hits zero. A results
/// panel appears when every word has been committed or [`finish`] is called.
/// Clones share state, so one clone can be the key sink while another is
/// polled as the probe.
///
/// [`finish`]: SimulatedHost::finish
#[derive(Debug, Clone)]
pub struct SimulatedHost {
    state: Arc<Mutex<HostState>>,
    test_length: Duration,
}

impl SimulatedHost {
    pub fn new(words: Vec<String>, test_length: Duration) -> Self {
        Self {
            state: Arc::new(Mutex::new(HostState {
                words,
                committed: Vec::new(),
                current: String::new(),
                keystrokes: Vec::new(),
                started_at: None,
                finished: false,
                focused: true,
                echo: false,
                failing_samples: 0,
                disconnect_after: None,
            })),
            test_length,
        }
    }

    /// Mirror typed text to stdout.
    pub fn with_echo(self, echo: bool) -> Self {
        self.lock().echo = echo;
        self
    }

    /// Fail key delivery once `keys` keystrokes have landed.
    pub fn disconnect_after(&self, keys: usize) {
        self.lock().disconnect_after = Some(keys);
    }

    /// Make the next `n` state samples fail.
    pub fn fail_next_samples(&self, n: usize) {
        self.lock().failing_samples = n;
    }

    /// Show the results panel immediately.
    pub fn finish(&self) {
        self.lock().finished = true;
    }

    pub fn keystrokes(&self) -> Vec<char> {
        self.lock().keystrokes.clone()
    }

    pub fn committed_words(&self) -> usize {
        self.lock().committed.len()
    }

    pub fn correct_words(&self) -> usize {
        self.lock().committed.iter().filter(|ok| **ok).count()
    }

    pub fn is_focused(&self) -> bool {
        self.lock().focused
    }

    fn lock(&self) -> MutexGuard<'_, HostState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn press(&self, key: char) -> Result<(), HostError> {
        let mut st = self.lock();
        st.check_connected()?;
        st.keystrokes.push(key);
        if !st.accepts_input(self.test_length) {
            return Ok(());
        }
        if st.started_at.is_none() {
            st.started_at = Some(Instant::now());
        }

        match key {
            ' ' => {
                let idx = st.committed.len();
                let ok = st.words.get(idx).is_some_and(|w| *w == st.current);
                st.committed.push(ok);
                st.current.clear();
                st.echo(" ");
            }
            BACKSPACE => {
                if st.current.pop().is_some() {
                    st.echo("\u{8} \u{8}");
                }
            }
            c => {
                st.current.push(c);
                st.echo(c.encode_utf8(&mut [0; 4]));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl KeySink for SimulatedHost {
    async fn emit_character(&mut self, ch: char, delay: Duration) -> Result<(), HostError> {
        sleep(delay).await;
        self.press(ch)
    }

    async fn emit_backspace(&mut self, delay: Duration) -> Result<(), HostError> {
        sleep(delay).await;
        self.press(BACKSPACE)
    }

    async fn release_focus(&mut self) -> Result<(), HostError> {
        let mut st = self.lock();
        st.focused = false;
        st.echo("\n");
        Ok(())
    }
}

#[async_trait]
impl SessionProbe for SimulatedHost {
    async fn sample_session_state(&self) -> Result<SessionSample, HostError> {
        let mut st = self.lock();
        if st.failing_samples > 0 {
            st.failing_samples -= 1;
            return Err(HostError::Probe("state snapshot unavailable".into()));
        }
        let correct_count = st.committed.iter().filter(|ok| **ok).count();
        let all_committed = !st.words.is_empty() && st.committed.len() == st.words.len();
        Ok(SessionSample {
            correct_count,
            timer_text: format_timer(st.remaining(self.test_length)),
            result_panel_present: st.finished || all_committed,
        })
    }
}
