use crate::cadence::{estimated_wpm, CadenceController, CadenceSettings};
use crate::config::TypingConfig;
use crate::error::HostError;
use crate::host::KeySink;
use crate::mistakes::{MistakeInjector, TypoModel};
use crate::schedule::WpmSchedule;
use crate::session::{EndReason, SessionMetrics, SessionReport};
use crate::time_series::TimeSeriesPoint;
use crate::watcher::CompletionHandle;
use chrono::Local;
use rand::Rng;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

/// Walks a word list, pacing each key through the cadence controller.
///
/// The driver checks for completion before every word and every character,
/// stops at the safety ceiling, and always produces a report; nothing in a
/// session surfaces as an error.
pub struct TypingSessionDriver<R> {
    config: TypingConfig,
    controller: CadenceController,
    injector: MistakeInjector,
    typos: Option<TypoModel>,
    rng: R,
}

impl<R: Rng> TypingSessionDriver<R> {
    pub fn new(config: &TypingConfig, rng: R) -> Self {
        let config = config.clone().validated();
        let typos = config
            .typos_enabled
            .then(|| TypoModel::new(config.typo_probability, config.typo_max_chars));
        Self {
            controller: CadenceController::new(CadenceSettings::from(&config)),
            injector: MistakeInjector::new(config.wrong_word_probability),
            typos,
            config,
            rng,
        }
    }

    pub async fn run<K: KeySink + ?Sized>(
        &mut self,
        words: &[String],
        schedule: &WpmSchedule,
        sink: &mut K,
        completion: &CompletionHandle,
    ) -> SessionReport {
        self.controller.reset();
        let started = Instant::now();
        let mut metrics = SessionMetrics::new(Local::now());
        let ceiling = self.config.safety_ceiling();
        let words_per_target = self.config.words_per_target.max(1);

        let mut target = schedule
            .target_at(0)
            .unwrap_or(self.config.default_target_wpm);
        let mut schedule_idx = 0;
        let mut end = EndReason::Completed;

        'words: for (wi, word) in words.iter().enumerate() {
            if started.elapsed() >= ceiling {
                info!(
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "safety ceiling reached"
                );
                end = EndReason::SafetyTimeout;
                break;
            }
            if completion.is_done() {
                end = EndReason::HostFinished;
                break;
            }

            if !schedule.is_empty() && wi % words_per_target == 0 {
                target = schedule.target_at(schedule_idx).unwrap_or(target);
                info!(
                    target_wpm = target,
                    word = wi + 1,
                    "target wpm from schedule"
                );
                schedule_idx += 1;
            }

            let injected = self.injector.apply(word, &mut self.rng);
            if injected.is_wrong {
                debug!(word = %injected.text, "wrong word injected");
            }

            for ch in injected.text.chars() {
                if completion.is_done() {
                    end = EndReason::HostFinished;
                    break 'words;
                }

                if let Some(burst) = self.typos.and_then(|m| m.roll(&mut self.rng)) {
                    metrics.typo_bursts += 1;
                    let typed = metrics.typed_chars;
                    let typo = self
                        .emit_typo(sink, &burst, target, started, typed, completion)
                        .await;
                    if let Err(e) = typo {
                        warn!(error = %e, "key delivery failed; ending session");
                        end = EndReason::SinkFailed;
                        break 'words;
                    }
                    if completion.is_done() {
                        end = EndReason::HostFinished;
                        break 'words;
                    }
                }

                let step = self.controller.next_delay(
                    target,
                    started.elapsed(),
                    metrics.typed_chars,
                    &mut self.rng,
                );
                trace!(
                    %ch,
                    delay_ms = step.delay_ms,
                    estimated_wpm = step.estimated_wpm,
                    factor = step.factor,
                    "key"
                );
                if let Err(e) = sink.emit_character(ch, step.delay).await {
                    warn!(error = %e, "key delivery failed; ending session");
                    end = EndReason::SinkFailed;
                    break 'words;
                }
                metrics.typed_chars += 1;
                metrics.delays_ms.push(step.delay_ms);
            }

            if completion.is_done() {
                end = EndReason::HostFinished;
                break;
            }

            let mut space_ms = self.uniform_ms(self.config.space_delay_ms);
            if self.pause_after(wi) {
                let pause = self.uniform_ms(self.config.word_pause_ms);
                debug!(pause_ms = pause, word = wi + 1, "pausing between words");
                space_ms += pause;
            }
            if let Err(e) = sink
                .emit_character(' ', Duration::from_millis(space_ms))
                .await
            {
                warn!(error = %e, "key delivery failed; ending session");
                end = EndReason::SinkFailed;
                break;
            }

            if injected.is_wrong {
                metrics.wrong_words += 1;
            } else {
                metrics.correct_words += 1;
            }

            let elapsed = started.elapsed();
            metrics.wpm_trace.push(TimeSeriesPoint::new(
                elapsed.as_secs_f64(),
                estimated_wpm(metrics.typed_chars, elapsed),
                target,
            ));
        }

        if let Err(e) = sink.release_focus().await {
            debug!(error = %e, "releasing focus failed");
        }
        metrics.elapsed = started.elapsed();

        let report = SessionReport::new(metrics, end, target, completion.snapshot());
        info!(
            estimated_wpm = %format!("{:.2}", report.final_wpm),
            target_wpm = target,
            accuracy = %format!("{:.2}", report.accuracy),
            correct = report.metrics.correct_words,
            wrong = report.metrics.wrong_words,
            end = %end,
            "session finished"
        );
        report
    }

    /// Type a burst of stray letters and erase them again. Each key is paced
    /// by the controller but none count as typed characters. Stops early once
    /// the host reports completion.
    async fn emit_typo<K: KeySink + ?Sized>(
        &mut self,
        sink: &mut K,
        burst: &str,
        target: u32,
        started: Instant,
        typed_chars: usize,
        completion: &CompletionHandle,
    ) -> Result<(), HostError> {
        trace!(burst, "typo burst");
        let keys = burst.chars().map(Some).chain(burst.chars().map(|_| None));
        for key in keys {
            if completion.is_done() {
                return Ok(());
            }
            let step = self.controller.next_delay(
                target,
                started.elapsed(),
                typed_chars,
                &mut self.rng,
            );
            match key {
                Some(ch) => sink.emit_character(ch, step.delay).await?,
                None => sink.emit_backspace(step.delay).await?,
            }
        }
        Ok(())
    }

    fn pause_after(&self, wi: usize) -> bool {
        let every = self.config.word_pause_every;
        self.config.word_pauses_enabled && every > 0 && (wi + 1) % every == 0
    }

    fn uniform_ms(&mut self, (lo, hi): (u64, u64)) -> u64 {
        self.rng.gen_range(lo.min(hi)..=hi.max(lo))
    }
}
