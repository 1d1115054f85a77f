//! Per-character delay control.
//!
//! The controller turns a target WPM into the pause before each keystroke. It
//! keeps a PID error state against the live WPM estimate and always computes
//! the bounded correction factor; whether that factor shapes the emitted delay
//! is an explicit setting (`apply_correction`). With it off the delay is the
//! base per-character interval plus jitter, which is how the reference typist
//! behaves.

use crate::config::TypingConfig;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Characters per word for rate computations.
pub const CHARS_PER_WORD: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PidGains {
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
}

impl Default for PidGains {
    fn default() -> Self {
        Self {
            kp: 0.12,
            ki: 0.025,
            kd: 0.08,
        }
    }
}

/// Instantaneous WPM from the characters typed so far. Zero before any time
/// has passed.
pub fn estimated_wpm(typed_chars: usize, elapsed: Duration) -> f64 {
    let minutes = elapsed.as_secs_f64() / 60.0;
    if minutes <= 0.0 {
        return 0.0;
    }
    (typed_chars as f64 / CHARS_PER_WORD) / minutes
}

/// Milliseconds per character at `target_wpm`.
pub fn base_delay_ms(target_wpm: u32) -> f64 {
    60_000.0 / (target_wpm.max(1) as f64 * CHARS_PER_WORD)
}

/// `1 + kP·e + kI·∫e + kD·Δe`, clamped to `bounds`.
pub fn correction_factor(
    gains: &PidGains,
    error: f64,
    integral: f64,
    derivative: f64,
    bounds: (f64, f64),
) -> f64 {
    let raw = 1.0 + gains.kp * error + gains.ki * integral + gains.kd * derivative;
    if raw.is_nan() {
        return 1.0;
    }
    raw.max(bounds.0).min(bounds.1)
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ControllerState {
    pub integral_error: f64,
    pub previous_error: f64,
}

impl ControllerState {
    /// Fold one error sample in and return `(integral, derivative)`.
    pub fn update(&mut self, error: f64) -> (f64, f64) {
        self.integral_error += error;
        let derivative = error - self.previous_error;
        self.previous_error = error;
        (self.integral_error, derivative)
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CadenceSettings {
    pub gains: PidGains,
    pub factor_clamp: (f64, f64),
    pub jitter_ms: (u64, u64),
    pub delay_clamp_ms: (f64, f64),
    pub apply_correction: bool,
}

impl From<&TypingConfig> for CadenceSettings {
    fn from(cfg: &TypingConfig) -> Self {
        Self {
            gains: cfg.gains,
            factor_clamp: cfg.factor_clamp,
            jitter_ms: cfg.jitter_ms,
            delay_clamp_ms: cfg.delay_clamp_ms,
            apply_correction: cfg.apply_pid_correction,
        }
    }
}

impl Default for CadenceSettings {
    fn default() -> Self {
        Self::from(&TypingConfig::default())
    }
}

/// One controller decision, with the diagnostics that produced it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CadenceStep {
    pub delay: Duration,
    pub delay_ms: f64,
    pub estimated_wpm: f64,
    pub error: f64,
    pub factor: f64,
}

#[derive(Debug, Clone)]
pub struct CadenceController {
    settings: CadenceSettings,
    state: ControllerState,
}

impl CadenceController {
    pub fn new(settings: CadenceSettings) -> Self {
        Self {
            settings,
            state: ControllerState::default(),
        }
    }

    pub fn settings(&self) -> &CadenceSettings {
        &self.settings
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    pub fn reset(&mut self) {
        self.state.reset();
    }

    /// Delay before the next character. Called once per character typed.
    pub fn next_delay<R: Rng + ?Sized>(
        &mut self,
        target_wpm: u32,
        elapsed: Duration,
        typed_chars: usize,
        rng: &mut R,
    ) -> CadenceStep {
        let estimated = estimated_wpm(typed_chars, elapsed);
        let error = target_wpm as f64 - estimated;
        let (integral, derivative) = self.state.update(error);
        let factor = correction_factor(
            &self.settings.gains,
            error,
            integral,
            derivative,
            self.settings.factor_clamp,
        );

        let mut base = base_delay_ms(target_wpm);
        if self.settings.apply_correction {
            // behind target means factor > 1, so the interval shrinks
            base /= factor;
        }

        let (jlo, jhi) = self.settings.jitter_ms;
        let jitter = rng.gen_range(jlo.min(jhi)..=jhi.max(jlo)) as f64;
        let (lo, hi) = self.settings.delay_clamp_ms;
        let delay_ms = (base + jitter).max(lo).min(hi);

        CadenceStep {
            delay: Duration::from_secs_f64(delay_ms / 1000.0),
            delay_ms,
            estimated_wpm: estimated,
            error,
            factor,
        }
    }
}

impl Default for CadenceController {
    fn default() -> Self {
        Self::new(CadenceSettings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_estimated_wpm_is_zero_without_elapsed_time() {
        assert_eq!(estimated_wpm(0, Duration::ZERO), 0.0);
        assert_eq!(estimated_wpm(500, Duration::ZERO), 0.0);
    }

    #[test]
    fn test_estimated_wpm() {
        // 50 chars = 10 words in six seconds
        assert_eq!(estimated_wpm(50, Duration::from_secs(6)), 100.0);
        assert_eq!(estimated_wpm(0, Duration::from_secs(6)), 0.0);
    }

    #[test]
    fn test_base_delay() {
        assert_eq!(base_delay_ms(120), 100.0);
        assert_eq!(base_delay_ms(100), 120.0);
        assert_eq!(base_delay_ms(0), 12_000.0);
    }

    #[test]
    fn test_delay_always_within_clamp() {
        let mut rng = StdRng::seed_from_u64(8);
        let mut ctl = CadenceController::default();
        let targets = [1, 10, 50, 85, 110, 150, 400, 10_000, u32::MAX];
        let elapsed = [
            Duration::ZERO,
            Duration::from_millis(1),
            Duration::from_secs(1),
            Duration::from_secs(60),
            Duration::from_secs(86_400),
        ];
        let typed = [0usize, 1, 500, 1_000_000];
        for target in targets {
            for e in elapsed {
                for t in typed {
                    let step = ctl.next_delay(target, e, t, &mut rng);
                    assert!(step.delay_ms.is_finite());
                    assert!(
                        (8.0..=220.0).contains(&step.delay_ms),
                        "target={target} elapsed={e:?} typed={t} -> {}",
                        step.delay_ms
                    );
                    assert_eq!(step.delay, Duration::from_secs_f64(step.delay_ms / 1000.0));
                }
            }
        }
    }

    #[test]
    fn test_factor_is_computed_but_not_applied_by_default() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut ctl = CadenceController::default();
        assert!(!ctl.settings().apply_correction);
        let base = base_delay_ms(110);
        for _ in 0..200 {
            let step = ctl.next_delay(110, Duration::from_secs(1), 0, &mut rng);
            assert_eq!(step.factor, 2.2);
            let jitter = step.delay_ms - base;
            assert!((4.0..=20.0).contains(&jitter), "jitter {jitter}");
        }
    }

    #[test]
    fn test_factor_speeds_up_cadence_when_applied() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut ctl = CadenceController::new(CadenceSettings {
            apply_correction: true,
            ..CadenceSettings::default()
        });
        let base = base_delay_ms(110);
        let step = ctl.next_delay(110, Duration::from_secs(1), 0, &mut rng);
        assert_eq!(step.factor, 2.2);
        assert!(step.delay_ms < base);
        assert!(step.delay_ms >= base / 2.2 + 4.0 - 1e-9);
        assert!(step.delay_ms <= base / 2.2 + 20.0 + 1e-9);
    }

    #[test]
    fn test_factor_slows_down_when_ahead_of_target() {
        let mut rng = StdRng::seed_from_u64(4);
        let mut ctl = CadenceController::new(CadenceSettings {
            apply_correction: true,
            ..CadenceSettings::default()
        });
        // 1000 chars in one minute = 200 wpm against a 100 wpm target
        let step = ctl.next_delay(100, Duration::from_secs(60), 1_000, &mut rng);
        assert_eq!(step.error, -100.0);
        assert_eq!(step.factor, 0.4);
        assert_eq!(step.delay_ms, 220.0);
    }

    #[test]
    fn test_correction_factor_bounds() {
        let gains = PidGains::default();
        let bounds = (0.4, 2.2);
        assert_eq!(correction_factor(&gains, 0.0, 0.0, 0.0, bounds), 1.0);
        assert_eq!(correction_factor(&gains, 500.0, 500.0, 0.0, bounds), 2.2);
        assert_eq!(correction_factor(&gains, -500.0, -500.0, 0.0, bounds), 0.4);
        assert_eq!(correction_factor(&gains, f64::NAN, 0.0, 0.0, bounds), 1.0);
        let mild = correction_factor(&gains, 1.0, 1.0, 1.0, bounds);
        assert!((mild - 1.225).abs() < 1e-12);
    }

    #[test]
    fn test_state_accumulates_and_resets() {
        let mut rng = StdRng::seed_from_u64(2);
        let mut ctl = CadenceController::default();

        ctl.next_delay(100, Duration::ZERO, 0, &mut rng);
        assert_eq!(ctl.state().integral_error, 100.0);
        assert_eq!(ctl.state().previous_error, 100.0);

        // 10 chars in 1.2s = 100 wpm, no error
        let step = ctl.next_delay(100, Duration::from_millis(1_200), 10, &mut rng);
        assert!(step.error.abs() < 1e-9);
        assert!((ctl.state().integral_error - 100.0).abs() < 1e-9);

        ctl.reset();
        assert_eq!(ctl.state(), ControllerState::default());
    }

    #[test]
    fn test_controller_state_update() {
        let mut state = ControllerState::default();
        assert_eq!(state.update(10.0), (10.0, 10.0));
        assert_eq!(state.update(4.0), (14.0, -6.0));
        assert_eq!(state.update(4.0), (18.0, 0.0));
    }
}
