use clap::ValueEnum;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Words typed under one target before the schedule advances.
pub const WORDS_PER_TARGET: usize = 12;

/// Extra entries past the last advance point so a schedule never runs dry early.
const SCHEDULE_PADDING: usize = 5;

/// Typing style used to shape a session's WPM trajectory.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    ValueEnum,
    Serialize,
    Deserialize,
    strum_macros::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Preset {
    /// human, 100-115 wpm
    #[default]
    Normal,
    /// starts at 110 wpm and tires down to 90
    Fatigue,
    /// practiced typist, 130-145 wpm
    Fast,
    /// loose natural feel, 100-140 wpm
    Random,
    /// fast start, steady middle, slow end
    Gamer,
    /// 85-100 wpm
    Beginner,
    /// competition profile: mostly 120-130 with occasional spikes up to 150
    Spike,
}

impl Preset {
    /// Target WPM for schedule entry `idx`.
    pub fn target_for<R: Rng + ?Sized>(self, idx: usize, rng: &mut R) -> u32 {
        match self {
            Preset::Normal => rng.gen_range(100..=115),
            Preset::Fatigue => fatigue_target(idx),
            Preset::Fast => rng.gen_range(130..=145),
            Preset::Random => rng.gen_range(100..=140),
            Preset::Gamer => match idx {
                0..=2 => rng.gen_range(135..=145),
                3..=6 => rng.gen_range(120..=125),
                _ => rng.gen_range(110..=115),
            },
            Preset::Beginner => rng.gen_range(85..=100),
            Preset::Spike => spike_target(rng),
        }
    }
}

fn fatigue_target(idx: usize) -> u32 {
    // 110 minus one per block of four, floored at 90
    let decay = (idx / 4).min(20) as u32;
    (110 - decay).max(90)
}

fn spike_target<R: Rng + ?Sized>(rng: &mut R) -> u32 {
    let roll: f64 = rng.gen();
    if roll < 0.05 {
        rng.gen_range(140..=150)
    } else if roll < 0.10 {
        rng.gen_range(135..=140)
    } else if roll < 0.15 {
        rng.gen_range(130..=135)
    } else {
        rng.gen_range(120..=130)
    }
}

/// Ordered target WPM values for one session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WpmSchedule(Vec<u32>);

impl WpmSchedule {
    pub fn new(targets: Vec<u32>) -> Self {
        Self(targets)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[u32] {
        &self.0
    }

    /// Entry at `idx`, clamped to the last entry once the schedule is exhausted.
    pub fn target_at(&self, idx: usize) -> Option<u32> {
        let last = self.0.len().checked_sub(1)?;
        self.0.get(idx.min(last)).copied()
    }
}

impl From<Vec<u32>> for WpmSchedule {
    fn from(targets: Vec<u32>) -> Self {
        Self(targets)
    }
}

/// Number of schedule entries needed for `word_count` words.
pub fn schedule_len(word_count: usize) -> usize {
    word_count.div_ceil(WORDS_PER_TARGET) + SCHEDULE_PADDING
}

/// Build a schedule for `word_count` words in the given style.
pub fn generate_schedule<R: Rng + ?Sized>(
    preset: Preset,
    word_count: usize,
    rng: &mut R,
) -> WpmSchedule {
    (0..schedule_len(word_count))
        .map(|idx| preset.target_for(idx, rng))
        .collect::<Vec<_>>()
        .into()
}

/// Where a session's schedule came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleOrigin {
    Control,
    Preset(Preset),
}

/// Hands out one schedule per session. A persisted control sequence, when
/// present, is used verbatim for the first session only.
#[derive(Debug, Default)]
pub struct ScheduleSource {
    control: Option<WpmSchedule>,
}

impl ScheduleSource {
    pub fn new(control: Option<WpmSchedule>) -> Self {
        Self { control }
    }

    pub fn has_control(&self) -> bool {
        self.control.is_some()
    }

    pub fn next_schedule<R: Rng + ?Sized>(
        &mut self,
        preset: Preset,
        word_count: usize,
        rng: &mut R,
    ) -> (WpmSchedule, ScheduleOrigin) {
        match self.control.take() {
            Some(control) => (control, ScheduleOrigin::Control),
            None => (
                generate_schedule(preset, word_count, rng),
                ScheduleOrigin::Preset(preset),
            ),
        }
    }
}
