use rand::Rng;

pub const DEFAULT_WRONG_WORD_PROBABILITY: f64 = 0.08;

const LOWERCASE: &[u8] = b"abcdefghijklmnopqrstuvwxyz";

pub fn random_letter<R: Rng + ?Sized>(rng: &mut R) -> char {
    LOWERCASE[rng.gen_range(0..LOWERCASE.len())] as char
}

fn clamp_probability(p: f64) -> f64 {
    if p.is_nan() {
        0.0
    } else {
        p.clamp(0.0, 1.0)
    }
}

/// The word that will actually be typed, and whether it was corrupted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InjectedWord {
    pub text: String,
    pub is_wrong: bool,
}

/// Whole-word mistakes: with probability `p` a random lowercase letter is
/// appended so the host scores the word as wrong.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MistakeInjector {
    probability: f64,
}

impl MistakeInjector {
    pub fn new(probability: f64) -> Self {
        Self {
            probability: clamp_probability(probability),
        }
    }

    pub fn probability(&self) -> f64 {
        self.probability
    }

    pub fn apply<R: Rng + ?Sized>(&self, word: &str, rng: &mut R) -> InjectedWord {
        if rng.gen_bool(self.probability) {
            let mut text = String::with_capacity(word.len() + 1);
            text.push_str(word);
            text.push(random_letter(rng));
            InjectedWord {
                text,
                is_wrong: true,
            }
        } else {
            InjectedWord {
                text: word.to_string(),
                is_wrong: false,
            }
        }
    }
}

impl Default for MistakeInjector {
    fn default() -> Self {
        Self::new(DEFAULT_WRONG_WORD_PROBABILITY)
    }
}

/// Per-character slips: a short burst of stray letters that the driver types
/// and then erases before the intended key.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TypoModel {
    probability: f64,
    max_chars: usize,
}

impl TypoModel {
    pub fn new(probability: f64, max_chars: usize) -> Self {
        Self {
            probability: clamp_probability(probability),
            max_chars: max_chars.max(1),
        }
    }

    /// Returns the stray letters to type before the next key, if any.
    pub fn roll<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<String> {
        if !rng.gen_bool(self.probability) {
            return None;
        }
        let len = rng.gen_range(1..=self.max_chars);
        Some((0..len).map(|_| random_letter(rng)).collect())
    }
}
