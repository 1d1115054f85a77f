/// One sample of a session's pace: seconds since start, the live WPM
/// estimate, and the target that was active.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeSeriesPoint {
    pub t: f64,
    pub wpm: f64,
    pub target: u32,
}

impl TimeSeriesPoint {
    pub fn new(t: f64, wpm: f64, target: u32) -> Self {
        Self { t, wpm, target }
    }
}
