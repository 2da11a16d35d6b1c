use std::{fmt::Display, time::Duration};

use super::FrameRate;

/// A position in a video, truncated to whole seconds.
///
/// Displayed as `HH:MM:SS`. Hours are not wrapped into days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Timestamp(u64);

impl Timestamp {
    pub fn from_seconds(secs: u64) -> Self {
        Self(secs)
    }

    /// Timestamp of the frame at the given decode-order index
    pub fn from_frame_index(index: u64, frame_rate: FrameRate) -> Self {
        let secs = u128::from(index) * u128::from(frame_rate.den)
            / u128::from(frame_rate.num).max(1);
        Self(u64::try_from(secs).unwrap_or(u64::MAX))
    }
}

impl From<Duration> for Timestamp {
    fn from(duration: Duration) -> Self {
        Self(duration.as_secs())
    }
}

impl Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let hours = self.0 / 3600;
        let minutes = self.0 / 60 % 60;
        let seconds = self.0 % 60;
        write!(f, "{hours:02}:{minutes:02}:{seconds:02}")
    }
}
