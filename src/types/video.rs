use std::{fmt::Display, str::FromStr};

/// Frame rate as the rational number reported by the container
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameRate {
    pub num: u32,
    pub den: u32,
}

impl FrameRate {
    pub fn as_f64(self) -> f64 {
        if self.den == 0 {
            0.0
        } else {
            f64::from(self.num) / f64::from(self.den)
        }
    }

    /// A frame rate of `0/0` or `0/1` is how probes report "unknown"
    pub fn is_valid(self) -> bool {
        self.num != 0 && self.den != 0
    }
}

impl FromStr for FrameRate {
    type Err = Box<dyn std::error::Error + Sync + Send>;

    /// Parse either `num/den` or a plain integer
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some((num, den)) = s.split_once('/') {
            Ok(Self {
                num: num.trim().parse()?,
                den: den.trim().parse()?,
            })
        } else {
            Ok(Self {
                num: s.parse()?,
                den: 1,
            })
        }
    }
}

impl Display for FrameRate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.3}", self.as_f64())
    }
}

/// Properties of a local video file, as needed to sample it
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoInfo {
    pub frame_rate: FrameRate,
    pub frame_count: u64,
    pub width: u32,
    pub height: u32,
}

impl VideoInfo {
    /// Duration in seconds, derived from the frame count
    pub fn duration_secs(&self) -> f64 {
        self.frame_count as f64 / self.frame_rate.as_f64()
    }

    /// Number of decoded frames between two samples.
    ///
    /// Never 0: an interval shorter than a frame selects every frame.
    pub fn frame_interval(&self, interval_secs: u64) -> u64 {
        let FrameRate { num, den } = self.frame_rate;
        let interval = u128::from(num) * u128::from(interval_secs) / u128::from(den).max(1);
        u64::try_from(interval).unwrap_or(u64::MAX).max(1)
    }
}
