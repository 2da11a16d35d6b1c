mod encoding;
mod extension;
mod timestamp;
mod video;

pub use encoding::{Encoding, StreamKind, VideoSource};
pub use extension::Extension;
pub use timestamp::Timestamp;
pub use video::{FrameRate, VideoInfo};
