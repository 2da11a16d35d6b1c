mod command;
mod ffmpeg;
mod ytdl;

pub use ffmpeg::{Ffmpeg, FrameDecoder};
pub use ytdl::{StreamDownloader, Ytdl};
