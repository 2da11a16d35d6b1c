use std::path::PathBuf;

use miette::{Context, IntoDiagnostic};
use tracing::{error, info};

use crate::{
    cli::Args,
    fetcher::Fetcher,
    outside::{FrameDecoder, StreamDownloader},
    result::{Error, Result},
    sampler::{SavedFrame, Sampler},
    settings::Settings,
};

/// What a complete run produced
#[derive(Debug)]
pub struct RunSummary {
    /// Where the video was downloaded, it may have been deleted since
    pub video: PathBuf,
    pub frames: Vec<SavedFrame>,
}

/// Download the video, sample its frames, then delete it unless asked to keep it.
///
/// A video that cannot be decoded is reported and yields no frame,
/// every other error aborts the run.
pub fn run<D, F>(
    downloader: &D,
    decoder: &F,
    settings: &Settings,
    args: &Args,
) -> Result<RunSummary>
where
    D: StreamDownloader,
    F: FrameDecoder,
{
    let fetcher = Fetcher::new(downloader, &settings.downloads_dir, settings.container);
    let video = fetcher.fetch(&args.url)?;

    let sampler = Sampler::new(decoder, settings.jpeg_quality);
    let frames = match sampler.sample(&video, &args.output, args.interval) {
        Ok(frames) => frames,
        Err(Error::UnreadableVideo { path, reason }) => {
            error!("Could not open video {}: {reason}", path.display());
            Vec::new()
        }
        Err(err) => return Err(err.wrap_err_with(|| "Could not extract frames")),
    };

    if !args.keep_video && video.exists() {
        info!("Deleting downloaded video: {}", video.display());
        std::fs::remove_file(&video)
            .into_diagnostic()
            .wrap_err("Could not delete downloaded video")?;
    }

    Ok(RunSummary { video, frames })
}
