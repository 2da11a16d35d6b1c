mod cli;
mod fetcher;
mod io;
mod logging;
mod outside;
mod pipeline;
mod result;
mod sampler;
mod settings;
mod types;

use std::time::Instant;

use clap::Parser;
use tracing::{debug, info, trace};

use crate::{
    cli::Args,
    logging::init_logging,
    outside::{Ffmpeg, Ytdl},
    settings::Settings,
    types::Timestamp,
};

fn main() -> miette::Result<()> {
    let start = Instant::now();

    // Initialize the environment & CLI
    let args = Args::parse();
    init_logging(args.log_level)?;

    let res = run(&args);

    info!("Process completed in {}", Timestamp::from(start.elapsed()));
    res
}

fn run(args: &Args) -> miette::Result<()> {
    let settings = Settings::load(args.config.as_deref())?;
    debug!("{settings:?}");

    let (ytdl, ffmpeg) = load_external_components()?;

    let summary = pipeline::run(&ytdl, &ffmpeg, &settings, args)?;
    debug!(
        "{} frames extracted from {}",
        summary.frames.len(),
        summary.video.display()
    );
    for frame in &summary.frames {
        trace!(
            "#{} decoded frame {} at {}: {}",
            frame.sequence,
            frame.index,
            frame.timestamp,
            frame.path.display()
        );
    }

    Ok(())
}

/// Load the external components, checking that their programs are reachable
fn load_external_components() -> result::Result<(Ytdl, Ffmpeg)> {
    let ytdl = Ytdl::new()?;
    let ffmpeg = Ffmpeg::new()?;

    Ok((ytdl, ffmpeg))
}
