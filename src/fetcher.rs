use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::{
    io::{create_dir, move_into_place, staging_dir, video_path},
    outside::StreamDownloader,
    result::{err_msg, Error, Result},
    types::{Encoding, Extension, VideoSource},
};

/// Resolve a video URL and download its best progressive encoding
pub struct Fetcher<'a, D> {
    downloader: &'a D,
    downloads_dir: &'a Path,
    container: Extension,
}

impl<'a, D: StreamDownloader> Fetcher<'a, D> {
    pub fn new(downloader: &'a D, downloads_dir: &'a Path, container: Extension) -> Self {
        Self {
            downloader,
            downloads_dir,
            container,
        }
    }

    /// Download the video to the downloads directory and return the path of the file.
    ///
    /// The file is named after the video title. An existing file with the
    /// same name is replaced.
    pub fn fetch(&self, url: &str) -> Result<PathBuf> {
        create_dir(self.downloads_dir)?;

        info!("Fetching video from {url}...");
        let source = self
            .downloader
            .resolve(url)
            .map_err(|err| err.wrap_err_with(|| "Could not resolve video"))?;

        info!("Downloading: {}", source.title);
        let encoding = self.select_encoding(&source)?;
        debug!(
            "Selected format {} ({}x{})",
            encoding.format_id,
            encoding.width.unwrap_or(0),
            encoding.height.unwrap_or(0)
        );

        // Download to a staging directory first so that an interrupted
        // download never leaves a file under the final name
        let staging = staging_dir(self.downloads_dir)?;
        let tmp = staging.path().join(format!("video{}", self.container.with_dot()));

        self.downloader
            .download(&source.url, encoding, &tmp)
            .map_err(|err| err.wrap_err_with(|| "Could not download video"))?;

        if !tmp.is_file() {
            return Err(err_msg("Downloader did not produce the video file"));
        }

        let output = video_path(self.downloads_dir, &source.title, self.container);
        move_into_place(&tmp, &output)?;

        info!("Downloaded to: {}", output.display());
        Ok(output)
    }

    fn select_encoding<'s>(&self, source: &'s VideoSource) -> Result<&'s Encoding> {
        source
            .best_progressive(self.container)
            .ok_or(Error::NoEligibleStream {
                container: self.container,
            })
    }
}
