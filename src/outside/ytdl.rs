use std::{
    ffi::OsString,
    path::Path,
    process::{Command, Output},
};

use miette::{Context, IntoDiagnostic};
use serde::Deserialize;
use tracing::debug;

use super::command::{assert_success_command, run_command, Capture, YT_DL, YT_DLP};
use crate::{
    result::{bail, Error, Result},
    types::{Encoding, StreamKind, VideoSource},
};

/// Interface for resolving and downloading remote videos
pub trait StreamDownloader {
    /// Resolve the URL into the video title and the list of its available encodings.
    fn resolve(&self, url: &str) -> Result<VideoSource>;

    /// Download the given encoding of the video to the given path.
    ///
    /// The parent directory must already exist.
    fn download(&self, url: &str, encoding: &Encoding, path: &Path) -> Result<()>;
}

/// Interface for the [youtube-dl](https://github.com/ytdl-org/youtube-dl) program
/// or its [yt-dlp](https://github.com/yt-dlp/yt-dlp) fork
pub struct Ytdl {
    program: &'static str,
}

/// Subset of the JSON document printed by `--dump-json`
#[derive(Debug, Deserialize)]
struct YtdlInfo {
    title: String,
    #[serde(default)]
    formats: Vec<YtdlFormat>,
}

#[derive(Debug, Deserialize)]
struct YtdlFormat {
    format_id: String,
    ext: String,
    width: Option<u32>,
    height: Option<u32>,
    vcodec: Option<String>,
    acodec: Option<String>,
}

impl Ytdl {
    /// Verify that the `yt-dlp` or `youtube-dl` binaries are reachable
    pub fn new() -> Result<Self> {
        // Check `yt-dlp`
        if assert_success_command(YT_DLP, |cmd| cmd.arg("--version")).is_ok() {
            Ok(Self { program: YT_DLP })
        } else if assert_success_command(YT_DL, |cmd| cmd.arg("--version")).is_ok() {
            // Check `youtube-dl`
            Ok(Self { program: YT_DL })
        } else {
            bail("Neither yt-dlp nor youtube-dl found")
        }
    }

    /// Run the command and check if it failed with saying the stream is unavailable.
    /// In that case, return [`Error::UnavailableStream`].
    ///
    /// In other cases, return the output handle.
    pub fn run_check_availability<F>(&self, f: F, capture: Capture) -> Result<Output>
    where
        F: FnOnce(&mut Command) -> &mut Command,
    {
        let res = run_command(self.program, f, capture | Capture::STDERR)?;

        let stderr = String::from_utf8_lossy(&res.stderr);
        let is_unavailable = stderr
            .lines()
            .any(|line| line.starts_with("ERROR:") && line.to_lowercase().contains("unavailable"));
        if is_unavailable {
            Err(Error::UnavailableStream)
        } else {
            Ok(res)
        }
    }
}

impl StreamDownloader for Ytdl {
    fn resolve(&self, url: &str) -> Result<VideoSource> {
        let res = self.run_check_availability(
            |cmd| {
                cmd.arg("-q")
                    .arg("--no-playlist")
                    .arg("--skip-download")
                    .arg("-j")
                    .arg("--")
                    .arg(url)
            },
            Capture::STDOUT,
        )?;

        if !res.status.success() {
            let stderr = String::from_utf8_lossy(&res.stderr);
            return Err(miette::miette!(
                "{} could not resolve the video. Here is its stderr: {stderr}",
                self.program
            )
            .into());
        }

        let output = String::from_utf8_lossy(&res.stdout);
        parse_video_source(url, &output)
    }

    fn download(&self, url: &str, encoding: &Encoding, path: &Path) -> Result<()> {
        let template = output_template(path);
        let res = self.run_check_availability(
            |cmd| {
                cmd.arg("-q")
                    .arg("--no-playlist")
                    .arg("--no-continue")
                    .arg("--no-part")
                    .args(["-f", &encoding.format_id])
                    .arg("-o")
                    .arg(&template)
                    .arg("--")
                    .arg(url)
            },
            Capture::empty(),
        )?;

        if res.status.success() {
            Ok(())
        } else {
            bail("Command did run but was not successful")
        }
    }
}

/// Parse the `--dump-json` output into the video source and its encodings.
///
/// Formats carrying neither audio nor video (storyboards...) are skipped.
fn parse_video_source(url: &str, json: &str) -> Result<VideoSource> {
    let info: YtdlInfo = serde_json::from_str(json)
        .into_diagnostic()
        .wrap_err("Could not parse video metadata JSON")?;

    let encodings: Vec<Encoding> = info
        .formats
        .into_iter()
        .filter_map(|format| {
            let kind =
                StreamKind::from_codecs(format.vcodec.as_deref(), format.acodec.as_deref())?;
            Some(Encoding {
                format_id: format.format_id,
                ext: format.ext,
                width: format.width,
                height: format.height,
                kind,
            })
        })
        .collect();

    debug!("title     = {}", info.title);
    debug!("encodings = {}", encodings.len());

    Ok(VideoSource {
        url: url.to_owned(),
        title: info.title,
        encodings,
    })
}

/// The `-o` argument is an output template, escape its `%` so the path is taken literally
fn output_template(path: &Path) -> OsString {
    match path.to_str() {
        Some(path) => path.replace('%', "%%").into(),
        None => path.as_os_str().to_owned(),
    }
}
