use std::{
    ffi::OsString,
    io::{self, BufReader, Read},
    path::Path,
    process::{Child, ChildStdout},
};

use image::RgbImage;
use miette::{miette, Context, IntoDiagnostic};
use serde::Deserialize;
use tracing::{debug, warn};

use super::command::{
    assert_success_command, run_command, spawn_command, Capture, FFMPEG, FFPROBE,
    FFXXX_DEFAULT_ARGS,
};
use crate::{
    result::{Error, Result},
    types::{FrameRate, VideoInfo},
};

/// Interface for sequentially decoding the frames of a local video file
pub trait FrameDecoder {
    type Frames: Iterator<Item = Result<RgbImage>>;

    /// Open the video for decoding, returning its properties and
    /// an iterator over its frames in decode order.
    ///
    /// Must return [`Error::UnreadableVideo`] if the file cannot be opened.
    /// Dropping the iterator releases the decoding resources.
    fn open(&self, path: &Path) -> Result<(VideoInfo, Self::Frames)>;
}

/// Interface for the [ffmpeg](https://ffmpeg.org) and ffprobe programs
#[derive(Debug)]
pub struct Ffmpeg;

/// Subset of the JSON document printed by `ffprobe -of json`
#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    format: Option<ProbeFormat>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
    nb_frames: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

impl Ffmpeg {
    /// Verify that the `ffmpeg` and `ffprobe` binaries are reachable
    pub fn new() -> Result<Self> {
        assert_success_command(FFMPEG, |cmd| cmd.arg("-version"))?;
        assert_success_command(FFPROBE, |cmd| cmd.arg("-version"))?;

        Ok(Self)
    }

    /// Read the properties of the first video stream of the file
    fn probe(&self, path: &Path) -> Result<VideoInfo> {
        let res = run_command(
            FFPROBE,
            |cmd| {
                cmd.args(FFXXX_DEFAULT_ARGS)
                    .args(["-select_streams", "v:0"])
                    .args([
                        "-show_entries",
                        "stream=width,height,r_frame_rate,avg_frame_rate,nb_frames:format=duration",
                    ])
                    .args(["-of", "json"])
                    .arg("-i")
                    .arg(path)
            },
            Capture::STDOUT | Capture::STDERR,
        )?;

        if !res.status.success() {
            let stderr = String::from_utf8_lossy(&res.stderr);
            let reason = stderr.lines().last().unwrap_or("ffprobe failed");
            return Err(Error::unreadable(path, reason.trim()));
        }

        let output = String::from_utf8_lossy(&res.stdout);
        parse_probe(&output).map_err(|reason| Error::unreadable(path, reason))
    }
}

impl FrameDecoder for Ffmpeg {
    type Frames = RawFrames<BufReader<ChildStdout>>;

    fn open(&self, path: &Path) -> Result<(VideoInfo, Self::Frames)> {
        if !path.is_file() {
            return Err(Error::unreadable(path, "no such file"));
        }

        let info = self.probe(path)?;
        debug!("Probed {}: {info:?}", path.display());

        let mut child = spawn_command(FFMPEG, |cmd| cmd.args(decode_args(path)))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| miette!("ffmpeg stdout was not captured"))?;

        let frames = RawFrames::new(BufReader::new(stdout), info.width, info.height)
            .with_child(child);

        Ok((info, frames))
    }
}

/// Arguments making ffmpeg write every frame of the file to stdout as packed RGB24.
///
/// Frames must keep the probed width and height, so rotation metadata is ignored.
fn decode_args(path: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = FFXXX_DEFAULT_ARGS.iter().map(OsString::from).collect();
    args.extend(["-noautorotate", "-i"].map(OsString::from));
    args.push(path.into());
    args.extend(
        [
            "-map",
            "0:v:0",
            // Keep every decoded frame, never duplicate or drop any
            "-vsync",
            "passthrough",
            "-f",
            "rawvideo",
            "-pix_fmt",
            "rgb24",
            "-",
        ]
        .map(OsString::from),
    );
    args
}

/// Extract the video properties from the ffprobe JSON output
fn parse_probe(json: &str) -> std::result::Result<VideoInfo, String> {
    let probe: ProbeOutput =
        serde_json::from_str(json).map_err(|err| format!("invalid probe output: {err}"))?;

    let stream = probe.streams.first().ok_or("no video stream")?;

    let (width, height) = match (stream.width, stream.height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
        _ => return Err("unknown frame size".to_owned()),
    };

    // Prefer the real base frame rate, fallback on the average one
    let frame_rate = [&stream.r_frame_rate, &stream.avg_frame_rate]
        .into_iter()
        .flatten()
        .flat_map(|rate| rate.parse::<FrameRate>())
        .find(|rate| rate.is_valid())
        .ok_or("unknown frame rate")?;

    // Not every container stores the frame count, estimate it from the duration
    let frame_count = match stream.nb_frames.as_deref().map(str::parse::<u64>) {
        Some(Ok(count)) => count,
        _ => {
            let duration = probe
                .format
                .as_ref()
                .and_then(|format| format.duration.as_deref())
                .and_then(|duration| duration.parse::<f64>().ok())
                .unwrap_or(0.0);
            (duration * frame_rate.as_f64()).round() as u64
        }
    };

    Ok(VideoInfo {
        frame_rate,
        frame_count,
        width,
        height,
    })
}

/// Iterator over packed RGB24 frames read from a byte stream.
///
/// When built from a decoder process, the process is reaped once the stream
/// is exhausted, or killed and reaped when the iterator is dropped early.
pub struct RawFrames<R> {
    reader: R,
    width: u32,
    height: u32,
    child: Option<Child>,
    done: bool,
}

impl<R: Read> RawFrames<R> {
    pub fn new(reader: R, width: u32, height: u32) -> Self {
        Self {
            reader,
            width,
            height,
            child: None,
            done: false,
        }
    }

    fn with_child(mut self, child: Child) -> Self {
        self.child = Some(child);
        self
    }

    /// Wait for the decoder process to exit, if any
    fn reap(&mut self) {
        if let Some(mut child) = self.child.take() {
            match child.wait() {
                Ok(status) if !status.success() => {
                    warn!("Decoder exited with {status}, the video may be truncated")
                }
                Ok(_) => {}
                Err(err) => warn!("Could not wait for the decoder process: {err}"),
            }
        }
    }

    fn read_frame(&mut self) -> Result<Option<RgbImage>> {
        let frame_size = self.width as usize * self.height as usize * 3;
        let mut buf = vec![0; frame_size];

        let read = fill_buf(&mut self.reader, &mut buf)
            .into_diagnostic()
            .wrap_err("Could not read decoded frame")?;

        if read == 0 {
            return Ok(None);
        }
        if read < frame_size {
            warn!("Truncated last frame ({read} of {frame_size} bytes), ignoring it");
            return Ok(None);
        }

        let image = RgbImage::from_raw(self.width, self.height, buf)
            .ok_or_else(|| miette!("Decoded frame does not match the frame size"))?;
        Ok(Some(image))
    }
}

impl<R: Read> Iterator for RawFrames<R> {
    type Item = Result<RgbImage>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        match self.read_frame() {
            Ok(Some(frame)) => Some(Ok(frame)),
            Ok(None) => {
                self.done = true;
                self.reap();
                None
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}

impl<R> Drop for RawFrames<R> {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.take() {
            // Still running if the frames were not all consumed
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

/// Read until the buffer is full or the end of the stream is reached.
/// Return the number of bytes read.
fn fill_buf<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        }
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use indoc::indoc;

    use super::*;

    #[test]
    fn parses_probe_with_frame_count() {
        let json = indoc! {r#"
            {
                "programs": [],
                "streams": [
                    {
                        "width": 1280,
                        "height": 720,
                        "r_frame_rate": "30000/1001",
                        "avg_frame_rate": "30000/1001",
                        "nb_frames": "2697"
                    }
                ],
                "format": {
                    "duration": "90.023267"
                }
            }
        "#};

        let info = parse_probe(json).unwrap();
        assert_eq!(info.width, 1280);
        assert_eq!(info.height, 720);
        assert_eq!(info.frame_rate, FrameRate { num: 30000, den: 1001 });
        assert_eq!(info.frame_count, 2697);
    }

    #[test]
    fn estimates_frame_count_from_duration() {
        let json = indoc! {r#"
            {
                "streams": [
                    {"width": 640, "height": 360, "r_frame_rate": "0/0", "avg_frame_rate": "25/1"}
                ],
                "format": {"duration": "12.000000"}
            }
        "#};

        let info = parse_probe(json).unwrap();
        assert_eq!(info.frame_rate, FrameRate { num: 25, den: 1 });
        assert_eq!(info.frame_count, 300);
    }

    #[test]
    fn rejects_probe_without_video() {
        assert_eq!(
            parse_probe(r#"{"streams": [], "format": {}}"#).unwrap_err(),
            "no video stream"
        );
        assert_eq!(
            parse_probe(r#"{"streams": [{"width": 2, "height": 2, "r_frame_rate": "0/0"}]}"#)
                .unwrap_err(),
            "unknown frame rate"
        );
        assert!(parse_probe("not json").is_err());
    }

    #[test]
    fn raw_frames_splits_stream_and_ignores_truncated_tail() {
        // Two 2x1 frames, then half of a third one
        let mut bytes: Vec<u8> = (0..12).collect();
        bytes.extend([255; 3]);

        let frames: Vec<RgbImage> = RawFrames::new(Cursor::new(bytes), 2, 1)
            .collect::<Result<_>>()
            .unwrap();

        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].get_pixel(1, 0).0, [3, 4, 5]);
        assert_eq!(frames[1].get_pixel(0, 0).0, [6, 7, 8]);
    }

    #[test]
    fn raw_frames_empty_stream() {
        let mut frames = RawFrames::new(Cursor::new(Vec::new()), 2, 2);
        assert!(frames.next().is_none());
        assert!(frames.next().is_none());
    }

    #[test]
    fn decoding_ignores_rotation() {
        let args = decode_args(Path::new("in.mp4"));
        let position = |arg: &str| args.iter().position(|a| a == arg).unwrap();

        // Input option, must come before the input
        assert!(position("-noautorotate") < position("-i"));
        assert_eq!(args[position("-i") + 1], "in.mp4");
        assert_eq!(args.last().unwrap(), "-");
    }

    /// Start a shell script whose stdout feeds 1x1 frames
    fn script_frames(script: &str) -> RawFrames<BufReader<ChildStdout>> {
        let mut child = spawn_command("sh", |cmd| cmd.args(["-c", script])).unwrap();
        let stdout = child.stdout.take().unwrap();
        RawFrames::new(BufReader::new(stdout), 1, 1).with_child(child)
    }

    #[cfg(unix)]
    fn is_running(pid: &str) -> bool {
        std::process::Command::new("kill")
            .args(["-0", pid])
            .stderr(std::process::Stdio::null())
            .status()
            .unwrap()
            .success()
    }

    #[cfg(unix)]
    #[test]
    fn decoder_is_reaped_at_end_of_stream() {
        let mut frames = script_frames("printf 'abcdefg'");

        assert_eq!(frames.next().unwrap().unwrap().get_pixel(0, 0).0, *b"abc");
        assert_eq!(frames.next().unwrap().unwrap().get_pixel(0, 0).0, *b"def");
        assert!(frames.next().is_none());
        assert!(frames.child.is_none());
    }

    #[cfg(unix)]
    #[test]
    fn decoder_is_killed_when_dropped_early() {
        let dir = tempfile::tempdir().unwrap();
        let pidfile = dir.path().join("pid");
        let script = format!("echo $$ > '{}'; exec yes", pidfile.display());

        let mut frames = script_frames(&script);
        assert!(frames.next().unwrap().is_ok());
        assert!(frames.next().unwrap().is_ok());

        // The script wrote its pid before producing any output
        let pid = std::fs::read_to_string(&pidfile).unwrap();
        let pid = pid.trim();
        assert!(is_running(pid));

        drop(frames);
        assert!(!is_running(pid));
    }

    #[test]
    fn missing_file_is_unreadable() {
        let err = Ffmpeg
            .open(Path::new("/definitely/not/a/video.mp4"))
            .err()
            .unwrap();
        assert!(matches!(err, Error::UnreadableVideo { .. }));
    }
}
