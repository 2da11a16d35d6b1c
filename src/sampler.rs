use std::{
    fs::File,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use image::{codecs::jpeg::JpegEncoder, RgbImage};
use miette::{Context, IntoDiagnostic};
use tracing::{debug, info};

use crate::{
    io::{create_dir, frame_path},
    outside::FrameDecoder,
    result::Result,
    types::Timestamp,
};

/// A frame that has been written to disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedFrame {
    /// Position among the saved frames, starting at 0
    pub sequence: u32,
    /// Position among all the decoded frames, starting at 0
    pub index: u64,
    pub timestamp: Timestamp,
    pub path: PathBuf,
}

/// Extract frames out of a video at a fixed interval
pub struct Sampler<'a, D> {
    decoder: &'a D,
    jpeg_quality: u8,
}

impl<'a, D: FrameDecoder> Sampler<'a, D> {
    pub fn new(decoder: &'a D, jpeg_quality: u8) -> Self {
        Self {
            decoder,
            jpeg_quality,
        }
    }

    /// Decode the whole video and save one frame every `interval_secs` seconds
    /// of playback to `out_dir`.
    ///
    /// Frames are selected on their decode index, every `frame_interval` frames
    /// starting with the first one, not on their presentation time.
    ///
    /// Returns [`Error::UnreadableVideo`](crate::result::Error::UnreadableVideo)
    /// without saving anything if the video cannot be opened.
    pub fn sample(
        &self,
        video: &Path,
        out_dir: &Path,
        interval_secs: u64,
    ) -> Result<Vec<SavedFrame>> {
        create_dir(out_dir)?;

        let (info, frames) = self.decoder.open(video)?;

        info!("Video FPS: {}", info.frame_rate);
        info!("Total frames: {}", info.frame_count);
        info!("Duration: {}", Timestamp::from_seconds(info.duration_secs() as u64));

        let frame_interval = info.frame_interval(interval_secs);
        debug!("Saving one frame every {frame_interval} decoded frames");
        info!("Extracting frames every {interval_secs} seconds...");

        let mut saved = Vec::new();
        for (index, frame) in (0u64..).zip(frames) {
            let frame = frame
                .map_err(|err| err.wrap_err_with(|| format!("Could not decode frame {index}")))?;

            if index % frame_interval != 0 {
                continue;
            }

            let sequence = saved.len() as u32;
            let timestamp = Timestamp::from_frame_index(index, info.frame_rate);
            let path = frame_path(out_dir, sequence, timestamp);

            self.save_jpeg(&frame, &path)?;
            info!("Saved: {}", path.display());

            saved.push(SavedFrame {
                sequence,
                index,
                timestamp,
                path,
            });
        }

        info!("Extracted {} frames in total.", saved.len());
        Ok(saved)
    }

    fn save_jpeg(&self, frame: &RgbImage, path: &Path) -> Result<()> {
        let file = File::create(path)
            .into_diagnostic()
            .wrap_err_with(|| format!("Could not create {}", path.display()))?;
        let mut writer = BufWriter::new(file);

        JpegEncoder::new_with_quality(&mut writer, self.jpeg_quality)
            .encode_image(frame)
            .into_diagnostic()
            .wrap_err_with(|| format!("Could not encode {}", path.display()))?;

        writer
            .flush()
            .into_diagnostic()
            .wrap_err_with(|| format!("Could not write {}", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::cell::Cell;

    use image::Rgb;

    use super::*;
    use crate::{
        result::Error,
        types::{FrameRate, VideoInfo},
    };

    /// Decoder producing `frame_count` tiny frames whose red channel
    /// holds the frame index modulo 256
    pub struct FakeDecoder {
        pub frame_rate: FrameRate,
        pub frame_count: u64,
        pub opened: Cell<usize>,
    }

    impl FakeDecoder {
        pub fn new(fps: u32, frame_count: u64) -> Self {
            Self {
                frame_rate: FrameRate { num: fps, den: 1 },
                frame_count,
                opened: Cell::new(0),
            }
        }
    }

    impl FrameDecoder for FakeDecoder {
        type Frames = Box<dyn Iterator<Item = Result<RgbImage>>>;

        fn open(&self, path: &Path) -> Result<(VideoInfo, Self::Frames)> {
            if !path.is_file() {
                return Err(Error::unreadable(path, "no such file"));
            }
            self.opened.set(self.opened.get() + 1);

            let info = VideoInfo {
                frame_rate: self.frame_rate,
                frame_count: self.frame_count,
                width: 2,
                height: 2,
            };
            let frames = (0..self.frame_count)
                .map(|i| -> Result<RgbImage> {
                    Ok(RgbImage::from_pixel(2, 2, Rgb([(i % 256) as u8, 0, 0])))
                });

            Ok((info, Box::new(frames)))
        }
    }

    fn video_file(dir: &Path) -> PathBuf {
        let path = dir.join("video.mp4");
        std::fs::write(&path, b"").unwrap();
        path
    }

    fn sample(decoder: &FakeDecoder, interval: u64) -> (tempfile::TempDir, Vec<SavedFrame>) {
        let dir = tempfile::tempdir().unwrap();
        let video = video_file(dir.path());
        let out = dir.path().join("frames");

        let saved = Sampler::new(decoder, 95).sample(&video, &out, interval).unwrap();
        (dir, saved)
    }

    #[test]
    fn samples_every_interval_from_first_frame() {
        let decoder = FakeDecoder::new(30, 2700);
        let (dir, saved) = sample(&decoder, 30);

        let indexes: Vec<u64> = saved.iter().map(|f| f.index).collect();
        assert_eq!(indexes, [0, 900, 1800]);

        let names: Vec<String> = saved
            .iter()
            .map(|f| f.path.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            names,
            [
                "frame_0000_00:00:00.jpg",
                "frame_0001_00:00:30.jpg",
                "frame_0002_00:01:00.jpg"
            ]
        );

        let out = dir.path().join("frames");
        assert_eq!(std::fs::read_dir(&out).unwrap().count(), 3);
        for frame in &saved {
            let img = image::open(&frame.path).unwrap();
            assert_eq!((img.width(), img.height()), (2, 2));
        }
    }

    #[test]
    fn saved_count_is_ceil_of_frames_over_interval() {
        for (fps, frames, interval) in [(30, 2701, 30), (25, 100, 1), (24, 49, 1), (30, 1, 5)] {
            let decoder = FakeDecoder::new(fps, frames);
            let (_dir, saved) = sample(&decoder, interval);

            let frame_interval = u64::from(fps) * interval;
            let expected = frames.div_ceil(frame_interval);
            assert_eq!(saved.len() as u64, expected, "{fps} fps, {frames} frames");
        }
    }

    #[test]
    fn sequence_is_contiguous_from_zero() {
        let decoder = FakeDecoder::new(10, 95);
        let (_dir, saved) = sample(&decoder, 1);

        assert_eq!(saved.len(), 10);
        for (expected, frame) in (0u32..).zip(&saved) {
            assert_eq!(frame.sequence, expected);
            assert_eq!(frame.index, u64::from(expected) * 10);
            assert_eq!(frame.timestamp, Timestamp::from_seconds(u64::from(expected)));
        }
    }

    #[test]
    fn zero_interval_saves_every_frame() {
        let decoder = FakeDecoder::new(30, 12);
        let (_dir, saved) = sample(&decoder, 0);

        assert_eq!(saved.len(), 12);
        assert_eq!(saved[11].index, 11);
        assert_eq!(saved[11].timestamp, Timestamp::from_seconds(0));
    }

    #[test]
    fn unreadable_video_saves_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("frames");
        let decoder = FakeDecoder::new(30, 100);

        let err = Sampler::new(&decoder, 95)
            .sample(&dir.path().join("missing.mp4"), &out, 1)
            .unwrap_err();

        assert!(matches!(err, Error::UnreadableVideo { .. }));
        assert_eq!(std::fs::read_dir(&out).unwrap().count(), 0);
    }

    #[test]
    fn decode_error_stops_sampling() {
        struct BrokenDecoder;

        impl FrameDecoder for BrokenDecoder {
            type Frames = std::vec::IntoIter<Result<RgbImage>>;

            fn open(&self, _path: &Path) -> Result<(VideoInfo, Self::Frames)> {
                let info = VideoInfo {
                    frame_rate: FrameRate { num: 1, den: 1 },
                    frame_count: 3,
                    width: 1,
                    height: 1,
                };
                let frames = vec![
                    Ok(RgbImage::new(1, 1)),
                    Err(crate::result::err_msg("broken pipe")),
                    Ok(RgbImage::new(1, 1)),
                ];
                Ok((info, frames.into_iter()))
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("frames");
        let res = Sampler::new(&BrokenDecoder, 95).sample(Path::new("any"), &out, 1);

        assert!(matches!(res, Err(Error::Miette(_))));
        assert_eq!(std::fs::read_dir(&out).unwrap().count(), 1);
    }
}
