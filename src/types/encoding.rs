use std::cmp::Reverse;

use super::Extension;

/// Which media a single downloadable stream carries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    /// Audio and video muxed together, no client-side merging needed
    Combined,
    AudioOnly,
    VideoOnly,
}

impl StreamKind {
    /// Derive the kind from the codec names reported for a stream.
    ///
    /// A missing codec or the `none` placeholder means the media is absent.
    /// Returns None when the stream carries neither audio nor video (storyboards...).
    pub fn from_codecs(vcodec: Option<&str>, acodec: Option<&str>) -> Option<Self> {
        let present = |codec: Option<&str>| codec.is_some_and(|c| !c.is_empty() && c != "none");

        match (present(vcodec), present(acodec)) {
            (true, true) => Some(Self::Combined),
            (true, false) => Some(Self::VideoOnly),
            (false, true) => Some(Self::AudioOnly),
            (false, false) => None,
        }
    }
}

/// One of the available encodings of a remote video
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Encoding {
    /// Identifier used to ask the downloader for this exact encoding
    pub format_id: String,
    /// Raw container extension, as reported by the downloader
    pub ext: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub kind: StreamKind,
}

impl Encoding {
    pub fn is_progressive(&self) -> bool {
        self.kind == StreamKind::Combined
    }

    pub fn container(&self) -> Option<Extension> {
        Extension::from_name(&self.ext)
    }

    /// Sort key for ordering by resolution. Unknown dimensions sort last.
    pub fn resolution(&self) -> (u32, u32) {
        (self.height.unwrap_or(0), self.width.unwrap_or(0))
    }
}

/// A remote video resolved into its downloadable encodings
#[derive(Debug, Clone)]
pub struct VideoSource {
    pub url: String,
    pub title: String,
    pub encodings: Vec<Encoding>,
}

impl VideoSource {
    /// Select the highest resolution progressive encoding in the given container
    pub fn best_progressive(&self, container: Extension) -> Option<&Encoding> {
        let mut candidates: Vec<&Encoding> = self
            .encodings
            .iter()
            .filter(|enc| enc.is_progressive() && enc.container() == Some(container))
            .collect();

        candidates.sort_by_key(|enc| Reverse(enc.resolution()));
        candidates.first().copied()
    }
}
