use serde::Deserialize;

/// Container format of a downloaded video
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Extension {
    #[default]
    Mp4,
    Webm,
}

impl Extension {
    /// Return the extension with the leading dot.
    /// e.g. ".ext"
    pub fn with_dot(self) -> &'static str {
        match self {
            Extension::Mp4 => ".mp4",
            Extension::Webm => ".webm",
        }
    }

    /// Return the extension without the leading dot.
    /// e.g. "ext"
    pub fn with_no_dot(self) -> &'static str {
        &self.with_dot()[1..]
    }

    /// Parse an extension as reported by a downloader, without the leading dot.
    pub fn from_name(ext: &str) -> Option<Self> {
        match ext {
            "mp4" => Some(Self::Mp4),
            "webm" => Some(Self::Webm),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_extensions() {
        assert_eq!(Extension::from_name("mp4"), Some(Extension::Mp4));
        assert_eq!(Extension::from_name("3gp"), None);
        assert_eq!(Extension::from_name("webm"), Some(Extension::Webm));
        assert_eq!(Extension::Webm.with_dot(), ".webm");
        assert_eq!(Extension::Mp4.with_no_dot(), "mp4");
    }
}
