use std::{fmt::Display, path::PathBuf};

use miette::miette;

use crate::types::Extension;

#[derive(Debug)]
pub enum Error {
    /// The downloader reported the video as unavailable
    UnavailableStream,

    /// No single stream carrying both audio and video exists in the wanted container
    NoEligibleStream { container: Extension },

    /// The video file could not be opened for decoding
    UnreadableVideo { path: PathBuf, reason: String },

    Miette(miette::Report),
}

impl From<miette::Report> for Error {
    fn from(err: miette::Report) -> Self {
        Error::Miette(err)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Miette(miette::Report::from_err(err))
    }
}

impl From<Error> for miette::Report {
    fn from(err: Error) -> Self {
        match err {
            Error::UnavailableStream => miette!("Unavailable stream"),
            Error::NoEligibleStream { container } => miette!(
                "No progressive (audio + video) stream found in the {} container",
                container.with_no_dot()
            ),
            Error::UnreadableVideo { path, reason } => {
                miette!("Could not open video '{}': {reason}", path.display())
            }
            Error::Miette(err) => err,
        }
    }
}

impl Error {
    pub fn wrap_err_with<D, F>(self, f: F) -> Error
    where
        D: Display + Send + Sync + 'static,
        F: FnOnce() -> D,
    {
        match self {
            Error::Miette(report) => Error::Miette(report.wrap_err(f())),
            err => err,
        }
    }

    pub fn unreadable(path: impl Into<PathBuf>, reason: impl Display) -> Self {
        Error::UnreadableVideo {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

/// Create an error from a simple message
pub fn err_msg(msg: &'static str) -> Error {
    Error::Miette(miette!("{msg}"))
}

/// Return early with an error built from a simple message
pub fn bail<T>(msg: &'static str) -> Result<T> {
    Err(err_msg(msg))
}

pub type Result<T> = std::result::Result<T, Error>;
