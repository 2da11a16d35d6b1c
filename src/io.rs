use std::{
    path::{Path, PathBuf},
    sync::OnceLock,
};

use miette::{Context, IntoDiagnostic};
use regex::Regex;
use tempfile::TempDir;

use crate::{
    result::Result,
    types::{Extension, Timestamp},
};

/// Characters that are not allowed in file names on at least one common platform
static INVALID_CHARS: OnceLock<Regex> = OnceLock::new();

fn invalid_chars() -> &'static Regex {
    INVALID_CHARS.get_or_init(|| Regex::new(r#"[/\\:*?"<>|\x00-\x1f\x7f]"#).unwrap())
}

/// Turn a video title into something usable as a file name
pub fn sanitize_title(title: &str) -> String {
    let name = invalid_chars().replace_all(title, "_");
    let name = name.trim_matches(|c: char| c.is_whitespace() || c == '.');

    if name.is_empty() {
        "video".to_owned()
    } else {
        name.to_owned()
    }
}

/// Path of a downloaded video: `<dir>/<title><ext>`
pub fn video_path(dir: &Path, title: &str, extension: Extension) -> PathBuf {
    dir.join(format!("{}{}", sanitize_title(title), extension.with_dot()))
}

/// Path of a sampled frame: `<dir>/frame_<seq>_<HH:MM:SS>.jpg`
pub fn frame_path(dir: &Path, sequence: u32, timestamp: Timestamp) -> PathBuf {
    dir.join(format!("frame_{sequence:04}_{timestamp}.jpg"))
}

/// Create the directory and its parents if it does not exist yet
pub fn create_dir(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir)
        .into_diagnostic()
        .wrap_err_with(|| format!("Could not create directory {}", dir.display()))?;
    Ok(())
}

/// Create a temporary directory inside `dir`.
///
/// The directory and its content are removed at the handle drop.
/// Being on the same filesystem as `dir`, its files can be renamed into it.
pub fn staging_dir(dir: &Path) -> Result<TempDir> {
    let tmp = tempfile::Builder::new()
        .prefix(".framecap-")
        .tempdir_in(dir)
        .into_diagnostic()
        .wrap_err("Could not create staging directory")?;
    Ok(tmp)
}

/// Move a file to its final location, replacing any file already there
pub fn move_into_place(from: &Path, to: &Path) -> Result<()> {
    if to.exists() {
        std::fs::remove_file(to)
            .into_diagnostic()
            .wrap_err_with(|| format!("Could not replace {}", to.display()))?;
    }

    // First try to do a simple move
    if std::fs::rename(from, to).is_err() {
        tracing::debug!("Moving file failed, falling back to copying");
        std::fs::copy(from, to)
            .into_diagnostic()
            .wrap_err_with(|| format!("Could not move file to {}", to.display()))?;
    }

    Ok(())
}
