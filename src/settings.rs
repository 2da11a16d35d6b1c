use std::path::{Path, PathBuf};

use config::{Config, Environment, File, FileFormat};
use miette::{miette, Context, IntoDiagnostic};
use serde::Deserialize;

use crate::{result::Result, types::Extension};

/// Prefix of the environment variables overriding the settings
pub const ENV_PREFIX: &str = "FRAMECAP";

/// Tool-level settings, read from the defaults, then the optional
/// settings file, then the environment
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Settings {
    /// Where downloaded videos are stored
    pub downloads_dir: PathBuf,

    /// Container of the encoding to download
    pub container: Extension,

    /// Quality of the saved JPEG frames, from 1 to 100
    pub jpeg_quality: u8,
}

impl Settings {
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder()
            .set_default("downloads_dir", "downloads")
            .and_then(|b| b.set_default("container", "mp4"))
            .and_then(|b| b.set_default("jpeg_quality", 95_i64))
            .into_diagnostic()?;

        if let Some(file) = file {
            builder = builder.add_source(File::from(file).format(FileFormat::Toml));
        }

        let settings: Settings = builder
            .add_source(Environment::with_prefix(ENV_PREFIX))
            .build()
            .and_then(|config| config.try_deserialize::<Settings>())
            .into_diagnostic()
            .wrap_err("Could not load settings")?;

        if !(1..=100).contains(&settings.jpeg_quality) {
            return Err(miette!(
                "jpeg_quality must be between 1 and 100, got {}",
                settings.jpeg_quality
            )
            .into());
        }

        Ok(settings)
    }
}
