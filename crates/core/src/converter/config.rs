//! Configuration for the converter module.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for the FFmpeg-based transcoder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConverterConfig {
    /// Path to ffmpeg binary.
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: PathBuf,

    /// Directory for downloaded source media.
    #[serde(default = "default_temp_dir")]
    pub temp_dir: PathBuf,

    /// Directory for transcoder output; each invocation gets a subdirectory.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Extension of the produced audio file, without the dot.
    #[serde(default = "default_audio_extension")]
    pub audio_extension: String,
}

fn default_ffmpeg_path() -> PathBuf {
    PathBuf::from("ffmpeg")
}

fn default_temp_dir() -> PathBuf {
    std::env::temp_dir().join("tubetone").join("downloads")
}

fn default_output_dir() -> PathBuf {
    std::env::temp_dir().join("tubetone").join("output")
}

fn default_audio_extension() -> String {
    "mp3".to_string()
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: default_ffmpeg_path(),
            temp_dir: default_temp_dir(),
            output_dir: default_output_dir(),
            audio_extension: default_audio_extension(),
        }
    }
}

impl ConverterConfig {
    /// Creates a config with a custom ffmpeg path.
    pub fn with_ffmpeg_path(ffmpeg_path: PathBuf) -> Self {
        Self {
            ffmpeg_path,
            ..Default::default()
        }
    }

    /// Places both scratch directories under `root`.
    pub fn with_work_dir(mut self, root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        self.temp_dir = root.join("downloads");
        self.output_dir = root.join("output");
        self
    }

    pub fn with_audio_extension(mut self, extension: impl Into<String>) -> Self {
        self.audio_extension = extension.into();
        self
    }
}
