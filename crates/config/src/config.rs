//! Core configuration structures and loading logic

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;

/// Error type for configuration operations
#[derive(Debug)]
pub enum ConfigError {
    /// IO error reading config file
    Io(std::io::Error),
    /// TOML parsing error
    Parse(toml::de::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "Failed to read config file: {}", e),
            ConfigError::Parse(e) => write!(f, "Failed to parse config: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        ConfigError::Parse(e)
    }
}

/// Video output configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VideoConfig {
    /// Frames per second; each image is displayed for 1/fps seconds
    #[serde(default = "default_fps")]
    pub fps: u32,
    /// Extra seconds to hold the final frame (0.0 = uniform spacing).
    ///
    /// The default gives every frame, including the last, exactly 1/fps
    /// seconds of display time. Setting this stretches only the final frame.
    #[serde(default)]
    pub last_frame_hold_secs: f64,
}

fn default_fps() -> u32 {
    4
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            fps: default_fps(),
            last_frame_hold_secs: 0.0,
        }
    }
}

/// Audio fade configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AudioConfig {
    /// Fade-in duration in seconds, applied at the start of the track
    #[serde(default = "default_fade_secs")]
    pub fade_in_secs: f64,
    /// Fade-out duration in seconds, applied before the computed cut point
    #[serde(default = "default_fade_secs")]
    pub fade_out_secs: f64,
}

fn default_fade_secs() -> f64 {
    2.0
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            fade_in_secs: default_fade_secs(),
            fade_out_secs: default_fade_secs(),
        }
    }
}

/// Worker pool configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkerConfig {
    /// Image-processing pool size (0 = auto-derive from CPU count)
    #[serde(default)]
    pub pool_size: u32,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self { pool_size: 0 }
    }
}

/// Recognized file formats
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FormatConfig {
    /// Image extensions accepted from archives (lowercase, no leading dot)
    #[serde(default = "default_image_extensions")]
    pub image_extensions: Vec<String>,
    /// Audio extensions accepted for the soundtrack (lowercase, no leading dot)
    #[serde(default = "default_audio_extensions")]
    pub audio_extensions: Vec<String>,
}

fn default_image_extensions() -> Vec<String> {
    ["webp", "jpg", "jpeg", "png"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_audio_extensions() -> Vec<String> {
    ["mp3", "wav", "aac", "flac", "ogg"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for FormatConfig {
    fn default() -> Self {
        Self {
            image_extensions: default_image_extensions(),
            audio_extensions: default_audio_extensions(),
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub video: VideoConfig,
    #[serde(default)]
    pub audio: AudioConfig,
    #[serde(default)]
    pub workers: WorkerConfig,
    #[serde(default)]
    pub formats: FormatConfig,
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Parses the config file and handles missing optional fields with defaults.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::parse_toml(&content)
    }

    /// Parse configuration from a TOML string
    pub fn parse_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration
    ///
    /// Overrides the following values if environment variables are set:
    /// - SLIDECAST_FPS -> video.fps
    /// - SLIDECAST_FADE_IN_SECS -> audio.fade_in_secs
    /// - SLIDECAST_FADE_OUT_SECS -> audio.fade_out_secs
    /// - SLIDECAST_WORKERS -> workers.pool_size
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = env::var("SLIDECAST_FPS") {
            if let Ok(fps) = val.parse::<u32>() {
                self.video.fps = fps;
            }
        }

        if let Ok(val) = env::var("SLIDECAST_FADE_IN_SECS") {
            if let Ok(secs) = val.parse::<f64>() {
                self.audio.fade_in_secs = secs;
            }
        }

        if let Ok(val) = env::var("SLIDECAST_FADE_OUT_SECS") {
            if let Ok(secs) = val.parse::<f64>() {
                self.audio.fade_out_secs = secs;
            }
        }

        if let Ok(val) = env::var("SLIDECAST_WORKERS") {
            if let Ok(workers) = val.parse::<u32>() {
                self.workers.pool_size = workers;
            }
        }
    }

    /// Load configuration from file and apply environment overrides
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut config = Self::load_from_file(path)?;
        config.apply_env_overrides();
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::Mutex;

    // Mutex to ensure env var tests don't interfere with each other
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    /// Helper to clear all config-related env vars
    fn clear_env_vars() {
        env::remove_var("SLIDECAST_FPS");
        env::remove_var("SLIDECAST_FADE_IN_SECS");
        env::remove_var("SLIDECAST_FADE_OUT_SECS");
        env::remove_var("SLIDECAST_WORKERS");
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn prop_config_parses_all_sections(
            fps in 1u32..240,
            hold in 0.0f64..10.0,
            fade_in in 0.0f64..30.0,
            fade_out in 0.0f64..30.0,
            pool_size in 0u32..64,
        ) {
            let toml_str = format!(
                r#"
[video]
fps = {}
last_frame_hold_secs = {:?}

[audio]
fade_in_secs = {:?}
fade_out_secs = {:?}

[workers]
pool_size = {}

[formats]
image_extensions = ["png", "webp"]
audio_extensions = ["flac"]
"#,
                fps, hold, fade_in, fade_out, pool_size
            );

            let config = Config::parse_toml(&toml_str).expect("Valid TOML should parse");

            prop_assert_eq!(config.video.fps, fps);
            prop_assert!((config.video.last_frame_hold_secs - hold).abs() < 1e-9);
            prop_assert!((config.audio.fade_in_secs - fade_in).abs() < 1e-9);
            prop_assert!((config.audio.fade_out_secs - fade_out).abs() < 1e-9);
            prop_assert_eq!(config.workers.pool_size, pool_size);
            prop_assert_eq!(
                &config.formats.image_extensions,
                &vec!["png".to_string(), "webp".to_string()]
            );
            prop_assert_eq!(&config.formats.audio_extensions, &vec!["flac".to_string()]);
        }

        #[test]
        fn prop_env_overrides_fps(
            initial_fps in 1u32..120,
            override_fps in 1u32..240,
        ) {
            let _guard = ENV_MUTEX.lock().unwrap();
            clear_env_vars();

            let toml_str = format!(
                r#"
[video]
fps = {}
"#,
                initial_fps
            );

            let mut config = Config::parse_toml(&toml_str).expect("Valid TOML");

            env::set_var("SLIDECAST_FPS", override_fps.to_string());
            config.apply_env_overrides();
            clear_env_vars();

            prop_assert_eq!(config.video.fps, override_fps);
        }

        #[test]
        fn prop_env_overrides_fades(
            override_in in 0.0f64..60.0,
            override_out in 0.0f64..60.0,
        ) {
            let _guard = ENV_MUTEX.lock().unwrap();
            clear_env_vars();

            let mut config = Config::default();

            env::set_var("SLIDECAST_FADE_IN_SECS", override_in.to_string());
            env::set_var("SLIDECAST_FADE_OUT_SECS", override_out.to_string());
            config.apply_env_overrides();
            clear_env_vars();

            prop_assert!((config.audio.fade_in_secs - override_in).abs() < 1e-9);
            prop_assert!((config.audio.fade_out_secs - override_out).abs() < 1e-9);
        }

        #[test]
        fn prop_env_overrides_workers(
            initial_workers in 0u32..32,
            override_workers in 0u32..64,
        ) {
            let _guard = ENV_MUTEX.lock().unwrap();
            clear_env_vars();

            let toml_str = format!(
                r#"
[workers]
pool_size = {}
"#,
                initial_workers
            );

            let mut config = Config::parse_toml(&toml_str).expect("Valid TOML");

            env::set_var("SLIDECAST_WORKERS", override_workers.to_string());
            config.apply_env_overrides();
            clear_env_vars();

            prop_assert_eq!(config.workers.pool_size, override_workers);
        }
    }

    // Test that missing sections use defaults
    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::parse_toml("").expect("Empty TOML should parse");

        assert_eq!(config.video.fps, 4);
        assert!((config.video.last_frame_hold_secs - 0.0).abs() < 1e-9);
        assert!((config.audio.fade_in_secs - 2.0).abs() < 1e-9);
        assert!((config.audio.fade_out_secs - 2.0).abs() < 1e-9);
        assert_eq!(config.workers.pool_size, 0);
        assert_eq!(
            config.formats.image_extensions,
            vec!["webp", "jpg", "jpeg", "png"]
        );
        assert_eq!(
            config.formats.audio_extensions,
            vec!["mp3", "wav", "aac", "flac", "ogg"]
        );
    }

    // Test partial config with some sections missing
    #[test]
    fn test_partial_config_uses_defaults_for_missing() {
        let toml_str = r#"
[video]
fps = 12
"#;
        let config = Config::parse_toml(toml_str).expect("Partial TOML should parse");

        assert_eq!(config.video.fps, 12);
        assert!((config.video.last_frame_hold_secs - 0.0).abs() < 1e-9); // default
        assert!((config.audio.fade_in_secs - 2.0).abs() < 1e-9); // default
        assert_eq!(config.workers.pool_size, 0); // default
    }

    #[test]
    fn test_invalid_toml_is_rejected() {
        let result = Config::parse_toml("[video]\nfps = \"not a number\"");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }
}
