//! Reel configuration system
//!
//! This crate provides centralized configuration management for the player,
//! loading settings from `reel.toml` with environment variable overrides.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Main configuration structure for the player
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ReelConfig {
    /// Embedded playback engine settings
    pub engine: EngineConfig,
    /// Drawing surface and render bridge settings
    pub render: RenderConfig,
    /// Metadata (dislike count) lookup settings
    pub lookup: LookupConfig,
    /// Demo host window settings
    pub demo: DemoConfig,
}

/// Playback engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Explicit path to the engine shared library (file or directory)
    pub library_path: Option<PathBuf>,
    /// Hardware decoding mode passed to the engine (`no`, `auto`, `auto-safe`, ...)
    pub hwdec: String,
    /// Minimum engine log level forwarded into our logs (`no`, `error`, `warn`, `info`, `v`, `debug`)
    pub log_level: String,
    /// Seconds of demuxer read-ahead cache
    pub cache_secs: Option<u32>,
    /// Keep the last frame on screen at end of file
    pub keep_open: bool,
    /// Start playing as soon as the first frame is ready
    pub autoplay: bool,
    /// Extra engine options applied verbatim before initialization
    pub options: BTreeMap<String, String>,
}

/// Render surface configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Requested GL major version
    pub gl_major: u8,
    /// Requested GL minor version
    pub gl_minor: u8,
    /// Request an OpenGL ES context instead of desktop GL
    pub gles: bool,
    /// Upper bound for a single engine render call before the frame is skipped
    pub frame_deadline_ms: u64,
    /// Whether the surface is opaque to the compositor
    pub opaque: bool,
}

/// Metadata lookup configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LookupConfig {
    /// Enable dislike count lookups
    pub enabled: bool,
    /// Endpoint queried as `{endpoint}?videoId={id}`
    pub endpoint: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

/// Demo application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    /// Media identifier (URL or path) to open on startup
    pub media: Option<String>,
    /// Initial window width in logical pixels
    pub width: u32,
    /// Initial window height in logical pixels
    pub height: u32,
    /// Window title
    pub title: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            library_path: None,
            hwdec: "auto-safe".to_string(),
            log_level: "warn".to_string(),
            cache_secs: None,
            keep_open: false,
            autoplay: true,
            options: BTreeMap::new(),
        }
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            gl_major: 3,
            gl_minor: 3,
            gles: false,
            frame_deadline_ms: 16,
            opaque: true,
        }
    }
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: "https://returnyoutubedislikeapi.com/votes".to_string(),
            timeout_secs: 10,
        }
    }
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            media: None,
            width: 1280,
            height: 720,
            title: "Reel".to_string(),
        }
    }
}

impl RenderConfig {
    /// Frame deadline as a [`std::time::Duration`].
    pub fn frame_deadline(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.frame_deadline_ms)
    }
}

fn env_flag(val: &str) -> bool {
    val == "1" || val.eq_ignore_ascii_case("true") || val.eq_ignore_ascii_case("yes")
}

impl ReelConfig {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    /// * `path` - Path to the reel.toml configuration file
    ///
    /// # Returns
    /// * `Ok(ReelConfig)` - Successfully loaded configuration
    /// * `Err(String)` - Error message if loading failed
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| format!("Failed to read config file: {}", e))?;

        toml::from_str(&content).map_err(|e| format!("Failed to parse config file: {}", e))
    }

    /// Load configuration from the default location (reel.toml in the current directory)
    /// or return default configuration if file doesn't exist
    pub fn load_or_default() -> Self {
        match Self::load_from_file("reel.toml") {
            Ok(config) => config,
            Err(e) => {
                if Path::new("reel.toml").exists() {
                    log::warn!("ignoring reel.toml: {}", e);
                }
                Self::default()
            }
        }
    }

    /// Merge configuration with environment variables
    ///
    /// Environment variables take precedence over configuration file values.
    pub fn merge_with_env(&mut self) {
        if let Ok(media) = std::env::var("REEL_MEDIA") {
            self.demo.media = Some(media);
        }

        // Engine settings
        if let Ok(path) = std::env::var("MPV_PATH") {
            self.engine.library_path = Some(PathBuf::from(path));
        }
        if let Ok(hwdec) = std::env::var("REEL_HWDEC") {
            self.engine.hwdec = hwdec;
        }
        if let Ok(level) = std::env::var("REEL_MPV_LOG") {
            self.engine.log_level = level;
        }
        if let Ok(val) = std::env::var("REEL_AUTOPLAY") {
            self.engine.autoplay = env_flag(&val);
        }

        // Render settings
        if let Ok(val) = std::env::var("REEL_FRAME_DEADLINE_MS") {
            if let Ok(ms) = val.parse::<u64>() {
                self.render.frame_deadline_ms = ms;
            }
        }
        if let Ok(val) = std::env::var("REEL_GLES") {
            self.render.gles = env_flag(&val);
        }

        if let Ok(endpoint) = std::env::var("REEL_LOOKUP_ENDPOINT") {
            self.lookup.endpoint = endpoint;
            self.lookup.enabled = true;
        }
    }

    /// Load configuration with environment variable overrides
    ///
    /// 1. Load from reel.toml (or use defaults if not found)
    /// 2. Override with environment variables if present
    pub fn load() -> Self {
        let mut config = Self::load_or_default();
        config.merge_with_env();
        config
    }
}
