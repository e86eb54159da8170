use anyhow::Context;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize)]
pub struct Config {
    pub version: u32,
    pub database: Database,
    #[serde(default)]
    pub library: Library,
    pub http: HttpConfig,
    #[serde(default)]
    pub playback: Playback,
    #[serde(default)]
    pub auth: Auth,
}

impl Config {
    pub fn load(path: &Path) -> anyhow::Result<Config> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.to_string_lossy()))?;
        toml::from_str(&contents).with_context(|| "Failed to parse config TOML")
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    pub bind_addr: String,
    pub port: u16,
    /// Size of the ranking when the client does not ask for one
    #[serde(default = "default_top_n")]
    pub top_n: usize,
}

fn default_top_n() -> usize {
    5
}

#[derive(Debug, Deserialize)]
pub struct Database {
    pub in_memory: bool,
    pub path: Option<PathBuf>,
}

/// Where tracks and covers live on disk and how they are exposed over http.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Library {
    pub music_dir: PathBuf,
    pub covers_dir: PathBuf,
    pub public_dir: PathBuf,
    /// Cover locator used when a track has no cover of its own
    pub default_cover: String,
    pub recursive: bool,
    pub follow_symlinks: bool,
}

impl Default for Library {
    fn default() -> Self {
        Self {
            music_dir: PathBuf::from("public/music"),
            covers_dir: PathBuf::from("public/covers"),
            public_dir: PathBuf::from("public"),
            default_cover: "covers/default.jpg".to_string(),
            recursive: false,
            follow_symlinks: false,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Playback {
    /// Whether a loop restart counts as a new play
    pub count_loop_replays: bool,
    /// Fixed seed for shuffle, random when absent
    pub shuffle_seed: Option<u64>,
}

impl Default for Playback {
    fn default() -> Self {
        Self {
            count_loop_replays: true,
            shuffle_seed: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Auth {
    /// Header set by the authenticating reverse proxy
    pub user_header: Option<String>,
}
