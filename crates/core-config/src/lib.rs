//! Configuration loading and parsing.
//!
//! Parses `scrollback.toml`, extracting the history sizing knobs and the
//! default colour pair. Unknown fields are ignored (TOML deserialization
//! tolerance) so the format can grow without breaking older files. Values
//! that parse but make no sense (a zero growth increment, a colour outside
//! `-2..=15`) are clamped back to their defaults with a warning rather than
//! rejected.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::{fs, path::PathBuf};
use tracing::{info, warn};

pub const DEFAULT_MAX_SIZE: usize = 64 * 1024;
pub const DEFAULT_INCREMENT: usize = 8 * 1024;
const COLOUR_MIN: i16 = -2;
const COLOUR_MAX: i16 = 15;

#[derive(Debug, Deserialize, Clone)]
pub struct HistoryConfig {
    #[serde(default = "HistoryConfig::default_max_size")]
    pub max_size: usize,
    #[serde(default = "HistoryConfig::default_increment")]
    pub increment: usize,
}

impl HistoryConfig {
    fn default_max_size() -> usize {
        DEFAULT_MAX_SIZE
    }
    fn default_increment() -> usize {
        DEFAULT_INCREMENT
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_size: Self::default_max_size(),
            increment: Self::default_increment(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ColourConfig {
    /// Colour codes: -1 is the terminal default, 0..=15 a palette index.
    #[serde(default = "ColourConfig::default_colour")]
    pub foreground: i16,
    #[serde(default = "ColourConfig::default_colour")]
    pub background: i16,
}

impl ColourConfig {
    fn default_colour() -> i16 {
        -1
    }
}

impl Default for ColourConfig {
    fn default() -> Self {
        Self {
            foreground: Self::default_colour(),
            background: Self::default_colour(),
        }
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct ConfigFile {
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub colours: ColourConfig,
}

#[derive(Debug, Default, Clone)]
pub struct Config {
    /// Original file string, when one was read.
    pub raw: Option<String>,
    pub file: ConfigFile,
}

/// Locate a configuration file: `scrollback.toml` in the working directory
/// first, then under the user configuration directory.
pub fn discover() -> Option<PathBuf> {
    let local = PathBuf::from("scrollback.toml");
    if local.is_file() {
        return Some(local);
    }
    let user = dirs::config_dir()?.join("scrollback").join("scrollback.toml");
    user.is_file().then_some(user)
}

/// Load configuration from `path`, or from discovery when `path` is `None`.
/// A missing file yields the defaults; a file that exists but fails to read
/// or parse is an error.
pub fn load_from(path: Option<PathBuf>) -> Result<Config> {
    let Some(path) = path.or_else(discover) else {
        info!(target: "config", "no configuration file; using defaults");
        return Ok(Config::default());
    };
    let raw = fs::read_to_string(&path)
        .with_context(|| format!("reading configuration file {}", path.display()))?;
    let mut file: ConfigFile = toml::from_str(&raw)
        .with_context(|| format!("parsing configuration file {}", path.display()))?;
    sanitise(&mut file);
    info!(
        target: "config",
        path = %path.display(),
        max_size = file.history.max_size,
        increment = file.history.increment,
        "configuration loaded"
    );
    Ok(Config {
        raw: Some(raw),
        file,
    })
}

fn sanitise(file: &mut ConfigFile) {
    if file.history.increment == 0 {
        warn!(target: "config", "history.increment of 0 replaced with default");
        file.history.increment = DEFAULT_INCREMENT;
    }
    if file.history.max_size == 0 {
        warn!(target: "config", "history.max_size of 0 replaced with default");
        file.history.max_size = DEFAULT_MAX_SIZE;
    }
    for (name, colour) in [
        ("foreground", &mut file.colours.foreground),
        ("background", &mut file.colours.background),
    ] {
        if !(COLOUR_MIN..=COLOUR_MAX).contains(colour) {
            warn!(target: "config", colour = *colour, "{name} colour out of range; using default");
            *colour = ColourConfig::default_colour();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(content: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scrollback.toml");
        let mut f = fs::File::create(&path).unwrap();
        f.write_all(content.as_bytes()).unwrap();
        (dir, path)
    }

    #[test]
    fn explicit_missing_path_is_an_error() {
        let cfg = load_from(Some(PathBuf::from("/nonexistent/scrollback.toml")));
        assert!(cfg.is_err());
    }

    #[test]
    fn parses_full_file() {
        let (_dir, path) = write_config(
            "[history]\nmax_size = 1024\nincrement = 128\n\n[colours]\nforeground = 7\nbackground = 0\n",
        );
        let cfg = load_from(Some(path)).unwrap();
        assert_eq!(cfg.file.history.max_size, 1024);
        assert_eq!(cfg.file.history.increment, 128);
        assert_eq!(cfg.file.colours.foreground, 7);
        assert_eq!(cfg.file.colours.background, 0);
        assert!(cfg.raw.is_some());
    }

    #[test]
    fn missing_sections_use_defaults() {
        let (_dir, path) = write_config("[history]\nmax_size = 4096\n");
        let cfg = load_from(Some(path)).unwrap();
        assert_eq!(cfg.file.history.max_size, 4096);
        assert_eq!(cfg.file.history.increment, DEFAULT_INCREMENT);
        assert_eq!(cfg.file.colours.foreground, -1);
    }

    #[test]
    fn unknown_fields_tolerated() {
        let (_dir, path) =
            write_config("[history]\nmax_size = 512\nshiny = true\n[future]\nx = 1\n");
        let cfg = load_from(Some(path)).unwrap();
        assert_eq!(cfg.file.history.max_size, 512);
    }

    #[test]
    fn nonsense_values_clamped() {
        let (_dir, path) = write_config("[history]\nincrement = 0\n[colours]\nforeground = 99\n");
        let cfg = load_from(Some(path)).unwrap();
        assert_eq!(cfg.file.history.increment, DEFAULT_INCREMENT);
        assert_eq!(cfg.file.colours.foreground, -1);
    }
}
