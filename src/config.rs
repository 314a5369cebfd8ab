//! Configuration for conbridge.
//!
//! This module provides TOML configuration file loading from
//! `~/.conbridge/config.toml`.
//!
//! # Configuration File
//!
//! ```toml
//! # Override the codepage negotiated from the locale (optional).
//! # Any codeset name the locale could carry works here.
//! codeset = "UTF-8"
//!
//! # Line-editor history entries kept in memory.
//! history_limit = 1000
//!
//! # Device the child reopens as its console input.
//! console_input = "/dev/conin"
//! ```
//!
//! A missing or unreadable file yields the defaults.

use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Codeset override for codepage negotiation
    pub codeset: Option<String>,
    /// Maximum line-editor history entries
    pub history_limit: usize,
    /// Console input device path handed to the child
    pub console_input: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            codeset: None,
            history_limit: 1000,
            console_input: "/dev/conin".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from file, falling back to defaults
    pub fn load() -> Self {
        if let Some(path) = Self::get_config_path() {
            if path.exists() {
                if let Ok(content) = fs::read_to_string(&path) {
                    if let Ok(config) = toml::from_str(&content) {
                        return config;
                    }
                }
            }
        }
        Self::default()
    }

    /// Get config file path
    fn get_config_path() -> Option<PathBuf> {
        home_dir().map(|home| home.join(".conbridge").join("config.toml"))
    }
}

fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(PathBuf::from)
}
