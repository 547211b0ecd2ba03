//! # rally-settings
//!
//! Configuration for the Rally lobby server, loaded in layers (lowest to
//! highest priority):
//! 1. **Compiled defaults**: [`RallySettings::default()`]
//! 2. **Settings file**: `~/.rally/settings.json` or an explicit path
//! 3. **Environment variables**: `RALLY_*` (plus `NODE_ENV` for the mode)
//!
//! The binary applies CLI flags on top of the result.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{
    apply_env_overrides, apply_overrides_from, deep_merge, load_settings, load_settings_from_path,
    settings_path,
};
pub use types::{AssetMode, LoggingSettings, RallySettings, ServerSettings};
