//! Cross-platform application paths using the `dirs` crate.
//!
//! Layout:
//!
//! Config dir (settings):
//!   Windows: %APPDATA%\text-to-voice\
//!   macOS:   ~/Library/Application Support/text-to-voice/
//!   Linux:   ~/.config/text-to-voice/

use std::path::PathBuf;

/// Environment variable that points at an explicit `settings.toml`.
pub const CONFIG_PATH_ENV: &str = "TTV_CONFIG";

/// Holds all resolved application directory/file paths.
#[derive(Debug, Clone)]
pub struct AppPaths {
    /// Directory for `settings.toml`.
    pub config_dir: PathBuf,
    /// Full path to `settings.toml`.
    pub settings_file: PathBuf,
}

impl AppPaths {
    const APP_NAME: &'static str = "text-to-voice";

    /// Resolves all paths using the `dirs` crate.
    ///
    /// Falls back to the current directory if the platform cannot provide a
    /// standard path.
    pub fn new() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME);

        let settings_file = config_dir.join("settings.toml");

        Self {
            config_dir,
            settings_file,
        }
    }

    /// Settings file to load: `$TTV_CONFIG` when set and non-empty,
    /// otherwise the platform default.
    pub fn resolve_settings_file(&self) -> PathBuf {
        self.resolve_with(|key| std::env::var(key).ok())
    }

    fn resolve_with(&self, lookup: impl Fn(&str) -> Option<String>) -> PathBuf {
        match lookup(CONFIG_PATH_ENV) {
            Some(path) if !path.trim().is_empty() => PathBuf::from(path),
            _ => self.settings_file.clone(),
        }
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_are_non_empty() {
        let paths = AppPaths::new();
        assert!(paths.config_dir.to_str().is_some_and(|s| !s.is_empty()));
        assert!(paths
            .settings_file
            .file_name()
            .is_some_and(|n| n == "settings.toml"));
        assert!(paths.config_dir.ends_with("text-to-voice"));
    }

    #[test]
    fn explicit_settings_path_wins_when_set() {
        let paths = AppPaths::new();
        let explicit = paths.resolve_with(|_| Some("/etc/ttv/settings.toml".into()));
        assert_eq!(explicit, PathBuf::from("/etc/ttv/settings.toml"));

        assert_eq!(paths.resolve_with(|_| Some("  ".into())), paths.settings_file);
        assert_eq!(paths.resolve_with(|_| None), paths.settings_file);
    }
}
