use crate::colors::Theme;
use crate::overlay::backdrop::Scene;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Startup preferences from `config.toml`. Read once; never written back.
#[derive(Debug, Default, Deserialize)]
pub struct Settings {
    pub trigger_key: Option<String>,
    pub sound: Option<PathBuf>,
    pub glyph: Option<char>,
    pub clock_format: Option<String>,
    /// Key release quiet period for terminals that only report presses
    pub release_after_ms: Option<u64>,
    #[serde(default)]
    pub theme: Theme,
    #[serde(default)]
    pub backdrops: Vec<Scene>,
}

impl Settings {
    pub fn load() -> Self {
        Self::load_from(&Self::config_path())
    }

    /// Missing or unreadable files give defaults
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match fs::read_to_string(path) {
            Ok(content) => Self::parse(&content).unwrap_or_else(|e| {
                tracing::warn!(path = %path.display(), error = %e, "ignoring malformed settings");
                Self::default()
            }),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "cannot read settings");
                Self::default()
            }
        }
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("keyglow")
            .join("config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_file_gives_defaults() {
        let settings = Settings::parse("").unwrap();
        assert!(settings.trigger_key.is_none());
        assert_eq!(settings.theme, Theme::Light);
        assert!(settings.backdrops.is_empty());
    }

    #[test]
    fn full_file_parses() {
        let settings = Settings::parse(
            r#"
            trigger_key = "Enter"
            sound = "/home/me/click.ogg"
            glyph = "*"
            clock_format = "%I:%M %p"
            theme = "dark"

            [[backdrops]]
            name = "night"
            top = [0, 0, 20]
            bottom = [10, 10, 60]
            "#,
        )
        .unwrap();
        assert_eq!(settings.trigger_key.as_deref(), Some("Enter"));
        assert_eq!(settings.sound, Some(PathBuf::from("/home/me/click.ogg")));
        assert_eq!(settings.glyph, Some('*'));
        assert_eq!(settings.theme, Theme::Dark);
        assert_eq!(settings.backdrops.len(), 1);
        assert_eq!(settings.backdrops[0].bottom, [10, 10, 60]);
    }

    #[test]
    fn malformed_file_falls_back_to_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "theme = 42").unwrap();
        let settings = Settings::load_from(file.path());
        assert_eq!(settings.theme, Theme::Light);
    }

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load_from(&dir.path().join("config.toml"));
        assert!(settings.sound.is_none());
    }
}
