use crate::colors::Theme;
use crate::input::SYNTH_RELEASE_AFTER;
use crate::overlay::backdrop::Scene;
use crate::overlay::clock;
use crate::settings::Settings;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_TRIGGER_KEY: &str = "o";
pub const DEFAULT_GLYPH: char = '❄';
pub const DEFAULT_TIME_STEP: f32 = 0.03;
const DEFAULT_FRAME: Duration = Duration::from_millis(30);
const MIN_FRAME: Duration = Duration::from_millis(5);
const MAX_FRAME: Duration = Duration::from_secs(1);

/// Configuration for an overlay session
#[derive(Clone, Debug)]
pub struct OverlayConfig {
    pub trigger_key: String,
    pub sound: Option<PathBuf>,
    pub fixed_glow: bool,
    pub random_glow: bool,
    pub snow: bool,
    /// Only mirror keys typed into this terminal
    pub local_only: bool,
    pub time_step: f32,
    /// Quiet period after which a key counts as released, for terminals that
    /// only report presses
    pub release_after: Duration,
    pub seed: Option<u64>,
    pub debug: bool,
    pub glyph: char,
    pub clock_format: String,
    pub theme: Theme,
    pub backdrops: Vec<Scene>,
}

impl OverlayConfig {
    /// Defaults filled in from the settings file; toggles start off
    pub fn from_settings(settings: Settings) -> Self {
        Self {
            trigger_key: settings
                .trigger_key
                .unwrap_or_else(|| DEFAULT_TRIGGER_KEY.to_string()),
            sound: settings.sound,
            fixed_glow: false,
            random_glow: false,
            snow: false,
            local_only: false,
            time_step: DEFAULT_TIME_STEP,
            release_after: settings
                .release_after_ms
                .map(Duration::from_millis)
                .unwrap_or(SYNTH_RELEASE_AFTER),
            seed: None,
            debug: false,
            glyph: settings.glyph.unwrap_or(DEFAULT_GLYPH),
            clock_format: settings
                .clock_format
                .unwrap_or_else(|| clock::DEFAULT_FORMAT.to_string()),
            theme: settings.theme,
            backdrops: settings.backdrops,
        }
    }

    /// Frame time, clamped to 5ms..1s; steps that are not a valid duration get the default
    pub fn frame_time(&self) -> Duration {
        Duration::try_from_secs_f32(self.time_step)
            .unwrap_or(DEFAULT_FRAME)
            .clamp(MIN_FRAME, MAX_FRAME)
    }
}
