//! Highlight colour policy for pressed keys

use crate::colors::hsl;
use crossterm::style::Color;
use rand::Rng;

/// The fixed highlight colour
pub const FIXED_GLOW: Color = Color::Rgb { r: 255, g: 255, b: 0 };

const HUE_SATURATION: f32 = 1.0;
const HUE_LIGHTNESS: f32 = 0.5;

/// User-set glow toggles. Both may be on at once; `resolve` gives fixed yellow precedence.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GlowConfig {
    pub fixed_yellow: bool,
    pub random_hue: bool,
}

impl GlowConfig {
    pub fn set_fixed_glow(&mut self, on: bool) {
        self.fixed_yellow = on;
    }

    pub fn set_random_glow(&mut self, on: bool) {
        self.random_hue = on;
    }
}

/// Outcome of the policy for one key press
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Glow {
    Off,
    Fixed,
    /// Hue in degrees, [0, 360)
    Hue(f32),
}

impl Glow {
    /// Colour to paint on the key, `None` for no highlight
    pub fn color(self) -> Option<Color> {
        match self {
            Glow::Off => None,
            Glow::Fixed => Some(FIXED_GLOW),
            Glow::Hue(h) => Some(hsl(h, HUE_SATURATION, HUE_LIGHTNESS)),
        }
    }
}

/// Pick the glow for a key press. Random hues are resampled on every call.
pub fn resolve<R: Rng + ?Sized>(config: &GlowConfig, rng: &mut R) -> Glow {
    if config.fixed_yellow {
        Glow::Fixed
    } else if config.random_hue {
        Glow::Hue(rng.gen_range(0.0..360.0))
    } else {
        Glow::Off
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn fixed_wins_over_random() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut config = GlowConfig::default();
        config.set_fixed_glow(true);
        config.set_random_glow(true);
        for _ in 0..50 {
            assert_eq!(resolve(&config, &mut rng), Glow::Fixed);
        }
        assert_eq!(Glow::Fixed.color(), Some(FIXED_GLOW));
    }

    #[test]
    fn random_hue_stays_in_range_and_varies() {
        let mut rng = StdRng::seed_from_u64(42);
        let config = GlowConfig { fixed_yellow: false, random_hue: true };
        let mut hues = Vec::new();
        for _ in 0..200 {
            match resolve(&config, &mut rng) {
                Glow::Hue(h) => {
                    assert!((0.0..360.0).contains(&h), "hue out of range: {}", h);
                    hues.push(h);
                }
                other => panic!("expected a hue, got {:?}", other),
            }
        }
        hues.sort_by(|a, b| a.partial_cmp(b).unwrap());
        hues.dedup();
        assert!(hues.len() > 100);
    }

    #[test]
    fn nothing_enabled_is_off() {
        let mut rng = StdRng::seed_from_u64(1);
        let glow = resolve(&GlowConfig::default(), &mut rng);
        assert_eq!(glow, Glow::Off);
        assert_eq!(glow.color(), None);
    }

    #[test]
    fn disabling_fixed_falls_back_to_random() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut config = GlowConfig { fixed_yellow: true, random_hue: true };
        config.set_fixed_glow(false);
        assert!(matches!(resolve(&config, &mut rng), Glow::Hue(_)));
    }
}
