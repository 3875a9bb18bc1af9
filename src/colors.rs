use crossterm::style::Color;
use serde::Deserialize;

/// Colour theme for the keyboard tray and widget boxes
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

/// Resolved colours for one theme
#[derive(Clone, Copy, Debug)]
pub struct Palette {
    pub tray: Color,
    pub key: Color,
    pub label: Color,
    pub border: Color,
    pub text: Color,
}

impl Theme {
    pub fn palette(self) -> Palette {
        match self {
            Theme::Light => Palette {
                tray: rgb(236, 236, 236),
                key: rgb(250, 250, 250),
                label: rgb(40, 40, 40),
                border: rgb(200, 200, 200),
                text: rgb(51, 51, 51),
            },
            Theme::Dark => Palette {
                tray: rgb(50, 50, 50),
                key: rgb(72, 72, 72),
                label: rgb(230, 230, 230),
                border: rgb(110, 110, 110),
                text: rgb(220, 220, 220),
            },
        }
    }
}

/// Helper to create RGB colors
pub fn rgb(r: u8, g: u8, b: u8) -> Color {
    Color::Rgb { r, g, b }
}

/// HSL to RGB. `hue` in degrees (wrapped into [0, 360)), `sat` and `light` in [0, 1].
pub fn hsl(hue: f32, sat: f32, light: f32) -> Color {
    let h = hue.rem_euclid(360.0) / 60.0;
    let c = (1.0 - (2.0 * light - 1.0).abs()) * sat;
    let x = c * (1.0 - (h % 2.0 - 1.0).abs());
    let m = light - c / 2.0;

    let (r, g, b) = match h as u32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };

    let to_u8 = |v: f32| ((v + m) * 255.0).round().clamp(0.0, 255.0) as u8;
    rgb(to_u8(r), to_u8(g), to_u8(b))
}

pub fn from_triple([r, g, b]: [u8; 3]) -> Color {
    rgb(r, g, b)
}

/// Linear blend between two RGB triples, `t` in [0, 1]
pub fn blend(a: [u8; 3], b: [u8; 3], t: f32) -> [u8; 3] {
    let t = t.clamp(0.0, 1.0);
    let lerp = |x: u8, y: u8| (x as f32 + (y as f32 - x as f32) * t).round() as u8;
    [lerp(a[0], b[0]), lerp(a[1], b[1]), lerp(a[2], b[2])]
}

pub fn mix(a: [u8; 3], b: [u8; 3], t: f32) -> Color {
    from_triple(blend(a, b, t))
}

/// Glyph colour for a translucent white particle drawn over `under`
pub fn translucent_white(under: [u8; 3], opacity: f32) -> Color {
    mix(under, [255, 255, 255], opacity)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hsl_primaries() {
        assert_eq!(hsl(0.0, 1.0, 0.5), rgb(255, 0, 0));
        assert_eq!(hsl(120.0, 1.0, 0.5), rgb(0, 255, 0));
        assert_eq!(hsl(240.0, 1.0, 0.5), rgb(0, 0, 255));
        assert_eq!(hsl(60.0, 1.0, 0.5), rgb(255, 255, 0));
    }

    #[test]
    fn hsl_wraps_hue() {
        assert_eq!(hsl(360.0, 1.0, 0.5), hsl(0.0, 1.0, 0.5));
        assert_eq!(hsl(-120.0, 1.0, 0.5), hsl(240.0, 1.0, 0.5));
    }

    #[test]
    fn mix_endpoints() {
        assert_eq!(mix([0, 0, 0], [200, 100, 50], 0.0), rgb(0, 0, 0));
        assert_eq!(mix([0, 0, 0], [200, 100, 50], 1.0), rgb(200, 100, 50));
        assert_eq!(mix([0, 0, 0], [200, 100, 50], 7.0), rgb(200, 100, 50));
    }

    #[test]
    fn zero_opacity_matches_background() {
        assert_eq!(translucent_white([10, 20, 30], 0.0), rgb(10, 20, 30));
    }
}
