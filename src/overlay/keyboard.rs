//! On-screen keyboard that mirrors physical key presses

use crate::colors::Palette;
use crate::glow::{self, GlowConfig};
use crate::sound::Playable;
use crate::terminal::Terminal;
use crossterm::style::Color;
use rand::Rng;
use std::collections::HashMap;

/// Static description of one key cap
#[derive(Debug)]
pub struct KeySpec {
    /// Normalized identifier the key resolves from
    pub id: &'static str,
    pub label: &'static str,
    /// Label while Shift is held; single-character shifted labels also resolve to this key
    pub shifted: &'static str,
    /// Width in key units
    pub width: f32,
}

const fn k(id: &'static str, label: &'static str, shifted: &'static str, width: f32) -> KeySpec {
    KeySpec { id, label, shifted, width }
}

const fn letter(id: &'static str) -> KeySpec {
    KeySpec { id, label: id, shifted: id, width: 1.0 }
}

// US layout, one row per slice
const ROW_NUM: &[KeySpec] = &[
    k("`", "`", "~", 1.0), k("1", "1", "!", 1.0), k("2", "2", "@", 1.0), k("3", "3", "#", 1.0),
    k("4", "4", "$", 1.0), k("5", "5", "%", 1.0), k("6", "6", "^", 1.0), k("7", "7", "&", 1.0),
    k("8", "8", "*", 1.0), k("9", "9", "(", 1.0), k("0", "0", ")", 1.0), k("-", "-", "_", 1.0),
    k("=", "=", "+", 1.0), k("BACKSPACE", "Bksp", "Bksp", 2.0),
];
const ROW_TOP: &[KeySpec] = &[
    k("TAB", "Tab", "Tab", 1.5),
    letter("Q"), letter("W"), letter("E"), letter("R"), letter("T"),
    letter("Y"), letter("U"), letter("I"), letter("O"), letter("P"),
    k("[", "[", "{", 1.0), k("]", "]", "}", 1.0), k("\\", "\\", "|", 1.5),
];
const ROW_HOME: &[KeySpec] = &[
    k("CAPSLOCK", "Caps", "Caps", 1.75),
    letter("A"), letter("S"), letter("D"), letter("F"), letter("G"),
    letter("H"), letter("J"), letter("K"), letter("L"),
    k(";", ";", ":", 1.0), k("'", "'", "\"", 1.0), k("ENTER", "Enter", "Enter", 2.25),
];
const ROW_SHIFT: &[KeySpec] = &[
    k("SHIFT", "Shift", "Shift", 2.25),
    letter("Z"), letter("X"), letter("C"), letter("V"), letter("B"), letter("N"), letter("M"),
    k(",", ",", "<", 1.0), k(".", ".", ">", 1.0), k("/", "/", "?", 1.0),
    k("SHIFTRIGHT", "Shift", "Shift", 2.75),
];
const ROW_BOTTOM: &[KeySpec] = &[
    k("SPACE", "␣", "␣", 6.25), k("ARROWUP", "▲", "▲", 1.0), k("ARROWDOWN", "▼", "▼", 1.0),
];

pub const US_LAYOUT: &[&[KeySpec]] = &[ROW_NUM, ROW_TOP, ROW_HOME, ROW_SHIFT, ROW_BOTTOM];

/// Cells per key unit
const KEY_UNIT: f32 = 4.0;
const TRAY_PADDING: usize = 2;
const GLOW_LABEL: Color = Color::Rgb { r: 20, g: 20, b: 20 };

/// Normalize a raw key identifier for lookup: a lone space is "SPACE",
/// otherwise whitespace is dropped and letters are uppercased.
pub fn normalize(raw: &str) -> String {
    if raw == " " {
        return "SPACE".to_string();
    }
    raw.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_uppercase)
        .collect()
}

/// A key cap on screen. Highlighted exactly when `glow` is set.
#[derive(Debug)]
pub struct KeyCap {
    pub spec: &'static KeySpec,
    pub glow: Option<Color>,
}

impl KeyCap {
    fn cells(&self) -> usize {
        (self.spec.width * KEY_UNIT) as usize
    }
}

pub struct KeyInputVisualizer {
    rows: Vec<Vec<KeyCap>>,
    index: HashMap<String, (usize, usize)>,
    trigger: String,
    sound: Option<Box<dyn Playable>>,
    shifts_held: u8,
    last_diagnostic: Option<String>,
}

impl KeyInputVisualizer {
    pub fn new(layout: &'static [&'static [KeySpec]], trigger_key: &str) -> Self {
        let mut index = HashMap::new();
        let rows: Vec<Vec<KeyCap>> = layout
            .iter()
            .enumerate()
            .map(|(r, &row)| {
                row.iter()
                    .enumerate()
                    .map(|(c, spec)| {
                        index.entry(normalize(spec.id)).or_insert((r, c));
                        if spec.shifted.chars().count() == 1 {
                            index.entry(normalize(spec.shifted)).or_insert((r, c));
                        }
                        KeyCap { spec, glow: None }
                    })
                    .collect::<Vec<_>>()
            })
            .collect();

        Self {
            rows,
            index,
            trigger: normalize(trigger_key),
            sound: None,
            shifts_held: 0,
            last_diagnostic: None,
        }
    }

    fn resolve(&self, raw: &str) -> Option<(usize, usize)> {
        self.index.get(&normalize(raw)).copied()
    }

    /// Highlight the key per the current glow settings and play the sound on the
    /// trigger key. Returns false for keys with no on-screen cap.
    pub fn on_key_down<R: Rng + ?Sized>(&mut self, raw: &str, config: &GlowConfig, rng: &mut R) -> bool {
        let Some((r, c)) = self.resolve(raw) else {
            return false;
        };

        let cap = &mut self.rows[r][c];
        cap.glow = glow::resolve(config, rng).color();
        self.shifts_held |= shift_bit(cap.spec);

        if normalize(raw) == self.trigger {
            if let Some(sound) = self.sound.as_mut() {
                if let Err(e) = sound.restart() {
                    tracing::warn!(sound = sound.name(), error = %e, "sound playback failed");
                    self.last_diagnostic = Some(e.to_string());
                }
            }
        }
        true
    }

    /// Clear the key's highlight. Returns false for keys with no on-screen cap.
    pub fn on_key_up(&mut self, raw: &str) -> bool {
        let Some((r, c)) = self.resolve(raw) else {
            return false;
        };

        let cap = &mut self.rows[r][c];
        cap.glow = None;
        self.shifts_held &= !shift_bit(cap.spec);
        true
    }

    /// Clear every highlight, for when key releases can no longer be observed
    pub fn release_all(&mut self) {
        for cap in self.rows.iter_mut().flatten() {
            cap.glow = None;
        }
        self.shifts_held = 0;
    }

    /// Install a new sound, replacing any previous one
    pub fn set_sound_handle(&mut self, handle: Box<dyn Playable>) {
        tracing::info!(sound = handle.name(), trigger = %self.trigger, "trigger sound set");
        self.sound = Some(handle);
    }

    pub fn sound_name(&self) -> Option<&str> {
        self.sound.as_deref().map(|s| s.name())
    }

    pub fn trigger_key(&self) -> &str {
        &self.trigger
    }

    /// Most recent playback failure, if any
    pub fn last_diagnostic(&self) -> Option<&str> {
        self.last_diagnostic.as_deref()
    }

    /// Highlight currently applied to the key `raw` resolves to
    pub fn highlight(&self, raw: &str) -> Option<Color> {
        self.resolve(raw).and_then(|(r, c)| self.rows[r][c].glow)
    }

    pub fn highlighted(&self) -> usize {
        self.rows.iter().flatten().filter(|cap| cap.glow.is_some()).count()
    }

    fn shift_held(&self) -> bool {
        self.shifts_held != 0
    }

    /// Size of the keyboard tray in cells
    pub fn tray_size(&self) -> (usize, usize) {
        let widest = self.rows.iter().map(|row| row_cells(row)).max().unwrap_or(0);
        (widest + TRAY_PADDING * 2, self.rows.len() * 2 + 1)
    }

    /// Draw the tray along the bottom edge, centered horizontally
    pub fn draw(&self, term: &mut Terminal, palette: &Palette) {
        let (w, h) = term.size();
        let (tray_w, tray_h) = self.tray_size();
        let tray_x = (w as usize).saturating_sub(tray_w) / 2;
        let tray_y = (h as usize).saturating_sub(tray_h + 1);

        term.fill_bg(tray_x as i32, tray_y as i32, tray_w, tray_h, Some(palette.tray));

        let shifted = self.shift_held();
        for (r, row) in self.rows.iter().enumerate() {
            let y = (tray_y + 1 + r * 2) as i32;
            let mut x = tray_x + (tray_w - row_cells(row)) / 2;

            for cap in row {
                let cells = cap.cells();
                let bg = cap.glow.unwrap_or(palette.key);
                term.fill_bg(x as i32, y, cells, 1, Some(bg));

                let label = if shifted { cap.spec.shifted } else { cap.spec.label };
                let text: String = label.chars().take(cells).collect();
                let label_x = x + cells.saturating_sub(text.chars().count()) / 2;
                let fg = if cap.glow.is_some() { GLOW_LABEL } else { palette.label };
                term.set_str(label_x as i32, y, &text, Some(fg), true);

                x += cells + 1;
            }
        }
    }
}

fn row_cells(row: &[KeyCap]) -> usize {
    row.iter().map(KeyCap::cells).sum::<usize>() + row.len().saturating_sub(1)
}

fn shift_bit(spec: &KeySpec) -> u8 {
    match spec.id {
        "SHIFT" => 0b01,
        "SHIFTRIGHT" => 0b10,
        _ => 0,
    }
}

/// Render the keyboard once, unlit, for print mode
pub fn print_layout(width: u16, palette: &Palette, plain: bool) -> String {
    let keyboard = KeyInputVisualizer::new(US_LAYOUT, "");
    let (_, tray_h) = keyboard.tray_size();
    let mut term = Terminal::offscreen(width, (tray_h + 1) as u16);
    keyboard.draw(&mut term, palette);
    if plain {
        term.to_plain_string()
    } else {
        term.to_ansi_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::colors::Theme;
    use crate::glow::FIXED_GLOW;
    use crate::sound::SoundError;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::cell::Cell;
    use std::rc::Rc;

    struct CountingSound {
        plays: Rc<Cell<usize>>,
    }

    impl Playable for CountingSound {
        fn restart(&mut self) -> Result<(), SoundError> {
            self.plays.set(self.plays.get() + 1);
            Ok(())
        }

        fn name(&self) -> &str {
            "counting"
        }
    }

    struct BlockedSound {
        attempts: Rc<Cell<usize>>,
    }

    impl Playable for BlockedSound {
        fn restart(&mut self) -> Result<(), SoundError> {
            self.attempts.set(self.attempts.get() + 1);
            Err(SoundError::Empty("blocked.wav".into()))
        }

        fn name(&self) -> &str {
            "blocked"
        }
    }

    fn fixed() -> GlowConfig {
        GlowConfig { fixed_yellow: true, random_hue: false }
    }

    fn rng() -> StdRng {
        StdRng::seed_from_u64(11)
    }

    #[test]
    fn normalize_handles_case_space_and_inner_whitespace() {
        assert_eq!(normalize("a"), "A");
        assert_eq!(normalize(" "), "SPACE");
        assert_eq!(normalize("Caps Lock"), "CAPSLOCK");
        assert_eq!(normalize("Enter"), "ENTER");
        assert_eq!(normalize("!"), "!");
    }

    #[test]
    fn keys_resolve_case_insensitively() {
        let mut kb = KeyInputVisualizer::new(US_LAYOUT, "o");
        let mut rng = rng();
        for raw in ["a", "Enter", " ", "CapsLock", "Backspace", "Tab", "ArrowUp", "ArrowDown", "\\"] {
            assert!(kb.on_key_down(raw, &fixed(), &mut rng), "{} did not resolve", raw);
            assert_eq!(kb.highlight(raw), Some(FIXED_GLOW));
        }
        assert_eq!(kb.highlight("A"), Some(FIXED_GLOW));
        assert_eq!(kb.highlight("ENTER"), Some(FIXED_GLOW));
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let mut kb = KeyInputVisualizer::new(US_LAYOUT, "o");
        let mut rng = rng();
        assert!(!kb.on_key_down("F13", &fixed(), &mut rng));
        assert!(!kb.on_key_down("Control", &fixed(), &mut rng));
        assert!(!kb.on_key_up("Meta"));
        assert_eq!(kb.highlighted(), 0);
    }

    #[test]
    fn release_clears_even_after_config_change() {
        let mut kb = KeyInputVisualizer::new(US_LAYOUT, "o");
        let mut rng = rng();
        let mut config = fixed();
        kb.on_key_down("k", &config, &mut rng);
        config.set_fixed_glow(false);
        config.set_random_glow(true);
        assert!(kb.on_key_up("K"));
        assert_eq!(kb.highlight("k"), None);
    }

    #[test]
    fn release_is_idempotent() {
        let mut kb = KeyInputVisualizer::new(US_LAYOUT, "o");
        assert!(kb.on_key_up("z"));
        assert!(kb.on_key_up("z"));
        assert_eq!(kb.highlighted(), 0);
    }

    #[test]
    fn repeated_press_keeps_single_highlight() {
        let mut kb = KeyInputVisualizer::new(US_LAYOUT, "o");
        let mut rng = rng();
        for _ in 0..5 {
            kb.on_key_down("j", &fixed(), &mut rng);
        }
        assert_eq!(kb.highlighted(), 1);
        assert_eq!(kb.highlight("j"), Some(FIXED_GLOW));
    }

    #[test]
    fn no_glow_toggle_leaves_key_unlit() {
        let mut kb = KeyInputVisualizer::new(US_LAYOUT, "o");
        let mut rng = rng();
        assert!(kb.on_key_down("a", &GlowConfig::default(), &mut rng));
        assert_eq!(kb.highlight("a"), None);
    }

    #[test]
    fn fixed_glow_wins_when_both_toggles_are_on() {
        let mut kb = KeyInputVisualizer::new(US_LAYOUT, "o");
        let mut rng = rng();
        let mut config = GlowConfig::default();
        config.set_fixed_glow(true);
        config.set_random_glow(true);
        kb.on_key_down("A", &config, &mut rng);
        assert_eq!(kb.highlight("A"), Some(FIXED_GLOW));
    }

    #[test]
    fn shifted_symbols_share_the_key() {
        let mut kb = KeyInputVisualizer::new(US_LAYOUT, "o");
        let mut rng = rng();
        kb.on_key_down("!", &fixed(), &mut rng);
        assert_eq!(kb.highlight("1"), Some(FIXED_GLOW));
        kb.on_key_up("1");
        assert_eq!(kb.highlight("!"), None);
    }

    #[test]
    fn shift_keys_are_distinct() {
        let mut kb = KeyInputVisualizer::new(US_LAYOUT, "o");
        let mut rng = rng();
        kb.on_key_down("ShiftRight", &fixed(), &mut rng);
        assert_eq!(kb.highlight("Shift"), None);
        assert_eq!(kb.highlight("ShiftRight"), Some(FIXED_GLOW));
        assert!(kb.shift_held());
        kb.on_key_up("ShiftRight");
        assert!(!kb.shift_held());
    }

    #[test]
    fn trigger_key_restarts_sound_each_press() {
        let mut kb = KeyInputVisualizer::new(US_LAYOUT, "o");
        let mut rng = rng();
        let plays = Rc::new(Cell::new(0));
        kb.set_sound_handle(Box::new(CountingSound { plays: Rc::clone(&plays) }));

        kb.on_key_down("o", &fixed(), &mut rng);
        kb.on_key_up("o");
        kb.on_key_down("O", &fixed(), &mut rng);
        assert_eq!(plays.get(), 2);

        kb.on_key_down("p", &fixed(), &mut rng);
        assert_eq!(plays.get(), 2);
    }

    #[test]
    fn trigger_without_sound_only_highlights() {
        let mut kb = KeyInputVisualizer::new(US_LAYOUT, "o");
        let mut rng = rng();
        assert!(kb.on_key_down("o", &fixed(), &mut rng));
        assert_eq!(kb.highlight("o"), Some(FIXED_GLOW));
        assert!(kb.last_diagnostic().is_none());
    }

    #[test]
    fn playback_failure_is_absorbed() {
        let mut kb = KeyInputVisualizer::new(US_LAYOUT, "o");
        let mut rng = rng();
        let attempts = Rc::new(Cell::new(0));
        kb.set_sound_handle(Box::new(BlockedSound { attempts: Rc::clone(&attempts) }));

        assert!(kb.on_key_down("o", &fixed(), &mut rng));
        assert!(kb.on_key_down("o", &fixed(), &mut rng));
        assert_eq!(attempts.get(), 2);
        assert!(kb.last_diagnostic().is_some_and(|d| d.contains("blocked.wav")));

        assert!(kb.on_key_down("q", &fixed(), &mut rng));
        assert_eq!(kb.highlight("o"), Some(FIXED_GLOW));
        assert_eq!(kb.highlight("q"), Some(FIXED_GLOW));
    }

    #[test]
    fn new_sound_replaces_old_one() {
        let mut kb = KeyInputVisualizer::new(US_LAYOUT, "Enter");
        let mut rng = rng();
        let first = Rc::new(Cell::new(0));
        let second = Rc::new(Cell::new(0));
        kb.set_sound_handle(Box::new(CountingSound { plays: Rc::clone(&first) }));
        kb.set_sound_handle(Box::new(CountingSound { plays: Rc::clone(&second) }));

        kb.on_key_down("enter", &fixed(), &mut rng);
        assert_eq!(first.get(), 0);
        assert_eq!(second.get(), 1);
    }

    #[test]
    fn release_all_clears_everything() {
        let mut kb = KeyInputVisualizer::new(US_LAYOUT, "o");
        let mut rng = rng();
        for raw in ["a", "s", "d", "Shift"] {
            kb.on_key_down(raw, &fixed(), &mut rng);
        }
        kb.release_all();
        assert_eq!(kb.highlighted(), 0);
        assert!(!kb.shift_held());
    }

    #[test]
    fn draw_paints_glow_behind_label() {
        let mut kb = KeyInputVisualizer::new(US_LAYOUT, "o");
        let mut rng = rng();
        kb.on_key_down("g", &fixed(), &mut rng);

        let mut term = Terminal::offscreen(100, 20);
        kb.draw(&mut term, &Theme::Light.palette());

        let lit: Vec<char> = (0..20)
            .flat_map(|y| (0..100).map(move |x| (x, y)))
            .filter_map(|(x, y)| term.cell(x, y))
            .filter(|cell| cell.bg == Some(FIXED_GLOW) && cell.ch != ' ')
            .map(|cell| cell.ch)
            .collect();
        assert_eq!(lit, vec!['G']);
    }

    #[test]
    fn print_layout_lists_every_row() {
        let text = print_layout(100, &Theme::Dark.palette(), true);
        for label in ["Bksp", "Tab", "Caps", "Shift", "␣"] {
            assert!(text.contains(label), "missing {}", label);
        }
    }
}
