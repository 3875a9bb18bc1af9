//! The overlay session: one cooperative loop that drains input, applies controls,
//! advances timers and redraws.
//!
//! Nothing here runs concurrently. evdev listener threads only forward events over
//! a channel; every state change happens on this loop, one event at a time.

pub mod backdrop;
pub mod clock;
pub mod keyboard;
pub mod panel;
pub mod particles;

use crate::colors::Palette;
use crate::config::OverlayConfig;
use crate::glow::GlowConfig;
use crate::help;
use crate::input::{self, GlobalInput, KeyAction, KeyEvent, ReleaseSynth};
use crate::sound;
use crate::terminal::Terminal;
use backdrop::Backdrop;
use chrono::Local;
use clock::Clock;
use crossterm::event::{Event, KeyCode, KeyEventKind, MouseButton, MouseEventKind};
use keyboard::{KeyInputVisualizer, US_LAYOUT};
use panel::{Control, PanelArea, PanelView, PathPrompt, PromptOutcome};
use particles::ParticleManager;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::io;
use std::path::Path;
use std::time::{Duration, Instant};

/// Where visualized key events come from
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputMode {
    /// Every keyboard on the system, via evdev
    Global,
    /// Keys typed into this terminal only
    Local,
}

impl InputMode {
    fn label(self) -> &'static str {
        match self {
            InputMode::Global => "[GLOBAL]",
            InputMode::Local => "[LOCAL]",
        }
    }
}

pub struct Overlay {
    glow: GlowConfig,
    keyboard: KeyInputVisualizer,
    snow: ParticleManager,
    clock: Clock,
    backdrop: Backdrop,
    prompt: Option<PathPrompt>,
    show_help: bool,
    status: Option<String>,
    glyph: char,
    palette: Palette,
    mode: InputMode,
    debug: bool,
    panel_area: PanelArea,
    synth: ReleaseSynth,
    rng: StdRng,
}

impl Overlay {
    pub fn new(config: &OverlayConfig, mode: InputMode, size: (u16, u16), now: Instant) -> Self {
        let seed = config.seed.unwrap_or_else(|| {
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0)
        });

        let mut overlay = Self {
            glow: GlowConfig {
                fixed_yellow: config.fixed_glow,
                random_hue: config.random_glow,
            },
            keyboard: KeyInputVisualizer::new(US_LAYOUT, &config.trigger_key),
            snow: ParticleManager::new(size.0, size.1),
            clock: Clock::new(&config.clock_format),
            backdrop: Backdrop::new(config.backdrops.clone()),
            prompt: None,
            show_help: false,
            status: None,
            glyph: config.glyph,
            palette: config.theme.palette(),
            mode,
            debug: config.debug,
            panel_area: PanelArea::default(),
            synth: ReleaseSynth::new(config.release_after),
            rng: StdRng::seed_from_u64(seed),
        };

        if let Some(path) = &config.sound {
            overlay.load_sound(path);
        }
        if config.snow {
            overlay.snow.activate(now, &mut overlay.rng);
        }
        overlay
    }

    /// Apply a settings control. Returns true when the session should end.
    pub fn apply(&mut self, control: Control, now: Instant) -> bool {
        tracing::debug!(?control, "control");
        match control {
            Control::Help => self.show_help = !self.show_help,
            Control::FixedGlow => {
                let on = !self.glow.fixed_yellow;
                self.glow.set_fixed_glow(on);
            }
            Control::RandomGlow => {
                let on = !self.glow.random_hue;
                self.glow.set_random_glow(on);
            }
            Control::Snow => {
                if self.snow.is_active() {
                    self.snow.deactivate();
                } else {
                    self.snow.activate(now, &mut self.rng);
                }
            }
            Control::Backdrop => {
                self.backdrop.advance();
            }
            Control::LoadSound => self.prompt = Some(PathPrompt::default()),
            Control::Quit => return true,
        }
        false
    }

    /// Feed one key transition to the visualizer. Repeats are dropped: the key is
    /// already lit, and replaying would re-roll random hues and restart the sound.
    pub fn handle_key_event(&mut self, event: &KeyEvent) {
        let resolved = match event.action {
            KeyAction::Down => self.keyboard.on_key_down(&event.key, &self.glow, &mut self.rng),
            KeyAction::Up => self.keyboard.on_key_up(&event.key),
            KeyAction::Repeat => return,
        };
        tracing::trace!(key = %event.key, action = ?event.action, resolved, "key");
    }

    /// Load a sound file and install it; on failure the previous sound stays.
    pub fn load_sound(&mut self, path: &Path) {
        match sound::load_sound(path) {
            Ok(clip) => {
                self.keyboard.set_sound_handle(Box::new(clip));
                self.status = None;
            }
            Err(e) => {
                tracing::warn!(error = %e, "sound not loaded");
                self.status = Some(e.to_string());
            }
        }
    }

    /// Handle one key event from the terminal. `releases_reported` says whether the
    /// terminal sends releases itself; if not, they are synthesized after a quiet
    /// period. Returns true when the session should end.
    pub fn terminal_key(&mut self, key: crossterm::event::KeyEvent, releases_reported: bool, now: Instant) -> bool {
        // Releases reach the keyboard even while the prompt is open
        if key.kind == KeyEventKind::Release {
            if let Some(name) = self.local_key_name(key.code) {
                self.handle_key_event(&KeyEvent::new(name, KeyAction::Up));
            }
            return false;
        }

        if self.prompt.is_some() {
            self.prompt_key(key.code);
            return false;
        }
        if let Some(control) = Control::from_key(key.code, key.modifiers) {
            return key.kind == KeyEventKind::Press && self.apply(control, now);
        }

        if let Some(name) = self.local_key_name(key.code) {
            let action = if releases_reported {
                input::terminal_action(key.kind)
            } else {
                // Autorepeat arrives as plain presses here
                self.synth.pressed(&name, now)
            };
            self.handle_key_event(&KeyEvent::new(name, action));
        }
        false
    }

    /// Key name of a terminal key worth visualizing; only in local mode, where
    /// the terminal is the key source
    fn local_key_name(&self, code: KeyCode) -> Option<String> {
        match self.mode {
            InputMode::Local => input::terminal_key_name(code),
            InputMode::Global => None,
        }
    }

    /// The terminal stops delivering releases once it loses focus
    pub fn focus_lost(&mut self) {
        if self.mode != InputMode::Local {
            return;
        }
        for release in self.synth.flush() {
            self.handle_key_event(&release);
        }
        self.release_all();
    }

    /// Route a key to the open sound prompt
    fn prompt_key(&mut self, code: KeyCode) {
        let Some(prompt) = self.prompt.as_mut() else {
            return;
        };
        match prompt.handle_key(code) {
            PromptOutcome::Editing => {}
            PromptOutcome::Cancel => self.prompt = None,
            PromptOutcome::Submit(path) => {
                self.prompt = None;
                self.load_sound(&path);
            }
        }
    }

    /// Release every lit key, for when releases can no longer be observed
    pub fn release_all(&mut self) {
        tracing::debug!(lit = self.keyboard.highlighted(), "releasing all keys");
        self.keyboard.release_all();
    }

    pub fn resize(&mut self, width: u16, height: u16) {
        self.snow.set_viewport(width, height);
    }

    /// Advance timers
    pub fn tick(&mut self, now: Instant) {
        for release in self.synth.expire(now) {
            self.handle_key_event(&release);
        }
        self.snow.update(now, &mut self.rng);
        debug_assert_eq!(self.snow.particles().len(), self.snow.sprites().len());
        self.clock.refresh(Local::now());
    }

    pub fn draw(&mut self, term: &mut Terminal) {
        term.clear();
        self.backdrop.draw(term);

        let (_, h) = term.size();
        let backdrop = &self.backdrop;
        self.snow.draw(term, self.glyph, |y| backdrop.row_color(y, h));

        self.clock.draw(term, &self.palette);

        let status = self.status.as_deref().or(self.keyboard.last_diagnostic());
        let view = PanelView {
            fixed_glow: self.glow.fixed_yellow,
            random_glow: self.glow.random_hue,
            snow: self.snow.is_active(),
            scene: &self.backdrop.current().name,
            sound: self.keyboard.sound_name(),
            trigger: self.keyboard.trigger_key(),
            prompt: self.prompt.as_ref().map(PathPrompt::text),
            status,
            mode: self.debug.then(|| self.mode.label()),
        };
        self.panel_area = panel::draw(term, &view, &self.palette);

        self.keyboard.draw(term, &self.palette);

        if self.show_help {
            help::draw_help(term, &self.palette);
        }
    }
}

/// Run an interactive overlay session until the user quits
pub fn run(config: OverlayConfig) -> io::Result<()> {
    let global = if config.local_only {
        None
    } else {
        let global = GlobalInput::start();
        if global.is_none() {
            tracing::warn!("no readable keyboard under /dev/input, mirroring this terminal only");
        }
        global
    };
    let mode = if global.is_some() { InputMode::Global } else { InputMode::Local };

    let mut term = Terminal::new(true)?;
    term.clear_screen()?;
    tracing::info!(?mode, release_events = term.reports_key_release(), "overlay started");

    let mut overlay = Overlay::new(&config, mode, term.size(), Instant::now());
    let frame = config.frame_time();

    'session: loop {
        // Wait for the first event up to one frame, then take whatever else is queued
        let mut wait = frame;
        while let Some(event) = term.poll_event(wait)? {
            wait = Duration::ZERO;
            let now = Instant::now();

            match event {
                Event::Key(key) => {
                    if overlay.terminal_key(key, term.reports_key_release(), now) {
                        break 'session;
                    }
                }
                Event::Mouse(mouse) => {
                    if mouse.kind == MouseEventKind::Down(MouseButton::Left) && overlay.prompt.is_none() {
                        if let Some(control) = overlay.panel_area.control_at(mouse.column, mouse.row) {
                            overlay.apply(control, now);
                        }
                    }
                }
                Event::FocusLost => overlay.focus_lost(),
                Event::Resize(w, h) => {
                    term.resize(w, h);
                    term.clear_screen()?;
                    overlay.resize(w, h);
                }
                _ => {}
            }
        }

        if let Some(global) = &global {
            for event in global.drain() {
                overlay.handle_key_event(&event);
            }
        }

        overlay.tick(Instant::now());
        overlay.draw(&mut term);
        term.present()?;
    }

    let (spawned, retired) = overlay.snow.totals();
    tracing::info!(spawned, retired, falling = overlay.snow.len(), "overlay closed");
    Ok(())
}
