//! Settings panel: function-key controls, their on-screen state and the sound path prompt

use crate::colors::Palette;
use crate::help::draw_box;
use crate::terminal::Terminal;
use crossterm::event::{KeyCode, KeyModifiers};
use std::path::PathBuf;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Control {
    Help,
    FixedGlow,
    RandomGlow,
    Snow,
    Backdrop,
    LoadSound,
    Quit,
}

impl Control {
    pub fn from_key(code: KeyCode, modifiers: KeyModifiers) -> Option<Self> {
        Some(match code {
            KeyCode::F(1) => Control::Help,
            KeyCode::F(2) => Control::FixedGlow,
            KeyCode::F(3) => Control::RandomGlow,
            KeyCode::F(4) => Control::Snow,
            KeyCode::F(5) => Control::Backdrop,
            KeyCode::F(6) => Control::LoadSound,
            KeyCode::Esc => Control::Quit,
            KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => Control::Quit,
            _ => return None,
        })
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum PromptOutcome {
    Editing,
    Submit(PathBuf),
    Cancel,
}

/// Single-line text entry for a sound file path
#[derive(Debug, Default)]
pub struct PathPrompt {
    buffer: String,
}

impl PathPrompt {
    pub fn handle_key(&mut self, code: KeyCode) -> PromptOutcome {
        match code {
            KeyCode::Enter => {
                let path = expand_home(self.buffer.trim());
                if path.as_os_str().is_empty() {
                    PromptOutcome::Cancel
                } else {
                    PromptOutcome::Submit(path)
                }
            }
            KeyCode::Esc => PromptOutcome::Cancel,
            KeyCode::Backspace => {
                self.buffer.pop();
                PromptOutcome::Editing
            }
            KeyCode::Char(c) => {
                self.buffer.push(c);
                PromptOutcome::Editing
            }
            _ => PromptOutcome::Editing,
        }
    }

    pub fn text(&self) -> &str {
        &self.buffer
    }
}

fn expand_home(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}

/// Snapshot of everything the panel shows
pub struct PanelView<'a> {
    pub fixed_glow: bool,
    pub random_glow: bool,
    pub snow: bool,
    pub scene: &'a str,
    pub sound: Option<&'a str>,
    pub trigger: &'a str,
    pub prompt: Option<&'a str>,
    pub status: Option<&'a str>,
    pub mode: Option<&'a str>,
}

fn on_off(on: bool) -> &'static str {
    if on {
        "on"
    } else {
        "off"
    }
}

pub fn panel_lines(view: &PanelView) -> Vec<String> {
    let mut lines = vec![
        format!("F2 Yellow Glow   {}", on_off(view.fixed_glow)),
        format!("F3 Random Glow   {}", on_off(view.random_glow)),
        format!("F4 Snowflakes    {}", on_off(view.snow)),
        format!("F5 Background    {}", view.scene),
    ];
    match view.prompt {
        Some(text) => lines.push(format!("F6 Sound file: {}_", text)),
        None => lines.push(format!(
            "F6 Sound [{}]     {}",
            view.trigger,
            view.sound.unwrap_or("none")
        )),
    }
    if let Some(status) = view.status {
        lines.push(format!("! {}", status));
    }
    if let Some(mode) = view.mode {
        lines.push(format!("{}  F1 help", mode));
    }
    lines
}

/// Screen rectangle the panel occupied when last drawn
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PanelArea {
    pub x: u16,
    pub y: u16,
    pub width: u16,
    pub height: u16,
}

impl PanelArea {
    /// Control whose row was clicked, if any
    pub fn control_at(&self, col: u16, row: u16) -> Option<Control> {
        let inside = col > self.x
            && col < self.x + self.width.saturating_sub(1)
            && row > self.y
            && row < self.y + self.height.saturating_sub(1);
        if !inside {
            return None;
        }
        CLICKABLE.get((row - self.y - 1) as usize).copied()
    }
}

/// Controls in the order of the first panel rows
const CLICKABLE: [Control; 5] = [
    Control::FixedGlow,
    Control::RandomGlow,
    Control::Snow,
    Control::Backdrop,
    Control::LoadSound,
];

const PANEL_TOP: u16 = 5;

/// Boxed panel centered below the clock
pub fn draw(term: &mut Terminal, view: &PanelView, palette: &Palette) -> PanelArea {
    let lines = panel_lines(view);
    let refs: Vec<&str> = lines.iter().map(String::as_str).collect();
    let (w, _) = term.size();
    let box_w = refs.iter().map(|l| l.chars().count()).max().unwrap_or(0) + 4;
    let x = (w as usize).saturating_sub(box_w) / 2;
    let (width, height) = draw_box(term, x as i32, PANEL_TOP as i32, &refs, palette);
    PanelArea {
        x: x as u16,
        y: PANEL_TOP,
        width: width as u16,
        height: height as u16,
    }
}
