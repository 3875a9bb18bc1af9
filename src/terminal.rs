use crossterm::{
    cursor::{Hide, MoveTo, Show},
    event::{
        poll, read, DisableFocusChange, DisableMouseCapture, EnableFocusChange, EnableMouseCapture,
        Event, KeyboardEnhancementFlags, PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags,
    },
    execute, queue,
    style::{Attribute, Color, Print, ResetColor, SetAttribute, SetBackgroundColor, SetForegroundColor},
    terminal::{
        disable_raw_mode, enable_raw_mode, size, supports_keyboard_enhancement, Clear, ClearType,
        EnterAlternateScreen, LeaveAlternateScreen,
    },
};
use std::fmt::Write as _;
use std::io::{self, stdout, Write};
use std::time::Duration;

/// Terminal abstraction for rendering
pub struct Terminal {
    width: u16,
    height: u16,
    buffer: Vec<Vec<Cell>>,
    alternate_screen: bool,
    key_release_events: bool,
}

/// A single cell in the terminal buffer
#[derive(Clone, Debug, PartialEq)]
pub struct Cell {
    pub ch: char,
    pub fg: Option<Color>,
    pub bg: Option<Color>,
    pub bold: bool,
}

impl Default for Cell {
    fn default() -> Self {
        Self {
            ch: ' ',
            fg: None,
            bg: None,
            bold: false,
        }
    }
}

impl Terminal {
    /// Take over the real terminal: raw mode, alternate screen, mouse and focus reports
    /// and, where the terminal supports it, key release reporting.
    pub fn new(alternate_screen: bool) -> io::Result<Self> {
        let (width, height) = size()?;
        let mut key_release_events = false;

        if alternate_screen {
            enable_raw_mode()?;
            execute!(stdout(), EnterAlternateScreen, Hide, EnableMouseCapture, EnableFocusChange)?;

            key_release_events = supports_keyboard_enhancement().unwrap_or(false);
            if key_release_events {
                // Event types give releases and repeats; all-keys-as-escape-codes
                // makes Shift report on its own, left and right apart
                execute!(
                    stdout(),
                    PushKeyboardEnhancementFlags(
                        KeyboardEnhancementFlags::REPORT_EVENT_TYPES
                            | KeyboardEnhancementFlags::DISAMBIGUATE_ESCAPE_CODES
                            | KeyboardEnhancementFlags::REPORT_ALL_KEYS_AS_ESCAPE_CODES
                    )
                )?;
            }
        }

        Ok(Self {
            width,
            height,
            buffer: blank(width, height),
            alternate_screen,
            key_release_events,
        })
    }

    /// Buffer-only terminal of a fixed size, never touching the real tty
    pub fn offscreen(width: u16, height: u16) -> Self {
        Self {
            width,
            height,
            buffer: blank(width, height),
            alternate_screen: false,
            key_release_events: false,
        }
    }

    /// Get terminal dimensions
    pub fn size(&self) -> (u16, u16) {
        (self.width, self.height)
    }

    /// Whether the terminal reports key releases (and repeats) as distinct events
    pub fn reports_key_release(&self) -> bool {
        self.key_release_events
    }

    /// Resize the back buffer, dropping its contents
    pub fn resize(&mut self, width: u16, height: u16) {
        self.width = width;
        self.height = height;
        self.buffer = blank(width, height);
    }

    /// Clear the buffer
    pub fn clear(&mut self) {
        for row in &mut self.buffer {
            for cell in row {
                *cell = Cell::default();
            }
        }
    }

    /// Clear the actual terminal
    pub fn clear_screen(&self) -> io::Result<()> {
        execute!(stdout(), Clear(ClearType::All))?;
        Ok(())
    }

    /// Set a character at position, keeping whatever background is already there
    pub fn set(&mut self, x: i32, y: i32, ch: char, fg: Option<Color>, bold: bool) {
        if let Some(cell) = self.cell_mut(x, y) {
            cell.ch = ch;
            cell.fg = fg;
            cell.bold = bold;
        }
    }

    /// Set the background colour of a cell without touching its glyph
    pub fn set_bg(&mut self, x: i32, y: i32, bg: Option<Color>) {
        if let Some(cell) = self.cell_mut(x, y) {
            cell.bg = bg;
        }
    }

    /// Set a string starting at position
    pub fn set_str(&mut self, x: i32, y: i32, s: &str, fg: Option<Color>, bold: bool) {
        for (i, ch) in s.chars().enumerate() {
            self.set(x + i as i32, y, ch, fg, bold);
        }
    }

    /// Paint a rectangle's background
    pub fn fill_bg(&mut self, x: i32, y: i32, w: usize, h: usize, bg: Option<Color>) {
        for dy in 0..h as i32 {
            for dx in 0..w as i32 {
                self.set_bg(x + dx, y + dy, bg);
            }
        }
    }

    #[cfg(test)]
    pub fn cell(&self, x: i32, y: i32) -> Option<&Cell> {
        if x >= 0 && x < self.width as i32 && y >= 0 && y < self.height as i32 {
            Some(&self.buffer[y as usize][x as usize])
        } else {
            None
        }
    }

    fn cell_mut(&mut self, x: i32, y: i32) -> Option<&mut Cell> {
        if x >= 0 && x < self.width as i32 && y >= 0 && y < self.height as i32 {
            Some(&mut self.buffer[y as usize][x as usize])
        } else {
            None
        }
    }

    /// Render the entire buffer to screen
    pub fn present(&self) -> io::Result<()> {
        let mut out = stdout().lock();
        let mut fg: Option<Color> = None;
        let mut bg: Option<Color> = None;
        let mut bold = false;

        queue!(out, ResetColor, SetAttribute(Attribute::Reset))?;

        for (y, row) in self.buffer.iter().enumerate() {
            queue!(out, MoveTo(0, y as u16))?;

            for cell in row {
                if cell.bold != bold {
                    // Attribute::Reset also drops colours, so re-apply them below
                    if cell.bold {
                        queue!(out, SetAttribute(Attribute::Bold))?;
                    } else {
                        queue!(out, SetAttribute(Attribute::Reset))?;
                        fg = None;
                        bg = None;
                    }
                    bold = cell.bold;
                }
                if cell.fg != fg {
                    queue!(out, SetForegroundColor(cell.fg.unwrap_or(Color::Reset)))?;
                    fg = cell.fg;
                }
                if cell.bg != bg {
                    queue!(out, SetBackgroundColor(cell.bg.unwrap_or(Color::Reset)))?;
                    bg = cell.bg;
                }
                queue!(out, Print(cell.ch))?;
            }
        }

        queue!(out, ResetColor, SetAttribute(Attribute::Reset))?;
        out.flush()?;
        Ok(())
    }

    /// Wait up to `timeout` for the next terminal event
    pub fn poll_event(&self, timeout: Duration) -> io::Result<Option<Event>> {
        if poll(timeout)? {
            return Ok(Some(read()?));
        }
        Ok(None)
    }

    /// Buffer glyphs only, trailing spaces trimmed
    pub fn to_plain_string(&self) -> String {
        let mut text = String::new();
        for row in &self.buffer {
            let line: String = row.iter().map(|c| c.ch).collect();
            text.push_str(line.trim_end());
            text.push('\n');
        }
        text
    }

    /// Buffer as text with ANSI colours, trailing blank cells trimmed (for print mode)
    pub fn to_ansi_string(&self) -> String {
        let mut text = String::new();
        for row in &self.buffer {
            let used = row
                .iter()
                .rposition(|c| c.ch != ' ' || c.bg.is_some())
                .map_or(0, |i| i + 1);

            for cell in &row[..used] {
                if cell.bold {
                    text.push_str("\x1b[1m");
                }
                if let Some(color) = cell.fg {
                    push_sgr(&mut text, color, false);
                }
                if let Some(color) = cell.bg {
                    push_sgr(&mut text, color, true);
                }
                text.push(cell.ch);
                if cell.bold || cell.fg.is_some() || cell.bg.is_some() {
                    text.push_str("\x1b[0m");
                }
            }
            text.push('\n');
        }
        text
    }
}

impl Drop for Terminal {
    fn drop(&mut self) {
        if self.alternate_screen {
            if self.key_release_events {
                let _ = execute!(stdout(), PopKeyboardEnhancementFlags);
            }
            let _ = execute!(
                stdout(),
                DisableFocusChange,
                DisableMouseCapture,
                Show,
                LeaveAlternateScreen
            );
            let _ = disable_raw_mode();
        }
    }
}

fn blank(width: u16, height: u16) -> Vec<Vec<Cell>> {
    vec![vec![Cell::default(); width as usize]; height as usize]
}

fn push_sgr(text: &mut String, color: Color, background: bool) {
    let base = if background { 40 } else { 30 };
    let _ = match color {
        Color::Rgb { r, g, b } => {
            write!(text, "\x1b[{};2;{};{};{}m", base + 8, r, g, b)
        }
        Color::AnsiValue(v) => write!(text, "\x1b[{};5;{}m", base + 8, v),
        // Standard colors (0-7)
        Color::Black => write!(text, "\x1b[{}m", base),
        Color::DarkRed => write!(text, "\x1b[{}m", base + 1),
        Color::DarkGreen => write!(text, "\x1b[{}m", base + 2),
        Color::DarkYellow => write!(text, "\x1b[{}m", base + 3),
        Color::DarkBlue => write!(text, "\x1b[{}m", base + 4),
        Color::DarkMagenta => write!(text, "\x1b[{}m", base + 5),
        Color::DarkCyan => write!(text, "\x1b[{}m", base + 6),
        Color::Grey => write!(text, "\x1b[{}m", base + 7),
        // Bright colors (8-15)
        Color::DarkGrey => write!(text, "\x1b[{}m", base + 60),
        Color::Red => write!(text, "\x1b[{}m", base + 61),
        Color::Green => write!(text, "\x1b[{}m", base + 62),
        Color::Yellow => write!(text, "\x1b[{}m", base + 63),
        Color::Blue => write!(text, "\x1b[{}m", base + 64),
        Color::Magenta => write!(text, "\x1b[{}m", base + 65),
        Color::Cyan => write!(text, "\x1b[{}m", base + 66),
        Color::White => write!(text, "\x1b[{}m", base + 67),
        _ => Ok(()),
    };
}
