//! Clock widget - local time, refreshed once per second

use crate::colors::Palette;
use crate::help::draw_box;
use crate::terminal::Terminal;
use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, TimeZone};
use std::fmt::Display;

pub const DEFAULT_FORMAT: &str = "%H:%M:%S";

pub struct Clock {
    format: String,
    text: String,
    shown: Option<i64>,
}

impl Clock {
    /// Clock using a strftime format; an invalid format falls back to `DEFAULT_FORMAT`
    pub fn new(format: &str) -> Self {
        let format = if is_valid_format(format) {
            format.to_string()
        } else {
            tracing::warn!(format, "invalid clock format, using {}", DEFAULT_FORMAT);
            DEFAULT_FORMAT.to_string()
        };
        Self {
            format,
            text: String::new(),
            shown: None,
        }
    }

    /// Re-render the text when the second has changed. Returns true if it did.
    pub fn refresh<Tz>(&mut self, now: DateTime<Tz>) -> bool
    where
        Tz: TimeZone,
        Tz::Offset: Display,
    {
        let second = now.timestamp();
        if self.shown == Some(second) {
            return false;
        }
        self.shown = Some(second);
        self.text = now.format(&self.format).to_string();
        true
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Boxed, centered near the top edge
    pub fn draw(&self, term: &mut Terminal, palette: &Palette) {
        if self.text.is_empty() {
            return;
        }
        let (w, _) = term.size();
        let box_w = self.text.chars().count() + 4;
        let x = (w as usize).saturating_sub(box_w) / 2;
        draw_box(term, x as i32, 1, &[self.text.as_str()], palette);
    }
}

fn is_valid_format(format: &str) -> bool {
    !format.is_empty() && StrftimeItems::new(format).all(|item| !matches!(item, Item::Error))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn formats_time() {
        let mut clock = Clock::new(DEFAULT_FORMAT);
        let now = Utc.with_ymd_and_hms(2024, 12, 24, 9, 5, 7).unwrap();
        assert!(clock.refresh(now));
        assert_eq!(clock.text(), "09:05:07");
    }

    #[test]
    fn refreshes_once_per_second() {
        let mut clock = Clock::new(DEFAULT_FORMAT);
        let now = Utc.with_ymd_and_hms(2024, 12, 24, 23, 59, 59).unwrap();
        assert!(clock.refresh(now));
        assert!(!clock.refresh(now));
        assert!(clock.refresh(now + chrono::Duration::seconds(1)));
        assert_eq!(clock.text(), "00:00:00");
    }

    #[test]
    fn custom_format() {
        let mut clock = Clock::new("%I:%M %p");
        clock.refresh(Utc.with_ymd_and_hms(2024, 1, 1, 15, 4, 0).unwrap());
        assert_eq!(clock.text(), "03:04 PM");
    }

    #[test]
    fn invalid_format_falls_back() {
        let mut clock = Clock::new("%Q broken %");
        clock.refresh(Utc.with_ymd_and_hms(2024, 1, 1, 1, 2, 3).unwrap());
        assert_eq!(clock.text(), "01:02:03");
    }
}
