use crate::colors::Palette;
use crate::terminal::Terminal;

pub const HELP_TEXT: &str = "\
KEYGLOW

F1      Show/hide this help
F2      Yellow glow
F3      Random colour glow
F4      Snowflakes
F5      Next background
F6      Load trigger sound
Esc     Quit (also Ctrl+C)

Keys light up while held. With access to
/dev/input every keyboard is mirrored, even
when this window is not focused.";

/// Draw a bordered box with one line of text per row. Returns its size in cells.
pub fn draw_box(term: &mut Terminal, x: i32, y: i32, lines: &[&str], palette: &Palette) -> (usize, usize) {
    let inner = lines.iter().map(|l| l.chars().count()).max().unwrap_or(0);
    let box_w = inner + 4; // border plus one space each side
    let box_h = lines.len() + 2;

    term.fill_bg(x, y, box_w, box_h, Some(palette.tray));

    let right = x + box_w as i32 - 1;
    let bottom = y + box_h as i32 - 1;
    let border = Some(palette.border);

    term.set(x, y, '┌', border, false);
    term.set(right, y, '┐', border, false);
    term.set(x, bottom, '└', border, false);
    term.set(right, bottom, '┘', border, false);
    for dx in 1..box_w as i32 - 1 {
        term.set(x + dx, y, '─', border, false);
        term.set(x + dx, bottom, '─', border, false);
    }
    for (i, line) in lines.iter().enumerate() {
        let row = y + 1 + i as i32;
        term.set(x, row, '│', border, false);
        term.set_str(x + 2, row, line, Some(palette.text), false);
        term.set(right, row, '│', border, false);
    }

    (box_w, box_h)
}

/// Help box centered on screen
pub fn draw_help(term: &mut Terminal, palette: &Palette) {
    let lines: Vec<&str> = HELP_TEXT.lines().collect();
    let (w, h) = term.size();
    let box_w = lines.iter().map(|l| l.chars().count()).max().unwrap_or(0) + 4;
    let box_h = lines.len() + 2;
    let x = (w as usize).saturating_sub(box_w) / 2;
    let y = (h as usize).saturating_sub(box_h) / 2;
    draw_box(term, x as i32, y as i32, &lines, palette);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::colors::Theme;

    #[test]
    fn box_has_corners_and_text() {
        let mut term = Terminal::offscreen(20, 5);
        let palette = Theme::Dark.palette();
        let size = draw_box(&mut term, 1, 1, &["hello"], &palette);
        assert_eq!(size, (9, 3));
        assert_eq!(term.cell(1, 1).map(|c| c.ch), Some('┌'));
        assert_eq!(term.cell(9, 3).map(|c| c.ch), Some('┘'));
        assert!(term.to_plain_string().contains("│ hello │"));
    }

    #[test]
    fn help_mentions_every_function_key() {
        for key in ["F1", "F2", "F3", "F4", "F5", "F6", "Esc"] {
            assert!(HELP_TEXT.contains(key));
        }
    }
}
