//! Key event sources: global evdev keyboards with automatic device reconnection,
//! and the terminal's own key events as a fallback.

use crossterm::event::{KeyCode, KeyEventKind, ModifierKeyCode};
use evdev::{Device, InputEventKind, Key};
use std::collections::HashMap;
use std::os::unix::io::AsRawFd;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Terminals without release reporting only send presses; a key counts as
/// released once it has been quiet this long. Must exceed the keyboard's
/// autorepeat delay (commonly 500-660 ms) or held keys drop out before the
/// first repeat arrives.
pub const SYNTH_RELEASE_AFTER: Duration = Duration::from_millis(750);

const DEVICE_POLL_INTERVAL: Duration = Duration::from_millis(5);
const ERRORS_BEFORE_RECONNECT: u32 = 50;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyAction {
    Down,
    Repeat,
    Up,
}

/// One key transition, identified the way a browser names keys ("a", "Enter", " ")
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyEvent {
    pub key: String,
    pub action: KeyAction,
}

impl KeyEvent {
    pub fn new(key: impl Into<String>, action: KeyAction) -> Self {
        Self {
            key: key.into(),
            action,
        }
    }
}

/// Map an evdev key code to its raw key identifier
pub fn evdev_key_name(key: Key) -> Option<&'static str> {
    Some(match key {
        Key::KEY_GRAVE => "`",
        Key::KEY_1 => "1", Key::KEY_2 => "2", Key::KEY_3 => "3", Key::KEY_4 => "4", Key::KEY_5 => "5",
        Key::KEY_6 => "6", Key::KEY_7 => "7", Key::KEY_8 => "8", Key::KEY_9 => "9", Key::KEY_0 => "0",
        Key::KEY_MINUS => "-", Key::KEY_EQUAL => "=", Key::KEY_BACKSPACE => "Backspace",
        Key::KEY_TAB => "Tab",
        Key::KEY_Q => "q", Key::KEY_W => "w", Key::KEY_E => "e", Key::KEY_R => "r", Key::KEY_T => "t",
        Key::KEY_Y => "y", Key::KEY_U => "u", Key::KEY_I => "i", Key::KEY_O => "o", Key::KEY_P => "p",
        Key::KEY_LEFTBRACE => "[", Key::KEY_RIGHTBRACE => "]", Key::KEY_BACKSLASH => "\\",
        Key::KEY_CAPSLOCK => "CapsLock",
        Key::KEY_A => "a", Key::KEY_S => "s", Key::KEY_D => "d", Key::KEY_F => "f", Key::KEY_G => "g",
        Key::KEY_H => "h", Key::KEY_J => "j", Key::KEY_K => "k", Key::KEY_L => "l",
        Key::KEY_SEMICOLON => ";", Key::KEY_APOSTROPHE => "'", Key::KEY_ENTER => "Enter",
        Key::KEY_LEFTSHIFT => "Shift", Key::KEY_RIGHTSHIFT => "ShiftRight",
        Key::KEY_Z => "z", Key::KEY_X => "x", Key::KEY_C => "c", Key::KEY_V => "v", Key::KEY_B => "b",
        Key::KEY_N => "n", Key::KEY_M => "m",
        Key::KEY_COMMA => ",", Key::KEY_DOT => ".", Key::KEY_SLASH => "/",
        Key::KEY_SPACE => " ",
        Key::KEY_UP => "ArrowUp", Key::KEY_DOWN => "ArrowDown",
        Key::KEY_ESC => "Escape",
        Key::KEY_LEFTCTRL | Key::KEY_RIGHTCTRL => "Control",
        Key::KEY_LEFTALT | Key::KEY_RIGHTALT => "Alt",
        Key::KEY_LEFTMETA | Key::KEY_RIGHTMETA => "Meta",
        _ => return None,
    })
}

/// evdev value: 0 release, 1 press, 2 autorepeat
fn evdev_action(value: i32) -> Option<KeyAction> {
    match value {
        0 => Some(KeyAction::Up),
        1 => Some(KeyAction::Down),
        2 => Some(KeyAction::Repeat),
        _ => None,
    }
}

/// Map a terminal key event to its raw key identifier
pub fn terminal_key_name(code: KeyCode) -> Option<String> {
    Some(match code {
        KeyCode::Char(c) => c.to_string(),
        KeyCode::Enter => "Enter".into(),
        KeyCode::Backspace => "Backspace".into(),
        KeyCode::Tab | KeyCode::BackTab => "Tab".into(),
        KeyCode::CapsLock => "CapsLock".into(),
        KeyCode::Up => "ArrowUp".into(),
        KeyCode::Down => "ArrowDown".into(),
        KeyCode::Modifier(ModifierKeyCode::LeftShift) => "Shift".into(),
        KeyCode::Modifier(ModifierKeyCode::RightShift) => "ShiftRight".into(),
        _ => return None,
    })
}

pub fn terminal_action(kind: KeyEventKind) -> KeyAction {
    match kind {
        KeyEventKind::Press => KeyAction::Down,
        KeyEventKind::Repeat => KeyAction::Repeat,
        KeyEventKind::Release => KeyAction::Up,
    }
}

/// Sets a device to non-blocking mode.
fn set_nonblocking(device: &Device) {
    let fd = device.as_raw_fd();
    unsafe {
        let flags = libc::fcntl(fd, libc::F_GETFL);
        libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK);
    }
}

/// Finds all keyboard devices.
pub fn find_keyboard_devices() -> Vec<Device> {
    let mut keyboards = Vec::new();
    let Ok(entries) = std::fs::read_dir("/dev/input") else {
        return keyboards;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        let is_event_node = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with("event"));
        if !is_event_node {
            continue;
        }
        match Device::open(&path) {
            Ok(device) => {
                if device
                    .supported_keys()
                    .is_some_and(|keys| keys.contains(Key::KEY_A) && keys.contains(Key::KEY_SPACE))
                {
                    tracing::debug!(path = %path.display(), name = ?device.name(), "keyboard found");
                    keyboards.push(device);
                }
            }
            Err(e) => tracing::trace!(path = %path.display(), error = %e, "cannot open input node"),
        }
    }
    keyboards
}

/// Wrapper for evdev device with automatic reconnection support.
struct ReconnectingDevice {
    device: Device,
    physical_path: Option<String>,
    consecutive_errors: u32,
    needs_reconnect: bool,
}

impl ReconnectingDevice {
    fn new(device: Device) -> Self {
        let physical_path = device.physical_path().map(|p| p.to_string());
        set_nonblocking(&device);
        Self {
            device,
            physical_path,
            consecutive_errors: 0,
            needs_reconnect: false,
        }
    }

    /// Read whatever events are pending, reconnecting first if the device went away.
    fn poll_events<F>(&mut self, mut callback: F)
    where
        F: FnMut(&evdev::InputEvent),
    {
        if self.needs_reconnect {
            self.needs_reconnect = false;
            std::thread::sleep(Duration::from_secs(1));
            self.reconnect();
        }

        match self.device.fetch_events() {
            Ok(events) => {
                self.consecutive_errors = 0;
                for ev in events {
                    callback(&ev);
                }
            }
            Err(e) => {
                // EAGAIN/EWOULDBLOCK are normal for non-blocking reads
                if e.raw_os_error() != Some(libc::EAGAIN)
                    && e.raw_os_error() != Some(libc::EWOULDBLOCK)
                {
                    self.consecutive_errors += 1;
                    if self.consecutive_errors > ERRORS_BEFORE_RECONNECT {
                        tracing::warn!(path = ?self.physical_path, error = %e, "keyboard lost, reconnecting");
                        self.needs_reconnect = true;
                    }
                }
            }
        }
    }

    fn reconnect(&mut self) {
        let candidate = find_keyboard_devices().into_iter().find(|dev| match &self.physical_path {
            Some(path) => dev.physical_path() == Some(path.as_str()),
            None => true,
        });
        if let Some(device) = candidate {
            set_nonblocking(&device);
            self.device = device;
            self.consecutive_errors = 0;
            tracing::info!(path = ?self.physical_path, "keyboard reconnected");
        }
    }
}

/// Key events from every keyboard on the system, read by one thread per device.
/// Threads only forward events; all state changes happen on the receiving side.
pub struct GlobalInput {
    events: Receiver<KeyEvent>,
    running: Arc<AtomicBool>,
    handles: Vec<JoinHandle<()>>,
}

impl GlobalInput {
    /// Start listening, or `None` when no keyboard device can be opened
    pub fn start() -> Option<Self> {
        let keyboards = find_keyboard_devices();
        if keyboards.is_empty() {
            return None;
        }

        let (tx, events) = mpsc::channel();
        let running = Arc::new(AtomicBool::new(true));
        let handles = keyboards
            .into_iter()
            .map(|device| {
                let tx: Sender<KeyEvent> = tx.clone();
                let running = Arc::clone(&running);
                std::thread::spawn(move || listen(device, tx, running))
            })
            .collect();

        Some(Self {
            events,
            running,
            handles,
        })
    }

    /// Events received since the last call, in arrival order
    pub fn drain(&self) -> Vec<KeyEvent> {
        self.events.try_iter().collect()
    }
}

fn listen(device: Device, tx: Sender<KeyEvent>, running: Arc<AtomicBool>) {
    let mut reader = ReconnectingDevice::new(device);
    while running.load(Ordering::Relaxed) {
        let mut disconnected = false;
        reader.poll_events(|ev| {
            if let InputEventKind::Key(key) = ev.kind() {
                if let (Some(name), Some(action)) = (evdev_key_name(key), evdev_action(ev.value())) {
                    disconnected |= tx.send(KeyEvent::new(name, action)).is_err();
                }
            }
        });
        if disconnected {
            break;
        }
        std::thread::sleep(DEVICE_POLL_INTERVAL);
    }
}

impl Drop for GlobalInput {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
    }
}

/// Turns a press-only event stream into presses, repeats and releases
#[derive(Debug)]
pub struct ReleaseSynth {
    quiet: Duration,
    deadlines: HashMap<String, Instant>,
}

impl Default for ReleaseSynth {
    fn default() -> Self {
        Self::new(SYNTH_RELEASE_AFTER)
    }
}

impl ReleaseSynth {
    pub fn new(quiet: Duration) -> Self {
        Self {
            quiet,
            deadlines: HashMap::new(),
        }
    }

    /// Classify a press: `Down` for a key not currently held, `Repeat` for one
    /// still inside its quiet period. Either way the release moves out to
    /// `quiet` after this press.
    pub fn pressed(&mut self, key: &str, now: Instant) -> KeyAction {
        match self.deadlines.insert(key.to_string(), now + self.quiet) {
            Some(_) => KeyAction::Repeat,
            None => KeyAction::Down,
        }
    }

    /// Releases that have come due, oldest first
    pub fn expire(&mut self, now: Instant) -> Vec<KeyEvent> {
        let mut due: Vec<(Instant, String)> = Vec::new();
        self.deadlines.retain(|key, deadline| {
            if *deadline <= now {
                due.push((*deadline, key.clone()));
                false
            } else {
                true
            }
        });
        due.sort();
        due.into_iter()
            .map(|(_, key)| KeyEvent::new(key, KeyAction::Up))
            .collect()
    }

    /// Release everything immediately
    pub fn flush(&mut self) -> Vec<KeyEvent> {
        self.deadlines
            .drain()
            .map(|(key, _)| KeyEvent::new(key, KeyAction::Up))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evdev_names_distinguish_shift_sides() {
        assert_eq!(evdev_key_name(Key::KEY_LEFTSHIFT), Some("Shift"));
        assert_eq!(evdev_key_name(Key::KEY_RIGHTSHIFT), Some("ShiftRight"));
        assert_eq!(evdev_key_name(Key::KEY_SPACE), Some(" "));
        assert_eq!(evdev_key_name(Key::KEY_F13), None);
    }

    #[test]
    fn evdev_values_map_to_actions() {
        assert_eq!(evdev_action(1), Some(KeyAction::Down));
        assert_eq!(evdev_action(2), Some(KeyAction::Repeat));
        assert_eq!(evdev_action(0), Some(KeyAction::Up));
        assert_eq!(evdev_action(3), None);
    }

    #[test]
    fn terminal_names_follow_browser_style() {
        assert_eq!(terminal_key_name(KeyCode::Char('A')).as_deref(), Some("A"));
        assert_eq!(terminal_key_name(KeyCode::Char(' ')).as_deref(), Some(" "));
        assert_eq!(terminal_key_name(KeyCode::BackTab).as_deref(), Some("Tab"));
        assert_eq!(terminal_key_name(KeyCode::Up).as_deref(), Some("ArrowUp"));
        assert_eq!(terminal_key_name(KeyCode::F(2)), None);
        assert_eq!(
            terminal_key_name(KeyCode::Modifier(ModifierKeyCode::LeftShift)).as_deref(),
            Some("Shift")
        );
        assert_eq!(
            terminal_key_name(KeyCode::Modifier(ModifierKeyCode::RightShift)).as_deref(),
            Some("ShiftRight")
        );
    }

    #[test]
    fn synthesized_release_waits_for_quiet_period() {
        let t0 = Instant::now();
        let mut synth = ReleaseSynth::default();
        assert_eq!(synth.pressed("a", t0), KeyAction::Down);
        assert!(synth.expire(t0 + SYNTH_RELEASE_AFTER / 2).is_empty());

        // A repeat pushes the deadline out
        assert_eq!(synth.pressed("a", t0 + SYNTH_RELEASE_AFTER / 2), KeyAction::Repeat);
        assert!(synth.expire(t0 + SYNTH_RELEASE_AFTER).is_empty());

        let released = synth.expire(t0 + SYNTH_RELEASE_AFTER * 2);
        assert_eq!(released, vec![KeyEvent::new("a", KeyAction::Up)]);
        assert!(synth.expire(t0 + SYNTH_RELEASE_AFTER * 3).is_empty());
    }

    #[test]
    fn synthesized_releases_come_out_oldest_first() {
        let t0 = Instant::now();
        let mut synth = ReleaseSynth::default();
        synth.pressed("b", t0 + Duration::from_millis(10));
        synth.pressed("a", t0);
        let released: Vec<String> = synth
            .expire(t0 + SYNTH_RELEASE_AFTER * 2)
            .into_iter()
            .map(|e| e.key)
            .collect();
        assert_eq!(released, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn quiet_period_outlasts_autorepeat_delay() {
        let t0 = Instant::now();
        let mut synth = ReleaseSynth::default();
        assert_eq!(synth.pressed("k", t0), KeyAction::Down);
        assert!(synth.expire(t0 + Duration::from_millis(660)).is_empty());
        assert_eq!(synth.pressed("k", t0 + Duration::from_millis(660)), KeyAction::Repeat);
    }

    #[test]
    fn press_after_release_is_a_new_down() {
        let t0 = Instant::now();
        let mut synth = ReleaseSynth::new(Duration::from_millis(100));
        synth.pressed("k", t0);
        assert_eq!(synth.expire(t0 + Duration::from_millis(100)).len(), 1);
        assert_eq!(synth.pressed("k", t0 + Duration::from_millis(150)), KeyAction::Down);
    }

    #[test]
    fn flush_releases_everything() {
        let t0 = Instant::now();
        let mut synth = ReleaseSynth::default();
        synth.pressed("x", t0);
        synth.pressed("y", t0);
        assert_eq!(synth.flush().len(), 2);
        assert!(synth.expire(t0 + SYNTH_RELEASE_AFTER).is_empty());
    }
}
