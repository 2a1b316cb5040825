//! Real desktop backend: enigo for input and pointer queries, xcap for capture.

use enigo::{Direction, Enigo, Key, Keyboard, Mouse, Settings};
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};
use xcap::Monitor;

use super::keys::KeyCode;
use super::{Automation, AutomationError, AutomationResult, CaptureResult, encode_png};

/// Drives the attached display.
///
/// Every synthetic input first checks the pointer: if it sits in a screen
/// corner the input is refused with [`AutomationError::Interlock`]. Moving the
/// mouse into a corner is the operator's way of stopping a runaway sequence.
pub struct DesktopAutomation {
    enigo: Enigo,
}

impl DesktopAutomation {
    /// Connect to the platform input system
    pub fn new() -> AutomationResult<Self> {
        let enigo = Enigo::new(&Settings::default())
            .map_err(|e| AutomationError::Unavailable(e.to_string()))?;
        Ok(Self { enigo })
    }

    fn check_interlock(&mut self) -> AutomationResult<()> {
        let (x, y) = self
            .enigo
            .location()
            .map_err(|e| AutomationError::Input(format!("pointer query failed: {}", e)))?;
        let (width, height) = self
            .enigo
            .main_display()
            .map_err(|e| AutomationError::NoDisplay(e.to_string()))?;

        if at_screen_corner(x, y, width, height) {
            return Err(AutomationError::Interlock(format!(
                "pointer moved to screen corner ({}, {})",
                x, y
            )));
        }
        Ok(())
    }

    fn key(&mut self, key: Key, direction: Direction) -> AutomationResult<()> {
        self.enigo
            .key(key, direction)
            .map_err(|e| AutomationError::Input(format!("{:?} {:?}: {}", key, direction, e)))
    }
}

impl Automation for DesktopAutomation {
    fn source_type(&self) -> &str {
        "desktop"
    }

    fn screen_size(&mut self) -> AutomationResult<(u32, u32)> {
        let (width, height) = self
            .enigo
            .main_display()
            .map_err(|e| AutomationError::NoDisplay(e.to_string()))?;
        if width <= 0 || height <= 0 {
            return Err(AutomationError::NoDisplay(format!(
                "screen reported as {}x{}",
                width, height
            )));
        }
        Ok((width as u32, height as u32))
    }

    fn capture_screen(&mut self) -> AutomationResult<CaptureResult> {
        let monitor = Monitor::all()
            .map_err(|e| AutomationError::NoDisplay(e.to_string()))?
            .into_iter()
            .next()
            .ok_or_else(|| AutomationError::NoDisplay("no monitors reported".to_string()))?;

        let captured = monitor
            .capture_image()
            .map_err(|e| AutomationError::Capture(e.to_string()))?;
        let (width, height) = (captured.width(), captured.height());
        let frame = image::RgbaImage::from_raw(width, height, captured.into_raw())
            .ok_or_else(|| AutomationError::Capture("frame buffer size mismatch".to_string()))?;

        Ok(CaptureResult {
            image_data: encode_png(&frame)?,
            width,
            height,
        })
    }

    fn send_hotkey(&mut self, keys: &[String]) -> AutomationResult<()> {
        let codes = keys
            .iter()
            .map(|k| KeyCode::parse(k).map(to_enigo_key))
            .collect::<AutomationResult<Vec<_>>>()?;

        self.check_interlock()?;

        let mut pressed = Vec::with_capacity(codes.len());
        let mut result = Ok(());
        for key in &codes {
            if let Err(err) = self.key(*key, Direction::Press) {
                result = Err(err);
                break;
            }
            pressed.push(*key);
        }

        // Release whatever went down, even after a failed press
        for key in pressed.iter().rev() {
            if let Err(err) = self.key(*key, Direction::Release) {
                warn!(error = %err, "Failed to release key");
                if result.is_ok() {
                    result = Err(err);
                }
            }
        }
        result
    }

    fn send_key(&mut self, key: &str) -> AutomationResult<()> {
        let key = to_enigo_key(KeyCode::parse(key)?);
        self.check_interlock()?;
        self.key(key, Direction::Click)
    }

    fn type_text(&mut self, text: &str, interval: Duration) -> AutomationResult<()> {
        debug!(chars = text.chars().count(), ?interval, "Typing text");
        for ch in text.chars() {
            self.check_interlock()?;
            self.enigo
                .text(ch.encode_utf8(&mut [0u8; 4]))
                .map_err(|e| AutomationError::Input(format!("typing {:?}: {}", ch, e)))?;
            if !interval.is_zero() {
                thread::sleep(interval);
            }
        }
        Ok(())
    }
}

/// True when the pointer is on one of the four corner pixels (or beyond them)
pub(crate) fn at_screen_corner(x: i32, y: i32, width: i32, height: i32) -> bool {
    let right = width - 1;
    let bottom = height - 1;
    (x <= 0 || x >= right) && (y <= 0 || y >= bottom)
}

fn to_enigo_key(code: KeyCode) -> Key {
    match code {
        KeyCode::Alt => Key::Alt,
        KeyCode::Control => Key::Control,
        KeyCode::Shift => Key::Shift,
        KeyCode::Meta => Key::Meta,
        KeyCode::Enter => Key::Return,
        KeyCode::Tab => Key::Tab,
        KeyCode::Escape => Key::Escape,
        KeyCode::Space => Key::Space,
        KeyCode::Backspace => Key::Backspace,
        KeyCode::Delete => Key::Delete,
        KeyCode::Up => Key::UpArrow,
        KeyCode::Down => Key::DownArrow,
        KeyCode::Left => Key::LeftArrow,
        KeyCode::Right => Key::RightArrow,
        KeyCode::Home => Key::Home,
        KeyCode::End => Key::End,
        KeyCode::PageUp => Key::PageUp,
        KeyCode::PageDown => Key::PageDown,
        KeyCode::Function(n) => function_key(n),
        KeyCode::Char(c) => Key::Unicode(c),
    }
}

fn function_key(n: u8) -> Key {
    match n {
        1 => Key::F1,
        2 => Key::F2,
        3 => Key::F3,
        4 => Key::F4,
        5 => Key::F5,
        6 => Key::F6,
        7 => Key::F7,
        8 => Key::F8,
        9 => Key::F9,
        10 => Key::F10,
        11 => Key::F11,
        _ => Key::F12,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn corners_trip_the_interlock() {
        assert!(at_screen_corner(0, 0, 1920, 1080));
        assert!(at_screen_corner(1919, 0, 1920, 1080));
        assert!(at_screen_corner(0, 1079, 1920, 1080));
        assert!(at_screen_corner(1919, 1079, 1920, 1080));
        assert!(at_screen_corner(-5, 2000, 1920, 1080));
    }

    #[test]
    fn edges_and_interior_do_not() {
        assert!(!at_screen_corner(960, 540, 1920, 1080));
        assert!(!at_screen_corner(0, 540, 1920, 1080));
        assert!(!at_screen_corner(960, 0, 1920, 1080));
    }

    #[test]
    fn key_codes_map_to_enigo_keys() {
        assert_eq!(to_enigo_key(KeyCode::Enter), Key::Return);
        assert_eq!(to_enigo_key(KeyCode::Char('o')), Key::Unicode('o'));
        assert_eq!(to_enigo_key(KeyCode::Function(4)), Key::F4);
    }
}
