//! In-memory display for tests and headless dry runs.
//!
//! Provides a full drawing API on an RGB framebuffer and implements
//! [`Automation`] on top of it:
//! - every input action is appended to a shared [`Journal`]
//! - every input action is also drawn onto the frame, so successive captures differ
//! - failures can be injected per action with [`VirtualDisplay::fail_on`]

use font8x8::{BASIC_FONTS, UnicodeFonts};
use image::{ImageBuffer, RgbImage};
use std::io::Cursor;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use super::keys::KeyCode;
use super::{Automation, AutomationError, AutomationResult, CaptureResult};

const BACKGROUND: [u8; 3] = [32, 36, 48];
const TITLE_BAR: [u8; 3] = [70, 80, 110];
const TEXT: [u8; 3] = [230, 230, 230];
const LINE_HEIGHT: u32 = 10;
const FIRST_LINE: u32 = 20;

/// Shared, append-only record of the actions a [`VirtualDisplay`] received
#[derive(Debug, Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    /// Snapshot of all entries so far
    pub fn entries(&self) -> Vec<String> {
        self.0.lock().map(|entries| entries.clone()).unwrap_or_default()
    }

    fn push(&self, entry: String) {
        if let Ok(mut entries) = self.0.lock() {
            entries.push(entry);
        }
    }
}

/// A virtual screen backed by an RGB pixel buffer
#[derive(Debug, Clone)]
pub struct VirtualDisplay {
    /// Width in pixels
    width: u32,
    /// Height in pixels
    height: u32,
    /// RGB pixel buffer (row-major, 3 bytes per pixel)
    buffer: Vec<u8>,
    /// When set, the screen size query fails like a machine without a display
    headless: bool,
    journal: Journal,
    faults: Vec<(String, AutomationError)>,
    lines: u32,
}

impl VirtualDisplay {
    /// Create a display with a title bar on a dark background
    pub fn new(width: u32, height: u32) -> Self {
        let mut display = Self {
            width,
            height,
            buffer: vec![0u8; (width * height * 3) as usize],
            headless: false,
            journal: Journal::default(),
            faults: Vec::new(),
            lines: 0,
        };
        display.fill(BACKGROUND);
        display.draw_rect(0, 0, width, 12, TITLE_BAR);
        display.draw_text(2, 2, "virtual display", TEXT, TITLE_BAR);
        display
    }

    /// A display whose size query fails
    pub fn headless() -> Self {
        let mut display = Self::new(1, 1);
        display.headless = true;
        display
    }

    /// Fail every action whose journal entry equals `entry` (e.g. "key o", "capture")
    pub fn fail_on(mut self, entry: impl Into<String>, error: AutomationError) -> Self {
        self.faults.push((entry.into(), error));
        self
    }

    /// Handle to the action journal; stays valid after the display is boxed
    pub fn journal(&self) -> Journal {
        self.journal.clone()
    }

    /// Fill the entire framebuffer with a color
    pub fn fill(&mut self, color: [u8; 3]) {
        for chunk in self.buffer.chunks_exact_mut(3) {
            chunk.copy_from_slice(&color);
        }
    }

    /// Draw a filled rectangle
    pub fn draw_rect(&mut self, x: u32, y: u32, w: u32, h: u32, color: [u8; 3]) {
        for py in y..(y + h).min(self.height) {
            for px in x..(x + w).min(self.width) {
                self.set_pixel(px, py, color);
            }
        }
    }

    /// Draw text using font8x8 glyphs
    ///
    /// Each character is 8x8 pixels. Text does not wrap.
    pub fn draw_text(&mut self, x: u32, y: u32, text: &str, fg: [u8; 3], bg: [u8; 3]) {
        let mut cursor_x = x;
        for ch in text.chars() {
            if cursor_x >= self.width {
                break;
            }
            self.draw_char(cursor_x, y, ch, fg, bg);
            cursor_x += 8;
        }
    }

    fn draw_char(&mut self, x: u32, y: u32, ch: char, fg: [u8; 3], bg: [u8; 3]) {
        let glyph = BASIC_FONTS.get(ch).unwrap_or([0u8; 8]);
        for (row_idx, row) in glyph.iter().enumerate() {
            let py = y + row_idx as u32;
            if py >= self.height {
                break;
            }
            for bit in 0..8 {
                let px = x + bit;
                if px >= self.width {
                    break;
                }
                // font8x8 stores LSB as leftmost pixel
                let color = if (row >> bit) & 1 == 1 { fg } else { bg };
                self.set_pixel(px, py, color);
            }
        }
    }

    /// Get the color of a pixel
    pub fn get_pixel(&self, x: u32, y: u32) -> [u8; 3] {
        if x >= self.width || y >= self.height {
            return [0, 0, 0];
        }
        let idx = ((y * self.width + x) * 3) as usize;
        [self.buffer[idx], self.buffer[idx + 1], self.buffer[idx + 2]]
    }

    /// Set the color of a pixel
    pub fn set_pixel(&mut self, x: u32, y: u32, color: [u8; 3]) {
        if x >= self.width || y >= self.height {
            return;
        }
        let idx = ((y * self.width + x) * 3) as usize;
        self.buffer[idx..idx + 3].copy_from_slice(&color);
    }

    /// Encode the framebuffer as PNG bytes
    pub fn to_png(&self) -> AutomationResult<Vec<u8>> {
        let img: RgbImage = ImageBuffer::from_raw(self.width, self.height, self.buffer.clone())
            .ok_or_else(|| AutomationError::Capture("buffer size mismatch".to_string()))?;
        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
            .map_err(|e| AutomationError::Capture(format!("Failed to encode PNG: {}", e)))?;
        Ok(bytes)
    }

    /// Record an action, failing it if a fault was registered for it
    fn act(&mut self, entry: String) -> AutomationResult<()> {
        if let Some((_, err)) = self.faults.iter().find(|(e, _)| *e == entry) {
            self.journal.push(format!("{} (failed)", entry));
            return Err(err.clone());
        }

        let y = FIRST_LINE + self.lines * LINE_HEIGHT;
        self.draw_text(4, y, &entry, TEXT, BACKGROUND);
        self.lines += 1;
        self.journal.push(entry);
        Ok(())
    }
}

impl Automation for VirtualDisplay {
    fn source_type(&self) -> &str {
        "virtual"
    }

    fn screen_size(&mut self) -> AutomationResult<(u32, u32)> {
        if self.headless {
            return Err(AutomationError::NoDisplay(
                "virtual display is headless".to_string(),
            ));
        }
        Ok((self.width, self.height))
    }

    fn capture_screen(&mut self) -> AutomationResult<CaptureResult> {
        if let Some((_, err)) = self.faults.iter().find(|(e, _)| e == "capture") {
            self.journal.push("capture (failed)".to_string());
            return Err(err.clone());
        }
        self.journal.push("capture".to_string());
        Ok(CaptureResult {
            image_data: self.to_png()?,
            width: self.width,
            height: self.height,
        })
    }

    fn send_hotkey(&mut self, keys: &[String]) -> AutomationResult<()> {
        let codes = keys
            .iter()
            .map(|k| KeyCode::parse(k).map(|c| c.to_string()))
            .collect::<AutomationResult<Vec<_>>>()?;
        self.act(format!("hotkey {}", codes.join("+")))
    }

    fn send_key(&mut self, key: &str) -> AutomationResult<()> {
        let code = KeyCode::parse(key)?;
        self.act(format!("key {}", code))
    }

    fn type_text(&mut self, text: &str, interval: Duration) -> AutomationResult<()> {
        if !interval.is_zero() {
            for _ in text.chars() {
                thread::sleep(interval);
            }
        }
        self.act(format!("type {}", text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_framebuffer_operations() {
        let mut display = VirtualDisplay::new(100, 100);

        display.fill([128, 128, 128]);
        assert_eq!(display.get_pixel(50, 50), [128, 128, 128]);

        display.draw_rect(10, 10, 20, 20, [255, 0, 0]);
        assert_eq!(display.get_pixel(15, 15), [255, 0, 0]);
        assert_eq!(display.get_pixel(500, 500), [0, 0, 0]);
    }

    #[test]
    fn test_capture_produces_png_of_display_size() {
        let mut display = VirtualDisplay::new(64, 48);
        let capture = display.capture_screen().unwrap();
        let decoded = image::load_from_memory(&capture.image_data).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (64, 48));
        assert_eq!((capture.width, capture.height), (64, 48));
    }

    #[test]
    fn test_actions_are_journaled_and_drawn() {
        let mut display = VirtualDisplay::new(200, 100);
        let journal = display.journal();
        let before = display.to_png().unwrap();

        display
            .send_hotkey(&["Alt".to_string(), "f".to_string()])
            .unwrap();
        display.send_key("return").unwrap();
        display.type_text("/tmp/game.iso", Duration::ZERO).unwrap();

        assert_eq!(
            journal.entries(),
            vec!["hotkey alt+f", "key enter", "type /tmp/game.iso"]
        );
        assert_ne!(before, display.to_png().unwrap());
    }

    #[test]
    fn test_fault_injection() {
        let mut display = VirtualDisplay::new(50, 50)
            .fail_on("key o", AutomationError::Interlock("corner".into()));
        let journal = display.journal();

        assert_eq!(
            display.send_key("o"),
            Err(AutomationError::Interlock("corner".into()))
        );
        assert!(display.send_key("p").is_ok());
        assert_eq!(journal.entries(), vec!["key o (failed)", "key p"]);
    }

    #[test]
    fn test_unknown_key_is_rejected_before_journaling() {
        let mut display = VirtualDisplay::new(50, 50);
        let journal = display.journal();
        assert!(matches!(
            display.send_key("hyper"),
            Err(AutomationError::UnknownKey(_))
        ));
        assert!(journal.entries().is_empty());
    }

    #[test]
    fn test_headless_size_query_fails() {
        let mut display = VirtualDisplay::headless();
        assert!(matches!(
            display.screen_size(),
            Err(AutomationError::NoDisplay(_))
        ));
    }
}
