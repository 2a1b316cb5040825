//! Backend-neutral key names.
//!
//! Scripts name keys as plain strings ("alt", "f", "enter"). Both backends
//! parse them through [`KeyCode::parse`], so an unknown key is rejected the
//! same way whether the run targets a real desktop or the virtual display.

use std::fmt;

use super::{AutomationError, AutomationResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyCode {
    Alt,
    Control,
    Shift,
    Meta,
    Enter,
    Tab,
    Escape,
    Space,
    Backspace,
    Delete,
    Up,
    Down,
    Left,
    Right,
    Home,
    End,
    PageUp,
    PageDown,
    /// Function key F1..=F12
    Function(u8),
    /// Any single printable character
    Char(char),
}

impl KeyCode {
    /// Translate a logical key label into a key code
    pub fn parse(name: &str) -> AutomationResult<Self> {
        let trimmed = name.trim();
        let mut chars = trimmed.chars();
        if let (Some(ch), None) = (chars.next(), chars.next()) {
            return Ok(KeyCode::Char(ch.to_ascii_lowercase()));
        }

        let key = match trimmed.to_lowercase().as_str() {
            "alt" | "option" => KeyCode::Alt,
            "ctrl" | "control" => KeyCode::Control,
            "shift" => KeyCode::Shift,
            "meta" | "super" | "win" | "cmd" | "command" => KeyCode::Meta,
            "enter" | "return" => KeyCode::Enter,
            "tab" => KeyCode::Tab,
            "esc" | "escape" => KeyCode::Escape,
            "space" => KeyCode::Space,
            "backspace" => KeyCode::Backspace,
            "delete" | "del" => KeyCode::Delete,
            "up" => KeyCode::Up,
            "down" => KeyCode::Down,
            "left" => KeyCode::Left,
            "right" => KeyCode::Right,
            "home" => KeyCode::Home,
            "end" => KeyCode::End,
            "pageup" | "pgup" => KeyCode::PageUp,
            "pagedown" | "pgdn" => KeyCode::PageDown,
            other => match other.strip_prefix('f').and_then(|n| n.parse::<u8>().ok()) {
                Some(n @ 1..=12) => KeyCode::Function(n),
                _ => return Err(AutomationError::UnknownKey(name.to_string())),
            },
        };
        Ok(key)
    }
}

impl fmt::Display for KeyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyCode::Alt => f.write_str("alt"),
            KeyCode::Control => f.write_str("ctrl"),
            KeyCode::Shift => f.write_str("shift"),
            KeyCode::Meta => f.write_str("meta"),
            KeyCode::Enter => f.write_str("enter"),
            KeyCode::Tab => f.write_str("tab"),
            KeyCode::Escape => f.write_str("escape"),
            KeyCode::Space => f.write_str("space"),
            KeyCode::Backspace => f.write_str("backspace"),
            KeyCode::Delete => f.write_str("delete"),
            KeyCode::Up => f.write_str("up"),
            KeyCode::Down => f.write_str("down"),
            KeyCode::Left => f.write_str("left"),
            KeyCode::Right => f.write_str("right"),
            KeyCode::Home => f.write_str("home"),
            KeyCode::End => f.write_str("end"),
            KeyCode::PageUp => f.write_str("pageup"),
            KeyCode::PageDown => f.write_str("pagedown"),
            KeyCode::Function(n) => write!(f, "f{}", n),
            KeyCode::Char(c) => write!(f, "{}", c),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_named_keys() {
        assert_eq!(KeyCode::parse("alt").unwrap(), KeyCode::Alt);
        assert_eq!(KeyCode::parse("Return").unwrap(), KeyCode::Enter);
        assert_eq!(KeyCode::parse("ctrl").unwrap(), KeyCode::Control);
        assert_eq!(KeyCode::parse("F5").unwrap(), KeyCode::Function(5));
    }

    #[test]
    fn test_parse_single_characters() {
        assert_eq!(KeyCode::parse("o").unwrap(), KeyCode::Char('o'));
        assert_eq!(KeyCode::parse("F").unwrap(), KeyCode::Char('f'));
        assert_eq!(KeyCode::parse("/").unwrap(), KeyCode::Char('/'));
    }

    #[test]
    fn test_parse_rejects_unknown() {
        assert_eq!(
            KeyCode::parse("hyper"),
            Err(AutomationError::UnknownKey("hyper".to_string()))
        );
        assert!(KeyCode::parse("f13").is_err());
        assert!(KeyCode::parse("").is_err());
    }
}
