//! ANSI escape sequence removal for log lines and notifications.

use regex::Regex;
use std::sync::OnceLock;

static ANSI_REGEX: OnceLock<Regex> = OnceLock::new();

fn ansi_regex() -> &'static Regex {
    ANSI_REGEX.get_or_init(|| {
        // ESC or 8-bit CSI, then either an OSC-style sequence terminated by BEL
        // or a CSI/SGR sequence with numeric parameters and a final byte
        Regex::new(
            r"[\x1b\x{9b}][\[\]()#;?]*(?:(?:(?:[a-zA-Z\d]*(?:;[a-zA-Z\d]*)*)?\x07)|(?:(?:\d{1,4}(?:;\d{0,4})*)?[\dA-PRZcf-ntqry=><~]))",
        )
        .expect("valid ANSI regex")
    })
}

/// Strip ANSI escape sequences from text.
pub fn strip_ansi(text: &str) -> String {
    ansi_regex().replace_all(text, "").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_colors() {
        assert_eq!(strip_ansi("\x1b[31mred\x1b[0m text"), "red text");
    }

    #[test]
    fn test_strip_bold_and_reset() {
        assert_eq!(
            strip_ansi("\x1b[1mbold\x1b[0m and \x1b[4munderline\x1b[m"),
            "bold and underline"
        );
    }

    #[test]
    fn test_strip_256_and_rgb_color() {
        assert_eq!(strip_ansi("\x1b[38;5;196mred\x1b[0m"), "red");
        assert_eq!(strip_ansi("\x1b[38;2;255;0;0mred\x1b[0m"), "red");
    }

    #[test]
    fn test_strip_cursor_and_erase() {
        assert_eq!(strip_ansi("\x1b[2J\x1b[Hclear"), "clear");
        assert_eq!(strip_ansi("\x1b[Ktext\x1b[5A"), "text");
    }

    #[test]
    fn test_strip_osc_title() {
        assert_eq!(strip_ansi("\x1b]0;title\x07normal"), "normal");
    }

    #[test]
    fn test_plain_text_untouched() {
        assert_eq!(strip_ansi("plain [text] 100%"), "plain [text] 100%");
        assert_eq!(strip_ansi(""), "");
    }
}
