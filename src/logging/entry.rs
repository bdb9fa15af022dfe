// SPDX-License-Identifier: Apache-2.0 OR MIT
// Log line and its fixed-size slot encoding

use std::borrow::Cow;

/// Bytes per stored line, terminator included
pub const DEFAULT_LINE_LEN: usize = 256;

/// One finished line: wall-clock stamp, status prefix, body
///
/// The prefix carries the uptime, the channel glyphs and the connection
/// column. The body normally ends with a newline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    pub timestamp: String,
    pub prefix: String,
    pub body: String,
}

impl LogLine {
    pub fn new(timestamp: String, prefix: String, body: String) -> Self {
        Self {
            timestamp,
            prefix,
            body,
        }
    }

    /// Console and store form: `timestamp prefix body`
    pub fn render(&self) -> String {
        format!("{} {} {}", self.timestamp, self.prefix, self.body)
    }

    /// System log form: the syslog daemon stamps time itself
    pub fn syslog_text(&self) -> String {
        format!("{} {}", self.prefix, self.body.trim_end_matches('\n'))
    }
}

/// Replace every non-ASCII character with `?`
///
/// Journal viewers render lines with non-ASCII bytes as blobs.
pub fn scrub_ascii(text: &str) -> Cow<'_, str> {
    if text.is_ascii() {
        Cow::Borrowed(text)
    } else {
        Cow::Owned(
            text.chars()
                .map(|c| if c.is_ascii() { c } else { '?' })
                .collect(),
        )
    }
}

/// Copy `text` into a NUL-terminated slot, truncating deterministically.
///
/// Text that fits is stored verbatim. Longer text keeps `slot.len() - 2`
/// bytes followed by a newline, so the stored line always ends in `\n\0`
/// and never overflows. Returns the stored length without the terminator.
pub fn encode_slot(slot: &mut [u8], text: &str) -> usize {
    let cap = slot.len();
    if cap == 0 {
        return 0;
    }
    let bytes = text.as_bytes();

    let len = if bytes.len() < cap {
        slot[..bytes.len()].copy_from_slice(bytes);
        bytes.len()
    } else if cap == 1 {
        0
    } else {
        let mut keep = cap - 2;
        while !text.is_char_boundary(keep) {
            keep -= 1;
        }
        slot[..keep].copy_from_slice(&bytes[..keep]);
        slot[keep] = b'\n';
        keep + 1
    };

    slot[len] = 0;
    len
}

/// Read a slot written by [`encode_slot`]
pub fn decode_slot(slot: &[u8]) -> String {
    let len = slot.iter().position(|&b| b == 0).unwrap_or(slot.len());
    String::from_utf8_lossy(&slot[..len]).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render() {
        let line = LogLine::new(
            "Thu Oct 16 09:05:03".to_string(),
            "00:00:01.250 .1.. ".to_string(),
            "hello\n".to_string(),
        );
        assert_eq!(line.render(), "Thu Oct 16 09:05:03 00:00:01.250 .1..  hello\n");
        assert_eq!(line.syslog_text(), "00:00:01.250 .1..  hello");
    }

    #[test]
    fn test_scrub_ascii() {
        assert!(matches!(scrub_ascii("plain"), Cow::Borrowed("plain")));
        assert_eq!(scrub_ascii("tuned 7.0 MHz ±5 Hz"), "tuned 7.0 MHz ?5 Hz");
        assert_eq!(scrub_ascii("日本"), "??");
    }

    #[test]
    fn test_short_line_verbatim() {
        let mut slot = [0xffu8; 16];
        let n = encode_slot(&mut slot, "abc\n");
        assert_eq!(n, 4);
        assert_eq!(decode_slot(&slot), "abc\n");
    }

    #[test]
    fn test_exact_fit() {
        // 15 chars + terminator fills a 16-byte slot with no truncation
        let mut slot = [0u8; 16];
        let text = "abcdefghijklmn\n";
        assert_eq!(encode_slot(&mut slot, text), 15);
        assert_eq!(decode_slot(&slot), text);
    }

    #[test]
    fn test_truncation() {
        let mut slot = [0u8; 16];
        let text = "x".repeat(100);
        let n = encode_slot(&mut slot, &text);
        assert_eq!(n, 15);
        let stored = decode_slot(&slot);
        assert_eq!(stored.len(), 15);
        assert_eq!(stored, format!("{}\n", "x".repeat(14)));
        assert_eq!(slot[15], 0);
    }

    #[test]
    fn test_truncation_respects_char_boundary() {
        let mut slot = [0u8; 9];
        // 'é' is two bytes; a 7-byte cut would split the fourth one
        let stored_len = encode_slot(&mut slot, "ééééé");
        let stored = decode_slot(&slot);
        assert_eq!(stored, "ééé\n");
        assert_eq!(stored_len, 7);
    }

    #[test]
    fn test_overwrite_shorter() {
        let mut slot = [0u8; 32];
        encode_slot(&mut slot, "a much longer first line\n");
        encode_slot(&mut slot, "short\n");
        assert_eq!(decode_slot(&slot), "short\n");
    }
}
