//! Plain-text tail of a session's output.
//!
//! Panes do not emulate a terminal. Escape sequences are stripped, carriage
//! returns overwrite the current line, and only the last few hundred lines
//! are kept. Window-title sequences (`OSC 0` / `OSC 2`) are picked out on the
//! way so the pane title can follow them.

use std::collections::VecDeque;

/// Lines kept per session.
pub const DEFAULT_MAX_LINES: usize = 500;

/// Longest OSC payload collected before it is dropped.
const MAX_OSC_LEN: usize = 512;

const ESC: char = '\u{1b}';
const BEL: char = '\u{7}';

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum State {
    #[default]
    Ground,
    Escape,
    Csi,
    Osc,
    /// `ESC` seen inside an OSC; a `\` terminates it.
    OscEscape,
    /// Charset designation: one more character follows.
    Designate,
}

/// Removes escape sequences from a stream of text chunks.
///
/// Sequences split across chunks are handled.
#[derive(Debug, Default, Clone)]
pub struct EscapeStripper {
    state: State,
    osc: String,
}

impl EscapeStripper {
    /// Feeds one chunk, appending visible characters to `out`.
    ///
    /// Returns the last window title announced in the chunk.
    pub fn strip_into(&mut self, chunk: &str, out: &mut String) -> Option<String> {
        let mut title = None;
        for c in chunk.chars() {
            match self.state {
                State::Ground => {
                    if c == ESC {
                        self.state = State::Escape;
                    } else {
                        out.push(c);
                    }
                }
                State::Escape => {
                    self.state = match c {
                        '[' => State::Csi,
                        ']' => {
                            self.osc.clear();
                            State::Osc
                        }
                        '(' | ')' | '*' | '+' | '#' | '%' => State::Designate,
                        _ => State::Ground,
                    };
                }
                State::Csi => {
                    if ('\u{40}'..='\u{7e}').contains(&c) {
                        self.state = State::Ground;
                    }
                }
                State::Osc => match c {
                    BEL => {
                        title = self.finish_osc().or(title);
                    }
                    ESC => self.state = State::OscEscape,
                    _ => {
                        if self.osc.len() < MAX_OSC_LEN {
                            self.osc.push(c);
                        }
                    }
                },
                State::OscEscape => {
                    if c == '\\' {
                        title = self.finish_osc().or(title);
                    } else {
                        // Unterminated OSC; drop it along with the stray escape.
                        self.osc.clear();
                        self.state = State::Ground;
                    }
                }
                State::Designate => self.state = State::Ground,
            }
        }
        title
    }

    fn finish_osc(&mut self) -> Option<String> {
        self.state = State::Ground;
        let payload = std::mem::take(&mut self.osc);
        let (kind, text) = payload.split_once(';')?;
        matches!(kind, "0" | "2").then(|| text.to_string())
    }
}

/// Bounded buffer of stripped output lines.
#[derive(Debug, Clone)]
pub struct OutputTail {
    lines: VecDeque<String>,
    current: String,
    pending_cr: bool,
    max_lines: usize,
    stripper: EscapeStripper,
}

impl Default for OutputTail {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LINES)
    }
}

impl OutputTail {
    pub fn new(max_lines: usize) -> Self {
        Self {
            lines: VecDeque::new(),
            current: String::new(),
            pending_cr: false,
            max_lines: max_lines.max(1),
            stripper: EscapeStripper::default(),
        }
    }

    /// Appends a chunk of raw output. Returns a window title if one was set.
    pub fn push(&mut self, bytes: &[u8]) -> Option<String> {
        let chunk = String::from_utf8_lossy(bytes);
        let mut visible = String::with_capacity(chunk.len());
        let title = self.stripper.strip_into(&chunk, &mut visible);

        for c in visible.chars() {
            match c {
                '\n' => {
                    self.pending_cr = false;
                    self.commit_line();
                }
                '\r' => self.pending_cr = true,
                '\u{8}' => {
                    self.current.pop();
                }
                '\t' => self.put(' '),
                c if c.is_control() => {}
                c => self.put(c),
            }
        }
        title
    }

    fn put(&mut self, c: char) {
        if self.pending_cr {
            self.current.clear();
            self.pending_cr = false;
        }
        self.current.push(c);
    }

    fn commit_line(&mut self) {
        let line = std::mem::take(&mut self.current);
        self.lines.push_back(line.trim_end().to_string());
        while self.lines.len() > self.max_lines {
            self.lines.pop_front();
        }
    }

    /// The last `height` lines, oldest first, including the unfinished one.
    pub fn last_lines(&self, height: usize) -> Vec<&str> {
        let mut all: Vec<&str> = self.lines.iter().map(String::as_str).collect();
        if !self.current.is_empty() {
            all.push(self.current.as_str());
        }
        let skip = all.len().saturating_sub(height);
        all.into_iter().skip(skip).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty() && self.current.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strip(text: &str) -> (String, Option<String>) {
        let mut out = String::new();
        let title = EscapeStripper::default().strip_into(text, &mut out);
        (out, title)
    }

    #[test]
    fn test_strips_color_and_cursor_sequences() {
        let (out, title) = strip("\x1b[1;32mok\x1b[0m \x1b[2K\x1b(Bdone");
        assert_eq!(out, "ok done");
        assert_eq!(title, None);
    }

    #[test]
    fn test_extracts_window_title() {
        let (out, title) = strip("\x1b]0;claude: app\x07hello");
        assert_eq!(out, "hello");
        assert_eq!(title.as_deref(), Some("claude: app"));

        let (_, title) = strip("\x1b]2;other\x1b\\");
        assert_eq!(title.as_deref(), Some("other"));

        // Hyperlinks are not titles.
        let (out, title) = strip("\x1b]8;;http://x\x07link\x1b]8;;\x07");
        assert_eq!(out, "link");
        assert_eq!(title, None);
    }

    #[test]
    fn test_sequence_split_across_chunks() {
        let mut tail = OutputTail::default();
        tail.push(b"abc\x1b[3");
        tail.push(b"1mdef\n");
        assert_eq!(tail.last_lines(5), vec!["abcdef"]);
    }

    #[test]
    fn test_carriage_return_overwrites_line() {
        let mut tail = OutputTail::default();
        tail.push(b"progress 10%\rprogress 90%\r\n");
        tail.push(b"done");
        assert_eq!(tail.last_lines(5), vec!["progress 90%", "done"]);
    }

    #[test]
    fn test_tail_is_bounded() {
        let mut tail = OutputTail::new(3);
        for i in 0..10 {
            tail.push(format!("line {i}\n").as_bytes());
        }
        assert_eq!(tail.last_lines(10), vec!["line 7", "line 8", "line 9"]);
        assert_eq!(tail.last_lines(1), vec!["line 9"]);
    }

    #[test]
    fn test_backspace_and_invalid_utf8() {
        let mut tail = OutputTail::default();
        tail.push(b"ab\x08c \xff");
        assert_eq!(tail.last_lines(1), vec!["ac \u{fffd}"]);
        assert!(!tail.is_empty());
    }
}
