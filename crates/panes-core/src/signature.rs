//! Output signature heuristics.
//!
//! Readiness and confirmation prompts are detected by plain substring
//! matching against process output. This is a heuristic boundary, not a
//! protocol: the signature sets are fixed and neither stronger nor weaker
//! matching is attempted. Each session gets its own scanner so a signature
//! split across two output chunks still matches.

/// Output fragments announcing that the agent finished starting up.
pub const READY_SIGNATURES: &[&str] = &[
    "? for shortcuts",
    "Welcome to Claude",
    "/help for help",
    "Bypassing Permissions",
    "cwd: ",
];

/// Output fragments of a confirmation prompt waiting on the user.
pub const ATTENTION_SIGNATURES: &[&str] = &[
    "Do you want to",
    "Would you like to",
    "(y/n)",
    "[y/N]",
    "[Y/n]",
    "\u{276f} 1. Yes",
];

/// Characters of previous output kept to catch signatures split across chunks.
const TAIL_CHARS: usize = 64;

/// Incremental substring matcher over a stream of output chunks.
#[derive(Debug, Clone)]
pub struct SignatureScanner {
    signatures: &'static [&'static str],
    tail: String,
}

impl SignatureScanner {
    /// Scanner over an arbitrary signature set.
    pub fn new(signatures: &'static [&'static str]) -> Self {
        Self {
            signatures,
            tail: String::new(),
        }
    }

    /// Scanner for [`READY_SIGNATURES`].
    pub fn ready() -> Self {
        Self::new(READY_SIGNATURES)
    }

    /// Scanner for [`ATTENTION_SIGNATURES`].
    pub fn attention() -> Self {
        Self::new(ATTENTION_SIGNATURES)
    }

    /// Feeds one output chunk, returning the first signature found.
    pub fn scan(&mut self, chunk: &[u8]) -> Option<&'static str> {
        let text = String::from_utf8_lossy(chunk);
        let mut window = std::mem::take(&mut self.tail);
        window.push_str(&text);

        let found = self
            .signatures
            .iter()
            .copied()
            .find(|sig| window.contains(sig));

        if found.is_some() {
            // A match consumes the window so the same prompt is reported once.
            self.tail.clear();
        } else {
            self.tail = last_chars(&window, TAIL_CHARS);
        }
        found
    }
}

fn last_chars(text: &str, count: usize) -> String {
    let total = text.chars().count();
    text.chars().skip(total.saturating_sub(count)).collect()
}
