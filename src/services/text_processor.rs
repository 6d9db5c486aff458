// Text Processing Service
// Normalisation, token estimation and boundary-aware chunking of contract text

use regex::Regex;
use std::sync::OnceLock;

/// Characters per estimated token.
const CHARS_PER_TOKEN: usize = 4;

fn horizontal_ws_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[ \t\x0C\x0B\u{00A0}\u{3000}]+").expect("valid regex"))
}

fn blank_run_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\n{3,}").expect("valid regex"))
}

/// Normalize extracted document text: unify line endings, turn exotic
/// spaces into plain ones, collapse horizontal runs and trim every line.
/// Quotes and dashes are left alone so clause excerpts stay verbatim.
pub fn normalize_text(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    let s = text.replace("\r\n", "\n").replace('\r', "\n");
    let s = horizontal_ws_re().replace_all(&s, " ");

    let s = s.lines()
        .map(|ln| ln.trim())
        .collect::<Vec<_>>()
        .join("\n");

    blank_run_re().replace_all(&s, "\n\n").trim().to_string()
}

/// Rough token estimate: one token per four characters, rounded up.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(CHARS_PER_TOKEN)
}

/// Whether a document is too long for a single model call.
pub fn needs_chunking(text: &str, threshold_tokens: usize) -> bool {
    estimate_tokens(text) > threshold_tokens
}

/// Split `text` into overlapping chunks of about `chunk_size` tokens.
///
/// Text that already fits returns as a single chunk. Otherwise windows of
/// `chunk_size * 4` characters are cut, snapping the right edge back to the
/// last `". "` (preferred) or newline in the final fifth of the window, and
/// consecutive chunks share up to `overlap * 4` characters.
pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    chunk_spans(text, chunk_size, overlap)
        .into_iter()
        .map(|(start, end)| text[start..end].to_string())
        .collect()
}

/// Byte ranges of the chunks [`chunk_text`] would produce.
pub fn chunk_spans(text: &str, chunk_size: usize, overlap: usize) -> Vec<(usize, usize)> {
    if estimate_tokens(text) <= chunk_size {
        return vec![(0, text.len())];
    }

    // Work in character positions; `offsets[i]` is the byte offset of char i.
    let chars: Vec<char> = text.chars().collect();
    let offsets: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect();
    let total = chars.len();
    let window = (chunk_size * CHARS_PER_TOKEN).max(1);
    let overlap_chars = overlap * CHARS_PER_TOKEN;

    let mut spans = Vec::new();
    let mut start = 0usize;

    while start < total {
        let mut end = (start + window).min(total);

        if end < total {
            if let Some(boundary) = find_boundary(&chars, start, end, window) {
                end = boundary;
            }
        }

        spans.push((offsets[start], offsets[end]));

        if end >= total {
            break;
        }

        let next = end.saturating_sub(overlap_chars);
        start = if next <= start { end } else { next };
    }

    spans
}

/// Position just past the last sentence end (". ") or newline in
/// `chars[start..end]`, provided it falls in the final fifth of the window.
/// A sentence end is used only when it comes after the last newline.
fn find_boundary(chars: &[char], start: usize, end: usize, window: usize) -> Option<usize> {
    // i > end - window / 5, kept in integers
    let in_zone = |i: usize| i > start && 5 * i + window > 5 * end;

    let last_period = (start..end)
        .rev()
        .find(|&i| chars[i] == '.' && chars.get(i + 1) == Some(&' '));
    let last_newline = (start..end).rev().find(|&i| chars[i] == '\n');

    match (last_period, last_newline) {
        (Some(p), n) if in_zone(p) && n.map_or(true, |n| p > n) => Some(p + 1),
        (_, Some(n)) if in_zone(n) => Some(n + 1),
        _ => None,
    }
}
