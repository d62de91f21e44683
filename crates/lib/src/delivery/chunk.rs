//! Whitespace normalization and fixed-size splitting of replies.

/// Messenger rejects texts above 2000 characters; keep a margin.
pub const DEFAULT_CHUNK_LIMIT: usize = 1800;

/// Collapse runs of spaces/tabs to one space, collapse 3+ newlines to a blank line, trim.
pub fn normalize(text: &str) -> String {
    let mut spaced = String::with_capacity(text.len());
    let mut in_run = false;
    for c in text.chars() {
        if c == ' ' || c == '\t' {
            if !in_run {
                spaced.push(' ');
                in_run = true;
            }
            continue;
        }
        in_run = false;
        spaced.push(c);
    }

    let mut out = String::with_capacity(spaced.len());
    let mut newlines = 0usize;
    for c in spaced.chars() {
        if c == '\n' {
            newlines += 1;
            if newlines <= 2 {
                out.push('\n');
            }
        } else {
            newlines = 0;
            out.push(c);
        }
    }
    out.trim().to_string()
}

/// Normalize `text` and cut it every `limit` characters (not bytes). Word and line
/// boundaries are not preserved. Empty input yields no chunks.
pub fn chunk_text(text: &str, limit: usize) -> Vec<String> {
    let limit = limit.max(1);
    let text = normalize(text);
    if text.is_empty() {
        return Vec::new();
    }
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= limit {
        return vec![text];
    }
    chars
        .chunks(limit)
        .map(|c| c.iter().collect::<String>())
        .filter(|c| !c.is_empty())
        .collect()
}
