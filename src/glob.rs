//! Glob patterns for `KEYS`
//!
//! Byte-wise matching with `*` (any run), `?` (any byte), `[abc]`, `[^abc]`,
//! `[a-z]` classes and `\x` for a literal `x`.

/// Whether `text` matches `pattern` in full
pub fn glob_match(pattern: &[u8], text: &[u8]) -> bool {
    let (mut p, mut t) = (0, 0);
    // Pattern position after the last `*` and the text position it resumes at
    let mut star: Option<(usize, usize)> = None;

    while t < text.len() {
        let step = match pattern.get(p) {
            Some(b'*') => {
                star = Some((p + 1, t));
                p += 1;
                continue;
            }
            Some(b'?') => Some(p + 1),
            Some(b'[') => match_class(pattern, p + 1, text[t]),
            Some(b'\\') if p + 1 < pattern.len() => (pattern[p + 1] == text[t]).then_some(p + 2),
            Some(&c) => (c == text[t]).then_some(p + 1),
            None => None,
        };

        match (step, star) {
            (Some(next), _) => {
                p = next;
                t += 1;
            }
            (None, Some((resume, from))) => {
                p = resume;
                t = from + 1;
                star = Some((resume, from + 1));
            }
            (None, None) => return false,
        }
    }

    pattern[p.min(pattern.len())..].iter().all(|&b| b == b'*')
}

/// Match one byte against the class starting at `start` (just past `[`);
/// returns the pattern position after the class on a match
fn match_class(pattern: &[u8], start: usize, byte: u8) -> Option<usize> {
    let mut i = start;
    let negate = pattern.get(i) == Some(&b'^');
    if negate {
        i += 1;
    }

    let mut matched = false;
    while i < pattern.len() && pattern[i] != b']' {
        if pattern[i] == b'\\' && i + 1 < pattern.len() {
            matched |= pattern[i + 1] == byte;
            i += 2;
        } else if i + 2 < pattern.len() && pattern[i + 1] == b'-' && pattern[i + 2] != b']' {
            let (lo, hi) = (pattern[i].min(pattern[i + 2]), pattern[i].max(pattern[i + 2]));
            matched |= (lo..=hi).contains(&byte);
            i += 3;
        } else {
            matched |= pattern[i] == byte;
            i += 1;
        }
    }

    // An unterminated class runs to the end of the pattern
    let next = (i + 1).min(pattern.len());
    (matched != negate).then_some(next)
}
