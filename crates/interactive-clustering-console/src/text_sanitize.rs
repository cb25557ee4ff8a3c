use std::iter::Peekable;
use std::str::Chars;

pub const MAX_DETAIL_CHARS: usize = 240;

/// Task details come straight from the backend; strip terminal escape
/// sequences and control characters, collapse whitespace runs and cap length.
pub fn sanitize_detail(input: &str) -> String {
    sanitize_with_limit(input, MAX_DETAIL_CHARS)
}

pub fn sanitize_with_limit(input: &str, limit: usize) -> String {
    let mut out = String::with_capacity(input.len().min(limit));
    let mut chars = input.chars().peekable();
    let mut count = 0usize;
    let mut pending_space = false;

    while let Some(c) = chars.next() {
        if c == '\x1b' {
            skip_escape(&mut chars);
            continue;
        }
        if c.is_whitespace() {
            pending_space = !out.is_empty();
            continue;
        }
        if c.is_control() || is_bidi_control(c) {
            continue;
        }
        if pending_space {
            if count >= limit {
                out.push_str("...");
                break;
            }
            out.push(' ');
            count += 1;
            pending_space = false;
        }
        if count >= limit {
            out.push_str("...");
            break;
        }
        out.push(c);
        count += 1;
    }

    out
}

fn skip_escape(chars: &mut Peekable<Chars<'_>>) {
    match chars.next() {
        // CSI: parameters until a final byte in '@'..='~'.
        Some('[') => {
            for c in chars.by_ref() {
                if ('@'..='~').contains(&c) {
                    break;
                }
            }
        }
        // OSC, DCS, SOS, PM, APC: until BEL or ST (ESC '\').
        Some(']' | 'P' | 'X' | '^' | '_') => {
            while let Some(c) = chars.next() {
                if c == '\x07' {
                    break;
                }
                if c == '\x1b' && chars.peek() == Some(&'\\') {
                    chars.next();
                    break;
                }
            }
        }
        _ => {}
    }
}

fn is_bidi_control(c: char) -> bool {
    matches!(c, '\u{061C}' | '\u{200E}' | '\u{200F}')
        || ('\u{202A}'..='\u{202E}').contains(&c)
        || ('\u{2066}'..='\u{2069}').contains(&c)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_color_and_title_sequences() {
        let got = sanitize_detail("step \u{1b}[1;32m3/5\u{1b}[0m \u{1b}]0;title\u{7}ok");
        assert_eq!(got, "step 3/5 ok");
    }

    #[test]
    fn strips_string_terminated_sequences() {
        assert_eq!(sanitize_detail("a\u{1b}Pdata\u{1b}\\b"), "ab");
    }

    #[test]
    fn collapses_whitespace_and_drops_controls() {
        assert_eq!(
            sanitize_detail("  vectorizing\t texts\r\n(2/4)\u{202e} \u{7} "),
            "vectorizing texts (2/4)"
        );
    }

    #[test]
    fn truncates_long_details() {
        assert_eq!(sanitize_with_limit("abcdefgh", 4), "abcd...");
        assert_eq!(sanitize_with_limit("abcd", 4), "abcd");
        assert_eq!(sanitize_with_limit("ab cd", 2), "ab...");
    }
}
