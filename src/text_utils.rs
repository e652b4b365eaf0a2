//! Ruby stripping, display-width accounting, word splitting, control-code
//! expansion and greedy line breaking.
//!
//! Ported from `luna/ruby_utils.py`, extended with PUA glyph-offsetting and
//! glue lookahead for the greedy wrap pass.
use crate::error::Error;

/// Private Use Area offset control codes map display glyphs into, matching
/// `luna/ruby_utils.py::PUA_OFFSET`.
pub const PUA_OFFSET: u32 = 0xE000;

/// Width, in display columns, of a single codepoint once ruby has been
/// stripped and control codes expanded: Private Use Area codepoints (custom
/// glyphs, `>= U+E000`, unbounded above) are always narrow (1 column),
/// codepoints above U+00FF are wide (2 columns), everything else is narrow
/// (1 column). Mirrors `unicode_aware_len`.
pub fn codepoint_width(c: char) -> usize {
    let cp = c as u32;
    if cp >= PUA_OFFSET {
        1
    } else if cp > 0xFF {
        2
    } else {
        1
    }
}

/// Sum of `codepoint_width` over a string.
pub fn display_width(s: &str) -> usize {
    s.chars().map(codepoint_width).sum()
}

/// Strips `<base|ruby>` markup, keeping only `base`.
///
/// A strict state machine mirroring `remove_ruby_text`: `<` opens a ruby
/// span, `|` separates base text from the ruby annotation, `>` closes it.
/// A `<` with no matching `>`, a `|` outside a span, or a `>` outside a span
/// are all `MalformedRuby`.
pub fn remove_ruby(text: &str) -> Result<String, Error> {
    let mut out = String::with_capacity(text.len());
    let mut in_ruby = false;
    let mut past_pipe = false;
    for c in text.chars() {
        match c {
            '<' => {
                if in_ruby {
                    return Err(Error::MalformedRuby { text: text.to_string() });
                }
                in_ruby = true;
                past_pipe = false;
            }
            '|' => {
                if !in_ruby || past_pipe {
                    return Err(Error::MalformedRuby { text: text.to_string() });
                }
                past_pipe = true;
            }
            '>' => {
                if !in_ruby || !past_pipe {
                    return Err(Error::MalformedRuby { text: text.to_string() });
                }
                in_ruby = false;
                past_pipe = false;
            }
            _ => {
                if !in_ruby || !past_pipe {
                    out.push(c);
                }
            }
        }
    }
    if in_ruby {
        return Err(Error::MalformedRuby { text: text.to_string() });
    }
    Ok(out)
}

/// Display width of `text` as if ruby had been stripped, without allocating
/// the stripped string. Mirrors `noruby_len`.
pub fn noruby_width(text: &str) -> Result<usize, Error> {
    Ok(display_width(&remove_ruby(text)?))
}

/// A single linebreak-unit: either a breakable word or an embedded `\n`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Word {
    Text(String),
    Newline,
}

/// Splits text into words for greedy wrapping, treating a whole `<base|ruby>`
/// span as one indivisible token and `\n` as its own token. Mirrors
/// `ruby_aware_split_words`.
pub fn split_words(text: &str) -> Vec<Word> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();
    let mut in_ruby = false;

    while let Some(c) = chars.next() {
        match c {
            '\n' => {
                if !current.is_empty() {
                    words.push(Word::Text(std::mem::take(&mut current)));
                }
                words.push(Word::Newline);
            }
            '<' => {
                if !current.is_empty() && !in_ruby {
                    words.push(Word::Text(std::mem::take(&mut current)));
                }
                in_ruby = true;
                current.push(c);
            }
            '>' if in_ruby => {
                current.push(c);
                in_ruby = false;
                words.push(Word::Text(std::mem::take(&mut current)));
            }
            c if c.is_whitespace() && !in_ruby => {
                if !current.is_empty() {
                    words.push(Word::Text(std::mem::take(&mut current)));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        words.push(Word::Text(current));
    }
    words
}

/// One applied control code's effect on the running text.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ControlCodeResult {
    pub text: String,
    /// Set by `%{force_glue}`: caller must not insert a break before the
    /// following word even at a natural boundary.
    pub force_glue: bool,
}

/// Expands the `%{...}` control-code mini-language, offsetting enclosed
/// glyphs into the Private Use Area when `pua_enabled` is set. Mirrors
/// `apply_control_codes`.
///
/// Supported codes: `%{n}` literal newline, `%{s}` literal space,
/// `%{nothing}` (no-op marker), `%{force_glue}`, `%{i}`/`%{/i}` italic span,
/// `%{r}`/`%{/r}` ... and their combined `%{ri}`/`%{/ri}` form, `%{g}`/`%{/g}`
/// glyph-offset span.
///
/// An unknown code, a mismatched closer, an unclosed span at the end of the
/// text, or a trailing `%{` with no closing `}` is a [`Error::BadControlCode`]
/// only when `strict` is set; otherwise the offending code is left untouched
/// (or, for a mismatched/unclosed span, simply not counted) and expansion
/// continues.
pub fn apply_control_codes(text: &str, pua_enabled: bool, strict: bool) -> Result<ControlCodeResult, Error> {
    let mut out = String::with_capacity(text.len());
    let mut force_glue = false;
    let mut pua_depth: usize = 0;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '%' || chars.peek() != Some(&'{') {
            if pua_depth > 0 && pua_enabled {
                push_pua(&mut out, c);
            } else {
                out.push(c);
            }
            continue;
        }
        chars.next(); // consume '{'
        let mut code = String::new();
        let mut closed = false;
        loop {
            match chars.next() {
                Some('}') => {
                    closed = true;
                    break;
                }
                Some(c) => code.push(c),
                None => break,
            }
        }
        if !closed {
            if strict {
                return Err(Error::BadControlCode { code, text: text.to_string() });
            }
            out.push('%');
            out.push('{');
            out.push_str(&code);
            continue;
        }
        match code.as_str() {
            "n" => out.push('\n'),
            "s" => out.push(' '),
            "nothing" => {}
            "force_glue" => force_glue = true,
            "i" | "r" | "ri" | "g" => pua_depth += 1,
            "/i" | "/r" | "/ri" | "/g" => {
                if pua_depth == 0 {
                    if strict {
                        return Err(Error::BadControlCode { code, text: text.to_string() });
                    }
                } else {
                    pua_depth -= 1;
                }
            }
            other => {
                if strict {
                    return Err(Error::BadControlCode { code: other.to_string(), text: text.to_string() });
                }
            }
        }
    }
    if pua_depth != 0 && strict {
        return Err(Error::BadControlCode { code: "<unclosed span>".to_string(), text: text.to_string() });
    }
    Ok(ControlCodeResult { text: out, force_glue })
}

fn push_pua(out: &mut String, c: char) {
    let cp = c as u32 + PUA_OFFSET;
    if let Some(ch) = char::from_u32(cp) {
        out.push(ch);
    } else {
        out.push(c);
    }
}

/// Greedily wraps `text` at `width` display columns, starting from an
/// already-occupied `start_col` (non-zero when this text continues a glued
/// line the cursor is partway across), honoring embedded newlines. Returns
/// the wrapped text as a single string with `\n` inserted at each break,
/// mirroring `linebreak_text`'s contract: if `text` already fits in one line
/// at `start_col`, or if any single token is wider than `width` on its own,
/// it is returned unchanged rather than force-broken.
pub fn linebreak(text: &str, width: usize, start_col: usize) -> String {
    let words = split_words(text);

    let any_oversized = words.iter().any(|w| match w {
        Word::Text(t) => noruby_width(t).unwrap_or_else(|_| display_width(t)) > width,
        Word::Newline => false,
    });
    if any_oversized {
        return text.to_string();
    }
    if !text.contains('\n') {
        let w = noruby_width(text).unwrap_or_else(|_| display_width(text));
        if start_col + w <= width {
            return text.to_string();
        }
    }

    let mut out = String::new();
    let mut col = start_col;
    let mut first_on_line = true;
    let words = split_words(text);
    let n = words.len();
    for (i, word) in words.into_iter().enumerate() {
        match word {
            Word::Newline => {
                // A trailing `\n` that is the very last token is absorbed by
                // the wrap's own break rather than producing an empty line.
                if i == n - 1 {
                    continue;
                }
                out.push('\n');
                col = 0;
                first_on_line = true;
            }
            Word::Text(w) => {
                // A ruby span's wrap width is its base text only (`noruby_len`);
                // the full `<base|ruby>` markup still lands in the output line.
                let w_width = noruby_width(&w).unwrap_or_else(|_| display_width(&w));
                if first_on_line {
                    out.push_str(&w);
                    col += w_width;
                    first_on_line = false;
                } else if col + 1 + w_width <= width {
                    out.push(' ');
                    out.push_str(&w);
                    col += 1 + w_width;
                } else {
                    out.push('\n');
                    out.push_str(&w);
                    col = w_width;
                    first_on_line = false;
                }
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_ruby_to_base_text() {
        assert_eq!(remove_ruby("<base|annotation> text").unwrap(), "base text");
    }

    #[test]
    fn unmatched_ruby_open_is_malformed() {
        assert!(remove_ruby("<base|annotation text").is_err());
    }

    #[test]
    fn stray_pipe_is_malformed() {
        assert!(remove_ruby("plain | text").is_err());
    }

    #[test]
    fn pua_codepoints_are_narrow() {
        let c = char::from_u32(PUA_OFFSET + 5).unwrap();
        assert_eq!(codepoint_width(c), 1);
        // The PUA range is unbounded above.
        let c = char::from_u32(0x10_FFFF).unwrap();
        assert_eq!(codepoint_width(c), 1);
    }

    #[test]
    fn wide_codepoints_count_double() {
        assert_eq!(codepoint_width('\u{3042}'), 2); // hiragana あ
    }

    #[test]
    fn splits_ruby_span_as_one_word() {
        let words = split_words("see <base|ruby> now");
        assert_eq!(
            words,
            vec![
                Word::Text("see".into()),
                Word::Text("<base|ruby>".into()),
                Word::Text("now".into()),
            ]
        );
    }

    #[test]
    fn control_code_n_and_s_expand() {
        let r = apply_control_codes("a%{n}b%{s}c", false, false).unwrap();
        assert_eq!(r.text, "a\nb c");
        assert!(!r.force_glue);
    }

    #[test]
    fn force_glue_flag_is_reported() {
        let r = apply_control_codes("%{force_glue}", false, false).unwrap();
        assert!(r.force_glue);
    }

    #[test]
    fn unknown_code_is_bad_control_code() {
        assert!(apply_control_codes("%{bogus}", false, true).is_err());
    }

    #[test]
    fn unclosed_span_is_bad_control_code() {
        assert!(apply_control_codes("%{i}unterminated", false, true).is_err());
    }

    #[test]
    fn unknown_code_is_tolerated_when_not_strict() {
        let r = apply_control_codes("a%{bogus}b", false, false).unwrap();
        assert_eq!(r.text, "ab");
    }

    #[test]
    fn unclosed_span_is_tolerated_when_not_strict() {
        assert!(apply_control_codes("%{i}unterminated", false, false).is_ok());
    }

    #[test]
    fn linebreak_wraps_at_width() {
        let wrapped = linebreak("aa bb cc dd", 5, 0);
        assert_eq!(wrapped, "aa bb\ncc dd");
    }

    #[test]
    fn linebreak_absorbs_trailing_newline() {
        let wrapped = linebreak("hello\n", 55, 0);
        assert_eq!(wrapped, "hello");
    }

    #[test]
    fn linebreak_leaves_text_that_already_fits_at_start_col_unchanged() {
        assert_eq!(linebreak("cd", 5, 3), "cd");
    }

    #[test]
    fn linebreak_wraps_immediately_when_start_col_leaves_no_room() {
        let wrapped = linebreak("cd ef", 5, 4);
        assert_eq!(wrapped, "cd\nef");
    }

    #[test]
    fn linebreak_returns_oversized_single_token_unchanged() {
        assert_eq!(linebreak("aaaaaaaaaa", 5, 0), "aaaaaaaaaa");
    }
}
