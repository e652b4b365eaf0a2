//! Script-command tokenizer.
//!
//! Decompressed script text is a flat run of `_OPCODE(ARGS);` fragments,
//! where `ARGS` is a comma-separated argument list drawn from
//! `[\w\s\-,`@$:.+^_]*` — there are no quoted strings in the grammar; the
//! Japanese text itself lives in the separate offset-addressed string table,
//! not inline in the script. This pulls out the handful of opcodes that
//! carry translatable text (`MSAD`, `SELR`, the `ZM*` family), the
//! `$NNNNNN` byte offsets and `@x` modifiers embedded in each argument, and
//! tracks the current page across `PGST` commands, the way
//! `luna/translation_db.py::from_mrg` walks a decompressed scene.
use crate::error::Error;
use fancy_regex::Regex;
use lazy_static::lazy_static;
use std::collections::HashSet;

lazy_static! {
    static ref OFFSET_RE: Regex = Regex::new(r"\$(\d+)").unwrap();
    static ref MODIFIER_RE: Regex = Regex::new(r"@(\w)").unwrap();
}

/// One `$offset` reference pulled out of a scene's script. The Japanese text
/// itself is resolved later from the string table by offset; this only
/// carries the emission context the rewriter needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextCommand {
    /// Byte offset into the string table, from the fragment's `$NNNNNN` marker.
    pub offset: u32,
    /// Current page number, the most recent `PGST` argument (or `0` before
    /// the first one).
    pub page: i32,
    /// Modifier letters pulled out of `@x`-style argument tags, in order of
    /// appearance, shared across every offset in the same argument.
    pub modifiers: Vec<char>,
    /// True for `SELR` (a player-facing choice).
    pub is_choice: bool,
    /// True when this command's rendered text continues the previous
    /// command's text on the same line: an `MSAD` or `@x`-tagged command
    /// whose predecessor (on the same page) did not force a newline.
    pub glue: bool,
    /// True when a literal `^` between this offset's marker and the next
    /// forces a newline after this command, breaking any glue a following
    /// command might carry.
    pub forced_newline: bool,
}

/// Parses one scene's decompressed text into its ordered text commands,
/// tracking page number via `PGST` as it goes.
///
/// Malformed fragments (unmatched parens) are reported via the returned
/// error list rather than aborting the whole scan; callers (the DB
/// bootstrap) log-and-skip them.
pub fn parse_commands(script: &str) -> (Vec<TextCommand>, Vec<Error>) {
    let mut commands = Vec::new();
    let mut errors = Vec::new();
    let mut page: i32 = 0;
    let mut seen_offsets = HashSet::new();
    // None at the start of a scene or right after a page break: nothing to
    // glue onto yet, so the next eligible command cannot glue either.
    let mut prev_forced_newline: Option<bool> = None;

    for fragment in split_fragments(script) {
        let fragment = fragment.trim();
        if fragment.is_empty() {
            continue;
        }
        let Some((opcode, args)) = split_opcode(fragment) else {
            errors.push(Error::MalformedScriptCommand { fragment: fragment.to_string() });
            continue;
        };

        if opcode == "PGST" {
            if let Some(n) = first_arg(args).and_then(|a| a.trim().parse::<i32>().ok()) {
                page = n;
            }
            prev_forced_newline = None;
            continue;
        }

        if !matches!(opcode, "MSAD" | "SELR") && !opcode.starts_with("ZM") {
            continue;
        }
        let is_choice = opcode == "SELR";
        let opcode_glue_eligible_base = opcode == "MSAD";

        for arg in args.split(',') {
            let offset_matches: Vec<(usize, u32)> = OFFSET_RE
                .captures_iter(arg)
                .filter_map(Result::ok)
                .filter_map(|c| {
                    let m = c.get(0)?;
                    let n: u32 = c.get(1)?.as_str().parse().ok()?;
                    Some((m.start(), n))
                })
                .collect();
            if offset_matches.is_empty() {
                continue;
            }

            let modifiers: Vec<char> = MODIFIER_RE
                .captures_iter(arg)
                .filter_map(Result::ok)
                .filter_map(|c| c.get(1)?.as_str().chars().next())
                .collect();
            let opcode_glue_eligible = opcode_glue_eligible_base || modifiers.contains(&'x');

            for (idx, &(pos, offset)) in offset_matches.iter().enumerate() {
                if !seen_offsets.insert(offset) {
                    continue;
                }
                let scan_end = offset_matches.get(idx + 1).map(|&(p, _)| p).unwrap_or(arg.len());
                let forced_newline = arg[pos..scan_end].contains('^');
                let glue = opcode_glue_eligible && prev_forced_newline == Some(false);

                commands.push(TextCommand { offset, page, modifiers: modifiers.clone(), is_choice, glue, forced_newline });
                prev_forced_newline = Some(forced_newline);
            }
        }
    }

    (commands, errors)
}

fn first_arg(args: &str) -> Option<&str> {
    args.split(',').next()
}

/// Splits a script body on top-level `;` terminators. The argument grammar
/// contains no `;`, so a plain split is exact.
fn split_fragments(script: &str) -> std::str::Split<'_, char> {
    script.split(';')
}

/// Splits `_OPCODE(ARGS)` into its opcode name and raw argument text.
fn split_opcode(fragment: &str) -> Option<(&str, &str)> {
    let fragment = fragment.trim_start();
    let rest = fragment.strip_prefix('_')?;
    let paren = rest.find('(')?;
    if !rest.ends_with(')') {
        return None;
    }
    let opcode = &rest[..paren];
    if opcode.is_empty() || !opcode.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    let args = &rest[paren + 1..rest.len() - 1];
    Some((opcode, args))
}
