//! Script rewriter: expands control codes, applies charswap, greedily
//! wraps translated text, and repacks the whole string table into a
//! `script_text` container.
//!
//! Grounded on `luna/translation_db.py::generate_script_text_mrg`: a running
//! column cursor walks each scene's command list in order. A glued command
//! (one whose predecessor on the same page did not force a newline)
//! continues wrapping from wherever the cursor landed rather than starting a
//! fresh line, so the wrap never introduces a break the engine wouldn't also
//! produce. Packing itself — the offset table spanning every numeric offset
//! and the filler tables — lives in `string_table.rs`, since it is global
//! across every scene (including `ORPHANED_LINES`), not a per-scene concern.
use crate::db::TranslationDb;
use crate::error::Error;
use crate::string_table;
use crate::text_utils::{apply_control_codes, display_width, linebreak, noruby_width};
use crate::types::LayoutConfig;
use anyhow::Result;
use std::collections::BTreeMap;

/// One command's final rendered text, after control codes, charswap and
/// line-breaking, ready to be written into the string table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedLine {
    pub offset: u32,
    pub text: String,
}

fn apply_charswap(text: &str, charswap: &BTreeMap<char, char>) -> String {
    text.chars().map(|c| *charswap.get(&c).unwrap_or(&c)).collect()
}

/// Renders one scene's commands into their final on-disk text, honoring
/// glue: a glued command's text wraps starting from the column its
/// predecessor's wrap left the cursor at, rather than from column zero, so a
/// greedy line break never falls where the engine would instead keep running
/// the previous command's text onto the same visual line. The cursor resets
/// to zero whenever a command is not glued (unless it is a QA scene, or its
/// text carries `%{force_glue}`), or the page number changes. QA scenes skip
/// line-breaking entirely — their text is emitted as translated, unwrapped.
/// An untranslated command (no `en_text`) emits its Japanese source text
/// verbatim and does not move the cursor. If a glued command's text cannot
/// be broken at a legal boundary within `wrap_width`, the failure surfaces
/// as [`Error::UnbreakableGlue`].
pub fn render_scene(db: &TranslationDb, scene: &str, config: &LayoutConfig) -> Result<Vec<RenderedLine>> {
    let commands = db
        .lines_for_scene(scene)
        .ok_or_else(|| anyhow::anyhow!("no such scene: {}", scene))?
        .to_vec();
    let charswap = db.get_charswap_map();
    let is_qa_scene = scene.contains("QA");

    let mut rendered = Vec::with_capacity(commands.len());
    let mut cursor = 0usize;
    let mut prev_page: Option<i32> = None;

    for (i, cmd) in commands.iter().enumerate() {
        let tl_line = db.tl_line_for_cmd(cmd);
        let jp_text = tl_line.map(|l| l.jp_text.as_str()).unwrap_or("");
        let raw_en = tl_line.and_then(|l| l.en_text.as_deref()).unwrap_or("");

        if raw_en.is_empty() {
            rendered.push(RenderedLine { offset: cmd.offset, text: jp_text.to_string() });
            prev_page = Some(cmd.page);
            continue;
        }

        let trailing_crlf = jp_text.ends_with("\r\n");
        let stripped = raw_en.replace("\r\n", "").replace('\n', "");

        let lacks_force_glue = !raw_en.contains("%{force_glue}");
        let page_changed = prev_page != Some(cmd.page);
        if page_changed || (!cmd.glue && !is_qa_scene && lacks_force_glue) {
            cursor = 0;
        }
        prev_page = Some(cmd.page);

        let expanded = apply_control_codes(&stripped, config.pua_enabled, config.strict).map_err(anyhow::Error::from)?;
        let mut swapped = apply_charswap(&expanded.text, charswap);

        // Gluing onto a line the cursor is already partway across: a leading
        // space would double up with the implicit break the engine renders.
        if cmd.glue && cursor > 0 && swapped.starts_with(' ') {
            swapped.remove(0);
        }

        let mut wrapped = if is_qa_scene { swapped } else { linebreak(&swapped, config.wrap_width, cursor) };

        if !is_qa_scene {
            let unbreakable =
                wrapped.split('\n').any(|l| display_width(l) > config.wrap_width && !l.contains(' '));
            if unbreakable {
                return Err(Error::UnbreakableGlue { scene: scene.to_string(), offset: cmd.offset }.into());
            }
        }

        cursor = if wrapped.contains('\n') {
            let last = wrapped.rsplit('\n').next().unwrap_or("");
            noruby_width(last).unwrap_or_else(|_| display_width(last))
        } else {
            let w = noruby_width(&wrapped).unwrap_or_else(|_| display_width(&wrapped));
            (cursor + w) % config.wrap_width.max(1)
        };

        glue_lookahead(db, &commands, i, config, charswap, scene, &mut wrapped, &mut cursor)?;

        if trailing_crlf && !wrapped.ends_with("\r\n") {
            wrapped.push_str("\r\n");
        }

        rendered.push(RenderedLine { offset: cmd.offset, text: wrapped });
    }
    Ok(rendered)
}

/// Looks one command ahead: if the next command glues onto this one and
/// will render non-empty text, either let the glue stand, force a newline
/// before it, or break this command's own last internal space to make room —
/// failing with [`Error::UnbreakableGlue`] only if none of those are
/// possible. `cursor` holds this command's own post-wrap cursor on entry and
/// is updated in place if the lookahead has to force a break.
#[allow(clippy::too_many_arguments)]
fn glue_lookahead(
    db: &TranslationDb,
    commands: &[crate::db::SceneCommand],
    i: usize,
    config: &LayoutConfig,
    charswap: &BTreeMap<char, char>,
    scene: &str,
    wrapped: &mut String,
    cursor: &mut usize,
) -> Result<()> {
    let Some(next) = commands.get(i + 1) else { return Ok(()) };
    if !next.glue {
        return Ok(());
    }
    let next_tl = db.tl_line_for_cmd(next);
    let next_raw_en = next_tl.and_then(|l| l.en_text.as_deref()).unwrap_or("");
    if next_raw_en.is_empty() {
        return Ok(());
    }
    let next_stripped = next_raw_en.replace("\r\n", "").replace('\n', "");
    let next_expanded = apply_control_codes(&next_stripped, config.pua_enabled, config.strict).map_err(anyhow::Error::from)?;
    let next_swapped = apply_charswap(&next_expanded.text, charswap);

    let starts_with_space = next_swapped.starts_with(' ');
    let ends_with_newline = wrapped.ends_with('\n');

    if starts_with_space && !ends_with_newline && *cursor == 0 {
        wrapped.push('\n');
        *cursor = 0;
        return Ok(());
    }
    if !starts_with_space {
        let first_word_width = next_swapped
            .split_whitespace()
            .next()
            .map(|w| noruby_width(w).unwrap_or_else(|_| display_width(w)))
            .unwrap_or(0);
        if *cursor + first_word_width > config.wrap_width {
            if let Some(last_space) = wrapped.rfind(' ') {
                wrapped.replace_range(last_space..last_space + 1, "\n");
                let last_line = wrapped.rsplit('\n').next().unwrap_or("");
                *cursor = noruby_width(last_line).unwrap_or_else(|_| display_width(last_line));
            } else {
                return Err(Error::UnbreakableGlue { scene: scene.to_string(), offset: commands[i].offset }.into());
            }
        }
    }
    Ok(())
}

/// Renders every scene (including `ORPHANED_LINES`) and packs the combined
/// offset-addressed string table into a `script_text` container.
pub fn generate_script_text_mrg(db: &TranslationDb, config: &LayoutConfig) -> Result<Vec<u8>> {
    let mut offset_to_string: BTreeMap<u32, String> = BTreeMap::new();
    for scene in db.scene_names(true) {
        let rendered = render_scene(db, scene, config)?;
        for line in rendered {
            offset_to_string.insert(line.offset, line.text);
        }
    }
    string_table::pack(&offset_to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_db_from_script;

    #[test]
    fn renders_plain_line_with_translation() {
        let mut db = test_db_from_script("scene_a", "_MSAD($1);", &[(1, "jp text")]);
        let hash = db.scene_map["scene_a"].commands[0].hash.clone();
        db.set_translation_and_comment_for_hash(&hash, Some("hello there".into()), None);
        let rendered = render_scene(&db, "scene_a", &LayoutConfig::default()).unwrap();
        assert_eq!(rendered[0].text, "hello there");
    }

    #[test]
    fn untranslated_command_emits_jp_text_verbatim() {
        let db = test_db_from_script("scene_a", "_MSAD($1);", &[(1, "jp text")]);
        let rendered = render_scene(&db, "scene_a", &LayoutConfig::default()).unwrap();
        assert_eq!(rendered[0].text, "jp text");
    }

    #[test]
    fn a_glued_command_continues_wrapping_from_its_predecessors_cursor() {
        let mut db = test_db_from_script("scene_a", "_MSAD($1);_MSAD($2@x);", &[(1, "jp one"), (2, "jp two")]);
        let h0 = db.scene_map["scene_a"].commands[0].hash.clone();
        let h1 = db.scene_map["scene_a"].commands[1].hash.clone();
        db.set_translation_and_comment_for_hash(&h0, Some("part one".into()), None);
        db.set_translation_and_comment_for_hash(&h1, Some("part two".into()), None);
        // "part one" leaves the cursor at column 8; with room to spare,
        // "part two" renders unbroken starting from that column.
        let rendered = render_scene(&db, "scene_a", &LayoutConfig { wrap_width: 20, ..Default::default() })
            .unwrap();
        assert_eq!(rendered[0].text, "part one");
        assert_eq!(rendered[1].text, "part two");

        // At a narrower width the same glued command no longer fits
        // starting from column 8 and has to wrap onto its own line.
        let rendered = render_scene(&db, "scene_a", &LayoutConfig { wrap_width: 9, ..Default::default() }).unwrap();
        assert_eq!(rendered[1].text, "part\ntwo");
    }

    #[test]
    fn unbreakable_text_is_an_error() {
        let mut db = test_db_from_script("scene_a", "_MSAD($1);", &[(1, "jp one")]);
        let h0 = db.scene_map["scene_a"].commands[0].hash.clone();
        db.set_translation_and_comment_for_hash(&h0, Some("a".repeat(80)), None);
        let result = render_scene(&db, "scene_a", &LayoutConfig { wrap_width: 10, ..Default::default() });
        assert!(result.is_err());
    }

    #[test]
    fn qa_scenes_are_emitted_unwrapped() {
        let mut db = test_db_from_script("scene_QA", "_MSAD($1);", &[(1, "jp")]);
        let hash = db.scene_map["scene_QA"].commands[0].hash.clone();
        let long = "a ".repeat(40);
        db.set_translation_and_comment_for_hash(&hash, Some(long.clone()), None);
        let rendered = render_scene(&db, "scene_QA", &LayoutConfig { wrap_width: 10, ..Default::default() }).unwrap();
        assert_eq!(rendered[0].text, long);
    }

    #[test]
    fn an_override_takes_precedence_over_the_shared_translation() {
        let mut db = test_db_from_script("scene_a", "_MSAD($1);", &[(1, "jp")]);
        let hash = db.scene_map["scene_a"].commands[0].hash.clone();
        db.set_translation_and_comment_for_hash(&hash, Some("shared".into()), None);
        db.override_translation_and_comment_for_offset(1, Some("overridden".into()), None).unwrap();
        let rendered = render_scene(&db, "scene_a", &LayoutConfig::default()).unwrap();
        assert_eq!(rendered[0].text, "overridden");
    }

    #[test]
    fn generate_script_text_mrg_packs_every_scenes_offsets() {
        let mut db = test_db_from_script("scene_a", "_MSAD($1);", &[(1, "jp one")]);
        let h0 = db.scene_map["scene_a"].commands[0].hash.clone();
        db.set_translation_and_comment_for_hash(&h0, Some("hi".into()), None);
        let packed = generate_script_text_mrg(&db, &LayoutConfig::default()).unwrap();
        let container = crate::container::Container::parse(&packed).unwrap();
        let strings = crate::string_table::parse(&container).unwrap();
        assert_eq!(strings.get(&1).map(String::as_str), Some("hi"));
    }
}
