//! Human-editable export/import format.
//!
//! The export side mirrors `luna/readable_exporter.py::export_text`. The
//! import grammar is built directly from that export format's own structure:
//! each hash-addressed block must parse back into the same fields
//! `export_text` wrote.
use crate::db::{SceneCommand, TranslationDb};
use anyhow::{Context, Result};

/// Renders one scene's commands as hash-addressed editable blocks.
pub fn export_text(db: &TranslationDb, scene: &str) -> Result<String> {
    let commands = db
        .lines_for_scene(scene)
        .with_context(|| format!("no such scene: {}", scene))?;
    let mut out = String::new();
    for cmd in commands {
        let line = db
            .tl_line_for_cmd(cmd)
            .with_context(|| format!("scene '{}' references unknown hash {}", scene, cmd.hash))?;
        out.push('[');
        out.push_str(&cmd.hash);
        out.push_str("]\n");

        out.push_str(&format!("-- Page {}, Offset {}.", cmd.page, cmd.offset));
        if cmd.glue {
            out.push_str("Glued.");
        }
        if cmd.is_choice {
            out.push_str("Choice.");
        }
        if !cmd.modifiers.is_empty() {
            let mods: String = cmd.modifiers.iter().collect();
            out.push_str(&format!("Mods: {}.", mods));
        }
        out.push('\n');

        out.push_str("-- ");
        out.push_str(&line.jp_text);
        out.push('\n');

        if let Some(comment) = &line.comment {
            for comment_line in comment.lines() {
                out.push_str("// ");
                out.push_str(comment_line);
                out.push('\n');
            }
        }

        match &line.en_text {
            Some(text) if !text.is_empty() => out.push_str(text),
            _ => out.push_str("-- TRANSLATION HERE"),
        }
        out.push_str("\n}\n");
    }
    Ok(out)
}

/// One parsed editable block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportedLine {
    pub hash: String,
    pub en_text: String,
    pub comment: Option<String>,
}

/// Parses an export_text-formatted document back into hash-addressed
/// translation updates.
///
/// Grammar per block: a `[hash]` header, one or more `-- ...` metadata/JP
/// lines, zero or more `// ...` comment lines, then the translation body up
/// to a line containing only `}`. A body of exactly `-- TRANSLATION HERE`
/// is treated as "not yet translated" and produces no update.
pub fn import_text(data: &str) -> Result<Vec<ImportedLine>> {
    let mut out = Vec::new();
    let mut lines = data.lines().peekable();

    while let Some(line) = lines.next() {
        let line = line.trim_end();
        if line.is_empty() {
            continue;
        }
        let hash = line
            .strip_prefix('[')
            .and_then(|s| s.strip_suffix(']'))
            .with_context(|| format!("expected hash header, found: {:?}", line))?
            .to_string();

        // Skip the `-- Page N, Offset M....` metadata line and the `-- <jp>` line.
        let mut saw_metadata = false;
        let mut saw_jp = false;
        let mut comment_lines = Vec::new();
        let mut body_lines = Vec::new();
        loop {
            let Some(next) = lines.next() else {
                anyhow::bail!("unterminated block for hash {}", hash);
            };
            if next.trim_end() == "}" {
                break;
            }
            if !saw_metadata && next.starts_with("-- Page") {
                saw_metadata = true;
                continue;
            }
            if !saw_jp && next.starts_with("-- ") {
                saw_jp = true;
                continue;
            }
            if let Some(comment) = next.strip_prefix("// ") {
                comment_lines.push(comment.to_string());
                continue;
            }
            body_lines.push(next.to_string());
        }

        let body = body_lines.join("\n");
        let comment = if comment_lines.is_empty() { None } else { Some(comment_lines.join("\n")) };
        if body.trim() == "-- TRANSLATION HERE" {
            continue;
        }
        out.push(ImportedLine { hash, en_text: body, comment });
    }

    Ok(out)
}

/// Applies imported lines back into the database, keeping a per-line
/// conflict record for the caller to report under `--strict`.
pub fn apply_import(db: &mut TranslationDb, imported: Vec<ImportedLine>, strict: bool) -> Result<Vec<String>> {
    let mut conflicts = Vec::new();
    for line in imported {
        if db.tl_line_with_hash(&line.hash).is_none() {
            let msg = format!("import conflict: unknown hash {}", line.hash);
            if strict {
                anyhow::bail!(msg);
            }
            conflicts.push(msg);
            continue;
        }
        db.set_translation_and_comment_for_hash(&line.hash, Some(line.en_text), line.comment);
    }
    Ok(conflicts)
}

/// Legacy flat-text import (§11.2): one non-empty line per command, with
/// choice markers and comments stripped, matched to a scene by filename and
/// requiring the split line count to equal the scene's command count.
pub fn import_legacy(db: &mut TranslationDb, scene: &str, data: &str) -> Result<()> {
    let commands: Vec<SceneCommand> = db
        .lines_for_scene(scene)
        .with_context(|| format!("no such scene: {}", scene))?
        .to_vec();

    let mut lines: Vec<String> = Vec::new();
    for raw in data.lines() {
        let raw = raw.trim_end();
        if raw.is_empty() || raw.starts_with("<Page") {
            continue;
        }
        let mut text = raw.strip_prefix("C:>").unwrap_or(raw).to_string();
        if let Some(idx) = text.find("//") {
            text.truncate(idx);
        }
        for part in text.split('#') {
            lines.push(part.trim().to_string());
        }
    }

    if lines.len() != commands.len() {
        anyhow::bail!(
            "legacy import line count ({}) does not match scene '{}' command count ({})",
            lines.len(),
            scene,
            commands.len()
        );
    }

    for (command, text) in commands.iter().zip(lines.into_iter()) {
        if text.is_empty() {
            continue;
        }
        db.set_translation_and_comment_for_hash(&command.hash, Some(text), None);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_db() -> TranslationDb {
        crate::db::test_db_from_script(
            "scene_a",
            "_MSAD($1);_SELR($2@x);",
            &[(1, "hello"), (2, "pick one")],
        )
    }

    #[test]
    fn export_then_import_round_trips_translation() {
        let mut db = sample_db();
        let hash = db.scene_map["scene_a"].commands[0].hash.clone();
        db.set_translation_and_comment_for_hash(&hash, Some("Hello".into()), Some("note".into()));

        let text = export_text(&db, "scene_a").unwrap();
        assert!(text.contains("Choice."));
        assert!(text.contains("Mods: x."));

        let imported = import_text(&text).unwrap();
        let hello = imported.iter().find(|l| l.hash == hash).unwrap();
        assert_eq!(hello.en_text, "Hello");
        assert_eq!(hello.comment.as_deref(), Some("note"));
    }

    #[test]
    fn untranslated_placeholder_produces_no_update() {
        let db = sample_db();
        let text = export_text(&db, "scene_a").unwrap();
        let imported = import_text(&text).unwrap();
        assert!(imported.is_empty());
    }

    #[test]
    fn apply_import_reports_unknown_hash_conflicts_unless_strict() {
        let mut db = sample_db();
        let bogus = vec![ImportedLine { hash: "f".repeat(40), en_text: "x".into(), comment: None }];
        let conflicts = apply_import(&mut db, bogus.clone(), false).unwrap();
        assert_eq!(conflicts.len(), 1);
        assert!(apply_import(&mut db, bogus, true).is_err());
    }

    #[test]
    fn legacy_import_splits_glued_line_on_hash() {
        let mut db = sample_db();
        let legacy = "Hello#Pick one\n";
        import_legacy(&mut db, "scene_a", legacy).unwrap();
        let h0 = db.scene_map["scene_a"].commands[0].hash.clone();
        let h1 = db.scene_map["scene_a"].commands[1].hash.clone();
        assert_eq!(db.tl_line_with_hash(&h0).unwrap().en_text.as_deref(), Some("Hello"));
        assert_eq!(db.tl_line_with_hash(&h1).unwrap().en_text.as_deref(), Some("Pick one"));
    }

    #[test]
    fn legacy_import_rejects_wrong_line_count() {
        let mut db = sample_db();
        let err = import_legacy(&mut db, "scene_a", "only one line\n").unwrap_err();
        assert!(err.to_string().contains("does not match"));
    }
}
