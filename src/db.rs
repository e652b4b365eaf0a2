//! Content-addressed translation database.
//!
//! Ported from `luna/translation_db.py`: Japanese lines are keyed by the
//! SHA-1 hash of their text so the same line shared across scenes carries one
//! translation, while a scene keeps its own ordered command list (offset,
//! page, glue, choice, forced-newline). Per-offset overrides live in one
//! top-level map, not nested inside a scene, since the same offset can only
//! ever belong to one scene but an override is addressed purely by offset.
use crate::container::Container;
use crate::error::Error;
use crate::mzx;
use crate::script_parser::{self, TextCommand};
use crate::string_table;
use crate::utils::threadpool::ThreadPool;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use std::collections::{BTreeMap, HashSet};

/// Synthetic scene name collecting every string-table offset no scene's
/// script references.
pub const ORPHANED_LINES: &str = "ORPHANED_LINES";

/// `allscr` entries before index 3 are the scene name table and two opaque
/// sections; per-scene MZX0 streams start here.
const SCRIPT_ENTRIES_START: usize = 3;

/// One command slot in a scene's ordered text stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SceneCommand {
    pub offset: u32,
    pub hash: String,
    /// The most recent `PGST` argument in effect when this command was
    /// parsed, or `-1` for a synthetic [`ORPHANED_LINES`] entry.
    pub page: i32,
    pub is_choice: bool,
    pub glue: bool,
    pub forced_newline: bool,
    pub modifiers: Vec<char>,
    /// True when the Japanese text at this offset contains ruby markup.
    pub has_ruby: bool,
}

/// A scene's ordered command list.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TlScene {
    pub commands: Vec<SceneCommand>,
}

/// The shared translation for one content-addressed Japanese line, or a
/// scene-specific override keyed by offset — both shapes carry the same
/// three fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TlLine {
    pub jp_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub en_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

/// On-disk shape: `BTreeMap` fields serialize with lexicographically sorted
/// keys for free, matching `as_json`'s `sort_keys=True, indent=2`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TranslationDb {
    pub scene_map: BTreeMap<String, TlScene>,
    pub line_by_hash: BTreeMap<String, TlLine>,
    #[serde(default)]
    pub override_by_offset: BTreeMap<u32, TlLine>,
    #[serde(default)]
    pub charswap: BTreeMap<char, char>,
}

/// One hash- or offset-keyed candidate list pulled from an external patch
/// source: `(en_text, comment)` pairs. A key with exactly one candidate is
/// applied by [`TranslationDb::apply_diff`]; two or more is a conflict.
pub type DiffCandidates = Vec<(String, Option<String>)>;

/// A batch of translation updates to fold into the database in one pass.
#[derive(Debug, Clone, Default)]
pub struct Diff {
    pub by_hash: BTreeMap<String, DiffCandidates>,
    pub by_offset: BTreeMap<u32, DiffCandidates>,
}

/// Outcome of [`TranslationDb::apply_diff`]: how many keys were applied, and
/// which ones were skipped for carrying more than one candidate.
#[derive(Debug, Clone, Default)]
pub struct DiffReport {
    pub applied: usize,
    pub conflicts: Vec<String>,
}

fn sha1_hex(text: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(text.as_bytes());
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

impl TranslationDb {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serializes the database as stable, sorted JSON (indent 2).
    pub fn as_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Loads a database from JSON, verifying every stored hash matches the
    /// hash of its own `jp_text` (content-addressing must not have rotted).
    pub fn from_json(data: &str) -> Result<Self> {
        let db: TranslationDb = serde_json::from_str(data)?;
        for (hash, line) in &db.line_by_hash {
            let computed = sha1_hex(&line.jp_text);
            if &computed != hash {
                return Err(Error::HashMismatch { hash: hash.clone(), computed }.into());
            }
        }
        Ok(db)
    }

    /// Scene names in the database. Scenes with no commands (which only
    /// arise from an empty `ORPHANED_LINES` bucket) are skipped unless
    /// `include_empty` is set.
    pub fn scene_names(&self, include_empty: bool) -> Vec<&str> {
        self.scene_map
            .iter()
            .filter(|(_, s)| include_empty || !s.commands.is_empty())
            .map(|(k, _)| k.as_str())
            .collect()
    }

    pub fn lines_for_scene(&self, scene: &str) -> Option<&[SceneCommand]> {
        self.scene_map.get(scene).map(|s| s.commands.as_slice())
    }

    pub fn tl_line_with_hash(&self, hash: &str) -> Option<&TlLine> {
        self.line_by_hash.get(hash)
    }

    /// The per-offset override for `offset`, if one has been set.
    pub fn tl_override_for_offset(&self, offset: u32) -> Option<&TlLine> {
        self.override_by_offset.get(&offset)
    }

    /// The effective translation for a command: its override if one exists,
    /// otherwise the shared hash-addressed line.
    pub fn tl_line_for_cmd(&self, cmd: &SceneCommand) -> Option<&TlLine> {
        self.override_by_offset.get(&cmd.offset).or_else(|| self.line_by_hash.get(&cmd.hash))
    }

    /// The content hash of the command at `offset`, found by a linear scan
    /// across every scene's command list. Not a hot path — callers with a
    /// `SceneCommand` in hand should use [`TranslationDb::tl_line_for_cmd`]
    /// instead.
    pub fn tl_line_for_offset(&self, offset: u32) -> Option<String> {
        self.scene_map
            .values()
            .find_map(|scene| scene.commands.iter().find(|c| c.offset == offset))
            .map(|c| c.hash.clone())
    }

    pub fn set_translation_and_comment_for_hash(
        &mut self,
        hash: &str,
        en_text: Option<String>,
        comment: Option<String>,
    ) {
        if let Some(line) = self.line_by_hash.get_mut(hash) {
            line.en_text = en_text;
            line.comment = comment;
        }
    }

    /// Seeds a fresh override from the shared hash-addressed translation the
    /// first time an offset is overridden, so editors start from the current
    /// shared text rather than blank. Fails if `offset` is not referenced by
    /// any scene's commands.
    pub fn override_translation_and_comment_for_offset(
        &mut self,
        offset: u32,
        en_text: Option<String>,
        comment: Option<String>,
    ) -> Result<()> {
        let hash = self
            .tl_line_for_offset(offset)
            .with_context(|| format!("offset {} is not referenced by any scene", offset))?;
        let seed = self.line_by_hash.get(&hash).cloned().unwrap_or_default();
        let entry = self.override_by_offset.entry(offset).or_insert_with(|| seed.clone());
        if let Some(text) = en_text {
            entry.en_text = Some(text);
        }
        if comment.is_some() {
            entry.comment = comment;
        }
        Ok(())
    }

    /// Drops every override wholesale; overrides are not cleared one offset
    /// at a time.
    pub fn clear_offset_overrides(&mut self) {
        self.override_by_offset.clear();
    }

    /// Applies a batch of candidate translations: a hash or offset with
    /// exactly one candidate is applied, one with more than one is left
    /// untouched and reported as a conflict.
    pub fn apply_diff(&mut self, diff: &Diff) -> DiffReport {
        let mut report = DiffReport::default();
        for (hash, candidates) in &diff.by_hash {
            match candidates.as_slice() {
                [] => {}
                [(en_text, comment)] => {
                    self.set_translation_and_comment_for_hash(hash, Some(en_text.clone()), comment.clone());
                    report.applied += 1;
                }
                _ => report.conflicts.push(format!("hash {}", hash)),
            }
        }
        for (offset, candidates) in &diff.by_offset {
            match candidates.as_slice() {
                [] => {}
                [(en_text, comment)] => {
                    match self.override_translation_and_comment_for_offset(
                        *offset,
                        Some(en_text.clone()),
                        comment.clone(),
                    ) {
                        Ok(()) => report.applied += 1,
                        Err(_) => report.conflicts.push(format!("offset {}", offset)),
                    }
                }
                _ => report.conflicts.push(format!("offset {}", offset)),
            }
        }
        report
    }

    /// Fraction of distinct lines (by hash) that carry a non-empty translation.
    pub fn translated_percent(&self) -> f64 {
        if self.line_by_hash.is_empty() {
            return 100.0;
        }
        let translated = self
            .line_by_hash
            .values()
            .filter(|l| l.en_text.as_deref().is_some_and(|t| !t.is_empty()))
            .count();
        translated as f64 / self.line_by_hash.len() as f64 * 100.0
    }

    pub fn get_charswap_map(&self) -> &BTreeMap<char, char> {
        &self.charswap
    }

    pub fn set_charswap_map(&mut self, map: BTreeMap<char, char>) {
        self.charswap = map;
    }

    /// Bootstraps a fresh database from the two archives that make up a
    /// dumped script: `allscr` (entry 0 is a 32-byte-ASCII, NUL-padded scene
    /// name table; entries 1-2 are opaque; entries 3.. are MZX0-compressed
    /// per-scene scripts) and `script_text` (the offset-addressed string
    /// table). Scenes are decompressed in parallel, mirroring `from_mrg`'s
    /// `multiprocessing.Pool` bootstrap. Every `script_text` offset no
    /// scene's script ends up referencing is collected under
    /// [`ORPHANED_LINES`], so every stored string is reachable from exactly
    /// one place.
    ///
    /// `jobs` sizes the decompression pool; `0` falls back to `num_cpus::get()`.
    pub fn from_mrg(allscr: &Container, script_text: &Container, jobs: usize) -> Result<Self> {
        let names_entry =
            allscr.entries.get(0).ok_or_else(|| anyhow::anyhow!("allscr container has no scene name table"))?;
        let names = parse_scene_names(&names_entry.data);
        let strings = string_table::parse(script_text)?;

        let pool_size = if jobs == 0 { num_cpus::get().max(1) } else { jobs };
        let pool: ThreadPool<(usize, String, Result<String>)> = ThreadPool::new(pool_size, Some("mrgtl-bootstrap-"))?;

        for (index, name) in names.into_iter().enumerate() {
            let Some(entry) = allscr.entries.get(SCRIPT_ENTRIES_START + index) else {
                continue;
            };
            let data = entry.data.clone();
            pool.execute(
                move || {
                    let result = mzx::decompress(&data, true).map(|bytes| String::from_utf8_lossy(&bytes).into_owned());
                    (index, name, result)
                },
                true,
            )
            .map_err(|e| anyhow::anyhow!("thread pool submission failed: {e}"))?;
        }

        let mut results = pool.into_results();
        results.sort_by_key(|(index, _, _)| *index);

        let mut db = TranslationDb::new();
        let mut visited: HashSet<u32> = HashSet::new();
        for (_, name, result) in results {
            let script = result?;
            db.ingest_scene(&name, &script, &strings, &mut visited);
        }

        let mut orphans = Vec::new();
        for (&offset, jp_text) in &strings {
            if visited.contains(&offset) {
                continue;
            }
            let hash = db.intern_text(jp_text);
            orphans.push(SceneCommand {
                offset,
                hash,
                page: -1,
                is_choice: false,
                glue: false,
                forced_newline: false,
                modifiers: Vec::new(),
                has_ruby: jp_text.contains('<'),
            });
        }
        db.scene_map.insert(ORPHANED_LINES.to_string(), TlScene { commands: orphans });

        Ok(db)
    }

    /// Parses one scene's script text against the already-decoded string
    /// table, folding its commands into the database (deduplicating by
    /// content hash) and marking every referenced offset as visited so the
    /// bootstrap's orphan pass can skip it. Warns (does not fail) on
    /// malformed fragments.
    fn ingest_scene(&mut self, scene: &str, script_text: &str, strings: &BTreeMap<u32, String>, visited: &mut HashSet<u32>) {
        let (commands, errors) = script_parser::parse_commands(script_text);
        for err in &errors {
            eprintln!("warning: {} (scene '{}')", err, scene);
            crate::get_counter().inc_warning();
        }

        let mut scene_commands = Vec::with_capacity(commands.len());
        for cmd in commands {
            scene_commands.push(self.command_from_parsed(&cmd, strings, visited));
        }
        self.scene_map.insert(scene.to_string(), TlScene { commands: scene_commands });
    }

    fn command_from_parsed(&mut self, cmd: &TextCommand, strings: &BTreeMap<u32, String>, visited: &mut HashSet<u32>) -> SceneCommand {
        let jp_text = strings.get(&cmd.offset).cloned().unwrap_or_default();
        visited.insert(cmd.offset);
        let hash = self.intern_text(&jp_text);
        SceneCommand {
            offset: cmd.offset,
            hash,
            page: cmd.page,
            is_choice: cmd.is_choice,
            glue: cmd.glue,
            forced_newline: cmd.forced_newline,
            modifiers: cmd.modifiers.clone(),
            has_ruby: jp_text.contains('<'),
        }
    }

    fn intern_text(&mut self, jp_text: &str) -> String {
        let hash = sha1_hex(jp_text);
        self.line_by_hash
            .entry(hash.clone())
            .or_insert_with(|| TlLine { jp_text: jp_text.to_string(), en_text: None, comment: None });
        hash
    }
}

/// Decodes the `allscr` scene name table: 32-byte ASCII slots, NUL-padded.
fn parse_scene_names(data: &[u8]) -> Vec<String> {
    data.chunks_exact(32)
        .map(|chunk| {
            let end = chunk.iter().position(|&b| b == 0).unwrap_or(chunk.len());
            String::from_utf8_lossy(&chunk[..end]).into_owned()
        })
        .filter(|s| !s.is_empty())
        .collect()
}

/// Name-substring to subdirectory routing rule for `export`, in priority
/// order. Defaults mirror `export_scene`'s four buckets.
pub struct ExportRoute {
    pub needle: &'static str,
    pub subdir: &'static str,
}

pub const DEFAULT_EXPORT_ROUTES: &[ExportRoute] = &[
    ExportRoute { needle: "_ARC", subdir: "Arcueid" },
    ExportRoute { needle: "_CIEL", subdir: "Ciel" },
    ExportRoute { needle: "QA", subdir: "QA" },
];

/// Picks the export subdirectory for a scene name, falling back to `Common`.
pub fn export_subdir(scene: &str) -> &'static str {
    for route in DEFAULT_EXPORT_ROUTES {
        if scene.contains(route.needle) {
            return route.subdir;
        }
    }
    "Common"
}

#[cfg(test)]
/// Builds a database from one scene's script text and an explicit
/// offset -> Japanese text table, bypassing the container/MZX0 bootstrap —
/// for tests across this crate that only care about the db/render layer.
pub(crate) fn test_db_from_script(scene: &str, script: &str, strings: &[(u32, &str)]) -> TranslationDb {
    let map: BTreeMap<u32, String> = strings.iter().map(|&(o, s)| (o, s.to_string())).collect();
    let mut db = TranslationDb::new();
    let mut visited = HashSet::new();
    db.ingest_scene(scene, script, &map, &mut visited);
    db
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_db() -> TranslationDb {
        test_db_from_script("scene_a", "_MSAD($1);_MSAD($2);", &[(1, "hello"), (2, "world")])
    }

    #[test]
    fn ingest_dedups_identical_lines_by_hash() {
        let mut db = test_db_from_script("scene_a", "_MSAD($1);", &[(1, "same")]);
        let mut visited = HashSet::new();
        db.ingest_scene("scene_b", "_MSAD($2);", &[(2, "same".to_string())].into_iter().collect(), &mut visited);
        assert_eq!(db.line_by_hash.len(), 1);
    }

    #[test]
    fn json_round_trip_preserves_content() {
        let db = sample_db();
        let json = db.as_json().unwrap();
        let reloaded = TranslationDb::from_json(&json).unwrap();
        assert_eq!(reloaded.scene_map.len(), db.scene_map.len());
        assert_eq!(reloaded.line_by_hash.len(), db.line_by_hash.len());
    }

    #[test]
    fn json_is_sorted_and_pretty() {
        let db = sample_db();
        let json = db.as_json().unwrap();
        assert!(json.contains("\n  "));
    }

    #[test]
    fn tampered_hash_key_is_rejected() {
        let db = sample_db();
        let mut json: serde_json::Value = serde_json::from_str(&db.as_json().unwrap()).unwrap();
        let map = json["line_by_hash"].as_object_mut().unwrap();
        let (key, value) = map.iter().next().map(|(k, v)| (k.clone(), v.clone())).unwrap();
        map.remove(&key);
        map.insert("0".repeat(40), value);
        let err = TranslationDb::from_json(&json.to_string()).unwrap_err();
        assert!(err.to_string().contains("hash mismatch"));
    }

    #[test]
    fn override_seeds_from_shared_translation() {
        let mut db = sample_db();
        let hash = db.scene_map["scene_a"].commands[0].hash.clone();
        db.set_translation_and_comment_for_hash(&hash, Some("Hello".into()), None);
        db.override_translation_and_comment_for_offset(1, None, Some("note".into())).unwrap();
        let ov = &db.override_by_offset[&1];
        assert_eq!(ov.en_text.as_deref(), Some("Hello"));
        assert_eq!(ov.comment.as_deref(), Some("note"));
    }

    #[test]
    fn override_unknown_offset_is_rejected() {
        let mut db = sample_db();
        assert!(db.override_translation_and_comment_for_offset(999, Some("x".into()), None).is_err());
    }

    #[test]
    fn clear_overrides_drops_whole_map() {
        let mut db = sample_db();
        db.override_translation_and_comment_for_offset(1, Some("x".into()), None).unwrap();
        db.clear_offset_overrides();
        assert!(db.override_by_offset.is_empty());
    }

    #[test]
    fn translated_percent_counts_non_empty_translations() {
        let mut db = sample_db();
        assert_eq!(db.translated_percent(), 0.0);
        let hash = db.scene_map["scene_a"].commands[0].hash.clone();
        db.set_translation_and_comment_for_hash(&hash, Some("hi".into()), None);
        assert_eq!(db.translated_percent(), 50.0);
    }

    #[test]
    fn apply_diff_applies_unique_candidates_and_reports_conflicts() {
        let mut db = sample_db();
        let hash = db.scene_map["scene_a"].commands[0].hash.clone();
        let mut diff = Diff::default();
        diff.by_hash.insert(hash.clone(), vec![("Hello".to_string(), None)]);
        diff.by_offset.insert(2, vec![("A".to_string(), None), ("B".to_string(), None)]);
        let report = db.apply_diff(&diff);
        assert_eq!(report.applied, 1);
        assert_eq!(report.conflicts, vec!["offset 2".to_string()]);
        assert_eq!(db.tl_line_with_hash(&hash).unwrap().en_text.as_deref(), Some("Hello"));
        assert!(db.override_by_offset.get(&2).is_none());
    }

    #[test]
    fn tl_line_for_cmd_prefers_override_over_shared_hash() {
        let mut db = sample_db();
        let hash = db.scene_map["scene_a"].commands[0].hash.clone();
        db.set_translation_and_comment_for_hash(&hash, Some("shared".into()), None);
        db.override_translation_and_comment_for_offset(1, Some("scene-specific".into()), None).unwrap();
        let cmd = &db.scene_map["scene_a"].commands[0];
        assert_eq!(db.tl_line_for_cmd(cmd).unwrap().en_text.as_deref(), Some("scene-specific"));
    }

    /// Builds a minimal all-literal MZX0 stream for `plain` (must be an even
    /// number of bytes), inverted the way the real bootstrap decompresses.
    fn mzx0_literal_stream(plain: &[u8]) -> Vec<u8> {
        assert_eq!(plain.len() % 2, 0, "test fixture must be an even number of bytes");
        let mut out = b"MZX0".to_vec();
        out.extend_from_slice(&(plain.len() as u32).to_le_bytes());
        const CMD_LITERAL: u8 = 3;
        for chunk in plain.chunks_exact(2) {
            out.push(CMD_LITERAL);
            out.extend_from_slice(&[chunk[0] ^ 0xFF, chunk[1] ^ 0xFF]);
        }
        out
    }

    #[test]
    fn from_mrg_collects_unreferenced_offsets_as_orphans() {
        let mut strings = BTreeMap::new();
        strings.insert(0u32, "referenced".to_string());
        strings.insert(1u32, "never referenced".to_string());
        let script_text_container = Container::parse(&string_table::pack(&strings).unwrap()).unwrap();

        let mut name_slot = [0u8; 32];
        name_slot[..9].copy_from_slice(b"scene_one");
        let scene_script = b"_MSAD($0);"; // 10 bytes, even
        let compressed = mzx0_literal_stream(scene_script);
        let allscr = Container {
            entries: vec![
                crate::container::Entry { data: name_slot.to_vec() },
                crate::container::Entry { data: vec![] },
                crate::container::Entry { data: vec![] },
                crate::container::Entry { data: compressed },
            ],
        };

        let db = TranslationDb::from_mrg(&allscr, &script_text_container, 1).unwrap();
        assert_eq!(db.scene_map["scene_one"].commands.len(), 1);
        assert_eq!(db.scene_map[ORPHANED_LINES].commands.len(), 1);
        assert_eq!(db.scene_map[ORPHANED_LINES].commands[0].offset, 1);
        assert_eq!(db.scene_map[ORPHANED_LINES].commands[0].page, -1);
    }

    #[test]
    fn export_routing_matches_name_substrings() {
        assert_eq!(export_subdir("EV01_ARC_003"), "Arcueid");
        assert_eq!(export_subdir("EV02_CIEL_001"), "Ciel");
        assert_eq!(export_subdir("QA_SCRIPT"), "QA");
        assert_eq!(export_subdir("COMMON_01"), "Common");
    }
}
