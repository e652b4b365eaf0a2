use clap::{ArgAction, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "mrgtl", version, about = "A toolchain for extracting, translating, and repacking a visual novel's sectored script archives.")]
pub struct Args {
    /// Path to the translation database JSON file.
    #[arg(short = 'd', long, global = true, default_value = "translation.json")]
    pub db: String,
    /// Charswap CSV table (two columns: from,to) merged into the database.
    #[arg(long, global = true)]
    pub charswap_csv: Option<String>,
    /// Fixed wrap width in display columns.
    #[arg(long, global = true, default_value_t = 55)]
    pub wrap_width: usize,
    /// Disable Private Use Area glyph offsetting for style control codes.
    #[arg(long, global = true, action = ArgAction::SetTrue)]
    pub no_pua: bool,
    /// Treat warnings (malformed commands, import conflicts) as hard errors.
    #[arg(short = 's', long, global = true, action = ArgAction::SetTrue)]
    pub strict: bool,
    /// Number of worker threads used to decompress scenes during bootstrap.
    #[arg(short = 'j', long, global = true, default_value_t = num_cpus::get())]
    pub jobs: usize,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Bootstrap a translation database from a script bytecode archive and
    /// its paired string-table archive.
    Extract {
        /// Input `allscr` container file (scene name table + per-scene
        /// MZX0-compressed bytecode).
        allscr: String,
        /// Input `script_text` container file (offset-addressed string table).
        script_text: String,
    },
    /// Export the database (or one scene) as human-editable text.
    Export {
        /// Scene name to export; omit to export every scene, routed into
        /// subdirectories by name.
        scene: Option<String>,
        /// Output file (single scene) or directory (full export).
        output: String,
    },
    /// Import human-editable translations back into the database.
    Import {
        /// Exported text file to import.
        input: String,
        /// Use the legacy pre-content-hash flat-text format.
        #[arg(long, action = ArgAction::SetTrue)]
        legacy: bool,
        /// Scene name the legacy import applies to (required with --legacy).
        #[arg(long, required_if_eq("legacy", "true"))]
        scene: Option<String>,
    },
    /// Repack the whole database into a fresh `script_text` container.
    Inject {
        /// Output `script_text` container file.
        output: String,
    },
    /// Report translation coverage and surface any rewrite failures.
    Lint,
}
