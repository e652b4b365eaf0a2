//! Error taxonomy for the container, decompressor, parser, text and rewriter layers.
use std::fmt;

/// Errors surfaced by the core pipeline.
///
/// CLI-facing code wraps these in `anyhow::Error`; lower layers return
/// `Result<T, Error>` directly so callers can match on the kind when they
/// need to (e.g. the script parser logs-and-skips `MalformedScriptCommand`
/// instead of aborting).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Container or stream header bytes did not match the expected magic.
    BadMagic { expected: &'static str, found: String },
    /// The input ended before the header-advertised size was produced.
    TruncatedInput { expected: usize, available: usize },
    /// An archive entry's payload extends past the end of the input buffer.
    TruncatedEntry { index: usize, expected: usize, available: usize },
    /// A `;`-delimited fragment did not match the opcode grammar.
    MalformedScriptCommand { fragment: String },
    /// Ruby markup was unbalanced: unmatched `<`, missing `|`, or stray `>`.
    MalformedRuby { text: String },
    /// A style control code was nested or left unclosed (strict mode only).
    BadControlCode { code: String, text: String },
    /// Glue could not be satisfied without backtracking into an unbreakable word.
    UnbreakableGlue { scene: String, offset: u32 },
    /// A line's stored content hash does not match the hash of its JP text.
    HashMismatch { hash: String, computed: String },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::BadMagic { expected, found } => {
                write!(f, "bad magic: expected {:?}, found {:?}", expected, found)
            }
            Error::TruncatedInput { expected, available } => write!(
                f,
                "truncated input: expected {} bytes, only {} available",
                expected, available
            ),
            Error::TruncatedEntry { index, expected, available } => write!(
                f,
                "truncated entry {}: expected {} bytes, only {} available",
                index, expected, available
            ),
            Error::MalformedScriptCommand { fragment } => {
                write!(f, "malformed script command: {:?}", fragment)
            }
            Error::MalformedRuby { text } => write!(f, "malformed ruby markup in {:?}", text),
            Error::BadControlCode { code, text } => {
                write!(f, "bad control code '{}' in {:?}", code, text)
            }
            Error::UnbreakableGlue { scene, offset } => write!(
                f,
                "cannot satisfy glue in scene '{}' at offset {} without backtracking; insert %{{n}} or %{{s}}",
                scene, offset
            ),
            Error::HashMismatch { hash, computed } => write!(
                f,
                "content hash mismatch: stored {} but computed {}",
                hash, computed
            ),
        }
    }
}

impl std::error::Error for Error {}
