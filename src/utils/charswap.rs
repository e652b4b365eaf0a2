//! Character-swap table loading.
//!
//! Loads a two-column CSV (`from`,`to`) into a single-char-to-single-char
//! map that the rewriter consults before line-breaking, so a charswap table
//! can be authored outside the translation database's JSON file.
use anyhow::Result;
use serde::Deserialize;
use std::collections::BTreeMap;

#[derive(Debug, Deserialize)]
struct CharSwapCell {
    from: String,
    to: String,
}

/// Reads a charswap table from a CSV file with `from`,`to` headers. Rows
/// whose `from`/`to` are not exactly one character are skipped.
pub fn read_csv(path: &str) -> Result<BTreeMap<char, char>> {
    let mut reader = csv::ReaderBuilder::new().has_headers(true).from_path(path)?;
    let mut map = BTreeMap::new();
    for result in reader.deserialize() {
        let record: CharSwapCell = result?;
        let (mut from_chars, mut to_chars) = (record.from.chars(), record.to.chars());
        if let (Some(from), None, Some(to), None) =
            (from_chars.next(), from_chars.next(), to_chars.next(), to_chars.next())
        {
            map.insert(from, to);
        }
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn loads_single_char_rows_and_skips_the_rest() {
        let mut file = tempfile_with_contents("from,to\nA,B\nCC,D\nE,FF\n");
        let path = file.path().to_str().unwrap().to_string();
        file.flush().unwrap();
        let map = read_csv(&path).unwrap();
        assert_eq!(map.get(&'A'), Some(&'B'));
        assert_eq!(map.len(), 1);
    }

    fn tempfile_with_contents(contents: &str) -> named_temp_file::NamedTempFile {
        named_temp_file::NamedTempFile::new(contents)
    }

    /// Minimal stand-in for a temp-file helper so this module's tests don't
    /// need an extra dev-dependency for a single fixture.
    mod named_temp_file {
        use std::io::Write;
        pub struct NamedTempFile {
            path: std::path::PathBuf,
        }
        impl NamedTempFile {
            pub fn new(contents: &str) -> Self {
                let mut path = std::env::temp_dir();
                path.push(format!("mrgtl_charswap_test_{}.csv", std::process::id()));
                let mut f = std::fs::File::create(&path).unwrap();
                f.write_all(contents.as_bytes()).unwrap();
                Self { path }
            }
            pub fn path(&self) -> &std::path::Path {
                &self.path
            }
        }
        impl Drop for NamedTempFile {
            fn drop(&mut self) {
                let _ = std::fs::remove_file(&self.path);
            }
        }
    }
}
