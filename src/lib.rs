//! A toolchain for extracting, translating, and repacking a visual novel's
//! sectored script archives.
pub mod args;
pub mod container;
pub mod db;
pub mod error;
pub mod ext;
pub mod mzx;
pub mod readable;
pub mod rewriter;
pub mod script_parser;
pub mod string_table;
pub mod text_utils;
pub mod types;
pub mod utils;

lazy_static::lazy_static! {
    static ref COUNTER: utils::counter::Counter = utils::counter::Counter::new();
}

/// Returns a reference to the global run counter.
pub fn get_counter() -> &'static utils::counter::Counter {
    &COUNTER
}
