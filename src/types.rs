//! Shared configuration types threaded through the CLI and the core modules.

/// Layout parameters the rewriter uses when re-wrapping translated text.
/// Defaults to a 55-column greedy wrap with PUA glyph offsetting enabled.
#[derive(Debug, Clone)]
pub struct LayoutConfig {
    pub wrap_width: usize,
    pub pua_enabled: bool,
    pub strict: bool,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self { wrap_width: 55, pua_enabled: true, strict: false }
    }
}
