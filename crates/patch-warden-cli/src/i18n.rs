// crates/patch-warden-cli/src/i18n.rs
// ============================================================================
// Module: CLI Message Catalog
// Description: Centralized user-facing strings with placeholder substitution.
// Purpose: Route every printed line through one catalog for consistency.
// Dependencies: Standard library collections and formatting utilities.
// ============================================================================

//! ## Overview
//! All runtime output flows through the [`t!`](crate::t) macro against a
//! single English catalog. Missing keys fall back to the key itself, so a
//! typo degrades to a visible marker instead of a panic.
//!
//! ## Invariants
//! - The catalog is a compile-time constant; lookups never allocate until
//!   substitution.
//! - Placeholder substitution preserves deterministic order.

// ============================================================================
// SECTION: Message Arguments
// ============================================================================

/// A formatted message argument captured by the [`macro@crate::t`] macro.
///
/// # Invariants
/// - `key` matches a placeholder name without braces (for example, `path`).
/// - `value` is preformatted and safe for display.
#[derive(Clone)]
pub struct MessageArg {
    /// Placeholder name used in message templates (e.g., `"path"`).
    pub key: &'static str,
    /// Formatted value substituted for this placeholder.
    pub value: String,
}

impl MessageArg {
    /// Constructs a new [`MessageArg`] from a key and displayable value.
    pub fn new(key: &'static str, value: impl Into<String>) -> Self {
        Self {
            key,
            value: value.into(),
        }
    }
}

// ============================================================================
// SECTION: Catalog
// ============================================================================

/// English catalog entries.
const CATALOG: &[(&str, &str)] = &[
    ("main.version", "patch-warden {version}"),
    ("main.usage_error", "Usage error: {error}"),
    ("run.starting", "Running {episodes} episode(s) against {workspace}"),
    ("run.episode.done", "Episode {episode}: arm {arm}, decision {decision}, reward {reward}"),
    ("run.episode.exhausted", "Episode {episode}: proposer exhausted, stopping"),
    ("run.summary", "Completed {count} episode(s); ledger at {ledger}"),
    ("run.failed", "Run failed: {error}"),
    ("replay.valid", "Ledger valid: {count} entries verified"),
    ("replay.invalid", "Ledger INVALID ({reason}) at entry seq {seq}"),
    ("replay.io_error", "Replay failed to read ledger: {error}"),
    ("config.load_failed", "Failed to load config: {error}"),
    ("config.too_large", "Refusing config at {path}: {size} bytes (limit {limit})"),
    ("key.invalid", "PATCH_WARDEN_KEY must be 64 hex characters"),
    ("workspace.invalid", "Workspace {path} is not usable: {error}"),
];

/// Returns the template for a key, falling back to the key itself.
#[must_use]
pub fn message(key: &str) -> &str {
    CATALOG
        .iter()
        .find_map(|(candidate, template)| (*candidate == key).then_some(*template))
        .unwrap_or(key)
}

/// Formats a template, substituting `{name}` placeholders in order.
#[must_use]
pub fn format_message(key: &str, args: &[MessageArg]) -> String {
    let mut rendered = message(key).to_string();
    for arg in args {
        let placeholder = format!("{{{}}}", arg.key);
        rendered = rendered.replace(&placeholder, &arg.value);
    }
    rendered
}

// ============================================================================
// SECTION: Macro
// ============================================================================

/// Looks up and formats a catalog message.
///
/// `t!("key")` returns the bare template; `t!("key", name = value)` performs
/// placeholder substitution with preformatted values.
#[macro_export]
macro_rules! t {
    ($key:expr) => {
        $crate::i18n::format_message($key, &[])
    };
    ($key:expr, $($name:ident = $value:expr),+ $(,)?) => {
        $crate::i18n::format_message(
            $key,
            &[$($crate::i18n::MessageArg::new(stringify!($name), format!("{}", $value))),+],
        )
    };
}

// ============================================================================
// SECTION: Tests
// ============================================================================
