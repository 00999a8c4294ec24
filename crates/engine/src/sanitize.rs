// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Input/output sanitization: strip control characters and HTML-like
//! constructs from provider text before it is stored or re-sent as
//! context (spec §4.4 step 5).

use std::sync::LazyLock;

use regex::Regex;

static TAG_LIKE: LazyLock<Regex> = LazyLock::new(|| {
    // Compile-time-constant pattern; cannot fail at runtime.
    #[allow(clippy::expect_used)]
    Regex::new(r"</?[a-zA-Z!][^>]{0,512}>").expect("valid regex literal")
});

/// Strip ASCII control characters (except `\n`/`\t`) and HTML-like tags,
/// then collapse to a printable, trimmed string.
///
/// This is deliberately conservative: it removes `<tag ...>` constructs
/// wholesale rather than attempting to preserve their text content, since
/// the source is an LLM response, not user-authored markup we need to render.
pub fn sanitize_text(raw: &str) -> String {
    let no_tags = TAG_LIKE.replace_all(raw, "");
    let filtered: String = no_tags
        .chars()
        .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
        .collect();
    filtered.trim().to_owned()
}

#[cfg(test)]
#[path = "sanitize_tests.rs"]
mod tests;
