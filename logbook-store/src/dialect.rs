//! Placeholder dialect translation
//!
//! Callers write every statement with `?` markers. SQLite accepts those
//! as-is; PostgreSQL needs numbered `$1, $2, ...` markers.
//!
//! The rewrite is textual. A `?` is treated as a placeholder wherever it
//! appears, including inside string literals, quoted identifiers and
//! comments, so statements must not contain a literal `?`. Bind such
//! values as parameters instead.

use crate::config::BackendKind;
use std::borrow::Cow;

/// The canonical placeholder marker
pub const PLACEHOLDER: char = '?';

/// Rewrite a canonical statement into the dialect of `kind`
///
/// For [`BackendKind::Embedded`] the input is returned unchanged (borrowed).
/// For [`BackendKind::Networked`] the Nth `?`, counted left to right,
/// becomes `$N`.
pub fn translate(sql: &str, kind: BackendKind) -> Cow<'_, str> {
    match kind {
        BackendKind::Embedded => Cow::Borrowed(sql),
        BackendKind::Networked => {
            if !sql.contains(PLACEHOLDER) {
                return Cow::Borrowed(sql);
            }

            let mut translated = String::with_capacity(sql.len() + 8);
            let mut index = 0usize;
            for character in sql.chars() {
                if character == PLACEHOLDER {
                    index += 1;
                    translated.push('$');
                    translated.push_str(&index.to_string());
                } else {
                    translated.push(character);
                }
            }
            Cow::Owned(translated)
        }
    }
}

/// Number of placeholder markers in a canonical statement
pub fn placeholder_count(sql: &str) -> usize {
    sql.matches(PLACEHOLDER).count()
}
