//! Path guard: every file the store touches is resolved through [`resolve`]
//! so user-supplied ids and names can never address anything outside the
//! `.zeus/` root.
//!
//! Resolution is purely lexical. Candidate paths may not exist yet (writes),
//! so no filesystem calls are made and symlinks are not followed.

use std::path::{Component, Path, PathBuf};

use crate::error::{Result, ZeusError};
use crate::model::EntityId;

/// Resolve `requested` against `base` and fail if the result would leave
/// `base`.
///
/// - `BadRune` for a null byte or any control character other than
///   tab/newline/carriage return.
/// - `PathEscape` for absolute paths and for anything that normalises above
///   `base` (`..`, encoded or backslash variants included).
/// - `BadShape` when a path component carries an entity id with the wrong
///   shape for its prefix.
pub fn resolve(base: &Path, requested: &str) -> Result<PathBuf> {
    check_runes(requested)?;

    // Percent-encoded dots and separators (`..%2F..`) are decoded first, and
    // backslashes are treated as separators, so neither variant can sneak
    // past lexical normalisation on `/` platforms.
    let decoded = decode_separator_escapes(requested);
    let normalised = decoded.replace('\\', "/");
    let candidate = Path::new(&normalised);
    if candidate.is_absolute() {
        return Err(ZeusError::PathEscape(requested.to_string()));
    }

    let mut resolved = base.to_path_buf();
    let mut depth: usize = 0;
    for component in candidate.components() {
        match component {
            Component::Normal(part) => {
                let part_str = part.to_string_lossy();
                check_embedded_id(&part_str)?;
                resolved.push(part);
                depth += 1;
            }
            Component::CurDir => {}
            Component::ParentDir => {
                if depth == 0 {
                    return Err(ZeusError::PathEscape(requested.to_string()));
                }
                resolved.pop();
                depth -= 1;
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(ZeusError::PathEscape(requested.to_string()));
            }
        }
    }

    debug_assert!(resolved.starts_with(base));
    Ok(resolved)
}

fn check_runes(requested: &str) -> Result<()> {
    for c in requested.chars() {
        if c == '\0' || (c.is_control() && c != '\t' && c != '\n' && c != '\r') {
            return Err(ZeusError::BadRune(requested.to_string()));
        }
    }
    Ok(())
}

/// One pass of percent-decoding, limited to the sequences that change path
/// shape: `%2e` -> `.`, `%2f` -> `/`, `%5c` -> `\` (either case). Anything
/// else, including `%25`, is left verbatim.
fn decode_separator_escapes(requested: &str) -> String {
    let chars: Vec<char> = requested.chars().collect();
    let mut out = String::with_capacity(requested.len());
    let mut i = 0;
    while i < chars.len() {
        if chars[i] == '%' && i + 2 < chars.len() {
            let pair = (
                chars[i + 1].to_ascii_lowercase(),
                chars[i + 2].to_ascii_lowercase(),
            );
            let decoded = match pair {
                ('2', 'e') => Some('.'),
                ('2', 'f') => Some('/'),
                ('5', 'c') => Some('\\'),
                _ => None,
            };
            if let Some(c) = decoded {
                out.push(c);
                i += 3;
                continue;
            }
        }
        out.push(chars[i]);
        i += 1;
    }
    out
}

/// If a component looks like `<known-prefix>-…` (optionally with a `.yaml`
/// extension), the embedded id must parse.
fn check_embedded_id(component: &str) -> Result<()> {
    let stem = component.strip_suffix(".yaml").unwrap_or(component);
    let Some((prefix, _)) = stem.split_once('-') else {
        return Ok(());
    };
    if crate::model::Kind::ALL.iter().any(|k| k.prefix() == prefix) {
        EntityId::parse(stem)?;
    }
    Ok(())
}

/// Convenience: resolve the relative file for an entity id inside its kind's
/// directory layout.
pub fn entity_rel_path(id: &EntityId) -> String {
    match id.kind().layout() {
        crate::model::Layout::Directory(dir) => format!("{dir}/{id}.yaml"),
        crate::model::Layout::Singleton(file) | crate::model::Layout::ListFile(file) => {
            file.to_string()
        }
    }
}
