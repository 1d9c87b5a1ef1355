//! Column name resolution and disambiguation.

use foldhash::{HashSet, HashSetExt};
use tracing::warn;

/// Prefix of generated column names, followed by the 1-based position.
pub const PLACEHOLDER_PREFIX: &str = "att-";

/// Split a comma-separated custom header into names.
pub fn parse_custom_header(spec: &str) -> Vec<String> {
    if spec.trim().is_empty() {
        return Vec::new();
    }
    spec.split(',').map(|s| s.trim().to_string()).collect()
}

/// Placeholder name for the column at 0-based `index`.
#[inline]
pub fn placeholder_name(index: usize) -> String {
    format!("{PLACEHOLDER_PREFIX}{}", index + 1)
}

/// Produce the unique, ordered list of `num_columns` column names.
///
/// The custom header covers the leading columns; the rest come from the
/// header record when there is one, otherwise they get placeholder names.
pub fn resolve_names(
    header: Option<&[String]>,
    custom_header: &[String],
    num_columns: usize,
) -> Vec<String> {
    if custom_header.len() > num_columns {
        warn!(
            "custom header has {} names but the input has {} columns, ignoring the rest",
            custom_header.len(),
            num_columns
        );
    }

    let names = (0..num_columns)
        .map(|idx| {
            if let Some(name) = custom_header.get(idx) {
                return name.clone();
            }
            match header {
                Some(record) => record.get(idx).cloned().unwrap_or_default(),
                None => placeholder_name(idx),
            }
        })
        .collect();

    disambiguate(names)
}

/// Replace empty and repeated names, scanning left to right.
///
/// A repeated `x` becomes `x-2`, `x-3`, ... (first free suffix); an empty
/// name becomes the placeholder for its position.
pub fn disambiguate(names: Vec<String>) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::with_capacity(names.len());
    let mut resolved = Vec::with_capacity(names.len());

    for (idx, name) in names.into_iter().enumerate() {
        let unique = if name.is_empty() {
            let candidate = free_name(placeholder_name(idx), &seen);
            warn!("column {} has no name, using '{}'", idx + 1, candidate);
            candidate
        } else if seen.contains(&name) {
            let candidate = free_name(name.clone(), &seen);
            warn!(
                "column {} repeats name '{}', using '{}'",
                idx + 1,
                name,
                candidate
            );
            candidate
        } else {
            name
        };

        seen.insert(unique.clone());
        resolved.push(unique);
    }

    resolved
}

/// `base` if unused, otherwise `base-k` for the smallest free `k >= 2`.
fn free_name(base: String, seen: &HashSet<String>) -> String {
    if !seen.contains(&base) {
        return base;
    }
    (2..)
        .map(|k| format!("{base}-{k}"))
        .find(|candidate| !seen.contains(candidate))
        .unwrap_or(base)
}
