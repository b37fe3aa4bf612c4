//! Filename normalization for uploaded photos.
//!
//! `normalize` makes a name readable and Latin-only; `secure` makes it safe to
//! join onto a directory. Uniqueness is the caller's concern.

use std::collections::HashMap;

use once_cell::sync::Lazy;

const FALLBACK_STEM: &str = "upload";
const THUMBNAIL_SUFFIX: &str = "_tmb";

/// `filename VARCHAR(255)` and the usual NAME_MAX.
const MAX_NAME_LEN: usize = 255;
const MAX_EXT_LEN: usize = 16;
/// A `_<u64>` collision suffix followed by `_tmb`.
const DERIVED_SUFFIX_LEN: usize = 1 + 20 + THUMBNAIL_SUFFIX.len();

static CYRILLIC_TO_LATIN: Lazy<HashMap<char, &'static str>> = Lazy::new(|| {
    [
        ('а', "a"), ('б', "b"), ('в', "v"), ('г', "g"), ('д', "d"),
        ('е', "e"), ('ё', "e"), ('ж', "zh"), ('з', "z"), ('и', "i"),
        ('й', "j"), ('к', "k"), ('л', "l"), ('м', "m"), ('н', "n"),
        ('о', "o"), ('п', "p"), ('р', "r"), ('с', "s"), ('т', "t"),
        ('у', "u"), ('ф', "f"), ('х', "h"), ('ц', "ts"), ('ч', "ch"),
        ('ш', "sh"), ('щ', "sch"), ('ъ', ""), ('ы', "y"), ('ь', ""),
        ('э', "e"), ('ю', "ju"), ('я', "ja"),
    ]
    .into_iter()
    .collect()
});

/// Splits `name` into stem and extension the way a path's last suffix is
/// found: the extension keeps its dot and leading dots never start one.
pub fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(idx) if name[..idx].chars().any(|c| c != '.') => (&name[..idx], &name[idx..]),
        _ => (name, ""),
    }
}

/// Readable Latin form of a client filename; the extension is kept as sent.
pub fn normalize(original: &str) -> String {
    let (stem, ext) = split_extension(original);

    let cleaned: String = stem
        .replace(' ', "_")
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || *c == '-')
        .collect();

    let stem = transliterate(&cleaned);
    if stem.is_empty() {
        format!("{}{}", FALLBACK_STEM, ext)
    } else {
        format!("{}{}", stem, ext)
    }
}

fn transliterate(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        let lower = c.to_lowercase().next().unwrap_or(c);
        match CYRILLIC_TO_LATIN.get(&lower) {
            Some(latin) if c != lower => {
                let mut chars = latin.chars();
                if let Some(first) = chars.next() {
                    out.extend(first.to_uppercase());
                    out.push_str(chars.as_str());
                }
            }
            Some(latin) => out.push_str(latin),
            None => out.push(c),
        }
    }
    out
}

/// ASCII-only name without path separators or leading dots. May be empty.
pub fn secure(name: &str) -> String {
    let spaced = name.replace(['/', '\\'], " ");
    let joined = spaced.split_whitespace().collect::<Vec<_>>().join("_");
    let stripped: String = joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        .collect();
    stripped.trim_matches(|c| c == '.' || c == '_').to_string()
}

/// The name an upload is stored under before collision handling. Short
/// enough that any `_<n>` and `_tmb` derived from it still fits a column.
pub fn storage_name(original: &str) -> String {
    let normalized = normalize(original);
    let (stem, ext) = split_extension(&normalized);
    let mut ext = secure(ext);
    ext.truncate(MAX_EXT_LEN);

    let mut stem = match secure(stem) {
        s if s.is_empty() => FALLBACK_STEM.to_string(),
        s => s,
    };
    // both halves are ASCII after `secure`
    stem.truncate(MAX_NAME_LEN - DERIVED_SUFFIX_LEN - 1 - ext.len());
    let stem = stem.trim_end_matches('.');

    if ext.is_empty() {
        stem.to_string()
    } else {
        format!("{}.{}", stem, ext)
    }
}

/// `<stem>_tmb<ext>` next to the original's name.
pub fn thumbnail_name(filename: &str) -> String {
    let (stem, ext) = split_extension(filename);
    format!("{}{}{}", stem, THUMBNAIL_SUFFIX, ext)
}
