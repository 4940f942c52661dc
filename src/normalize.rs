//! Filename normalization.
//!
//! A file stem is reduced to ASCII letters, digits and underscores, with
//! Cyrillic letters transliterated to Latin. The extension is reattached
//! exactly as found on disk.

use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

/// Lowercase Cyrillic letters and their Latin replacements. Uppercase
/// letters map to the uppercased replacement.
const CYRILLIC_TO_LATIN: &[(char, &str)] = &[
    ('а', "a"),
    ('б', "b"),
    ('в', "v"),
    ('г', "g"),
    ('д', "d"),
    ('е', "e"),
    ('ё', "e"),
    ('ж', "j"),
    ('з', "z"),
    ('и', "i"),
    ('й', "j"),
    ('к', "k"),
    ('л', "l"),
    ('м', "m"),
    ('н', "n"),
    ('о', "o"),
    ('п', "p"),
    ('р', "r"),
    ('с', "s"),
    ('т', "t"),
    ('у', "u"),
    ('ф', "f"),
    ('х', "h"),
    ('ц', "ts"),
    ('ч', "ch"),
    ('ш', "sh"),
    ('щ', "sch"),
    ('ъ', ""),
    ('ы', "y"),
    ('ь', ""),
    ('э', "e"),
    ('ю', "yu"),
    ('я', "ya"),
    ('є', "je"),
    ('і', "i"),
    ('ї', "ji"),
    ('ґ', "g"),
];

static TRANSLITERATION: LazyLock<HashMap<char, String>> = LazyLock::new(|| {
    let mut table = HashMap::with_capacity(CYRILLIC_TO_LATIN.len() * 2);
    for &(lower, latin) in CYRILLIC_TO_LATIN {
        table.insert(lower, latin.to_string());
        for upper in lower.to_uppercase() {
            table.insert(upper, latin.to_uppercase());
        }
    }
    table
});

/// Matches one character that is neither an ASCII word character nor a
/// letter the transliteration table knows.
static DISALLOWED: LazyLock<Regex> = LazyLock::new(|| {
    let mut letters: Vec<char> = TRANSLITERATION.keys().copied().collect();
    letters.sort_unstable();
    let class: String = letters.into_iter().collect();
    Regex::new(&format!("[^A-Za-z0-9_{}]", class)).expect("character class is valid")
});

/// Returns the Latin replacement for a single character, if it has one.
pub fn transliterate_char(c: char) -> Option<&'static str> {
    TRANSLITERATION.get(&c).map(String::as_str)
}

/// Transliterates `text` character by character. Characters without an
/// entry pass through unchanged.
pub fn transliterate(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match transliterate_char(c) {
            Some(latin) => out.push_str(latin),
            None => out.push(c),
        }
    }
    out
}

/// Replaces every character outside the allowed set with `_`.
pub fn sanitize(stem: &str) -> String {
    DISALLOWED.replace_all(stem, "_").into_owned()
}

/// Normalizes a file name: sanitizes and transliterates the stem, then
/// reattaches the untouched extension.
///
/// The extension is whatever follows the last dot, unless that dot starts
/// or ends the name.
///
/// # Examples
///
/// ```
/// use foldersort::normalize::normalize;
///
/// assert_eq!(normalize("my file!.txt"), "my_file_.txt");
/// assert_eq!(normalize("ПРИВІТ.txt"), "PRIVIT.txt");
/// assert_eq!(normalize("Щастя.JPG"), "SCHastya.JPG");
/// ```
pub fn normalize(file_name: &str) -> String {
    let (stem, extension) = split_name(file_name);
    let mut normalized = transliterate(&sanitize(stem));
    if let Some(ext) = extension {
        normalized.push('.');
        normalized.push_str(ext);
    }
    normalized
}

/// Splits a file name into stem and extension (without the dot). A leading
/// or trailing dot does not start an extension.
pub fn split_name(file_name: &str) -> (&str, Option<&str>) {
    match file_name.rfind('.') {
        Some(0) | None => (file_name, None),
        Some(idx) if idx + 1 == file_name.len() => (file_name, None),
        Some(idx) => (&file_name[..idx], Some(&file_name[idx + 1..])),
    }
}
