//! Language-tag helpers: primary subtag extraction and display names.
//!
//! Tags are compared by language family only, so `es`, `es-MX` and `ES_es`
//! all count as Spanish.

/// Display names used in the translation prompt.  Unknown tags fall back to
/// the tag itself, which chat models generally understand.
const DISPLAY_NAMES: &[(&str, &str)] = &[
    ("ar", "Arabic"),
    ("cs", "Czech"),
    ("da", "Danish"),
    ("de", "German"),
    ("el", "Greek"),
    ("en", "English"),
    ("es", "Spanish"),
    ("fi", "Finnish"),
    ("fr", "French"),
    ("he", "Hebrew"),
    ("hi", "Hindi"),
    ("hu", "Hungarian"),
    ("id", "Indonesian"),
    ("it", "Italian"),
    ("ja", "Japanese"),
    ("ko", "Korean"),
    ("ms", "Malay"),
    ("nl", "Dutch"),
    ("no", "Norwegian"),
    ("pl", "Polish"),
    ("pt", "Portuguese"),
    ("ro", "Romanian"),
    ("ru", "Russian"),
    ("sv", "Swedish"),
    ("th", "Thai"),
    ("tr", "Turkish"),
    ("uk", "Ukrainian"),
    ("vi", "Vietnamese"),
    ("zh", "Chinese"),
];

/// Lower-cased primary subtag of a BCP-47-ish tag (`"pt-BR"` → `"pt"`).
///
/// Both `-` and `_` are accepted as separators.
pub fn primary_subtag(tag: &str) -> String {
    tag.trim()
        .split(['-', '_'])
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase()
}

/// `true` when both tags name the same language family.
pub fn same_family(a: &str, b: &str) -> bool {
    primary_subtag(a) == primary_subtag(b)
}

/// Human-readable language name for prompts.
pub fn display_name(tag: &str) -> String {
    let primary = primary_subtag(tag);
    DISPLAY_NAMES
        .iter()
        .find(|(code, _)| *code == primary)
        .map(|(_, name)| name.to_string())
        .unwrap_or_else(|| tag.trim().to_string())
}
