//! Turns media titles into filename stems that are safe on common filesystems.

/// Stem used when neither the title nor the fallback leaves anything usable.
pub const DEFAULT_STEM: &str = "download";

/// Keeps alphanumerics plus space, hyphen, underscore and period, then trims
/// trailing whitespace. Path separators and control characters never survive.
pub fn sanitize(title: &str) -> String {
    let kept: String = title
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '-' | '_' | '.'))
        .collect();
    kept.trim_end().to_owned()
}

/// Sanitized stem for an output file, falling back to `fallback` (usually the
/// media id) and then [`DEFAULT_STEM`] when the title sanitizes to nothing
/// usable. A stem made only of periods and spaces counts as unusable so `.`
/// and `..` can never become a path component.
pub fn output_stem(title: &str, fallback: Option<&str>) -> String {
    let stem = sanitize(title);
    if !is_blank(&stem) {
        return stem;
    }

    fallback
        .map(sanitize)
        .filter(|candidate| !is_blank(candidate))
        .unwrap_or_else(|| DEFAULT_STEM.to_owned())
}

fn is_blank(stem: &str) -> bool {
    stem.chars().all(|c| c == '.' || c == ' ')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_punctuation_and_trailing_space() {
        assert_eq!(sanitize("My Video: Part 1?! "), "My Video Part 1");
    }

    #[test]
    fn empty_title_stays_empty() {
        assert_eq!(sanitize(""), "");
    }

    #[test]
    fn removes_separators_and_control_chars() {
        let result = sanitize("a/b\\c\td\ne\u{0}f");
        assert_eq!(result, "abcdef");
    }

    #[test]
    fn keeps_allowed_symbols_and_unicode_letters() {
        assert_eq!(sanitize("Café_v1.0 - final"), "Café_v1.0 - final");
    }

    #[test]
    fn leading_whitespace_is_preserved() {
        assert_eq!(sanitize("  lead"), "  lead");
    }

    #[test]
    fn output_stem_uses_fallback_for_unusable_titles() {
        assert_eq!(output_stem("???", Some("dQw4w9WgXcQ")), "dQw4w9WgXcQ");
        assert_eq!(output_stem("..", Some("abc")), "abc");
        assert_eq!(output_stem("", None), DEFAULT_STEM);
        assert_eq!(output_stem("!!", Some("//")), DEFAULT_STEM);
    }

    #[test]
    fn output_stem_prefers_the_title() {
        assert_eq!(output_stem("Song: Live", Some("abc")), "Song Live");
    }
}
