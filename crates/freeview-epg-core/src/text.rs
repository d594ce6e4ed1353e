//! Description text cleaning.

use std::sync::LazyLock;

use regex::Regex;

/// Unicode "Other" category characters (control, format, private use, ...).
#[allow(clippy::expect_used)]
static CONTROL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\p{C}").expect("failed to compile control character regex"));

/// Bracketed feature tags such as `[S]`, `[AD]`, `[S,SL]`.
#[allow(clippy::expect_used)]
static FEATURE_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[[A-Z,]+\]").expect("failed to compile feature tag regex"));

/// Season/episode annotations such as `(Ep 4/10)` or `S3 Ep5`.
#[allow(clippy::expect_used)]
static EPISODE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\(?[SE]?\d+\s?Ep\s?\d+[\d/]*\)?").expect("failed to compile episode regex")
});

/// Runs one cleaning pass.
fn clean_once(text: &str) -> String {
    let text = CONTROL_RE.replace_all(text, "");
    let text = FEATURE_TAG_RE.replace_all(&text, "");
    let text = EPISODE_RE.replace_all(&text, "");
    String::from(text.trim())
}

/// Cleans a description for output.
///
/// Removes control characters, feature tags and season/episode
/// annotations, then trims. Passes repeat until the text stops changing,
/// so `clean_description(clean_description(x)) == clean_description(x)`.
///
/// # Input/Output
///
/// ```text
/// "Drama [HD] (S3 Ep5)" -> "Drama"
/// ```
#[must_use]
pub fn clean_description(text: &str) -> String {
    // Every pass that changes the text shortens it, so this terminates.
    let mut current = clean_once(text);
    loop {
        let next = clean_once(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_description_strips_tags_and_episode() {
        // Arrange & Act
        let result = clean_description("Drama [HD] (S3 Ep5)");

        // Assert
        assert_eq!(result, "Drama");
    }

    #[test]
    fn test_clean_description_removes_control_characters() {
        // Arrange & Act
        let result = clean_description("Line\u{0007} one\u{200B}\n");

        // Assert
        assert_eq!(result, "Line one");
    }

    #[test]
    fn test_clean_description_keeps_plain_text() {
        // Arrange & Act
        let result = clean_description("A quiet afternoon in the park.");

        // Assert
        assert_eq!(result, "A quiet afternoon in the park.");
    }

    #[test]
    fn test_clean_description_multiple_tags() {
        // Arrange & Act
        let result = clean_description("Film [S,SL] [AD] (Ep 4/10)");

        // Assert
        assert_eq!(result, "Film");
    }

    #[test]
    fn test_clean_description_idempotent() {
        // Arrange
        let inputs = [
            "Drama [HD] (S3 Ep5)",
            "[[AD]HD] Nested",
            "News\t[S] at six (Ep 1/2) [AD]",
            "  ",
            "S1 Ep2",
        ];

        for input in inputs {
            // Act
            let once = clean_description(input);
            let twice = clean_description(&once);

            // Assert
            assert_eq!(once, twice, "not idempotent for {input:?}");
        }
    }

    #[test]
    fn test_clean_description_idempotent_on_deep_nesting() {
        // Arrange
        let input = format!("Film {}[AD]{}", "[A".repeat(12), "]".repeat(12));

        // Act
        let once = clean_description(&input);
        let twice = clean_description(&once);

        // Assert
        assert_eq!(once, "Film");
        assert_eq!(once, twice);
    }

    #[test]
    fn test_clean_description_nested_tags_resolve() {
        // Arrange & Act
        let result = clean_description("[[AD]HD] Nested");

        // Assert
        assert_eq!(result, "Nested");
    }
}
