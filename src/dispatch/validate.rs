//! Display-name validation.

use std::sync::OnceLock;

use regex::Regex;

use crate::dispatch::labels::RESERVED_LABELS;

/// Letters (Latin or Cyrillic), digits, and spaces; 2 to 32 chars.
fn name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[a-zA-Zа-яА-ЯёЁ0-9 ]{2,32}$").expect("valid name regex")
    })
}

/// Whether `name` is acceptable as a display name.
///
/// Rejects exact matches of any reserved menu label (including the
/// configured worker-role labels in `extra_reserved`) and anything outside
/// the letters/digits/spaces, length-2-to-32 rule. Pure function of the
/// string — caller identity plays no part.
pub fn is_valid_display_name(name: &str, extra_reserved: &[String]) -> bool {
    if RESERVED_LABELS.contains(&name) {
        return false;
    }
    if extra_reserved.iter().any(|r| r == name) {
        return false;
    }
    name_pattern().is_match(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::labels;

    fn roles() -> Vec<String> {
        vec!["Shoemaker".into(), "Restorer".into(), "Dry cleaner".into()]
    }

    #[test]
    fn accepts_plain_names() {
        let longest = "a".repeat(32);
        for name in ["Ann 2", "Борис", "Jo", longest.as_str()] {
            assert!(is_valid_display_name(name, &roles()), "{name:?}");
        }
    }

    #[test]
    fn rejects_reserved_menu_labels() {
        for label in [labels::MY_ORDERS, labels::CANCEL, labels::ADMIN_ROLE_LABEL] {
            assert!(!is_valid_display_name(label, &roles()));
        }
    }

    #[test]
    fn rejects_configured_role_labels() {
        assert!(!is_valid_display_name("Shoemaker", &roles()));
        assert!(!is_valid_display_name("Dry cleaner", &roles()));
        // Not reserved when the config does not list it
        assert!(is_valid_display_name("Shoemaker", &[]));
    }

    #[test]
    fn rejects_bad_lengths() {
        assert!(!is_valid_display_name("", &roles()));
        assert!(!is_valid_display_name("a", &roles()));
        assert!(!is_valid_display_name(&"a".repeat(33), &roles()));
    }

    #[test]
    fn rejects_forbidden_characters() {
        for name in ["Ann_2", "Ann (admin)", "Ann:2", "Ann\n", "日本語名前"] {
            assert!(!is_valid_display_name(name, &roles()), "{name:?}");
        }
    }

    #[test]
    fn validation_is_a_pure_function_of_the_string() {
        let name = "Ann 2";
        let first = is_valid_display_name(name, &roles());
        let second = is_valid_display_name(name, &roles());
        assert_eq!(first, second);
        assert!(first);
    }
}
