//! Form validation.
//!
//! [`Validator`] collects field-scoped and general errors for a submitted form. Every form struct
//! carries one, so a rejected form can be re-rendered with the submitted values and its errors
//! side by side.
//!
//! The free functions are pure predicates over submitted values.

use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::LazyLock;

/// Email shape check, as used by the WHATWG HTML standard for `input[type=email]`.
pub static EMAIL_RX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$",
    )
    .expect("email pattern is valid")
});

/// Error collections for a single form submission.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Validator {
    pub field_errors: BTreeMap<String, Vec<String>>,
    pub non_field_errors: Vec<String>,
}

impl Validator {
    /// True when neither collection holds an error.
    pub fn valid(&self) -> bool {
        self.field_errors.is_empty() && self.non_field_errors.is_empty()
    }

    /// Record `message` against `field`, ignoring exact duplicates.
    pub fn add_field_error(&mut self, field: &str, message: &str) {
        let messages = self.field_errors.entry(field.to_string()).or_default();
        if !messages.iter().any(|m| m == message) {
            messages.push(message.to_string());
        }
    }

    pub fn add_non_field_error(&mut self, message: &str) {
        self.non_field_errors.push(message.to_string());
    }

    /// Record `message` against `field` unless `ok` holds.
    pub fn check_field(&mut self, ok: bool, field: &str, message: &str) {
        if !ok {
            self.add_field_error(field, message);
        }
    }

    /// First error recorded for `field`, if any.
    pub fn field_error(&self, field: &str) -> Option<&str> {
        self.field_errors
            .get(field)
            .and_then(|messages| messages.first())
            .map(String::as_str)
    }
}

pub fn not_blank(value: &str) -> bool {
    !value.trim().is_empty()
}

/// At most `n` characters (not bytes).
pub fn max_chars(value: &str, n: usize) -> bool {
    value.chars().count() <= n
}

/// At least `n` characters (not bytes).
pub fn min_chars(value: &str, n: usize) -> bool {
    value.chars().count() >= n
}

pub fn permitted_value<T: PartialEq>(value: &T, permitted: &[T]) -> bool {
    permitted.contains(value)
}

pub fn matches(value: &str, rx: &Regex) -> bool {
    rx.is_match(value)
}

pub fn equal<T: PartialEq + ?Sized>(a: &T, b: &T) -> bool {
    a == b
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_validator_is_valid() {
        assert!(Validator::default().valid());
    }

    #[test]
    fn test_add_field_error_is_idempotent() {
        let mut v = Validator::default();
        v.add_field_error("title", "This field cannot be blank");
        v.add_field_error("title", "This field cannot be blank");
        v.add_field_error("title", "Too long");

        assert_eq!(
            v.field_errors["title"],
            vec!["This field cannot be blank", "Too long"]
        );
        assert_eq!(v.field_error("title"), Some("This field cannot be blank"));
        assert!(!v.valid());
    }

    #[test]
    fn test_non_field_error_invalidates() {
        let mut v = Validator::default();
        v.add_non_field_error("Email or password is incorrect");
        assert!(v.field_errors.is_empty());
        assert!(!v.valid());
    }

    #[test]
    fn test_check_field_only_records_failures() {
        let mut v = Validator::default();
        v.check_field(true, "content", "nope");
        assert!(v.valid());

        v.check_field(false, "content", "This field cannot be blank");
        assert_eq!(v.field_error("content"), Some("This field cannot be blank"));
    }

    #[test]
    fn test_not_blank() {
        assert!(not_blank("x"));
        assert!(!not_blank(""));
        assert!(!not_blank(" \t\n"));
    }

    #[test]
    fn test_length_rules_count_chars_not_bytes() {
        // 5 characters, 10 bytes
        let s = "ÿÿÿÿÿ";
        assert_eq!(s.len(), 10);
        assert!(max_chars(s, 5));
        assert!(!max_chars(s, 4));
        assert!(min_chars(s, 5));
        assert!(!min_chars(s, 6));
    }

    #[test]
    fn test_permitted_value() {
        assert!(permitted_value(&7, &[1, 7, 365]));
        assert!(!permitted_value(&2, &[1, 7, 365]));
    }

    #[test]
    fn test_email_pattern() {
        assert!(matches("alice@example.com", &EMAIL_RX));
        assert!(matches("a.b+tag@sub.example.co", &EMAIL_RX));
        assert!(!matches("alice@", &EMAIL_RX));
        assert!(!matches("not an email", &EMAIL_RX));
    }

    #[test]
    fn test_equal() {
        assert!(equal("pa55word", "pa55word"));
        assert!(!equal("pa55word", "pa55wore"));
    }
}
