use serde::{Deserialize, Serialize};

/// Raw phone input as the user typed it, country-code prefix included.
///
/// Validation works on the normalized (digits-only) form: the webhook needs
/// a full international number, which for the supported region means at
/// least 12 digits (country code + area code + subscriber number).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhoneInput(String);

impl PhoneInput {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Digits-only form, as sent on the wire.
    pub fn normalized(&self) -> String {
        self.0.chars().filter(|c| c.is_ascii_digit()).collect()
    }

    pub fn digit_count(&self) -> usize {
        self.0.chars().filter(|c| c.is_ascii_digit()).count()
    }

    pub fn is_submittable(&self, min_digits: usize) -> bool {
        self.digit_count() >= min_digits
    }
}

impl From<&str> for PhoneInput {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for PhoneInput {
    fn from(s: String) -> Self {
        Self(s)
    }
}
