//! Untrusted user input awaiting validation

use serde::{Deserialize, Serialize};

/// Field values submitted for a new or changed user record
///
/// Values are kept exactly as submitted; missing fields deserialize as empty
/// strings and are reported as blank by the validator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserCandidate {
    pub first_name: String,
    pub last_name: String,
    pub username: String,
    pub email: String,
    pub gender: String,
}

impl UserCandidate {
    pub fn new(
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        username: impl Into<String>,
        email: impl Into<String>,
        gender: impl Into<String>,
    ) -> Self {
        Self {
            first_name: first_name.into(),
            last_name: last_name.into(),
            username: username.into(),
            email: email.into(),
            gender: gender.into(),
        }
    }

    /// Apply the normalization done before every write: the email is
    /// stripped and lower-cased, everything else is left untouched.
    pub fn normalized(mut self) -> Self {
        self.email = normalize_email(&self.email);
        self
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Email lookup key: surrounding whitespace removed, lower-cased
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Empty or whitespace only
pub fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_deserialize_as_empty() {
        let candidate: UserCandidate =
            serde_json::from_str(r#"{"username": "test12"}"#).unwrap();

        assert_eq!(candidate.username, "test12");
        assert_eq!(candidate.first_name, "");
        assert_eq!(candidate.gender, "");
    }

    #[test]
    fn test_normalized_only_touches_email() {
        let candidate =
            UserCandidate::new(" Ann ", "Lee", "AnnLee", "  Ann.Lee@Example.COM ", "female")
                .normalized();

        assert_eq!(candidate.email, "ann.lee@example.com");
        assert_eq!(candidate.username, "AnnLee");
        assert_eq!(candidate.first_name, " Ann ");
    }

    #[test]
    fn test_full_name() {
        let candidate = UserCandidate::new("Ann", "Lee", "", "", "");
        assert_eq!(candidate.full_name(), "Ann Lee");
    }

    #[test]
    fn test_full_name_of_empty_names() {
        let candidate = UserCandidate::default();
        assert_eq!(candidate.full_name(), " ");
    }

    #[test]
    fn test_is_blank() {
        assert!(is_blank(""));
        assert!(is_blank("   "));
        assert!(is_blank("\t\n"));
        assert!(!is_blank(" a "));
    }
}
