//! Field-keyed validation errors

use std::collections::BTreeMap;
use std::fmt;

use serde::ser::{Serialize, SerializeMap, Serializer};
use thiserror::Error;

/// An attribute of a user record that rules are attached to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Field {
    FirstName,
    LastName,
    Username,
    Email,
    Gender,
    Password,
    PasswordConfirmation,
}

impl Field {
    /// Attribute name as used in error maps
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FirstName => "first_name",
            Self::LastName => "last_name",
            Self::Username => "username",
            Self::Email => "email",
            Self::Gender => "gender",
            Self::Password => "password",
            Self::PasswordConfirmation => "password_confirmation",
        }
    }

    /// Attribute name as shown to a person, e.g. "First name"
    pub fn human_name(&self) -> &'static str {
        match self {
            Self::FirstName => "First name",
            Self::LastName => "Last name",
            Self::Username => "Username",
            Self::Email => "Email",
            Self::Gender => "Gender",
            Self::Password => "Password",
            Self::PasswordConfirmation => "Password confirmation",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single violated constraint
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Violation {
    #[error("can't be blank")]
    Blank,

    #[error("has already been taken")]
    Taken,

    #[error("is too short (minimum is {0} characters)")]
    TooShort(usize),

    #[error("is too long (maximum is {0} characters)")]
    TooLong(usize),

    #[error("is invalid")]
    Invalid,

    #[error("is not included in the list")]
    Inclusion,

    #[error("doesn't match {0}")]
    Confirmation(&'static str),
}

/// Mapping from field to every message produced for it
///
/// Fields iterate in declaration order and messages in the order they were
/// added, so output is stable across runs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldErrors {
    errors: BTreeMap<Field, Vec<Violation>>,
}

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a violation for a field
    pub fn add(&mut self, field: Field, violation: Violation) {
        self.errors.entry(field).or_default().push(violation);
    }

    /// Append every violation of `other`
    pub fn merge(&mut self, other: FieldErrors) {
        for (field, violations) in other.errors {
            self.errors.entry(field).or_default().extend(violations);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Total number of violations across all fields
    pub fn len(&self) -> usize {
        self.errors.values().map(Vec::len).sum()
    }

    pub fn get(&self, field: Field) -> &[Violation] {
        self.errors.get(&field).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains(&self, field: Field, violation: &Violation) -> bool {
        self.get(field).contains(violation)
    }

    /// Messages for a field, e.g. `["can't be blank"]`
    pub fn messages(&self, field: Field) -> Vec<String> {
        self.get(field).iter().map(ToString::to_string).collect()
    }

    /// Whether a field carries exactly this message
    pub fn includes(&self, field: Field, message: &str) -> bool {
        self.get(field).iter().any(|v| v.to_string() == message)
    }

    pub fn fields(&self) -> impl Iterator<Item = Field> + '_ {
        self.errors.keys().copied()
    }

    /// Messages prefixed with the attribute name, e.g. "Email is invalid"
    pub fn full_messages(&self) -> Vec<String> {
        self.errors
            .iter()
            .flat_map(|(field, violations)| {
                violations
                    .iter()
                    .map(move |v| format!("{} {}", field.human_name(), v))
            })
            .collect()
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_messages().join(", "))
    }
}

impl Serialize for FieldErrors {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.errors.len()))?;
        for (field, violations) in &self.errors {
            let messages: Vec<String> = violations.iter().map(ToString::to_string).collect();
            map.serialize_entry(field.as_str(), &messages)?;
        }
        map.end()
    }
}
