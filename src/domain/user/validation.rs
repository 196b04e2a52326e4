//! User validation rules
//!
//! Every rule is a row in an explicit table of (field, check). Validation runs
//! the whole table on each pass and collects every violation; no rule stops
//! the others from running.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;

use super::candidate::{is_blank, UserCandidate};
use super::entity::{Gender, User, UserId};
use super::field_errors::{Field, FieldErrors, Violation};

pub const USERNAME_MIN_LENGTH: usize = 6;
pub const USERNAME_MAX_LENGTH: usize = 12;
pub const PASSWORD_MIN_LENGTH: usize = 6;
pub const PASSWORD_MAX_LENGTH: usize = 128;

/// Address shape: something without '@' or whitespace on both sides of a single '@'
static EMAIL_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+$").unwrap());

/// Attributes that must be unique across all users
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UniqueField {
    Username,
    Email,
}

impl UniqueField {
    pub const ALL: [UniqueField; 2] = [UniqueField::Username, UniqueField::Email];

    pub fn field(&self) -> Field {
        match self {
            Self::Username => Field::Username,
            Self::Email => Field::Email,
        }
    }

    /// Storage column holding the attribute
    pub fn column(&self) -> &'static str {
        match self {
            Self::Username => "username",
            Self::Email => "email",
        }
    }

    pub fn value_of<'a>(&self, user: &'a User) -> &'a str {
        match self {
            Self::Username => user.username(),
            Self::Email => user.email(),
        }
    }

    pub fn candidate_value<'a>(&self, candidate: &'a UserCandidate) -> &'a str {
        match self {
            Self::Username => &candidate.username,
            Self::Email => &candidate.email,
        }
    }
}

/// Read-only view of persisted users answering uniqueness questions
pub trait ExistingUsers {
    /// Whether a user other than `exclude` already holds `value` for `field`
    fn is_taken(&self, field: UniqueField, value: &str, exclude: Option<&UserId>) -> bool;
}

impl ExistingUsers for [User] {
    fn is_taken(&self, field: UniqueField, value: &str, exclude: Option<&UserId>) -> bool {
        self.iter()
            .filter(|user| Some(user.id()) != exclude)
            .any(|user| field.value_of(user) == value)
    }
}

impl ExistingUsers for Vec<User> {
    fn is_taken(&self, field: UniqueField, value: &str, exclude: Option<&UserId>) -> bool {
        self.as_slice().is_taken(field, value, exclude)
    }
}

/// Uniqueness answers fetched from a store ahead of validation
///
/// The asynchronous repository is queried first; the answers are then fed to
/// the synchronous rule table through this snapshot.
#[derive(Debug, Clone, Default)]
pub struct UniquenessSnapshot {
    taken: HashSet<(UniqueField, String)>,
}

impl UniquenessSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_taken(&mut self, field: UniqueField, value: impl Into<String>) {
        self.taken.insert((field, value.into()));
    }
}

impl ExistingUsers for UniquenessSnapshot {
    fn is_taken(&self, field: UniqueField, value: &str, _exclude: Option<&UserId>) -> bool {
        self.taken.contains(&(field, value.to_string()))
    }
}

struct RuleInput<'a> {
    candidate: &'a UserCandidate,
    is_taken: &'a dyn Fn(UniqueField, &str) -> bool,
}

struct Rule {
    field: Field,
    check: fn(&RuleInput<'_>) -> Option<Violation>,
}

static USER_RULES: [Rule; 11] = [
    Rule { field: Field::FirstName, check: first_name_present },
    Rule { field: Field::LastName, check: last_name_present },
    Rule { field: Field::Username, check: username_present },
    Rule { field: Field::Username, check: username_unique },
    Rule { field: Field::Username, check: username_long_enough },
    Rule { field: Field::Username, check: username_short_enough },
    Rule { field: Field::Email, check: email_present },
    Rule { field: Field::Email, check: email_unique },
    Rule { field: Field::Email, check: email_well_formed },
    Rule { field: Field::Gender, check: gender_present },
    Rule { field: Field::Gender, check: gender_included },
];

fn presence(value: &str) -> Option<Violation> {
    is_blank(value).then_some(Violation::Blank)
}

fn first_name_present(input: &RuleInput<'_>) -> Option<Violation> {
    presence(&input.candidate.first_name)
}

fn last_name_present(input: &RuleInput<'_>) -> Option<Violation> {
    presence(&input.candidate.last_name)
}

fn username_present(input: &RuleInput<'_>) -> Option<Violation> {
    presence(&input.candidate.username)
}

fn username_unique(input: &RuleInput<'_>) -> Option<Violation> {
    (input.is_taken)(UniqueField::Username, &input.candidate.username).then_some(Violation::Taken)
}

// A missing username counts as length zero and is also reported as too short.
fn username_long_enough(input: &RuleInput<'_>) -> Option<Violation> {
    (input.candidate.username.chars().count() < USERNAME_MIN_LENGTH)
        .then_some(Violation::TooShort(USERNAME_MIN_LENGTH))
}

fn username_short_enough(input: &RuleInput<'_>) -> Option<Violation> {
    (input.candidate.username.chars().count() > USERNAME_MAX_LENGTH)
        .then_some(Violation::TooLong(USERNAME_MAX_LENGTH))
}

fn email_present(input: &RuleInput<'_>) -> Option<Violation> {
    presence(&input.candidate.email)
}

fn email_unique(input: &RuleInput<'_>) -> Option<Violation> {
    let email = &input.candidate.email;
    (!is_blank(email) && (input.is_taken)(UniqueField::Email, email)).then_some(Violation::Taken)
}

fn email_well_formed(input: &RuleInput<'_>) -> Option<Violation> {
    let email = &input.candidate.email;
    (!is_blank(email) && !EMAIL_PATTERN.is_match(email)).then_some(Violation::Invalid)
}

fn gender_present(input: &RuleInput<'_>) -> Option<Violation> {
    presence(&input.candidate.gender)
}

fn gender_included(input: &RuleInput<'_>) -> Option<Violation> {
    input
        .candidate
        .gender
        .parse::<Gender>()
        .is_err()
        .then_some(Violation::Inclusion)
}

/// Validate a candidate for a new user against the persisted users
///
/// Returns an empty set when the candidate may be written.
pub fn validate<E>(candidate: &UserCandidate, existing: &E) -> FieldErrors
where
    E: ExistingUsers + ?Sized,
{
    validate_excluding(candidate, existing, None)
}

/// Validate changed values of the user `id`, which does not conflict with itself
pub fn validate_update<E>(candidate: &UserCandidate, existing: &E, id: &UserId) -> FieldErrors
where
    E: ExistingUsers + ?Sized,
{
    validate_excluding(candidate, existing, Some(id))
}

fn validate_excluding<E>(
    candidate: &UserCandidate,
    existing: &E,
    exclude: Option<&UserId>,
) -> FieldErrors
where
    E: ExistingUsers + ?Sized,
{
    let is_taken = |field: UniqueField, value: &str| existing.is_taken(field, value, exclude);
    let input = RuleInput {
        candidate,
        is_taken: &is_taken,
    };

    let mut errors = FieldErrors::new();
    for rule in &USER_RULES {
        if let Some(violation) = (rule.check)(&input) {
            errors.add(rule.field, violation);
        }
    }
    errors
}

/// Length bounds for plaintext passwords
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasswordPolicy {
    pub min_length: usize,
    pub max_length: usize,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            min_length: PASSWORD_MIN_LENGTH,
            max_length: PASSWORD_MAX_LENGTH,
        }
    }
}

/// Validate a plaintext password before it is handed to the hasher
///
/// The confirmation is only compared when one was supplied.
pub fn validate_password(
    password: &str,
    confirmation: Option<&str>,
    policy: &PasswordPolicy,
) -> FieldErrors {
    let mut errors = FieldErrors::new();

    if password.is_empty() {
        errors.add(Field::Password, Violation::Blank);
    } else {
        let length = password.chars().count();
        if length < policy.min_length {
            errors.add(Field::Password, Violation::TooShort(policy.min_length));
        }
        if length > policy.max_length {
            errors.add(Field::Password, Violation::TooLong(policy.max_length));
        }
    }

    if confirmation.is_some_and(|c| c != password) {
        errors.add(
            Field::PasswordConfirmation,
            Violation::Confirmation(Field::Password.human_name()),
        );
    }

    errors
}
