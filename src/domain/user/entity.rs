//! User entity and related types

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::candidate::UserCandidate;

/// User identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(Uuid);

impl UserId {
    /// Generate a fresh random identifier
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl FromStr for UserId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("'{0}' is not a known gender")]
pub struct UnknownGender(pub String);

/// Gender of a user, stored as its literal value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Gender {
    Female,
    Male,
    Other,
    PreferNotToSay,
}

impl Gender {
    pub const ALL: [Gender; 4] = [
        Gender::Female,
        Gender::Male,
        Gender::Other,
        Gender::PreferNotToSay,
    ];

    /// Stored value, e.g. "prefer not to say"
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Female => "female",
            Self::Male => "male",
            Self::Other => "other",
            Self::PreferNotToSay => "prefer not to say",
        }
    }

    /// Every accepted stored value
    pub fn values() -> impl Iterator<Item = &'static str> {
        Self::ALL.iter().map(Gender::as_str)
    }
}

impl FromStr for Gender {
    type Err = UnknownGender;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|g| g.as_str() == s)
            .ok_or_else(|| UnknownGender(s.to_string()))
    }
}

impl TryFrom<String> for Gender {
    type Error = UnknownGender;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Gender> for String {
    fn from(gender: Gender) -> Self {
        gender.as_str().to_string()
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Profile attributes of a user that passed validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserProfile {
    pub first_name: String,
    pub last_name: String,
    pub username: String,
    pub email: String,
    pub gender: Gender,
}

impl TryFrom<&UserCandidate> for UserProfile {
    type Error = UnknownGender;

    fn try_from(candidate: &UserCandidate) -> Result<Self, Self::Error> {
        Ok(Self {
            first_name: candidate.first_name.clone(),
            last_name: candidate.last_name.clone(),
            username: candidate.username.clone(),
            email: candidate.email.clone(),
            gender: candidate.gender.parse()?,
        })
    }
}

/// Email ownership verification state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Confirmation {
    /// Digest of the outstanding confirmation token
    #[serde(skip_serializing, default)]
    pub token_digest: Option<String>,
    pub sent_at: Option<DateTime<Utc>>,
    pub confirmed_at: Option<DateTime<Utc>>,
}

/// Outstanding password recovery request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recovery {
    pub token_digest: Option<String>,
    pub sent_at: Option<DateTime<Utc>>,
}

/// A registered account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    id: UserId,
    first_name: String,
    last_name: String,
    username: String,
    email: String,
    gender: Gender,
    /// Argon2 password hash - never exposed in serialization
    #[serde(skip_serializing, default)]
    encrypted_password: String,
    #[serde(default)]
    confirmation: Confirmation,
    #[serde(skip_serializing, default)]
    recovery: Recovery,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl User {
    /// Create a new, unconfirmed user
    pub fn new(id: UserId, profile: UserProfile, encrypted_password: impl Into<String>) -> Self {
        let now = Utc::now();

        Self {
            id,
            first_name: profile.first_name,
            last_name: profile.last_name,
            username: profile.username,
            email: profile.email,
            gender: profile.gender,
            encrypted_password: encrypted_password.into(),
            confirmation: Confirmation::default(),
            recovery: Recovery::default(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Rebuild a user from persisted state
    pub fn restore(
        id: UserId,
        profile: UserProfile,
        encrypted_password: String,
        confirmation: Confirmation,
        recovery: Recovery,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            first_name: profile.first_name,
            last_name: profile.last_name,
            username: profile.username,
            email: profile.email,
            gender: profile.gender,
            encrypted_password,
            confirmation,
            recovery,
            created_at,
            updated_at,
        }
    }

    // Getters

    pub fn id(&self) -> &UserId {
        &self.id
    }

    pub fn first_name(&self) -> &str {
        &self.first_name
    }

    pub fn last_name(&self) -> &str {
        &self.last_name
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn gender(&self) -> Gender {
        self.gender
    }

    pub fn encrypted_password(&self) -> &str {
        &self.encrypted_password
    }

    pub fn confirmation(&self) -> &Confirmation {
        &self.confirmation
    }

    pub fn recovery(&self) -> &Recovery {
        &self.recovery
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// First and last name separated by a single space
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn is_confirmed(&self) -> bool {
        self.confirmation.confirmed_at.is_some()
    }

    /// Whether the confirmation token was sent longer than `within` ago
    pub fn confirmation_expired(&self, within: Duration, now: DateTime<Utc>) -> bool {
        self.confirmation
            .sent_at
            .is_none_or(|sent_at| deadline_passed(sent_at, within, now))
    }

    /// Whether the reset token was sent longer than `within` ago
    pub fn reset_password_expired(&self, within: Duration, now: DateTime<Utc>) -> bool {
        self.recovery
            .sent_at
            .is_none_or(|sent_at| deadline_passed(sent_at, within, now))
    }

    /// Current values as a candidate, for re-validation of a changed record
    pub fn to_candidate(&self) -> UserCandidate {
        UserCandidate {
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            username: self.username.clone(),
            email: self.email.clone(),
            gender: self.gender.as_str().to_string(),
        }
    }

    // Mutators

    /// Replace all profile attributes
    pub fn apply_profile(&mut self, profile: UserProfile) {
        self.first_name = profile.first_name;
        self.last_name = profile.last_name;
        self.username = profile.username;
        self.email = profile.email;
        self.gender = profile.gender;
        self.touch();
    }

    pub fn set_encrypted_password(&mut self, encrypted_password: impl Into<String>) {
        self.encrypted_password = encrypted_password.into();
        self.touch();
    }

    /// Store the digest of a freshly issued confirmation token
    pub fn issue_confirmation(&mut self, token_digest: impl Into<String>, now: DateTime<Utc>) {
        self.confirmation.token_digest = Some(token_digest.into());
        self.confirmation.sent_at = Some(now);
        self.touch();
    }

    /// Mark the email as verified
    ///
    /// The token digest is kept so a reused token is recognized as belonging
    /// to an already confirmed account.
    pub fn confirm(&mut self, now: DateTime<Utc>) {
        self.confirmation.confirmed_at = Some(now);
        self.touch();
    }

    /// Store the digest of a freshly issued reset token
    pub fn issue_reset_password(&mut self, token_digest: impl Into<String>, now: DateTime<Utc>) {
        self.recovery.token_digest = Some(token_digest.into());
        self.recovery.sent_at = Some(now);
        self.touch();
    }

    pub fn clear_reset_password(&mut self) {
        self.recovery = Recovery::default();
        self.touch();
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// A deadline beyond the representable range never passes
fn deadline_passed(sent_at: DateTime<Utc>, within: Duration, now: DateTime<Utc>) -> bool {
    sent_at
        .checked_add_signed(within)
        .is_some_and(|deadline| deadline < now)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(username: &str, email: &str) -> UserProfile {
        UserProfile {
            first_name: "Ann".to_string(),
            last_name: "Lee".to_string(),
            username: username.to_string(),
            email: email.to_string(),
            gender: Gender::Female,
        }
    }

    fn create_test_user() -> User {
        User::new(
            UserId::generate(),
            profile("annlee", "ann@example.com"),
            "hashed_password",
        )
    }

    #[test]
    fn test_user_id_round_trips_through_string() {
        let id = UserId::generate();
        let parsed: UserId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
        assert!("not-a-uuid".parse::<UserId>().is_err());
    }

    #[test]
    fn test_gender_stored_values() {
        assert_eq!(
            Gender::values().collect::<Vec<_>>(),
            vec!["female", "male", "other", "prefer not to say"]
        );
        assert_eq!(
            "prefer not to say".parse::<Gender>().unwrap(),
            Gender::PreferNotToSay
        );
    }

    #[test]
    fn test_gender_rejects_unknown_values() {
        assert!("prefer_not_to_say".parse::<Gender>().is_err());
        assert!("Female".parse::<Gender>().is_err());
        assert!("".parse::<Gender>().is_err());
    }

    #[test]
    fn test_gender_serializes_as_literal() {
        let json = serde_json::to_string(&Gender::PreferNotToSay).unwrap();
        assert_eq!(json, r#""prefer not to say""#);

        let err = serde_json::from_str::<Gender>(r#""x""#);
        assert!(err.is_err());
    }

    #[test]
    fn test_profile_from_candidate() {
        let candidate = UserCandidate::new("A", "B", "test12", "test@test.com", "male");
        let profile = UserProfile::try_from(&candidate).unwrap();
        assert_eq!(profile.gender, Gender::Male);

        let candidate = UserCandidate::new("A", "B", "test12", "test@test.com", "x");
        assert_eq!(
            UserProfile::try_from(&candidate),
            Err(UnknownGender("x".to_string()))
        );
    }

    #[test]
    fn test_user_creation() {
        let user = create_test_user();

        assert_eq!(user.username(), "annlee");
        assert_eq!(user.email(), "ann@example.com");
        assert_eq!(user.encrypted_password(), "hashed_password");
        assert!(!user.is_confirmed());
        assert!(user.confirmation().token_digest.is_none());
    }

    #[test]
    fn test_full_name() {
        let user = create_test_user();
        assert_eq!(user.full_name(), "Ann Lee");
        assert_eq!(
            user.full_name(),
            format!("{} {}", user.first_name(), user.last_name())
        );
    }

    #[test]
    fn test_full_name_is_not_trimmed() {
        let mut p = profile("annlee", "ann@example.com");
        p.first_name = String::new();
        p.last_name = " Lee".to_string();
        let user = User::new(UserId::generate(), p, "hash");

        assert_eq!(user.full_name(), "  Lee");
    }

    #[test]
    fn test_confirmation_lifecycle() {
        let mut user = create_test_user();
        let now = Utc::now();

        user.issue_confirmation("digest", now);
        assert_eq!(user.confirmation().token_digest.as_deref(), Some("digest"));
        assert!(!user.confirmation_expired(Duration::hours(1), now));
        assert!(user.confirmation_expired(Duration::hours(1), now + Duration::hours(2)));

        user.confirm(now);
        assert!(user.is_confirmed());
        assert_eq!(user.confirmation().token_digest.as_deref(), Some("digest"));
    }

    #[test]
    fn test_huge_expiry_window_never_expires() {
        let mut user = create_test_user();
        let now = Utc::now();
        let forever = Duration::try_hours(10_000_000_000).unwrap();

        user.issue_confirmation("digest", now);
        user.issue_reset_password("digest", now);

        assert!(!user.confirmation_expired(forever, now));
        assert!(!user.reset_password_expired(forever, now));
    }

    #[test]
    fn test_reset_password_lifecycle() {
        let mut user = create_test_user();
        let now = Utc::now();

        assert!(user.reset_password_expired(Duration::hours(6), now));

        user.issue_reset_password("digest", now);
        assert!(!user.reset_password_expired(Duration::hours(6), now));
        assert!(user.reset_password_expired(Duration::hours(6), now + Duration::hours(7)));

        user.clear_reset_password();
        assert!(user.recovery().token_digest.is_none());
        assert!(user.recovery().sent_at.is_none());
    }

    #[test]
    fn test_user_update_password() {
        let mut user = create_test_user();
        let original_updated = user.updated_at();

        std::thread::sleep(std::time::Duration::from_millis(10));

        user.set_encrypted_password("new_hash");
        assert_eq!(user.encrypted_password(), "new_hash");
        assert!(user.updated_at() > original_updated);
    }

    #[test]
    fn test_serialization_excludes_secrets() {
        let mut user = create_test_user();
        user.issue_confirmation("confirmation_digest", Utc::now());
        user.issue_reset_password("reset_digest", Utc::now());

        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("hashed_password"));
        assert!(!json.contains("encrypted_password"));
        assert!(!json.contains("confirmation_digest"));
        assert!(!json.contains("reset_digest"));
        assert!(json.contains(r#""gender":"female""#));
    }

    #[test]
    fn test_to_candidate() {
        let user = create_test_user();
        let candidate = user.to_candidate();

        assert_eq!(candidate.username, "annlee");
        assert_eq!(candidate.gender, "female");
        assert_eq!(candidate.full_name(), user.full_name());
    }
}
