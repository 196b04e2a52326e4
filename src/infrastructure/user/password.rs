//! Password hashing using Argon2id

use argon2::{
    password_hash::{
        rand_core::OsRng, PasswordHash, PasswordHasher as Argon2PasswordHasher, PasswordVerifier,
        SaltString,
    },
    Algorithm, Argon2, Params, Version,
};
use std::fmt::{self, Debug};

use crate::domain::DomainError;

/// Hashing half of the credential subsystem
pub trait PasswordHasher: Send + Sync + Debug {
    /// Hash a plaintext password into a self-describing string
    fn hash(&self, password: &str) -> Result<String, DomainError>;

    /// Verify a plaintext password against a stored hash
    fn verify(&self, password: &str, hash: &str) -> bool;

    /// Whether the stored hash was produced with outdated parameters
    fn needs_rehash(&self, _hash: &str) -> bool {
        false
    }
}

/// Argon2id hasher with an optional server-side pepper
#[derive(Clone)]
pub struct Argon2Hasher {
    pepper: Vec<u8>,
    params: Params,
}

impl Argon2Hasher {
    /// Create a hasher with the library's recommended parameters and no pepper
    pub fn new() -> Self {
        Self {
            pepper: Vec::new(),
            params: Params::default(),
        }
    }

    /// Create a hasher with explicit cost parameters
    pub fn with_params(
        memory_kib: u32,
        iterations: u32,
        parallelism: u32,
    ) -> Result<Self, DomainError> {
        let params = Params::new(memory_kib, iterations, parallelism, None).map_err(|e| {
            DomainError::configuration(format!("Invalid Argon2 parameters: {}", e))
        })?;

        Ok(Self {
            pepper: Vec::new(),
            params,
        })
    }

    /// Mix a secret into every hash; hashes made with another pepper stop verifying
    pub fn with_pepper(mut self, pepper: impl Into<Vec<u8>>) -> Self {
        self.pepper = pepper.into();
        self
    }

    fn argon2(&self) -> Result<Argon2<'_>, DomainError> {
        if self.pepper.is_empty() {
            return Ok(Argon2::new(
                Algorithm::Argon2id,
                Version::V0x13,
                self.params.clone(),
            ));
        }

        Argon2::new_with_secret(
            &self.pepper,
            Algorithm::Argon2id,
            Version::V0x13,
            self.params.clone(),
        )
        .map_err(|e| DomainError::configuration(format!("Invalid password pepper: {}", e)))
    }
}

impl Default for Argon2Hasher {
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for Argon2Hasher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Argon2Hasher")
            .field("peppered", &!self.pepper.is_empty())
            .field("params", &self.params)
            .finish()
    }
}

impl PasswordHasher for Argon2Hasher {
    fn hash(&self, password: &str) -> Result<String, DomainError> {
        let salt = SaltString::generate(&mut OsRng);

        self.argon2()?
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| DomainError::internal(format!("Failed to hash password: {}", e)))
    }

    fn verify(&self, password: &str, hash: &str) -> bool {
        let parsed_hash = match PasswordHash::new(hash) {
            Ok(h) => h,
            Err(_) => return false,
        };

        match self.argon2() {
            Ok(argon2) => argon2
                .verify_password(password.as_bytes(), &parsed_hash)
                .is_ok(),
            Err(_) => false,
        }
    }

    fn needs_rehash(&self, hash: &str) -> bool {
        let Ok(parsed_hash) = PasswordHash::new(hash) else {
            return true;
        };
        let Ok(params) = Params::try_from(&parsed_hash) else {
            return true;
        };

        parsed_hash.algorithm != Algorithm::Argon2id.ident()
            || parsed_hash.version != Some(Version::V0x13.into())
            || params.m_cost() != self.params.m_cost()
            || params.t_cost() != self.params.t_cost()
            || params.p_cost() != self.params.p_cost()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Small costs keep the tests fast.
    fn fast_hasher() -> Argon2Hasher {
        Argon2Hasher::with_params(1024, 1, 1).unwrap()
    }

    #[test]
    fn test_hash_and_verify() {
        let hasher = fast_hasher();
        let password = "my_secure_password";

        let hash = hasher.hash(password).unwrap();

        assert!(hash.starts_with("$argon2id$"));
        assert!(hasher.verify(password, &hash));
        assert!(!hasher.verify("wrong_password", &hash));
    }

    #[test]
    fn test_hash_is_salted() {
        let hasher = fast_hasher();
        let password = "my_secure_password";

        let hash1 = hasher.hash(password).unwrap();
        let hash2 = hasher.hash(password).unwrap();

        assert_ne!(hash1, hash2);
        assert!(hasher.verify(password, &hash1));
        assert!(hasher.verify(password, &hash2));
    }

    #[test]
    fn test_verify_invalid_hash() {
        let hasher = fast_hasher();

        assert!(!hasher.verify("password", "invalid_hash_format"));
        assert!(!hasher.verify("password", ""));
    }

    #[test]
    fn test_pepper_is_required_to_verify() {
        let peppered = fast_hasher().with_pepper("pepper");
        let hash = peppered.hash("password").unwrap();

        assert!(peppered.verify("password", &hash));
        assert!(!fast_hasher().verify("password", &hash));
        assert!(!fast_hasher().with_pepper("other").verify("password", &hash));
    }

    #[test]
    fn test_needs_rehash_when_costs_change() {
        let old = fast_hasher();
        let hash = old.hash("password").unwrap();

        assert!(!old.needs_rehash(&hash));

        let stronger = Argon2Hasher::with_params(2048, 2, 1).unwrap();
        assert!(stronger.needs_rehash(&hash));
        assert!(stronger.verify("password", &hash));
    }

    #[test]
    fn test_invalid_params() {
        assert!(matches!(
            Argon2Hasher::with_params(1, 1, 1),
            Err(DomainError::Configuration { .. })
        ));
    }
}
