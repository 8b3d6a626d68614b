//! Password hashing, strength policy, and secure password generation.

use anyhow::{Context, Result};
use rand::Rng;
use rand::seq::SliceRandom;
use serde::Serialize;
use tokio::task;

/// Punctuation characters accepted as the "symbol" class.
const SYMBOLS: &str = "!@#$%^&*(),.?\":{}|<>";

const UPPER: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const LOWER: &[u8] = b"abcdefghijklmnopqrstuvwxyz";
const DIGITS: &[u8] = b"0123456789";
const GEN_SYMBOLS: &[u8] = b"!@#$%^&*";

/// Minimum length accepted by `generate_secure_password` (one character per
/// required class).
pub const MIN_GENERATED_LENGTH: usize = 4;

/// Maximum length accepted by `generate_secure_password`. The length reaches
/// this function straight from an HTTP query parameter, so it must be bounded
/// before any allocation happens.
pub const MAX_GENERATED_LENGTH: usize = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyViolation {
    TooShort,
    NoUppercase,
    NoLowercase,
    NoDigit,
    NoSymbol,
}

/// Password strength rules: minimum length plus one character from each of
/// the four classes.
#[derive(Debug, Clone)]
pub struct PasswordPolicy {
    min_length: usize,
}

impl PasswordPolicy {
    #[must_use]
    pub const fn new(min_length: usize) -> Self {
        Self { min_length }
    }

    /// Returns every rule the candidate violates; empty means acceptable.
    #[must_use]
    pub fn validate(&self, password: &str) -> Vec<PolicyViolation> {
        let mut violations = Vec::new();

        if password.chars().count() < self.min_length {
            violations.push(PolicyViolation::TooShort);
        }
        if !password.chars().any(|c| c.is_ascii_uppercase()) {
            violations.push(PolicyViolation::NoUppercase);
        }
        if !password.chars().any(|c| c.is_ascii_lowercase()) {
            violations.push(PolicyViolation::NoLowercase);
        }
        if !password.chars().any(|c| c.is_ascii_digit()) {
            violations.push(PolicyViolation::NoDigit);
        }
        if !password.chars().any(|c| SYMBOLS.contains(c)) {
            violations.push(PolicyViolation::NoSymbol);
        }

        violations
    }
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self::new(8)
    }
}

/// bcrypt hashing with a configurable cost factor.
#[derive(Debug, Clone, Copy)]
pub struct PasswordHasher {
    cost: u32,
}

impl PasswordHasher {
    #[must_use]
    pub const fn new(cost: u32) -> Self {
        Self { cost }
    }

    pub fn hash(self, password: &str) -> Result<String> {
        bcrypt::hash(password, self.cost).context("Failed to hash password")
    }

    /// Verifies a password against a stored hash. Malformed hashes verify as
    /// false rather than erroring, so callers get a uniform rejection path.
    #[must_use]
    pub fn verify(password: &str, hash: &str) -> bool {
        bcrypt::verify(password, hash).unwrap_or(false)
    }

    /// bcrypt is CPU-intensive; run it off the async runtime.
    pub async fn hash_blocking(self, password: String) -> Result<String> {
        task::spawn_blocking(move || self.hash(&password))
            .await
            .context("Password hashing task panicked")?
    }

    pub async fn verify_blocking(password: String, hash: String) -> Result<bool> {
        task::spawn_blocking(move || Self::verify(&password, &hash))
            .await
            .context("Password verification task panicked")
    }
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self::new(12)
    }
}

/// Generates a random password guaranteed to satisfy the policy: one
/// character from each class first, the rest drawn from the combined charset,
/// then shuffled so class positions cannot be inferred. The length is clamped
/// to `MIN_GENERATED_LENGTH..=MAX_GENERATED_LENGTH`.
#[must_use]
pub fn generate_secure_password(length: usize) -> String {
    let length = length.clamp(MIN_GENERATED_LENGTH, MAX_GENERATED_LENGTH);
    let mut rng = rand::rng();

    let mut chars = Vec::with_capacity(length);
    for class in [UPPER, LOWER, DIGITS, GEN_SYMBOLS] {
        chars.push(class[rng.random_range(0..class.len())]);
    }

    let combined: Vec<u8> = [UPPER, LOWER, DIGITS, GEN_SYMBOLS].concat();
    while chars.len() < length {
        chars.push(combined[rng.random_range(0..combined.len())]);
    }

    chars.shuffle(&mut rng);
    String::from_utf8(chars).expect("generated charset is ASCII")
}

#[cfg(test)]
mod tests {
    use super::*;

    // Low cost keeps the hashing tests fast; production cost comes from config.
    const TEST_COST: u32 = 4;

    #[test]
    fn hash_and_verify() {
        let hasher = PasswordHasher::new(TEST_COST);
        let hash = hasher.hash("Abcdef1!").unwrap();

        assert!(hash.starts_with("$2"));
        assert!(PasswordHasher::verify("Abcdef1!", &hash));
        assert!(!PasswordHasher::verify("Abcdef1?", &hash));
    }

    #[test]
    fn verify_malformed_hash_is_false() {
        assert!(!PasswordHasher::verify("whatever", "not-a-bcrypt-hash"));
        assert!(!PasswordHasher::verify("whatever", ""));
    }

    #[test]
    fn policy_flags_each_violation() {
        let policy = PasswordPolicy::default();

        assert!(policy.validate("short").contains(&PolicyViolation::TooShort));
        assert!(
            policy
                .validate("alllowercase1!")
                .contains(&PolicyViolation::NoUppercase)
        );
        assert!(
            policy
                .validate("ALLUPPERCASE1!")
                .contains(&PolicyViolation::NoLowercase)
        );
        assert!(
            policy
                .validate("NoDigitsHere!")
                .contains(&PolicyViolation::NoDigit)
        );
        assert!(
            policy
                .validate("NoSymbols123")
                .contains(&PolicyViolation::NoSymbol)
        );
    }

    #[test]
    fn policy_accepts_compliant_password() {
        assert!(PasswordPolicy::default().validate("Abcdef1!").is_empty());
    }

    #[test]
    fn generated_passwords_satisfy_policy() {
        let policy = PasswordPolicy::new(4);
        for length in [4, 8, 12, 32] {
            let password = generate_secure_password(length);
            assert_eq!(password.len(), length);
            assert!(
                policy.validate(&password).is_empty(),
                "generated password {password:?} violates policy"
            );
        }
    }

    #[test]
    fn generator_clamps_tiny_lengths() {
        assert_eq!(generate_secure_password(1).len(), MIN_GENERATED_LENGTH);
    }

    // The length arrives from a query parameter; an absurd value must clamp
    // instead of allocating (capacity overflow would abort the process).
    #[test]
    fn generator_clamps_huge_lengths() {
        assert_eq!(
            generate_secure_password(usize::MAX).len(),
            MAX_GENERATED_LENGTH
        );
        assert_eq!(
            generate_secure_password(MAX_GENERATED_LENGTH + 1).len(),
            MAX_GENERATED_LENGTH
        );
    }
}
