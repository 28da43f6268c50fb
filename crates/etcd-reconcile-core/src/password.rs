//! Generated passwords for store users.
//!
//! A generated password has a fixed number of special characters, digits and
//! uppercase letters; the rest is drawn uniformly from the full alphabet and
//! the whole sequence is shuffled so no class sits at a predictable position.

use rand::seq::SliceRandom;
use rand::Rng;

use crate::error::{CoreError, Result};

const LOWER: &[u8] = b"abcdefghijklmnopqrstuvwxyz";
const UPPER: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const SPECIAL: &[u8] = b"!@#$%&*+-_?.,";
const DIGITS: &[u8] = b"0123456789";

/// Character-class requirements for a generated password.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasswordPolicy {
    pub length: usize,
    pub min_special: usize,
    pub min_digits: usize,
    pub min_upper: usize,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            length: 24,
            min_special: 3,
            min_digits: 3,
            min_upper: 3,
        }
    }
}

impl PasswordPolicy {
    /// Number of characters pinned to a specific class.
    pub fn fixed(&self) -> usize {
        self.min_special + self.min_digits + self.min_upper
    }

    /// Reject policies whose fixed classes do not fit the length.
    pub fn check(&self) -> Result<()> {
        if self.fixed() > self.length {
            return Err(CoreError::PasswordPolicy {
                required: self.fixed(),
                length: self.length,
            });
        }
        Ok(())
    }

    /// Whether `password` satisfies this policy.
    pub fn is_satisfied_by(&self, password: &str) -> bool {
        let count = |set: &[u8]| password.bytes().filter(|b| set.contains(b)).count();
        password.len() == self.length
            && count(SPECIAL) >= self.min_special
            && count(DIGITS) >= self.min_digits
            && count(UPPER) >= self.min_upper
    }
}

/// Generate a password following `policy`.
pub fn generate_password(policy: &PasswordPolicy) -> Result<String> {
    policy.check()?;

    let mut rng = rand::thread_rng();
    let full: Vec<u8> = [LOWER, UPPER, SPECIAL, DIGITS].concat();
    let mut pick = |set: &[u8]| set[rng.gen_range(0..set.len())];

    let mut chars = Vec::with_capacity(policy.length);
    chars.extend((0..policy.min_special).map(|_| pick(SPECIAL)));
    chars.extend((0..policy.min_digits).map(|_| pick(DIGITS)));
    chars.extend((0..policy.min_upper).map(|_| pick(UPPER)));
    chars.extend((0..policy.length - policy.fixed()).map(|_| pick(&full)));

    chars.shuffle(&mut rand::thread_rng());

    // Every byte comes from an ASCII table.
    Ok(chars.into_iter().map(char::from).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_default_policy_shape() {
        let policy = PasswordPolicy::default();
        let password = generate_password(&policy).unwrap();
        assert_eq!(password.len(), 24);
        assert!(policy.is_satisfied_by(&password));
    }

    #[test]
    fn test_passwords_differ() {
        let policy = PasswordPolicy::default();
        assert_ne!(
            generate_password(&policy).unwrap(),
            generate_password(&policy).unwrap()
        );
    }

    #[test]
    fn test_policy_overflow_rejected() {
        let policy = PasswordPolicy {
            length: 4,
            ..PasswordPolicy::default()
        };
        assert_eq!(
            generate_password(&policy),
            Err(CoreError::PasswordPolicy {
                required: 9,
                length: 4
            })
        );
    }

    proptest! {
        #[test]
        fn generated_passwords_meet_policy(
            special in 0usize..5,
            digits in 0usize..5,
            upper in 0usize..5,
            extra in 0usize..20,
        ) {
            let policy = PasswordPolicy {
                length: special + digits + upper + extra,
                min_special: special,
                min_digits: digits,
                min_upper: upper,
            };
            let password = generate_password(&policy).unwrap();
            prop_assert!(policy.is_satisfied_by(&password));
        }
    }
}
