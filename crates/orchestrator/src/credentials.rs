//! Hosting account credentials.

use common::SubjectId;
use providers::OneTimePassword;
use rand::Rng;
use rand::seq::SliceRandom;

const LOWERCASE: &[u8] = b"abcdefghijkmnopqrstuvwxyz";
const UPPERCASE: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ";
const DIGITS: &[u8] = b"23456789";
const SYMBOLS: &[u8] = b"!@#%^*-_+=";

/// Shortest password the panel accepts from us.
pub const MIN_PASSWORD_LENGTH: usize = 12;

/// Username for a lineage; the same for every retry of a subject.
pub fn hosting_username(prefix: &str, lineage_root: SubjectId) -> String {
    format!("{prefix}{lineage_root}")
}

/// Generates a random password containing every character class.
///
/// Lengths below [`MIN_PASSWORD_LENGTH`] are raised to it.
pub fn generate_password(length: usize) -> OneTimePassword {
    let length = length.max(MIN_PASSWORD_LENGTH);
    let mut rng = rand::rng();

    let classes = [LOWERCASE, UPPERCASE, DIGITS, SYMBOLS];
    let mut chars: Vec<char> = classes
        .iter()
        .map(|class| pick(&mut rng, class))
        .collect();

    let all: Vec<u8> = classes.concat();
    while chars.len() < length {
        chars.push(pick(&mut rng, &all));
    }
    chars.shuffle(&mut rng);

    OneTimePassword::new(chars.into_iter().collect::<String>())
}

fn pick(rng: &mut impl Rng, class: &[u8]) -> char {
    char::from(class[rng.random_range(0..class.len())])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn username_is_stable_per_lineage() {
        assert_eq!(hosting_username("user", SubjectId::new(42)), "user42");
        assert_eq!(
            hosting_username("user", SubjectId::new(42)),
            hosting_username("user", SubjectId::new(42))
        );
        assert_eq!(hosting_username("acct", SubjectId::new(7)), "acct7");
    }

    #[test]
    fn password_has_every_class() {
        let password = generate_password(16);
        let value = password.expose();

        assert_eq!(password.len(), 16);
        assert!(value.bytes().any(|b| LOWERCASE.contains(&b)));
        assert!(value.bytes().any(|b| UPPERCASE.contains(&b)));
        assert!(value.bytes().any(|b| DIGITS.contains(&b)));
        assert!(value.bytes().any(|b| SYMBOLS.contains(&b)));
    }

    #[test]
    fn short_lengths_are_raised() {
        assert_eq!(generate_password(4).len(), MIN_PASSWORD_LENGTH);
    }

    #[test]
    fn passwords_differ() {
        assert_ne!(generate_password(16), generate_password(16));
    }
}
