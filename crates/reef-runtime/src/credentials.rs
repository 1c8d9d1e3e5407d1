//! Generated credentials.
//!
//! Database master credentials are generated once at create time, embedded
//! in the stack's parameter set, and reused by the post-provision
//! coordinator to create the application schema. The application key is
//! generated when the secret set is first populated.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use rand::distr::Alphanumeric;
use rand::{Rng, RngCore};

/// Random database username: a lowercase letter followed by 10 to 15
/// alphanumeric characters. Database identifiers cannot start with a
/// digit.
pub fn database_username() -> String {
    let mut rng = rand::rng();
    let first = rng.random_range(b'a'..=b'z') as char;
    let len = rng.random_range(10..=15);
    let rest: String = (&mut rng)
        .sample_iter(Alphanumeric)
        .take(len)
        .map(char::from)
        .collect();
    format!("{first}{rest}")
}

/// Random database password of 32 to 40 alphanumeric characters.
pub fn database_password() -> String {
    let mut rng = rand::rng();
    let len = rng.random_range(32..=40);
    (&mut rng)
        .sample_iter(Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Application encryption key: 32 random bytes, base64 encoded with the
/// scheme prefix the application expects.
pub fn application_key() -> String {
    let mut key = [0u8; 32];
    rand::rng().fill_bytes(&mut key);
    format!("base64:{}", STANDARD.encode(key))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn username_shape() {
        for _ in 0..50 {
            let username = database_username();
            assert!((11..=16).contains(&username.len()));
            assert!(username.chars().next().unwrap().is_ascii_lowercase());
            assert!(username.chars().all(|c| c.is_ascii_alphanumeric()));
        }
    }

    #[test]
    fn password_shape() {
        for _ in 0..50 {
            let password = database_password();
            assert!((32..=40).contains(&password.len()));
            assert!(password.chars().all(|c| c.is_ascii_alphanumeric()));
        }
    }

    #[test]
    fn application_key_is_prefixed_base64() {
        let key = application_key();
        let encoded = key.strip_prefix("base64:").unwrap();
        assert_eq!(STANDARD.decode(encoded).unwrap().len(), 32);
    }
}
