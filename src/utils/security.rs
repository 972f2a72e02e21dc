//! Security Utilities
//!
//! Code generation, password digests, and timing-safe comparisons.

use bcrypt::{hash, verify, DEFAULT_COST};
use rand::{distributions::Alphanumeric, Rng};

/// Default bcrypt cost for password hashing
pub const DEFAULT_BCRYPT_COST: u32 = DEFAULT_COST;

/// Generate a cryptographically secure random string
pub fn generate_secure_token(length: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

/// Generate a secure numeric OTP code
pub fn generate_otp_code() -> String {
    rand::thread_rng().gen_range(100000..=999999).to_string()
}

/// Generate an OTP code guaranteed to differ from `previous`
pub fn rotate_otp_code(previous: Option<&str>) -> String {
    loop {
        let code = generate_otp_code();
        if previous != Some(code.as_str()) {
            return code;
        }
    }
}

/// Hash a password with custom bcrypt cost
pub fn hash_password_with_cost(password: &str, cost: u32) -> Result<String, bcrypt::BcryptError> {
    hash(password, cost)
}

/// Verify a password against its hash
pub fn verify_password(password: &str, hash: &str) -> Result<bool, bcrypt::BcryptError> {
    verify(password, hash)
}

/// Whether a stored credential is a bcrypt digest rather than a legacy plaintext value
pub fn is_password_digest(stored: &str) -> bool {
    stored.len() == 60
        && (stored.starts_with("$2a$")
            || stored.starts_with("$2b$")
            || stored.starts_with("$2x$")
            || stored.starts_with("$2y$"))
}

/// Timing-safe string comparison to prevent timing attacks
pub fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (byte_a, byte_b) in a.bytes().zip(b.bytes()) {
        result |= byte_a ^ byte_b;
    }
    result == 0
}

/// Mask a phone number for log output, keeping the last four digits
pub fn mask_phone(phone: &str) -> String {
    let visible = phone.len().saturating_sub(4);
    phone
        .chars()
        .enumerate()
        .map(|(i, c)| if i < visible { '*' } else { c })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_secure_token() {
        let token1 = generate_secure_token(32);
        let token2 = generate_secure_token(32);

        assert_eq!(token1.len(), 32);
        assert_eq!(token2.len(), 32);
        assert_ne!(token1, token2);
    }

    #[test]
    fn test_generate_otp_code() {
        let otp = generate_otp_code();
        assert_eq!(otp.len(), 6);
        assert!(otp.chars().all(|c| c.is_ascii_digit()));

        let otp_num: u32 = otp.parse().unwrap();
        assert!((100000..=999999).contains(&otp_num));
    }

    #[test]
    fn test_rotate_otp_code_never_repeats_previous() {
        for _ in 0..200 {
            let previous = generate_otp_code();
            let next = rotate_otp_code(Some(&previous));
            assert_ne!(previous, next);
        }
    }

    #[test]
    fn test_password_hashing() {
        let password = "test_password_123";
        let hash = hash_password_with_cost(password, 4).unwrap();

        assert!(is_password_digest(&hash));
        assert!(verify_password(password, &hash).unwrap());
        assert!(!verify_password("wrong_password", &hash).unwrap());
    }

    #[test]
    fn test_plaintext_is_not_a_digest() {
        assert!(!is_password_digest("secret"));
        assert!(!is_password_digest(""));
        assert!(!is_password_digest("$2b$short"));
    }

    #[test]
    fn test_constant_time_compare() {
        assert!(constant_time_compare("hello", "hello"));
        assert!(!constant_time_compare("hello", "world"));
        assert!(!constant_time_compare("hello", "hello_world"));
    }

    #[test]
    fn test_mask_phone() {
        assert_eq!(mask_phone("9876543210"), "******3210");
        assert_eq!(mask_phone("12"), "12");
    }
}
