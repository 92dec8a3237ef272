//! Collision-resistant codes and names for test data
//!
//! Not cryptographically unique; two calls in the same millisecond can
//! collide when the random suffix is truncated away.

use rand::Rng;

/// Default upper bound for [`generate_unique_code`]
pub const DEFAULT_CODE_LENGTH: usize = 12;

const BASE36: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Lowercase base-36 rendering of `n`
pub fn to_base36(mut n: u64) -> String {
    if n == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while n > 0 {
        digits.push(BASE36[(n % 36) as usize]);
        n /= 36;
    }
    digits.reverse();
    String::from_utf8(digits).unwrap_or_default()
}

fn random_base36(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
        .collect()
}

/// `prefix` + base-36 timestamp + 4 random base-36 chars, uppercased and
/// cut to `max_length` characters.
pub fn generate_unique_code(prefix: &str, max_length: usize) -> String {
    let millis = chrono::Utc::now().timestamp_millis().max(0) as u64;
    let raw = format!("{}{}{}", prefix, to_base36(millis), random_base36(4));
    raw.to_uppercase().chars().take(max_length).collect()
}

/// `"{prefix} XXXXXX"` with six random uppercase base-36 chars
pub fn generate_unique_name(prefix: &str) -> String {
    format!("{} {}", prefix, random_base36(6).to_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use regex::Regex;
    use test_case::test_case;

    #[test_case(0, "0")]
    #[test_case(35, "z")]
    #[test_case(36, "10")]
    #[test_case(1_700_000_000_000, "loyw3v28")]
    fn test_to_base36(n: u64, expected: &str) {
        assert_eq!(to_base36(n), expected);
    }

    #[test_case("PROMO", 12)]
    #[test_case("TT", 20)]
    #[test_case("", 6)]
    #[test_case("LONGPREFIXVALUE", 8)]
    fn test_unique_code_shape(prefix: &str, max_length: usize) {
        let code = generate_unique_code(prefix, max_length);
        assert!(code.chars().count() <= max_length);
        assert!(code.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));

        let expected_prefix: String = prefix.chars().take(max_length).collect();
        assert!(code.starts_with(&expected_prefix), "{} !~ {}", code, expected_prefix);
    }

    #[test]
    fn test_unique_code_uses_full_length_when_room() {
        // prefix + 8 timestamp chars + 4 random chars
        let code = generate_unique_code("X", 64);
        assert_eq!(code.len(), 13);
    }

    #[test]
    fn test_unique_name_shape() {
        let pattern = Regex::new(r"^Ticket Type [A-Z0-9]{6}$").unwrap();
        for _ in 0..50 {
            let name = generate_unique_name("Ticket Type");
            assert!(pattern.is_match(&name), "bad name: {}", name);
        }
    }

    #[test]
    fn test_unique_names_rarely_collide() {
        let names: std::collections::HashSet<_> =
            (0..100).map(|_| generate_unique_name("N")).collect();
        assert!(names.len() > 95);
    }
}
