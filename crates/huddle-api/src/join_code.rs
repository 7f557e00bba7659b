use rand::Rng;

const ALPHABET: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

pub const JOIN_CODE_LEN: usize = 6;

/// Six characters drawn independently and uniformly from `[0-9a-z]`.
/// Not secret material: uniqueness across workspaces is not checked.
pub fn generate() -> String {
    let mut rng = rand::rng();
    (0..JOIN_CODE_LEN)
        .map(|_| ALPHABET[rng.random_range(0..ALPHABET.len())] as char)
        .collect()
}

/// Exact comparison, ignoring ASCII case.
pub fn matches(stored: &str, supplied: &str) -> bool {
    stored.eq_ignore_ascii_case(supplied)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_codes_use_the_alphabet() {
        for _ in 0..200 {
            let code = generate();
            assert_eq!(code.len(), JOIN_CODE_LEN);
            assert!(code.bytes().all(|b| ALPHABET.contains(&b)));
        }
    }

    #[test]
    fn codes_vary() {
        let codes: std::collections::HashSet<String> = (0..50).map(|_| generate()).collect();
        assert!(codes.len() > 1);
    }

    #[test]
    fn matching_is_case_insensitive_but_exact() {
        assert!(matches("a1b2c3", "A1B2C3"));
        assert!(matches("a1b2c3", "a1b2c3"));
        assert!(!matches("a1b2c3", "a1b2c"));
        assert!(!matches("a1b2c3", " a1b2c3"));
        assert!(!matches("a1b2c3", "a1b2c4"));
    }
}
