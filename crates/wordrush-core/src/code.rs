use rand::Rng;

/// Alphabet for join codes; ambiguous glyphs (0/O, 1/I/L) are excluded.
const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";

/// Length of a join code.
pub const CODE_LEN: usize = 6;

/// Generate a random join code like "K7XQ2M".
pub fn generate_join_code() -> String {
    let mut rng = rand::rng();
    (0..CODE_LEN)
        .map(|_| CODE_ALPHABET[rng.random_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

/// Check that a string has the shape of a join code.
pub fn is_valid_join_code(code: &str) -> bool {
    code.len() == CODE_LEN && code.bytes().all(|b| CODE_ALPHABET.contains(&b))
}
