use rand::Rng;

/// Creates a random alphanumeric string of the given length.
pub fn create_random_secret(secret_len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..secret_len)
        .map(|_| rng.sample(rand::distributions::Alphanumeric) as char)
        .collect()
}

/// Generates an event UID the way the webmail host does: an opaque random
/// token, lowercased so it survives case-insensitive storage backends.
pub fn generate_uid() -> String {
    create_random_secret(32).to_lowercase()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn creates_secret_of_expected_length() {
        for len in [1, 16, 32, 64] {
            assert_eq!(create_random_secret(len).len(), len);
        }
    }

    #[test]
    fn generated_uids_are_unique() {
        let uid1 = generate_uid();
        let uid2 = generate_uid();
        assert_eq!(uid1.len(), 32);
        assert_ne!(uid1, uid2);
    }
}
