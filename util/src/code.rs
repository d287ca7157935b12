use rand::Rng;

/// Symbols used in session codes. `O`, `I`, `0` and `1` are left out because
/// students confuse them when copying a code off a projector.
pub const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

pub const CODE_LENGTH: usize = 6;

/// Generates a fresh session code using the thread-local RNG.
pub fn generate_code() -> String {
    generate_code_with(&mut rand::thread_rng())
}

pub fn generate_code_with<R: Rng + ?Sized>(rng: &mut R) -> String {
    let mut output = String::with_capacity(CODE_LENGTH);
    for _ in 0..CODE_LENGTH {
        let index = rng.gen_range(0..CODE_ALPHABET.len());
        output.push(CODE_ALPHABET[index] as char);
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::collections::HashSet;

    #[test]
    fn alphabet_has_no_ambiguous_symbols() {
        assert_eq!(CODE_ALPHABET.len(), 32);
        for c in [b'O', b'I', b'0', b'1'] {
            assert!(!CODE_ALPHABET.contains(&c));
        }
    }

    #[test]
    fn codes_have_expected_shape() {
        for _ in 0..500 {
            let code = generate_code();
            assert_eq!(code.len(), CODE_LENGTH);
            assert!(code.bytes().all(|b| CODE_ALPHABET.contains(&b)), "{code}");
        }
    }

    #[test]
    fn seeded_generator_is_reproducible() {
        let a = generate_code_with(&mut StdRng::seed_from_u64(7));
        let b = generate_code_with(&mut StdRng::seed_from_u64(7));
        assert_eq!(a, b);
    }

    #[test]
    fn collisions_are_rare() {
        let mut rng = StdRng::seed_from_u64(42);
        let codes: HashSet<String> = (0..1000).map(|_| generate_code_with(&mut rng)).collect();
        assert!(codes.len() >= 995);
    }
}
