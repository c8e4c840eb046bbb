//! Inference API credential format check.
//!
//! Client-side only: a token that looks right is not necessarily live, but a
//! token that fails this check will never be accepted by the service, so the
//! shell can refuse input submission up front.

/// Expected token prefix for the hosted inference service.
const TOKEN_PREFIX: &str = "r8_";

/// Expected token length, prefix included.
const TOKEN_LEN: usize = 40;

/// Whether a credential string has the right shape to be an API token.
pub fn looks_valid(token: &str) -> bool {
    token.starts_with(TOKEN_PREFIX) && token.len() == TOKEN_LEN
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token_of_len(len: usize) -> String {
        let mut t = String::from("r8_");
        while t.len() < len {
            t.push('a');
        }
        t
    }

    #[test]
    fn accepts_well_formed_token() {
        assert!(looks_valid(&token_of_len(40)));
    }

    #[test]
    fn rejects_wrong_length() {
        assert!(!looks_valid(&token_of_len(39)));
        assert!(!looks_valid(&token_of_len(41)));
        assert!(!looks_valid("r8_"));
    }

    #[test]
    fn rejects_wrong_prefix() {
        let mut t = token_of_len(40);
        t.replace_range(0..3, "sk_");
        assert!(!looks_valid(&t));
    }

    #[test]
    fn rejects_empty() {
        assert!(!looks_valid(""));
    }
}
