//! Bearer token authorization.
//!
//! The accepted tokens are fixed at startup. They are kept only as SHA-256
//! digests so lookups never compare secret bytes directly and the plaintext
//! cannot leak through `Debug` output.

use crate::{Error, Result};
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// Message returned for every rejected credential.
pub const UNAUTHORIZED_MESSAGE: &str = "Invalid or missing token";

type TokenDigest = [u8; 32];

fn digest(token: &str) -> TokenDigest {
    let mut out = [0u8; 32];
    out.copy_from_slice(&Sha256::digest(token.as_bytes()));
    out
}

/// Extracts the credential from an `Authorization` header value.
///
/// The scheme must be `Bearer` (case-insensitive) followed by a non-empty
/// credential.
#[must_use]
pub fn bearer_credential(header: &str) -> Option<&str> {
    let (scheme, credential) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let credential = credential.trim();
    (!credential.is_empty()).then_some(credential)
}

/// Immutable allow-list of bearer tokens, cheap to clone and share.
#[derive(Clone)]
pub struct TokenSet {
    digests: Arc<HashSet<TokenDigest>>,
}

impl fmt::Debug for TokenSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenSet")
            .field("len", &self.digests.len())
            .finish_non_exhaustive()
    }
}

impl TokenSet {
    /// Builds a token set from plaintext tokens. Empty tokens are ignored.
    #[must_use]
    pub fn new<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let digests = tokens
            .into_iter()
            .filter(|t| !t.as_ref().is_empty())
            .map(|t| digest(t.as_ref()))
            .collect();
        Self {
            digests: Arc::new(digests),
        }
    }

    /// Builds a token set from configured secrets.
    #[must_use]
    pub fn from_secrets(tokens: &[SecretString]) -> Self {
        Self::new(tokens.iter().map(ExposeSecret::expose_secret))
    }

    /// Returns the number of distinct tokens.
    #[must_use]
    pub fn len(&self) -> usize {
        self.digests.len()
    }

    /// Returns true if no token is configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.digests.is_empty()
    }

    /// Returns true if `credential` is an accepted token.
    #[must_use]
    pub fn contains(&self, credential: &str) -> bool {
        !credential.is_empty() && self.digests.contains(&digest(credential))
    }

    /// Authorizes a credential. A missing credential is rejected like an
    /// unknown one.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unauthorized`] unless the credential is in the set.
    pub fn authorize(&self, credential: Option<&str>) -> Result<()> {
        match credential {
            Some(credential) if self.contains(credential) => Ok(()),
            _ => Err(Error::Unauthorized(UNAUTHORIZED_MESSAGE.to_string())),
        }
    }

    /// Authorizes the raw value of an `Authorization` header.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unauthorized`] if the header is absent, is not a
    /// `Bearer` credential, or carries an unknown token.
    pub fn authorize_header(&self, header: Option<&str>) -> Result<()> {
        self.authorize(header.and_then(bearer_credential))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn test_contains_configured_tokens() {
        let tokens = TokenSet::new(["abc123", "def456"]);

        assert_eq!(tokens.len(), 2);
        assert!(tokens.contains("abc123"));
        assert!(tokens.contains("def456"));
        assert!(!tokens.contains("abc1234"));
        assert!(!tokens.contains("ABC123"));
    }

    #[test]
    fn test_empty_tokens_ignored() {
        let tokens = TokenSet::new(["", "abc"]);

        assert_eq!(tokens.len(), 1);
        assert!(!tokens.contains(""));
    }

    #[test]
    fn test_from_secrets() {
        let secrets = vec![SecretString::from("abc123".to_string())];
        let tokens = TokenSet::from_secrets(&secrets);

        assert!(tokens.contains("abc123"));
    }

    #[test]
    fn test_debug_does_not_leak() {
        let tokens = TokenSet::new(["super-secret"]);
        let debug = format!("{tokens:?}");

        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("len: 1"));
    }

    #[test]
    fn test_authorize_missing_credential() {
        let tokens = TokenSet::new(["abc123"]);
        let err = tokens.authorize(None).expect_err("should reject");

        assert!(matches!(err, Error::Unauthorized(_)));
        assert_eq!(err.to_string(), UNAUTHORIZED_MESSAGE);
    }

    #[test_case("Bearer abc123", true ; "valid token")]
    #[test_case("bearer abc123", true ; "lowercase scheme")]
    #[test_case("Bearer   abc123  ", true ; "padded credential")]
    #[test_case("Bearer wrong", false ; "unknown token")]
    #[test_case("Bearer ", false ; "empty credential")]
    #[test_case("Bearer", false ; "scheme only")]
    #[test_case("Basic YWJjMTIz", false ; "basic scheme")]
    #[test_case("abc123", false ; "bare token")]
    #[test_case("", false ; "empty header")]
    fn test_authorize_header(header: &str, accepted: bool) {
        let tokens = TokenSet::new(["abc123"]);
        assert_eq!(tokens.authorize_header(Some(header)).is_ok(), accepted);
    }

    #[test]
    fn test_authorize_header_absent() {
        let tokens = TokenSet::new(["abc123"]);
        assert!(tokens.authorize_header(None).is_err());
    }
}
