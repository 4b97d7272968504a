//! Access credentials for the coordination store.
//!
//! A credential is supplied as one `user:password` string and parsed when
//! the persister is built, so a malformed value stops startup before the
//! store is ever contacted. Nodes created under a credential are guarded by
//! a digest ACL derived from it.

use std::fmt;
use std::str::FromStr;

use sha2::{Digest, Sha256};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CredentialError {
    #[error("malformed coordination credential: expected 'user:password'")]
    Malformed,

    #[error("malformed coordination credential: empty {0}")]
    Empty(&'static str),
}

#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    user: String,
    password: String,
}

impl Credential {
    pub fn new(user: impl Into<String>, password: impl Into<String>) -> Result<Self, CredentialError> {
        let user = user.into();
        let password = password.into();
        if user.is_empty() {
            return Err(CredentialError::Empty("user"));
        }
        if password.is_empty() {
            return Err(CredentialError::Empty("password"));
        }
        Ok(Self { user, password })
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    /// ACL identity for this credential: `user:<hex sha-256 of user:password>`.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.user.as_bytes());
        hasher.update(b":");
        hasher.update(self.password.as_bytes());
        format!("{}:{}", self.user, hex::encode(hasher.finalize()))
    }
}

impl FromStr for Credential {
    type Err = CredentialError;

    /// Splits on the first `:`; the password may itself contain colons.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (user, password) = s.split_once(':').ok_or(CredentialError::Malformed)?;
        Self::new(user, password)
    }
}

// Never print the password.
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("user", &self.user)
            .field("password", &"***")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_user_and_password() {
        let cred: Credential = "toto:tata".parse().unwrap();
        assert_eq!(cred.user(), "toto");
        assert!(cred.digest().starts_with("toto:"));
        assert_eq!(cred.digest().len(), "toto:".len() + 64);
    }

    #[test]
    fn password_may_contain_colons() {
        let a: Credential = "svc:pa:ss".parse().unwrap();
        let b = Credential::new("svc", "pa:ss").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn rejects_malformed_values() {
        assert_eq!("toto".parse::<Credential>(), Err(CredentialError::Malformed));
        assert_eq!("".parse::<Credential>(), Err(CredentialError::Malformed));
        assert_eq!(":tata".parse::<Credential>(), Err(CredentialError::Empty("user")));
        assert_eq!("toto:".parse::<Credential>(), Err(CredentialError::Empty("password")));
    }

    #[test]
    fn digest_depends_on_password() {
        let a: Credential = "toto:tata".parse().unwrap();
        let b: Credential = "toto:titi".parse().unwrap();
        assert_ne!(a.digest(), b.digest());
    }

    #[test]
    fn debug_hides_password() {
        let cred: Credential = "toto:s3cret".parse().unwrap();
        let shown = format!("{cred:?}");
        assert!(shown.contains("toto"));
        assert!(!shown.contains("s3cret"));
    }
}
