//! Local credential file in htpasswd format.
//!
//! Supported entries: `user:{SHA}<base64 sha1>` and bcrypt
//! (`$2a$`, `$2b$`, `$2y$`). Other lines are skipped with a warning.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use sha1::{Digest, Sha1};
use subtle::ConstantTimeEq;
use thiserror::Error;

use crate::providers::{CredentialProvider, Identity};

#[derive(Debug, Error)]
pub enum HtpasswdError {
    #[error("failed to read htpasswd file: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone)]
enum PasswordHash {
    Sha1(Vec<u8>),
    Bcrypt(String),
}

/// Snapshot of a credential file, loaded once at startup.
#[derive(Debug, Clone, Default)]
pub struct HtpasswdFile {
    entries: HashMap<String, PasswordHash>,
}

impl HtpasswdFile {
    pub fn load(path: &Path) -> Result<Self, HtpasswdError> {
        let content = fs::read_to_string(path)?;
        let file = Self::parse(&content);
        tracing::info!(path = %path.display(), users = file.len(), "Loaded htpasswd file");
        Ok(file)
    }

    pub fn parse(content: &str) -> Self {
        let mut entries = HashMap::new();
        for (lineno, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((user, hash)) = line.split_once(':') else {
                tracing::warn!(line = lineno + 1, "Skipping htpasswd line without ':'");
                continue;
            };
            let parsed = if let Some(encoded) = hash.strip_prefix("{SHA}") {
                match STANDARD.decode(encoded) {
                    Ok(digest) => PasswordHash::Sha1(digest),
                    Err(_) => {
                        tracing::warn!(user, "Skipping htpasswd entry with invalid {{SHA}} digest");
                        continue;
                    }
                }
            } else if ["$2a$", "$2b$", "$2y$"].iter().any(|p| hash.starts_with(p)) {
                PasswordHash::Bcrypt(hash.to_string())
            } else {
                tracing::warn!(user, "Skipping htpasswd entry with unsupported hash scheme");
                continue;
            };
            entries.insert(user.to_string(), parsed);
        }
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Check `password` for `user`. Bcrypt runs on the blocking pool.
    pub async fn validate(&self, user: &str, password: &str) -> bool {
        match self.entries.get(user) {
            Some(PasswordHash::Sha1(expected)) => {
                let actual = Sha1::digest(password.as_bytes());
                actual.as_slice().ct_eq(expected).into()
            }
            Some(PasswordHash::Bcrypt(hash)) => {
                let (password, hash) = (password.to_string(), hash.clone());
                match tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash)).await {
                    Ok(result) => result.unwrap_or(false),
                    Err(e) => {
                        tracing::error!(user = %user, error = %e, "bcrypt verification task failed");
                        false
                    }
                }
            }
            None => false,
        }
    }
}

#[async_trait]
impl CredentialProvider for HtpasswdFile {
    fn name(&self) -> &'static str {
        "htpasswd"
    }

    async fn authenticate(&self, user: &str, secret: &str) -> Option<Identity> {
        self.validate(user, secret).await.then(|| Identity::user(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn sha_line(user: &str, password: &str) -> String {
        format!("{user}:{{SHA}}{}", STANDARD.encode(Sha1::digest(password.as_bytes())))
    }

    #[tokio::test]
    async fn validates_sha_entries() {
        let file = HtpasswdFile::parse(&sha_line("alice", "correct"));
        assert!(file.validate("alice", "correct").await);
        assert!(!file.validate("alice", "wrong").await);
        assert!(!file.validate("bob", "correct").await);
    }

    #[tokio::test]
    async fn validates_bcrypt_entries() {
        let hash = bcrypt::hash("hunter2", 4).unwrap();
        let file = HtpasswdFile::parse(&format!("carol:{hash}\n"));
        assert!(file.validate("carol", "hunter2").await);
        assert!(!file.validate("carol", "hunter3").await);
    }

    #[tokio::test]
    async fn skips_comments_and_unsupported_lines() {
        let content = format!(
            "# comment\n\nbroken-line\nmd5user:$apr1$abc$def\n{}\n",
            sha_line("dave", "pw")
        );
        let file = HtpasswdFile::parse(&content);
        assert_eq!(file.len(), 1);
        assert!(file.validate("dave", "pw").await);
    }

    #[tokio::test]
    async fn loads_from_disk() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        writeln!(tmp, "{}", sha_line("erin", "pw")).unwrap();
        let file = HtpasswdFile::load(tmp.path()).unwrap();
        assert!(file.validate("erin", "pw").await);
    }

    #[tokio::test]
    async fn provider_returns_identity_without_groups() {
        let file = HtpasswdFile::parse(&sha_line("alice", "correct"));
        let identity = file.authenticate("alice", "correct").await.unwrap();
        assert_eq!(identity.user, "alice");
        assert!(identity.groups.is_none());
        assert!(file.authenticate("alice", "nope").await.is_none());
    }
}
