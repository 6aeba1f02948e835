//! Round-robin pool of interchangeable image-service credentials.
//!
//! The pool is built once at startup from the configured keys.  Each run
//! receives its own clone (see [`crate::pipeline::RunContext`]), so the
//! rotation cursor is run-scoped state while the key material is shared.
//!
//! ```rust
//! use stickman_studio::credentials::CredentialPool;
//!
//! let mut pool = CredentialPool::new(vec!["a".into(), "b".into()]).unwrap();
//! assert_eq!(pool.next().secret(), "a");
//! assert_eq!(pool.next().secret(), "b");
//! assert_eq!(pool.next().secret(), "a");
//! ```

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CredentialError {
    #[error(
        "No image API keys found. Set GEMINI_API_KEY_1, GEMINI_API_KEY_2, ... or image.api_keys"
    )]
    NoCredentials,
}

/// One credential handed out by the pool.
///
/// `Debug` only prints the slot index so keys never reach the logs.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    index: usize,
    secret: Arc<str>,
}

impl Credential {
    /// Position of this credential in the pool.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("index", &self.index)
            .finish_non_exhaustive()
    }
}

/// Ordered credentials plus a rotation cursor.
#[derive(Clone)]
pub struct CredentialPool {
    keys: Arc<[Arc<str>]>,
    cursor: usize,
}

impl fmt::Debug for CredentialPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialPool")
            .field("size", &self.keys.len())
            .field("cursor", &self.cursor)
            .finish()
    }
}

impl CredentialPool {
    /// Build a pool from `keys`; blank entries are ignored.
    pub fn new(keys: Vec<String>) -> Result<Self, CredentialError> {
        let keys: Vec<Arc<str>> = keys
            .into_iter()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .map(Arc::from)
            .collect();

        if keys.is_empty() {
            return Err(CredentialError::NoCredentials);
        }

        log::info!("credentials: initialised rotation with {} key(s)", keys.len());
        Ok(Self {
            keys: keys.into(),
            cursor: 0,
        })
    }

    /// Return the credential under the cursor, then advance it circularly.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Credential {
        let index = self.cursor;
        self.cursor = (self.cursor + 1) % self.keys.len();
        Credential {
            index,
            secret: Arc::clone(&self.keys[index]),
        }
    }

    /// Pool cardinality: also the attempt ceiling for quota retries.
    pub fn size(&self) -> usize {
        self.keys.len()
    }

    /// A copy of this pool with the cursor rewound to the first key.
    pub fn fresh(&self) -> Self {
        Self {
            keys: Arc::clone(&self.keys),
            cursor: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool(n: usize) -> CredentialPool {
        CredentialPool::new((0..n).map(|i| format!("key-{i}")).collect()).unwrap()
    }

    #[test]
    fn empty_pool_is_a_configuration_error() {
        assert_eq!(
            CredentialPool::new(Vec::new()).unwrap_err(),
            CredentialError::NoCredentials
        );
    }

    #[test]
    fn blank_keys_do_not_count() {
        assert!(CredentialPool::new(vec!["".into(), "  ".into()]).is_err());
        assert_eq!(
            CredentialPool::new(vec!["".into(), "k".into()]).unwrap().size(),
            1
        );
    }

    #[test]
    fn next_cycles_modulo_size() {
        for m in 1..=4 {
            let mut p = pool(m);
            for k in 0..(3 * m + 1) {
                let cred = p.next();
                assert_eq!(cred.index(), k % m);
                assert_eq!(cred.secret(), format!("key-{}", k % m));
            }
        }
    }

    #[test]
    fn fresh_shares_keys_but_resets_cursor() {
        let mut p = pool(3);
        p.next();
        p.next();
        let mut f = p.fresh();
        assert_eq!(f.next().index(), 0);
        assert_eq!(p.next().index(), 2);
    }

    #[test]
    fn debug_never_prints_the_secret() {
        let mut p = CredentialPool::new(vec!["super-secret".into()]).unwrap();
        let rendered = format!("{:?} {:?}", p.next(), p);
        assert!(!rendered.contains("super-secret"));
    }
}
