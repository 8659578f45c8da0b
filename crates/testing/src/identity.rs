use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use orbiter_core::{Identity, IdentityProvider, Keystore, KeystoreError};

/// Keystore fake: remembers its path and whether it was closed.
#[derive(Clone)]
pub struct ToyKeystore {
    path: PathBuf,
    closed: Arc<AtomicBool>,
}

impl ToyKeystore {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl Keystore for ToyKeystore {
    fn create(path: &Path) -> Result<Self, KeystoreError> {
        Ok(Self {
            path: path.to_path_buf(),
            closed: Arc::new(AtomicBool::new(false)),
        })
    }

    async fn close(&self) -> Result<(), KeystoreError> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}

/// Identity provider fake: the identity id is the peer id itself.
#[derive(Clone, Default)]
pub struct ToyIdentityProvider;

impl IdentityProvider<ToyKeystore> for ToyIdentityProvider {
    async fn create_identity(
        &self,
        id: &str,
        keystore: &ToyKeystore,
    ) -> Result<Identity, KeystoreError> {
        if keystore.is_closed() {
            return Err(KeystoreError::Closed);
        }

        Ok(Identity {
            id: id.to_string(),
            pub_key: format!("{id}-pub"),
        })
    }
}
