//! Directory-backed [`KeyStore`].
//!
//! The key directory holds two JSON documents, [`PRIVATE_KEY_FILE`] and
//! [`PUBLIC_KEY_FILE`], each a serialized [`KeySet`]. Every write replaces a
//! whole file: the new contents go to a sibling temp file that is then
//! renamed over the original, so a reader never observes a half-written
//! document.
//!
//! On Unix the directory is created `0755`, the private store is written
//! `0600` and the public store `0644`.

use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use tokio::{io::AsyncWriteExt, sync::Mutex};

use crate::{
    error::{KeyStoreError, Result},
    key::KeySet,
    material::{PrivateKey, PublicKey},
    store::{KeyStore, Plan, decode_private, decode_public, plan_initialize, plan_rotate},
};

/// File name of the private key store.
pub const PRIVATE_KEY_FILE: &str = "private.json";

/// File name of the public key store.
pub const PUBLIC_KEY_FILE: &str = "public.json";

/// Default key directory, relative to the working directory.
pub const DEFAULT_KEY_DIR: &str = "keys";

#[cfg(unix)]
const DIR_MODE: u32 = 0o755;
#[cfg(unix)]
const PRIVATE_FILE_MODE: u32 = 0o600;
#[cfg(unix)]
const PUBLIC_FILE_MODE: u32 = 0o644;

#[derive(Debug, Clone, Copy)]
enum Side {
    Private,
    Public,
}

impl Side {
    fn file_name(self) -> &'static str {
        match self {
            Self::Private => PRIVATE_KEY_FILE,
            Self::Public => PUBLIC_KEY_FILE,
        }
    }

    #[cfg(unix)]
    fn mode(self) -> u32 {
        match self {
            Self::Private => PRIVATE_FILE_MODE,
            Self::Public => PUBLIC_FILE_MODE,
        }
    }
}

/// A [`KeyStore`] persisted as two JSON files in one directory.
///
/// Writers within this process are serialized by an internal async mutex.
/// Readers take no lock: each lookup reads the current file.
///
/// # Examples
///
/// ```no_run
/// use chainauth_keystore::{FileKeyStore, KeyStore};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = FileKeyStore::new("keys");
/// let max_id = store.initialize().await?;
/// let key = store.find_private_key(&max_id).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct FileKeyStore {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl FileKeyStore {
    /// Creates a store rooted at `dir`. Nothing is touched on disk until
    /// the first operation.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into(), write_lock: Mutex::new(()) }
    }

    /// The key directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the private key store.
    #[must_use]
    pub fn private_path(&self) -> PathBuf {
        self.dir.join(PRIVATE_KEY_FILE)
    }

    /// Path of the public key store.
    #[must_use]
    pub fn public_path(&self) -> PathBuf {
        self.dir.join(PUBLIC_KEY_FILE)
    }

    /// Reads one side. A missing or blank file is an empty set.
    async fn read(&self, side: Side) -> Result<KeySet> {
        let path = self.dir.join(side.file_name());
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(KeySet::default()),
            Err(e) => {
                return Err(KeyStoreError::storage(format!("failed to read {}", path.display()), e));
            },
        };

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(KeySet::default());
        }

        serde_json::from_slice(&bytes).map_err(|e| {
            KeyStoreError::malformed(format!("{} is not a valid key set: {e}", path.display()))
        })
    }

    /// Replaces one side atomically via temp file and rename.
    async fn write(&self, side: Side, set: &KeySet) -> Result<()> {
        let path = self.dir.join(side.file_name());
        let tmp = self.dir.join(format!(".{}.tmp", side.file_name()));
        let json = serde_json::to_vec_pretty(set).map_err(|e| {
            KeyStoreError::malformed(format!("failed to serialize {}: {e}", side.file_name()))
        })?;

        let mut options = tokio::fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        options.mode(side.mode());

        let write_err = |e| KeyStoreError::storage(format!("failed to write {}", tmp.display()), e);
        let mut file = options.open(&tmp).await.map_err(write_err)?;
        file.write_all(&json).await.map_err(write_err)?;
        file.sync_all().await.map_err(write_err)?;
        drop(file);

        // The mode passed to open only applies when the temp file is created.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(&tmp, std::fs::Permissions::from_mode(side.mode()))
                .await
                .map_err(write_err)?;
        }

        tokio::fs::rename(&tmp, &path).await.map_err(|e| {
            KeyStoreError::storage(format!("failed to replace {}", path.display()), e)
        })
    }

    async fn ensure_dir(&self) -> Result<()> {
        let mut builder = tokio::fs::DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        builder.mode(DIR_MODE);
        builder.create(&self.dir).await.map_err(|e| {
            KeyStoreError::storage(format!("failed to create {}", self.dir.display()), e)
        })
    }

    async fn apply(&self, plan: fn(KeySet, KeySet) -> Result<Plan>) -> Result<String> {
        let _guard = self.write_lock.lock().await;
        self.ensure_dir().await?;

        let private = self.read(Side::Private).await?;
        let public = self.read(Side::Public).await?;

        match plan(private, public)? {
            Plan::Unchanged { max_id } => {
                tracing::debug!(max_id = %max_id, "Key store already initialized");
                Ok(max_id)
            },
            Plan::Append { private, public, kid } => {
                // Public first: a public key without its private half can
                // never sign, while the reverse would mint unverifiable tokens.
                self.write(Side::Public, &public).await?;
                self.write(Side::Private, &private).await?;
                tracing::info!(kid = %kid, dir = %self.dir.display(), "Generated signing key");
                Ok(kid)
            },
        }
    }
}

#[async_trait]
impl KeyStore for FileKeyStore {
    #[tracing::instrument(skip(self), fields(dir = %self.dir.display()))]
    async fn initialize(&self) -> Result<String> {
        self.apply(plan_initialize).await
    }

    #[tracing::instrument(skip(self), fields(dir = %self.dir.display()))]
    async fn rotate(&self) -> Result<String> {
        self.apply(plan_rotate).await
    }

    #[tracing::instrument(skip(self))]
    async fn find_private_key(&self, kid: &str) -> Result<PrivateKey> {
        let set = self.read(Side::Private).await?;
        decode_private(&set, kid)
    }

    #[tracing::instrument(skip(self))]
    async fn find_public_key(&self, kid: &str) -> Result<PublicKey> {
        let set = self.read(Side::Public).await?;
        decode_public(&set, kid)
    }

    #[tracing::instrument(skip(self))]
    async fn public_key_set(&self) -> Result<KeySet> {
        self.read(Side::Public).await
    }
}
