use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::config::ReceiptConfig;
use crate::errors::Result;

use super::ReceiptDocument;

/// a receipt written to a private location, not yet visible
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedReceipt {
    pub file_name: String,
    pub staging_path: PathBuf,
}

/// two-phase receipt publication
///
/// `stage` runs before the payment transaction commits. Exactly one of
/// `publish` or `discard` follows, depending on whether the commit succeeded.
pub trait ReceiptStore {
    fn stage(&self, document: &ReceiptDocument) -> Result<StagedReceipt>;

    /// make the receipt visible and return its public path
    fn publish(&self, staged: StagedReceipt) -> Result<String>;

    fn discard(&self, staged: StagedReceipt) -> Result<()>;
}

/// receipts as files under a public directory
#[derive(Debug, Clone)]
pub struct FsReceiptStore {
    directory: PathBuf,
    staging: PathBuf,
    public_prefix: String,
}

impl FsReceiptStore {
    pub fn new(directory: impl Into<PathBuf>, public_prefix: impl Into<String>) -> Self {
        let directory = directory.into();
        Self {
            staging: directory.join(".staging"),
            directory,
            public_prefix: public_prefix.into(),
        }
    }

    pub fn from_config(config: &ReceiptConfig) -> Self {
        Self::new(config.directory.clone(), config.public_prefix.clone())
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn public_path(&self, file_name: &str) -> String {
        format!("{}/{}", self.public_prefix.trim_end_matches('/'), file_name)
    }
}

impl ReceiptStore for FsReceiptStore {
    fn stage(&self, document: &ReceiptDocument) -> Result<StagedReceipt> {
        fs::create_dir_all(&self.staging)?;
        let staging_path = self.staging.join(format!("{}.tmp", Uuid::new_v4()));
        fs::write(&staging_path, document.body.as_bytes())?;

        Ok(StagedReceipt {
            file_name: document.file_name.clone(),
            staging_path,
        })
    }

    fn publish(&self, staged: StagedReceipt) -> Result<String> {
        fs::create_dir_all(&self.directory)?;
        // same filesystem, so the receipt appears whole or not at all
        fs::rename(&staged.staging_path, self.directory.join(&staged.file_name))?;
        Ok(self.public_path(&staged.file_name))
    }

    fn discard(&self, staged: StagedReceipt) -> Result<()> {
        match fs::remove_file(&staged.staging_path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
