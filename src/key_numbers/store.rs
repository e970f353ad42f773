use anyhow::{bail, Context, Result};
use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};
use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};
use tracing::{debug, info, warn};

/// Indicator name → pre-formatted display value.
///
/// A `BTreeMap` so the document is always written in sorted key order.
pub type KeyNumbers = BTreeMap<String, String>;

const INDENT: &[u8] = b"    ";

/// Handle on a key-number JSON document shared by every pipeline.
///
/// The store keeps nothing but the path; each call re-reads the file. There is
/// no locking: two processes merging into the same path at once can lose an
/// update, so callers must run their merges one after another.
#[derive(Debug, Clone)]
pub struct KeyNumberStore {
    path: PathBuf,
}

impl KeyNumberStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Bootstrap: write an empty `{}` document (creating parent directories)
    /// if nothing exists at the path yet. Returns `true` if it created the file.
    pub fn ensure_exists(&self) -> Result<bool> {
        if self.path.exists() {
            return Ok(false);
        }
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating directory {}", parent.display()))?;
        }
        self.write(&KeyNumbers::new())
            .with_context(|| format!("bootstrapping {}", self.path.display()))?;
        Ok(true)
    }

    /// Read and parse the whole document.
    ///
    /// Anything other than a JSON object of string values is a parse error;
    /// nothing is recovered from a corrupt file.
    pub fn load(&self) -> Result<KeyNumbers> {
        let text = fs::read_to_string(&self.path)
            .with_context(|| format!("reading key numbers from {}", self.path.display()))?;
        let doc: KeyNumbers = serde_json::from_str(&text)
            .with_context(|| format!("parsing key numbers in {}", self.path.display()))?;
        Ok(doc)
    }

    /// Read-merge-write: every key in `updates` is inserted or overwritten,
    /// every other key keeps its value.
    pub fn merge(&self, updates: &KeyNumbers) -> Result<()> {
        if updates.is_empty() {
            warn!(path = %self.path.display(), "no key numbers to merge; document left untouched");
            return Ok(());
        }
        if let Some(blank) = updates.keys().find(|k| k.trim().is_empty()) {
            bail!(
                "refusing to merge into {}: indicator name {:?} is blank",
                self.path.display(),
                blank
            );
        }

        if self.ensure_exists()? {
            info!(path = %self.path.display(), "created empty key number document");
        }
        let mut doc = self.load()?;

        for (key, value) in updates {
            match doc.insert(key.clone(), value.clone()) {
                Some(previous) if previous != *value => {
                    info!(key = %key, previous = %previous, value = %value, "overwrote key number")
                }
                Some(_) => debug!(key = %key, "key number unchanged"),
                None => debug!(key = %key, value = %value, "added key number"),
            }
        }

        self.write(&doc)?;
        info!(
            path = %self.path.display(),
            merged = updates.len(),
            total = doc.len(),
            "key numbers updated"
        );
        Ok(())
    }

    /// Write to a sibling temp file, then rename it over the document, so a
    /// failed write never leaves a truncated file behind.
    fn write(&self, doc: &KeyNumbers) -> Result<()> {
        let bytes = render(doc)?;

        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .with_context(|| format!("{} has no file name", self.path.display()))?;
        let tmp_path = dir.join(format!(".{}.tmp", file_name));

        fs::write(&tmp_path, &bytes)
            .with_context(|| format!("writing {}", tmp_path.display()))?;
        if let Err(e) = fs::rename(&tmp_path, &self.path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(e).with_context(|| {
                format!(
                    "renaming {} -> {}",
                    tmp_path.display(),
                    self.path.display()
                )
            });
        }
        Ok(())
    }
}

/// Serialize with 4-space indentation and a trailing newline.
pub fn render(doc: &KeyNumbers) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    let mut ser = Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(INDENT));
    doc.serialize(&mut ser)
        .context("serializing key numbers")?;
    buf.push(b'\n');
    Ok(buf)
}

/// Merge `updates` into the document at `path`, creating it if needed.
pub fn merge(path: impl AsRef<Path>, updates: &KeyNumbers) -> Result<()> {
    KeyNumberStore::new(path.as_ref()).merge(updates)
}
