//! Ephemeral zip archives produced by file-creation steps
//!
//! Archives live in the configured temp directory as `{class}-{suffix}.zip`,
//! where `{class}` is the kebab-cased class name. Suffixes come from one
//! free-list per file stem, so concurrent sessions never write to the same file
//! even when two class names kebab-case alike. An archive is leased to
//! one `(session, button)` pair until it is released: after a `no-store`
//! download, or when the same session starts a new run.
//!
//! The free-list is process-local. Several worker processes sharing one temp
//! directory would need a shared allocator.

use dashmap::DashMap;
use std::collections::BTreeSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::task::spawn_blocking;
use tracing::{debug, warn};

use crate::button::dom_class;
use crate::error::{Error, Result};
use crate::types::{ButtonId, CachePolicy, SessionId};

/// Free-list of reusable suffixes
///
/// Released suffixes are handed out again, smallest first, before the list grows.
#[derive(Debug, Default, Clone)]
pub struct SuffixPool {
    released: BTreeSet<u32>,
    next: u32,
}

impl SuffixPool {
    /// Empty pool; the first allocation is 0
    pub fn new() -> Self {
        Self::default()
    }

    /// Take a suffix
    pub fn allocate(&mut self) -> u32 {
        if let Some(suffix) = self.released.pop_first() {
            return suffix;
        }
        let suffix = self.next;
        self.next += 1;
        suffix
    }

    /// Return a suffix to the pool; unknown or already released suffixes are ignored
    pub fn release(&mut self, suffix: u32) -> bool {
        suffix < self.next && self.released.insert(suffix)
    }

    /// Number of suffixes currently allocated
    pub fn in_use(&self) -> usize {
        self.next as usize - self.released.len()
    }
}

/// A zip archive leased to one session's run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    /// Location on disk
    pub path: PathBuf,
    /// Name the client saves it under
    pub filename: String,
    /// Button class that produced it
    pub class_name: String,
    /// Free-list suffix in use
    pub suffix: u32,
    /// Cache policy of the producing button
    pub cache: CachePolicy,
}

/// Creates, finds and releases zip archives
#[derive(Debug)]
pub struct ArtifactStore {
    dir: PathBuf,
    pools: DashMap<String, SuffixPool>,
    leases: DashMap<(SessionId, ButtonId), Artifact>,
}

impl ArtifactStore {
    /// Store writing into `dir` (created on first use)
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            pools: DashMap::new(),
            leases: DashMap::new(),
        }
    }

    /// Directory archives are written to
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write `files` into a fresh archive leased to `(session, button)`
    ///
    /// Any archive the pair already holds is released first.
    pub async fn create_zip(
        &self,
        session: &SessionId,
        button: ButtonId,
        class_name: &str,
        filename: &str,
        cache: CachePolicy,
        files: Vec<(String, Vec<u8>)>,
    ) -> Result<Artifact> {
        self.release(session, button).await?;

        tokio::fs::create_dir_all(&self.dir).await?;

        let stem = dom_class(class_name);
        let suffix = self.pools.entry(stem.clone()).or_default().allocate();
        let path = self.dir.join(format!("{}-{}.zip", stem, suffix));

        let target = path.clone();
        let written = spawn_blocking(move || write_zip(&target, files))
            .await
            .map_err(|e| Error::Other(format!("zip task panicked: {}", e)))
            .and_then(|result| result);

        if let Err(e) = written {
            self.release_suffix(class_name, suffix);
            let _ = tokio::fs::remove_file(&path).await;
            return Err(e);
        }

        let artifact = Artifact {
            path,
            filename: filename.to_string(),
            class_name: class_name.to_string(),
            suffix,
            cache,
        };
        debug!(
            button_id = %button,
            class = class_name,
            suffix,
            path = %artifact.path.display(),
            "zip artifact created"
        );

        self.leases
            .insert((session.clone(), button), artifact.clone());
        Ok(artifact)
    }

    /// Archive currently leased to `(session, button)`
    pub fn lookup(&self, session: &SessionId, button: ButtonId) -> Option<Artifact> {
        self.leases
            .get(&(session.clone(), button))
            .map(|artifact| artifact.value().clone())
    }

    /// Delete the archive leased to `(session, button)` and free its suffix
    ///
    /// Returns whether there was one.
    pub async fn release(&self, session: &SessionId, button: ButtonId) -> Result<bool> {
        let Some((_, artifact)) = self.leases.remove(&(session.clone(), button)) else {
            return Ok(false);
        };

        match tokio::fs::remove_file(&artifact.path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %artifact.path.display(), "zip artifact already gone");
            }
            Err(e) => {
                // Keep the suffix out of circulation; the file is still there
                return Err(e.into());
            }
        }

        self.release_suffix(&artifact.class_name, artifact.suffix);
        debug!(
            button_id = %button,
            class = %artifact.class_name,
            suffix = artifact.suffix,
            "zip artifact released"
        );
        Ok(true)
    }

    /// Number of live leases
    pub fn lease_count(&self) -> usize {
        self.leases.len()
    }

    fn release_suffix(&self, class_name: &str, suffix: u32) {
        if let Some(mut pool) = self.pools.get_mut(&dom_class(class_name)) {
            pool.release(suffix);
        }
    }
}

fn write_zip(path: &Path, files: Vec<(String, Vec<u8>)>) -> Result<()> {
    let file = std::fs::File::create(path)?;
    let mut zip = zip::ZipWriter::new(file);
    let options = zip::write::FileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated);

    for (name, contents) in files {
        zip.start_file(name, options)?;
        zip.write_all(&contents)?;
    }

    zip.finish()?;
    Ok(())
}
