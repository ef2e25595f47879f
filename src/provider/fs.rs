// src/provider/fs.rs
// =============================================================================
// Filesystem provider: directories are containers, files are leaves.
//
// Canonicalization happens when children are listed (async, with
// tokio::fs::canonicalize), so canonical_key() itself is a plain string
// conversion. Symlinks therefore collapse onto their targets and a symlink
// pointing back up the tree cannot make the walk loop forever.
//
// A dangling symlink can't be canonicalized. We keep its raw path and let
// the later metadata call fail with NotFound, which the traversal records.
//
// A provider built with open() stays inside the root it was opened on: a
// symlink whose target lies outside that directory is skipped, so hits are
// never reported under paths the user didn't ask to search.
// =============================================================================

use super::Provider;
use crate::error::ProviderError;
use async_trait::async_trait;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

/// A path on the local filesystem
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FsNode(PathBuf);

impl FsNode {
    pub fn path(&self) -> &Path {
        &self.0
    }
}

impl fmt::Display for FsNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

#[derive(Debug, Clone, Default)]
pub struct FsProvider {
    // Canonical directory the walk may not leave, if any
    boundary: Option<PathBuf>,
}

impl FsProvider {
    /// A provider that follows symlinks wherever they lead
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves `path` and returns a provider confined to it, plus its node
    pub async fn open(path: impl AsRef<Path>) -> Result<(Self, FsNode), ProviderError> {
        let root = Self::new().root(path).await?;
        let provider = Self {
            boundary: Some(root.0.clone()),
        };
        Ok((provider, root))
    }

    /// Resolves the user-supplied root to an absolute, canonical node
    pub async fn root(&self, path: impl AsRef<Path>) -> Result<FsNode, ProviderError> {
        let path = path.as_ref();
        tokio::fs::canonicalize(path)
            .await
            .map(FsNode)
            .map_err(|e| map_io_error(path, e))
    }
}

#[async_trait]
impl Provider for FsProvider {
    type Node = FsNode;

    async fn is_container(&self, node: &FsNode) -> Result<bool, ProviderError> {
        // metadata() follows symlinks, so a link to a directory is a container
        let metadata = tokio::fs::metadata(node.path())
            .await
            .map_err(|e| map_io_error(node.path(), e))?;
        Ok(metadata.is_dir())
    }

    async fn list(&self, node: &FsNode) -> Result<Vec<FsNode>, ProviderError> {
        let mut entries = tokio::fs::read_dir(node.path())
            .await
            .map_err(|e| map_io_error(node.path(), e))?;

        let mut children = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| map_io_error(node.path(), e))?
        {
            let raw = entry.path();
            let resolved = match tokio::fs::canonicalize(&raw).await {
                Ok(path) => path,
                Err(_) => raw,
            };

            if let Some(boundary) = &self.boundary {
                if !resolved.starts_with(boundary) {
                    debug!(
                        link = %entry.path().display(),
                        target = %resolved.display(),
                        "skipping link that leaves the root"
                    );
                    continue;
                }
            }

            children.push(FsNode(resolved));
        }

        // read_dir order is platform dependent
        children.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(children)
    }

    async fn read(&self, node: &FsNode) -> Result<String, ProviderError> {
        let bytes = tokio::fs::read(node.path())
            .await
            .map_err(|e| map_io_error(node.path(), e))?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    fn canonical_key(&self, node: &FsNode) -> String {
        node.0.to_string_lossy().into_owned()
    }
}

fn map_io_error(path: &Path, error: io::Error) -> ProviderError {
    let message = format!("{}: {}", path.display(), error);
    match error.kind() {
        io::ErrorKind::NotFound => ProviderError::NotFound(message),
        io::ErrorKind::PermissionDenied => ProviderError::AccessDenied(message),
        _ => ProviderError::Transport(message),
    }
}
