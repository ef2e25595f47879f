// src/provider/mod.rs
// =============================================================================
// Capability providers: the backends a traversal walks over.
//
// The traversal never touches the filesystem or the network itself. It only
// asks a Provider four questions about a node:
// - is_container: does this node have children?
// - list:         what are its children?
// - read:         what is its content?
// - canonical_key: which string identifies it (used to skip duplicates)
//
// Providers whose nodes sit at a distance from the root (a crawl depth) also
// report it, so a node first reached by a long path is revisited when a
// shorter one turns up.
//
// Submodules:
// - fs:       directory trees via tokio::fs
// - web:      same-site crawling via reqwest
// - links:    link extraction from HTML and markdown (used by web)
// - memory:   an in-memory graph for tests
// =============================================================================

mod fs;
mod links;
#[cfg(test)]
pub mod memory;
mod web;

use crate::error::ProviderError;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

pub use fs::{FsNode, FsProvider};
pub use web::{WebNode, WebProvider};

/// A backend that exposes a graph of nodes
#[async_trait]
pub trait Provider: Send + Sync + 'static {
    /// The vertex type (a path, a URL, ...)
    type Node: Clone + Send + Sync + fmt::Display + 'static;

    /// Containers get listed, leaves get read
    async fn is_container(&self, node: &Self::Node) -> Result<bool, ProviderError>;

    /// Children of a container node
    async fn list(&self, node: &Self::Node) -> Result<Vec<Self::Node>, ProviderError>;

    /// Content of a leaf node
    async fn read(&self, node: &Self::Node) -> Result<String, ProviderError>;

    /// Stable, unique identity of the logical entity behind `node`
    ///
    /// Must not do I/O: it is called while deciding whether to schedule.
    fn canonical_key(&self, node: &Self::Node) -> String;

    /// Distance of `node` from the root, when it limits what lies below it
    ///
    /// A node already visited is visited again only when it is reached at a
    /// strictly smaller distance. `None` means plain once-only dedup.
    fn distance(&self, _node: &Self::Node) -> Option<usize> {
        None
    }
}

// Lets callers keep a handle on the provider (for counters, caches) while a
// traversal owns it
#[async_trait]
impl<P: Provider> Provider for Arc<P> {
    type Node = P::Node;

    async fn is_container(&self, node: &Self::Node) -> Result<bool, ProviderError> {
        (**self).is_container(node).await
    }

    async fn list(&self, node: &Self::Node) -> Result<Vec<Self::Node>, ProviderError> {
        (**self).list(node).await
    }

    async fn read(&self, node: &Self::Node) -> Result<String, ProviderError> {
        (**self).read(node).await
    }

    fn canonical_key(&self, node: &Self::Node) -> String {
        (**self).canonical_key(node)
    }

    fn distance(&self, node: &Self::Node) -> Option<usize> {
        (**self).distance(node)
    }
}
