// src/provider/memory.rs
// =============================================================================
// In-memory graph used by the traversal tests.
//
// Nodes are plain strings. Directories may point anywhere (including back
// at their ancestors), files carry content, and any node can be made to fail
// or to take a while. Every provider call is counted so tests can check how
// often a node was actually touched.
// =============================================================================

use super::Provider;
use crate::error::ProviderError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone)]
enum Entry {
    Dir(Vec<String>),
    File(String),
    Broken(ProviderError),
}

#[derive(Debug, Default)]
pub struct MemoryProvider {
    entries: HashMap<String, Entry>,
    delays: HashMap<String, Duration>,
    touched: Mutex<HashMap<String, usize>>,
}

impl MemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dir(mut self, name: &str, children: &[&str]) -> Self {
        let children = children.iter().map(|c| c.to_string()).collect();
        self.entries.insert(name.to_string(), Entry::Dir(children));
        self
    }

    pub fn file(mut self, name: &str, content: &str) -> Self {
        self.entries
            .insert(name.to_string(), Entry::File(content.to_string()));
        self
    }

    pub fn broken(mut self, name: &str, error: ProviderError) -> Self {
        self.entries.insert(name.to_string(), Entry::Broken(error));
        self
    }

    /// Every call for `name` sleeps this long first
    pub fn slow(mut self, name: &str, delay: Duration) -> Self {
        self.delays.insert(name.to_string(), delay);
        self
    }

    /// How many times the traversal classified `name`
    pub fn touched(&self, name: &str) -> usize {
        self.touched
            .lock()
            .unwrap()
            .get(name)
            .copied()
            .unwrap_or(0)
    }

    async fn lookup(&self, name: &str) -> Result<Entry, ProviderError> {
        if let Some(delay) = self.delays.get(name) {
            tokio::time::sleep(*delay).await;
        }
        match self.entries.get(name) {
            Some(Entry::Broken(error)) => Err(error.clone()),
            Some(entry) => Ok(entry.clone()),
            // Listed by a parent but gone by the time we look
            None => Err(ProviderError::NotFound(name.to_string())),
        }
    }
}

#[async_trait]
impl Provider for MemoryProvider {
    type Node = String;

    async fn is_container(&self, node: &String) -> Result<bool, ProviderError> {
        *self.touched.lock().unwrap().entry(node.clone()).or_default() += 1;
        Ok(matches!(self.lookup(node).await?, Entry::Dir(_)))
    }

    async fn list(&self, node: &String) -> Result<Vec<String>, ProviderError> {
        match self.lookup(node).await? {
            Entry::Dir(children) => Ok(children),
            _ => Ok(Vec::new()),
        }
    }

    async fn read(&self, node: &String) -> Result<String, ProviderError> {
        match self.lookup(node).await? {
            Entry::File(content) => Ok(content),
            _ => Ok(String::new()),
        }
    }

    fn canonical_key(&self, node: &String) -> String {
        node.trim_end_matches('/').to_string()
    }
}
