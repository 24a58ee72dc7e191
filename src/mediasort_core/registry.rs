use crate::mediasort_core::error::Result;
use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Everything known about one perceptual hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryEntry {
    pub hash: String,
    /// Number of duplicate sightings after the first.
    pub count: u32,
    /// Base name of the first item seen with this hash.
    pub canonical_name: String,
}

/// How an item was classified against the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// First sighting of this hash.
    Original,
    /// A later sighting; carries the post-increment occurrence count.
    Duplicate(u32),
}

/// Run-wide record of every perceptual hash seen so far.
///
/// Entries are never removed. Insertion order is kept so the report lists
/// hashes in the order they were first met.
#[derive(Debug, Default)]
pub struct DuplicateRegistry {
    entries: Vec<RegistryEntry>,
    index: HashMap<String, usize>,
}

impl DuplicateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new hash or count another sighting of a known one.
    pub fn classify(&mut self, hash: &str, base_name: &str) -> Classification {
        match self.index.get(hash) {
            Some(&i) => {
                let entry = &mut self.entries[i];
                entry.count += 1;
                log::debug!(
                    "Hash {} seen again (copy {} of {})",
                    hash,
                    entry.count,
                    entry.canonical_name
                );
                Classification::Duplicate(entry.count)
            }
            None => {
                self.index.insert(hash.to_string(), self.entries.len());
                self.entries.push(RegistryEntry {
                    hash: hash.to_string(),
                    count: 0,
                    canonical_name: base_name.to_string(),
                });
                Classification::Original
            }
        }
    }

    pub fn get(&self, hash: &str) -> Option<&RegistryEntry> {
        self.index.get(hash).map(|&i| &self.entries[i])
    }

    pub fn entries(&self) -> &[RegistryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Append one `name : hash : count` line per hash to the report at `path`.
    pub fn write_report(&self, path: &Path) -> Result<()> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let mut out = BufWriter::new(file);
        for entry in &self.entries {
            writeln!(
                out,
                "{} : {} : {}",
                entry.canonical_name, entry.hash, entry.count
            )?;
        }
        out.flush()?;
        log::info!(
            "Wrote {} hash entries to {}",
            self.entries.len(),
            path.display()
        );
        Ok(())
    }
}
