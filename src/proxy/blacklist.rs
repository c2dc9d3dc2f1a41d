//! Persistent blacklist of proxies proven dead
//!
//! The store is append-only: once an identity lands here it is never
//! re-attempted until the file is reset externally. Lookups are in-memory,
//! additions are buffered and appended to the file on `flush`, so prior
//! entries survive a crash mid-run.

use crate::Result;
use anyhow::Context;
use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Append-only store of protocol-qualified proxy identities
/// (`protocol://host:port`), one per line.
#[derive(Debug)]
pub struct Blacklist {
    path: PathBuf,
    entries: HashSet<String>,
    pending: Vec<String>,
}

impl Blacklist {
    /// Load the full store into memory. A missing file is an empty store.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut entries = HashSet::new();

        match fs::read_to_string(&path) {
            Ok(content) => {
                for line in content.lines() {
                    let entry = line.trim();
                    if !entry.is_empty() {
                        entries.insert(entry.to_string());
                    }
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("blacklist file {:?} not found, starting empty", path);
            }
            Err(e) => {
                return Err(e).with_context(|| format!("failed to read blacklist {:?}", path))
            }
        }

        debug!("loaded {} blacklisted proxies", entries.len());
        Ok(Self {
            path,
            entries,
            pending: Vec::new(),
        })
    }

    pub fn contains(&self, identity: &str) -> bool {
        self.entries.contains(identity)
    }

    /// Buffer an identity for persistence. Adding an already-present
    /// identity is a no-op.
    pub fn add(&mut self, identity: &str) {
        if self.entries.insert(identity.to_string()) {
            self.pending.push(identity.to_string());
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Append all buffered additions to the store file. Returns how many
    /// entries were written. Previously persisted entries are never
    /// rewritten, so a failure here cannot corrupt them.
    pub fn flush(&mut self) -> Result<usize> {
        if self.pending.is_empty() {
            return Ok(0);
        }

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create {:?}", parent))?;
            }
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("failed to open blacklist {:?}", self.path))?;

        for entry in &self.pending {
            writeln!(file, "{}", entry)
                .with_context(|| format!("failed to append to blacklist {:?}", self.path))?;
        }

        let written = self.pending.len();
        self.pending.clear();
        debug!("appended {} new entries to blacklist", written);
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("price_sieve_{}_{}", std::process::id(), name))
    }

    #[test]
    fn test_missing_file_is_empty_store() {
        let path = temp_path("missing.txt");
        let _ = fs::remove_file(&path);
        let blacklist = Blacklist::load(&path).unwrap();
        assert!(blacklist.is_empty());
    }

    #[test]
    fn test_add_is_idempotent() {
        let path = temp_path("idempotent.txt");
        let _ = fs::remove_file(&path);
        let mut blacklist = Blacklist::load(&path).unwrap();

        blacklist.add("http://1.2.3.4:8080");
        blacklist.add("http://1.2.3.4:8080");

        assert_eq!(blacklist.len(), 1);
        assert_eq!(blacklist.flush().unwrap(), 1);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_flush_appends_and_reload_contains() {
        let path = temp_path("roundtrip.txt");
        let _ = fs::remove_file(&path);

        let mut blacklist = Blacklist::load(&path).unwrap();
        blacklist.add("socks5://5.6.7.8:1080");
        blacklist.flush().unwrap();

        // A second run must still see the entry and must not rewrite it
        let mut second = Blacklist::load(&path).unwrap();
        assert!(second.contains("socks5://5.6.7.8:1080"));
        second.add("http://9.9.9.9:3128");
        assert_eq!(second.flush().unwrap(), 1);

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 2);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_flush_without_pending_is_noop() {
        let path = temp_path("noop.txt");
        let _ = fs::remove_file(&path);
        let mut blacklist = Blacklist::load(&path).unwrap();
        assert_eq!(blacklist.flush().unwrap(), 0);
        assert!(!path.exists());
    }
}
