//! Grammar cache and builder
//!
//! Compiled grammar artifacts are keyed by the contact-list fingerprint
//! and live in the app's private cache directory. At most one valid
//! artifact exists at a time; all `.g2g` files are purged before a new
//! one is built.

use crate::contacts::{ContactRecord, Fingerprint};
use crate::error::{DialError, DialResult};
use crate::normalize::scrub;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{debug, warn};

/// Prefix embedded in cached artifact filenames.
pub const APP_PREFIX: &str = "voxdial";

/// Suffix identifying grammar artifacts, compiled or not.
pub const ARTIFACT_SUFFIX: &str = ".g2g";

/// Path of the uncompiled template grammar, relative to the grammar dir.
pub const TEMPLATE_GRAMMAR: &str = "grammars/voxdial.g2g";

/// Upper bound on entries per slot-insertion batch.
pub const SLOT_BATCH_LIMIT: usize = 50;

/// One (scrubbed-name, payload) pair for the "Names" slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotEntry {
    pub word: String,
    /// The six contact ids, space-joined.
    pub payload: String,
}

/// Maps contact-list fingerprints to compiled grammar artifacts on disk.
pub struct GrammarCache {
    dir: PathBuf,
    prefix: String,
}

impl GrammarCache {
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.into(),
        }
    }

    /// Filename for a given fingerprint: `<prefix>.<hex>.g2g`. Lookup is
    /// a direct existence check, never a directory scan.
    pub fn artifact_path(&self, fp: Fingerprint) -> PathBuf {
        self.dir
            .join(format!("{}.{:x}{}", self.prefix, fp, ARTIFACT_SUFFIX))
    }

    pub fn lookup(&self, fp: Fingerprint) -> Option<PathBuf> {
        let path = self.artifact_path(fp);
        path.exists().then_some(path)
    }

    pub fn ensure_dir(&self) -> DialResult<()> {
        std::fs::create_dir_all(&self.dir).map_err(|e| {
            DialError::GrammarBuild(format!("cannot create {}: {e}", self.dir.display()))
        })
    }

    /// Delete every `.g2g` file in the cache directory. There should be
    /// at most one, but stale ones are removed too.
    pub fn purge(&self) {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) => {
                debug!("purge: cannot read {}: {e}", self.dir.display());
                return;
            }
        };

        for entry in entries.flatten() {
            let path = entry.path();
            let is_artifact = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with(ARTIFACT_SUFFIX));
            if is_artifact {
                debug!("purging stale artifact {}", path.display());
                if let Err(e) = std::fs::remove_file(&path) {
                    warn!("failed to delete {}: {e}", path.display());
                }
            }
        }
    }
}

/// Serves scrubbed, de-duplicated name entries in bounded batches.
pub struct GrammarBuilder {
    entries: Vec<SlotEntry>,
    cursor: usize,
}

impl GrammarBuilder {
    pub fn new(contacts: &[ContactRecord]) -> Self {
        // de-duplicate by scrubbed name; later records win
        let mut map = BTreeMap::new();
        for contact in contacts {
            let word = scrub(&contact.name);
            if word.is_empty() {
                debug!("skipping contact with unsayable name: {:?}", contact.name);
                continue;
            }
            let payload = format!(
                "{} {} {} {} {} {}",
                contact.person_id,
                contact.primary_id,
                contact.home_id,
                contact.mobile_id,
                contact.work_id,
                contact.other_id
            );
            map.insert(word, payload);
        }

        let entries = map
            .into_iter()
            .map(|(word, payload)| SlotEntry { word, payload })
            .collect();
        Self { entries, cursor: 0 }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Next batch of at most [`SLOT_BATCH_LIMIT`] entries, or `None`
    /// once exhausted.
    pub fn next_batch(&mut self) -> Option<Vec<SlotEntry>> {
        if self.cursor >= self.entries.len() {
            return None;
        }
        let end = (self.cursor + SLOT_BATCH_LIMIT).min(self.entries.len());
        let batch = self.entries[self.cursor..end].to_vec();
        self.cursor = end;
        Some(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contacts::{fingerprint, ID_UNDEFINED};

    fn record(name: &str) -> ContactRecord {
        ContactRecord::new(name, 1, 2, 3, 4, 5, 6)
    }

    #[test]
    fn test_artifact_path_format() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cache = GrammarCache::new(dir.path(), APP_PREFIX);
        let fp = fingerprint(&[record("jack")]);
        let path = cache.artifact_path(fp);
        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("voxdial."));
        assert!(name.ends_with(".g2g"));
        let hex = name
            .trim_start_matches("voxdial.")
            .trim_end_matches(".g2g");
        assert!(!hex.is_empty());
        assert!(hex.chars().all(|c| c.is_ascii_hexdigit() && !c.is_uppercase()));
    }

    #[test]
    fn test_lookup_and_purge() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cache = GrammarCache::new(dir.path(), APP_PREFIX);
        let fp = fingerprint(&[record("jack")]);

        assert!(cache.lookup(fp).is_none());
        std::fs::write(cache.artifact_path(fp), b"g2g").unwrap();
        assert!(cache.lookup(fp).is_some());

        // a stale artifact with a foreign prefix is purged too
        std::fs::write(dir.path().join("stale.deadbeef.g2g"), b"g2g").unwrap();
        std::fs::write(dir.path().join("unrelated.txt"), b"x").unwrap();

        cache.purge();
        assert!(cache.lookup(fp).is_none());
        assert!(!dir.path().join("stale.deadbeef.g2g").exists());
        assert!(dir.path().join("unrelated.txt").exists());
    }

    #[test]
    fn test_builder_payload_and_scrub() {
        let contacts = vec![ContactRecord::new("Jack & Jill", 10, 11, 12, 13, 14, 15)];
        let mut builder = GrammarBuilder::new(&contacts);
        let batch = builder.next_batch().expect("one batch");
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].word, "Jack  and  Jill");
        assert_eq!(batch[0].payload, "10 11 12 13 14 15");
        assert!(builder.next_batch().is_none());
    }

    #[test]
    fn test_builder_deduplicates_by_scrubbed_name() {
        let contacts = vec![
            ContactRecord::new("Jack (home)", 1, ID_UNDEFINED, 2, 3, 4, 5),
            ContactRecord::new("Jack (work)", 9, ID_UNDEFINED, 8, 7, 6, 5),
        ];
        let builder = GrammarBuilder::new(&contacts);
        assert_eq!(builder.len(), 1);
    }

    #[test]
    fn test_builder_batches_bounded() {
        let contacts: Vec<ContactRecord> = (0..120)
            .map(|i| ContactRecord::named(format!("contact number {i}"), i))
            .collect();
        let mut builder = GrammarBuilder::new(&contacts);
        assert_eq!(builder.len(), 120);

        let sizes: Vec<usize> = std::iter::from_fn(|| builder.next_batch())
            .map(|b| b.len())
            .collect();
        assert_eq!(sizes, vec![50, 50, 20]);
    }

    #[test]
    fn test_builder_skips_unsayable_names() {
        let contacts = vec![
            ContactRecord::named("()", 1),
            ContactRecord::named("jack", 2),
        ];
        let builder = GrammarBuilder::new(&contacts);
        assert_eq!(builder.len(), 1);
    }
}
