//! Contact records and the collaborators that supply them
//!
//! A [`ContactRecord`] names a person and up to six phone-table ids. The
//! engine fetches records once per session through a [`ContactSource`] and
//! fingerprints the list to validate the grammar cache.

use crate::error::{DialError, DialResult};
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use tracing::debug;

/// Row id in the person or phone table.
pub type PhoneId = i64;

/// Corresponding row doesn't exist.
pub const ID_UNDEFINED: PhoneId = -1;

/// A person who may be called, with their typed phone-table ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactRecord {
    pub name: String,
    pub person_id: PhoneId,
    pub primary_id: PhoneId,
    pub home_id: PhoneId,
    pub mobile_id: PhoneId,
    pub work_id: PhoneId,
    pub other_id: PhoneId,
}

impl ContactRecord {
    pub fn new(
        name: impl Into<String>,
        person_id: PhoneId,
        primary_id: PhoneId,
        home_id: PhoneId,
        mobile_id: PhoneId,
        work_id: PhoneId,
        other_id: PhoneId,
    ) -> Self {
        Self {
            name: name.into(),
            person_id,
            primary_id,
            home_id,
            mobile_id,
            work_id,
            other_id,
        }
    }

    /// A record with only a name and a synthetic person id, as produced
    /// by the file-backed source.
    pub fn named(name: impl Into<String>, person_id: PhoneId) -> Self {
        Self::new(
            name,
            person_id,
            ID_UNDEFINED,
            ID_UNDEFINED,
            ID_UNDEFINED,
            ID_UNDEFINED,
            ID_UNDEFINED,
        )
    }
}

impl fmt::Display for ContactRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "name={} person={} primary={} home={} mobile={} work={} other={}",
            self.name,
            self.person_id,
            self.primary_id,
            self.home_id,
            self.mobile_id,
            self.work_id,
            self.other_id
        )
    }
}

/// Supplies the ordered contact list for a session.
pub trait ContactSource: Send {
    fn contacts(&self) -> DialResult<Vec<ContactRecord>>;
}

/// Call-log collaborator used by the redial command.
pub trait CallLog: Send {
    /// The most recent outgoing number, if any call was ever placed.
    fn last_outgoing(&self) -> Option<String>;
}

/// A [`CallLog`] with no history.
pub struct NoCallLog;

impl CallLog for NoCallLog {
    fn last_outgoing(&self) -> Option<String> {
        None
    }
}

/// Line-oriented contact file: one display name per line, synthetic
/// sequential person ids, all phone ids undefined.
pub struct FileContactSource {
    path: PathBuf,
}

impl FileContactSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ContactSource for FileContactSource {
    fn contacts(&self) -> DialResult<Vec<ContactRecord>> {
        let file = File::open(&self.path).map_err(|e| {
            DialError::Contacts(format!("cannot open {}: {e}", self.path.display()))
        })?;

        let mut contacts = Vec::new();
        for (index, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|e| {
                DialError::Contacts(format!("cannot read {}: {e}", self.path.display()))
            })?;
            let name = line.trim();
            if name.is_empty() {
                continue;
            }
            contacts.push(ContactRecord::named(name, index as PhoneId + 1));
        }

        debug!("loaded {} contacts from {}", contacts.len(), self.path.display());
        Ok(contacts)
    }
}

/// A fixed in-memory contact list.
pub struct StaticContactSource {
    contacts: Vec<ContactRecord>,
}

impl StaticContactSource {
    pub fn new(contacts: Vec<ContactRecord>) -> Self {
        Self { contacts }
    }
}

impl ContactSource for StaticContactSource {
    fn contacts(&self) -> DialResult<Vec<ContactRecord>> {
        Ok(self.contacts.clone())
    }
}

/// Hash summarizing a full contact list, used to validate grammar-cache
/// freshness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint(u32);

impl fmt::LowerHex for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::LowerHex::fmt(&self.0, f)
    }
}

const LARGE_PRIME: i32 = 1610612741;

/// Fingerprint the ordered contact list.
///
/// Per-record hashes combine the six ids with a fixed large prime and the
/// name's UTF-16 hash, then fold in sequence order. The result is
/// order-dependent; the upstream sources are deterministically ordered
/// (the live store sorts by name, the file source preserves line order),
/// so equal contact data yields equal fingerprints within a session.
pub fn fingerprint(contacts: &[ContactRecord]) -> Fingerprint {
    let mut hash = 1i32;
    for contact in contacts {
        hash = hash.wrapping_mul(31).wrapping_add(record_hash(contact));
    }
    Fingerprint(hash as u32)
}

fn record_hash(contact: &ContactRecord) -> i32 {
    let ids = [
        contact.person_id,
        contact.primary_id,
        contact.home_id,
        contact.mobile_id,
        contact.work_id,
        contact.other_id,
    ];
    let mut hash = 0i32;
    for id in ids {
        hash = LARGE_PRIME.wrapping_mul(hash.wrapping_add(id as i32));
    }
    hash.wrapping_add(name_hash(&contact.name))
}

fn name_hash(name: &str) -> i32 {
    name.encode_utf16()
        .fold(0i32, |h, unit| h.wrapping_mul(31).wrapping_add(unit as i32))
}
