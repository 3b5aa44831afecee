//! Virtual ledger view
//!
//! The module's store is authoritative. The client rebuilds a read-only view
//! from a snapshot of the module account's state entries and addresses each
//! slot through its keylet.

use std::collections::{BTreeMap, HashMap};
use std::ops::RangeInclusive;

use relay_core::sequence::SequenceCounter;
use relay_core::{AccountId, Drops, Hash256, Tag};
use relay_crypto::PublicKey;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{ProtocolError, Result};
use crate::keylet::Slot;

/// One state entry as reported by the ledger
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateEntry {
    pub key: Hash256,
    #[serde(with = "hex::serde")]
    pub value: Vec<u8>,
}

/// State entries of one account, keyed by keylet
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StateSnapshot {
    entries: HashMap<Hash256, Vec<u8>>,
}

impl StateSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: Hash256, value: Vec<u8>) {
        self.entries.insert(key, value);
    }

    pub fn remove(&mut self, key: &Hash256) -> Option<Vec<u8>> {
        self.entries.remove(key)
    }

    pub fn get(&self, key: &Hash256) -> Option<&[u8]> {
        self.entries.get(key).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = StateEntry> + '_ {
        self.entries.iter().map(|(key, value)| StateEntry {
            key: *key,
            value: value.clone(),
        })
    }
}

impl FromIterator<StateEntry> for StateSnapshot {
    fn from_iter<I: IntoIterator<Item = StateEntry>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().map(|e| (e.key, e.value)).collect(),
        }
    }
}

/// One virtual actor as seen in module state
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorRecord {
    pub tag: Tag,
    pub public_key: PublicKey,
    /// Last accepted sequence, absent until the first accepted instruction
    pub sequence: Option<u32>,
    pub balance: Option<Drops>,
}

fn fixed<const N: usize>(slot: &Slot, bytes: &[u8]) -> Result<[u8; N]> {
    bytes.try_into().map_err(|_| ProtocolError::InvalidState {
        slot: format!("{:?}", slot),
        reason: format!("expected {} bytes, found {}", N, bytes.len()),
    })
}

/// Read-only view of one module account's virtual actors
#[derive(Clone, Debug)]
pub struct VirtualLedger {
    module: AccountId,
    snapshot: StateSnapshot,
}

impl VirtualLedger {
    pub fn new(module: AccountId, snapshot: StateSnapshot) -> Self {
        Self { module, snapshot }
    }

    pub fn module(&self) -> &AccountId {
        &self.module
    }

    pub fn snapshot(&self) -> &StateSnapshot {
        &self.snapshot
    }

    fn read(&self, slot: &Slot) -> Option<&[u8]> {
        self.snapshot.get(&slot.keylet(&self.module))
    }

    fn check_tag(tag: Tag) -> Result<()> {
        if tag == 0 {
            return Err(ProtocolError::InvalidTag(tag));
        }
        Ok(())
    }

    /// Last allocated tag; zero before the first allocation
    pub fn counter(&self) -> Result<Tag> {
        match self.read(&Slot::Counter) {
            Some(bytes) => Ok(u32::from_be_bytes(fixed(&Slot::Counter, bytes)?)),
            None => Ok(0),
        }
    }

    /// Tag the module will assign to the next new key.
    ///
    /// Only a prediction: the module increments the counter when it accepts the
    /// first deposit, and a concurrent deposit may claim the tag first.
    pub fn allocate_tag(&self) -> Result<Tag> {
        let counter = self.counter()?;
        let tag = counter
            .checked_add(1)
            .ok_or(ProtocolError::InvalidTag(counter))?;
        debug!(module = %self.module, tag, "predicted next tag");
        Ok(tag)
    }

    /// Balance held for a key, read directly without tag indirection
    pub fn lookup_balance(&self, public_key: &PublicKey) -> Result<Option<Drops>> {
        let slot = Slot::Balance(*public_key);
        match self.read(&slot) {
            Some(bytes) => Ok(Some(Drops(u64::from_be_bytes(fixed(&slot, bytes)?)))),
            None => Ok(None),
        }
    }

    /// Last sequence the module accepted for a tag
    pub fn lookup_sequence(&self, tag: Tag) -> Result<Option<u32>> {
        Self::check_tag(tag)?;
        let slot = Slot::Sequence(tag);
        match self.read(&slot) {
            Some(bytes) => Ok(Some(u32::from_be_bytes(fixed(&slot, bytes)?))),
            None => Ok(None),
        }
    }

    /// Key that owns a tag
    pub fn lookup_public_key(&self, tag: Tag) -> Result<Option<PublicKey>> {
        Self::check_tag(tag)?;
        let slot = Slot::PublicKey(tag);
        match self.read(&slot) {
            Some(bytes) => Ok(Some(PublicKey::from_raw(&fixed::<32>(&slot, bytes)?)?)),
            None => Ok(None),
        }
    }

    /// Full record for a tag, if the tag is allocated
    pub fn actor(&self, tag: Tag) -> Result<Option<ActorRecord>> {
        let Some(public_key) = self.lookup_public_key(tag)? else {
            return Ok(None);
        };
        Ok(Some(ActorRecord {
            tag,
            sequence: self.lookup_sequence(tag)?,
            balance: self.lookup_balance(&public_key)?,
            public_key,
        }))
    }

    /// Every allocated actor, bounded by the tag counter.
    ///
    /// Each allocated tag holds its own key slot, so a counter larger than the
    /// snapshot is capped at the number of entries.
    pub fn enumerate(&self) -> Result<Vec<ActorRecord>> {
        let counter = self.counter()?;
        let entries = Tag::try_from(self.snapshot.len()).unwrap_or(Tag::MAX);
        let last = counter.min(entries);
        if last < counter {
            warn!(module = %self.module, counter, entries, "tag counter exceeds module state, capping");
        }
        if last == 0 {
            return Ok(Vec::new());
        }
        self.scan(1..=last)
    }

    /// Check a range of candidate tags. Tags without a key slot are skipped.
    pub fn scan(&self, tags: RangeInclusive<Tag>) -> Result<Vec<ActorRecord>> {
        let mut actors = Vec::new();
        for tag in tags {
            if tag == 0 {
                continue;
            }
            if let Some(actor) = self.actor(tag)? {
                actors.push(actor);
            }
        }
        Ok(actors)
    }

    /// Reverse lookup of the tag owned by `public_key`
    pub fn tag_of(&self, public_key: &PublicKey) -> Result<Option<Tag>> {
        Ok(self
            .enumerate()?
            .into_iter()
            .find(|actor| actor.public_key == *public_key)
            .map(|actor| actor.tag))
    }

    /// Next sequence for a tag that the module will accept.
    ///
    /// Moves `counter` past the module's last accepted sequence, then claims a
    /// new value from it.
    pub fn next_sequence_for(&self, tag: Tag, counter: &mut SequenceCounter) -> Result<u32> {
        if let Some(last) = self.lookup_sequence(tag)? {
            counter.observe(last);
        }
        Ok(counter.next()?)
    }

    /// Last sequence a list module accepted
    pub fn lookup_list_sequence(&self) -> Result<Option<u32>> {
        match self.read(&Slot::ListSequence) {
            Some(bytes) => Ok(Some(u32::from_be_bytes(fixed(&Slot::ListSequence, bytes)?))),
            None => Ok(None),
        }
    }

    /// Next list update sequence the module will accept
    pub fn next_list_sequence(&self, counter: &mut SequenceCounter) -> Result<u32> {
        if let Some(last) = self.lookup_list_sequence()? {
            counter.observe(last);
        }
        Ok(counter.next()?)
    }

    /// Whether a list module holds `account`
    pub fn is_listed(&self, account: &AccountId) -> bool {
        self.read(&Slot::Listed(*account)).is_some()
    }
}

/// Client-side record of tags seen allocated.
///
/// Module state has no enumeration primitive; this index is what a client
/// persists so it does not have to scan tag ranges.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagIndex {
    tags: BTreeMap<Tag, PublicKey>,
}

impl TagIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember that `tag` belongs to `public_key`
    pub fn record(&mut self, tag: Tag, public_key: PublicKey) {
        self.tags.insert(tag, public_key);
    }

    pub fn get(&self, tag: Tag) -> Option<&PublicKey> {
        self.tags.get(&tag)
    }

    pub fn tag_of(&self, public_key: &PublicKey) -> Option<Tag> {
        self.tags
            .iter()
            .find(|(_, key)| *key == public_key)
            .map(|(tag, _)| *tag)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Tag, &PublicKey)> {
        self.tags.iter().map(|(tag, key)| (*tag, key))
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    /// Fold in every actor the view knows about; returns how many were new
    pub fn refresh(&mut self, ledger: &VirtualLedger) -> Result<usize> {
        let before = self.tags.len();
        for actor in ledger.enumerate()? {
            self.tags.insert(actor.tag, actor.public_key);
        }
        Ok(self.tags.len() - before)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_crypto::KeyPair;

    fn module() -> AccountId {
        AccountId::new([0x77; 20])
    }

    fn put(snapshot: &mut StateSnapshot, slot: Slot, value: Vec<u8>) {
        snapshot.insert(slot.keylet(&module()), value);
    }

    fn ledger_with_actors(keys: &[PublicKey]) -> VirtualLedger {
        let mut snapshot = StateSnapshot::new();
        put(&mut snapshot, Slot::Counter, (keys.len() as u32).to_be_bytes().to_vec());
        for (i, key) in keys.iter().enumerate() {
            let tag = i as u32 + 1;
            put(&mut snapshot, Slot::PublicKey(tag), key.raw().to_vec());
            put(&mut snapshot, Slot::Balance(*key), (tag as u64 * 1000).to_be_bytes().to_vec());
        }
        VirtualLedger::new(module(), snapshot)
    }

    #[test]
    fn test_allocate_from_counter_five() {
        let mut snapshot = StateSnapshot::new();
        put(&mut snapshot, Slot::Counter, 5u32.to_be_bytes().to_vec());
        let ledger = VirtualLedger::new(module(), snapshot);
        assert_eq!(ledger.allocate_tag().unwrap(), 6);
    }

    #[test]
    fn test_allocate_on_empty_state() {
        let ledger = VirtualLedger::new(module(), StateSnapshot::new());
        assert_eq!(ledger.counter().unwrap(), 0);
        assert_eq!(ledger.allocate_tag().unwrap(), 1);
        assert!(ledger.enumerate().unwrap().is_empty());
    }

    #[test]
    fn test_lookups() {
        let keys: Vec<PublicKey> = (0..3).map(|_| *KeyPair::generate().public_key()).collect();
        let ledger = ledger_with_actors(&keys);

        assert_eq!(ledger.lookup_public_key(2).unwrap(), Some(keys[1]));
        assert_eq!(ledger.lookup_balance(&keys[2]).unwrap(), Some(Drops(3000)));
        assert_eq!(ledger.lookup_sequence(1).unwrap(), None);
        assert_eq!(ledger.lookup_public_key(4).unwrap(), None);
        assert_eq!(ledger.tag_of(&keys[0]).unwrap(), Some(1));
        assert_eq!(ledger.lookup_sequence(0), Err(ProtocolError::InvalidTag(0)));
    }

    #[test]
    fn test_enumerate_and_scan() {
        let keys: Vec<PublicKey> = (0..4).map(|_| *KeyPair::generate().public_key()).collect();
        let ledger = ledger_with_actors(&keys);

        let all = ledger.enumerate().unwrap();
        assert_eq!(all.len(), 4);
        assert_eq!(all[3].tag, 4);

        let some = ledger.scan(0..=2).unwrap();
        assert_eq!(some.iter().map(|a| a.tag).collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn test_malformed_slot() {
        let mut snapshot = StateSnapshot::new();
        put(&mut snapshot, Slot::Counter, vec![1, 2]);
        let ledger = VirtualLedger::new(module(), snapshot);
        assert!(matches!(ledger.counter(), Err(ProtocolError::InvalidState { .. })));
    }

    #[test]
    fn test_next_sequence_passes_module_state() {
        let key = *KeyPair::generate().public_key();
        let mut snapshot = StateSnapshot::new();
        put(&mut snapshot, Slot::Counter, 1u32.to_be_bytes().to_vec());
        put(&mut snapshot, Slot::PublicKey(1), key.raw().to_vec());
        put(&mut snapshot, Slot::Sequence(1), 500u32.to_be_bytes().to_vec());
        let ledger = VirtualLedger::new(module(), snapshot);

        let mut counter = SequenceCounter::new(10);
        assert_eq!(ledger.next_sequence_for(1, &mut counter).unwrap(), 501);
        assert_eq!(ledger.next_sequence_for(1, &mut counter).unwrap(), 502);
    }

    #[test]
    fn test_corrupt_counter_is_capped() {
        let keys: Vec<PublicKey> = (0..2).map(|_| *KeyPair::generate().public_key()).collect();
        let mut ledger = ledger_with_actors(&keys);
        ledger
            .snapshot
            .insert(Slot::Counter.keylet(&module()), u32::MAX.to_be_bytes().to_vec());

        let all = ledger.enumerate().unwrap();
        assert_eq!(all.iter().map(|a| a.tag).collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(ledger.tag_of(&keys[1]).unwrap(), Some(2));
    }

    #[test]
    fn test_next_list_sequence() {
        let listed = AccountId::new([3; 20]);
        let mut snapshot = StateSnapshot::new();
        put(&mut snapshot, Slot::ListSequence, 1_700_000_000u32.to_be_bytes().to_vec());
        put(&mut snapshot, Slot::Listed(listed), vec![1]);
        let ledger = VirtualLedger::new(module(), snapshot);

        assert_eq!(ledger.lookup_list_sequence().unwrap(), Some(1_700_000_000));
        let mut counter = SequenceCounter::default();
        assert_eq!(ledger.next_list_sequence(&mut counter).unwrap(), 1_700_000_001);
        assert!(ledger.is_listed(&listed));
        assert!(!ledger.is_listed(&AccountId::new([4; 20])));

        let empty = VirtualLedger::new(module(), StateSnapshot::new());
        assert_eq!(empty.lookup_list_sequence().unwrap(), None);
        assert_eq!(empty.next_list_sequence(&mut SequenceCounter::default()).unwrap(), 1);
    }

    #[test]
    fn test_tag_index() {
        let keys: Vec<PublicKey> = (0..2).map(|_| *KeyPair::generate().public_key()).collect();
        let ledger = ledger_with_actors(&keys);

        let mut index = TagIndex::new();
        assert_eq!(index.refresh(&ledger).unwrap(), 2);
        assert_eq!(index.refresh(&ledger).unwrap(), 0);
        assert_eq!(index.tag_of(&keys[1]), Some(2));

        let json = serde_json::to_string(&index).unwrap();
        let back: TagIndex = serde_json::from_str(&json).unwrap();
        assert_eq!(back, index);
    }
}
