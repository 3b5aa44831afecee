//! Local state kept between runs
//!
//! Sequence counters per signing key and the tag index live as JSON files in
//! the data directory.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use relay_core::sequence::SequenceCounter;
use relay_crypto::PublicKey;
use relay_protocol::TagIndex;

const SEQUENCES_FILE: &str = "sequences.json";
const TAGS_FILE: &str = "tags.json";

/// Data directory holding counters and the tag index
pub struct Store {
    dir: PathBuf,
}

impl Store {
    pub fn open(dir: &Path) -> anyhow::Result<Self> {
        fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn read_json<T: serde::de::DeserializeOwned + Default>(&self, name: &str) -> anyhow::Result<T> {
        let path = self.dir.join(name);
        if !path.exists() {
            return Ok(T::default());
        }
        let content = fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
        serde_json::from_str(&content).with_context(|| format!("parsing {}", path.display()))
    }

    fn write_json<T: serde::Serialize>(&self, name: &str, value: &T) -> anyhow::Result<()> {
        let path = self.dir.join(name);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_string_pretty(value)?)
            .with_context(|| format!("writing {}", tmp.display()))?;
        fs::rename(&tmp, &path).with_context(|| format!("replacing {}", path.display()))?;
        Ok(())
    }

    /// Counter for `key`, starting at zero when unseen
    pub fn sequence(&self, key: &PublicKey) -> anyhow::Result<SequenceCounter> {
        let counters: BTreeMap<String, SequenceCounter> = self.read_json(SEQUENCES_FILE)?;
        Ok(counters.get(&key.to_hex()).copied().unwrap_or_default())
    }

    pub fn save_sequence(&self, key: &PublicKey, counter: SequenceCounter) -> anyhow::Result<()> {
        let mut counters: BTreeMap<String, SequenceCounter> = self.read_json(SEQUENCES_FILE)?;
        counters.insert(key.to_hex(), counter);
        self.write_json(SEQUENCES_FILE, &counters)
    }

    pub fn tags(&self) -> anyhow::Result<TagIndex> {
        self.read_json(TAGS_FILE)
    }

    pub fn save_tags(&self, index: &TagIndex) -> anyhow::Result<()> {
        self.write_json(TAGS_FILE, index)
    }
}
