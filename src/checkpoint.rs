//! Durable pagination progress: which page we last finished for each topic,
//! plus a running total of collected posts.
//!
//! On-disk layout (little-endian):
//! `[u64 total][topic bytes][0x0A][i32 page]` with the topic/page records
//! repeated until EOF. Topic names must not contain a newline byte.

use std::fs;
use std::path::Path;

use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checkpoint {
    pub topic: String,
    /// Last successfully completed page, 0 before the first fetch.
    pub page: i32,
}

/// Full resumable state of a harvest. Checkpoints keep insertion order so a
/// save is deterministic.
#[derive(Debug, Default)]
pub struct ProgressStore {
    total_collected: u64,
    checkpoints: Vec<Checkpoint>,
}

impl ProgressStore {
    /// Loads the store from `path`. A missing file yields an empty store and
    /// touches the path so a later save always has a target; a zero-length
    /// file (touched but never saved) is also an empty store. Anything else
    /// must parse completely or the whole load fails.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            fs::File::create(path)?;
            return Ok(Self::default());
        }

        let bytes = fs::read(path)?;
        if bytes.is_empty() {
            return Ok(Self::default());
        }
        Self::parse(&bytes)
    }

    fn parse(bytes: &[u8]) -> Result<Self> {
        let header = bytes
            .get(..8)
            .ok_or_else(|| corrupt("missing total_collected header"))?;
        let total_collected = u64::from_le_bytes(header.try_into().unwrap());

        let mut checkpoints = Vec::new();
        let mut rest = &bytes[8..];
        while !rest.is_empty() {
            let nl = rest
                .iter()
                .position(|&b| b == b'\n')
                .ok_or_else(|| corrupt("unterminated topic name"))?;
            let topic = std::str::from_utf8(&rest[..nl])
                .map_err(|_| corrupt("topic name is not valid UTF-8"))?
                .to_owned();

            let page_bytes = rest
                .get(nl + 1..nl + 5)
                .ok_or_else(|| corrupt(&format!("truncated page for topic {topic:?}")))?;
            let page = i32::from_le_bytes(page_bytes.try_into().unwrap());
            if page < 0 {
                return Err(corrupt(&format!("negative page for topic {topic:?}")));
            }

            checkpoints.push(Checkpoint { topic, page });
            rest = &rest[nl + 5..];
        }

        Ok(Self {
            total_collected,
            checkpoints,
        })
    }

    /// Serializes the full state and overwrites `path` in a single write.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut buf = Vec::with_capacity(8 + self.checkpoints.len() * 32);
        buf.extend_from_slice(&self.total_collected.to_le_bytes());
        for ckpt in &self.checkpoints {
            if ckpt.topic.contains('\n') {
                return Err(corrupt(&format!(
                    "topic {:?} contains a newline and can't be serialized",
                    ckpt.topic
                )));
            }
            buf.extend_from_slice(ckpt.topic.as_bytes());
            buf.push(b'\n');
            buf.extend_from_slice(&ckpt.page.to_le_bytes());
        }
        fs::write(path, buf)?;
        Ok(())
    }

    /// Returns the checkpoint for `topic`, registering a fresh one at page 0
    /// if the topic hasn't been seen before. The only way the set grows.
    pub fn checkpoint(&mut self, topic: &str) -> &mut Checkpoint {
        let idx = match self.checkpoints.iter().position(|c| c.topic == topic) {
            Some(idx) => idx,
            None => {
                self.checkpoints.push(Checkpoint {
                    topic: topic.to_owned(),
                    page: 0,
                });
                self.checkpoints.len() - 1
            }
        };
        &mut self.checkpoints[idx]
    }

    pub fn add_collected(&mut self, n: u64) {
        self.total_collected += n;
    }

    pub fn total_collected(&self) -> u64 {
        self.total_collected
    }

    pub fn checkpoints(&self) -> impl Iterator<Item = &Checkpoint> {
        self.checkpoints.iter()
    }

    pub fn len(&self) -> usize {
        self.checkpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checkpoints.is_empty()
    }
}

fn corrupt(msg: &str) -> Error {
    Error::CorruptCheckpoint(msg.to_owned())
}
