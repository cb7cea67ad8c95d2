//! Binary snapshots of the request router and harbor registry.
//!
//! Snapshots use `bitcode` with a versioned header. Queue back-references
//! are not stored: restore re-links every request from the queue contents
//! and hands back a router only if the whole structure is consistent.

use crate::harbors::HarborRegistry;
use crate::id::{HarborId, QueueSetId, RequestId};
use crate::queue::{PriorityQueueSet, RequestArena};
use crate::request::RequestDefaults;
use crate::router::{InvariantViolation, RequestRouter};
use serde::{Deserialize, Serialize};
use slotmap::SlotMap;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Magic number identifying a logistics snapshot.
pub const SNAPSHOT_MAGIC: u32 = 0x5354_4B01;

/// Current format version. Increment when breaking the wire format.
pub const FORMAT_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum SerializeError {
    #[error("bitcode encoding failed: {0}")]
    Encode(String),
}

#[derive(Debug, thiserror::Error)]
pub enum DeserializeError {
    #[error("invalid magic number: expected 0x{:08X}, got 0x{:08X}", SNAPSHOT_MAGIC, .0)]
    InvalidMagic(u32),
    #[error("unsupported format version: expected {}, got {}", FORMAT_VERSION, .0)]
    UnsupportedVersion(u32),
    #[error("snapshot from future version {0} (this build supports up to {FORMAT_VERSION})")]
    FutureVersion(u32),
    #[error("bitcode decoding failed: {0}")]
    Decode(String),
    #[error("inconsistent queue state: {0}")]
    Inconsistent(#[from] InvariantViolation),
    #[error("harbor {harbor:?} stacks unknown request {request:?}")]
    MissingStackRequest { harbor: HarborId, request: RequestId },
}

// ---------------------------------------------------------------------------
// Snapshot header
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotHeader {
    pub magic: u32,
    pub version: u32,
    /// Game tick the snapshot was taken at.
    pub tick: u64,
}

impl SnapshotHeader {
    pub fn new(tick: u64) -> Self {
        Self {
            magic: SNAPSHOT_MAGIC,
            version: FORMAT_VERSION,
            tick,
        }
    }

    pub fn validate(&self) -> Result<(), DeserializeError> {
        if self.magic != SNAPSHOT_MAGIC {
            return Err(DeserializeError::InvalidMagic(self.magic));
        }
        if self.version > FORMAT_VERSION {
            return Err(DeserializeError::FutureVersion(self.version));
        }
        if self.version < FORMAT_VERSION {
            return Err(DeserializeError::UnsupportedVersion(self.version));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Snapshot payload
// ---------------------------------------------------------------------------

#[derive(Serialize, Deserialize)]
struct LogisticsSnapshot {
    header: SnapshotHeader,
    requests: RequestArena,
    sets: SlotMap<QueueSetId, PriorityQueueSet>,
    defaults: RequestDefaults,
    harbors: HarborRegistry,
}

/// State rebuilt from a snapshot.
#[derive(Debug)]
pub struct Restored {
    pub header: SnapshotHeader,
    pub router: RequestRouter,
    pub harbors: HarborRegistry,
}

/// Encode the router and harbors taken at `tick`.
pub fn serialize(router: &RequestRouter, harbors: &HarborRegistry, tick: u64) -> Result<Vec<u8>, SerializeError> {
    let snapshot = LogisticsSnapshot {
        header: SnapshotHeader::new(tick),
        requests: router.requests_raw().clone(),
        sets: router.sets_raw().clone(),
        defaults: *router.defaults(),
        harbors: harbors.clone(),
    };
    bitcode::serialize(&snapshot).map_err(|e| SerializeError::Encode(e.to_string()))
}

/// Decode a snapshot. Either everything is restored and linked, or an error
/// is returned and nothing is.
pub fn deserialize(data: &[u8]) -> Result<Restored, DeserializeError> {
    let snapshot: LogisticsSnapshot =
        bitcode::deserialize(data).map_err(|e| DeserializeError::Decode(e.to_string()))?;
    snapshot.header.validate()?;

    let router = RequestRouter::from_parts(snapshot.requests, snapshot.sets, snapshot.defaults)?;
    for (harbor, entry) in snapshot.harbors.iter() {
        if let Some(request) = entry.stack().iter().find(|&id| router.request(id).is_none()) {
            return Err(DeserializeError::MissingStackRequest { harbor, request });
        }
    }

    tracing::info!(
        tick = snapshot.header.tick,
        requests = router.request_count(),
        queue_sets = router.queue_sets().count(),
        harbors = snapshot.harbors.len(),
        "restored logistics snapshot"
    );
    Ok(Restored {
        header: snapshot.header,
        router,
        harbors: snapshot.harbors,
    })
}
