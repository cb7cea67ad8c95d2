//! Stockyard Core -- material request scheduling for settlement games.
//!
//! Consumers (construction sites, workshops, harbors) post requests for
//! units of a material. Requests wait in priority queue sets, one per
//! material per spatial partition, and carriers ask the queues which
//! request to serve next. Harbors additionally keep a local stack of
//! trade orders that ships load from directly.
//!
//! # Selection
//!
//! A queue set holds three tiers. `High` is served to exhaustion before
//! `Low`, and `Stopped` is never served. Within a tier the scan walks at most
//! the tier's length: finished requests are dropped, saturated ones rotate to
//! the back, and the first servable one is returned. A round-robin request
//! also rotates to the back when it is returned, so siblings take turns.
//!
//! ```rust,ignore
//! let mut router = RequestRouter::new();
//! let set = router.create_queue_set();
//! let id = router.register(set, MaterialRequest::new(pos, plank, 5))?;
//! if let Some(next) = router.select_best(set)? {
//!     router.dispatch(next)?;
//! }
//! ```
//!
//! # Key Types
//!
//! - [`router::RequestRouter`] -- Owns every request and queue set; all
//!   mutation and migration goes through it.
//! - [`queue::PriorityQueueSet`] -- Tiered queues of request handles.
//! - [`request::MaterialRequest`] -- Outstanding need and in-flight counters.
//! - [`shared::SharedRouter`] -- Lock-guarded router for display readers.
//! - [`harbor::Harbor`] -- A [`harbor::MaterialSource`] that ships load from.
//! - [`harbors::HarborRegistry`] -- Live harbors of one world.
//! - [`registry::MaterialRegistry`] -- Immutable material and building table.
//! - [`ordering::MaterialPriorities`] -- Per-partition distribution order.
//! - [`serialize`] -- Versioned snapshots via bitcode.

pub mod harbor;
pub mod harbors;
pub mod id;
pub mod ordering;
pub mod position;
pub mod priority;
pub mod query;
pub mod queue;
pub mod registry;
pub mod request;
pub mod router;
pub mod serialize;
pub mod shared;
pub mod stack;
pub mod waypoint;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
