//! pad-crdt: Conflict-free replicated text for collaborative pad editing.
//!
//! This crate provides the replicated text data type behind a collaborative
//! editor: multiple participants edit the same text without a central lock
//! and converge to an identical document regardless of message arrival
//! order. It includes:
//!
//! - **Core data model** - Identified, causally-anchored characters in an
//!   ordered sequence with immutable sentinels and tombstoned deletes
//! - **Integration algorithm** - Deterministic placement of concurrent
//!   inserts with a canonical id tie-break
//! - **Identity & clock** - Per-replica site id and logical clock for
//!   globally unique character ids
//! - **Session & sync protocol** - The message envelope and the join-time
//!   snapshot handshake that bootstraps a new replica
//!
//! # Quick Start
//!
//! ```rust
//! use pad_crdt::{Session, SessionEvent};
//!
//! // Two replicas with coordinator-assigned site ids.
//! let mut alice = Session::with_site(1);
//! let mut bob = Session::with_site(2);
//!
//! // A local edit yields an outbound message for the transport.
//! let msg = alice.local_insert(0, "a").unwrap();
//!
//! // Applying it remotely converges both replicas.
//! let reply = bob.handle_message(msg).unwrap();
//! assert_eq!(reply.event, Some(SessionEvent::ContentChanged));
//! assert_eq!(alice.content(), bob.content());
//! ```

// Core replicated-text data type
pub mod core;

// Session layer and synchronization protocol
pub mod sync;

// Re-export core types
pub use core::{CharId, Character, DocError, Document, Identity, OpId, SiteId};

// Re-export sync types
pub use sync::{
    ClientId, Message, Operation, Presence, Reply, Session, SessionEvent, SyncError, SyncLimits,
    SyncState,
};
