//! Session layer and synchronization protocol.
//!
//! A [`Session`] binds one replica's [`Document`] to its [`Identity`] and
//! sync state, and speaks the message envelope that the transport carries
//! between replicas:
//!
//! - `operation` - a single remotely generated insert or delete
//! - `docReq` / `docSync` - the join-time snapshot handshake
//! - `SiteID` - the coordinator's one-time site assignment
//! - `join` / `users` - presence metadata, passed through to the
//!   presentation layer untouched
//!
//! All mutation is processed strictly sequentially from one inbound message
//! stream; concurrency exists only across replicas.

use crate::core::{Character, DocError, Document, Identity, SiteId};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use unicode_segmentation::UnicodeSegmentation;
use uuid::Uuid;

pub type ClientId = Uuid;

/// A single replicated edit, carrying the generated character so every
/// replica can run the same integration algorithm on receipt. The position
/// is the visible cursor position at the generating replica; it rides along
/// for presentation-layer hints and is not consulted during integration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "opType", rename_all = "lowercase")]
pub enum Operation {
    Insert { position: usize, character: Character },
    Delete { position: usize, character: Character },
}

/// Wire envelope exchanged between replicas. The tag strings match the
/// original pad protocol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Message {
    #[serde(rename = "operation")]
    Operation { operation: Operation },
    #[serde(rename = "docReq")]
    DocReq { requester: ClientId },
    #[serde(rename = "docSync")]
    DocSync {
        recipient: ClientId,
        document: Vec<Character>,
    },
    #[serde(rename = "SiteID")]
    SiteId { value: SiteId },
    #[serde(rename = "join")]
    Join { username: String },
    #[serde(rename = "users")]
    Users { usernames: String },
}

impl Message {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Unsynced,
    Synced,
}

/// Resource limits applied to inbound messages before they touch the
/// document.
#[derive(Debug, Clone)]
pub struct SyncLimits {
    pub max_snapshot_chars: usize,
    pub max_value_bytes: usize,
}

impl Default for SyncLimits {
    fn default() -> Self {
        Self {
            max_snapshot_chars: 1_000_000,
            max_value_bytes: 64,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyncError {
    #[error("malformed message: {reason}")]
    MalformedMessage { reason: String },
    #[error("snapshot too large: {actual} characters (limit {limit})")]
    SnapshotTooLarge { limit: usize, actual: usize },
    #[error(transparent)]
    Doc(#[from] DocError),
}

/// What a handled message means for the layers above the core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The visible text changed; re-read [`Session::content`].
    ContentChanged,
    /// The join handshake completed and the document was replaced wholesale.
    Synced,
    /// Presence metadata for the presentation layer.
    Presence(Presence),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Presence {
    Joined { username: String },
    ActiveUsers { usernames: Vec<String> },
}

/// Outcome of handling one inbound message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reply {
    pub outbound: Vec<Message>,
    pub event: Option<SessionEvent>,
}

impl Reply {
    fn none() -> Self {
        Self::default()
    }

    fn send(message: Message) -> Self {
        Self {
            outbound: vec![message],
            event: None,
        }
    }

    fn event(event: SessionEvent) -> Self {
        Self {
            outbound: Vec::new(),
            event: Some(event),
        }
    }
}

fn validate_operation(operation: &Operation, limits: &SyncLimits) -> Result<(), SyncError> {
    let character = match operation {
        Operation::Insert { character, .. } | Operation::Delete { character, .. } => character,
    };
    if character.id.is_sentinel() {
        return Err(SyncError::MalformedMessage {
            reason: "sentinel character id".to_owned(),
        });
    }
    if let Operation::Insert { character, .. } = operation {
        if character.value.is_empty() {
            return Err(SyncError::MalformedMessage {
                reason: "empty character value".to_owned(),
            });
        }
        if character.value.len() > limits.max_value_bytes {
            return Err(SyncError::MalformedMessage {
                reason: format!(
                    "character value exceeds {} bytes",
                    limits.max_value_bytes
                ),
            });
        }
    }
    Ok(())
}

/// One replica's editing session.
///
/// Starts `Unsynced` with an empty document; the first snapshot response
/// addressed to this session replaces the document wholesale and moves the
/// session to `Synced`, which is terminal. Local edits are permitted in
/// either state.
#[derive(Debug, Clone)]
pub struct Session {
    client_id: ClientId,
    doc: Document,
    identity: Identity,
    state: SyncState,
    limits: SyncLimits,
}

impl Session {
    pub fn new() -> Self {
        Self {
            client_id: Uuid::new_v4(),
            doc: Document::new(),
            identity: Identity::unassigned(),
            state: SyncState::Unsynced,
            limits: SyncLimits::default(),
        }
    }

    /// Session with a pre-assigned site id, for replicas admitted out of
    /// band (and for tests simulating several replicas in one process).
    pub fn with_site(site: SiteId) -> Self {
        Self {
            identity: Identity::new(site),
            ..Self::new()
        }
    }

    pub fn with_limits(mut self, limits: SyncLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn client_id(&self) -> ClientId {
        self.client_id
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    pub fn site(&self) -> SiteId {
        self.identity.site()
    }

    pub fn document(&self) -> &Document {
        &self.doc
    }

    /// Current visible text.
    pub fn content(&self) -> String {
        self.doc.content()
    }

    /// Full document snapshot, tombstones and sentinels included.
    pub fn snapshot(&self) -> Vec<Character> {
        self.doc.snapshot()
    }

    /// Replaces the document with a snapshot and marks the session synced.
    /// Replay is all-or-nothing: on error the current document is kept.
    pub fn load_snapshot(&mut self, characters: Vec<Character>) -> Result<(), SyncError> {
        if characters.len() > self.limits.max_snapshot_chars {
            return Err(SyncError::SnapshotTooLarge {
                limit: self.limits.max_snapshot_chars,
                actual: characters.len(),
            });
        }
        self.doc = Document::from_snapshot(characters)?;
        self.state = SyncState::Synced;
        Ok(())
    }

    /// Generates and integrates a local insert, returning the outbound
    /// operation message for the transport to broadcast.
    pub fn local_insert(&mut self, position: usize, value: &str) -> Result<Message, SyncError> {
        let character = self
            .doc
            .generate_insert(&mut self.identity, position, value)?;
        debug!(position, value, "local insert");
        Ok(Message::Operation {
            operation: Operation::Insert {
                position,
                character,
            },
        })
    }

    /// Splits `text` into grapheme clusters and generates one insert per
    /// cluster, left to right.
    pub fn insert_text(&mut self, position: usize, text: &str) -> Result<Vec<Message>, SyncError> {
        let mut outbound = Vec::new();
        for (i, grapheme) in text.graphemes(true).enumerate() {
            outbound.push(self.local_insert(position + i, grapheme)?);
        }
        Ok(outbound)
    }

    /// Tombstones the visible character at `position`, returning the
    /// outbound operation message, or `None` when nothing is there.
    pub fn local_delete(&mut self, position: usize) -> Option<Message> {
        let character = self.doc.generate_delete(position)?;
        debug!(position, "local delete");
        Some(Message::Operation {
            operation: Operation::Delete {
                position,
                character,
            },
        })
    }

    /// Applies one inbound message. Errors reject only the offending
    /// message; previously integrated structure is never touched.
    pub fn handle_message(&mut self, message: Message) -> Result<Reply, SyncError> {
        match message {
            Message::Operation { operation } => self.handle_operation(operation),
            Message::DocReq { requester } => {
                debug!(%requester, "document requested, replying with snapshot");
                Ok(Reply::send(Message::DocSync {
                    recipient: requester,
                    document: self.doc.snapshot(),
                }))
            }
            Message::DocSync {
                recipient,
                document,
            } => self.handle_doc_sync(recipient, document),
            Message::SiteId { value } => {
                if self.identity.assign_site(value) {
                    debug!(site = value, "site id assigned");
                } else {
                    warn!(site = value, "ignoring repeated site id assignment");
                }
                Ok(Reply::none())
            }
            Message::Join { username } => Ok(Reply::event(SessionEvent::Presence(
                Presence::Joined { username },
            ))),
            Message::Users { usernames } => {
                let usernames = usernames
                    .split(',')
                    .filter(|name| !name.is_empty())
                    .map(str::to_owned)
                    .collect();
                Ok(Reply::event(SessionEvent::Presence(
                    Presence::ActiveUsers { usernames },
                )))
            }
        }
    }

    fn handle_operation(&mut self, operation: Operation) -> Result<Reply, SyncError> {
        validate_operation(&operation, &self.limits)?;
        match operation {
            Operation::Insert { character, .. } => {
                let (prev, next) = (character.prev, character.next);
                self.doc.integrate_insert(character, prev, next)?;
                Ok(Reply::event(SessionEvent::ContentChanged))
            }
            Operation::Delete { character, .. } => {
                if self.doc.integrate_delete(&character.id) {
                    Ok(Reply::event(SessionEvent::ContentChanged))
                } else {
                    // Tolerates a delete outrunning its insert.
                    debug!(id = ?character.id, "delete for unknown character, ignoring");
                    Ok(Reply::none())
                }
            }
        }
    }

    fn handle_doc_sync(
        &mut self,
        recipient: ClientId,
        document: Vec<Character>,
    ) -> Result<Reply, SyncError> {
        if recipient != self.client_id {
            debug!(%recipient, "snapshot addressed to another replica, ignoring");
            return Ok(Reply::none());
        }
        if self.state == SyncState::Synced {
            debug!("already synced, ignoring extra snapshot");
            return Ok(Reply::none());
        }
        self.load_snapshot(document)?;
        info!(len = self.doc.len(), "synchronized from peer snapshot");
        Ok(Reply::event(SessionEvent::Synced))
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
