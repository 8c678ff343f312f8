//! Core replicated-text data type.
//!
//! This module provides the building blocks for convergent collaborative
//! text editing:
//!
//! - [`OpId`] and [`CharId`] - Globally unique character identifiers with a
//!   canonical total order
//! - [`Character`] - An identified, causally-anchored unit of text
//! - [`Document`] - The ordered character sequence and its integration
//!   algorithms
//! - [`Identity`] - Per-replica site id and logical clock
//!
//! Every replica applies the same deterministic placement procedure for
//! every insert and delete, local or remote, which is what guarantees that
//! replicas receiving the same set of operations converge to the same
//! visible text.

use serde::{Deserialize, Serialize};

pub mod identity;

pub use identity::Identity;

pub type SiteId = u64;

/// Identifier minted by a replica for one locally generated operation.
///
/// The derived tuple order on `(site, clock)` is the canonical comparison
/// used to break ties between concurrent inserts; it must be identical on
/// every replica.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OpId {
    pub site: SiteId,
    pub clock: u64,
}

/// Identity of a stored character: one of the two fixed sentinels, or an
/// operation id. The variant order places `Start` below every operation id
/// and `End` above, so the derived order is total over a whole document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CharId {
    Start,
    Op(OpId),
    End,
}

impl CharId {
    pub fn is_sentinel(&self) -> bool {
        matches!(self, CharId::Start | CharId::End)
    }
}

/// One unit of text with its causal anchors.
///
/// `prev` and `next` record the neighbors as seen by the generating replica
/// at generation time. They are never mutated afterwards; the integration
/// algorithm reads them to decide where concurrent inserts land.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Character {
    pub id: CharId,
    pub visible: bool,
    pub value: String,
    pub prev: CharId,
    pub next: CharId,
}

impl Character {
    fn start_sentinel() -> Self {
        Self {
            id: CharId::Start,
            visible: false,
            value: String::new(),
            prev: CharId::Start,
            next: CharId::End,
        }
    }

    fn end_sentinel() -> Self {
        Self {
            id: CharId::End,
            visible: false,
            value: String::new(),
            prev: CharId::Start,
            next: CharId::End,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DocError {
    #[error("position out of bounds")]
    PositionOutOfBounds,
    #[error("invalid character id")]
    InvalidCharacterId,
    #[error("subsequence bounds not present")]
    BoundsNotPresent,
}

/// Ordered character sequence of one replica.
///
/// Index 0 is always the start sentinel and the last index the end sentinel;
/// both are invisible and never removed. Deleted characters stay in place as
/// tombstones, so the structural length never decreases and relative order
/// among integrated characters never changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    characters: Vec<Character>,
}

impl Document {
    pub fn new() -> Self {
        Self {
            characters: vec![Character::start_sentinel(), Character::end_sentinel()],
        }
    }

    /// Rebuilds a document from a full snapshot, trusting the snapshot's
    /// structural order verbatim. Sentinel entries in the snapshot map onto
    /// this document's own sentinels. All-or-nothing: a malformed snapshot
    /// leaves the caller's document untouched.
    pub fn from_snapshot(characters: Vec<Character>) -> Result<Self, DocError> {
        let mut doc = Self::new();
        let mut position = 1;
        for ch in characters {
            if ch.id.is_sentinel() {
                continue;
            }
            doc.local_insert(ch, position)?;
            position += 1;
        }
        Ok(doc)
    }

    /// Structural length, counting tombstones and sentinels.
    pub fn len(&self) -> usize {
        self.characters.len()
    }

    /// True when the document has no visible characters.
    pub fn is_empty(&self) -> bool {
        self.visible_len() == 0
    }

    /// Number of visible characters.
    pub fn visible_len(&self) -> usize {
        self.characters.iter().filter(|c| c.visible).count()
    }

    pub fn element_at(&self, position: usize) -> Result<&Character, DocError> {
        self.characters
            .get(position)
            .ok_or(DocError::PositionOutOfBounds)
    }

    /// Structural index of the character with the given id.
    pub fn position(&self, id: &CharId) -> Option<usize> {
        self.characters.iter().position(|c| c.id == *id)
    }

    pub fn contains(&self, id: &CharId) -> bool {
        self.position(id).is_some()
    }

    /// Id of the structural left neighbor; at the left edge the element's
    /// own id is returned.
    pub fn left(&self, id: &CharId) -> Option<CharId> {
        let i = self.position(id)?;
        if i == 0 {
            Some(self.characters[i].id)
        } else {
            Some(self.characters[i - 1].id)
        }
    }

    /// Id of the structural right neighbor; at the right edge the element's
    /// own id is returned.
    pub fn right(&self, id: &CharId) -> Option<CharId> {
        let i = self.position(id)?;
        if i + 1 >= self.characters.len() {
            Some(self.characters[i].id)
        } else {
            Some(self.characters[i + 1].id)
        }
    }

    /// The externally observable text: every visible value in structural
    /// order.
    pub fn content(&self) -> String {
        self.characters
            .iter()
            .filter(|c| c.visible)
            .map(|c| c.value.as_str())
            .collect()
    }

    /// The nth (1-based) visible character, used to translate a cursor
    /// position into a causal anchor.
    pub fn ith_visible(&self, n: usize) -> Option<&Character> {
        if n == 0 {
            return None;
        }
        self.characters.iter().filter(|c| c.visible).nth(n - 1)
    }

    /// Full clone of the sequence, tombstones and sentinels included.
    pub fn snapshot(&self) -> Vec<Character> {
        self.characters.clone()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Character> {
        self.characters.iter()
    }

    /// Structural insert at a 0-based index strictly inside the sentinels.
    pub fn local_insert(&mut self, ch: Character, position: usize) -> Result<(), DocError> {
        if position == 0 || position >= self.characters.len() {
            return Err(DocError::PositionOutOfBounds);
        }
        if ch.id.is_sentinel() || self.contains(&ch.id) {
            return Err(DocError::InvalidCharacterId);
        }
        self.characters.insert(position, ch);
        Ok(())
    }

    /// Places a remotely generated character deterministically between its
    /// causal anchors.
    ///
    /// Fails with [`DocError::BoundsNotPresent`] when either anchor is not
    /// yet structurally known, which can only happen if an operation arrives
    /// before its causal prerequisite; the sync protocol prevents this for
    /// catch-up replicas by shipping snapshots rather than partial operation
    /// logs. The position is fully computed before the single structural
    /// splice, so a failed integration makes no structural change.
    ///
    /// Recursion depth is bounded by the subsequence length, itself bounded
    /// by the structural document length.
    pub fn integrate_insert(
        &mut self,
        ch: Character,
        prev: CharId,
        next: CharId,
    ) -> Result<(), DocError> {
        let lo = self.position(&prev).ok_or(DocError::BoundsNotPresent)?;
        let hi = self.position(&next).ok_or(DocError::BoundsNotPresent)?;
        if lo >= hi {
            return Err(DocError::BoundsNotPresent);
        }

        // Empty gap: the character lands immediately before its next anchor.
        if hi - lo == 1 {
            return self.local_insert(ch, hi);
        }

        // Keep only interior elements whose own generation-time anchors span
        // the whole (prev, next) range. These are the concurrent siblings of
        // `ch`; elements anchored strictly inside the gap are already ordered
        // relative to a sibling and must not take part in the id scan.
        let mut candidates: Vec<CharId> = vec![prev];
        for i in lo + 1..hi {
            let d = &self.characters[i];
            if let (Some(p), Some(n)) = (self.position(&d.prev), self.position(&d.next))
                && p <= lo
                && hi <= n
            {
                candidates.push(d.id);
            }
        }
        candidates.push(next);

        if candidates.len() == 2 {
            // Anchors recorded at generation time always leave at least one
            // spanning element in a non-empty gap; an anchor graph violating
            // that is malformed, so fall back to a fixed placement.
            return self.local_insert(ch, hi);
        }

        // Lower id sorts earlier: the total order over ids is the tie-break
        // for concurrent inserts into the same gap.
        let mut i = 1;
        while i < candidates.len() - 1 && candidates[i] < ch.id {
            i += 1;
        }
        let narrowed_prev = candidates[i - 1];
        let narrowed_next = candidates[i];
        self.integrate_insert(ch, narrowed_prev, narrowed_next)
    }

    /// Tombstones the character with the given id. An unknown id is a no-op,
    /// not an error, so deletes that outrun their insert can be tolerated.
    /// Returns whether a character was tombstoned.
    pub fn integrate_delete(&mut self, id: &CharId) -> bool {
        if id.is_sentinel() {
            return false;
        }
        match self.characters.iter_mut().find(|c| c.id == *id) {
            Some(ch) => {
                ch.visible = false;
                true
            }
            None => false,
        }
    }

    /// Creates and integrates a new character at a 0-based visible position.
    ///
    /// This is the only path that mints new character identities; remote
    /// receipt and snapshot replay consume already-identified characters.
    /// The returned character is the unit to transmit to other replicas.
    pub fn generate_insert(
        &mut self,
        identity: &mut Identity,
        position: usize,
        value: &str,
    ) -> Result<Character, DocError> {
        if position > self.visible_len() {
            return Err(DocError::PositionOutOfBounds);
        }

        let prev = self
            .ith_visible(position)
            .map(|c| c.id)
            .unwrap_or(CharId::Start);
        let next = self
            .ith_visible(position + 1)
            .map(|c| c.id)
            .unwrap_or(CharId::End);

        let ch = Character {
            id: CharId::Op(identity.tick()),
            visible: true,
            value: value.to_owned(),
            prev,
            next,
        };
        self.integrate_insert(ch.clone(), prev, next)?;
        Ok(ch)
    }

    /// Tombstones the visible character at a 0-based visible position and
    /// returns a copy of it for transmission. `None` when no visible
    /// character exists at that position.
    pub fn generate_delete(&mut self, position: usize) -> Option<Character> {
        let id = self.ith_visible(position + 1).map(|c| c.id)?;
        self.integrate_delete(&id);
        let i = self.position(&id)?;
        Some(self.characters[i].clone())
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}
