//! Per-replica site identity and logical clock.

use super::{OpId, SiteId};

/// Unique-id generator owned by one replica session.
///
/// The site id is assigned externally (by the coordinator that admits the
/// replica) and is write-once for the lifetime of the session; the clock
/// increments once per locally generated operation and never resets.
/// Uniqueness of the resulting ids across the collaboration rests on the
/// coordinator handing out distinct site ids, a contract this type does not
/// verify.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    site: SiteId,
    clock: u64,
    assigned: bool,
}

impl Identity {
    pub fn new(site: SiteId) -> Self {
        Self {
            site,
            clock: 0,
            assigned: true,
        }
    }

    /// An identity awaiting its site assignment. Operations generated before
    /// assignment use site 0.
    pub fn unassigned() -> Self {
        Self {
            site: 0,
            clock: 0,
            assigned: false,
        }
    }

    pub fn site(&self) -> SiteId {
        self.site
    }

    pub fn clock(&self) -> u64 {
        self.clock
    }

    pub fn is_assigned(&self) -> bool {
        self.assigned
    }

    /// Applies the externally allocated site id. Returns false (and changes
    /// nothing) if the site was already assigned.
    pub fn assign_site(&mut self, site: SiteId) -> bool {
        if self.assigned {
            return false;
        }
        self.site = site;
        self.assigned = true;
        true
    }

    /// Mints the id for the next locally generated operation.
    pub fn tick(&mut self) -> OpId {
        self.clock += 1;
        OpId {
            site: self.site,
            clock: self.clock,
        }
    }
}
