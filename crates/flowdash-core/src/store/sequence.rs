// ── Request sequencing ──
//
// Responses can complete out of order. Each request takes a ticket from
// a `RequestSequencer`; a result is only applied if its ticket is newer
// than the last applied one. `FlightGuard` keeps a periodic trigger from
// overlapping its own previous cycle.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Monotonic ticket counter for one result stream.
#[derive(Debug, Default)]
pub struct RequestSequencer {
    issued: AtomicU64,
    applied: AtomicU64,
}

impl RequestSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ticket for a request about to start. Tickets start at 1.
    pub fn next(&self) -> u64 {
        self.issued.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Record `ticket` as applied if it is newer than the last applied
    /// one. Returns `false` for a stale ticket.
    pub fn try_commit(&self, ticket: u64) -> bool {
        self.applied
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
                (ticket > current).then_some(ticket)
            })
            .is_ok()
    }

    /// Invalidate every ticket issued so far.
    pub fn invalidate(&self) {
        let issued = self.issued.load(Ordering::SeqCst);
        self.applied.fetch_max(issued, Ordering::SeqCst);
    }

    pub fn last_applied(&self) -> u64 {
        self.applied.load(Ordering::SeqCst)
    }
}

/// RAII marker that a cycle is in flight. Dropping it clears the flag.
#[derive(Debug)]
pub struct FlightGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> FlightGuard<'a> {
    /// Claim the flag, or `None` if a previous cycle still holds it.
    pub fn try_acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}
