//! Argument cloner/releaser registry.
//!
//! Every action crossing into stack context and every event payload
//! crossing back is deep-copied here. A copy is handed out as a
//! [`Cloned<T>`]: the single owner of the duplicated buffers, which
//! releases them (and records the release) when dropped. Because the
//! handle is neither `Clone` nor `Copy`, a copy can be released at most
//! once, and because the release lives in `Drop`, every exit path
//! (executed, rejected, queue full, shutdown drain) releases it.
//!
//! ```text
//!   &Action ──clone_call──▶ Cloned<Action> ──▶ Envelope ──▶ drop = release
//!   &[u8]   ──clone_event─▶ Cloned<Vec<u8>> ─▶ MeshEvent ─▶ drop = release
//!                                │
//!                                ▼
//!                         Ledger (clones / releases per direction+profile)
//! ```

use core::fmt;
use core::ops::Deref;
use core::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::mesh::Profile;
use crate::mesh::actions::Action;

// ── Allocation failure ────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocError {
    /// The copy would exceed the configured byte budget.
    BudgetExceeded,
    /// The allocator refused the reservation.
    OutOfMemory,
}

impl fmt::Display for AllocError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BudgetExceeded => write!(f, "copy budget exceeded"),
            Self::OutOfMemory => write!(f, "out of memory"),
        }
    }
}

// ── Copy budget ───────────────────────────────────────────────

/// Byte allowance for a single deep copy.
#[derive(Debug)]
pub struct CopyBudget {
    limit: usize,
    used: usize,
}

impl CopyBudget {
    pub const fn new(limit: usize) -> Self {
        Self { limit, used: 0 }
    }

    pub const fn used(&self) -> usize {
        self.used
    }

    pub const fn remaining(&self) -> usize {
        self.limit - self.used
    }

    /// Duplicate `src` into a new buffer whose capacity is exactly
    /// `src.len()`.
    pub fn copy_slice<T: Copy>(&mut self, src: &[T]) -> Result<Vec<T>, AllocError> {
        let bytes = core::mem::size_of_val(src);
        if bytes > self.remaining() {
            return Err(AllocError::BudgetExceeded);
        }
        let mut out = Vec::new();
        out.try_reserve_exact(src.len())
            .map_err(|_| AllocError::OutOfMemory)?;
        out.extend_from_slice(src);
        self.used += bytes;
        Ok(out)
    }
}

/// Duplicate a value together with every buffer it owns.
///
/// Implementations match exhaustively on their variants so that a new
/// variant carrying a buffer cannot be added without deciding how it is
/// copied.
pub trait DeepCopy: Sized {
    fn deep_copy(&self, budget: &mut CopyBudget) -> Result<Self, AllocError>;
}

// ── Ledger ────────────────────────────────────────────────────

/// Which handoff a copy was made for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Application → stack (action arguments).
    Call = 0,
    /// Stack → application (event payloads).
    Event = 1,
}

type Counters = [[AtomicUsize; Profile::COUNT]; 2];

#[derive(Debug)]
struct Ledger {
    clones: Counters,
    releases: Counters,
}

impl Ledger {
    const fn new() -> Self {
        Self {
            clones: [const { [const { AtomicUsize::new(0) }; Profile::COUNT] }; 2],
            releases: [const { [const { AtomicUsize::new(0) }; Profile::COUNT] }; 2],
        }
    }

    fn record_clone(&self, direction: Direction, profile: Profile) {
        self.clones[direction as usize][profile.index()].fetch_add(1, Ordering::AcqRel);
    }

    fn record_release(&self, direction: Direction, profile: Profile) {
        let released =
            self.releases[direction as usize][profile.index()].fetch_add(1, Ordering::AcqRel) + 1;
        let cloned = self.clones[direction as usize][profile.index()].load(Ordering::Acquire);
        debug_assert!(
            released <= cloned,
            "release without matching clone ({direction:?}/{profile})"
        );
    }

    /// Copies alive in one cell. Releases are read first: every release
    /// follows its own clone, so the later clone read is never smaller.
    fn live(&self, d: usize, p: usize) -> usize {
        let released = self.releases[d][p].load(Ordering::Acquire);
        let cloned = self.clones[d][p].load(Ordering::Acquire);
        cloned - released
    }

    fn sum(counters: &Counters) -> usize {
        counters
            .iter()
            .flatten()
            .map(|c| c.load(Ordering::Acquire))
            .sum()
    }
}

// ── Owned copy handle ─────────────────────────────────────────

/// A deep copy owned by exactly one queue entry or context.
///
/// Dropping the handle frees the duplicated buffers and records the
/// release.
pub struct Cloned<T> {
    value: T,
    direction: Direction,
    profile: Profile,
    ledger: Arc<Ledger>,
}

impl<T> Cloned<T> {
    pub fn profile(&self) -> Profile {
        self.profile
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }
}

impl<T> Deref for Cloned<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

impl<T: fmt::Debug> fmt::Debug for Cloned<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cloned")
            .field("direction", &self.direction)
            .field("profile", &self.profile)
            .field("value", &self.value)
            .finish()
    }
}

impl<T> Drop for Cloned<T> {
    fn drop(&mut self) {
        self.ledger.record_release(self.direction, self.profile);
    }
}

// ── Registry ──────────────────────────────────────────────────

/// Produces [`Cloned`] copies and keeps the clone/release ledger.
#[derive(Debug, Clone)]
pub struct ArgRegistry {
    ledger: Arc<Ledger>,
    byte_budget: usize,
}

impl ArgRegistry {
    pub fn new(byte_budget: usize) -> Self {
        Self {
            ledger: Arc::new(Ledger::new()),
            byte_budget,
        }
    }

    /// Deep-copy an action for the call queue.
    pub fn clone_call(&self, action: &Action) -> Result<Cloned<Action>, AllocError> {
        let mut budget = CopyBudget::new(self.byte_budget);
        let value = action.deep_copy(&mut budget)?;
        Ok(self.track(value, Direction::Call, action.profile()))
    }

    /// Deep-copy an event payload for the application queue.
    pub fn clone_event(
        &self,
        profile: Profile,
        payload: &[u8],
    ) -> Result<Cloned<Vec<u8>>, AllocError> {
        let mut budget = CopyBudget::new(self.byte_budget);
        let value = budget.copy_slice(payload)?;
        Ok(self.track(value, Direction::Event, profile))
    }

    fn track<T>(&self, value: T, direction: Direction, profile: Profile) -> Cloned<T> {
        self.ledger.record_clone(direction, profile);
        Cloned {
            value,
            direction,
            profile,
            ledger: Arc::clone(&self.ledger),
        }
    }

    pub fn clones(&self) -> usize {
        Ledger::sum(&self.ledger.clones)
    }

    pub fn releases(&self) -> usize {
        Ledger::sum(&self.ledger.releases)
    }

    /// Copies currently alive across all directions and profiles.
    pub fn outstanding(&self) -> usize {
        (0..2)
            .flat_map(|d| (0..Profile::COUNT).map(move |p| (d, p)))
            .map(|(d, p)| self.ledger.live(d, p))
            .sum()
    }

    pub fn outstanding_for(&self, direction: Direction, profile: Profile) -> usize {
        self.ledger.live(direction as usize, profile.index())
    }
}
