//! Table-driven phase machine for the control loop.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │  PhaseTable                                              │
//! │  ┌────────────┬──────────────┬─────────────────────────┐ │
//! │  │ LoopPhase  │ name         │ successors              │ │
//! │  ├────────────┼──────────────┼─────────────────────────┤ │
//! │  │ Idle       │ "idle"       │ Reading, Stopped        │ │
//! │  │ Reading    │ "reading"    │ Deciding, Error         │ │
//! │  │ Deciding   │ "deciding"   │ Actuating, Error        │ │
//! │  │ Actuating  │ "actuating"  │ Publishing, Error       │ │
//! │  │ Publishing │ "publishing" │ Idle                    │ │
//! │  │ Error      │ "error"      │ Publishing              │ │
//! │  │ Stopped    │ "stopped"    │ (terminal)              │ │
//! │  └────────────┴──────────────┴─────────────────────────┘ │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! The loop asks for every transition explicitly; a move that is not in the
//! current row is refused and the phase does not change.

pub mod context;

use core::fmt;

use log::debug;

// ---------------------------------------------------------------------------
// Phase identity
// ---------------------------------------------------------------------------

/// Every phase an iteration can be in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum LoopPhase {
    Idle = 0,
    Reading = 1,
    Deciding = 2,
    Actuating = 3,
    Publishing = 4,
    Error = 5,
    Stopped = 6,
}

impl LoopPhase {
    /// Number of phases; sizes the table array.
    pub const COUNT: usize = 7;

    /// Convert an index back to `LoopPhase`.  Out-of-range maps to `Error`.
    pub fn from_index(idx: usize) -> Self {
        match idx {
            0 => Self::Idle,
            1 => Self::Reading,
            2 => Self::Deciding,
            3 => Self::Actuating,
            4 => Self::Publishing,
            6 => Self::Stopped,
            _ => {
                debug_assert!(idx == 5, "invalid phase index: {idx}");
                Self::Error
            }
        }
    }

    const fn bit(self) -> u8 {
        1 << self as u8
    }

    pub fn name(self) -> &'static str {
        PHASE_TABLE[self as usize].name
    }
}

impl fmt::Display for LoopPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Phase descriptor (one row in the table)
// ---------------------------------------------------------------------------

/// Static descriptor for a single phase.
pub struct PhaseDescriptor {
    pub phase: LoopPhase,
    pub name: &'static str,
    /// Bitmask of phases reachable from this one.
    pub successors: u8,
}

impl PhaseDescriptor {
    pub fn allows(&self, next: LoopPhase) -> bool {
        self.successors & next.bit() != 0
    }
}

const fn row(phase: LoopPhase, name: &'static str, next: &[LoopPhase]) -> PhaseDescriptor {
    let mut successors = 0u8;
    let mut i = 0;
    while i < next.len() {
        successors |= next[i].bit();
        i += 1;
    }
    PhaseDescriptor { phase, name, successors }
}

/// Indexed by `LoopPhase as usize`.
pub static PHASE_TABLE: [PhaseDescriptor; LoopPhase::COUNT] = {
    use LoopPhase::*;
    [
        row(Idle, "idle", &[Reading, Stopped]),
        row(Reading, "reading", &[Deciding, Error]),
        row(Deciding, "deciding", &[Actuating, Error]),
        row(Actuating, "actuating", &[Publishing, Error]),
        row(Publishing, "publishing", &[Idle]),
        row(Error, "error", &[Publishing]),
        row(Stopped, "stopped", &[]),
    ]
};

/// A refused transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidTransition {
    pub from: LoopPhase,
    pub to: LoopPhase,
}

impl fmt::Display for InvalidTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid phase transition {} -> {}", self.from, self.to)
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Tracks the current phase and enforces [`PHASE_TABLE`].
#[derive(Debug)]
pub struct Fsm {
    current: LoopPhase,
    /// Transitions taken since construction.
    transitions: u64,
}

impl Default for Fsm {
    fn default() -> Self {
        Self::new()
    }
}

impl Fsm {
    /// A machine sitting in `Idle`.
    pub fn new() -> Self {
        Self {
            current: LoopPhase::Idle,
            transitions: 0,
        }
    }

    pub fn current(&self) -> LoopPhase {
        self.current
    }

    pub fn is_stopped(&self) -> bool {
        self.current == LoopPhase::Stopped
    }

    pub fn transitions(&self) -> u64 {
        self.transitions
    }

    /// Move to `next`.  Returns the phase that was left.
    pub fn transition(&mut self, next: LoopPhase) -> Result<LoopPhase, InvalidTransition> {
        let from = self.current;
        if !PHASE_TABLE[from as usize].allows(next) {
            return Err(InvalidTransition { from, to: next });
        }
        debug!("phase {} -> {}", from, next);
        self.current = next;
        self.transitions += 1;
        Ok(from)
    }
}
