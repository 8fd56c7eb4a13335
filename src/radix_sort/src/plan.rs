//! Pass planning: digit windows and key buffer routing.
//!
//! Each pass reads keys from one buffer and scatters them into another. The
//! route is fixed before the first launch so that the last pass always lands
//! in the caller's output buffer:
//!
//! - pass `i` writes the output when `passes - 1 - i` is even, otherwise the
//!   scratch buffer carved from temporary storage;
//! - pass `i > 0` reads what pass `i - 1` wrote;
//! - the first pass reads the caller's input (out-of-place), the caller's
//!   buffer itself (in-place, even pass count), or scratch after a staging
//!   copy of the caller's buffer (in-place, odd pass count).

use crate::digit::{BitRange, DigitWindow};

/// One of the key buffers a pass can touch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeySlot {
    /// Caller's read-only input (out-of-place sorts only).
    Input,
    /// Caller's output; the caller's only buffer for in-place sorts.
    Output,
    /// Scratch key buffer in temporary storage.
    Scratch,
}

/// Where a pass reads its keys from and scatters them to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PassRoute {
    pub source: KeySlot,
    pub destination: KeySlot,
}

/// Whether the caller supplied separate input and output buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    OutOfPlace,
    InPlace,
}

/// Digit windows and buffer routes of one sort call.
#[derive(Debug, Clone)]
pub struct PassPlan {
    windows: Vec<DigitWindow>,
    placement: Placement,
}

impl PassPlan {
    /// Plan the passes for `bits`, consumed `radix_bits` at a time from the
    /// least significant end.
    pub fn new(bits: BitRange, radix_bits: u32, placement: Placement) -> Self {
        Self {
            windows: bits.windows(radix_bits),
            placement,
        }
    }

    pub fn windows(&self) -> &[DigitWindow] {
        &self.windows
    }

    pub fn pass_count(&self) -> usize {
        self.windows.len()
    }

    /// Whether the caller's keys must be copied into scratch before pass 0.
    pub fn stages_input(&self) -> bool {
        self.placement == Placement::InPlace && self.pass_count() % 2 == 1
    }

    /// Route of pass `pass`.
    pub fn route(&self, pass: usize) -> PassRoute {
        PassRoute {
            source: self.source(pass),
            destination: self.destination(pass),
        }
    }

    fn destination(&self, pass: usize) -> KeySlot {
        if (self.pass_count() - 1 - pass) % 2 == 0 {
            KeySlot::Output
        } else {
            KeySlot::Scratch
        }
    }

    fn source(&self, pass: usize) -> KeySlot {
        if pass > 0 {
            return self.destination(pass - 1);
        }
        match self.placement {
            Placement::OutOfPlace => KeySlot::Input,
            Placement::InPlace if self.stages_input() => KeySlot::Scratch,
            Placement::InPlace => KeySlot::Output,
        }
    }
}
