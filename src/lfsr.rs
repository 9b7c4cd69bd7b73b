//! 16-bit linear-feedback shift register used to pick flicker patterns.
//!
//! Taps are bits 15, 14, 12 and 3. The sequence only has to look random to
//! the eye, so it is fully deterministic and replays identically from the
//! same seed on every boot.

/// Feedback tap positions.
const TAPS: [u32; 4] = [15, 14, 12, 3];

/// Pseudo-random generator state.
///
/// Zero is a fixed point of the recurrence, so a zero state is replaced by
/// one before every shift.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "debug-mode", derive(defmt::Format))]
pub struct Lfsr16 {
    state: u16,
}

impl Lfsr16 {
    /// Creates a generator starting from `seed`.
    ///
    /// A zero seed is accepted; it is replaced on the first draw.
    pub const fn new(seed: u16) -> Self {
        Self { state: seed }
    }

    /// Current register contents (the value returned by the last draw).
    pub const fn state(&self) -> u16 {
        self.state
    }

    /// Advances the register by one step and returns the new state.
    pub fn next_u16(&mut self) -> u16 {
        if self.state == 0 {
            self.state = 1;
        }

        let feedback = TAPS
            .iter()
            .fold(0, |bit, &tap| bit ^ (self.state >> tap) & 1);

        self.state = (self.state << 1) | feedback;
        self.state
    }
}
