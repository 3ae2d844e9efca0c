/// Modulus of the generator; every value lies in `[0, MODULUS)`.
pub const MODULUS: u32 = 139_968;
const MULTIPLIER: u32 = 3_877;
const INCREMENT: u32 = 29_573;
pub const SEED: u32 = 42;

/// Scales a raw value into `[0, 1)`.
pub const RECIPROCAL: f32 = 1.0 / MODULUS as f32;

/// Linear congruential generator used for every random process.
///
/// One instance is shared by the whole chain, so the second random process
/// continues the stream where the first stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinearCongruential {
    last: u32,
}

impl Default for LinearCongruential {
    fn default() -> Self {
        Self::new(SEED)
    }
}

impl LinearCongruential {
    pub fn new(seed: u32) -> Self {
        Self { last: seed }
    }

    pub fn next_value(&mut self) -> u32 {
        self.last = (self.last * MULTIPLIER + INCREMENT) % MODULUS;
        self.last
    }

    pub fn fill(&mut self, raw: &mut [u32]) {
        for value in raw {
            *value = self.next_value();
        }
    }
}

/// Map a raw value to a probability in `[0, 1)`.
pub fn to_probability(raw: u32) -> f32 {
    raw as f32 * RECIPROCAL
}
