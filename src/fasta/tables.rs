/// Alu repeat, cycled to produce the first sequence.
pub const ALU: &[u8] = b"GGCCGGGCGCGGTGGCTCACGCCTGTAATCCCAGCACTTTGGGAGGCCGAGGCGGGCGGATCACCTGAG\
GTCAGGAGTTCGAGACCAGCCTGGCCAACATGGTGAAACCCCGTCTCTACTAAAAATACAAAAATTAGC\
CGGGCGTGGTGGCGCGCGCCTGTAATCCCAGCTACTCGGGAGGCTGAGGCAGGAGAATCGCTTGAACCC\
GGGAGGCGGAGGTTGCAGTGAGCCGAGATCGCGCCACTGCACTCCAGCCTGGGCGACAGAGCGAGACTC\
CGTCTCAAAAA";

/// IUB ambiguity codes and their frequencies.
pub const IUB: [(f32, u8); 15] = [
    (0.27, b'a'),
    (0.12, b'c'),
    (0.12, b'g'),
    (0.27, b't'),
    (0.02, b'B'),
    (0.02, b'D'),
    (0.02, b'H'),
    (0.02, b'K'),
    (0.02, b'M'),
    (0.02, b'N'),
    (0.02, b'R'),
    (0.02, b'S'),
    (0.02, b'V'),
    (0.02, b'W'),
    (0.02, b'Y'),
];

/// Nucleotide frequencies of Homo sapiens.
pub const HOMO_SAPIENS: [(f32, u8); 4] = [
    (0.302_954_94, b'a'),
    (0.197_988_3, b'c'),
    (0.197_547_3, b'g'),
    (0.301_509_45, b't'),
];

/// Symbols with running probability totals, for inverse-CDF lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct CumulativeTable {
    thresholds: Vec<f32>,
    symbols: Vec<u8>,
}

impl CumulativeTable {
    pub fn new(frequencies: &[(f32, u8)]) -> Self {
        debug_assert!(!frequencies.is_empty(), "frequency table must not be empty");
        let mut running = 0.0f32;
        let mut thresholds = Vec::with_capacity(frequencies.len());
        let mut symbols = Vec::with_capacity(frequencies.len());
        for &(probability, symbol) in frequencies {
            running += probability;
            thresholds.push(running);
            symbols.push(symbol);
        }
        Self {
            thresholds,
            symbols,
        }
    }

    /// First symbol whose cumulative probability reaches `probability`.
    ///
    /// Values past the final threshold (float rounding) map to the last symbol.
    pub fn lookup(&self, probability: f32) -> u8 {
        let position = self
            .thresholds
            .iter()
            .position(|&threshold| probability <= threshold)
            .unwrap_or(self.symbols.len().saturating_sub(1));
        self.symbols[position]
    }

    pub fn symbols(&self) -> &[u8] {
        &self.symbols
    }
}
