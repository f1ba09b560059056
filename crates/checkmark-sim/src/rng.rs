use serde::{Deserialize, Serialize};

const ID_ALPHABET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

/// Length of store-assigned document ids.
pub const DOCUMENT_ID_LEN: usize = 20;

/// SplitMix64 stream used for document ids and fault decisions.
///
/// A seed always replays the same ids and the same injected failures, on
/// every platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeterministicRng {
    state: u64,
}

impl DeterministicRng {
    const GAMMA: u64 = 0x9E37_79B9_7F4A_7C15;

    /// Start a stream at `seed`.
    #[must_use]
    pub const fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    /// Advance the stream and return the mixed output.
    #[must_use]
    pub const fn next_u64(&mut self) -> u64 {
        self.state = self.state.wrapping_add(Self::GAMMA);
        let mut z = self.state;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^ (z >> 31)
    }

    /// Uniform-enough value below `bound`; zero when `bound` is zero.
    #[must_use]
    pub const fn below(&mut self, bound: u64) -> u64 {
        match bound {
            0 => 0,
            _ => self.next_u64() % bound,
        }
    }

    /// True for roughly `percent` out of every hundred calls.
    #[must_use]
    pub const fn chance(&mut self, percent: u8) -> bool {
        match percent {
            0 => false,
            100.. => true,
            _ => self.below(100) < percent as u64,
        }
    }

    /// Alphanumeric document id of [`DOCUMENT_ID_LEN`] characters.
    #[must_use]
    pub fn document_id(&mut self) -> String {
        (0..DOCUMENT_ID_LEN)
            .map(|_| {
                let idx = self.below(ID_ALPHABET.len() as u64);
                char::from(ID_ALPHABET[usize::try_from(idx).unwrap_or(0)])
            })
            .collect()
    }
}
