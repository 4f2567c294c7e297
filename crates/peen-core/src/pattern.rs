//! Data words and pattern replication.
//!
//! The host programs 32-bit pattern values; the port moves full memory words.
//! Replicating a narrow pattern across the word is a pure data transform and
//! lives here, not in the sequencers.

/// A full-width data word as moved over the port's data channels.
pub type Word = u64;

/// Width of [`Word`] in bits.
pub const WORD_BITS: u32 = Word::BITS;

/// Width of one host-visible pattern chunk in bits.
pub const CHUNK_BITS: u32 = u32::BITS;

/// Number of 32-bit chunks in a [`Word`].
pub const WORD_CHUNKS: usize = (WORD_BITS / CHUNK_BITS) as usize;

/// Replicates a 32-bit pattern value to fill a full memory word.
pub fn replicate(pattern: u32) -> Word {
    let mut word: Word = 0;
    for chunk in 0..WORD_CHUNKS {
        word |= (pattern as Word) << (chunk as u32 * CHUNK_BITS);
    }
    word
}

/// Splits a word into the 32-bit chunks mirrored to the host, lowest first.
pub fn word_chunks(word: Word) -> [u32; WORD_CHUNKS] {
    let mut chunks = [0u32; WORD_CHUNKS];
    for (i, chunk) in chunks.iter_mut().enumerate() {
        *chunk = (word >> (i as u32 * CHUNK_BITS)) as u32;
    }
    chunks
}

/// Reassembles a word from its host-visible chunks.
pub fn word_from_chunks(chunks: &[u32; WORD_CHUNKS]) -> Word {
    let mut word: Word = 0;
    for (i, &chunk) in chunks.iter().enumerate() {
        word |= (chunk as Word) << (i as u32 * CHUNK_BITS);
    }
    word
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replicate_fills_word() {
        assert_eq!(replicate(0xA5A5A5A5), 0xA5A5_A5A5_A5A5_A5A5);
        assert_eq!(replicate(0), 0);
        assert_eq!(replicate(u32::MAX), Word::MAX);
        assert_eq!(replicate(0x1234_5678), 0x1234_5678_1234_5678);
    }

    #[test]
    fn test_chunks_round_trip() {
        let word = 0xDEAD_BEEF_0BAD_F00D;
        let chunks = word_chunks(word);
        assert_eq!(chunks, [0x0BAD_F00D, 0xDEAD_BEEF]);
        assert_eq!(word_from_chunks(&chunks), word);
    }

    #[test]
    fn test_chunks_random_round_trip() {
        use rand::Rng;
        let mut rng = rand::rng();
        for _ in 0..100 {
            let word: Word = rng.random();
            assert_eq!(word_from_chunks(&word_chunks(word)), word);
        }
    }
}
