//! Phoneme id sequences and window segmentation.

use crate::symbols::Symbol;
use murmur_core::ShapeError;
use std::ops::Range;

/// Padding id of the exported vocabulary.
pub const PAD_ID: i64 = 0;

/// Ordered model input ids with their explicit length.
///
/// Always non-empty, no longer than the encoder capacity, and every id lies
/// inside the vocabulary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhonemeSequence {
    ids: Vec<i64>,
    capacity: usize,
}

impl PhonemeSequence {
    pub fn new(ids: Vec<i64>, capacity: usize, vocab_size: usize) -> Result<Self, ShapeError> {
        if ids.is_empty() {
            return Err(ShapeError::new(
                "phoneme sequence",
                "at least one symbol",
                "0 symbols",
            ));
        }
        if ids.len() > capacity {
            return Err(ShapeError::new(
                "phoneme sequence",
                format!("at most {} symbols", capacity),
                format!("{} symbols", ids.len()),
            ));
        }
        if let Some(bad) = ids.iter().find(|&&id| id < 0 || id as usize >= vocab_size) {
            return Err(ShapeError::new(
                "phoneme sequence",
                format!("ids in [0, {})", vocab_size),
                format!("id {}", bad),
            ));
        }
        Ok(Self { ids, capacity })
    }

    pub fn ids(&self) -> &[i64] {
        &self.ids
    }

    /// Number of real (unpadded) symbols.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Ids padded with [`PAD_ID`] up to the capacity.
    pub fn padded(&self) -> Vec<i64> {
        let mut padded = self.ids.clone();
        padded.resize(self.capacity, PAD_ID);
        padded
    }
}

/// Split `symbols` into windows of at most `capacity`.
///
/// Inputs that fit are returned whole. Otherwise each window ends at the
/// best-scoring boundary it contains (sentence end, then pause, then space,
/// latest wins a tie), or is cut at `capacity` when it contains none.
pub fn segment(symbols: &[Symbol], capacity: usize) -> Vec<Range<usize>> {
    let mut windows = Vec::new();
    if symbols.is_empty() || capacity == 0 {
        return windows;
    }

    let mut start = 0;
    while start < symbols.len() {
        let limit = start + capacity;
        if limit >= symbols.len() {
            windows.push(start..symbols.len());
            break;
        }

        // Candidate ends lie in (start, limit]; an end `e` splits after symbols[e - 1].
        let mut best = (0u8, limit);
        for end in start + 1..=limit {
            let score = symbols[end - 1].split_score();
            if score > 0 && score >= best.0 {
                best = (score, end);
            }
        }
        windows.push(start..best.1);
        start = best.1;
    }
    windows
}
