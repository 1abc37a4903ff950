//! Bit scanning over word-addressed bitmaps.
//!
//! Bit `n` of a bitmap lives in word `n / 64` at bit `n % 64`. The word
//! accessor lets callers scan flat and nested layouts alike.

/// Lowest set bit at position `>= from`
pub fn next_set_bit_up<F>(word_at: F, word_count: usize, from: usize) -> Option<usize>
where
    F: Fn(usize) -> u64,
{
    let mut word_index = from / 64;
    if word_index >= word_count {
        return None;
    }
    let mut word = word_at(word_index) & (u64::MAX << (from % 64));
    loop {
        if word != 0 {
            return Some(word_index * 64 + word.trailing_zeros() as usize);
        }
        word_index += 1;
        if word_index >= word_count {
            return None;
        }
        word = word_at(word_index);
    }
}

/// Highest set bit at position `<= from`
pub fn next_set_bit_down<F>(word_at: F, word_count: usize, from: usize) -> Option<usize>
where
    F: Fn(usize) -> u64,
{
    if word_count == 0 {
        return None;
    }
    let (mut word_index, bit) = if from / 64 >= word_count {
        (word_count - 1, 63)
    } else {
        (from / 64, from % 64)
    };
    let mask = if bit == 63 { u64::MAX } else { (1u64 << (bit + 1)) - 1 };
    let mut word = word_at(word_index) & mask;
    loop {
        if word != 0 {
            return Some(word_index * 64 + 63 - word.leading_zeros() as usize);
        }
        if word_index == 0 {
            return None;
        }
        word_index -= 1;
        word = word_at(word_index);
    }
}
