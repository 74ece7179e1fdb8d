//! PForDelta (Patched Frame-of-Reference Delta) block compression
//!
//! Every block holds up to [`BLOCK_SIZE`] unsigned 32-bit integers. Encoding:
//! 1. optional first-order delta coding (forward or reverse),
//! 2. zero-padding to a full block,
//! 3. selection of a bit width `b` from [`BIT_WIDTHS`] minimising
//!    `exceptions * EXCEPTION_COST_BITS + b * BLOCK_SIZE` (first minimum wins),
//! 4. MSB-first packing of the low `b` bits of every value,
//! 5. an exception stream of interleaved `(gap, value >> b)` pairs, where `gap`
//!    counts positions since the previous exception minus one, written with the
//!    group varint codec.
//!
//! Format per block (32-bit words):
//! - Header: `(selector << 10) | exception_count`, or [`RAW_BLOCK_MARKER`]
//! - Main array: `4 * b` words
//! - Exceptions: group varint words
//!
//! A raw block is the marker followed by [`BLOCK_SIZE`] plain words. It is used
//! when `b == 32` is selected and whenever the patched encoding would come out
//! larger than the raw one, which bounds every encoded stream by
//! [`MAX_ENCODED_WORDS`].

use super::bitpacking::{bits_needed, pack_block, packed_words, unpack_block};
use super::group_varint;
use crate::structures::BLOCK_SIZE;
use crate::{Error, Result};

/// Allowed bit widths, indexed by the header selector
pub const BIT_WIDTHS: [u8; 17] = [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 16, 20, 32];

/// Estimated cost of one exception when choosing the bit width
pub const EXCEPTION_COST_BITS: usize = 32;

/// Header word of an uncompressed block
pub const RAW_BLOCK_MARKER: u32 = u32::MAX;

/// Upper bound on the words produced by [`encode_block`]
pub const MAX_ENCODED_WORDS: usize = 1 + BLOCK_SIZE;

const EXCEPTION_COUNT_BITS: u32 = 10;
const EXCEPTION_COUNT_MASK: u32 = (1 << EXCEPTION_COUNT_BITS) - 1;

/// Delta coding applied to a block before packing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeltaMode {
    /// Values are packed as-is (score streams)
    None,
    /// `d[i] = v[i] - v[i-1]`; input must be non-decreasing
    Forward,
    /// `d[i] = v[i-1] - v[i]`; input must be non-increasing
    Reverse,
}

/// Shape of an encoded block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodedBlockInfo {
    /// Selected bit width (32 for raw blocks)
    pub bit_width: u8,
    /// Number of patched exceptions
    pub num_exceptions: usize,
    /// Words appended to the output
    pub words: usize,
}

/// Find the cheapest selector for a block.
/// Returns (selector, exception_count)
fn find_optimal_bit_width(values: &[u32; BLOCK_SIZE]) -> (usize, usize) {
    // bit_counts[b] = count of values needing exactly b bits
    let mut bit_counts = [0usize; 33];
    for &v in values {
        bit_counts[bits_needed(v) as usize] += 1;
    }

    // cumulative[b] = values that fit in b bits or less
    let mut cumulative = [0usize; 33];
    cumulative[0] = bit_counts[0];
    for b in 1..=32 {
        cumulative[b] = cumulative[b - 1] + bit_counts[b];
    }

    let mut best = (BIT_WIDTHS.len() - 1, 0usize);
    let mut best_cost = usize::MAX;
    for (selector, &b) in BIT_WIDTHS.iter().enumerate() {
        let exceptions = BLOCK_SIZE - cumulative[b as usize];
        let cost = exceptions * EXCEPTION_COST_BITS + b as usize * BLOCK_SIZE;
        if cost < best_cost {
            best_cost = cost;
            best = (selector, exceptions);
        }
    }
    best
}

fn apply_delta(values: &[u32], delta: DeltaMode, out: &mut [u32; BLOCK_SIZE]) -> Result<()> {
    out.fill(0);
    match delta {
        DeltaMode::None => out[..values.len()].copy_from_slice(values),
        DeltaMode::Forward => {
            let mut prev = 0u32;
            for (i, (&v, slot)) in values.iter().zip(out.iter_mut()).enumerate() {
                if v < prev {
                    return Err(Error::InvalidInput(format!(
                        "forward delta input decreases at position {}",
                        i
                    )));
                }
                *slot = v - prev;
                prev = v;
            }
        }
        DeltaMode::Reverse => {
            out[0] = values[0];
            for i in 1..values.len() {
                if values[i] > values[i - 1] {
                    return Err(Error::InvalidInput(format!(
                        "reverse delta input increases at position {}",
                        i
                    )));
                }
                out[i] = values[i - 1] - values[i];
            }
        }
    }
    Ok(())
}

fn undo_delta(values: &mut [u32], delta: DeltaMode) {
    match delta {
        DeltaMode::None => {}
        DeltaMode::Forward => {
            for i in 1..values.len() {
                values[i] = values[i].wrapping_add(values[i - 1]);
            }
        }
        DeltaMode::Reverse => {
            for i in 1..values.len() {
                values[i] = values[i - 1].wrapping_sub(values[i]);
            }
        }
    }
}

fn write_raw(block: &[u32; BLOCK_SIZE], output: &mut Vec<u32>) -> EncodedBlockInfo {
    output.push(RAW_BLOCK_MARKER);
    output.extend_from_slice(block);
    EncodedBlockInfo {
        bit_width: 32,
        num_exceptions: 0,
        words: MAX_ENCODED_WORDS,
    }
}

/// Encode up to [`BLOCK_SIZE`] values, appending the words to `output`.
///
/// The element count is not part of the encoding; the caller stores it and
/// passes it back to [`decode_block`].
pub fn encode_block(
    values: &[u32],
    delta: DeltaMode,
    output: &mut Vec<u32>,
) -> Result<EncodedBlockInfo> {
    if values.is_empty() || values.len() > BLOCK_SIZE {
        return Err(Error::InvalidInput(format!(
            "block must hold 1..={} values, got {}",
            BLOCK_SIZE,
            values.len()
        )));
    }

    let mut block = [0u32; BLOCK_SIZE];
    apply_delta(values, delta, &mut block)?;

    let (selector, num_exceptions) = find_optimal_bit_width(&block);
    let bit_width = BIT_WIDTHS[selector];
    if bit_width == 32 {
        return Ok(write_raw(&block, output));
    }

    let mut exceptions = Vec::with_capacity(num_exceptions * 2);
    let mut next = 0usize;
    for (pos, &v) in block.iter().enumerate() {
        if bits_needed(v) > bit_width {
            exceptions.push((pos - next) as u32);
            exceptions.push(v >> bit_width);
            next = pos + 1;
        }
    }

    let words = 1 + packed_words(bit_width) + group_varint::encoded_words(&exceptions);
    if words > MAX_ENCODED_WORDS {
        return Ok(write_raw(&block, output));
    }

    output.reserve(words);
    output.push(((selector as u32) << EXCEPTION_COUNT_BITS) | num_exceptions as u32);
    pack_block(&block, bit_width, output);
    group_varint::encode(&exceptions, output);

    Ok(EncodedBlockInfo {
        bit_width,
        num_exceptions,
        words,
    })
}

/// Decode a block written by [`encode_block`].
///
/// Only the first `count` entries of `output` are meaningful afterwards.
/// Returns the number of words consumed from `input`.
pub fn decode_block(
    input: &[u32],
    count: usize,
    delta: DeltaMode,
    output: &mut [u32; BLOCK_SIZE],
) -> Result<usize> {
    if count > BLOCK_SIZE {
        return Err(Error::Corruption(format!("block count {} exceeds block size", count)));
    }
    let header = *input
        .first()
        .ok_or_else(|| Error::Corruption("empty block".into()))?;

    let consumed = if header == RAW_BLOCK_MARKER {
        let raw = input
            .get(1..MAX_ENCODED_WORDS)
            .ok_or_else(|| Error::Corruption("raw block truncated".into()))?;
        output.copy_from_slice(raw);
        MAX_ENCODED_WORDS
    } else {
        let selector = (header >> EXCEPTION_COUNT_BITS) as usize;
        let num_exceptions = (header & EXCEPTION_COUNT_MASK) as usize;
        let bit_width = match BIT_WIDTHS.get(selector) {
            Some(&b) if b < 32 => b,
            _ => {
                return Err(Error::Corruption(format!("invalid bit width selector {}", selector)));
            }
        };
        if num_exceptions > BLOCK_SIZE {
            return Err(Error::Corruption(format!(
                "{} exceptions in a block of {}",
                num_exceptions, BLOCK_SIZE
            )));
        }

        let mut consumed = 1 + unpack_block(&input[1..], bit_width, output)?;

        let mut exceptions = [0u32; 2 * BLOCK_SIZE];
        let exceptions = &mut exceptions[..2 * num_exceptions];
        consumed += group_varint::decode(&input[consumed..], exceptions)?;

        let mut next = 0usize;
        for pair in exceptions.chunks_exact(2) {
            let pos = next + pair[0] as usize;
            if pos >= BLOCK_SIZE {
                return Err(Error::Corruption(format!("exception position {} out of range", pos)));
            }
            output[pos] |= pair[1] << bit_width;
            next = pos + 1;
        }
        consumed
    };

    undo_delta(&mut output[..count], delta);
    Ok(consumed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn round_trip(values: &[u32], delta: DeltaMode) -> EncodedBlockInfo {
        let mut words = Vec::new();
        let info = encode_block(values, delta, &mut words).unwrap();
        assert_eq!(info.words, words.len());

        let mut output = [0u32; BLOCK_SIZE];
        let consumed = decode_block(&words, values.len(), delta, &mut output).unwrap();
        assert_eq!(consumed, words.len());
        assert_eq!(&output[..values.len()], values);
        info
    }

    #[test]
    fn test_find_optimal_bit_width() {
        // All zeros
        let values = [0u32; BLOCK_SIZE];
        let (selector, exceptions) = find_optimal_bit_width(&values);
        assert_eq!(BIT_WIDTHS[selector], 0);
        assert_eq!(exceptions, 0);

        // All small values
        let mut values = [0u32; BLOCK_SIZE];
        for (i, v) in values.iter_mut().enumerate() {
            *v = i as u32 % 16;
        }
        let (selector, exceptions) = find_optimal_bit_width(&values);
        assert_eq!(BIT_WIDTHS[selector], 4);
        assert_eq!(exceptions, 0);

        // Mix with an outlier
        values[50] = 1_000_000;
        let (selector, exceptions) = find_optimal_bit_width(&values);
        assert_eq!(BIT_WIDTHS[selector], 4);
        assert_eq!(exceptions, 1);
    }

    #[test]
    fn test_single_outlier_makes_one_exception() {
        let mut values: Vec<u32> = (0..BLOCK_SIZE as u32).map(|i| i % 4).collect();
        values[77] = 70_000;

        let info = round_trip(&values, DeltaMode::None);
        assert_eq!(info.bit_width, 2);
        assert_eq!(info.num_exceptions, 1);
        // header + 8 packed words + one (gap, high) group
        assert_eq!(info.words, 1 + 8 + 3);
    }

    #[test]
    fn test_all_zero_block_is_header_only() {
        let info = round_trip(&[0u32; BLOCK_SIZE], DeltaMode::None);
        assert_eq!(info.bit_width, 0);
        assert_eq!(info.words, 1);
    }

    #[test]
    fn test_random_values_fall_back_to_raw() {
        let mut rng = StdRng::seed_from_u64(7);
        let values: Vec<u32> = (0..BLOCK_SIZE).map(|_| rng.random::<u32>() | 1 << 31).collect();
        let info = round_trip(&values, DeltaMode::None);
        assert_eq!(info.bit_width, 32);
        assert_eq!(info.words, MAX_ENCODED_WORDS);
    }

    #[test]
    fn test_forward_delta_doc_ids() {
        let doc_ids: Vec<u32> = (0..BLOCK_SIZE as u32).map(|i| 1_000 + i * 3).collect();
        let info = round_trip(&doc_ids, DeltaMode::Forward);
        // first value 1000 becomes an exception, gaps of 3 fit in 2 bits
        assert_eq!(info.bit_width, 2);
        assert_eq!(info.num_exceptions, 1);
    }

    #[test]
    fn test_reverse_delta_doc_ids() {
        let doc_ids: Vec<u32> = (0..BLOCK_SIZE as u32).rev().map(|i| 50 + i * 7).collect();
        round_trip(&doc_ids, DeltaMode::Reverse);
    }

    #[test]
    fn test_partial_blocks() {
        for len in [1usize, 2, 5, 63, 127] {
            let doc_ids: Vec<u32> = (0..len as u32).map(|i| i * i + 4).collect();
            round_trip(&doc_ids, DeltaMode::Forward);
            let scores: Vec<u32> = (0..len as u32).map(|i| (i * 37) % 11).collect();
            round_trip(&scores, DeltaMode::None);
        }
    }

    #[test]
    fn test_random_round_trips() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..200 {
            let len = rng.random_range(1..=BLOCK_SIZE);
            let max_bits = rng.random_range(0..=32u32);
            let values: Vec<u32> = (0..len)
                .map(|_| {
                    let v = rng.random::<u32>();
                    if max_bits == 32 { v } else { v & ((1u32 << max_bits) - 1) }
                })
                .collect();
            round_trip(&values, DeltaMode::None);

            let mut sorted = values.clone();
            sorted.sort_unstable();
            round_trip(&sorted, DeltaMode::Forward);
            sorted.reverse();
            round_trip(&sorted, DeltaMode::Reverse);
        }
    }

    #[test]
    fn test_decoded_doc_ids_are_monotonic() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut doc_ids = Vec::with_capacity(BLOCK_SIZE);
        let mut current = 0u32;
        for _ in 0..BLOCK_SIZE {
            current += rng.random_range(1..5_000);
            doc_ids.push(current);
        }

        let mut words = Vec::new();
        encode_block(&doc_ids, DeltaMode::Forward, &mut words).unwrap();
        let mut output = [0u32; BLOCK_SIZE];
        decode_block(&words, BLOCK_SIZE, DeltaMode::Forward, &mut output).unwrap();
        assert!(output.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_rejects_unordered_input() {
        let mut words = Vec::new();
        assert!(matches!(
            encode_block(&[5, 4], DeltaMode::Forward, &mut words),
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            encode_block(&[4, 5], DeltaMode::Reverse, &mut words),
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            encode_block(&[], DeltaMode::None, &mut words),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_decode_corrupt_input() {
        let mut output = [0u32; BLOCK_SIZE];
        assert!(decode_block(&[], 1, DeltaMode::None, &mut output).is_err());
        assert!(decode_block(&[RAW_BLOCK_MARKER, 1, 2], 3, DeltaMode::None, &mut output).is_err());
        // selector 31 does not exist
        assert!(decode_block(&[31 << 10], 1, DeltaMode::None, &mut output).is_err());
    }
}
