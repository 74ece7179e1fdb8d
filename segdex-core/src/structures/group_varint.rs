//! Group varint codec for PForDelta exception streams
//!
//! Values are grouped four at a time. Each group is written as a 4-bit control
//! nibble selecting one of [`GROUP_WIDTHS`], followed by the four values at that
//! width. The whole stream goes through the MSB-first bit writer and ends on a
//! word boundary. The value count is not stored; the caller knows it.

use super::bitpacking::{BitReader, BitWriter, bits_needed};
use crate::{Error, Result};

/// Values per group
pub const GROUP_LEN: usize = 4;

/// Widths selectable by the control nibble
pub const GROUP_WIDTHS: [u8; 6] = [1, 2, 4, 8, 16, 32];

const CONTROL_BITS: u8 = 4;

/// Smallest selectable width that holds `max`
#[inline]
fn width_code(max: u32) -> u8 {
    let bits = bits_needed(max);
    GROUP_WIDTHS
        .iter()
        .position(|&w| w >= bits)
        .unwrap_or(GROUP_WIDTHS.len() - 1) as u8
}

/// Encode `values` and append the words to `output`
pub fn encode(values: &[u32], output: &mut Vec<u32>) {
    let mut writer = BitWriter::new(output);
    for group in values.chunks(GROUP_LEN) {
        let max = group.iter().copied().max().unwrap_or(0);
        let code = width_code(max);
        let width = GROUP_WIDTHS[code as usize];
        writer.write(code as u32, CONTROL_BITS);
        for i in 0..GROUP_LEN {
            writer.write(group.get(i).copied().unwrap_or(0), width);
        }
    }
    writer.finish();
}

/// Number of words `encode` would produce for `values`
pub fn encoded_words(values: &[u32]) -> usize {
    let bits: usize = values
        .chunks(GROUP_LEN)
        .map(|group| {
            let max = group.iter().copied().max().unwrap_or(0);
            CONTROL_BITS as usize + GROUP_LEN * GROUP_WIDTHS[width_code(max) as usize] as usize
        })
        .sum();
    bits.div_ceil(32)
}

/// Decode `output.len()` values from `input`, returning the words consumed
pub fn decode(input: &[u32], output: &mut [u32]) -> Result<usize> {
    let mut reader = BitReader::new(input);
    for group in output.chunks_mut(GROUP_LEN) {
        let code = reader.read(CONTROL_BITS)? as usize;
        let width = *GROUP_WIDTHS
            .get(code)
            .ok_or_else(|| Error::Corruption(format!("invalid group varint selector {}", code)))?;
        for i in 0..GROUP_LEN {
            let value = reader.read(width)?;
            if let Some(slot) = group.get_mut(i) {
                *slot = value;
            }
        }
    }
    Ok(reader.words_consumed())
}
