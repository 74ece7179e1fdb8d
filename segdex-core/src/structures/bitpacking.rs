//! Bitpacking utilities for compact integer encoding
//!
//! Values are packed MSB-first into 32-bit words: the first value occupies the
//! most significant bits of the first word, and a value may straddle two words.
//! Both the PForDelta base array and the exception stream go through the same
//! [`BitWriter`] / [`BitReader`] pair so the two can never disagree on layout.

use crate::structures::BLOCK_SIZE;
use crate::{Error, Result};

/// Compute the number of bits needed to represent the maximum value
#[inline]
pub fn bits_needed(max_val: u32) -> u8 {
    if max_val == 0 {
        0
    } else {
        32 - max_val.leading_zeros() as u8
    }
}

/// Number of words occupied by a full block packed at `bit_width`
#[inline]
pub fn packed_words(bit_width: u8) -> usize {
    (BLOCK_SIZE * bit_width as usize).div_ceil(32)
}

#[inline]
fn low_mask(width: u32) -> u64 {
    (1u64 << width) - 1
}

/// Appends values of arbitrary width (0..=32 bits) to a word buffer, MSB-first.
///
/// Call [`BitWriter::finish`] to flush the last partial word.
pub struct BitWriter<'a> {
    out: &'a mut Vec<u32>,
    acc: u64,
    filled: u32,
}

impl<'a> BitWriter<'a> {
    pub fn new(out: &'a mut Vec<u32>) -> Self {
        Self {
            out,
            acc: 0,
            filled: 0,
        }
    }

    #[inline]
    pub fn write(&mut self, value: u32, width: u8) {
        if width == 0 {
            return;
        }
        let width = width as u32;
        self.acc = (self.acc << width) | (value as u64 & low_mask(width));
        self.filled += width;
        if self.filled >= 32 {
            self.filled -= 32;
            self.out.push((self.acc >> self.filled) as u32);
            self.acc &= low_mask(self.filled);
        }
    }

    /// Flush the pending bits, zero-padding to the next word boundary
    pub fn finish(self) {
        if self.filled > 0 {
            self.out.push((self.acc << (32 - self.filled)) as u32);
        }
    }
}

/// Reads values written by [`BitWriter`]
pub struct BitReader<'a> {
    words: &'a [u32],
    next: usize,
    acc: u64,
    avail: u32,
}

impl<'a> BitReader<'a> {
    pub fn new(words: &'a [u32]) -> Self {
        Self {
            words,
            next: 0,
            acc: 0,
            avail: 0,
        }
    }

    #[inline]
    pub fn read(&mut self, width: u8) -> Result<u32> {
        if width == 0 {
            return Ok(0);
        }
        let width = width as u32;
        if self.avail < width {
            let word = *self
                .words
                .get(self.next)
                .ok_or_else(|| Error::Corruption("bit stream truncated".into()))?;
            self.next += 1;
            self.acc = (self.acc << 32) | word as u64;
            self.avail += 32;
        }
        self.avail -= width;
        let value = (self.acc >> self.avail) & low_mask(width);
        self.acc &= low_mask(self.avail);
        Ok(value as u32)
    }

    /// Whole words pulled from the input so far
    pub fn words_consumed(&self) -> usize {
        self.next
    }
}

/// Pack a block of 128 u32 values using the specified bit width.
///
/// Only the low `bit_width` bits of each value are kept.
pub fn pack_block(values: &[u32; BLOCK_SIZE], bit_width: u8, output: &mut Vec<u32>) {
    match bit_width {
        0 => {}
        32 => output.extend_from_slice(values),
        _ => {
            let mut writer = BitWriter::new(output);
            for &value in values {
                writer.write(value, bit_width);
            }
            writer.finish();
        }
    }
}

/// Unpack a block of 128 u32 values, returning the number of words consumed
pub fn unpack_block(input: &[u32], bit_width: u8, output: &mut [u32; BLOCK_SIZE]) -> Result<usize> {
    let words = packed_words(bit_width);
    if input.len() < words {
        return Err(Error::Corruption(format!(
            "packed block needs {} words at width {}, found {}",
            words,
            bit_width,
            input.len()
        )));
    }

    // Fast path for word-aligned bit widths
    match bit_width {
        0 => output.fill(0),
        8 => unpack_block_8(&input[..words], output),
        16 => unpack_block_16(&input[..words], output),
        32 => output.copy_from_slice(&input[..BLOCK_SIZE]),
        _ => unpack_block_generic(&input[..words], bit_width, output),
    }
    Ok(words)
}

#[inline]
fn unpack_block_8(input: &[u32], output: &mut [u32; BLOCK_SIZE]) {
    for (chunk, &word) in output.chunks_exact_mut(4).zip(input) {
        chunk[0] = word >> 24;
        chunk[1] = (word >> 16) & 0xFF;
        chunk[2] = (word >> 8) & 0xFF;
        chunk[3] = word & 0xFF;
    }
}

#[inline]
fn unpack_block_16(input: &[u32], output: &mut [u32; BLOCK_SIZE]) {
    for (chunk, &word) in output.chunks_exact_mut(2).zip(input) {
        chunk[0] = word >> 16;
        chunk[1] = word & 0xFFFF;
    }
}

/// Generic unpacking for arbitrary bit widths; `input` is already length-checked
fn unpack_block_generic(input: &[u32], bit_width: u8, output: &mut [u32; BLOCK_SIZE]) {
    let width = bit_width as u32;
    let mask = low_mask(width);
    let mut words = input.iter();
    let mut acc = 0u64;
    let mut avail = 0u32;

    for out in output.iter_mut() {
        if avail < width {
            // length was checked against packed_words()
            let word = words.next().copied().unwrap_or(0);
            acc = (acc << 32) | word as u64;
            avail += 32;
        }
        avail -= width;
        *out = ((acc >> avail) & mask) as u32;
        acc &= low_mask(avail);
    }
}
