use num_traits::{PrimInt, Unsigned};

/// Number of bits in one word of type `W`.
pub fn word_bits<W>() -> usize {
    8 * size_of::<W>()
}

/// Mask with the `num_bits` lowest bits set.
///
/// Shifting by the full word width is not defined, so a full-width mask is
/// produced directly.
fn lsb_mask<W>(num_bits: usize) -> W
where
    W: PrimInt + Unsigned,
{
    if num_bits >= word_bits::<W>() {
        W::max_value()
    } else {
        (W::one() << num_bits) - W::one()
    }
}

fn check_range<W>(buf: &[W], bit_offset: usize, num_bits: usize) {
    assert!(
        num_bits <= word_bits::<W>(),
        "num_bits must be <= word width"
    );
    let end = bit_offset
        .checked_add(num_bits)
        .expect("bit range overflows usize");
    assert!(end <= buf.len() * word_bits::<W>(), "bit range out of bounds");
}

/// Reads `num_bits` bits starting at `bit_offset`.
///
/// Bits are numbered from the least significant bit of `buf[0]` upwards. When
/// the range crosses a word boundary the high-order bits of the result come
/// from the low-order bits of the next word.
///
/// # Panics
///
/// Panics if `num_bits` exceeds the word width or the range does not fit in
/// `buf`.
pub fn read<W>(buf: &[W], bit_offset: usize, num_bits: usize) -> W
where
    W: PrimInt + Unsigned,
{
    check_range(buf, bit_offset, num_bits);
    if num_bits == 0 {
        return W::zero();
    }

    let (word_index, offset) = index_and_offset::<W>(bit_offset);
    let in_first = word_bits::<W>() - offset;
    let mut value = buf[word_index] >> offset;
    if num_bits > in_first {
        // `offset > 0` here, so `in_first` is a valid shift amount.
        value = value | (buf[word_index + 1] << in_first);
    }
    value & lsb_mask(num_bits)
}

/// Writes the `num_bits` low bits of `value` at `bit_offset`.
///
/// Only the addressed bits change; neighbours in the same or the next word
/// are preserved. Bits of `value` above `num_bits` are ignored.
///
/// # Panics
///
/// Panics if `num_bits` exceeds the word width or the range does not fit in
/// `buf`.
pub fn write<W>(buf: &mut [W], bit_offset: usize, num_bits: usize, value: W)
where
    W: PrimInt + Unsigned,
{
    check_range(buf, bit_offset, num_bits);
    if num_bits == 0 {
        return;
    }

    let (word_index, offset) = index_and_offset::<W>(bit_offset);
    let value_masked = value & lsb_mask(num_bits);
    let in_first = word_bits::<W>() - offset;
    {
        let first = &mut buf[word_index];
        let first_mask = lsb_mask::<W>(num_bits.min(in_first)) << offset;
        *first = (*first & !first_mask) | ((value_masked << offset) & first_mask);
    }
    if num_bits > in_first {
        let second = &mut buf[word_index + 1];
        let second_mask = lsb_mask::<W>(num_bits - in_first);
        *second = (*second & !second_mask) | (value_masked >> in_first);
    }
}

fn index_and_offset<W>(bit_offset: usize) -> (usize, usize) {
    (bit_offset / word_bits::<W>(), bit_offset % word_bits::<W>())
}

/// Fixed-size, zero-initialised buffer of words addressed by bit ranges.
///
/// Thin owner of a `Vec<W>` on top of [`read`] and [`write`].
#[derive(Clone, PartialEq, Eq)]
pub struct BitStore<W> {
    buf: Vec<W>,
    num_bits: usize,
}

impl<W> BitStore<W>
where
    W: PrimInt + Unsigned,
{
    /// Allocates enough whole words to hold `num_bits` bits.
    pub fn with_bits(num_bits: usize) -> Self {
        let num_words = num_bits.div_ceil(word_bits::<W>());
        Self {
            buf: vec![W::zero(); num_words],
            num_bits,
        }
    }

    pub fn num_bits(&self) -> usize {
        self.num_bits
    }

    pub fn words(&self) -> &[W] {
        &self.buf
    }

    pub fn get(&self, bit_offset: usize, num_bits: usize) -> W {
        read(&self.buf, bit_offset, num_bits)
    }

    pub fn set(&mut self, bit_offset: usize, num_bits: usize, value: W) {
        write(&mut self.buf, bit_offset, num_bits, value)
    }

    pub fn get_bit(&self, bit_offset: usize) -> bool {
        read(&self.buf, bit_offset, 1) == W::one()
    }

    pub fn set_bit(&mut self, bit_offset: usize, value: bool) {
        let bit = if value { W::one() } else { W::zero() };
        write(&mut self.buf, bit_offset, 1, bit)
    }

    /// Counts set bits in `[bit_offset, bit_offset + num_bits)`.
    pub fn count_ones_in(&self, bit_offset: usize, num_bits: usize) -> usize {
        let width = word_bits::<W>();
        let mut count = 0;
        let mut done = 0;
        while done < num_bits {
            let chunk = (num_bits - done).min(width);
            count += self.get(bit_offset + done, chunk).count_ones() as usize;
            done += chunk;
        }
        count
    }

    pub fn clear(&mut self) {
        self.buf.fill(W::zero());
    }

    /// Words rendered least significant bit first, separated by spaces.
    pub fn to_bit_string(&self) -> String {
        let width = word_bits::<W>();
        self.buf
            .iter()
            .map(|&word| {
                (0..width)
                    .map(|bit| {
                        if (word >> bit) & W::one() == W::one() {
                            '1'
                        } else {
                            '0'
                        }
                    })
                    .collect::<String>()
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl<W> std::fmt::Debug for BitStore<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "BitStore {{ num_bits: {}, num_words: {} }}",
            self.num_bits,
            self.buf.len()
        )
    }
}
