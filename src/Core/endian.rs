//! Fixed-width byte-order helpers.
//!
//! Definition files are little-endian on disk, wire headers are big-endian.
//! Every reader here is bounds-checked and returns `None` instead of panicking
//! when the requested field would run past the end of the slice.

#[inline]
pub fn swap16(value: u16) -> u16 {
    value.swap_bytes()
}

#[inline]
pub fn swap32(value: u32) -> u32 {
    value.swap_bytes()
}

#[inline]
fn field<const N: usize>(bytes: &[u8], offset: usize) -> Option<[u8; N]> {
    let end = offset.checked_add(N)?;
    bytes.get(offset..end)?.try_into().ok()
}

pub fn read_u16_be(bytes: &[u8], offset: usize) -> Option<u16> {
    field::<2>(bytes, offset).map(u16::from_be_bytes)
}

pub fn read_u32_be(bytes: &[u8], offset: usize) -> Option<u32> {
    field::<4>(bytes, offset).map(u32::from_be_bytes)
}

pub fn read_u32_le(bytes: &[u8], offset: usize) -> Option<u32> {
    field::<4>(bytes, offset).map(u32::from_le_bytes)
}

pub fn read_i32_le(bytes: &[u8], offset: usize) -> Option<i32> {
    field::<4>(bytes, offset).map(i32::from_le_bytes)
}

/// Reads a field that has already been normalised to host order by a settle pass.
pub fn read_u32_ne(bytes: &[u8], offset: usize) -> Option<u32> {
    field::<4>(bytes, offset).map(u32::from_ne_bytes)
}

pub fn read_i32_ne(bytes: &[u8], offset: usize) -> Option<i32> {
    field::<4>(bytes, offset).map(i32::from_ne_bytes)
}

/// Rewrites a little-endian 32-bit field in place as host order.
///
/// # Returns
/// The host-order value, or `None` if the field is out of bounds.
pub fn settle_u32_le(bytes: &mut [u8], offset: usize) -> Option<u32> {
    let value = read_u32_le(bytes, offset)?;
    bytes[offset..offset + 4].copy_from_slice(&value.to_ne_bytes());
    Some(value)
}

pub fn write_u32_ne(bytes: &mut [u8], offset: usize, value: u32) -> Option<()> {
    let end = offset.checked_add(4)?;
    bytes.get_mut(offset..end)?.copy_from_slice(&value.to_ne_bytes());
    Some(())
}

pub fn write_u16_be(bytes: &mut [u8], offset: usize, value: u16) -> Option<()> {
    let end = offset.checked_add(2)?;
    bytes.get_mut(offset..end)?.copy_from_slice(&value.to_be_bytes());
    Some(())
}

pub fn write_u32_be(bytes: &mut [u8], offset: usize, value: u32) -> Option<()> {
    let end = offset.checked_add(4)?;
    bytes.get_mut(offset..end)?.copy_from_slice(&value.to_be_bytes());
    Some(())
}

pub fn push_u32_le(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_le_bytes());
}

pub fn push_i32_le(out: &mut Vec<u8>, value: i32) {
    out.extend_from_slice(&value.to_le_bytes());
}

/// Rounds `value` up to the next multiple of four.
#[inline]
pub fn round_up_4(value: usize) -> usize {
    (value + 3) & !3
}
