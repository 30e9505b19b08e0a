/// Hash used as the primary equality key for every symbol name.
pub type Hash = u32;

/// Marker for a hash that was never computed.
pub const INVALID_HASH: Hash = 0xFFFF_FFFF;

#[inline]
fn step(hash: Hash, byte: u8) -> Hash {
    // h * 387 + c, spelled the same way the definition tools do it
    let mut h = hash;
    h = h.wrapping_add(h << 7);
    h = h.wrapping_add(h << 1);
    h.wrapping_add(byte as u32)
}

/// Case-sensitive hash of `text`. Symbol names (types, structs, functions,
/// parameters) are interned with this variant.
pub fn hash_case_sensitive(text: &str) -> Hash {
    text.bytes().fold(0, step)
}

/// Case-insensitive hash with `\` folded to `/`, suitable for file paths.
pub fn hash(text: &str) -> Hash {
    text.bytes().fold(0, |h, byte| {
        let folded = match byte {
            b'A'..=b'Z' => byte + (b'a' - b'A'),
            b'\\' => b'/',
            other => other,
        };
        step(h, folded)
    })
}
