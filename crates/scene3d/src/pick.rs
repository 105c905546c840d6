//! Pick-ID wire protocol shared by the picking render pass and the
//! read-back decode step.
//!
//! The picking pass writes one integer per instance into an RGBA8 target.
//! Raw value `0` is reserved for "no instance under the cursor"; a hit on
//! global instance `n` is encoded as `n + 1`. The integer is split over
//! the red/green/blue channels (24 usable bits), so a scene can address up
//! to ~16.7M instances.

/// Raw channel value meaning "nothing was hit".
pub const NO_HIT: u32 = 0;

/// Encodes a global instance index for the picking fragment shader.
#[inline]
pub fn pack_pick_id(global_index: u32) -> u32 {
    global_index + 1
}

/// Decodes a raw picked value back to a global instance index.
/// Returns `None` for the reserved no-hit sentinel.
#[inline]
pub fn unpack_pick_id(raw: u32) -> Option<u32> {
    raw.checked_sub(1)
}

/// Reassembles the 24-bit raw pick value from the R/G/B bytes of the
/// read-back pixel. Must stay the exact inverse of the channel split done
/// in the picking fragment shaders.
#[inline]
pub fn decode_pick_rgb(r: u8, g: u8, b: u8) -> u32 {
    ((b as u32) << 16) | ((g as u32) << 8) | (r as u32)
}

/// Splits a packed pick ID into the R/G/B bytes the fragment shader emits.
/// Only used by tests and documentation; the shaders do the same split on
/// the GPU.
#[inline]
pub fn encode_pick_rgb(packed: u32) -> (u8, u8, u8) {
    (
        (packed & 0xff) as u8,
        ((packed >> 8) & 0xff) as u8,
        ((packed >> 16) & 0xff) as u8,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pack_unpack_roundtrip() {
        for n in [0u32, 1, 2, 255, 256, 65_535, 65_536, 16_000_000] {
            assert_eq!(unpack_pick_id(pack_pick_id(n)), Some(n));
        }
    }

    #[test]
    fn zero_is_no_hit() {
        assert_eq!(unpack_pick_id(NO_HIT), None);
    }

    #[test]
    fn rgb_split_roundtrip() {
        for n in [0u32, 1, 300, 70_000, 0x00ff_ffff] {
            let packed = pack_pick_id(n);
            let (r, g, b) = encode_pick_rgb(packed);
            assert_eq!(decode_pick_rgb(r, g, b), packed);
        }
    }

    #[test]
    fn rgb_decode_channel_order() {
        // b<<16 | g<<8 | r
        assert_eq!(decode_pick_rgb(1, 0, 0), 1);
        assert_eq!(decode_pick_rgb(0, 1, 0), 256);
        assert_eq!(decode_pick_rgb(0, 0, 1), 65_536);
    }
}
