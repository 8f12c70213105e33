//! # Identifier Hashing
//!
//! PCP identifies metrics, instances and instance domains by small integer
//! ids derived from their names. The MMV protocol only guarantees 10 bits for
//! a metric item id and 22 bits for instance domain serials, so ids are the
//! low bits of a 32-bit FNV-1a hash of the name. FNV-1a is deterministic
//! across platforms and endianness, which keeps ids stable between the
//! process writing a file and any tool inspecting it.
//!
//! Masking this aggressively makes collisions a real possibility; the
//! registry rejects them at registration time instead of silently aliasing
//! two metrics onto one id.

/// Bit width of a metric item id.
pub(crate) const METRIC_ITEM_BITS: u32 = 10;

/// Bit width of an instance domain serial.
pub(crate) const INDOM_SERIAL_BITS: u32 = 22;

/// Bit width of an instance internal id.
pub(crate) const INSTANCE_ID_BITS: u32 = 22;

/// Bit width of the per-file cluster id.
pub(crate) const CLUSTER_ID_BITS: u32 = 12;

const FNV_OFFSET: u32 = 2166136261;
const FNV_PRIME: u32 = 16777619;

/// 32-bit FNV-1a over the UTF-8 bytes of `name`.
pub(crate) fn fnv1a(name: &str) -> u32 {
    let mut h = FNV_OFFSET;
    for b in name.as_bytes() {
        h ^= u32::from(*b);
        h = h.wrapping_mul(FNV_PRIME);
    }
    h
}

/// Hash of `name` masked to the low `bits` bits.
pub(crate) fn masked(name: &str, bits: u32) -> u32 {
    debug_assert!(bits > 0 && bits < 32);
    fnv1a(name) & ((1 << bits) - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fnv1a_matches_reference_vectors() {
        // Reference values from the canonical 32-bit FNV-1a parameters.
        assert_eq!(fnv1a(""), FNV_OFFSET);
        assert_eq!(fnv1a("http.requests"), 0xf42e54af);
    }

    #[test]
    fn masked_keeps_low_bits_only() {
        assert_eq!(masked("http.requests", METRIC_ITEM_BITS), 175);
        assert!(masked("anything.at.all", METRIC_ITEM_BITS) < 1 << 10);
        assert!(masked("anything.at.all", INDOM_SERIAL_BITS) < 1 << 22);
    }

    #[test]
    fn item_ids_collide_within_ten_bits() {
        // The registry depends on detecting exactly this kind of collision.
        assert_ne!(fnv1a("mem.misses"), fnv1a("mem.ops"));
        assert_eq!(
            masked("mem.misses", METRIC_ITEM_BITS),
            masked("mem.ops", METRIC_ITEM_BITS)
        );
    }
}
