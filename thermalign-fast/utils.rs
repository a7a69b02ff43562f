//! Utility functions for corner detection algorithms

/// Check if the 16-bit circular mask holds a run of at least `min_count` set bits,
/// wrapping from bit 15 back to bit 0.
pub fn has_contiguous_arc(mask: u16, min_count: usize) -> bool {
    if min_count > 16 || min_count == 0 {
        return false;
    }
    if mask == u16::MAX {
        return true;
    }

    // For a run of length n we need: mask & rotl(mask, 1) & ... & rotl(mask, n-1)
    let mut test_mask = mask;
    for i in 1..min_count {
        test_mask &= mask.rotate_left(i as u32);
        if test_mask == 0 {
            return false;
        }
    }

    test_mask != 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    /// Reference implementation scanning the ring twice to handle wrap-around
    fn has_contiguous_arc_scan(mask: u16, min_count: usize) -> bool {
        if min_count > 16 || min_count == 0 {
            return false;
        }

        let mut current = 0;
        for i in 0..32 {
            if mask & (1 << (i % 16)) != 0 {
                current += 1;
                if current >= min_count {
                    return true;
                }
            } else {
                current = 0;
            }
        }

        false
    }

    #[test]
    fn test_contiguous_simple() {
        let mask = 0b0000_0001_1111_1111u16;
        assert!(has_contiguous_arc(mask, 9));
        assert!(!has_contiguous_arc(mask, 10));
    }

    #[test]
    fn test_contiguous_wrap_around() {
        // bits 12..16 and 0..5
        let mask = 0b1111_0000_0001_1111u16;
        assert!(has_contiguous_arc(mask, 9));
        assert!(!has_contiguous_arc(mask, 10));
    }

    #[test]
    fn test_alternating_bits() {
        assert!(!has_contiguous_arc(0b0101_0101_0101_0101, 2));
        assert!(has_contiguous_arc(0b0101_0101_0101_0101, 1));
    }

    #[test]
    fn test_full_and_empty() {
        assert!(has_contiguous_arc(u16::MAX, 16));
        assert!(!has_contiguous_arc(0, 1));
        assert!(!has_contiguous_arc(u16::MAX, 0));
    }

    proptest! {
        #[test]
        fn prop_bitmask_matches_scan(mask in any::<u16>(), min_count in 1usize..=16) {
            prop_assert_eq!(has_contiguous_arc(mask, min_count), has_contiguous_arc_scan(mask, min_count));
        }
    }
}
