//! Difficulty targets
//!
//! A result is accepted when, read as a big-endian 256-bit number, it is at
//! or below the boundary `2^256 / difficulty`.

use crate::params::H256_BYTES;
use crate::primitives::H256;

/// `true` if `hash <= boundary`, both big-endian
#[inline]
pub fn check_difficulty(hash: &H256, boundary: &H256) -> bool {
    hash <= boundary
}

/// Boundary for a difficulty, `2^256 / difficulty`
///
/// Difficulties 0 and 1 accept every hash.
pub fn boundary_from_difficulty(difficulty: u64) -> H256 {
    if difficulty <= 1 {
        return [0xff; H256_BYTES];
    }

    // Long division of 2^256 (a one followed by 32 zero bytes) by `difficulty`
    let divisor = difficulty as u128;
    let mut remainder: u128 = 1;
    let mut boundary = [0u8; H256_BYTES];
    for byte in boundary.iter_mut() {
        let acc = remainder << 8;
        *byte = (acc / divisor) as u8;
        remainder = acc % divisor;
    }
    boundary
}

/// Pre-verification: recompute the result from the claimed mix digest and
/// check it against `boundary`, without any cache or dataset
pub fn quick_check_difficulty(
    header_hash: &H256,
    nonce: u64,
    mix_digest: &H256,
    boundary: &H256,
) -> bool {
    let result = crate::hashimoto::quick_hash(header_hash, nonce, mix_digest);
    check_difficulty(&result, boundary)
}

/// Check if a hash has at least `zero_bits` leading zero bits
///
/// # Example
///
/// ```rust
/// use krash_core::meets_difficulty;
///
/// let mut hash = [0xFFu8; 32];
/// hash[0] = 0x00;
/// hash[1] = 0x0F;
/// assert!(meets_difficulty(&hash, 12));
/// assert!(!meets_difficulty(&hash, 13));
/// ```
#[inline(always)]
pub fn meets_difficulty(hash: &H256, zero_bits: u32) -> bool {
    let mut count = 0u32;
    for byte in hash.iter() {
        if *byte == 0 {
            count += 8;
        } else {
            count += byte.leading_zeros();
            break;
        }
    }
    count >= zero_bits
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boundary_powers_of_two() {
        let b = boundary_from_difficulty(2);
        assert_eq!(b[0], 0x80);
        assert!(b[1..].iter().all(|&x| x == 0));

        let b = boundary_from_difficulty(1 << 16);
        assert_eq!(&b[..3], &[0x00, 0x01, 0x00]);
        assert!(b[3..].iter().all(|&x| x == 0));
    }

    #[test]
    fn test_boundary_non_power_of_two() {
        // 2^256 / 3 = 0x5555...55
        let b = boundary_from_difficulty(3);
        assert!(b.iter().all(|&x| x == 0x55));
    }

    #[test]
    fn test_trivial_difficulty_accepts_everything() {
        assert_eq!(boundary_from_difficulty(0), [0xff; 32]);
        assert_eq!(boundary_from_difficulty(1), [0xff; 32]);
        assert!(check_difficulty(&[0xff; 32], &boundary_from_difficulty(1)));
    }

    #[test]
    fn test_check_difficulty_is_big_endian() {
        let boundary = boundary_from_difficulty(256);
        assert_eq!(boundary[0], 0x01);

        let mut hash = [0u8; 32];
        hash[0] = 0x01;
        assert!(check_difficulty(&hash, &boundary)); // equal is accepted
        hash[31] = 0x01;
        assert!(!check_difficulty(&hash, &boundary));

        let mut low = [0xffu8; 32];
        low[0] = 0x00;
        assert!(check_difficulty(&low, &boundary));
    }

    #[test]
    fn test_meets_difficulty() {
        let mut hash = [0xFFu8; 32];
        hash[0] = 0x00;
        assert!(meets_difficulty(&hash, 8));
        assert!(!meets_difficulty(&hash, 9));
        hash[1] = 0x00;
        hash[2] = 0x0F;
        assert!(meets_difficulty(&hash, 20));
        assert!(!meets_difficulty(&hash, 21));
        assert!(meets_difficulty(&[0u8; 32], 256));
    }
}
