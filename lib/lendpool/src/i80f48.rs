use anchor_lang::prelude::*;
use fixed::types::I80F48;

use crate::error::{CheckedOrErr, Result};

/// The on-chain layout of an I80F48: its 128 bits, little-endian.
///
/// Accounts and instruction arguments carry this instead of `I80F48` so the
/// layout does not depend on how the `fixed` crate serializes.
#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct WrappedI80F48 {
    pub value: [u8; 16],
}

impl From<I80F48> for WrappedI80F48 {
    fn from(i: I80F48) -> Self {
        Self {
            value: i.to_le_bytes(),
        }
    }
}

impl From<WrappedI80F48> for I80F48 {
    fn from(w: WrappedI80F48) -> Self {
        I80F48::from_le_bytes(w.value)
    }
}

impl std::fmt::Debug for WrappedI80F48 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "WrappedI80F48({})", I80F48::from(*self))
    }
}

const POW10_LOOKUP: [I80F48; 13] = [
    I80F48::from_bits((1 << 48) * 10i128.pow(0u32)), // 1
    I80F48::from_bits((1 << 48) * 10i128.pow(1u32)), // 10
    I80F48::from_bits((1 << 48) * 10i128.pow(2u32)), // 100
    I80F48::from_bits((1 << 48) * 10i128.pow(3u32)), // 1000
    I80F48::from_bits((1 << 48) * 10i128.pow(4u32)),
    I80F48::from_bits((1 << 48) * 10i128.pow(5u32)),
    I80F48::from_bits((1 << 48) * 10i128.pow(6u32)),
    I80F48::from_bits((1 << 48) * 10i128.pow(7u32)),
    I80F48::from_bits((1 << 48) * 10i128.pow(8u32)),
    I80F48::from_bits((1 << 48) * 10i128.pow(9u32)),
    I80F48::from_bits((1 << 48) * 10i128.pow(10u32)),
    I80F48::from_bits((1 << 48) * 10i128.pow(11u32)),
    I80F48::from_bits((1 << 48) * 10i128.pow(12u32)),
];

/// 10^decimals as I80F48.
///
/// Exact for every value that fits; errors past 10^23, the largest power of ten
/// below I80F48::MAX.
pub fn pow10(decimals: u8) -> Result<I80F48> {
    if let Some(v) = POW10_LOOKUP.get(decimals as usize) {
        return Ok(*v);
    }
    let mut v = POW10_LOOKUP[POW10_LOOKUP.len() - 1];
    for _ in (POW10_LOOKUP.len() - 1)..(decimals as usize) {
        v = v.checked_mul(I80F48::from(10)).or_math_err("pow10 overflow")?;
    }
    Ok(v)
}

/// Converts a native token amount to ui units.
pub fn native_to_ui(native: I80F48, decimals: u8) -> Result<I80F48> {
    native
        .checked_div(pow10(decimals)?)
        .or_math_err("native to ui")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn wrapped_round_trip_is_bit_exact() {
        let values = [
            I80F48::ZERO,
            I80F48::ONE,
            I80F48::DELTA,
            -I80F48::DELTA,
            I80F48::MAX,
            I80F48::MIN,
            I80F48::from_str("0.8").unwrap(),
            I80F48::from_str("-1234567.000000000001").unwrap(),
            I80F48::from_bits(0x0123_4567_89ab_cdef_fedc_ba98_7654_3210),
        ];
        for (i, v) in values.iter().enumerate() {
            println!("checking testcase {}", i);
            let wrapped = WrappedI80F48::from(*v);
            assert_eq!(I80F48::from(wrapped).to_bits(), v.to_bits());
        }
    }

    #[test]
    fn wrapped_layout_is_little_endian_bits() {
        let wrapped = WrappedI80F48::from(I80F48::ONE);
        let mut expected = [0u8; 16];
        expected[6] = 1; // bit 48
        assert_eq!(wrapped.value, expected);

        let bytes = wrapped.try_to_vec().unwrap();
        assert_eq!(bytes, expected.to_vec());
        assert_eq!(WrappedI80F48::try_from_slice(&bytes).unwrap(), wrapped);
    }

    #[test]
    fn pow10_lookup() {
        for idx in 0u8..=23 {
            assert_eq!(
                pow10(idx).unwrap(),
                I80F48::from_str(&format!("1{}", str::repeat("0", idx as usize))).unwrap()
            );
        }
        assert!(pow10(24).is_err());
    }

    #[test]
    fn native_to_ui_scales_by_decimals() {
        assert_eq!(
            native_to_ui(I80F48::from(1_500_000), 6).unwrap(),
            I80F48::from_num(1.5)
        );
        assert_eq!(native_to_ui(I80F48::from(42), 0).unwrap(), I80F48::from(42));
    }
}
