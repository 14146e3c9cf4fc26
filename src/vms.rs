//! Conversions between VAX floating point and IEEE 754
//!
//! The device libraries behind the SLC providers still exchange floats in the
//! VAX formats. Both store their 16-bit words most significant first, which on
//! a little-endian read puts the words in reverse order.
//!
//! A VAX float is `0.1fff... * 2^(exp - 128)` with a hidden leading bit, and an
//! exponent of zero means zero. The formats have no infinities or NaNs, so
//! anything outside the VAX range saturates to the largest finite value.

/// A VAX F_floating value, as read from a device library
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct VaxF(pub u32);

/// A VAX D_floating value, as read from a device library
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct VaxD(pub u64);

const F_FRACTION_BITS: u32 = 23;
const D_FRACTION_BITS: u32 = 55;
const EXPONENT_MAX: u64 = 0xFF;

fn reverse_words(value: u64) -> u64 {
    (value >> 48)
        | ((value >> 16) & 0xFFFF_0000)
        | ((value << 16) & 0xFFFF_0000_0000)
        | (value << 48)
}

impl VaxF {
    pub const MAX: VaxF = VaxF(0xFFFF_7FFF);

    pub fn to_f32(self) -> f32 {
        let bits = self.0.rotate_left(16);
        let exponent = (bits >> F_FRACTION_BITS) & 0xFF;
        if exponent == 0 {
            return 0.0;
        }
        let mantissa = (bits & 0x7F_FFFF) | 0x80_0000;
        // 24 significant bits, exact in f64
        let magnitude = mantissa as f64 * 2f64.powi(exponent as i32 - 152);
        let value = magnitude as f32;
        if bits >> 31 == 1 { -value } else { value }
    }

    pub fn from_f32(value: f32) -> VaxF {
        if value == 0.0 || value.is_nan() {
            return VaxF(0);
        }
        let ieee = value.to_bits();
        let sign = ieee & 0x8000_0000;
        let ieee_exponent = (ieee >> 23) & 0xFF;
        let fraction = ieee & 0x7F_FFFF;

        let (exponent, fraction) = if ieee_exponent == 0 {
            // Denormal: only the very top of the range survives in VAX F
            let top = 31 - fraction.leading_zeros();
            let exponent = top as i32 - 20;
            if exponent < 1 {
                return VaxF(0);
            }
            (exponent as u32, (fraction << (23 - top)) & 0x7F_FFFF)
        } else if ieee_exponent + 2 > EXPONENT_MAX as u32 {
            return VaxF(Self::MAX.0 | sign.rotate_left(16));
        } else {
            (ieee_exponent + 2, fraction)
        };
        VaxF((sign | (exponent << F_FRACTION_BITS) | fraction).rotate_left(16))
    }
}

impl From<f32> for VaxF {
    fn from(value: f32) -> Self {
        VaxF::from_f32(value)
    }
}

impl From<VaxF> for f32 {
    fn from(value: VaxF) -> Self {
        value.to_f32()
    }
}

impl VaxD {
    pub const MAX: VaxD = VaxD(0xFFFF_FFFF_FFFF_7FFF);

    pub fn to_f64(self) -> f64 {
        let bits = reverse_words(self.0);
        let exponent = (bits >> D_FRACTION_BITS) & EXPONENT_MAX;
        if exponent == 0 {
            return 0.0;
        }
        let mantissa = (bits & ((1 << D_FRACTION_BITS) - 1)) | (1 << D_FRACTION_BITS);
        let magnitude = mantissa as f64 * 2f64.powi(exponent as i32 - 184);
        if bits >> 63 == 1 { -magnitude } else { magnitude }
    }

    pub fn from_f64(value: f64) -> VaxD {
        if value == 0.0 || value.is_nan() {
            return VaxD(0);
        }
        let ieee = value.to_bits();
        let sign = ieee & (1 << 63);
        let ieee_exponent = ((ieee >> 52) & 0x7FF) as i64;
        let fraction = ieee & ((1 << 52) - 1);

        // Denormals and anything below 2^-129 are too small for VAX D
        let exponent = ieee_exponent - 894;
        if ieee_exponent == 0 || exponent < 1 {
            return VaxD(0);
        }
        if exponent > EXPONENT_MAX as i64 {
            return VaxD(Self::MAX.0 | reverse_words(sign));
        }
        let bits = sign | ((exponent as u64) << D_FRACTION_BITS) | (fraction << 3);
        VaxD(reverse_words(bits))
    }
}

impl From<f64> for VaxD {
    fn from(value: f64) -> Self {
        VaxD::from_f64(value)
    }
}

impl From<VaxD> for f64 {
    fn from(value: VaxD) -> Self {
        value.to_f64()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_f_values() {
        assert_eq!(VaxF::from_f32(1.0), VaxF(0x0000_4080));
        assert_eq!(VaxF::from_f32(-1.0), VaxF(0x0000_C080));
        assert_eq!(VaxF(0x0000_4080).to_f32(), 1.0);
        assert_eq!(VaxF(0x0000_4220).to_f32(), 10.0);
        assert_eq!(VaxF(0x0000_4120).to_f32(), 2.5);
        assert_eq!(VaxF(0).to_f32(), 0.0);
        // Reserved operand, treated as zero
        assert_eq!(VaxF(0x0000_8000).to_f32(), 0.0);
    }

    #[test]
    fn f_conversion_preserves_value() {
        for value in [0.15625f32, -123.456, 476.0e6, 1.0e-20, 3.0e-39] {
            assert_eq!(VaxF::from_f32(value).to_f32(), value);
        }
    }

    #[test]
    fn f_saturates() {
        assert_eq!(VaxF::from_f32(f32::MAX), VaxF::MAX);
        assert_eq!(VaxF::from_f32(f32::INFINITY), VaxF::MAX);
        assert!(VaxF::from_f32(f32::NEG_INFINITY).to_f32() < -1.7e38);
        assert_eq!(VaxF::from_f32(1.0e-44), VaxF(0));
    }

    #[test]
    fn known_d_values() {
        assert_eq!(VaxD::from_f64(1.0), VaxD(0x4080));
        assert_eq!(VaxD(0x4080).to_f64(), 1.0);
        assert_eq!(VaxD(0).to_f64(), 0.0);
    }

    #[test]
    fn d_conversion_preserves_value() {
        for value in [476.000_123_456_789f64, -0.001, 2.5e30, -1.0e-35] {
            assert_eq!(VaxD::from_f64(value).to_f64(), value);
        }
        assert_eq!(VaxD::from_f64(1.0e300), VaxD::MAX);
        assert_eq!(VaxD::from_f64(1.0e-300), VaxD(0));
    }
}
