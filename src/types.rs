use fixed::types::I32F32;

const FRAC_SCALE: i128 = 1 << 32;

/// A length in PDF points.
///
/// Values are snapped to the nearest 1/1000 pt on construction and after every
/// operation, so sums come out the same regardless of evaluation order.
#[derive(Debug, Clone, Copy, Default, PartialEq, PartialOrd)]
pub struct Pt(I32F32);

impl Pt {
    pub const ZERO: Pt = Pt(I32F32::from_bits(0));

    pub fn from_f32(value: f32) -> Pt {
        Pt::from_f64(value as f64)
    }

    pub fn from_f64(value: f64) -> Pt {
        if !value.is_finite() {
            return Pt::ZERO;
        }
        let milli = (value * 1000.0)
            .round()
            .clamp(i64::MIN as f64, i64::MAX as f64);
        Pt::from_milli_i64(milli as i64)
    }

    pub fn from_i32(value: i32) -> Pt {
        Pt::from_milli_i64(value as i64 * 1000)
    }

    pub fn from_milli_i64(milli: i64) -> Pt {
        Pt::from_milli(milli as i128)
    }

    pub fn to_f32(self) -> f32 {
        self.0.to_num()
    }

    pub fn to_f64(self) -> f64 {
        self.to_milli_i64() as f64 / 1000.0
    }

    pub fn to_milli_i64(self) -> i64 {
        let scaled = self.0.to_bits() as i128 * 1000;
        let half = if scaled >= 0 { FRAC_SCALE / 2 } else { -FRAC_SCALE / 2 };
        ((scaled + half) / FRAC_SCALE).clamp(i64::MIN as i128, i64::MAX as i128) as i64
    }

    pub fn max(self, other: Pt) -> Pt {
        if other > self { other } else { self }
    }

    pub fn min(self, other: Pt) -> Pt {
        if other < self { other } else { self }
    }

    /// `self * num / denom`, rounded to the nearest milli-point. Zero when `denom` is 0.
    pub fn mul_ratio(self, num: i32, denom: i32) -> Pt {
        let scaled = (self.to_milli_i64() as i128).saturating_mul(num as i128);
        Pt::from_milli(rounded_div(scaled, denom as i128))
    }

    fn from_milli(milli: i128) -> Pt {
        let half = if milli >= 0 { 500 } else { -500 };
        let bits = ((milli * FRAC_SCALE + half) / 1000).clamp(i64::MIN as i128, i64::MAX as i128);
        Pt(I32F32::from_bits(bits as i64))
    }

    fn milli(self) -> i128 {
        self.to_milli_i64() as i128
    }
}

impl std::ops::Add for Pt {
    type Output = Pt;
    fn add(self, rhs: Pt) -> Pt {
        Pt::from_milli(self.milli() + rhs.milli())
    }
}

impl std::ops::Sub for Pt {
    type Output = Pt;
    fn sub(self, rhs: Pt) -> Pt {
        Pt::from_milli(self.milli() - rhs.milli())
    }
}

impl std::ops::Mul<i32> for Pt {
    type Output = Pt;
    fn mul(self, rhs: i32) -> Pt {
        Pt::from_milli(self.milli().saturating_mul(rhs as i128))
    }
}

impl std::ops::Div<i32> for Pt {
    type Output = Pt;
    fn div(self, rhs: i32) -> Pt {
        Pt::from_milli(rounded_div(self.milli(), rhs as i128))
    }
}

impl std::iter::Sum for Pt {
    fn sum<I: Iterator<Item = Pt>>(iter: I) -> Pt {
        iter.fold(Pt::ZERO, |acc, v| acc + v)
    }
}

// Round half away from zero; a zero divisor yields zero.
fn rounded_div(num: i128, den: i128) -> i128 {
    if den == 0 {
        return 0;
    }
    let half = den.abs() / 2;
    if num >= 0 {
        (num + half) / den
    } else {
        -((-num + half) / den)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Size {
    pub width: Pt,
    pub height: Pt,
}

impl Size {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            width: Pt::from_f32(width),
            height: Pt::from_f32(height),
        }
    }

    pub fn a4() -> Self {
        Self::new(595.28, 841.89)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: Pt,
    pub y: Pt,
    pub width: Pt,
    pub height: Pt,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Margins {
    pub top: Pt,
    pub right: Pt,
    pub bottom: Pt,
    pub left: Pt,
}

impl Margins {
    pub fn all(value: f32) -> Self {
        let v = Pt::from_f32(value);
        Self {
            top: v,
            right: v,
            bottom: v,
            left: v,
        }
    }

    // (left, top, right, bottom), the order document definitions usually spell them in.
    pub fn ltrb(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        Self {
            top: Pt::from_f32(top),
            right: Pt::from_f32(right),
            bottom: Pt::from_f32(bottom),
            left: Pt::from_f32(left),
        }
    }

    pub fn vertical(&self) -> Pt {
        self.top + self.bottom
    }

    pub fn horizontal(&self) -> Pt {
        self.left + self.right
    }

    pub fn is_non_negative(&self) -> bool {
        self.top >= Pt::ZERO
            && self.right >= Pt::ZERO
            && self.bottom >= Pt::ZERO
            && self.left >= Pt::ZERO
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Color {
    pub const BLACK: Color = Color {
        r: 0.0,
        g: 0.0,
        b: 0.0,
    };

    pub fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    pub fn gray(level: f32) -> Self {
        Self {
            r: level,
            g: level,
            b: level,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_pt_is_zero() {
        assert_eq!(Pt::default(), Pt::ZERO);
        assert_eq!(Pt::default().to_milli_i64(), 0);
    }

    #[test]
    fn pt_arithmetic_is_milli_exact() {
        let a = Pt::from_f32(0.1);
        let b = Pt::from_f32(0.2);
        assert_eq!((a + b).to_milli_i64(), 300);
        assert_eq!(Pt::from_f32(600.0) - Pt::from_f32(28346.0), Pt::from_i32(-27746));
    }

    #[test]
    fn non_finite_values_collapse_to_zero() {
        assert_eq!(Pt::from_f32(f32::NAN), Pt::ZERO);
        assert_eq!(Pt::from_f32(f32::INFINITY), Pt::ZERO);
        assert_eq!(Pt::from_f64(f64::NAN), Pt::ZERO);
    }

    #[test]
    fn margins_ltrb_maps_fields() {
        let margins = Margins::ltrb(1.0, 2.0, 3.0, 4.0);
        assert_eq!(margins.left, Pt::from_i32(1));
        assert_eq!(margins.top, Pt::from_i32(2));
        assert_eq!(margins.right, Pt::from_i32(3));
        assert_eq!(margins.bottom, Pt::from_i32(4));
        assert_eq!(margins.vertical(), Pt::from_i32(6));
    }
}
