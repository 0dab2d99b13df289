//! Arbitrary-width bit-vector literals and their bit-exact arithmetic.
//!
//! A [`BvConst`] always holds a value in `[0, 2^width)`. Signed operations
//! reinterpret the bits in two's complement. Division and remainder by zero
//! follow the SMT-LIB conventions used by BTOR2:
//!
//! - `udiv x 0 = 2^w - 1`, `urem x 0 = x`
//! - `sdiv x 0 = 1` when `x < 0`, `2^w - 1` otherwise
//! - `srem x 0 = x`, `smod x 0 = x`
use num_bigint::{BigInt, BigUint, Sign};

use crate::types::BitVecType;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BvConst {
    ty: BitVecType,
    value: BigUint,
}

fn one() -> BigUint {
    BigUint::from(1u8)
}

/// `2^width - 1`
fn mask(width: u32) -> BigUint {
    (one() << width as usize) - one()
}

impl BvConst {
    /// Creates a literal, failing when `value` does not fit in `ty`.
    pub fn new(ty: BitVecType, value: BigUint) -> Option<Self> {
        if value.bits() <= ty.width() as u64 {
            Some(Self { ty, value })
        } else {
            None
        }
    }

    /// Creates a literal keeping only the low `ty.width()` bits of `value`.
    pub fn wrapping(ty: BitVecType, value: BigUint) -> Self {
        Self {
            value: value & mask(ty.width()),
            ty,
        }
    }

    pub fn from_u64(ty: BitVecType, value: u64) -> Self {
        Self::wrapping(ty, BigUint::from(value))
    }

    /// Two's complement encoding of a signed integer, wrapped to `ty`.
    pub fn from_signed(ty: BitVecType, value: &BigInt) -> Self {
        let modulus = BigInt::from(one() << ty.width() as usize);
        let wrapped = ((value % &modulus) + &modulus) % &modulus;
        let value = wrapped.to_biguint().unwrap_or_default();
        Self { ty, value }
    }

    pub fn from_bool(value: bool) -> Self {
        Self::from_u64(BitVecType::BOOL, value as u64)
    }

    pub fn zero(ty: BitVecType) -> Self {
        Self {
            ty,
            value: BigUint::ZERO,
        }
    }

    pub fn ones(ty: BitVecType) -> Self {
        Self {
            ty,
            value: mask(ty.width()),
        }
    }

    /// Most negative signed value, `1000...0`.
    pub fn signed_min(ty: BitVecType) -> Self {
        Self {
            ty,
            value: one() << (ty.width() - 1) as usize,
        }
    }

    #[inline]
    pub fn ty(&self) -> BitVecType {
        self.ty
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.ty.width()
    }

    /// Unsigned interpretation.
    #[inline]
    pub fn value(&self) -> &BigUint {
        &self.value
    }

    /// Two's complement interpretation.
    pub fn to_signed(&self) -> BigInt {
        if self.msb() {
            BigInt::from(self.value.clone()) - BigInt::from(one() << self.width() as usize)
        } else {
            BigInt::from(self.value.clone())
        }
    }

    /// Value as `u64` when it fits.
    pub fn to_u64(&self) -> Option<u64> {
        if self.value.bits() > 64 {
            return None;
        }
        Some(self.value.iter_u64_digits().next().unwrap_or(0))
    }

    pub fn is_zero(&self) -> bool {
        self.value == BigUint::ZERO
    }

    pub fn is_ones(&self) -> bool {
        self.value == mask(self.width())
    }

    /// `true` iff the low bit is set; the truth value of a `bv<1>`.
    pub fn is_true(&self) -> bool {
        self.value.bit(0)
    }

    pub fn bit(&self, index: u32) -> bool {
        self.value.bit(index as u64)
    }

    pub fn msb(&self) -> bool {
        self.bit(self.width() - 1)
    }

    /// Bits from the most significant to the least significant, e.g. `00001000`.
    pub fn to_bin_string(&self) -> String {
        (0..self.width())
            .rev()
            .map(|i| if self.bit(i) { '1' } else { '0' })
            .collect()
    }

    fn same(&self, value: BigUint) -> Self {
        Self::wrapping(self.ty, value)
    }

    // Bitwise

    pub fn not(&self) -> Self {
        self.same(&self.value ^ mask(self.width()))
    }

    pub fn and(&self, rhs: &Self) -> Self {
        self.same(&self.value & &rhs.value)
    }

    pub fn or(&self, rhs: &Self) -> Self {
        self.same(&self.value | &rhs.value)
    }

    pub fn xor(&self, rhs: &Self) -> Self {
        self.same(&self.value ^ &rhs.value)
    }

    // Arithmetic, modulo 2^w

    pub fn add(&self, rhs: &Self) -> Self {
        self.same(&self.value + &rhs.value)
    }

    pub fn sub(&self, rhs: &Self) -> Self {
        self.same(&self.value + (mask(self.width()) ^ &rhs.value) + one())
    }

    pub fn mul(&self, rhs: &Self) -> Self {
        self.same(&self.value * &rhs.value)
    }

    pub fn neg(&self) -> Self {
        Self::zero(self.ty).sub(self)
    }

    pub fn inc(&self) -> Self {
        self.add(&Self::from_u64(self.ty, 1))
    }

    pub fn dec(&self) -> Self {
        self.sub(&Self::from_u64(self.ty, 1))
    }

    pub fn udiv(&self, rhs: &Self) -> Self {
        if rhs.is_zero() {
            Self::ones(self.ty)
        } else {
            self.same(&self.value / &rhs.value)
        }
    }

    pub fn urem(&self, rhs: &Self) -> Self {
        if rhs.is_zero() {
            self.clone()
        } else {
            self.same(&self.value % &rhs.value)
        }
    }

    /// Signed division truncating towards zero.
    pub fn sdiv(&self, rhs: &Self) -> Self {
        if rhs.is_zero() {
            return if self.msb() {
                Self::from_u64(self.ty, 1)
            } else {
                Self::ones(self.ty)
            };
        }
        Self::from_signed(self.ty, &(self.to_signed() / rhs.to_signed()))
    }

    /// Signed remainder, sign follows the dividend.
    pub fn srem(&self, rhs: &Self) -> Self {
        if rhs.is_zero() {
            return self.clone();
        }
        Self::from_signed(self.ty, &(self.to_signed() % rhs.to_signed()))
    }

    /// Signed modulo, sign follows the divisor.
    pub fn smod(&self, rhs: &Self) -> Self {
        if rhs.is_zero() {
            return self.clone();
        }
        let (a, b) = (self.to_signed(), rhs.to_signed());
        let r = &a % &b;
        let differ = (r.sign() == Sign::Minus) != (b.sign() == Sign::Minus);
        let adjusted = if r.sign() != Sign::NoSign && differ {
            r + b
        } else {
            r
        };
        Self::from_signed(self.ty, &adjusted)
    }

    /// Shift amount saturated to the width, so that shifting by more than
    /// the width behaves like shifting by exactly the width.
    fn shift_amount(&self, rhs: &Self) -> usize {
        match rhs.to_u64() {
            Some(s) if s < self.width() as u64 => s as usize,
            _ => self.width() as usize,
        }
    }

    pub fn sll(&self, rhs: &Self) -> Self {
        self.same(&self.value << self.shift_amount(rhs))
    }

    pub fn srl(&self, rhs: &Self) -> Self {
        self.same(&self.value >> self.shift_amount(rhs))
    }

    pub fn sra(&self, rhs: &Self) -> Self {
        let amount = self.shift_amount(rhs);
        let logical = &self.value >> amount;
        if !self.msb() || amount == 0 {
            return self.same(logical);
        }
        // Fill the vacated high bits with ones.
        let fill = mask(self.width()) ^ (mask(self.width()) >> amount);
        self.same(logical | fill)
    }

    fn rotate_left_by(&self, amount: u64) -> Self {
        let w = self.width() as u64;
        let amount = (amount % w) as usize;
        if amount == 0 {
            return self.clone();
        }
        self.same((&self.value << amount) | (&self.value >> (w as usize - amount)))
    }

    /// Amount reduced modulo the width.
    fn rotation(&self, rhs: &Self) -> u64 {
        (&rhs.value % BigUint::from(self.width()))
            .iter_u64_digits()
            .next()
            .unwrap_or(0)
    }

    /// Rotation by `rhs mod width`.
    pub fn rol(&self, rhs: &Self) -> Self {
        self.rotate_left_by(self.rotation(rhs))
    }

    pub fn ror(&self, rhs: &Self) -> Self {
        let w = self.width() as u64;
        self.rotate_left_by((w - self.rotation(rhs)) % w)
    }

    // Comparisons

    pub fn ult(&self, rhs: &Self) -> bool {
        self.value < rhs.value
    }

    pub fn slt(&self, rhs: &Self) -> bool {
        self.to_signed() < rhs.to_signed()
    }

    // Overflow predicates

    pub fn uaddo(&self, rhs: &Self) -> bool {
        (&self.value + &rhs.value).bits() > self.width() as u64
    }

    pub fn saddo(&self, rhs: &Self) -> bool {
        self.signed_out_of_range(&(self.to_signed() + rhs.to_signed()))
    }

    pub fn usubo(&self, rhs: &Self) -> bool {
        self.value < rhs.value
    }

    pub fn ssubo(&self, rhs: &Self) -> bool {
        self.signed_out_of_range(&(self.to_signed() - rhs.to_signed()))
    }

    pub fn umulo(&self, rhs: &Self) -> bool {
        (&self.value * &rhs.value).bits() > self.width() as u64
    }

    pub fn smulo(&self, rhs: &Self) -> bool {
        self.signed_out_of_range(&(self.to_signed() * rhs.to_signed()))
    }

    /// Only `MIN / -1` overflows.
    pub fn sdivo(&self, rhs: &Self) -> bool {
        *self == Self::signed_min(self.ty) && rhs.is_ones()
    }

    /// Unsigned division never overflows.
    pub fn udivo(&self, _rhs: &Self) -> bool {
        false
    }

    fn signed_out_of_range(&self, value: &BigInt) -> bool {
        let half = BigInt::from(one() << (self.width() - 1) as usize);
        *value >= half || *value < -half
    }

    // Structural

    pub fn uext(&self, to: BitVecType) -> Self {
        Self::wrapping(to, self.value.clone())
    }

    pub fn sext(&self, to: BitVecType) -> Self {
        Self::from_signed(to, &self.to_signed())
    }

    /// Bits `upper..=lower`, `upper` and `lower` must be in range.
    pub fn slice(&self, upper: u32, lower: u32) -> Option<Self> {
        if lower > upper || upper >= self.width() {
            return None;
        }
        let ty = BitVecType::new(upper - lower + 1)?;
        Some(Self::wrapping(ty, &self.value >> lower as usize))
    }

    /// `self` occupies the high bits, `low` the low bits.
    pub fn concat(&self, low: &Self) -> Option<Self> {
        let ty = BitVecType::new(self.width().checked_add(low.width())?)?;
        Some(Self::wrapping(
            ty,
            (&self.value << low.width() as usize) | &low.value,
        ))
    }

    pub fn redand(&self) -> bool {
        self.is_ones()
    }

    pub fn redor(&self) -> bool {
        !self.is_zero()
    }

    pub fn redxor(&self) -> bool {
        self.value.count_ones() % 2 == 1
    }
}

impl std::fmt::Display for BvConst {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.value)
    }
}
