//! Type model of the bit-precise IR.
//!
//! Two base families exist: fixed-width bit-vectors ([`BitVecType`]) and
//! abstract arrays mapping bit-vectors to bit-vectors ([`ArrayType`]). Two
//! lowering-facing variants ([`VectorArrayType`], [`MemArrayType`]) carry the
//! same element/index contract but are backed by a dense, fixed-length
//! sequence or by a random-access buffer.
//!
//! Types are plain values: two occurrences with the same widths and shape
//! are equal and interchangeable, which is all the interning the IR needs.
use smallvec::SmallVec;
use strum::{EnumIs, EnumTryAs};

/// A fixed-width, signless bit-vector type.
///
/// Width `0` cannot be constructed; every bit-vector carries at least one bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct BitVecType {
    width: u32,
}

impl BitVecType {
    pub const BOOL: Self = Self { width: 1 };
    pub const MIN_WIDTH: u32 = 1;
    pub const MAX_WIDTH: u32 = (1 << 24) - 1;

    /// Creates a bit-vector type, rejecting widths outside
    /// `[MIN_WIDTH, MAX_WIDTH]`.
    #[inline]
    pub const fn new(width: u32) -> Option<Self> {
        if width >= Self::MIN_WIDTH && width <= Self::MAX_WIDTH {
            Some(Self { width })
        } else {
            None
        }
    }

    /// Number of bits of the type.
    #[inline]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Returns `true` for the single-bit (boolean) type.
    #[inline]
    pub const fn is_bool(&self) -> bool {
        self.width == 1
    }
}

impl std::fmt::Display for BitVecType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "!btor.bv<{}>", self.width)
    }
}

/// Abstract, conceptually infinite array from `bv<index>` to `bv<element>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ArrayType {
    pub index: BitVecType,
    pub element: BitVecType,
}

impl ArrayType {
    /// Number of distinct indices (`2^index_width`), or `None` when it does
    /// not fit a `u64`.
    pub fn extent(&self) -> Option<u64> {
        1u64.checked_shl(self.index.width())
    }
}

impl std::fmt::Display for ArrayType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "!btor.array<{}, {}>", self.index, self.element)
    }
}

/// Shape shared by the vector- and memory-backed arrays.
pub type Shape = SmallVec<u64, 2>;

/// Returns `log2(shape[0])` when the shape is a single power-of-two
/// dimension.
fn shape_index_width(shape: &Shape) -> Option<u32> {
    match shape.as_slice() {
        [len] if *len != 0 && len & (len - 1) == 0 => Some(len.trailing_zeros()),
        _ => None,
    }
}

fn fmt_shape(f: &mut std::fmt::Formatter<'_>, shape: &Shape) -> std::fmt::Result {
    for dim in shape.iter() {
        write!(f, "{}x", dim)?;
    }
    Ok(())
}

/// Dense, fixed-length array of bit-vectors.
///
/// The shape is not validated on construction; a non power-of-two or
/// multi-dimensional shape is only rejected by the verifier of the operation
/// that manipulates it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VectorArrayType {
    pub shape: Shape,
    pub element: BitVecType,
}

impl VectorArrayType {
    pub fn new(length: u64, element: BitVecType) -> Self {
        Self {
            shape: smallvec::smallvec![length],
            element,
        }
    }

    /// Index width derived from the length, see [`shape_index_width`].
    pub fn index_width(&self) -> Option<u32> {
        shape_index_width(&self.shape)
    }
}

impl std::fmt::Display for VectorArrayType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "vector<")?;
        fmt_shape(f, &self.shape)?;
        write!(f, "{}>", self.element)
    }
}

/// Array backed by a host-level random-access buffer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MemArrayType {
    pub shape: Shape,
    pub element: BitVecType,
}

impl MemArrayType {
    pub fn new(length: u64, element: BitVecType) -> Self {
        Self {
            shape: smallvec::smallvec![length],
            element,
        }
    }

    pub fn index_width(&self) -> Option<u32> {
        shape_index_width(&self.shape)
    }
}

impl std::fmt::Display for MemArrayType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "memref<")?;
        fmt_shape(f, &self.shape)?;
        write!(f, "{}>", self.element)
    }
}

/// Any type of the IR.
#[derive(Debug, Clone, PartialEq, Eq, Hash, EnumIs, EnumTryAs)]
pub enum Type {
    BitVec(BitVecType),
    Array(ArrayType),
    Vector(VectorArrayType),
    Memory(MemArrayType),
}

impl Type {
    /// Shorthand for `Type::BitVec` of the given width.
    ///
    /// # Panics
    ///
    /// Panics on a width that [`BitVecType::new`] rejects. Only meant for
    /// widths known to be valid at the call site.
    pub fn bv(width: u32) -> Self {
        match BitVecType::new(width) {
            Some(ty) => Type::BitVec(ty),
            None => panic!("invalid bit-vector width {}", width),
        }
    }

    /// Returns the bit-vector type if this is one.
    pub fn as_bitvec(&self) -> Option<BitVecType> {
        match self {
            Type::BitVec(bv) => Some(*bv),
            _ => None,
        }
    }

    /// Element type for any of the array flavours.
    pub fn element(&self) -> Option<BitVecType> {
        match self {
            Type::BitVec(_) => None,
            Type::Array(a) => Some(a.element),
            Type::Vector(v) => Some(v.element),
            Type::Memory(m) => Some(m.element),
        }
    }

    /// Index type for any of the array flavours. For vector and memory arrays
    /// it is only defined when the shape is a single power-of-two dimension.
    pub fn index(&self) -> Option<BitVecType> {
        match self {
            Type::BitVec(_) => None,
            Type::Array(a) => Some(a.index),
            Type::Vector(v) => v.index_width().and_then(BitVecType::new),
            Type::Memory(m) => m.index_width().and_then(BitVecType::new),
        }
    }

    /// Returns `true` for any array flavour.
    pub fn is_any_array(&self) -> bool {
        !matches!(self, Type::BitVec(_))
    }
}

impl From<BitVecType> for Type {
    fn from(value: BitVecType) -> Self {
        Type::BitVec(value)
    }
}

impl From<ArrayType> for Type {
    fn from(value: ArrayType) -> Self {
        Type::Array(value)
    }
}

impl From<VectorArrayType> for Type {
    fn from(value: VectorArrayType) -> Self {
        Type::Vector(value)
    }
}

impl From<MemArrayType> for Type {
    fn from(value: MemArrayType) -> Self {
        Type::Memory(value)
    }
}

impl std::fmt::Display for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Type::BitVec(ty) => ty.fmt(f),
            Type::Array(ty) => ty.fmt(f),
            Type::Vector(ty) => ty.fmt(f),
            Type::Memory(ty) => ty.fmt(f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_width_is_rejected() {
        assert!(BitVecType::new(0).is_none());
        assert_eq!(BitVecType::new(8).map(|t| t.width()), Some(8));
    }

    #[test]
    fn bitvec_equality_is_by_width() {
        assert_eq!(Type::bv(16), Type::bv(16));
        assert_ne!(Type::bv(16), Type::bv(17));
    }

    #[test]
    fn shaped_index_width() {
        let v = VectorArrayType::new(16, BitVecType::BOOL);
        assert_eq!(v.index_width(), Some(4));

        let m = MemArrayType::new(6, BitVecType::BOOL);
        assert_eq!(m.index_width(), None);

        let two_dim = VectorArrayType {
            shape: smallvec::smallvec![4, 4],
            element: BitVecType::BOOL,
        };
        assert_eq!(two_dim.index_width(), None);
    }

    #[test]
    fn display() {
        let arr = ArrayType {
            index: BitVecType::new(4).unwrap(),
            element: BitVecType::new(8).unwrap(),
        };
        assert_eq!(arr.to_string(), "!btor.array<!btor.bv<4>, !btor.bv<8>>");
        assert_eq!(
            VectorArrayType::new(16, BitVecType::new(8).unwrap()).to_string(),
            "vector<16x!btor.bv<8>>"
        );
        assert_eq!(
            MemArrayType::new(16, BitVecType::new(8).unwrap()).to_string(),
            "memref<16x!btor.bv<8>>"
        );
    }
}
