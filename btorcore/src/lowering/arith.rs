//! `btor` to `arith` lowering.
//!
//! Every bit-vector operation is re-expressed with the generic integer
//! operations of the `arith` dialect, bit for bit. The `arith` division,
//! remainder and shift operations are unspecified for a zero divisor, the
//! signed `MIN / -1` case and out-of-range shift amounts, so every use is
//! guarded with a `select`:
//!
//! - a zero divisor is replaced by one, and the SMT-LIB result for division
//!   by zero is selected afterwards;
//! - signed division and remainders are computed on magnitudes with the
//!   unsigned operations, then signed back;
//! - shift amounts not below the width are replaced by zero, and the result
//!   of the over-wide shift (zero, or the sign fill) is selected afterwards.
//!
//! Sources, assertions and vector/memory array operations are kept.
//! Abstract arrays have no arithmetic form.
use btorinstr::{
    consts::BvConst,
    modules::{
        BlockKind, Model,
        builder::OpBuilder,
        instructions::{
            AnyInstr, BtorInstr, Instruction, InstructionFlags, Operation,
            arith::{ArithBinaryVariant as A, ArithCastVariant},
            bv::{
                BinaryVariant, BvBinary, CmpPredicate, ExtVariant, LogicVariant, OverflowVariant,
                ReduceVariant, UnaryVariant,
            },
        },
        operand::Operand,
    },
    types::{BitVecType, Type},
};
use log::{debug, info};

use crate::{
    lowering::{Rewriter, rewrite_model},
    pass::{Dialects, Pass, PassKind},
    utils::error::{BtorError, BtorResult},
};

#[derive(Debug, Clone, Copy, Default)]
pub struct ArithLowering;

/// Emits `arith` operations into a builder.
struct Emitter<'b> {
    b: &'b mut OpBuilder,
}

fn bitvec(operand: &Operand) -> BtorResult<BitVecType> {
    operand.ty.as_bitvec().ok_or_else(|| {
        BtorError::Verify(btorinstr::utils::Error::ExpectedBitVec {
            op: "arith",
            what: "operand",
            found: operand.ty.clone(),
        })
    })
}

impl Emitter<'_> {
    fn constant(&mut self, value: BvConst) -> BtorResult<Operand> {
        Ok(self.b.arith_constant(value)?)
    }

    fn uint(&mut self, ty: BitVecType, value: u64) -> BtorResult<Operand> {
        self.constant(BvConst::from_u64(ty, value))
    }

    fn zero(&mut self, ty: BitVecType) -> BtorResult<Operand> {
        self.constant(BvConst::zero(ty))
    }

    fn ones(&mut self, ty: BitVecType) -> BtorResult<Operand> {
        self.constant(BvConst::ones(ty))
    }

    fn bin(&mut self, variant: A, lhs: &Operand, rhs: &Operand) -> BtorResult<Operand> {
        Ok(self.b.arith_binary(variant, lhs, rhs)?)
    }

    fn cmp(&mut self, predicate: CmpPredicate, lhs: &Operand, rhs: &Operand) -> BtorResult<Operand> {
        Ok(self.b.arith_cmp(predicate, lhs, rhs)?)
    }

    fn select(&mut self, cond: &Operand, t: &Operand, e: &Operand) -> BtorResult<Operand> {
        Ok(self.b.select(cond, t, e)?)
    }

    fn cast(&mut self, variant: ArithCastVariant, x: &Operand, to: BitVecType) -> BtorResult<Operand> {
        Ok(self.b.cast(variant, x, to)?)
    }

    fn not(&mut self, x: &Operand) -> BtorResult<Operand> {
        let ones = self.ones(bitvec(x)?)?;
        self.bin(A::XOrI, x, &ones)
    }

    fn neg(&mut self, x: &Operand) -> BtorResult<Operand> {
        let zero = self.zero(bitvec(x)?)?;
        self.bin(A::SubI, &zero, x)
    }

    fn is_zero(&mut self, x: &Operand) -> BtorResult<Operand> {
        let zero = self.zero(bitvec(x)?)?;
        self.cmp(CmpPredicate::Eq, x, &zero)
    }

    fn is_negative(&mut self, x: &Operand) -> BtorResult<Operand> {
        let zero = self.zero(bitvec(x)?)?;
        self.cmp(CmpPredicate::Slt, x, &zero)
    }

    /// `|x|`, where `|MIN|` is `MIN` read as unsigned.
    fn magnitude(&mut self, x: &Operand, negative: &Operand) -> BtorResult<Operand> {
        let neg = self.neg(x)?;
        self.select(negative, &neg, x)
    }

    /// Divisor with zero replaced by one, and the zero test.
    fn safe_divisor(&mut self, divisor: &Operand) -> BtorResult<(Operand, Operand)> {
        let ty = bitvec(divisor)?;
        let zero = self.is_zero(divisor)?;
        let one = self.uint(ty, 1)?;
        let safe = self.select(&zero, &one, divisor)?;
        Ok((safe, zero))
    }

    fn udiv(&mut self, a: &Operand, b: &Operand) -> BtorResult<Operand> {
        let (safe, zero) = self.safe_divisor(b)?;
        let quotient = self.bin(A::DivUI, a, &safe)?;
        let ones = self.ones(bitvec(a)?)?;
        self.select(&zero, &ones, &quotient)
    }

    fn urem(&mut self, a: &Operand, b: &Operand) -> BtorResult<Operand> {
        let (safe, zero) = self.safe_divisor(b)?;
        let remainder = self.bin(A::RemUI, a, &safe)?;
        self.select(&zero, a, &remainder)
    }

    /// Signs and magnitudes of both operands, the guarded magnitude of `b`
    /// and its zero test.
    fn signed_parts(&mut self, a: &Operand, b: &Operand) -> BtorResult<SignedParts> {
        let a_neg = self.is_negative(a)?;
        let b_neg = self.is_negative(b)?;
        let a_abs = self.magnitude(a, &a_neg)?;
        let b_abs = self.magnitude(b, &b_neg)?;
        let (b_safe, b_zero) = self.safe_divisor(&b_abs)?;
        Ok(SignedParts {
            a_neg,
            b_neg,
            a_abs,
            b_safe,
            b_zero,
        })
    }

    /// `sdiv x 0` is `1` for a negative `x`, all ones otherwise.
    fn sdiv(&mut self, a: &Operand, b: &Operand) -> BtorResult<Operand> {
        let ty = bitvec(a)?;
        let p = self.signed_parts(a, b)?;
        let quotient = self.bin(A::DivUI, &p.a_abs, &p.b_safe)?;
        let negated = self.neg(&quotient)?;
        let opposite = self.bin(A::XOrI, &p.a_neg, &p.b_neg)?;
        let signed = self.select(&opposite, &negated, &quotient)?;

        let one = self.uint(ty, 1)?;
        let ones = self.ones(ty)?;
        let by_zero = self.select(&p.a_neg, &one, &ones)?;
        self.select(&p.b_zero, &by_zero, &signed)
    }

    /// Sign of the dividend, `srem x 0 = x`.
    fn srem(&mut self, a: &Operand, b: &Operand) -> BtorResult<Operand> {
        let p = self.signed_parts(a, b)?;
        let remainder = self.bin(A::RemUI, &p.a_abs, &p.b_safe)?;
        let negated = self.neg(&remainder)?;
        let signed = self.select(&p.a_neg, &negated, &remainder)?;
        self.select(&p.b_zero, a, &signed)
    }

    /// Sign of the divisor, `smod x 0 = x`.
    fn smod(&mut self, a: &Operand, b: &Operand) -> BtorResult<Operand> {
        let p = self.signed_parts(a, b)?;
        let u = self.bin(A::RemUI, &p.a_abs, &p.b_safe)?;
        let neg_u = self.neg(&u)?;
        let neg_u_plus_b = self.bin(A::AddI, &neg_u, b)?;
        let u_plus_b = self.bin(A::AddI, &u, b)?;

        let when_a_neg = self.select(&p.b_neg, &neg_u, &neg_u_plus_b)?;
        let when_a_pos = self.select(&p.b_neg, &u_plus_b, &u)?;
        let signed = self.select(&p.a_neg, &when_a_neg, &when_a_pos)?;

        let exact = self.is_zero(&u)?;
        let signed = self.select(&exact, &u, &signed)?;
        self.select(&p.b_zero, a, &signed)
    }

    /// Amount with out-of-range values replaced by zero, and the
    /// out-of-range test.
    fn safe_amount(&mut self, amount: &Operand) -> BtorResult<(Operand, Operand)> {
        let ty = bitvec(amount)?;
        let width = self.uint(ty, ty.width() as u64)?;
        let over = self.cmp(CmpPredicate::Uge, amount, &width)?;
        let zero = self.zero(ty)?;
        let safe = self.select(&over, &zero, amount)?;
        Ok((safe, over))
    }

    fn shift(&mut self, variant: BinaryVariant, a: &Operand, amount: &Operand) -> BtorResult<Operand> {
        let ty = bitvec(a)?;
        let (safe, over) = self.safe_amount(amount)?;
        let (op, fill) = match variant {
            BinaryVariant::Sll => (A::ShLI, self.zero(ty)?),
            BinaryVariant::Srl => (A::ShRUI, self.zero(ty)?),
            _ => {
                let top = self.uint(ty, ty.width() as u64 - 1)?;
                (A::ShRSI, self.bin(A::ShRSI, a, &top)?)
            }
        };
        let shifted = self.bin(op, a, &safe)?;
        self.select(&over, &fill, &shifted)
    }

    /// Rotation by `amount mod width`. The complementary shift is by
    /// `width - r`, replaced by zero when `r = 0`.
    fn rotate(&mut self, left: bool, a: &Operand, amount: &Operand) -> BtorResult<Operand> {
        let ty = bitvec(a)?;
        let width = self.uint(ty, ty.width() as u64)?;
        let r = self.bin(A::RemUI, amount, &width)?;
        let back = self.bin(A::SubI, &width, &r)?;
        let r_zero = self.is_zero(&r)?;
        let zero = self.zero(ty)?;
        let back = self.select(&r_zero, &zero, &back)?;

        let (first, second) = if left {
            (A::ShLI, A::ShRUI)
        } else {
            (A::ShRUI, A::ShLI)
        };
        let main = self.bin(first, a, &r)?;
        let wrapped = self.bin(second, a, &back)?;
        self.bin(A::OrI, &main, &wrapped)
    }

    fn binary(&mut self, instr: &BvBinary) -> BtorResult<Operand> {
        let (a, b) = (&instr.lhs, &instr.rhs);
        match instr.variant {
            BinaryVariant::Add => self.bin(A::AddI, a, b),
            BinaryVariant::Sub => self.bin(A::SubI, a, b),
            BinaryVariant::Mul => self.bin(A::MulI, a, b),
            BinaryVariant::UDiv => self.udiv(a, b),
            BinaryVariant::URem => self.urem(a, b),
            BinaryVariant::SDiv => self.sdiv(a, b),
            BinaryVariant::SRem => self.srem(a, b),
            BinaryVariant::SMod => self.smod(a, b),
            BinaryVariant::And => self.bin(A::AndI, a, b),
            BinaryVariant::Or => self.bin(A::OrI, a, b),
            BinaryVariant::Xor => self.bin(A::XOrI, a, b),
            BinaryVariant::Nand => {
                let x = self.bin(A::AndI, a, b)?;
                self.not(&x)
            }
            BinaryVariant::Nor => {
                let x = self.bin(A::OrI, a, b)?;
                self.not(&x)
            }
            BinaryVariant::Xnor => {
                let x = self.bin(A::XOrI, a, b)?;
                self.not(&x)
            }
            BinaryVariant::Sll | BinaryVariant::Srl | BinaryVariant::Sra => {
                self.shift(instr.variant, a, b)
            }
            BinaryVariant::Rol => self.rotate(true, a, b),
            BinaryVariant::Ror => self.rotate(false, a, b),
        }
    }

    fn overflow(&mut self, variant: OverflowVariant, a: &Operand, b: &Operand) -> BtorResult<Operand> {
        let ty = bitvec(a)?;
        match variant {
            OverflowVariant::UAddO => {
                let sum = self.bin(A::AddI, a, b)?;
                self.cmp(CmpPredicate::Ult, &sum, a)
            }
            OverflowVariant::SAddO => {
                // Both operands differ in sign from the sum.
                let sum = self.bin(A::AddI, a, b)?;
                let x = self.bin(A::XOrI, &sum, a)?;
                let y = self.bin(A::XOrI, &sum, b)?;
                let both = self.bin(A::AndI, &x, &y)?;
                self.is_negative(&both)
            }
            OverflowVariant::USubO => self.cmp(CmpPredicate::Ult, a, b),
            OverflowVariant::SSubO => {
                // Operands differ in sign, and the difference differs from `a`.
                let diff = self.bin(A::SubI, a, b)?;
                let x = self.bin(A::XOrI, a, b)?;
                let y = self.bin(A::XOrI, a, &diff)?;
                let both = self.bin(A::AndI, &x, &y)?;
                self.is_negative(&both)
            }
            OverflowVariant::UMulO => {
                let wide = double(ty)?;
                let a = self.cast(ArithCastVariant::ExtUI, a, wide)?;
                let b = self.cast(ArithCastVariant::ExtUI, b, wide)?;
                let product = self.bin(A::MulI, &a, &b)?;
                let width = self.uint(wide, ty.width() as u64)?;
                let high = self.bin(A::ShRUI, &product, &width)?;
                let zero = self.zero(wide)?;
                self.cmp(CmpPredicate::Ne, &high, &zero)
            }
            OverflowVariant::SMulO => {
                let wide = double(ty)?;
                let a = self.cast(ArithCastVariant::ExtSI, a, wide)?;
                let b = self.cast(ArithCastVariant::ExtSI, b, wide)?;
                let product = self.bin(A::MulI, &a, &b)?;
                let narrow = self.cast(ArithCastVariant::TruncI, &product, ty)?;
                let back = self.cast(ArithCastVariant::ExtSI, &narrow, wide)?;
                self.cmp(CmpPredicate::Ne, &back, &product)
            }
            OverflowVariant::SDivO => {
                let min = self.constant(BvConst::signed_min(ty))?;
                let ones = self.ones(ty)?;
                let a_min = self.cmp(CmpPredicate::Eq, a, &min)?;
                let b_ones = self.cmp(CmpPredicate::Eq, b, &ones)?;
                self.bin(A::AndI, &a_min, &b_ones)
            }
            OverflowVariant::UDivO => self.zero(BitVecType::BOOL),
        }
    }

    /// Parity of the bits of `x`, folding the high half onto the low half.
    fn parity(&mut self, x: &Operand) -> BtorResult<Operand> {
        let mut value = x.clone();
        let mut width = bitvec(x)?.width();
        while width > 1 {
            let low_width = width.div_ceil(2);
            let high_width = width - low_width;
            let ty = bitvec(&value)?;
            let low_ty = BitVecType::new(low_width).ok_or_else(|| unreachable_width(low_width))?;
            let high_ty = BitVecType::new(high_width).ok_or_else(|| unreachable_width(high_width))?;

            let low = self.cast(ArithCastVariant::TruncI, &value, low_ty)?;
            let amount = self.uint(ty, low_width as u64)?;
            let shifted = self.bin(A::ShRUI, &value, &amount)?;
            let high = self.cast(ArithCastVariant::TruncI, &shifted, high_ty)?;
            let high = if high_width < low_width {
                self.cast(ArithCastVariant::ExtUI, &high, low_ty)?
            } else {
                high
            };
            value = self.bin(A::XOrI, &low, &high)?;
            width = low_width;
        }
        Ok(value)
    }

    fn reduce(&mut self, variant: ReduceVariant, x: &Operand) -> BtorResult<Operand> {
        let ty = bitvec(x)?;
        match variant {
            ReduceVariant::RedAnd => {
                let ones = self.ones(ty)?;
                self.cmp(CmpPredicate::Eq, x, &ones)
            }
            ReduceVariant::RedOr => {
                let zero = self.zero(ty)?;
                self.cmp(CmpPredicate::Ne, x, &zero)
            }
            ReduceVariant::RedXor => self.parity(x),
        }
    }

    /// Bits `lower + width(result) - 1 ..= lower` of `x`.
    fn slice(&mut self, x: &Operand, lower: &Operand, result: BitVecType) -> BtorResult<Operand> {
        let shifted = self.shift(BinaryVariant::Srl, x, lower)?;
        if result == bitvec(x)? {
            return Ok(shifted);
        }
        self.cast(ArithCastVariant::TruncI, &shifted, result)
    }

    fn concat(&mut self, high: &Operand, low: &Operand, result: BitVecType) -> BtorResult<Operand> {
        let high = self.cast(ArithCastVariant::ExtUI, high, result)?;
        let low_width = bitvec(low)?.width();
        let low = self.cast(ArithCastVariant::ExtUI, low, result)?;
        let amount = self.uint(result, low_width as u64)?;
        let high = self.bin(A::ShLI, &high, &amount)?;
        self.bin(A::OrI, &high, &low)
    }
}

struct SignedParts {
    a_neg: Operand,
    b_neg: Operand,
    a_abs: Operand,
    b_safe: Operand,
    b_zero: Operand,
}

fn unreachable_width(width: u32) -> BtorError {
    BtorError::MissingLowering {
        pass: PassKind::ToArith.name(),
        op: format!("!btor.bv<{}>", width),
        detail: Some("width out of range".to_string()),
    }
}

fn double(ty: BitVecType) -> BtorResult<BitVecType> {
    let width = ty.width().saturating_mul(2);
    BitVecType::new(width).ok_or_else(|| unreachable_width(width))
}

fn result_type(op: &Operation) -> BtorResult<BitVecType> {
    op.destination_type()
        .and_then(|ty| ty.as_bitvec())
        .ok_or_else(|| BtorError::MissingLowering {
            pass: PassKind::ToArith.name(),
            op: op.instr.full_name(),
            detail: Some("expected a bit-vector result".to_string()),
        })
}

/// Lowered form of a `btor` operation, or `None` when it is kept.
fn lower_btor(e: &mut Emitter<'_>, op: &Operation, instr: &BtorInstr) -> BtorResult<Option<Operand>> {
    let lowered = match instr {
        BtorInstr::Binary(binary) => e.binary(binary)?,
        BtorInstr::Overflow(o) => e.overflow(o.variant, &o.lhs, &o.rhs)?,
        BtorInstr::Logic(logic) => match logic.variant {
            LogicVariant::Iff => e.cmp(CmpPredicate::Eq, &logic.lhs, &logic.rhs)?,
            LogicVariant::Implies => {
                let not_lhs = e.not(&logic.lhs)?;
                e.bin(A::OrI, &not_lhs, &logic.rhs)?
            }
        },
        BtorInstr::Cmp(cmp) => e.cmp(cmp.predicate, &cmp.lhs, &cmp.rhs)?,
        BtorInstr::Unary(unary) => {
            let x = &unary.operand;
            let ty = bitvec(x)?;
            match unary.variant {
                UnaryVariant::Not => e.not(x)?,
                UnaryVariant::Neg => e.neg(x)?,
                UnaryVariant::Inc => {
                    let one = e.uint(ty, 1)?;
                    e.bin(A::AddI, x, &one)?
                }
                UnaryVariant::Dec => {
                    let one = e.uint(ty, 1)?;
                    e.bin(A::SubI, x, &one)?
                }
            }
        }
        BtorInstr::Reduce(reduce) => e.reduce(reduce.variant, &reduce.operand)?,
        BtorInstr::Ext(ext) => {
            let variant = match ext.variant {
                ExtVariant::UExt => ArithCastVariant::ExtUI,
                ExtVariant::SExt => ArithCastVariant::ExtSI,
            };
            e.cast(variant, &ext.operand, result_type(op)?)?
        }
        BtorInstr::Slice(slice) => e.slice(&slice.operand, &slice.lower, result_type(op)?)?,
        BtorInstr::Concat(concat) => e.concat(&concat.lhs, &concat.rhs, result_type(op)?)?,
        BtorInstr::Ite(ite) => {
            if ite.ty.is_array() {
                return Err(unlowered_array(op, &ite.ty));
            }
            e.select(&ite.cond, &ite.then_value, &ite.else_value)?
        }
        BtorInstr::Constant(constant) => e.constant(constant.value.clone())?,
        BtorInstr::NdArray(nd) => return Err(unlowered_array(op, &nd.ty)),
        BtorInstr::IteWriteInPlace(write) => return Err(unlowered_array(op, &write.ty)),
        BtorInstr::ArrayInit(_) | BtorInstr::Read(_) | BtorInstr::Write(_) => {
            if op.flags().contains(InstructionFlags::ARRAY) {
                let ty = op
                    .operands()
                    .map(|o| o.ty.clone())
                    .chain(op.destination_type())
                    .find(Type::is_array)
                    .unwrap_or_else(|| Type::bv(1));
                return Err(unlowered_array(op, &ty));
            }
            return Ok(None);
        }
        BtorInstr::Source(_) | BtorInstr::Assert(_) => return Ok(None),
    };
    Ok(Some(lowered))
}

fn unlowered_array(op: &Operation, ty: &Type) -> BtorError {
    BtorError::UnloweredArray {
        op: op.instr.full_name(),
        ty: ty.clone(),
    }
}

fn lower_op(rewriter: &mut Rewriter, _kind: BlockKind, op: Operation) -> BtorResult<()> {
    let AnyInstr::Btor(instr) = &op.instr else {
        return rewriter.keep(op);
    };

    let mut emitter = Emitter {
        b: &mut rewriter.builder,
    };
    match lower_btor(&mut emitter, &op, instr)? {
        None => rewriter.keep(op),
        Some(result) => {
            if let Some(dest) = op.destination() {
                debug!("Lowered `{}` to {}", op, result.value);
                rewriter.bind(dest, result);
            }
            Ok(())
        }
    }
}

impl Pass for ArithLowering {
    fn name(&self) -> &'static str {
        PassKind::ToArith.name()
    }

    fn introduces(&self) -> Dialects {
        PassKind::ToArith.introduces()
    }

    fn run(&mut self, model: &mut Model) -> BtorResult<()> {
        let before = model.op_count();
        let rewrites = rewrite_model(model, |ty| Ok(ty.clone()), lower_op)?;
        info!(
            "{}: lowered {} operations, {} operations before, {} after",
            self.name(),
            rewrites,
            before,
            model.op_count()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use btorinstr::{
        eval::{NondetRequest, Oracle, Simulator},
        modules::{
            Block,
            instructions::bv::SourceVariant,
            operand::Value,
        },
    };
    use strum::IntoEnumIterator;

    use super::*;

    /// Answers input `i` with the `i`-th fixed value.
    struct Inputs(Vec<u64>);

    impl Oracle for Inputs {
        fn choose(&mut self, request: &NondetRequest, ty: BitVecType) -> BvConst {
            BvConst::from_u64(ty, self.0[request.id as usize])
        }
    }

    fn bv(width: u32) -> BitVecType {
        BitVecType::new(width).unwrap()
    }

    /// One-state model whose `next` computes `build` over two inputs of
    /// the given width.
    fn binary_model(width: u32, build: &dyn Fn(&mut OpBuilder, &Operand, &Operand) -> Operand) -> Model {
        let mut next = OpBuilder::new(Value(2));
        let a = next
            .source(SourceVariant::Input, Type::bv(width), 0)
            .unwrap();
        let b = next
            .source(SourceVariant::Input, Type::bv(width), 1)
            .unwrap();
        let result = build(&mut next, &a, &b);

        let mut init = OpBuilder::new(Value(0));
        let ty = result.ty.as_bitvec().unwrap();
        let zero = init.constant(BvConst::zero(ty)).unwrap();

        let mut model = Model::new("arith");
        model.states = vec![(Value(1), result.ty.clone())];
        model.init = Block {
            operations: init.take(),
            yields: vec![zero],
        };
        model.next = Block {
            operations: next.take(),
            yields: vec![result],
        };
        model.verify().unwrap();
        model
    }

    fn result_of(model: &Model, inputs: [u64; 2]) -> BvConst {
        let mut sim = Simulator::new(model, Inputs(inputs.to_vec()));
        sim.reset().unwrap();
        sim.step().unwrap();
        sim.state().unwrap()[0].as_bv().unwrap().clone()
    }

    /// Compare the model and its lowering on every pair of inputs.
    fn check_exhaustive(width: u32, build: &dyn Fn(&mut OpBuilder, &Operand, &Operand) -> Operand) {
        let model = binary_model(width, build);
        let mut lowered = model.clone();
        ArithLowering.run(&mut lowered).unwrap();
        lowered.verify().unwrap();
        assert!(
            lowered
                .operations()
                .filter_map(Operation::as_btor)
                .all(|instr| instr.is_source()),
            "only sources stay in `btor`:\n{}",
            lowered
        );

        for a in 0..1u64 << width {
            for b in 0..1u64 << width {
                assert_eq!(
                    result_of(&model, [a, b]),
                    result_of(&lowered, [a, b]),
                    "inputs {a}, {b} of\n{model}"
                );
            }
        }
    }

    #[test]
    fn binary_operations_match() {
        for variant in BinaryVariant::iter() {
            for width in [1, 3, 4] {
                check_exhaustive(width, &|b, x, y| b.binary(variant, x, y).unwrap());
            }
        }
    }

    #[test]
    fn overflow_predicates_match() {
        for variant in OverflowVariant::iter() {
            for width in [1, 3] {
                check_exhaustive(width, &|b, x, y| b.overflow(variant, x, y).unwrap());
            }
        }
    }

    #[test]
    fn comparisons_and_logic_match() {
        for predicate in CmpPredicate::iter() {
            check_exhaustive(3, &|b, x, y| b.cmp(predicate, x, y).unwrap());
        }
        for variant in LogicVariant::iter() {
            check_exhaustive(1, &|b, x, y| b.logic(variant, x, y).unwrap());
        }
    }

    #[test]
    fn unary_operations_and_reductions_match() {
        for width in [1, 2, 5] {
            for variant in UnaryVariant::iter() {
                check_exhaustive(width, &|b, x, _| b.unary(variant, x).unwrap());
            }
            for variant in ReduceVariant::iter() {
                check_exhaustive(width, &|b, x, _| b.reduce(variant, x).unwrap());
            }
        }
    }

    #[test]
    fn structural_operations_match() {
        check_exhaustive(4, &|b, x, _| b.slice_const(x, 3, 1).unwrap());
        check_exhaustive(4, &|b, x, _| b.slice_const(x, 2, 2).unwrap());
        check_exhaustive(3, &|b, x, y| b.concat(x, y).unwrap());
        for variant in ExtVariant::iter() {
            check_exhaustive(3, &|b, x, _| b.ext(variant, x, bv(5)).unwrap());
        }
        check_exhaustive(3, &|b, x, y| {
            let c = b.cmp(CmpPredicate::Ult, x, y).unwrap();
            b.ite(&c, x, y).unwrap()
        });
    }

    #[test]
    fn abstract_arrays_are_rejected() {
        let mut model = btorinstr::parser::parse_model(
            r#"
btor.model @arrays {
  init {
    %0 = btor.nd_array 0 : !btor.array<!btor.bv<2>, !btor.bv<4>>
    btor.yield %0 : !btor.array<!btor.bv<2>, !btor.bv<4>>
  }
  next(%1: !btor.array<!btor.bv<2>, !btor.bv<4>>) {
    btor.yield %1 : !btor.array<!btor.bv<2>, !btor.bv<4>>
  }
}
"#,
        )
        .unwrap();
        let err = ArithLowering.run(&mut model).unwrap_err();
        assert!(err.is_unlowered_array(), "{err}");
    }
}
