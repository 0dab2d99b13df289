//! Cast resolution
//!
//! Simplifies chains of `uext`/`sext`/`slice` until no rule applies:
//!
//! - `uext(uext(x))` becomes `uext(x)`, and likewise for `sext`;
//! - `sext(uext(x))` becomes `uext(x)`, the sign bit of a widening `uext`
//!   being zero;
//! - an extension or slice of constants becomes a `btor.constant`;
//! - a slice covering its whole operand becomes the operand;
//! - a slice of an extension that only reads bits of the extended value
//!   becomes a slice of that value, or the value itself.
//!
//! Rewritten values are substituted in every use. The producers they no
//! longer need are left in place for dead-code elimination.
use std::collections::BTreeMap;

use btorinstr::{
    consts::BvConst,
    fold::{OpFoldResult, fold, fold_with},
    modules::{
        Block, Model,
        builder::OpBuilder,
        instructions::{
            AnyInstr, BtorInstr, Instruction, Operation,
            bv::{BvExt, BvSlice, ExtVariant},
        },
        operand::{Operand, Value},
    },
    types::BitVecType,
};
use either::Either;
use log::{debug, info};

use crate::{
    pass::{Dialects, Pass, PassKind},
    utils::error::BtorResult,
};

#[derive(Debug, Clone, Copy, Default)]
pub struct CastResolution;

/// Definitions seen so far in the block being rewritten.
struct Scope {
    defs: BTreeMap<Value, Operation>,
    constants: BTreeMap<Value, BvConst>,
}

impl Scope {
    fn record(&mut self, op: &Operation) {
        let Some(dest) = op.destination() else {
            return;
        };
        if let Some(OpFoldResult::Attr(value)) = fold(op) {
            self.constants.insert(dest, value);
        }
        self.defs.insert(dest, op.clone());
    }

    fn ext(&self, value: Value) -> Option<&BvExt> {
        match &self.defs.get(&value)?.instr {
            AnyInstr::Btor(BtorInstr::Ext(ext)) => Some(ext),
            _ => None,
        }
    }

    fn constant_u32(&self, value: Value) -> Option<u32> {
        self.constants
            .get(&value)?
            .to_u64()
            .and_then(|v| u32::try_from(v).ok())
    }
}

fn width(operand: &Operand) -> u32 {
    operand.width().unwrap_or(0)
}

fn with_attrs(instr: impl Into<AnyInstr>, like: &Operation) -> Operation {
    Operation::new(instr).with_attrs(like.attrs.clone())
}

/// Rule for an extension whose operand is itself an extension.
fn resolve_ext(op: &Operation, ext: &BvExt, scope: &Scope) -> Option<Either<Value, Operation>> {
    let inner = scope.ext(ext.operand.value)?;
    let variant = match (inner.variant, ext.variant) {
        (ExtVariant::UExt, ExtVariant::UExt) | (ExtVariant::UExt, ExtVariant::SExt) => {
            ExtVariant::UExt
        }
        (ExtVariant::SExt, ExtVariant::SExt) => ExtVariant::SExt,
        (ExtVariant::SExt, ExtVariant::UExt) => return None,
    };
    Some(Either::Right(with_attrs(
        BvExt {
            dest: ext.dest,
            variant,
            ty: ext.ty.clone(),
            operand: inner.operand.clone(),
        },
        op,
    )))
}

/// Rules for a slice with constant bounds.
fn resolve_slice(
    op: &Operation,
    slice: &BvSlice,
    scope: &Scope,
    builder: &mut OpBuilder,
) -> Option<Either<Value, Operation>> {
    let upper = scope.constant_u32(slice.upper.value)?;
    let lower = scope.constant_u32(slice.lower.value)?;

    if lower == 0 && slice.ty == slice.operand.ty {
        return Some(Either::Left(slice.operand.value));
    }

    let inner = scope.ext(slice.operand.value)?;
    let source = &inner.operand;
    let source_width = width(source);
    if upper >= source_width {
        return None;
    }
    if lower == 0 && upper + 1 == source_width {
        return Some(Either::Left(source.value));
    }

    let bound_ty = BitVecType::new(source_width)?;
    let upper = builder.constant_u64(bound_ty, upper as u64).ok()?;
    let lower = builder.constant_u64(bound_ty, lower as u64).ok()?;
    Some(Either::Right(with_attrs(
        BvSlice {
            dest: slice.dest,
            ty: slice.ty.clone(),
            operand: source.clone(),
            upper,
            lower,
        },
        op,
    )))
}

/// Find a simpler equivalent of `op`: an existing value or a replacement
/// operation defining the same value.
fn resolve(op: &Operation, scope: &Scope, builder: &mut OpBuilder) -> Option<Either<Value, Operation>> {
    let folded = match &op.instr {
        AnyInstr::Btor(BtorInstr::Ext(_)) | AnyInstr::Btor(BtorInstr::Slice(_)) => {
            fold_with(op, |v| scope.constants.get(&v).cloned())
        }
        _ => return None,
    };
    if let Some(result) = folded {
        let dest = op.destination()?;
        return match result {
            OpFoldResult::Value(value) => Some(Either::Left(value)),
            OpFoldResult::Attr(_) => result.materialize(dest).map(Either::Right),
        };
    }

    match &op.instr {
        AnyInstr::Btor(BtorInstr::Ext(ext)) => resolve_ext(op, ext, scope),
        AnyInstr::Btor(BtorInstr::Slice(slice)) => resolve_slice(op, slice, scope, builder),
        _ => None,
    }
}

/// One sweep over `block`, returning the number of rewrites.
fn sweep(block: &mut Block, builder: &mut OpBuilder) -> usize {
    let mut scope = Scope {
        defs: BTreeMap::new(),
        constants: BTreeMap::new(),
    };
    let mut subst: BTreeMap<Value, Value> = BTreeMap::new();
    let mut rewrites = 0;
    let mut operations = Vec::with_capacity(block.operations.len());

    for mut op in std::mem::take(&mut block.operations) {
        op.remap_operands(|v| subst.get(&v).copied());

        match resolve(&op, &scope, builder) {
            None => {
                scope.record(&op);
                operations.push(op);
            }
            Some(Either::Left(value)) => {
                debug!("Replacing `{}` by {}", op, value);
                if let Some(dest) = op.destination() {
                    subst.insert(dest, value);
                }
                rewrites += 1;
            }
            Some(Either::Right(replacement)) => {
                debug!("Rewriting `{}` into `{}`", op, replacement);
                for constant in builder.take() {
                    scope.record(&constant);
                    operations.push(constant);
                }
                scope.record(&replacement);
                operations.push(replacement);
                rewrites += 1;
            }
        }
    }

    for operand in block.yields.iter_mut() {
        if let Some(value) = subst.get(&operand.value) {
            operand.value = *value;
        }
    }
    block.operations = operations;
    rewrites
}

impl Pass for CastResolution {
    fn name(&self) -> &'static str {
        PassKind::CastResolution.name()
    }

    fn introduces(&self) -> Dialects {
        PassKind::CastResolution.introduces()
    }

    fn run(&mut self, model: &mut Model) -> BtorResult<()> {
        let mut builder = OpBuilder::new(model.next_available_value());
        let before = model.op_count();
        let mut total = 0;

        loop {
            let rewrites = sweep(&mut model.init, &mut builder) + sweep(&mut model.next, &mut builder);
            total += rewrites;
            if rewrites == 0 {
                break;
            }
        }

        info!(
            "{}: {} rewrites, {} operations before, {} after",
            self.name(),
            total,
            before,
            model.op_count()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use btorinstr::{
        modules::instructions::bv::{BinaryVariant, SourceVariant},
        types::Type,
    };

    use super::*;

    fn bv(width: u32) -> BitVecType {
        BitVecType::new(width).unwrap()
    }

    fn single_state_model(build: impl FnOnce(&mut OpBuilder, &Operand) -> Operand) -> Model {
        let mut model = Model::new("casts");
        let mut init = OpBuilder::new(Value(0));
        let zero = init.constant_u64(bv(16), 0).unwrap();
        let state = Operand::new(init.fresh(), Type::bv(16));

        let mut next = OpBuilder::new(init.next_value());
        let result = build(&mut next, &state);
        model.states = vec![(state.value, state.ty.clone())];
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

    fn ext_chain(b: &mut OpBuilder, first: ExtVariant, second: ExtVariant) -> Operand {
        let x = b.source(SourceVariant::Input, Type::bv(4), 0).unwrap();
        let mid = b.ext(first, &x, bv(8)).unwrap();
        b.ext(second, &mid, bv(16)).unwrap()
    }

    fn final_op(model: &Model) -> &Operation {
        let yielded = model.next.yields[0].value;
        model.defining_op(yielded).unwrap()
    }

    #[test]
    fn nested_extensions_collapse() {
        for (first, second, expected) in [
            (ExtVariant::UExt, ExtVariant::UExt, Some(ExtVariant::UExt)),
            (ExtVariant::SExt, ExtVariant::SExt, Some(ExtVariant::SExt)),
            (ExtVariant::UExt, ExtVariant::SExt, Some(ExtVariant::UExt)),
            (ExtVariant::SExt, ExtVariant::UExt, None),
        ] {
            let mut model = single_state_model(|b, _| ext_chain(b, first, second));
            CastResolution.run(&mut model).unwrap();
            model.verify().unwrap();

            let AnyInstr::Btor(BtorInstr::Ext(ext)) = &final_op(&model).instr else {
                panic!("expected an extension");
            };
            match expected {
                Some(variant) => {
                    assert_eq!(ext.variant, variant);
                    assert_eq!(ext.operand.ty, Type::bv(4));
                }
                None => assert_eq!(ext.operand.ty, Type::bv(8)),
            }
        }
    }

    #[test]
    fn constant_operands_fold() {
        let mut model = single_state_model(|b, _| {
            let c = b.constant_u64(bv(8), 0x80).unwrap();
            b.ext(ExtVariant::SExt, &c, bv(16)).unwrap()
        });
        CastResolution.run(&mut model).unwrap();
        model.verify().unwrap();
        assert_eq!(
            fold(final_op(&model)),
            Some(OpFoldResult::Attr(BvConst::from_u64(bv(16), 0xff80)))
        );
    }

    #[test]
    fn full_slices_are_removed() {
        let mut model = single_state_model(|b, state| b.slice_const(state, 15, 0).unwrap());
        CastResolution.run(&mut model).unwrap();
        model.verify().unwrap();
        assert_eq!(model.next.yields[0].value, model.states[0].0);
    }

    #[test]
    fn slices_of_extensions_read_the_source() {
        let mut model = single_state_model(|b, state| {
            let low = b.slice_const(state, 7, 0).unwrap();
            let wide = b.ext(ExtVariant::SExt, &low, bv(16)).unwrap();
            let back = b.slice_const(&wide, 7, 0).unwrap();
            let part = b.slice_const(&wide, 5, 2).unwrap();
            let part = b.ext(ExtVariant::UExt, &part, bv(8)).unwrap();
            let sum = b.binary(BinaryVariant::Add, &back, &part).unwrap();
            b.ext(ExtVariant::UExt, &sum, bv(16)).unwrap()
        });
        CastResolution.run(&mut model).unwrap();
        model.verify().unwrap();

        // `back` is the 8-bit slice of the state, `part` a slice of it.
        let slices: Vec<&BvSlice> = model
            .next
            .operations
            .iter()
            .filter_map(|op| match &op.instr {
                AnyInstr::Btor(BtorInstr::Slice(slice)) => Some(slice),
                _ => None,
            })
            .collect();
        let low = slices[0].dest;
        assert!(slices.iter().all(|s| s.operand.ty != Type::bv(16) || s.dest == low));
        assert!(slices.iter().any(|s| s.operand.value == low && s.ty == Type::bv(4)));
    }
}
