//! Abstract array lowering.
//!
//! An `!btor.array<I, E>` has `2^width(I)` elements and becomes either a
//! `vector<2^width(I) x E>` or a `memref<2^width(I) x E>`. Every array
//! operation is rewritten to the `_vec` or `_mem` form of the same
//! operation; uninitialized arrays keep the id of the `nd_array` they come
//! from in an `id` attribute.
//!
//! Memory writes update their base in place. A copying `write` may only be
//! lowered to memory when nothing that may alias its base is used after it;
//! this is checked on the whole model before any rewriting.
use std::collections::BTreeMap;

use btorinstr::{
    attributes::AttrValue,
    modules::{
        Block, BlockKind, Model,
        instructions::{
            AnyInstr, ArrayStorage, BtorInstr, Instruction, Operation,
            array::{ArrayInit, ArrayRead, ArrayWrite, InitVariant, ReadVariant, WriteVariant},
            bv::BvIte,
        },
        operand::{Operand, Value},
    },
    types::{MemArrayType, Type, VectorArrayType},
};
use log::{debug, info};
use petgraph::unionfind::UnionFind;

use crate::{
    lowering::{Rewriter, rewrite_model},
    magic::ND_ARRAY_ID_ATTR,
    pass::{Dialects, Pass, PassKind},
    utils::error::{BtorError, BtorResult},
};

/// Storage abstract arrays are lowered to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArrayTarget {
    Vector,
    Memory,
}

impl ArrayTarget {
    fn kind(&self) -> PassKind {
        match self {
            ArrayTarget::Vector => PassKind::ToVector,
            ArrayTarget::Memory => PassKind::ToMemory,
        }
    }

    pub fn storage(&self) -> ArrayStorage {
        match self {
            ArrayTarget::Vector => ArrayStorage::Vector,
            ArrayTarget::Memory => ArrayStorage::Memory,
        }
    }

    fn write_variant(&self) -> WriteVariant {
        match self {
            ArrayTarget::Vector => WriteVariant::WriteVec,
            ArrayTarget::Memory => WriteVariant::WriteMem,
        }
    }

    /// Lowered form of `ty`; non-array types are unchanged.
    pub fn lower_type(&self, ty: &Type, max_length: u64) -> BtorResult<Type> {
        let Type::Array(array) = ty else {
            return Ok(ty.clone());
        };
        let length = array
            .extent()
            .filter(|length| *length <= max_length)
            .ok_or_else(|| BtorError::UnknownArrayExtent {
                ty: ty.clone(),
                max_length,
            })?;
        Ok(match self {
            ArrayTarget::Vector => VectorArrayType::new(length, array.element).into(),
            ArrayTarget::Memory => MemArrayType::new(length, array.element).into(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct ArrayLowering {
    target: ArrayTarget,
    max_length: u64,
}

impl ArrayLowering {
    pub fn new(target: ArrayTarget, max_length: u64) -> Self {
        Self { target, max_length }
    }

    pub fn target(&self) -> ArrayTarget {
        self.target
    }
}

/// Push `op`, which defines `dest` with the lowered type `ty`.
fn emit_retyped(rewriter: &mut Rewriter, op: Operation, dest: Value, ty: Type) -> BtorResult<()> {
    rewriter.keep(op)?;
    rewriter.bind(dest, Operand::new(dest, ty));
    Ok(())
}

fn lower_op(
    target: ArrayTarget,
    max_length: u64,
    rewriter: &mut Rewriter,
    op: Operation,
) -> BtorResult<()> {
    let AnyInstr::Btor(instr) = &op.instr else {
        return rewriter.keep(op);
    };
    let storage = target.storage();

    match instr {
        BtorInstr::NdArray(nd) => {
            let ty = target.lower_type(&nd.ty, max_length)?;
            let mut attrs = op.attrs.clone();
            attrs.insert(ND_ARRAY_ID_ATTR, AttrValue::Int(nd.id as i64));
            let lowered = Operation::new(ArrayInit {
                dest: nd.dest,
                variant: InitVariant::for_storage(storage),
                ty: ty.clone(),
                init: None,
            })
            .with_attrs(attrs);
            debug!("Lowering `{}` to `{}`", op, lowered);
            emit_retyped(rewriter, lowered, nd.dest, ty)
        }
        BtorInstr::ArrayInit(init) if init.variant == InitVariant::Array => {
            let ty = target.lower_type(&init.ty, max_length)?;
            let lowered = ArrayInit {
                dest: init.dest,
                variant: InitVariant::for_storage(storage),
                ty: ty.clone(),
                init: init.init.clone(),
            };
            let lowered = Operation::new(lowered).with_attrs(op.attrs.clone());
            emit_retyped(rewriter, lowered, init.dest, ty)
        }
        BtorInstr::Read(read) if read.variant == ReadVariant::Read => {
            let lowered = ArrayRead {
                variant: ReadVariant::for_storage(storage),
                ..read.clone()
            };
            rewriter.keep(Operation::new(lowered).with_attrs(op.attrs.clone()))
        }
        BtorInstr::Write(write) if write.variant.storage() == ArrayStorage::Abstract => {
            let ty = write.base.ty.clone();
            let lowered = ArrayWrite {
                variant: target.write_variant(),
                ty: ty.clone(),
                ..write.clone()
            };
            let lowered = Operation::new(lowered).with_attrs(op.attrs.clone());
            emit_retyped(rewriter, lowered, write.dest, ty)
        }
        BtorInstr::IteWriteInPlace(ite) => {
            let b = &mut rewriter.builder;
            let result = match target {
                ArrayTarget::Vector => {
                    let written =
                        b.write(WriteVariant::WriteVec, &ite.value, &ite.base, &ite.index)?;
                    b.ite(&ite.cond, &written, &ite.base)?
                }
                ArrayTarget::Memory => {
                    let old = b.read(ReadVariant::ReadMem, &ite.base, &ite.index)?;
                    let value = b.ite(&ite.cond, &ite.value, &old)?;
                    b.write(WriteVariant::WriteMem, &value, &ite.base, &ite.index)?
                }
            };
            rewriter.bind(ite.dest, result);
            Ok(())
        }
        BtorInstr::Ite(ite) if ite.ty.is_array() => {
            let ty = ite.then_value.ty.clone();
            let lowered = BvIte {
                ty: ty.clone(),
                ..ite.clone()
            };
            let lowered = Operation::new(lowered).with_attrs(op.attrs.clone());
            emit_retyped(rewriter, lowered, ite.dest, ty)
        }
        _ => rewriter.keep(op),
    }
}

/// Values of a block that may share storage once arrays live in memory.
struct AliasClasses {
    classes: UnionFind<u32>,
}

impl AliasClasses {
    fn of_block(block: &Block, values: u32) -> Self {
        let mut classes = UnionFind::new(values as usize);
        for op in &block.operations {
            let (dest, sources) = match op.as_btor() {
                Some(BtorInstr::Ite(ite)) if ite.ty.is_array() => {
                    (ite.dest, vec![ite.then_value.value, ite.else_value.value])
                }
                Some(BtorInstr::Write(write)) => (write.dest, vec![write.base.value]),
                Some(BtorInstr::IteWriteInPlace(ite)) => (ite.dest, vec![ite.base.value]),
                _ => continue,
            };
            for source in sources {
                classes.union(dest.0, source.0);
            }
        }
        Self { classes }
    }

    fn may_alias(&self, a: Value, b: Value) -> bool {
        self.classes.find(a.0) == self.classes.find(b.0)
    }
}

/// Reject copying writes whose base may still be read afterwards.
fn check_block_aliasing(
    kind: BlockKind,
    block: &Block,
    params: &[Value],
    values: u32,
) -> BtorResult<()> {
    let classes = AliasClasses::of_block(block, values);

    // Position of the definition of each array value, parameters first.
    let mut defined_at: BTreeMap<Value, usize> = params.iter().map(|v| (*v, 0)).collect();
    let mut last_use: BTreeMap<Value, usize> = BTreeMap::new();
    for (pos, op) in block.operations.iter().enumerate() {
        let pos = pos + 1;
        for operand in op.operands() {
            last_use.insert(operand.value, pos);
        }
        if let (Some(dest), Some(ty)) = (op.destination(), op.destination_type()) {
            if ty.is_array() {
                defined_at.insert(dest, pos);
            }
        }
    }
    let end = block.operations.len() + 1;
    for operand in &block.yields {
        last_use.insert(operand.value, end);
    }

    for (pos, op) in block.operations.iter().enumerate() {
        let pos = pos + 1;
        let Some(BtorInstr::Write(write)) = op.as_btor() else {
            continue;
        };
        if write.variant.is_in_place() {
            continue;
        }
        let aliased = defined_at.iter().find(|(value, def)| {
            **def < pos
                && classes.may_alias(**value, write.base.value)
                && last_use.get(value).is_some_and(|used| *used > pos)
        });
        if let Some((aliased, _)) = aliased {
            debug!("In {}: `{}` overwrites {} still used later", kind, op, aliased);
            return Err(BtorError::AliasedWrite {
                op: op.instr.full_name(),
                base: write.base.value,
                aliased: *aliased,
            });
        }
    }

    // Two array states may not end up in the same storage.
    let arrays: Vec<Value> = block
        .yields
        .iter()
        .filter(|y| y.ty.is_array())
        .map(|y| y.value)
        .collect();
    for (i, first) in arrays.iter().enumerate() {
        if let Some(second) = arrays[i + 1..]
            .iter()
            .find(|other| classes.may_alias(*first, **other))
        {
            return Err(BtorError::AliasedWrite {
                op: "btor.yield".to_string(),
                base: *first,
                aliased: *second,
            });
        }
    }
    Ok(())
}

/// Check that every copying `write` of `model` can update its base in place.
pub fn check_aliasing(model: &Model) -> BtorResult<()> {
    let values = model.next_available_value().0;
    let params: Vec<Value> = model.states.iter().map(|(value, _)| *value).collect();
    check_block_aliasing(BlockKind::Init, &model.init, &[], values)?;
    check_block_aliasing(BlockKind::Next, &model.next, &params, values)
}

impl Pass for ArrayLowering {
    fn name(&self) -> &'static str {
        self.target.kind().name()
    }

    fn introduces(&self) -> Dialects {
        self.target.kind().introduces()
    }

    fn run(&mut self, model: &mut Model) -> BtorResult<()> {
        if self.target == ArrayTarget::Memory {
            check_aliasing(model)?;
        }

        let (target, max_length) = (self.target, self.max_length);
        let before = model.op_count();
        let rewrites = rewrite_model(
            model,
            |ty| target.lower_type(ty, max_length),
            |rewriter, _, op| lower_op(target, max_length, rewriter, op),
        )?;
        info!(
            "{}: lowered {} array values, {} operations before, {} after",
            self.name(),
            rewrites,
            before,
            model.op_count()
        );
        Ok(())
    }
}
