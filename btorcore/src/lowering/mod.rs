//! Lowering passes.
//!
//! The IR lowerings ([`arith`], [`array`]) rebuild both blocks of a model
//! through a [`Rewriter`]: every operation is either kept as is or replaced by
//! a sequence of new operations, and the value it defined is rebound to the
//! result of that sequence. The [`machine`] lowering produces a separate
//! program and leaves the model untouched.
use std::collections::BTreeMap;

use btorinstr::{
    modules::{
        Block, BlockKind, Model,
        builder::OpBuilder,
        instructions::{Instruction, Operation},
        operand::{Operand, Value},
    },
    types::Type,
};

use crate::utils::error::BtorResult;

pub mod arith;
pub mod array;
pub mod machine;

/// Rebuilds the blocks of a model operation by operation.
pub struct Rewriter {
    pub builder: OpBuilder,
    env: BTreeMap<Value, Operand>,
    rewrites: usize,
}

impl Rewriter {
    pub fn new(model: &Model) -> Self {
        Self {
            builder: OpBuilder::new(model.next_available_value()),
            env: BTreeMap::new(),
            rewrites: 0,
        }
    }

    /// Make every later use of `from` refer to `to`.
    pub fn bind(&mut self, from: Value, to: Operand) {
        self.env.insert(from, to);
        self.rewrites += 1;
    }

    /// Operand as seen after the rewrites so far.
    pub fn operand(&self, operand: &Operand) -> Operand {
        self.env
            .get(&operand.value)
            .cloned()
            .unwrap_or_else(|| operand.clone())
    }

    fn remap(&self, op: &mut Operation) {
        for operand in op.operands_mut() {
            if let Some(new_operand) = self.env.get(&operand.value) {
                *operand = new_operand.clone();
            }
        }
    }

    /// Append `op` unchanged, apart from its remapped operands.
    pub fn keep(&mut self, op: Operation) -> BtorResult<()> {
        self.builder.push(op)?;
        Ok(())
    }

    /// Number of operations replaced so far.
    pub fn rewrites(&self) -> usize {
        self.rewrites
    }
}

fn rebuild_block(
    rewriter: &mut Rewriter,
    model: &Model,
    kind: BlockKind,
    lower: &mut impl FnMut(&mut Rewriter, BlockKind, Operation) -> BtorResult<()>,
) -> BtorResult<Block> {
    let block = model.block(kind);
    for op in &block.operations {
        let mut op = op.clone();
        rewriter.remap(&mut op);
        lower(rewriter, kind, op)?;
    }
    Ok(Block {
        operations: rewriter.builder.take(),
        yields: block.yields.iter().map(|y| rewriter.operand(y)).collect(),
    })
}

/// Rewrite every block of `model`.
///
/// State types are first mapped through `retype_state`. Each operation then
/// has its operands remapped and is handed to `lower`, which must either
/// [`Rewriter::keep`] it or emit a replacement and [`Rewriter::bind`] its
/// result.
pub fn rewrite_model(
    model: &mut Model,
    mut retype_state: impl FnMut(&Type) -> BtorResult<Type>,
    mut lower: impl FnMut(&mut Rewriter, BlockKind, Operation) -> BtorResult<()>,
) -> BtorResult<usize> {
    let mut rewriter = Rewriter::new(model);

    let mut states = Vec::with_capacity(model.states.len());
    for (value, ty) in &model.states {
        let new_ty = retype_state(ty)?;
        if new_ty != *ty {
            rewriter.env.insert(*value, Operand::new(*value, new_ty.clone()));
        }
        states.push((*value, new_ty));
    }

    let init = rebuild_block(&mut rewriter, model, BlockKind::Init, &mut lower)?;
    let next = rebuild_block(&mut rewriter, model, BlockKind::Next, &mut lower)?;
    model.init = init;
    model.next = next;
    model.states = states;
    Ok(rewriter.rewrites())
}
