//! Transition-system models
//!
//! A [`Model`] is a closed word-level transition system:
//!
//! - `states` lists the state parameters, each a [`Value`] of some type;
//! - the `init` block computes the initial value of every state;
//! - the `next` block sees the current state through the parameters and
//!   computes the value of every state at the following step.
//!
//! Both blocks are straight-line [`Operation`] sequences terminated by a
//! `btor.yield` listing one value per state. Values are unique across the
//! whole model, and each block only sees its own definitions (plus the state
//! parameters for `next`).
use std::collections::{BTreeMap, BTreeSet};

use crate::{
    modules::{
        instructions::{AnyInstr, BtorInstr, Instruction, Operation},
        operand::{Operand, Value},
    },
    types::Type,
    utils::Error,
    verify::Verify,
};

pub mod builder;
pub mod instructions;
pub mod operand;

/// Which block of a model an operation lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BlockKind {
    Init,
    Next,
}

impl std::fmt::Display for BlockKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BlockKind::Init => write!(f, "init"),
            BlockKind::Next => write!(f, "next"),
        }
    }
}

/// Straight-line sequence of operations followed by a yield.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Block {
    pub operations: Vec<Operation>,
    pub yields: Vec<Operand>,
}

impl Block {
    /// Replace every use of `from` by `to`, in operations and yields.
    pub fn replace_all_uses(&mut self, from: Value, to: Value) {
        let mapping = |v: Value| (v == from).then_some(to);
        for op in self.operations.iter_mut() {
            op.remap_operands(mapping);
        }
        for operand in self.yields.iter_mut() {
            if let Some(new_value) = mapping(operand.value) {
                operand.value = new_value;
            }
        }
    }

    /// Every operand of the block, the yields included.
    pub fn all_operands(&self) -> impl Iterator<Item = &Operand> {
        self.operations
            .iter()
            .flat_map(|op| op.operands())
            .chain(self.yields.iter())
    }

    /// Index of the operation defining `value`, if it lives in this block.
    pub fn position_of(&self, value: Value) -> Option<usize> {
        self.operations
            .iter()
            .position(|op| op.destination() == Some(value))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Model {
    pub name: String,
    pub states: Vec<(Value, Type)>,
    pub init: Block,
    pub next: Block,
}

impl Model {
    /// Empty model with no state.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            states: Vec::new(),
            init: Block::default(),
            next: Block::default(),
        }
    }

    pub fn block(&self, kind: BlockKind) -> &Block {
        match kind {
            BlockKind::Init => &self.init,
            BlockKind::Next => &self.next,
        }
    }

    pub fn block_mut(&mut self, kind: BlockKind) -> &mut Block {
        match kind {
            BlockKind::Init => &mut self.init,
            BlockKind::Next => &mut self.next,
        }
    }

    /// Iterate over the blocks together with their kind.
    pub fn blocks(&self) -> impl Iterator<Item = (BlockKind, &Block)> {
        [(BlockKind::Init, &self.init), (BlockKind::Next, &self.next)].into_iter()
    }

    /// Iterate over every operation, `init` first.
    pub fn operations(&self) -> impl Iterator<Item = &Operation> {
        self.init.operations.iter().chain(self.next.operations.iter())
    }

    /// Total number of operations, yields excluded.
    pub fn op_count(&self) -> usize {
        self.init.operations.len() + self.next.operations.len()
    }

    /// Find next available [`Value`], one past the largest value defined or
    /// used anywhere in the model.
    pub fn next_available_value(&self) -> Value {
        let mut next = 0u32;
        let mut bump = |v: Value| next = next.max(v.0.saturating_add(1));

        for (value, _) in &self.states {
            bump(*value);
        }
        for (_, block) in self.blocks() {
            for op in &block.operations {
                if let Some(dest) = op.destination() {
                    bump(dest);
                }
            }
            for operand in block.all_operands() {
                bump(operand.value);
            }
        }

        Value(next)
    }

    /// Number of uses of every value, yields included.
    pub fn uses(&self) -> BTreeMap<Value, usize> {
        let mut uses = BTreeMap::new();
        for (_, block) in self.blocks() {
            for operand in block.all_operands() {
                *uses.entry(operand.value).or_insert(0) += 1;
            }
        }
        uses
    }

    /// Location `(block, index)` of the operation defining each value. State
    /// parameters are not operations and do not appear.
    pub fn defining_ops(&self) -> BTreeMap<Value, (BlockKind, usize)> {
        let mut defs = BTreeMap::new();
        for (kind, block) in self.blocks() {
            for (index, op) in block.operations.iter().enumerate() {
                if let Some(dest) = op.destination() {
                    defs.insert(dest, (kind, index));
                }
            }
        }
        defs
    }

    /// Operation defining `value`, if any.
    pub fn defining_op(&self, value: Value) -> Option<&Operation> {
        self.blocks()
            .find_map(|(_, block)| block.position_of(value).map(|i| &block.operations[i]))
    }

    /// Type of every value of the model, as given by its definition.
    pub fn value_types(&self) -> BTreeMap<Value, Type> {
        let mut types: BTreeMap<Value, Type> = self.states.iter().cloned().collect();
        for op in self.operations() {
            if let (Some(dest), Some(ty)) = (op.destination(), op.destination_type()) {
                types.insert(dest, ty);
            }
        }
        types
    }

    /// Verify the model:
    /// 1) Each value is defined exactly once.
    /// 2) Each use is preceded by its definition within the same scope.
    /// 3) Each operand declares the type of its definition.
    /// 4) Each operation passes its own verifier.
    /// 5) Slices with constant bounds have in-range bounds.
    /// 6) Both yields match the state list.
    pub fn verify(&self) -> Result<(), Error> {
        let mut defined = BTreeSet::new();
        let state_values = self.states.iter().map(|(v, _)| *v);
        let dests = self.operations().filter_map(|op| op.destination());
        for value in state_values.chain(dests) {
            if !defined.insert(value) {
                return Err(Error::DuplicateValue { duplicate: value });
            }
        }

        self.verify_block(BlockKind::Init, BTreeMap::new())?;
        self.verify_block(BlockKind::Next, self.states.iter().cloned().collect())
    }

    fn verify_block(&self, kind: BlockKind, mut scope: BTreeMap<Value, Type>) -> Result<(), Error> {
        let block = self.block(kind);
        let mut constants = BTreeMap::new();

        let check_operand = |scope: &BTreeMap<Value, Type>, operand: &Operand| match scope
            .get(&operand.value)
        {
            None => Err(Error::UndefinedValue {
                value: operand.value,
                block: kind,
            }),
            Some(defined) if *defined != operand.ty => Err(Error::OperandTypeMismatch {
                value: operand.value,
                declared: operand.ty.clone(),
                defined: defined.clone(),
            }),
            Some(_) => Ok(()),
        };

        for op in &block.operations {
            op.verify()?;
            for operand in op.operands() {
                check_operand(&scope, operand)?;
            }

            match &op.instr {
                AnyInstr::Btor(BtorInstr::Constant(c)) => {
                    constants.insert(c.dest, c.value.to_u64());
                }
                AnyInstr::Btor(BtorInstr::Slice(slice)) => {
                    let bound = |o: &Operand| constants.get(&o.value).copied().flatten();
                    if let (Some(upper), Some(lower)) = (bound(&slice.upper), bound(&slice.lower))
                    {
                        check_slice_bounds(slice, upper, lower)?;
                    }
                }
                _ => {}
            }

            if let (Some(dest), Some(ty)) = (op.destination(), op.destination_type()) {
                scope.insert(dest, ty);
            }
        }

        if block.yields.len() != self.states.len() {
            return Err(Error::YieldArity {
                block: kind,
                expected: self.states.len(),
                found: block.yields.len(),
            });
        }
        for (index, (operand, (_, state_ty))) in block.yields.iter().zip(&self.states).enumerate()
        {
            check_operand(&scope, operand)?;
            if operand.ty != *state_ty {
                return Err(Error::YieldType {
                    block: kind,
                    index,
                    expected: state_ty.clone(),
                    found: operand.ty.clone(),
                });
            }
        }

        Ok(())
    }

    /// Normalize the model by renumbering every value from zero upwards in
    /// textual order: `init` definitions, state parameters, then `next`
    /// definitions.
    pub fn normalize_values(&mut self) {
        let mut mapping = BTreeMap::new();
        let mut next_value = 0u32;
        let mut assign = |value: Value, mapping: &mut BTreeMap<Value, Value>| {
            mapping.insert(value, Value(next_value));
            next_value += 1;
        };

        for op in &self.init.operations {
            if let Some(dest) = op.destination() {
                assign(dest, &mut mapping);
            }
        }
        for (value, _) in &self.states {
            assign(*value, &mut mapping);
        }
        for op in &self.next.operations {
            if let Some(dest) = op.destination() {
                assign(dest, &mut mapping);
            }
        }

        let remap = |v: Value| mapping.get(&v).copied();
        for (value, _) in self.states.iter_mut() {
            if let Some(new_value) = remap(*value) {
                *value = new_value;
            }
        }
        for block in [&mut self.init, &mut self.next] {
            for op in block.operations.iter_mut() {
                if let Some(new_dest) = op.destination().and_then(remap) {
                    op.set_destination(new_dest);
                }
                op.remap_operands(remap);
            }
            for operand in block.yields.iter_mut() {
                if let Some(new_value) = remap(operand.value) {
                    operand.value = new_value;
                }
            }
        }
    }
}

fn check_slice_bounds(
    slice: &instructions::bv::BvSlice,
    upper: u64,
    lower: u64,
) -> Result<(), Error> {
    let width = slice.operand.width().unwrap_or(0);
    if lower > upper || upper >= width as u64 {
        return Err(Error::SliceBounds {
            upper,
            lower,
            width,
        });
    }
    let expected = upper - lower + 1;
    let found = slice.ty.as_bitvec().map(|t| t.width()).unwrap_or(0);
    if expected != found as u64 {
        return Err(Error::SliceResultWidth {
            upper,
            lower,
            expected,
            found,
        });
    }
    Ok(())
}
