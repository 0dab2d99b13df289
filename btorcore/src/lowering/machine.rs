//! Lowering of a fully arithmetic model to a [`MachineModule`].
//!
//! The program is a single function. `entry` computes the `init` block, then
//! jumps to `loop`, which starts with one `phi` per state and computes the
//! `next` block before jumping back to itself. Assertions split the body
//! into more blocks, so the incoming edges of the `phi`s are taken from the
//! last block of each part.
//!
//! Allocations are hoisted to `entry`, so an array created by `next` reuses
//! the same buffer at every iteration. A memory state whose next value may
//! be such a buffer is copied into a buffer of its own before looping back.
use std::collections::{BTreeMap, BTreeSet};

use btorinstr::{
    attributes::AttrValue,
    modules::{
        Block, Model,
        instructions::{
            AnyInstr, ArithInstr, BtorInstr, Operation,
            arith::{ArithBinaryVariant, ArithCastVariant},
            array::{InitVariant, ReadVariant, WriteVariant},
            bv::SourceVariant,
            meta::AssertVariant,
        },
        operand::{Operand, Value},
    },
    types::Type,
};
use log::{debug, info};
use petgraph::unionfind::UnionFind;
use smallvec::{SmallVec, smallvec};

use crate::{
    config::{MachineConfig, NdLowering},
    machine::{
        BinOp, CastOp, FunctionBuilder, MachineInst, MachineModule, MachineType, MachineValue,
        Terminator,
    },
    magic::{MACHINE_ASSUME_FN, MACHINE_BAD_FN, MACHINE_INPUT_FN, MACHINE_ND_FN, ND_ARRAY_ID_ATTR},
    pass::{Dialects, Pass, PassKind},
    utils::error::{BtorError, BtorResult},
};

const ENTRY: &str = "entry";
const LOOP: &str = "loop";

/// Produces the machine program of a model, leaving the model itself
/// untouched. The last program is kept in [`MachineLowering::module`].
#[derive(Debug, Clone, Default)]
pub struct MachineLowering {
    config: MachineConfig,
    module: Option<MachineModule>,
}

impl MachineLowering {
    pub fn new(config: MachineConfig) -> Self {
        Self {
            config,
            module: None,
        }
    }

    pub fn module(&self) -> Option<&MachineModule> {
        self.module.as_ref()
    }

    pub fn take_module(&mut self) -> Option<MachineModule> {
        self.module.take()
    }
}

impl Pass for MachineLowering {
    fn name(&self) -> &'static str {
        PassKind::ToMachine.name()
    }

    fn introduces(&self) -> Dialects {
        PassKind::ToMachine.introduces()
    }

    fn run(&mut self, model: &mut Model) -> BtorResult<()> {
        self.module = Some(lower_to_machine(model, &self.config)?);
        Ok(())
    }
}

fn missing(op: &Operation, detail: &str) -> BtorError {
    BtorError::MissingLowering {
        pass: PassKind::ToMachine.name(),
        op: op.instr.full_name(),
        detail: Some(detail.to_string()),
    }
}

fn machine_type(ty: &Type) -> Option<MachineType> {
    match ty {
        Type::BitVec(bv) => Some(MachineType::Int(bv.width())),
        Type::Vector(vector) => match vector.shape.as_slice() {
            [length] => Some(MachineType::Vector {
                length: *length,
                element: vector.element.width(),
            }),
            _ => None,
        },
        Type::Memory(_) => Some(MachineType::Ptr),
        Type::Array(_) => None,
    }
}

fn binary_op(variant: ArithBinaryVariant) -> BinOp {
    match variant {
        ArithBinaryVariant::AddI => BinOp::Add,
        ArithBinaryVariant::SubI => BinOp::Sub,
        ArithBinaryVariant::MulI => BinOp::Mul,
        ArithBinaryVariant::DivSI => BinOp::SDiv,
        ArithBinaryVariant::DivUI => BinOp::UDiv,
        ArithBinaryVariant::RemSI => BinOp::SRem,
        ArithBinaryVariant::RemUI => BinOp::URem,
        ArithBinaryVariant::AndI => BinOp::And,
        ArithBinaryVariant::OrI => BinOp::Or,
        ArithBinaryVariant::XOrI => BinOp::Xor,
        ArithBinaryVariant::ShLI => BinOp::Shl,
        ArithBinaryVariant::ShRUI => BinOp::LShr,
        ArithBinaryVariant::ShRSI => BinOp::AShr,
    }
}

fn cast_op(variant: ArithCastVariant) -> CastOp {
    match variant {
        ArithCastVariant::ExtUI => CastOp::ZExt,
        ArithCastVariant::ExtSI => CastOp::SExt,
        ArithCastVariant::TruncI => CastOp::Trunc,
    }
}

/// Provenance of an uninitialized array, as recorded by the array lowering.
fn array_id(op: &Operation, dest: Value) -> u64 {
    match op.attrs.get(ND_ARRAY_ID_ATTR) {
        Some(AttrValue::Int(id)) => *id as u64,
        _ => dest.0 as u64,
    }
}

struct Lowerer<'c> {
    config: &'c MachineConfig,
    fb: FunctionBuilder,
    env: BTreeMap<Value, MachineValue>,
    bad_count: u64,
}

impl Lowerer<'_> {
    fn value(&self, op: &Operation, operand: &Operand) -> BtorResult<MachineValue> {
        self.env
            .get(&operand.value)
            .cloned()
            .ok_or_else(|| missing(op, &format!("{} is not defined", operand.value)))
    }

    fn ty(&self, op: &Operation, ty: &Type) -> BtorResult<MachineType> {
        machine_type(ty).ok_or_else(|| missing(op, &format!("no machine type for {}", ty)))
    }

    /// Emit `inst` into a fresh register bound to `value`.
    fn define(&mut self, value: Value, inst: impl FnOnce(u32) -> MachineInst) -> MachineValue {
        let reg = self.emit(inst);
        self.env.insert(value, reg.clone());
        reg
    }

    fn emit(&mut self, inst: impl FnOnce(u32) -> MachineInst) -> MachineValue {
        let dest = self.fb.fresh();
        self.fb.push(inst(dest));
        MachineValue::Reg(dest)
    }

    /// A nondeterministic value of type `ty`, see [`NdLowering`].
    fn nondet(&mut self, function: &str, id: u64, ty: MachineType) -> MachineValue {
        match self.config.nd_lowering {
            NdLowering::Call => {
                let callee = format!("{}.{}", function, ty.mangle());
                self.fb
                    .declare(&callee, ty.clone(), vec![MachineType::Int(64)]);
                self.emit(|dest| MachineInst::Call {
                    dest: Some(dest),
                    ret: ty,
                    callee,
                    args: vec![(MachineType::Int(64), MachineValue::Imm64(id as i64))],
                })
            }
            NdLowering::Freeze => self.emit(|dest| MachineInst::Freeze {
                dest,
                ty,
                operand: MachineValue::Poison,
            }),
        }
    }

    /// Address of element `index` of the memory array `base`.
    fn element_ptr(
        &mut self,
        op: &Operation,
        base: &Operand,
        index: &Operand,
    ) -> BtorResult<(MachineType, MachineValue)> {
        let element = base
            .ty
            .element()
            .map(|element| MachineType::Int(element.width()))
            .ok_or_else(|| missing(op, "expected a memory array"))?;
        let base = self.value(op, base)?;
        let mut offset = self.value(op, index)?;
        let index_width = index.width().unwrap_or(64);
        if index_width < 64 {
            offset = self.emit(|dest| MachineInst::Cast {
                dest,
                op: CastOp::ZExt,
                from: MachineType::Int(index_width),
                to: MachineType::Int(64),
                operand: offset,
            });
        }
        let ptr = self.emit(|dest| MachineInst::GetElementPtr {
            dest,
            element: element.clone(),
            base,
            index: offset,
        });
        Ok((element, ptr))
    }

    /// Store `element(self, index)` at every index of a memory array, in a
    /// loop.
    fn fill(
        &mut self,
        ptr: MachineValue,
        length: u64,
        ty: MachineType,
        mut element: impl FnMut(&mut Self, &MachineValue) -> MachineValue,
    ) {
        let i64 = MachineType::Int(64);
        let pre = self.fb.current_label().to_string();
        let head = self.fb.fresh_label("fill");
        let end = format!("{}.end", head);
        self.fb.terminate_and_start(Terminator::Br(head.clone()), head.clone());

        let next = self.fb.fresh();
        let index = self.emit(|dest| MachineInst::Phi {
            dest,
            ty: i64.clone(),
            incoming: smallvec![
                (MachineValue::Imm64(0), pre),
                (MachineValue::Reg(next), head.clone())
            ],
        });
        let value = element(self, &index);
        let slot = self.emit(|dest| MachineInst::GetElementPtr {
            dest,
            element: ty.clone(),
            base: ptr,
            index: index.clone(),
        });
        self.fb.push(MachineInst::Store {
            ty,
            value,
            ptr: slot,
        });
        self.fb.push(MachineInst::Binary {
            dest: next,
            op: BinOp::Add,
            ty: i64.clone(),
            lhs: index,
            rhs: MachineValue::Imm64(1),
        });
        let done = self.emit(|dest| MachineInst::ICmp {
            dest,
            predicate: "eq",
            ty: i64,
            lhs: MachineValue::Reg(next),
            rhs: MachineValue::Imm64(length as i64),
        });
        self.fb.terminate_and_start(
            Terminator::CondBr {
                cond: done,
                then_label: end.clone(),
                else_label: head,
            },
            end,
        );
    }

    /// Copy the memory array `from` into the buffer `to`.
    fn copy(&mut self, from: MachineValue, to: MachineValue, length: u64, ty: MachineType) {
        let element = ty.clone();
        self.fill(to, length, ty, |this, index| {
            let slot = this.emit(|dest| MachineInst::GetElementPtr {
                dest,
                element: element.clone(),
                base: from.clone(),
                index: index.clone(),
            });
            this.emit(|dest| MachineInst::Load {
                dest,
                ty: element.clone(),
                ptr: slot,
            })
        });
    }

    fn lower_arith(&mut self, op: &Operation, instr: &ArithInstr) -> BtorResult<()> {
        match instr {
            ArithInstr::Binary(binary) => {
                let ty = self.ty(op, &binary.ty)?;
                let lhs = self.value(op, &binary.lhs)?;
                let rhs = self.value(op, &binary.rhs)?;
                self.define(binary.dest, |dest| MachineInst::Binary {
                    dest,
                    op: binary_op(binary.variant),
                    ty,
                    lhs,
                    rhs,
                });
            }
            ArithInstr::Cmp(cmp) => {
                let ty = self.ty(op, &cmp.lhs.ty)?;
                let lhs = self.value(op, &cmp.lhs)?;
                let rhs = self.value(op, &cmp.rhs)?;
                self.define(cmp.dest, |dest| MachineInst::ICmp {
                    dest,
                    predicate: cmp.predicate.to_str(),
                    ty,
                    lhs,
                    rhs,
                });
            }
            ArithInstr::Select(select) => {
                let ty = self.ty(op, &select.ty)?;
                let cond = self.value(op, &select.cond)?;
                let then_value = self.value(op, &select.then_value)?;
                let else_value = self.value(op, &select.else_value)?;
                self.define(select.dest, |dest| MachineInst::Select {
                    dest,
                    ty,
                    cond,
                    then_value,
                    else_value,
                });
            }
            ArithInstr::Cast(cast) => {
                let from = self.ty(op, &cast.operand.ty)?;
                let to = self.ty(op, &cast.ty)?;
                let operand = self.value(op, &cast.operand)?;
                self.define(cast.dest, |dest| MachineInst::Cast {
                    dest,
                    op: cast_op(cast.variant),
                    from,
                    to,
                    operand,
                });
            }
            ArithInstr::Constant(constant) => {
                self.env
                    .insert(constant.dest, MachineValue::Imm(constant.value.clone()));
            }
        }
        Ok(())
    }

    fn lower_assert(
        &mut self,
        op: &Operation,
        variant: AssertVariant,
        cond: &Operand,
        id: Option<u64>,
    ) -> BtorResult<()> {
        let cond = self.value(op, cond)?;
        if variant == AssertVariant::Constraint {
            if !self.config.allow_assume {
                return Err(missing(op, "assumptions are disabled"));
            }
            self.fb.declare(
                MACHINE_ASSUME_FN,
                MachineType::Void,
                vec![MachineType::Int(1)],
            );
            self.fb.push(MachineInst::Call {
                dest: None,
                ret: MachineType::Void,
                callee: MACHINE_ASSUME_FN.to_string(),
                args: vec![(MachineType::Int(1), cond)],
            });
            return Ok(());
        }

        let id = id.unwrap_or(self.bad_count);
        self.bad_count += 1;
        let bad = self.fb.fresh_label("bad");
        let cont = self.fb.fresh_label("cont");
        let (then_label, else_label) = if variant.fails_on(true) {
            (bad.clone(), cont.clone())
        } else {
            (cont.clone(), bad.clone())
        };
        self.fb.terminate_and_start(
            Terminator::CondBr {
                cond,
                then_label,
                else_label,
            },
            bad,
        );
        self.fb
            .declare(MACHINE_BAD_FN, MachineType::Void, vec![MachineType::Int(64)]);
        self.fb.push(MachineInst::Call {
            dest: None,
            ret: MachineType::Void,
            callee: MACHINE_BAD_FN.to_string(),
            args: vec![(MachineType::Int(64), MachineValue::Imm64(id as i64))],
        });
        self.fb
            .terminate_and_start(Terminator::Br(cont.clone()), cont);
        Ok(())
    }

    fn lower_btor(&mut self, op: &Operation, instr: &BtorInstr) -> BtorResult<()> {
        match instr {
            BtorInstr::Source(source) => {
                let ty = self.ty(op, &source.ty)?;
                let function = match source.variant {
                    SourceVariant::Input => MACHINE_INPUT_FN,
                    SourceVariant::NdState => MACHINE_ND_FN,
                };
                let value = self.nondet(function, source.id, ty);
                self.env.insert(source.dest, value);
            }
            BtorInstr::Assert(assert) => {
                self.lower_assert(op, assert.variant, &assert.cond, assert.id)?;
            }
            BtorInstr::ArrayInit(init) if init.variant == InitVariant::ArrayVec => {
                let ty = self.ty(op, &init.ty)?;
                let MachineType::Vector { length, element } = ty.clone() else {
                    return Err(missing(op, "expected a vector array"));
                };
                let value = match &init.init {
                    Some(fill) => {
                        let fill = self.value(op, fill)?;
                        let first = self.emit(|dest| MachineInst::InsertElement {
                            dest,
                            ty: ty.clone(),
                            vector: MachineValue::Poison,
                            element_ty: MachineType::Int(element),
                            element: fill,
                            index_ty: MachineType::Int(64),
                            index: MachineValue::Imm64(0),
                        });
                        self.emit(|dest| MachineInst::Splat {
                            dest,
                            ty,
                            length,
                            vector: first,
                        })
                    }
                    None => self.nondet(MACHINE_ND_FN, array_id(op, init.dest), ty),
                };
                self.env.insert(init.dest, value);
            }
            BtorInstr::ArrayInit(init) if init.variant == InitVariant::ArrayMem => {
                let (length, element) = memory_shape(&init.ty)
                    .ok_or_else(|| missing(op, "expected a one-dimensional memory array"))?;
                let ptr = self.define(init.dest, |dest| MachineInst::Alloca {
                    dest,
                    element: element.clone(),
                    count: length,
                });
                match &init.init {
                    Some(fill) => {
                        let fill = self.value(op, fill)?;
                        self.fill(ptr, length, element, |_, _| fill.clone());
                    }
                    None => {
                        let id = array_id(op, init.dest);
                        let ty = element.clone();
                        self.fill(ptr, length, element, |this, _| {
                            this.nondet(MACHINE_ND_FN, id, ty.clone())
                        });
                    }
                }
            }
            BtorInstr::Read(read) if read.variant == ReadVariant::ReadVec => {
                let ty = self.ty(op, &read.base.ty)?;
                let index_ty = self.ty(op, &read.index.ty)?;
                let vector = self.value(op, &read.base)?;
                let index = self.value(op, &read.index)?;
                self.define(read.dest, |dest| MachineInst::ExtractElement {
                    dest,
                    ty,
                    vector,
                    index_ty,
                    index,
                });
            }
            BtorInstr::Read(read) if read.variant == ReadVariant::ReadMem => {
                let (element, ptr) = self.element_ptr(op, &read.base, &read.index)?;
                self.define(read.dest, |dest| MachineInst::Load {
                    dest,
                    ty: element,
                    ptr,
                });
            }
            BtorInstr::Write(write) if write.variant == WriteVariant::WriteVec => {
                let ty = self.ty(op, &write.base.ty)?;
                let element_ty = self.ty(op, &write.value.ty)?;
                let index_ty = self.ty(op, &write.index.ty)?;
                let vector = self.value(op, &write.base)?;
                let element = self.value(op, &write.value)?;
                let index = self.value(op, &write.index)?;
                self.define(write.dest, |dest| MachineInst::InsertElement {
                    dest,
                    ty,
                    vector,
                    element_ty,
                    element,
                    index_ty,
                    index,
                });
            }
            BtorInstr::Write(write) if write.variant == WriteVariant::WriteMem => {
                let value = self.value(op, &write.value)?;
                let (element, ptr) = self.element_ptr(op, &write.base, &write.index)?;
                self.fb.push(MachineInst::Store {
                    ty: element,
                    value,
                    ptr,
                });
                let base = self.value(op, &write.base)?;
                self.env.insert(write.dest, base);
            }
            BtorInstr::NdArray(_)
            | BtorInstr::ArrayInit(_)
            | BtorInstr::Read(_)
            | BtorInstr::Write(_)
            | BtorInstr::IteWriteInPlace(_) => {
                return Err(missing(
                    op,
                    "abstract arrays must be lowered to vectors or memory first",
                ));
            }
            _ => {
                return Err(missing(
                    op,
                    "bit-vector operations must be lowered to `arith` first",
                ));
            }
        }
        Ok(())
    }

    fn lower_block(&mut self, block: &Block) -> BtorResult<Vec<MachineValue>> {
        for op in &block.operations {
            match &op.instr {
                AnyInstr::Arith(instr) => self.lower_arith(op, instr)?,
                AnyInstr::Btor(instr) => self.lower_btor(op, instr)?,
            }
        }
        let yields = block.yields.iter().map(|operand| {
            self.env
                .get(&operand.value)
                .cloned()
                .ok_or_else(|| BtorError::MissingLowering {
                    pass: PassKind::ToMachine.name(),
                    op: "btor.yield".to_string(),
                    detail: Some(format!("{} is not defined", operand.value)),
                })
        });
        yields.collect()
    }
}

fn memory_shape(ty: &Type) -> Option<(u64, MachineType)> {
    match ty {
        Type::Memory(memory) => match memory.shape.as_slice() {
            [length] => Some((*length, MachineType::Int(memory.element.width()))),
            _ => None,
        },
        _ => None,
    }
}

/// Memory states whose next value may live in a buffer allocated by `next`,
/// directly or through the previous value of another such state.
fn copied_states(model: &Model) -> BTreeSet<usize> {
    let mut classes = UnionFind::<u32>::new(model.next_available_value().0 as usize);
    let mut created = Vec::new();
    for op in &model.next.operations {
        let (dest, sources) = match &op.instr {
            AnyInstr::Btor(BtorInstr::ArrayInit(init)) if init.ty.is_memory() => {
                created.push(init.dest);
                continue;
            }
            AnyInstr::Btor(BtorInstr::Write(write)) => (write.dest, vec![write.base.value]),
            AnyInstr::Btor(BtorInstr::Ite(ite)) if ite.ty.is_memory() => {
                (ite.dest, vec![ite.then_value.value, ite.else_value.value])
            }
            AnyInstr::Arith(ArithInstr::Select(select)) if select.ty.is_memory() => (
                select.dest,
                vec![select.then_value.value, select.else_value.value],
            ),
            _ => continue,
        };
        for source in sources {
            classes.union(dest.0, source.0);
        }
    }

    let mut reused: BTreeSet<u32> = created.iter().map(|v| classes.find(v.0)).collect();
    let mut copied = BTreeSet::new();
    loop {
        let mut changed = false;
        for (state, ((param, ty), next)) in model.states.iter().zip(&model.next.yields).enumerate()
        {
            if ty.is_memory()
                && !copied.contains(&state)
                && reused.contains(&classes.find(next.value.0))
            {
                copied.insert(state);
                reused.insert(classes.find(param.0));
                changed = true;
            }
        }
        if !changed {
            return copied;
        }
    }
}

/// Lower `model`, which must only contain `arith` operations, sources,
/// assertions and vector or memory arrays.
pub fn lower_to_machine(model: &Model, config: &MachineConfig) -> BtorResult<MachineModule> {
    let mut lowerer = Lowerer {
        config,
        fb: FunctionBuilder::new(model.name.clone(), ENTRY),
        env: BTreeMap::new(),
        bad_count: 0,
    };

    let initial = lowerer.lower_block(&model.init)?;
    let entry_exit = lowerer.fb.current_label().to_string();
    lowerer
        .fb
        .terminate_and_start(Terminator::Br(LOOP.to_string()), LOOP);

    let mut phis = Vec::with_capacity(model.states.len());
    for (value, ty) in &model.states {
        let ty = machine_type(ty).ok_or_else(|| BtorError::MissingLowering {
            pass: PassKind::ToMachine.name(),
            op: "btor.model".to_string(),
            detail: Some(format!("no machine type for state {}: {}", value, ty)),
        })?;
        let reg = lowerer.define(*value, |dest| MachineInst::Phi {
            dest,
            ty,
            incoming: SmallVec::new(),
        });
        phis.push(reg);
    }

    let mut updated = lowerer.lower_block(&model.next)?;

    // Every copied state first goes to a scratch buffer, so that states
    // reading each other's previous buffer see the old contents.
    let mut copies = Vec::new();
    for state in copied_states(model) {
        let (value, ty) = &model.states[state];
        let (length, element) = memory_shape(ty).ok_or_else(|| BtorError::MissingLowering {
            pass: PassKind::ToMachine.name(),
            op: "btor.model".to_string(),
            detail: Some(format!("no machine buffer for state {}: {}", value, ty)),
        })?;
        let mut alloca = || {
            lowerer.emit(|dest| MachineInst::Alloca {
                dest,
                element: element.clone(),
                count: length,
            })
        };
        let (owned, scratch) = (alloca(), alloca());
        copies.push((state, owned, scratch, length, element));
    }
    for (state, _, scratch, length, element) in &copies {
        let from = updated[*state].clone();
        lowerer.copy(from, scratch.clone(), *length, element.clone());
    }
    if !copies.is_empty() {
        debug!(
            "{}: {} memory states copied at the end of `next`",
            PassKind::ToMachine.name(),
            copies.len()
        );
    }
    for (state, owned, scratch, length, element) in copies {
        lowerer.copy(scratch, owned.clone(), length, element);
        updated[state] = owned;
    }

    let loop_exit = lowerer.fb.current_label().to_string();
    lowerer.fb.terminate(Terminator::Br(LOOP.to_string()));

    if let Some(block) = lowerer.fb.block_mut(LOOP) {
        for inst in block.insts.iter_mut() {
            let MachineInst::Phi { dest, incoming, .. } = inst else {
                continue;
            };
            let Some(state) = phis.iter().position(|reg| *reg == MachineValue::Reg(*dest)) else {
                continue;
            };
            *incoming = smallvec![
                (initial[state].clone(), entry_exit.clone()),
                (updated[state].clone(), loop_exit.clone())
            ];
        }
    }

    let module = lowerer.fb.finish();
    debug!("Machine program of `{}`:\n{}", model.name, module);
    info!(
        "{}: {} blocks, {} instructions",
        PassKind::ToMachine.name(),
        module.blocks.len(),
        module.instructions().count()
    );
    Ok(module)
}

#[cfg(test)]
mod tests {
    use btorinstr::parser::parse_model;

    use super::*;

    const COUNTER: &str = r#"
btor.model @counter {
  init {
    %0 = arith.constant 0 : !btor.bv<8>
    btor.yield %0 : !btor.bv<8>
  }
  next(%1: !btor.bv<8>) {
    %2 = btor.input 0 : !btor.bv<8>
    %3 = arith.addi %1, %2 : !btor.bv<8>
    %4 = arith.constant 200 : !btor.bv<8>
    %5 = arith.cmpi ugt, %3, %4 : !btor.bv<8>
    btor.bad %5 : !btor.bv<1>
    btor.yield %3 : !btor.bv<8>
  }
}
"#;

    #[test]
    fn counter_becomes_a_loop() {
        let model = parse_model(COUNTER).unwrap();
        let module = lower_to_machine(&model, &MachineConfig::default()).unwrap();
        let text = module.to_string();

        assert!(text.contains("define void @counter() {"), "{text}");
        assert!(text.contains("declare i8 @btor.input.i8(i64)"), "{text}");
        assert!(text.contains("declare void @btor.bad(i64)"), "{text}");
        assert!(text.contains("= phi i8 [ 0, %entry ], [ %v2, %cont1 ]"), "{text}");
        assert!(text.contains("br i1 %v3, label %bad0, label %cont1"), "{text}");
        assert_eq!(module.calls_to("btor.bad").count(), 1);
        assert_eq!(
            module.block("cont1").unwrap().terminator,
            Some(Terminator::Br(LOOP.to_string()))
        );
    }

    #[test]
    fn freeze_replaces_input_calls() {
        let model = parse_model(COUNTER).unwrap();
        let config = MachineConfig {
            nd_lowering: NdLowering::Freeze,
            ..MachineConfig::default()
        };
        let module = lower_to_machine(&model, &config).unwrap();
        assert_eq!(module.calls_to("btor.input.i8").count(), 0);
        assert!(module.to_string().contains("= freeze i8 poison"));
    }

    #[test]
    fn bit_vector_operations_need_the_arithmetic_lowering() {
        let model = parse_model(&COUNTER.replace("arith.addi", "btor.add")).unwrap();
        let err = lower_to_machine(&model, &MachineConfig::default()).unwrap_err();
        let BtorError::MissingLowering { op, .. } = err else {
            panic!("expected a missing lowering, got {err}");
        };
        assert_eq!(op, "btor.add");
    }
}
