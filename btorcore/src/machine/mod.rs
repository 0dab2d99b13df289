//! Machine-level representation.
//!
//! A small LLVM-like SSA program: one function made of labelled blocks, each
//! ending with a branch. It only has what the lowering of a model needs and
//! prints in LLVM assembly syntax.
use std::{collections::BTreeMap, fmt};

use btorinstr::consts::BvConst;
use smallvec::SmallVec;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MachineType {
    Void,
    Int(u32),
    Vector { length: u64, element: u32 },
    Ptr,
}

impl MachineType {
    /// Suffix used to name functions overloaded on this type.
    pub fn mangle(&self) -> String {
        match self {
            MachineType::Void => "void".to_string(),
            MachineType::Int(width) => format!("i{}", width),
            MachineType::Vector { length, element } => format!("v{}i{}", length, element),
            MachineType::Ptr => "p0".to_string(),
        }
    }
}

impl fmt::Display for MachineType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MachineType::Void => write!(f, "void"),
            MachineType::Int(width) => write!(f, "i{}", width),
            MachineType::Vector { length, element } => write!(f, "<{} x i{}>", length, element),
            MachineType::Ptr => write!(f, "ptr"),
        }
    }
}

/// An instruction operand.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MachineValue {
    Reg(u32),
    Imm(BvConst),
    /// A 64-bit immediate, for sizes, offsets and ids.
    Imm64(i64),
    Poison,
}

impl fmt::Display for MachineValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MachineValue::Reg(n) => write!(f, "%v{}", n),
            MachineValue::Imm(value) if value.width() == 1 => {
                write!(f, "{}", if value.is_true() { "true" } else { "false" })
            }
            MachineValue::Imm(value) => write!(f, "{}", value),
            MachineValue::Imm64(value) => write!(f, "{}", value),
            MachineValue::Poison => write!(f, "poison"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    SDiv,
    UDiv,
    SRem,
    URem,
    And,
    Or,
    Xor,
    Shl,
    LShr,
    AShr,
}

impl BinOp {
    pub fn to_str(&self) -> &'static str {
        match self {
            BinOp::Add => "add",
            BinOp::Sub => "sub",
            BinOp::Mul => "mul",
            BinOp::SDiv => "sdiv",
            BinOp::UDiv => "udiv",
            BinOp::SRem => "srem",
            BinOp::URem => "urem",
            BinOp::And => "and",
            BinOp::Or => "or",
            BinOp::Xor => "xor",
            BinOp::Shl => "shl",
            BinOp::LShr => "lshr",
            BinOp::AShr => "ashr",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CastOp {
    ZExt,
    SExt,
    Trunc,
}

impl CastOp {
    pub fn to_str(&self) -> &'static str {
        match self {
            CastOp::ZExt => "zext",
            CastOp::SExt => "sext",
            CastOp::Trunc => "trunc",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MachineInst {
    Binary {
        dest: u32,
        op: BinOp,
        ty: MachineType,
        lhs: MachineValue,
        rhs: MachineValue,
    },
    ICmp {
        dest: u32,
        predicate: &'static str,
        ty: MachineType,
        lhs: MachineValue,
        rhs: MachineValue,
    },
    Select {
        dest: u32,
        ty: MachineType,
        cond: MachineValue,
        then_value: MachineValue,
        else_value: MachineValue,
    },
    Cast {
        dest: u32,
        op: CastOp,
        from: MachineType,
        to: MachineType,
        operand: MachineValue,
    },
    Freeze {
        dest: u32,
        ty: MachineType,
        operand: MachineValue,
    },
    Call {
        dest: Option<u32>,
        ret: MachineType,
        callee: String,
        args: Vec<(MachineType, MachineValue)>,
    },
    Phi {
        dest: u32,
        ty: MachineType,
        incoming: SmallVec<(MachineValue, String), 2>,
    },
    ExtractElement {
        dest: u32,
        ty: MachineType,
        vector: MachineValue,
        index_ty: MachineType,
        index: MachineValue,
    },
    InsertElement {
        dest: u32,
        ty: MachineType,
        vector: MachineValue,
        element_ty: MachineType,
        element: MachineValue,
        index_ty: MachineType,
        index: MachineValue,
    },
    /// Broadcast of element 0 of `vector`.
    Splat {
        dest: u32,
        ty: MachineType,
        length: u64,
        vector: MachineValue,
    },
    Alloca {
        dest: u32,
        element: MachineType,
        count: u64,
    },
    GetElementPtr {
        dest: u32,
        element: MachineType,
        base: MachineValue,
        index: MachineValue,
    },
    Load {
        dest: u32,
        ty: MachineType,
        ptr: MachineValue,
    },
    Store {
        ty: MachineType,
        value: MachineValue,
        ptr: MachineValue,
    },
}

impl MachineInst {
    pub fn dest(&self) -> Option<u32> {
        match self {
            MachineInst::Binary { dest, .. }
            | MachineInst::ICmp { dest, .. }
            | MachineInst::Select { dest, .. }
            | MachineInst::Cast { dest, .. }
            | MachineInst::Freeze { dest, .. }
            | MachineInst::Phi { dest, .. }
            | MachineInst::ExtractElement { dest, .. }
            | MachineInst::InsertElement { dest, .. }
            | MachineInst::Splat { dest, .. }
            | MachineInst::Alloca { dest, .. }
            | MachineInst::GetElementPtr { dest, .. }
            | MachineInst::Load { dest, .. } => Some(*dest),
            MachineInst::Call { dest, .. } => *dest,
            MachineInst::Store { .. } => None,
        }
    }
}

impl fmt::Display for MachineInst {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(dest) = self.dest() {
            write!(f, "{} = ", MachineValue::Reg(dest))?;
        }
        match self {
            MachineInst::Binary {
                op, ty, lhs, rhs, ..
            } => write!(f, "{} {} {}, {}", op.to_str(), ty, lhs, rhs),
            MachineInst::ICmp {
                predicate,
                ty,
                lhs,
                rhs,
                ..
            } => write!(f, "icmp {} {} {}, {}", predicate, ty, lhs, rhs),
            MachineInst::Select {
                ty,
                cond,
                then_value,
                else_value,
                ..
            } => write!(
                f,
                "select i1 {}, {} {}, {} {}",
                cond, ty, then_value, ty, else_value
            ),
            MachineInst::Cast {
                op,
                from,
                to,
                operand,
                ..
            } => write!(f, "{} {} {} to {}", op.to_str(), from, operand, to),
            MachineInst::Freeze { ty, operand, .. } => write!(f, "freeze {} {}", ty, operand),
            MachineInst::Call {
                ret, callee, args, ..
            } => {
                write!(f, "call {} @{}(", ret, callee)?;
                for (i, (ty, value)) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{} {}", ty, value)?;
                }
                write!(f, ")")
            }
            MachineInst::Phi { ty, incoming, .. } => {
                write!(f, "phi {} ", ty)?;
                for (i, (value, label)) in incoming.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "[ {}, %{} ]", value, label)?;
                }
                Ok(())
            }
            MachineInst::ExtractElement {
                ty,
                vector,
                index_ty,
                index,
                ..
            } => write!(f, "extractelement {} {}, {} {}", ty, vector, index_ty, index),
            MachineInst::InsertElement {
                ty,
                vector,
                element_ty,
                element,
                index_ty,
                index,
                ..
            } => write!(
                f,
                "insertelement {} {}, {} {}, {} {}",
                ty, vector, element_ty, element, index_ty, index
            ),
            MachineInst::Splat {
                ty, length, vector, ..
            } => write!(
                f,
                "shufflevector {} {}, {} poison, <{} x i32> zeroinitializer",
                ty, vector, ty, length
            ),
            MachineInst::Alloca { element, count, .. } => {
                write!(f, "alloca {}, i64 {}", element, count)
            }
            MachineInst::GetElementPtr {
                element,
                base,
                index,
                ..
            } => write!(f, "getelementptr {}, ptr {}, i64 {}", element, base, index),
            MachineInst::Load { ty, ptr, .. } => write!(f, "load {}, ptr {}", ty, ptr),
            MachineInst::Store { ty, value, ptr } => write!(f, "store {} {}, ptr {}", ty, value, ptr),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Terminator {
    Br(String),
    CondBr {
        cond: MachineValue,
        then_label: String,
        else_label: String,
    },
    RetVoid,
}

impl fmt::Display for Terminator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Terminator::Br(label) => write!(f, "br label %{}", label),
            Terminator::CondBr {
                cond,
                then_label,
                else_label,
            } => write!(
                f,
                "br i1 {}, label %{}, label %{}",
                cond, then_label, else_label
            ),
            Terminator::RetVoid => write!(f, "ret void"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MachineBlock {
    pub label: String,
    pub insts: Vec<MachineInst>,
    pub terminator: Option<Terminator>,
}

/// External function a module calls.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Declaration {
    pub ret: MachineType,
    pub params: Vec<MachineType>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MachineModule {
    pub name: String,
    pub declarations: BTreeMap<String, Declaration>,
    pub blocks: Vec<MachineBlock>,
}

impl MachineModule {
    pub fn block(&self, label: &str) -> Option<&MachineBlock> {
        self.blocks.iter().find(|block| block.label == label)
    }

    pub fn instructions(&self) -> impl Iterator<Item = &MachineInst> {
        self.blocks.iter().flat_map(|block| block.insts.iter())
    }

    /// Calls to `callee`, in block order.
    pub fn calls_to<'a>(&'a self, callee: &'a str) -> impl Iterator<Item = &'a MachineInst> {
        self.instructions().filter(move |inst| {
            matches!(inst, MachineInst::Call { callee: name, .. } if name == callee)
        })
    }
}

impl fmt::Display for MachineModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "; ModuleID = '{}'", self.name)?;
        for (name, decl) in &self.declarations {
            write!(f, "declare {} @{}(", decl.ret, name)?;
            for (i, param) in decl.params.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", param)?;
            }
            writeln!(f, ")")?;
        }
        writeln!(f)?;
        writeln!(f, "define void @{}() {{", self.name)?;
        for (i, block) in self.blocks.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            writeln!(f, "{}:", block.label)?;
            for inst in &block.insts {
                writeln!(f, "  {}", inst)?;
            }
            if let Some(terminator) = &block.terminator {
                writeln!(f, "  {}", terminator)?;
            }
        }
        writeln!(f, "}}")
    }
}

/// Incremental construction of a [`MachineModule`].
///
/// Instructions go to the current block; `alloca`s always go to the first
/// block so that they run once.
#[derive(Debug)]
pub struct FunctionBuilder {
    module: MachineModule,
    allocas: Vec<MachineInst>,
    current: usize,
    next_reg: u32,
    next_label: u32,
}

impl FunctionBuilder {
    pub fn new(name: impl Into<String>, entry: impl Into<String>) -> Self {
        Self {
            module: MachineModule {
                name: name.into(),
                declarations: BTreeMap::new(),
                blocks: vec![MachineBlock {
                    label: entry.into(),
                    insts: Vec::new(),
                    terminator: None,
                }],
            },
            allocas: Vec::new(),
            current: 0,
            next_reg: 0,
            next_label: 0,
        }
    }

    pub fn fresh(&mut self) -> u32 {
        let reg = self.next_reg;
        self.next_reg += 1;
        reg
    }

    /// A label not used yet, starting with `prefix`.
    pub fn fresh_label(&mut self, prefix: &str) -> String {
        let label = format!("{}{}", prefix, self.next_label);
        self.next_label += 1;
        label
    }

    pub fn current_label(&self) -> &str {
        &self.module.blocks[self.current].label
    }

    pub fn current_block_mut(&mut self) -> &mut MachineBlock {
        &mut self.module.blocks[self.current]
    }

    pub fn block_mut(&mut self, label: &str) -> Option<&mut MachineBlock> {
        self.module
            .blocks
            .iter_mut()
            .find(|block| block.label == label)
    }

    pub fn declare(&mut self, name: &str, ret: MachineType, params: Vec<MachineType>) {
        self.module
            .declarations
            .entry(name.to_string())
            .or_insert(Declaration { ret, params });
    }

    pub fn push(&mut self, inst: MachineInst) {
        if matches!(inst, MachineInst::Alloca { .. }) {
            self.allocas.push(inst);
        } else {
            self.current_block_mut().insts.push(inst);
        }
    }

    /// End the current block with `terminator` and continue in a new block.
    pub fn terminate_and_start(&mut self, terminator: Terminator, label: impl Into<String>) {
        self.terminate(terminator);
        self.module.blocks.push(MachineBlock {
            label: label.into(),
            insts: Vec::new(),
            terminator: None,
        });
        self.current = self.module.blocks.len() - 1;
    }

    pub fn terminate(&mut self, terminator: Terminator) {
        self.current_block_mut().terminator = Some(terminator);
    }

    pub fn finish(mut self) -> MachineModule {
        let allocas = std::mem::take(&mut self.allocas);
        if let Some(entry) = self.module.blocks.first_mut() {
            entry.insts.splice(0..0, allocas);
        }
        self.module
    }
}

#[cfg(test)]
mod tests {
    use btorinstr::types::BitVecType;

    use super::*;

    #[test]
    fn instructions_print_in_assembly_syntax() {
        let i8 = MachineType::Int(8);
        let cases = [
            (
                MachineInst::Binary {
                    dest: 3,
                    op: BinOp::LShr,
                    ty: i8.clone(),
                    lhs: MachineValue::Reg(1),
                    rhs: MachineValue::Imm(BvConst::from_u64(BitVecType::new(8).unwrap(), 200)),
                },
                "%v3 = lshr i8 %v1, 200",
            ),
            (
                MachineInst::Select {
                    dest: 4,
                    ty: MachineType::Ptr,
                    cond: MachineValue::Imm(BvConst::from_bool(true)),
                    then_value: MachineValue::Reg(0),
                    else_value: MachineValue::Reg(2),
                },
                "%v4 = select i1 true, ptr %v0, ptr %v2",
            ),
            (
                MachineInst::Splat {
                    dest: 5,
                    ty: MachineType::Vector {
                        length: 4,
                        element: 8,
                    },
                    length: 4,
                    vector: MachineValue::Reg(4),
                },
                "%v5 = shufflevector <4 x i8> %v4, <4 x i8> poison, <4 x i32> zeroinitializer",
            ),
            (
                MachineInst::Call {
                    dest: None,
                    ret: MachineType::Void,
                    callee: "btor.bad".to_string(),
                    args: vec![(MachineType::Int(64), MachineValue::Imm64(2))],
                },
                "call void @btor.bad(i64 2)",
            ),
            (
                MachineInst::Store {
                    ty: i8,
                    value: MachineValue::Reg(7),
                    ptr: MachineValue::Reg(6),
                },
                "store i8 %v7, ptr %v6",
            ),
        ];
        for (inst, expected) in cases {
            assert_eq!(inst.to_string(), expected);
        }
    }

    #[test]
    fn allocas_are_hoisted_to_the_entry_block() {
        let mut builder = FunctionBuilder::new("hoist", "entry");
        let a = builder.fresh();
        builder.terminate_and_start(Terminator::Br("body".to_string()), "body");
        builder.push(MachineInst::Alloca {
            dest: a,
            element: MachineType::Int(8),
            count: 16,
        });
        builder.terminate(Terminator::RetVoid);
        let module = builder.finish();

        assert_eq!(module.blocks[0].insts.len(), 1);
        assert!(module.block("body").unwrap().insts.is_empty());
        assert!(module.to_string().contains("entry:\n  %v0 = alloca i8, i64 16\n  br label %body"));
    }
}
