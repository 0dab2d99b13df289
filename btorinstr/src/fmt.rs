//! Textual printer for operations, blocks and models.
//!
//! The output is the exact input language of [`crate::parser`]: each family
//! prints its operands, the attribute dictionary, then the type list its
//! parser expects. Optional types are only printed when they differ from
//! the type the parser would infer.
use std::fmt::{Display, Formatter, Result};

use crate::{
    modules::{
        Block, Model,
        instructions::{AnyInstr, ArithInstr, BtorInstr, Instruction, Operation},
        operand::Operand,
    },
    types::{BitVecType, Type},
};

const INDENT: &str = "  ";

fn write_operands(f: &mut Formatter<'_>, operands: &[&Operand]) -> Result {
    for (i, operand) in operands.iter().enumerate() {
        if i > 0 {
            write!(f, ",")?;
        }
        write!(f, " {}", operand.value)?;
    }
    Ok(())
}

fn write_types(f: &mut Formatter<'_>, types: &[&Type]) -> Result {
    write!(f, " :")?;
    for (i, ty) in types.iter().enumerate() {
        if i > 0 {
            write!(f, ",")?;
        }
        write!(f, " {}", ty)?;
    }
    Ok(())
}

fn write_indexed(f: &mut Formatter<'_>, base: &Operand, index: &Operand) -> Result {
    write!(f, " {}[{}]", base.value, index.value)
}

/// Index type the parser assumes for an array type.
pub(crate) fn default_index_type(ty: &Type) -> Type {
    match ty.index() {
        Some(index) => index.into(),
        None => {
            // Shapes without a derivable index width still need a type for the
            // index operand, the verifier reports the shape itself.
            let len = match ty {
                Type::Vector(v) => v.shape.first().copied(),
                Type::Memory(m) => m.shape.first().copied(),
                _ => None,
            };
            let width = len
                .map(|l| u64::BITS - l.saturating_sub(1).leading_zeros())
                .unwrap_or(1)
                .max(1);
            Type::BitVec(BitVecType::new(width).unwrap_or(BitVecType::BOOL))
        }
    }
}

fn bool_type() -> Type {
    Type::BitVec(BitVecType::BOOL)
}

impl Display for Operation {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        if let Some(dest) = self.destination() {
            write!(f, "{} = ", dest)?;
        }
        write!(f, "{}", self.instr.full_name())?;

        match &self.instr {
            AnyInstr::Btor(instr) => self.fmt_btor(f, instr),
            AnyInstr::Arith(instr) => self.fmt_arith(f, instr),
        }
    }
}

impl Operation {
    fn fmt_btor(&self, f: &mut Formatter<'_>, instr: &BtorInstr) -> Result {
        let attrs = &self.attrs;
        match instr {
            BtorInstr::Binary(i) => {
                write_operands(f, &[&i.lhs, &i.rhs])?;
                write!(f, "{}", attrs)?;
                write_types(f, &[&i.lhs.ty])
            }
            BtorInstr::Overflow(i) => {
                write_operands(f, &[&i.lhs, &i.rhs])?;
                write!(f, "{}", attrs)?;
                write_types(f, &[&i.lhs.ty])
            }
            BtorInstr::Logic(i) => {
                write_operands(f, &[&i.lhs, &i.rhs])?;
                write!(f, "{}", attrs)?;
                write_types(f, &[&i.lhs.ty])
            }
            BtorInstr::Cmp(i) => {
                write!(f, " {},", i.predicate.to_str())?;
                write_operands(f, &[&i.lhs, &i.rhs])?;
                write!(f, "{}", attrs)?;
                write_types(f, &[&i.lhs.ty])
            }
            BtorInstr::Unary(i) => {
                write_operands(f, &[&i.operand])?;
                write!(f, "{}", attrs)?;
                write_types(f, &[&i.operand.ty])
            }
            BtorInstr::Reduce(i) => {
                write_operands(f, &[&i.operand])?;
                write!(f, "{}", attrs)?;
                write_types(f, &[&i.operand.ty])
            }
            BtorInstr::Ext(i) => {
                write_operands(f, &[&i.operand])?;
                write!(f, "{}", attrs)?;
                write_types(f, &[&i.operand.ty, &i.ty])
            }
            BtorInstr::Slice(i) => {
                write_operands(f, &[&i.operand, &i.upper, &i.lower])?;
                write!(f, "{}", attrs)?;
                if i.ty == i.operand.ty {
                    write_types(f, &[&i.operand.ty])
                } else {
                    write_types(f, &[&i.operand.ty, &i.ty])
                }
            }
            BtorInstr::Concat(i) => {
                write_operands(f, &[&i.lhs, &i.rhs])?;
                write!(f, "{}", attrs)?;
                write_types(f, &[&i.lhs.ty, &i.rhs.ty, &i.ty])
            }
            BtorInstr::Ite(i) => {
                write_operands(f, &[&i.cond, &i.then_value, &i.else_value])?;
                write!(f, "{}", attrs)?;
                if i.cond.ty == bool_type() {
                    write_types(f, &[&i.ty])
                } else {
                    write_types(f, &[&i.ty, &i.cond.ty])
                }
            }
            BtorInstr::Constant(i) => {
                write!(f, " {}{}", i.value, attrs)?;
                write_types(f, &[&i.ty])
            }
            BtorInstr::Source(i) => {
                write!(f, " {}{}", i.id, attrs)?;
                write_types(f, &[&i.ty])
            }
            BtorInstr::NdArray(i) => {
                write!(f, " {}{}", i.id, attrs)?;
                write_types(f, &[&i.ty])
            }
            BtorInstr::ArrayInit(i) => {
                if let Some(init) = &i.init {
                    write_operands(f, &[init])?;
                }
                write!(f, "{}", attrs)?;
                write_types(f, &[&i.ty])
            }
            BtorInstr::Read(i) => {
                write_indexed(f, &i.base, &i.index)?;
                write!(f, "{}", attrs)?;
                if Some(&i.ty) == i.base.ty.element().map(Type::from).as_ref() {
                    write_types(f, &[&i.base.ty])
                } else {
                    write_types(f, &[&i.base.ty, &i.ty])
                }
            }
            BtorInstr::Write(i) => {
                write_operands(f, &[&i.value])?;
                write!(f, ",")?;
                write_indexed(f, &i.base, &i.index)?;
                write!(f, "{}", attrs)?;
                write_types(f, &[&i.ty])
            }
            BtorInstr::IteWriteInPlace(i) => {
                write_operands(f, &[&i.cond, &i.value])?;
                write!(f, ",")?;
                write_indexed(f, &i.base, &i.index)?;
                write!(f, "{}", attrs)?;
                write_types(f, &[&i.ty])
            }
            BtorInstr::Assert(i) => {
                write_operands(f, &[&i.cond])?;
                if let Some(id) = i.id {
                    write!(f, ", {}", id)?;
                }
                write!(f, "{}", attrs)?;
                write_types(f, &[&i.cond.ty])
            }
        }
    }

    fn fmt_arith(&self, f: &mut Formatter<'_>, instr: &ArithInstr) -> Result {
        let attrs = &self.attrs;
        match instr {
            ArithInstr::Binary(i) => {
                write_operands(f, &[&i.lhs, &i.rhs])?;
                write!(f, "{}", attrs)?;
                write_types(f, &[&i.lhs.ty])
            }
            ArithInstr::Cmp(i) => {
                write!(f, " {},", i.predicate.to_str())?;
                write_operands(f, &[&i.lhs, &i.rhs])?;
                write!(f, "{}", attrs)?;
                write_types(f, &[&i.lhs.ty])
            }
            ArithInstr::Select(i) => {
                write_operands(f, &[&i.cond, &i.then_value, &i.else_value])?;
                write!(f, "{}", attrs)?;
                if i.cond.ty == bool_type() {
                    write_types(f, &[&i.ty])
                } else {
                    write_types(f, &[&i.ty, &i.cond.ty])
                }
            }
            ArithInstr::Cast(i) => {
                write_operands(f, &[&i.operand])?;
                write!(f, "{} : {} to {}", attrs, i.operand.ty, i.ty)
            }
            ArithInstr::Constant(i) => {
                write!(f, " {}{}", i.value, attrs)?;
                write_types(f, &[&Type::BitVec(i.value.ty())])
            }
        }
    }
}

/// Prints `btor.yield`, with its operands and their types when non-empty.
struct Yield<'a>(&'a [Operand]);

impl Display for Yield<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        write!(f, "btor.yield")?;
        if self.0.is_empty() {
            return Ok(());
        }
        let operands: Vec<&Operand> = self.0.iter().collect();
        write_operands(f, &operands)?;
        let types: Vec<&Type> = self.0.iter().map(|o| &o.ty).collect();
        write_types(f, &types)
    }
}

impl Block {
    /// Render the block body with the given indentation depth.
    pub fn fmt_indented(&self, depth: usize) -> impl Display + '_ {
        struct Fmt<'a> {
            block: &'a Block,
            depth: usize,
        }

        impl Display for Fmt<'_> {
            fn fmt(&self, f: &mut Formatter<'_>) -> Result {
                let indent = INDENT.repeat(self.depth);
                for op in &self.block.operations {
                    writeln!(f, "{}{}", indent, op)?;
                }
                writeln!(f, "{}{}", indent, Yield(&self.block.yields))
            }
        }

        Fmt { block: self, depth }
    }
}

impl Display for Block {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        write!(f, "{}", self.fmt_indented(0))
    }
}

impl Display for Model {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        writeln!(f, "btor.model @{} {{", self.name)?;
        writeln!(f, "{}init {{", INDENT)?;
        write!(f, "{}", self.init.fmt_indented(2))?;
        writeln!(f, "{}}}", INDENT)?;
        write!(f, "{}next(", INDENT)?;
        for (i, (value, ty)) in self.states.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", value, ty)?;
        }
        writeln!(f, ") {{")?;
        write!(f, "{}", self.next.fmt_indented(2))?;
        writeln!(f, "{}}}", INDENT)?;
        writeln!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        attributes::AttrValue,
        modules::{
            builder::OpBuilder,
            instructions::bv::{BinaryVariant, ExtVariant},
            operand::Value,
        },
    };

    #[test]
    fn prints_families() {
        let mut b = OpBuilder::new(Value(0));
        let a = b.constant_u64(BitVecType::new(8).unwrap(), 3).unwrap();
        let sum = b.binary(BinaryVariant::Add, &a, &a).unwrap();
        b.ext(ExtVariant::SExt, &sum, BitVecType::new(16).unwrap())
            .unwrap();
        let ops = b.take();

        assert_eq!(ops[0].to_string(), "%0 = btor.constant 3 : !btor.bv<8>");
        assert_eq!(ops[1].to_string(), "%1 = btor.add %0, %0 : !btor.bv<8>");
        assert_eq!(
            ops[2].to_string(),
            "%2 = btor.sext %1 : !btor.bv<8>, !btor.bv<16>"
        );
    }

    #[test]
    fn attributes_precede_types() {
        let mut b = OpBuilder::new(Value(0));
        b.constant_u64(BitVecType::BOOL, 1).unwrap();
        let mut attrs = crate::attributes::Attributes::default();
        attrs.insert("symbol", AttrValue::Str("reset".into()));
        let op = b.take().remove(0).with_attrs(attrs);
        assert_eq!(
            op.to_string(),
            "%0 = btor.constant 1 {symbol = \"reset\"} : !btor.bv<1>"
        );
    }
}
