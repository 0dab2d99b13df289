//! Textual parser for types, operations and models.
//!
//! Parsing is syntax-directed per operation family: a fixed operand list,
//! an optional attribute dictionary, then a colon-delimited type list from
//! which the operand and result types are derived. Value names of the form
//! `%<digits>` keep their number; any other `%<ident>` is interned to a fresh
//! number above the largest numeric name of the source.
use std::{cell::RefCell, collections::BTreeMap, rc::Rc};

use chumsky::{prelude::*, text::digits};
use log::debug;
use num_bigint::{BigInt, BigUint};

use crate::{
    attributes::{AttrValue, Attributes},
    consts::BvConst,
    fmt::default_index_type,
    modules::{
        Block, Model,
        instructions::{
            AnyInstr, Instruction, Operation,
            arith::{
                ArithBinary, ArithBinaryVariant, ArithCast, ArithCastVariant, ArithCmp,
                ArithConstant, ArithSelect,
            },
            array::{
                ArrayInit, ArrayRead, ArrayWrite, InitVariant, IteWriteInPlace, NdArray,
                ReadVariant, WriteVariant,
            },
            bv::{
                BinaryVariant, BvBinary, BvCmp, BvConcat, BvConstant, BvExt, BvIte, BvLogic,
                BvOverflow, BvReduce, BvSlice, BvSource, BvUnary, CmpPredicate, ExtVariant,
                LogicVariant, OverflowVariant, ReduceVariant, SourceVariant, UnaryVariant,
            },
            meta::{AssertVariant, BtorAssert},
        },
        operand::{Operand, Value},
    },
    types::{ArrayType, BitVecType, MemArrayType, Shape, Type, VectorArrayType},
    utils::{Error, ParserError},
};

type Extra<'src> = extra::Err<Rich<'src, char>>;

/// Destination placeholder until the `%x =` prefix is attached.
const PENDING: Value = Value(u32::MAX);

/// Maps textual value names to [`Value`]s.
#[derive(Clone, Default)]
struct Interner(Rc<RefCell<InternerState>>);

#[derive(Default)]
struct InternerState {
    names: BTreeMap<String, Value>,
    next: u32,
}

impl Interner {
    fn for_source(src: &str) -> Self {
        let interner = Interner::default();
        interner.0.borrow_mut().next = max_numeric_name(src).map(|n| n.saturating_add(1)).unwrap_or(0);
        interner
    }

    fn resolve(&self, name: &str) -> Option<Value> {
        if name.bytes().all(|b| b.is_ascii_digit()) {
            return name.parse::<u32>().ok().map(Value);
        }
        let state = &mut *self.0.borrow_mut();
        if let Some(value) = state.names.get(name) {
            return Some(*value);
        }
        let value = Value(state.next);
        state.next = state.next.checked_add(1)?;
        state.names.insert(name.to_string(), value);
        Some(value)
    }
}

/// Largest `%<digits>` name appearing in `src`.
fn max_numeric_name(src: &str) -> Option<u32> {
    src.split('%')
        .skip(1)
        .filter_map(|rest| {
            let end = rest
                .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                .unwrap_or(rest.len());
            let name = &rest[..end];
            if !name.is_empty() && name.bytes().all(|b| b.is_ascii_digit()) {
                name.parse::<u32>().ok()
            } else {
                None
            }
        })
        .max()
}

/// Whitespace and `//` line comments.
fn ws<'src>() -> impl Parser<'src, &'src str, (), Extra<'src>> + Clone {
    let comment = just("//")
        .then(any().and_is(just("\n").not()).repeated())
        .padded()
        .ignored();
    text::whitespace().then(comment.repeated()).ignored()
}

fn tok<'src>(s: &'static str) -> impl Parser<'src, &'src str, &'static str, Extra<'src>> + Clone {
    just(s).to(s).padded_by(ws())
}

fn width_parser<'src>() -> impl Parser<'src, &'src str, u32, Extra<'src>> + Clone {
    digits(10).to_slice().try_map(|digits: &str, span| {
        digits
            .parse::<u32>()
            .map_err(|_| Rich::custom(span, format!("invalid bit-vector width: {}", digits)))
    })
}

fn u64_parser<'src>() -> impl Parser<'src, &'src str, u64, Extra<'src>> + Clone {
    digits(10)
        .to_slice()
        .try_map(|digits: &str, span| {
            digits
                .parse::<u64>()
                .map_err(|_| Rich::custom(span, format!("invalid integer: {}", digits)))
        })
        .labelled("integer")
}

pub fn bitvec_type_parser<'src>()
-> impl Parser<'src, &'src str, BitVecType, extra::Err<Rich<'src, char>>> + Clone {
    just("!btor.bv<")
        .ignore_then(width_parser().padded())
        .then_ignore(just(">"))
        .try_map(|width, span| {
            BitVecType::new(width).ok_or_else(|| {
                Rich::custom(
                    span,
                    format!(
                        "bit-vector width must be between {} and {}, got {}",
                        BitVecType::MIN_WIDTH,
                        BitVecType::MAX_WIDTH,
                        width
                    ),
                )
            })
        })
        .labelled("bit-vector type")
}

pub fn type_parser<'src>()
-> impl Parser<'src, &'src str, Type, extra::Err<Rich<'src, char>>> + Clone {
    let array = just("!btor.array<")
        .ignore_then(bitvec_type_parser().padded())
        .then_ignore(just(","))
        .then(bitvec_type_parser().padded())
        .then_ignore(just(">"))
        .map(|(index, element)| Type::Array(ArrayType { index, element }))
        .labelled("array type");

    let dim = u64_parser().then_ignore(just("x").padded());
    let shaped = move |keyword: &'static str| {
        just(keyword)
            .ignore_then(just("<"))
            .ignore_then(dim.clone().padded().repeated().at_least(1).collect::<Vec<u64>>())
            .then(bitvec_type_parser())
            .then_ignore(just(">").padded())
            .map(|(dims, element)| (dims.into_iter().collect::<Shape>(), element))
    };

    let vector = shaped("vector")
        .map(|(shape, element)| Type::Vector(VectorArrayType { shape, element }))
        .labelled("vector array type");
    let memref = shaped("memref")
        .map(|(shape, element)| Type::Memory(MemArrayType { shape, element }))
        .labelled("memory array type");

    choice((
        bitvec_type_parser().map(Type::BitVec),
        array,
        vector,
        memref,
    ))
    .labelled("type")
}

fn value_parser<'src>(names: Interner) -> impl Parser<'src, &'src str, Value, Extra<'src>> + Clone {
    just("%")
        .ignore_then(
            any()
                .filter(|c: &char| c.is_ascii_alphanumeric() || *c == '_')
                .repeated()
                .at_least(1)
                .to_slice(),
        )
        .try_map(move |name: &str, span| {
            names
                .resolve(name)
                .ok_or_else(|| Rich::custom(span, format!("invalid value name: %{}", name)))
        })
        .labelled("value")
}

fn attr_value_parser<'src>() -> impl Parser<'src, &'src str, AttrValue, Extra<'src>> + Clone {
    let escape = just('\\').ignore_then(choice((
        just('"').to('"'),
        just('\\').to('\\'),
        just('\'').to('\''),
        just('n').to('\n'),
        just('t').to('\t'),
        just('r').to('\r'),
        just('0').to('\0'),
        just('u').ignore_then(
            text::digits(16)
                .to_slice()
                .delimited_by(just('{'), just('}'))
                .try_map(|hex: &str, span| {
                    u32::from_str_radix(hex, 16)
                        .ok()
                        .and_then(char::from_u32)
                        .ok_or_else(|| Rich::custom(span, format!("invalid character code: {}", hex)))
                }),
        ),
    )));
    let string = choice((escape, none_of("\\\"")))
        .repeated()
        .collect::<String>()
        .delimited_by(just('"'), just('"'))
        .map(AttrValue::Str);

    let int = just('-')
        .or_not()
        .then(digits(10))
        .to_slice()
        .try_map(|s: &str, span| {
            s.parse::<i64>()
                .map(AttrValue::Int)
                .map_err(|_| Rich::custom(span, format!("integer attribute out of range: {}", s)))
        });

    choice((
        just("true").to(AttrValue::Bool(true)),
        just("false").to(AttrValue::Bool(false)),
        int,
        string,
    ))
    .labelled("attribute value")
}

fn attributes_parser<'src>() -> impl Parser<'src, &'src str, Attributes, Extra<'src>> + Clone {
    let entry = text::ascii::ident()
        .map(|key: &str| key.to_string())
        .then(tok("=").ignore_then(attr_value_parser()).or_not())
        .map(|(key, value)| (key, value.unwrap_or(AttrValue::Unit)));

    entry
        .padded_by(ws())
        .separated_by(just(","))
        .collect::<Vec<_>>()
        .delimited_by(just("{"), just("}"))
        .map(|entries| entries.into_iter().collect::<Attributes>())
        .or_not()
        .map(Option::unwrap_or_default)
        .labelled("attribute dictionary")
}

/// Integer literal of a `constant`, resolved against the result type once
/// it is known.
#[derive(Debug, Clone)]
enum Literal {
    /// `8'b0101`, `8'd5`, `8'hff`
    Sized { width: u32, value: BigUint },
    /// Decimal, `0x`, `0b` or negative decimal
    Unsized(BigInt),
}

impl Literal {
    fn resolve(&self, ty: &Type) -> Result<BvConst, String> {
        match self {
            Literal::Sized { width, value } => {
                let lit_ty = BitVecType::new(*width)
                    .ok_or_else(|| format!("invalid literal width {}", width))?;
                BvConst::new(lit_ty, value.clone())
                    .ok_or_else(|| format!("literal {} does not fit in {} bits", value, width))
            }
            Literal::Unsized(value) => {
                let bv = ty
                    .as_bitvec()
                    .ok_or_else(|| format!("constant must have a bit-vector type, got {}", ty))?;
                match value.to_biguint() {
                    Some(magnitude) => BvConst::new(bv, magnitude).ok_or_else(|| {
                        format!("literal {} does not fit in {} bits", value, bv.width())
                    }),
                    None => {
                        let min = -(BigInt::from(1u8) << (bv.width() - 1) as usize);
                        if *value < min {
                            Err(format!("literal {} does not fit in {} bits", value, bv.width()))
                        } else {
                            Ok(BvConst::from_signed(bv, value))
                        }
                    }
                }
            }
        }
    }
}

fn radix_digits<'src>(radix: u32) -> impl Parser<'src, &'src str, BigUint, Extra<'src>> + Clone {
    digits(radix).to_slice().try_map(move |s: &str, span| {
        BigUint::parse_bytes(s.as_bytes(), radix)
            .ok_or_else(|| Rich::custom(span, format!("invalid base-{} number: {}", radix, s)))
    })
}

fn literal_parser<'src>() -> impl Parser<'src, &'src str, Literal, Extra<'src>> + Clone {
    let sized = width_parser()
        .then_ignore(just("'"))
        .then(choice((
            just("b").ignore_then(radix_digits(2)),
            just("d").ignore_then(radix_digits(10)),
            just("h").ignore_then(radix_digits(16)),
        )))
        .map(|(width, value)| Literal::Sized { width, value })
        .labelled("sized literal");

    let magnitude = choice((
        just("0x").ignore_then(radix_digits(16)),
        just("0b").ignore_then(radix_digits(2)),
        radix_digits(10),
    ));
    let unsized_lit = just("-")
        .or_not()
        .then(magnitude)
        .map(|(neg, value)| {
            let value = BigInt::from(value);
            Literal::Unsized(if neg.is_some() { -value } else { value })
        })
        .labelled("literal");

    choice((sized, unsized_lit))
}

/// `attrs? : T (, T)*`
fn attrs_and_types<'src>() -> impl Parser<'src, &'src str, (Attributes, Vec<Type>), Extra<'src>> + Clone
{
    attributes_parser()
        .padded_by(ws())
        .then_ignore(just(":"))
        .then(
            type_parser()
                .padded_by(ws())
                .separated_by(just(","))
                .at_least(1)
                .collect::<Vec<_>>(),
        )
}

fn mnemonic<'src, T: Clone + 'src>(
    dialect: &'static str,
    lookup: impl Fn(&str) -> Option<T> + Clone + 'src,
) -> impl Parser<'src, &'src str, T, Extra<'src>> + Clone {
    just(dialect)
        .ignore_then(just("."))
        .ignore_then(text::ascii::ident())
        .try_map(move |name: &str, span| {
            lookup(name)
                .ok_or_else(|| Rich::custom(span, format!("unknown operation `{}.{}`", dialect, name)))
        })
        .padded_by(ws())
}

fn values<'src>(
    names: Interner,
    count: usize,
) -> impl Parser<'src, &'src str, Vec<Value>, Extra<'src>> + Clone {
    value_parser(names)
        .padded_by(ws())
        .separated_by(just(","))
        .exactly(count)
        .collect::<Vec<_>>()
}

/// `%base[%index]`
fn indexed<'src>(names: Interner) -> impl Parser<'src, &'src str, (Value, Value), Extra<'src>> + Clone {
    value_parser(names.clone())
        .then(value_parser(names).padded_by(ws()).delimited_by(just("["), just("]")))
        .padded_by(ws())
}

fn check_arity(op: &str, types: &[Type], min: usize, max: usize) -> Result<(), String> {
    if types.len() < min || types.len() > max {
        let expected = if min == max {
            format!("{}", min)
        } else {
            format!("{} to {}", min, max)
        };
        return Err(format!(
            "`{}` expects {} type(s) after `:`, got {}",
            op,
            expected,
            types.len()
        ));
    }
    Ok(())
}

fn bool_type() -> Type {
    Type::BitVec(BitVecType::BOOL)
}

fn element_or_self(ty: &Type) -> Type {
    ty.element().map(Type::from).unwrap_or_else(|| ty.clone())
}

/// Families whose operands all share the single listed type.
#[derive(Debug, Clone, Copy)]
enum Shared {
    Binary(BinaryVariant),
    Overflow(OverflowVariant),
    Logic(LogicVariant),
    Unary(UnaryVariant),
    Reduce(ReduceVariant),
    ArithBinary(ArithBinaryVariant),
}

impl Shared {
    fn lookup_btor(name: &str) -> Option<Self> {
        BinaryVariant::from_str(name)
            .map(Shared::Binary)
            .or_else(|| OverflowVariant::from_str(name).map(Shared::Overflow))
            .or_else(|| LogicVariant::from_str(name).map(Shared::Logic))
            .or_else(|| UnaryVariant::from_str(name).map(Shared::Unary))
            .or_else(|| ReduceVariant::from_str(name).map(Shared::Reduce))
    }

    fn arity(&self) -> usize {
        match self {
            Shared::Unary(_) | Shared::Reduce(_) => 1,
            _ => 2,
        }
    }

    fn build(self, values: &[Value], ty: Type) -> AnyInstr {
        let opnd = |i: usize| Operand::new(values[i], ty.clone());
        match self {
            Shared::Binary(variant) => BvBinary {
                dest: PENDING,
                variant,
                ty: ty.clone(),
                lhs: opnd(0),
                rhs: opnd(1),
            }
            .into(),
            Shared::Overflow(variant) => BvOverflow {
                dest: PENDING,
                variant,
                lhs: opnd(0),
                rhs: opnd(1),
            }
            .into(),
            Shared::Logic(variant) => BvLogic {
                dest: PENDING,
                variant,
                lhs: opnd(0),
                rhs: opnd(1),
            }
            .into(),
            Shared::Unary(variant) => BvUnary {
                dest: PENDING,
                variant,
                ty: ty.clone(),
                operand: opnd(0),
            }
            .into(),
            Shared::Reduce(variant) => BvReduce {
                dest: PENDING,
                variant,
                operand: opnd(0),
            }
            .into(),
            Shared::ArithBinary(variant) => ArithBinary {
                dest: PENDING,
                variant,
                ty: ty.clone(),
                lhs: opnd(0),
                rhs: opnd(1),
            }
            .into(),
        }
    }
}

type Parsed = (AnyInstr, Attributes);

fn shared_family<'src>(names: Interner) -> impl Parser<'src, &'src str, Parsed, Extra<'src>> + Clone {
    let btor = mnemonic("btor", Shared::lookup_btor);
    let arith = mnemonic("arith", |name| ArithBinaryVariant::from_str(name).map(Shared::ArithBinary));

    let unary = choice((btor.clone(), arith.clone()))
        .try_map(|family, span| match family.arity() {
            1 => Ok(family),
            _ => Err(Rich::custom(span, "expected a binary operand list")),
        })
        .then(values(names.clone(), 1));
    let binary = choice((btor, arith))
        .try_map(|family, span| match family.arity() {
            2 => Ok(family),
            _ => Err(Rich::custom(span, "expected a single operand")),
        })
        .then(values(names, 2));

    choice((binary, unary))
        .then(attrs_and_types())
        .try_map(|((family, values), (attrs, types)), span| {
            check_arity("operation", &types, 1, 1).map_err(|m| Rich::custom(span, m))?;
            Ok((family.build(&values, types[0].clone()), attrs))
        })
}

fn cmp_family<'src>(names: Interner) -> impl Parser<'src, &'src str, Parsed, Extra<'src>> + Clone {
    let predicate = text::ascii::ident()
        .try_map(|name: &str, span| {
            CmpPredicate::from_str(name)
                .ok_or_else(|| Rich::custom(span, format!("unknown comparison predicate `{}`", name)))
        })
        .padded_by(ws())
        .labelled("comparison predicate");

    let btor = mnemonic("btor", |name| (name == "cmp").then_some(false));
    let arith = mnemonic("arith", |name| (name == "cmpi").then_some(true));

    choice((btor, arith))
        .then(predicate)
        .then_ignore(just(","))
        .then(values(names, 2))
        .then(attrs_and_types())
        .try_map(|(((is_arith, predicate), values), (attrs, types)), span| {
            check_arity("cmp", &types, 1, 1).map_err(|m| Rich::custom(span, m))?;
            let lhs = Operand::new(values[0], types[0].clone());
            let rhs = Operand::new(values[1], types[0].clone());
            let instr: AnyInstr = if is_arith {
                ArithCmp {
                    dest: PENDING,
                    predicate,
                    lhs,
                    rhs,
                }
                .into()
            } else {
                BvCmp {
                    dest: PENDING,
                    predicate,
                    lhs,
                    rhs,
                }
                .into()
            };
            Ok((instr, attrs))
        })
}

fn ext_family<'src>(names: Interner) -> impl Parser<'src, &'src str, Parsed, Extra<'src>> + Clone {
    mnemonic("btor", ExtVariant::from_str)
        .then(values(names, 1))
        .then(attrs_and_types())
        .try_map(|((variant, values), (attrs, types)), span| {
            check_arity(variant.to_str(), &types, 2, 2).map_err(|m| Rich::custom(span, m))?;
            let instr = BvExt {
                dest: PENDING,
                variant,
                ty: types[1].clone(),
                operand: Operand::new(values[0], types[0].clone()),
            };
            Ok((instr.into(), attrs))
        })
}

fn arith_cast_family<'src>(
    names: Interner,
) -> impl Parser<'src, &'src str, Parsed, Extra<'src>> + Clone {
    mnemonic("arith", ArithCastVariant::from_str)
        .then(values(names, 1))
        .then(attributes_parser().padded_by(ws()))
        .then_ignore(just(":"))
        .then(type_parser().padded_by(ws()))
        .then_ignore(just("to"))
        .then(type_parser().padded_by(ws()))
        .map(|((((variant, values), attrs), from), to)| {
            let instr = ArithCast {
                dest: PENDING,
                variant,
                ty: to,
                operand: Operand::new(values[0], from),
            };
            (instr.into(), attrs)
        })
}

fn slice_family<'src>(names: Interner) -> impl Parser<'src, &'src str, Parsed, Extra<'src>> + Clone {
    mnemonic("btor", |name| (name == "slice").then_some(()))
        .ignore_then(values(names, 3))
        .then(attrs_and_types())
        .try_map(|(values, (attrs, types)), span| {
            check_arity("slice", &types, 1, 2).map_err(|m| Rich::custom(span, m))?;
            let operand_ty = types[0].clone();
            let opnd = |i: usize| Operand::new(values[i], operand_ty.clone());
            let instr = BvSlice {
                dest: PENDING,
                ty: types.get(1).cloned().unwrap_or_else(|| operand_ty.clone()),
                operand: opnd(0),
                upper: opnd(1),
                lower: opnd(2),
            };
            Ok((instr.into(), attrs))
        })
}

fn concat_family<'src>(names: Interner) -> impl Parser<'src, &'src str, Parsed, Extra<'src>> + Clone {
    mnemonic("btor", |name| (name == "concat").then_some(()))
        .ignore_then(values(names, 2))
        .then(attrs_and_types())
        .try_map(|(values, (attrs, types)), span| {
            check_arity("concat", &types, 1, 3).map_err(|m| Rich::custom(span, m.clone()))?;
            let lhs_ty = types[0].clone();
            let rhs_ty = types.get(1).cloned().unwrap_or_else(|| lhs_ty.clone());
            let ty = match types.get(2) {
                Some(ty) => ty.clone(),
                None => {
                    let width = lhs_ty
                        .as_bitvec()
                        .zip(rhs_ty.as_bitvec())
                        .and_then(|(l, r)| l.width().checked_add(r.width()))
                        .and_then(BitVecType::new)
                        .ok_or_else(|| {
                            Rich::custom(span, "cannot infer the result type of `concat`")
                        })?;
                    width.into()
                }
            };
            let instr = BvConcat {
                dest: PENDING,
                ty,
                lhs: Operand::new(values[0], lhs_ty),
                rhs: Operand::new(values[1], rhs_ty),
            };
            Ok((instr.into(), attrs))
        })
}

fn ite_family<'src>(names: Interner) -> impl Parser<'src, &'src str, Parsed, Extra<'src>> + Clone {
    let btor = mnemonic("btor", |name| (name == "ite").then_some(false));
    let arith = mnemonic("arith", |name| (name == "select").then_some(true));

    choice((btor, arith))
        .then(values(names, 3))
        .then(attrs_and_types())
        .try_map(|((is_arith, values), (attrs, types)), span| {
            check_arity("ite", &types, 1, 2).map_err(|m| Rich::custom(span, m))?;
            let ty = types[0].clone();
            let cond = Operand::new(values[0], types.get(1).cloned().unwrap_or_else(bool_type));
            let then_value = Operand::new(values[1], ty.clone());
            let else_value = Operand::new(values[2], ty.clone());
            let instr: AnyInstr = if is_arith {
                ArithSelect {
                    dest: PENDING,
                    ty,
                    cond,
                    then_value,
                    else_value,
                }
                .into()
            } else {
                BvIte {
                    dest: PENDING,
                    ty,
                    cond,
                    then_value,
                    else_value,
                }
                .into()
            };
            Ok((instr, attrs))
        })
}

fn constant_family<'src>() -> impl Parser<'src, &'src str, Parsed, Extra<'src>> + Clone {
    let btor = mnemonic("btor", |name| (name == "constant").then_some(false));
    let arith = mnemonic("arith", |name| (name == "constant").then_some(true));

    choice((btor, arith))
        .then(literal_parser().padded_by(ws()))
        .then(attrs_and_types())
        .try_map(|((is_arith, literal), (attrs, types)), span| {
            check_arity("constant", &types, 1, 1).map_err(|m| Rich::custom(span, m))?;
            let ty = types[0].clone();
            let value = literal.resolve(&ty).map_err(|m| Rich::custom(span, m))?;
            let instr: AnyInstr = if is_arith {
                if value.ty() != ty.as_bitvec().unwrap_or(value.ty()) {
                    return Err(Rich::custom(
                        span,
                        format!("literal width {} does not match {}", value.width(), ty),
                    ));
                }
                ArithConstant {
                    dest: PENDING,
                    value,
                }
                .into()
            } else {
                BvConstant {
                    dest: PENDING,
                    ty,
                    value,
                }
                .into()
            };
            Ok((instr, attrs))
        })
}

/// `input`, `nd_state` and `nd_array`, all of the form `op <id> : T`.
fn source_family<'src>() -> impl Parser<'src, &'src str, Parsed, Extra<'src>> + Clone {
    let kind = mnemonic("btor", |name| match name {
        "nd_array" => Some(None),
        _ => SourceVariant::from_str(name).map(Some),
    });

    kind.then(u64_parser().padded_by(ws()))
        .then(attrs_and_types())
        .try_map(|((kind, id), (attrs, types)), span| {
            check_arity("source", &types, 1, 1).map_err(|m| Rich::custom(span, m))?;
            let ty = types[0].clone();
            let instr: AnyInstr = match kind {
                Some(variant) => BvSource {
                    dest: PENDING,
                    variant,
                    ty,
                    id,
                }
                .into(),
                None => NdArray {
                    dest: PENDING,
                    ty,
                    id,
                }
                .into(),
            };
            Ok((instr, attrs))
        })
}

fn array_family<'src>(names: Interner) -> impl Parser<'src, &'src str, Parsed, Extra<'src>> + Clone {
    let init = mnemonic("btor", InitVariant::from_str)
        .then(value_parser(names.clone()).padded_by(ws()).or_not())
        .then(attrs_and_types())
        .try_map(|((variant, init), (attrs, types)), span| {
            check_arity(variant.to_str(), &types, 1, 1).map_err(|m| Rich::custom(span, m))?;
            let ty = types[0].clone();
            let instr = ArrayInit {
                dest: PENDING,
                variant,
                init: init.map(|v| Operand::new(v, element_or_self(&ty))),
                ty,
            };
            Ok((instr.into(), attrs))
        });

    let read = mnemonic("btor", ReadVariant::from_str)
        .then(indexed(names.clone()))
        .then(attrs_and_types())
        .try_map(|((variant, (base, index)), (attrs, types)), span| {
            check_arity(variant.to_str(), &types, 1, 2).map_err(|m| Rich::custom(span, m))?;
            let base_ty = types[0].clone();
            let instr = ArrayRead {
                dest: PENDING,
                variant,
                ty: types.get(1).cloned().unwrap_or_else(|| element_or_self(&base_ty)),
                index: Operand::new(index, default_index_type(&base_ty)),
                base: Operand::new(base, base_ty),
            };
            Ok((instr.into(), attrs))
        });

    let write = mnemonic("btor", WriteVariant::from_str)
        .then(value_parser(names.clone()).padded_by(ws()))
        .then_ignore(just(","))
        .then(indexed(names.clone()))
        .then(attrs_and_types())
        .try_map(|((variant_value, (base, index)), (attrs, types)), span| {
            let (variant, value) = variant_value;
            check_arity(variant.to_str(), &types, 1, 1).map_err(|m| Rich::custom(span, m))?;
            let ty = types[0].clone();
            let instr = ArrayWrite {
                dest: PENDING,
                variant,
                value: Operand::new(value, element_or_self(&ty)),
                base: Operand::new(base, ty.clone()),
                index: Operand::new(index, default_index_type(&ty)),
                ty,
            };
            Ok((instr.into(), attrs))
        });

    let ite_write = mnemonic("btor", |name| (name == "ite_write_in_place").then_some(()))
        .ignore_then(values(names.clone(), 2))
        .then_ignore(just(","))
        .then(indexed(names))
        .then(attrs_and_types())
        .try_map(|((values, (base, index)), (attrs, types)), span| {
            check_arity("ite_write_in_place", &types, 1, 1).map_err(|m| Rich::custom(span, m))?;
            let ty = types[0].clone();
            let instr = IteWriteInPlace {
                dest: PENDING,
                cond: Operand::new(values[0], bool_type()),
                value: Operand::new(values[1], element_or_self(&ty)),
                base: Operand::new(base, ty.clone()),
                index: Operand::new(index, default_index_type(&ty)),
                ty,
            };
            Ok((instr.into(), attrs))
        });

    choice((init, read, write, ite_write))
}

fn assert_family<'src>(names: Interner) -> impl Parser<'src, &'src str, Parsed, Extra<'src>> + Clone {
    mnemonic("btor", AssertVariant::from_str)
        .then(value_parser(names).padded_by(ws()))
        .then(just(",").ignore_then(u64_parser().padded_by(ws())).or_not())
        .then(attrs_and_types())
        .try_map(|(((variant, cond), id), (attrs, types)), span| {
            check_arity(variant.to_str(), &types, 1, 1).map_err(|m| Rich::custom(span, m))?;
            let instr = BtorAssert {
                variant,
                cond: Operand::new(cond, types[0].clone()),
                id,
            };
            Ok((instr.into(), attrs))
        })
}

fn operation_parser<'src>(
    names: Interner,
) -> impl Parser<'src, &'src str, Operation, Extra<'src>> + Clone {
    let dest = value_parser(names.clone())
        .padded_by(ws())
        .then_ignore(just("="))
        .or_not();

    let instr = choice((
        shared_family(names.clone()).boxed(),
        cmp_family(names.clone()).boxed(),
        ext_family(names.clone()).boxed(),
        arith_cast_family(names.clone()).boxed(),
        slice_family(names.clone()).boxed(),
        concat_family(names.clone()).boxed(),
        ite_family(names.clone()).boxed(),
        constant_family().boxed(),
        source_family().boxed(),
        array_family(names.clone()).boxed(),
        assert_family(names).boxed(),
    ));

    dest.then(instr)
        .validate(|(dest, (mut instr, attrs)), extra, emit| {
            match (dest, instr.destination().is_some()) {
                (Some(dest), true) => instr.set_destination(dest),
                (None, true) => emit.emit(Rich::custom(
                    extra.span(),
                    format!("`{}` produces a value and needs a destination", instr.full_name()),
                )),
                (Some(_), false) => emit.emit(Rich::custom(
                    extra.span(),
                    format!("`{}` produces no value", instr.full_name()),
                )),
                (None, false) => {}
            }
            Operation { instr, attrs }
        })
        .labelled("operation")
}

fn yield_parser<'src>(
    names: Interner,
) -> impl Parser<'src, &'src str, Vec<Operand>, Extra<'src>> + Clone {
    let typed = value_parser(names)
        .padded_by(ws())
        .separated_by(just(","))
        .at_least(1)
        .collect::<Vec<_>>()
        .then_ignore(just(":"))
        .then(
            type_parser()
                .padded_by(ws())
                .separated_by(just(","))
                .at_least(1)
                .collect::<Vec<_>>(),
        )
        .try_map(|(values, types), span| {
            if values.len() != types.len() {
                return Err(Rich::custom(
                    span,
                    format!(
                        "`btor.yield` lists {} values but {} types",
                        values.len(),
                        types.len()
                    ),
                ));
            }
            Ok(values
                .into_iter()
                .zip(types)
                .map(|(value, ty)| Operand::new(value, ty))
                .collect())
        });

    tok("btor.yield")
        .ignore_then(typed.or_not())
        .map(Option::unwrap_or_default)
        .labelled("yield")
}

fn block_parser<'src>(names: Interner) -> impl Parser<'src, &'src str, Block, Extra<'src>> + Clone {
    operation_parser(names.clone())
        .padded_by(ws())
        .repeated()
        .collect::<Vec<_>>()
        .then(yield_parser(names))
        .delimited_by(tok("{"), tok("}"))
        .map(|(operations, yields)| Block {
            operations,
            yields,
        })
        .labelled("block")
}

fn model_parser<'src>(names: Interner) -> impl Parser<'src, &'src str, Model, Extra<'src>> + Clone {
    let name = just("@")
        .ignore_then(
            any()
                .filter(|c: &char| c.is_ascii_alphanumeric() || *c == '_' || *c == '.')
                .repeated()
                .at_least(1)
                .to_slice(),
        )
        .padded_by(ws())
        .map(|s: &str| s.to_string())
        .labelled("model name");

    let state = value_parser(names.clone())
        .padded_by(ws())
        .then_ignore(just(":"))
        .then(type_parser().padded_by(ws()));
    let states = state
        .separated_by(just(","))
        .collect::<Vec<_>>()
        .delimited_by(just("("), just(")"))
        .padded_by(ws());

    tok("btor.model")
        .ignore_then(name)
        .then_ignore(tok("{"))
        .then_ignore(tok("init"))
        .then(block_parser(names.clone()))
        .then_ignore(tok("next"))
        .then(states)
        .then(block_parser(names))
        .then_ignore(tok("}"))
        .map(|(((name, init), states), next)| Model {
            name,
            states,
            init,
            next,
        })
        .labelled("model")
}

fn collect_errors(src: &str, errors: Vec<Rich<'_, char>>) -> Error {
    Error::ParserErrors {
        errors: errors
            .into_iter()
            .map(|e| {
                let span = *e.span();
                ParserError::new(src, span.start, span.end, e.to_string())
            })
            .collect(),
    }
}

fn run<'src, T>(
    src: &'src str,
    parser: impl Parser<'src, &'src str, T, Extra<'src>>,
) -> Result<T, Error> {
    let (output, errors) = parser
        .then_ignore(ws())
        .then_ignore(end())
        .parse(src)
        .into_output_errors();
    match output {
        Some(output) if errors.is_empty() => Ok(output),
        _ => Err(collect_errors(src, errors)),
    }
}

/// Parse a single type such as `!btor.bv<8>` or `vector<16x!btor.bv<8>>`.
pub fn parse_type(src: &str) -> Result<Type, Error> {
    run(src, type_parser().padded_by(ws()))
}

/// Parse a single operation. Named values are interned independently of
/// any surrounding model.
pub fn parse_operation(src: &str) -> Result<Operation, Error> {
    run(src, operation_parser(Interner::for_source(src)).padded_by(ws()))
}

/// Parse a `btor.model`. The result is not verified.
pub fn parse_model(src: &str) -> Result<Model, Error> {
    let model = run(src, ws().ignore_then(model_parser(Interner::for_source(src))))?;
    debug!(
        "Parsed model `{}`: {} states, {} operations",
        model.name,
        model.states.len(),
        model.op_count()
    );
    Ok(model)
}
