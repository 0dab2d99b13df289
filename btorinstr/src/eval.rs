//! Concrete reference semantics.
//!
//! [`eval_scalar`] gives the bit-exact meaning of every pure scalar
//! operation of both dialects. [`Simulator`] steps a whole [`Model`],
//! answering nondeterministic sources through an [`Oracle`].
use std::{
    collections::BTreeMap,
    hash::{DefaultHasher, Hash, Hasher},
};

use num_bigint::BigUint;
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use thiserror::Error;

use crate::{
    attributes::AttrValue,
    consts::BvConst,
    modules::{
        Block, Model,
        instructions::{
            AnyInstr, ArithInstr, BtorInstr, Instruction, Operation, array::ArrayRead,
            bv::SourceVariant, meta::AssertVariant,
        },
        operand::{Operand, Value},
    },
    types::{BitVecType, Type},
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvalError {
    #[error("`{value}` has no value at this point of the evaluation")]
    Unbound { value: Value },

    #[error("`{op}` has no defined result for operands {lhs} and {rhs}")]
    Undefined {
        op: String,
        lhs: BvConst,
        rhs: BvConst,
    },

    #[error("`{op}` expected {expected} operand(s)")]
    Kind { op: String, expected: &'static str },

    #[error("`{op}` is not a pure scalar operation")]
    NotScalar { op: String },

    #[error("`slice` bounds [{upper}:{lower}] are out of range for a {width}-bit value")]
    SliceBounds {
        upper: BvConst,
        lower: BvConst,
        width: u32,
    },

    #[error("index {index} is out of bounds for an array of {length} elements")]
    IndexOutOfBounds { index: BvConst, length: usize },

    #[error("cannot materialize values of type `{ty}`")]
    Unsupported { ty: Type },

    #[error("`step` called before `reset`")]
    NotReset,
}

/// Kind of nondeterministic source being queried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NondetKind {
    Input,
    State,
    Array,
}

/// A request for a nondeterministic value.
///
/// Requests are identified by provenance rather than by call order, so
/// that a model and its lowered forms observe the same choices.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NondetRequest {
    pub kind: NondetKind,
    pub id: u64,
    /// 0 for `init`, `k` for the `k`-th evaluation of `next`.
    pub step: u64,
    /// Element index, for arrays.
    pub index: Option<BigUint>,
}

impl NondetRequest {
    /// Digest of the request, identical for equal requests.
    fn digest(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.hash(&mut hasher);
        hasher.finish()
    }
}

/// Answers nondeterministic choices.
pub trait Oracle {
    /// Choose a value of type `ty` for `request`. Must be a function of the
    /// request: asking twice gives the same answer.
    fn choose(&mut self, request: &NondetRequest, ty: BitVecType) -> BvConst;
}

/// Oracle drawing every choice from a [`ChaCha8Rng`] keyed by the seed and
/// the request.
#[derive(Debug, Clone, Copy)]
pub struct RandomOracle {
    seed: u64,
}

impl RandomOracle {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }
}

impl Oracle for RandomOracle {
    fn choose(&mut self, request: &NondetRequest, ty: BitVecType) -> BvConst {
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed ^ request.digest());
        let mut bytes = vec![0u8; ty.width().div_ceil(8) as usize];
        rng.fill_bytes(&mut bytes);
        BvConst::wrapping(ty, BigUint::from_bytes_le(&bytes))
    }
}

/// Oracle answering zero to every request.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZeroOracle;

impl Oracle for ZeroOracle {
    fn choose(&mut self, _request: &NondetRequest, ty: BitVecType) -> BvConst {
        BvConst::zero(ty)
    }
}

/// Content of an abstract array outside its explicitly written entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArrayBase {
    /// Every element holds the same value.
    Filled(BvConst),
    /// Unconstrained, created by `nd_array` at the given step.
    Nondet { id: u64, step: u64 },
}

/// Value of an abstract `!btor.array`: a total map from index to element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArrayValue {
    pub element: BitVecType,
    pub base: ArrayBase,
    pub entries: BTreeMap<BigUint, BvConst>,
}

impl ArrayValue {
    pub fn read(&self, index: &BvConst, oracle: &mut dyn Oracle) -> BvConst {
        if let Some(value) = self.entries.get(index.value()) {
            return value.clone();
        }
        match &self.base {
            ArrayBase::Filled(value) => value.clone(),
            ArrayBase::Nondet { id, step } => oracle.choose(
                &NondetRequest {
                    kind: NondetKind::Array,
                    id: *id,
                    step: *step,
                    index: Some(index.value().clone()),
                },
                self.element,
            ),
        }
    }

    pub fn write(&self, index: &BvConst, value: BvConst) -> Self {
        let mut updated = self.clone();
        updated.entries.insert(index.value().clone(), value);
        updated
    }
}

/// A runtime value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EvalValue {
    Bv(BvConst),
    Array(ArrayValue),
    /// Vector and memory arrays, one element per index.
    Dense(Vec<BvConst>),
}

impl EvalValue {
    pub fn as_bv(&self) -> Option<&BvConst> {
        match self {
            EvalValue::Bv(value) => Some(value),
            _ => None,
        }
    }

    /// Element at `index` of an array value of any storage.
    pub fn element_at(&self, index: &BvConst, oracle: &mut dyn Oracle) -> Option<BvConst> {
        match self {
            EvalValue::Bv(_) => None,
            EvalValue::Array(array) => Some(array.read(index, oracle)),
            EvalValue::Dense(elements) => index
                .to_u64()
                .and_then(|i| elements.get(i as usize))
                .cloned(),
        }
    }
}

fn expect_bv<'a>(op: &AnyInstr, value: &'a EvalValue) -> Result<&'a BvConst, EvalError> {
    value.as_bv().ok_or_else(|| EvalError::Kind {
        op: op.full_name(),
        expected: "bit-vector",
    })
}

fn target_width(ty: &Type) -> Result<BitVecType, EvalError> {
    ty.as_bitvec()
        .ok_or_else(|| EvalError::Unsupported { ty: ty.clone() })
}

/// Evaluate a pure scalar operation over constant operands, given in
/// operand order.
///
/// Sources, arrays and assertions are not scalar and yield
/// [`EvalError::NotScalar`].
pub fn eval_scalar(instr: &AnyInstr, args: &[BvConst]) -> Result<BvConst, EvalError> {
    let arg = |i: usize| {
        args.get(i).ok_or_else(|| EvalError::Kind {
            op: instr.full_name(),
            expected: "more",
        })
    };

    let result = match instr {
        AnyInstr::Btor(btor) => match btor {
            BtorInstr::Binary(i) => i.variant.evaluate(arg(0)?, arg(1)?),
            BtorInstr::Overflow(i) => BvConst::from_bool(i.variant.evaluate(arg(0)?, arg(1)?)),
            BtorInstr::Logic(i) => {
                BvConst::from_bool(i.variant.evaluate(arg(0)?.is_true(), arg(1)?.is_true()))
            }
            BtorInstr::Cmp(i) => BvConst::from_bool(i.predicate.evaluate(arg(0)?, arg(1)?)),
            BtorInstr::Unary(i) => i.variant.evaluate(arg(0)?),
            BtorInstr::Reduce(i) => BvConst::from_bool(i.variant.evaluate(arg(0)?)),
            BtorInstr::Ext(i) => i.variant.evaluate(arg(0)?, target_width(&i.ty)?),
            BtorInstr::Slice(_) => {
                let (operand, upper, lower) = (arg(0)?, arg(1)?, arg(2)?);
                let bounds = upper
                    .to_u64()
                    .zip(lower.to_u64())
                    .and_then(|(u, l)| Some((u32::try_from(u).ok()?, u32::try_from(l).ok()?)));
                bounds
                    .and_then(|(u, l)| operand.slice(u, l))
                    .ok_or_else(|| EvalError::SliceBounds {
                        upper: upper.clone(),
                        lower: lower.clone(),
                        width: operand.width(),
                    })?
            }
            BtorInstr::Concat(_) => {
                arg(0)?
                    .concat(arg(1)?)
                    .ok_or_else(|| EvalError::Unsupported {
                        ty: instr.destination_type().unwrap_or(Type::bv(1)),
                    })?
            }
            BtorInstr::Ite(_) => {
                if arg(0)?.is_true() {
                    arg(1)?.clone()
                } else {
                    arg(2)?.clone()
                }
            }
            BtorInstr::Constant(c) => c.value.clone(),
            _ => {
                return Err(EvalError::NotScalar {
                    op: instr.full_name(),
                });
            }
        },
        AnyInstr::Arith(arith) => match arith {
            ArithInstr::Binary(i) => {
                let (lhs, rhs) = (arg(0)?, arg(1)?);
                i.variant
                    .evaluate(lhs, rhs)
                    .ok_or_else(|| EvalError::Undefined {
                        op: instr.full_name(),
                        lhs: lhs.clone(),
                        rhs: rhs.clone(),
                    })?
            }
            ArithInstr::Cmp(i) => BvConst::from_bool(i.predicate.evaluate(arg(0)?, arg(1)?)),
            ArithInstr::Select(_) => {
                if arg(0)?.is_true() {
                    arg(1)?.clone()
                } else {
                    arg(2)?.clone()
                }
            }
            ArithInstr::Cast(i) => i.variant.evaluate(arg(0)?, target_width(&i.ty)?),
            ArithInstr::Constant(c) => c.value.clone(),
        },
    };
    Ok(result)
}

/// Observable outcome of evaluating one block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepReport {
    /// `bad` and `assert_not` operations that fired, with their id.
    pub failures: Vec<(AssertVariant, Option<u64>)>,
    /// Whether every `constraint` held.
    pub constraints_held: bool,
}

struct BlockEvaluator<'o> {
    env: BTreeMap<Value, EvalValue>,
    oracle: &'o mut dyn Oracle,
    step: u64,
    report: StepReport,
}

impl BlockEvaluator<'_> {
    fn get(&self, operand: &Operand) -> Result<&EvalValue, EvalError> {
        self.env.get(&operand.value).ok_or(EvalError::Unbound {
            value: operand.value,
        })
    }

    fn get_bv(&self, op: &AnyInstr, operand: &Operand) -> Result<BvConst, EvalError> {
        expect_bv(op, self.get(operand)?).cloned()
    }

    fn nondet(&mut self, kind: NondetKind, id: u64, ty: BitVecType) -> BvConst {
        let request = NondetRequest {
            kind,
            id,
            step: self.step,
            index: None,
        };
        self.oracle.choose(&request, ty)
    }

    fn dense_len(ty: &Type) -> Result<usize, EvalError> {
        let shape = match ty {
            Type::Vector(v) => &v.shape,
            Type::Memory(m) => &m.shape,
            _ => return Err(EvalError::Unsupported { ty: ty.clone() }),
        };
        match shape.as_slice() {
            [len] => usize::try_from(*len).map_err(|_| EvalError::Unsupported { ty: ty.clone() }),
            _ => Err(EvalError::Unsupported { ty: ty.clone() }),
        }
    }

    fn read(&mut self, op: &AnyInstr, read: &ArrayRead) -> Result<BvConst, EvalError> {
        let index = self.get_bv(op, &read.index)?;
        let base = self.get(&read.base)?.clone();
        match &base {
            EvalValue::Bv(_) => Err(EvalError::Kind {
                op: op.full_name(),
                expected: "array",
            }),
            EvalValue::Dense(elements) => index
                .to_u64()
                .and_then(|i| elements.get(i as usize))
                .cloned()
                .ok_or(EvalError::IndexOutOfBounds {
                    index,
                    length: elements.len(),
                }),
            EvalValue::Array(array) => Ok(array.read(&index, self.oracle)),
        }
    }

    fn write(
        &self,
        op: &AnyInstr,
        base: &Operand,
        index: &Operand,
        value: &Operand,
    ) -> Result<EvalValue, EvalError> {
        let index = self.get_bv(op, index)?;
        let value = self.get_bv(op, value)?;
        match self.get(base)? {
            EvalValue::Bv(_) => Err(EvalError::Kind {
                op: op.full_name(),
                expected: "array",
            }),
            EvalValue::Array(array) => Ok(EvalValue::Array(array.write(&index, value))),
            EvalValue::Dense(elements) => {
                let mut elements = elements.clone();
                let length = elements.len();
                let slot = index
                    .to_u64()
                    .and_then(|i| elements.get_mut(i as usize))
                    .ok_or(EvalError::IndexOutOfBounds {
                        index: index.clone(),
                        length,
                    })?;
                *slot = value;
                Ok(EvalValue::Dense(elements))
            }
        }
    }

    fn eval_op(&mut self, operation: &Operation) -> Result<Option<EvalValue>, EvalError> {
        let op = &operation.instr;
        let value = match op {
            AnyInstr::Btor(BtorInstr::Source(source)) => {
                let kind = match source.variant {
                    SourceVariant::Input => NondetKind::Input,
                    SourceVariant::NdState => NondetKind::State,
                };
                EvalValue::Bv(self.nondet(kind, source.id, target_width(&source.ty)?))
            }
            AnyInstr::Btor(BtorInstr::NdArray(nd)) => {
                let element = nd
                    .ty
                    .element()
                    .ok_or_else(|| EvalError::Unsupported { ty: nd.ty.clone() })?;
                EvalValue::Array(ArrayValue {
                    element,
                    base: ArrayBase::Nondet {
                        id: nd.id,
                        step: self.step,
                    },
                    entries: BTreeMap::new(),
                })
            }
            AnyInstr::Btor(BtorInstr::ArrayInit(init)) => {
                let element = init
                    .ty
                    .element()
                    .ok_or_else(|| EvalError::Unsupported { ty: init.ty.clone() })?;
                let fill = init
                    .init
                    .as_ref()
                    .map(|operand| self.get_bv(op, operand))
                    .transpose()?;
                match (&init.ty, fill) {
                    (Type::Array(_), Some(fill)) => EvalValue::Array(ArrayValue {
                        element,
                        base: ArrayBase::Filled(fill),
                        entries: BTreeMap::new(),
                    }),
                    (_, Some(fill)) => EvalValue::Dense(vec![fill; Self::dense_len(&init.ty)?]),
                    (_, None) => {
                        // Uninitialized dense arrays keep the provenance of
                        // the `nd_array` they were lowered from, if any.
                        let id = match operation.attrs.get("id") {
                            Some(AttrValue::Int(id)) => *id as u64,
                            _ => init.dest.0 as u64,
                        };
                        let len = Self::dense_len(&init.ty)?;
                        let elements = (0..len as u64)
                            .map(|i| {
                                let request = NondetRequest {
                                    kind: NondetKind::Array,
                                    id,
                                    step: self.step,
                                    index: Some(BigUint::from(i)),
                                };
                                self.oracle.choose(&request, element)
                            })
                            .collect();
                        EvalValue::Dense(elements)
                    }
                }
            }
            AnyInstr::Btor(BtorInstr::Read(read)) => EvalValue::Bv(self.read(op, read)?),
            AnyInstr::Btor(BtorInstr::Write(write)) => {
                self.write(op, &write.base, &write.index, &write.value)?
            }
            AnyInstr::Btor(BtorInstr::IteWriteInPlace(ite)) => {
                if self.get_bv(op, &ite.cond)?.is_true() {
                    self.write(op, &ite.base, &ite.index, &ite.value)?
                } else {
                    self.get(&ite.base)?.clone()
                }
            }
            AnyInstr::Btor(BtorInstr::Ite(ite)) => {
                let chosen = if self.get_bv(op, &ite.cond)?.is_true() {
                    &ite.then_value
                } else {
                    &ite.else_value
                };
                self.get(chosen)?.clone()
            }
            AnyInstr::Arith(ArithInstr::Select(select)) => {
                let chosen = if self.get_bv(op, &select.cond)?.is_true() {
                    &select.then_value
                } else {
                    &select.else_value
                };
                self.get(chosen)?.clone()
            }
            AnyInstr::Btor(BtorInstr::Assert(assert)) => {
                let cond = self.get_bv(op, &assert.cond)?.is_true();
                match assert.variant {
                    AssertVariant::Constraint if !cond => self.report.constraints_held = false,
                    variant if variant.fails_on(cond) => {
                        self.report.failures.push((variant, assert.id))
                    }
                    _ => {}
                }
                return Ok(None);
            }
            _ => {
                let args = op
                    .operands()
                    .map(|operand| self.get_bv(op, operand))
                    .collect::<Result<Vec<_>, _>>()?;
                EvalValue::Bv(eval_scalar(op, &args)?)
            }
        };
        Ok(Some(value))
    }

    fn run(&mut self, block: &Block) -> Result<Vec<EvalValue>, EvalError> {
        for operation in &block.operations {
            if let Some(value) = self.eval_op(operation)? {
                if let Some(dest) = operation.destination() {
                    self.env.insert(dest, value);
                }
            }
        }
        block
            .yields
            .iter()
            .map(|operand| self.get(operand).cloned())
            .collect()
    }
}

/// Steps a model under an oracle.
pub struct Simulator<'m, O: Oracle> {
    model: &'m Model,
    oracle: O,
    state: Option<Vec<EvalValue>>,
    step: u64,
}

impl<'m, O: Oracle> Simulator<'m, O> {
    pub fn new(model: &'m Model, oracle: O) -> Self {
        Self {
            model,
            oracle,
            state: None,
            step: 0,
        }
    }

    /// Current state, one value per state parameter.
    pub fn state(&self) -> Option<&[EvalValue]> {
        self.state.as_deref()
    }

    /// Number of `next` evaluations since the last reset.
    pub fn steps(&self) -> u64 {
        self.step
    }

    pub fn oracle_mut(&mut self) -> &mut O {
        &mut self.oracle
    }

    fn evaluate(
        &mut self,
        block: &Block,
        env: BTreeMap<Value, EvalValue>,
    ) -> Result<StepReport, EvalError> {
        let mut evaluator = BlockEvaluator {
            env,
            oracle: &mut self.oracle,
            step: self.step,
            report: StepReport {
                failures: Vec::new(),
                constraints_held: true,
            },
        };
        let next_state = evaluator.run(block)?;
        let report = evaluator.report;
        self.state = Some(next_state);
        Ok(report)
    }

    /// Evaluate `init` and make its yields the current state.
    pub fn reset(&mut self) -> Result<StepReport, EvalError> {
        self.step = 0;
        let model = self.model;
        self.evaluate(&model.init, BTreeMap::new())
    }

    /// Evaluate `next` on the current state.
    pub fn step(&mut self) -> Result<StepReport, EvalError> {
        let state = self.state.take().ok_or(EvalError::NotReset)?;
        let env = self
            .model
            .states
            .iter()
            .map(|(value, _)| *value)
            .zip(state)
            .collect();
        self.step += 1;
        let model = self.model;
        self.evaluate(&model.next, env)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::modules::instructions::bv::{BinaryVariant, CmpPredicate};

    fn bv(width: u32, value: u64) -> BvConst {
        BvConst::from_u64(BitVecType::new(width).unwrap(), value)
    }

    #[test]
    fn random_oracle_is_a_function_of_the_request() {
        let request = NondetRequest {
            kind: NondetKind::Input,
            id: 4,
            step: 2,
            index: None,
        };
        let ty = BitVecType::new(64).unwrap();
        let mut a = RandomOracle::new(7);
        let mut b = RandomOracle::new(7);
        let first = a.choose(&request, ty);
        assert_eq!(first, a.choose(&request, ty));
        assert_eq!(first, b.choose(&request, ty));

        let other = NondetRequest { step: 3, ..request.clone() };
        assert_ne!(first, a.choose(&other, ty));

        let elements: BTreeSet<_> = (0..16u32)
            .map(|i| {
                let element = NondetRequest {
                    kind: NondetKind::Array,
                    index: Some(BigUint::from(i)),
                    ..request.clone()
                };
                a.choose(&element, ty)
            })
            .collect();
        assert_eq!(elements.len(), 16);
    }

    #[test]
    fn scalar_evaluation() {
        let add = crate::modules::instructions::bv::BvBinary {
            dest: Value(2),
            variant: BinaryVariant::Add,
            ty: Type::bv(8),
            lhs: Operand::new(Value(0), Type::bv(8)),
            rhs: Operand::new(Value(1), Type::bv(8)),
        };
        let result = eval_scalar(&add.into(), &[bv(8, 200), bv(8, 100)]).unwrap();
        assert_eq!(result, bv(8, 44));

        let cmp = crate::modules::instructions::bv::BvCmp {
            dest: Value(2),
            predicate: CmpPredicate::Slt,
            lhs: Operand::new(Value(0), Type::bv(8)),
            rhs: Operand::new(Value(1), Type::bv(8)),
        };
        assert!(eval_scalar(&cmp.into(), &[bv(8, 200), bv(8, 100)]).unwrap().is_true());
    }

    #[test]
    fn abstract_arrays_are_total_maps() {
        let array = ArrayValue {
            element: BitVecType::new(8).unwrap(),
            base: ArrayBase::Filled(bv(8, 9)),
            entries: BTreeMap::new(),
        };
        let written = array.write(&bv(4, 3), bv(8, 1));
        let mut oracle = ZeroOracle;
        assert_eq!(written.read(&bv(4, 3), &mut oracle), bv(8, 1));
        assert_eq!(written.read(&bv(4, 2), &mut oracle), bv(8, 9));
        assert_eq!(array.read(&bv(4, 3), &mut oracle), bv(8, 9));
    }
}
