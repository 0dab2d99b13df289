//! Machine programs, run by a small interpreter, follow the simulator.
use std::collections::BTreeMap;

use btorcore::{
    config::{ArrayLowering, PipelineConfig},
    machine::{BinOp, CastOp, MachineInst, MachineModule, MachineType, MachineValue, Terminator},
    magic::{MACHINE_BAD_FN, MACHINE_INPUT_FN, MACHINE_ND_FN},
    pipeline::Pipeline,
};
use btorinstr::{
    consts::BvConst,
    eval::{NondetKind, NondetRequest, Oracle, Simulator},
    modules::Model,
    parser::parse_model,
    types::{BitVecType, Type},
};

const STEPS: usize = 8;

/// Fresh array at every step, written from the previous state.
const REFILL: &str = r#"
btor.model @refill {
  init {
    %0 = btor.constant 0 : !btor.bv<8>
    %1 = btor.array %0 : !btor.array<!btor.bv<2>, !btor.bv<8>>
    btor.yield %1 : !btor.array<!btor.bv<2>, !btor.bv<8>>
  }
  next(%2: !btor.array<!btor.bv<2>, !btor.bv<8>>) {
    %3 = btor.constant 0 : !btor.bv<8>
    %4 = btor.constant 1 : !btor.bv<2>
    %5 = btor.array %3 : !btor.array<!btor.bv<2>, !btor.bv<8>>
    %6 = btor.read %2[%4] : !btor.array<!btor.bv<2>, !btor.bv<8>>
    %7 = btor.inc %6 : !btor.bv<8>
    %8 = btor.write %7, %5[%4] : !btor.array<!btor.bv<2>, !btor.bv<8>>
    %9 = btor.constant 3 : !btor.bv<8>
    %10 = btor.cmp eq, %6, %9 : !btor.bv<8>
    btor.bad %10 : !btor.bv<1>
    btor.yield %8 : !btor.array<!btor.bv<2>, !btor.bv<8>>
  }
}
"#;

/// Either keeps counting in place or starts over from a fresh array.
const RESET: &str = r#"
btor.model @reset {
  init {
    %0 = btor.constant 0 : !btor.bv<8>
    %1 = btor.array %0 : !btor.array<!btor.bv<2>, !btor.bv<8>>
    btor.yield %1 : !btor.array<!btor.bv<2>, !btor.bv<8>>
  }
  next(%2: !btor.array<!btor.bv<2>, !btor.bv<8>>) {
    %3 = btor.input 0 : !btor.bv<1>
    %4 = btor.input 1 : !btor.bv<2>
    %5 = btor.read %2[%4] : !btor.array<!btor.bv<2>, !btor.bv<8>>
    %6 = btor.inc %5 : !btor.bv<8>
    %7 = btor.write %6, %2[%4] : !btor.array<!btor.bv<2>, !btor.bv<8>>
    %8 = btor.constant 7 : !btor.bv<8>
    %9 = btor.array %8 : !btor.array<!btor.bv<2>, !btor.bv<8>>
    %10 = btor.ite %3, %9, %7 : !btor.array<!btor.bv<2>, !btor.bv<8>>
    %11 = btor.constant 9 : !btor.bv<8>
    %12 = btor.cmp ne, %6, %11 : !btor.bv<8>
    btor.assert_not %12, 3 : !btor.bv<1>
    btor.yield %10 : !btor.array<!btor.bv<2>, !btor.bv<8>>
  }
}
"#;

/// The second state holds the previous value of the first one.
const SHIFT: &str = r#"
btor.model @shift {
  init {
    %0 = btor.constant 0 : !btor.bv<8>
    %1 = btor.array %0 : !btor.array<!btor.bv<2>, !btor.bv<8>>
    %2 = btor.array %0 : !btor.array<!btor.bv<2>, !btor.bv<8>>
    btor.yield %1, %2 : !btor.array<!btor.bv<2>, !btor.bv<8>>, !btor.array<!btor.bv<2>, !btor.bv<8>>
  }
  next(%3: !btor.array<!btor.bv<2>, !btor.bv<8>>, %4: !btor.array<!btor.bv<2>, !btor.bv<8>>) {
    %5 = btor.input 0 : !btor.bv<2>
    %6 = btor.read %3[%5] : !btor.array<!btor.bv<2>, !btor.bv<8>>
    %7 = btor.inc %6 : !btor.bv<8>
    %8 = btor.constant 1 : !btor.bv<8>
    %9 = btor.array %8 : !btor.array<!btor.bv<2>, !btor.bv<8>>
    %10 = btor.write %7, %9[%5] : !btor.array<!btor.bv<2>, !btor.bv<8>>
    %11 = btor.read %4[%5] : !btor.array<!btor.bv<2>, !btor.bv<8>>
    %12 = btor.cmp ult, %11, %6 : !btor.bv<8>
    btor.assert_not %12, 2 : !btor.bv<1>
    btor.yield %10, %3 : !btor.array<!btor.bv<2>, !btor.bv<8>>, !btor.array<!btor.bv<2>, !btor.bv<8>>
  }
}
"#;

/// Choice shared by the simulator and the machine program.
fn choice(kind: NondetKind, id: u64, step: u64) -> u64 {
    let salt = match kind {
        NondetKind::Input => 1,
        NondetKind::State => 2,
        NondetKind::Array => 3,
    };
    let mut x = (id + salt)
        .wrapping_mul(0x9e37_79b9_7f4a_7c15)
        .wrapping_add(step.wrapping_mul(0xbf58_476d_1ce4_e5b9));
    x ^= x >> 30;
    x = x.wrapping_mul(0x94d0_49bb_1331_11eb);
    x ^ (x >> 31)
}

struct Hashed;

impl Oracle for Hashed {
    fn choose(&mut self, request: &NondetRequest, ty: BitVecType) -> BvConst {
        BvConst::from_u64(ty, choice(request.kind, request.id, request.step))
    }
}

fn mask(width: u32, value: u64) -> u64 {
    if width >= 64 {
        value
    } else {
        value & ((1 << width) - 1)
    }
}

fn signed(width: u32, value: u64) -> i64 {
    let shift = 64 - width;
    ((value << shift) as i64) >> shift
}

fn width(ty: &MachineType) -> u32 {
    match ty {
        MachineType::Int(width) => *width,
        MachineType::Vector { element, .. } => *element,
        _ => 64,
    }
}

fn binary(op: BinOp, width: u32, a: u64, b: u64) -> u64 {
    let (sa, sb) = (signed(width, a), signed(width, b));
    let shifted = b < width as u64;
    match op {
        BinOp::Add => a.wrapping_add(b),
        BinOp::Sub => a.wrapping_sub(b),
        BinOp::Mul => a.wrapping_mul(b),
        BinOp::UDiv => a.checked_div(b).unwrap_or(0),
        BinOp::URem => a.checked_rem(b).unwrap_or(0),
        BinOp::SDiv if sb != 0 => sa.wrapping_div(sb) as u64,
        BinOp::SRem if sb != 0 => sa.wrapping_rem(sb) as u64,
        BinOp::SDiv | BinOp::SRem => 0,
        BinOp::And => a & b,
        BinOp::Or => a | b,
        BinOp::Xor => a ^ b,
        BinOp::Shl if shifted => a << b,
        BinOp::LShr if shifted => a >> b,
        BinOp::AShr if shifted => (sa >> b) as u64,
        BinOp::Shl | BinOp::LShr | BinOp::AShr => 0,
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Val {
    Int(u64),
    Vector(Vec<u64>),
    /// Buffer and element offset.
    Ptr(usize, usize),
}

impl Val {
    fn int(&self) -> u64 {
        match self {
            Val::Int(value) => *value,
            other => panic!("expected an integer, got {other:?}"),
        }
    }

    fn ptr(&self) -> (usize, usize) {
        match self {
            Val::Ptr(buffer, offset) => (*buffer, *offset),
            other => panic!("expected a pointer, got {other:?}"),
        }
    }
}

#[derive(Default)]
struct Machine {
    regs: BTreeMap<u32, Val>,
    memory: Vec<Vec<u64>>,
    step: u64,
    fired: Vec<Vec<u64>>,
}

impl Machine {
    fn get(&self, value: &MachineValue) -> Val {
        match value {
            MachineValue::Reg(reg) => self.regs[reg].clone(),
            MachineValue::Imm(value) => Val::Int(value.to_u64().unwrap()),
            MachineValue::Imm64(value) => Val::Int(*value as u64),
            MachineValue::Poison => Val::Int(0),
        }
    }

    fn vector(&self, value: &MachineValue, ty: &MachineType) -> Vec<u64> {
        match (value, ty) {
            (MachineValue::Poison, MachineType::Vector { length, .. }) => vec![0; *length as usize],
            _ => match self.get(value) {
                Val::Vector(elements) => elements,
                other => panic!("expected a vector, got {other:?}"),
            },
        }
    }

    fn contents(&self, value: &Val, length: usize) -> Vec<u64> {
        match value {
            Val::Int(value) => vec![*value],
            Val::Vector(elements) => elements.clone(),
            Val::Ptr(buffer, offset) => self.memory[*buffer][*offset..*offset + length].to_vec(),
        }
    }

    fn exec(&mut self, inst: &MachineInst) {
        let value = match inst {
            MachineInst::Binary {
                op, ty, lhs, rhs, ..
            } => {
                let (a, b) = (self.get(lhs).int(), self.get(rhs).int());
                Val::Int(mask(width(ty), binary(*op, width(ty), a, b)))
            }
            MachineInst::ICmp {
                predicate,
                ty,
                lhs,
                rhs,
                ..
            } => {
                let (a, b) = (self.get(lhs).int(), self.get(rhs).int());
                let (sa, sb) = (signed(width(ty), a), signed(width(ty), b));
                let holds = match *predicate {
                    "eq" => a == b,
                    "ne" => a != b,
                    "ult" => a < b,
                    "ule" => a <= b,
                    "ugt" => a > b,
                    "uge" => a >= b,
                    "slt" => sa < sb,
                    "sle" => sa <= sb,
                    "sgt" => sa > sb,
                    "sge" => sa >= sb,
                    other => panic!("unknown predicate {other}"),
                };
                Val::Int(holds as u64)
            }
            MachineInst::Select {
                cond,
                then_value,
                else_value,
                ..
            } => {
                if self.get(cond).int() != 0 {
                    self.get(then_value)
                } else {
                    self.get(else_value)
                }
            }
            MachineInst::Cast {
                op,
                from,
                to,
                operand,
                ..
            } => {
                let value = self.get(operand).int();
                Val::Int(match op {
                    CastOp::ZExt => value,
                    CastOp::SExt => mask(width(to), signed(width(from), value) as u64),
                    CastOp::Trunc => mask(width(to), value),
                })
            }
            MachineInst::Freeze { ty, operand, .. } => match (operand, ty) {
                (MachineValue::Poison, MachineType::Vector { length, .. }) => {
                    Val::Vector(vec![0; *length as usize])
                }
                _ => self.get(operand),
            },
            MachineInst::Call {
                ret, callee, args, ..
            } => {
                let kind = match callee.rsplit_once('.') {
                    _ if callee == MACHINE_BAD_FN => {
                        let id = self.get(&args[0].1).int();
                        self.fired.last_mut().unwrap().push(id);
                        return;
                    }
                    Some((MACHINE_INPUT_FN, _)) => NondetKind::Input,
                    Some((MACHINE_ND_FN, _)) => NondetKind::State,
                    _ => return,
                };
                let id = self.get(&args[0].1).int();
                Val::Int(mask(width(ret), choice(kind, id, self.step)))
            }
            MachineInst::Phi { .. } => unreachable!("phis are evaluated on block entry"),
            MachineInst::ExtractElement {
                vector, ty, index, ..
            } => {
                let elements = self.vector(vector, ty);
                Val::Int(elements[self.get(index).int() as usize])
            }
            MachineInst::InsertElement {
                ty,
                vector,
                element,
                index,
                ..
            } => {
                let mut elements = self.vector(vector, ty);
                elements[self.get(index).int() as usize] = self.get(element).int();
                Val::Vector(elements)
            }
            MachineInst::Splat {
                ty, length, vector, ..
            } => {
                let first = self.vector(vector, ty)[0];
                Val::Vector(vec![first; *length as usize])
            }
            MachineInst::Alloca { count, .. } => {
                self.memory.push(vec![0; *count as usize]);
                Val::Ptr(self.memory.len() - 1, 0)
            }
            MachineInst::GetElementPtr { base, index, .. } => {
                let (buffer, offset) = self.get(base).ptr();
                Val::Ptr(buffer, offset + self.get(index).int() as usize)
            }
            MachineInst::Load { ptr, .. } => {
                let (buffer, offset) = self.get(ptr).ptr();
                Val::Int(self.memory[buffer][offset])
            }
            MachineInst::Store { value, ptr, .. } => {
                let (buffer, offset) = self.get(ptr).ptr();
                self.memory[buffer][offset] = self.get(value).int();
                return;
            }
        };
        if let Some(dest) = inst.dest() {
            self.regs.insert(dest, value);
        }
    }
}

/// Number of elements held by each state.
fn state_lengths(model: &Model) -> Vec<usize> {
    model
        .states
        .iter()
        .map(|(_, ty)| match ty {
            Type::Array(array) => 1 << array.index.width(),
            _ => 1,
        })
        .collect()
}

/// State contents after `init` and each step, with the ids of the
/// assertions failing at each of them.
type Trace = (Vec<Vec<Vec<u64>>>, Vec<Vec<u64>>);

fn run_machine(module: &MachineModule, lengths: &[usize]) -> Trace {
    let mut machine = Machine {
        fired: vec![Vec::new()],
        ..Machine::default()
    };
    let mut states = Vec::new();
    let mut prev = String::new();
    let mut label = module.blocks[0].label.clone();
    loop {
        let block = module.block(&label).unwrap();
        let phis: Vec<(u32, Val)> = block
            .insts
            .iter()
            .filter_map(|inst| match inst {
                MachineInst::Phi { dest, incoming, .. } => {
                    let (value, _) = incoming.iter().find(|(_, from)| *from == prev).unwrap();
                    Some((*dest, machine.get(value)))
                }
                _ => None,
            })
            .collect();
        if label == "loop" {
            let state = phis
                .iter()
                .zip(lengths)
                .map(|((_, value), length)| machine.contents(value, *length))
                .collect();
            states.push(state);
            if states.len() > STEPS {
                break;
            }
            machine.step += 1;
            machine.fired.push(Vec::new());
        }
        machine.regs.extend(phis);
        for inst in &block.insts {
            if !matches!(inst, MachineInst::Phi { .. }) {
                machine.exec(inst);
            }
        }
        let next = match block.terminator.as_ref().unwrap() {
            Terminator::Br(to) => to.clone(),
            Terminator::CondBr {
                cond,
                then_label,
                else_label,
            } => {
                if machine.get(cond).int() != 0 {
                    then_label.clone()
                } else {
                    else_label.clone()
                }
            }
            Terminator::RetVoid => break,
        };
        prev = std::mem::replace(&mut label, next);
    }
    (states, machine.fired)
}

/// Each model has at most one `btor.bad`, placed before any other assertion,
/// so the machine program reports it as 0.
fn run_simulator(model: &Model) -> Trace {
    let mut sim = Simulator::new(model, Hashed);
    let mut states = Vec::new();
    let mut fired = Vec::new();
    for step in 0..=STEPS {
        let report = if step == 0 {
            sim.reset().unwrap()
        } else {
            sim.step().unwrap()
        };
        fired.push(report.failures.iter().map(|(_, id)| id.unwrap_or(0)).collect());
        let values = sim.state().unwrap();
        let state = model
            .states
            .iter()
            .zip(values)
            .map(|((_, ty), value)| match ty {
                Type::Array(array) => (0..1u64 << array.index.width())
                    .map(|i| {
                        let index = BvConst::from_u64(array.index, i);
                        value.element_at(&index, &mut Hashed).unwrap().to_u64().unwrap()
                    })
                    .collect(),
                _ => vec![value.as_bv().unwrap().to_u64().unwrap()],
            })
            .collect();
        states.push(state);
    }
    (states, fired)
}

fn check(source: &str, array_lowering: ArrayLowering) -> Trace {
    let original = parse_model(source).unwrap();
    let expected = run_simulator(&original);

    let config = PipelineConfig {
        array_lowering,
        ..PipelineConfig::default()
    };
    let mut pipeline = Pipeline::from_config(&config);
    let mut lowered = original.clone();
    pipeline.run(&mut lowered).unwrap();
    let module = pipeline.lower_to_machine(&lowered).unwrap();
    let actual = run_machine(&module, &state_lengths(&original));

    for (step, (lhs, rhs)) in expected.0.iter().zip(&actual.0).enumerate() {
        assert_eq!(lhs, rhs, "state after step {step}\n{module}");
    }
    assert_eq!(expected.1, actual.1, "{module}");
    actual
}

#[test]
fn arrays_created_by_next_keep_their_contents() {
    for lowering in [ArrayLowering::Memory, ArrayLowering::Vector] {
        let (states, fired) = check(REFILL, lowering);
        assert_eq!(states[3], vec![vec![0, 3, 0, 0]]);
        assert_eq!(fired[4], vec![0]);
        assert!(fired[..4].iter().all(Vec::is_empty));
    }
}

#[test]
fn fresh_arrays_may_replace_an_updated_state() {
    for lowering in [ArrayLowering::Memory, ArrayLowering::Vector] {
        let (states, _) = check(RESET, lowering);
        assert!(states.iter().skip(1).any(|state| state[0] == vec![7; 4]));
    }
}

#[test]
fn states_may_hold_the_previous_array_of_another() {
    for lowering in [ArrayLowering::Memory, ArrayLowering::Vector] {
        let (states, _) = check(SHIFT, lowering);
        for step in 1..states.len() {
            assert_eq!(states[step][1], states[step - 1][0]);
        }
    }
}
