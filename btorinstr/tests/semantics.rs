use btorinstr::{
    consts::BvConst,
    eval::{RandomOracle, Simulator, eval_scalar},
    modules::{
        Block, Model,
        builder::OpBuilder,
        instructions::{
            array::{ReadVariant, WriteVariant},
            bv::{BinaryVariant, CmpPredicate, ExtVariant, OverflowVariant, SourceVariant},
            meta::AssertVariant,
        },
        operand::{Operand, Value},
    },
    parser::parse_model,
    types::{ArrayType, BitVecType, MemArrayType, Type, VectorArrayType},
    utils::Error,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

fn bv(width: u32) -> BitVecType {
    BitVecType::new(width).unwrap()
}

fn operand(value: u32, width: u32) -> Operand {
    Operand::new(Value(value), Type::bv(width))
}

#[test]
fn extensions_zero_fill_and_sign_fill() {
    let mut b = OpBuilder::new(Value(1));
    let x = operand(0, 4);
    b.ext(ExtVariant::UExt, &x, bv(8)).unwrap();
    b.ext(ExtVariant::SExt, &x, bv(8)).unwrap();
    let ops = b.take();

    let input = BvConst::from_u64(bv(4), 0b1000);
    let uext = eval_scalar(&ops[0].instr, &[input.clone()]).unwrap();
    let sext = eval_scalar(&ops[1].instr, &[input]).unwrap();
    assert_eq!(uext.to_bin_string(), "00001000");
    assert_eq!(sext.to_bin_string(), "11111000");

    let mut b = OpBuilder::new(Value(1));
    let err = b.ext(ExtVariant::UExt, &x, bv(4)).unwrap_err();
    assert!(err.is_ext_not_wider());
}

#[test]
fn binary_operations_require_matching_widths() {
    for variant in [
        BinaryVariant::Add,
        BinaryVariant::SDiv,
        BinaryVariant::Xnor,
        BinaryVariant::Sra,
        BinaryVariant::Ror,
    ] {
        let mut b = OpBuilder::new(Value(2));
        assert!(b.binary(variant, &operand(0, 8), &operand(1, 4)).is_err());
        let ok = b.binary(variant, &operand(0, 8), &operand(1, 8)).unwrap();
        assert_eq!(ok.ty, Type::bv(8));
    }
}

#[test]
fn overflow_flags_are_single_bits() {
    for width in [1, 8, 32, 64] {
        let mut b = OpBuilder::new(Value(2));
        let flag = b
            .overflow(OverflowVariant::UMulO, &operand(0, width), &operand(1, width))
            .unwrap();
        assert_eq!(flag.ty, Type::bv(1));
    }
}

fn sliced_model(upper: u64, lower: u64, result: u32) -> String {
    format!(
        "btor.model @s {{\n  init {{\n    btor.yield\n  }}\n  next() {{\n    %0 = btor.input 0 : !btor.bv<8>\n    %1 = btor.constant {upper} : !btor.bv<8>\n    %2 = btor.constant {lower} : !btor.bv<8>\n    %3 = btor.slice %0, %1, %2 : !btor.bv<8>, !btor.bv<{result}>\n    btor.yield\n  }}\n}}\n"
    )
}

#[test]
fn slice_bounds_are_checked_against_constants() {
    parse_model(&sliced_model(5, 2, 4)).unwrap().verify().unwrap();

    parse_model(&sliced_model(7, 0, 8)).unwrap().verify().unwrap();

    let err = parse_model(&sliced_model(5, 2, 3)).unwrap().verify().unwrap_err();
    assert!(err.is_slice_result_width());

    let err = parse_model(&sliced_model(1, 3, 1)).unwrap().verify().unwrap_err();
    assert!(err.is_slice_bounds());
}

#[test]
fn concat_widths_add_up() {
    let mut b = OpBuilder::new(Value(2));
    let cat = b.concat(&operand(0, 3), &operand(1, 5)).unwrap();
    assert_eq!(cat.ty, Type::bv(8));

    let src = "btor.model @c {\n  init {\n    btor.yield\n  }\n  next() {\n    %0 = btor.input 0 : !btor.bv<3>\n    %1 = btor.input 1 : !btor.bv<5>\n    %2 = btor.concat %0, %1 : !btor.bv<3>, !btor.bv<5>, !btor.bv<7>\n    btor.yield\n  }\n}\n";
    let err = parse_model(src).unwrap().verify().unwrap_err();
    assert_eq!(
        err,
        Error::ConcatWidth {
            lhs: 3,
            rhs: 5,
            found: 7
        }
    );
}

#[test]
fn non_power_of_two_shapes_are_rejected() {
    for width in [1, 8, 32] {
        let vector: Type = VectorArrayType::new(6, bv(width)).into();
        let memory: Type = MemArrayType::new(6, bv(width)).into();
        for (ty, variant) in [(vector, ReadVariant::ReadVec), (memory, ReadVariant::ReadMem)] {
            let mut b = OpBuilder::new(Value(2));
            let base = Operand::new(Value(0), ty);
            let err = b.read(variant, &base, &operand(1, 3)).unwrap_err();
            assert!(err.is_invalid_shape(), "{err}");
        }
    }
}

/// `read(write(a, i, v), j) == ite(i == j, v, read(a, j))`, checked at every
/// step on an unconstrained array.
fn array_law_model() -> Model {
    let array: Type = ArrayType {
        index: bv(2),
        element: bv(8),
    }
    .into();

    let mut b = OpBuilder::new(Value(0));
    let a = b.nd_array(array, 0).unwrap();
    let i = b.source(SourceVariant::Input, Type::bv(2), 0).unwrap();
    let j = b.source(SourceVariant::Input, Type::bv(2), 1).unwrap();
    let v = b.source(SourceVariant::Input, Type::bv(8), 2).unwrap();
    let written = b.write(WriteVariant::Write, &v, &a, &i).unwrap();
    let lhs = b.read(ReadVariant::Read, &written, &j).unwrap();
    let same = b.cmp(CmpPredicate::Eq, &i, &j).unwrap();
    let old = b.read(ReadVariant::Read, &a, &j).unwrap();
    let rhs = b.ite(&same, &v, &old).unwrap();
    let holds = b.cmp(CmpPredicate::Eq, &lhs, &rhs).unwrap();
    b.assert(AssertVariant::AssertNot, &holds, Some(0)).unwrap();

    let mut model = Model::new("array_law");
    model.next = Block {
        operations: b.take(),
        yields: Vec::new(),
    };
    model
}

#[test]
fn array_update_law_holds() {
    let model = array_law_model();
    model.verify().unwrap();

    let mut rng = ChaCha8Rng::seed_from_u64(0xb7_0a);
    for _ in 0..16 {
        let mut sim = Simulator::new(&model, RandomOracle::new(rng.random()));
        sim.reset().unwrap();
        for _ in 0..32 {
            let report = sim.step().unwrap();
            assert!(report.failures.is_empty());
            assert!(report.constraints_held);
        }
    }
}

#[test]
fn failing_properties_are_reported() {
    let src = r#"
btor.model @fails {
  init {
    %0 = btor.constant 0 : !btor.bv<2>
    btor.yield %0 : !btor.bv<2>
  }
  next(%1: !btor.bv<2>) {
    %2 = btor.inc %1 : !btor.bv<2>
    %3 = btor.constant 3 : !btor.bv<2>
    %4 = btor.cmp eq, %2, %3 : !btor.bv<2>
    btor.bad %4 : !btor.bv<1>
    %5 = btor.redor %2 : !btor.bv<2>
    btor.constraint %5 : !btor.bv<1>
    btor.yield %2 : !btor.bv<2>
  }
}
"#;
    let model = parse_model(src).unwrap();
    model.verify().unwrap();

    let mut sim = Simulator::new(&model, RandomOracle::new(1));
    assert!(sim.step().is_err());
    sim.reset().unwrap();
    let reports: Vec<_> = (0..4).map(|_| sim.step().unwrap()).collect();

    assert!(reports[0].failures.is_empty());
    assert!(reports[1].failures.is_empty());
    assert_eq!(reports[2].failures, vec![(AssertVariant::Bad, None)]);
    assert!(reports[2].constraints_held);
    // The counter wraps to zero on the fourth step.
    assert!(!reports[3].constraints_held);
    assert_eq!(sim.steps(), 4);
}
