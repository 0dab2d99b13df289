use criterion::{Criterion, black_box, criterion_group, criterion_main};

use btorinstr::{
    modules::{
        Block, Model,
        builder::OpBuilder,
        instructions::bv::{BinaryVariant, CmpPredicate, ExtVariant, SourceVariant},
        operand::{Operand, Value},
    },
    parser::parse_model,
    types::{BitVecType, Type},
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Random straight-line model over 16-bit values, `size` operations long.
fn build_model(size: usize) -> Model {
    let mut rng = ChaCha8Rng::seed_from_u64(0x42);
    let word = Type::bv(16);
    let state = Operand::new(Value(0), word.clone());

    let mut b = OpBuilder::new(Value(1));
    let mut pool = vec![state.clone()];
    for id in 0..4 {
        pool.push(b.source(SourceVariant::Input, word.clone(), id).unwrap());
    }

    let binaries = [
        BinaryVariant::Add,
        BinaryVariant::Mul,
        BinaryVariant::Xor,
        BinaryVariant::Sll,
        BinaryVariant::SRem,
    ];
    while b.operations().len() < size {
        let lhs = pool[rng.random_range(0..pool.len())].clone();
        let rhs = pool[rng.random_range(0..pool.len())].clone();
        let next = match rng.random_range(0..4) {
            0 => {
                let cond = b.cmp(CmpPredicate::Ult, &lhs, &rhs).unwrap();
                b.ite(&cond, &lhs, &rhs).unwrap()
            }
            1 => {
                let low = b.slice_const(&lhs, 7, 0).unwrap();
                b.ext(ExtVariant::SExt, &low, BitVecType::new(16).unwrap())
                    .unwrap()
            }
            _ => {
                let variant = binaries[rng.random_range(0..binaries.len())];
                b.binary(variant, &lhs, &rhs).unwrap()
            }
        };
        pool.push(next);
    }

    let last = pool.pop().unwrap_or(state);
    let mut init = OpBuilder::new(b.next_value());
    let zero = init.constant_u64(BitVecType::new(16).unwrap(), 0).unwrap();

    let mut model = Model::new("bench");
    model.states = vec![(Value(0), word)];
    model.init = Block {
        operations: init.take(),
        yields: vec![zero],
    };
    model.next = Block {
        operations: b.take(),
        yields: vec![last],
    };
    model
}

fn bench_codec(c: &mut Criterion) {
    let model = build_model(2_000);
    let text = model.to_string();

    c.bench_function("print_model_2k", |b| {
        b.iter(|| black_box(model.to_string()));
    });

    c.bench_function("parse_model_2k", |b| {
        b.iter(|| black_box(parse_model(&text).unwrap()));
    });

    c.bench_function("verify_model_2k", |b| {
        b.iter(|| black_box(model.verify().unwrap()));
    });
}

criterion_group!(benches, bench_codec);
criterion_main!(benches);
