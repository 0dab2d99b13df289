use btorinstr::{
    attributes::AttrValue,
    modules::instructions::Instruction,
    parser::{parse_model, parse_operation, parse_type},
    utils::Error,
    verify::Verify,
};

/// One canonical line per operation family and storage kind.
const OPERATIONS: &[&str] = &[
    "%2 = btor.add %0, %1 : !btor.bv<8>",
    "%2 = btor.smod %0, %1 : !btor.bv<13>",
    "%2 = btor.ror %0, %1 : !btor.bv<8>",
    "%2 = btor.smulo %0, %1 : !btor.bv<32>",
    "%2 = btor.implies %0, %1 : !btor.bv<1>",
    "%2 = btor.cmp sle, %0, %1 : !btor.bv<16>",
    "%1 = btor.neg %0 : !btor.bv<8>",
    "%1 = btor.redxor %0 : !btor.bv<8>",
    "%1 = btor.uext %0 : !btor.bv<4>, !btor.bv<8>",
    "%1 = btor.sext %0 : !btor.bv<4>, !btor.bv<70>",
    "%3 = btor.slice %0, %1, %2 : !btor.bv<8>, !btor.bv<4>",
    "%3 = btor.slice %0, %1, %2 : !btor.bv<8>",
    "%2 = btor.concat %0, %1 : !btor.bv<3>, !btor.bv<5>, !btor.bv<8>",
    "%3 = btor.ite %0, %1, %2 : !btor.bv<8>",
    "%3 = btor.ite %0, %1, %2 : !btor.array<!btor.bv<4>, !btor.bv<8>>",
    "%0 = btor.constant 255 : !btor.bv<8>",
    "%0 = btor.constant 340282366920938463463374607431768211455 : !btor.bv<128>",
    "%0 = btor.input 3 : !btor.bv<8>",
    "%0 = btor.nd_state 1 : !btor.bv<2>",
    "%0 = btor.nd_array 7 : !btor.array<!btor.bv<4>, !btor.bv<8>>",
    "%1 = btor.array %0 : !btor.array<!btor.bv<4>, !btor.bv<8>>",
    "%0 = btor.array_vec : vector<16x!btor.bv<8>>",
    "%1 = btor.array_mem %0 : memref<16x!btor.bv<8>>",
    "%2 = btor.read %0[%1] : !btor.array<!btor.bv<4>, !btor.bv<8>>",
    "%2 = btor.read_vec %0[%1] : vector<16x!btor.bv<8>>",
    "%2 = btor.read_mem %0[%1] : memref<4x!btor.bv<1>>",
    "%3 = btor.write %2, %0[%1] : !btor.array<!btor.bv<4>, !btor.bv<8>>",
    "%3 = btor.write_in_place %2, %0[%1] : !btor.array<!btor.bv<4>, !btor.bv<8>>",
    "%3 = btor.write_vec %2, %0[%1] : vector<16x!btor.bv<8>>",
    "%3 = btor.write_mem %2, %0[%1] : memref<16x!btor.bv<8>>",
    "%4 = btor.ite_write_in_place %3, %2, %0[%1] : !btor.array<!btor.bv<4>, !btor.bv<8>>",
    "btor.constraint %0 : !btor.bv<1>",
    "btor.bad %0 : !btor.bv<1>",
    "btor.assert_not %0, 5 : !btor.bv<1>",
    "%2 = arith.addi %0, %1 : !btor.bv<8>",
    "%2 = arith.shrsi %0, %1 : !btor.bv<8>",
    "%2 = arith.cmpi ult, %0, %1 : !btor.bv<8>",
    "%3 = arith.select %0, %1, %2 : !btor.bv<8>",
    "%3 = arith.select %0, %1, %2 : vector<16x!btor.bv<8>>",
    "%1 = arith.extsi %0 : !btor.bv<4> to !btor.bv<8>",
    "%1 = arith.trunci %0 : !btor.bv<8> to !btor.bv<4>",
    "%0 = arith.constant 7 : !btor.bv<3>",
    "%0 = btor.constant 1 {init, symbol = \"reset\", weight = -3} : !btor.bv<1>",
];

#[test]
fn every_operation_prints_back_to_its_source() {
    for src in OPERATIONS {
        let op = parse_operation(src).unwrap_or_else(|e| panic!("failed to parse `{src}`: {e}"));
        op.verify()
            .unwrap_or_else(|e| panic!("`{src}` does not verify: {e}"));
        assert_eq!(op.to_string(), *src);

        let reparsed = parse_operation(&op.to_string()).unwrap();
        assert_eq!(reparsed, op, "round-trip changed `{src}`");
        assert_eq!(reparsed.verify(), op.verify());
    }
}

#[test]
fn string_attributes_escape_control_characters() {
    let mut op = parse_operation("%0 = btor.input 0 : !btor.bv<8>").unwrap();
    let symbol = "a\u{1}b\t\"c\"\\\u{7f}\n\0é";
    op.attrs.insert("symbol", AttrValue::Str(symbol.to_string()));

    let printed = op.to_string();
    assert_eq!(
        printed,
        r#"%0 = btor.input 0 {symbol = "a\u{1}b\t\"c\"\\\u{7f}\n\0é"} : !btor.bv<8>"#
    );
    let reparsed = parse_operation(&printed).unwrap_or_else(|e| panic!("{printed}: {e}"));
    assert_eq!(reparsed, op);
    assert_eq!(
        reparsed.attrs.get("symbol"),
        Some(&AttrValue::Str(symbol.to_string()))
    );

    let err = parse_operation(r#"%0 = btor.input 0 {symbol = "\u{d800}"} : !btor.bv<8>"#)
        .unwrap_err();
    assert!(err.is_parser_errors());
}

#[test]
fn optional_types_are_inferred() {
    let op = parse_operation("%2 = btor.concat %0, %1 : !btor.bv<4>").unwrap();
    assert_eq!(
        op.to_string(),
        "%2 = btor.concat %0, %1 : !btor.bv<4>, !btor.bv<4>, !btor.bv<8>"
    );

    let op = parse_operation(
        "%2 = btor.read %0[%1] : !btor.array<!btor.bv<4>, !btor.bv<8>>, !btor.bv<8>",
    )
    .unwrap();
    assert_eq!(
        op.to_string(),
        "%2 = btor.read %0[%1] : !btor.array<!btor.bv<4>, !btor.bv<8>>"
    );

    let op = parse_operation("%3 = btor.ite %0, %1, %2 : !btor.bv<8>, !btor.bv<1>").unwrap();
    assert_eq!(op.to_string(), "%3 = btor.ite %0, %1, %2 : !btor.bv<8>");
}

#[test]
fn sized_literals_with_another_width_fail_verification() {
    let op = parse_operation("%0 = btor.constant 4'b1010 : !btor.bv<8>").unwrap();
    assert!(op.verify().unwrap_err().is_constant_width());
}

#[test]
fn unsized_literals_in_every_radix() {
    for src in [
        "%0 = btor.constant 0xff : !btor.bv<8>",
        "%0 = btor.constant 0b11111111 : !btor.bv<8>",
        "%0 = btor.constant -1 : !btor.bv<8>",
        "%0 = btor.constant 8'hff : !btor.bv<8>",
        "%0 = btor.constant 8'd255 : !btor.bv<8>",
    ] {
        let op = parse_operation(src).unwrap();
        assert_eq!(op.to_string(), "%0 = btor.constant 255 : !btor.bv<8>");
    }
}

const COUNTER: &str = r#"
// 8-bit counter writing itself into a memory.
btor.model @counter {
  init {
    %0 = btor.constant 0 : !btor.bv<8>
    %1 = btor.array %0 : !btor.array<!btor.bv<4>, !btor.bv<8>>
    btor.yield %0, %1 : !btor.bv<8>, !btor.array<!btor.bv<4>, !btor.bv<8>>
  }
  next(%state: !btor.bv<8>, %mem: !btor.array<!btor.bv<4>, !btor.bv<8>>) {
    %one = btor.constant 1 : !btor.bv<8>
    %inc = btor.add %state, %one : !btor.bv<8>
    %addr = btor.input 0 : !btor.bv<4>
    %mem2 = btor.write %inc, %mem[%addr] : !btor.array<!btor.bv<4>, !btor.bv<8>>
    %back = btor.read %mem2[%addr] : !btor.array<!btor.bv<4>, !btor.bv<8>>
    %ok = btor.cmp eq, %back, %inc : !btor.bv<8>
    btor.assert_not %ok, 0 : !btor.bv<1>
    btor.yield %inc, %mem2 : !btor.bv<8>, !btor.array<!btor.bv<4>, !btor.bv<8>>
  }
}
"#;

#[test]
fn models_round_trip() {
    let model = parse_model(COUNTER).unwrap();
    model.verify().unwrap();
    assert_eq!(model.name, "counter");
    assert_eq!(model.states.len(), 2);
    assert_eq!(model.op_count(), 9);

    let printed = model.to_string();
    let reparsed = parse_model(&printed).unwrap();
    assert_eq!(reparsed, model);
    assert_eq!(reparsed.to_string(), printed);
}

#[test]
fn normalized_models_number_values_in_textual_order() {
    let mut model = parse_model(COUNTER).unwrap();
    model.normalize_values();
    model.verify().unwrap();

    let dests: Vec<_> = model.operations().filter_map(|op| op.destination()).collect();
    assert_eq!(dests.first().map(|v| v.0), Some(0));
    assert_eq!(model.states[0].0.0, 2);
    assert_eq!(model.next_available_value().0, 10);
}

#[test]
fn parse_errors_are_located() {
    let src = "btor.model @m {\n  init {\n    %0 = btor.frobnicate %1 : !btor.bv<8>\n    btor.yield\n  }\n  next() {\n    btor.yield\n  }\n}\n";
    let err = parse_model(src).unwrap_err();
    let Error::ParserErrors { errors } = &err else {
        panic!("expected parser errors, got {err:?}");
    };
    assert!(!errors.is_empty());
    assert!(errors.iter().any(|e| e.line == 3), "{err}");
    assert!(err.to_string().starts_with("Failed to parse input"));
}

#[test]
fn types_parse_and_print() {
    for src in [
        "!btor.bv<1>",
        "!btor.bv<16777215>",
        "!btor.array<!btor.bv<32>, !btor.bv<8>>",
        "vector<16x!btor.bv<8>>",
        "memref<6x!btor.bv<3>>",
        "vector<4x4x!btor.bv<2>>",
    ] {
        assert_eq!(parse_type(src).unwrap().to_string(), src);
    }
    assert!(parse_type("!btor.bv<16777216>").is_err());
    assert!(parse_type("!btor.bv<0>").is_err());
}
