//! Code generation tests: enum and union layout, jump-graph shape,
//! check-after-call insertion and codegen diagnostics.

use sailfoil_codegen::listing;
use sailfoil_codegen::*;
use sailfoil_compiler::{compile, compile_with_options};
use sailfoil_types::ErrorCode;

// ══════════════════════════════════════════════════════════════════════════════
// Helpers
// ══════════════════════════════════════════════════════════════════════════════

fn generate(source: &str) -> Program {
    match compile(source, "test.ir") {
        Ok(program) => program,
        Err(errors) => panic!("compile failed:\n{errors}"),
    }
}

fn codegen_errors(source: &str) -> Vec<ErrorCode> {
    match compile(source, "test.ir") {
        Ok(_) => panic!("expected compile failure"),
        Err(errors) => errors.codes(),
    }
}

fn function<'p>(program: &'p Program, name: &str) -> &'p FunctionDef {
    program
        .function(name)
        .map(|(_, f)| f)
        .unwrap_or_else(|| panic!("no function '{name}'"))
}

const JUMP_ENUM: &str = r#"
enum zjump {
  zJDONT,
  zJGT,
  zJEQ,
  zJGE,
  zJLT,
  zJNE,
  zJLE,
  zJMP
}
"#;

const EXTERNS: &str = r#"
val znot_bool = "not" : (%bool) -> %bool
val zeq_bool = "eq_bool" : (%bool, %bool) -> %bool
val zprint = "print_endline" : (%string) -> %unit
"#;

// ══════════════════════════════════════════════════════════════════════════════
// Enums & unions
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_enum_ordinals_follow_declaration_order() {
    let program = generate(JUMP_ENUM);
    let def = program.enum_def("zjump").unwrap();
    let expected = ["zJDONT", "zJGT", "zJEQ", "zJGE", "zJLT", "zJNE", "zJLE", "zJMP"];
    assert_eq!(def.len(), 8);
    for (i, name) in expected.iter().enumerate() {
        assert_eq!(def.ordinal(name), Some(i as u32));
        assert_eq!(def.variant(i as u32), Some(*name));
    }
}

#[test]
fn test_enum_constant_lowers_to_ordinal() {
    let source = format!(
        "{JUMP_ENUM}\nval zpick : (%unit) -> %enum zjump\nfn zpick(za) {{\n  return = zJEQ;\n  end;\n}}"
    );
    let program = generate(&source);
    let f = function(&program, "zpick");
    assert_eq!(f.ret, Ty::Enum(EnumId(0)));
    assert_eq!(
        f.blocks[0].ops,
        vec![Op::Assign {
            dest: Place::root(PlaceRoot::Return),
            value: Operand::Const(Const::Enum {
                enum_id: EnumId(0),
                ordinal: 2
            }),
        }]
    );
}

#[test]
fn test_union_cases_and_payload_types() {
    let program = generate(
        "union zinstr {\n  zAINST: %bv16,\n  zCINST: (%bv1, (%bool, %bool, %bool), %bool)\n}",
    );
    let def = program.union_def("zinstr").unwrap();
    assert_eq!(def.tag("zAINST"), Some(0));
    assert_eq!(def.tag("zCINST"), Some(1));
    assert_eq!(def.variants[0].payload, Ty::Bits(16));
    assert_eq!(
        def.variants[1].payload,
        Ty::Tuple(vec![
            Ty::Bits(1),
            Ty::Tuple(vec![Ty::Bool, Ty::Bool, Ty::Bool]),
            Ty::Bool
        ])
    );
}

#[test]
fn test_payload_may_reference_later_declaration() {
    let program = generate("union zu { zA: %enum zlater }\nenum zlater { zX, zY }");
    assert_eq!(program.unions[0].variants[0].payload, Ty::Enum(EnumId(0)));
}

#[test]
fn test_constructor_call_builds_variant() {
    let program = generate(
        "union zexception { zEpair: (%i64, %i64), zEstring: %string, zEunknown: %unit }\nval zf : (%unit) -> %unit\nfn zf(za) {\n  ze : %union zexception;\n  ze = zEstring(\"test\");\n  ze = zEunknown(());\n  ze = zEpair(1, 2);\n  end;\n}",
    );
    let ops = &function(&program, "zf").blocks[0].ops;
    let values: Vec<_> = ops
        .iter()
        .filter_map(|op| match op {
            Op::Assign { value, .. } => Some(value.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(
        values[0],
        Operand::Construct {
            union: UnionId(0),
            tag: 1,
            payload: Box::new(Operand::Const(Const::String("test".into()))),
        }
    );
    assert_eq!(
        values[1],
        Operand::Construct {
            union: UnionId(0),
            tag: 2,
            payload: Box::new(Operand::Const(Const::Unit)),
        }
    );
    assert_eq!(
        values[2],
        Operand::Construct {
            union: UnionId(0),
            tag: 0,
            payload: Box::new(Operand::Tuple(vec![
                Operand::Const(Const::Int(1)),
                Operand::Const(Const::Int(2))
            ])),
        }
    );
}

#[test]
fn test_is_lowers_to_negated_tag_test() {
    let program = generate(
        "union zu { zA: %unit, zB: %bool }\nval zf : (%union zu) -> %unit\nfn zf(zv) {\n  jump zv is zB goto 1;\n  end;\n}",
    );
    let f = function(&program, "zf");
    let Terminator::Branch { cond, .. } = &f.blocks[0].terminator else {
        panic!("expected branch");
    };
    assert_eq!(
        cond,
        &Operand::Prim {
            op: PrimOp::Not,
            args: vec![Operand::IsVariant {
                value: Box::new(Operand::Local(LocalId(0))),
                union: UnionId(0),
                tag: 1,
            }],
        }
    );
}

// ══════════════════════════════════════════════════════════════════════════════
// Jump graph
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_blocks_split_at_targets_and_terminators() {
    let program = generate(
        "val zf : (%unit) -> %unit\nfn zf(za) {\n  zx : %bool;\n  zx = true;\n  jump zx goto 4;\n  return = ();\n  end;\n}",
    );
    let f = function(&program, "zf");
    let origins: Vec<_> = f.blocks.iter().map(|b| b.origin).collect();
    assert_eq!(origins, vec![Some(0), Some(3), Some(4)]);
    assert_eq!(f.entry, BlockId(0));

    assert_eq!(f.blocks[0].ops.len(), 2);
    assert_eq!(
        f.blocks[0].terminator,
        Terminator::Branch {
            cond: Operand::Local(LocalId(1)),
            then_block: BlockId(2),
            else_block: BlockId(1),
        }
    );
    // Block 1 falls through into the jump target.
    assert_eq!(f.blocks[1].terminator, Terminator::Goto(BlockId(2)));
    assert_eq!(f.blocks[2].terminator, Terminator::Return);
    assert!(f.blocks[2].ops.is_empty());
}

#[test]
fn test_params_precede_declared_locals() {
    let program = generate(
        "val zf : (%bool, %i) -> %unit\nfn zf(za, zb) {\n  zc : %string;\n  end;\n}",
    );
    let f = function(&program, "zf");
    assert_eq!(f.params, vec![LocalId(0), LocalId(1)]);
    let locals: Vec<_> = f.locals.iter().map(|l| (l.name.as_str(), l.ty.clone())).collect();
    assert_eq!(
        locals,
        vec![("za", Ty::Bool), ("zb", Ty::Int), ("zc", Ty::String)]
    );
}

#[test]
fn test_redeclaration_with_same_type_reuses_local() {
    let program = generate(
        "val zf : (%unit) -> %unit\nfn zf(za) {\n  zx : %bool;\n  zx : %bool;\n  end;\n}",
    );
    assert_eq!(function(&program, "zf").locals.len(), 2);
}

#[test]
fn test_arbitrary_and_unreachable_terminators() {
    let program = generate(
        "val zf : (%unit) -> %unit\nfn zf(za) {\n  jump have_exception goto 2;\n  arbitrary;\n  unreachable;\n}",
    );
    let f = function(&program, "zf");
    assert_eq!(f.blocks[1].terminator, Terminator::Arbitrary);
    assert!(matches!(
        f.blocks[2].terminator,
        Terminator::Unreachable { .. }
    ));
}

#[test]
fn test_falling_off_the_body_traps() {
    let program = generate("val zf : (%unit) -> %unit\nfn zf(za) {\n  return = ();\n}");
    let f = function(&program, "zf");
    assert_eq!(f.blocks.len(), 1);
    assert!(matches!(
        f.blocks[0].terminator,
        Terminator::Unreachable { .. }
    ));
}

#[test]
fn test_jump_on_last_statement_gets_trap_successor() {
    let program = generate("val zf : (%unit) -> %unit\nfn zf(za) {\n  jump have_exception goto 0;\n}");
    let f = function(&program, "zf");
    assert_eq!(f.blocks.len(), 2);
    let Terminator::Branch {
        then_block,
        else_block,
        ..
    } = &f.blocks[0].terminator
    else {
        panic!("expected branch");
    };
    assert_eq!(*then_block, BlockId(0));
    assert_eq!(f.blocks[else_block.index()].origin, None);
    assert!(matches!(
        f.blocks[else_block.index()].terminator,
        Terminator::Unreachable { .. }
    ));
}

// ══════════════════════════════════════════════════════════════════════════════
// Check-after-call
// ══════════════════════════════════════════════════════════════════════════════

const RAISER: &str = r#"
val zboom : (%unit) -> %unit
fn zboom(za) {
  have_exception = true;
  arbitrary;
}
"#;

#[test]
fn test_unchecked_call_gets_propagation_branch() {
    let source = format!(
        "{RAISER}\nval zmain : (%unit) -> %unit\nfn zmain(za) {{\n  zx : %unit;\n  zx = zboom(());\n  return = ();\n  end;\n}}"
    );
    let program = generate(&source);
    let f = function(&program, "zmain");
    assert!(f.may_raise);
    assert_eq!(f.blocks.len(), 3);
    assert_eq!(
        f.blocks[0].terminator,
        Terminator::Branch {
            cond: Operand::HaveException,
            then_block: BlockId(1),
            else_block: BlockId(2),
        }
    );
    assert_eq!(f.blocks[1].origin, None);
    assert_eq!(f.blocks[1].terminator, Terminator::Arbitrary);
    assert_eq!(f.blocks[2].origin, None);
    assert_eq!(f.blocks[2].terminator, Terminator::Return);
}

#[test]
fn test_propagate_block_is_shared() {
    let source = format!(
        "{RAISER}\nval zmain : (%unit) -> %unit\nfn zmain(za) {{\n  zx : %unit;\n  zx = zboom(());\n  zx = zboom(());\n  end;\n}}"
    );
    let program = generate(&source);
    let f = function(&program, "zmain");
    let arbitrary_blocks = f
        .blocks
        .iter()
        .filter(|b| b.terminator == Terminator::Arbitrary)
        .count();
    assert_eq!(arbitrary_blocks, 1);
    assert_eq!(f.blocks.len(), 4);
}

#[test]
fn test_explicit_flag_test_suppresses_insertion() {
    let source = format!(
        "{RAISER}\nval zmain : (%unit) -> %unit\nfn zmain(za) {{\n  zx : %unit;\n  zx = zboom(());\n  jump have_exception goto 4;\n  return = ();\n  end;\n}}"
    );
    let program = generate(&source);
    let f = function(&program, "zmain");
    assert!(f.blocks.iter().all(|b| b.origin.is_some()));
}

#[test]
fn test_calls_to_clean_functions_are_not_checked() {
    let source = format!(
        "{EXTERNS}\nval zg : (%unit) -> %unit\nfn zg(za) {{\n  end;\n}}\nval zmain : (%unit) -> %unit\nfn zmain(za) {{\n  zx : %unit;\n  zx = zg(());\n  zx = zprint(\"hi\");\n  end;\n}}"
    );
    let program = generate(&source);
    let f = function(&program, "zmain");
    assert!(!f.may_raise);
    assert_eq!(f.blocks.len(), 1);
}

#[test]
fn test_propagation_checks_can_be_disabled() {
    let source = format!(
        "{RAISER}\nval zmain : (%unit) -> %unit\nfn zmain(za) {{\n  zx : %unit;\n  zx = zboom(());\n  end;\n}}"
    );
    let options = CodegenOptions::from_json(r#"{"insert_propagation_checks": false}"#).unwrap();
    let program = compile_with_options(&source, "test.ir", &options).unwrap();
    assert_eq!(function(&program, "zmain").blocks.len(), 1);
}

#[test]
fn test_externs_are_deduplicated() {
    let source = format!(
        "{EXTERNS}\nval zmain : (%unit) -> %unit\nfn zmain(za) {{\n  zx : %unit;\n  zx = zprint(\"a\");\n  zx = zprint(\"b\");\n  end;\n}}"
    );
    let program = generate(&source);
    assert_eq!(program.externs.len(), 1);
    assert_eq!(program.externs[0].symbol, "print_endline");
    assert_eq!(program.externs[0].params, vec![Ty::String]);
}

// ══════════════════════════════════════════════════════════════════════════════
// Errors
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn e300_jump_target_out_of_range() {
    assert_eq!(
        codegen_errors("val zf : (%unit) -> %unit\nfn zf(za) {\n  goto 7;\n  end;\n}"),
        vec![ErrorCode::JUMP_OUT_OF_RANGE]
    );
}

#[test]
fn e301_conflicting_local() {
    assert_eq!(
        codegen_errors("val zf : (%unit) -> %unit\nfn zf(za) {\n  zx : %bool;\n  zx : %unit;\n  end;\n}"),
        vec![ErrorCode::CONFLICTING_LOCAL]
    );
}

#[test]
fn e302_nested_call() {
    let source = format!(
        "{EXTERNS}\nval zf : (%unit) -> %unit\nfn zf(za) {{\n  zx : %bool;\n  zx = znot_bool(zeq_bool(true, false));\n  end;\n}}"
    );
    assert_eq!(codegen_errors(&source), vec![ErrorCode::NESTED_CALL]);
}

#[test]
fn e200_unknown_name_in_body() {
    assert_eq!(
        codegen_errors("val zf : (%unit) -> %unit\nfn zf(za) {\n  zx : %bool;\n  zx = zmissing;\n  end;\n}"),
        vec![ErrorCode::UNDEFINED_NAME]
    );
}

#[test]
fn e401_extern_arity_mismatch() {
    let source = format!(
        "{EXTERNS}\nval zf : (%unit) -> %unit\nfn zf(za) {{\n  zx : %bool;\n  zx = znot_bool(true, false);\n  end;\n}}"
    );
    assert_eq!(codegen_errors(&source), vec![ErrorCode::CODEGEN_UNSUPPORTED]);
}

#[test]
fn e401_unknown_primitive() {
    assert_eq!(
        codegen_errors("val zf : (%unit) -> %unit\nfn zf(za) {\n  jump @xor(true, false) goto 1;\n  end;\n}"),
        vec![ErrorCode::CODEGEN_UNSUPPORTED]
    );
}

#[test]
fn test_codegen_error_points_at_source_line() {
    let errors = compile(
        "val zf : (%unit) -> %unit\nfn zf(za) {\n  goto 9;\n}",
        "test.ir",
    )
    .unwrap_err();
    assert_eq!(errors.errors[0].span.line, 3);
    assert_eq!(errors.errors[0].source_line, "  goto 9;");
}

// ══════════════════════════════════════════════════════════════════════════════
// Listing
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_listing_of_generated_program() {
    let source = format!(
        "{JUMP_ENUM}{RAISER}\nval zmain : (%unit) -> %unit\nfn zmain(za) {{\n  zx : %unit;\n  zx = zboom(());\n  end;\n}}"
    );
    let text = listing::render(&generate(&source));
    assert!(text.contains("zJMP = 7"));
    assert!(text.contains("fn zmain(za: unit) -> unit raises {"));
    assert!(text.contains("zx = call zboom(())"));
    assert!(text.contains("branch have_exception ? bb1 : bb2"));
}
