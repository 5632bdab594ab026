//! Runtime tests: a toy two-instruction ISA, tagged unions, traps, hooks.

use std::cell::RefCell;
use std::rc::Rc;

use sailfoil_codegen::UnionId;
use sailfoil_compiler::compile;
use sailfoil_eval::*;
use sailfoil_mem::{Memory, MemoryKind};

// ══════════════════════════════════════════════════════════════════════════════
// Helpers
// ══════════════════════════════════════════════════════════════════════════════

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn simulator_with(source: &str, config: SimConfig) -> Simulator {
    init_tracing();
    let program = compile(source, "test.ir").unwrap_or_else(|e| panic!("{e}"));
    Simulator::new(program, config).unwrap()
}

fn simulator(source: &str) -> Simulator {
    simulator_with(source, SimConfig::default())
}

#[derive(Default)]
struct Recorded {
    accesses: Vec<MemoryAccess>,
    registers: Vec<(String, Value)>,
    platform: Vec<String>,
}

struct Recorder(Rc<RefCell<Recorded>>);

impl TraceHooks for Recorder {
    fn on_register_write(&mut self, name: &str, value: &Value) {
        self.0.borrow_mut().registers.push((name.to_string(), value.clone()));
    }

    fn on_memory_access(&mut self, access: &MemoryAccess) {
        self.0.borrow_mut().accesses.push(*access);
    }

    fn on_platform(&mut self, message: &str) {
        self.0.borrow_mut().platform.push(message.to_string());
    }
}

fn record(sim: &mut Simulator) -> Rc<RefCell<Recorded>> {
    let log = Rc::new(RefCell::new(Recorded::default()));
    sim.set_hooks(Box::new(Recorder(log.clone())));
    log
}

/// Four-byte little-endian instructions. The low byte is the opcode, the
/// upper 24 bits an immediate.
///
/// * `0x01 LOADI imm`: R = imm
/// * `0x02 STORE imm`: mem64[imm] = R
const TOY_ISA: &str = r#"
register zPC : %bv64
register zR : %bv64

val zfetch = "platform_read_mem" : (%unit, %i, %bv64, %i) -> %bv32
val zstore = "platform_write_mem" : (%unit, %i, %bv64, %i, %bv64) -> %bool
val zslice = "slice" : (%bv32, %i, %i) -> %bv
val zeq_bits = "eq_bits" : (%bv8, %bv8) -> %bool
val zzero_extend = "zero_extend" : (%bv24, %i) -> %bv64
val zadd_bits_int = "add_bits_int" : (%bv64, %i) -> %bv64

val zstep : (%i) -> %bool
fn zstep(zstep_no) {
  zinstr : %bv32;
  zinstr = zfetch((), 64, zPC, 4);
  zop : %bv8;
  zop = zslice(zinstr, 0, 8);
  zimm_raw : %bv24;
  zimm_raw = zslice(zinstr, 8, 24);
  zimm : %bv64;
  zimm = zzero_extend(zimm_raw, 64);
  zflag : %bool;
  zflag = zeq_bits(zop, 0x01);
  jump @not(zflag) goto 13;
  zR = zimm;
  goto 18;
  zflag = zeq_bits(zop, 0x02);
  jump @not(zflag) goto 17;
  zflag = zstore((), 64, zimm, 8, zR);
  goto 18;
  unreachable;
  zPC = zadd_bits_int(zPC, 4);
  return = true;
  end;
}
"#;

const BASE: u64 = 0x8000_0000;

fn toy_image() -> Image {
    Image {
        sections: vec![Section {
            name: ".text".into(),
            base: BASE,
            // LOADI 0x00beef; STORE 0x001000
            data: vec![0x01, 0xef, 0xbe, 0x00, 0x02, 0x00, 0x10, 0x00],
        }],
        entry: BASE,
    }
}

fn toy_simulator(trace: TraceConfig) -> Simulator {
    let config = SimConfig {
        trace,
        ..SimConfig::default()
    };
    let mut sim = simulator_with(TOY_ISA, config);
    let report = sim.load_image(&toy_image()).unwrap();
    sim.set_register("zPC", Value::bits(64, report.entry)).unwrap();
    sim
}

fn step(sim: &mut Simulator, n: i64) -> Value {
    sim.call("zstep", vec![Value::Int(n)]).unwrap()
}

// ══════════════════════════════════════════════════════════════════════════════
// Toy ISA
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_one_step_advances_pc() {
    let mut sim = toy_simulator(TraceConfig::default());
    assert_eq!(step(&mut sim, 0), Value::Bool(true));
    assert_eq!(sim.register("zPC"), Some(&Value::bits(64, BASE + 4)));
    assert_eq!(sim.register("zR"), Some(&Value::bits(64, 0xbeef)));
}

#[test]
fn test_steps_perform_exactly_the_implied_accesses() {
    let mut sim = toy_simulator(TraceConfig {
        print_mem_access: true,
        ..TraceConfig::default()
    });
    let log = record(&mut sim);

    step(&mut sim, 0);
    assert_eq!(
        log.borrow().accesses,
        vec![MemoryAccess {
            kind: AccessKind::Read,
            address: BASE,
            width: 4,
            value: 0x00be_ef01,
        }]
    );

    step(&mut sim, 1);
    assert_eq!(
        log.borrow().accesses[1..],
        [
            MemoryAccess {
                kind: AccessKind::Read,
                address: BASE + 4,
                width: 4,
                value: 0x0010_0002,
            },
            MemoryAccess {
                kind: AccessKind::Write,
                address: 0x1000,
                width: 8,
                value: 0xbeef,
            },
        ]
    );
    assert_eq!(sim.machine_mut().memory.read(0x1000, 8).unwrap(), 0xbeef);
    assert_eq!(sim.register("zPC"), Some(&Value::bits(64, BASE + 8)));
}

#[test]
fn test_hooks_stay_silent_without_flags() {
    let mut sim = toy_simulator(TraceConfig::default());
    let log = record(&mut sim);
    step(&mut sim, 0);
    step(&mut sim, 1);
    assert!(log.borrow().accesses.is_empty());
    assert!(log.borrow().registers.is_empty());
}

#[test]
fn test_register_writes_are_reported() {
    let mut sim = toy_simulator(TraceConfig {
        print_reg: true,
        ..TraceConfig::default()
    });
    let log = record(&mut sim);
    step(&mut sim, 0);
    assert_eq!(
        log.borrow().registers,
        vec![
            ("zR".to_string(), Value::bits(64, 0xbeef)),
            ("zPC".to_string(), Value::bits(64, BASE + 4)),
        ]
    );
}

#[test]
fn test_unknown_opcode_traps() {
    let mut sim = toy_simulator(TraceConfig::default());
    sim.set_register("zPC", Value::bits(64, 0x4000)).unwrap();
    let err = sim.call("zstep", vec![Value::Int(0)]).unwrap_err();
    assert_eq!(
        err,
        EvalError::Unreachable {
            location: "zstep: statement 17".into()
        }
    );
}

#[test]
fn test_flat_backend_fault_is_a_host_error() {
    let config = SimConfig {
        memory: MemoryKind::Flat { capacity: 0x1000 },
        ..SimConfig::default()
    };
    let mut sim = simulator_with(TOY_ISA, config);
    sim.set_register("zPC", Value::bits(64, BASE)).unwrap();
    assert!(matches!(
        sim.call("zstep", vec![Value::Int(0)]),
        Err(EvalError::Memory(_))
    ));
}

#[test]
fn test_unallocatable_flat_memory_fails_to_build() {
    let program = compile(TOY_ISA, "toy.ir").unwrap_or_else(|e| panic!("{e}"));
    let config =
        SimConfig::from_json(r#"{"memory": {"kind": "flat", "capacity": 18446744073709551615}}"#)
            .unwrap();
    assert!(matches!(
        Simulator::new(program, config),
        Err(EvalError::Memory(sailfoil_mem::MemoryFault::CapacityTooLarge(u64::MAX)))
    ));
}

// ══════════════════════════════════════════════════════════════════════════════
// Tagged unions
// ══════════════════════════════════════════════════════════════════════════════

const INSTR: &str = r#"
union zinstr {
  zAINST: %bv16,
  zCINST: (%bv1, %bool)
}
val zmake_a : (%bv16) -> %union zinstr
fn zmake_a(zbits) {
  return = zAINST(zbits);
  end;
}
val zis_c : (%union zinstr) -> %bool
fn zis_c(zi) {
  jump zi is zCINST goto 3;
  return = true;
  end;
  return = false;
  end;
}
val zpayload_a : (%union zinstr) -> %bv16
fn zpayload_a(zi) {
  return = zi as zAINST;
  end;
}
val zpayload_c : (%union zinstr) -> (%bv1, %bool)
fn zpayload_c(zi) {
  return = zi as zCINST;
  end;
}
"#;

#[test]
fn test_variant_tests_and_projection() {
    let mut sim = simulator(INSTR);
    let a = sim.call("zmake_a", vec![Value::bits(16, 0x1234)]).unwrap();
    assert_eq!(a.as_union().unwrap().tag, 0);

    assert_eq!(sim.call("zis_c", vec![a.clone()]).unwrap(), Value::Bool(false));
    assert_eq!(
        sim.call("zpayload_a", vec![a.clone()]).unwrap(),
        Value::bits(16, 0x1234)
    );
    assert_eq!(
        sim.call("zpayload_c", vec![a]).unwrap_err(),
        EvalError::VariantMismatch {
            expected: "zCINST".into(),
            found: "zAINST".into(),
        }
    );
}

#[test]
fn test_variant_test_on_second_case() {
    let mut sim = simulator(INSTR);
    let c = Value::union(UnionId(0), 1, Value::Tuple(vec![Value::bits(1, 1), Value::Bool(true)]));
    assert_eq!(sim.call("zis_c", vec![c.clone()]).unwrap(), Value::Bool(true));
    assert_eq!(
        sim.call("zpayload_c", vec![c]).unwrap(),
        Value::Tuple(vec![Value::bits(1, 1), Value::Bool(true)])
    );
}

const TREE: &str = r#"
union ztree {
  zNode: (%union ztree, %i),
  zLeaf: %unit
}
register ztop : %union ztree
val zf : (%unit) -> %bool
fn zf(za) {
  zt : %union ztree;
  zt = zLeaf(());
  return = true;
  end;
}
val zgive_up : (%unit) -> %union ztree
fn zgive_up(za) {
  arbitrary;
}
"#;

#[test]
fn test_self_referencing_union_locals_are_callable() {
    let mut sim = simulator(TREE);
    assert_eq!(sim.call("zf", vec![Value::Unit]).unwrap(), Value::Bool(true));
    let leaf = Value::union(UnionId(0), 1, Value::Unit);
    assert_eq!(sim.register("ztop"), Some(&leaf));
    assert_eq!(sim.call("zgive_up", vec![Value::Unit]).unwrap(), leaf);
}

// ══════════════════════════════════════════════════════════════════════════════
// Linking & limits
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_unknown_extern_fails_to_link() {
    let program = compile(
        "val zf = \"no_such_symbol\" : (%unit) -> %unit\nval zg : (%unit) -> %unit\nfn zg(za) {\n  zu : %unit;\n  zu = zf(());\n  end;\n}",
        "test.ir",
    )
    .unwrap();
    assert_eq!(
        Simulator::new(program, SimConfig::default()).unwrap_err(),
        EvalError::UnknownExtern("no_such_symbol".into())
    );
}

#[test]
fn test_call_depth_is_bounded() {
    let source = r#"
val zloop : (%unit) -> %unit
fn zloop(za) {
  zu : %unit;
  zu = zloop(());
  return = ();
  end;
}
"#;
    let config = SimConfig {
        max_call_depth: 16,
        ..SimConfig::default()
    };
    let mut sim = simulator_with(source, config);
    assert_eq!(
        sim.call("zloop", vec![Value::Unit]),
        Err(EvalError::CallDepthExceeded(16))
    );
}

#[test]
fn test_unknown_function_and_arity() {
    let mut sim = simulator(INSTR);
    assert_eq!(
        sim.call("znope", vec![]),
        Err(EvalError::UnknownFunction("znope".into()))
    );
    assert!(matches!(
        sim.call("zmake_a", vec![]),
        Err(EvalError::ArityMismatch { expected: 1, found: 0, .. })
    ));
}

#[test]
fn test_falling_off_the_end_traps() {
    let mut sim = simulator("val zf : (%unit) -> %unit\nfn zf(za) {\n  zx : %unit;\n}");
    assert_eq!(
        sim.call("zf", vec![Value::Unit]),
        Err(EvalError::Unreachable {
            location: "zf: fell off the end of the body".into()
        })
    );
}

#[test]
fn test_platform_messages_reach_hooks() {
    let source = r#"
val zplatform = "print_platform" : (%string) -> %unit
val zenabled = "get_config_print_platform" : (%unit) -> %bool
val zf : (%unit) -> %bool
fn zf(za) {
  zu : %unit;
  zu = zplatform("htif: done");
  return = zenabled(());
  end;
}
"#;
    let config = SimConfig {
        trace: TraceConfig {
            print_platform: true,
            ..TraceConfig::default()
        },
        ..SimConfig::default()
    };
    let mut sim = simulator_with(source, config);
    let log = record(&mut sim);
    assert_eq!(sim.call("zf", vec![Value::Unit]).unwrap(), Value::Bool(true));
    assert_eq!(log.borrow().platform, vec!["htif: done"]);
    assert_eq!(sim.output(), ["htif: done"]);
}
