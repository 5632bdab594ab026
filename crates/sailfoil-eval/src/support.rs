//! The support library: host implementations of extern symbols.
//!
//! A `val` declared as `val zf = "symbol" : ...` is linked against the
//! entry named `symbol` when the simulator is built. Arguments arrive
//! already evaluated; arity is checked on every call.

use crate::error::{EvalError, EvalResult};
use crate::machine::Machine;
use crate::value::{width_mask, Value};

pub type BuiltinFn = fn(&mut Machine, &[Value]) -> EvalResult<Value>;

#[derive(Clone, Copy)]
pub struct Builtin {
    pub name: &'static str,
    pub arity: usize,
    pub func: BuiltinFn,
}

impl Builtin {
    pub fn call(&self, machine: &mut Machine, args: &[Value]) -> EvalResult<Value> {
        if args.len() != self.arity {
            return Err(EvalError::ArityMismatch {
                name: self.name.to_string(),
                expected: self.arity,
                found: args.len(),
            });
        }
        (self.func)(machine, args)
    }
}

impl std::fmt::Debug for Builtin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Builtin({}/{})", self.name, self.arity)
    }
}

macro_rules! builtins {
    ($($name:literal / $arity:literal => $func:path),* $(,)?) => {
        &[$(Builtin { name: $name, arity: $arity, func: $func }),*]
    };
}

static BUILTINS: &[Builtin] = builtins![
    // bool
    "not" / 1 => not,
    "and_bool" / 2 => and_bool,
    "or_bool" / 2 => or_bool,
    "eq_bool" / 2 => eq_anything,
    // int
    "eq_int" / 2 => eq_int,
    "lt_int" / 2 => lt_int,
    "gt_int" / 2 => gt_int,
    "lteq_int" / 2 => lteq_int,
    "gteq_int" / 2 => gteq_int,
    "add_int" / 2 => add_int,
    "sub_int" / 2 => sub_int,
    "mult_int" / 2 => mult_int,
    // bits
    "eq_bits" / 2 => eq_bits,
    "neq_bits" / 2 => neq_bits,
    "add_bits" / 2 => add_bits,
    "sub_bits" / 2 => sub_bits,
    "add_bits_int" / 2 => add_bits_int,
    "and_bits" / 2 => and_bits,
    "or_bits" / 2 => or_bits,
    "xor_bits" / 2 => xor_bits,
    "not_bits" / 1 => not_bits,
    "shiftl" / 2 => shiftl,
    "shiftr" / 2 => shiftr,
    "zero_extend" / 2 => zero_extend,
    "sign_extend" / 2 => sign_extend,
    "slice" / 3 => slice,
    "sail_unsigned" / 1 => sail_unsigned,
    "sail_signed" / 1 => sail_signed,
    // strings & generic
    "eq_string" / 2 => eq_string,
    "concat_str" / 2 => concat_str,
    "eq_anything" / 2 => eq_anything,
    // output
    "print_endline" / 1 => print_endline,
    "print_int" / 2 => print_int,
    "print_bits" / 2 => print_bits,
    // memory
    "read_mem" / 1 => read_mem,
    "write_mem" / 2 => write_mem,
    "platform_read_mem" / 4 => platform_read_mem,
    "platform_write_mem" / 5 => platform_write_mem,
    // tracing
    "get_config_print_instr" / 1 => get_config_print_instr,
    "get_config_print_reg" / 1 => get_config_print_reg,
    "get_config_print_mem" / 1 => get_config_print_mem,
    "get_config_print_platform" / 1 => get_config_print_platform,
    "print_instr" / 1 => print_endline,
    "print_reg" / 1 => print_endline,
    "print_mem_access" / 1 => print_endline,
    "print_platform" / 1 => print_platform,
    // reservations
    "load_reservation" / 1 => load_reservation,
    "match_reservation" / 1 => match_reservation,
    "cancel_reservation" / 1 => cancel_reservation,
    // undefined values
    "undefined_bool" / 1 => undefined_bool,
    "undefined_int" / 1 => undefined_int,
    "undefined_unit" / 1 => undefined_unit,
];

pub fn lookup(symbol: &str) -> Option<&'static Builtin> {
    BUILTINS.iter().find(|b| b.name == symbol)
}

pub fn symbols() -> impl Iterator<Item = &'static str> {
    BUILTINS.iter().map(|b| b.name)
}

fn trap(message: impl Into<String>) -> EvalError {
    EvalError::ArithmeticTrap(message.into())
}

fn same_width(a: &Value, b: &Value) -> EvalResult<(u32, u64, u64)> {
    let (wa, x) = a.as_bits()?;
    let (wb, y) = b.as_bits()?;
    if wa != wb {
        return Err(EvalError::TypeMismatch(format!(
            "bitvector widths differ: {wa} and {wb}"
        )));
    }
    Ok((wa, x, y))
}

fn width_arg(value: &Value) -> EvalResult<u32> {
    let n = value.as_int()?;
    match u32::try_from(n) {
        Ok(w) if (1..=64).contains(&w) => Ok(w),
        _ => Err(trap(format!("bitvector width {n} out of range"))),
    }
}

fn shift_arg(value: &Value) -> EvalResult<u32> {
    let n = value.as_int()?;
    u32::try_from(n).map_err(|_| trap(format!("invalid shift amount {n}")))
}

fn address_arg(value: &Value) -> EvalResult<u64> {
    match value {
        Value::Bits { bits, .. } => Ok(*bits),
        Value::Int(i) => u64::try_from(*i).map_err(|_| trap(format!("negative address {i}"))),
        other => Err(EvalError::TypeMismatch(format!(
            "expected an address, found {}",
            other.type_name()
        ))),
    }
}

fn byte_count(value: &Value) -> EvalResult<usize> {
    let n = value.as_int()?;
    usize::try_from(n).map_err(|_| trap(format!("invalid access size {n}")))
}

// ── bool ─────────────────────────────────────────────────────────────

fn not(_: &mut Machine, args: &[Value]) -> EvalResult<Value> {
    Ok(Value::Bool(!args[0].as_bool()?))
}

fn and_bool(_: &mut Machine, args: &[Value]) -> EvalResult<Value> {
    Ok(Value::Bool(args[0].as_bool()? && args[1].as_bool()?))
}

fn or_bool(_: &mut Machine, args: &[Value]) -> EvalResult<Value> {
    Ok(Value::Bool(args[0].as_bool()? || args[1].as_bool()?))
}

fn eq_anything(_: &mut Machine, args: &[Value]) -> EvalResult<Value> {
    Ok(Value::Bool(args[0] == args[1]))
}

// ── int ──────────────────────────────────────────────────────────────

fn ints(args: &[Value]) -> EvalResult<(i64, i64)> {
    Ok((args[0].as_int()?, args[1].as_int()?))
}

fn eq_int(_: &mut Machine, args: &[Value]) -> EvalResult<Value> {
    let (a, b) = ints(args)?;
    Ok(Value::Bool(a == b))
}

fn lt_int(_: &mut Machine, args: &[Value]) -> EvalResult<Value> {
    let (a, b) = ints(args)?;
    Ok(Value::Bool(a < b))
}

fn gt_int(_: &mut Machine, args: &[Value]) -> EvalResult<Value> {
    let (a, b) = ints(args)?;
    Ok(Value::Bool(a > b))
}

fn lteq_int(_: &mut Machine, args: &[Value]) -> EvalResult<Value> {
    let (a, b) = ints(args)?;
    Ok(Value::Bool(a <= b))
}

fn gteq_int(_: &mut Machine, args: &[Value]) -> EvalResult<Value> {
    let (a, b) = ints(args)?;
    Ok(Value::Bool(a >= b))
}

fn add_int(_: &mut Machine, args: &[Value]) -> EvalResult<Value> {
    let (a, b) = ints(args)?;
    a.checked_add(b)
        .map(Value::Int)
        .ok_or_else(|| trap(format!("{a} + {b} overflows")))
}

fn sub_int(_: &mut Machine, args: &[Value]) -> EvalResult<Value> {
    let (a, b) = ints(args)?;
    a.checked_sub(b)
        .map(Value::Int)
        .ok_or_else(|| trap(format!("{a} - {b} overflows")))
}

fn mult_int(_: &mut Machine, args: &[Value]) -> EvalResult<Value> {
    let (a, b) = ints(args)?;
    a.checked_mul(b)
        .map(Value::Int)
        .ok_or_else(|| trap(format!("{a} * {b} overflows")))
}

// ── bits ─────────────────────────────────────────────────────────────

fn eq_bits(_: &mut Machine, args: &[Value]) -> EvalResult<Value> {
    let (_, a, b) = same_width(&args[0], &args[1])?;
    Ok(Value::Bool(a == b))
}

fn neq_bits(_: &mut Machine, args: &[Value]) -> EvalResult<Value> {
    let (_, a, b) = same_width(&args[0], &args[1])?;
    Ok(Value::Bool(a != b))
}

fn add_bits(_: &mut Machine, args: &[Value]) -> EvalResult<Value> {
    let (w, a, b) = same_width(&args[0], &args[1])?;
    Ok(Value::bits(w, a.wrapping_add(b)))
}

fn sub_bits(_: &mut Machine, args: &[Value]) -> EvalResult<Value> {
    let (w, a, b) = same_width(&args[0], &args[1])?;
    Ok(Value::bits(w, a.wrapping_sub(b)))
}

fn add_bits_int(_: &mut Machine, args: &[Value]) -> EvalResult<Value> {
    let (w, a) = args[0].as_bits()?;
    let b = args[1].as_int()?;
    // Two's complement: adding a negative int wraps the same way.
    Ok(Value::bits(w, a.wrapping_add(b as u64)))
}

fn and_bits(_: &mut Machine, args: &[Value]) -> EvalResult<Value> {
    let (w, a, b) = same_width(&args[0], &args[1])?;
    Ok(Value::bits(w, a & b))
}

fn or_bits(_: &mut Machine, args: &[Value]) -> EvalResult<Value> {
    let (w, a, b) = same_width(&args[0], &args[1])?;
    Ok(Value::bits(w, a | b))
}

fn xor_bits(_: &mut Machine, args: &[Value]) -> EvalResult<Value> {
    let (w, a, b) = same_width(&args[0], &args[1])?;
    Ok(Value::bits(w, a ^ b))
}

fn not_bits(_: &mut Machine, args: &[Value]) -> EvalResult<Value> {
    let (w, a) = args[0].as_bits()?;
    Ok(Value::bits(w, !a))
}

fn shiftl(_: &mut Machine, args: &[Value]) -> EvalResult<Value> {
    let (w, a) = args[0].as_bits()?;
    let n = shift_arg(&args[1])?;
    Ok(Value::bits(w, a.checked_shl(n).unwrap_or(0)))
}

fn shiftr(_: &mut Machine, args: &[Value]) -> EvalResult<Value> {
    let (w, a) = args[0].as_bits()?;
    let n = shift_arg(&args[1])?;
    Ok(Value::bits(w, a.checked_shr(n).unwrap_or(0)))
}

fn zero_extend(_: &mut Machine, args: &[Value]) -> EvalResult<Value> {
    let (w, a) = args[0].as_bits()?;
    let n = width_arg(&args[1])?;
    if n < w {
        return Err(trap(format!("cannot zero-extend bits{w} to bits{n}")));
    }
    Ok(Value::bits(n, a))
}

fn sign_extend(_: &mut Machine, args: &[Value]) -> EvalResult<Value> {
    let (w, a) = args[0].as_bits()?;
    let n = width_arg(&args[1])?;
    if n < w {
        return Err(trap(format!("cannot sign-extend bits{w} to bits{n}")));
    }
    Ok(Value::bits(n, signed(w, a) as u64))
}

/// `slice(v, start, len)`: bits `start .. start+len` of `v`.
fn slice(_: &mut Machine, args: &[Value]) -> EvalResult<Value> {
    let (w, a) = args[0].as_bits()?;
    let start = shift_arg(&args[1])?;
    let len = width_arg(&args[2])?;
    if start.checked_add(len).map_or(true, |end| end > w) {
        return Err(trap(format!(
            "slice {start}+{len} out of range for bits{w}"
        )));
    }
    Ok(Value::bits(len, (a >> start) & width_mask(len)))
}

fn signed(width: u32, bits: u64) -> i64 {
    if width >= 64 {
        return bits as i64;
    }
    let sign = 1u64 << (width - 1);
    ((bits ^ sign).wrapping_sub(sign)) as i64
}

fn sail_unsigned(_: &mut Machine, args: &[Value]) -> EvalResult<Value> {
    let (_, a) = args[0].as_bits()?;
    i64::try_from(a)
        .map(Value::Int)
        .map_err(|_| trap(format!("{a:#x} does not fit an int")))
}

fn sail_signed(_: &mut Machine, args: &[Value]) -> EvalResult<Value> {
    let (w, a) = args[0].as_bits()?;
    Ok(Value::Int(signed(w, a)))
}

// ── strings ──────────────────────────────────────────────────────────

fn eq_string(_: &mut Machine, args: &[Value]) -> EvalResult<Value> {
    Ok(Value::Bool(args[0].as_str()? == args[1].as_str()?))
}

fn concat_str(_: &mut Machine, args: &[Value]) -> EvalResult<Value> {
    Ok(Value::Str(format!("{}{}", args[0].as_str()?, args[1].as_str()?)))
}

// ── output ───────────────────────────────────────────────────────────

fn print_endline(machine: &mut Machine, args: &[Value]) -> EvalResult<Value> {
    let line = args[0].as_str()?.to_string();
    machine.print(line);
    Ok(Value::Unit)
}

fn print_int(machine: &mut Machine, args: &[Value]) -> EvalResult<Value> {
    let line = format!("{}{}", args[0].as_str()?, args[1].as_int()?);
    machine.print(line);
    Ok(Value::Unit)
}

fn print_bits(machine: &mut Machine, args: &[Value]) -> EvalResult<Value> {
    let prefix = args[0].as_str()?;
    let (w, a) = args[1].as_bits()?;
    let line = if w % 4 == 0 {
        format!("{prefix}0x{a:0digits$X}", digits = (w / 4) as usize)
    } else {
        format!("{prefix}0b{a:0digits$b}", digits = w as usize)
    };
    machine.print(line);
    Ok(Value::Unit)
}

fn print_platform(machine: &mut Machine, args: &[Value]) -> EvalResult<Value> {
    let message = args[0].as_str()?.to_string();
    machine.platform_message(&message);
    machine.print(message);
    Ok(Value::Unit)
}

// ── memory ───────────────────────────────────────────────────────────

fn read_mem(machine: &mut Machine, args: &[Value]) -> EvalResult<Value> {
    let address = address_arg(&args[0])?;
    let byte = machine.read_memory(address, 1)?;
    Ok(Value::bits(8, byte))
}

fn write_mem(machine: &mut Machine, args: &[Value]) -> EvalResult<Value> {
    let address = address_arg(&args[0])?;
    let (_, byte) = args[1].as_bits()?;
    machine.write_memory(address, 1, byte)?;
    Ok(Value::Bool(true))
}

/// `platform_read_mem(kind, addr_size, addr, n)`: `n` bytes as `bits(8n)`.
fn platform_read_mem(machine: &mut Machine, args: &[Value]) -> EvalResult<Value> {
    let address = address_arg(&args[2])?;
    let n = byte_count(&args[3])?;
    let value = machine.read_memory(address, n)?;
    Ok(Value::bits(8 * n as u32, value))
}

/// `platform_write_mem(kind, addr_size, addr, n, data)`.
fn platform_write_mem(machine: &mut Machine, args: &[Value]) -> EvalResult<Value> {
    let address = address_arg(&args[2])?;
    let n = byte_count(&args[3])?;
    let (_, data) = args[4].as_bits()?;
    machine.write_memory(address, n, data)?;
    Ok(Value::Bool(true))
}

// ── tracing ──────────────────────────────────────────────────────────

fn get_config_print_instr(machine: &mut Machine, _: &[Value]) -> EvalResult<Value> {
    Ok(Value::Bool(machine.trace.print_instr))
}

fn get_config_print_reg(machine: &mut Machine, _: &[Value]) -> EvalResult<Value> {
    Ok(Value::Bool(machine.trace.print_reg))
}

fn get_config_print_mem(machine: &mut Machine, _: &[Value]) -> EvalResult<Value> {
    Ok(Value::Bool(machine.trace.print_mem_access))
}

fn get_config_print_platform(machine: &mut Machine, _: &[Value]) -> EvalResult<Value> {
    Ok(Value::Bool(machine.trace.print_platform))
}

// ── reservations ─────────────────────────────────────────────────────

fn load_reservation(machine: &mut Machine, args: &[Value]) -> EvalResult<Value> {
    machine.reservation = Some(address_arg(&args[0])?);
    Ok(Value::Unit)
}

fn match_reservation(machine: &mut Machine, args: &[Value]) -> EvalResult<Value> {
    let address = address_arg(&args[0])?;
    Ok(Value::Bool(machine.reservation == Some(address)))
}

fn cancel_reservation(machine: &mut Machine, _: &[Value]) -> EvalResult<Value> {
    machine.reservation = None;
    Ok(Value::Unit)
}

// ── undefined ────────────────────────────────────────────────────────

fn undefined_bool(_: &mut Machine, _: &[Value]) -> EvalResult<Value> {
    Ok(Value::Bool(false))
}

fn undefined_int(_: &mut Machine, _: &[Value]) -> EvalResult<Value> {
    Ok(Value::Int(0))
}

fn undefined_unit(_: &mut Machine, _: &[Value]) -> EvalResult<Value> {
    Ok(Value::Unit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TraceConfig;
    use sailfoil_mem::MemoryKind;

    fn machine() -> Machine {
        Machine::new(Vec::new(), MemoryKind::Sparse.build().unwrap(), TraceConfig::default())
    }

    fn call(name: &str, args: &[Value]) -> EvalResult<Value> {
        let builtin = lookup(name).unwrap();
        builtin.call(&mut machine(), args)
    }

    #[test]
    fn test_symbol_names_are_unique() {
        let mut names: Vec<_> = symbols().collect();
        let total = names.len();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), total);
    }

    #[test]
    fn test_arity_is_checked() {
        let err = call("eq_int", &[Value::Int(1)]).unwrap_err();
        assert_eq!(
            err,
            EvalError::ArityMismatch {
                name: "eq_int".into(),
                expected: 2,
                found: 1
            }
        );
    }

    #[test]
    fn test_int_overflow_traps() {
        assert!(matches!(
            call("add_int", &[Value::Int(i64::MAX), Value::Int(1)]),
            Err(EvalError::ArithmeticTrap(_))
        ));
        assert_eq!(
            call("mult_int", &[Value::Int(-3), Value::Int(7)]).unwrap(),
            Value::Int(-21)
        );
    }

    #[test]
    fn test_bit_operations_stay_in_width() {
        assert_eq!(
            call("add_bits", &[Value::bits(8, 0xff), Value::bits(8, 2)]).unwrap(),
            Value::bits(8, 1)
        );
        assert_eq!(
            call("not_bits", &[Value::bits(4, 0b0101)]).unwrap(),
            Value::bits(4, 0b1010)
        );
        assert_eq!(
            call("shiftl", &[Value::bits(8, 0x81), Value::Int(1)]).unwrap(),
            Value::bits(8, 0x02)
        );
        assert_eq!(
            call("add_bits_int", &[Value::bits(16, 0), Value::Int(-1)]).unwrap(),
            Value::bits(16, 0xffff)
        );
        assert!(matches!(
            call("and_bits", &[Value::bits(8, 1), Value::bits(16, 1)]),
            Err(EvalError::TypeMismatch(_))
        ));
    }

    #[test]
    fn test_extension_and_slicing() {
        assert_eq!(
            call("sign_extend", &[Value::bits(4, 0b1000), Value::Int(8)]).unwrap(),
            Value::bits(8, 0xf8)
        );
        assert_eq!(
            call("zero_extend", &[Value::bits(4, 0b1000), Value::Int(8)]).unwrap(),
            Value::bits(8, 0x08)
        );
        assert_eq!(
            call("slice", &[Value::bits(32, 0xdead_beef), Value::Int(8), Value::Int(16)]).unwrap(),
            Value::bits(16, 0xadbe)
        );
        assert!(call("slice", &[Value::bits(8, 0), Value::Int(4), Value::Int(8)]).is_err());
        assert_eq!(
            call("sail_signed", &[Value::bits(8, 0xfe)]).unwrap(),
            Value::Int(-2)
        );
        assert_eq!(
            call("sail_unsigned", &[Value::bits(8, 0xfe)]).unwrap(),
            Value::Int(254)
        );
    }

    #[test]
    fn test_print_formats() {
        let mut m = machine();
        lookup("print_int")
            .unwrap()
            .call(&mut m, &[Value::Str("x = ".into()), Value::Int(33)])
            .unwrap();
        lookup("print_bits")
            .unwrap()
            .call(&mut m, &[Value::Str("pc ".into()), Value::bits(16, 0xbe)])
            .unwrap();
        lookup("print_bits")
            .unwrap()
            .call(&mut m, &[Value::Str("f ".into()), Value::bits(3, 0b101)])
            .unwrap();
        assert_eq!(m.output, vec!["x = 33", "pc 0x00BE", "f 0b101"]);
    }

    #[test]
    fn test_reservation_cycle() {
        let mut m = machine();
        let addr = Value::bits(64, 0x8000_0010);
        lookup("load_reservation").unwrap().call(&mut m, &[addr.clone()]).unwrap();
        let hit = lookup("match_reservation").unwrap().call(&mut m, &[addr.clone()]).unwrap();
        assert_eq!(hit, Value::Bool(true));
        let miss = lookup("match_reservation")
            .unwrap()
            .call(&mut m, &[Value::bits(64, 0x8000_0018)])
            .unwrap();
        assert_eq!(miss, Value::Bool(false));
        lookup("cancel_reservation").unwrap().call(&mut m, &[Value::Unit]).unwrap();
        let after = lookup("match_reservation").unwrap().call(&mut m, &[addr]).unwrap();
        assert_eq!(after, Value::Bool(false));
    }

    #[test]
    fn test_platform_memory_access() {
        let mut m = machine();
        let write = lookup("platform_write_mem").unwrap();
        let read = lookup("platform_read_mem").unwrap();
        write
            .call(
                &mut m,
                &[Value::Unit, Value::Int(64), Value::bits(64, 0x1003), Value::Int(4), Value::bits(32, 0x1122_3344)],
            )
            .unwrap();
        let value = read
            .call(&mut m, &[Value::Unit, Value::Int(64), Value::bits(64, 0x1003), Value::Int(4)])
            .unwrap();
        assert_eq!(value, Value::bits(32, 0x1122_3344));
        let byte = lookup("read_mem").unwrap().call(&mut m, &[Value::bits(64, 0x1003)]).unwrap();
        assert_eq!(byte, Value::bits(8, 0x44));
        assert!(matches!(
            read.call(&mut m, &[Value::Unit, Value::Int(64), Value::bits(64, 0), Value::Int(3)]),
            Err(EvalError::Memory(_))
        ));
    }
}
