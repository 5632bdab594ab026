//! Human-readable program listing.
//!
//! The output depends only on the program, so two generations of the same
//! module produce byte-identical listings.

use std::fmt::{self, Write};

use crate::program::*;

/// Render `program` as text.
pub fn render(program: &Program) -> String {
    Listing(program).to_string()
}

/// Displays a program as its listing.
pub struct Listing<'a>(pub &'a Program);

impl fmt::Display for Listing<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_listing(f, self.0)
    }
}

/// Write the listing of `program` to `out`.
pub fn write_listing(out: &mut impl Write, program: &Program) -> fmt::Result {
    let r = Renderer { program };

    for def in &program.enums {
        let variants: Vec<String> = def
            .variants
            .iter()
            .enumerate()
            .map(|(i, v)| format!("{v} = {i}"))
            .collect();
        writeln!(out, "enum {} {{ {} }}", def.name, variants.join(", "))?;
    }
    for def in &program.unions {
        writeln!(out, "union {} {{", def.name)?;
        for (tag, variant) in def.variants.iter().enumerate() {
            writeln!(out, "  [{tag}] {}: {}", variant.name, r.ty(&variant.payload))?;
        }
        writeln!(out, "}}")?;
    }
    for def in &program.registers {
        writeln!(out, "register {} : {}", def.name, r.ty(&def.ty))?;
    }
    for def in &program.externs {
        writeln!(
            out,
            "extern {} = \"{}\" : {}",
            def.name,
            def.symbol,
            r.signature(&def.params, &def.ret)
        )?;
    }
    for function in &program.functions {
        out.write_char('\n')?;
        r.function(out, function)?;
    }
    Ok(())
}

struct Renderer<'a> {
    program: &'a Program,
}

impl Renderer<'_> {
    fn ty(&self, ty: &Ty) -> String {
        match ty {
            Ty::Unit => "unit".into(),
            Ty::Bool => "bool".into(),
            Ty::Int => "int".into(),
            Ty::Bit => "bit".into(),
            Ty::Bits(w) => format!("bits{w}"),
            Ty::String => "string".into(),
            Ty::Tuple(items) => {
                let items: Vec<_> = items.iter().map(|t| self.ty(t)).collect();
                format!("({})", items.join(", "))
            }
            Ty::Enum(id) => match self.program.enums.get(id.index()) {
                Some(def) => format!("enum {}", def.name),
                None => format!("enum #{}", id.0),
            },
            Ty::Union(id) => match self.program.unions.get(id.index()) {
                Some(def) => format!("union {}", def.name),
                None => format!("union #{}", id.0),
            },
        }
    }

    fn signature(&self, params: &[Ty], ret: &Ty) -> String {
        let params: Vec<_> = params.iter().map(|t| self.ty(t)).collect();
        format!("({}) -> {}", params.join(", "), self.ty(ret))
    }

    fn function(&self, out: &mut impl Write, function: &FunctionDef) -> fmt::Result {
        let params: Vec<String> = function
            .params
            .iter()
            .map(|id| self.local_decl(function, *id))
            .collect();
        write!(
            out,
            "fn {}({}) -> {}",
            function.name,
            params.join(", "),
            self.ty(&function.ret)
        )?;
        if function.may_raise {
            out.write_str(" raises")?;
        }
        out.write_str(" {\n")?;
        for (i, local) in function.locals.iter().enumerate().skip(function.params.len()) {
            writeln!(out, "  local %{i} {}: {}", local.name, self.ty(&local.ty))?;
        }
        for (i, block) in function.blocks.iter().enumerate() {
            match block.origin {
                Some(stmt) => writeln!(out, "  bb{i}: // stmt {stmt}")?,
                None => writeln!(out, "  bb{i}:")?,
            }
            for op in &block.ops {
                writeln!(out, "    {}", self.op(function, op))?;
            }
            writeln!(out, "    {}", self.terminator(function, &block.terminator))?;
        }
        out.write_str("}\n")
    }

    fn local_decl(&self, function: &FunctionDef, id: LocalId) -> String {
        match function.locals.get(id.index()) {
            Some(local) => format!("{}: {}", local.name, self.ty(&local.ty)),
            None => format!("%{}", id.0),
        }
    }

    fn local(&self, function: &FunctionDef, id: LocalId) -> String {
        match function.locals.get(id.index()) {
            Some(local) => local.name.clone(),
            None => format!("%{}", id.0),
        }
    }

    fn register(&self, id: RegisterId) -> String {
        match self.program.registers.get(id.index()) {
            Some(def) => def.name.clone(),
            None => format!("reg#{}", id.0),
        }
    }

    fn variant(&self, union: UnionId, tag: u32) -> String {
        self.program
            .unions
            .get(union.index())
            .and_then(|u| u.variant(tag))
            .map(|v| v.name.clone())
            .unwrap_or_else(|| format!("#{}:{tag}", union.0))
    }

    fn op(&self, function: &FunctionDef, op: &Op) -> String {
        match op {
            Op::Declare { local } => format!("declare {}", self.local(function, *local)),
            Op::Assign { dest, value } => format!(
                "{} = {}",
                self.place(function, dest),
                self.operand(function, value)
            ),
            Op::Call { dest, callee, args } => {
                let name = match callee {
                    Callee::Function(id) => self
                        .program
                        .functions
                        .get(id.index())
                        .map(|f| f.name.clone())
                        .unwrap_or_else(|| format!("fn#{}", id.0)),
                    Callee::Extern(id) => self
                        .program
                        .externs
                        .get(id.index())
                        .map(|e| format!("extern {}", e.name))
                        .unwrap_or_else(|| format!("extern#{}", id.0)),
                };
                let args: Vec<_> = args.iter().map(|a| self.operand(function, a)).collect();
                let call = format!("call {name}({})", args.join(", "));
                match dest {
                    Some(dest) => format!("{} = {call}", self.place(function, dest)),
                    None => call,
                }
            }
        }
    }

    fn place(&self, function: &FunctionDef, place: &Place) -> String {
        let mut text = match place.root {
            PlaceRoot::Local(id) => self.local(function, id),
            PlaceRoot::Register(id) => self.register(id),
            PlaceRoot::Return => "return".into(),
            PlaceRoot::CurrentException => "current_exception".into(),
            PlaceRoot::HaveException => "have_exception".into(),
            PlaceRoot::ThrowLocation => "throw_location".into(),
        };
        for index in &place.path {
            text.push_str(&format!(".{index}"));
        }
        text
    }

    fn operand(&self, function: &FunctionDef, operand: &Operand) -> String {
        match operand {
            Operand::Const(c) => self.constant(c),
            Operand::Local(id) => self.local(function, *id),
            Operand::Register(id) => self.register(*id),
            Operand::HaveException => "have_exception".into(),
            Operand::CurrentException => "current_exception".into(),
            Operand::ThrowLocation => "throw_location".into(),
            Operand::Prim { op, args } => {
                let args: Vec<_> = args.iter().map(|a| self.operand(function, a)).collect();
                format!("@{}({})", op.name(), args.join(", "))
            }
            Operand::IsVariant { value, union, tag } => format!(
                "is_variant({}, {})",
                self.operand(function, value),
                self.variant(*union, *tag)
            ),
            Operand::AsVariant { value, union, tag } => format!(
                "{} as {}",
                self.operand(function, value),
                self.variant(*union, *tag)
            ),
            Operand::Field { value, index } => {
                format!("{}.{index}", self.operand(function, value))
            }
            Operand::Tuple(items) => {
                let items: Vec<_> = items.iter().map(|a| self.operand(function, a)).collect();
                format!("({})", items.join(", "))
            }
            Operand::Construct {
                union,
                tag,
                payload,
            } => format!(
                "{}({})",
                self.variant(*union, *tag),
                self.operand(function, payload)
            ),
        }
    }

    fn constant(&self, constant: &Const) -> String {
        match constant {
            Const::Unit => "()".into(),
            Const::Bool(b) => b.to_string(),
            Const::Int(i) => i.to_string(),
            Const::Bits { width, value } => format!("{value:#x}:bits{width}"),
            Const::String(s) => format!("{s:?}"),
            Const::Enum { enum_id, ordinal } => self
                .program
                .enums
                .get(enum_id.index())
                .and_then(|e| e.variant(*ordinal))
                .map(String::from)
                .unwrap_or_else(|| format!("enum#{}:{ordinal}", enum_id.0)),
        }
    }

    fn terminator(&self, function: &FunctionDef, terminator: &Terminator) -> String {
        match terminator {
            Terminator::Goto(b) => format!("goto bb{}", b.0),
            Terminator::Branch {
                cond,
                then_block,
                else_block,
            } => format!(
                "branch {} ? bb{} : bb{}",
                self.operand(function, cond),
                then_block.0,
                else_block.0
            ),
            Terminator::Return => "return".into(),
            Terminator::Arbitrary => "arbitrary".into(),
            Terminator::Unreachable { location } => format!("unreachable {location:?}"),
        }
    }
}
