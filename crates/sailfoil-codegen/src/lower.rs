//! Function body lowering: statement list to basic-block graph.
//!
//! Block leaders are statement 0, every jump or goto target, and every
//! statement that follows a block-ending one. Each leader starts exactly one
//! block; blocks synthesized here (call continuations, the shared propagate
//! block, the fall-off trap) carry no origin.

use std::collections::{BTreeSet, HashMap};

use sailfoil_types::ast::{self, ExprKind, FunctionDecl, Literal, StmtKind};

use crate::compiler::{CalleeKind, ProgramBuilder};
use crate::error::{CodegenError, CodegenResult};
use crate::program::*;

pub(crate) struct FunctionLowering<'b, 'a> {
    builder: &'b mut ProgramBuilder<'a>,
    function: &'a FunctionDecl,
    param_tys: Vec<Ty>,
    ret: Ty,
    may_raise: bool,
    locals: Vec<LocalDef>,
    local_ids: HashMap<String, LocalId>,
    blocks: Vec<BasicBlock>,
    leaders: HashMap<usize, BlockId>,
    /// The block receiving ops; `None` right after a terminator.
    current: Option<BlockId>,
    propagate: Option<BlockId>,
    fall_off: Option<BlockId>,
}

impl<'b, 'a> FunctionLowering<'b, 'a> {
    pub(crate) fn new(
        builder: &'b mut ProgramBuilder<'a>,
        function: &'a FunctionDecl,
        param_tys: Vec<Ty>,
        ret: Ty,
        may_raise: bool,
    ) -> Self {
        Self {
            builder,
            function,
            param_tys,
            ret,
            may_raise,
            locals: Vec::new(),
            local_ids: HashMap::new(),
            blocks: Vec::new(),
            leaders: HashMap::new(),
            current: None,
            propagate: None,
            fall_off: None,
        }
    }

    pub(crate) fn lower(mut self) -> CodegenResult<FunctionDef> {
        self.collect_locals()?;
        let params = (0..self.function.params.len())
            .map(|i| LocalId(i as u32))
            .collect();

        let function = self.function;
        let body = &function.body;
        if body.is_empty() {
            self.blocks.push(BasicBlock {
                origin: None,
                ops: Vec::new(),
                terminator: Terminator::Unreachable {
                    location: format!("{}: empty body", self.name()),
                },
            });
        } else {
            self.create_leader_blocks()?;
            for (index, stmt) in body.iter().enumerate() {
                self.lower_stmt(index, stmt)?;
            }
            if let Some(open) = self.current.take() {
                self.blocks[open.index()].terminator = Terminator::Unreachable {
                    location: format!("{}: fell off the end of the body", self.name()),
                };
            }
        }

        tracing::trace!(
            function = %self.function.name.name,
            blocks = self.blocks.len(),
            locals = self.locals.len(),
            "lowered function"
        );

        Ok(FunctionDef {
            name: self.function.name.name.clone(),
            params,
            locals: self.locals,
            ret: self.ret,
            blocks: self.blocks,
            entry: BlockId(0),
            may_raise: self.may_raise,
        })
    }

    fn name(&self) -> &'a str {
        &self.function.name.name
    }

    // ── Locals ────────────────────────────────────────────────────────

    fn collect_locals(&mut self) -> CodegenResult<()> {
        let function = self.function;
        let params = std::mem::take(&mut self.param_tys);
        for (param, ty) in function.params.iter().zip(params) {
            self.declare_local(param, ty)?;
        }
        for stmt in &function.body {
            if let StmtKind::Declare { name, ty, .. } = &stmt.kind {
                let ty = self.builder.lower_type(ty)?;
                self.declare_local(name, ty)?;
            }
        }
        Ok(())
    }

    fn declare_local(&mut self, name: &ast::Ident, ty: Ty) -> CodegenResult<LocalId> {
        if let Some(&id) = self.local_ids.get(&name.name) {
            if self.locals[id.index()].ty != ty {
                return Err(CodegenError::ConflictingLocal {
                    function: self.name().to_string(),
                    name: name.name.clone(),
                    span: name.span,
                });
            }
            return Ok(id);
        }
        let id = LocalId(self.locals.len() as u32);
        self.locals.push(LocalDef {
            name: name.name.clone(),
            ty,
        });
        self.local_ids.insert(name.name.clone(), id);
        Ok(id)
    }

    // ── Blocks ────────────────────────────────────────────────────────

    fn create_leader_blocks(&mut self) -> CodegenResult<()> {
        let function = self.function;
        let body = &function.body;
        let len = body.len();
        let mut leaders = BTreeSet::from([0]);
        for (index, stmt) in body.iter().enumerate() {
            let target = match &stmt.kind {
                StmtKind::Jump { target, .. } => Some(*target),
                StmtKind::Goto(target) => Some(*target),
                _ => None,
            };
            if let Some(target) = target {
                if target >= len {
                    return Err(CodegenError::JumpOutOfRange {
                        function: self.name().to_string(),
                        target,
                        len,
                        span: stmt.span,
                    });
                }
                leaders.insert(target);
            }
            if stmt.kind.ends_block() && index + 1 < len {
                leaders.insert(index + 1);
            }
        }
        for leader in leaders {
            let id = self.new_block(Some(leader));
            self.leaders.insert(leader, id);
        }
        Ok(())
    }

    fn new_block(&mut self, origin: Option<usize>) -> BlockId {
        let id = BlockId(self.blocks.len() as u32);
        self.blocks.push(BasicBlock {
            origin,
            ops: Vec::new(),
            terminator: Terminator::Unreachable {
                location: String::new(),
            },
        });
        id
    }

    fn block_of(&self, index: usize) -> CodegenResult<BlockId> {
        self.leaders.get(&index).copied().ok_or_else(|| {
            CodegenError::Internal(format!(
                "{}: statement {index} is not a block leader",
                self.name()
            ))
        })
    }

    fn current(&self) -> CodegenResult<BlockId> {
        self.current.ok_or_else(|| {
            CodegenError::Internal(format!("{}: no open block", self.name()))
        })
    }

    fn push_op(&mut self, op: Op) -> CodegenResult<()> {
        let block = self.current()?;
        self.blocks[block.index()].ops.push(op);
        Ok(())
    }

    fn terminate(&mut self, terminator: Terminator) -> CodegenResult<()> {
        let block = self.current()?;
        self.blocks[block.index()].terminator = terminator;
        self.current = None;
        Ok(())
    }

    fn propagate_block(&mut self) -> BlockId {
        if let Some(id) = self.propagate {
            return id;
        }
        let id = self.new_block(None);
        self.blocks[id.index()].terminator = Terminator::Arbitrary;
        self.propagate = Some(id);
        id
    }

    fn fall_off_block(&mut self) -> BlockId {
        if let Some(id) = self.fall_off {
            return id;
        }
        let id = self.new_block(None);
        self.blocks[id.index()].terminator = Terminator::Unreachable {
            location: format!("{}: fell off the end of the body", self.name()),
        };
        self.fall_off = Some(id);
        id
    }

    // ── Statements ────────────────────────────────────────────────────

    fn lower_stmt(&mut self, index: usize, stmt: &'a ast::Stmt) -> CodegenResult<()> {
        if let Some(&leader) = self.leaders.get(&index) {
            if let Some(open) = self.current {
                self.blocks[open.index()].terminator = Terminator::Goto(leader);
            }
            self.current = Some(leader);
        }

        match &stmt.kind {
            StmtKind::Declare { name, init, .. } => {
                let local = self.local_ids.get(&name.name).copied().ok_or_else(|| {
                    CodegenError::Internal(format!(
                        "{}: undeclared local '{}'",
                        self.name(),
                        name.name
                    ))
                })?;
                self.push_op(Op::Declare { local })?;
                if let Some(init) = init {
                    let dest = Place::root(PlaceRoot::Local(local));
                    self.lower_assign(index, dest, init)?;
                }
            }
            StmtKind::Assign { target, value } => {
                let dest = self.lower_place(target)?;
                self.lower_assign(index, dest, value)?;
            }
            StmtKind::Jump { cond, target, .. } => {
                let cond = self.lower_operand(cond)?;
                let then_block = self.block_of(*target)?;
                let else_block = if index + 1 < self.function.body.len() {
                    self.block_of(index + 1)?
                } else {
                    self.fall_off_block()
                };
                self.terminate(Terminator::Branch {
                    cond,
                    then_block,
                    else_block,
                })?;
            }
            StmtKind::Goto(target) => {
                let target = self.block_of(*target)?;
                self.terminate(Terminator::Goto(target))?;
            }
            StmtKind::End => self.terminate(Terminator::Return)?,
            StmtKind::Arbitrary => self.terminate(Terminator::Arbitrary)?,
            StmtKind::Unreachable => self.terminate(Terminator::Unreachable {
                location: format!("{}: statement {index}", self.name()),
            })?,
        }
        Ok(())
    }

    fn lower_assign(&mut self, index: usize, dest: Place, value: &ast::Expr) -> CodegenResult<()> {
        let ExprKind::Call { callee, args } = &value.kind else {
            let value = self.lower_operand(value)?;
            return self.push_op(Op::Assign { dest, value });
        };

        match self.builder.callee(&callee.name, callee.span)? {
            Some(CalleeKind::Constructor { union, tag }) => {
                let value = self.construct(union, tag, args)?;
                self.push_op(Op::Assign { dest, value })
            }
            Some(CalleeKind::Callable { callee: target, may_raise }) => {
                if let Callee::Extern(id) = target {
                    let expected = self.builder.program.externs[id.index()].params.len();
                    if expected != args.len() {
                        return Err(CodegenError::Unsupported {
                            message: format!(
                                "'{}' expects {expected} arguments, got {}",
                                callee.name,
                                args.len()
                            ),
                            span: value.span,
                        });
                    }
                }
                let args = args
                    .iter()
                    .map(|a| self.lower_operand(a))
                    .collect::<CodegenResult<Vec<_>>>()?;
                self.push_op(Op::Call {
                    dest: Some(dest),
                    callee: target,
                    args,
                })?;
                let checks = self.builder.options.insert_propagation_checks;
                if may_raise && checks && !self.flag_tested_at(index + 1) {
                    self.insert_propagation_check()?;
                }
                Ok(())
            }
            None => Err(self.unresolved(callee)),
        }
    }

    /// Whether statement `index` is ``jump have_exception goto N``.
    fn flag_tested_at(&self, index: usize) -> bool {
        matches!(
            self.function.body.get(index).map(|s| &s.kind),
            Some(StmtKind::Jump {
                cond: ast::Expr {
                    kind: ExprKind::HaveException,
                    ..
                },
                ..
            })
        )
    }

    fn insert_propagation_check(&mut self) -> CodegenResult<()> {
        let propagate = self.propagate_block();
        let continuation = self.new_block(None);
        self.terminate(Terminator::Branch {
            cond: Operand::HaveException,
            then_block: propagate,
            else_block: continuation,
        })?;
        self.current = Some(continuation);
        Ok(())
    }

    // ── Places & operands ─────────────────────────────────────────────

    fn lower_place(&self, place: &ast::Place) -> CodegenResult<Place> {
        let place = match place {
            ast::Place::Named { name, path } => {
                let root = if let Some(&local) = self.local_ids.get(&name.name) {
                    PlaceRoot::Local(local)
                } else if let Some(register) = self.builder.register_id(&name.name) {
                    PlaceRoot::Register(register)
                } else {
                    return Err(self.unresolved(name));
                };
                Place {
                    root,
                    path: path.clone(),
                }
            }
            ast::Place::Return => Place::root(PlaceRoot::Return),
            ast::Place::CurrentException => Place::root(PlaceRoot::CurrentException),
            ast::Place::HaveException => Place::root(PlaceRoot::HaveException),
            ast::Place::ThrowLocation => Place::root(PlaceRoot::ThrowLocation),
        };
        Ok(place)
    }

    fn lower_operand(&mut self, expr: &ast::Expr) -> CodegenResult<Operand> {
        let operand = match &expr.kind {
            ExprKind::Name(name) => {
                if let Some(&local) = self.local_ids.get(&name.name) {
                    Operand::Local(local)
                } else if let Some(register) = self.builder.register_id(&name.name) {
                    Operand::Register(register)
                } else if let Some(constant) = self.builder.enum_constant(&name.name) {
                    Operand::Const(constant)
                } else {
                    return Err(self.unresolved(name));
                }
            }
            ExprKind::Literal(literal) => Operand::Const(match literal {
                Literal::Unit => Const::Unit,
                Literal::Bool(b) => Const::Bool(*b),
                Literal::Int(i) => Const::Int(*i),
                Literal::Bits { width, value } => Const::Bits {
                    width: *width,
                    value: *value,
                },
                Literal::String(s) => Const::String(s.clone()),
            }),
            ExprKind::Call { callee, args } => match self.builder.callee(&callee.name, callee.span)? {
                Some(CalleeKind::Constructor { union, tag }) => self.construct(union, tag, args)?,
                Some(CalleeKind::Callable { .. }) => {
                    return Err(CodegenError::NestedCall {
                        function: self.name().to_string(),
                        callee: callee.name.clone(),
                        span: expr.span,
                    })
                }
                None => return Err(self.unresolved(callee)),
            },
            ExprKind::Prim { op, args } => {
                let prim = PrimOp::from_name(&op.name).ok_or_else(|| CodegenError::Unsupported {
                    message: format!("unknown primitive '@{}'", op.name),
                    span: op.span,
                })?;
                if prim.arity() != args.len() {
                    return Err(CodegenError::Unsupported {
                        message: format!(
                            "'@{}' takes {} arguments, got {}",
                            op.name,
                            prim.arity(),
                            args.len()
                        ),
                        span: expr.span,
                    });
                }
                Operand::Prim {
                    op: prim,
                    args: args
                        .iter()
                        .map(|a| self.lower_operand(a))
                        .collect::<CodegenResult<_>>()?,
                }
            }
            ExprKind::Is { value, variant } => {
                let (union, tag) = self.variant(variant)?;
                // `is` holds when the value is NOT the named variant.
                Operand::Prim {
                    op: PrimOp::Not,
                    args: vec![Operand::IsVariant {
                        value: Box::new(self.lower_operand(value)?),
                        union,
                        tag,
                    }],
                }
            }
            ExprKind::As { value, variant } => {
                let (union, tag) = self.variant(variant)?;
                Operand::AsVariant {
                    value: Box::new(self.lower_operand(value)?),
                    union,
                    tag,
                }
            }
            ExprKind::Field { value, index } => Operand::Field {
                value: Box::new(self.lower_operand(value)?),
                index: *index,
            },
            ExprKind::HaveException => Operand::HaveException,
            ExprKind::CurrentException => Operand::CurrentException,
            ExprKind::ThrowLocation => Operand::ThrowLocation,
        };
        Ok(operand)
    }

    fn construct(&mut self, union: UnionId, tag: u32, args: &[ast::Expr]) -> CodegenResult<Operand> {
        let mut items = args
            .iter()
            .map(|a| self.lower_operand(a))
            .collect::<CodegenResult<Vec<_>>>()?;
        let payload = match items.len() {
            0 => Operand::Const(Const::Unit),
            1 => items.remove(0),
            _ => Operand::Tuple(items),
        };
        Ok(Operand::Construct {
            union,
            tag,
            payload: Box::new(payload),
        })
    }

    fn variant(&self, name: &ast::Ident) -> CodegenResult<(UnionId, u32)> {
        self.builder
            .union_variant(&name.name)
            .ok_or_else(|| self.unresolved(name))
    }

    fn unresolved(&self, name: &ast::Ident) -> CodegenError {
        CodegenError::UnresolvedSymbol {
            name: name.name.clone(),
            function: self.name().to_string(),
            span: name.span,
        }
    }
}
