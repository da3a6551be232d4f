//! Two-pass tree-walking backend.
//!
//! Pass 1 walks the top level and makes sure every declared function is in
//! the signature table. Pass 2 emits the entry prelude, any top-level
//! statements, a call into `main` (or the first declared function), `HLT`,
//! and then one body per declaration.
//!
//! # Calling convention
//!
//! - `RAX` carries the return value after `RET`.
//! - `RBX` is the allocator high-water. The caller saves it with
//!   `PUSHR RBX` *before* evaluating the arguments (the callee pops its
//!   parameters off the stack top, so the save must sit beneath them) and
//!   restores it with `POPR RBX` after the call.
//! - `RDX` holds the frame base, set from `RBX` on entry.
//! - Arguments are evaluated left-to-right; the callee pops them in
//!   reverse into freshly allocated slots starting at the base.
//!
//! # Scope discipline
//!
//! Entering a block saves the high-water (`PUSHR RBX`) and leaving
//! restores it (`POPR RBX`), reclaiming every slot allocated inside.
//! `return` / `finish` / `break` / `continue` emit one `POPR RBX` per
//! scope they jump out of, keeping the save/restore pairing balanced on
//! every control-flow path.

use crate::asm::{ArithOp, AsmWriter, CondJump, Reg};
use crate::error::{CodeGenError, Result};
use crate::scope::ScopeStack;
use alchc_ast::{Node, NodeValue, Tree};
use alchc_par::{DeclKind, FuncSig, FuncTable};
use alchc_util::{Ident, OpCode};
use tracing::warn;

/// Emit the whole program as textual stack-machine assembly.
///
/// `func_table` is the parser's signature table; declarations the parser
/// missed (e.g. a tree read from a stage file) are added during pass 1.
pub fn emit_assembly(tree: &Tree, func_table: &mut FuncTable) -> Result<String> {
    let mut backend = Backend::new(tree, func_table);
    backend.run()?;
    Ok(backend.asm.into_string())
}

/// Labels and scope depth of the innermost `while` being emitted
struct LoopCtx {
    start: String,
    end: String,
    scope_depth: usize,
}

/// Emission state for one program
pub struct Backend<'a> {
    tree: &'a Tree,
    func_table: &'a mut FuncTable,
    asm: AsmWriter,
    scopes: ScopeStack,
    loops: Vec<LoopCtx>,
    /// Monotonic label counter; never reset, labels are unique program-wide
    label_next: usize,
    /// Slot count of the active function
    offc_curr: usize,
    /// Open `VisStart` scopes in the active function
    scop_depth: usize,
}

impl<'a> Backend<'a> {
    pub fn new(tree: &'a Tree, func_table: &'a mut FuncTable) -> Self {
        Self {
            tree,
            func_table,
            asm: AsmWriter::new(),
            scopes: ScopeStack::new(),
            loops: Vec::new(),
            label_next: 0,
            offc_curr: 0,
            scop_depth: 0,
        }
    }

    fn run(&mut self) -> Result<()> {
        let items = toplevel_items(self.tree);
        let mut decls = Vec::new();
        let mut stmts = Vec::new();
        for item in items {
            match item.op() {
                Some(OpCode::FuncDecl | OpCode::ProcDecl) => decls.push(item),
                _ => stmts.push(item),
            }
        }

        // Pass 1: every declaration lands in the signature table.
        for decl in &decls {
            let (name, params, is_proc) = self.decl_header(decl)?;
            if !self.func_table.contains_key(&name) {
                let kind = if is_proc { DeclKind::Proc } else { DeclKind::Func };
                self.func_table.insert(
                    name,
                    FuncSig {
                        kind,
                        arity: params.len(),
                    },
                );
            }
        }

        let entry = self.entry_label(&decls)?;

        // Pass 2: prelude, top-level code, entry call, function bodies.
        self.asm.push_const(0.0);
        self.asm.pop_reg(Reg::Rbx);

        if !stmts.is_empty() {
            self.asm.push_reg(Reg::Rbx);
            self.asm.pop_reg(Reg::Rdx);
            self.reset_function_state();
            self.scopes.push_frame(0);
            for stmt in &stmts {
                self.emit_stmt(stmt)?;
            }
        }

        if let Some(entry) = entry {
            self.asm.call(&entry);
        }
        self.asm.hlt();

        for decl in &decls {
            self.emit_function(decl)?;
        }
        Ok(())
    }

    /// `main` when such a function is declared, else the first declaration.
    fn entry_label(&self, decls: &[&Node]) -> Result<Option<String>> {
        if decls.is_empty() {
            return Ok(None);
        }
        let main = self.tree.pool.lookup("main");
        for decl in decls {
            let (name, _, _) = self.decl_header(decl)?;
            if Some(name) == main {
                return Ok(Some("main".to_string()));
            }
        }
        let (first, _, _) = self.decl_header(decls[0])?;
        Ok(Some(self.ident_name(first)?.to_string()))
    }

    fn reset_function_state(&mut self) {
        self.scopes.clear();
        self.loops.clear();
        self.offc_curr = 0;
        self.scop_depth = 0;
    }

    /// Pull `(name, params, is_proc)` out of a declaration node.
    fn decl_header(&self, decl: &Node) -> Result<(Ident, Vec<Ident>, bool)> {
        let is_proc = decl.is_op(OpCode::ProcDecl);
        let info = decl
            .left
            .as_deref()
            .filter(|n| n.is_op(OpCode::FuncInfo))
            .ok_or(CodeGenError::MalformedDeclaration)?;
        let name = match info.right.as_deref().map(|n| n.value) {
            Some(NodeValue::Ident(id)) => id,
            _ => return Err(CodeGenError::MalformedDeclaration),
        };
        let mut params = Vec::new();
        for param in list_items(info.left.as_deref(), OpCode::EnumSep) {
            match param.value {
                NodeValue::Ident(id) => params.push(id),
                _ => return Err(CodeGenError::MalformedDeclaration),
            }
        }
        Ok((name, params, is_proc))
    }

    fn ident_name(&self, id: Ident) -> Result<&str> {
        self.tree
            .pool
            .get(id)
            .ok_or(CodeGenError::UnknownIdent(id.as_u32()))
    }

    /// Emit `:name`, prologue, body, and epilogue for one declaration.
    fn emit_function(&mut self, decl: &Node) -> Result<()> {
        let (name, params, is_proc) = self.decl_header(decl)?;
        let label = self.ident_name(name)?.to_string();

        self.asm.label(&label);
        self.reset_function_state();
        self.scopes.push_frame(0);

        // Frame base for this activation.
        self.asm.push_reg(Reg::Rbx);
        self.asm.pop_reg(Reg::Rdx);

        // Parameter slots in declaration order, then pop the pushed
        // arguments into them in reverse.
        let mut offsets = Vec::with_capacity(params.len());
        for &param in &params {
            offsets.push(self.alloc_slot(param));
        }
        for &offset in offsets.iter().rev() {
            self.emit_slot_addr(offset);
            self.asm.pop_mem(Reg::Rcx);
        }

        if let Some(body) = decl.right.as_deref() {
            self.emit_stmt(body)?;
        }

        // Fall-through epilogue; a func returns 0 by default.
        if !is_proc {
            self.asm.push_const(0.0);
            self.asm.pop_reg(Reg::Rax);
        }
        for _ in 0..self.scop_depth {
            self.asm.pop_reg(Reg::Rbx);
        }
        self.asm.ret();
        Ok(())
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    fn emit_stmt(&mut self, node: &Node) -> Result<()> {
        match node.value {
            NodeValue::Function(OpCode::Lcat) => {
                for stmt in list_items(Some(node), OpCode::Lcat) {
                    self.emit_stmt(stmt)?;
                }
            }

            NodeValue::Function(OpCode::VisStart) => {
                self.asm.push_reg(Reg::Rbx);
                self.scopes.push_frame(self.offc_curr);
                self.scop_depth += 1;
                if let Some(list) = node.right.as_deref() {
                    for stmt in list_items(Some(list), OpCode::Lcat) {
                        self.emit_stmt(stmt)?;
                    }
                }
                if let Some(frame) = self.scopes.pop_frame() {
                    self.offc_curr = frame.saved_offset;
                }
                self.scop_depth -= 1;
                self.asm.pop_reg(Reg::Rbx);
            }

            NodeValue::Function(OpCode::If) => self.emit_if(node)?,
            NodeValue::Function(OpCode::While) => self.emit_while(node)?,

            NodeValue::Function(OpCode::Return) => {
                match node.right.as_deref() {
                    Some(value) => self.emit_expr(value)?,
                    None => self.asm.push_const(0.0),
                }
                self.asm.pop_reg(Reg::Rax);
                for _ in 0..self.scop_depth {
                    self.asm.pop_reg(Reg::Rbx);
                }
                self.asm.ret();
            }

            NodeValue::Function(OpCode::Finish) => {
                for _ in 0..self.scop_depth {
                    self.asm.pop_reg(Reg::Rbx);
                }
                self.asm.ret();
            }

            NodeValue::Function(OpCode::Break) => self.emit_loop_jump(true),
            NodeValue::Function(OpCode::Continue) => self.emit_loop_jump(false),

            NodeValue::Function(OpCode::Print) => {
                match node.right.as_deref() {
                    Some(value) => self.emit_expr(value)?,
                    None => self.asm.push_const(0.0),
                }
                self.asm.out();
            }

            NodeValue::Function(OpCode::FuncDecl | OpCode::ProcDecl) => {
                warn!("nested declaration reached the backend; skipped");
            }

            // Expression-valued statement: emit and discard the residue.
            _ => {
                self.emit_expr(node)?;
                self.asm.pop();
            }
        }
        Ok(())
    }

    fn emit_if(&mut self, node: &Node) -> Result<()> {
        let n = self.next_label();
        let end = format!("ifend_{n}");

        if let Some(cond) = unwrap_if_test(node.left.as_deref()) {
            self.emit_cond_branch(cond, &end, "iftrue", n)?;
        }
        if let Some(body) = node.right.as_deref() {
            self.emit_stmt(body)?;
        }
        self.asm.label(&end);
        Ok(())
    }

    fn emit_while(&mut self, node: &Node) -> Result<()> {
        let n = self.next_label();
        let start = format!("whilestart_{n}");
        let end = format!("whileend_{n}");

        self.asm.label(&start);
        self.loops.push(LoopCtx {
            start: start.clone(),
            end: end.clone(),
            scope_depth: self.scop_depth,
        });

        if let Some(cond) = node.left.as_deref() {
            self.emit_cond_branch(cond, &end, "whiletrue", n)?;
        }
        if let Some(body) = node.right.as_deref() {
            self.emit_stmt(body)?;
        }
        self.asm.jump(&start);
        self.asm.label(&end);

        self.loops.pop();
        Ok(())
    }

    /// Branch to `end_label` when the condition is false.
    ///
    /// A comparison condition emits both operands and a conditional jump;
    /// `==`, `<`, `>` need the positive form through a `<prefix>_N` label,
    /// `!=`, `<=`, `>=` invert to a single jump. Anything else takes the
    /// generic path: evaluate, push 0, `JE` to the end.
    fn emit_cond_branch(&mut self, cond: &Node, end_label: &str, prefix: &str, n: usize) -> Result<()> {
        let comparison = match cond.value {
            NodeValue::Function(op) if op.is_comparison() => {
                match (comparison_jump(op), cond.left.as_deref(), cond.right.as_deref()) {
                    (Some(jump), Some(left), Some(right)) => Some((jump, left, right)),
                    _ => None,
                }
            }
            _ => None,
        };

        match comparison {
            Some(((jump, positive), left, right)) => {
                self.emit_expr(left)?;
                self.emit_expr(right)?;
                if positive {
                    let taken = format!("{prefix}_{n}");
                    self.asm.jump_cond(jump, &taken);
                    self.asm.jump(end_label);
                    self.asm.label(&taken);
                } else {
                    self.asm.jump_cond(jump, end_label);
                }
            }
            None => {
                self.emit_expr(cond)?;
                self.asm.push_const(0.0);
                self.asm.jump_cond(CondJump::Je, end_label);
            }
        }
        Ok(())
    }

    /// `break` / `continue`: unwind the scopes opened since the loop head,
    /// then jump.
    fn emit_loop_jump(&mut self, is_break: bool) {
        let Some(ctx) = self.loops.last() else {
            warn!("break/continue outside a loop reached the backend; skipped");
            return;
        };
        let target = if is_break {
            ctx.end.clone()
        } else {
            ctx.start.clone()
        };
        let pops = self.scop_depth.saturating_sub(ctx.scope_depth);
        for _ in 0..pops {
            self.asm.pop_reg(Reg::Rbx);
        }
        self.asm.jump(&target);
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    fn emit_expr(&mut self, node: &Node) -> Result<()> {
        match node.value {
            NodeValue::Constant(value) => self.asm.push_const(value),

            NodeValue::Ident(id) => {
                let offset = self.slot_of(id);
                self.emit_slot_addr(offset);
                self.asm.push_mem(Reg::Rcx);
            }

            NodeValue::Function(op) => match op {
                op if op.is_arithmetic() || op == OpCode::Pow => {
                    match (node.left.as_deref(), node.right.as_deref()) {
                        (Some(left), Some(right)) => {
                            self.emit_expr(left)?;
                            self.emit_expr(right)?;
                            self.asm.arith(arith_of(op));
                        }
                        // Unary minus: 0 - operand.
                        (None, Some(operand)) if op == OpCode::Minus => {
                            self.asm.push_const(0.0);
                            self.emit_expr(operand)?;
                            self.asm.arith(ArithOp::Sub);
                        }
                        (None, Some(operand)) if op == OpCode::Plus => {
                            self.emit_expr(operand)?;
                        }
                        _ => {
                            warn!(op = %op, "arithmetic node missing operands; pushing 0");
                            self.asm.push_const(0.0);
                        }
                    }
                }

                OpCode::Assign => self.emit_assign(node)?,
                OpCode::Call => self.emit_call(node)?,
                OpCode::Input => self.asm.input(),

                // `OUT` consumes the operand; the surrounding expression
                // still needs a residual value.
                OpCode::Print => {
                    match node.right.as_deref() {
                        Some(value) => self.emit_expr(value)?,
                        None => self.asm.push_const(0.0),
                    }
                    self.asm.out();
                    self.asm.push_const(0.0);
                }

                _ => {
                    warn!(op = %op, "no value emission for construct; pushing 0");
                    self.asm.push_const(0.0);
                }
            },
        }
        Ok(())
    }

    /// Assignments are expressions: store the right-hand side, then reload
    /// the slot as the residual value.
    fn emit_assign(&mut self, node: &Node) -> Result<()> {
        match node.right.as_deref() {
            Some(rhs) => self.emit_expr(rhs)?,
            None => self.asm.push_const(0.0),
        }

        match node.left.as_deref().map(|n| n.value) {
            Some(NodeValue::Ident(id)) => {
                let offset = self.slot_of(id);
                self.emit_slot_addr(offset);
                self.asm.pop_mem(Reg::Rcx);
                self.emit_slot_addr(offset);
                self.asm.push_mem(Reg::Rcx);
            }
            _ => {
                warn!("assignment target is not a variable; value left on the stack");
            }
        }
        Ok(())
    }

    fn emit_call(&mut self, node: &Node) -> Result<()> {
        let info = node
            .left
            .as_deref()
            .filter(|n| n.is_op(OpCode::FuncInfo))
            .ok_or(CodeGenError::MalformedCall)?;
        let name = match info.right.as_deref().map(|n| n.value) {
            Some(NodeValue::Ident(id)) => id,
            _ => return Err(CodeGenError::MalformedCall),
        };
        let label = self.ident_name(name)?.to_string();
        let Some(sig) = self.func_table.get(&name).copied() else {
            return Err(CodeGenError::UndeclaredFunction(label));
        };

        // Save the allocator high-water beneath the arguments.
        self.asm.push_reg(Reg::Rbx);
        for arg in list_items(info.left.as_deref(), OpCode::EnumSep) {
            self.emit_expr(arg)?;
        }
        self.asm.call(&label);
        self.asm.pop_reg(Reg::Rbx);

        if sig.kind == DeclKind::Proc {
            self.asm.push_const(0.0);
        } else {
            self.asm.push_reg(Reg::Rax);
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Slots
    // ------------------------------------------------------------------

    /// Slot offset for `id`; the first reference in a function allocates.
    fn slot_of(&mut self, id: Ident) -> usize {
        match self.scopes.lookup(id) {
            Some(offset) => offset,
            None => self.alloc_slot(id),
        }
    }

    /// Grow the high-water one slot, zero-initialise it, and record it in
    /// the innermost scope frame.
    fn alloc_slot(&mut self, id: Ident) -> usize {
        let offset = self.offc_curr;
        self.offc_curr += 1;
        self.scopes.insert(id, offset);

        self.asm.push_reg(Reg::Rbx);
        self.asm.push_int(1);
        self.asm.arith(ArithOp::Add);
        self.asm.pop_reg(Reg::Rbx);

        self.asm.push_const(0.0);
        self.emit_slot_addr(offset);
        self.asm.pop_mem(Reg::Rcx);

        offset
    }

    /// Stage `base + offset` into `RCX`.
    fn emit_slot_addr(&mut self, offset: usize) {
        self.asm.push_reg(Reg::Rdx);
        self.asm.push_int(offset);
        self.asm.arith(ArithOp::Add);
        self.asm.pop_reg(Reg::Rcx);
    }

    fn next_label(&mut self) -> usize {
        let n = self.label_next;
        self.label_next += 1;
        n
    }
}

/// The parser normalises every `if` test to `Eq(cond, 1.0)`; unwrap that
/// layer so the comparison dispatch sees the user's condition.
fn unwrap_if_test(test: Option<&Node>) -> Option<&Node> {
    let test = test?;
    if test.is_op(OpCode::Eq) {
        if let (Some(left), Some(right)) = (test.left.as_deref(), test.right.as_deref()) {
            if right.value == NodeValue::Constant(1.0) {
                return Some(left);
            }
        }
    }
    Some(test)
}

/// Jump instruction and polarity per comparison: `true` means the jump is
/// taken when the condition holds (positive form via a local label).
fn comparison_jump(op: OpCode) -> Option<(CondJump, bool)> {
    match op {
        OpCode::Eq => Some((CondJump::Je, true)),
        OpCode::Lt => Some((CondJump::Jb, true)),
        OpCode::Gt => Some((CondJump::Ja, true)),
        OpCode::Neq => Some((CondJump::Je, false)),
        OpCode::Le => Some((CondJump::Ja, false)),
        OpCode::Ge => Some((CondJump::Jb, false)),
        _ => None,
    }
}

fn arith_of(op: OpCode) -> ArithOp {
    match op {
        OpCode::Plus => ArithOp::Add,
        OpCode::Minus => ArithOp::Sub,
        OpCode::Mul => ArithOp::Mult,
        OpCode::Pow => ArithOp::Pow,
        _ => ArithOp::Del,
    }
}

/// Flatten a right-leaning spine into its items.
fn list_items<'t>(node: Option<&'t Node>, op: OpCode) -> Vec<&'t Node> {
    let mut items = Vec::new();
    let mut cursor = node;
    while let Some(n) = cursor {
        if n.is_op(op) {
            if let Some(left) = n.left.as_deref() {
                items.push(left);
            }
            cursor = n.right.as_deref();
        } else {
            items.push(n);
            cursor = None;
        }
    }
    items
}

/// Top-level items: the spine under the root `VisStart`.
fn toplevel_items(tree: &Tree) -> Vec<&Node> {
    match tree.root.as_deref() {
        None => Vec::new(),
        Some(root) if root.is_op(OpCode::VisStart) => {
            list_items(root.right.as_deref(), OpCode::Lcat)
        }
        Some(root) => vec![root],
    }
}
