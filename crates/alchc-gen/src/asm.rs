//! Assembly surface - registers, mnemonics, and the instruction writer.
//!
//! The target is a textual stack machine: a value stack for operands, four
//! named registers, and a linear memory addressed through a register.
//! Everything the backend says about the machine goes through
//! [`AsmWriter`], one instruction per line.
//!
//! Register roles:
//!
//! - `RAX` - function return value
//! - `RBX` - allocator high-water (next unused memory index)
//! - `RCX` - scratch for staged slot addresses
//! - `RDX` - current frame base

use alchc_ast::format_constant;
use std::fmt::Write as _;

/// General registers of the target machine
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Reg {
    Rax,
    Rbx,
    Rcx,
    Rdx,
}

impl Reg {
    pub fn name(self) -> &'static str {
        match self {
            Reg::Rax => "RAX",
            Reg::Rbx => "RBX",
            Reg::Rcx => "RCX",
            Reg::Rdx => "RDX",
        }
    }
}

/// Stack arithmetic mnemonics
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mult,
    Del,
    Pow,
}

impl ArithOp {
    pub fn mnemonic(self) -> &'static str {
        match self {
            ArithOp::Add => "ADD",
            ArithOp::Sub => "SUB",
            ArithOp::Mult => "MULT",
            ArithOp::Del => "DEL",
            ArithOp::Pow => "POW",
        }
    }
}

/// Conditional jumps; the operands are popped off the value stack
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CondJump {
    /// Jump if the operands are equal
    Je,
    /// Jump if the first pushed operand is above the second
    Ja,
    /// Jump if the first pushed operand is below the second
    Jb,
}

impl CondJump {
    pub fn mnemonic(self) -> &'static str {
        match self {
            CondJump::Je => "JE",
            CondJump::Ja => "JA",
            CondJump::Jb => "JB",
        }
    }
}

/// Text writer emitting one instruction per line
#[derive(Debug, Default)]
pub struct AsmWriter {
    out: String,
}

impl AsmWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn as_str(&self) -> &str {
        &self.out
    }

    pub fn into_string(self) -> String {
        self.out
    }

    fn line(&mut self, text: &str) {
        self.out.push_str(text);
        self.out.push('\n');
    }

    /// `PUSH n` - numeric literal
    pub fn push_const(&mut self, value: f64) {
        let _ = writeln!(self.out, "PUSH {}", format_constant(value));
    }

    /// `PUSH n` - slot offsets and other small integers
    pub fn push_int(&mut self, value: usize) {
        let _ = writeln!(self.out, "PUSH {value}");
    }

    /// `PUSHR R`
    pub fn push_reg(&mut self, reg: Reg) {
        let _ = writeln!(self.out, "PUSHR {}", reg.name());
    }

    /// `POPR R`
    pub fn pop_reg(&mut self, reg: Reg) {
        let _ = writeln!(self.out, "POPR {}", reg.name());
    }

    /// `PUSHM [R]`
    pub fn push_mem(&mut self, reg: Reg) {
        let _ = writeln!(self.out, "PUSHM [{}]", reg.name());
    }

    /// `POPM [R]`
    pub fn pop_mem(&mut self, reg: Reg) {
        let _ = writeln!(self.out, "POPM [{}]", reg.name());
    }

    pub fn arith(&mut self, op: ArithOp) {
        self.line(op.mnemonic());
    }

    /// `OUT` - pop and print
    pub fn out(&mut self) {
        self.line("OUT");
    }

    /// `IN` - read and push
    pub fn input(&mut self) {
        self.line("IN");
    }

    /// `POP` - discard the top of the value stack
    pub fn pop(&mut self) {
        self.line("POP");
    }

    /// `JUMP :label`
    pub fn jump(&mut self, label: &str) {
        let _ = writeln!(self.out, "JUMP :{label}");
    }

    /// `JE|JA|JB :label`
    pub fn jump_cond(&mut self, cond: CondJump, label: &str) {
        let _ = writeln!(self.out, "{} :{label}", cond.mnemonic());
    }

    /// `CALL :label`
    pub fn call(&mut self, label: &str) {
        let _ = writeln!(self.out, "CALL :{label}");
    }

    pub fn ret(&mut self) {
        self.line("RET");
    }

    pub fn hlt(&mut self) {
        self.line("HLT");
    }

    /// `:label` definition
    pub fn label(&mut self, name: &str) {
        let _ = writeln!(self.out, ":{name}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_lines() {
        let mut asm = AsmWriter::new();
        asm.push_const(1.0);
        asm.push_const(2.5);
        asm.arith(ArithOp::Add);
        asm.pop();
        assert_eq!(asm.as_str(), "PUSH 1\nPUSH 2.5\nADD\nPOP\n");
    }

    #[test]
    fn test_registers_and_memory() {
        let mut asm = AsmWriter::new();
        asm.push_reg(Reg::Rdx);
        asm.push_int(3);
        asm.arith(ArithOp::Add);
        asm.pop_reg(Reg::Rcx);
        asm.push_mem(Reg::Rcx);
        assert_eq!(
            asm.as_str(),
            "PUSHR RDX\nPUSH 3\nADD\nPOPR RCX\nPUSHM [RCX]\n"
        );
    }

    #[test]
    fn test_labels_and_jumps() {
        let mut asm = AsmWriter::new();
        asm.label("main");
        asm.jump_cond(CondJump::Je, "ifend_0");
        asm.jump("whilestart_1");
        asm.call("main");
        asm.ret();
        asm.hlt();
        assert_eq!(
            asm.as_str(),
            ":main\nJE :ifend_0\nJUMP :whilestart_1\nCALL :main\nRET\nHLT\n"
        );
    }
}
