use {
    crate::registers::Register,
    std::{fmt, io},
};

#[derive(PartialEq, Eq, Clone, Debug)]
pub struct Label(String);

impl Label {
    pub fn named(name: &str) -> Label {
        Label(String::from(name))
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One line of the listing: an instruction or directive with up to three operands, or a label
/// ending in a colon.
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct Instruction {
    pub mnemonic: String,
    pub operands: Vec<String>,
}

impl Instruction {
    pub fn new(mnemonic: &str, operands: Vec<String>) -> Instruction {
        debug_assert!(operands.len() <= 3);
        Instruction {
            mnemonic: String::from(mnemonic),
            operands,
        }
    }

    pub fn label(label: &Label) -> Instruction {
        Instruction {
            mnemonic: format!("{}:", label),
            operands: vec![],
        }
    }

    pub fn is_label(&self) -> bool {
        self.mnemonic.ends_with(':')
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if !self.is_label() && !self.mnemonic.starts_with('.') {
            write!(f, "    ")?;
        }

        write!(f, "{}", self.mnemonic)?;
        for (i, operand) in self.operands.iter().enumerate() {
            write!(f, "{}{}", if i == 0 { " " } else { ", " }, operand)?;
        }
        Ok(())
    }
}

/// `offset(base)` addressing.
pub fn memory(offset: i32, base: Register) -> String {
    format!("{}({})", offset, base)
}

/// The listing being built, in order.
#[derive(Debug, Default)]
pub struct CodeTable {
    instructions: Vec<Instruction>,
    label_count: usize,
}

impl CodeTable {
    pub fn new() -> CodeTable {
        CodeTable::default()
    }

    pub fn push(&mut self, instruction: Instruction) {
        self.instructions.push(instruction);
    }

    pub fn op0(&mut self, mnemonic: &str) {
        self.push(Instruction::new(mnemonic, vec![]));
    }

    pub fn op1(&mut self, mnemonic: &str, a: impl fmt::Display) {
        self.push(Instruction::new(mnemonic, vec![a.to_string()]));
    }

    pub fn op2(&mut self, mnemonic: &str, a: impl fmt::Display, b: impl fmt::Display) {
        self.push(Instruction::new(mnemonic, vec![a.to_string(), b.to_string()]));
    }

    pub fn op3(
        &mut self,
        mnemonic: &str,
        a: impl fmt::Display,
        b: impl fmt::Display,
        c: impl fmt::Display,
    ) {
        self.push(Instruction::new(
            mnemonic,
            vec![a.to_string(), b.to_string(), c.to_string()],
        ));
    }

    /// A label no other call has produced, e.g. `.L4_while`.
    pub fn new_label(&mut self, suffix: &str) -> Label {
        let label = Label(format!(".L{}{}", self.label_count, suffix));
        self.label_count += 1;
        label
    }

    pub fn place_label(&mut self, label: &Label) {
        self.push(Instruction::label(label));
    }

    pub fn addiu(&mut self, dest: Register, src: Register, immediate: i32) {
        self.op3("addiu", dest, src, immediate);
    }

    pub fn branch(&mut self, label: &Label) {
        self.op1("b", label);
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    pub fn write_to(&self, out: &mut impl io::Write) -> io::Result<()> {
        for instruction in self.instructions.iter() {
            writeln!(out, "{}", instruction)?;
        }
        Ok(())
    }
}

impl fmt::Display for CodeTable {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for instruction in self.instructions.iter() {
            writeln!(f, "{}", instruction)?;
        }
        Ok(())
    }
}

#[derive(PartialEq, Eq, Clone, Debug)]
pub struct LoopLabels {
    pub start: Label,
    pub done: Label,

    /// Stack offset when the loop was entered. A `break` unwinds back to it.
    pub stack_offset: i32,
}

/// Labels of the loops enclosing the code being generated, innermost last.
#[derive(Debug, Default)]
pub struct LoopStack {
    loops: Vec<LoopLabels>,
}

impl LoopStack {
    pub fn push(&mut self, labels: LoopLabels) {
        self.loops.push(labels);
    }

    pub fn pop(&mut self) -> Option<LoopLabels> {
        self.loops.pop()
    }

    pub fn innermost(&self) -> Option<&LoopLabels> {
        self.loops.last()
    }

    pub fn depth(&self) -> usize {
        self.loops.len()
    }
}
