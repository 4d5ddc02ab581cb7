use std::fmt::Display;

use strum_macros::{Display, EnumIter, EnumString, IntoStaticStr};

/// Position of an instruction within the loaded program, starting at 1
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InstructionId(pub u32);

impl Display for InstructionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "I{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, IntoStaticStr)]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum Opcode {
    // Register-register
    Add,
    Sub,
    And,
    Or,
    Nor,
    Xor,
    Slt,
    Sltu,
    // Register-immediate
    Addi,
    Andi,
    Ori,
    Xori,
    Slti,
    // Memory
    Lw,
    Sw,
    Lh,
    Lhu,
    Lbu,
    Lb,
    Sh,
    Sb,
    Lui,
    // Branches
    Beq,
    Bne,
    Bltz,
    Bgtz,
    Blez,
    Bgez,
    // Jumps
    J,
    Jr,
    Jal,
    // Pseudo operations, only used by the built-in program
    Li,
    La,
    Syscall,
}

/// Operand layout of an instruction family
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandFormat {
    /// rd, rs, rt
    RegisterRegister,
    /// rt, rs, immediate
    RegisterImmediate,
    /// rt, immediate(rs)
    Memory,
    /// rt, immediate
    LoadUpper,
    /// rs, rt, offset
    BranchEqual,
    /// rs, offset
    BranchZero,
    /// target
    Jump,
    /// rs
    JumpRegister,
    /// Not accepted by the parser
    Pseudo,
}

impl OperandFormat {
    /// Minimum number of operand tokens the parser needs
    pub fn operand_count(self) -> usize {
        match self {
            Self::RegisterRegister | Self::RegisterImmediate | Self::BranchEqual => 3,
            Self::Memory | Self::LoadUpper | Self::BranchZero => 2,
            Self::Jump | Self::JumpRegister => 1,
            Self::Pseudo => 0,
        }
    }
}

/// Display grouping of an opcode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter)]
pub enum Category {
    #[strum(serialize = "arith")]
    Arithmetic,
    #[strum(serialize = "mem")]
    Memory,
    #[strum(serialize = "branch")]
    Branch,
    #[strum(serialize = "jump")]
    Jump,
    #[strum(serialize = "sys")]
    System,
    #[strum(serialize = "unknown")]
    Unknown,
}

impl Opcode {
    pub fn format(self) -> OperandFormat {
        match self {
            Opcode::Add
            | Opcode::Sub
            | Opcode::And
            | Opcode::Or
            | Opcode::Nor
            | Opcode::Xor
            | Opcode::Slt
            | Opcode::Sltu => OperandFormat::RegisterRegister,
            Opcode::Addi | Opcode::Andi | Opcode::Ori | Opcode::Xori | Opcode::Slti => {
                OperandFormat::RegisterImmediate
            }
            Opcode::Lw
            | Opcode::Sw
            | Opcode::Lh
            | Opcode::Lhu
            | Opcode::Lbu
            | Opcode::Lb
            | Opcode::Sh
            | Opcode::Sb => OperandFormat::Memory,
            Opcode::Lui => OperandFormat::LoadUpper,
            Opcode::Beq | Opcode::Bne => OperandFormat::BranchEqual,
            Opcode::Bltz | Opcode::Bgtz | Opcode::Blez | Opcode::Bgez => OperandFormat::BranchZero,
            Opcode::J | Opcode::Jal => OperandFormat::Jump,
            Opcode::Jr => OperandFormat::JumpRegister,
            Opcode::Li | Opcode::La | Opcode::Syscall => OperandFormat::Pseudo,
        }
    }

    pub fn category(self) -> Category {
        match self.format() {
            OperandFormat::RegisterRegister | OperandFormat::RegisterImmediate => {
                Category::Arithmetic
            }
            OperandFormat::Memory | OperandFormat::LoadUpper => Category::Memory,
            OperandFormat::BranchEqual | OperandFormat::BranchZero => Category::Branch,
            OperandFormat::Jump | OperandFormat::JumpRegister => Category::Jump,
            OperandFormat::Pseudo => match self {
                Opcode::Li => Category::Arithmetic,
                Opcode::La => Category::Memory,
                Opcode::Syscall => Category::System,
                _ => Category::Unknown,
            },
        }
    }

    /// Loads write their `rt` operand
    pub fn is_load(self) -> bool {
        matches!(
            self,
            Opcode::Lw | Opcode::Lh | Opcode::Lhu | Opcode::Lb | Opcode::Lbu
        )
    }

    pub fn is_store(self) -> bool {
        matches!(self, Opcode::Sw | Opcode::Sh | Opcode::Sb)
    }
}

/// A register name such as `R2` or `V0`, normalized so that `$v0` and `V0` match
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Register(String);

impl Register {
    pub fn new(name: &str) -> Self {
        let name = name.trim();
        let name = name.strip_prefix('$').unwrap_or(name);
        Self(name.to_ascii_uppercase())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl Display for Register {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A decoded instruction. Never modified once it has been handed to the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    pub id: InstructionId,
    pub opcode: Opcode,
    pub category: Category,
    pub rd: Option<Register>,
    pub rs: Option<Register>,
    pub rt: Option<Register>,
    pub immediate: Option<i32>,
    pub target: Option<String>,
    /// The source text the instruction came from, comments stripped
    pub source: String,
}

impl Instruction {
    pub fn new(id: u32, opcode: Opcode) -> Self {
        Self {
            id: InstructionId(id),
            opcode,
            category: opcode.category(),
            rd: None,
            rs: None,
            rt: None,
            immediate: None,
            target: None,
            source: String::new(),
        }
    }

    #[must_use]
    pub fn with_rd(mut self, name: &str) -> Self {
        self.rd = Some(Register::new(name));
        self
    }

    #[must_use]
    pub fn with_rs(mut self, name: &str) -> Self {
        self.rs = Some(Register::new(name));
        self
    }

    #[must_use]
    pub fn with_rt(mut self, name: &str) -> Self {
        self.rt = Some(Register::new(name));
        self
    }

    #[must_use]
    pub fn with_immediate(mut self, immediate: i32) -> Self {
        self.immediate = Some(immediate);
        self
    }

    #[must_use]
    pub fn with_target(mut self, target: &str) -> Self {
        self.target = Some(target.to_owned());
        self
    }

    #[must_use]
    pub fn with_source(mut self, source: &str) -> Self {
        self.source = source.to_owned();
        self
    }

    /// Registers this instruction reads
    pub fn src_regs(&self) -> Vec<&Register> {
        // stores read both rt (the data) and rs (the base), same as everything else
        [self.rs.as_ref(), self.rt.as_ref()]
            .into_iter()
            .flatten()
            .collect()
    }

    /// Registers this instruction writes
    pub fn dest_regs(&self) -> Vec<&Register> {
        let mut regs: Vec<&Register> = self.rd.iter().collect();
        if self.opcode.is_load() {
            regs.extend(self.rt.as_ref());
        }
        regs
    }

    /// Short form used by the stage displays, e.g. `LW I5`
    pub fn label(&self) -> String {
        format!("{} {}", self.opcode, self.id)
    }
}

/// Finds an instruction by id. Missing ids are not an error.
pub fn lookup(instructions: &[Instruction], id: InstructionId) -> Option<&Instruction> {
    instructions.iter().find(|instr| instr.id == id)
}

fn fmt_reg(reg: Option<&Register>) -> String {
    reg.map_or_else(|| "?".to_owned(), ToString::to_string)
}

fn fmt_offset(instr: &Instruction) -> String {
    match (instr.immediate, &instr.target) {
        (Some(imm), _) => imm.to_string(),
        (None, Some(target)) => target.clone(),
        (None, None) => "0".to_owned(),
    }
}

impl Display for Instruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let op = self.opcode;
        let (rd, rs, rt) = (
            fmt_reg(self.rd.as_ref()),
            fmt_reg(self.rs.as_ref()),
            fmt_reg(self.rt.as_ref()),
        );
        match op.format() {
            OperandFormat::RegisterRegister => write!(f, "{op} {rd}, {rs}, {rt}"),
            OperandFormat::RegisterImmediate => {
                write!(f, "{op} {rt}, {rs}, {}", self.immediate.unwrap_or_default())
            }
            OperandFormat::Memory => match self.rs {
                Some(_) => write!(f, "{op} {rt}, {}({rs})", self.immediate.unwrap_or_default()),
                None => write!(f, "{op} {rt}, {}", self.immediate.unwrap_or_default()),
            },
            OperandFormat::LoadUpper => {
                write!(f, "{op} {rt}, {}", self.immediate.unwrap_or_default())
            }
            OperandFormat::BranchEqual => write!(f, "{op} {rs}, {rt}, {}", fmt_offset(self)),
            OperandFormat::BranchZero => write!(f, "{op} {rs}, {}", fmt_offset(self)),
            OperandFormat::Jump => {
                write!(f, "{op} {}", self.target.as_deref().unwrap_or("?"))
            }
            OperandFormat::JumpRegister => write!(f, "{op} {rs}"),
            OperandFormat::Pseudo => match (op, &self.rt, self.immediate) {
                (Opcode::Li, _, Some(imm)) => write!(f, "{op} {rt}, {imm}"),
                (_, Some(_), _) => write!(f, "{op} {rt}"),
                _ => write!(f, "{op}"),
            },
        }
    }
}
