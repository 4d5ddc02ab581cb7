use crate::instruction::instruction::{Instruction, Opcode};

/// The demo program loaded before any user code: a menu loop that prints a
/// title, bumps a counter, then loads and uses a value (the RAW hazard on R2)
/// before branching back.
pub fn reference_program() -> Vec<Instruction> {
    vec![
        Instruction::new(1, Opcode::Li)
            .with_rt("V0")
            .with_immediate(4)
            .with_source("LI $V0, 4        ; Load System Call (Print String)"),
        Instruction::new(2, Opcode::La)
            .with_rt("A0")
            .with_source("LA $A0, title    ; Load Title Address"),
        Instruction::new(3, Opcode::Syscall)
            .with_source("SYSCALL          ; Display Project Title"),
        Instruction::new(4, Opcode::Addi)
            .with_rt("R1")
            .with_rs("R1")
            .with_immediate(1)
            .with_source("ADDI R1, R1, 1   ; Increment Cycle Counter"),
        Instruction::new(5, Opcode::Lw)
            .with_rt("R2")
            .with_rs("R1")
            .with_immediate(0)
            .with_source("LW R2, 0(R1)     ; Data Load (Potential RAW Hazard)"),
        Instruction::new(6, Opcode::Add)
            .with_rd("R4")
            .with_rs("R2")
            .with_rt("R3")
            .with_source("ADD R4, R2, R3   ; ALU Operation (RAW on R2)"),
        Instruction::new(7, Opcode::Beq)
            .with_rs("R4")
            .with_rt("R0")
            .with_immediate(-3)
            .with_source("BEQ R4, R0, LOOP ; Branch Control Hazard"),
    ]
}
