use crate::instruction::instruction::{Instruction, InstructionId};
use crate::system::state::{Cycle, CycleSnapshot, Stage};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimelineRow {
    pub instruction: InstructionId,
    pub text: String,
    /// Stage held in each traced cycle, `None` when not in the pipe
    pub cells: Vec<Option<Stage>>,
}

/// Instruction-by-cycle occupancy grid rebuilt from the cycle trace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timeline {
    /// Cycle number of each column
    pub cycles: Vec<Cycle>,
    pub rows: Vec<TimelineRow>,
}

impl Timeline {
    /// Uses at most `width` of the oldest trace entries
    pub fn build(trace: &[CycleSnapshot], instructions: &[Instruction], width: usize) -> Self {
        let columns = &trace[..trace.len().min(width)];
        let rows = instructions
            .iter()
            .map(|instr| TimelineRow {
                instruction: instr.id,
                text: if instr.source.is_empty() {
                    instr.to_string()
                } else {
                    instr.source.clone()
                },
                cells: columns
                    .iter()
                    .map(|snapshot| snapshot.stage_of(instr.id))
                    .collect(),
            })
            .collect();

        Self {
            cycles: columns.iter().map(|snapshot| snapshot.cycle).collect(),
            rows,
        }
    }
}
