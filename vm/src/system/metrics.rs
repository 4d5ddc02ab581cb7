use crate::system::state::{Cycle, Resolution, SimulationState};

/// Summary numbers shown next to the pipeline
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerformanceMetrics {
    pub total_cycles: Cycle,
    pub instruction_count: usize,
    /// Instructions fetched so far
    pub fetched: usize,
    pub stall_count: usize,
    pub hazard_count: usize,
    /// Cycles per instruction, `None` for an empty program
    pub cpi: Option<f64>,
    pub non_pipelined_cpi: f64,
    /// `non_pipelined_cpi / cpi`, `None` until a cycle has run
    pub speedup: Option<f64>,
}

impl PerformanceMetrics {
    #[allow(clippy::cast_precision_loss)]
    pub fn collect(state: &SimulationState, instruction_count: usize, non_pipelined_cpi: f64) -> Self {
        let cpi = (instruction_count > 0).then(|| state.cycle as f64 / instruction_count as f64);
        let speedup = cpi.filter(|cpi| *cpi > 0.0).map(|cpi| non_pipelined_cpi / cpi);
        let stall_count = state
            .hazard_events
            .iter()
            .filter(|event| event.resolution == Resolution::StallInserted)
            .count();

        Self {
            total_cycles: state.cycle,
            instruction_count,
            fetched: state.instruction_pointer,
            stall_count,
            hazard_count: state.hazard_events.len(),
            cpi,
            non_pipelined_cpi,
            speedup,
        }
    }
}
