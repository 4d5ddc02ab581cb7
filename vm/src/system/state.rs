use std::fmt::Display;

use strum_macros::{Display, EnumIter};

use crate::instruction::instruction::InstructionId;

pub type Cycle = usize;

pub const STAGE_COUNT: usize = 5;

#[derive(Debug, Clone, Copy, Eq, PartialEq, PartialOrd, Ord, Hash, Display, EnumIter)]
pub enum Stage {
    #[strum(serialize = "IF")]
    Fetch,
    #[strum(serialize = "ID")]
    Decode,
    #[strum(serialize = "EX")]
    Execute,
    #[strum(serialize = "MEM")]
    Memory,
    #[strum(serialize = "WB")]
    WriteBack,
}

impl Stage {
    pub fn index(self) -> usize {
        self as usize
    }

    /// Results are far enough along to be forwarded
    pub fn can_forward(self) -> bool {
        matches!(self, Stage::Memory | Stage::WriteBack)
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Default, Display)]
pub enum Status {
    #[default]
    #[strum(serialize = "IDLE")]
    Idle,
    #[strum(serialize = "RUNNING")]
    Running,
    #[strum(serialize = "PAUSED")]
    Paused,
    #[strum(serialize = "COMPLETE")]
    Complete,
}

impl Status {
    /// Legal moves: idle -> running -> {paused, complete}, paused -> running.
    /// A paused run single-stepped to its end may also complete.
    /// Going back to idle is a reset and isn't checked here.
    pub fn can_transition_to(self, next: Status) -> bool {
        matches!(
            (self, next),
            (Status::Idle | Status::Paused, Status::Running)
                | (Status::Running, Status::Paused)
                | (Status::Running | Status::Paused, Status::Complete)
        )
    }
}

/// Annotation carried along with an instruction as it moves down the pipe
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum HazardTag {
    Stall,
    /// Value forwarded from the producer sitting in this stage
    Forward(Stage),
}

impl Display for HazardTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HazardTag::Stall => write!(f, "STALL"),
            HazardTag::Forward(stage) => write!(f, "FWD-{stage}"),
        }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct StageSlot {
    pub stage: Stage,
    pub instruction: Option<InstructionId>,
    pub hazard: Option<HazardTag>,
    pub stalled: bool,
}

impl StageSlot {
    pub fn empty(stage: Stage) -> Self {
        Self {
            stage,
            instruction: None,
            hazard: None,
            stalled: false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.instruction.is_none()
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Display)]
pub enum HazardKind {
    #[strum(serialize = "RAW")]
    ReadAfterWrite,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Display)]
pub enum Resolution {
    #[strum(serialize = "Stall inserted")]
    StallInserted,
}

/// One entry of the hazard log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HazardEvent {
    pub cycle: Cycle,
    pub kind: HazardKind,
    /// The instruction that had to wait
    pub instruction: InstructionId,
    pub producer: InstructionId,
    pub description: String,
    pub resolution: Resolution,
}

/// The pipeline as it looked at the start of a cycle. History entries are
/// plain values and never change once recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleSnapshot {
    pub cycle: Cycle,
    pub status: Status,
    pub instruction_pointer: usize,
    pub stall_counter: usize,
    pub slots: [StageSlot; STAGE_COUNT],
}

impl CycleSnapshot {
    /// Stage occupied by `id` in this snapshot, searching IF to WB
    pub fn stage_of(&self, id: InstructionId) -> Option<Stage> {
        self.slots
            .iter()
            .find(|slot| slot.instruction == Some(id))
            .map(|slot| slot.stage)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulationState {
    pub cycle: Cycle,
    pub status: Status,
    pub slots: [StageSlot; STAGE_COUNT],
    /// Index of the next instruction to fetch
    pub instruction_pointer: usize,
    /// Stall cycles still to be served
    pub stall_counter: usize,
    pub hazard_events: Vec<HazardEvent>,
    pub cycle_trace: Vec<CycleSnapshot>,
}

impl Default for SimulationState {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulationState {
    pub fn new() -> Self {
        Self {
            cycle: 0,
            status: Status::Idle,
            slots: [
                StageSlot::empty(Stage::Fetch),
                StageSlot::empty(Stage::Decode),
                StageSlot::empty(Stage::Execute),
                StageSlot::empty(Stage::Memory),
                StageSlot::empty(Stage::WriteBack),
            ],
            instruction_pointer: 0,
            stall_counter: 0,
            hazard_events: Vec::new(),
            cycle_trace: Vec::new(),
        }
    }

    pub fn slot(&self, stage: Stage) -> &StageSlot {
        &self.slots[stage.index()]
    }

    pub fn slot_mut(&mut self, stage: Stage) -> &mut StageSlot {
        &mut self.slots[stage.index()]
    }

    pub fn is_pipeline_empty(&self) -> bool {
        self.slots.iter().all(StageSlot::is_empty)
    }

    pub fn snapshot(&self) -> CycleSnapshot {
        CycleSnapshot {
            cycle: self.cycle,
            status: self.status,
            instruction_pointer: self.instruction_pointer,
            stall_counter: self.stall_counter,
            slots: self.slots,
        }
    }

    /// Moves every occupant one stage further, returning whatever left WB.
    /// IF is left empty.
    pub(crate) fn shift(&mut self) -> Option<InstructionId> {
        let retired = self.slots[Stage::WriteBack.index()].instruction.take();
        for idx in (1..STAGE_COUNT).rev() {
            let (earlier, later) = self.slots.split_at_mut(idx);
            let from = &mut earlier[idx - 1];
            let to = &mut later[0];
            to.instruction = from.instruction.take();
            to.hazard = from.hazard.take();
        }
        retired
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use strum::IntoEnumIterator;

    #[test]
    fn fresh_state_is_idle_and_empty() {
        let state = SimulationState::new();
        assert_eq!(state.status, Status::Idle);
        assert!(state.is_pipeline_empty());
        let stages: Vec<_> = state.slots.iter().map(|slot| slot.stage).collect();
        assert_eq!(stages, Stage::iter().collect::<Vec<_>>());
    }

    #[test]
    fn shift_moves_everything_down_one() {
        let mut state = SimulationState::new();
        for (n, slot) in state.slots.iter_mut().enumerate() {
            slot.instruction = Some(InstructionId(u32::try_from(n).unwrap() + 1));
        }
        state.slot_mut(Stage::Decode).hazard = Some(HazardTag::Stall);

        let retired = state.shift();

        assert_eq!(retired, Some(InstructionId(5)));
        let occupants: Vec<_> = state.slots.iter().map(|slot| slot.instruction).collect();
        assert_eq!(
            occupants,
            vec![
                None,
                Some(InstructionId(1)),
                Some(InstructionId(2)),
                Some(InstructionId(3)),
                Some(InstructionId(4)),
            ]
        );
        assert_eq!(state.slot(Stage::Execute).hazard, Some(HazardTag::Stall));
        assert_eq!(state.slot(Stage::Decode).hazard, None);
    }

    #[test]
    fn snapshots_are_detached_from_the_live_state() {
        let mut state = SimulationState::new();
        state.slot_mut(Stage::Fetch).instruction = Some(InstructionId(1));
        let snapshot = state.snapshot();
        state.shift();
        assert_eq!(snapshot.stage_of(InstructionId(1)), Some(Stage::Fetch));
        assert_eq!(state.snapshot().stage_of(InstructionId(1)), Some(Stage::Decode));
    }

    #[test]
    fn status_transitions() {
        assert!(Status::Idle.can_transition_to(Status::Running));
        assert!(Status::Running.can_transition_to(Status::Paused));
        assert!(Status::Paused.can_transition_to(Status::Running));
        assert!(Status::Running.can_transition_to(Status::Complete));
        assert!(!Status::Complete.can_transition_to(Status::Running));
        assert!(!Status::Idle.can_transition_to(Status::Paused));
        assert!(Status::Paused.can_transition_to(Status::Complete));
        assert!(!Status::Idle.can_transition_to(Status::Complete));
    }

    #[test]
    fn tags_display() {
        assert_eq!(HazardTag::Stall.to_string(), "STALL");
        assert_eq!(HazardTag::Forward(Stage::Memory).to_string(), "FWD-MEM");
        assert_eq!(Resolution::StallInserted.to_string(), "Stall inserted");
        assert_eq!(HazardKind::ReadAfterWrite.to_string(), "RAW");
    }
}
