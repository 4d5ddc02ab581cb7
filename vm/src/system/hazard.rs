use log::{debug, info};

use crate::config::SimConfig;
use crate::instruction::instruction::{lookup, Instruction, InstructionId, Opcode};
use crate::system::state::{Stage, StageSlot};

/// Outcome of checking one consumer against everything in flight
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hazard {
    None,
    /// The producer's result can be bypassed to the consumer
    Forward {
        producer: InstructionId,
        stage: Stage,
    },
    /// The consumer has to wait `cycles` cycles for the producer
    Stall {
        producer: InstructionId,
        stage: Stage,
        cycles: usize,
    },
}

impl Hazard {
    pub fn needs_stall(&self) -> bool {
        matches!(self, Hazard::Stall { .. })
    }

    pub fn can_forward(&self) -> bool {
        matches!(self, Hazard::Forward { .. })
    }

    pub fn stall_cycles(&self) -> Option<usize> {
        match self {
            Hazard::Stall { cycles, .. } => Some(*cycles),
            Hazard::None | Hazard::Forward { .. } => None,
        }
    }

    pub fn producer(&self) -> Option<(InstructionId, Stage)> {
        match *self {
            Hazard::Forward { producer, stage } | Hazard::Stall { producer, stage, .. } => {
                Some((producer, stage))
            }
            Hazard::None => None,
        }
    }
}

/// Read-after-write detection over the current stage occupancy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HazardDetector {
    load_stall_cycles: usize,
    default_stall_cycles: usize,
}

impl Default for HazardDetector {
    fn default() -> Self {
        Self::new(&SimConfig::default())
    }
}

impl HazardDetector {
    pub fn new(config: &SimConfig) -> Self {
        Self {
            load_stall_cycles: config.load_stall_cycles,
            default_stall_cycles: config.default_stall_cycles,
        }
    }

    /// Checks whether `consumer` reads a register that something else in the
    /// pipe still has to write. Only the first producer found, scanning IF to
    /// WB, is reported. Does not touch any state.
    pub fn detect(
        &self,
        consumer: InstructionId,
        slots: &[StageSlot],
        instructions: &[Instruction],
    ) -> Hazard {
        let Some(consumer_instr) = lookup(instructions, consumer) else {
            debug!("Hazard: Consumer {consumer} not found, assuming no hazard");
            return Hazard::None;
        };

        let reads = consumer_instr.src_regs();
        if reads.is_empty() {
            return Hazard::None;
        }

        for slot in slots {
            let Some(producer_id) = slot.instruction else {
                continue;
            };
            if producer_id == consumer {
                continue;
            }
            let Some(producer) = lookup(instructions, producer_id) else {
                debug!("Hazard: Producer {producer_id} in {} not found, skipping", slot.stage);
                continue;
            };

            let writes = producer.dest_regs();
            let Some(reg) = reads.iter().find(|read| writes.contains(*read)) else {
                continue;
            };

            if slot.stage.can_forward() {
                info!(
                    "Hazard: {consumer} reads {reg} from {producer_id} in {}, forwarding",
                    slot.stage
                );
                return Hazard::Forward {
                    producer: producer_id,
                    stage: slot.stage,
                };
            }

            let cycles = if producer.opcode == Opcode::Lw {
                self.load_stall_cycles
            } else {
                self.default_stall_cycles
            };
            info!(
                "Hazard: {consumer} reads {reg} from {producer_id} in {}, stalling {cycles} cycle(s)",
                slot.stage
            );
            return Hazard::Stall {
                producer: producer_id,
                stage: slot.stage,
                cycles,
            };
        }

        Hazard::None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::state::SimulationState;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn program() -> Vec<Instruction> {
        vec![
            Instruction::new(1, Opcode::Lw)
                .with_rt("R2")
                .with_rs("R1")
                .with_immediate(0),
            Instruction::new(2, Opcode::Sub)
                .with_rd("R5")
                .with_rs("R6")
                .with_rt("R7"),
            Instruction::new(3, Opcode::Add)
                .with_rd("R4")
                .with_rs("R2")
                .with_rt("R5"),
            Instruction::new(4, Opcode::Sw).with_rt("R4").with_rs("R9"),
            Instruction::new(5, Opcode::J).with_target("done"),
        ]
    }

    fn occupy(placements: &[(Stage, u32)]) -> SimulationState {
        let mut state = SimulationState::new();
        for (stage, id) in placements {
            state.slot_mut(*stage).instruction = Some(InstructionId(*id));
        }
        state
    }

    #[rstest]
    #[case(Stage::Execute, Hazard::Stall { producer: InstructionId(1), stage: Stage::Execute, cycles: 2 })]
    #[case(Stage::Memory, Hazard::Forward { producer: InstructionId(1), stage: Stage::Memory })]
    #[case(Stage::WriteBack, Hazard::Forward { producer: InstructionId(1), stage: Stage::WriteBack })]
    fn load_producer(#[case] producer_stage: Stage, #[case] expected: Hazard) {
        let state = occupy(&[(Stage::Decode, 3), (producer_stage, 1)]);
        let hazard = HazardDetector::default().detect(InstructionId(3), &state.slots, &program());
        assert_eq!(hazard, expected);
    }

    #[test]
    fn alu_producer_stalls_one_cycle() {
        let state = occupy(&[(Stage::Decode, 3), (Stage::Execute, 2)]);
        let hazard = HazardDetector::default().detect(InstructionId(3), &state.slots, &program());
        assert!(hazard.needs_stall());
        assert_eq!(hazard.stall_cycles(), Some(1));
        assert_eq!(hazard.producer(), Some((InstructionId(2), Stage::Execute)));
    }

    #[test]
    fn first_producer_in_stage_order_wins() {
        // both I1 (R2) and I2 (R5) feed I3
        let state = occupy(&[(Stage::Decode, 3), (Stage::Execute, 2), (Stage::Memory, 1)]);
        let hazard = HazardDetector::default().detect(InstructionId(3), &state.slots, &program());
        assert_eq!(hazard.producer(), Some((InstructionId(2), Stage::Execute)));
    }

    #[test]
    fn store_reads_its_data_register() {
        let state = occupy(&[(Stage::Decode, 4), (Stage::Execute, 3)]);
        let hazard = HazardDetector::default().detect(InstructionId(4), &state.slots, &program());
        assert_eq!(hazard.stall_cycles(), Some(1));
    }

    #[test]
    fn store_is_never_a_producer() {
        let program = vec![
            Instruction::new(1, Opcode::Sw).with_rt("R2").with_rs("R1"),
            Instruction::new(2, Opcode::Add)
                .with_rd("R3")
                .with_rs("R2")
                .with_rt("R1"),
        ];
        let state = occupy(&[(Stage::Decode, 2), (Stage::Execute, 1)]);
        let hazard = HazardDetector::default().detect(InstructionId(2), &state.slots, &program);
        assert_eq!(hazard, Hazard::None);
    }

    #[test]
    fn no_reads_means_no_hazard() {
        let state = occupy(&[(Stage::Decode, 5), (Stage::Execute, 1)]);
        let hazard = HazardDetector::default().detect(InstructionId(5), &state.slots, &program());
        assert_eq!(hazard, Hazard::None);
    }

    #[test]
    fn unknown_ids_are_tolerated() {
        let state = occupy(&[(Stage::Decode, 3), (Stage::Execute, 42)]);
        let detector = HazardDetector::default();
        assert_eq!(
            detector.detect(InstructionId(3), &state.slots, &program()),
            Hazard::None
        );
        assert_eq!(
            detector.detect(InstructionId(99), &state.slots, &program()),
            Hazard::None
        );
    }

    #[test]
    fn detection_is_repeatable() {
        let state = occupy(&[(Stage::Decode, 3), (Stage::Execute, 1)]);
        let detector = HazardDetector::default();
        let program = program();
        let first = detector.detect(InstructionId(3), &state.slots, &program);
        let second = detector.detect(InstructionId(3), &state.slots, &program);
        assert_eq!(first, second);
    }

    #[test]
    fn stall_lengths_follow_config() {
        let config = SimConfig {
            load_stall_cycles: 3,
            ..SimConfig::default()
        };
        let state = occupy(&[(Stage::Decode, 3), (Stage::Execute, 1)]);
        let hazard = HazardDetector::new(&config).detect(InstructionId(3), &state.slots, &program());
        assert_eq!(hazard.stall_cycles(), Some(3));
    }
}
