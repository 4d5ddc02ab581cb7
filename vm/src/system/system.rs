use log::{debug, error, info, warn};

use crate::config::SimConfig;
use crate::error::LoadError;
use crate::instruction::instruction::{lookup, Instruction, InstructionId};
use crate::instruction::parser::parse_with_diagnostics;
use crate::instruction::program::reference_program;
use crate::system::hazard::{Hazard, HazardDetector};
use crate::system::metrics::PerformanceMetrics;
use crate::system::scheduler::{Scheduler, TickHandle};
use crate::system::state::{
    HazardEvent, HazardKind, HazardTag, Resolution, SimulationState, Stage, Status,
};
use crate::system::timeline::Timeline;

/// Gets told whenever the simulation state changes
pub trait StateObserver {
    fn state_changed(&mut self, state: &SimulationState, instructions: &[Instruction]);
}

impl<F> StateObserver for F
where
    F: FnMut(&SimulationState, &[Instruction]),
{
    fn state_changed(&mut self, state: &SimulationState, instructions: &[Instruction]) {
        self(state, instructions);
    }
}

/// What a call to [`Simulator::advance_cycle`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Nothing happened, the simulation is idle or complete
    Ignored,
    /// A stall cycle was served, nothing moved
    Stalled { remaining: usize },
    /// Instructions moved one stage
    Advanced {
        retired: Option<InstructionId>,
        hazard: Hazard,
    },
    /// The last instruction left the pipeline
    Completed,
}

/// The cycle-stepped pipeline engine. Owns the program, the state and the
/// tick source that drives automatic runs.
pub struct Simulator<S: Scheduler> {
    config: SimConfig,
    detector: HazardDetector,
    instructions: Vec<Instruction>,
    state: SimulationState,
    scheduler: S,
    pending_tick: Option<TickHandle>,
    observers: Vec<Box<dyn StateObserver>>,
}

impl<S: Scheduler> Simulator<S> {
    /// A simulator loaded with the built-in reference program
    pub fn new(config: SimConfig, scheduler: S) -> Self {
        Self::with_instructions(config, scheduler, reference_program())
    }

    pub fn with_instructions(config: SimConfig, scheduler: S, instructions: Vec<Instruction>) -> Self {
        Self {
            detector: HazardDetector::new(&config),
            config,
            instructions,
            state: SimulationState::new(),
            scheduler,
            pending_tick: None,
            observers: Vec::new(),
        }
    }

    pub fn add_observer(&mut self, observer: Box<dyn StateObserver>) {
        self.observers.push(observer);
    }

    pub fn state(&self) -> &SimulationState {
        &self.state
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn lookup(&self, id: InstructionId) -> Option<&Instruction> {
        lookup(&self.instructions, id)
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut S {
        &mut self.scheduler
    }

    pub fn metrics(&self) -> PerformanceMetrics {
        PerformanceMetrics::collect(
            &self.state,
            self.instructions.len(),
            self.config.non_pipelined_cpi,
        )
    }

    pub fn timeline(&self) -> Timeline {
        Timeline::build(
            &self.state.cycle_trace,
            &self.instructions,
            self.config.timeline_width,
        )
    }

    /// Parses `source` and, if anything came out of it, swaps it in as the
    /// active program and resets. On failure nothing changes.
    pub fn load_instructions(&mut self, source: &str) -> Result<usize, LoadError> {
        if source.trim().is_empty() {
            warn!("Engine::load_instructions: Empty source, keeping current program");
            return Err(LoadError::EmptySource);
        }

        let parsed = parse_with_diagnostics(source);
        if parsed.instructions.is_empty() {
            warn!("Engine::load_instructions: No valid instructions parsed, keeping current program");
            return Err(LoadError::NoInstructions {
                skipped: parsed.diagnostics.len(),
            });
        }

        let count = parsed.instructions.len();
        info!("Engine::load_instructions: Loaded {count} instruction(s)");
        // reset before the new program becomes visible to observers
        self.release_tick();
        self.state = SimulationState::new();
        self.instructions = parsed.instructions;
        self.notify();
        Ok(count)
    }

    /// Puts the simulation back into its idle starting state
    pub fn init(&mut self) {
        info!("Engine::init: Initializing simulation state");
        self.release_tick();
        self.state = SimulationState::new();
        self.notify();
    }

    pub fn reset(&mut self) {
        info!("Engine::reset: Resetting at cycle {}", self.state.cycle);
        self.init();
    }

    /// Begins automatic advancing, one cycle per configured interval
    pub fn start(&mut self) -> bool {
        if self.state.status == Status::Running {
            debug!("Engine::start: Already running");
            return false;
        }
        if !self.transition(Status::Running) {
            return false;
        }
        self.schedule_tick();
        self.notify();
        true
    }

    /// Stops automatic advancing. Any pending tick is released even if the
    /// status doesn't change.
    pub fn pause(&mut self) {
        self.release_tick();
        if self.state.status == Status::Running {
            self.transition(Status::Paused);
        } else {
            debug!("Engine::pause: Not running ({}), nothing to pause", self.state.status);
        }
        self.notify();
    }

    /// Advances exactly one cycle, pausing an automatic run first
    pub fn step(&mut self) -> CycleOutcome {
        if self.state.status == Status::Running {
            self.pause();
        }
        self.advance_cycle()
    }

    /// Called by the host when a scheduled tick fires
    pub fn on_tick(&mut self, handle: TickHandle) -> CycleOutcome {
        if self.pending_tick != Some(handle) {
            debug!("Engine::on_tick: Ignoring stale tick {handle}");
            return CycleOutcome::Ignored;
        }
        self.pending_tick = None;
        if self.state.status != Status::Running {
            return CycleOutcome::Ignored;
        }

        let outcome = self.advance_cycle();
        if self.state.status == Status::Running {
            self.schedule_tick();
        }
        outcome
    }

    pub fn advance_cycle(&mut self) -> CycleOutcome {
        if matches!(self.state.status, Status::Idle | Status::Complete) {
            debug!(
                "Engine::advance_cycle: Status is {}, not advancing",
                self.state.status
            );
            return CycleOutcome::Ignored;
        }

        if self.state.stall_counter > 0 {
            return self.serve_stall();
        }

        info!("Engine::advance_cycle: Starting cycle {}", self.state.cycle);
        self.state.cycle_trace.push(self.state.snapshot());

        let retired = self.state.shift();
        if let Some(id) = retired {
            info!("Engine::advance_cycle: {id} retired");
        }

        let candidate = self
            .instructions
            .get(self.state.instruction_pointer)
            .map(|instr| instr.id);

        let hazard = match self.state.slot(Stage::Decode).instruction {
            Some(consumer) => {
                self.detector
                    .detect(consumer, &self.state.slots, &self.instructions)
            }
            None => Hazard::None,
        };

        let fetched = match hazard {
            Hazard::Stall {
                producer, cycles, ..
            } => {
                self.insert_stall(producer, cycles);
                if let Some(withheld) = candidate {
                    info!("Engine::advance_cycle: Withholding {withheld} from IF");
                }
                None
            }
            Hazard::Forward { producer, stage } => {
                let decode = self.state.slot_mut(Stage::Decode);
                info!(
                    "Engine::advance_cycle: Forwarding {producer} from {stage} to {:?}",
                    decode.instruction
                );
                decode.hazard = Some(HazardTag::Forward(stage));
                candidate
            }
            Hazard::None => candidate,
        };

        let fetch = self.state.slot_mut(Stage::Fetch);
        fetch.instruction = fetched;
        fetch.hazard = None;
        fetch.stalled = false;

        if let Some(id) = fetched {
            debug!("Engine::advance_cycle: Fetched {id}");
            self.state.instruction_pointer += 1;
        }

        let complete = self.state.instruction_pointer >= self.instructions.len()
            && self.state.is_pipeline_empty();
        if complete {
            self.transition(Status::Complete);
        }

        self.state.cycle += 1;
        self.notify();

        if complete {
            CycleOutcome::Completed
        } else {
            CycleOutcome::Advanced { retired, hazard }
        }
    }

    fn serve_stall(&mut self) -> CycleOutcome {
        self.state.stall_counter -= 1;
        let remaining = self.state.stall_counter;
        info!(
            "Engine::advance_cycle: Stall cycle {}, {remaining} remaining",
            self.state.cycle
        );
        if remaining == 0 {
            for slot in &mut self.state.slots {
                slot.stalled = false;
            }
        }
        self.state.cycle += 1;
        self.notify();
        CycleOutcome::Stalled { remaining }
    }

    fn insert_stall(&mut self, producer: InstructionId, cycles: usize) {
        let cycle = self.state.cycle;
        self.state.stall_counter = cycles;

        let decode = self.state.slot_mut(Stage::Decode);
        decode.stalled = true;
        decode.hazard = Some(HazardTag::Stall);
        let Some(consumer) = decode.instruction else {
            error!("Engine::insert_stall: Stall requested with an empty ID stage");
            return;
        };

        info!("Engine::insert_stall: RAW hazard {producer} -> {consumer}, stalling {cycles} cycle(s)");
        self.state.hazard_events.push(HazardEvent {
            cycle,
            kind: HazardKind::ReadAfterWrite,
            instruction: consumer,
            producer,
            description: format!("RAW hazard: {producer} → {consumer}"),
            resolution: Resolution::StallInserted,
        });
    }

    fn transition(&mut self, next: Status) -> bool {
        let current = self.state.status;
        if current.can_transition_to(next) {
            info!("Engine: Status {current} -> {next}");
            self.state.status = next;
            true
        } else {
            warn!("Engine: Refusing status change {current} -> {next}");
            false
        }
    }

    fn schedule_tick(&mut self) {
        self.release_tick();
        self.pending_tick = Some(self.scheduler.schedule_next(self.config.cycle_interval));
    }

    fn release_tick(&mut self) {
        if let Some(handle) = self.pending_tick.take() {
            debug!("Engine: Cancelling tick {handle}");
            self.scheduler.cancel(handle);
        }
    }

    fn notify(&mut self) {
        for observer in &mut self.observers {
            observer.state_changed(&self.state, &self.instructions);
        }
    }
}
