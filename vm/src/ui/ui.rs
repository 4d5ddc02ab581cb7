use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use dialoguer::theme::ColorfulTheme;
use dialoguer::{Input, Select};
use log::info;
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter};

use crate::config::SimConfig;
use crate::instruction::instruction::{lookup, Instruction};
use crate::system::metrics::PerformanceMetrics;
use crate::system::scheduler::{Scheduler, ThreadScheduler};
use crate::system::state::{HazardEvent, SimulationState, StageSlot, Status};
use crate::system::system::{CycleOutcome, Simulator, StateObserver};
use crate::system::timeline::Timeline;

const INSTRUCTION_COLUMN_WIDTH: usize = 24;
const CELL_WIDTH: usize = 5;

/// Text shown for a stage slot: `<opcode> <id>`, `ERR` when the id doesn't resolve
pub fn slot_text(slot: &StageSlot, instructions: &[Instruction]) -> String {
    let Some(id) = slot.instruction else {
        return String::new();
    };
    let Some(instr) = lookup(instructions, id) else {
        return "ERR".to_owned();
    };

    let mut text = instr.label();
    if let Some(tag) = slot.hazard {
        let _ = write!(text, " [{tag}]");
    }
    if slot.stalled {
        text.push_str(" (stalled)");
    }
    text
}

pub fn render_pipeline(state: &SimulationState, instructions: &[Instruction]) -> String {
    let mut out = format!(
        "Cycle {} | {} | {} / {} fetched",
        state.cycle,
        state.status,
        state.instruction_pointer,
        instructions.len()
    );
    if state.stall_counter > 0 {
        let _ = write!(out, " | stalling, {} cycle(s) left", state.stall_counter);
    }
    out.push('\n');
    for slot in &state.slots {
        let _ = writeln!(out, "  {:<4}| {}", slot.stage, slot_text(slot, instructions));
    }
    out
}

pub fn render_instructions(instructions: &[Instruction]) -> String {
    let mut out = String::new();
    for instr in instructions {
        let text = if instr.source.is_empty() {
            instr.to_string()
        } else {
            instr.source.clone()
        };
        let _ = writeln!(out, "{:<4} {:<7} {text}", instr.id.to_string(), instr.category.to_string());
    }
    out
}

pub fn render_timeline(timeline: &Timeline) -> String {
    let mut out = format!("{:<INSTRUCTION_COLUMN_WIDTH$}", "Instruction");
    for cycle in &timeline.cycles {
        let _ = write!(out, "{:<CELL_WIDTH$}", format!("C{cycle}"));
    }
    out.push('\n');

    for row in &timeline.rows {
        let label: String = format!("{} {}", row.instruction, row.text)
            .chars()
            .take(INSTRUCTION_COLUMN_WIDTH - 1)
            .collect();
        let _ = write!(out, "{label:<INSTRUCTION_COLUMN_WIDTH$}");
        for cell in &row.cells {
            let stage = cell.map(|stage| stage.to_string()).unwrap_or_default();
            let _ = write!(out, "{stage:<CELL_WIDTH$}");
        }
        out.push('\n');
    }
    out
}

pub fn render_hazards(events: &[HazardEvent]) -> String {
    if events.is_empty() {
        return "No hazards recorded\n".to_owned();
    }
    let mut out = String::new();
    for event in events {
        let _ = writeln!(
            out,
            "Cycle {:>3}  {}  {}  ({})",
            event.cycle, event.kind, event.description, event.resolution
        );
    }
    out
}

pub fn render_metrics(metrics: &PerformanceMetrics) -> String {
    let fmt_ratio = |value: Option<f64>| value.map_or_else(|| "-".to_owned(), |v| format!("{v:.2}"));
    format!(
        "Total cycles: {}\nCPI (pipelined): {}\nCPI (non-pipelined): {:.2}\nSpeedup: {}\nStalls: {}\nHazards: {}\n",
        metrics.total_cycles,
        fmt_ratio(metrics.cpi),
        metrics.non_pipelined_cpi,
        fmt_ratio(metrics.speedup),
        metrics.stall_count,
        metrics.hazard_count,
    )
}

/// Timeline, hazard log and metrics in one block
pub fn render_report<S: Scheduler>(sim: &Simulator<S>) -> String {
    format!(
        "{}\n{}\n{}",
        render_timeline(&sim.timeline()),
        render_hazards(&sim.state().hazard_events),
        render_metrics(&sim.metrics())
    )
}

/// Prints the pipeline every time the engine reports a change
pub struct ConsoleObserver;

impl StateObserver for ConsoleObserver {
    fn state_changed(&mut self, state: &SimulationState, instructions: &[Instruction]) {
        println!("{}", render_pipeline(state, instructions));
    }
}

pub fn load_file<S: Scheduler>(sim: &mut Simulator<S>, path: &Path) -> Result<usize> {
    let path = path.canonicalize()?;
    info!("Loading program file {}", path.display());
    let source = std::fs::read_to_string(&path)?;
    sim.load_instructions(&source)
        .map_err(|e| anyhow!("Failed to load {}: {e}", path.display()))
}

/// Runs the loaded program to completion, printing every change
pub fn run_batch(config: SimConfig, program: Option<PathBuf>) -> Result<()> {
    let mut sim = Simulator::new(config, ThreadScheduler::new());
    if let Some(path) = program {
        load_file(&mut sim, &path)?;
    }
    println!("{}", render_instructions(sim.instructions()));

    sim.add_observer(Box::new(ConsoleObserver));
    sim.start();
    while sim.state().status == Status::Running {
        let Some(handle) = sim.scheduler_mut().wait() else {
            break;
        };
        sim.on_tick(handle);
    }

    println!("{}", render_report(&sim));
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumIter)]
enum MenuItem {
    #[strum(serialize = "Step one cycle")]
    Step,
    #[strum(serialize = "Run to completion")]
    Run,
    #[strum(serialize = "Run N cycles")]
    RunCycles,
    #[strum(serialize = "Reset")]
    Reset,
    #[strum(serialize = "Load program file")]
    Load,
    #[strum(serialize = "Show instructions")]
    Instructions,
    #[strum(serialize = "Show timeline")]
    Timeline,
    #[strum(serialize = "Show hazard log and metrics")]
    Report,
    #[strum(serialize = "Quit")]
    Quit,
}

/// Auto-advances on the scheduler's clock, pausing after `limit` cycles
fn run(sim: &mut Simulator<ThreadScheduler>, limit: Option<usize>) {
    if sim.state().status != Status::Running && !sim.start() {
        println!("Simulation is {}, reset to run again", sim.state().status);
        return;
    }

    let mut advanced = 0;
    while sim.state().status == Status::Running {
        let Some(handle) = sim.scheduler_mut().wait() else {
            break;
        };
        if sim.on_tick(handle) == CycleOutcome::Ignored {
            continue;
        }
        advanced += 1;
        println!("{}", render_pipeline(sim.state(), sim.instructions()));
        if limit.is_some_and(|limit| advanced >= limit) {
            sim.pause();
        }
    }
}

fn step(sim: &mut Simulator<ThreadScheduler>) {
    // stepping out of idle goes through running so the status moves legally
    if sim.state().status == Status::Idle {
        sim.start();
    }
    if sim.step() == CycleOutcome::Ignored {
        println!("Simulation is {}, reset to step again", sim.state().status);
    }
    println!("{}", render_pipeline(sim.state(), sim.instructions()));
}

/// Interactive terminal front end
pub fn enter(config: SimConfig, program: Option<PathBuf>) -> Result<()> {
    let mut sim = Simulator::new(config, ThreadScheduler::new());
    if let Some(path) = program {
        load_file(&mut sim, &path)?;
    }
    println!("{}", render_instructions(sim.instructions()));
    println!("{}", render_pipeline(sim.state(), sim.instructions()));

    let items: Vec<MenuItem> = MenuItem::iter().collect();
    let theme = ColorfulTheme::default();
    loop {
        let choice = Select::with_theme(&theme)
            .with_prompt("Action")
            .items(&items)
            .default(0)
            .interact()?;

        match items[choice] {
            MenuItem::Step => step(&mut sim),
            MenuItem::Run => run(&mut sim, None),
            MenuItem::RunCycles => {
                let cycles: usize = Input::with_theme(&theme)
                    .with_prompt("Cycles")
                    .default(5)
                    .interact_text()?;
                run(&mut sim, Some(cycles));
            }
            MenuItem::Reset => {
                sim.reset();
                println!("{}", render_pipeline(sim.state(), sim.instructions()));
            }
            MenuItem::Load => {
                let path: String = Input::with_theme(&theme)
                    .with_prompt("Program path")
                    .interact_text()?;
                match load_file(&mut sim, Path::new(&path)) {
                    Ok(count) => {
                        println!("Loaded {count} instruction(s)");
                        println!("{}", render_instructions(sim.instructions()));
                    }
                    Err(e) => println!("{e}. Please check the syntax and try again."),
                }
            }
            MenuItem::Instructions => println!("{}", render_instructions(sim.instructions())),
            MenuItem::Timeline => println!("{}", render_timeline(&sim.timeline())),
            MenuItem::Report => {
                println!("{}", render_hazards(&sim.state().hazard_events));
                println!("{}", render_metrics(&sim.metrics()));
            }
            MenuItem::Quit => break,
        }
    }

    sim.pause();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruction::instruction::{InstructionId, Opcode};
    use crate::instruction::program::reference_program;
    use crate::system::scheduler::ManualScheduler;
    use crate::system::state::{HazardTag, Stage};
    use pretty_assertions::assert_eq;

    #[test]
    fn slot_text_marks_hazards() {
        let program = reference_program();
        let slot = StageSlot {
            stage: Stage::Decode,
            instruction: Some(InstructionId(6)),
            hazard: Some(HazardTag::Stall),
            stalled: true,
        };
        assert_eq!(slot_text(&slot, &program), "ADD I6 [STALL] (stalled)");
    }

    #[test]
    fn unknown_ids_render_as_err() {
        let slot = StageSlot {
            stage: Stage::Execute,
            instruction: Some(InstructionId(40)),
            hazard: None,
            stalled: false,
        };
        assert_eq!(slot_text(&slot, &reference_program()), "ERR");
        assert_eq!(slot_text(&StageSlot::empty(Stage::Fetch), &[]), "");
    }

    #[test]
    fn pipeline_lists_every_stage() {
        let mut state = SimulationState::new();
        state.slot_mut(Stage::Memory).instruction = Some(InstructionId(5));
        let text = render_pipeline(&state, &reference_program());
        assert!(text.starts_with("Cycle 0 | IDLE | 0 / 7 fetched\n"));
        assert!(text.contains("  MEM | LW I5\n"));
        assert_eq!(text.lines().count(), 6);
    }

    #[test]
    fn metrics_show_dashes_before_running() {
        let metrics = PerformanceMetrics::collect(&SimulationState::new(), 0, 5.0);
        let text = render_metrics(&metrics);
        assert!(text.contains("CPI (pipelined): -\n"));
        assert!(text.contains("CPI (non-pipelined): 5.00\n"));
    }

    #[test]
    fn long_labels_are_cut_on_char_boundaries() {
        let mut sim = Simulator::new(SimConfig::default(), ManualScheduler::new());
        sim.load_instructions("BEQ R4, R0, xéééééééééé").unwrap();
        sim.start();
        sim.step();
        sim.step();

        let text = render_timeline(&sim.timeline());
        let row = text.lines().nth(1).unwrap();
        assert!(row.starts_with("I1 BEQ R4, R0, xééééééé "));
        assert!(!row.starts_with("I1 BEQ R4, R0, xéééééééé"));
        assert!(row.ends_with("IF   "));
    }

    #[test]
    fn instruction_list_falls_back_to_assembly() {
        let program = vec![Instruction::new(1, Opcode::Jr).with_rs("RA")];
        assert_eq!(render_instructions(&program), "I1   jump    JR RA\n");
    }
}
