#![warn(clippy::all, clippy::pedantic)]

use std::fmt::Write as _;
use std::path::PathBuf;

use anyhow::{anyhow, bail, Result};
use clap::Parser;
use log::info;

use mips_pipeline::instruction::instruction::Instruction;
use mips_pipeline::instruction::parser::{parse_with_diagnostics, ParsedProgram};

#[derive(Parser, Debug)]
#[command(version, about = "Checks MIPS assembly against the simulator's parser", long_about = None)]
struct AssemblerArgs {
    input_file: PathBuf,
    #[arg(long, short, help = "Path to store the normalized listing")]
    output_path: Option<PathBuf>,
    #[arg(long, short, help = "Verbose output")]
    verbose: bool,
    #[arg(long, help = "Fail if any line had to be skipped")]
    strict: bool,
}

#[derive(Debug)]
struct AssemblerOptions {
    input_path: PathBuf,
    output_path: Option<PathBuf>,
    verbose: bool,
    strict: bool,
}

impl From<AssemblerArgs> for AssemblerOptions {
    fn from(value: AssemblerArgs) -> Self {
        AssemblerOptions {
            input_path: value.input_file,
            output_path: value.output_path,
            verbose: value.verbose,
            strict: value.strict,
        }
    }
}

fn read_input(opts: &AssemblerOptions) -> Result<String> {
    let path = opts.input_path.canonicalize()?;
    info!("Reading in file: {}", path.display());
    let data = std::fs::read_to_string(path)?;
    Ok(data)
}

fn print_diagnostics(parsed: &ParsedProgram) {
    for diag in &parsed.diagnostics {
        println!("Line {}: {} (`{}`)", diag.line, diag.error, diag.text);
    }
}

fn print_listing(instrs: &[Instruction]) {
    for instr in instrs {
        println!(
            "{:<4} {:<8} {:<7} {instr}",
            instr.id.to_string(),
            instr.opcode.to_string(),
            instr.category.to_string()
        );
    }
}

/// One canonical instruction per line, loadable by the simulator
fn normalized(instrs: &[Instruction]) -> String {
    instrs.iter().fold(String::new(), |mut out, instr| {
        let _ = writeln!(out, "{instr}");
        out
    })
}

fn write_listing(instrs: &[Instruction], opts: &AssemblerOptions) -> Result<()> {
    let Some(ref output_path) = opts.output_path else {
        return Ok(());
    };
    info!("Writing to path {}", output_path.display());
    std::fs::write(output_path, normalized(instrs))?;
    Ok(())
}

/// Parses the file specified in `opts`, reports what was skipped and what
/// was understood, and optionally writes the normalized program
fn check(opts: &AssemblerOptions) -> Result<()> {
    let source = read_input(opts)?;
    let parsed = parse_with_diagnostics(&source);

    print_diagnostics(&parsed);
    print_listing(&parsed.instructions);

    if parsed.instructions.is_empty() {
        bail!("No valid instructions in {}", opts.input_path.display());
    }
    if opts.strict && !parsed.diagnostics.is_empty() {
        return Err(anyhow!(
            "{} line(s) could not be parsed",
            parsed.diagnostics.len()
        ));
    }

    write_listing(&parsed.instructions, opts)?;
    Ok(())
}

fn main() {
    let args = AssemblerArgs::parse();
    let opts: AssemblerOptions = args.into();

    let level = if opts.verbose { "info" } else { "warn" };
    if let Err(e) = flexi_logger::Logger::try_with_str(level).and_then(|logger| logger.start()) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }

    if let Err(e) = check(&opts) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mips_pipeline::instruction::parser::parse;

    #[test]
    fn normalized_listing_parses_back_the_same() {
        let instrs = parse("loop: addi $t0, $t0, 1\nlw $t1, 4($t0)\nbeq $t1, $zero, loop\n");
        let listing = normalized(&instrs);
        let reparsed = parse(&listing);
        assert_eq!(listing.lines().count(), 3);
        assert_eq!(normalized(&reparsed), listing);
    }
}
