//! Text front end: turns assembly-like source into [`Instruction`] records.
//!
//! One instruction per line. `#` and `;` start comments, `name:` labels are
//! dropped, and operands may be separated by whitespace, commas or parentheses.
//! Lines that cannot be understood are skipped with a warning; they never abort
//! the parse and never consume an instruction id.

use std::str::FromStr;

use log::{debug, info, warn};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::ParseError;
use crate::instruction::instruction::{Instruction, Opcode, OperandFormat, Register};

const COMMENT_MARKERS: [char; 2] = ['#', ';'];
const LABEL_REGEX: &str = r"^(?P<label>[a-zA-Z_][a-zA-Z0-9_]*):\s*(?P<rest>.*)$";
const MEM_OPERAND_REGEX: &str = r"^(?P<offset>[^()]*)\((?P<base>[^()]+)\)$";

static LABEL: Lazy<Regex> = Lazy::new(|| Regex::new(LABEL_REGEX).unwrap());
static MEM_OPERAND: Lazy<Regex> = Lazy::new(|| Regex::new(MEM_OPERAND_REGEX).unwrap());

/// A skipped source line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// 1-based line number in the input
    pub line: usize,
    pub text: String,
    pub error: ParseError,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedProgram {
    pub instructions: Vec<Instruction>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Parses `source`, dropping anything that isn't a valid instruction
pub fn parse(source: &str) -> Vec<Instruction> {
    parse_with_diagnostics(source).instructions
}

/// Parses `source`, keeping a record of every line that was skipped
pub fn parse_with_diagnostics(source: &str) -> ParsedProgram {
    let mut program = ParsedProgram::default();
    let mut next_id = 1;

    for (line_num, line) in source.lines().enumerate() {
        let line_num = line_num + 1;
        let Some(cleaned) = strip(line) else {
            debug!("Parser: Line {line_num}: Nothing to parse");
            continue;
        };

        match parse_line(cleaned, next_id) {
            Ok(instr) => {
                debug!("Parser: Line {line_num}: Parsed {cleaned} as {instr}");
                program.instructions.push(instr);
                next_id += 1;
            }
            Err(error) => {
                warn!("Parser: Could not parse line {line_num}: {cleaned} - {error}");
                program.diagnostics.push(Diagnostic {
                    line: line_num,
                    text: cleaned.to_owned(),
                    error,
                });
            }
        }
    }

    info!(
        "Parser: Parsed {} instruction(s), skipped {} line(s)",
        program.instructions.len(),
        program.diagnostics.len()
    );
    program
}

/// Removes comments and labels, returning `None` if nothing is left
fn strip(line: &str) -> Option<&str> {
    let line = line.trim();
    if line.is_empty() || line.starts_with(COMMENT_MARKERS) {
        return None;
    }

    let line = match line.find(COMMENT_MARKERS) {
        Some(idx) => line[..idx].trim(),
        None => line,
    };

    // `loop:` alone is skipped, `loop: ADD ...` keeps the instruction
    let line = match LABEL.captures(line) {
        Some(caps) => caps.name("rest").map_or("", |rest| rest.as_str().trim()),
        None => line,
    };

    if line.is_empty() {
        None
    } else {
        Some(line)
    }
}

/// Splits on whitespace, commas and parentheses
fn tokenize(line: &str) -> Vec<&str> {
    line.split(|c: char| c.is_whitespace() || matches!(c, ',' | '(' | ')'))
        .filter(|token| !token.is_empty())
        .collect()
}

/// Everything after the opcode and `rt` of a load or store, parentheses kept
fn memory_operand_text(line: &str) -> String {
    line.split(|c: char| c.is_whitespace() || c == ',')
        .filter(|token| !token.is_empty())
        .skip(2)
        .collect::<Vec<_>>()
        .join(" ")
}

fn parse_line(line: &str, id: u32) -> Result<Instruction, ParseError> {
    let tokens = tokenize(line);
    let Some((opcode_token, operands)) = tokens.split_first() else {
        return Err(ParseError::UnknownOpcode(String::new()));
    };

    let opcode = Opcode::from_str(opcode_token)
        .ok()
        .filter(|opcode| opcode.format() != OperandFormat::Pseudo)
        .ok_or_else(|| ParseError::UnknownOpcode(opcode_token.to_ascii_uppercase()))?;

    let expected = opcode.format().operand_count();
    if operands.len() < expected {
        return Err(ParseError::MissingOperands {
            opcode,
            expected,
            found: operands.len(),
        });
    }
    if operands.len() > expected && opcode.format() != OperandFormat::Memory {
        debug!(
            "Parser: Ignoring {} extra operand(s) for {opcode}",
            operands.len() - expected
        );
    }

    let mut instr = Instruction::new(id, opcode).with_source(line);
    parse_operands(&mut instr, operands, line)?;
    Ok(instr)
}

fn parse_operands(
    instr: &mut Instruction,
    operands: &[&str],
    line: &str,
) -> Result<(), ParseError> {
    let reg = |idx: usize| Some(Register::new(operands[idx]));

    match instr.opcode.format() {
        OperandFormat::RegisterRegister => {
            instr.rd = reg(0);
            instr.rs = reg(1);
            instr.rt = reg(2);
        }
        OperandFormat::RegisterImmediate => {
            instr.rt = reg(0);
            instr.rs = reg(1);
            instr.immediate = Some(parse_immediate(operands[2])?);
        }
        OperandFormat::Memory => {
            let (immediate, base) = parse_memory_operand(&memory_operand_text(line));
            instr.rt = reg(0);
            instr.immediate = Some(immediate);
            instr.rs = base;
        }
        OperandFormat::LoadUpper => {
            instr.rt = reg(0);
            instr.immediate = Some(parse_immediate(operands[1])?);
        }
        OperandFormat::BranchEqual => {
            instr.rs = reg(0);
            instr.rt = reg(1);
            set_branch_offset(instr, operands[2]);
        }
        OperandFormat::BranchZero => {
            instr.rs = reg(0);
            set_branch_offset(instr, operands[1]);
        }
        OperandFormat::Jump => {
            instr.target = Some(operands[0].to_owned());
        }
        OperandFormat::JumpRegister => {
            instr.rs = reg(0);
        }
        OperandFormat::Pseudo => {
            return Err(ParseError::UnknownOpcode(instr.opcode.to_string()));
        }
    }

    Ok(())
}

/// Reads the `offset, base` part of a load or store.
///
/// Accepts the combined `0(R1)` form (offset optional, so `(R1)` is offset 0),
/// the two separate tokens `0 R1`, or a bare immediate with no base register.
/// Anything else is taken as offset 0 with no base.
pub fn parse_memory_operand(text: &str) -> (i32, Option<Register>) {
    let compact: String = text.split_whitespace().collect();
    if let Some(caps) = MEM_OPERAND.captures(&compact) {
        let offset = caps.name("offset").map_or("", |m| m.as_str());
        let base = caps.name("base").map(|m| Register::new(m.as_str()));
        return (offset_or_zero(offset), base);
    }

    if let [offset, base, ..] = text.split_whitespace().collect::<Vec<_>>()[..] {
        return (offset_or_zero(offset), Some(Register::new(base)));
    }

    (offset_or_zero(&compact), None)
}

fn offset_or_zero(token: &str) -> i32 {
    if token.is_empty() {
        return 0;
    }
    parse_immediate(token).unwrap_or_else(|_| {
        debug!("Parser: Memory offset `{token}` is not a number, using 0");
        0
    })
}

/// Parses a signed decimal or `0x` hexadecimal immediate
pub fn parse_immediate(token: &str) -> Result<i32, ParseError> {
    let invalid = || ParseError::InvalidImmediate(token.to_owned());

    let (negative, digits) = match token.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, token.strip_prefix('+').unwrap_or(token)),
    };
    // std's integer parsing takes a sign of its own
    let hex = digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"));
    if digits.starts_with(['+', '-']) || hex.is_some_and(|hex| hex.starts_with(['+', '-'])) {
        return Err(invalid());
    }
    let magnitude = match hex {
        Some(hex) => i64::from_str_radix(hex, 16),
        None => digits.parse::<i64>(),
    }
    .map_err(|_| invalid())?;

    let value = if negative {
        magnitude.checked_neg().ok_or_else(invalid)?
    } else {
        magnitude
    };
    i32::try_from(value).map_err(|_| invalid())
}

/// Branch offsets may be numeric or a label, labels end up in `target`
fn set_branch_offset(instr: &mut Instruction, token: &str) {
    match parse_immediate(token) {
        Ok(offset) => instr.immediate = Some(offset),
        Err(_) => instr.target = Some(token.to_owned()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruction::instruction::{Category, InstructionId};
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn reg(name: &str) -> Option<Register> {
        Some(Register::new(name))
    }

    #[test]
    fn parses_register_register() {
        let instrs = parse("ADD R4, R2, R3");
        assert_eq!(instrs.len(), 1);
        let add = &instrs[0];
        assert_eq!(add.id, InstructionId(1));
        assert_eq!(add.opcode, Opcode::Add);
        assert_eq!(add.category, Category::Arithmetic);
        assert_eq!(add.rd, reg("R4"));
        assert_eq!(add.rs, reg("R2"));
        assert_eq!(add.rt, reg("R3"));
        assert_eq!(add.source, "ADD R4, R2, R3");
    }

    #[test]
    fn parses_load_offset_form() {
        let instrs = parse("LW R2, 0(R1)");
        assert_eq!(instrs.len(), 1);
        assert_eq!(instrs[0].rt, reg("R2"));
        assert_eq!(instrs[0].rs, reg("R1"));
        assert_eq!(instrs[0].immediate, Some(0));
        assert_eq!(instrs[0].category, Category::Memory);
    }

    #[rstest]
    #[case("-8(R5)", (-8, reg("R5")))]
    #[case("0x10($t0)", (16, reg("T0")))]
    #[case("(R1)", (0, reg("R1")))]
    #[case("4 ( R1 )", (4, reg("R1")))]
    #[case("4 R1", (4, reg("R1")))]
    #[case("12", (12, None))]
    #[case("bogus", (0, None))]
    fn memory_operand_forms(#[case] text: &str, #[case] expected: (i32, Option<Register>)) {
        assert_eq!(parse_memory_operand(text), expected);
    }

    #[test]
    fn load_without_offset_uses_zero() {
        let parsed = parse_with_diagnostics("LW R2, (R1)\nSW R3,8(R1)");
        assert!(parsed.diagnostics.is_empty());
        let lw = &parsed.instructions[0];
        assert_eq!((lw.rt.clone(), lw.rs.clone(), lw.immediate), (reg("R2"), reg("R1"), Some(0)));
        let sw = &parsed.instructions[1];
        assert_eq!((sw.rt.clone(), sw.rs.clone(), sw.immediate), (reg("R3"), reg("R1"), Some(8)));
    }

    #[test]
    fn doubled_signs_skip_only_their_line() {
        let parsed = parse_with_diagnostics("ADDI R1, R1, --9223372036854775808\nADD R1, R2, R3");
        assert_eq!(parsed.instructions.len(), 1);
        assert_eq!(parsed.instructions[0].opcode, Opcode::Add);
        assert_eq!(
            parsed.diagnostics[0].error,
            ParseError::InvalidImmediate("--9223372036854775808".to_owned())
        );
    }

    #[test]
    fn unknown_opcode_is_skipped() {
        let parsed = parse_with_diagnostics("FOO R1, R2");
        assert!(parsed.instructions.is_empty());
        assert_eq!(parsed.diagnostics.len(), 1);
        assert_eq!(
            parsed.diagnostics[0].error,
            ParseError::UnknownOpcode("FOO".to_owned())
        );
    }

    #[test]
    fn pseudo_operations_are_not_accepted() {
        let parsed = parse_with_diagnostics("li r1, 4\nsyscall");
        assert!(parsed.instructions.is_empty());
        assert_eq!(parsed.diagnostics.len(), 2);
    }

    #[test]
    fn ids_are_dense_over_parsed_lines() {
        let source = "\
# header comment
ADDI R1, R1, 1
FOO R9
; another comment

loop:
LW R2, 4(R1)   # inline comment
ADD R4, R2
SW R2, 0(R3)
";
        let parsed = parse_with_diagnostics(source);
        let ids: Vec<_> = parsed.instructions.iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![InstructionId(1), InstructionId(2), InstructionId(3)]);
        let opcodes: Vec<_> = parsed.instructions.iter().map(|i| i.opcode).collect();
        assert_eq!(opcodes, vec![Opcode::Addi, Opcode::Lw, Opcode::Sw]);

        let skipped: Vec<_> = parsed.diagnostics.iter().map(|d| d.line).collect();
        assert_eq!(skipped, vec![3, 8]);
        assert_eq!(
            parsed.diagnostics[1].error,
            ParseError::MissingOperands {
                opcode: Opcode::Add,
                expected: 3,
                found: 2
            }
        );
    }

    #[test]
    fn label_prefix_is_stripped() {
        let instrs = parse("main: addi r1, r0, 0x10");
        assert_eq!(instrs.len(), 1);
        assert_eq!(instrs[0].opcode, Opcode::Addi);
        assert_eq!(instrs[0].immediate, Some(16));
        assert_eq!(instrs[0].source, "addi r1, r0, 0x10");
    }

    #[test]
    fn branch_offsets_may_be_labels() {
        let instrs = parse("BEQ R4, R0, LOOP\nBGEZ R1, -3\nJAL print\nJR $ra");
        assert_eq!(instrs.len(), 4);
        assert_eq!(instrs[0].target.as_deref(), Some("LOOP"));
        assert_eq!(instrs[0].immediate, None);
        assert_eq!(instrs[1].immediate, Some(-3));
        assert_eq!(instrs[2].target.as_deref(), Some("print"));
        assert_eq!(instrs[3].rs, reg("RA"));
    }

    #[test]
    fn bad_immediate_skips_line() {
        let parsed = parse_with_diagnostics("ADDI R1, R1, one\nLUI R3, 7");
        assert_eq!(parsed.instructions.len(), 1);
        assert_eq!(parsed.instructions[0].opcode, Opcode::Lui);
        assert_eq!(parsed.instructions[0].id, InstructionId(1));
        assert_eq!(
            parsed.diagnostics[0].error,
            ParseError::InvalidImmediate("one".to_owned())
        );
    }

    #[rstest]
    #[case("42", Some(42))]
    #[case("-3", Some(-3))]
    #[case("+7", Some(7))]
    #[case("0x1F", Some(31))]
    #[case("-0x10", Some(-16))]
    #[case("LOOP", None)]
    #[case("99999999999", None)]
    #[case("--9223372036854775808", None)]
    #[case("-0x-1", None)]
    #[case("0x+5", None)]
    #[case("+-1", None)]
    fn immediates(#[case] token: &str, #[case] expected: Option<i32>) {
        assert_eq!(parse_immediate(token).ok(), expected);
    }
}
