pub mod instruction;
pub mod parser;
pub mod program;
