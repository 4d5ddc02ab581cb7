#![warn(clippy::all, clippy::pedantic)]

pub mod config;
pub mod error;
pub mod instruction;
pub mod system;
pub mod ui;
