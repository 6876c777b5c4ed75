//! This crate provides the core logic for a card-programmed tape automaton.
//! It includes modules for parsing programs, validating them, executing them against a
//! fixed-size tape with arbitrary signed head jumps, and managing a catalog of examples.

pub mod analyzer;
pub mod encoder;
pub mod loader;
pub mod machine;
pub mod parser;
pub mod programs;
pub mod types;

/// Re-exports the `Rule` enum from the parser module, used by the `pest` grammar.
pub use crate::parser::Rule;
/// Re-exports the validation entry points and `ValidationError` from the analyzer module.
pub use analyzer::{analyze, check_tape, validate, ValidationError};
/// Re-exports the encoding functions from the encoder module.
pub use encoder::{encode, encode_presets, encode_tape};
/// Re-exports the `ProgramLoader` struct from the loader module.
pub use loader::ProgramLoader;
/// Re-exports the engine from the machine module.
pub use machine::{run, step, Observer, TapeMachine};
/// Re-exports the parsing functions from the parser module.
pub use parser::{parse, parse_presets, parse_tape};
/// Re-exports `Catalog`, `ProgramInfo`, and `CATALOG` from the programs module.
pub use programs::{Catalog, ProgramInfo, CATALOG};
/// Re-exports the data model and error types from the types module.
pub use types::{
    Action, Card, MachineState, Program, RunError, RunResult, State, StateId, Step,
    StepOutcome, Symbol, TapeCardError, TapePreset, Termination, DEFAULT_MAX_STEPS,
    MAX_PROGRAM_SIZE,
};
