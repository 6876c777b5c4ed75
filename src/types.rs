//! This module defines the core data structures used throughout the automaton: symbols,
//! actions, cards, programs, run results, and the error types shared by every module.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

use crate::Rule;

/// A single tape symbol.
pub type Symbol = char;
/// Identifier of a program state (the index of its card).
pub type StateId = u32;

/// The conventional blank symbol.
pub const BLANK_SYMBOL: Symbol = '_';
/// The conventional marker programs write to signal their own error conditions.
pub const ERROR_MARKER: Symbol = 'E';
/// The conventional halting state.
pub const HALT_STATE: StateId = 0;
/// The conventional entry state.
pub const DEFAULT_ENTRY_STATE: StateId = 1;
/// The default step budget for a run.
pub const DEFAULT_MAX_STEPS: usize = 20;
/// The maximum allowed size for a program text in bytes.
pub const MAX_PROGRAM_SIZE: usize = 65536; // 64KB

/// What to do after reading a symbol: the symbol to write, the signed head displacement,
/// and the state to enter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    pub write: Symbol,
    pub step: i64,
    pub next_state: StateId,
}

impl Action {
    pub fn new(write: Symbol, step: i64, next_state: StateId) -> Self {
        Self {
            write,
            step,
            next_state,
        }
    }
}

/// The per-symbol actions of one state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    actions: BTreeMap<Symbol, Action>,
}

impl Card {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an action for `symbol`, returning the action it replaced, if any.
    pub fn insert(&mut self, symbol: Symbol, action: Action) -> Option<Action> {
        self.actions.insert(symbol, action)
    }

    /// Returns the action for `symbol`, or `None` when the card does not define one.
    pub fn get(&self, symbol: Symbol) -> Option<&Action> {
        self.actions.get(&symbol)
    }

    /// The symbols this card reads, in order.
    pub fn symbols(&self) -> impl Iterator<Item = Symbol> + '_ {
        self.actions.keys().copied()
    }

    pub fn actions(&self) -> impl Iterator<Item = (Symbol, &Action)> {
        self.actions.iter().map(|(symbol, action)| (*symbol, action))
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

impl FromIterator<(Symbol, Action)> for Card {
    fn from_iter<I: IntoIterator<Item = (Symbol, Action)>>(iter: I) -> Self {
        Self {
            actions: iter.into_iter().collect(),
        }
    }
}

/// A program state: either the halting placeholder, which carries no card, or an
/// executable state with its card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum State {
    Halting,
    Executable(Card),
}

impl State {
    /// Returns the card of an executable state.
    pub fn card(&self) -> Option<&Card> {
        match self {
            State::Halting => None,
            State::Executable(card) => Some(card),
        }
    }
}

/// A named tape with its starting head position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TapePreset {
    pub name: String,
    pub cells: Vec<Symbol>,
    pub head: usize,
}

/// A card program.
///
/// States map to cards; the halting state carries no card. The program also declares the
/// alphabet its cards read and the marker symbols they may write without ever reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Program {
    /// The name of the program.
    pub name: String,
    /// Symbols that may appear under the head. Every card must cover all of them.
    pub alphabet: BTreeSet<Symbol>,
    /// Symbols that may be written but are not expected to be read back (e.g. `E`).
    pub markers: BTreeSet<Symbol>,
    /// The state execution starts in.
    pub entry_state: StateId,
    /// The absorbing state at which execution stops.
    pub halt_state: StateId,
    /// The state table.
    pub states: BTreeMap<StateId, State>,
    /// The default tape this program is meant to run on, if any.
    pub input: Option<TapePreset>,
}

impl Program {
    /// Creates an empty program with the conventional entry and halting states.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            alphabet: BTreeSet::new(),
            markers: BTreeSet::new(),
            entry_state: DEFAULT_ENTRY_STATE,
            halt_state: HALT_STATE,
            states: BTreeMap::new(),
            input: None,
        }
    }

    /// Returns the card for `state`, or `None` if the state is undeclared or halting.
    pub fn card(&self, state: StateId) -> Option<&Card> {
        self.states.get(&state).and_then(State::card)
    }

    /// Returns an iterator over the executable states and their cards.
    pub fn cards(&self) -> impl Iterator<Item = (StateId, &Card)> {
        self.states
            .iter()
            .filter_map(|(id, state)| state.card().map(|card| (*id, card)))
    }

    /// Total number of actions across all cards.
    pub fn action_count(&self) -> usize {
        self.cards().map(|(_, card)| card.len()).sum()
    }
}

/// The symbol written, the new head position and the next state produced by one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepOutcome {
    pub written: Symbol,
    pub head: i64,
    pub next_state: StateId,
}

/// A borrowed snapshot of the machine after a completed step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MachineState<'a> {
    pub tape: &'a [Symbol],
    pub head: i64,
    pub state: StateId,
    pub steps: usize,
}

/// The outcome of a single `TapeMachine::step` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// The machine performed a transition and can continue.
    Continue,
    /// The machine has stopped.
    Done(Termination),
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Termination {
    /// The halting state was reached.
    Halted,
    /// The step budget ran out before the machine halted.
    BudgetExhausted,
    /// The run aborted with an engine error.
    Failed(RunError),
}

/// The final machine configuration and its termination classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunResult {
    pub final_tape: Vec<Symbol>,
    pub final_head: i64,
    pub final_state: StateId,
    pub steps_taken: usize,
    pub termination: Termination,
}

/// Errors raised by the engine while executing a program.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum RunError {
    /// The current card has no action for the symbol under the head.
    #[error("No action defined for symbol {symbol:?} at cell {head}")]
    UndefinedSymbol { symbol: Symbol, head: usize },
    /// The machine entered a state that has no card in the program.
    #[error("Unknown state: {0}")]
    UnknownState(StateId),
    /// The head left the tape.
    #[error("Head position {head} is outside the tape (length {len})")]
    OutOfBounds { head: i64, len: usize },
}

/// Represents the errors surfaced by the library.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TapeCardError {
    /// The engine aborted a run.
    #[error("Run error: {0}")]
    Run(#[from] RunError),
    /// Indicates an error during the parsing of a program or tape definition.
    #[error("Program parsing error: {0}")]
    ParseError(#[from] Box<pest::error::Error<Rule>>),
    /// Indicates a structural problem with a program or its input tape.
    #[error("Program validation error: {0}")]
    ValidationError(String),
    /// Indicates an error related to reading program files.
    #[error("File error: {0}")]
    FileError(String),
}
