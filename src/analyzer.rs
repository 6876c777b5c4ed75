//! This module provides functions for analyzing card programs before execution. It checks
//! that every card covers the alphabet, that every referenced state exists, that the halting
//! state carries no card, and that a tape and head are usable with a program.

use crate::types::{Program, State, StateId, Symbol, TapeCardError};
use std::collections::{BTreeSet, HashSet};
use thiserror::Error;

/// Represents the problems that can be found while analyzing a program or its input tape.
#[derive(Debug, PartialEq, Eq, Clone, Error)]
pub enum ValidationError {
    /// The program declares no readable symbols.
    #[error("Program declares an empty alphabet")]
    EmptyAlphabet,
    /// The entry state has no card and is not the halting state.
    #[error("Invalid entry state: {0}")]
    InvalidEntryState(StateId),
    /// The halting state has been given an executable card.
    #[error("Halting state {0} must not have a card")]
    HaltingStateHasCard(StateId),
    /// A halting placeholder is declared under an id that is not the halting state.
    #[error("State {0} is a halting placeholder but is not the halting state")]
    StrayHaltingState(StateId),
    /// A card does not define actions for every symbol in the alphabet.
    #[error("Card {state} has no action for symbols {symbols:?}")]
    MissingSymbols { state: StateId, symbols: Vec<Symbol> },
    /// A card reads symbols that are not in the alphabet.
    #[error("Card {state} reads undeclared symbols {symbols:?}")]
    UndeclaredSymbols { state: StateId, symbols: Vec<Symbol> },
    /// A card writes symbols that are neither in the alphabet nor declared markers.
    #[error("Card {state} writes undeclared symbols {symbols:?}")]
    UndeclaredWrites { state: StateId, symbols: Vec<Symbol> },
    /// An action moves to a state that the program does not declare.
    #[error("Card {state} on {symbol:?} moves to undefined state {next_state}")]
    UndefinedNextState {
        state: StateId,
        symbol: Symbol,
        next_state: StateId,
    },
    /// Executable states that cannot be reached from the entry state.
    #[error("Unreachable states detected: {0:?}")]
    UnreachableStates(Vec<StateId>),
    /// The starting head position lies outside the tape.
    #[error("Invalid head position {head} for a tape of length {len}")]
    InvalidHead { head: usize, len: usize },
    /// The tape contains symbols the program does not declare.
    #[error("Tape contains undeclared symbols {0:?}")]
    InvalidTapeSymbols(Vec<Symbol>),
}

impl From<ValidationError> for TapeCardError {
    /// Converts a `ValidationError` into a `TapeCardError::ValidationError`.
    fn from(error: ValidationError) -> Self {
        TapeCardError::ValidationError(error.to_string())
    }
}

/// Validates the structure of a program.
///
/// The checks never mutate the program and always report problems in the same order, so
/// validating an unchanged program twice gives identical results. An empty list means the
/// program is well formed.
pub fn validate(program: &Program) -> Vec<ValidationError> {
    let checks: [fn(&Program) -> Vec<ValidationError>; 5] = [
        check_alphabet,
        check_entry_state,
        check_halting_state,
        check_cards,
        check_unreachable_states,
    ];

    checks.iter().flat_map(|check| check(program)).collect()
}

/// Validates a program and, if it declares a default tape, that tape too.
///
/// # Returns
///
/// * `Ok(())` if no problems are found.
/// * `Err(TapeCardError::ValidationError)` describing the first problem otherwise.
pub fn analyze(program: &Program) -> Result<(), TapeCardError> {
    let mut errors = validate(program);

    if let Some(input) = &program.input {
        errors.extend(check_tape(program, &input.cells, input.head));
    }

    match errors.into_iter().next() {
        Some(first_error) => Err(first_error.into()),
        None => Ok(()),
    }
}

/// Checks that a tape and starting head position can be used with a program.
///
/// Every cell must hold a symbol from the alphabet or the markers, and the head must
/// start on the tape.
pub fn check_tape(program: &Program, tape: &[Symbol], head: usize) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if head >= tape.len() {
        errors.push(ValidationError::InvalidHead {
            head,
            len: tape.len(),
        });
    }

    let unknown: BTreeSet<Symbol> = tape
        .iter()
        .copied()
        .filter(|symbol| !program.alphabet.contains(symbol) && !program.markers.contains(symbol))
        .collect();

    if !unknown.is_empty() {
        errors.push(ValidationError::InvalidTapeSymbols(
            unknown.into_iter().collect(),
        ));
    }

    errors
}

fn check_alphabet(program: &Program) -> Vec<ValidationError> {
    if program.alphabet.is_empty() {
        vec![ValidationError::EmptyAlphabet]
    } else {
        Vec::new()
    }
}

/// The entry state must have a card, unless the program starts out halted.
fn check_entry_state(program: &Program) -> Vec<ValidationError> {
    if program.entry_state != program.halt_state && program.card(program.entry_state).is_none() {
        vec![ValidationError::InvalidEntryState(program.entry_state)]
    } else {
        Vec::new()
    }
}

/// The halting state may only appear as a placeholder, and placeholders may only appear
/// under the halting state.
fn check_halting_state(program: &Program) -> Vec<ValidationError> {
    program
        .states
        .iter()
        .filter_map(|(&id, state)| match state {
            State::Executable(_) if id == program.halt_state => {
                Some(ValidationError::HaltingStateHasCard(id))
            }
            State::Halting if id != program.halt_state => {
                Some(ValidationError::StrayHaltingState(id))
            }
            _ => None,
        })
        .collect()
}

/// Checks each card for alphabet coverage, declared reads and writes, and defined next states.
fn check_cards(program: &Program) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    for (state, card) in program.cards() {
        if state == program.halt_state {
            continue;
        }

        let reads: BTreeSet<Symbol> = card.symbols().collect();

        let missing: Vec<Symbol> = program.alphabet.difference(&reads).copied().collect();
        if !missing.is_empty() {
            errors.push(ValidationError::MissingSymbols {
                state,
                symbols: missing,
            });
        }

        let undeclared: Vec<Symbol> = reads.difference(&program.alphabet).copied().collect();
        if !undeclared.is_empty() {
            errors.push(ValidationError::UndeclaredSymbols {
                state,
                symbols: undeclared,
            });
        }

        let writes: BTreeSet<Symbol> = card
            .actions()
            .map(|(_, action)| action.write)
            .filter(|write| !program.alphabet.contains(write) && !program.markers.contains(write))
            .collect();
        if !writes.is_empty() {
            errors.push(ValidationError::UndeclaredWrites {
                state,
                symbols: writes.into_iter().collect(),
            });
        }

        for (symbol, action) in card.actions() {
            if action.next_state != program.halt_state && program.card(action.next_state).is_none()
            {
                errors.push(ValidationError::UndefinedNextState {
                    state,
                    symbol,
                    next_state: action.next_state,
                });
            }
        }
    }

    errors
}

/// Checks for executable states that no sequence of transitions from the entry state reaches.
fn check_unreachable_states(program: &Program) -> Vec<ValidationError> {
    let mut visited = HashSet::new();
    let mut queue = vec![program.entry_state];

    while let Some(state) = queue.pop() {
        if !visited.insert(state) {
            continue;
        }

        if state == program.halt_state {
            continue;
        }

        if let Some(card) = program.card(state) {
            queue.extend(
                card.actions()
                    .map(|(_, action)| action.next_state)
                    .filter(|next| !visited.contains(next)),
            );
        }
    }

    let unreachable: Vec<StateId> = program
        .cards()
        .map(|(id, _)| id)
        .filter(|id| *id != program.halt_state && !visited.contains(id))
        .collect();

    if unreachable.is_empty() {
        Vec::new()
    } else {
        vec![ValidationError::UnreachableStates(unreachable)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Action, Card, TapePreset, HALT_STATE};

    fn card(actions: &[(Symbol, Symbol, i64, StateId)]) -> Card {
        actions
            .iter()
            .map(|&(read, write, step, next)| (read, Action::new(write, step, next)))
            .collect()
    }

    fn create_test_program() -> Program {
        let mut program = Program::new("Test Program");
        program.alphabet = ['_', '0', '1'].into_iter().collect();
        program.markers = ['E'].into_iter().collect();
        program.states.insert(HALT_STATE, State::Halting);
        program.states.insert(
            1,
            State::Executable(card(&[('_', '_', 1, 2), ('0', 'E', 0, 0), ('1', 'E', 0, 0)])),
        );
        program.states.insert(
            2,
            State::Executable(card(&[('_', '_', 0, 0), ('0', '0', 1, 2), ('1', '1', 1, 2)])),
        );
        program
    }

    #[test]
    fn test_valid_program() {
        let program = create_test_program();

        assert_eq!(validate(&program), Vec::new());
        assert!(analyze(&program).is_ok());
    }

    #[test]
    fn test_halting_placeholder_is_optional() {
        let mut program = create_test_program();
        program.states.remove(&HALT_STATE);

        assert_eq!(validate(&program), Vec::new());
    }

    #[test]
    fn test_empty_alphabet() {
        let mut program = create_test_program();
        program.alphabet.clear();

        let errors = validate(&program);
        assert_eq!(errors[0], ValidationError::EmptyAlphabet);
    }

    #[test]
    fn test_missing_symbols() {
        let mut program = create_test_program();
        program
            .states
            .insert(2, State::Executable(card(&[('_', '_', 0, 0)])));

        assert_eq!(
            validate(&program),
            vec![ValidationError::MissingSymbols {
                state: 2,
                symbols: vec!['0', '1'],
            }]
        );
    }

    #[test]
    fn test_undeclared_reads_and_writes() {
        let mut program = create_test_program();
        program.states.insert(
            2,
            State::Executable(card(&[
                ('_', '_', 0, 0),
                ('0', '0', 1, 2),
                ('1', 'X', 1, 2),
                ('x', '1', 1, 2),
            ])),
        );

        assert_eq!(
            validate(&program),
            vec![
                ValidationError::UndeclaredSymbols {
                    state: 2,
                    symbols: vec!['x'],
                },
                ValidationError::UndeclaredWrites {
                    state: 2,
                    symbols: vec!['X'],
                },
            ]
        );
    }

    #[test]
    fn test_undefined_next_state() {
        let mut program = create_test_program();
        program.states.insert(
            2,
            State::Executable(card(&[('_', '_', 0, 0), ('0', '0', 1, 5), ('1', '1', 1, 2)])),
        );

        assert_eq!(
            validate(&program),
            vec![ValidationError::UndefinedNextState {
                state: 2,
                symbol: '0',
                next_state: 5,
            }]
        );
    }

    #[test]
    fn test_halting_state_with_card() {
        let mut program = create_test_program();
        program
            .states
            .insert(HALT_STATE, State::Executable(card(&[('_', '_', 0, 0)])));

        assert_eq!(
            validate(&program),
            vec![ValidationError::HaltingStateHasCard(HALT_STATE)]
        );
    }

    #[test]
    fn test_stray_halting_state() {
        let mut program = create_test_program();
        program.states.insert(4, State::Halting);

        assert_eq!(
            validate(&program),
            vec![ValidationError::StrayHaltingState(4)]
        );
    }

    #[test]
    fn test_invalid_entry_state() {
        let mut program = create_test_program();
        program.entry_state = 3;

        let errors = validate(&program);
        assert_eq!(errors[0], ValidationError::InvalidEntryState(3));
    }

    #[test]
    fn test_unreachable_states() {
        let mut program = create_test_program();
        program.states.insert(
            3,
            State::Executable(card(&[('_', '_', 1, 3), ('0', '0', 1, 3), ('1', '1', 1, 0)])),
        );

        assert_eq!(
            validate(&program),
            vec![ValidationError::UnreachableStates(vec![3])]
        );
    }

    #[test]
    fn test_validation_is_idempotent() {
        let mut program = create_test_program();
        program.entry_state = 3;
        program.states.insert(4, State::Halting);
        let before = program.clone();

        let first = validate(&program);
        let second = validate(&program);

        assert_eq!(first, second);
        assert_eq!(program, before);
    }

    #[test]
    fn test_check_tape() {
        let program = create_test_program();
        let tape: Vec<Symbol> = "_10E_".chars().collect();

        assert_eq!(check_tape(&program, &tape, 0), Vec::new());
        assert_eq!(
            check_tape(&program, &tape, 5),
            vec![ValidationError::InvalidHead { head: 5, len: 5 }]
        );

        let tape: Vec<Symbol> = "_1z2_".chars().collect();
        assert_eq!(
            check_tape(&program, &tape, 0),
            vec![ValidationError::InvalidTapeSymbols(vec!['2', 'z'])]
        );
    }

    #[test]
    fn test_analyze_checks_default_tape() {
        let mut program = create_test_program();
        program.input = Some(TapePreset {
            name: "bad".to_string(),
            cells: vec!['_', '1'],
            head: 9,
        });

        let result = analyze(&program);
        match result {
            Err(TapeCardError::ValidationError(msg)) => {
                assert!(msg.contains("Invalid head position 9"));
            }
            other => panic!("Expected ValidationError, got {:?}", other),
        }
    }

    #[test]
    fn test_validation_error_conversion() {
        let error = ValidationError::InvalidEntryState(5);
        let converted: TapeCardError = error.into();

        assert_eq!(
            converted.to_string(),
            "Program validation error: Invalid entry state: 5"
        );
    }
}
