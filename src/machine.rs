//! This module defines the execution engine: the `step` function that applies one card
//! action to the tape, the `TapeMachine` that drives repeated steps, and the `run` entry
//! point that executes a program until it halts, exhausts its budget or fails.

use tracing::{debug, trace};

use crate::types::{
    Action, Card, MachineState, Program, RunError, RunResult, StateId, Step, StepOutcome,
    Symbol, TapeCardError, Termination,
};

/// Receives a snapshot of the machine after every completed step.
///
/// Any `FnMut(&MachineState)` closure is an observer.
pub trait Observer {
    fn observe(&mut self, snapshot: &MachineState<'_>);
}

impl<F> Observer for F
where
    F: FnMut(&MachineState<'_>),
{
    fn observe(&mut self, snapshot: &MachineState<'_>) {
        self(snapshot)
    }
}

/// Executes a single action against the tape.
///
/// Reads the symbol under `head`, looks up its action in `card`, writes the action's symbol
/// in place and returns the written symbol, the displaced head position and the next state.
/// The new head position is not bounds-checked; it may be negative or past the end.
///
/// # Errors
///
/// * `RunError::OutOfBounds` if `head` is not a valid index into `tape`.
/// * `RunError::UndefinedSymbol` if `card` has no action for the scanned symbol.
pub fn step(tape: &mut [Symbol], head: usize, card: &Card) -> Result<StepOutcome, RunError> {
    let len = tape.len();
    let cell = tape.get_mut(head).ok_or(RunError::OutOfBounds {
        head: signed(head),
        len,
    })?;

    let scanned = *cell;
    let action = card.get(scanned).ok_or(RunError::UndefinedSymbol {
        symbol: scanned,
        head,
    })?;

    *cell = action.write;

    Ok(StepOutcome {
        written: action.write,
        head: signed(head).saturating_add(action.step),
        next_state: action.next_state,
    })
}

/// Runs `program` over `tape` from `head` in `entry_state` until `halt_state` is reached,
/// `max_steps` transitions have been taken, or the engine fails.
///
/// The tape is moved into the run and handed back in the result, as last mutated.
/// If an observer is given it sees the machine after every completed step.
pub fn run(
    program: &Program,
    tape: Vec<Symbol>,
    head: i64,
    entry_state: StateId,
    halt_state: StateId,
    max_steps: usize,
    observer: Option<&mut dyn Observer>,
) -> RunResult {
    let mut machine = TapeMachine::new(program, tape, head).with_states(entry_state, halt_state);
    let termination = machine.run(max_steps, observer);
    machine.into_result(termination)
}

/// A card program bound to a tape.
///
/// The machine exclusively owns its tape and head for the lifetime of a run; the
/// program is borrowed and never mutated.
#[derive(Debug, Clone)]
pub struct TapeMachine<'p> {
    program: &'p Program,
    tape: Vec<Symbol>,
    head: i64,
    state: StateId,
    entry_state: StateId,
    halt_state: StateId,
    step_count: usize,
    failure: Option<RunError>,
    initial_tape: Vec<Symbol>,
    initial_head: i64,
}

impl<'p> TapeMachine<'p> {
    /// Creates a machine in the program's entry state over the given tape.
    pub fn new(program: &'p Program, tape: Vec<Symbol>, head: i64) -> Self {
        Self {
            program,
            initial_tape: tape.clone(),
            initial_head: head,
            tape,
            head,
            state: program.entry_state,
            entry_state: program.entry_state,
            halt_state: program.halt_state,
            step_count: 0,
            failure: None,
        }
    }

    /// Creates a machine over the program's own default tape.
    ///
    /// # Returns
    ///
    /// * `Err(TapeCardError::ValidationError)` if the program declares no tape.
    pub fn from_input(program: &'p Program) -> Result<Self, TapeCardError> {
        let input = program.input.as_ref().ok_or_else(|| {
            TapeCardError::ValidationError(format!(
                "Program '{}' does not declare a tape",
                program.name
            ))
        })?;

        Ok(Self::new(program, input.cells.clone(), signed(input.head)))
    }

    /// Overrides the entry and halting states, restarting from the entry state.
    pub fn with_states(mut self, entry_state: StateId, halt_state: StateId) -> Self {
        self.entry_state = entry_state;
        self.halt_state = halt_state;
        self.state = entry_state;
        self
    }

    /// Executes one iteration of the run loop.
    ///
    /// # Returns
    ///
    /// * `Step::Continue` if a transition was taken.
    /// * `Step::Done(Termination::Halted)` if the machine is in the halting state.
    /// * `Step::Done(Termination::Failed(_))` if the transition could not be taken. The
    ///   failure is sticky: later calls report it again without touching the tape.
    pub fn step(&mut self) -> Step {
        if self.is_halted() {
            return Step::Done(Termination::Halted);
        }

        if let Some(error) = &self.failure {
            return Step::Done(Termination::Failed(error.clone()));
        }

        match self.advance() {
            Ok(()) => Step::Continue,
            Err(error) => {
                debug!(state = self.state, head = self.head, %error, "run failed");
                self.failure = Some(error.clone());
                Step::Done(Termination::Failed(error))
            }
        }
    }

    fn advance(&mut self) -> Result<(), RunError> {
        let program = self.program;
        let card = program
            .card(self.state)
            .ok_or(RunError::UnknownState(self.state))?;
        let index = self.index()?;

        let outcome = step(&mut self.tape, index, card)?;

        trace!(
            step = self.step_count + 1,
            state = self.state,
            head = index,
            wrote = %outcome.written,
            next_state = outcome.next_state,
            "step"
        );

        self.head = outcome.head;
        self.state = outcome.next_state;
        self.step_count += 1;

        Ok(())
    }

    /// Runs until the machine halts, fails, or has taken `max_steps` steps in total.
    pub fn run(&mut self, max_steps: usize, mut observer: Option<&mut dyn Observer>) -> Termination {
        debug!(
            program = %self.program.name,
            entry_state = self.entry_state,
            halt_state = self.halt_state,
            head = self.head,
            max_steps,
            "run started"
        );

        let termination = loop {
            if self.termination().is_none() && self.step_count >= max_steps {
                break Termination::BudgetExhausted;
            }

            match self.step() {
                Step::Continue => {
                    if let Some(observer) = observer.as_deref_mut() {
                        observer.observe(&self.snapshot());
                    }
                }
                Step::Done(termination) => break termination,
            }
        };

        debug!(
            steps = self.step_count,
            state = self.state,
            head = self.head,
            ?termination,
            "run finished"
        );

        termination
    }

    /// Returns the termination the machine has already reached, if any.
    pub fn termination(&self) -> Option<Termination> {
        if self.is_halted() {
            Some(Termination::Halted)
        } else {
            self.failure.clone().map(Termination::Failed)
        }
    }

    /// Restores the initial tape, head, entry state and step count.
    pub fn reset(&mut self) {
        self.tape = self.initial_tape.clone();
        self.head = self.initial_head;
        self.state = self.entry_state;
        self.step_count = 0;
        self.failure = None;
    }

    /// Consumes the machine, producing the final configuration for `termination`.
    pub fn into_result(self, termination: Termination) -> RunResult {
        RunResult {
            final_tape: self.tape,
            final_head: self.head,
            final_state: self.state,
            steps_taken: self.step_count,
            termination,
        }
    }

    /// Returns a borrowed view of the current configuration.
    pub fn snapshot(&self) -> MachineState<'_> {
        MachineState {
            tape: &self.tape,
            head: self.head,
            state: self.state,
            steps: self.step_count,
        }
    }

    pub fn program(&self) -> &'p Program {
        self.program
    }

    pub fn state(&self) -> StateId {
        self.state
    }

    pub fn entry_state(&self) -> StateId {
        self.entry_state
    }

    pub fn halt_state(&self) -> StateId {
        self.halt_state
    }

    pub fn head(&self) -> i64 {
        self.head
    }

    pub fn tape(&self) -> &[Symbol] {
        &self.tape
    }

    pub fn step_count(&self) -> usize {
        self.step_count
    }

    /// Checks if the machine is in its halting state.
    pub fn is_halted(&self) -> bool {
        self.state == self.halt_state
    }

    /// Returns the symbol under the head, or `None` if the head is off the tape.
    pub fn symbol(&self) -> Option<Symbol> {
        self.index().ok().map(|index| self.tape[index])
    }

    /// Returns the action the next step would take, if the current state and symbol define one.
    pub fn action(&self) -> Option<&'p Action> {
        if self.is_halted() {
            return None;
        }

        let program = self.program;
        program.card(self.state)?.get(self.symbol()?)
    }

    fn index(&self) -> Result<usize, RunError> {
        usize::try_from(self.head)
            .ok()
            .filter(|&index| index < self.tape.len())
            .ok_or(RunError::OutOfBounds {
                head: self.head,
                len: self.tape.len(),
            })
    }
}

fn signed(index: usize) -> i64 {
    i64::try_from(index).unwrap_or(i64::MAX)
}
