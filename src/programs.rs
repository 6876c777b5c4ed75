use crate::loader::ProgramLoader;
use crate::parser::{parse, parse_presets};
use crate::types::{Program, StateId, TapeCardError, TapePreset};

use std::path::Path;
use tracing::warn;

// Default embedded programs
const PROGRAM_TEXTS: [&str; 10] = [
    include_str!("../programs/trailing-blank.cards"),
    include_str!("../programs/increment.cards"),
    include_str!("../programs/bitwise-not.cards"),
    include_str!("../programs/and-gate.cards"),
    include_str!("../programs/or-gate.cards"),
    include_str!("../programs/xor-gate.cards"),
    include_str!("../programs/copy-word.cards"),
    include_str!("../programs/unary-addition.cards"),
    include_str!("../programs/decrement.cards"),
    include_str!("../programs/word-equality.cards"),
];

const PRESET_TEXT: &str = include_str!("../programs/presets.tapes");

lazy_static::lazy_static! {
    /// The embedded catalog, parsed on first use.
    pub static ref CATALOG: Catalog = Catalog::embedded();
}

/// A registry of named programs and tape presets, selected at runtime by name or index.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    programs: Vec<Program>,
    presets: Vec<TapePreset>,
}

impl Catalog {
    pub fn new(programs: Vec<Program>, presets: Vec<TapePreset>) -> Self {
        Self { programs, presets }
    }

    /// Builds the catalog of embedded example programs and presets.
    pub fn embedded() -> Self {
        let mut programs = Vec::new();

        for program_text in PROGRAM_TEXTS {
            match parse(program_text) {
                Ok(program) => programs.push(program),
                Err(e) => warn!(error = %e, "failed to parse embedded program"),
            }
        }

        let presets = parse_presets(PRESET_TEXT).unwrap_or_else(|e| {
            warn!(error = %e, "failed to parse embedded presets");
            Vec::new()
        });

        Self::new(programs, presets)
    }

    /// Adds every `.cards` program found in `directory`.
    ///
    /// Programs whose name is already taken are skipped. Returns the errors for files that
    /// could not be loaded.
    pub fn extend_from_directory(&mut self, directory: &Path) -> Vec<TapeCardError> {
        let mut errors = Vec::new();

        for result in ProgramLoader::load_programs(directory) {
            match result {
                Ok((path, program)) => {
                    if self.program(&program.name).is_ok() {
                        warn!(path = %path.display(), name = %program.name, "duplicate program name, skipping");
                        continue;
                    }
                    self.programs.push(program);
                }
                Err(e) => errors.push(e),
            }
        }

        errors
    }

    /// Get the number of available programs
    pub fn len(&self) -> usize {
        self.programs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.programs.is_empty()
    }

    pub fn programs(&self) -> &[Program] {
        &self.programs
    }

    pub fn presets(&self) -> &[TapePreset] {
        &self.presets
    }

    /// Get a program by its name, ignoring case
    pub fn program(&self, name: &str) -> Result<&Program, TapeCardError> {
        self.programs
            .iter()
            .find(|program| program.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| TapeCardError::ValidationError(format!("Program '{}' not found", name)))
    }

    /// Get a program by its index
    pub fn program_by_index(&self, index: usize) -> Result<&Program, TapeCardError> {
        self.programs.get(index).ok_or_else(|| {
            TapeCardError::ValidationError(format!("Program index {} out of range", index))
        })
    }

    /// Get a tape preset by its name, ignoring case
    pub fn preset(&self, name: &str) -> Result<&TapePreset, TapeCardError> {
        self.presets
            .iter()
            .find(|preset| preset.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| TapeCardError::ValidationError(format!("Preset '{}' not found", name)))
    }

    /// List all program names
    pub fn names(&self) -> Vec<&str> {
        self.programs
            .iter()
            .map(|program| program.name.as_str())
            .collect()
    }

    /// Search for programs by name
    pub fn search(&self, query: &str) -> Vec<usize> {
        let query = query.to_lowercase();

        self.programs
            .iter()
            .enumerate()
            .filter(|(_, program)| program.name.to_lowercase().contains(&query))
            .map(|(index, _)| index)
            .collect()
    }

    /// Get information about a program by its index
    pub fn info(&self, index: usize) -> Result<ProgramInfo, TapeCardError> {
        let program = self.program_by_index(index)?;

        Ok(ProgramInfo {
            index,
            name: program.name.clone(),
            entry_state: program.entry_state,
            halt_state: program.halt_state,
            state_count: program.cards().count(),
            action_count: program.action_count(),
            tape_len: program.input.as_ref().map_or(0, |input| input.cells.len()),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramInfo {
    pub index: usize,
    pub name: String,
    pub entry_state: StateId,
    pub halt_state: StateId,
    pub state_count: usize,
    pub action_count: usize,
    pub tape_len: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::{check_tape, validate};
    use crate::machine::TapeMachine;
    use crate::types::{Termination, DEFAULT_MAX_STEPS};
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_catalog_initialization() {
        assert_eq!(CATALOG.len(), PROGRAM_TEXTS.len());
        assert_eq!(CATALOG.presets().len(), 7);
    }

    #[test]
    fn test_all_programs_are_valid() {
        for program in CATALOG.programs() {
            assert_eq!(validate(program), Vec::new(), "{} is invalid", program.name);

            let input = program.input.as_ref().unwrap();
            assert_eq!(
                check_tape(program, &input.cells, input.head),
                Vec::new(),
                "{} has an invalid tape",
                program.name
            );
        }
    }

    #[test]
    fn test_all_presets_fit_their_tapes() {
        for preset in CATALOG.presets() {
            assert!(preset.head < preset.cells.len(), "{}", preset.name);
        }
    }

    #[test]
    fn test_programs_halt_on_their_own_tape() {
        for program in CATALOG.programs() {
            let mut machine = TapeMachine::from_input(program).unwrap();
            let termination = machine.run(DEFAULT_MAX_STEPS, None);

            assert_eq!(
                termination,
                Termination::Halted,
                "{} did not halt",
                program.name
            );
        }
    }

    #[test]
    fn test_catalog_get_program_by_name() {
        let program = CATALOG.program("binary increment").unwrap();
        assert_eq!(program.name, "Binary increment");

        assert!(CATALOG.program("Nonexistent").is_err());
    }

    #[test]
    fn test_catalog_get_program_by_index() {
        assert!(CATALOG.program_by_index(0).is_ok());
        assert!(CATALOG.program_by_index(999).is_err());
    }

    #[test]
    fn test_catalog_get_preset() {
        let preset = CATALOG.preset("ones-run").unwrap();

        assert_eq!(preset.head, 15);
        assert_eq!(preset.cells[preset.head], '_');
        assert!(CATALOG.preset("missing").is_err());
    }

    #[test]
    fn test_catalog_list_names() {
        let names = CATALOG.names();

        assert!(names.contains(&"Binary increment"));
        assert!(names.contains(&"Binary decrement"));
        assert!(names.contains(&"XOR gate"));
        assert!(names.contains(&"Word equality"));
    }

    #[test]
    fn test_catalog_search() {
        assert_eq!(CATALOG.search("binary").len(), 2);
        assert_eq!(CATALOG.search("GATE").len(), 3);
        assert!(CATALOG.search("nonexistent").is_empty());
    }

    #[test]
    fn test_catalog_info() {
        let index = CATALOG.search("increment")[0];
        let info = CATALOG.info(index).unwrap();

        assert_eq!(info.name, "Binary increment");
        assert_eq!(info.entry_state, 1);
        assert_eq!(info.halt_state, 0);
        assert_eq!(info.state_count, 3);
        assert_eq!(info.action_count, 9);
        assert_eq!(info.tape_len, 15);

        assert!(CATALOG.info(999).is_err());
    }

    #[test]
    fn test_catalog_extend_from_directory() {
        let dir = tempdir().unwrap();

        let mut file = File::create(dir.path().join("custom.cards")).unwrap();
        file.write_all(b"name: Custom Program\ncards:\n  1:\n    x -> y, +1, 0")
            .unwrap();

        let mut file = File::create(dir.path().join("duplicate.cards")).unwrap();
        file.write_all(b"name: XOR gate\ncards:\n  1:\n    x -> y, +1, 0")
            .unwrap();

        let mut file = File::create(dir.path().join("broken.cards")).unwrap();
        file.write_all(b"not a program").unwrap();

        let mut catalog = Catalog::embedded();
        let errors = catalog.extend_from_directory(dir.path());

        assert_eq!(errors.len(), 1);
        assert_eq!(catalog.len(), PROGRAM_TEXTS.len() + 1);
        assert!(catalog.program("custom program").is_ok());
    }
}
