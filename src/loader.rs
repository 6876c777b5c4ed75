//! This module provides the `ProgramLoader` struct, responsible for loading card programs
//! and tape presets from files, strings and directories.

use crate::parser::{parse, parse_presets};
use crate::types::{Program, TapeCardError, TapePreset};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// File extension of program files.
pub const PROGRAM_EXTENSION: &str = "cards";

/// `ProgramLoader` is a utility struct for loading card programs.
/// It provides methods to load programs from individual files, from string content,
/// and to discover and load all `.cards` files within a specified directory.
pub struct ProgramLoader;

impl ProgramLoader {
    /// Loads a single program from the specified file path.
    ///
    /// # Returns
    ///
    /// * `Ok(Program)` if the file is successfully read and parsed into a `Program`.
    /// * `Err(TapeCardError::FileError)` if the file cannot be read.
    /// * `Err(TapeCardError::ParseError)` if the file content is not a valid program.
    pub fn load_program(path: &Path) -> Result<Program, TapeCardError> {
        debug!(path = %path.display(), "loading program");
        parse(&read(path)?)
    }

    /// Loads a single program from the provided string content.
    ///
    /// This is useful for programs that are not stored in files, e.g. piped through stdin.
    pub fn load_program_from_string(content: &str) -> Result<Program, TapeCardError> {
        parse(content)
    }

    /// Loads a list of tape presets from the specified file path.
    pub fn load_presets(path: &Path) -> Result<Vec<TapePreset>, TapeCardError> {
        debug!(path = %path.display(), "loading presets");
        parse_presets(&read(path)?)
    }

    /// Loads all program files (`.cards` extension) from a given directory.
    ///
    /// Directories and files with other extensions are skipped. Entries are returned in
    /// path order, each either the loaded program with its path or the error that
    /// prevented loading it.
    pub fn load_programs(directory: &Path) -> Vec<Result<(PathBuf, Program), TapeCardError>> {
        if !directory.exists() {
            return vec![Err(TapeCardError::FileError(format!(
                "Directory {} does not exist",
                directory.display()
            )))];
        }

        let entries = match fs::read_dir(directory) {
            Ok(entries) => entries,
            Err(e) => {
                return vec![Err(TapeCardError::FileError(format!(
                    "Failed to read directory {}: {}",
                    directory.display(),
                    e
                )))]
            }
        };

        let mut paths = Vec::new();
        let mut results = Vec::new();

        for entry in entries {
            match entry {
                Ok(entry) => paths.push(entry.path()),
                Err(e) => results.push(Err(TapeCardError::FileError(format!(
                    "Failed to read directory entry: {}",
                    e
                )))),
            }
        }

        paths.sort();

        results.extend(
            paths
                .into_iter()
                .filter(|path| {
                    !path.is_dir()
                        && path
                            .extension()
                            .is_some_and(|ext| ext == PROGRAM_EXTENSION)
                })
                .map(|path| match Self::load_program(&path) {
                    Ok(program) => Ok((path, program)),
                    Err(e) => Err(TapeCardError::FileError(format!(
                        "Failed to load program from {}: {}",
                        path.display(),
                        e
                    ))),
                }),
        );

        results
    }
}

fn read(path: &Path) -> Result<String, TapeCardError> {
    fs::read_to_string(path).map_err(|e| {
        TapeCardError::FileError(format!("Failed to read file {}: {}", path.display(), e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    const VALID_PROGRAM: &str =
        "name: Test Program\ntape: a, b\ncards:\n  1:\n    a -> b, +1, 0\n    b -> a, -1, 1";

    fn write_file(path: &Path, content: &str) {
        let mut file = File::create(path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
    }

    #[test]
    fn test_load_valid_program() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("test.cards");
        write_file(&file_path, VALID_PROGRAM);

        let program = ProgramLoader::load_program(&file_path).unwrap();

        assert_eq!(program.name, "Test Program");
        assert_eq!(program.input.as_ref().unwrap().cells, vec!['a', 'b']);
        assert!(program.card(1).is_some());
    }

    #[test]
    fn test_load_invalid_program() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("invalid.cards");
        write_file(&file_path, "This is not a valid program");

        let result = ProgramLoader::load_program(&file_path);
        assert!(matches!(result, Err(TapeCardError::ParseError(_))));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempdir().unwrap();
        let result = ProgramLoader::load_program(&dir.path().join("missing.cards"));

        assert!(matches!(result, Err(TapeCardError::FileError(_))));
    }

    #[test]
    fn test_load_presets() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("presets.tapes");
        write_file(&file_path, "pair @ 1: _, 1, 1, _\n");

        let presets = ProgramLoader::load_presets(&file_path).unwrap();

        assert_eq!(presets.len(), 1);
        assert_eq!(presets[0].head, 1);
    }

    #[test]
    fn test_load_programs_from_directory() {
        let dir = tempdir().unwrap();

        write_file(&dir.path().join("valid.cards"), VALID_PROGRAM);
        write_file(&dir.path().join("invalid.cards"), "This is not a valid program");
        write_file(&dir.path().join("ignored.txt"), "This file should be ignored");
        std::fs::create_dir(dir.path().join("nested.cards")).unwrap();

        let results = ProgramLoader::load_programs(dir.path());

        // Sorted by path: invalid.cards, then valid.cards
        assert_eq!(results.len(), 2);
        assert!(results[0].is_err());
        let (path, program) = results[1].as_ref().unwrap();
        assert!(path.ends_with("valid.cards"));
        assert_eq!(program.name, "Test Program");
    }

    #[test]
    fn test_load_programs_from_missing_directory() {
        let dir = tempdir().unwrap();
        let results = ProgramLoader::load_programs(&dir.path().join("nowhere"));

        assert_eq!(results.len(), 1);
        assert!(matches!(results[0], Err(TapeCardError::FileError(_))));
    }
}
