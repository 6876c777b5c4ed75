//! This module renders programs, tapes and tape presets back into the text format read by
//! the parser, so programs built in code can be saved as `.cards` files.

use crate::types::{Program, State, Symbol, TapePreset};

/// Encodes a program into the `.cards` text format.
///
/// Entry and halting states are always written out. The halting placeholder becomes an
/// empty card under the halting id.
///
/// Parsing the output gives back an equal program only when the program validates. An empty
/// alphabet is omitted, so the parser infers one, and a halting placeholder under any other
/// id reads back as an executable state with an empty card.
pub fn encode(program: &Program) -> String {
    let mut lines = vec![format!("name: {}", program.name)];

    if !program.alphabet.is_empty() {
        lines.push(format!(
            "alphabet: {}",
            encode_tape(program.alphabet.iter().copied())
        ));
    }

    if !program.markers.is_empty() {
        lines.push(format!(
            "markers: {}",
            encode_tape(program.markers.iter().copied())
        ));
    }

    lines.push(format!("entry: {}", program.entry_state));
    lines.push(format!("halt: {}", program.halt_state));

    if let Some(input) = &program.input {
        lines.push(format!("tape: {}", encode_tape(input.cells.iter().copied())));
        lines.push(format!("head: {}", input.head));
    }

    lines.push("cards:".to_string());
    for (id, state) in &program.states {
        lines.push(format!("  {id}:"));

        if let State::Executable(card) = state {
            for (read, action) in card.actions() {
                lines.push(format!(
                    "    {} -> {}, {:+}, {}",
                    encode_symbol(read),
                    encode_symbol(action.write),
                    action.step,
                    action.next_state
                ));
            }
        }
    }

    lines.join("\n") + "\n"
}

/// Encodes tape cells as comma-separated symbols.
pub fn encode_tape(cells: impl IntoIterator<Item = Symbol>) -> String {
    cells
        .into_iter()
        .map(encode_symbol)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Encodes presets as `name @ head: cells` lines.
pub fn encode_presets(presets: &[TapePreset]) -> String {
    presets
        .iter()
        .map(|preset| {
            format!(
                "{} @ {}: {}\n",
                preset.name,
                preset.head,
                encode_tape(preset.cells.iter().copied())
            )
        })
        .collect()
}

/// Quotes symbols that would otherwise be read as separators or comments.
fn encode_symbol(symbol: Symbol) -> String {
    if symbol.is_whitespace() || symbol.is_control() || matches!(symbol, ',' | '\'' | '#') {
        format!("'{symbol}'")
    } else {
        symbol.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{parse, parse_presets};
    use crate::types::{Action, Card, HALT_STATE};

    fn create_test_program() -> Program {
        let mut program = Program::new("Encoded");
        program.alphabet = ['_', '0', '1', ','].into_iter().collect();
        program.markers = ['E'].into_iter().collect();
        program.states.insert(HALT_STATE, State::Halting);
        program.states.insert(
            1,
            State::Executable(Card::from_iter([
                ('_', Action::new('_', 1, 1)),
                ('0', Action::new('1', -2, 0)),
                ('1', Action::new('E', 0, 0)),
                (',', Action::new(',', 7, 1)),
            ])),
        );
        program.input = Some(TapePreset {
            name: "Encoded".to_string(),
            cells: vec!['_', ',', '0'],
            head: 1,
        });
        program
    }

    #[test]
    fn test_encode_layout() {
        let encoded = encode(&create_test_program());

        assert!(encoded.starts_with("name: Encoded\n"));
        assert!(encoded.contains("alphabet: ',', 0, 1, _\n"));
        assert!(encoded.contains("markers: E\n"));
        assert!(encoded.contains("tape: _, ',', 0\nhead: 1\n"));
        assert!(encoded.contains("  0:\n  1:\n"));
        assert!(encoded.contains("    0 -> 1, -2, 0\n"));
        assert!(encoded.contains("    _ -> _, +1, 1\n"));
    }

    #[test]
    fn test_encoded_program_parses_back() {
        let program = create_test_program();
        let parsed = parse(&encode(&program)).unwrap();

        assert_eq!(parsed, program);
    }

    #[test]
    fn test_invalid_program_does_not_parse_back_unchanged() {
        let mut program = Program::new("Lossy");
        program.states.insert(HALT_STATE, State::Halting);
        program.states.insert(
            1,
            State::Executable(Card::from_iter([('a', Action::new('b', 1, 0))])),
        );
        program.states.insert(4, State::Halting);

        let parsed = parse(&encode(&program)).unwrap();

        assert_eq!(parsed.alphabet, ['a'].into_iter().collect());
        assert_eq!(parsed.markers, ['b'].into_iter().collect());
        assert_eq!(parsed.states[&HALT_STATE], State::Halting);
        assert_eq!(parsed.states[&4], State::Executable(Card::new()));
    }

    #[test]
    fn test_encode_presets() {
        let presets = vec![TapePreset {
            name: "gap".to_string(),
            cells: vec!['1', ' ', '1'],
            head: 2,
        }];

        let encoded = encode_presets(&presets);
        assert_eq!(encoded, "gap @ 2: 1, ' ', 1\n");
        assert_eq!(parse_presets(&encoded).unwrap(), presets);
    }
}
