//! This module provides the parser for card programs, utilizing the `pest` crate.
//! It defines the grammar for `.cards` files and functions to parse the input into a `Program`,
//! as well as bare tapes and lists of tape presets.

use crate::types::{
    Action, Card, Program, State, StateId, Symbol, TapeCardError, TapePreset,
    BLANK_SYMBOL, DEFAULT_ENTRY_STATE, HALT_STATE, MAX_PROGRAM_SIZE,
};
use pest::{
    error::{Error, ErrorVariant},
    iterators::Pair,
    Parser as PestParser, Span,
};
use pest_derive::Parser as PestParser;
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// Derives a `PestParser` for the card grammar defined in `grammar.pest`.
#[derive(PestParser)]
#[grammar = "grammar.pest"]
pub struct CardParser;

/// Parses the given input string into a `Program`.
///
/// This is the main entry point for parsing program definitions. Parsing only checks the
/// syntax and section-level consistency; structural checks such as alphabet coverage are
/// left to `analyzer::validate`, so callers decide whether a flawed program may still run.
///
/// # Returns
///
/// * `Ok(Program)` if the input is successfully parsed.
/// * `Err(TapeCardError::ParseError)` if there are any syntax errors.
/// * `Err(TapeCardError::ValidationError)` if a required section is missing or the input is too large.
pub fn parse(input: &str) -> Result<Program, TapeCardError> {
    check_size(input)?;

    let root = CardParser::parse(Rule::program, input.trim())
        .map_err(|e| TapeCardError::ParseError(e.into()))?
        .next()
        .ok_or_else(|| TapeCardError::ValidationError("Empty program".to_string()))?;

    parse_program(root)
}

/// Parses a bare, comma-separated tape such as `_, 1, 0, 0, _`.
pub fn parse_tape(input: &str) -> Result<Vec<Symbol>, TapeCardError> {
    let root = CardParser::parse(Rule::tape_input, input.trim())
        .map_err(|e| TapeCardError::ParseError(e.into()))?
        .next()
        .ok_or_else(|| TapeCardError::ValidationError("Empty tape".to_string()))?;

    Ok(parse_symbols(root))
}

/// Parses a list of tape presets, one `name @ head: symbols` record per line.
pub fn parse_presets(input: &str) -> Result<Vec<TapePreset>, TapeCardError> {
    check_size(input)?;

    let root = CardParser::parse(Rule::presets, input.trim())
        .map_err(|e| TapeCardError::ParseError(e.into()))?
        .next()
        .ok_or_else(|| TapeCardError::ValidationError("Empty preset list".to_string()))?;

    let mut presets: Vec<TapePreset> = Vec::new();

    for pair in root.into_inner() {
        if pair.as_rule() != Rule::preset {
            continue;
        }

        let span = pair.as_span();
        let mut pairs = pair.into_inner();
        let name = next_pair(&mut pairs, span)?.as_str().to_string();
        let head = parse_index(next_pair(&mut pairs, span)?)?;
        let cells = parse_symbols(next_pair(&mut pairs, span)?);

        if presets.iter().any(|preset| preset.name == name) {
            return Err(parse_error(&format!("Duplicate preset: {name}"), span));
        }

        presets.push(TapePreset { name, cells, head });
    }

    Ok(presets)
}

/// Parses the top-level sections of a program from a `Pair<Rule::program>`.
fn parse_program(pair: Pair<Rule>) -> Result<Program, TapeCardError> {
    let mut name: Option<String> = None;
    let mut alphabet: Option<BTreeSet<Symbol>> = None;
    let mut markers: Option<BTreeSet<Symbol>> = None;
    let mut entry: Option<StateId> = None;
    let mut halt: Option<StateId> = None;
    let mut tape: Option<Vec<Symbol>> = None;
    let mut head: Option<usize> = None;
    let mut cards: Option<BTreeMap<StateId, Card>> = None;
    let mut seen = HashSet::new();

    for p in pair.into_inner() {
        let span = p.as_span();
        let rule = p.as_rule();

        check_unique_rule(rule, span, &mut seen)?;

        match rule {
            Rule::name => name = Some(parse_text(p, span)?),
            Rule::alphabet => alphabet = Some(parse_symbols(p).into_iter().collect()),
            Rule::markers => markers = Some(parse_symbols(p).into_iter().collect()),
            Rule::entry => entry = Some(parse_state_id(first_inner(p, span)?)?),
            Rule::halt => halt = Some(parse_state_id(first_inner(p, span)?)?),
            Rule::tape => tape = Some(parse_symbols(p)),
            Rule::head => head = Some(parse_index(first_inner(p, span)?)?),
            Rule::cards => cards = Some(parse_cards(p)?),
            _ => {} // EOI
        }
    }

    let name = check_required_rule(name, "name")?;
    let cards = check_required_rule(cards, "cards")?;
    let entry_state = entry.unwrap_or(DEFAULT_ENTRY_STATE);
    let halt_state = halt.unwrap_or(HALT_STATE);

    if head.is_some() && tape.is_none() {
        return Err(TapeCardError::ValidationError(
            "'head' requires a 'tape' section".to_string(),
        ));
    }

    let (alphabet, markers) = resolve_symbols(&cards, alphabet, markers);

    let states = cards
        .into_iter()
        .map(|(id, card)| {
            if id == halt_state && card.is_empty() {
                (id, State::Halting)
            } else {
                (id, State::Executable(card))
            }
        })
        .collect();

    let input = tape.map(|cells| TapePreset {
        name: name.clone(),
        cells,
        head: head.unwrap_or(0),
    });

    Ok(Program {
        name,
        alphabet,
        markers,
        entry_state,
        halt_state,
        states,
        input,
    })
}

/// Fills in omitted `alphabet` and `markers` sections.
///
/// Without an alphabet, every symbol some card reads is readable. Markers are only inferred
/// when neither section is given: then every written symbol no card reads is a marker.
fn resolve_symbols(
    cards: &BTreeMap<StateId, Card>,
    alphabet: Option<BTreeSet<Symbol>>,
    markers: Option<BTreeSet<Symbol>>,
) -> (BTreeSet<Symbol>, BTreeSet<Symbol>) {
    let inferred = alphabet.is_none();
    let alphabet = alphabet.unwrap_or_else(|| cards.values().flat_map(Card::symbols).collect());

    let markers = match markers {
        Some(markers) => markers,
        None if inferred => cards
            .values()
            .flat_map(|card| card.actions().map(|(_, action)| action.write))
            .filter(|write| !alphabet.contains(write))
            .collect(),
        None => BTreeSet::new(),
    };

    (alphabet, markers)
}

/// Parses the `cards:` section into a map of state ids to cards.
///
/// Card ids and the symbols within a card must be unique.
fn parse_cards(pair: Pair<Rule>) -> Result<BTreeMap<StateId, Card>, TapeCardError> {
    let mut cards = BTreeMap::new();

    for card_pair in pair.into_inner() {
        let span = card_pair.as_span();
        let mut pairs = card_pair.into_inner();
        let id = parse_state_id(next_pair(&mut pairs, span)?)?;

        if cards.contains_key(&id) {
            return Err(parse_error(&format!("Duplicate card: {id}"), span));
        }

        let mut card = Card::new();
        for action_pair in pairs {
            let action_span = action_pair.as_span();
            let (read, action) = parse_action(action_pair)?;

            if card.insert(read, action).is_some() {
                return Err(parse_error(
                    &format!("Duplicate action for symbol {read:?} in card {id}"),
                    action_span,
                ));
            }
        }

        cards.insert(id, card);
    }

    Ok(cards)
}

/// Parses a `read -> write, offset, next_state` line.
fn parse_action(pair: Pair<Rule>) -> Result<(Symbol, Action), TapeCardError> {
    let span = pair.as_span();
    let mut pairs = pair.into_inner();

    let read = parse_symbol(next_pair(&mut pairs, span)?.as_str());
    let write = parse_symbol(next_pair(&mut pairs, span)?.as_str());
    let step = parse_offset(next_pair(&mut pairs, span)?)?;
    let next_state = parse_state_id(next_pair(&mut pairs, span)?)?;

    Ok((read, Action::new(write, step, next_state)))
}

/// Collects every `symbol` below `pair`, in order.
fn parse_symbols(pair: Pair<Rule>) -> Vec<Symbol> {
    pair.into_inner()
        .flatten()
        .filter(|p| p.as_rule() == Rule::symbol)
        .map(|p| parse_symbol(p.as_str()))
        .collect()
}

/// Parses a single character symbol, handling quoted and unquoted symbols.
fn parse_symbol(input: &str) -> Symbol {
    let mut chars = input.chars();
    match (chars.next(), chars.next(), chars.next()) {
        (Some('\''), Some(symbol), Some('\'')) => symbol,
        (Some(symbol), _, _) => symbol,
        _ => BLANK_SYMBOL,
    }
}

fn parse_offset(pair: Pair<Rule>) -> Result<i64, TapeCardError> {
    pair.as_str()
        .parse::<i64>()
        .map_err(|_| parse_error("Step offset out of range", pair.as_span()))
}

fn parse_state_id(pair: Pair<Rule>) -> Result<StateId, TapeCardError> {
    pair.as_str()
        .parse::<StateId>()
        .map_err(|_| parse_error("State id out of range", pair.as_span()))
}

fn parse_index(pair: Pair<Rule>) -> Result<usize, TapeCardError> {
    pair.as_str()
        .parse::<usize>()
        .map_err(|_| parse_error("Head position out of range", pair.as_span()))
}

fn parse_text(pair: Pair<Rule>, span: Span) -> Result<String, TapeCardError> {
    Ok(first_inner(pair, span)?.as_str().trim().to_string())
}

fn first_inner<'i>(pair: Pair<'i, Rule>, span: Span) -> Result<Pair<'i, Rule>, TapeCardError> {
    next_pair(&mut pair.into_inner(), span)
}

fn next_pair<'i>(
    pairs: &mut pest::iterators::Pairs<'i, Rule>,
    span: Span,
) -> Result<Pair<'i, Rule>, TapeCardError> {
    pairs
        .next()
        .ok_or_else(|| parse_error("Incomplete declaration", span))
}

/// Creates a `TapeCardError::ParseError` from a message and a `Span`.
fn parse_error(msg: &str, span: Span) -> TapeCardError {
    TapeCardError::ParseError(Box::new(Error::new_from_span(
        ErrorVariant::CustomError {
            message: msg.to_string(),
        },
        span,
    )))
}

fn check_size(input: &str) -> Result<(), TapeCardError> {
    if input.len() > MAX_PROGRAM_SIZE {
        return Err(TapeCardError::ValidationError(format!(
            "Input is {} bytes, the limit is {}",
            input.len(),
            MAX_PROGRAM_SIZE
        )));
    }

    Ok(())
}

/// Checks if a given section has already been declared.
fn check_unique_rule(
    rule: Rule,
    span: Span,
    seen: &mut HashSet<Rule>,
) -> Result<(), TapeCardError> {
    if !matches!(
        rule,
        Rule::name
            | Rule::alphabet
            | Rule::markers
            | Rule::entry
            | Rule::halt
            | Rule::tape
            | Rule::head
            | Rule::cards
    ) {
        return Ok(());
    };

    if !seen.insert(rule) {
        return Err(parse_error(
            &format!("Duplicate \"{rule:?}:\" declaration"),
            span,
        ));
    }

    Ok(())
}

/// Checks if a required section is present, returning an `Err` if it's missing.
fn check_required_rule<T>(value: Option<T>, name: &str) -> Result<T, TapeCardError> {
    value.ok_or_else(|| TapeCardError::ValidationError(format!("Missing '{name}' section")))
}
