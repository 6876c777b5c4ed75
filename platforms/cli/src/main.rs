use clap::{ArgAction, Parser};
use std::error::Error;
use std::io::{self, Read};
use std::path::PathBuf;
use std::process::ExitCode;
use tapecard::{
    check_tape, parse_tape, run, validate, Catalog, MachineState, Program, ProgramLoader,
    StateId, Symbol, TapeCardError, Termination, DEFAULT_MAX_STEPS,
};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

/// Runs card programs against a fixed-size tape.
#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
#[clap(after_help = "EXAMPLES:
  tapecard-cli --list
  tapecard-cli --name 'Binary increment' --trace
  tapecard-cli --program adder.cards --tape '_, 1, 1, _' --max-steps 100
  cat adder.cards | tapecard-cli --preset unary-pair")]
struct Cli {
    /// The program file to execute (.cards). A piped program is read from stdin.
    #[clap(short, long, conflicts_with = "name")]
    program: Option<PathBuf>,

    /// The name of a built-in program
    #[clap(short, long)]
    name: Option<String>,

    /// Tape cells, comma separated, e.g. "_, 1, 0, _"
    #[clap(short, long, conflicts_with = "preset")]
    tape: Option<String>,

    /// The name of a built-in tape preset
    #[clap(long)]
    preset: Option<String>,

    /// Starting head position (defaults to the tape's own)
    #[clap(long)]
    head: Option<usize>,

    /// Entry state (defaults to the program's)
    #[clap(long)]
    entry: Option<StateId>,

    /// Halting state (defaults to the program's)
    #[clap(long)]
    halt: Option<StateId>,

    /// Maximum number of steps before the run is stopped
    #[clap(short, long, default_value_t = DEFAULT_MAX_STEPS)]
    max_steps: usize,

    /// Print the machine after each step
    #[clap(short = 'd', long)]
    trace: bool,

    /// Print the run result as JSON
    #[clap(long)]
    json: bool,

    /// List built-in programs and tape presets
    #[clap(short, long)]
    list: bool,

    /// Only validate the program and tape
    #[clap(long)]
    check: bool,

    /// Run even if validation reports problems
    #[clap(long)]
    force: bool,

    /// Directory with additional .cards programs
    #[clap(long)]
    programs_dir: Option<PathBuf>,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[clap(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match execute(&cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Installs the log subscriber. `RUST_LOG` takes precedence over `-v`.
fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn execute(cli: &Cli) -> Result<ExitCode, Box<dyn Error>> {
    let mut catalog = Catalog::embedded();
    if let Some(dir) = &cli.programs_dir {
        for e in catalog.extend_from_directory(dir) {
            warn!(error = %e, "skipping program");
        }
    }

    if cli.list {
        print_catalog(&catalog)?;
        return Ok(ExitCode::SUCCESS);
    }

    let mut program = load_program(cli, &catalog)?;
    program.entry_state = cli.entry.unwrap_or(program.entry_state);
    program.halt_state = cli.halt.unwrap_or(program.halt_state);

    let (tape, head) = load_tape(cli, &catalog, &program)?;

    let mut problems = validate(&program);
    problems.extend(check_tape(&program, &tape, head));

    for problem in &problems {
        eprintln!("Validation: {}", problem);
    }

    if cli.check {
        if problems.is_empty() {
            println!("Program '{}' is valid.", program.name);
            return Ok(ExitCode::SUCCESS);
        }
        return Ok(ExitCode::FAILURE);
    }

    if !problems.is_empty() && !cli.force {
        eprintln!("Refusing to run an invalid program (use --force to run anyway).");
        return Ok(ExitCode::FAILURE);
    }

    debug!(program = %program.name, cells = tape.len(), head, "starting run");

    let mut print_step = |snapshot: &MachineState<'_>| {
        println!(
            "Step {:>4}  state {:>3}  head {:>4}  {}",
            snapshot.steps,
            snapshot.state,
            snapshot.head,
            render_tape(snapshot.tape, snapshot.head)
        );
    };

    if cli.trace && !cli.json {
        println!(
            "Step {:>4}  state {:>3}  head {:>4}  {}",
            0,
            program.entry_state,
            head,
            render_tape(&tape, signed(head))
        );
    }

    let observer: Option<&mut dyn tapecard::Observer> = if cli.trace && !cli.json {
        Some(&mut print_step)
    } else {
        None
    };

    let result = run(
        &program,
        tape,
        signed(head),
        program.entry_state,
        program.halt_state,
        cli.max_steps,
        observer,
    );

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("\nFinal tape:  {}", render_tape(&result.final_tape, result.final_head));
        println!("Final head:  {}", result.final_head);
        println!("Final state: {}", result.final_state);
        println!("Steps taken: {}", result.steps_taken);
    }

    Ok(match &result.termination {
        Termination::Halted => {
            if !cli.json {
                println!("\nMachine halted (state {}).", result.final_state);
            }
            ExitCode::SUCCESS
        }
        Termination::BudgetExhausted => {
            if !cli.json {
                println!("\nStep budget of {} exhausted.", cli.max_steps);
            }
            ExitCode::from(2)
        }
        Termination::Failed(error) => {
            eprintln!("\nMachine failed in state {}: {}", result.final_state, error);
            ExitCode::FAILURE
        }
    })
}

/// Loads the program from a file, the catalog, or stdin, in that order.
fn load_program(cli: &Cli, catalog: &Catalog) -> Result<Program, TapeCardError> {
    if let Some(path) = &cli.program {
        ProgramLoader::load_program(path)
    } else if let Some(name) = &cli.name {
        catalog.program(name).cloned()
    } else if atty::isnt(atty::Stream::Stdin) {
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .map_err(|e| TapeCardError::FileError(format!("Failed to read from stdin: {}", e)))?;
        ProgramLoader::load_program_from_string(&buffer)
    } else {
        Err(TapeCardError::ValidationError(
            "No program given: use --program, --name or pipe a program (see --list)".to_string(),
        ))
    }
}

/// Picks the tape and head from `--tape`, `--preset`, or the program's own tape.
fn load_tape(
    cli: &Cli,
    catalog: &Catalog,
    program: &Program,
) -> Result<(Vec<Symbol>, usize), TapeCardError> {
    let (cells, head) = if let Some(tape) = &cli.tape {
        (parse_tape(tape)?, 0)
    } else if let Some(name) = &cli.preset {
        let preset = catalog.preset(name)?;
        (preset.cells.clone(), preset.head)
    } else if let Some(input) = &program.input {
        (input.cells.clone(), input.head)
    } else {
        return Err(TapeCardError::ValidationError(format!(
            "Program '{}' has no tape: use --tape or --preset",
            program.name
        )));
    };

    Ok((cells, cli.head.unwrap_or(head)))
}

fn print_catalog(catalog: &Catalog) -> Result<(), TapeCardError> {
    println!("Programs:");
    for index in 0..catalog.len() {
        let info = catalog.info(index)?;
        println!(
            "  {:<20} {} states, {} actions, entry {}, halt {}",
            info.name, info.state_count, info.action_count, info.entry_state, info.halt_state
        );
    }

    println!("\nTape presets:");
    for preset in catalog.presets() {
        println!(
            "  {:<20} {}",
            preset.name,
            render_tape(&preset.cells, signed(preset.head))
        );
    }

    Ok(())
}

/// Renders the tape with the cell under the head in brackets.
fn render_tape(tape: &[Symbol], head: i64) -> String {
    tape.iter()
        .enumerate()
        .map(|(index, symbol)| {
            if signed(index) == head {
                format!("[{symbol}]")
            } else {
                format!(" {symbol} ")
            }
        })
        .collect()
}

fn signed(index: usize) -> i64 {
    i64::try_from(index).unwrap_or(i64::MAX)
}
