//! bytevm - run and inspect bytecode programs
//!
//! Programs are read either as assembly source or, for `.json` files, as a
//! JSON array of raw bytecode words.

use bytevm::bytecode::{assemble, disassemble, AsmError};
use bytevm::runtime::{ConfigError, ExecutionError, RunOutcome, Vm, VmConfig};
use bytevm::WatchKind;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "bytevm", version, about = "Resumable bytecode VM with a debugger")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a program, printing each output value on its own line
    Run {
        file: PathBuf,
        /// Value queued for READ (repeatable)
        #[arg(long = "input", allow_hyphen_values = true)]
        inputs: Vec<i32>,
        /// Pause before the instruction at ADDR (repeatable)
        #[arg(long = "break", value_name = "ADDR")]
        breakpoints: Vec<usize>,
        /// Watch a global slot at every pause (repeatable)
        #[arg(long = "watch-global", value_name = "ADDR")]
        watch_globals: Vec<i32>,
        /// Watch a local slot of the topmost frame at every pause (repeatable)
        #[arg(long = "watch-local", value_name = "OFFSET")]
        watch_locals: Vec<i32>,
        /// Pause on uncaught exceptions before unwinding
        #[arg(long)]
        pause_on_exception: bool,
        /// JSON file with VM limits
        #[arg(long)]
        config: Option<PathBuf>,
        /// Print the per-instruction trace as JSON lines after the run
        #[arg(long)]
        trace: bool,
        /// Hex-dump LEN heap bytes at ADDR at every pause and after the run
        #[arg(long, value_name = "ADDR:LEN", value_parser = parse_heap_range)]
        dump_heap: Option<(i32, usize)>,
    },
    /// Print an address-annotated listing
    Disasm { file: PathBuf },
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("{path}: {source}")]
    Io { path: PathBuf, source: std::io::Error },
    #[error("{0}")]
    Asm(#[from] AsmError),
    #[error("invalid bytecode file: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{0}")]
    Config(#[from] ConfigError),
    #[error("{0}")]
    Execution(#[from] ExecutionError),
}

fn parse_heap_range(arg: &str) -> Result<(i32, usize), String> {
    let (addr, len) = arg.split_once(':').ok_or("expected ADDR:LEN")?;
    let addr = addr.parse().map_err(|e| format!("invalid address {addr:?}: {e}"))?;
    let len = len.parse().map_err(|e| format!("invalid length {len:?}: {e}"))?;
    Ok((addr, len))
}

fn dump_heap(vm: &Vm, range: Option<(i32, usize)>) {
    if let Some((addr, len)) = range {
        match vm.heap().hex_dump(addr, len) {
            Ok(dump) => eprint!("{dump}"),
            Err(e) => eprintln!("heap dump: {e}"),
        }
    }
}

fn load_program(path: &Path) -> Result<Vec<i32>, CliError> {
    let text = std::fs::read_to_string(path).map_err(|source| CliError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    if path.extension().is_some_and(|ext| ext == "json") {
        Ok(serde_json::from_str(&text)?)
    } else {
        Ok(assemble(&text)?)
    }
}

#[allow(clippy::too_many_arguments)]
fn run(
    file: &Path,
    inputs: &[i32],
    breakpoints: &[usize],
    watch_globals: &[i32],
    watch_locals: &[i32],
    pause_on_exception: bool,
    config: Option<&Path>,
    trace: bool,
    heap_range: Option<(i32, usize)>,
) -> Result<(), CliError> {
    let config = match config {
        Some(path) => VmConfig::from_json_file(path)?,
        None => VmConfig::default(),
    };
    let config = if trace { config.with_trace(true) } else { config };
    let mut vm = Vm::new(config)?;
    vm.load(load_program(file)?);
    for value in inputs {
        vm.provide_input(*value);
    }
    for addr in breakpoints {
        vm.set_breakpoint(*addr);
    }
    for addr in watch_globals {
        vm.add_watch(format!("global[{addr}]"), WatchKind::Global, *addr);
    }
    for offset in watch_locals {
        vm.add_watch(format!("local[{offset}]"), WatchKind::Local, *offset);
    }
    vm.set_pause_on_exception(pause_on_exception);

    let mut outcome = vm.run(false);
    let output = loop {
        match outcome? {
            RunOutcome::Halted { output } => break output,
            RunOutcome::Paused(step) => {
                let record = serde_json::json!({
                    "pause": step,
                    "watches": vm.evaluate_watches(),
                    "stack_trace": vm.stack_trace(),
                });
                eprintln!("{record}");
                dump_heap(&vm, heap_range);
                outcome = vm.continue_execution();
            }
        }
    };

    dump_heap(&vm, heap_range);
    if vm.config().trace_instructions {
        for step in vm.execution_trace() {
            eprintln!("{}", serde_json::to_string(&step)?);
        }
    }
    for value in output {
        println!("{value}");
    }
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let result = match &cli.command {
        Commands::Run {
            file,
            inputs,
            breakpoints,
            watch_globals,
            watch_locals,
            pause_on_exception,
            config,
            trace,
            dump_heap: heap_range,
        } => run(
            file,
            inputs,
            breakpoints,
            watch_globals,
            watch_locals,
            *pause_on_exception,
            config.as_deref(),
            *trace,
            *heap_range,
        ),
        Commands::Disasm { file } => load_program(file).map(|code| print!("{}", disassemble(&code))),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
