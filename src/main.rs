use std::fs::File;
use std::path::PathBuf;
use std::thread;

use clap::Parser;
use log::{error, LevelFilter};
use nix::sys::signal::{pthread_sigmask, SigSet, SigmaskHow};
use simplelog::{ColorChoice, CombinedLogger, Config, SharedLogger, TermLogger, TerminalMode, WriteLogger};

use oshell::interpreter::{InterpreterOptions, ShellOptions, ShoptOptions};
use oshell::shell::{stdin_is_interactive, Shell, Source};

#[derive(Parser)]
#[command(name = "oshell")]
#[command(about = "A POSIX shell with bash extensions")]
#[command(version)]
struct Cli {
    /// Run commands from STRING; the first argument after it is $0
    #[arg(short = 'c', value_name = "STRING")]
    command: Option<String>,

    /// Exit when a command fails
    #[arg(short = 'e')]
    errexit: bool,

    /// Treat unset variables as an error
    #[arg(short = 'u')]
    nounset: bool,

    /// Print commands as they run
    #[arg(short = 'x')]
    xtrace: bool,

    /// Parse commands without running them
    #[arg(short = 'n')]
    noexec: bool,

    /// Force an interactive shell
    #[arg(short = 'i')]
    interactive: bool,

    /// Set an option by name, as `set -o NAME` does
    #[arg(short = 'o', value_name = "NAME")]
    set_options: Vec<String>,

    /// Set a shopt option by name
    #[arg(short = 'O', value_name = "NAME")]
    shopt_options: Vec<String>,

    /// Write a debug log to FILE (default: $OSH_DEBUG_LOG)
    #[arg(long = "debug-log", value_name = "FILE")]
    debug_log: Option<PathBuf>,

    /// Script to run, then its arguments
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,
}

fn init_logging(debug_log: Option<PathBuf>) {
    let mut loggers: Vec<Box<dyn SharedLogger>> = vec![TermLogger::new(
        LevelFilter::Warn,
        Config::default(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    )];
    let path = debug_log.or_else(|| std::env::var_os("OSH_DEBUG_LOG").map(PathBuf::from));
    if let Some(path) = path {
        match File::create(&path) {
            Ok(file) => loggers.push(WriteLogger::new(LevelFilter::Debug, Config::default(), file)),
            Err(e) => eprintln!("oshell: {}: {}", path.display(), e),
        }
    }
    let _ = CombinedLogger::init(loggers);
}

/// The evaluator recurses once per nested construct and function call.
const EVAL_STACK_SIZE: usize = 256 * 1024 * 1024;

/// Run the shell on a thread with a stack large enough for the recursion
/// limits. Signals are blocked in the main thread so they are delivered to
/// the evaluator, where they interrupt `waitpid` and `read`.
fn run_on_eval_thread(opts: InterpreterOptions, source: Source) -> i32 {
    let mut saved = SigSet::empty();
    if let Err(e) = pthread_sigmask(SigmaskHow::SIG_SETMASK, Some(&SigSet::all()), Some(&mut saved)) {
        error!("could not block signals: {}", e);
    }
    let spawned = thread::Builder::new()
        .name("oshell-eval".to_string())
        .stack_size(EVAL_STACK_SIZE)
        .spawn(move || {
            let _ = pthread_sigmask(SigmaskHow::SIG_SETMASK, Some(&saved), None);
            let mut shell = Shell::new(opts);
            shell.run(&source)
        });
    match spawned.map(|handle| handle.join()) {
        Ok(Ok(status)) => status,
        Ok(Err(_)) => 70,
        Err(e) => {
            eprintln!("oshell: could not start: {}", e);
            70
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.debug_log.clone());

    let mut options = ShellOptions::default();
    options.errexit = cli.errexit;
    options.nounset = cli.nounset;
    options.xtrace = cli.xtrace;
    options.noexec = cli.noexec;
    for name in &cli.set_options {
        if !options.set(name, true) {
            eprintln!("oshell: {}: invalid option name", name);
            std::process::exit(2);
        }
    }
    let mut shopt = ShoptOptions::default();
    for name in &cli.shopt_options {
        if !shopt.set(name, true) {
            eprintln!("oshell: {}: invalid shell option name", name);
            std::process::exit(2);
        }
    }

    let mut args = cli.args.into_iter();
    let (source, dollar0) = match cli.command {
        Some(src) => (Source::Command(src), args.next().unwrap_or_else(|| "oshell".to_string())),
        None => match args.next() {
            Some(script) => (Source::File(script.clone()), script),
            None => (Source::Stdin, "oshell".to_string()),
        },
    };
    let interactive = cli.interactive || (matches!(source, Source::Stdin) && stdin_is_interactive());
    if interactive {
        options.monitor = true;
    }

    let opts = InterpreterOptions {
        dollar0,
        argv: args.collect(),
        options,
        shopt,
        interactive,
        ..InterpreterOptions::default()
    };
    let status = run_on_eval_thread(opts, source);
    std::process::exit(status & 0xff);
}
