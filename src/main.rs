use clap::{Parser, Subcommand};

use thompson_re::{DEFAULT_STATE_LIMIT, Engine, EngineBuilder};

use std::io::{self, Write};
use std::process;

/// Compile a pattern to a Thompson NFA and run it.
#[derive(Debug, Parser)]
#[command(name = "thre", version, about)]
struct Cli {
    /// Skip the regex-syntax well-formedness pre-check
    #[arg(long, global = true)]
    no_syntax_check: bool,

    /// Make `^` hold only at offset 0 of the input
    #[arg(long, global = true)]
    strict_start: bool,

    /// Refuse patterns that compile to more NFA states than this
    #[arg(long, global = true, default_value_t = DEFAULT_STATE_LIMIT)]
    state_limit: usize,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Output DOT (Graphviz) representation of the NFA
    Dot { pattern: String },
    /// Match pattern against the whole of one or more inputs
    Match {
        pattern: String,
        #[arg(required = true)]
        inputs: Vec<String>,
    },
    /// Print the first match in each input
    Search {
        pattern: String,
        #[arg(required = true)]
        inputs: Vec<String>,
    },
    /// Print every found substring of the input, one per line
    FindAll { pattern: String, input: String },
    /// Replace matches in the input
    Sub {
        pattern: String,
        replacement: String,
        input: String,
        /// Maximum number of replacements (0 = all)
        #[arg(long, default_value_t = 0)]
        count: usize,
    },
    /// Split the input around matches, one piece per line
    Split {
        pattern: String,
        input: String,
        /// Maximum number of splits (0 = all)
        #[arg(long, default_value_t = 0)]
        maxsplit: usize,
    },
}

fn compile(cli: &Cli, pattern: &str) -> Engine {
    EngineBuilder::new()
        .syntax_check(!cli.no_syntax_check)
        .strict_start_anchor(cli.strict_start)
        .state_limit(cli.state_limit)
        .build(pattern)
        .unwrap_or_else(|e| {
            eprintln!("error: {e}");
            process::exit(1);
        })
}

fn run_dot(engine: &Engine) -> io::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    engine.nfa().to_dot(&mut out)?;
    out.flush()
}

fn run_match(engine: &Engine, inputs: &[String]) -> bool {
    eprintln!("pattern: {engine}");
    eprintln!("states: {}", engine.nfa().states().len());
    eprintln!();

    let mut all_matched = true;
    for input in inputs {
        if engine.is_match(input) {
            println!("  \x1b[32mMATCH\x1b[0m  {:?}", input);
        } else {
            println!("  \x1b[31mNO MATCH\x1b[0m  {:?}", input);
            all_matched = false;
        }
    }
    all_matched
}

fn run_search(engine: &Engine, inputs: &[String]) -> bool {
    let mut all_found = true;
    for input in inputs {
        match engine.search(input) {
            Some(m) => println!(
                "  \x1b[32mFOUND\x1b[0m  {:?} at {}..{} in {:?}",
                m.as_str(),
                m.start(),
                m.end(),
                input
            ),
            None => {
                println!("  \x1b[31mNOT FOUND\x1b[0m  {:?}", input);
                all_found = false;
            }
        }
    }
    all_found
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();
    log::debug!("{:?}", cli);

    let ok = match &cli.command {
        Command::Dot { pattern } => {
            let engine = compile(&cli, pattern);
            if let Err(e) = run_dot(&engine) {
                eprintln!("error: {e}");
                process::exit(1);
            }
            true
        }
        Command::Match { pattern, inputs } => run_match(&compile(&cli, pattern), inputs),
        Command::Search { pattern, inputs } => run_search(&compile(&cli, pattern), inputs),
        Command::FindAll { pattern, input } => {
            let found = compile(&cli, pattern).find_all(input);
            for piece in &found {
                println!("{piece}");
            }
            !found.is_empty()
        }
        Command::Sub {
            pattern,
            replacement,
            input,
            count,
        } => {
            println!("{}", compile(&cli, pattern).substitute(replacement, input, *count));
            true
        }
        Command::Split {
            pattern,
            input,
            maxsplit,
        } => {
            for piece in compile(&cli, pattern).split(input, *maxsplit) {
                println!("{piece}");
            }
            true
        }
    };

    if !ok {
        process::exit(1);
    }
}
