use std::env;
use std::process::ExitCode;

use pattern_engine::{DEFAULT_STEP_LIMIT, Flags, Match, PatternBuilder};

const USAGE: &str = "Usage: pattern-engine [-i] [-m] [-s] [--all | --sub REPLACEMENT] \
                     [--step-limit N] <pattern> <input>";

enum Mode {
    First,
    All,
    Substitute(String),
}

struct Options {
    flags: Flags,
    step_limit: Option<usize>,
    mode: Mode,
    pattern: String,
    input: String,
}

fn parse_args(args: &[String]) -> Result<Options, String> {
    let mut flags = Flags::default();
    let mut step_limit = Some(DEFAULT_STEP_LIMIT);
    let mut mode = Mode::First;
    let mut positional = Vec::new();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-i" => flags.case_insensitive = true,
            "-m" => flags.multiline = true,
            "-s" => flags.dot_all = true,
            "--all" => mode = Mode::All,
            "--sub" => {
                let replacement = iter.next().ok_or("--sub needs a replacement")?;
                mode = Mode::Substitute(replacement.clone());
            }
            "--step-limit" => {
                let n = iter.next().ok_or("--step-limit needs a number")?;
                let n: usize = n.parse().map_err(|e| format!("bad step limit {n:?}: {e}"))?;
                step_limit = if n == 0 { None } else { Some(n) };
            }
            _ => positional.push(arg.clone()),
        }
    }
    let [pattern, input]: [String; 2] = positional
        .try_into()
        .map_err(|_| "expected <pattern> and <input>".to_string())?;
    Ok(Options {
        flags,
        step_limit,
        mode,
        pattern,
        input,
    })
}

fn print_match(m: &Match<'_>) {
    println!("MATCH:{}", m.as_str());
    // Print capturing groups
    for i in 1..=m.group_count() {
        println!("GROUP {}:{}", i, m.group(i).unwrap_or(""));
    }
}

fn run(options: &Options) -> pattern_engine::Result<()> {
    let pattern = PatternBuilder::new(&options.pattern)
        .flags(options.flags)
        .step_limit(options.step_limit)
        .build()?;
    log::info!("compiled {:?}", pattern);

    match &options.mode {
        Mode::First => match pattern.search(&options.input)? {
            Some(m) => print_match(&m),
            None => println!("NO_MATCH"),
        },
        Mode::All => {
            let mut any = false;
            for m in pattern.find_all(&options.input) {
                print_match(&m?);
                any = true;
            }
            if !any {
                println!("NO_MATCH");
            }
        }
        Mode::Substitute(replacement) => {
            println!("RESULT:{}", pattern.substitute(&options.input, replacement)?);
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args: Vec<String> = env::args().skip(1).collect();
    let options = match parse_args(&args) {
        Ok(options) => options,
        Err(e) => {
            eprintln!("{}", e);
            eprintln!("{}", USAGE);
            return ExitCode::from(1);
        }
    };

    match run(&options) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            println!("ERROR:{}", e);
            ExitCode::from(2)
        }
    }
}
