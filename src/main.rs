//! Intcode runner.
//!
//! Loads an Intcode program from a file and drives it on its own, as an ASCII
//! console, as a chain of amplifiers or as a packet network.
//!
//! # Usage
//! ```text
//! intcode <command> <program> [OPTIONS]
//! ```
//!
//! # Commands
//! - `run`: Run a single machine with the given inputs and print its output
//! - `console`: Talk to an ASCII program, interactively or from a script
//! - `amplifiers`: Run an amplifier chain, or search for the best phase ordering
//! - `network`: Run a packet network supervised by a NAT

use intcode::network::console::Console;
use intcode::network::pipeline::{
    FEEDBACK_PHASES, PIPELINE_PHASES, max_signal, run_feedback_loop, run_pipeline,
};
use intcode::network::router::{NetworkConfig, run_network};
use intcode::utils::log::{self, Level};
use intcode::virtual_machine::program::Program;
use intcode::virtual_machine::vm::{Completion, Machine};
use intcode::{error, info};
use std::env;
use std::fs;
use std::io::{self, Write};
use std::process;
use std::sync::atomic::Ordering;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Options shared by every command.
struct Options {
    command: String,
    program: String,
    flags: Vec<String>,
}

#[tokio::main]
async fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 || args[1..].iter().any(|arg| arg == "--help" || arg == "-h") {
        print_usage(&args[0]);
        process::exit(if args.len() < 2 { 1 } else { 0 });
    }

    let options = match parse_options(&args) {
        Ok(options) => options,
        Err(e) => {
            eprintln!("{}\n", e);
            print_usage(&args[0]);
            process::exit(1);
        }
    };
    let program = match Program::from_file(&options.program) {
        Ok(program) => program,
        Err(e) => {
            eprintln!("Failed to load program {}: {}", options.program, e);
            process::exit(1);
        }
    };
    info!("loaded {} cells from {}", program.len(), options.program);

    let result = match options.command.as_str() {
        "run" => run_command(&program, &options.flags),
        "console" => console_command(&program, &options.flags).await,
        "amplifiers" => amplifiers_command(&program, &options.flags).await,
        "network" => network_command(&program, &options.flags).await,
        other => {
            eprintln!("Unknown command: {}\n", other);
            print_usage(&args[0]);
            process::exit(1);
        }
    };

    if let Err(e) = result {
        error!("{}", e);
        process::exit(1);
    }
}

/// Splits the command line into command, program path and command flags.
///
/// The program path always follows the command. Global flags are applied
/// immediately and removed from the returned flags.
fn parse_options(args: &[String]) -> Result<Options, String> {
    let command = args[1].clone();
    let program = match args.get(2) {
        Some(path) if !path.starts_with("--") => path.clone(),
        _ => return Err(format!("{} requires a program file", command)),
    };

    let mut flags = Vec::new();
    for arg in &args[3..] {
        match arg.as_str() {
            "--quiet" => log::set_level(Level::Warn),
            "--verbose" => log::set_level(Level::Debug),
            "--no-timestamp" => log::SHOW_TIMESTAMP.store(false, Ordering::Relaxed),
            other => flags.push(other.to_string()),
        }
    }

    Ok(Options {
        command,
        program,
        flags,
    })
}

/// Returns the value following `flags[*i]`, advancing `i` past it.
fn flag_value<'a>(flags: &'a [String], i: &mut usize) -> Result<&'a str, String> {
    let name = &flags[*i];
    *i += 1;
    match flags.get(*i) {
        Some(value) => {
            *i += 1;
            Ok(value.as_str())
        }
        None => Err(format!("{} requires an argument", name)),
    }
}

/// Parses `a,b,c` into integers.
fn parse_list(text: &str) -> Result<Vec<i64>, String> {
    text.split(',')
        .filter(|token| !token.trim().is_empty())
        .map(|token| {
            token
                .trim()
                .parse::<i64>()
                .map_err(|_| format!("invalid integer: {}", token))
        })
        .collect()
}

/// Parses `address=value`.
fn parse_patch(text: &str) -> Result<(i64, i64), String> {
    let (address, value) = text
        .split_once('=')
        .ok_or_else(|| format!("invalid patch {}, expected address=value", text))?;
    let address = address
        .trim()
        .parse()
        .map_err(|_| format!("invalid patch address: {}", address))?;
    let value = value
        .trim()
        .parse()
        .map_err(|_| format!("invalid patch value: {}", value))?;
    Ok((address, value))
}

fn parse_number<T: std::str::FromStr>(name: &str, text: &str) -> Result<T, String> {
    text.parse()
        .map_err(|_| format!("invalid value for {}: {}", name, text))
}

fn unexpected(flag: &str) -> String {
    format!("unexpected argument: {}", flag)
}

fn run_command(program: &Program, flags: &[String]) -> Result<(), String> {
    let mut inputs = Vec::new();
    let mut patches = Vec::new();
    let mut ascii = false;

    let mut i = 0;
    while i < flags.len() {
        match flags[i].as_str() {
            "--input" => inputs.extend(parse_list(flag_value(flags, &mut i)?)?),
            "--patch" => patches.push(parse_patch(flag_value(flags, &mut i)?)?),
            "--ascii" => {
                ascii = true;
                i += 1;
            }
            other => return Err(unexpected(other)),
        }
    }

    let mut machine = Machine::new(program);
    for (address, value) in patches {
        machine.patch(address, value).map_err(|e| e.to_string())?;
    }
    machine.extend_input(inputs);

    let completion = machine.run_until_input().map_err(|e| e.to_string())?;
    let output = machine.drain_output();

    if ascii {
        print!("{}", intcode::network::console::render(&output));
    } else if !output.is_empty() {
        let values: Vec<String> = output.iter().map(|v| v.to_string()).collect();
        println!("{}", values.join(","));
    }

    info!(
        "executed {} steps, memory[0] = {}",
        machine.steps(),
        machine.memory().read(0).unwrap_or_default()
    );

    match completion {
        Completion::Halted => Ok(()),
        Completion::AwaitingInput => Err(format!(
            "program is waiting for more input at ip {}",
            machine.registers().ip
        )),
    }
}

async fn console_command(program: &Program, flags: &[String]) -> Result<(), String> {
    let mut script = None;
    let mut patches = Vec::new();

    let mut i = 0;
    while i < flags.len() {
        match flags[i].as_str() {
            "--script" => script = Some(flag_value(flags, &mut i)?.to_string()),
            "--patch" => patches.push(parse_patch(flag_value(flags, &mut i)?)?),
            other => return Err(unexpected(other)),
        }
    }

    let mut machine = Machine::new(program);
    for (address, value) in patches {
        machine.patch(address, value).map_err(|e| e.to_string())?;
    }
    let mut console = Console::from_machine(machine);

    if let Some(path) = script {
        let text = fs::read_to_string(&path).map_err(|e| format!("{}: {}", path, e))?;
        let lines = console.send_script(&text);
        info!("queued {} script lines from {}", lines, path);
    }

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let (completion, text) = console.advance().map_err(|e| e.to_string())?;
        print!("{}", text);
        let _ = io::stdout().flush();

        if completion == Completion::Halted {
            info!("program halted after {} steps", console.machine().steps());
            return Ok(());
        }

        match stdin.next_line().await.map_err(|e| e.to_string())? {
            Some(line) => console.send_line(line.trim_end()),
            None => return Err("input closed before the program halted".to_string()),
        }
    }
}

async fn amplifiers_command(program: &Program, flags: &[String]) -> Result<(), String> {
    let mut phases = None;
    let mut feedback = false;

    let mut i = 0;
    while i < flags.len() {
        match flags[i].as_str() {
            "--phases" => phases = Some(parse_list(flag_value(flags, &mut i)?)?),
            "--feedback" => {
                feedback = true;
                i += 1;
            }
            other => return Err(unexpected(other)),
        }
    }

    match phases {
        Some(phases) => {
            let result = if feedback {
                run_feedback_loop(program, &phases, 0).await
            } else {
                run_pipeline(program, &phases, 0).await
            };
            println!("{}", result.map_err(|e| e.to_string())?);
        }
        None => {
            let phases: &[i64] = if feedback {
                &FEEDBACK_PHASES
            } else {
                &PIPELINE_PHASES
            };
            let (signal, ordering) = max_signal(program, phases, feedback)
                .await
                .map_err(|e| e.to_string())?;
            let ordering: Vec<String> = ordering.iter().map(|v| v.to_string()).collect();
            println!("{} ({})", signal, ordering.join(","));
        }
    }

    Ok(())
}

async fn network_command(program: &Program, flags: &[String]) -> Result<(), String> {
    let mut config = NetworkConfig::default();

    let mut i = 0;
    while i < flags.len() {
        match flags[i].as_str() {
            "--size" => config.size = parse_number("--size", flag_value(flags, &mut i)?)?,
            "--nat" => config.nat_address = parse_number("--nat", flag_value(flags, &mut i)?)?,
            "--max-rounds" => {
                config.max_rounds = Some(parse_number("--max-rounds", flag_value(flags, &mut i)?)?)
            }
            other => return Err(unexpected(other)),
        }
    }

    let report = run_network(program, &config)
        .await
        .map_err(|e| e.to_string())?;

    println!("first NAT packet: {}", report.first_nat_packet.y);
    println!("repeated NAT packet: {}", report.repeated_packet.y);
    info!(
        "{} rounds, {} packets delivered, {} dropped",
        report.rounds, report.delivered, report.dropped
    );

    Ok(())
}

const USAGE: &str = "\
Intcode Runner

USAGE:
    {program} <command> <program> [OPTIONS]

COMMANDS:
    run           Run a single machine and print its output
    console       Talk to an ASCII program through stdin
    amplifiers    Run an amplifier chain or search for the best phase ordering
    network       Run a packet network supervised by a NAT

ARGS:
    <program>    File holding comma-separated Intcode

RUN OPTIONS:
    --input <v1,v2,..>     Values queued on the input channel
    --patch <addr=value>   Overwrite a memory cell before running (repeatable)
    --ascii                Render the output as text

CONSOLE OPTIONS:
    --script <file>        Lines sent before reading stdin
    --patch <addr=value>   Overwrite a memory cell before running (repeatable)

AMPLIFIERS OPTIONS:
    --phases <a,b,..>      Run this phase ordering instead of searching
    --feedback             Connect the last amplifier back to the first

NETWORK OPTIONS:
    --size <n>             Number of nodes (default 50)
    --nat <addr>           Address captured by the NAT (default 255)
    --max-rounds <n>       Give up after this many rounds

GLOBAL OPTIONS:
    --quiet                Only print warnings and errors
    --verbose              Print debug messages
    --no-timestamp         Omit timestamps from log lines
    -h, --help             Print this help message

EXAMPLES:
    # Restore the gravity assist program
    {program} run day2.txt --patch 1=12 --patch 2=2

    # Run diagnostics with system ID 5
    {program} run day5.txt --input 5

    # Find the best feedback loop
    {program} amplifiers day7.txt --feedback

    # Walk the springdroid with a script
    {program} console day21.txt --script walk.txt

    # Wake the vacuum robot up
    {program} console day17.txt --patch 0=2
";

/// Prints usage information to stderr.
fn print_usage(program: &str) {
    eprintln!("{}", USAGE.replace("{program}", program));
}
