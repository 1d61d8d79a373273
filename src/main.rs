use std::fs;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use clap::Parser as ClapParser;

use loxide::lox::Lox;

#[derive(ClapParser, Debug)]
#[command(version, about = "Tree-walking interpreter for the Lox language", long_about = None)]
struct Cli {
    /// Script to execute; omit to start the REPL
    script: Vec<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let args: Cli = Cli::parse();

    match args.script.as_slice() {
        [] => run_prompt()?,

        [script] => run_file(script)?,

        _ => {
            println!("Usage: loxide [script]");
            std::process::exit(64);
        }
    }

    Ok(())
}

fn run_file(path: &PathBuf) -> anyhow::Result<()> {
    let source: String = fs::read_to_string(path)?;

    let mut output: io::Stdout = io::stdout();
    let mut lox = Lox::new(&mut output);

    lox.run(&source);

    if lox.had_error() {
        std::process::exit(65);
    }

    if lox.had_runtime_error() {
        std::process::exit(70);
    }

    Ok(())
}

fn run_prompt() -> anyhow::Result<()> {
    let mut output: io::Stdout = io::stdout();
    let mut lox = Lox::new(&mut output);

    let stdin: io::Stdin = io::stdin();
    let mut line: String = String::new();

    loop {
        print!("lox> ");
        io::stdout().flush()?;

        line.clear();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }

        lox.run(&line);
        lox.reset();
    }

    Ok(())
}
