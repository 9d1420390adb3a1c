//! CLI front end (§6): `gwbasic [-h|--help] [-v|--version] [file.bas]`.
//!
//! Wires the library's `Interpreter` to stdio (`PosixTerminal`),
//! `std::fs` (`StdFileSystem`), and a no-op graphics/sound back end,
//! then either auto-runs a file argument or drops into the direct-mode
//! REPL, matching the original's own `isatty`-gated banner/REPL split.

use gwbasic::error::GwError;
use gwbasic::shims::{NoopGraphicsSound, PosixTerminal, StdFileSystem};
use gwbasic::Interpreter;
use std::env;
use std::fs;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug)]
enum Errors {
    FileNotFound(String),
    Load(GwError),
}

fn main() -> Result<(), Errors> {
    env_logger::init();

    let args: Vec<String> = env::args().skip(1).collect();
    let mut file_arg = None;
    for arg in &args {
        match arg.as_str() {
            "-h" | "--help" => {
                print_usage();
                return Ok(());
            }
            "-v" | "--version" => {
                println!("gwbasic {VERSION}");
                return Ok(());
            }
            other => file_arg = Some(other.to_string()),
        }
    }

    let mut interp = Interpreter::new(PosixTerminal::new(), StdFileSystem, NoopGraphicsSound);

    println!("GW-BASIC {VERSION}");
    println!("{} Bytes free", 60000);
    println!("Ok");

    if let Some(path) = file_arg {
        let text = fs::read_to_string(&path).map_err(|_| Errors::FileNotFound(path.clone()))?;
        interp.load_program_text(&text).map_err(Errors::Load)?;
        if let Err(e) = interp.enter_line(None, "RUN") {
            log::error!("{e} while auto-running {path}");
            println!("{e}");
        }
    }

    run_repl(&mut interp);
    Ok(())
}

fn print_usage() {
    println!("Usage: gwbasic [-h|--help] [-v|--version] [file.bas]");
}

fn run_repl(interp: &mut Interpreter<PosixTerminal, StdFileSystem, NoopGraphicsSound>) {
    loop {
        let Some(line) = interp.terminal.read_line() else {
            break;
        };
        let (number, text) = split_leading_number(line.trim_end());
        let number = number.and_then(|n| n.parse::<u16>().ok());
        if text.trim().is_empty() && number.is_none() {
            continue;
        }
        if let Err(e) = interp.enter_line(number, text) {
            println!("{e}");
        }
        if number.is_none() {
            println!("Ok");
        }
    }
}

/// `"10 PRINT X"` -> `(Some("10"), " PRINT X")`; a line with no leading
/// digits is direct-mode text in full.
fn split_leading_number(line: &str) -> (Option<&str>, &str) {
    let end = line.find(|c: char| !c.is_ascii_digit()).unwrap_or(line.len());
    if end == 0 {
        (None, line)
    } else {
        let (num, rest) = line.split_at(end);
        (Some(num), rest)
    }
}
