use brau_io::ConsoleCommand;
use std::io::{self, BufRead};
use std::sync::mpsc;
use std::thread;
use tracing::{debug, warn};

/// Reads JSON commands from stdin until EOF. The receiver disconnects when
/// stdin closes.
pub fn start_console_reader() -> io::Result<mpsc::Receiver<ConsoleCommand>> {
    let (tx, rx) = mpsc::channel();
    thread::Builder::new()
        .name("console".into())
        .spawn(move || read_commands(io::stdin().lock(), &tx))?;
    Ok(rx)
}

/// Forwards every parsable line; blank, unknown and malformed lines are skipped.
pub fn read_commands(input: impl BufRead, tx: &mpsc::Sender<ConsoleCommand>) {
    for line in input.lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                warn!(error = %e, "Console read failed");
                break;
            }
        };
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        match ConsoleCommand::parse(trimmed) {
            Ok(cmd) => {
                debug!(command = cmd.name(), "Console command");
                if tx.send(cmd).is_err() {
                    break;
                }
            }
            Err(e) => warn!(error = %e, line = trimmed, "Ignoring console line"),
        }
    }
}
