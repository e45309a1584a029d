//! # REPL - Read-Eval-Print Loop
//!
//! The interactive loop for the cityblock CLI:
//!
//! - Reads input with rustyline (history, line editing)
//! - Dispatches dot commands and query lines
//! - Runs queries against the session and appends matches to the sink
//!
//! ## Execution Flow
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                     Read Line                             │
//! └──────────────────────────────────────────────────────────┘
//!                           │
//!                           ▼
//! ┌──────────────────────────────────────────────────────────┐
//! │              Starts with '.'?                             │
//! └──────────────────────────────────────────────────────────┘
//!           │ Yes                          │ No
//!           ▼                              ▼
//! ┌──────────────────┐          ┌──────────────────────────┐
//! │ Execute Command  │          │ Parse <file> <threshold> │
//! └──────────────────┘          └──────────────────────────┘
//!           │                              │
//!           ▼                              ▼
//! ┌──────────────────────────────────────────────────────────┐
//! │         Run query (if any), print result                  │
//! └──────────────────────────────────────────────────────────┘
//!                           │
//!                           ▼
//!                       [Loop]
//! ```
//!
//! ## Error Handling
//!
//! A failed query is printed and the loop continues; the sink is only
//! appended to when a query succeeds. Use `.quit` or Ctrl+D to exit.

use crate::cli::commands::{run_request, CommandHandler, CommandResult, QueryRequest};
use crate::cli::history::history_path;
use crate::range_index::RangeIndex;
use crate::session::Session;
use crate::sink::FileSink;
use eyre::{Result, WrapErr};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::fmt::Write as _;
use std::path::Path;
use std::time::Instant;

const PROMPT: &str = "cityblock> ";

pub struct Repl {
    session: Session,
    sink: FileSink,
    editor: DefaultEditor,
}

impl Repl {
    pub fn new(session: Session, sink: FileSink) -> Result<Self> {
        let mut editor = DefaultEditor::new().wrap_err("failed to initialize line editor")?;

        if let Some(history_file) = history_path() {
            let _ = editor.load_history(&history_file);
        }

        Ok(Self {
            session,
            sink,
            editor,
        })
    }

    pub fn run(&mut self) -> Result<()> {
        self.print_welcome();

        loop {
            match self.editor.readline(PROMPT) {
                Ok(line) => {
                    if !self.handle_line(&line) {
                        break;
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    println!("^C");
                }
                Err(ReadlineError::Eof) => {
                    println!("Bye");
                    break;
                }
                Err(err) => {
                    eprintln!("Error reading input: {}", err);
                    break;
                }
            }
        }

        self.save_history();
        Ok(())
    }

    /// Gives the session back so the caller can close it.
    pub fn into_session(self) -> Session {
        self.session
    }

    fn handle_line(&mut self, line: &str) -> bool {
        let trimmed = line.trim();

        if trimmed.is_empty() {
            return true;
        }
        self.editor.add_history_entry(trimmed).ok();

        let result = if CommandHandler::is_command(trimmed) {
            CommandHandler::execute(trimmed, &self.session)
        } else {
            CommandHandler::parse_query_line(trimmed)
        };

        match result {
            CommandResult::Exit => false,
            CommandResult::Output(text) => {
                println!("{}", text);
                true
            }
            CommandResult::Query(request) => {
                self.execute_query(&request);
                true
            }
            CommandResult::Continue => true,
            CommandResult::Error(msg) => {
                eprintln!("Error: {}", msg);
                true
            }
        }
    }

    fn execute_query(&mut self, request: &QueryRequest) {
        let start = Instant::now();

        match run_request(&self.session, request, &mut self.sink) {
            Ok(stats) => {
                println!(
                    "{} match{} appended to {} ({:.3} sec)",
                    stats.matches,
                    if stats.matches == 1 { "" } else { "es" },
                    self.sink.path().display(),
                    start.elapsed().as_secs_f64()
                );
            }
            Err(err) => {
                eprintln!("Error: {:#}", err);
            }
        }
    }

    fn print_welcome(&self) {
        println!("{}", welcome_text(&self.session, self.sink.path()));
    }

    fn save_history(&mut self) {
        if let Some(history_file) = history_path() {
            if let Err(e) = self.editor.save_history(&history_file) {
                eprintln!("Warning: could not save history: {}", e);
            }
        }
    }
}

fn welcome_text<I: RangeIndex>(session: &Session<I>, sink: &Path) -> String {
    let elapsed = session.stats().elapsed.as_secs_f64();
    let mut text = format!(
        "cityblock version {}\nEnter \".help\" for usage hints.\n",
        env!("CARGO_PKG_VERSION")
    );
    let _ = match session.dimensionality() {
        Some(d) => writeln!(
            text,
            "Indexed {} vectors of dimension {} into {} partitions in {:.3} sec.",
            session.record_count(),
            d,
            session.partitions().len(),
            elapsed
        ),
        None => writeln!(text, "Indexed 0 vectors in {:.3} sec.", elapsed),
    };
    let _ = writeln!(text, "Matches go to: {}", sink.display());
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tempfile::tempdir;

    #[test]
    fn welcome_reports_index_size_and_time() {
        let dir = tempdir().unwrap();
        let session = Session::builder()
            .workspace(dir.path())
            .index_reader(Cursor::new("250,250,250\n0,0,0\n200,200,200\n"))
            .unwrap();

        let text = welcome_text(&session, Path::new("out.csv"));

        let line = text
            .lines()
            .find(|line| line.starts_with("Indexed"))
            .unwrap();
        assert!(line.starts_with("Indexed 3 vectors of dimension 3 into 3 partitions in "));
        assert!(line.ends_with(" sec."));
        assert!(text.ends_with("Matches go to: out.csv\n"));
    }

    #[test]
    fn welcome_for_empty_session_still_reports_time() {
        let dir = tempdir().unwrap();
        let session = Session::builder()
            .workspace(dir.path())
            .index_reader(Cursor::new("\n"))
            .unwrap();

        let text = welcome_text(&session, Path::new("out.csv"));

        assert!(text.contains("Indexed 0 vectors in "));
    }
}
