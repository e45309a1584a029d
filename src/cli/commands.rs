//! # Command Handler
//!
//! Parses REPL input into actions. Two kinds of input are accepted:
//!
//! - Query lines: `<query-file> <threshold>`. The query vector is the first
//!   non-blank line of the file.
//! - Dot commands, which start with a period.
//!
//! ## Supported Commands
//!
//! | Command                     | Description                              |
//! |-----------------------------|------------------------------------------|
//! | `.quit` / `.exit`           | Exit the CLI                             |
//! | `.vector <csv> <threshold>` | Query with an inline vector              |
//! | `.partitions`               | List partition keys and files            |
//! | `.help`                     | Show available commands                  |
//!
//! ## Parsing
//!
//! Commands are case-insensitive. Arguments are whitespace-separated. The
//! threshold is always the last argument, so query file paths may contain
//! spaces.
//!
//! Parsing never touches the filesystem: a query line becomes a
//! [`CommandResult::Query`] and the REPL runs it through [`run_request`].

use std::fs;
use std::path::{Path, PathBuf};

use eyre::{Result, WrapErr};

use crate::error::IndexError;
use crate::query::QueryStats;
use crate::range_index::RangeIndex;
use crate::session::Session;
use crate::sink::MatchSink;

#[derive(Debug, Clone, PartialEq)]
pub enum QuerySource {
    File(PathBuf),
    Inline(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryRequest {
    pub source: QuerySource,
    pub threshold: f64,
}

#[derive(Debug, PartialEq)]
pub enum CommandResult {
    Output(String),
    Query(QueryRequest),
    Exit,
    Continue,
    Error(String),
}

pub struct CommandHandler;

impl CommandHandler {
    pub fn is_command(input: &str) -> bool {
        input.trim().starts_with('.')
    }

    pub fn execute<I: RangeIndex>(input: &str, session: &Session<I>) -> CommandResult {
        let input = input.trim();
        let parts: Vec<&str> = input.split_whitespace().collect();

        if parts.is_empty() {
            return CommandResult::Continue;
        }

        let cmd = parts[0].to_lowercase();
        let args = &parts[1..];

        match cmd.as_str() {
            ".quit" | ".exit" | ".q" => CommandResult::Exit,
            ".help" | ".h" | ".?" => CommandResult::Output(help_text()),
            ".partitions" => list_partitions(session),
            ".vector" => inline_query(args),
            _ => CommandResult::Error(format!(
                "Unknown command: {}. Type .help for available commands.",
                cmd
            )),
        }
    }

    /// Parses a `<query-file> <threshold>` line.
    pub fn parse_query_line(input: &str) -> CommandResult {
        let input = input.trim();
        let Some((path, threshold)) = input.rsplit_once(char::is_whitespace) else {
            return CommandResult::Error(
                "Expected <query-file> <threshold>. Type .help for usage.".to_string(),
            );
        };

        match parse_threshold(threshold) {
            Ok(threshold) => CommandResult::Query(QueryRequest {
                source: QuerySource::File(PathBuf::from(path.trim())),
                threshold,
            }),
            Err(msg) => CommandResult::Error(msg),
        }
    }
}

fn help_text() -> String {
    r#"cityblock CLI Commands:

  <FILE> <THRESHOLD>          Find every vector within THRESHOLD of the query in FILE
  .vector <CSV> <THRESHOLD>   Same, with the query given inline (e.g. 248,248,248)
  .partitions                 List partition keys and their files
  .help, .h, .?               Show this help message
  .quit, .exit, .q            Exit the CLI

Matches are appended to the output file, one vector per line.
Use Ctrl+D or .quit to exit."#
        .to_string()
}

fn parse_threshold(text: &str) -> std::result::Result<f64, String> {
    text.parse::<f64>()
        .map_err(|_| format!("Invalid threshold: {:?}", text))
}

fn inline_query(args: &[&str]) -> CommandResult {
    match args {
        [vector, threshold] => match parse_threshold(threshold) {
            Ok(threshold) => CommandResult::Query(QueryRequest {
                source: QuerySource::Inline((*vector).to_string()),
                threshold,
            }),
            Err(msg) => CommandResult::Error(msg),
        },
        _ => CommandResult::Error("Usage: .vector <CSV> <THRESHOLD>".to_string()),
    }
}

fn list_partitions<I: RangeIndex>(session: &Session<I>) -> CommandResult {
    let partitions = session.partitions();
    if partitions.is_empty() {
        return CommandResult::Output("No partitions.".to_string());
    }

    let mut lines: Vec<String> = partitions
        .iter()
        .map(|p| format!("{:>5}  {}", p.key(), p.path().display()))
        .collect();
    lines.push(format!(
        "{} partition{}, {} record{}",
        partitions.len(),
        if partitions.len() == 1 { "" } else { "s" },
        session.record_count(),
        if session.record_count() == 1 { "" } else { "s" }
    ));
    CommandResult::Output(lines.join("\n"))
}

/// Returns the first non-blank line of a query file.
pub fn read_query_file(path: &Path) -> Result<String> {
    let contents = fs::read_to_string(path)
        .wrap_err_with(|| format!("failed to read query file: {:?}", path))?;
    contents
        .lines()
        .find(|line| !line.trim().is_empty())
        .map(str::to_string)
        .ok_or_else(|| IndexError::malformed(1, "query file is empty").into())
}

/// Resolves the query vector and runs it against the session.
pub fn run_request<I: RangeIndex, S: MatchSink + ?Sized>(
    session: &Session<I>,
    request: &QueryRequest,
    sink: &mut S,
) -> Result<QueryStats> {
    let line = match &request.source {
        QuerySource::File(path) => read_query_file(path)?,
        QuerySource::Inline(text) => text.clone(),
    };
    let query = session.parse_query(&line)?;
    session.query(&query, request.threshold, sink)
}
