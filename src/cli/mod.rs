//! # cityblock CLI Module
//!
//! Interactive shell over an indexed dataset. The dataset is indexed once at
//! startup; every line typed afterwards is a query or a dot command.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      CLI Entry Point                        │
//! │                    (bin/cityblock.rs)                       │
//! │  - Parses options, installs tracing, indexes the dataset    │
//! ├─────────────────────────────────────────────────────────────┤
//! │                         REPL Loop                           │
//! │  - Reads input via rustyline                                │
//! │  - Dispatches dot commands and query lines                  │
//! │  - Appends matches to the output file                       │
//! ├─────────────────────────────────────────────────────────────┤
//! │            Commands             │          History          │
//! │  (.vector, .partitions, .help)  │  ~/.cityblock_history     │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! cityblock datasets/images.csv
//! cityblock --chunk-size 500 --kway -o matches.csv datasets/images.csv
//! ```
//!
//! ```text
//! cityblock> queries/q1.csv 5
//! 1 match appended to datasets/ImagesWithinThreshold.csv (0.002 sec)
//! ```
//!
//! ## Module Organization
//!
//! - `repl`: read-eval-print loop with rustyline integration
//! - `commands`: dot command parsing and query execution
//! - `history`: history file path resolution

pub mod commands;
pub mod history;
pub mod repl;

pub use repl::Repl;
