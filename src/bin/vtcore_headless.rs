//! vtcore headless runner
//!
//! Feeds a captured byte stream through the terminal core without a PTY and
//! prints the resulting screen. Useful for reproducing rendering bugs from a
//! `script(1)` log and for scripted checks of search results.

use std::io::{self, Read};
use std::process::ExitCode;

use vtcore::search::{HistoryView, SearchEngine, UrlDetector};
use vtcore::Terminal;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn main() -> ExitCode {
    // Initialize logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let args: Vec<String> = std::env::args().collect();

    // Parse command line arguments
    let mut cols = 80u16;
    let mut rows = 24u16;
    let mut scrollback = 10000usize;
    let mut input_file: Option<String> = None;
    let mut output_format = OutputFormat::Text;
    let mut search: Option<String> = None;
    let mut is_regex = false;
    let mut case_sensitive = true;
    let mut list_urls = false;
    let mut show_help = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "-c" | "--cols" => {
                i += 1;
                if i < args.len() {
                    cols = args[i].parse().unwrap_or(80);
                }
            },
            "-r" | "--rows" => {
                i += 1;
                if i < args.len() {
                    rows = args[i].parse().unwrap_or(24);
                }
            },
            "-s" | "--scrollback" => {
                i += 1;
                if i < args.len() {
                    scrollback = args[i].parse().unwrap_or(10000);
                }
            },
            "-f" | "--file" => {
                i += 1;
                if i < args.len() {
                    input_file = Some(args[i].clone());
                }
            },
            "--search" => {
                i += 1;
                if i < args.len() {
                    search = Some(args[i].clone());
                }
            },
            "--regex" => is_regex = true,
            "-i" | "--ignore-case" => case_sensitive = false,
            "-u" | "--urls" => list_urls = true,
            "-j" | "--json" => {
                output_format = OutputFormat::Json;
            },
            "-t" | "--text" => {
                output_format = OutputFormat::Text;
            },
            "-h" | "--help" => {
                show_help = true;
            },
            _ => {
                // Treat as input file if no flag
                if input_file.is_none() && !args[i].starts_with('-') {
                    input_file = Some(args[i].clone());
                }
            },
        }
        i += 1;
    }

    if show_help {
        print_help();
        return ExitCode::SUCCESS;
    }

    // Read input
    let input_data = match &input_file {
        Some(path) => match std::fs::read(path) {
            Ok(data) => data,
            Err(e) => {
                eprintln!("Error reading file '{}': {}", path, e);
                return ExitCode::FAILURE;
            },
        },
        None => {
            let mut data = Vec::new();
            if let Err(e) = io::stdin().read_to_end(&mut data) {
                eprintln!("Error reading stdin: {}", e);
                return ExitCode::FAILURE;
            }
            data
        },
    };

    let mut terminal = Terminal::new(usize::from(cols.max(1)), usize::from(rows.max(1)), scrollback);
    terminal.process(&input_data);
    let snapshot = terminal.snapshot();

    match output_format {
        OutputFormat::Text => {
            println!("Terminal State ({}x{}):", snapshot.cols, snapshot.rows);
            println!("Cursor: ({}, {})", snapshot.cursor.row, snapshot.cursor.col);
            if !snapshot.title.is_empty() {
                println!("Title: {}", snapshot.title);
            }
            println!("Scrollback: {} lines", snapshot.scrollback_lines);
            println!("---");
            for row in 0..snapshot.rows {
                println!("{}", snapshot.row_text(row));
            }
            println!("---");
        },
        OutputFormat::Json => match serde_json::to_string_pretty(&snapshot) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("Error serializing snapshot: {}", e);
                return ExitCode::FAILURE;
            },
        },
    }

    if let Some(pattern) = search {
        let mut engine = SearchEngine::new();
        if let Err(e) = engine.set_query(&pattern, case_sensitive, is_regex) {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
        let matches = engine.find_all(&HistoryView::of(terminal.screen()));
        println!("Matches: {}", matches.len());
        for m in &matches {
            println!("  line {} cols {}..{}", m.line, m.start_col, m.end_col);
        }
    }

    if list_urls {
        let detector = match UrlDetector::new() {
            Ok(detector) => detector,
            Err(e) => {
                eprintln!("Error: {}", e);
                return ExitCode::FAILURE;
            },
        };
        let urls = detector.detect_all(&HistoryView::of(terminal.screen()));
        println!("URLs: {}", urls.len());
        for u in &urls {
            println!("  line {} cols {}..{} {:?} {}", u.line, u.start_col, u.end_col, u.kind, u.url);
        }
    }

    ExitCode::SUCCESS
}

#[derive(Clone, Copy)]
enum OutputFormat {
    Text,
    Json,
}

fn print_help() {
    println!("vtcore headless runner");
    println!();
    println!("Usage: vtcore-headless [OPTIONS] [INPUT_FILE]");
    println!();
    println!("Options:");
    println!("  -c, --cols <N>        Set terminal width (default: 80)");
    println!("  -r, --rows <N>        Set terminal height (default: 24)");
    println!("  -s, --scrollback <N>  Scrollback capacity (default: 10000)");
    println!("  -f, --file <PATH>     Read input from file");
    println!("      --search <TEXT>   Search scrollback and screen after processing");
    println!("      --regex           Treat the search text as a regular expression");
    println!("  -i, --ignore-case     Case-insensitive search");
    println!("  -u, --urls            List links found in scrollback and screen");
    println!("  -j, --json            Output snapshot as JSON");
    println!("  -t, --text            Output snapshot as text (default)");
    println!("  -h, --help            Show this help message");
    println!();
    println!("If no input file is specified, reads from stdin.");
    println!();
    println!("Examples:");
    println!("  printf 'Hello\\033[31mWorld\\033[0m' | vtcore-headless");
    println!("  vtcore-headless -c 120 -r 40 session.log");
    println!("  vtcore-headless --search '^error' --regex -i build.log");
}
