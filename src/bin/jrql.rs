//! SPARQL to JSON-RQL Translator - CLI
//!
//! Reads a query from `-q` (query text or a path to a `.rq` file) and writes
//! the JSON-RQL document to stdout or to `-o`.

use std::fs;
use std::path::Path;

use clap::{Arg, ArgAction, Command};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use sparql_jrql::{TranslateOptions, to_json_rql_with_options};

fn write_file(path: &str, contents: &str) -> std::io::Result<()> {
    if let Some(parent) = Path::new(path).parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, contents)
}

fn to_string(value: &impl serde::Serialize, pretty: bool) -> serde_json::Result<String> {
    if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let matches = Command::new("jrql")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Translates SPARQL queries into JSON-RQL")
        .arg(
            Arg::new("query")
                .short('q')
                .long("query")
                .value_name("QUERY")
                .help("SPARQL query string or path to .rq file")
                .num_args(1),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_name("FILE")
                .help("Write the JSON-RQL document to FILE instead of stdout")
                .num_args(1),
        )
        .arg(
            Arg::new("pretty")
                .long("pretty")
                .help("Pretty-print the output")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("typed-literals")
                .long("typed-literals")
                .help("Keep numeric and boolean literals as {\"@value\", \"@type\"} objects")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("parsed")
                .long("parsed")
                .help("Also print the parsed query tree")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Log translation steps to stderr")
                .action(ArgAction::SetTrue),
        )
        .get_matches();

    let default_level = if matches.get_flag("verbose") { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let query_text = if let Some(q) = matches.get_one::<String>("query") {
        let path = Path::new(q);
        if path.exists() {
            debug!(path = %path.display(), "reading query file");
            fs::read_to_string(path)?
        } else {
            q.clone()
        }
    } else {
        return Err("No query specified. Use -q <query> or -q <path/to/query.rq>".into());
    };

    let options = TranslateOptions {
        native_types: !matches.get_flag("typed-literals"),
    };
    let pretty = matches.get_flag("pretty");
    let show_parsed = matches.get_flag("parsed");

    let translation = match to_json_rql_with_options(&query_text, &options) {
        Ok(translation) => translation,
        Err(e) => {
            if let Some(parsed) = e.parsed.as_ref().filter(|_| show_parsed) {
                eprintln!("{}", to_string(parsed, true)?);
            }
            return Err(e.into());
        }
    };

    if show_parsed {
        eprintln!("{}", to_string(&translation.parsed, true)?);
    }

    let document = to_string(&translation.document, pretty)?;
    match matches.get_one::<String>("output") {
        Some(path) => {
            write_file(path, &document)?;
            println!("Generated: {path}");
        }
        None => println!("{document}"),
    }

    Ok(())
}
