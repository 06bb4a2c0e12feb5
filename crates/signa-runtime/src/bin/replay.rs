//! signa-replay - run recorded classifier labels through the stabilizer
//!
//! Usage: signa-replay [--config <pipeline.json>] [--json-log] [<records.jsonl>]
//!
//! Reads stdin when no recording is given. Prints one line per confirmed
//! letter and the accumulated text at the end.

use std::fs::File;
use std::io::{self, BufRead, BufReader};

use signa_core::PipelineConfig;
use signa_runtime::{init_logging, replay, LogFormat, LoggingConfig, TextAccumulator};
use tracing::info;

struct Args {
    config: Option<String>,
    input: Option<String>,
    json_log: bool,
}

fn parse_args() -> Result<Args, String> {
    let mut args = Args {
        config: None,
        input: None,
        json_log: false,
    };
    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" => {
                args.config = Some(iter.next().ok_or("--config needs a path")?);
            }
            "--json-log" => args.json_log = true,
            "-h" | "--help" => {
                return Err(
                    "usage: signa-replay [--config <pipeline.json>] [--json-log] [<records.jsonl>]"
                        .to_string(),
                )
            }
            _ if args.input.is_none() => args.input = Some(arg),
            _ => return Err(format!("unexpected argument: {arg}")),
        }
    }
    Ok(args)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = parse_args()?;

    let logging = LoggingConfig {
        format: if args.json_log {
            LogFormat::Json
        } else {
            LogFormat::Pretty
        },
        filter: "warn".to_string(),
        ..LoggingConfig::default()
    };
    init_logging(&logging)?;

    let config = match &args.config {
        Some(path) => PipelineConfig::from_json_file(path)?,
        None => PipelineConfig::default(),
    };

    let reader: Box<dyn BufRead> = match &args.input {
        Some(path) if path != "-" => Box::new(BufReader::new(File::open(path)?)),
        _ => Box::new(BufReader::new(io::stdin())),
    };

    let events = replay(reader, &config)?;

    let mut text = TextAccumulator::new();
    for e in &events {
        println!("{:>8} ms  {}", e.t_ms, e.event);
        text.push_letter(&e.event.letter);
    }
    println!("{}", text.text());

    info!(confirmed = events.len(), "Replay finished");
    Ok(())
}
