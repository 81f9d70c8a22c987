use clap::Parser;
use minirag_context::chunk_document;
use std::fs;
use std::io::{self, Read};

/// A CLI tool to chunk a markdown document into JSON output using minirag-context.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the input markdown file. If not provided, reads from stdin.
    #[arg(short, long)]
    input: Option<String>,

    /// Path recorded on every chunk. Defaults to the input path.
    #[arg(short, long)]
    path: Option<String>,
}

fn main() -> io::Result<()> {
    let args = Args::parse();

    let content = if let Some(input_path) = &args.input {
        fs::read_to_string(input_path)?
    } else {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        buffer
    };

    let path = args
        .path
        .or(args.input)
        .unwrap_or_else(|| "stdin".to_string());

    let chunks = chunk_document(&path, &content);

    let json_output = serde_json::to_string_pretty(&chunks)?;
    println!("{json_output}");

    Ok(())
}
