use anyhow::Result;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

/// Helper to run the CLI binary inside `workdir` with a hash-provider config
fn run_cli(workdir: &TempDir, args: &[&str]) -> Result<Output> {
    let output = Command::new(env!("CARGO_BIN_EXE_minirag"))
        .current_dir(workdir.path())
        .arg("--config")
        .arg("minirag.toml")
        .args(args)
        .env_remove("OPENAI_API_KEY")
        .output()?;
    Ok(output)
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn setup(dimension: usize) -> Result<TempDir> {
    let workdir = tempfile::tempdir()?;
    write_config(workdir.path(), dimension)?;

    let docs = workdir.path().join("docs");
    std::fs::create_dir_all(&docs)?;
    std::fs::write(
        docs.join("guide.md"),
        "# Logging\nset the verbose flag to see debug logs\n\n# Checkpoints\ninterrupted runs resume from the checkpoint file\n\n# Search\nqueries are embedded and compared by cosine similarity\n",
    )?;
    std::fs::write(docs.join("faq.md"), "# FAQ\nthe index lives in the embeddings directory\n")?;
    Ok(workdir)
}

fn write_config(root: &Path, dimension: usize) -> Result<()> {
    std::fs::write(
        root.join("minirag.toml"),
        format!("[embedding]\nprovider = \"hash\"\ndimension = {dimension}\n"),
    )?;
    Ok(())
}

#[test]
fn test_generate_then_search() -> Result<()> {
    let workdir = setup(64)?;

    let output = run_cli(&workdir, &["generate"])?;
    assert!(output.status.success(), "generate failed: {output:?}");
    assert!(stdout(&output).contains("Indexed 4 chunks from 2 documents"));
    assert!(workdir.path().join("embeddings/index.bin").exists());
    assert!(!workdir.path().join("embeddings/checkpoint.bin").exists());

    let output = run_cli(
        &workdir,
        &[
            "search",
            "--top",
            "2",
            "--threshold",
            "-1",
            "interrupted runs resume from the checkpoint file",
        ],
    )?;
    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.contains("Found 2 results"));
    assert!(text.contains("Score: 1.00 | guide.md [Checkpoints]"));
    Ok(())
}

#[test]
fn test_search_with_context_marks_the_match() -> Result<()> {
    let workdir = setup(64)?;
    assert!(run_cli(&workdir, &["generate"])?.status.success());

    let output = run_cli(
        &workdir,
        &["search", "-n", "1", "--context", "1", "interrupted runs resume from the checkpoint file"],
    )?;

    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.contains(">>> MATCHED CHUNK <<<"));
    assert!(text.contains("[Logging]"));
    assert!(text.contains("[Search]"));
    Ok(())
}

#[test]
fn test_search_json_output() -> Result<()> {
    let workdir = setup(64)?;
    assert!(run_cli(&workdir, &["generate"])?.status.success());

    let output = run_cli(&workdir, &["search", "--format", "json", "-n", "1", "the index lives in the embeddings directory"])?;

    assert!(output.status.success());
    let results: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(results[0]["chunk"]["path"], "faq.md");
    assert_eq!(results[0]["chunk"]["heading"], "FAQ");
    Ok(())
}

#[test]
fn test_no_results_is_success() -> Result<()> {
    let workdir = setup(64)?;
    assert!(run_cli(&workdir, &["generate"])?.status.success());

    let output = run_cli(&workdir, &["search", "--threshold", "1.5", "anything"])?;

    assert!(output.status.success());
    assert!(stdout(&output).contains("No results found"));
    Ok(())
}

#[test]
fn test_search_without_index_fails() -> Result<()> {
    let workdir = setup(64)?;

    let output = run_cli(&workdir, &["search", "query"])?;

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Error:"));
    Ok(())
}

#[test]
fn test_dimension_mismatch_fails() -> Result<()> {
    let workdir = setup(64)?;
    assert!(run_cli(&workdir, &["generate"])?.status.success());
    write_config(workdir.path(), 32)?;

    let output = run_cli(&workdir, &["search", "logging"])?;

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("dimension mismatch"));
    Ok(())
}

#[test]
fn test_missing_api_key_fails() -> Result<()> {
    let workdir = setup(64)?;
    std::fs::write(workdir.path().join("minirag.toml"), "[embedding]\nprovider = \"openai\"\n")?;

    let output = run_cli(&workdir, &["generate"])?;

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("OPENAI_API_KEY"));
    Ok(())
}

#[test]
fn test_stats() -> Result<()> {
    let workdir = setup(64)?;
    assert!(run_cli(&workdir, &["generate"])?.status.success());

    let output = run_cli(&workdir, &["stats"])?;

    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.contains("Model: hash-embedder-v1-d64"));
    assert!(text.contains("Chunks: 4"));
    assert!(text.contains("Documents: 2"));
    Ok(())
}
