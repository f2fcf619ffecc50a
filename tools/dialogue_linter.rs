/// Dialogue Linter: checks scripts and documents for integrity problems.
///
/// Usage: dialogue_linter <path> [--config <compiler.ron>] [--notes]
///
/// <path> is a `.dlg` script, a `.json`/`.ron` document, or a directory
/// searched recursively for all three.

use dialogue_graph::core::compiler::{CompileError, DialogueCompiler};
use dialogue_graph::core::document::{self, Format};
use dialogue_graph::core::validator::Diagnostics;
use dialogue_graph::schema::tree::Tree;
use std::path::{Path, PathBuf};
use std::process;

fn main() {
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 || args[1] == "--help" || args[1] == "-h" {
        println!("Usage: dialogue_linter <path> [--config <compiler.ron>] [--notes]");
        process::exit(0);
    }

    let target = PathBuf::from(&args[1]);
    let mut config = None;
    let mut show_notes = false;

    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            "--config" if i + 1 < args.len() => {
                i += 1;
                config = Some(args[i].clone());
            }
            "--notes" => show_notes = true,
            other => {
                eprintln!("Unknown argument: {}", other);
                process::exit(1);
            }
        }
        i += 1;
    }

    let mut builder = DialogueCompiler::builder();
    if let Some(path) = config {
        builder = builder.config_file(path);
    }
    let compiler = match builder.build() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("ERROR: Failed to load config: {}", e);
            process::exit(1);
        }
    };

    let mut files = Vec::new();
    if target.is_file() {
        files.push(target.clone());
    } else if target.is_dir() {
        collect_files(&target, &mut files);
        files.sort();
    } else {
        eprintln!("ERROR: Path '{}' does not exist", target.display());
        process::exit(1);
    }

    println!("\n=== Dialogue Lint Report ===\n");

    let mut total_errors = 0;
    let mut total_warnings = 0;
    for file in &files {
        println!("{}", file.display());
        match load(&compiler, file) {
            Ok(tree) => {
                let diagnostics = compiler.check(&tree);
                report(&diagnostics, show_notes);
                total_errors += diagnostics.errors.len();
                total_warnings += diagnostics.warnings.len();
            }
            Err(e) => {
                println!("  ERROR: {}", e);
                total_errors += 1;
            }
        }
    }

    println!(
        "\nSummary: {} files, {} errors, {} warnings",
        files.len(),
        total_errors,
        total_warnings
    );

    if total_errors == 0 {
        process::exit(0);
    } else {
        process::exit(1);
    }
}

fn load(compiler: &DialogueCompiler, path: &Path) -> Result<Tree, CompileError> {
    let input = std::fs::read_to_string(path)?;
    match Format::from_path(path) {
        Some(format) => Ok(document::decode(&input, format)?),
        None => compiler.build_script(&input),
    }
}

fn report(diagnostics: &Diagnostics, show_notes: bool) {
    if diagnostics.errors.is_empty() && diagnostics.warnings.is_empty() {
        println!("  All checks passed!");
    }
    for warning in &diagnostics.warnings {
        println!("  WARNING: {}", warning);
    }
    for error in &diagnostics.errors {
        println!("  ERROR: {}", error);
    }
    if show_notes {
        for note in &diagnostics.notes {
            println!("  NOTE: {}", note);
        }
    }
}

fn collect_files(dir: &Path, files: &mut Vec<PathBuf>) {
    if let Ok(entries) = std::fs::read_dir(dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                collect_files(&path, files);
            } else if matches!(
                path.extension().and_then(|s| s.to_str()),
                Some("dlg" | "json" | "ron")
            ) {
                files.push(path);
            }
        }
    }
}
