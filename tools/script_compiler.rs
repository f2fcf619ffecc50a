/// Script Compiler: compiles a dialogue script into a persisted document.
///
/// Usage: script_compiler --input <script.dlg> --output <tree.json|tree.ron> [--config <compiler.ron>]
use dialogue_graph::core::compiler::DialogueCompiler;
use dialogue_graph::core::repository::Repository;
use std::env;
use std::path::Path;
use std::process;

const USAGE: &str =
    "Usage: script_compiler --input <script.dlg> --output <tree.json|tree.ron> [--config <compiler.ron>]";

fn main() {
    let args: Vec<String> = env::args().collect();

    let mut input = None;
    let mut output = None;
    let mut config = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--input" if i + 1 < args.len() => {
                i += 1;
                input = Some(args[i].clone());
            }
            "--output" if i + 1 < args.len() => {
                i += 1;
                output = Some(args[i].clone());
            }
            "--config" if i + 1 < args.len() => {
                i += 1;
                config = Some(args[i].clone());
            }
            "--help" | "-h" => {
                println!("{}", USAGE);
                process::exit(0);
            }
            other => {
                eprintln!("Unknown argument: {}", other);
                process::exit(1);
            }
        }
        i += 1;
    }

    let input_path = input.unwrap_or_else(|| {
        eprintln!("Error: --input is required");
        eprintln!("{}", USAGE);
        process::exit(1);
    });

    let output_path = output.unwrap_or_else(|| {
        eprintln!("Error: --output is required");
        eprintln!("{}", USAGE);
        process::exit(1);
    });

    let mut builder = DialogueCompiler::builder();
    if let Some(path) = config {
        builder = builder.config_file(path);
    }
    let compiler = builder.build().unwrap_or_else(|e| {
        eprintln!("Error loading config: {}", e);
        process::exit(1);
    });

    let mut repo = Repository::new(compiler);
    println!("Compiling '{}'...", input_path);
    let tree = repo.load_script(Path::new(&input_path)).unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        process::exit(1);
    });

    let diagnostics = tree.diagnostics();
    println!(
        "Compiled: {} scenes, {} dialogues, {} actions",
        tree.scenes.len(),
        tree.dialogues.len(),
        tree.actions.len()
    );
    for warning in &diagnostics.warnings {
        println!("WARNING: {}", warning);
    }
    if !diagnostics.notes.is_empty() {
        println!("{} dialogues sit on cycles", diagnostics.notes.len());
    }

    if let Err(e) = repo.save(Path::new(&output_path)) {
        eprintln!("Error writing output file '{}': {}", output_path, e);
        process::exit(1);
    }

    println!("Document saved to '{}'", output_path);
}
