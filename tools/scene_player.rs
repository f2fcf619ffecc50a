/// Scene Player: plays a compiled scene in the terminal.
///
/// Usage: scene_player <tree.dlg|tree.json|tree.ron> [--scene <id>] [--config <compiler.ron>]
///
/// Commands:
///   <n>        take the n-th offered choice
///   restart    back to the scene's starting dialogue
///   history    list the dialogues visited so far
///   scenes     list the scenes in the tree
///   help       list commands
///   quit       exit

use dialogue_graph::core::compiler::DialogueCompiler;
use dialogue_graph::core::document::Format;
use dialogue_graph::core::repository::Repository;
use dialogue_graph::core::traversal::{Conversation, Step, View};
use std::io::{self, BufRead, Write};
use std::path::Path;
use std::process;

fn main() {
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 || args[1] == "--help" || args[1] == "-h" {
        print_usage();
        return;
    }

    let path = args[1].clone();
    let mut scene = None;
    let mut config = None;

    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            "--scene" if i + 1 < args.len() => {
                i += 1;
                scene = Some(args[i].clone());
            }
            "--config" if i + 1 < args.len() => {
                i += 1;
                config = Some(args[i].clone());
            }
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
                print_usage();
                process::exit(1);
            }
        }
        i += 1;
    }

    let mut builder = DialogueCompiler::builder();
    if let Some(config) = config {
        builder = builder.config_file(config);
    }
    let compiler = builder.build().unwrap_or_else(|e| {
        eprintln!("Error loading config: {}", e);
        process::exit(1);
    });

    let mut repo = Repository::new(compiler);
    let path = Path::new(&path);
    let loaded = if Format::from_path(path).is_some() {
        repo.load_document(path)
    } else {
        repo.load_script(path)
    };
    let tree = loaded.unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        process::exit(1);
    });

    let scene = match scene.or_else(|| tree.scenes.keys().next().map(|id| id.to_string())) {
        Some(scene) => scene,
        None => {
            eprintln!("Error: the tree has no scenes");
            process::exit(1);
        }
    };

    let mut conversation = Conversation::start(tree, &scene).unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        process::exit(1);
    });
    let mut history: Vec<Step> = Vec::new();

    println!("Scene: {}", conversation.scene());
    println!("Type 'help' for commands.\n");
    print_view(&conversation.current());

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("> ");
        stdout.flush().ok();

        let mut line = String::new();
        if stdin.lock().read_line(&mut line).is_err() || line.is_empty() {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match line.to_lowercase().as_str() {
            "quit" | "exit" | "q" => {
                println!("Goodbye.");
                break;
            }
            "help" | "h" | "?" => print_help(),
            "restart" => {
                conversation.restart();
                history.clear();
                print_view(&conversation.current());
            }
            "history" => {
                if history.is_empty() {
                    println!("(nothing yet)");
                }
                for (n, step) in history.iter().enumerate() {
                    match step {
                        Step::Moved(id) => println!("  {}. {}", n + 1, id),
                        Step::Finished => println!("  {}. end", n + 1),
                    }
                }
            }
            "scenes" => {
                for id in tree.scenes.keys() {
                    println!("  {}", id);
                }
            }
            other => match other.parse::<usize>() {
                Ok(n) if n > 0 => match conversation.choose_nth(n - 1) {
                    Ok(step) => {
                        history.push(step);
                        print_view(&conversation.current());
                    }
                    Err(e) => println!("{}", e),
                },
                _ => println!("Unknown command: {}. Type 'help'.", other),
            },
        }
    }
}

fn print_view(view: &View<'_>) {
    match view {
        View::Speaking { text, choices } => {
            println!("\n{}\n", text);
            if choices.is_empty() {
                println!("(no choices; type 'restart' or 'quit')");
            }
            for (n, label) in choices.iter().enumerate() {
                println!("  {}. {}", n + 1, label.unwrap_or("(continue)"));
            }
        }
        View::Finished => println!("\n--- End of scene ---\n"),
    }
}

fn print_usage() {
    println!(
        "Usage: scene_player <tree.dlg|tree.json|tree.ron> [--scene <id>] [--config <compiler.ron>]"
    );
}

fn print_help() {
    println!("Commands:");
    println!("  <n>        take the n-th offered choice");
    println!("  restart    back to the scene's starting dialogue");
    println!("  history    list the dialogues visited so far");
    println!("  scenes     list the scenes in the tree");
    println!("  help       this list");
    println!("  quit       exit");
}
