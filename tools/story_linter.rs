/// Story Linter: static checks over a RON story file.
///
/// Usage: story_linter <story.ron> [--strict]
///
/// Exits with status 1 when any error is found (or any warning, with
/// `--strict`).

use dialogue_engine::core::graph::StoryGraph;
use dialogue_engine::core::lint::{lint, Severity};
use dialogue_engine::schema::story::StoryData;
use std::path::Path;
use std::process;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 || args[1] == "--help" || args[1] == "-h" {
        println!("Usage: story_linter <story.ron> [--strict]");
        process::exit(0);
    }

    let story_path = Path::new(&args[1]);
    let strict = args[2..].iter().any(|a| a == "--strict");

    let story = match StoryData::load_from_ron(story_path) {
        Ok(story) => story,
        Err(e) => {
            eprintln!("ERROR: Failed to load story file: {}", e);
            process::exit(1);
        }
    };
    let graph = match StoryGraph::from_story(story) {
        Ok(graph) => graph,
        Err(e) => {
            eprintln!("ERROR: Invalid story: {}", e);
            process::exit(1);
        }
    };

    println!(
        "Loaded {} nodes, {} characters, {} backgrounds, {} fields",
        graph.len(),
        graph.characters().len(),
        graph.backgrounds().len(),
        graph.fields().len()
    );

    let issues = lint(&graph);

    println!("\n=== Story Lint Report ===\n");

    if issues.is_empty() {
        println!("All checks passed!");
    }

    let mut errors = 0;
    let mut warnings = 0;
    for issue in &issues {
        match issue.severity() {
            Severity::Error => {
                errors += 1;
                println!("ERROR: {}", issue);
            }
            Severity::Warning => {
                warnings += 1;
                println!("WARNING: {}", issue);
            }
        }
    }

    println!("\nSummary: {} errors, {} warnings", errors, warnings);

    if errors > 0 || (strict && warnings > 0) {
        process::exit(1);
    }
}
