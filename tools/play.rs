/// Play: interactive terminal player for a RON story.
///
/// Usage: play <story.ron> [--save-dir <dir>] [--autosave <secs>]
///             [--dev-node <id> [--dev-values <v1,v2,...>]]
///
/// Commands:
///   <n>          pick option n
///   vars         show field values
///   jump <id>    continue from another node
///   save         save now (no-op in a dev session)
///   help         list commands
///   quit         exit

use dialogue_engine::core::engine::{DialogueEngine, EngineState, Fault};
use dialogue_engine::core::graph::StoryGraph;
use dialogue_engine::core::session::{
    Autosave, DevSessionStore, FileSessionStore, SessionStore,
};
use dialogue_engine::core::surface::{ChoiceOption, DialogueFrame, PresentationSurface};
use dialogue_engine::schema::node::NodeId;
use dialogue_engine::schema::story::StoryData;
use std::io::{self, BufRead, Write};
use std::path::Path;
use std::time::{Duration, Instant};

/// Prints to stdout.
struct TerminalSurface;

impl PresentationSurface for TerminalSurface {
    fn show_dialogue(&mut self, frame: &DialogueFrame) {
        if let Some(bg) = &frame.background {
            println!("[{}]", bg);
        }
        if frame.speaker.is_empty() {
            println!("  {}", frame.text);
        } else {
            println!("{}: {}", frame.speaker, frame.text);
        }
    }

    fn show_choices(&mut self, choices: &[ChoiceOption]) {
        for choice in choices {
            println!("  {}) {}", choice.index + 1, choice.label);
        }
    }

    fn clear_choices(&mut self) {}

    fn story_ended(&mut self, _node: NodeId) {
        println!("\n-- The End --");
    }

    fn story_broken(&mut self, fault: &Fault) {
        println!("\n-- Story broken: {} --", fault);
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 || args[1] == "--help" || args[1] == "-h" {
        print_usage();
        return;
    }

    let story_path = Path::new(&args[1]);
    let mut save_dir = None;
    let mut autosave_secs: u64 = 60;
    let mut dev_node = None;
    let mut dev_values = Vec::new();

    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            "--save-dir" if i + 1 < args.len() => {
                i += 1;
                save_dir = Some(args[i].clone());
            }
            "--autosave" if i + 1 < args.len() => {
                i += 1;
                autosave_secs = args[i].parse().unwrap_or(60);
            }
            "--dev-node" if i + 1 < args.len() => {
                i += 1;
                dev_node = args[i].parse().ok().map(NodeId);
            }
            "--dev-values" if i + 1 < args.len() => {
                i += 1;
                dev_values = args[i]
                    .split(',')
                    .filter_map(|v| v.trim().parse().ok())
                    .collect();
            }
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
                print_usage();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    let graph = match StoryData::load_from_ron(story_path).and_then(StoryGraph::from_story) {
        Ok(graph) => graph,
        Err(e) => {
            eprintln!("ERROR: Failed to load story: {}", e);
            std::process::exit(1);
        }
    };

    let store: Box<dyn SessionStore> = match (dev_node, save_dir) {
        (Some(node), _) => Box::new(DevSessionStore::from_values(
            node,
            &dev_values,
            graph.fields(),
        )),
        (None, Some(dir)) => Box::new(FileSessionStore::new(dir)),
        (None, None) => Box::new(DevSessionStore::default()),
    };

    let session = match store.load() {
        Ok(session) => session,
        Err(e) => {
            eprintln!("ERROR: Failed to load session: {}", e);
            std::process::exit(1);
        }
    };

    let mut engine = match DialogueEngine::builder()
        .with_story(graph)
        .with_session(session)
        .build()
    {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("ERROR: {}", e);
            std::process::exit(1);
        }
    };

    let mut surface = TerminalSurface;
    let mut autosave = Autosave::new(Duration::from_secs(autosave_secs));
    autosave.tick(Instant::now(), &engine, store.as_ref());
    engine.start(&mut surface);

    let stdin = io::stdin();
    loop {
        if !matches!(engine.state(), EngineState::AwaitingChoice(_)) {
            break;
        }
        print!("> ");
        io::stdout().flush().ok();

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }
        let parts: Vec<&str> = line.split_whitespace().collect();

        match parts.as_slice() {
            [] => {}
            ["quit"] | ["exit"] | ["q"] => break,
            ["help"] => print_commands(),
            ["vars"] => {
                for (field, value) in engine.variables().iter() {
                    println!("  {} = {}", field, value);
                }
            }
            ["save"] => match store.save(&engine.snapshot()) {
                Ok(()) => println!("Saved."),
                Err(e) => eprintln!("Save failed: {}", e),
            },
            ["jump", id] => match id.parse() {
                Ok(id) => {
                    engine.jump_to(NodeId(id), &mut surface);
                }
                Err(_) => println!("Usage: jump <id>"),
            },
            [n] => match n.parse::<usize>() {
                Ok(n) if n >= 1 => {
                    if let Err(e) = engine.choose(n - 1, &mut surface) {
                        println!("{}", e);
                    }
                }
                _ => println!("Unknown command: {} (type 'help')", n),
            },
            _ => println!("Unknown command (type 'help')"),
        }

        autosave.tick(Instant::now(), &engine, store.as_ref());
        for warning in engine.take_warnings() {
            println!("  (warning: {})", warning);
        }
    }

    if let Err(e) = store.save(&engine.snapshot()) {
        eprintln!("Save failed: {}", e);
    }
}

fn print_usage() {
    println!("Usage: play <story.ron> [--save-dir <dir>] [--autosave <secs>]");
    println!("            [--dev-node <id> [--dev-values <v1,v2,...>]]");
}

fn print_commands() {
    println!("Commands:");
    println!("  <n>          pick option n");
    println!("  vars         show field values");
    println!("  jump <id>    continue from another node");
    println!("  save         save now");
    println!("  quit         exit");
}
