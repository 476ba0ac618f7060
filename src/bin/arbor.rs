use std::path::PathBuf;
use std::process;

use arbor_wm::actor;
use arbor_wm::common::config::{Config, config_file, restore_file};
use arbor_wm::common::log;
use arbor_wm::ipc::commands::{
    CommandSpec, GROUP_COMMANDS, MAX_COMMANDS, ROOT_COMMANDS, TREE_TAB_COMMANDS,
};
use arbor_wm::layout_engine::LayoutEngine;
use arbor_wm::layout_engine::replay::{self, Step};
use arbor_wm::sys::headless::HeadlessCore;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{error, info};

#[derive(Parser)]
struct Cli {
    /// Path to configuration file to use (overrides default).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Check the configuration and exit.
    #[arg(long)]
    validate: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List the commands an object of the command graph answers to.
    Commands {
        #[arg(value_enum, default_value = "root")]
        object: Object,
    },
    /// Run a recorded session against the headless backend.
    Replay {
        script: PathBuf,

        /// Print every hook fired during the replay.
        #[arg(long)]
        hooks: bool,

        /// Save the resulting state (defaults to the restore file).
        #[arg(long, value_name = "PATH")]
        save: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Object {
    Root,
    Group,
    Treetab,
    Max,
}

impl Object {
    fn table(self) -> &'static [CommandSpec] {
        match self {
            Object::Root => ROOT_COMMANDS,
            Object::Group => GROUP_COMMANDS,
            Object::Treetab => TREE_TAB_COMMANDS,
            Object::Max => MAX_COMMANDS,
        }
    }
}

fn main() {
    let opt = Cli::parse();
    log::init_logging();

    let config_path = opt.config.clone().unwrap_or_else(config_file);
    let config = if config_path.exists() {
        match Config::read(&config_path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("{}: {e}", config_path.display());
                process::exit(1);
            }
        }
    } else {
        Config::default()
    };

    if opt.validate {
        let issues = config.validate();
        if issues.is_empty() {
            println!("Config validation passed");
        } else {
            for issue in issues {
                eprintln!("{}", issue);
            }
            process::exit(1);
        }
        return;
    }

    match opt.command {
        None => {
            let engine = match LayoutEngine::new(&config) {
                Ok(engine) => engine,
                Err(e) => {
                    eprintln!("{e}");
                    process::exit(1);
                }
            };
            let names: Vec<&str> = engine.groups().iter().map(|g| g.name()).collect();
            println!("groups: {}", names.join(" "));
            println!("layouts: {}", config.layout_names().collect::<Vec<_>>().join(" "));
        }
        Some(Commands::Commands { object }) => {
            for spec in object.table() {
                let aliases = if spec.aliases.is_empty() {
                    String::new()
                } else {
                    format!(" (alias {})", spec.aliases.join(", "))
                };
                println!("{}{aliases}\n    {}", spec.signature(), spec.doc);
            }
        }
        Some(Commands::Replay { script, hooks, save }) => {
            if let Err(e) = run_replay(&script, hooks, save) {
                error!("replay failed: {e:#}");
                process::exit(1);
            }
        }
    }
}

fn run_replay(script: &std::path::Path, hooks: bool, save: Option<PathBuf>) -> anyhow::Result<()> {
    let (tx, mut rx) = actor::channel();
    let mut core = HeadlessCore::with_hook_sender(tx);
    let engine = replay::replay(script, &mut core, |step, response| {
        if let Step::Request(request) = step {
            println!("{}", serde_json::json!({ "request": request, "response": response }));
        }
    })?;
    if hooks {
        for hook in actor::drain(&mut rx) {
            println!("{}", serde_json::json!(hook));
        }
    }
    print!("{}", engine.draw_tree());
    let path = save.unwrap_or_else(restore_file);
    engine.save(&path)?;
    info!(path = %path.display(), "state saved");
    Ok(())
}
