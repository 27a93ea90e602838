use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use std::process;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use anyhow::{Context, Result};
use gobind::signal::{self, SignalFlags};
use gobind::{BridgeConfig, Dynamic, MainContext, Object, Type, TypecheckPolicy};

#[derive(Parser)]
#[command(name = "gobind")]
#[command(about = "Inspect the GObject type system and exercise the binding", long_about = None)]
struct Cli {
    /// Log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Fail on wrapper type mismatches instead of warning
    #[arg(long, global = true)]
    strict: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List registered types
    Types {
        /// How to lay the listing out
        #[arg(long, value_enum, default_value_t = Layout::Table)]
        layout: Layout,
        /// Also show GInitiallyUnowned
        #[arg(short, long)]
        all: bool,
    },
    /// Run a round trip through values, signals, properties and the main loop
    Probe,
}

#[derive(Clone, Copy, ValueEnum)]
enum Layout {
    Table,
    Tree,
}

fn main() {
    if let Err(e) = run() {
        eprintln!("{}: {}", "error".red().bold(), e);
        process::exit(1);
    }
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default))
        .format_timestamp(None)
        .init();
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut config = BridgeConfig::from_env();
    if cli.strict {
        config.typecheck = TypecheckPolicy::Strict;
    }
    config.trace_dispatch |= cli.verbose > 1;
    gobind::config::init(config);

    match cli.command {
        Commands::Types { layout, all } => types_command(layout, all),
        Commands::Probe => probe_command(),
    }
}

fn types_command(layout: Layout, all: bool) -> Result<()> {
    let mut types: Vec<Type> = Type::FUNDAMENTALS.to_vec();
    if all {
        types.push(Type::initially_unowned());
    }

    match layout {
        Layout::Table => {
            println!("{:>6}  {:<20} {:<12} {}", "ID".bold(), "NAME".bold(), "FUNDAMENTAL".bold(), "DEPTH".bold());
            for t in &types {
                println!("{:>6}  {:<20} {:<12} {}", t.into_glib(), t.name().cyan(), t.fundamental().name(), t.depth());
            }
        }
        Layout::Tree => {
            for t in &types {
                let chain: Vec<String> = t.ancestors().map(|a| a.name()).collect();
                let indent = "  ".repeat(chain.len().saturating_sub(1));
                println!("{}{} {}", indent, "→".cyan(), chain.join(" <- "));
            }
        }
    }
    Ok(())
}

fn probe_command() -> Result<()> {
    println!("{} binding round trip", "Probing".green().bold());

    println!("  {} Values...", "→".cyan());
    for input in [Dynamic::I32(-7), Dynamic::U64(u64::MAX), Dynamic::from("probe"), Dynamic::Bool(true)] {
        let value = gobind::Value::from_managed(&input)?;
        let back = value.to_managed()?;
        if back != input {
            anyhow::bail!("value {} came back as {}", input, back);
        }
    }

    println!("  {} Signals...", "→".cyan());
    let probe = Type::register_object("GobindProbe", Type::OBJECT)?;
    if signal::query(probe, "bump").is_err() {
        signal::new_signal("bump", probe, SignalFlags::RUN_LAST, Type::I32, &[Type::I32])?;
    }
    let object = Object::new(probe)?;
    let handler = object.connect("bump", |_obj: Object, x: i32| x + 1)?;
    let result = object.emit("bump", &[Dynamic::I32(41)]).context("emitting bump")?;
    if result != Dynamic::I32(42) {
        anyhow::bail!("bump(41) returned {}", result);
    }
    object.handler_disconnect(handler);

    println!("  {} Properties...", "→".cyan());
    gobind::property::install(probe, "label", Type::STRING)?;
    object.set_property("label", &Dynamic::from("bumped"))?;
    let label = object.property("label")?;
    if label != Dynamic::from("bumped") {
        anyhow::bail!("label came back as {}", label);
    }

    println!("  {} Main loop...", "→".cyan());
    let context = MainContext::new()?;
    let ticks = Arc::new(AtomicUsize::new(0));
    let counter = ticks.clone();
    context.idle_add(move || counter.fetch_add(1, Ordering::SeqCst) + 1 < 3)?;
    while context.iteration(false) {}
    if ticks.load(Ordering::SeqCst) != 3 {
        anyhow::bail!("idle callback ran {} times, expected 3", ticks.load(Ordering::SeqCst));
    }

    log::debug!("{} closures still registered", gobind::closure::registered_count());
    println!("{} bump(41) = {}, idle ran 3 times", "✓".green().bold(), result);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_all_flag_help_names_what_it_adds() {
        let cli = Cli::command();
        let types = cli.find_subcommand("types").unwrap();
        let all = types.get_arguments().find(|arg| arg.get_id() == "all").unwrap();
        let help = all.get_help().unwrap().to_string();
        assert!(help.contains("GInitiallyUnowned"));
        assert!(!help.contains("derived from GObject"));
    }

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }
}
