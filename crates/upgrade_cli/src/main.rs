use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::HashSet;
use upgrade_core::{
    available_commands, status_line, upgradable_abilities, AbilityId, Command, CommandEnvelope,
    CommandId, CommandKind, Event, EventEnvelope, ResearchState, TechId, UpgradeGraph,
};
use upgrade_world::{build_sandbox, load_content, SandboxColony, SandboxPawn};

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

#[derive(Parser)]
#[command(name = "upgrade_cli", about = "Ability upgrade device CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load and validate the content directory.
    Validate {
        #[arg(long, default_value = "./content")]
        content_dir: String,
    },
    /// Show the upgrade menu a pawn holding the given abilities would see.
    Menu {
        #[arg(long, default_value = "./content")]
        content_dir: String,
        /// Ability held by the pawn. Repeatable.
        #[arg(long = "ability")]
        abilities: Vec<String>,
        /// Finished research project. Repeatable.
        #[arg(long = "research")]
        research: Vec<String>,
    },
    /// Drive a sandbox device tick by tick with a scripted session.
    Run {
        #[arg(long, default_value = "./content")]
        content_dir: String,
        /// Ability held by the pawn. Repeatable. Ignored with --state.
        #[arg(long = "ability", conflicts_with = "state_file")]
        abilities: Vec<String>,
        #[arg(long = "research", conflicts_with = "state_file")]
        research: Vec<String>,
        /// Upgrade to select on the first tick, as `ability:index`.
        #[arg(long, value_parser = parse_selection)]
        select: Option<(AbilityId, usize)>,
        #[arg(long, default_value_t = 0, conflicts_with = "state_file")]
        fuel: u32,
        /// Add fuel at a tick, as `tick:amount`. Repeatable.
        #[arg(long = "refuel-at", value_parser = parse_refuel)]
        refuel_at: Vec<(u64, u32)>,
        #[arg(long)]
        ticks: u64,
        #[arg(long)]
        power_off_at: Option<u64>,
        #[arg(long)]
        cancel_at: Option<u64>,
        #[arg(long)]
        eject_at: Option<u64>,
        /// Destroy the device after the last tick.
        #[arg(long)]
        destroy: bool,
        #[arg(long, conflicts_with = "state_file")]
        seed: Option<u64>,
        /// Resume from a sandbox saved with --save.
        #[arg(long = "state")]
        state_file: Option<String>,
        /// Write the final sandbox to this file.
        #[arg(long)]
        save: Option<String>,
        #[arg(long, default_value_t = 100)]
        print_every: u64,
        /// Print events as JSON lines instead of text.
        #[arg(long)]
        json: bool,
    },
}

fn parse_selection(raw: &str) -> Result<(AbilityId, usize), String> {
    let (ability, index) = raw
        .rsplit_once(':')
        .ok_or_else(|| format!("expected ability:index, got '{raw}'"))?;
    let index = index
        .parse()
        .map_err(|err| format!("bad upgrade index '{index}': {err}"))?;
    Ok((AbilityId(ability.to_string()), index))
}

fn parse_refuel(raw: &str) -> Result<(u64, u32), String> {
    let (tick, amount) = raw
        .split_once(':')
        .ok_or_else(|| format!("expected tick:amount, got '{raw}'"))?;
    let tick = tick.parse().map_err(|err| format!("bad tick '{tick}': {err}"))?;
    let amount = amount
        .parse()
        .map_err(|err| format!("bad amount '{amount}': {err}"))?;
    Ok((tick, amount))
}

fn ability_ids(raw: &[String]) -> Vec<AbilityId> {
    raw.iter().map(|id| AbilityId(id.clone())).collect()
}

fn tech_ids(raw: &[String]) -> HashSet<TechId> {
    raw.iter().map(|id| TechId(id.clone())).collect()
}

fn load_graph(content_dir: &str) -> Result<UpgradeGraph> {
    let content = load_content(content_dir)
        .with_context(|| format!("loading content from {content_dir}"))?;
    Ok(UpgradeGraph::from_content(&content))
}

// ---------------------------------------------------------------------------
// validate / menu
// ---------------------------------------------------------------------------

fn validate(content_dir: &str) -> Result<()> {
    let graph = load_graph(content_dir)?;
    println!(
        "content_version={} abilities={} upgrades={} grantable={}",
        graph.content_version(),
        graph.abilities().len(),
        graph.edge_count(),
        graph.grantable_abilities().count(),
    );
    let cycles = graph.find_cycles();
    if cycles.is_empty() {
        println!("no upgrade cycles");
    } else {
        let names: Vec<&str> = cycles.iter().map(|id| id.0.as_str()).collect();
        println!("WARNING: abilities on upgrade cycles: {}", names.join(", "));
    }
    Ok(())
}

fn menu(content_dir: &str, abilities: &[String], research: &[String]) -> Result<()> {
    let graph = load_graph(content_dir)?;
    let colony = build_sandbox(&graph, &ability_ids(abilities), 0, tech_ids(research), 0);
    let Some(pawn) = colony.device.occupant.as_ref() else {
        bail!("sandbox has no pawn");
    };

    let upgradable = upgradable_abilities(pawn, &graph);
    println!("upgradable: {}", join_labels(&graph, &upgradable));

    let research_state = ResearchState {
        finished: tech_ids(research),
    };
    for option in available_commands(&colony.state, &colony.device, &research_state, &graph) {
        if option.kind != CommandKind::UpgradeAbility {
            continue;
        }
        if let Some(reason) = option.disabled {
            println!("upgrade disabled: {reason}");
        }
        for entry in option.menu {
            println!(
                "  {}:{}  {} -> {}  cost={} time={}",
                entry.source,
                entry.edge_index,
                graph.label(&entry.source),
                graph.label(&entry.target),
                entry.cost,
                entry.duration,
            );
        }
    }
    Ok(())
}

fn join_labels(graph: &UpgradeGraph, abilities: &[AbilityId]) -> String {
    if abilities.is_empty() {
        return "[]".to_string();
    }
    let labels: Vec<&str> = abilities.iter().map(|id| graph.label(id)).collect();
    format!("[{}]", labels.join(", "))
}

// ---------------------------------------------------------------------------
// Run loop
// ---------------------------------------------------------------------------

/// Commands and world changes scheduled by tick.
struct Script {
    select: Option<(AbilityId, usize)>,
    start_tick: u64,
    refuel_at: Vec<(u64, u32)>,
    power_off_at: Option<u64>,
    cancel_at: Option<u64>,
    eject_at: Option<u64>,
}

impl Script {
    fn commands_for(&self, tick: u64) -> Vec<CommandEnvelope> {
        let mut commands = Vec::new();
        let mut push = |command: Command| {
            commands.push(CommandEnvelope {
                id: CommandId(format!("cmd_{tick:06}_{}", commands.len())),
                issued_tick: tick,
                execute_at_tick: tick,
                command,
            });
        };
        if tick == self.start_tick {
            if let Some((ability, edge_index)) = &self.select {
                push(Command::SelectUpgrade {
                    ability: ability.clone(),
                    edge_index: *edge_index,
                });
            }
        }
        if self.cancel_at == Some(tick) {
            push(Command::CancelUpgrade);
        }
        if self.eject_at == Some(tick) {
            push(Command::EjectOccupant);
        }
        commands
    }

    fn apply_world_changes(&self, colony: &mut SandboxColony) {
        let tick = colony.tick;
        for (_, amount) in self.refuel_at.iter().filter(|(at, _)| *at == tick) {
            colony.device.fuel = colony.device.fuel.saturating_add(*amount);
            println!("[tick={tick:05}] refuelled +{amount} (fuel={})", colony.device.fuel);
        }
        if self.power_off_at == Some(tick) {
            colony.device.powered = false;
            println!("[tick={tick:05}] power cut");
        }
    }
}

fn open_sandbox(
    graph: &UpgradeGraph,
    state_file: Option<&str>,
    abilities: &[String],
    research: &[String],
    fuel: u32,
    seed: Option<u64>,
) -> Result<(SandboxColony, ChaCha8Rng)> {
    if let Some(path) = state_file {
        let json =
            std::fs::read_to_string(path).with_context(|| format!("reading state file: {path}"))?;
        let mut colony: SandboxColony =
            serde_json::from_str(&json).with_context(|| format!("parsing state file: {path}"))?;
        colony.restore(graph);
        tracing::info!(path, tick = colony.tick, "resumed sandbox");
        let rng = ChaCha8Rng::seed_from_u64(colony.seed.wrapping_add(colony.tick));
        return Ok((colony, rng));
    }
    let resolved_seed = seed.unwrap_or_else(rand::random);
    let colony = build_sandbox(
        graph,
        &ability_ids(abilities),
        fuel,
        tech_ids(research),
        resolved_seed,
    );
    Ok((colony, ChaCha8Rng::seed_from_u64(resolved_seed)))
}

fn run(
    graph: &UpgradeGraph,
    mut colony: SandboxColony,
    rng: &mut ChaCha8Rng,
    script: &Script,
    ticks: u64,
    print_every: u64,
    json: bool,
) -> Result<SandboxColony> {
    println!(
        "Starting session: tick={} seed={} fuel={} content_version={}",
        colony.tick,
        colony.seed,
        colony.device.fuel,
        graph.content_version(),
    );
    print_pawn(graph, &colony);
    println!("{}", "-".repeat(80));

    for _ in 0..ticks {
        script.apply_world_changes(&mut colony);
        let commands = script.commands_for(colony.tick);
        let events = colony.step(&commands, graph, rng);
        print_events(graph, &events, json)?;
        if print_every > 0 && colony.tick % print_every == 0 {
            print_status(graph, &colony);
        }
    }

    println!("{}", "-".repeat(80));
    println!("Done at tick {}:", colony.tick);
    print_status(graph, &colony);
    print_pawn(graph, &colony);
    Ok(colony)
}

fn print_events(graph: &UpgradeGraph, events: &[EventEnvelope], json: bool) -> Result<()> {
    for envelope in events {
        if json {
            println!("{}", serde_json::to_string(envelope).context("serializing event")?);
        } else {
            println!("[tick={:05}] {}", envelope.tick, describe(graph, &envelope.event));
        }
    }
    Ok(())
}

fn describe(graph: &UpgradeGraph, event: &Event) -> String {
    match event {
        Event::UpgradeSelected { pawn_id, from, to, .. } => {
            format!("{pawn_id} selected {} -> {}", graph.label(from), graph.label(to))
        }
        Event::UpgradeStarted { from, to, cost, finish_tick, .. } => format!(
            "upgrade started {} -> {} (cost {cost}, finishes at {finish_tick})",
            graph.label(from),
            graph.label(to)
        ),
        Event::UpgradeCompleted { pawn_id, from, to, .. } => format!(
            "*** {pawn_id} upgraded {} -> {} ***",
            graph.label(from),
            graph.label(to)
        ),
        Event::UpgradeInterrupted { reason, refund, penalty, .. } => {
            let mut line = format!("upgrade interrupted ({reason:?})");
            if let Some(refund) = refund {
                line.push_str(&format!(", refunded {} {}", refund.quantity, refund.kind));
            }
            if let Some(penalty) = penalty {
                line.push_str(&format!(", {} +{:.2}", penalty.kind, penalty.severity));
            }
            line
        }
        Event::SelectionCleared { source, edge_index, reason, .. } => {
            format!("selection {source}:{edge_index} cleared ({reason:?})")
        }
        Event::OccupantEjected { pawn_id, .. } => format!("{pawn_id} ejected"),
        Event::CommandRejected { command_id, reason } => {
            format!("command {command_id} rejected: {reason}")
        }
    }
}

fn print_status(graph: &UpgradeGraph, colony: &SandboxColony) {
    let status = status_line(&colony.state, &colony.device, colony.tick, graph)
        .unwrap_or_else(|| "Idle".to_string());
    println!(
        "[tick={:05}]  fuel={:4}  power={}  refunded={}  {status}",
        colony.tick,
        colony.device.fuel,
        if colony.device.powered { "on" } else { "off" },
        colony.spawned_total(),
    );
}

fn print_pawn(graph: &UpgradeGraph, colony: &SandboxColony) {
    let (pawn, place): (Option<&SandboxPawn>, &str) = match &colony.device.occupant {
        Some(pawn) => (Some(pawn), "in device"),
        None => (colony.device.released.last(), "released"),
    };
    let Some(pawn) = pawn else {
        println!("no pawn");
        return;
    };
    let penalties: Vec<String> = pawn
        .penalties
        .iter()
        .map(|(kind, severity)| format!("{kind}={severity:.2}"))
        .collect();
    println!(
        "{} ({place}): abilities={} penalties=[{}]",
        pawn.id,
        join_labels(graph, &pawn.abilities),
        penalties.join(", "),
    );
}

fn save(colony: &SandboxColony, path: &str) -> Result<()> {
    let file = std::fs::File::create(path).with_context(|| format!("creating {path}"))?;
    serde_json::to_writer_pretty(file, colony).with_context(|| format!("writing {path}"))?;
    println!("Sandbox saved to {path}");
    Ok(())
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Validate { content_dir } => validate(&content_dir)?,
        Commands::Menu {
            content_dir,
            abilities,
            research,
        } => menu(&content_dir, &abilities, &research)?,
        Commands::Run {
            content_dir,
            abilities,
            research,
            select,
            fuel,
            refuel_at,
            ticks,
            power_off_at,
            cancel_at,
            eject_at,
            destroy,
            seed,
            state_file,
            save: save_path,
            print_every,
            json,
        } => {
            let graph = load_graph(&content_dir)?;
            let (colony, mut rng) = open_sandbox(
                &graph,
                state_file.as_deref(),
                &abilities,
                &research,
                fuel,
                seed,
            )?;
            let script = Script {
                select,
                start_tick: colony.tick,
                refuel_at,
                power_off_at,
                cancel_at,
                eject_at,
            };
            let mut colony = run(&graph, colony, &mut rng, &script, ticks, print_every, json)?;
            if destroy {
                let events = colony.destroy_device(&graph, &mut rng);
                print_events(&graph, &events, json)?;
                println!("device destroyed");
            }
            if let Some(path) = save_path {
                save(&colony, &path)?;
            }
        }
    }
    Ok(())
}
