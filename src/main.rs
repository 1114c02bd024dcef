//! Tetrahedron CLI
//!
//! Entry point for the `tetrahedron` binary. Every command works on the JSON
//! state file; protocol declines are printed and mapped to exit codes.

mod cli;

use std::collections::BTreeSet;

use anyhow::{anyhow, bail, Context};
use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use clap::Parser;
use tracing::{debug, info};

use tetrahedron::config::{self, TetraConfig};
use tetrahedron::error::Error;
use tetrahedron::logging;
use tetrahedron::module::{Module, ModuleMetadata};
use tetrahedron::protocol::{
    MemorialMessage, MemorialRequest, MemorialUpdate, MissingNodeProtocol, ReplacementCriteria,
};
use tetrahedron::store::{StateStore, TetraState};
use tetrahedron::topology::{Vertex, EDGE_COUNT, VERTEX_COUNT};
use tetrahedron::version;

use crate::cli::{Cli, Commands, ConfigSubcommand, MemorialSubcommand, ModuleSubcommand};

fn main() {
    // Parse CLI arguments first (before logging, so we know verbosity)
    let cli = Cli::parse();

    if let Err(err) = run(cli) {
        match err.downcast_ref::<Error>() {
            Some(e) => {
                eprint!("{}", e.format_for_terminal());
                std::process::exit(e.exit_code());
            }
            None => {
                eprintln!("Error: {:#}", err);
                std::process::exit(1);
            }
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Version => {
            version::print_version();
            return Ok(());
        }
        Commands::Config { ref subcommand } => {
            // Config commands use minimal logging
            logging::init_simple(tracing::Level::WARN)?;
            return handle_config_command(subcommand.clone(), cli.config.as_deref());
        }
        _ => {}
    }

    let config = TetraConfig::load(cli.config.as_deref())?;

    // The guards must be kept alive for the lifetime of the program
    let _log_guards = logging::init_logging(&config.logging, cli.verbose, cli.quiet)?;

    let store = StateStore::new(cli.state.clone().unwrap_or_else(|| config.state_file()));
    debug!(
        version = %version::build_info().full_version(),
        state = %store.path().display(),
        "Starting tetrahedron"
    );

    match cli.command {
        Commands::Module { subcommand } => handle_module_command(subcommand, &config, &store),
        Commands::Memorial { subcommand } => handle_memorial_command(subcommand, &config, &store),
        Commands::Status => show_status(&config, &store),
        Commands::Version | Commands::Config { .. } => unreachable!("handled above"),
    }
}

fn handle_config_command(subcommand: ConfigSubcommand, path: Option<&str>) -> anyhow::Result<()> {
    match subcommand {
        ConfigSubcommand::Show => {
            let cfg = TetraConfig::load(path)?;
            println!("{}", toml::to_string_pretty(&cfg).map_err(Error::from)?);
        }
        ConfigSubcommand::Init { path, force } => {
            let written = config::init_config(path.as_deref(), force)?;
            println!("Configuration file created: {}", written.display());
        }
        ConfigSubcommand::Validate => {
            TetraConfig::load(path)?;
            println!("Configuration is valid.");
        }
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────────
// Modules
// ─────────────────────────────────────────────────────────────────

fn require_module(state: &TetraState, group: &str) -> anyhow::Result<Module> {
    state.module(group)?.ok_or_else(|| {
        anyhow!(
            "No module for group '{}'. Create one with 'tetrahedron module create'.",
            group
        )
    })
}

fn handle_module_command(
    subcommand: ModuleSubcommand,
    config: &TetraConfig,
    store: &StateStore,
) -> anyhow::Result<()> {
    let mut state = store.load()?;

    match subcommand {
        ModuleSubcommand::Create {
            group,
            name,
            category,
            vertices,
            force,
        } => {
            if state.modules.contains_key(&group) && !force {
                bail!(
                    "Group '{}' already has a module. Use --force to replace it.",
                    group
                );
            }
            let count = vertices.len();
            let vertices: [Vertex; VERTEX_COUNT] = vertices.try_into().map_err(|_| {
                anyhow!(
                    "A tetrahedron needs exactly {} --vertex values, got {}",
                    VERTEX_COUNT,
                    count
                )
            })?;

            let module = Module::new(ModuleMetadata::new(group.as_str(), name, category), vertices)?;
            state.put_module(group.as_str(), &module);
            store.save(&state)?;

            info!(group = %group, "Module created");
            println!(
                "Created module '{}' with {} vertices and {} edges",
                group, VERTEX_COUNT, EDGE_COUNT
            );
        }
        ModuleSubcommand::Show { group } => {
            let module = require_module(&state, &group)?;
            let protocol = config.restore_protocol(state.protocol.clone());
            let metadata = module.metadata();

            println!("{} ({}) [{}]", metadata.name, metadata.id, metadata.category);
            println!("State: {}", protocol.group_state(&group));
            println!();
            println!("Vertices:");
            for vertex in module.vertices() {
                let marker = if protocol.get_memorial(&group, &vertex.id).is_some() {
                    " (memorial)"
                } else {
                    ""
                };
                println!(
                    "  {:<12} {:<16} {}{}",
                    vertex.id, vertex.name, vertex.category, marker
                );
            }
            println!();
            println!("Edges:");
            for edge in module.edges() {
                println!("  {:<24} {:.2}", edge.id, edge.strength);
            }
        }
        ModuleSubcommand::Edge {
            group,
            from,
            to,
            strength,
        } => {
            let mut module = require_module(&state, &group)?;
            let stored = module.update_edge_strength(&from, &to, strength)?.strength;
            state.put_module(group.as_str(), &module);
            store.save(&state)?;
            println!("Edge {}-{} strength set to {:.2}", from, to, stored);
        }
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────────
// Memorials
// ─────────────────────────────────────────────────────────────────

/// Midnight UTC on the given day
fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN))
}

fn persist(
    store: &StateStore,
    state: &mut TetraState,
    protocol: &MissingNodeProtocol,
) -> anyhow::Result<()> {
    state.protocol = protocol.snapshot();
    store
        .save(state)
        .with_context(|| format!("saving protocol state to {}", store.path().display()))
}

fn record_not_found(group: &str, message: String) -> Error {
    Error::RecordNotFound {
        group_id: group.to_string(),
        message,
    }
}

fn handle_memorial_command(
    subcommand: MemorialSubcommand,
    config: &TetraConfig,
    store: &StateStore,
) -> anyhow::Result<()> {
    let mut state = store.load()?;
    let protocol = config.restore_protocol(state.protocol.clone());

    match subcommand {
        MemorialSubcommand::Mark {
            group,
            vertex,
            loss_type,
            loss_date,
            last_active,
            preserve,
            contributions,
        } => {
            let module = require_module(&state, &group)?;
            let mut request =
                MemorialRequest::from_module(&module, &vertex, loss_type, start_of_day(loss_date))?
                    .preserve(preserve);
            if let Some(date) = last_active {
                request = request.last_active(start_of_day(date));
            }
            for contribution in contributions {
                request = request.contribution(contribution);
            }

            let memorial = protocol.mark_as_memorial(&group, request)?;
            persist(store, &mut state, &protocol)?;

            let triad = protocol
                .get_triad_status(&group)
                .map(|t| t.remaining_vertices.join(", "))
                .unwrap_or_default();
            println!(
                "{} is now a memorial ({} on {}). Triad: {}",
                memorial.name,
                memorial.loss_type,
                memorial.loss_date.format("%Y-%m-%d"),
                triad
            );
            println!(
                "Minimum stabilization: {} days",
                protocol.policy().minimum_days(memorial.loss_type)
            );
        }
        MemorialSubcommand::Check { group } => {
            let report = protocol.check_triad_stability(&group).ok_or_else(|| {
                record_not_found(&group, format!("No open triad stabilization for group {}", group))
            })?;
            println!("Stable: {}", if report.is_stable { "yes" } else { "no" });
            println!(
                "Days since loss: {} (minimum {} for {})",
                report.days_since_loss, report.minimum_days, report.loss_type
            );
            println!("{}", report.recommendation);
        }
        MemorialSubcommand::Vote {
            group,
            votes,
            unanimous,
            prefer,
        } => {
            let criteria = ReplacementCriteria {
                preferred_category: prefer,
                consent: votes.into_iter().collect(),
                requires_unanimous: unanimous,
                ..Default::default()
            };
            let outcome = protocol.signal_readiness_for_replacement(&group, &criteria);
            if outcome.success {
                persist(store, &mut state, &protocol)?;
            }
            println!("{}", outcome.into_result()?);
        }
        MemorialSubcommand::Restore { group, vertex } => {
            let outcome = protocol.restore_vertex(&group, &vertex);
            if outcome.success {
                persist(store, &mut state, &protocol)?;
            }
            println!("{}", outcome.into_result()?);
        }
        MemorialSubcommand::Message {
            group,
            vertex,
            author,
            text,
        } => {
            let update = MemorialUpdate {
                message: Some(MemorialMessage::new(author, text)),
                ..Default::default()
            };
            let memorial = protocol
                .update_memorial(&group, &vertex, update)
                .ok_or_else(|| {
                    record_not_found(
                        &group,
                        format!("No memorial found for vertex {} in group {}", vertex, group),
                    )
                })?;
            persist(store, &mut state, &protocol)?;
            println!(
                "Message left for {} ({} total)",
                memorial.name,
                memorial.messages.len()
            );
        }
        MemorialSubcommand::List { group } => {
            let memorials = protocol.all_memorials(&group);
            if memorials.is_empty() {
                println!("No memorials for group {}", group);
                return Ok(());
            }
            for memorial in &memorials {
                let mut flags = Vec::new();
                if memorial.preserve_indefinitely {
                    flags.push("preserved");
                }
                if memorial.allow_replacement {
                    flags.push("replacement-allowed");
                }
                println!(
                    "  {:<12} {:<16} {:<13} lost {}  {}",
                    memorial.vertex_id,
                    memorial.name,
                    memorial.loss_type,
                    memorial.loss_date.format("%Y-%m-%d"),
                    flags.join(" ")
                );
            }
            println!("State: {}", protocol.group_state(&group));
        }
        MemorialSubcommand::Ghost { group, vertex } => {
            let ghost = protocol.should_become_ghost(&group, &vertex);
            println!("{}", if ghost { "yes" } else { "no" });
        }
    }
    Ok(())
}

fn show_status(config: &TetraConfig, store: &StateStore) -> anyhow::Result<()> {
    let state = store.load()?;
    let protocol = config.restore_protocol(state.protocol.clone());

    let groups: BTreeSet<String> = state
        .modules
        .keys()
        .cloned()
        .chain(protocol.groups())
        .collect();
    if groups.is_empty() {
        println!("No groups yet");
        return Ok(());
    }

    for group in groups {
        let name = state
            .modules
            .get(&group)
            .map(|m| m.metadata.name.as_str())
            .unwrap_or("-");
        println!("  {:<16} {:<24} {}", group, name, protocol.group_state(&group));
    }
    Ok(())
}
