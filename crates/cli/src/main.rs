//! quadpos CLI
//!
//! Command-line interface for placing application windows into display
//! quadrants according to the monitor profile that matches the connected
//! displays.
//!
//! Without `--fixture` the native backend for the current OS is used.

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use quadpos::config::Config;
use quadpos::profiles::{render_snippet, suggest_monitors, update_profile};
use quadpos::{DisplayService, PlacementReport, Positioner, SlotOutcome, Verification};
use quadpos_core_layout::{Display, MonitorRole};
use quadpos_platform::{native_backend, Backend, Capabilities, FixturePlatform};
use tracing::warn;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "quadpos")]
#[command(author, version, about = "Place application windows into display quadrants")]
struct Cli {
    /// Configuration file (default: search the standard locations)
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Answer from a JSON desktop snapshot instead of the native backend
    #[arg(long, global = true, value_name = "FILE")]
    fixture: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List connected displays
    ListScreens {
        /// Use the richer display source and show positioning coordinates
        #[arg(long)]
        enhanced: bool,
    },
    /// List running applications and their bundle ids
    ListApps,
    /// Print the profile matching the connected displays
    Detect,
    /// Place applications according to a profile
    Position {
        /// Profile to use (default: detect from connected displays)
        profile: Option<String>,
    },
    /// Print a profile entry describing the connected displays
    GenerateConfig {
        /// Name for the generated profile
        profile: String,
    },
    /// Replace a profile's monitors with the connected displays, after confirmation
    UpdateProfile {
        /// Profile to update or create
        profile: String,
    },
    /// Replace a profile's monitors with the connected displays, without asking
    QuickUpdate {
        /// Profile to update or create
        profile: String,
    },
    /// Check whether window control is permitted
    CheckPermissions,
}

/// Log level from the configuration, invalid values falling back to info.
fn level_name(configured: Option<&str>) -> &'static str {
    match configured.map(str::to_lowercase).as_deref() {
        Some("trace") => "trace",
        Some("debug") => "debug",
        Some("warn") => "warn",
        Some("error") => "error",
        _ => "info",
    }
}

fn init_logging(verbose: bool, configured: Option<&str>) {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) if verbose => EnvFilter::new("debug"),
        Err(_) => EnvFilter::new(level_name(configured)),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

fn load_config(explicit: Option<&Path>) -> Result<(PathBuf, Config)> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => Config::discover()?,
    };
    let config = Config::load_from_path(&path)?;
    Ok((path, config))
}

fn open_backend(fixture: Option<&Path>) -> Result<Box<dyn Backend>> {
    match fixture {
        Some(path) => {
            let platform = FixturePlatform::load(path)
                .with_context(|| format!("Failed to load fixture: {}", path.display()))?;
            Ok(Box::new(platform))
        }
        None => native_backend().context("No native backend available; pass --fixture <file>"),
    }
}

fn confirm(prompt: &str) -> Result<bool> {
    print!("{} (y/N): ", prompt);
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(answer.trim().eq_ignore_ascii_case("y"))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_basic_screens(displays: &[Display]) {
    println!("Connected displays ({}):", displays.len());
    for display in displays {
        println!(
            "  {}: {} at {}{}",
            display.name,
            display.resolution,
            display.arrangement_origin,
            if display.is_primary { " (main)" } else { "" }
        );
    }
}

fn print_enhanced_screens(displays: &[Display]) {
    println!("Connected displays ({}):", displays.len());
    for display in displays {
        println!("  {}", display.name);
        if let Some(os_name) = &display.os_name {
            println!("    OS name:      {}", os_name);
        }
        println!("    Resolution:   {}", display.resolution);
        println!("    Positioning:  {}", display.positioning_origin);
        println!("    Relation:     {}", display.relation());
        if let Some(work_area) = &display.work_area {
            println!("    Work area:    {}", work_area);
        }
        println!("    Source:       {}", display.source);
    }

    println!();
    println!("Coordinate mapping (arrangement -> positioning):");
    for display in displays {
        println!(
            "  {:<28} {} -> {}{}",
            display.name,
            display.arrangement_origin,
            display.positioning_origin,
            if display.mapped { "" } else { " (unmapped)" }
        );
    }
}

fn print_permission_help() {
    let exe = std::env::current_exe()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|_| "quadpos".to_string());
    println!("Accessibility permission is required to move windows.");
    println!("Grant it in System Settings > Privacy & Security > Accessibility");
    println!("and add: {}", exe);
    println!("Then run this command again.");
}

fn print_report(report: &PlacementReport) {
    if let Some(profile) = &report.profile {
        println!("Profile: {}", profile);
    }
    for target in &report.targets {
        let note = if target.role == MonitorRole::Primary && !target.main_display {
            ", not the main display"
        } else {
            ""
        };
        println!("  {} -> {} ({}{})", target.role, target.display, target.resolution, note);
    }

    for slot in &report.slots {
        let place = match slot.quadrant {
            Some(quadrant) => format!("{} {}", slot.role, quadrant),
            None => slot.role.to_string(),
        };
        let line = match &slot.outcome {
            SlotOutcome::Placed {
                target,
                strategy,
                verification,
                landed_on,
                ..
            } => {
                let check = match verification {
                    Verification::Confirmed { .. } => String::new(),
                    Verification::Offset { dx, dy, .. } => format!(", off by {}px/{}px", dx, dy),
                    Verification::Unverified => ", unverified".to_string(),
                };
                let on = landed_on
                    .as_deref()
                    .map(|d| format!(" on {}", d))
                    .unwrap_or_default();
                format!("placed at {}{} ({}{})", target, on, strategy, check)
            }
            SlotOutcome::Skipped(reason) => format!("skipped: {}", reason),
            SlotOutcome::Failed(reason) => format!("failed: {}", reason),
        };
        println!("  [{}] {}: {}", place, slot.display_name(), line);
    }

    if report.permission_denied {
        println!();
        print_permission_help();
    }
    println!("{}", report);
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let loaded = load_config(cli.config.as_deref());
    let configured_level = loaded
        .as_ref()
        .ok()
        .map(|(_, config)| config.behavior.log_level.as_str());
    init_logging(cli.verbose, configured_level);

    if let Ok((path, config)) = &loaded {
        tracing::debug!("Loaded config from {}", path.display());
        for w in config.validate() {
            warn!("Config: {} - {}", w.field, w.message);
        }
    }

    let backend = open_backend(cli.fixture.as_deref())?;
    tracing::debug!("Using {} backend", backend.name());
    let caps = Capabilities::from_backend(backend.as_ref());

    match cli.command {
        Commands::ListScreens { enhanced } => {
            let service = DisplayService::new(&caps);
            let displays = if enhanced {
                service.canonical()
            } else {
                service.basic()
            };
            if cli.json {
                print_json(&displays)?;
            } else if enhanced {
                print_enhanced_screens(&displays);
            } else {
                print_basic_screens(&displays);
            }
        }
        Commands::ListApps => {
            let mut apps = caps.processes.running_apps().unwrap_or_else(|e| {
                warn!("Failed to enumerate running applications: {}", e);
                Vec::new()
            });
            apps.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
            if cli.json {
                print_json(&apps)?;
            } else {
                println!("Running applications ({}):", apps.len());
                for app in &apps {
                    println!(
                        "  {:<32} {:<40} PID {}",
                        app.name,
                        app.bundle_id.as_deref().unwrap_or("-"),
                        app.pid
                    );
                }
            }
        }
        Commands::Detect => {
            let (_, config) = loaded?;
            let detected = Positioner::new(&config, caps).detect_profile();
            match detected {
                Some(name) => println!("Detected profile: {}", name),
                None => println!("No matching profile found for current monitor configuration"),
            }
        }
        Commands::Position { profile } => {
            let (_, config) = loaded?;
            let report = Positioner::new(&config, caps).position(profile.as_deref());
            if cli.json {
                print_json(&report)?;
            } else {
                print_report(&report);
            }
        }
        Commands::GenerateConfig { profile } => {
            let monitors = suggest_monitors(&DisplayService::new(&caps).basic());
            println!("Add this under 'profiles:' in your configuration:");
            println!();
            print!("{}", render_snippet(&profile, &monitors)?);
        }
        Commands::UpdateProfile { profile } => {
            let (path, mut config) = loaded?;
            if config.profiles.get(&profile).is_none() {
                println!("Profile '{}' not found in config.", profile);
                if !confirm(&format!("Create new profile '{}'?", profile))? {
                    return Ok(());
                }
            }

            let monitors = suggest_monitors(&DisplayService::new(&caps).basic());
            print!("{}", render_snippet(&profile, &monitors)?);
            if confirm(&format!("Update '{}' profile with this configuration?", profile))? {
                update_profile(&mut config, &path, &profile, monitors)?;
                println!("Profile '{}' updated. Config saved to {}", profile, path.display());
            } else {
                println!("Profile not updated.");
            }
        }
        Commands::QuickUpdate { profile } => {
            let (path, mut config) = loaded?;
            let monitors = suggest_monitors(&DisplayService::new(&caps).basic());
            update_profile(&mut config, &path, &profile, monitors)?;
            println!(
                "Profile '{}' updated with current screen setup. Config saved to {}",
                profile,
                path.display()
            );
        }
        Commands::CheckPermissions => {
            if caps.windows.is_trusted() {
                println!("Accessibility permission granted.");
            } else {
                print_permission_help();
            }
        }
    }

    Ok(())
}
