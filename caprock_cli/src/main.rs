use caprock_core::profile::GUEST_NAME;
use caprock_core::*;
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "caprock")]
#[command(about = "Bar inventory, drink recipes and BAC tracking", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Override data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Read configuration from this file instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show containers, liquids, drinks and profiles (default)
    Status {
        /// Print machine-readable JSON
        #[arg(long)]
        json: bool,
    },

    /// Manage the liquid registry
    #[command(subcommand)]
    Liquid(LiquidCommand),

    /// Manage drink recipes
    #[command(subcommand)]
    Drink(DrinkCommand),

    /// Manage drinker profiles
    #[command(subcommand)]
    Profile(ProfileCommand),

    /// Pour a drink, drawing from the loaded containers
    Pour {
        drink: String,

        /// Drinker to record the drink for (Guest when omitted)
        #[arg(long)]
        profile: Option<String>,
    },

    /// Show a profile's current BAC
    Bac { name: String },
}

#[derive(Subcommand)]
enum LiquidCommand {
    /// Register a new liquid
    Add {
        name: String,
        /// Alcohol by volume as a fraction (0.4 = 40%)
        #[arg(long)]
        abv: f64,
        /// Density in g/mL
        #[arg(long)]
        density: f64,
    },
    /// Load a liquid into a container (FL, FR, BL, BR or NA)
    Assign {
        name: String,
        #[arg(long)]
        container: Container,
        /// Fill volume in oz
        #[arg(long)]
        volume: f64,
    },
    /// Empty a container
    Unassign { container: Container },
    /// Delete an unassigned liquid no drink uses
    Remove { name: String },
    /// Rename a liquid and every recipe that uses it
    Rename { name: String, new_name: String },
}

#[derive(Subcommand)]
enum DrinkCommand {
    /// Compose a drink from LIQUID=OZ parts
    Add {
        name: String,
        #[arg(long = "part", value_parser = parse_part, required = true)]
        parts: Vec<(String, f64)>,
    },
    /// Delete a drink no profile history refers to
    Remove { name: String },
}

#[derive(Subcommand)]
enum ProfileCommand {
    /// Register a drinker
    Add {
        name: String,
        #[arg(long)]
        sex: Sex,
        /// Body weight in lb
        #[arg(long)]
        weight: f64,
        #[arg(long)]
        experience: Experience,
    },
    /// Delete a drinker and their history
    Remove { name: String },
}

fn parse_part(raw: &str) -> std::result::Result<(String, f64), String> {
    let (liquid, volume) = raw
        .rsplit_once('=')
        .ok_or_else(|| format!("expected LIQUID=OZ, got '{}'", raw))?;
    let volume = volume
        .trim()
        .parse::<f64>()
        .map_err(|e| format!("bad volume in '{}': {}", raw, e))?;
    Ok((liquid.trim().to_string(), volume))
}

fn main() -> Result<()> {
    caprock_core::logging::init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    let data_dir = cli
        .data_dir
        .unwrap_or_else(|| config.data.data_dir.clone());
    let storage = Storage::new(data_dir);

    let mut bar = match storage.load(config.limits) {
        Ok(bar) => bar,
        Err(Error::StorageUnavailable(dir)) => {
            tracing::error!("Data directory {:?} not found, starting empty", dir);
            Bar::new(config.limits)
        }
        Err(e) => return Err(e),
    };

    match cli.command {
        Some(Commands::Status { json }) => cmd_status(&mut bar, json),
        None => cmd_status(&mut bar, false),
        Some(Commands::Liquid(command)) => {
            cmd_liquid(&mut bar, command)?;
            storage.save(&bar)
        }
        Some(Commands::Drink(command)) => {
            cmd_drink(&mut bar, command)?;
            storage.save(&bar)
        }
        Some(Commands::Profile(command)) => {
            cmd_profile(&mut bar, command)?;
            storage.save(&bar)
        }
        Some(Commands::Pour { drink, profile }) => {
            cmd_pour(&mut bar, &drink, profile.as_deref())?;
            storage.save(&bar)
        }
        Some(Commands::Bac { name }) => cmd_bac(&mut bar, &name),
    }
}

fn cmd_liquid(bar: &mut Bar, command: LiquidCommand) -> Result<()> {
    match command {
        LiquidCommand::Add { name, abv, density } => {
            bar.register_liquid(&name, abv, density)?;
            println!("✓ Added {}", name);
        }
        LiquidCommand::Assign {
            name,
            container,
            volume,
        } => {
            if let Some(previous) = bar.assign_container(&name, container, volume)? {
                println!("  {} moved out of {}", previous, container.display_name());
            }
            println!("✓ {} -> {} ({} oz)", name, container.display_name(), volume);
        }
        LiquidCommand::Unassign { container } => match bar.unassign(container) {
            Some(previous) => println!("✓ Emptied {} ({})", container.display_name(), previous),
            None => println!("{} is already empty", container.display_name()),
        },
        LiquidCommand::Remove { name } => {
            bar.remove_liquid(&name)?;
            println!("✓ Removed {}", name);
        }
        LiquidCommand::Rename { name, new_name } => {
            bar.rename_liquid(&name, &new_name)?;
            println!("✓ Renamed {} to {}", name, new_name);
        }
    }
    Ok(())
}

fn cmd_drink(bar: &mut Bar, command: DrinkCommand) -> Result<()> {
    match command {
        DrinkCommand::Add { name, parts } => {
            let pairs: Vec<(&str, f64)> = parts
                .iter()
                .map(|(liquid, volume)| (liquid.as_str(), *volume))
                .collect();
            bar.compose_drink(&name, &pairs)?;
            if let Some(drink) = bar.drinks().lookup_by_name(&name) {
                println!(
                    "✓ Added {} ({:.1}% ABV, {} oz)",
                    name,
                    drink.abv() * 100.0,
                    drink.total_volume()
                );
            }
        }
        DrinkCommand::Remove { name } => {
            bar.remove_drink(&name)?;
            println!("✓ Removed {}", name);
        }
    }
    Ok(())
}

fn cmd_profile(bar: &mut Bar, command: ProfileCommand) -> Result<()> {
    match command {
        ProfileCommand::Add {
            name,
            sex,
            weight,
            experience,
        } => {
            bar.register_profile(&name, sex, weight, experience)?;
            println!("✓ Added {} ({}, {} lb, {})", name, sex, weight, experience);
        }
        ProfileCommand::Remove { name } => {
            bar.remove_profile(&name)?;
            println!("✓ Removed {}", name);
        }
    }
    Ok(())
}

fn cmd_pour(bar: &mut Bar, drink: &str, profile: Option<&str>) -> Result<()> {
    let bac = bar.pour(drink, profile)?;
    println!("✓ Poured {}", drink);
    println!("  {} BAC: {:.4}", profile.unwrap_or(GUEST_NAME), bac);
    Ok(())
}

fn cmd_bac(bar: &mut Bar, name: &str) -> Result<()> {
    let target = if name.eq_ignore_ascii_case(GUEST_NAME) {
        None
    } else {
        Some(name)
    };
    let bac = bar.bac(target)?;
    println!("{} BAC: {:.4}", name, bac);
    Ok(())
}

#[derive(Serialize)]
struct ProfileStatus<'a> {
    #[serde(flatten)]
    profile: &'a Profile,
    bac: f64,
}

#[derive(Serialize)]
struct StatusReport<'a> {
    containers: BTreeMap<&'static str, Option<String>>,
    liquids: Vec<&'a Liquid>,
    drinks: Vec<&'a Drink>,
    profiles: Vec<ProfileStatus<'a>>,
}

fn cmd_status(bar: &mut Bar, json: bool) -> Result<()> {
    // BAC first: computing it prunes expired history
    let names: Vec<String> = bar.profiles().iter().map(|p| p.name().to_string()).collect();
    let mut bacs = Vec::with_capacity(names.len());
    for name in &names {
        bacs.push(bar.bac(Some(name.as_str()))?);
    }

    let report = StatusReport {
        containers: bar.occupancy(),
        liquids: bar.liquids().iter().collect(),
        drinks: bar.drinks().iter().collect(),
        profiles: bar
            .profiles()
            .iter()
            .zip(bacs)
            .map(|(profile, bac)| ProfileStatus { profile, bac })
            .collect(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    display_status(&report);
    Ok(())
}

fn display_status(report: &StatusReport) {
    println!("\n╭─────────────────────────────────────────╮");
    println!("│  CAPROCK");
    println!("╰─────────────────────────────────────────╯");

    println!("\n  Containers");
    for container in Container::SLOTS {
        let occupant = report
            .containers
            .get(container.code())
            .cloned()
            .flatten()
            .unwrap_or_else(|| "(empty)".to_string());
        println!("  {:<12} {}", container.display_name(), occupant);
    }

    println!("\n  Liquids");
    for liquid in &report.liquids {
        println!(
            "  → {} ({:.1}%, {} oz left in {})",
            liquid.name(),
            liquid.abv() * 100.0,
            liquid.volume_left(),
            liquid.container().code()
        );
    }

    println!("\n  Drinks");
    for drink in &report.drinks {
        let parts: Vec<String> = drink
            .parts()
            .iter()
            .map(|part| format!("{} {} oz", part.liquid, part.volume))
            .collect();
        println!(
            "  → {} ({:.1}%): {}",
            drink.name(),
            drink.abv() * 100.0,
            parts.join(", ")
        );
    }

    println!("\n  Profiles");
    for status in &report.profiles {
        println!(
            "  → {} ({}, {} lb, {}) BAC {:.4}",
            status.profile.name(),
            status.profile.sex(),
            status.profile.weight(),
            status.profile.experience(),
            status.bac
        );
    }
    println!();
}
