//! Diskplan - partition reconciliation and planning
//!
//! Reads captured `parted -j -l` and `lsblk -f -J` output, compares it with a
//! desired layout and prints what would have to be done. Never touches a disk.

use anyhow::Result;
use clap::{Parser, Subcommand};
use diskplan::config::LayoutConfig;
use diskplan::disk::detection::{parse_structural_feed, read_feed, FilesystemFeed};
use diskplan::disk::layouts::print_layout_summary;
use diskplan::disk::model::DeviceModel;
use diskplan::disk::usage::{ConfiguredUsage, PromptedUsage, UsageSource};
use diskplan::utils::error::DiskplanError;
use diskplan::Planner;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "diskplan")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Plan partitioning for every discovered disk
    Plan {
        /// Layout configuration file
        #[arg(short, long, env = "DISKPLAN_LAYOUT")]
        layout: String,

        /// Output of `parted -j -l` ("-" for stdin)
        #[arg(long)]
        parted: String,

        /// Output of `lsblk -f -J` ("-" for stdin)
        #[arg(long)]
        lsblk: String,

        /// Ask about each disk instead of using the layout's [[disks]]
        #[arg(short, long)]
        interactive: bool,

        /// Print the plan as JSON
        #[arg(long)]
        json: bool,

        /// Directory the mount steps are rooted at
        #[arg(long, default_value = "/mnt")]
        target_root: String,
    },

    /// Show the merged disk model
    Inspect {
        /// Output of `parted -j -l` ("-" for stdin)
        #[arg(long)]
        parted: String,

        /// Output of `lsblk -f -J` ("-" for stdin)
        #[arg(long)]
        lsblk: Option<String>,

        /// Only show this disk (e.g., /dev/sda)
        #[arg(short, long)]
        disk: Option<String>,

        /// Print the model as JSON
        #[arg(long)]
        json: bool,
    },

    /// Validate a layout configuration file
    Validate {
        /// Path to configuration file
        config: String,
    },

    /// Generate a sample layout configuration file
    GenerateConfig {
        /// Output path for configuration file
        #[arg(short, long, default_value = "diskplan.toml")]
        output: String,
    },
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Plan {
            layout,
            parted,
            lsblk,
            interactive,
            json,
            target_root,
        } => {
            cmd_plan(&layout, &parted, &lsblk, interactive, json, &target_root)?;
        }
        Commands::Inspect {
            parted,
            lsblk,
            disk,
            json,
        } => {
            cmd_inspect(&parted, lsblk.as_deref(), disk.as_deref(), json)?;
        }
        Commands::Validate { config } => {
            cmd_validate(&config)?;
        }
        Commands::GenerateConfig { output } => {
            cmd_generate_config(&output)?;
        }
    }

    Ok(())
}

/// Read both feeds. Without an lsblk capture no partition has a label.
fn load_feeds(
    parted: &str,
    lsblk: Option<&str>,
) -> Result<(Vec<diskplan::disk::detection::StructuralDisk>, FilesystemFeed)> {
    if parted == "-" && lsblk == Some("-") {
        return Err(DiskplanError::ConfigError(
            "only one feed can be read from stdin".to_string(),
        )
        .into());
    }

    let structural = parse_structural_feed(&read_feed(parted)?)?;
    let filesystem = match lsblk {
        Some(path) => FilesystemFeed::from_json(&read_feed(path)?),
        None => FilesystemFeed::new(Vec::new()),
    };

    Ok((structural, filesystem))
}

fn cmd_plan(
    layout: &str,
    parted: &str,
    lsblk: &str,
    interactive: bool,
    json: bool,
    target_root: &str,
) -> Result<()> {
    info!("Loading layout from {}", layout);
    let config = LayoutConfig::from_file(layout)?;
    let planner = Planner::new(config.registry()?);

    let (structural, filesystem) = load_feeds(parted, Some(lsblk))?;

    let mut usage: Box<dyn UsageSource> = if interactive {
        print_layout_summary(planner.registry());
        Box::new(PromptedUsage)
    } else {
        Box::new(ConfiguredUsage::new(config.disks))
    };

    let report = planner.run(&structural, &filesystem, usage.as_mut())?;

    if json {
        println!("{}", report.to_json()?);
    } else {
        report.print(target_root);
    }

    Ok(())
}

fn cmd_inspect(parted: &str, lsblk: Option<&str>, only: Option<&str>, json: bool) -> Result<()> {
    let (structural, filesystem) = load_feeds(parted, lsblk)?;
    let (model, warnings) = DeviceModel::build(&structural, &filesystem);

    let disks: Vec<_> = match only {
        Some(path) => vec![model
            .disk(path)
            .ok_or_else(|| DiskplanError::DeviceNotFound(path.to_string()))?],
        None => model.disks.iter().collect(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&disks)?);
        return Ok(());
    }

    if disks.is_empty() {
        println!("No disks found.");
        return Ok(());
    }

    for disk in disks {
        println!(
            "\n{} {} {} {} table={}",
            disk.path,
            disk.size_human(),
            disk.model.as_deref().unwrap_or("-"),
            disk.device_type,
            disk.table.as_deref().unwrap_or("none")
        );
        if disk.partitions.is_empty() {
            continue;
        }
        println!(
            "  {:<18} {:>10} {:<12} {:<10} {:<12} {}",
            "PARTITION", "SIZE", "TYPE", "FSTYPE", "LABEL", "MOUNTED"
        );
        println!("  {}", "-".repeat(76));
        for part in &disk.partitions {
            let fs = part.filesystem.as_ref();
            println!(
                "  {:<18} {:>10} {:<12} {:<10} {:<12} {}",
                part.path,
                part.size_bytes
                    .map(diskplan::utils::units::size_human)
                    .unwrap_or_else(|| "-".to_string()),
                part.table_type.as_deref().unwrap_or("-"),
                fs.and_then(|f| f.fstype.as_deref()).unwrap_or("-"),
                part.fs_label().unwrap_or("-"),
                fs.map(|f| f.mount_points.join(","))
                    .filter(|m| !m.is_empty())
                    .unwrap_or_else(|| "-".to_string())
            );
        }
    }

    if !warnings.is_empty() {
        println!("\nWarnings:");
        for warning in &warnings {
            println!("  ! {}", warning);
        }
    }

    Ok(())
}

fn cmd_validate(config_path: &str) -> Result<()> {
    let config = LayoutConfig::from_file(config_path)?;
    config.validate()?;
    println!("✓ Layout is valid");
    Ok(())
}

fn cmd_generate_config(output: &str) -> Result<()> {
    let sample = LayoutConfig::sample();
    let content = toml::to_string_pretty(&sample)?;
    std::fs::write(output, content)?;
    println!("✓ Sample layout written to {}", output);
    Ok(())
}
