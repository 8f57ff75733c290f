//! exlift CLI - list and extract files from exFAT disk images
//!
//! Accepts fixed VHD, dynamic VHD and raw exFAT images.

use clap::{Parser, Subcommand};
use exlift_core::{format_size, Result};
use exlift_exfat::ExfatVolume;
use exlift_image::{open_image, Container};
use std::path::{Path, PathBuf};
use std::process;

mod extract;

#[derive(Parser)]
#[command(name = "exlift")]
#[command(about = "Read-only exFAT file extraction from VHD and raw disk images")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show container and filesystem information
    Info {
        /// Path to the image file
        image: PathBuf,
    },
    /// List a directory inside the image
    List {
        /// Path to the image file
        image: PathBuf,
        /// Directory path inside the exFAT filesystem
        #[arg(default_value = "/")]
        path: String,
    },
    /// Extract files or directories to the host filesystem
    Extract {
        /// Path to the image file
        image: PathBuf,
        /// Paths inside the exFAT filesystem
        #[arg(required = true)]
        paths: Vec<String>,
        /// Destination folder for extracted files
        #[arg(short, long, default_value = "output")]
        output: PathBuf,
    },
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();
    let result = match cli.command {
        Command::Info { image } => cmd_info(&image),
        Command::List { image, path } => cmd_list(&image, &path),
        Command::Extract {
            image,
            paths,
            output,
        } => cmd_extract(&image, &paths, &output),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn mount(image: &Path) -> Result<(Container, ExfatVolume)> {
    let mut container = open_image(image)?;
    let volume = ExfatVolume::mount(&mut container)?;
    Ok((container, volume))
}

fn cmd_info(image: &Path) -> Result<()> {
    let mut container = open_image(image)?;

    println!("=== Container ===");
    println!("Path:      {}", image.display());
    println!("Type:      {}", container.identify());
    println!(
        "Size:      {} ({} bytes)",
        format_size(container.size()),
        container.size()
    );
    if let Some(footer) = container.footer() {
        println!(
            "Checksum:  {}",
            if footer.verify_checksum() {
                "ok"
            } else {
                "MISMATCH"
            }
        );
    }
    if let Some(bat) = container.bat() {
        let allocated = (0..bat.len()).filter(|&i| bat.block_offset(i).is_some()).count();
        println!(
            "Blocks:    {} of {} allocated, {} each",
            allocated,
            bat.len(),
            format_size(bat.block_size() as u64)
        );
    }

    let volume = ExfatVolume::mount(&mut container)?;
    let boot = volume.boot_sector();
    println!();
    println!("=== exFAT Volume ===");
    println!("Serial:            {:08X}", boot.volume_serial);
    println!("Bytes per sector:  {}", boot.bytes_per_sector());
    println!("Bytes per cluster: {}", volume.bytes_per_cluster());
    println!("Cluster count:     {}", volume.cluster_count());
    println!("Root cluster:      {}", volume.root_cluster());

    Ok(())
}

fn cmd_list(image: &Path, path: &str) -> Result<()> {
    let (mut container, volume) = mount(image)?;
    let entries = volume.list_dir(&mut container, path)?;

    println!("{:<17} {:<5} {:<10} {}", "Modify Time", "Type", "Size", "Name");
    for entry in entries {
        let mtime = entry
            .mtime
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".to_string());
        let kind = if entry.is_dir { "Dir" } else { "File" };
        let size = if entry.is_dir {
            "-".to_string()
        } else {
            format_size(entry.size)
        };
        println!("{:<17} {:<5} {:<10} {}", mtime, kind, size, entry.name);
    }

    Ok(())
}

fn cmd_extract(image: &Path, paths: &[String], output: &Path) -> Result<()> {
    let (mut container, volume) = mount(image)?;
    std::fs::create_dir_all(output)?;

    for path in paths {
        let path = path.trim();
        if path.is_empty() {
            continue;
        }
        match extract::extract_path(&mut container, &volume, path, output) {
            Ok(()) => println!("Extracted {} to {}", path, output.display()),
            Err(e) => eprintln!("Failed to extract {}: {}", path, e),
        }
    }

    Ok(())
}
