//! Command-line interface, built on clap.
//!
//! Two subcommands: `plan` runs only the structured planning call and prints
//! the result, `generate` runs the full pipeline through to an exported
//! bundle. Orchestration knobs are global flags that override the values
//! from `bookforge.toml`.

use clap::{Parser, Subcommand};

/// bookforge — coloring book generation orchestrator.
#[derive(Debug, Parser)]
#[command(name = "bookforge", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Page jobs dispatched concurrently within one round.
    #[arg(long, global = true)]
    pub concurrency: Option<usize>,

    /// Delay in milliseconds between dispatch rounds.
    #[arg(long, global = true)]
    pub pacing_ms: Option<u64>,

    /// Total attempt budget per remote call.
    #[arg(long, global = true)]
    pub max_attempts: Option<u32>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Plan a book without generating any images.
    Plan {
        /// Topic of the book, e.g. "Space Cats".
        topic: String,

        /// Number of interior pages to plan.
        #[arg(long)]
        pages: Option<usize>,

        /// Target age range, e.g. "4-8".
        #[arg(long)]
        age: Option<String>,
    },

    /// Plan the book and generate every illustration.
    Generate {
        /// Topic of the book, e.g. "Space Cats".
        topic: String,

        /// Number of interior pages to plan and generate.
        #[arg(long)]
        pages: Option<usize>,

        /// Target age range, e.g. "4-8".
        #[arg(long)]
        age: Option<String>,

        /// Skip the cover illustration.
        #[arg(long, default_value_t = false)]
        no_cover: bool,

        /// Output directory for the generated bundle.
        #[arg(long)]
        out: Option<String>,

        /// Page width used to pick the aspect ratio bucket.
        #[arg(long)]
        width: Option<f64>,

        /// Page height used to pick the aspect ratio bucket.
        #[arg(long)]
        height: Option<f64>,
    },
}
