mod batch;
mod cli;
mod config;
mod error;
mod export;
mod gemini;
mod retry;
mod ui;

use std::path::Path;

use clap::Parser;
use console::style;

use crate::batch::{BatchState, CancelToken, GenerationJob, Orchestrator, OrchestratorConfig};
use crate::cli::{Cli, Command};
use crate::config::BookforgeConfig;
use crate::error::BookforgeError;
use crate::gemini::{AspectRatio, BookPlan, GeminiClient};
use crate::ui::BatchProgress;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => Ok(()),
        Err(err) => {
            if err.is_quota() {
                eprintln!(
                    "{}",
                    style(
                        "Generation quota exhausted — wait a while and rerun; \
                         finished pages are kept."
                    )
                    .yellow()
                );
            }
            Err(err.into())
        }
    }
}

async fn run(cli: Cli) -> Result<(), BookforgeError> {
    let mut config = BookforgeConfig::load()?;
    if let Some(concurrency) = cli.concurrency {
        config.concurrency = concurrency;
    }
    if let Some(pacing) = cli.pacing_ms {
        config.pacing_delay_ms = pacing;
    }
    if let Some(max_attempts) = cli.max_attempts {
        config.max_attempts = max_attempts;
    }

    match cli.command {
        Command::Plan { topic, pages, age } => {
            let client = make_client(&config)?;
            let plan = client
                .plan(&topic, age.as_deref(), pages.unwrap_or(config.page_count))
                .await?;
            println!("{}", serde_json::to_string_pretty(&plan)?);
            Ok(())
        }
        Command::Generate {
            topic,
            pages,
            age,
            no_cover,
            out,
            width,
            height,
        } => {
            let client = make_client(&config)?;
            let plan = client
                .plan(&topic, age.as_deref(), pages.unwrap_or(config.page_count))
                .await?;
            let aspect = AspectRatio::closest(
                width.unwrap_or(config.page_width),
                height.unwrap_or(config.page_height),
            );

            let mut jobs: Vec<GenerationJob> = plan
                .pages
                .iter()
                .map(|page| GenerationJob::page(page.title.as_str(), line_art_prompt(&page.prompt)))
                .collect();
            if !no_cover {
                jobs.push(GenerationJob::cover(plan.title.as_str(), cover_prompt(&plan)));
            }
            let mut batch = BatchState::new(jobs, aspect);

            // Ctrl-C requests a cooperative stop at the next round boundary.
            let cancel = CancelToken::new();
            {
                let cancel = cancel.clone();
                tokio::spawn(async move {
                    if tokio::signal::ctrl_c().await.is_ok() {
                        cancel.cancel();
                    }
                });
            }

            let progress = BatchProgress::start(batch.jobs.len() as u64, &plan.title);
            let orchestrator = Orchestrator::new(OrchestratorConfig {
                concurrency: config.concurrency,
                pacing_delay_ms: config.pacing_delay_ms,
            });
            let outcome = orchestrator
                .run(&mut batch, &client, &cancel, |event, jobs| {
                    progress.handle(event, jobs)
                })
                .await;
            progress.finish(&batch);

            // Write the bundle even after a quota stop or cancellation, so
            // every finished page survives the early exit.
            let out_dir = out.unwrap_or_else(|| config.output_dir.clone());
            let summary = export::write_bundle(Path::new(&out_dir), &plan, &batch)?;
            println!(
                "  wrote {} files to {out_dir} ({} jobs without output)",
                summary.written, summary.skipped
            );
            outcome?;
            Ok(())
        }
    }
}

fn make_client(config: &BookforgeConfig) -> Result<GeminiClient, BookforgeError> {
    if config.api_key.is_empty() {
        return Err(BookforgeError::MissingApiKey);
    }
    Ok(GeminiClient::new(
        config.api_key.clone(),
        config.plan_model.clone(),
        config.image_model.clone(),
        config.retry_policy(),
    ))
}

// Visual styling lives in the prompt text; the orchestration layer below
// never looks at it.
fn line_art_prompt(scene: &str) -> String {
    format!(
        "{scene}. Black and white coloring book line art, clean bold outlines, \
         high contrast, no color, no shading, white background."
    )
}

fn cover_prompt(plan: &BookPlan) -> String {
    format!(
        "Book cover illustration for \"{}\": {}. Black and white line art, \
         bold outlines, no color.",
        plan.title, plan.description
    )
}
