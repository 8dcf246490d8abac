//! Terminal rendering of batch progress — a bar plus colored per-job lines.
//!
//! Uses `indicatif` for the progress bar and `console` for styling.
//! [`BatchProgress`] is a passive consumer of orchestrator events; it holds
//! no generation state of its own.

use console::Style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::batch::{BatchEvent, BatchState, GenerationJob, JobState};

/// Visual progress for one orchestration run.
pub struct BatchProgress {
    pb: ProgressBar,
    green: Style,
    red: Style,
    yellow: Style,
}

impl BatchProgress {
    /// Start the bar sized to the total job count (pages plus cover).
    pub fn start(total_jobs: u64, title: &str) -> Self {
        let pb = ProgressBar::new(total_jobs);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{bar:30.cyan/blue} {pos}/{len} {msg}")
                .expect("invalid template")
                .progress_chars("█▓░"),
        );
        pb.set_message(format!("generating \"{title}\""));

        Self {
            pb,
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
            yellow: Style::new().yellow(),
        }
    }

    /// Render one orchestrator event against the current job snapshot.
    pub fn handle(&self, event: &BatchEvent, jobs: &[GenerationJob]) {
        match event {
            BatchEvent::RoundStarted { index } => {
                self.pb.set_message(format!("round {}", index + 1));
            }
            BatchEvent::JobDispatched { id } => {
                if let Some(job) = jobs.iter().find(|j| j.id == *id) {
                    self.pb.set_message(format!("drawing {}", job.title));
                }
            }
            BatchEvent::JobSettled { id } => {
                self.pb.inc(1);
                if let Some(job) = jobs.iter().find(|j| j.id == *id) {
                    match job.state {
                        JobState::Completed => {
                            self.pb
                                .println(format!("  {} {}", self.green.apply_to("✓"), job.title));
                        }
                        JobState::Failed => {
                            self.pb
                                .println(format!("  {} {}", self.red.apply_to("✗"), job.title));
                        }
                        _ => {}
                    }
                }
            }
            BatchEvent::RoundSettled { .. } => {}
            BatchEvent::BatchComplete => {
                self.pb
                    .println(format!("  {} all jobs settled", self.green.apply_to("✓")));
            }
        }
    }

    /// Clear the bar and print the final tally.
    pub fn finish(&self, batch: &BatchState) {
        self.pb.finish_and_clear();
        let completed = batch.count_in(JobState::Completed);
        let failed = batch.count_in(JobState::Failed);
        let open = batch.jobs.len() - completed - failed;
        println!(
            "  {} completed, {} failed, {} open",
            self.green.apply_to(completed),
            self.red.apply_to(failed),
            self.yellow.apply_to(open)
        );
    }
}
