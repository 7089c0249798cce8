use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use log::info;
use std::time::{Duration, Instant};

// --------------------------------------------------
/// Phase timer for index construction. Every phase change is logged
/// with the time spent in the previous phase.
#[derive(Debug)]
pub struct SfxProgress {
    started: Instant,
    phase_started: Instant,
    phase: Option<String>,
    phases: Vec<(String, Duration)>,
    bar: Option<ProgressBar>,
    show_bar: bool,
}

impl SfxProgress {
    pub fn new(show_bar: bool) -> Self {
        let now = Instant::now();
        SfxProgress {
            started: now,
            phase_started: now,
            phase: None,
            phases: vec![],
            bar: None,
            show_bar,
        }
    }

    pub fn start(&mut self, description: &str) {
        let now = Instant::now();
        self.started = now;
        self.phase_started = now;
        self.phases.clear();
        self.phase = Some(description.to_string());
        info!("{description}");
    }

    /// Close the current phase and begin the next
    pub fn tick(&mut self, description: &str) {
        self.close_phase();
        self.phase = Some(description.to_string());
        info!("{description}");
    }

    /// Close the last phase and report the total time
    pub fn stop(&mut self) -> Duration {
        self.close_phase();
        self.finish_bar();
        let total = self.started.elapsed();
        info!("Overall time {total:?}");
        total
    }

    /// Finished phases with their durations
    pub fn phases(&self) -> &[(String, Duration)] {
        &self.phases
    }

    fn close_phase(&mut self) {
        if let Some(phase) = self.phase.take() {
            let elapsed = self.phase_started.elapsed();
            info!("Finished {phase} in {elapsed:?}");
            self.phases.push((phase, elapsed));
        }
        self.phase_started = Instant::now();
    }

    // --------------------------------------------------
    /// Show a bar over `len` units of work, if enabled
    pub fn start_bar(&mut self, len: u64, message: &str) -> Result<()> {
        self.finish_bar();
        if self.show_bar {
            let bar = ProgressBar::new(len);
            bar.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
                    .progress_chars("=> "),
            );
            bar.set_message(message.to_string());
            self.bar = Some(bar);
        }
        Ok(())
    }

    pub fn inc_bar(&self, delta: u64) {
        if let Some(bar) = &self.bar {
            bar.inc(delta);
        }
    }

    pub fn finish_bar(&mut self) {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }
    }
}
