//! Progress output for the `assess_claim` CLI.

use clap::ValueEnum;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::{Duration, Instant};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum UiMode {
    #[default]
    Auto,
    Plain,
    Pretty,
    /// No progress output at all (e.g. `--json`).
    Quiet,
}

#[derive(Clone, Debug)]
pub struct Ui {
    mode: UiMode,
    is_tty: bool,
}

impl Ui {
    pub fn new(mode: UiMode, is_tty: bool) -> Self {
        Self { mode, is_tty }
    }

    fn use_spinner(&self) -> bool {
        self.is_tty && matches!(self.mode, UiMode::Auto | UiMode::Pretty)
    }

    /// Start a named stage; it reports its duration when dropped.
    pub fn stage(&self, name: &str) -> StageGuard {
        if self.mode == UiMode::Quiet {
            return StageGuard::new(name.to_string(), Output::Silent);
        }
        if self.use_spinner() {
            let spinner = ProgressBar::new_spinner();
            spinner.set_draw_target(ProgressDrawTarget::stderr());
            spinner.enable_steady_tick(Duration::from_millis(120));
            let style = ProgressStyle::with_template("{spinner} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner());
            spinner.set_style(style);
            spinner.set_message(format!("{name}…"));
            StageGuard::new(name.to_string(), Output::Spinner(spinner))
        } else {
            eprintln!("==> {}", name);
            StageGuard::new(name.to_string(), Output::Plain)
        }
    }
}

enum Output {
    Silent,
    Plain,
    Spinner(ProgressBar),
}

pub struct StageGuard {
    name: String,
    start: Instant,
    output: Output,
    failed: bool,
}

impl StageGuard {
    fn new(name: String, output: Output) -> Self {
        Self {
            name,
            start: Instant::now(),
            output,
            failed: false,
        }
    }

    /// Mark the stage as failed so it is not reported as done.
    pub fn fail(mut self) {
        self.failed = true;
    }
}

impl Drop for StageGuard {
    fn drop(&mut self) {
        let mark = if self.failed { "✘" } else { "✔" };
        let message = format!(
            "{} {} ({})",
            mark,
            self.name,
            format_duration(self.start.elapsed())
        );
        match &self.output {
            Output::Silent => {}
            Output::Plain => eprintln!("{message}"),
            Output::Spinner(spinner) => spinner.finish_with_message(message),
        }
    }
}

fn format_duration(duration: Duration) -> String {
    if duration.as_secs() >= 1 {
        format!("{:.2}s", duration.as_secs_f64())
    } else {
        format!("{}ms", duration.as_millis())
    }
}
