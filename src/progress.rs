use indicatif::{ProgressBar, ProgressStyle};
use log::warn;
use std::sync::Mutex;

/// Receives completed-unit counts while a run is in progress. Purely observational.
pub trait ProgressObserver: Send + Sync {
    fn on_start(&self, _total: u64) {}
    fn on_progress(&self, completed: u64, total: u64);
    fn on_finish(&self, _completed: u64) {}
    fn on_abandon(&self, _completed: u64) {}
}

pub struct NoProgress;

impl ProgressObserver for NoProgress {
    fn on_progress(&self, _completed: u64, _total: u64) {}
}

/// Adapts a closure taking `(completed, total)`.
pub struct FnObserver<F>(pub F);

impl<F> ProgressObserver for FnObserver<F>
where
    F: Fn(u64, u64) + Send + Sync,
{
    fn on_progress(&self, completed: u64, total: u64) {
        (self.0)(completed, total)
    }
}

/// Terminal progress bar, created per run.
pub struct ProgressBarObserver {
    bar: ProgressBar,
    unit: &'static str,
}

impl ProgressBarObserver {
    pub fn new(unit: &'static str) -> Self {
        Self { bar: ProgressBar::hidden(), unit }
    }
}

impl ProgressObserver for ProgressBarObserver {
    fn on_start(&self, total: u64) {
        let template = format!(
            "[{{elapsed_precise}}] [{{bar:40.cyan/blue}}] {{pos}}/{{len}} {} ({{percent}}%) [{{eta}}]",
            self.unit
        );
        match ProgressStyle::default_bar().template(&template) {
            Ok(style) => self.bar.set_style(style.progress_chars("#>-")),
            Err(e) => warn!("Invalid progress bar template: {}", e),
        }
        self.bar.set_length(total);
        self.bar.set_draw_target(indicatif::ProgressDrawTarget::stderr());
    }

    fn on_progress(&self, completed: u64, _total: u64) {
        self.bar.set_position(completed);
    }

    fn on_finish(&self, completed: u64) {
        self.bar.finish_with_message(format!("{} {} completed", completed, self.unit));
    }

    fn on_abandon(&self, completed: u64) {
        self.bar.abandon_with_message(format!("aborted after {} {}", completed, self.unit));
    }
}

/// Counts completed units for one run and forwards them to an observer.
///
/// Updates are serialised so observers see a strictly increasing count even
/// when units finish on different workers.
pub struct ProgressReporter<'a> {
    observer: &'a dyn ProgressObserver,
    total: u64,
    completed: Mutex<u64>,
}

impl<'a> ProgressReporter<'a> {
    pub fn start(observer: &'a dyn ProgressObserver, total: u64) -> Self {
        observer.on_start(total);
        Self { observer, total, completed: Mutex::new(0) }
    }

    pub fn tick(&self) {
        // a poisoned counter only loses progress output, never simulation state
        if let Ok(mut completed) = self.completed.lock() {
            *completed += 1;
            self.observer.on_progress(*completed, self.total);
        }
    }

    pub fn completed(&self) -> u64 {
        self.completed.lock().map(|c| *c).unwrap_or(0)
    }

    pub fn finish(self) {
        self.observer.on_finish(self.completed());
    }

    pub fn abandon(self) {
        self.observer.on_abandon(self.completed());
    }
}
