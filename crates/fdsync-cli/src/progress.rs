use std::{
    collections::HashMap,
    sync::{mpsc::Receiver, LazyLock},
    time::Duration,
};

use fdsync_events::{SyncEvent, SyncStage};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use nu_ansi_term::Color::{Cyan, Green, Red};

use crate::utils::{progress_enabled, Colored};

/// Shared MultiProgress instance so log output can suspend the bars.
static MULTI: LazyLock<MultiProgress> = LazyLock::new(MultiProgress::new);

/// Pause progress display, run the closure, then resume.
pub fn suspend<F: FnOnce()>(f: F) {
    MULTI.suspend(f);
}

/// Stop and clear all progress bars.
pub fn stop() {
    MULTI.clear().ok();
}

/// Owns the thread started by [`spawn_event_handler`].
///
/// Every sender of the event channel must be dropped before
/// [`finish`](ProgressGuard::finish) is called, or it blocks forever.
pub struct ProgressGuard {
    handle: Option<std::thread::JoinHandle<()>>,
}

impl ProgressGuard {
    pub fn finish(mut self) {
        if let Some(handle) = self.handle.take() {
            handle.join().ok();
        }
    }
}

fn template(template: &str) -> ProgressStyle {
    ProgressStyle::with_template(template).unwrap_or_else(|_| ProgressStyle::default_bar())
}

fn bytes_style() -> ProgressStyle {
    template(
        "{spinner:.cyan} {prefix}  {msg:11} {wide_bar:.cyan/dim}  {bytes}/{total_bytes}  {bytes_per_sec}",
    )
    .progress_chars("━━─")
}

fn count_style() -> ProgressStyle {
    template("{spinner:.cyan} {prefix}  {msg:11} {wide_bar:.cyan/dim}  {pos}/{len}")
        .progress_chars("━━─")
}

fn spinner_style() -> ProgressStyle {
    template("{spinner:.cyan} {prefix}  {msg}")
}

fn new_job(repo_name: &str) -> ProgressBar {
    let pb = if progress_enabled() {
        MULTI.add(ProgressBar::new_spinner())
    } else {
        MULTI.add(ProgressBar::hidden())
    };
    pb.set_style(spinner_style());
    pb.set_prefix(Colored(Cyan, repo_name).to_string());
    pb.set_message("starting");
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Per-repository bar state. The style only changes when the stage does.
struct SyncJob {
    bar: ProgressBar,
    stage: Option<SyncStage>,
}

impl SyncJob {
    fn update(&mut self, stage: SyncStage, current: u64, total: Option<u64>) {
        if self.stage != Some(stage) {
            self.stage = Some(stage);
            let style = match (stage, total) {
                (SyncStage::Download | SyncStage::Process, Some(_)) => bytes_style(),
                (SyncStage::Merge, Some(_)) => count_style(),
                _ => spinner_style(),
            };
            self.bar.set_style(style);
            self.bar.set_message(stage.to_string());
            self.bar.reset();
        }
        if let Some(total) = total {
            self.bar.set_length(total);
        }
        self.bar.set_position(current);
    }
}

/// Draws one bar per repository from the [`SyncEvent`]s of a sync run.
pub fn spawn_event_handler(receiver: Receiver<SyncEvent>) -> ProgressGuard {
    let handle = std::thread::spawn(move || {
        let mut jobs: HashMap<i64, SyncJob> = HashMap::new();

        while let Ok(event) = receiver.recv() {
            match event {
                SyncEvent::SyncStarted {
                    repo_id,
                    repo_name,
                } => {
                    jobs.insert(
                        repo_id,
                        SyncJob {
                            bar: new_job(&repo_name),
                            stage: None,
                        },
                    );
                }
                SyncEvent::SyncProgress {
                    repo_id,
                    repo_name,
                    stage,
                    current,
                    total,
                } => {
                    jobs.entry(repo_id)
                        .or_insert_with(|| {
                            SyncJob {
                                bar: new_job(&repo_name),
                                stage: None,
                            }
                        })
                        .update(stage, current, total);
                }
                SyncEvent::SyncFinished {
                    repo_id,
                    repo_name,
                    changed,
                } => {
                    if let Some(job) = jobs.remove(&repo_id) {
                        job.bar.finish_and_clear();
                    }
                    let status = if changed { "synced" } else { "up to date" };
                    MULTI.suspend(|| {
                        eprintln!(
                            " {} {}: {}",
                            Colored(Green, "✓"),
                            Colored(Cyan, &repo_name),
                            status
                        );
                    });
                }
                SyncEvent::SyncFailed {
                    repo_id,
                    repo_name,
                    error,
                } => {
                    if let Some(job) = jobs.remove(&repo_id) {
                        job.bar.finish_and_clear();
                    }
                    MULTI.suspend(|| {
                        eprintln!(
                            " {} {}: {}",
                            Colored(Red, "✗"),
                            Colored(Cyan, &repo_name),
                            Colored(Red, &error)
                        );
                    });
                }
                SyncEvent::Log {
                    ..
                } => {}
            }
        }

        for (_, job) in jobs {
            job.bar.finish_and_clear();
        }
    });

    ProgressGuard {
        handle: Some(handle),
    }
}
