//! Transfer progress display with progress bars.

use ferry_core::{ProgressEvent, ProgressSnapshot, TransferItem};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::time::Duration;

/// Live view of a running request
///
/// One bar tracks the current item; below it, one bar per file rclone
/// reports as in flight.
pub struct TransferProgress {
    multi: MultiProgress,
    overall: ProgressBar,
    files: HashMap<String, ProgressBar>,
    names: Vec<String>,
    current: Option<usize>,
}

const OVERALL_TEMPLATE: &str =
    "{msg}\n{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos:>3}%";

const FILE_TEMPLATE: &str = "  {prefix:30!} [{bar:25.green/white}] {msg}";

fn overall_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template(OVERALL_TEMPLATE)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-")
}

fn file_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template(FILE_TEMPLATE)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ")
}

impl TransferProgress {
    /// Create a view for `items`
    #[must_use]
    pub fn new(items: &[TransferItem]) -> Self {
        let multi = MultiProgress::new();
        let overall = multi.add(ProgressBar::new(100));
        overall.set_style(overall_style());
        overall.enable_steady_tick(Duration::from_millis(120));

        let names: Vec<String> = items.iter().map(|i| i.name.clone()).collect();
        if let Some(first) = names.first() {
            overall.set_message(item_label(0, names.len(), first, ""));
        }

        Self {
            multi,
            overall,
            files: HashMap::new(),
            names,
            current: None,
        }
    }

    /// Render one progress event
    pub fn update(&mut self, event: &ProgressEvent) {
        if self.current != Some(event.item_index) {
            self.clear_files();
            self.current = Some(event.item_index);
        }

        let snapshot = &event.snapshot;
        let name = self.names.get(event.item_index).map_or("", String::as_str);
        let summary = snapshot.summary();
        let label = item_label(event.item_index, self.names.len(), name, &summary);
        self.overall.set_message(label);
        self.overall.set_position(u64::from(snapshot.overall_percentage));

        self.sync_files(snapshot);
    }

    fn sync_files(&mut self, snapshot: &ProgressSnapshot) {
        self.files.retain(|name, bar| {
            let active = snapshot.file(name).is_some();
            if !active {
                bar.finish_and_clear();
            }
            active
        });

        for file in &snapshot.transferring_files {
            let bar = self.files.entry(file.filename.clone()).or_insert_with(|| {
                let bar = self.multi.add(ProgressBar::new(100));
                bar.set_style(file_style());
                bar.set_prefix(file.filename.clone());
                bar
            });
            bar.set_position(u64::from(file.percentage));
            bar.set_message(file.summary());
        }
    }

    fn clear_files(&mut self) {
        for (_, bar) in self.files.drain() {
            bar.finish_and_clear();
        }
    }

    /// Finish with success message
    pub fn finish_with_message(mut self, msg: String) {
        self.clear_files();
        self.overall.finish_with_message(msg);
    }

    /// Abandon the progress bars, leaving `msg`
    pub fn abandon_with_message(mut self, msg: String) {
        self.clear_files();
        self.overall.abandon_with_message(msg);
    }
}

fn item_label(index: usize, total: usize, name: &str, summary: &str) -> String {
    if summary.is_empty() {
        format!("[{}/{total}] {name}", index + 1)
    } else {
        format!("[{}/{total}] {name}  {summary}", index + 1)
    }
}

/// Format duration in human-readable format
#[must_use]
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();

    if secs < 60 {
        format!("{secs}s")
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
    }
}
