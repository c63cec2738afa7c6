//! Progress parsing for rclone stats output.
//!
//! With `--stats` enabled, rclone periodically writes a stats block to its
//! log file:
//!
//! ```text
//! Transferred:       15.031 MiB / 233.367 MiB, 6%, 817.606 KiB/s, ETA 4m33s
//! Transferred:            0 / 1, 0%
//! Elapsed time:        18.5s
//! Transferring:
//!  *                                  movie.mp4:  6% /233.367Mi, 817.618Ki/s, 4m33s
//! ```
//!
//! Parsing is a fold over the lines of a chunk. Every line is classified
//! into a [`LogLine`] and applied to the accumulated state; lines that are
//! not recognised are skipped, so extra log chatter is harmless. A line cut
//! in half at a read boundary simply fails to match.

use regex::Regex;
use std::sync::LazyLock;

/// Overall bytes line, e.g. `Transferred: 15.031 MiB / 233.367 MiB, 6%, 817.606 KiB/s, ETA 4m33s`
static TRANSFERRED_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"Transferred:\s+([\d.]+\s+\w+)\s+/\s+([\d.]+\s+\w+),\s+(\d+)%,\s+([\d.]+\s+\w+/s),\s+ETA\s+(.+)",
    )
    .expect("valid transferred pattern")
});

/// File count line, e.g. `Transferred: 0 / 1, 0%`
static FILES_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Transferred:\s+(\d+)\s+/\s+(\d+),\s+\d+%")
        .expect("valid files pattern")
});

/// Per-file line, e.g. ` * movie.mp4:  6% /233.367Mi, 817.618Ki/s, 4m33s`
static TRANSFERRING_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\*\s+(.+?):\s+(\d+)%\s+/([\d.]+\w+),\s+([\d.]+\s*\w+/s),\s+(.+)",
    )
    .expect("valid transferring pattern")
});

/// Section header preceding the per-file lines
const TRANSFERRING_HEADER: &str = "Transferring:";

/// Progress of one file currently in flight
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileProgress {
    /// File name as printed by rclone
    pub filename: String,
    /// Completion percentage (0-100)
    pub percentage: u8,
    /// Size string, e.g. `233.367Mi`
    pub size: String,
    /// Speed string, e.g. `817.618Ki/s`
    pub speed: String,
    /// ETA string, e.g. `4m33s`
    pub eta: String,
}

impl FileProgress {
    /// Human-readable one-line summary
    #[must_use]
    pub fn summary(&self) -> String {
        let mut parts = Vec::new();
        if self.percentage > 0 {
            parts.push(format!("{}%", self.percentage));
        }
        if !self.size.is_empty() {
            parts.push(format!("Size: {}", self.size));
        }
        if !self.speed.is_empty() {
            parts.push(format!("Speed: {}", self.speed));
        }
        if !self.eta.is_empty() {
            parts.push(format!("ETA: {}", self.eta));
        }
        parts.join(" | ")
    }
}

/// Latest known state of one in-flight rclone process
///
/// The percentage reflects the current item only; it starts over for
/// every item of a request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgressSnapshot {
    /// Bytes transferred so far, e.g. `15.031 MiB`
    pub transferred: String,
    /// Total bytes, e.g. `233.367 MiB`
    pub total: String,
    /// Overall completion percentage (0-100)
    pub overall_percentage: u8,
    /// Overall speed, e.g. `817.606 KiB/s`
    pub overall_speed: String,
    /// Overall ETA, e.g. `4m33s`
    pub overall_eta: String,
    /// Files completed
    pub files_transferred: u64,
    /// Files in this transfer
    pub total_files: u64,
    /// Files currently transferring, unique by file name
    pub transferring_files: Vec<FileProgress>,
}

impl ProgressSnapshot {
    /// Human-readable overall summary
    #[must_use]
    pub fn summary(&self) -> String {
        let mut parts = Vec::new();
        if !self.transferred.is_empty() && !self.total.is_empty() {
            parts.push(format!("{} / {}", self.transferred, self.total));
        }
        if !self.overall_speed.is_empty() {
            parts.push(format!("Speed: {}", self.overall_speed));
        }
        if !self.overall_eta.is_empty() {
            parts.push(format!("ETA: {}", self.overall_eta));
        }
        parts.join(" | ")
    }

    /// Progress of one file by name
    #[must_use]
    pub fn file(&self, filename: &str) -> Option<&FileProgress> {
        self.transferring_files
            .iter()
            .find(|f| f.filename == filename)
    }
}

/// Classification of a single log line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogLine {
    /// Overall bytes/percentage/speed/ETA
    Overall {
        /// Bytes transferred
        transferred: String,
        /// Total bytes
        total: String,
        /// Overall percentage
        percentage: u8,
        /// Overall speed
        speed: String,
        /// Overall ETA
        eta: String,
    },
    /// Files completed out of total
    FileCount {
        /// Files completed
        transferred: u64,
        /// Total files
        total: u64,
    },
    /// `Transferring:` section header
    SectionStart,
    /// One file in flight
    File(FileProgress),
    /// Anything else
    Unrecognized,
}

impl LogLine {
    /// Classify one line of log text
    #[must_use]
    pub fn classify(line: &str) -> Self {
        let line = line.trim();

        if let Some(caps) = TRANSFERRED_PATTERN.captures(line) {
            return LogLine::Overall {
                transferred: caps[1].to_string(),
                total: caps[2].to_string(),
                percentage: parse_percentage(&caps[3]),
                speed: caps[4].to_string(),
                eta: caps[5].trim().to_string(),
            };
        }

        if let Some(caps) = FILES_PATTERN.captures(line) {
            // Counts that overflow are treated as noise
            if let (Ok(transferred), Ok(total)) = (caps[1].parse(), caps[2].parse()) {
                return LogLine::FileCount { transferred, total };
            }
            return LogLine::Unrecognized;
        }

        if line.contains(TRANSFERRING_HEADER) {
            return LogLine::SectionStart;
        }

        if let Some(caps) = TRANSFERRING_PATTERN.captures(line) {
            return LogLine::File(FileProgress {
                filename: caps[1].trim().to_string(),
                percentage: parse_percentage(&caps[2]),
                size: caps[3].to_string(),
                speed: caps[4].to_string(),
                eta: caps[5].trim().to_string(),
            });
        }

        LogLine::Unrecognized
    }
}

fn parse_percentage(digits: &str) -> u8 {
    digits.parse::<u32>().map_or(0, |p| p.min(100) as u8)
}

/// Accumulator for one parse pass
#[derive(Debug)]
struct ParsePass {
    snapshot: ProgressSnapshot,
    /// Per-file list rebuilt in this pass; `None` keeps the prior list
    files: Option<Vec<FileProgress>>,
    matched: bool,
}

impl ParsePass {
    fn new(prior: ProgressSnapshot) -> Self {
        Self {
            snapshot: prior,
            files: None,
            matched: false,
        }
    }

    fn apply(mut self, line: LogLine) -> Self {
        match line {
            LogLine::Overall {
                transferred,
                total,
                percentage,
                speed,
                eta,
            } => {
                self.snapshot.transferred = transferred;
                self.snapshot.total = total;
                self.snapshot.overall_percentage = percentage;
                self.snapshot.overall_speed = speed;
                self.snapshot.overall_eta = eta;
            }
            LogLine::FileCount { transferred, total } => {
                self.snapshot.files_transferred = transferred;
                self.snapshot.total_files = total;
            }
            LogLine::SectionStart => {
                self.files = Some(Vec::new());
            }
            LogLine::File(progress) => {
                let files = self.files.get_or_insert_with(Vec::new);
                match files.iter_mut().find(|f| f.filename == progress.filename) {
                    Some(existing) => *existing = progress,
                    None => files.push(progress),
                }
            }
            LogLine::Unrecognized => return self,
        }
        self.matched = true;
        self
    }

    fn finish(mut self) -> Option<ProgressSnapshot> {
        if !self.matched {
            return None;
        }
        if let Some(files) = self.files {
            self.snapshot.transferring_files = files;
        }
        Some(self.snapshot)
    }
}

/// Parse a chunk of log text into a fresh snapshot
///
/// Returns `None` when no line of the chunk was recognised.
///
/// # Example
///
/// ```
/// use ferry_core::progress::parse_log_content;
///
/// let snapshot = parse_log_content(
///     "Transferred:   15.031 MiB / 233.367 MiB, 6%, 817.606 KiB/s, ETA 4m33s\n",
/// )
/// .unwrap();
/// assert_eq!(snapshot.overall_percentage, 6);
/// assert_eq!(snapshot.overall_eta, "4m33s");
/// ```
#[must_use]
pub fn parse_log_content(content: &str) -> Option<ProgressSnapshot> {
    merge_log_content(ProgressSnapshot::default(), content)
}

/// Parse a chunk of log text on top of a prior snapshot
///
/// Fields the chunk does not mention keep their prior values. The per-file
/// list is replaced when the chunk contains a `Transferring:` header or
/// per-file lines; a header resets the list, and a repeated file name
/// replaces its earlier entry in place. Returns `None` when nothing in the
/// chunk was recognised, leaving the caller's snapshot untouched.
#[must_use]
pub fn merge_log_content(prior: ProgressSnapshot, content: &str) -> Option<ProgressSnapshot> {
    content
        .lines()
        .map(LogLine::classify)
        .fold(ParsePass::new(prior), ParsePass::apply)
        .finish()
}
