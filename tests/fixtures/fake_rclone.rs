//! Fake rclone executable
//!
//! The script understands the invocations the engine makes and keys its
//! behavior on the source name:
//!
//! - names containing `fail` leave a partial file and exit with status 3
//!   (one-shot commands exit with status 1)
//! - names containing `slow` leave partial files, record their process id
//!   and block until killed
//! - anything else is copied (or moved) and exits 0
//!
//! Transfers append one stats block to the `--log-file`; slow and failing
//! transfers write it after their partial files exist.
//! Every invocation is recorded as `<verb> <arg> <arg>` in a calls file.

use ferry_core::{EngineConfig, RemotePath, TransferItem};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;

const SCRIPT: &str = r#"#!/bin/sh
calls='@CALLS@'
pids='@PIDS@'
log=''
verb=''
first=''
second=''

while [ $# -gt 0 ]; do
    case "$1" in
        --log-file) log="$2"; shift 2 ;;
        --stats|--log-level|--config) shift 2 ;;
        --*) shift ;;
        *)
            if [ -z "$verb" ]; then verb="$1"
            elif [ -z "$first" ]; then first="$1"
            else second="$1"
            fi
            shift ;;
    esac
done

echo "$verb $first $second" >> "$calls"
src="${first#local:}"
dst="${second#local:}"
name=$(basename "$src")

progress() {
    [ -n "$log" ] || return 0
    printf '%s\n' \
        "2025/01/01 00:00:00 INFO  : " \
        "Transferred:        5 MiB / 10 MiB, 50%, 1 MiB/s, ETA 5s" \
        "Transferred:            0 / 1, 0%" \
        "Transferring:" \
        " *  $name: 50% /10Mi, 1Mi/s, 5s" >> "$log"
}

case "$verb" in
    copy|move)
        mkdir -p "$dst"
        case "$name" in
            *fail*)
                touch "$dst/$name.ff01.partial"
                progress
                exit 3 ;;
            *slow*)
                echo $$ > "$pids/$name.pid"
                if [ -d "$src" ]; then
                    mkdir -p "$dst/nested"
                    touch "$dst/one.jpg.aa01.partial" "$dst/nested/two.jpg.bb02.partial"
                else
                    touch "$dst/$name.abc123.partial"
                fi
                progress
                exec sleep 30 ;;
        esac
        progress
        if [ -d "$src" ]; then cp -R "$src/." "$dst/"; else cp "$src" "$dst/"; fi
        if [ "$verb" = move ]; then rm -rf "$src"; fi
        exit 0 ;;
    delete|purge|mkdir)
        case "$name" in
            *fail*) echo "failed: $first" >&2; exit 1 ;;
        esac
        case "$verb" in
            delete) rm -f "$src" ;;
            purge) rm -rf "$src" ;;
            mkdir) mkdir -p "$src" ;;
        esac
        exit 0 ;;
    lsjson)
        [ -d "$src" ] || { echo "directory not found" >&2; exit 3; }
        printf '['
        sep=''
        for f in "$src"/*; do
            [ -e "$f" ] || continue
            n=$(basename "$f")
            if [ -d "$f" ]; then
                printf '%s{"Path":"%s","Name":"%s","Size":-1,"IsDir":true}' "$sep" "$n" "$n"
            else
                s=$(wc -c < "$f" | tr -d ' ')
                printf '%s{"Path":"%s","Name":"%s","Size":%s,"IsDir":false}' "$sep" "$n" "$n" "$s"
            fi
            sep=','
        done
        printf ']\n'
        exit 0 ;;
    size)
        [ -d "$src" ] || { echo "directory not found" >&2; exit 3; }
        count=$(find "$src" -type f | wc -l | tr -d ' ')
        bytes=$(find "$src" -type f -exec cat {} + | wc -c | tr -d ' ')
        printf '{"count":%s,"bytes":%s}\n' "$count" "$bytes"
        exit 0 ;;
esac

echo "unknown verb: $verb" >&2
exit 2
"#;

/// Temporary source/destination trees plus a fake rclone
pub struct FakeRclone {
    root: TempDir,
    script: PathBuf,
    calls: PathBuf,
    pids: PathBuf,
}

impl FakeRclone {
    /// Create the script and empty `src`, `dst` and `logs` directories
    pub fn new() -> std::io::Result<Self> {
        let root = TempDir::new()?;
        let script = root.path().join("fake-rclone.sh");
        let calls = root.path().join("calls.txt");
        let pids = root.path().join("pids");

        let text = SCRIPT
            .replace("@CALLS@", &calls.display().to_string())
            .replace("@PIDS@", &pids.display().to_string());
        std::fs::write(&script, text)?;
        std::fs::create_dir(&pids)?;
        std::fs::create_dir(root.path().join("src"))?;
        std::fs::create_dir(root.path().join("dst"))?;
        std::fs::create_dir(root.path().join("logs"))?;

        Ok(Self {
            root,
            script,
            calls,
            pids,
        })
    }

    /// Source tree
    pub fn src_dir(&self) -> PathBuf {
        self.root.path().join("src")
    }

    /// Destination tree
    pub fn dst_dir(&self) -> PathBuf {
        self.root.path().join("dst")
    }

    /// Directory receiving transfer logs
    pub fn logs_dir(&self) -> PathBuf {
        self.root.path().join("logs")
    }

    /// Engine configuration running the script with short intervals
    pub fn engine_config(&self) -> EngineConfig {
        let mut config = EngineConfig::default();
        // Run through sh so the freshly written script is never exec'd directly
        config.rclone.program = PathBuf::from("sh");
        config.rclone.extra_flags = self.script.display().to_string();
        config.transfer.logs_dir = self.logs_dir();
        config.transfer.poll_interval = Duration::from_millis(20);
        config.transfer.monitor_interval = Duration::from_millis(50);
        config.transfer.monitor_idle_limit = 100;
        config
    }

    /// `local:` address of a local path
    pub fn remote(path: &Path) -> RemotePath {
        RemotePath::new("local", path.display().to_string())
    }

    /// Destination directory as a remote path
    pub fn dst_remote(&self) -> RemotePath {
        Self::remote(&self.dst_dir())
    }

    /// Create a source file and an item copying it into `dst`
    pub fn source_file(&self, name: &str, contents: &str) -> std::io::Result<TransferItem> {
        let path = self.src_dir().join(name);
        std::fs::write(&path, contents)?;
        Ok(TransferItem::new(
            name,
            Self::remote(&path),
            self.dst_remote(),
            false,
            contents.len() as u64,
        ))
    }

    /// Create a source directory holding `files` and an item copying it into `dst`
    pub fn source_dir(&self, name: &str, files: &[&str]) -> std::io::Result<TransferItem> {
        let path = self.src_dir().join(name);
        std::fs::create_dir_all(&path)?;
        for file in files {
            std::fs::write(path.join(file), *file)?;
        }
        Ok(TransferItem::new(name, Self::remote(&path), self.dst_remote(), true, 0))
    }

    /// Invocations so far, one `<verb> <arg> <arg>` line each
    pub fn calls(&self) -> Vec<String> {
        std::fs::read_to_string(&self.calls)
            .unwrap_or_default()
            .lines()
            .map(|line| line.trim_end().to_string())
            .collect()
    }

    /// Process id of the blocking transfer of `name`, once it has started
    pub fn pid_of(&self, name: &str) -> Option<String> {
        let path = self.pids.join(format!("{name}.pid"));
        let pid = std::fs::read_to_string(path).ok()?;
        Some(pid.trim().to_string())
    }

    /// Verbs of the invocations so far
    pub fn verbs(&self) -> Vec<String> {
        self.calls()
            .iter()
            .filter_map(|line| line.split_whitespace().next().map(str::to_string))
            .collect()
    }
}
