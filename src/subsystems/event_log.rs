//! Event log monitor.
//!
//! Watches the event log file and turns every appended line into an event
//! record on the Redfish event service. Lines look like:
//!
//! ```text
//! 2024-01-01T00:00:00+00:00 OpenBMC.0.1.PowerButtonPressed,arg1,arg2
//! ```
//!
//! The monitor attaches during startup. If the watch cannot be installed the
//! step fails with the configured status, which becomes the exit code.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::lifecycle::startup::{Registrar, StartupError};
use crate::subsystems::redfish::event_service::EventServiceManager;

/// One parsed event log line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub timestamp: String,
    pub message_id: String,
    pub args: Vec<String>,
}

/// Parse a single event log line; blank or malformed lines yield `None`.
pub fn parse_line(line: &str) -> Option<LogEntry> {
    let (timestamp, rest) = line.trim().split_once(' ')?;
    let mut fields = rest.trim().split(',').map(str::trim);
    let message_id = fields.next().filter(|m| !m.is_empty())?;
    Some(LogEntry {
        timestamp: timestamp.to_string(),
        message_id: message_id.to_string(),
        args: fields.map(str::to_string).collect(),
    })
}

/// Read position in a growing file.
#[derive(Debug)]
pub struct LogTail {
    path: PathBuf,
    offset: u64,
}

impl LogTail {
    /// Start at the current end of `path`; a missing file starts at zero.
    pub fn at_end(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let offset = std::fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
        Self { path, offset }
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Complete lines appended since the last read. A file shorter than the
    /// current offset was rotated and is read from the start.
    pub fn read_new(&mut self) -> io::Result<Vec<String>> {
        let mut file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                self.offset = 0;
                return Ok(Vec::new());
            }
            Err(e) => return Err(e),
        };

        let len = file.metadata()?.len();
        if len < self.offset {
            tracing::info!(path = ?self.path, "Event log truncated, rereading");
            self.offset = 0;
        }

        file.seek(SeekFrom::Start(self.offset))?;
        let mut buf = Vec::new();
        file.read_to_end(&mut buf)?;

        let complete = match buf.iter().rposition(|b| *b == b'\n') {
            Some(pos) => pos + 1,
            None => return Ok(Vec::new()),
        };
        self.offset += complete as u64;

        Ok(String::from_utf8_lossy(&buf[..complete])
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(str::to_string)
            .collect())
    }
}

/// Event log file watcher.
pub struct EventLogMonitor;

impl EventLogMonitor {
    /// Install the watch on `directory` and feed `file_name` changes to `sink`.
    ///
    /// The returned task owns the watch and runs until the loop exits.
    pub fn start(
        directory: &Path,
        file_name: &str,
        sink: Option<Arc<EventServiceManager>>,
        handle: &tokio::runtime::Handle,
    ) -> Result<JoinHandle<()>, notify::Error> {
        let path = directory.join(file_name);
        let (tx, mut rx) = mpsc::unbounded_channel::<Event>();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    let _ = tx.send(event);
                }
                Err(e) => tracing::error!(error = %e, "Event log watch error"),
            },
            Config::default(),
        )?;
        watcher.watch(directory, RecursiveMode::NonRecursive)?;

        let mut tail = LogTail::at_end(&path);
        tracing::info!(path = ?path, offset = tail.offset(), "Event log monitor started");

        Ok(handle.spawn(async move {
            let _watcher = watcher;
            while let Some(event) = rx.recv().await {
                let relevant = (event.kind.is_modify() || event.kind.is_create())
                    && event.paths.iter().any(|p| p.file_name() == path.file_name());
                if !relevant {
                    continue;
                }

                // File reads go to the blocking pool; the tail travels with them.
                let read = tokio::task::spawn_blocking(move || {
                    let lines = tail.read_new();
                    (tail, lines)
                })
                .await;
                let lines = match read {
                    Ok((returned, Ok(lines))) => {
                        tail = returned;
                        lines
                    }
                    Ok((returned, Err(e))) => {
                        tail = returned;
                        tracing::warn!(error = %e, "Failed to read event log");
                        continue;
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Event log reader panicked, monitor stopped");
                        break;
                    }
                };
                for line in lines {
                    let Some(entry) = parse_line(&line) else {
                        tracing::debug!(line = %line, "Skipping malformed event log line");
                        continue;
                    };
                    match &sink {
                        Some(events) => {
                            events.publish(entry.timestamp, entry.message_id, entry.args);
                        }
                        None => tracing::debug!(message_id = %entry.message_id, "Event log entry"),
                    }
                }
            }
        }))
    }
}

pub fn register(r: &mut Registrar) -> Result<(), StartupError> {
    let config = r.config().event_log.clone();
    let sink = r.services().event_service.clone();

    match EventLogMonitor::start(&config.directory, &config.file_name, sink, r.context().handle()) {
        Ok(_) => Ok(()),
        Err(e) => {
            tracing::error!(directory = ?config.directory, error = %e, "Event log monitor failed to attach");
            Err(StartupError::Monitor {
                monitor: "event log",
                status: config.failure_status,
            })
        }
    }
}
