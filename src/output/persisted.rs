use crate::core::address::build_socket;
use crate::error::WriterError;
use fnv::{FnvHashMap, FnvHashSet};
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, trace};

/// An ordered set of lines backed by a file.
#[derive(Debug, Default)]
pub struct PersistedSet {
    lines: Vec<String>,
    members: FnvHashSet<String>,
    /// Existing content does not end with a newline.
    unterminated: bool,
}

impl PersistedSet {
    pub fn load(location: &Path) -> Result<Self, WriterError> {
        let content = match fs::read_to_string(location) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(WriterError::Read {
                    path: location.to_path_buf(),
                    source,
                })
            }
        };

        let mut set = Self {
            unterminated: !content.is_empty() && !content.ends_with('\n'),
            ..Self::default()
        };
        for line in content.lines() {
            let line = line.trim_end_matches('\r');
            if !line.is_empty() && set.members.insert(line.to_string()) {
                set.lines.push(line.to_string());
            }
        }
        Ok(set)
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Values not yet present, in given order and deduplicated.
    fn missing<'a, I>(&mut self, values: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut fresh = Vec::new();
        for value in values {
            if value.is_empty() || value.contains('\n') {
                continue;
            }
            if self.members.insert(value.to_string()) {
                self.lines.push(value.to_string());
                fresh.push(value.to_string());
            }
        }
        fresh
    }
}

/// One mutex per output location, shared by every writer operation.
#[derive(Debug, Default)]
struct LocationLocks {
    locks: Mutex<FnvHashMap<PathBuf, Arc<Mutex<()>>>>,
}

impl LocationLocks {
    fn for_location(&self, location: &Path) -> Arc<Mutex<()>> {
        self.locks
            .lock()
            .entry(location.to_path_buf())
            .or_default()
            .clone()
    }
}

/// Idempotent writer for list files and documents under the output root.
#[derive(Debug, Default)]
pub struct ListWriter {
    locks: LocationLocks,
    run_documents: Mutex<FnvHashSet<PathBuf>>,
}

fn write_error(location: &Path) -> impl FnOnce(io::Error) -> WriterError + '_ {
    move |source| WriterError::Write {
        path: location.to_path_buf(),
        source,
    }
}

fn append_bytes(location: &Path, bytes: &[u8]) -> Result<(), WriterError> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(location)
        .map_err(write_error(location))?;
    file.write_all(bytes).map_err(write_error(location))?;
    file.flush().map_err(write_error(location))
}

/// Rewrite through a sibling temp file so readers never see half a file.
fn replace_bytes(location: &Path, bytes: &[u8]) -> Result<(), WriterError> {
    let file_name = location
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let temp = location.with_file_name(format!(".{}.tmp", file_name));

    let result = fs::write(&temp, bytes).and_then(|_| fs::rename(&temp, location));
    if let Err(source) = result {
        let _ = fs::remove_file(&temp);
        return Err(WriterError::Write {
            path: location.to_path_buf(),
            source,
        });
    }
    Ok(())
}

impl ListWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the values missing from `location`, in order. Returns how
    /// many lines were written.
    pub fn append<S: AsRef<str>>(&self, location: &Path, values: &[S]) -> Result<usize, WriterError> {
        let lock = self.locks.for_location(location);
        let _guard = lock.lock();

        let mut set = PersistedSet::load(location)?;
        let fresh = set.missing(values.iter().map(|v| v.as_ref()));
        if fresh.is_empty() {
            return Ok(0);
        }

        let mut buffer = String::new();
        if set.unterminated {
            buffer.push('\n');
        }
        for value in &fresh {
            buffer.push_str(value);
            buffer.push('\n');
        }
        append_bytes(location, buffer.as_bytes())?;

        trace!(path = %location.display(), added = fresh.len(), "appended list entries");
        Ok(fresh.len())
    }

    /// Expand `addresses` to sockets on `port` and append them. Host-level
    /// port 0 writes nothing.
    pub fn append_socket_pairs<S: AsRef<str>>(
        &self,
        location: &Path,
        addresses: &[S],
        port: u16,
    ) -> Result<usize, WriterError> {
        if port == 0 {
            return Ok(0);
        }

        let mut sockets = Vec::with_capacity(addresses.len());
        for address in addresses {
            let address = address.as_ref();
            match build_socket(address, port) {
                Some(socket) => sockets.push(socket),
                None => debug!(address, "unrecognized address excluded from sockets"),
            }
        }
        self.append(location, &sockets)
    }

    /// Union `ports` with the numbers already in `location` and rewrite the
    /// file strictly ascending. Port 0 is never listed.
    pub fn merge_ports(&self, location: &Path, ports: &BTreeSet<u16>) -> Result<usize, WriterError> {
        let lock = self.locks.for_location(location);
        let _guard = lock.lock();

        let existing = PersistedSet::load(location)?;
        let mut merged: BTreeSet<u16> = existing
            .lines()
            .iter()
            .filter_map(|line| line.trim().parse::<u16>().ok())
            .collect();
        let before = merged.len();
        merged.extend(ports.iter().copied());
        merged.remove(&0);

        if merged.is_empty() {
            return Ok(0);
        }

        let content: String = merged.iter().map(|port| format!("{}\n", port)).collect();
        replace_bytes(location, content.as_bytes())?;
        Ok(merged.len().saturating_sub(before))
    }

    /// Full rewrite of `location`.
    pub fn replace(&self, location: &Path, content: &str) -> Result<(), WriterError> {
        let lock = self.locks.for_location(location);
        let _guard = lock.lock();
        replace_bytes(location, content.as_bytes())
    }

    /// The first write to `location` by this writer truncates it; later
    /// writes append.
    pub fn write_run_document(&self, location: &Path, content: &str) -> Result<(), WriterError> {
        let lock = self.locks.for_location(location);
        let _guard = lock.lock();

        let first = self.run_documents.lock().insert(location.to_path_buf());
        if first {
            replace_bytes(location, content.as_bytes())
        } else {
            append_bytes(location, content.as_bytes())
        }
    }

    /// Existing lines of `location`, or nothing if it does not exist.
    pub fn read_lines(&self, location: &Path) -> Result<Vec<String>, WriterError> {
        let lock = self.locks.for_location(location);
        let _guard = lock.lock();
        PersistedSet::load(location).map(|set| set.lines)
    }
}
