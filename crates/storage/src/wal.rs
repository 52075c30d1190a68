// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Write-ahead log for workflow persistence

use keel_core::Operation;
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WalError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("corrupt WAL entry at line {line}: {source}")]
    Corrupt {
        line: usize,
        source: serde_json::Error,
    },
}

/// Append-only JSON-lines log of workflow operations
pub struct Wal {
    file: File,
    sequence: u64,
}

impl Wal {
    /// Open or create a WAL at the given path
    pub fn open(path: &Path) -> Result<Self, WalError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .read(true)
            .open(path)?;

        let reader = BufReader::new(File::open(path)?);
        let sequence = reader
            .lines()
            .map_while(Result::ok)
            .filter(|l| !l.is_empty())
            .count() as u64;

        Ok(Self { file, sequence })
    }

    /// Append an operation and sync it to disk, returning its sequence number
    pub fn append(&mut self, op: &Operation) -> Result<u64, WalError> {
        let entry = WalEntry {
            seq: self.sequence + 1,
            op: op.clone(),
        };
        let line = serde_json::to_string(&entry)?;
        writeln!(self.file, "{}", line)?;
        self.file.sync_all()?;
        self.sequence += 1;
        Ok(self.sequence)
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Replay all operations from the log
    ///
    /// A malformed final line is a write torn by a crash and is dropped with a warning;
    /// a malformed line anywhere else is corruption.
    pub fn replay(path: &Path) -> Result<Vec<Operation>, WalError> {
        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let lines: Vec<String> = BufReader::new(file)
            .lines()
            .collect::<Result<_, _>>()?;
        let last = lines.iter().rposition(|l| !l.is_empty());

        let mut ops = Vec::new();
        for (index, line) in lines.iter().enumerate() {
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<WalEntry>(line) {
                Ok(entry) => ops.push(entry.op),
                Err(e) if Some(index) == last => {
                    tracing::warn!(line = index + 1, error = %e, "dropping torn WAL tail");
                }
                Err(source) => {
                    return Err(WalError::Corrupt {
                        line: index + 1,
                        source,
                    })
                }
            }
        }

        Ok(ops)
    }
}

#[derive(Debug, serde::Serialize, serde::Deserialize)]
struct WalEntry {
    seq: u64,
    op: Operation,
}

#[cfg(test)]
#[path = "wal_tests.rs"]
mod tests;
