// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event log for audit trail

use crate::event::Envelope;
use crate::workflow::WorkflowId;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;

/// A logged envelope with its position in the log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRecord {
    /// Monotonic sequence number
    pub sequence: u64,
    /// The event name
    pub name: String,
    pub envelope: Envelope,
}

/// Append-only JSON-lines log of published envelopes
pub struct EventLog {
    path: PathBuf,
    sequence: u64,
}

impl EventLog {
    /// Open or create an event log at the given path
    pub fn open(path: PathBuf) -> std::io::Result<Self> {
        let sequence = if path.exists() {
            let file = File::open(&path)?;
            BufReader::new(file).lines().count() as u64
        } else {
            0
        };

        Ok(Self { path, sequence })
    }

    pub fn append(&mut self, envelope: Envelope) -> std::io::Result<EventRecord> {
        self.sequence += 1;

        let record = EventRecord {
            sequence: self.sequence,
            name: envelope.name().to_string(),
            envelope,
        };

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        let json = serde_json::to_string(&record)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        writeln!(file, "{}", json)?;

        Ok(record)
    }

    pub fn read_all(&self) -> std::io::Result<Vec<EventRecord>> {
        if !self.path.exists() {
            return Ok(vec![]);
        }

        let file = File::open(&self.path)?;
        let reader = BufReader::new(file);
        let mut records = Vec::new();

        for line in reader.lines() {
            let line = line?;
            if line.is_empty() {
                continue;
            }
            let record: EventRecord = serde_json::from_str(&line)
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
            records.push(record);
        }

        Ok(records)
    }

    /// Every record belonging to one workflow, in publish order
    pub fn for_workflow(&self, id: &WorkflowId) -> std::io::Result<Vec<EventRecord>> {
        let all = self.read_all()?;
        Ok(all
            .into_iter()
            .filter(|r| r.envelope.correlation_id() == id)
            .collect())
    }
}

#[cfg(test)]
#[path = "log_tests.rs"]
mod tests;
