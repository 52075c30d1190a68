// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Routing of envelopes to handlers by event name
//!
//! Routing names are always `<subject>:<action>`, e.g. `tasks:outcome`.

use std::fmt;

/// One side of a pattern: a literal segment or `*`
#[derive(Clone, Debug, PartialEq, Eq)]
enum Segment {
    Any,
    Exact(String),
}

impl Segment {
    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "" => None,
            "*" => Some(Segment::Any),
            s if s.contains('*') => None,
            s => Some(Segment::Exact(s.to_string())),
        }
    }

    fn matches(&self, segment: &str) -> bool {
        match self {
            Segment::Any => true,
            Segment::Exact(s) => s == segment,
        }
    }
}

/// Pattern over routing names
///
/// `workflow:started` matches itself, `*:outcome` every outcome, `workflow:*` every
/// lifecycle event and `*` everything. A malformed pattern matches nothing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventPattern {
    raw: String,
    parsed: Option<(Segment, Segment)>,
}

impl EventPattern {
    pub fn new(pattern: &str) -> Self {
        let parsed = if pattern == "*" {
            Some((Segment::Any, Segment::Any))
        } else {
            pattern
                .split_once(':')
                .and_then(|(subject, action)| Some((Segment::parse(subject)?, Segment::parse(action)?)))
        };
        Self {
            raw: pattern.to_string(),
            parsed,
        }
    }

    pub fn matches(&self, event_name: &str) -> bool {
        let Some((subject, action)) = &self.parsed else {
            return false;
        };
        match event_name.split_once(':') {
            Some((s, a)) if !a.contains(':') => subject.matches(s) && action.matches(a),
            _ => false,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.parsed.is_some()
    }
}

impl fmt::Display for EventPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// The routing table entry of one handler
#[derive(Clone, Debug)]
pub struct Route {
    pub handler: &'static str,
    pub patterns: Vec<EventPattern>,
}

impl Route {
    pub fn new(handler: &'static str, patterns: Vec<EventPattern>) -> Self {
        Self { handler, patterns }
    }

    pub fn matches(&self, event_name: &str) -> bool {
        self.patterns.iter().any(|p| p.matches(event_name))
    }
}

#[cfg(test)]
#[path = "routing_tests.rs"]
mod tests;
