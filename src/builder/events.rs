//! Build event types for JSON output.
//!
//! This module defines the stable JSON schema for machine-readable build
//! output. These events are printed one per line when using
//! `--message-format json`.
//!
//! # Event Types
//!
//! - `tool-ready`: a generator tool was built or located
//! - `interface-generated`: an interface definition was generated
//! - `component-artifact`: a component object was linked
//! - `component-verified`: the undefined symbol check finished
//! - `node-failed`: a build graph node failed
//! - `node-skipped`: a node was not run because a dependency failed
//! - `build-finished`: build completed (success or failure)
//!
//! # Stability
//!
//! New fields may be added, but existing fields should not be removed or
//! renamed.

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::{Mutex, PoisonError};

use anyhow::bail;
use serde::Serialize;

/// Output format for build messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MessageFormat {
    #[default]
    Human,
    Json,
}

impl MessageFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageFormat::Human => "human",
            MessageFormat::Json => "json",
        }
    }
}

impl FromStr for MessageFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "human" => Ok(MessageFormat::Human),
            "json" => Ok(MessageFormat::Json),
            other => bail!("unknown message format `{}` (expected human or json)", other),
        }
    }
}

/// A build event emitted during the build process.
///
/// Each event is serialized as a single JSON object per line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "kebab-case")]
pub enum BuildEvent {
    /// A generator tool is available.
    ToolReady {
        tool: String,
        path: PathBuf,
    },

    /// The generator produced the artifact set of one interface.
    #[serde(rename = "interface-generated")]
    Generated {
        unit: String,
        interface: PathBuf,
        outputs: Vec<PathBuf>,
    },

    /// A component object was linked.
    ComponentArtifact {
        component: String,
        object: PathBuf,
        #[serde(skip_serializing_if = "Option::is_none")]
        map: Option<PathBuf>,
    },

    /// The undefined symbol check finished.
    #[serde(rename = "component-verified")]
    Verified {
        component: String,
        passed: bool,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        symbols: Vec<String>,
    },

    /// A build graph node failed.
    NodeFailed {
        node: String,
        target: String,
        message: String,
    },

    /// A node was skipped because something it depends on failed.
    NodeSkipped {
        node: String,
        target: String,
    },

    /// Build completed (success or failure).
    BuildFinished {
        success: bool,
        duration_ms: u64,
        components_verified: usize,
    },
}

impl BuildEvent {
    /// Serialize this event to a JSON string.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    /// One-line human description.
    pub fn summary(&self) -> String {
        match self {
            BuildEvent::ToolReady { tool, path } => {
                format!("tool `{}` ready at {}", tool, path.display())
            }
            BuildEvent::Generated {
                unit, interface, ..
            } => format!("generated {} for `{}`", interface.display(), unit),
            BuildEvent::ComponentArtifact {
                component, object, ..
            } => format!("linked `{}` -> {}", component, object.display()),
            BuildEvent::Verified {
                component, passed, ..
            } => format!(
                "verified `{}`: {}",
                component,
                if *passed { "ok" } else { "undefined symbols" }
            ),
            BuildEvent::NodeFailed { node, message, .. } => {
                format!("{} failed: {}", node, message)
            }
            BuildEvent::NodeSkipped { node, .. } => format!("{} skipped", node),
            BuildEvent::BuildFinished {
                success,
                duration_ms,
                components_verified,
            } => format!(
                "build {} in {:.2}s ({} component(s) verified)",
                if *success { "finished" } else { "failed" },
                *duration_ms as f64 / 1000.0,
                components_verified
            ),
        }
    }
}

/// Receives events from build nodes.
///
/// Events are logged, kept for the final report and, in JSON mode, printed
/// to stdout as they happen.
#[derive(Debug, Default)]
pub struct EventSink {
    format: MessageFormat,
    events: Mutex<Vec<BuildEvent>>,
}

impl EventSink {
    pub fn new(format: MessageFormat) -> Self {
        EventSink {
            format,
            events: Mutex::new(Vec::new()),
        }
    }

    pub fn format(&self) -> MessageFormat {
        self.format
    }

    pub fn emit(&self, event: BuildEvent) {
        match event {
            BuildEvent::NodeFailed { .. } => tracing::debug!("{}", event.summary()),
            BuildEvent::NodeSkipped { .. } => tracing::warn!("{}", event.summary()),
            _ => tracing::info!("{}", event.summary()),
        }

        if self.format == MessageFormat::Json {
            println!("{}", event.to_json());
        }

        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }

    /// Snapshot of all events emitted so far.
    pub fn events(&self) -> Vec<BuildEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
