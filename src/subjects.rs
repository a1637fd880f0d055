// Copyright (c) 2025 - Cowboy AI, Inc.

//! NATS subject hierarchy for ledger commands
//!
//! Every command type gets its own subject under a common prefix:
//!
//! ```text
//! ledger.commands.{command_type}
//! ```
//!
//! This allows for:
//! - Per-type consumers on the ledger side (`ledger.commands.record_repayment`)
//! - One stream capturing everything (`ledger.commands.>`)
//!
//! # Examples
//!
//! ```rust
//! use cim_ledger_bridge::subjects::{SubjectBuilder, COMMAND_ROOT};
//! use cim_ledger_bridge::CommandType;
//!
//! let subjects = SubjectBuilder::new(COMMAND_ROOT);
//! assert_eq!(
//!     subjects.command(CommandType::ApproveWriteOff),
//!     "ledger.commands.approve_write_off"
//! );
//! assert_eq!(subjects.wildcard(), "ledger.commands.>");
//! ```

use crate::commands::CommandType;

/// Default prefix for command subjects
pub const COMMAND_ROOT: &str = "ledger.commands";

/// Builder for command subjects under a prefix
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectBuilder {
    prefix: String,
}

impl SubjectBuilder {
    /// Builder for the given prefix; surrounding dots are ignored
    pub fn new(prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        Self {
            prefix: prefix.trim_matches('.').to_string(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Subject a command of this type is published on
    pub fn command(&self, command_type: CommandType) -> String {
        format!("{}.{}", self.prefix, command_type.as_str())
    }

    /// Subscription covering every command type
    pub fn wildcard(&self) -> String {
        format!("{}.>", self.prefix)
    }
}

impl Default for SubjectBuilder {
    fn default() -> Self {
        Self::new(COMMAND_ROOT)
    }
}
