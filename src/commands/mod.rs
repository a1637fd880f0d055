// Copyright (c) 2025 - Cowboy AI, Inc.
//! Ledger Commands
//!
//! Commands express operator intent against the ledger. They are validated
//! when built and again by the publisher, and they never change afterwards.
//!
//! # Command Catalogue
//!
//! ```text
//! request_fee_waiver       accounts/<accountId>          → fee_waivers
//! record_repayment         accounts/<accountId>          → repayments
//! request_write_off        accounts/<accountId>          → write_off_requests (requestId)
//! approve_write_off        write_off_requests/<requestId> → status = approved
//! reject_write_off         write_off_requests/<requestId> → status = rejected
//! cancel_write_off         write_off_requests/<requestId> → status = cancelled
//! update_risk_model_config risk_models/<modelId>         → risk_model_configs
//! ```
//!
//! The write-off family shares one conversation: the request id is the
//! correlation key of the request, approval, rejection and cancellation.
//! The projector keys write-off documents by that id, so every command in
//! the family must carry it.
//!
//! # Time Handling
//!
//! `issued_at` is passed in by the application layer; it anchors the
//! idempotency time bucket.

pub mod validation;

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{BridgeError, BridgeResult, FailureContext};
use crate::projection::{EntityRef, ProjectionMatch};

pub use validation::{FieldError, FieldKind, FieldSpec, ValidationErrors};

use validation::{AMOUNT, TEXT};

const FEE_TYPES: &[&str] = &["late_fee", "overdraft_fee", "service_fee", "collection_fee"];
const REPAYMENT_METHODS: &[&str] = &["bank_transfer", "card", "cash", "direct_debit"];
const WRITE_OFF_REASONS: &[&str] = &[
    "hardship",
    "fraud",
    "deceased",
    "bankruptcy",
    "settlement",
    "uncollectible",
];

const FEE_WAIVER_SCHEMA: &[FieldSpec] = &[
    FieldSpec::required("accountId", TEXT),
    FieldSpec::required("feeType", FieldKind::OneOf(FEE_TYPES)),
    FieldSpec::required("amount", AMOUNT),
    FieldSpec::required("reason", TEXT),
];

const REPAYMENT_SCHEMA: &[FieldSpec] = &[
    FieldSpec::required("accountId", TEXT),
    FieldSpec::required("amount", AMOUNT),
    FieldSpec::required("method", FieldKind::OneOf(REPAYMENT_METHODS)),
    FieldSpec::optional("reference", TEXT),
];

const WRITE_OFF_REQUEST_SCHEMA: &[FieldSpec] = &[
    FieldSpec::required("accountId", TEXT),
    FieldSpec::required("amount", AMOUNT),
    FieldSpec::required("reasonCode", FieldKind::OneOf(WRITE_OFF_REASONS)),
    FieldSpec::optional("notes", TEXT),
];

const WRITE_OFF_APPROVE_SCHEMA: &[FieldSpec] = &[
    FieldSpec::required("requestId", TEXT),
    FieldSpec::optional("comment", TEXT),
];

const WRITE_OFF_REJECT_SCHEMA: &[FieldSpec] = &[
    FieldSpec::required("requestId", TEXT),
    FieldSpec::required("reason", TEXT),
];

const WRITE_OFF_CANCEL_SCHEMA: &[FieldSpec] = &[
    FieldSpec::required("requestId", TEXT),
    FieldSpec::optional("comment", TEXT),
];

const RISK_MODEL_SCHEMA: &[FieldSpec] = &[
    FieldSpec::required("modelId", TEXT),
    FieldSpec::required("parameters", FieldKind::Object),
];

/// Write operations accepted by the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandType {
    RequestFeeWaiver,
    RecordRepayment,
    RequestWriteOff,
    ApproveWriteOff,
    RejectWriteOff,
    CancelWriteOff,
    UpdateRiskModelConfig,
}

impl CommandType {
    pub const ALL: [CommandType; 7] = [
        CommandType::RequestFeeWaiver,
        CommandType::RecordRepayment,
        CommandType::RequestWriteOff,
        CommandType::ApproveWriteOff,
        CommandType::RejectWriteOff,
        CommandType::CancelWriteOff,
        CommandType::UpdateRiskModelConfig,
    ];

    /// Wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            CommandType::RequestFeeWaiver => "request_fee_waiver",
            CommandType::RecordRepayment => "record_repayment",
            CommandType::RequestWriteOff => "request_write_off",
            CommandType::ApproveWriteOff => "approve_write_off",
            CommandType::RejectWriteOff => "reject_write_off",
            CommandType::CancelWriteOff => "cancel_write_off",
            CommandType::UpdateRiskModelConfig => "update_risk_model_config",
        }
    }

    /// Payload schema
    pub fn schema(&self) -> &'static [FieldSpec] {
        match self {
            CommandType::RequestFeeWaiver => FEE_WAIVER_SCHEMA,
            CommandType::RecordRepayment => REPAYMENT_SCHEMA,
            CommandType::RequestWriteOff => WRITE_OFF_REQUEST_SCHEMA,
            CommandType::ApproveWriteOff => WRITE_OFF_APPROVE_SCHEMA,
            CommandType::RejectWriteOff => WRITE_OFF_REJECT_SCHEMA,
            CommandType::CancelWriteOff => WRITE_OFF_CANCEL_SCHEMA,
            CommandType::UpdateRiskModelConfig => RISK_MODEL_SCHEMA,
        }
    }

    /// Payload field naming the entity the command mutates
    pub fn entity_field(&self) -> &'static str {
        match self {
            CommandType::RequestFeeWaiver
            | CommandType::RecordRepayment
            | CommandType::RequestWriteOff => "accountId",
            CommandType::ApproveWriteOff
            | CommandType::RejectWriteOff
            | CommandType::CancelWriteOff => "requestId",
            CommandType::UpdateRiskModelConfig => "modelId",
        }
    }

    /// Read-model collection holding the mutated entity
    pub fn entity_collection(&self) -> &'static str {
        match self {
            CommandType::RequestFeeWaiver
            | CommandType::RecordRepayment
            | CommandType::RequestWriteOff => "accounts",
            CommandType::ApproveWriteOff
            | CommandType::RejectWriteOff
            | CommandType::CancelWriteOff => "write_off_requests",
            CommandType::UpdateRiskModelConfig => "risk_models",
        }
    }

    /// Read-model collection the projector writes the outcome into
    pub fn projection_collection(&self) -> &'static str {
        match self {
            CommandType::RequestFeeWaiver => "fee_waivers",
            CommandType::RecordRepayment => "repayments",
            CommandType::RequestWriteOff
            | CommandType::ApproveWriteOff
            | CommandType::RejectWriteOff
            | CommandType::CancelWriteOff => "write_off_requests",
            CommandType::UpdateRiskModelConfig => "risk_model_configs",
        }
    }

    /// Write-off commands must name the request they belong to
    pub fn requires_correlation_key(&self) -> bool {
        matches!(
            self,
            CommandType::RequestWriteOff
                | CommandType::ApproveWriteOff
                | CommandType::RejectWriteOff
                | CommandType::CancelWriteOff
        )
    }

    /// Whether the correlation key is also the id of the mutated entity
    fn entity_is_correlation_key(&self) -> bool {
        self.requires_correlation_key() && self.entity_field() == "requestId"
    }

    /// Condition that tells the poller the command has been applied
    pub fn completion(&self, correlation_key: &str) -> ProjectionMatch {
        let collection = self.projection_collection();
        match self {
            CommandType::RequestWriteOff => {
                ProjectionMatch::exists(collection, "requestId", correlation_key)
            }
            CommandType::ApproveWriteOff => {
                ProjectionMatch::field_equals(collection, "requestId", correlation_key, "status", "approved")
            }
            CommandType::RejectWriteOff => {
                ProjectionMatch::field_equals(collection, "requestId", correlation_key, "status", "rejected")
            }
            CommandType::CancelWriteOff => {
                ProjectionMatch::field_equals(collection, "requestId", correlation_key, "status", "cancelled")
            }
            CommandType::RequestFeeWaiver
            | CommandType::RecordRepayment
            | CommandType::UpdateRiskModelConfig => {
                ProjectionMatch::exists(collection, "correlationKey", correlation_key)
            }
        }
    }
}

impl fmt::Display for CommandType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CommandType {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CommandType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| BridgeError::Validation {
                errors: ValidationErrors::single("type", format!("unknown command type '{}'", s)),
                context: FailureContext::default(),
            })
    }
}

/// A validated request to change ledger state
///
/// Fields are private: a command is immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    command_type: CommandType,
    payload: Value,
    correlation_key: Option<String>,
    issued_at: DateTime<Utc>,
}

impl Command {
    /// Build and validate a command
    pub fn new(
        command_type: CommandType,
        payload: Value,
        correlation_key: Option<String>,
        issued_at: DateTime<Utc>,
    ) -> BridgeResult<Self> {
        let command = Self {
            command_type,
            payload,
            correlation_key: correlation_key.filter(|k| !k.trim().is_empty()),
            issued_at,
        };
        command.validate()?;
        Ok(command)
    }

    pub fn command_type(&self) -> CommandType {
        self.command_type
    }

    pub fn payload(&self) -> &Value {
        &self.payload
    }

    pub fn correlation_key(&self) -> Option<&str> {
        self.correlation_key.as_deref()
    }

    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    /// Entity the command mutates, read from the payload
    pub fn entity(&self) -> Option<EntityRef> {
        self.payload
            .get(self.command_type.entity_field())
            .and_then(Value::as_str)
            .map(|id| EntityRef::new(self.command_type.entity_collection(), id))
    }

    /// Context for errors raised while handling this command
    pub fn failure_context(&self) -> FailureContext {
        let mut context = FailureContext::for_command(self.command_type);
        if let Some(entity) = self.entity() {
            context = context.with_entity(entity);
        }
        if let Some(key) = &self.correlation_key {
            context = context.with_correlation_key(key.clone());
        }
        context
    }

    /// Check the payload against the schema for its type
    pub fn validate(&self) -> BridgeResult<()> {
        let mut errors = validation::validate_payload(self.command_type.schema(), &self.payload);

        if self.command_type.requires_correlation_key() {
            match (&self.correlation_key, self.entity()) {
                (None, _) => errors.push(
                    "correlationKey",
                    format!("{} requires the request id as correlation key", self.command_type),
                ),
                (Some(key), Some(entity))
                    if self.command_type.entity_is_correlation_key() && entity.id != *key =>
                {
                    errors.push(self.command_type.entity_field(), "must match the correlation key")
                }
                _ => {}
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(BridgeError::Validation {
                errors,
                context: self.failure_context(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use test_case::test_case;

    fn issued_at() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-01-19T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn test_wire_names_round_trip() {
        for command_type in CommandType::ALL {
            let parsed: CommandType = command_type.as_str().parse().unwrap();
            assert_eq!(parsed, command_type);
            assert_eq!(
                serde_json::to_value(command_type).unwrap(),
                json!(command_type.as_str())
            );
        }
        assert!("wave_fee".parse::<CommandType>().is_err());
    }

    #[test]
    fn test_valid_write_off_request() {
        let command = Command::new(
            CommandType::RequestWriteOff,
            json!({"accountId": "acc-1", "amount": "1250.00", "reasonCode": "hardship"}),
            Some("req-1".to_string()),
            issued_at(),
        )
        .unwrap();

        assert_eq!(command.entity(), Some(EntityRef::new("accounts", "acc-1")));
        assert_eq!(command.correlation_key(), Some("req-1"));
    }

    #[test_case(json!({"accountId": "acc-1", "amount": 10}), "method" ; "missing method")]
    #[test_case(json!({"accountId": "acc-1", "amount": -5, "method": "card"}), "amount" ; "negative amount")]
    #[test_case(json!({"accountId": "", "amount": 5, "method": "card"}), "accountId" ; "blank account")]
    #[test_case(json!({"accountId": "acc-1", "amount": 5, "method": "cheque"}), "method" ; "unknown method")]
    #[test_case(json!({"accountId": "acc-1", "amount": 5, "method": "card", "extra": 1}), "extra" ; "unexpected field")]
    fn test_invalid_repayment(payload: Value, field: &str) {
        let err = Command::new(CommandType::RecordRepayment, payload, None, issued_at()).unwrap_err();
        let errors = err.validation_errors().expect("validation error");
        assert!(
            errors.iter().any(|e| e.field == field),
            "expected error on {}, got {}",
            field,
            errors
        );
    }

    #[test]
    fn test_status_transition_requires_correlation_key() {
        let err = Command::new(
            CommandType::ApproveWriteOff,
            json!({"requestId": "req-1"}),
            None,
            issued_at(),
        )
        .unwrap_err();
        assert!(err
            .validation_errors()
            .unwrap()
            .iter()
            .any(|e| e.field == "correlationKey"));

        let err = Command::new(
            CommandType::ApproveWriteOff,
            json!({"requestId": "req-1"}),
            Some("req-2".to_string()),
            issued_at(),
        )
        .unwrap_err();
        assert!(err
            .validation_errors()
            .unwrap()
            .iter()
            .any(|e| e.field == "requestId"));
    }

    #[test]
    fn test_write_off_request_requires_request_id() {
        let err = Command::new(
            CommandType::RequestWriteOff,
            json!({"accountId": "acc-1", "amount": "1250.00", "reasonCode": "hardship"}),
            None,
            issued_at(),
        )
        .unwrap_err();

        let fields = err
            .validation_errors()
            .unwrap()
            .iter()
            .map(|e| e.field.as_str())
            .collect::<Vec<_>>();
        assert_eq!(fields, vec!["correlationKey"]);
    }

    #[test]
    fn test_blank_correlation_key_is_dropped() {
        let command = Command::new(
            CommandType::RequestFeeWaiver,
            json!({"accountId": "acc-1", "feeType": "late_fee", "amount": 25, "reason": "goodwill"}),
            Some("  ".to_string()),
            issued_at(),
        )
        .unwrap();
        assert_eq!(command.correlation_key(), None);
    }

    #[test]
    fn test_completion_predicates() {
        assert_eq!(
            CommandType::RejectWriteOff.completion("req-1"),
            ProjectionMatch::field_equals("write_off_requests", "requestId", "req-1", "status", "rejected")
        );
        assert_eq!(
            CommandType::RecordRepayment.completion("evt-1"),
            ProjectionMatch::exists("repayments", "correlationKey", "evt-1")
        );
    }
}
