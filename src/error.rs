//! Error taxonomy for container tracking.
//!
//! Every variant carries enough context to rebuild a message for the
//! operator: the offending value, what was expected, and the conflicting
//! entity where there is one.

use crate::container::Direction;
use crate::event::EventType;

/// Malformed input that can be rejected without looking at stored state.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    #[error("container code '{value}' must be 4 letters followed by 7 digits")]
    IdentifierPattern { value: String },
    #[error("container code '{value}' has equipment category '{found}', expected one of U, J, Z")]
    EquipmentCategory { value: String, found: char },
    #[error("container code '{value}' fails check digit: expected {expected}, provided {provided}")]
    CheckDigit {
        value: String,
        expected: u8,
        provided: u8,
    },
    #[error("owner code '{value}' must be 4 letters ending in an equipment category")]
    OwnerCode { value: String },
    #[error("serial number '{value}' must be exactly 6 digits")]
    SerialNumber { value: String },
    #[error("seal string contains no seals")]
    NoSeals,
    #[error("seal entry '{entry}' must have the form TYPE:CODE")]
    SealEntry { entry: String },
    #[error("seal type '{value}' is not one of CARRIER, CUSTOMS, PHYTOSANITARY, EXPORTER, OTHER")]
    SealType { value: String },
    #[error("seal code '{code}' must contain only A-Z, 0-9 and '-' and be at least 4 characters")]
    SealCode { code: String },
    #[error("exactly one primary seal is required, found {found}")]
    PrimarySeal { found: usize },
    #[error("seal code '{code}' is repeated within the container")]
    RepeatedSeal { code: String },
    #[error("dispatch number '{value}' must match ddd-dddd-dd-dddddd[-dd]")]
    DispatchNumber { value: String },
    #[error("invoice number '{value}' must match Fddd-dddddddd or Bddd-dddddddd")]
    InvoiceNumber { value: String },
    #[error("IMO number '{value}' must be exactly 7 digits")]
    ImoNumber { value: String },
    #[error("tax id '{value}' must be exactly 11 digits")]
    TaxId { value: String },
    #[error("unknown event type '{value}'")]
    EventType { value: String },
    #[error("document '{file_name}' has extension not in {allowed:?}")]
    DocumentExtension {
        file_name: String,
        allowed: Vec<String>,
    },
    #[error("document '{file_name}' is {size_bytes} bytes, limit is {max_bytes}")]
    DocumentSize {
        file_name: String,
        size_bytes: u64,
        max_bytes: u64,
    },
}

/// Event rejected because of where it would land in the container's history.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SequenceError {
    #[error("{event:?} at {timestamp} is earlier than recorded {prior:?} at {prior_timestamp}")]
    OutOfOrder {
        event: EventType,
        timestamp: String,
        prior: EventType,
        prior_timestamp: String,
    },
    #[error("{event:?} requires one of {required:?} earlier in the history")]
    MissingPrerequisite {
        event: EventType,
        required: Vec<EventType>,
    },
    #[error("{event:?} cannot follow {recorded:?}, history has already advanced past it")]
    SkippedAhead {
        event: EventType,
        recorded: EventType,
    },
    #[error("{event:?} has already been recorded for this container")]
    Duplicate { event: EventType },
}

/// Field-attributed validation failure surfaced to the caller for correction.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error(transparent)]
    Format(#[from] FormatError),
    #[error(transparent)]
    Sequence(#[from] SequenceError),
    #[error("{field} '{value}' is already used by {conflicting}")]
    UniquenessConflict {
        field: &'static str,
        value: String,
        conflicting: String,
    },
    #[error(
        "vessel call {call} already has {current} of {declared} declared {direction:?} containers"
    )]
    CapacityExceeded {
        call: String,
        direction: Direction,
        current: u32,
        declared: u32,
    },
    #[error("{field} is required: {reason}")]
    MissingRequiredField {
        field: &'static str,
        reason: &'static str,
    },
    #[error("{field}: {detail}")]
    CrossReference { field: &'static str, detail: String },
    #[error("{field}: {detail}")]
    InvalidValue { field: &'static str, detail: String },
    #[error("container {container} cannot be released: {}", reasons.join("; "))]
    ReleaseRefused {
        container: String,
        reasons: Vec<String>,
    },
}

impl ValidationError {
    pub fn missing(field: &'static str, reason: &'static str) -> Self {
        Self::MissingRequiredField { field, reason }
    }
    pub fn invalid(field: &'static str, detail: impl Into<String>) -> Self {
        Self::InvalidValue {
            field,
            detail: detail.into(),
        }
    }
    pub fn cross_reference(field: &'static str, detail: impl Into<String>) -> Self {
        Self::CrossReference {
            field,
            detail: detail.into(),
        }
    }
}

/// Lookup and referential-integrity failures in the store.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("{entity} '{key}' not found")]
    NotFound { entity: &'static str, key: String },
    #[error("{entity} '{key}' already exists")]
    AlreadyExists { entity: &'static str, key: String },
    #[error("{entity} '{key}' cannot be deleted: {reason}")]
    ProtectedDeletion {
        entity: &'static str,
        key: String,
        reason: String,
    },
}

impl StoreError {
    pub fn not_found(entity: &'static str, key: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            key: key.into(),
        }
    }
}
