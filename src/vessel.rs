//! Vessel calls (scheduled vessel visits to the terminal).
use super::time::TimeStamp;
use crate::container::Direction;
use crate::error::{FormatError, ValidationError};
use chrono::Utc;

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    #[n(0)]
    Discharge, // import
    #[n(1)]
    Load, // export
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallStatus {
    #[n(0)]
    Scheduled,
    #[n(1)]
    EnRoute,
    #[n(2)]
    Berthed,
    #[n(3)]
    Operating,
    #[n(4)]
    Completed,
    #[n(5)]
    Cancelled,
}

impl CallStatus {
    /// Before berthing there is no actual arrival to record.
    pub fn allows_actual_arrival(&self) -> bool {
        !matches!(self, CallStatus::Scheduled | CallStatus::EnRoute)
    }
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct VesselRef {
    #[n(0)]
    pub name: String,
    #[n(1)]
    pub imo_number: String,
}

impl VesselRef {
    pub fn new(name: &str, imo_number: &str) -> Result<Self, FormatError> {
        let imo_number = imo_number.trim();
        if imo_number.len() != 7 || !imo_number.bytes().all(|b| b.is_ascii_digit()) {
            return Err(FormatError::ImoNumber {
                value: imo_number.to_string(),
            });
        }

        Ok(Self {
            name: name.trim().to_string(),
            imo_number: imo_number.to_string(),
        })
    }
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct VesselCall {
    #[n(0)]
    pub id: String, // bech32 encoded uuid7, assigned on registration
    #[n(1)]
    pub vessel: VesselRef,
    #[n(2)]
    pub eta: TimeStamp<Utc>,
    #[n(3)]
    pub etd: Option<TimeStamp<Utc>>,
    #[n(4)]
    pub actual_arrival: Option<TimeStamp<Utc>>,
    #[n(5)]
    pub actual_departure: Option<TimeStamp<Utc>>,
    #[n(6)]
    pub berth: String,
    #[n(7)]
    pub operation: OperationKind,
    #[n(8)]
    pub discharge_count: u32,
    #[n(9)]
    pub load_count: u32,
    #[n(10)]
    pub status: CallStatus,
}

impl VesselCall {
    /// A scheduled call declaring `declared` containers for `operation`.
    pub fn new(
        vessel: VesselRef,
        eta: TimeStamp<Utc>,
        operation: OperationKind,
        declared: u32,
    ) -> Self {
        let (discharge_count, load_count) = match operation {
            OperationKind::Discharge => (declared, 0),
            OperationKind::Load => (0, declared),
        };

        Self {
            id: String::new(),
            vessel,
            eta,
            etd: None,
            actual_arrival: None,
            actual_departure: None,
            berth: String::new(),
            operation,
            discharge_count,
            load_count,
            status: CallStatus::Scheduled,
        }
    }

    pub fn set_berth(mut self, berth: &str) -> Self {
        self.berth = berth.trim().to_string();
        self
    }
    pub fn set_etd(mut self, etd: TimeStamp<Utc>) -> Self {
        self.etd = Some(etd);
        self
    }

    /// Declared container count for one direction.
    pub fn declared_for(&self, direction: Direction) -> u32 {
        match direction {
            Direction::Import => self.discharge_count,
            Direction::Export => self.load_count,
        }
    }

    /// Actual arrival when known, else the ETA.
    pub fn arrival_reference(&self) -> TimeStamp<Utc> {
        self.actual_arrival.unwrap_or(self.eta)
    }

    /// Zero the count of the direction the call does not operate.
    pub fn normalise(&mut self) {
        match self.operation {
            OperationKind::Discharge => self.load_count = 0,
            OperationKind::Load => self.discharge_count = 0,
        }
    }

    pub fn validate(&self, now: TimeStamp<Utc>) -> Result<(), ValidationError> {
        if self.berth.is_empty() {
            return Err(ValidationError::missing("berth", "a berth must be assigned"));
        }

        if let Some(etd) = self.etd {
            if etd < self.eta {
                return Err(ValidationError::invalid(
                    "etd",
                    format!("ETD {etd} is earlier than ETA {}", self.eta),
                ));
            }
        }

        let declared = match self.operation {
            OperationKind::Discharge => self.discharge_count,
            OperationKind::Load => self.load_count,
        };
        if declared == 0 {
            let field = match self.operation {
                OperationKind::Discharge => "discharge_count",
                OperationKind::Load => "load_count",
            };
            return Err(ValidationError::invalid(
                field,
                "declared container count must be greater than zero",
            ));
        }

        if let Some(arrival) = self.actual_arrival {
            if !self.status.allows_actual_arrival() {
                return Err(ValidationError::invalid(
                    "actual_arrival",
                    format!("cannot be set while the call is {:?}", self.status),
                ));
            }
            if arrival > now {
                return Err(ValidationError::invalid(
                    "actual_arrival",
                    format!("{arrival} is in the future"),
                ));
            }
        }

        if let (Some(departure), Some(arrival)) = (self.actual_departure, self.actual_arrival) {
            if departure < arrival {
                return Err(ValidationError::invalid(
                    "actual_departure",
                    format!("{departure} is earlier than actual arrival {arrival}"),
                ));
            }
        }

        Ok(())
    }
}
