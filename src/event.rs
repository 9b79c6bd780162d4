//! Container event vocabulary and the event record.
//!
//! The eleven milestone kinds carry a rank (1-11) that orders the normal
//! lifecycle of a container. The four exception kinds carry no rank and may
//! be recorded at any point.

use super::time::TimeStamp;
use crate::error::FormatError;
use chrono::Utc;

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    #[n(0)]
    GateOutEmpty,
    #[n(1)]
    GateInFull,
    #[n(2)]
    Loaded,
    #[n(3)]
    Departed,
    #[n(4)]
    InTransit,
    #[n(5)]
    Transshipment,
    #[n(6)]
    Arrived,
    #[n(7)]
    Discharged,
    #[n(8)]
    GateOutFull,
    #[n(9)]
    Delivered,
    #[n(10)]
    GateInEmpty,
    #[n(11)]
    CustomsHold,
    #[n(12)]
    CustomsReleased,
    #[n(13)]
    Inspection,
    #[n(14)]
    Damaged,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportMode {
    #[n(0)]
    Vessel,
    #[n(1)]
    Truck,
    #[n(2)]
    Rail,
    #[n(3)]
    Barge,
}

const ARRIVAL_PREDECESSORS: [EventType; 3] = [
    EventType::Departed,
    EventType::InTransit,
    EventType::Transshipment,
];

impl EventType {
    pub const ALL: [EventType; 15] = [
        EventType::GateOutEmpty,
        EventType::GateInFull,
        EventType::Loaded,
        EventType::Departed,
        EventType::InTransit,
        EventType::Transshipment,
        EventType::Arrived,
        EventType::Discharged,
        EventType::GateOutFull,
        EventType::Delivered,
        EventType::GateInEmpty,
        EventType::CustomsHold,
        EventType::CustomsReleased,
        EventType::Inspection,
        EventType::Damaged,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            EventType::GateOutEmpty => "GATE_OUT_EMPTY",
            EventType::GateInFull => "GATE_IN_FULL",
            EventType::Loaded => "LOADED",
            EventType::Departed => "DEPARTED",
            EventType::InTransit => "IN_TRANSIT",
            EventType::Transshipment => "TRANSSHIPMENT",
            EventType::Arrived => "ARRIVED",
            EventType::Discharged => "DISCHARGED",
            EventType::GateOutFull => "GATE_OUT_FULL",
            EventType::Delivered => "DELIVERED",
            EventType::GateInEmpty => "GATE_IN_EMPTY",
            EventType::CustomsHold => "CUSTOMS_HOLD",
            EventType::CustomsReleased => "CUSTOMS_RELEASED",
            EventType::Inspection => "INSPECTION",
            EventType::Damaged => "DAMAGED",
        }
    }

    /// Human readable status shown for the container's latest event.
    pub fn label(&self) -> &'static str {
        match self {
            EventType::GateOutEmpty => "Gate Out Empty",
            EventType::GateInFull => "Gate In Full",
            EventType::Loaded => "Loaded",
            EventType::Departed => "Departed",
            EventType::InTransit => "In Transit",
            EventType::Transshipment => "Transshipment",
            EventType::Arrived => "Arrived",
            EventType::Discharged => "Discharged",
            EventType::GateOutFull => "Gate Out Full",
            EventType::Delivered => "Delivered",
            EventType::GateInEmpty => "Gate In Empty",
            EventType::CustomsHold => "Customs Hold",
            EventType::CustomsReleased => "Customs Released",
            EventType::Inspection => "Inspection",
            EventType::Damaged => "Damaged",
        }
    }

    /// Position in the lifecycle, `None` for exception kinds.
    pub fn rank(&self) -> Option<u8> {
        match self {
            EventType::GateOutEmpty => Some(1),
            EventType::GateInFull => Some(2),
            EventType::Loaded => Some(3),
            EventType::Departed => Some(4),
            EventType::InTransit => Some(5),
            EventType::Transshipment => Some(6),
            EventType::Arrived => Some(7),
            EventType::Discharged => Some(8),
            EventType::GateOutFull => Some(9),
            EventType::Delivered => Some(10),
            EventType::GateInEmpty => Some(11),
            EventType::CustomsHold
            | EventType::CustomsReleased
            | EventType::Inspection
            | EventType::Damaged => None,
        }
    }

    /// Kinds of which at least one must already be recorded. Empty when the
    /// kind has no prerequisite.
    pub fn prerequisites(&self) -> &'static [EventType] {
        match self {
            EventType::Loaded => &[EventType::GateInFull],
            EventType::Departed => &[EventType::Loaded],
            EventType::Arrived => &ARRIVAL_PREDECESSORS,
            EventType::Discharged => &[EventType::Arrived],
            EventType::GateOutFull => &[EventType::Discharged],
            EventType::Delivered => &[EventType::GateOutFull],
            EventType::GateInEmpty => &[EventType::Delivered],
            EventType::CustomsReleased => &[EventType::CustomsHold],
            _ => &[],
        }
    }

    /// Milestones may occur once per container, exceptions any number of times.
    pub fn is_repeatable(&self) -> bool {
        self.rank().is_none()
    }

    pub fn is_exception(&self) -> bool {
        self.rank().is_none()
    }

    /// Happens aboard or alongside a vessel; a vessel reference is mandatory.
    pub fn is_maritime(&self) -> bool {
        matches!(
            self,
            EventType::Loaded
                | EventType::Departed
                | EventType::InTransit
                | EventType::Transshipment
                | EventType::Arrived
                | EventType::Discharged
        )
    }

    /// Road movements through the gate; vessel and voyage do not apply.
    pub fn is_terrestrial(&self) -> bool {
        matches!(
            self,
            EventType::GateOutEmpty
                | EventType::GateInFull
                | EventType::GateOutFull
                | EventType::GateInEmpty
                | EventType::Delivered
        )
    }

    /// Sets the container's blocked flag.
    pub fn is_blocking(&self) -> bool {
        matches!(
            self,
            EventType::CustomsHold | EventType::Damaged | EventType::Inspection
        )
    }

    /// Clears the container's blocked flag.
    pub fn is_release(&self) -> bool {
        matches!(self, EventType::CustomsReleased)
    }

    /// Recorded at the home terminal rather than at sea or at the consignee.
    pub fn is_local(&self) -> bool {
        !matches!(
            self,
            EventType::InTransit | EventType::Transshipment | EventType::Delivered
        )
    }

    /// Mode forced onto the event, `None` when the submitted mode is kept.
    pub fn transport_mode(&self) -> Option<TransportMode> {
        if self.is_maritime() {
            Some(TransportMode::Vessel)
        } else if self.is_terrestrial() {
            Some(TransportMode::Truck)
        } else {
            None
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl std::str::FromStr for EventType {
    type Err = FormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.trim().to_ascii_uppercase();
        EventType::ALL
            .into_iter()
            .find(|kind| kind.code() == code)
            .ok_or(FormatError::EventType { value: code })
    }
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Default, PartialEq, Eq)]
pub struct Location {
    #[n(0)]
    pub place: String, // terminal, port or ocean area
    #[n(1)]
    pub city: Option<String>,
    #[n(2)]
    pub country: String,
}

impl Location {
    pub fn new(place: &str, city: Option<&str>, country: &str) -> Self {
        Self {
            place: place.trim().to_string(),
            city: city.map(|c| c.trim().to_string()).filter(|c| !c.is_empty()),
            country: country.trim().to_string(),
        }
    }
    pub fn is_empty(&self) -> bool {
        self.place.is_empty() && self.city.is_none() && self.country.is_empty()
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.place)?;
        if let Some(city) = &self.city {
            write!(f, ", {city}")?;
        }
        if !self.country.is_empty() {
            write!(f, ", {}", self.country)?;
        }
        Ok(())
    }
}

/// An immutable timestamped fact about a container.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct ContainerEvent {
    #[n(0)]
    pub container: String, // ISO 6346 code of the container
    #[n(1)]
    pub kind: EventType,
    #[n(2)]
    pub timestamp: TimeStamp<Utc>,
    #[n(3)]
    pub location: Location,
    #[n(4)]
    pub vessel: Option<String>, // IMO number
    #[n(5)]
    pub transport_mode: Option<TransportMode>,
    #[n(6)]
    pub voyage: Option<String>,
    #[n(7)]
    pub notes: String,
}

impl ContainerEvent {
    pub fn new(container: &str, kind: EventType, timestamp: TimeStamp<Utc>) -> Self {
        Self {
            container: container.trim().to_ascii_uppercase(),
            kind,
            timestamp,
            location: Location::default(),
            vessel: None,
            transport_mode: None,
            voyage: None,
            notes: String::new(),
        }
    }
    pub fn set_location(mut self, location: Location) -> Self {
        self.location = location;
        self
    }
    pub fn set_vessel(mut self, imo_number: &str) -> Self {
        self.vessel = Some(imo_number.trim().to_string());
        self
    }
    pub fn set_transport_mode(mut self, mode: TransportMode) -> Self {
        self.transport_mode = Some(mode);
        self
    }
    pub fn set_voyage(mut self, voyage: &str) -> Self {
        self.voyage = Some(voyage.trim().to_string());
        self
    }
    pub fn set_notes(mut self, notes: &str) -> Self {
        self.notes = notes.to_string();
        self
    }

    /// Write-time normalisation: forced transport mode, vessel and voyage
    /// cleared on road movements, no city for open water.
    pub fn normalise(&mut self) {
        self.transport_mode = match self.kind.transport_mode() {
            Some(mode) => Some(mode),
            None => self.transport_mode.or(Some(TransportMode::Truck)),
        };

        if self.kind.is_terrestrial() {
            self.vessel = None;
            self.voyage = None;
        }
        if self.kind == EventType::InTransit {
            self.location.city = None;
        }
    }

    /// Returns the content hash and CBOR encoding of the event.
    pub fn build(&self) -> anyhow::Result<(String, Vec<u8>)> {
        let cbor = minicbor::to_vec(self)?;
        let hash = crate::utils::digest(&cbor);

        Ok((hash, cbor))
    }
}
