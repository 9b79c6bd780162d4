//! Container drafts and the finalised container record.
use super::event::Location;
use super::iso6346::{self, ContainerCode};
use super::seals::{self, SealSet};
use super::time::TimeStamp;
use crate::error::{FormatError, ValidationError};
use chrono::Utc;

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Direction {
    #[n(0)]
    Import, // discharged from the vessel
    #[n(1)]
    Export, // loaded onto the vessel
}

impl Direction {
    pub fn code(&self) -> &'static str {
        match self {
            Direction::Import => "IMPORT",
            Direction::Export => "EXPORT",
        }
    }
}

/// Used for constructing and editing containers before validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerDetails {
    code: Option<String>,
    vessel_call: Option<String>,
    forwarder: Option<String>,
    direction: Option<Direction>,
    size_type: Option<String>,
    gross_weight_kg: Option<u64>,
    tare_weight_kg: Option<u64>,
    seals: Option<String>,
    cargo: Option<String>,
    hazardous: bool,
    yard_location: Option<String>,
    bill_of_lading: Option<String>,
    appointment: Option<TimeStamp<Utc>>,
    origin: Option<Location>,
    destination: Option<Location>,
    shipper: Option<String>,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct Container {
    #[n(0)]
    pub code: ContainerCode,
    #[n(1)]
    pub vessel_call: String,
    #[n(2)]
    pub forwarder: Option<String>,
    #[n(3)]
    pub direction: Direction,
    #[n(4)]
    pub size_type: String, // e.g. 20GP, 40HC, 40RF
    #[n(5)]
    pub gross_weight_kg: u64, // verified gross mass
    #[n(6)]
    pub tare_weight_kg: Option<u64>,
    #[n(7)]
    pub seals: String, // canonical seal string
    #[n(8)]
    pub cargo: String,
    #[n(9)]
    pub hazardous: bool,
    #[n(10)]
    pub yard_location: String,
    #[n(11)]
    pub bill_of_lading: String,
    #[n(12)]
    pub appointment: Option<TimeStamp<Utc>>, // pickup (import) or delivery (export) slot
    #[n(13)]
    pub origin: Option<Location>,
    #[n(14)]
    pub destination: Option<Location>,
    #[n(15)]
    pub shipper: Option<String>,
    #[n(16)]
    pub blocked: bool, // recomputed from the event history only
}

fn non_blank(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

impl ContainerDetails {
    /// Construct a new builder object, this becomes the basis for a draft
    pub fn new() -> Self {
        Self::default()
    }
    pub fn set_code(mut self, code: &str) -> Self {
        self.code = non_blank(code);
        self
    }
    pub fn set_vessel_call(mut self, call_id: &str) -> Self {
        self.vessel_call = non_blank(call_id);
        self
    }
    pub fn set_forwarder(mut self, forwarder_id: &str) -> Self {
        self.forwarder = non_blank(forwarder_id);
        self
    }
    pub fn clear_forwarder(mut self) -> Self {
        self.forwarder = None;
        self
    }
    pub fn set_direction(mut self, direction: Direction) -> Self {
        self.direction = Some(direction);
        self
    }
    pub fn set_size_type(mut self, size_type: &str) -> Self {
        self.size_type = non_blank(size_type).map(|s| s.to_ascii_uppercase());
        self
    }
    pub fn set_gross_weight_kg(mut self, kg: u64) -> Self {
        self.gross_weight_kg = Some(kg);
        self
    }
    pub fn set_tare_weight_kg(mut self, kg: u64) -> Self {
        self.tare_weight_kg = Some(kg);
        self
    }
    pub fn set_seals(mut self, seal_string: &str) -> Self {
        self.seals = non_blank(seal_string);
        self
    }
    pub fn set_cargo(mut self, cargo: &str) -> Self {
        self.cargo = non_blank(cargo);
        self
    }
    pub fn set_hazardous(mut self, hazardous: bool) -> Self {
        self.hazardous = hazardous;
        self
    }
    pub fn set_yard_location(mut self, location: &str) -> Self {
        self.yard_location = non_blank(location);
        self
    }
    pub fn set_bill_of_lading(mut self, reference: &str) -> Self {
        self.bill_of_lading = non_blank(reference);
        self
    }
    pub fn set_appointment(mut self, at: TimeStamp<Utc>) -> Self {
        self.appointment = Some(at);
        self
    }
    pub fn set_origin(mut self, origin: Location) -> Self {
        self.origin = Some(origin);
        self
    }
    pub fn set_destination(mut self, destination: Location) -> Self {
        self.destination = Some(destination);
        self
    }
    pub fn set_shipper(mut self, shipper: &str) -> Self {
        self.shipper = non_blank(shipper);
        self
    }

    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }
    pub fn vessel_call(&self) -> Option<&str> {
        self.vessel_call.as_deref()
    }
    pub fn forwarder(&self) -> Option<&str> {
        self.forwarder.as_deref()
    }
    pub fn direction(&self) -> Option<Direction> {
        self.direction
    }

    /// Checks every field that can be checked without the store. Seal and
    /// identifier uniqueness, capacity and the forwarder reference are left
    /// to the service.
    pub fn validate_and_finalise(&self) -> Result<Container, ValidationError> {
        let code = self
            .code
            .as_deref()
            .ok_or(ValidationError::missing("code", "container identifier"))?;
        let code = iso6346::validate_identifier(code)?;

        let vessel_call = self
            .vessel_call
            .clone()
            .ok_or(ValidationError::missing(
                "vessel_call",
                "container must belong to a vessel call",
            ))?;
        let direction = self
            .direction
            .ok_or(ValidationError::missing("direction", "IMPORT or EXPORT"))?;
        let size_type = self
            .size_type
            .clone()
            .ok_or(ValidationError::missing("size_type", "size/type code such as 40HC"))?;
        let gross_weight_kg = self
            .gross_weight_kg
            .ok_or(ValidationError::missing("gross_weight_kg", "verified gross mass"))?;

        if let Some(tare) = self.tare_weight_kg {
            if gross_weight_kg < tare {
                return Err(ValidationError::invalid(
                    "gross_weight_kg",
                    format!("gross weight {gross_weight_kg} kg is below tare weight {tare} kg"),
                ));
            }
        }

        let seal_string = self
            .seals
            .as_deref()
            .ok_or(ValidationError::missing("seals", "at least one seal with a primary marker"))?;
        let seals = seals::parse(seal_string)?;

        let cargo = self
            .cargo
            .clone()
            .ok_or(ValidationError::missing("cargo", "declared cargo"))?;
        let yard_location = self
            .yard_location
            .clone()
            .ok_or(ValidationError::missing("yard_location", "current yard position"))?;
        let bill_of_lading = self
            .bill_of_lading
            .clone()
            .ok_or(ValidationError::missing("bill_of_lading", "bill of lading reference"))?;

        Ok(Container {
            code,
            vessel_call,
            forwarder: self.forwarder.clone(),
            direction,
            size_type,
            gross_weight_kg,
            tare_weight_kg: self.tare_weight_kg,
            seals: seals.encode(),
            cargo,
            hazardous: self.hazardous,
            yard_location,
            bill_of_lading,
            appointment: self.appointment,
            origin: self.origin.clone(),
            destination: self.destination.clone(),
            shipper: self.shipper.clone(),
            blocked: false,
        })
    }
}

impl From<&Container> for ContainerDetails {
    /// Start an edit from the stored record.
    fn from(container: &Container) -> Self {
        Self {
            code: Some(container.code.to_string()),
            vessel_call: Some(container.vessel_call.clone()),
            forwarder: container.forwarder.clone(),
            direction: Some(container.direction),
            size_type: Some(container.size_type.clone()),
            gross_weight_kg: Some(container.gross_weight_kg),
            tare_weight_kg: container.tare_weight_kg,
            seals: Some(container.seals.clone()),
            cargo: Some(container.cargo.clone()),
            hazardous: container.hazardous,
            yard_location: Some(container.yard_location.clone()),
            bill_of_lading: Some(container.bill_of_lading.clone()),
            appointment: container.appointment,
            origin: container.origin.clone(),
            destination: container.destination.clone(),
            shipper: container.shipper.clone(),
        }
    }
}

impl Container {
    pub fn seal_set(&self) -> Result<SealSet, FormatError> {
        seals::parse(&self.seals)
    }

    pub fn primary_seal(&self) -> Option<String> {
        seals::primary(&self.seals)
    }

    /// `origin → destination`, with `?` for an unknown end.
    pub fn route_summary(&self) -> String {
        let end = |location: &Option<Location>| {
            location
                .as_ref()
                .filter(|l| !l.is_empty())
                .map(|l| l.to_string())
                .unwrap_or_else(|| "?".to_string())
        };
        format!("{} → {}", end(&self.origin), end(&self.destination))
    }

    /// Net cargo weight when the tare is known.
    pub fn net_weight_kg(&self) -> Option<u64> {
        self.tare_weight_kg
            .map(|tare| self.gross_weight_kg.saturating_sub(tare))
    }

    pub fn build(&self) -> anyhow::Result<Vec<u8>> {
        Ok(minicbor::to_vec(self)?)
    }
}
