//! Admission control on the number of containers per vessel call and direction.
use crate::container::Direction;
use crate::error::ValidationError;
use crate::vessel::VesselCall;

/// Key of the counter tracking registered containers for `(call, direction)`.
pub fn counter_key(call_id: &str, direction: Direction) -> String {
    format!("{}/{}", call_id, direction.code())
}

pub fn decode_count(raw: Option<&[u8]>) -> u32 {
    raw.and_then(|bytes| <[u8; 4]>::try_from(bytes).ok())
        .map(u32::from_be_bytes)
        .unwrap_or(0)
}

pub fn encode_count(count: u32) -> [u8; 4] {
    count.to_be_bytes()
}

/// Fail when `current` containers (self excluded) already fill the declared
/// count for `direction`.
pub fn check(call: &VesselCall, direction: Direction, current: u32) -> Result<(), ValidationError> {
    let declared = call.declared_for(direction);
    if current >= declared {
        return Err(ValidationError::CapacityExceeded {
            call: call.id.clone(),
            direction,
            current,
            declared,
        });
    }
    Ok(())
}
