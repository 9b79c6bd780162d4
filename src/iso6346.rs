//! ISO 6346 container identifiers.
//!
//! A container code is a 3-letter owner prefix, a 1-letter equipment
//! category, a 6-digit serial number and a check digit, e.g. `MSKU9070323`.
//! The check digit is the weighted sum of the first ten characters mod 11,
//! with a remainder of 10 written as 0.

use crate::error::FormatError;

/// Equipment category letters accepted in the 4th position.
pub const EQUIPMENT_CATEGORIES: [char; 3] = ['U', 'J', 'Z'];

// A=10 upward, skipping multiples of 11
const LETTER_VALUES: [u32; 26] = [
    10, 12, 13, 14, 15, 16, 17, 18, 19, 20, 21, 23, 24, 25, 26, 27, 28, 29, 30, 31, 32, 34, 35, 36,
    37, 38,
];

/// A checksum-verified container code.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ContainerCode(String);

impl ContainerCode {
    pub fn as_str(&self) -> &str {
        &self.0
    }
    /// Owner code including equipment category, e.g. `MSKU`.
    pub fn owner(&self) -> &str {
        &self.0[..4]
    }
    pub fn serial(&self) -> &str {
        &self.0[4..10]
    }
    pub fn check_digit(&self) -> u8 {
        self.0.as_bytes()[10] - b'0'
    }
}

impl std::fmt::Display for ContainerCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for ContainerCode {
    type Err = FormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        validate_identifier(s)
    }
}

impl AsRef<str> for ContainerCode {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl<C> minicbor::Encode<C> for ContainerCode {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        e.str(&self.0)?.ok()
    }
}

impl<'b, C> minicbor::Decode<'b, C> for ContainerCode {
    fn decode(d: &mut minicbor::Decoder<'b>, _: &mut C) -> Result<Self, minicbor::decode::Error> {
        let code = d.str()?;

        validate_identifier(code)
            .map_err(|_| minicbor::decode::Error::message("stored container code fails ISO 6346"))
    }
}

/// Validate a container code. Surrounding whitespace is trimmed and letters
/// are uppercased before checking.
pub fn validate_identifier(identifier: &str) -> Result<ContainerCode, FormatError> {
    let value = identifier.trim().to_ascii_uppercase();
    let bytes = value.as_bytes();

    let well_formed = bytes.len() == 11
        && bytes[..4].iter().all(u8::is_ascii_uppercase)
        && bytes[4..].iter().all(u8::is_ascii_digit);
    if !well_formed {
        return Err(FormatError::IdentifierPattern { value });
    }

    let category = bytes[3] as char;
    if !EQUIPMENT_CATEGORIES.contains(&category) {
        return Err(FormatError::EquipmentCategory {
            value,
            found: category,
        });
    }

    let expected = weighted_check_digit(&bytes[..10]);
    let provided = bytes[10] - b'0';
    if expected != provided {
        return Err(FormatError::CheckDigit {
            value,
            expected,
            provided,
        });
    }

    Ok(ContainerCode(value))
}

/// Check digit for a 4-letter owner code (category included) and 6-digit serial.
pub fn compute_check_digit(owner: &str, serial: &str) -> Result<u8, FormatError> {
    let owner = owner.trim().to_ascii_uppercase();
    let owner_ok = owner.len() == 4
        && owner.bytes().all(|b| b.is_ascii_uppercase())
        && owner.ends_with(EQUIPMENT_CATEGORIES);
    if !owner_ok {
        return Err(FormatError::OwnerCode { value: owner });
    }

    let serial = serial.trim();
    if serial.len() != 6 || !serial.bytes().all(|b| b.is_ascii_digit()) {
        return Err(FormatError::SerialNumber {
            value: serial.to_string(),
        });
    }

    let mut prefix = owner.into_bytes();
    prefix.extend_from_slice(serial.as_bytes());
    Ok(weighted_check_digit(&prefix))
}

/// Build a full container code from owner code and serial.
pub fn generate_identifier(owner: &str, serial: &str) -> Result<ContainerCode, FormatError> {
    let digit = compute_check_digit(owner, serial)?;
    validate_identifier(&format!("{}{}{}", owner.trim(), serial.trim(), digit))
}

// caller guarantees 4 uppercase letters then 6 digits
fn weighted_check_digit(prefix: &[u8]) -> u8 {
    let sum: u32 = prefix
        .iter()
        .enumerate()
        .map(|(position, &ch)| {
            let value = if ch.is_ascii_uppercase() {
                LETTER_VALUES[(ch - b'A') as usize]
            } else {
                (ch - b'0') as u32
            };
            value << position
        })
        .sum();

    ((sum % 11) % 10) as u8
}
