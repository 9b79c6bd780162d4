//! Seal registry encoding.
//!
//! A container carries one or more seals written as `TYPE:CODE` entries
//! separated by `|`. The primary seal is marked with a trailing `*`:
//!
//! ```text
//! CARRIER:HL123456*|CUSTOMS:AD4567
//! ```

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::FormatError;

static SEAL_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z0-9-]{4,}$").expect("seal code pattern"));

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SealType {
    #[n(0)]
    Carrier,
    #[n(1)]
    Customs,
    #[n(2)]
    Phytosanitary,
    #[n(3)]
    Exporter,
    #[n(4)]
    Other,
}

impl SealType {
    pub fn code(&self) -> &'static str {
        match self {
            SealType::Carrier => "CARRIER",
            SealType::Customs => "CUSTOMS",
            SealType::Phytosanitary => "PHYTOSANITARY",
            SealType::Exporter => "EXPORTER",
            SealType::Other => "OTHER",
        }
    }
}

impl std::str::FromStr for SealType {
    type Err = FormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "CARRIER" => Ok(SealType::Carrier),
            "CUSTOMS" => Ok(SealType::Customs),
            "PHYTOSANITARY" => Ok(SealType::Phytosanitary),
            "EXPORTER" => Ok(SealType::Exporter),
            "OTHER" => Ok(SealType::Other),
            _ => Err(FormatError::SealType {
                value: s.trim().to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Seal {
    pub kind: SealType,
    pub code: String,
    pub primary: bool,
}

/// A validated seal string: at least one seal, exactly one primary, no repeats.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealSet {
    seals: Vec<Seal>,
}

impl SealSet {
    pub fn seals(&self) -> &[Seal] {
        &self.seals
    }
    pub fn primary(&self) -> &Seal {
        // parse guarantees exactly one
        self.seals
            .iter()
            .find(|seal| seal.primary)
            .unwrap_or(&self.seals[0])
    }
    pub fn codes(&self) -> BTreeSet<String> {
        self.seals.iter().map(|seal| seal.code.clone()).collect()
    }
    pub fn len(&self) -> usize {
        self.seals.len()
    }
    pub fn is_empty(&self) -> bool {
        self.seals.is_empty()
    }
    /// Canonical `TYPE:CODE[*]|...` form with sanitized codes.
    pub fn encode(&self) -> String {
        self.seals
            .iter()
            .map(|seal| {
                let marker = if seal.primary { "*" } else { "" };
                format!("{}:{}{}", seal.kind.code(), seal.code, marker)
            })
            .collect::<Vec<_>>()
            .join("|")
    }
}

impl std::str::FromStr for SealSet {
    type Err = FormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse(s)
    }
}

/// Trim, uppercase and drop any internal whitespace.
pub fn sanitize_code(code: &str) -> String {
    code.chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_ascii_uppercase()
}

/// Parse and validate a seal string.
pub fn parse(seal_string: &str) -> Result<SealSet, FormatError> {
    let mut seals: Vec<Seal> = Vec::new();

    for entry in entries(seal_string) {
        let seal = parse_entry(entry)?;
        if seals.iter().any(|seen| seen.code == seal.code) {
            return Err(FormatError::RepeatedSeal { code: seal.code });
        }
        seals.push(seal);
    }

    if seals.is_empty() {
        return Err(FormatError::NoSeals);
    }

    let primaries = seals.iter().filter(|seal| seal.primary).count();
    if primaries != 1 {
        return Err(FormatError::PrimarySeal { found: primaries });
    }

    Ok(SealSet { seals })
}

pub fn validate_seals(seal_string: &str) -> Result<(), FormatError> {
    parse(seal_string).map(|_| ())
}

/// Codes of every well-formed entry; malformed entries are skipped.
pub fn extract(seal_string: &str) -> BTreeSet<String> {
    entries(seal_string)
        .filter_map(|entry| parse_entry(entry).ok())
        .map(|seal| seal.code)
        .collect()
}

/// Code of the first well-formed entry marked primary.
pub fn primary(seal_string: &str) -> Option<String> {
    entries(seal_string)
        .filter_map(|entry| parse_entry(entry).ok())
        .find(|seal| seal.primary)
        .map(|seal| seal.code)
}

fn entries(seal_string: &str) -> impl Iterator<Item = &str> {
    seal_string
        .split('|')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
}

fn parse_entry(entry: &str) -> Result<Seal, FormatError> {
    let (kind, code) = entry
        .split_once(':')
        .ok_or_else(|| FormatError::SealEntry {
            entry: entry.to_string(),
        })?;

    let kind: SealType = kind.parse()?;

    let code = code.trim();
    let (code, primary) = match code.strip_suffix('*') {
        Some(code) => (code, true),
        None => (code, false),
    };

    let code = sanitize_code(code);
    if !SEAL_CODE.is_match(&code) {
        return Err(FormatError::SealCode { code });
    }

    Ok(Seal {
        kind,
        code,
        primary,
    })
}
