use crate::error::FormatError;

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForwarderStatus {
    #[n(0)]
    Active,
    #[n(1)]
    Suspended,
    #[n(2)]
    Blocked,
}

/// Freight forwarder acting for the consignee.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct Forwarder {
    #[n(0)]
    pub id: String, // bech32 encoded uuid7, assigned on registration
    #[n(1)]
    pub legal_name: String,
    #[n(2)]
    pub tax_id: String,
    #[n(3)]
    pub status: ForwarderStatus,
}

impl Forwarder {
    pub fn new(legal_name: &str, tax_id: &str) -> Result<Self, FormatError> {
        let tax_id = tax_id.trim();
        if tax_id.len() != 11 || !tax_id.bytes().all(|b| b.is_ascii_digit()) {
            return Err(FormatError::TaxId {
                value: tax_id.to_string(),
            });
        }

        Ok(Self {
            id: String::new(),
            legal_name: legal_name.trim().to_string(),
            tax_id: tax_id.to_string(),
            status: ForwarderStatus::Active,
        })
    }

    pub fn set_status(mut self, status: ForwarderStatus) -> Self {
        self.status = status;
        self
    }

    pub fn is_active(&self) -> bool {
        self.status == ForwarderStatus::Active
    }
}
