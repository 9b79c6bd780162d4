//! The three back-office approvals attached to a container and the release
//! gate combining them.
//!
//! Each approval is optional and 1:1 with its container. Drafts are built
//! with `set_*` methods and checked by a consuming `finalise`, which applies
//! the conditional mandatory fields of the approval's state:
//!
//! | approval          | state                      | mandatory                         |
//! |-------------------|----------------------------|-----------------------------------|
//! | customs           | approved                   | release date, document            |
//! | customs           | rejected                   | remarks (release date cleared)    |
//! | financial         | `PAID`                     | payment date, document            |
//! | financial         | any other status           | (payment date cleared)            |
//! | forwarder payment | always                     | amount, payment date, document    |

use std::sync::LazyLock;

use chrono::Utc;
use regex::Regex;

use super::config::TrackingConfig;
use super::time::{CalendarDate, TimeStamp};
use crate::error::{FormatError, ValidationError};

static DISPATCH_NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d{3}-\d{4}-\d{2}-\d{6}(-\d{2})?$").expect("dispatch number pattern")
});

static INVOICE_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[FB]\d{3}-\d{8}$").expect("invoice number pattern"));

/// Reference to an uploaded file; the file itself lives outside this crate.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct DocumentRef {
    #[n(0)]
    pub file_name: String,
    #[n(1)]
    pub size_bytes: u64,
}

impl DocumentRef {
    pub fn new(file_name: &str, size_bytes: u64) -> Self {
        Self {
            file_name: file_name.trim().to_string(),
            size_bytes,
        }
    }

    pub fn extension(&self) -> Option<String> {
        self.file_name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
    }

    pub fn validate(&self, config: &TrackingConfig) -> Result<(), FormatError> {
        let allowed = self
            .extension()
            .is_some_and(|ext| config.document_extensions.contains(&ext));
        if !allowed {
            return Err(FormatError::DocumentExtension {
                file_name: self.file_name.clone(),
                allowed: config.document_extensions.clone(),
            });
        }

        if self.size_bytes > config.max_document_bytes {
            return Err(FormatError::DocumentSize {
                file_name: self.file_name.clone(),
                size_bytes: self.size_bytes,
                max_bytes: config.max_document_bytes,
            });
        }

        Ok(())
    }
}

pub fn validate_dispatch_number(value: &str) -> Result<String, FormatError> {
    let value = value.trim();
    if !DISPATCH_NUMBER.is_match(value) {
        return Err(FormatError::DispatchNumber {
            value: value.to_string(),
        });
    }
    Ok(value.to_string())
}

pub fn validate_invoice_number(value: &str) -> Result<String, FormatError> {
    let value = value.trim().to_ascii_uppercase();
    if !INVOICE_NUMBER.is_match(&value) {
        return Err(FormatError::InvoiceNumber { value });
    }
    Ok(value)
}

/// Customs clearance of a container.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct CustomsApproval {
    #[n(0)]
    pub container: String,
    #[n(1)]
    pub dispatch_number: String,
    #[n(2)]
    pub review_date: Option<TimeStamp<Utc>>,
    #[n(3)]
    pub approved: bool,
    #[n(4)]
    pub release_date: Option<TimeStamp<Utc>>, // container may leave from this moment
    #[n(5)]
    pub document: Option<DocumentRef>,
    #[n(6)]
    pub remarks: String,
}

impl CustomsApproval {
    pub fn new(container: &str, dispatch_number: &str) -> Self {
        Self {
            container: container.trim().to_ascii_uppercase(),
            dispatch_number: dispatch_number.trim().to_string(),
            review_date: None,
            approved: false,
            release_date: None,
            document: None,
            remarks: String::new(),
        }
    }
    pub fn set_review_date(mut self, at: TimeStamp<Utc>) -> Self {
        self.review_date = Some(at);
        self
    }
    pub fn set_approved(mut self, approved: bool) -> Self {
        self.approved = approved;
        self
    }
    pub fn set_release_date(mut self, at: TimeStamp<Utc>) -> Self {
        self.release_date = Some(at);
        self
    }
    pub fn set_document(mut self, document: DocumentRef) -> Self {
        self.document = Some(document);
        self
    }
    pub fn set_remarks(mut self, remarks: &str) -> Self {
        self.remarks = remarks.trim().to_string();
        self
    }

    pub fn is_released(&self) -> bool {
        self.approved && self.release_date.is_some()
    }

    /// `arrival` is the vessel call's actual arrival, or its ETA when the
    /// vessel has not arrived.
    pub fn finalise(
        mut self,
        arrival: TimeStamp<Utc>,
        now: TimeStamp<Utc>,
        config: &TrackingConfig,
    ) -> Result<Self, ValidationError> {
        self.dispatch_number = validate_dispatch_number(&self.dispatch_number)?;

        let review_date = self
            .review_date
            .ok_or(ValidationError::missing("review_date", "customs review date"))?;
        if review_date > now {
            return Err(ValidationError::invalid(
                "review_date",
                format!("{review_date} is in the future"),
            ));
        }

        if !self.approved {
            if self.remarks.is_empty() {
                return Err(ValidationError::missing(
                    "remarks",
                    "a rejected dispatch must state the reason",
                ));
            }
            self.release_date = None;
            if let Some(document) = &self.document {
                document.validate(config)?;
            }
            return Ok(self);
        }

        let release_date = self.release_date.ok_or(ValidationError::missing(
            "release_date",
            "an approved dispatch must carry a release date",
        ))?;
        let document = self.document.as_ref().ok_or(ValidationError::missing(
            "document",
            "an approved dispatch must attach the customs document",
        ))?;
        document.validate(config)?;

        if release_date < review_date {
            return Err(ValidationError::invalid(
                "release_date",
                format!("{release_date} is earlier than review date {review_date}"),
            ));
        }
        if release_date < arrival {
            return Err(ValidationError::invalid(
                "release_date",
                format!("{release_date} is earlier than vessel arrival {arrival}"),
            ));
        }

        Ok(self)
    }
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinancialStatus {
    #[n(0)]
    Pending,
    #[n(1)]
    Paid,
    #[n(2)]
    CreditApproved,
    #[n(3)]
    Void,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum BilledService {
    #[n(0)]
    Discharge,
    #[n(1)]
    Loading,
    #[n(2)]
    Storage,
    #[n(3)]
    Handling,
    #[n(4)]
    Reefer,
    #[n(5)]
    Inspection,
    #[n(6)]
    Weighing,
    #[n(7)]
    Documentation,
}

impl BilledService {
    pub const ALL: [BilledService; 8] = [
        BilledService::Discharge,
        BilledService::Loading,
        BilledService::Storage,
        BilledService::Handling,
        BilledService::Reefer,
        BilledService::Inspection,
        BilledService::Weighing,
        BilledService::Documentation,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            BilledService::Discharge => "DISCHARGE",
            BilledService::Loading => "LOADING",
            BilledService::Storage => "STORAGE",
            BilledService::Handling => "HANDLING",
            BilledService::Reefer => "REEFER",
            BilledService::Inspection => "INSPECTION",
            BilledService::Weighing => "WEIGHING",
            BilledService::Documentation => "DOCUMENTATION",
        }
    }
}

impl std::str::FromStr for BilledService {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.trim().to_ascii_uppercase();
        BilledService::ALL
            .into_iter()
            .find(|service| service.code() == code)
            .ok_or(ValidationError::invalid(
                "billed_services",
                format!("'{code}' is not in the service catalog"),
            ))
    }
}

/// Invoice issued to the customer for the container's services.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct FinancialApproval {
    #[n(0)]
    pub container: String,
    #[n(1)]
    pub invoice_number: String,
    #[n(2)]
    pub amount: u64, // USD cents
    #[n(3)]
    pub billed_services: Vec<BilledService>,
    #[n(4)]
    pub issue_date: CalendarDate,
    #[n(5)]
    pub due_date: Option<CalendarDate>,
    #[n(6)]
    pub payment_date: Option<CalendarDate>,
    #[n(7)]
    pub status: FinancialStatus,
    #[n(8)]
    pub document: Option<DocumentRef>,
    #[n(9)]
    pub remarks: String,
}

impl FinancialApproval {
    pub fn new(
        container: &str,
        invoice_number: &str,
        amount: u64,
        issue_date: CalendarDate,
    ) -> Self {
        Self {
            container: container.trim().to_ascii_uppercase(),
            invoice_number: invoice_number.trim().to_string(),
            amount,
            billed_services: vec![],
            issue_date,
            due_date: None,
            payment_date: None,
            status: FinancialStatus::Pending,
            document: None,
            remarks: String::new(),
        }
    }
    pub fn add_service(mut self, service: BilledService) -> Self {
        if !self.billed_services.contains(&service) {
            self.billed_services.push(service);
        }
        self
    }
    pub fn set_due_date(mut self, date: CalendarDate) -> Self {
        self.due_date = Some(date);
        self
    }
    pub fn set_payment_date(mut self, date: CalendarDate) -> Self {
        self.payment_date = Some(date);
        self
    }
    pub fn set_status(mut self, status: FinancialStatus) -> Self {
        self.status = status;
        self
    }
    pub fn set_document(mut self, document: DocumentRef) -> Self {
        self.document = Some(document);
        self
    }
    pub fn set_remarks(mut self, remarks: &str) -> Self {
        self.remarks = remarks.trim().to_string();
        self
    }

    pub fn allows_release(&self) -> bool {
        matches!(
            self.status,
            FinancialStatus::Paid | FinancialStatus::CreditApproved
        )
    }

    pub fn is_overdue(&self, today: CalendarDate) -> bool {
        self.payment_date.is_none() && self.due_date.is_some_and(|due| due < today)
    }

    pub fn finalise(mut self, config: &TrackingConfig) -> Result<Self, ValidationError> {
        self.invoice_number = validate_invoice_number(&self.invoice_number)?;

        if self.billed_services.is_empty() {
            return Err(ValidationError::missing(
                "billed_services",
                "at least one service from the catalog",
            ));
        }

        if let Some(due) = self.due_date {
            if due < self.issue_date {
                return Err(ValidationError::invalid(
                    "due_date",
                    format!("{due} is earlier than issue date {}", self.issue_date),
                ));
            }
        }

        if self.status == FinancialStatus::Paid {
            if self.payment_date.is_none() {
                return Err(ValidationError::missing(
                    "payment_date",
                    "a PAID invoice must carry the payment date",
                ));
            }
            if self.document.is_none() {
                return Err(ValidationError::missing(
                    "document",
                    "a PAID invoice must attach the invoice document",
                ));
            }
        } else {
            self.payment_date = None;
        }

        if let Some(document) = &self.document {
            document.validate(config)?;
        }

        Ok(self)
    }
}

/// Payment made by the forwarder to the terminal. Exists only once paid.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct ForwarderPayment {
    #[n(0)]
    pub container: String,
    #[n(1)]
    pub forwarder: Option<String>,
    #[n(2)]
    pub amount: Option<u64>, // USD cents
    #[n(3)]
    pub payment_date: Option<CalendarDate>,
    #[n(4)]
    pub document: Option<DocumentRef>,
    #[n(5)]
    pub remarks: String,
}

impl ForwarderPayment {
    pub fn new(container: &str) -> Self {
        Self {
            container: container.trim().to_ascii_uppercase(),
            forwarder: None,
            amount: None,
            payment_date: None,
            document: None,
            remarks: String::new(),
        }
    }
    pub fn set_forwarder(mut self, forwarder_id: &str) -> Self {
        self.forwarder = Some(forwarder_id.trim().to_string());
        self
    }
    pub fn set_amount(mut self, amount: u64) -> Self {
        self.amount = Some(amount);
        self
    }
    pub fn set_payment_date(mut self, date: CalendarDate) -> Self {
        self.payment_date = Some(date);
        self
    }
    pub fn set_document(mut self, document: DocumentRef) -> Self {
        self.document = Some(document);
        self
    }
    pub fn set_remarks(mut self, remarks: &str) -> Self {
        self.remarks = remarks.trim().to_string();
        self
    }

    /// `assigned` is the forwarder on the container record. An omitted
    /// forwarder defaults to it.
    pub fn finalise(
        mut self,
        assigned: Option<&str>,
        config: &TrackingConfig,
    ) -> Result<Self, ValidationError> {
        let assigned = assigned.ok_or(ValidationError::cross_reference(
            "forwarder",
            format!("container {} has no assigned forwarder", self.container),
        ))?;

        let paid_by = self
            .forwarder
            .get_or_insert_with(|| assigned.to_string());
        if paid_by.as_str() != assigned {
            return Err(ValidationError::cross_reference(
                "forwarder",
                format!(
                    "payment by {paid_by} but container {} is assigned to {assigned}",
                    self.container
                ),
            ));
        }

        if self.amount.is_none_or(|amount| amount == 0) {
            return Err(ValidationError::missing("amount", "amount paid by the forwarder"));
        }
        if self.payment_date.is_none() {
            return Err(ValidationError::missing("payment_date", "date of the payment"));
        }
        let document = self
            .document
            .as_ref()
            .ok_or(ValidationError::missing("document", "proof of payment"))?;
        document.validate(config)?;

        Ok(self)
    }
}

/// Why a container is not yet eligible for release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingApproval {
    CustomsMissing,
    CustomsNotReleased,
    FinancialMissing,
    FinancialUnsettled(FinancialStatus),
    ForwarderPaymentMissing,
}

impl std::fmt::Display for PendingApproval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PendingApproval::CustomsMissing => f.write_str("customs approval not recorded"),
            PendingApproval::CustomsNotReleased => {
                f.write_str("customs has not released the container")
            }
            PendingApproval::FinancialMissing => f.write_str("no invoice recorded"),
            PendingApproval::FinancialUnsettled(status) => {
                write!(f, "invoice is {status:?}, must be paid or on approved credit")
            }
            PendingApproval::ForwarderPaymentMissing => {
                f.write_str("forwarder payment not recorded")
            }
        }
    }
}

/// The approvals currently recorded for one container.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApprovalSet {
    pub customs: Option<CustomsApproval>,
    pub financial: Option<FinancialApproval>,
    pub forwarder_payment: Option<ForwarderPayment>,
}

impl ApprovalSet {
    pub fn is_empty(&self) -> bool {
        self.customs.is_none() && self.financial.is_none() && self.forwarder_payment.is_none()
    }

    pub fn release_eligible(&self) -> bool {
        self.pending().is_empty()
    }

    pub fn pending(&self) -> Vec<PendingApproval> {
        let mut pending = vec![];

        match &self.customs {
            None => pending.push(PendingApproval::CustomsMissing),
            Some(customs) if !customs.is_released() => {
                pending.push(PendingApproval::CustomsNotReleased)
            }
            Some(_) => {}
        }
        match &self.financial {
            None => pending.push(PendingApproval::FinancialMissing),
            Some(financial) if !financial.allows_release() => {
                pending.push(PendingApproval::FinancialUnsettled(financial.status))
            }
            Some(_) => {}
        }
        if self.forwarder_payment.is_none() {
            pending.push(PendingApproval::ForwarderPaymentMissing);
        }

        pending
    }
}
