//! End-to-end scenarios against a real sled database.
//!
//! Each test opens its own database in a temporary directory. Sled holds a
//! file lock per database, so tests must not share one.

use std::sync::Arc;

use anyhow::Context;
use container_tracking::{
    approval::{
        BilledService, CustomsApproval, DocumentRef, FinancialApproval, FinancialStatus,
        ForwarderPayment, PendingApproval,
    },
    config::TrackingConfig,
    container::{ContainerDetails, Direction},
    event::{ContainerEvent, EventType, Location, TransportMode},
    forwarder::{Forwarder, ForwarderStatus},
    service::TrackingService,
    time::{CalendarDate, FixedClock, TimeStamp},
    vessel::{CallStatus, OperationKind, VesselCall, VesselRef},
    SequenceError, StoreError, ValidationError,
};
use tempfile::{tempdir, TempDir};

const IMO: &str = "9839430";

fn open_service(name: &str) -> anyhow::Result<(TempDir, TrackingService)> {
    let temp_dir = tempdir()?;
    let db = sled::open(temp_dir.path().join(name))?;
    let service = TrackingService::new(Arc::new(db))?
        .with_clock(FixedClock(TimeStamp::new_with(2025, 6, 1, 12, 0, 0)));

    // keep the directory alive for as long as the service
    Ok((temp_dir, service))
}

fn discharge_call(service: &TrackingService, declared: u32) -> anyhow::Result<VesselCall> {
    let vessel = VesselRef::new("MSC Gulsun", IMO)?;
    let mut call = VesselCall::new(
        vessel,
        TimeStamp::new_with(2025, 5, 20, 6, 0, 0),
        OperationKind::Discharge,
        declared,
    )
    .set_berth("MUELLE-2")
    .set_etd(TimeStamp::new_with(2025, 5, 23, 18, 0, 0));
    call.status = CallStatus::Berthed;
    call.actual_arrival = Some(TimeStamp::new_with(2025, 5, 21, 7, 30, 0));

    service.register_vessel_call(call)
}

fn draft(code: &str, call: &VesselCall, seals: &str) -> ContainerDetails {
    ContainerDetails::new()
        .set_code(code)
        .set_vessel_call(&call.id)
        .set_direction(Direction::Import)
        .set_size_type("40HC")
        .set_gross_weight_kg(26_500)
        .set_tare_weight_kg(3_900)
        .set_seals(seals)
        .set_cargo("Frozen squid")
        .set_yard_location("R-04-12")
        .set_bill_of_lading("MEDUFN123456")
        .set_origin(Location::new("Port of Busan", Some("Busan"), "KR"))
        .set_destination(Location::new("Terminal Norte", Some("Callao"), "PE"))
}

fn event(code: &str, kind: EventType, day: u32) -> ContainerEvent {
    let event = ContainerEvent::new(code, kind, TimeStamp::new_with(2025, 5, day, 10, 0, 0));
    if kind.is_maritime() {
        event.set_vessel(IMO).set_voyage("FX518W")
    } else {
        event
    }
}

fn validation_error(err: &anyhow::Error) -> &ValidationError {
    err.downcast_ref::<ValidationError>()
        .unwrap_or_else(|| panic!("expected a validation error, got: {err:#}"))
}

/// A call declaring two discharge containers admits exactly two imports.
#[test]
fn capacity_is_enforced_per_call_and_direction() -> anyhow::Result<()> {
    let (_dir, service) = open_service("capacity.db")?;
    let call = discharge_call(&service, 2)?;

    service.register_container(draft("MSKU9070323", &call, "CARRIER:ML100001*"))?;
    service.register_container(draft("CSQU3054383", &call, "CARRIER:ML100002*"))?;

    let err = service
        .register_container(draft("HLXU8142385", &call, "CARRIER:ML100003*"))
        .unwrap_err();
    assert_eq!(
        validation_error(&err),
        &ValidationError::CapacityExceeded {
            call: call.id.clone(),
            direction: Direction::Import,
            current: 2,
            declared: 2,
        }
    );

    // rejected registration leaves nothing behind
    assert!(service.get_container("HLXU8142385").is_err());
    assert_eq!(service.manifest(&call.id)?.len(), 2);

    // an export on a discharge call has no declared room at all
    let err = service
        .register_container(
            draft("HLXU8142385", &call, "CARRIER:ML100003*").set_direction(Direction::Export),
        )
        .unwrap_err();
    assert!(matches!(
        validation_error(&err),
        ValidationError::CapacityExceeded { declared: 0, .. }
    ));

    Ok(())
}

/// Deleting a container frees its capacity slot and seal codes.
#[test]
fn deletion_releases_capacity_and_seals() -> anyhow::Result<()> {
    let (_dir, service) = open_service("delete.db")?;
    let call = discharge_call(&service, 1)?;

    service.register_container(draft("MSKU9070323", &call, "CARRIER:ML100001*"))?;
    service.delete_container("MSKU9070323")?;

    service
        .register_container(draft("CSQU3054383", &call, "CARRIER:ML100001*"))
        .context("slot and seal should be free again")?;
    assert_eq!(service.manifest(&call.id)?[0].code.as_str(), "CSQU3054383");

    Ok(())
}

/// The full import lifecycle ends in "Gate Out Full".
#[test]
fn import_lifecycle_end_to_end() -> anyhow::Result<()> {
    let (_dir, service) = open_service("lifecycle.db")?;
    let call = discharge_call(&service, 2)?;
    service.register_container(draft("MSKU9070323", &call, "CARRIER:ML100001*"))?;

    assert_eq!(service.current_status("MSKU9070323")?, "No movement");

    let sequence = [
        (EventType::GateInFull, 1),
        (EventType::Loaded, 2),
        (EventType::Departed, 3),
        (EventType::InTransit, 10),
        (EventType::Arrived, 21),
        (EventType::Discharged, 22),
        (EventType::GateOutFull, 25),
    ];
    for (kind, day) in sequence {
        service
            .submit_event(event("MSKU9070323", kind, day))
            .with_context(|| format!("{kind:?} should be accepted"))?;
    }

    assert_eq!(service.current_status("MSKU9070323")?, "Gate Out Full");
    assert!(!service.is_blocked("MSKU9070323")?);

    let timeline = service.timeline("MSKU9070323")?;
    assert_eq!(timeline.len(), 7);
    assert_eq!(timeline[0].kind, EventType::GateInFull);

    // gate moves are road moves with no vessel
    let gate_out = &timeline[6];
    assert_eq!(gate_out.transport_mode, Some(TransportMode::Truck));
    assert_eq!(gate_out.vessel, None);

    Ok(())
}

/// ARRIVED cannot be recorded before the container has departed.
#[test]
fn arrival_before_departure_is_rejected() -> anyhow::Result<()> {
    let (_dir, service) = open_service("arrival.db")?;
    let call = discharge_call(&service, 1)?;
    service.register_container(draft("MSKU9070323", &call, "CARRIER:ML100001*"))?;

    service.submit_event(event("MSKU9070323", EventType::GateInFull, 1))?;
    service.submit_event(event("MSKU9070323", EventType::Loaded, 2))?;

    let err = service
        .submit_event(event("MSKU9070323", EventType::Arrived, 3))
        .unwrap_err();
    assert!(matches!(
        validation_error(&err),
        ValidationError::Sequence(SequenceError::MissingPrerequisite {
            event: EventType::Arrived,
            ..
        })
    ));

    // nothing was stored
    assert_eq!(service.current_status("MSKU9070323")?, "Loaded");
    assert_eq!(service.timeline("MSKU9070323")?.len(), 2);

    Ok(())
}

/// Maritime events need a vessel reference.
#[test]
fn maritime_event_without_vessel_is_rejected() -> anyhow::Result<()> {
    let (_dir, service) = open_service("vessel.db")?;
    let call = discharge_call(&service, 1)?;
    service.register_container(draft("MSKU9070323", &call, "CARRIER:ML100001*"))?;
    service.submit_event(event("MSKU9070323", EventType::GateInFull, 1))?;

    let bare = ContainerEvent::new(
        "MSKU9070323",
        EventType::Loaded,
        TimeStamp::new_with(2025, 5, 2, 0, 0, 0),
    );
    let err = service.submit_event(bare).unwrap_err();
    assert!(matches!(
        validation_error(&err),
        ValidationError::CrossReference { field: "vessel", .. }
    ));

    Ok(())
}

/// Holds block the container and only a customs release lifts them.
#[test]
fn blocked_flag_follows_holds_and_releases() -> anyhow::Result<()> {
    let (_dir, service) = open_service("blocked.db")?;
    let call = discharge_call(&service, 1)?;
    service.register_container(draft("MSKU9070323", &call, "CARRIER:ML100001*"))?;

    service.submit_event(event("MSKU9070323", EventType::CustomsHold, 1))?;
    assert!(service.is_blocked("MSKU9070323")?);

    service.submit_event(event("MSKU9070323", EventType::CustomsReleased, 2))?;
    assert!(!service.is_blocked("MSKU9070323")?);

    service.submit_event(event("MSKU9070323", EventType::Damaged, 3))?;
    assert!(service.is_blocked("MSKU9070323")?);

    // edits never touch the flag
    let edited = service.update_container(
        "MSKU9070323",
        draft("MSKU9070323", &call, "CARRIER:ML100001*").set_yard_location("X-01-01"),
    )?;
    assert!(edited.blocked);

    Ok(())
}

/// A seal code already used on another container is a named conflict.
#[test]
fn seal_codes_are_unique_across_containers() -> anyhow::Result<()> {
    let (_dir, service) = open_service("seals.db")?;
    let call = discharge_call(&service, 3)?;
    service.register_container(draft(
        "MSKU9070323",
        &call,
        "CARRIER:ML100001*|CUSTOMS:AD-5501",
    ))?;

    // codes are compared after sanitizing
    let err = service
        .register_container(draft("CSQU3054383", &call, "CARRIER:ML100002*|customs: ad-5501"))
        .unwrap_err();
    assert_eq!(
        validation_error(&err),
        &ValidationError::UniquenessConflict {
            field: "seal",
            value: "AD-5501".to_string(),
            conflicting: "MSKU9070323".to_string(),
        }
    );

    // re-saving the owner with its own seals is fine
    service.update_container(
        "MSKU9070323",
        draft("MSKU9070323", &call, "CARRIER:ML100001*|CUSTOMS:AD-5501"),
    )?;

    // dropping a seal on edit frees the code
    service.update_container("MSKU9070323", draft("MSKU9070323", &call, "CARRIER:ML100001*"))?;
    service.register_container(draft("CSQU3054383", &call, "CARRIER:ML100002*|CUSTOMS:AD-5501"))?;

    Ok(())
}

/// The same identifier cannot be registered twice.
#[test]
fn identifier_is_unique() -> anyhow::Result<()> {
    let (_dir, service) = open_service("identifier.db")?;
    let call = discharge_call(&service, 3)?;
    service.register_container(draft("MSKU9070323", &call, "CARRIER:ML100001*"))?;

    let err = service
        .register_container(draft("msku9070323", &call, "CARRIER:ML100009*"))
        .unwrap_err();
    assert!(matches!(
        validation_error(&err),
        ValidationError::UniquenessConflict { field: "code", .. }
    ));

    let err = service
        .register_container(draft("MSKU9070322", &call, "CARRIER:ML100009*"))
        .unwrap_err();
    assert!(err.to_string().contains("check digit"));

    Ok(())
}

/// Structural fields cannot be edited.
#[test]
fn direction_is_fixed_after_registration() -> anyhow::Result<()> {
    let (_dir, service) = open_service("immutable.db")?;
    let call = discharge_call(&service, 1)?;
    service.register_container(draft("MSKU9070323", &call, "CARRIER:ML100001*"))?;

    let err = service
        .update_container(
            "MSKU9070323",
            draft("MSKU9070323", &call, "CARRIER:ML100001*").set_direction(Direction::Export),
        )
        .unwrap_err();
    assert!(matches!(
        validation_error(&err),
        ValidationError::InvalidValue { field: "direction", .. }
    ));

    Ok(())
}

fn pdf(name: &str) -> DocumentRef {
    DocumentRef::new(name, 240_000)
}

fn approved_customs(code: &str) -> CustomsApproval {
    CustomsApproval::new(code, "118-2025-10-004512")
        .set_review_date(TimeStamp::new_with(2025, 5, 26, 9, 0, 0))
        .set_approved(true)
        .set_release_date(TimeStamp::new_with(2025, 5, 27, 9, 0, 0))
        .set_document(pdf("levante.pdf"))
}

fn invoice(code: &str, number: &str, status: FinancialStatus) -> FinancialApproval {
    let invoice = FinancialApproval::new(code, number, 185_000, CalendarDate::new_with(2025, 5, 22))
        .add_service(BilledService::Discharge)
        .add_service(BilledService::Storage)
        .set_due_date(CalendarDate::new_with(2025, 6, 5))
        .set_status(status);

    if status == FinancialStatus::Paid {
        invoice
            .set_payment_date(CalendarDate::new_with(2025, 5, 28))
            .set_document(pdf("factura.pdf"))
    } else {
        invoice
    }
}

fn payment(code: &str) -> ForwarderPayment {
    ForwarderPayment::new(code)
        .set_amount(40_000)
        .set_payment_date(CalendarDate::new_with(2025, 5, 29))
        .set_document(pdf("voucher.png"))
}

/// All three approvals together make a container release eligible and
/// unlock the gate pass.
#[test]
fn approvals_unlock_gate_pass() -> anyhow::Result<()> {
    let (_dir, service) = open_service("gate_pass.db")?;
    let call = discharge_call(&service, 1)?;
    let forwarder = service.register_forwarder(Forwarder::new("Andes Cargo SAC", "20512345678")?)?;
    service.register_container(
        draft("MSKU9070323", &call, "CARRIER:ML100001*|CUSTOMS:AD5501")
            .set_forwarder(&forwarder.id),
    )?;

    assert_eq!(
        service.pending_approvals("MSKU9070323")?,
        vec![
            PendingApproval::CustomsMissing,
            PendingApproval::FinancialMissing,
            PendingApproval::ForwarderPaymentMissing,
        ]
    );

    service.record_customs_approval(approved_customs("MSKU9070323"))?;
    service.record_financial_approval(invoice(
        "MSKU9070323",
        "F001-00004512",
        FinancialStatus::Pending,
    ))?;
    assert_eq!(
        service.pending_approvals("MSKU9070323")?,
        vec![
            PendingApproval::FinancialUnsettled(FinancialStatus::Pending),
            PendingApproval::ForwarderPaymentMissing,
        ]
    );

    service.record_financial_approval(invoice(
        "MSKU9070323",
        "F001-00004512",
        FinancialStatus::Paid,
    ))?;
    let recorded = service.record_forwarder_payment(payment("MSKU9070323"))?;
    assert_eq!(recorded.forwarder.as_deref(), Some(forwarder.id.as_str()));

    assert!(service.release_eligible("MSKU9070323")?);

    let pass = service.issue_gate_pass("MSKU9070323")?;
    assert_eq!(pass.primary_seal, "ML100001");
    assert_eq!(pass.vessel_name, "MSC Gulsun");
    assert_eq!(pass.forwarder, Some(forwarder.id));
    assert_eq!(pass.route, "Port of Busan, Busan, KR → Terminal Norte, Callao, PE");

    Ok(())
}

/// A blocked container gets no gate pass even when fully approved.
#[test]
fn blocked_container_is_refused_gate_pass() -> anyhow::Result<()> {
    let (_dir, service) = open_service("refused.db")?;
    let call = discharge_call(&service, 1)?;
    let forwarder = service.register_forwarder(Forwarder::new("Andes Cargo SAC", "20512345678")?)?;
    service.register_container(
        draft("MSKU9070323", &call, "CARRIER:ML100001*").set_forwarder(&forwarder.id),
    )?;
    service.record_customs_approval(approved_customs("MSKU9070323"))?;
    service.record_financial_approval(invoice(
        "MSKU9070323",
        "B002-00000077",
        FinancialStatus::CreditApproved,
    ))?;
    service.record_forwarder_payment(payment("MSKU9070323"))?;

    service.submit_event(event("MSKU9070323", EventType::Inspection, 28))?;
    assert!(service.release_eligible("MSKU9070323")?);

    let err = service.issue_gate_pass("MSKU9070323").unwrap_err();
    assert!(matches!(
        validation_error(&err),
        ValidationError::ReleaseRefused { reasons, .. } if reasons.len() == 1
    ));

    Ok(())
}

/// Customs cannot release a container before its vessel arrived.
#[test]
fn customs_release_before_arrival_is_rejected() -> anyhow::Result<()> {
    let (_dir, service) = open_service("customs.db")?;
    let call = discharge_call(&service, 1)?;
    service.register_container(draft("MSKU9070323", &call, "CARRIER:ML100001*"))?;

    let early = CustomsApproval::new("MSKU9070323", "118-2025-10-004512")
        .set_review_date(TimeStamp::new_with(2025, 5, 18, 9, 0, 0))
        .set_approved(true)
        .set_release_date(TimeStamp::new_with(2025, 5, 19, 9, 0, 0))
        .set_document(pdf("levante.pdf"));
    let err = service.record_customs_approval(early).unwrap_err();
    assert!(matches!(
        validation_error(&err),
        ValidationError::InvalidValue { field: "release_date", .. }
    ));

    let future_review = approved_customs("MSKU9070323")
        .set_review_date(TimeStamp::new_with(2025, 6, 2, 9, 0, 0));
    assert!(service.record_customs_approval(future_review).is_err());

    let unsigned = CustomsApproval::new("MSKU9070323", "118-2025-10-004512")
        .set_review_date(TimeStamp::new_with(2025, 5, 26, 9, 0, 0))
        .set_approved(true)
        .set_release_date(TimeStamp::new_with(2025, 5, 27, 9, 0, 0));
    let err = service.record_customs_approval(unsigned).unwrap_err();
    assert!(matches!(
        validation_error(&err),
        ValidationError::MissingRequiredField { field: "document", .. }
    ));

    Ok(())
}

/// Invoice numbers are unique across containers.
#[test]
fn invoice_numbers_are_unique() -> anyhow::Result<()> {
    let (_dir, service) = open_service("invoices.db")?;
    let call = discharge_call(&service, 2)?;
    service.register_container(draft("MSKU9070323", &call, "CARRIER:ML100001*"))?;
    service.register_container(draft("CSQU3054383", &call, "CARRIER:ML100002*"))?;

    service.record_financial_approval(invoice(
        "MSKU9070323",
        "F001-00000001",
        FinancialStatus::Pending,
    ))?;
    let duplicate = invoice("CSQU3054383", "F001-00000001", FinancialStatus::Pending);
    let err = service.record_financial_approval(duplicate).unwrap_err();
    assert!(matches!(
        validation_error(&err),
        ValidationError::UniquenessConflict { field: "invoice_number", conflicting, .. }
            if conflicting == "MSKU9070323"
    ));

    // renumbering frees the old number
    service.record_financial_approval(invoice(
        "MSKU9070323",
        "F001-00000002",
        FinancialStatus::Pending,
    ))?;
    service.record_financial_approval(invoice(
        "CSQU3054383",
        "F001-00000001",
        FinancialStatus::Pending,
    ))?;

    Ok(())
}

/// Payments need a forwarder on the container, and it must be the payer.
#[test]
fn forwarder_payment_must_match_assignment() -> anyhow::Result<()> {
    let (_dir, service) = open_service("payments.db")?;
    let call = discharge_call(&service, 2)?;
    let assigned = service.register_forwarder(Forwarder::new("Andes Cargo SAC", "20512345678")?)?;
    let other = service.register_forwarder(Forwarder::new("Pacific Freight EIRL", "20600011122")?)?;

    service.register_container(draft("MSKU9070323", &call, "CARRIER:ML100001*"))?;
    let err = service.record_forwarder_payment(payment("MSKU9070323")).unwrap_err();
    assert!(matches!(
        validation_error(&err),
        ValidationError::CrossReference { field: "forwarder", .. }
    ));

    service.register_container(
        draft("CSQU3054383", &call, "CARRIER:ML100002*").set_forwarder(&assigned.id),
    )?;
    let err = service
        .record_forwarder_payment(payment("CSQU3054383").set_forwarder(&other.id))
        .unwrap_err();
    assert!(matches!(
        validation_error(&err),
        ValidationError::CrossReference { field: "forwarder", .. }
    ));

    Ok(())
}

/// Containers with approvals and settled approvals cannot be deleted.
#[test]
fn protected_deletion() -> anyhow::Result<()> {
    let (_dir, service) = open_service("protected.db")?;
    let call = discharge_call(&service, 1)?;
    let forwarder = service.register_forwarder(Forwarder::new("Andes Cargo SAC", "20512345678")?)?;
    service.register_container(
        draft("MSKU9070323", &call, "CARRIER:ML100001*").set_forwarder(&forwarder.id),
    )?;

    service.record_financial_approval(invoice(
        "MSKU9070323",
        "F001-00000001",
        FinancialStatus::Pending,
    ))?;
    let err = service.delete_container("MSKU9070323").unwrap_err();
    assert!(matches!(
        err.downcast_ref::<StoreError>(),
        Some(StoreError::ProtectedDeletion { entity: "container", .. })
    ));

    // an unsettled invoice can go
    service.delete_financial_approval("MSKU9070323")?;

    service.record_customs_approval(approved_customs("MSKU9070323"))?;
    assert!(service.delete_customs_approval("MSKU9070323").is_err());

    service.record_forwarder_payment(payment("MSKU9070323"))?;
    assert!(service.delete_forwarder_payment("MSKU9070323").is_err());

    service.record_financial_approval(invoice(
        "MSKU9070323",
        "F001-00000001",
        FinancialStatus::Paid,
    ))?;
    assert!(service.delete_financial_approval("MSKU9070323").is_err());

    assert!(service.get_container("MSKU9070323").is_ok());

    Ok(())
}

/// Events land in the archive under their content hash, and local events
/// default to the configured home port.
#[test]
fn archived_events_and_home_port() -> anyhow::Result<()> {
    let temp_dir = tempdir()?;
    let db = sled::open(temp_dir.path().join("archive.db"))?;
    let home = Location::new("Terminal Norte", Some("Callao"), "PE");
    let service = TrackingService::new(Arc::new(db))?
        .with_config(TrackingConfig::default().with_home_port(home.clone()))
        .with_clock(FixedClock(TimeStamp::new_with(2025, 6, 1, 12, 0, 0)));

    let call = discharge_call(&service, 1)?;
    service.register_container(draft("MSKU9070323", &call, "CARRIER:ML100001*"))?;

    let accepted = service.submit_event(event("MSKU9070323", EventType::GateInFull, 1))?;
    assert_eq!(accepted.location, home);

    let (digest, _) = accepted.build()?;
    assert_eq!(service.get_event(&digest)?, accepted);

    Ok(())
}

/// Vessel call edits cannot declare fewer containers than are registered.
#[test]
fn vessel_call_capacity_cannot_shrink_below_registered() -> anyhow::Result<()> {
    let (_dir, service) = open_service("shrink.db")?;
    let mut call = discharge_call(&service, 2)?;
    service.register_container(draft("MSKU9070323", &call, "CARRIER:ML100001*"))?;
    service.register_container(draft("CSQU3054383", &call, "CARRIER:ML100002*"))?;

    call.discharge_count = 1;
    assert!(service.update_vessel_call(call.clone()).is_err());

    let updated = service.update_call_status(&call.id, CallStatus::Operating, None)?;
    assert_eq!(updated.status, CallStatus::Operating);
    assert_eq!(updated.discharge_count, 2);

    Ok(())
}

/// A forwarder id is registered once; a blocked forwarder cannot be
/// re-registered as active, and tax ids stay unique.
#[test]
fn forwarder_registration_never_overwrites() -> anyhow::Result<()> {
    let (_dir, service) = open_service("forwarders.db")?;
    let first = service.register_forwarder(Forwarder::new("Andes Cargo SAC", "20512345678")?)?;
    service.set_forwarder_status(&first.id, ForwarderStatus::Blocked)?;

    let mut same_id = Forwarder::new("Pacific Freight EIRL", "20599999999")?;
    same_id.id = first.id.clone();
    let err = service.register_forwarder(same_id).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<StoreError>(),
        Some(StoreError::AlreadyExists { entity: "forwarder", .. })
    ));

    let stored = service.get_forwarder(&first.id)?;
    assert_eq!(stored.legal_name, "Andes Cargo SAC");
    assert_eq!(stored.status, ForwarderStatus::Blocked);

    let err = service
        .register_forwarder(Forwarder::new("Andes Logistics SAC", "20512345678")?)
        .unwrap_err();
    assert!(matches!(
        validation_error(&err),
        ValidationError::UniquenessConflict { field: "tax_id", conflicting, .. }
            if *conflicting == first.id
    ));

    // the rejected tax id was not claimed by the failed registration
    service.register_forwarder(Forwarder::new("Pacific Freight EIRL", "20599999999")?)?;

    Ok(())
}

/// A recorded forwarder payment is final and cannot be replaced.
#[test]
fn forwarder_payment_is_recorded_once() -> anyhow::Result<()> {
    let (_dir, service) = open_service("payment_once.db")?;
    let call = discharge_call(&service, 1)?;
    let forwarder = service.register_forwarder(Forwarder::new("Andes Cargo SAC", "20512345678")?)?;
    service.register_container(
        draft("MSKU9070323", &call, "CARRIER:ML100001*").set_forwarder(&forwarder.id),
    )?;

    service.record_forwarder_payment(payment("MSKU9070323").set_amount(50_000))?;
    let err = service
        .record_forwarder_payment(payment("MSKU9070323").set_amount(1))
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<StoreError>(),
        Some(StoreError::AlreadyExists { entity: "forwarder payment", .. })
    ));

    let stored = service.approvals("MSKU9070323")?.forwarder_payment;
    assert_eq!(stored.and_then(|p| p.amount), Some(50_000));

    Ok(())
}

/// Registration and customs release read the vessel call as it stands when
/// they commit, after any edit to its declared count or arrival.
#[test]
fn checks_use_the_current_vessel_call() -> anyhow::Result<()> {
    let (_dir, service) = open_service("current_call.db")?;
    let mut call = discharge_call(&service, 2)?;
    service.register_container(draft("MSKU9070323", &call, "CARRIER:ML100001*"))?;

    call.discharge_count = 1;
    call.actual_arrival = Some(TimeStamp::new_with(2025, 5, 28, 6, 0, 0));
    service.update_vessel_call(call.clone())?;

    let err = service
        .register_container(draft("CSQU3054383", &call, "CARRIER:ML100002*"))
        .unwrap_err();
    assert!(matches!(
        validation_error(&err),
        ValidationError::CapacityExceeded { current: 1, declared: 1, .. }
    ));

    // released on the 27th, before the corrected arrival
    let err = service
        .record_customs_approval(approved_customs("MSKU9070323"))
        .unwrap_err();
    assert!(matches!(
        validation_error(&err),
        ValidationError::InvalidValue { field: "release_date", .. }
    ));
    assert!(service.approvals("MSKU9070323")?.customs.is_none());

    Ok(())
}
