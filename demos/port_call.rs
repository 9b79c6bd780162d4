//! Walk one import container through a port call, from registration to gate pass.
//!
//! Run with `RUST_LOG=debug cargo run --example port_call` to see the
//! service log.

use std::sync::Arc;

use container_tracking::{
    TrackingService,
    approval::{
        BilledService, CustomsApproval, DocumentRef, FinancialApproval, FinancialStatus,
        ForwarderPayment,
    },
    config::TrackingConfig,
    container::{ContainerDetails, Direction},
    event::{ContainerEvent, EventType, Location},
    forwarder::Forwarder,
    time::{CalendarDate, FixedClock, TimeStamp},
    vessel::{CallStatus, OperationKind, VesselCall, VesselRef},
};
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let temp_dir = tempfile::tempdir()?;
    let db = Arc::new(sled::open(temp_dir.path().join("port_call.db"))?);

    let terminal = Location::new("Terminal Norte", Some("Callao"), "PE");
    let service = TrackingService::new(db)?
        .with_config(TrackingConfig::default().with_home_port(terminal.clone()))
        .with_clock(FixedClock(TimeStamp::new_with(2025, 6, 1, 12, 0, 0)));

    let call = service.register_vessel_call(
        VesselCall::new(
            VesselRef::new("MSC Gulsun", "9839430")?,
            TimeStamp::new_with(2025, 5, 20, 6, 0, 0),
            OperationKind::Discharge,
            2,
        )
        .set_berth("MUELLE-2"),
    )?;
    let call = service.update_call_status(
        &call.id,
        CallStatus::Berthed,
        Some(TimeStamp::new_with(2025, 5, 21, 7, 30, 0)),
    )?;

    let forwarder = service.register_forwarder(Forwarder::new("Andes Cargo SAC", "20512345678")?)?;

    let container = service.register_container(
        ContainerDetails::new()
            .set_code("MSKU9070323")
            .set_vessel_call(&call.id)
            .set_forwarder(&forwarder.id)
            .set_direction(Direction::Import)
            .set_size_type("40RF")
            .set_gross_weight_kg(27_300)
            .set_tare_weight_kg(4_480)
            .set_seals("CARRIER:ML558812*|CUSTOMS:AD-20931")
            .set_cargo("Frozen squid")
            .set_yard_location("R-04-12")
            .set_bill_of_lading("MEDUFN123456")
            .set_origin(Location::new("Port of Busan", Some("Busan"), "KR"))
            .set_destination(terminal),
    )?;
    println!("registered {} ({})", container.code, container.route_summary());

    let voyage = [
        (EventType::GateInFull, 2),
        (EventType::Loaded, 3),
        (EventType::Departed, 4),
        (EventType::Arrived, 21),
        (EventType::Discharged, 22),
        (EventType::CustomsHold, 23),
        (EventType::CustomsReleased, 27),
    ];
    for (kind, day) in voyage {
        let timestamp = TimeStamp::new_with(2025, 5, day, 9, 0, 0);
        let event = ContainerEvent::new("MSKU9070323", kind, timestamp);
        let event = if kind.is_maritime() {
            event.set_vessel(&call.vessel.imo_number).set_voyage("FX518W")
        } else {
            event
        };
        service.submit_event(event)?;
    }
    println!("status: {}", service.current_status("MSKU9070323")?);
    for row in service.history("MSKU9070323")?.view_history() {
        println!("{row}");
    }

    service.record_customs_approval(
        CustomsApproval::new("MSKU9070323", "118-2025-10-004512")
            .set_review_date(TimeStamp::new_with(2025, 5, 26, 9, 0, 0))
            .set_approved(true)
            .set_release_date(TimeStamp::new_with(2025, 5, 27, 9, 0, 0))
            .set_document(DocumentRef::new("levante.pdf", 240_000)),
    )?;
    service.record_financial_approval(
        FinancialApproval::new(
            "MSKU9070323",
            "F001-00004512",
            185_000,
            CalendarDate::new_with(2025, 5, 22),
        )
            .add_service(BilledService::Discharge)
            .add_service(BilledService::Reefer)
            .set_status(FinancialStatus::Paid)
            .set_payment_date(CalendarDate::new_with(2025, 5, 28))
            .set_document(DocumentRef::new("factura.pdf", 90_000)),
    )?;

    for pending in service.pending_approvals("MSKU9070323")? {
        println!("pending: {pending}");
    }

    service.record_forwarder_payment(
        ForwarderPayment::new("MSKU9070323")
            .set_amount(40_000)
            .set_payment_date(CalendarDate::new_with(2025, 5, 29))
            .set_document(DocumentRef::new("voucher.png", 51_000)),
    )?;

    let pass = service.issue_gate_pass("MSKU9070323")?;
    println!(
        "gate pass for {} on {} issued {} (seal {})",
        pass.container, pass.vessel_name, pass.issued_at, pass.primary_seal
    );

    service.flush()?;
    Ok(())
}
