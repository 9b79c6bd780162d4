//! Service layer API for container tracking operations
use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;
use sled::transaction::{
    ConflictableTransactionError, TransactionError, TransactionResult, TransactionalTree,
};
use sled::{Transactional, Tree};
use tracing::{debug, info, warn};

use super::approval::{
    ApprovalSet, CustomsApproval, FinancialApproval, ForwarderPayment, PendingApproval,
};
use super::capacity;
use super::config::TrackingConfig;
use super::container::{Container, ContainerDetails, Direction};
use super::context::ContainerContext;
use super::event::ContainerEvent;
use super::forwarder::{Forwarder, ForwarderStatus};
use super::iso6346;
use super::seals;
use super::time::{Clock, SystemClock, TimeStamp};
use super::vessel::{CallStatus, VesselCall};
use crate::error::{StoreError, ValidationError};
use crate::utils::new_uuid_to_bech32;

const VESSEL_CALLS: &str = "vessel_calls";
const FORWARDERS: &str = "forwarders";
const CONTAINERS: &str = "containers";
const HISTORIES: &str = "histories";
const EVENTS: &str = "events";
const SEALS: &str = "seal_index";
const CAPACITY: &str = "capacity_counters";
const MANIFEST: &str = "manifest_index";
const CUSTOMS: &str = "customs_approvals";
const FINANCIAL: &str = "financial_approvals";
const FORWARDER_PAYMENTS: &str = "forwarder_payments";
const INVOICES: &str = "invoice_index";
const TAX_IDS: &str = "forwarder_tax_index";

type TxError = ConflictableTransactionError<anyhow::Error>;

fn abort(err: impl Into<anyhow::Error>) -> TxError {
    ConflictableTransactionError::Abort(err.into())
}

fn finish<T>(result: TransactionResult<T, anyhow::Error>) -> anyhow::Result<T> {
    match result {
        Ok(value) => Ok(value),
        Err(TransactionError::Abort(err)) => Err(err),
        Err(TransactionError::Storage(err)) => Err(err.into()),
    }
}

fn decode<T>(bytes: &[u8]) -> anyhow::Result<T>
where
    T: for<'b> minicbor::Decode<'b, ()>,
{
    Ok(minicbor::decode(bytes)?)
}

fn load<T>(tree: &Tree, entity: &'static str, key: &str) -> anyhow::Result<T>
where
    T: for<'b> minicbor::Decode<'b, ()>,
{
    let raw = tree
        .get(key.as_bytes())?
        .ok_or_else(|| StoreError::not_found(entity, key))?;
    decode(&raw)
}

fn load_opt<T>(tree: &Tree, key: &str) -> anyhow::Result<Option<T>>
where
    T: for<'b> minicbor::Decode<'b, ()>,
{
    tree.get(key.as_bytes())?
        .map(|raw| decode(&raw))
        .transpose()
}

fn load_tx<T>(tree: &TransactionalTree, entity: &'static str, key: &str) -> Result<T, TxError>
where
    T: for<'b> minicbor::Decode<'b, ()>,
{
    let raw = tree
        .get(key.as_bytes())?
        .ok_or_else(|| abort(StoreError::not_found(entity, key)))?;
    decode(&raw).map_err(abort)
}

// seal codes may only be indexed to `code` or to nobody
fn check_seals(
    seals: &TransactionalTree,
    code: &str,
    seal_codes: &BTreeSet<String>,
) -> Result<(), TxError> {
    for seal in seal_codes {
        if let Some(owner) = seals.get(seal.as_bytes())? {
            let owner = String::from_utf8_lossy(&owner).into_owned();
            if owner != code {
                return Err(abort(ValidationError::UniquenessConflict {
                    field: "seal",
                    value: seal.clone(),
                    conflicting: owner,
                }));
            }
        }
    }
    Ok(())
}

fn container_key(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

fn manifest_key(call_id: &str, code: &str) -> String {
    format!("{call_id}/{code}")
}

/// Authorisation for a released container to leave the terminal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatePass {
    pub container: String,
    pub vessel_call: String,
    pub vessel_name: String,
    pub forwarder: Option<String>,
    pub primary_seal: String,
    pub dispatch_number: String,
    pub invoice_number: String,
    pub route: String,
    pub issued_at: TimeStamp<Utc>,
}

pub struct TrackingService {
    instance: Arc<sled::Db>,
    config: TrackingConfig,
    clock: Arc<dyn Clock>,
    vessel_calls: Tree,
    forwarders: Tree,
    containers: Tree,
    histories: Tree,
    events: Tree, // immutable archive keyed by content hash
    seals: Tree,
    capacity: Tree,
    manifest: Tree,
    customs: Tree,
    financial: Tree,
    forwarder_payments: Tree,
    invoices: Tree,
    tax_ids: Tree,
}

impl TrackingService {
    pub fn new(instance: Arc<sled::Db>) -> anyhow::Result<Self> {
        let service = Self {
            config: TrackingConfig::default(),
            clock: Arc::new(SystemClock),
            vessel_calls: instance.open_tree(VESSEL_CALLS)?,
            forwarders: instance.open_tree(FORWARDERS)?,
            containers: instance.open_tree(CONTAINERS)?,
            histories: instance.open_tree(HISTORIES)?,
            events: instance.open_tree(EVENTS)?,
            seals: instance.open_tree(SEALS)?,
            capacity: instance.open_tree(CAPACITY)?,
            manifest: instance.open_tree(MANIFEST)?,
            customs: instance.open_tree(CUSTOMS)?,
            financial: instance.open_tree(FINANCIAL)?,
            forwarder_payments: instance.open_tree(FORWARDER_PAYMENTS)?,
            invoices: instance.open_tree(INVOICES)?,
            tax_ids: instance.open_tree(TAX_IDS)?,
            instance,
        };

        info!(
            "Opened tracking store: {} vessel calls, {} containers",
            service.vessel_calls.len(),
            service.containers.len()
        );
        Ok(service)
    }

    pub fn with_config(mut self, config: TrackingConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_clock<C: Clock + 'static>(mut self, clock: C) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn config(&self) -> &TrackingConfig {
        &self.config
    }

    pub fn flush(&self) -> anyhow::Result<()> {
        self.instance.flush()?;
        Ok(())
    }

    // ---- vessel calls ----

    /// Register a scheduled vessel call. A call without an id is assigned one.
    pub fn register_vessel_call(&self, mut call: VesselCall) -> anyhow::Result<VesselCall> {
        call.normalise();
        call.validate(self.clock.now())?;
        if call.id.is_empty() {
            call.id = new_uuid_to_bech32("call")?;
        }

        let swapped = self.vessel_calls.compare_and_swap(
            call.id.as_bytes(),
            None::<&[u8]>,
            Some(minicbor::to_vec(&call)?),
        )?;
        if swapped.is_err() {
            return Err(StoreError::AlreadyExists {
                entity: "vessel call",
                key: call.id,
            }
            .into());
        }

        info!("Registered vessel call {} ({})", call.id, call.vessel.name);
        Ok(call)
    }

    pub fn get_vessel_call(&self, call_id: &str) -> anyhow::Result<VesselCall> {
        load(&self.vessel_calls, "vessel call", call_id)
    }

    /// Replace a vessel call. Declared counts may not drop below the
    /// containers already registered against it.
    pub fn update_vessel_call(&self, mut call: VesselCall) -> anyhow::Result<VesselCall> {
        call.normalise();
        call.validate(self.clock.now())?;
        let cbor = minicbor::to_vec(&call)?;

        finish(
            (&self.vessel_calls, &self.capacity).transaction(|(calls, counters)| {
                let _: VesselCall = load_tx(calls, "vessel call", &call.id)?;

                for direction in [Direction::Import, Direction::Export] {
                    let key = capacity::counter_key(&call.id, direction);
                    let registered =
                        capacity::decode_count(counters.get(key.as_bytes())?.as_deref());
                    let declared = call.declared_for(direction);
                    if registered > declared {
                        return Err(abort(ValidationError::invalid(
                            match direction {
                                Direction::Import => "discharge_count",
                                Direction::Export => "load_count",
                            },
                            format!(
                                "{registered} {} containers already registered, \
                                 cannot declare {declared}",
                                direction.code()
                            ),
                        )));
                    }
                }

                calls.insert(call.id.as_bytes(), cbor.clone())?;
                Ok(())
            }),
        )?;

        info!("Updated vessel call {} ({:?})", call.id, call.status);
        Ok(call)
    }

    /// Move a call through its lifecycle, recording the actual arrival when given.
    pub fn update_call_status(
        &self,
        call_id: &str,
        status: CallStatus,
        actual_arrival: Option<TimeStamp<Utc>>,
    ) -> anyhow::Result<VesselCall> {
        let mut call = self.get_vessel_call(call_id)?;
        call.status = status;
        if actual_arrival.is_some() {
            call.actual_arrival = actual_arrival;
        }
        self.update_vessel_call(call)
    }

    // ---- forwarders ----

    /// Register a forwarder. Ids and tax ids are claimed in one transaction.
    pub fn register_forwarder(&self, mut forwarder: Forwarder) -> anyhow::Result<Forwarder> {
        if forwarder.id.is_empty() {
            forwarder.id = new_uuid_to_bech32("fwd")?;
        }
        let cbor = minicbor::to_vec(&forwarder)?;

        finish(
            (&self.forwarders, &self.tax_ids).transaction(|(forwarders, tax_ids)| {
                if forwarders.get(forwarder.id.as_bytes())?.is_some() {
                    return Err(abort(StoreError::AlreadyExists {
                        entity: "forwarder",
                        key: forwarder.id.clone(),
                    }));
                }
                if let Some(owner) = tax_ids.get(forwarder.tax_id.as_bytes())? {
                    return Err(abort(ValidationError::UniquenessConflict {
                        field: "tax_id",
                        value: forwarder.tax_id.clone(),
                        conflicting: String::from_utf8_lossy(&owner).into_owned(),
                    }));
                }

                tax_ids.insert(forwarder.tax_id.as_bytes(), forwarder.id.as_bytes())?;
                forwarders.insert(forwarder.id.as_bytes(), cbor.clone())?;
                Ok(())
            }),
        )?;

        info!("Registered forwarder {} ({})", forwarder.id, forwarder.legal_name);
        Ok(forwarder)
    }

    pub fn get_forwarder(&self, forwarder_id: &str) -> anyhow::Result<Forwarder> {
        load(&self.forwarders, "forwarder", forwarder_id)
    }

    pub fn set_forwarder_status(
        &self,
        forwarder_id: &str,
        status: ForwarderStatus,
    ) -> anyhow::Result<Forwarder> {
        let forwarder = self.get_forwarder(forwarder_id)?.set_status(status);
        self.forwarders
            .insert(forwarder.id.as_bytes(), minicbor::to_vec(&forwarder)?)?;

        info!("Forwarder {} is now {:?}", forwarder.id, status);
        Ok(forwarder)
    }

    fn check_forwarder(&self, forwarder_id: Option<&str>) -> anyhow::Result<()> {
        let Some(id) = forwarder_id else {
            return Ok(());
        };
        let Some(forwarder) = load_opt::<Forwarder>(&self.forwarders, id)? else {
            return Err(ValidationError::cross_reference(
                "forwarder",
                format!("forwarder {id} is not registered"),
            )
            .into());
        };

        match forwarder.status {
            ForwarderStatus::Blocked => Err(ValidationError::cross_reference(
                "forwarder",
                format!("forwarder {id} is blocked"),
            )
            .into()),
            ForwarderStatus::Suspended => {
                warn!("Assigning suspended forwarder {}", id);
                Ok(())
            }
            ForwarderStatus::Active => Ok(()),
        }
    }

    // ---- containers ----

    /// Register a container against its vessel call. Identifier and seal
    /// uniqueness and the call's declared capacity are checked and claimed
    /// in one transaction.
    pub fn register_container(&self, details: ContainerDetails) -> anyhow::Result<Container> {
        let code = details.code().map(container_key).unwrap_or_default();
        self.insert_container(details)
            .inspect_err(|e| warn!("Rejected container {}: {}", code, e))
    }

    fn insert_container(&self, details: ContainerDetails) -> anyhow::Result<Container> {
        let container = details.validate_and_finalise()?;
        self.check_forwarder(container.forwarder.as_deref())?;

        let code = container.code.to_string();
        let call_id = container.vessel_call.clone();
        let seal_codes = container.seal_set()?.codes();
        let counter = capacity::counter_key(&call_id, container.direction);
        let listing = manifest_key(&call_id, &code);
        let cbor = container.build()?;
        let history = minicbor::to_vec(ContainerContext::new(&code))?;

        finish(
            (
                &self.vessel_calls,
                &self.containers,
                &self.histories,
                &self.seals,
                &self.capacity,
                &self.manifest,
            )
                .transaction(|(calls, containers, histories, seals, counters, manifest)| {
                    // declared count and counter are read in the same transaction
                    let call: VesselCall = load_tx(calls, "vessel call", &call_id)?;

                    if let Some(raw) = containers.get(code.as_bytes())? {
                        let existing: Container = decode(&raw).map_err(abort)?;
                        return Err(abort(ValidationError::UniquenessConflict {
                            field: "code",
                            value: code.clone(),
                            conflicting: format!(
                                "container on vessel call {}",
                                existing.vessel_call
                            ),
                        }));
                    }

                    check_seals(seals, &code, &seal_codes)?;

                    let current =
                        capacity::decode_count(counters.get(counter.as_bytes())?.as_deref());
                    capacity::check(&call, container.direction, current).map_err(abort)?;
                    counters.insert(counter.as_bytes(), &capacity::encode_count(current + 1)[..])?;

                    for seal in &seal_codes {
                        seals.insert(seal.as_bytes(), code.as_bytes())?;
                    }
                    manifest.insert(listing.as_bytes(), code.as_bytes())?;
                    histories.insert(code.as_bytes(), history.clone())?;
                    containers.insert(code.as_bytes(), cbor.clone())?;
                    Ok(())
                }),
        )?;

        info!(
            "Registered {} container {} on vessel call {}",
            container.direction.code(),
            code,
            call_id
        );
        Ok(container)
    }

    pub fn get_container(&self, code: &str) -> anyhow::Result<Container> {
        load(&self.containers, "container", &container_key(code))
    }

    /// Edit a registered container. Identifier, vessel call and direction
    /// cannot change; the blocked flag is kept from the stored record.
    pub fn update_container(
        &self,
        code: &str,
        details: ContainerDetails,
    ) -> anyhow::Result<Container> {
        let code = container_key(code);
        let existing = self.get_container(&code)?;
        let container = details.validate_and_finalise()?;

        if container.code != existing.code {
            return Err(ValidationError::invalid(
                "code",
                format!("identifier {} cannot change to {}", existing.code, container.code),
            )
            .into());
        }
        if container.vessel_call != existing.vessel_call {
            return Err(ValidationError::invalid(
                "vessel_call",
                format!("container {code} stays on vessel call {}", existing.vessel_call),
            )
            .into());
        }
        if container.direction != existing.direction {
            return Err(ValidationError::invalid(
                "direction",
                format!("container {code} stays {}", existing.direction.code()),
            )
            .into());
        }

        self.check_forwarder(container.forwarder.as_deref())?;
        let counter = capacity::counter_key(&container.vessel_call, container.direction);
        let seal_codes = container.seal_set()?.codes();

        let updated = finish(
            (
                &self.vessel_calls,
                &self.containers,
                &self.seals,
                &self.capacity,
                &self.forwarder_payments,
            )
                .transaction(|(calls, containers, seals, counters, payments)| {
                    let call: VesselCall = load_tx(calls, "vessel call", &container.vessel_call)?;
                    let stored: Container = load_tx(containers, "container", &code)?;
                    let mut record = container.clone();
                    record.blocked = stored.blocked;

                    check_seals(seals, &code, &seal_codes)?;

                    // self is already counted
                    let current =
                        capacity::decode_count(counters.get(counter.as_bytes())?.as_deref());
                    capacity::check(&call, record.direction, current.saturating_sub(1))
                        .map_err(abort)?;

                    if let Some(raw) = payments.get(code.as_bytes())? {
                        let payment: ForwarderPayment = decode(&raw).map_err(abort)?;
                        if payment.forwarder != record.forwarder {
                            return Err(abort(ValidationError::cross_reference(
                                "forwarder",
                                format!(
                                    "container {code} was paid for by {}",
                                    payment.forwarder.unwrap_or_default()
                                ),
                            )));
                        }
                    }

                    for seal in seals::extract(&stored.seals).difference(&seal_codes) {
                        seals.remove(seal.as_bytes())?;
                    }
                    for seal in &seal_codes {
                        seals.insert(seal.as_bytes(), code.as_bytes())?;
                    }
                    containers.insert(code.as_bytes(), record.build().map_err(abort)?)?;

                    Ok(record)
                }),
        )?;

        info!("Updated container {}", code);
        Ok(updated)
    }

    /// Delete a container with no approvals recorded, releasing its seal
    /// codes, capacity slot and manifest entry. Archived events are kept.
    pub fn delete_container(&self, code: &str) -> anyhow::Result<Container> {
        let code = container_key(code);

        let removed = finish(
            (
                &self.containers,
                &self.histories,
                &self.seals,
                &self.capacity,
                &self.manifest,
                &self.customs,
                &self.financial,
                &self.forwarder_payments,
            )
                .transaction(
                    |(
                        containers,
                        histories,
                        seals,
                        counters,
                        manifest,
                        customs,
                        financial,
                        payments,
                    )| {
                        let stored: Container = load_tx(containers, "container", &code)?;

                        let approvals = [
                            (customs, "customs approval"),
                            (financial, "financial approval"),
                            (payments, "forwarder payment"),
                        ];
                        for (tree, approval) in approvals {
                            if tree.get(code.as_bytes())?.is_some() {
                                return Err(abort(StoreError::ProtectedDeletion {
                                    entity: "container",
                                    key: code.clone(),
                                    reason: format!("{approval} is recorded"),
                                }));
                            }
                        }

                        for seal in seals::extract(&stored.seals) {
                            let owned = seals
                                .get(seal.as_bytes())?
                                .is_some_and(|owner| &owner[..] == code.as_bytes());
                            if owned {
                                seals.remove(seal.as_bytes())?;
                            }
                        }

                        let counter = capacity::counter_key(&stored.vessel_call, stored.direction);
                        let current =
                            capacity::decode_count(counters.get(counter.as_bytes())?.as_deref());
                        counters.insert(
                            counter.as_bytes(),
                            &capacity::encode_count(current.saturating_sub(1))[..],
                        )?;

                        manifest.remove(manifest_key(&stored.vessel_call, &code).as_bytes())?;
                        histories.remove(code.as_bytes())?;
                        containers.remove(code.as_bytes())?;

                        Ok(stored)
                    },
                ),
        )?;

        info!("Deleted container {}", code);
        Ok(removed)
    }

    /// Containers registered against a vessel call, ordered by identifier.
    pub fn manifest(&self, call_id: &str) -> anyhow::Result<Vec<Container>> {
        let _ = self.get_vessel_call(call_id)?;

        self.manifest
            .scan_prefix(format!("{call_id}/").as_bytes())
            .values()
            .map(|code| {
                let code = code?;
                self.get_container(&String::from_utf8_lossy(&code))
            })
            .collect()
    }

    // ---- events ----

    /// Validate `event` against the container's history and record it. The
    /// history read, the append and the blocked-flag write commit together.
    pub fn submit_event(&self, event: ContainerEvent) -> anyhow::Result<ContainerEvent> {
        let code = event.container.clone();
        let kind = event.kind;
        self.accept_event(event)
            .inspect_err(|e| warn!("Rejected {} for {}: {}", kind.code(), code, e))
    }

    fn accept_event(&self, mut event: ContainerEvent) -> anyhow::Result<ContainerEvent> {
        let code = iso6346::validate_identifier(&event.container)?.to_string();
        event.container = code.clone();

        if event.location.is_empty() && event.kind.is_local() {
            if let Some(home) = &self.config.home_port {
                event.location = home.clone();
            }
        }

        let (accepted, digest, blocked) = finish(
            (&self.containers, &self.histories, &self.events).transaction(
                |(containers, histories, events)| {
                    let mut container: Container = load_tx(containers, "container", &code)?;
                    let mut history = match histories.get(code.as_bytes())? {
                        Some(raw) => decode(&raw).map_err(abort)?,
                        None => ContainerContext::new(&code),
                    };

                    let accepted = history.accept(event.clone()).map_err(abort)?;
                    let (digest, cbor) = accepted.build().map_err(abort)?;
                    container.blocked = history.is_blocked();

                    events.insert(digest.as_bytes(), cbor)?;
                    histories.insert(code.as_bytes(), minicbor::to_vec(&history).map_err(abort)?)?;
                    containers.insert(code.as_bytes(), container.build().map_err(abort)?)?;

                    Ok((accepted, digest, container.blocked))
                },
            ),
        )?;

        info!("Accepted {} for {} ({})", accepted.kind.code(), code, digest);
        debug!(blocked, "Recomputed blocked flag for {}", code);
        Ok(accepted)
    }

    pub fn history(&self, code: &str) -> anyhow::Result<ContainerContext> {
        let container = self.get_container(code)?;
        let code = container.code.to_string();

        Ok(load_opt(&self.histories, &code)?.unwrap_or_else(|| ContainerContext::new(&code)))
    }

    /// Label of the latest event, or "No movement".
    pub fn current_status(&self, code: &str) -> anyhow::Result<String> {
        Ok(self.history(code)?.current_status().to_string())
    }

    pub fn is_blocked(&self, code: &str) -> anyhow::Result<bool> {
        Ok(self.get_container(code)?.blocked)
    }

    pub fn timeline(&self, code: &str) -> anyhow::Result<Vec<ContainerEvent>> {
        Ok(self
            .history(code)?
            .timeline()
            .into_iter()
            .cloned()
            .collect())
    }

    /// Look up an archived event by the hash returned from [`ContainerEvent::build`].
    pub fn get_event(&self, digest: &str) -> anyhow::Result<ContainerEvent> {
        load(&self.events, "event", digest)
    }

    // ---- approvals ----

    pub fn record_customs_approval(
        &self,
        approval: CustomsApproval,
    ) -> anyhow::Result<CustomsApproval> {
        let code = container_key(&approval.container);
        let now = self.clock.now();

        // the release date is checked against the arrival stored at commit
        let approval = finish(
            (&self.vessel_calls, &self.containers, &self.customs).transaction(
                |(calls, containers, customs)| {
                    let container: Container = load_tx(containers, "container", &code)?;
                    let call: VesselCall = load_tx(calls, "vessel call", &container.vessel_call)?;
                    let approval = approval
                        .clone()
                        .finalise(call.arrival_reference(), now, &self.config)
                        .map_err(abort)?;

                    let cbor = minicbor::to_vec(&approval).map_err(abort)?;
                    customs.insert(code.as_bytes(), cbor)?;
                    Ok(approval)
                },
            ),
        )?;

        info!(
            "Recorded customs dispatch {} for {} (approved: {})",
            approval.dispatch_number, code, approval.approved
        );
        Ok(approval)
    }

    /// Record or replace the container's invoice. Invoice numbers are unique
    /// across all containers.
    pub fn record_financial_approval(
        &self,
        approval: FinancialApproval,
    ) -> anyhow::Result<FinancialApproval> {
        let container = self.get_container(&approval.container)?;
        let approval = approval.finalise(&self.config)?;

        let code = container.code.to_string();
        let invoice = approval.invoice_number.clone();
        let cbor = minicbor::to_vec(&approval)?;
        finish(
            (&self.containers, &self.financial, &self.invoices).transaction(
                |(containers, financial, invoices)| {
                    if containers.get(code.as_bytes())?.is_none() {
                        return Err(abort(StoreError::not_found("container", code.clone())));
                    }

                    if let Some(owner) = invoices.get(invoice.as_bytes())? {
                        let owner = String::from_utf8_lossy(&owner).into_owned();
                        if owner != code {
                            return Err(abort(ValidationError::UniquenessConflict {
                                field: "invoice_number",
                                value: invoice.clone(),
                                conflicting: owner,
                            }));
                        }
                    }

                    if let Some(raw) = financial.get(code.as_bytes())? {
                        let previous: FinancialApproval = decode(&raw).map_err(abort)?;
                        if previous.invoice_number != invoice {
                            invoices.remove(previous.invoice_number.as_bytes())?;
                        }
                    }

                    invoices.insert(invoice.as_bytes(), code.as_bytes())?;
                    financial.insert(code.as_bytes(), cbor.clone())?;
                    Ok(())
                },
            ),
        )?;

        info!(
            "Recorded invoice {} for {} ({:?})",
            invoice, code, approval.status
        );
        Ok(approval)
    }

    /// Record the forwarder's payment. The payer defaults to the container's
    /// assigned forwarder and must match it. A payment is recorded once and
    /// never replaced.
    pub fn record_forwarder_payment(
        &self,
        payment: ForwarderPayment,
    ) -> anyhow::Result<ForwarderPayment> {
        let container = self.get_container(&payment.container)?;
        let payment = payment.finalise(container.forwarder.as_deref(), &self.config)?;

        let code = container.code.to_string();
        let cbor = minicbor::to_vec(&payment)?;
        finish(
            (&self.containers, &self.forwarder_payments).transaction(|(containers, payments)| {
                if payments.get(code.as_bytes())?.is_some() {
                    return Err(abort(StoreError::AlreadyExists {
                        entity: "forwarder payment",
                        key: code.clone(),
                    }));
                }
                let stored: Container = load_tx(containers, "container", &code)?;
                if stored.forwarder != payment.forwarder {
                    return Err(abort(ValidationError::cross_reference(
                        "forwarder",
                        format!("container {code} was reassigned during payment"),
                    )));
                }
                payments.insert(code.as_bytes(), cbor.clone())?;
                Ok(())
            }),
        )?;

        info!(
            "Recorded forwarder payment for {} by {}",
            code,
            payment.forwarder.as_deref().unwrap_or_default()
        );
        Ok(payment)
    }

    pub fn delete_customs_approval(&self, code: &str) -> anyhow::Result<CustomsApproval> {
        let code = container_key(code);
        let removed = finish(self.customs.transaction(|customs| {
            let approval: CustomsApproval = load_tx(customs, "customs approval", &code)?;
            if approval.approved {
                return Err(abort(StoreError::ProtectedDeletion {
                    entity: "customs approval",
                    key: code.clone(),
                    reason: format!("dispatch {} is approved", approval.dispatch_number),
                }));
            }
            customs.remove(code.as_bytes())?;
            Ok(approval)
        }))?;

        info!("Deleted customs approval for {}", code);
        Ok(removed)
    }

    pub fn delete_financial_approval(&self, code: &str) -> anyhow::Result<FinancialApproval> {
        let code = container_key(code);
        let removed = finish((&self.financial, &self.invoices).transaction(|(financial, invoices)| {
            let approval: FinancialApproval = load_tx(financial, "financial approval", &code)?;
            if approval.allows_release() {
                return Err(abort(StoreError::ProtectedDeletion {
                    entity: "financial approval",
                    key: code.clone(),
                    reason: format!("invoice {} is {:?}", approval.invoice_number, approval.status),
                }));
            }
            invoices.remove(approval.invoice_number.as_bytes())?;
            financial.remove(code.as_bytes())?;
            Ok(approval)
        }))?;

        info!("Deleted financial approval for {}", code);
        Ok(removed)
    }

    /// Forwarder payments are final once recorded.
    pub fn delete_forwarder_payment(&self, code: &str) -> anyhow::Result<ForwarderPayment> {
        let code = container_key(code);
        let payment: ForwarderPayment = load(&self.forwarder_payments, "forwarder payment", &code)?;

        Err(StoreError::ProtectedDeletion {
            entity: "forwarder payment",
            key: code,
            reason: format!(
                "payment by {} is recorded",
                payment.forwarder.unwrap_or_default()
            ),
        }
        .into())
    }

    pub fn approvals(&self, code: &str) -> anyhow::Result<ApprovalSet> {
        let container = self.get_container(code)?;
        let code = container.code.as_str();

        Ok(ApprovalSet {
            customs: load_opt(&self.customs, code)?,
            financial: load_opt(&self.financial, code)?,
            forwarder_payment: load_opt(&self.forwarder_payments, code)?,
        })
    }

    pub fn release_eligible(&self, code: &str) -> anyhow::Result<bool> {
        Ok(self.approvals(code)?.release_eligible())
    }

    pub fn pending_approvals(&self, code: &str) -> anyhow::Result<Vec<PendingApproval>> {
        Ok(self.approvals(code)?.pending())
    }

    /// Unpaid invoices past their due date as of the clock's today.
    pub fn overdue_invoices(&self) -> anyhow::Result<Vec<FinancialApproval>> {
        let today = self.clock.today();
        let mut overdue = vec![];
        for raw in self.financial.iter().values() {
            let invoice: FinancialApproval = decode(&raw?)?;
            if invoice.is_overdue(today) {
                overdue.push(invoice);
            }
        }
        Ok(overdue)
    }

    /// Issue a gate pass for a container that is release eligible and not blocked.
    pub fn issue_gate_pass(&self, code: &str) -> anyhow::Result<GatePass> {
        let container = self.get_container(code)?;
        let code = container.code.to_string();
        let approvals = self.approvals(&code)?;

        let mut reasons: Vec<String> =
            approvals.pending().iter().map(ToString::to_string).collect();
        if container.blocked {
            reasons.insert(
                0,
                "container is blocked by an open hold, inspection or damage report".to_string(),
            );
        }
        if !reasons.is_empty() {
            warn!("Gate pass refused for {}: {}", code, reasons.join("; "));
            return Err(ValidationError::ReleaseRefused {
                container: code,
                reasons,
            }
            .into());
        }

        let call = self.get_vessel_call(&container.vessel_call)?;
        let pass = GatePass {
            primary_seal: container.primary_seal().unwrap_or_default(),
            route: container.route_summary(),
            container: code,
            vessel_call: call.id,
            vessel_name: call.vessel.name,
            forwarder: container.forwarder,
            dispatch_number: approvals
                .customs
                .map(|customs| customs.dispatch_number)
                .unwrap_or_default(),
            invoice_number: approvals
                .financial
                .map(|financial| financial.invoice_number)
                .unwrap_or_default(),
            issued_at: self.clock.now(),
        };

        info!("Issued gate pass for {}", pass.container);
        Ok(pass)
    }
}
