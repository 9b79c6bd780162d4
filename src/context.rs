//! Per-container event history and the sequencing rules applied to it.
use super::event::{ContainerEvent, EventType};
use crate::error::{SequenceError, ValidationError};

/// Status shown for a container that has no recorded events.
pub const NO_MOVEMENT: &str = "No movement";

#[derive(Debug, Clone, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub struct ContainerContext {
    #[n(0)]
    pub container: String, // ISO 6346 code
    #[n(1)]
    pub event_set: Vec<ContainerEvent>, // accepted events, in submission order
}

impl ContainerContext {
    pub fn new(container: &str) -> Self {
        Self {
            container: container.to_string(),
            event_set: vec![],
        }
    }

    /// Check `event` against the recorded history without recording it.
    pub fn check_sequence(&self, event: &ContainerEvent) -> Result<(), SequenceError> {
        let kind = event.kind;

        // chronology
        if let Some(prior) = self.last_event() {
            if event.timestamp < prior.timestamp {
                return Err(SequenceError::OutOfOrder {
                    event: kind,
                    timestamp: event.timestamp.to_string(),
                    prior: prior.kind,
                    prior_timestamp: prior.timestamp.to_string(),
                });
            }
        }

        if !kind.is_repeatable() && self.contains(kind) {
            return Err(SequenceError::Duplicate { event: kind });
        }

        let required = kind.prerequisites();
        if !required.is_empty() && !required.iter().any(|k| self.contains(*k)) {
            return Err(SequenceError::MissingPrerequisite {
                event: kind,
                required: required.to_vec(),
            });
        }

        // no skipping back behind a later milestone
        if let Some(rank) = kind.rank() {
            let furthest = self
                .event_set
                .iter()
                .filter_map(|e| e.kind.rank().map(|r| (r, e.kind)))
                .max_by_key(|(r, _)| *r);

            if let Some((recorded_rank, recorded)) = furthest {
                if recorded_rank > rank {
                    return Err(SequenceError::SkippedAhead {
                        event: kind,
                        recorded,
                    });
                }
            }
        }

        Ok(())
    }

    /// Validate, normalise and record `event`, then return the stored copy.
    pub fn accept(&mut self, mut event: ContainerEvent) -> Result<ContainerEvent, ValidationError> {
        if event.container != self.container {
            return Err(ValidationError::cross_reference(
                "container",
                format!(
                    "event for {} submitted to history of {}",
                    event.container, self.container
                ),
            ));
        }

        self.check_sequence(&event)?;

        let has_vessel = event
            .vessel
            .as_deref()
            .is_some_and(|vessel| !vessel.trim().is_empty());
        if event.kind.is_maritime() && !has_vessel {
            return Err(ValidationError::cross_reference(
                "vessel",
                format!("{} events must reference a vessel", event.kind.code()),
            ));
        }

        event.normalise();
        self.insert_event(event.clone());

        Ok(event)
    }

    /// Append without validation. Used when replaying stored history.
    pub fn insert_event(&mut self, event: ContainerEvent) {
        self.event_set.push(event);
    }

    pub fn contains(&self, kind: EventType) -> bool {
        self.event_set.iter().any(|e| e.kind == kind)
    }

    /// Event with the latest timestamp; ties go to the later submission.
    pub fn last_event(&self) -> Option<&ContainerEvent> {
        self.event_set
            .iter()
            .enumerate()
            .max_by_key(|(idx, e)| (e.timestamp, *idx))
            .map(|(_, e)| e)
    }

    pub fn current_status(&self) -> &'static str {
        self.last_event()
            .map(|e| e.kind.label())
            .unwrap_or(NO_MOVEMENT)
    }

    /// Events sorted by timestamp, stable on submission order.
    pub fn timeline(&self) -> Vec<&ContainerEvent> {
        let mut events: Vec<&ContainerEvent> = self.event_set.iter().collect();
        events.sort_by_key(|e| e.timestamp);
        events
    }

    /// Replay the full history: a hold, damage or inspection blocks the
    /// container until the next customs release.
    pub fn is_blocked(&self) -> bool {
        self.timeline().into_iter().fold(false, |blocked, e| {
            if e.kind.is_blocking() {
                true
            } else if e.kind.is_release() {
                false
            } else {
                blocked
            }
        })
    }

    /// One `timestamp | kind | location | vessel` row per event, in timeline order.
    pub fn view_history(&self) -> Vec<String> {
        self.timeline()
            .into_iter()
            .map(|event| {
                format!(
                    "{} | {:<16} | {} | {}",
                    event.timestamp,
                    event.kind.code(),
                    event.location,
                    event.vessel.as_deref().unwrap_or("-")
                )
            })
            .collect()
    }
}
