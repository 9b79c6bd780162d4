pub mod approval;
pub mod capacity;
pub mod config;
pub mod container;
pub mod context;
pub mod error;
pub mod event;
pub mod forwarder;
pub mod iso6346;
pub mod seals;
pub mod service;
pub mod time;
pub mod utils;
pub mod vessel;

pub use error::{FormatError, SequenceError, StoreError, ValidationError};
pub use iso6346::{compute_check_digit, generate_identifier, validate_identifier};
pub use seals::validate_seals;
pub use service::{GatePass, TrackingService};
