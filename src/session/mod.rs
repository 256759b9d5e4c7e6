//! Session orchestration.
//!
//! - `provider`: the asynchronous reply boundary and the simulated backend
//! - `services`: screenshot and export collaborators
//! - `controller`: the single owner of session state

pub mod controller;
pub mod provider;
pub mod services;

pub use controller::{
    Completion, CompletionOutcome, RequestTicket, SendOutcome, SessionController,
    SessionServices, SessionUpdate,
};
pub use provider::{ProviderFuture, ResponseProvider, SimulatedProvider};
pub use services::{CaptureService, ExportFuture, ExportService, JsonExporter, LoggingCapture};
