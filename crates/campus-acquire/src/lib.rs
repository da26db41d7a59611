//! Page acquisition for a bot-protected academic portal.
//!
//! An [`Orchestrator`] walks a fixed chain of [`AcquisitionStrategy`]s,
//! validating each response, until one yields a usable page. [`Portal`]
//! maps the portal's endpoints onto it.

pub mod config;
pub mod dns;
pub mod identity;
pub mod orchestrator;
pub mod portal;
pub mod session;
pub mod strategy;
pub mod types;

pub use config::PortalConfig;
pub use dns::FallbackResolver;
pub use identity::{IdentityRotation, Jitter};
pub use orchestrator::Orchestrator;
pub use portal::{Portal, PortalError};
pub use session::{evaluate_login, evaluate_login_with};
pub use strategy::{assemble_chain, AcquisitionStrategy, Capabilities};
pub use types::{
    AcquireError, AcquisitionResult, AttemptError, AttemptOutcome, CookieSet, FetchAttempt,
    FetchRequest, Fetched, Method, StrategyKind,
};
