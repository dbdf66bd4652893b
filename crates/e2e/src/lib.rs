//! Clubhouse access harness
//!
//! This crate verifies, through the real UI, that each role is offered
//! exactly the capabilities the expectation matrix says it should be:
//! - Establishes and tears down one browser session per role
//! - Probes capabilities by looking for their affordances, read-only
//! - Performs state-changing actions and undoes them afterwards
//! - Runs declarative YAML scenarios and reports every outcome
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  Access Harness (Rust)                      │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ScenarioRunner                                             │
//! │    ├── SessionController::establish/teardown -> Handle      │
//! │    ├── FixtureResolver::resolve(club) -> club id            │
//! │    ├── CapabilityProbe::probe(cap, ctx) -> ProbeResult      │
//! │    ├── ActionEngine::perform(action, ctx) -> Outcome        │
//! │    └── compensators (LIFO) -> CleanupReport                 │
//! ├─────────────────────────────────────────────────────────────┤
//! │  BrowserAutomation                                          │
//! │    ├── PlaywrightDriver (node, JSON lines)                  │
//! │    └── SimulatedClubApp (in-memory, `mock` feature)         │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Scenario (YAML)                                            │
//! │    ├── name, roles, fixture, timeout_ms                     │
//! │    └── steps: [Step]                                        │
//! │          ├── require_fixture { club }                       │
//! │          ├── probe { capability, expect?, blocking }        │
//! │          └── action { action, expect?, irreversible, ... }  │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Outcomes describe what the UI offers. Server-side enforcement has to be
//! verified separately.

pub mod action;
pub mod browser;
pub mod catalog;
pub mod config;
pub mod credentials;
pub mod error;
pub mod fixture;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod notification;
pub mod playwright;
pub mod probe;
pub mod report;
pub mod runner;
pub mod scenario;
pub mod session;
pub mod target;

pub use action::Action;
pub use browser::{BrowserAutomation, WaitOutcome, WaitState};
pub use config::HarnessConfig;
pub use credentials::{CredentialStore, Credentials};
pub use error::{E2eError, E2eResult};
#[cfg(any(test, feature = "mock"))]
pub use mock::SimulatedClubApp;
pub use playwright::PlaywrightDriver;
pub use report::{ScenarioReport, ScenarioStatus, SuiteReport};
pub use runner::{RunOptions, ScenarioRunner};
pub use scenario::{Scenario, Step};
pub use session::{SessionController, SessionHandle};
pub use target::TargetHandle;
