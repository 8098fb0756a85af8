//! dialang-core: adaptive placement and scoring engine.
//!
//! This crate holds the reference catalog, the pre-test scorers (VSPT and
//! self-assessment), booklet selection, item scoring and final grading, and
//! the session state machine that ties them together.

pub mod capture;
pub mod catalog;
pub mod engine;
pub mod error;
pub mod form;
pub mod grading;
pub mod matcher;
pub mod model;
pub mod sa;
pub mod scoring;
pub mod selector;
pub mod session;
pub mod vspt;

pub use catalog::ReferenceCatalog;
pub use engine::{EngineConfig, TestEngine};
pub use error::{EngineError, ErrorKind, SinkError};
pub use session::{SessionPhase, TestSession};
