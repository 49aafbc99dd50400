//! Shared wire-adjacent types for the array provisioning control plane:
//! the error taxonomy, the benign-error-code catalog, the opaque REST
//! `Document` boundary type, and the tagged records/intents built on top of
//! it. No orchestration logic lives here — see `task-flow` and
//! `volume-orchestrator`.

pub mod benign;
pub mod document;
pub mod error;
pub mod intent;
pub mod record;

pub use benign::{classify, is_session_expired_code, BenignOutcome, Operation, BENIGN_CODES};
pub use document::Document;
pub use error::ArrayError;
pub use intent::{parse_authclient, AllocType, CloneSource, ResolvedIntent, VolumeIntent};
