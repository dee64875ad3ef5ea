//! Application Services
//!
//! - `dispatcher`: routes one record to the resolver or the store
//! - `session`: the session controller and its ingestion loop

mod dispatcher;
mod session;

pub use dispatcher::{DispatchOutcome, dispatch};
pub use session::{SessionConfig, SessionHandle, StreamSession};
