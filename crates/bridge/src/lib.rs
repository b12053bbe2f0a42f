#![deny(unsafe_code)]

//! Transport bridge between the credential-holding backend and the UI.
//!
//! Each send operation gets a dedicated bidirectional session: chunks,
//! completion, and errors flow outbound in FIFO order; a single abort frame
//! flows inbound. The backend pump cooperatively cancels the generator and
//! the UI endpoint synthesizes a terminal error if the channel dies early.

mod pump;
mod service;
mod session;

pub use pump::serve;
pub use service::{ConfigSource, InferenceService, ServiceError, ServiceResult};
pub use session::{
    AbortHandle, BackendEndpoint, DISCONNECT_MESSAGE, SessionState, UiEndpoint, open_session,
};
