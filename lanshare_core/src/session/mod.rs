//! Transfer sessions
//!
//! The state machine for a single upload or download and the controller that
//! owns it on the client side.

mod controller;
mod state;

pub use controller::SessionController;
pub use state::{Direction, Resumption, SessionError, SessionState, TransferSession};
