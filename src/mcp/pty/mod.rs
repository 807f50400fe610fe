//! Interactive PTY session protocol: stream framing, markers and the
//! bootstrap-then-command driver.

pub mod driver;
pub mod framer;
pub mod marker;

pub use driver::{
    Completion, EXIT_CODE_TOKEN, SessionEnvironment, SessionPlan, SessionResult, SessionState,
    parse_exit_code, run_remote_command,
};
pub use framer::{Frame, Framer, strip_control_sequences};
pub use marker::{Marker, MarkerKind};
