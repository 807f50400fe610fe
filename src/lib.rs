//! Remote command execution over an interactive SSH terminal, exposed as LLM
//! tools.
//!
//! The remote toolchain is activated by a stateful shell step, so commands run
//! inside a PTY session: banner drain, environment bootstrap, then the
//! command, each delimited by a unique marker. See [`mcp::pty`].

pub mod mcp;
