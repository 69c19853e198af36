//! One-time SSH tunnels between two Rescale jobs.
//!
//! A fresh keypair is generated per run: the private half is uploaded to
//! job1, the public half is appended to job2's `authorized_keys`, and a
//! script on job1 opens the forwarded session.

pub mod cli;
pub mod error;
pub mod forward;
pub mod orchestrator;
pub mod script;

pub use error::TunnelError;
pub use forward::LocalForward;
pub use orchestrator::{create_tunnel, TunnelReport, TunnelRequest};
