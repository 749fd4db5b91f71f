//! Cortex API protocol domain modules.
//!
//! This namespace groups wire-compatible JSON-RPC protocol structures by domain:
//! - [`auth`]: account information.
//! - [`rpc`]: JSON-RPC request/response/error envelopes and push warnings.
//! - [`constants`]: method names, error and warning codes, stream names.
//! - [`headset`]: headset discovery payloads and device commands.
//! - [`session`]: session lifecycle payloads.
//! - [`streams`]: subscribe results and typed stream data.
//! - [`profiles`]: profile query and setup payloads.

pub mod auth;
pub mod constants;
pub mod headset;
pub mod profiles;
pub mod rpc;
pub mod session;
pub mod streams;
