//! Per-channel delivery worker (§4.3): consume both the standard and
//! priority queue for a channel, render the template, send through the
//! provider, post status, and ack.

pub mod pipeline;
pub mod status;
pub mod worker;

pub use pipeline::{ChannelSender, FailedEnvelope};
pub use status::StatusClient;
pub use worker::{ChannelWorker, RetryPolicy};
