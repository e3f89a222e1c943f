//! Provider send primitives for the two supported channels. Error
//! classification (retryable vs terminal) happens here, close to the
//! wire, so the worker pipeline only has to act on it.

pub mod email;
pub mod push;

pub use email::{EmailProvider, SendGridEmailProvider, SmtpConfig, SmtpEmailProvider};
pub use push::{FcmPushProvider, PushProvider};
