//! Redis-backed status and idempotency store (§3, §6 KV key schema).
//!
//! Every operation here is a single Redis command or pipeline of
//! independent commands — there are no multi-key transactions, matching
//! the platform's at-least-once delivery model rather than promising
//! exact-once consistency.

pub mod error;
pub mod store;

pub use error::StoreError;
pub use store::Store;

pub type Result<T> = std::result::Result<T, StoreError>;

/// Key-builder helpers, centralized so the schema in spec §6 has one
/// source of truth.
pub mod keys {
    pub fn request(request_id: &str) -> String {
        format!("request:{request_id}")
    }

    pub fn notification(notification_id: &str) -> String {
        format!("notification:{notification_id}")
    }

    pub fn user_notifications(user_id: &str) -> String {
        format!("user_notifications:{user_id}")
    }

    pub fn user(user_id: &str) -> String {
        format!("user:{user_id}")
    }

    pub fn template(code: &str, language: &str, version: Option<u32>) -> String {
        match version {
            Some(v) => format!("template:{code}:{language}:{v}"),
            None => format!("template:{code}:{language}:latest"),
        }
    }

    pub fn rate_limit(identifier: &str) -> String {
        format!("ratelimit:{identifier}")
    }

    pub fn idempotency(channel: &str, request_id: &str) -> String {
        format!("idempotency:{channel}:{request_id}")
    }
}

#[cfg(test)]
mod tests {
    use super::keys;

    #[test]
    fn template_key_falls_back_to_latest() {
        assert_eq!(keys::template("welcome", "en", None), "template:welcome:en:latest");
        assert_eq!(keys::template("welcome", "en", Some(3)), "template:welcome:en:3");
    }
}
