//! Request authentication and identity enforcement.
//!
//! Three mutually exclusive credential schemes resolve "who is calling":
//! Telegram initData, backend session tokens, and external-provider tokens.
//! Whatever scheme wins, the identity enforcer then rejects any request
//! field asserting a different user.

pub mod chain;
pub mod claims;
pub mod external;
pub mod identity;
pub mod init_data;
pub mod session_token;
