pub mod claims;
pub mod clock;
pub mod error;
pub mod signer;
pub mod ttl;

pub use claims::{SessionClaims, EXPIRES_AT_CLAIM, ISSUED_AT_CLAIM};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{FailureReason, TokenError, TokenResult};
pub use signer::{expiry_after, SessionStatus, SessionTokens};
pub use ttl::parse_ttl;
