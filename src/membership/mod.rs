//! Membership: dated entitlements and the gates that consult them.

mod gate;
mod service;
mod store;

pub use gate::{GateError, MembershipGate};
pub use service::{EXPIRING_WINDOW_DAYS, MembershipError, MembershipService, MembershipType};
pub use store::MembershipStore;
