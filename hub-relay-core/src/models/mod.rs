/// Hub state machine
pub mod hub;
/// Delivery verifier
pub mod inbox;
/// Outbound bundling shared by hub and spokes
pub mod outbox;
/// Spoke state machine
pub mod spoke;

pub use hub::*;
pub use inbox::*;
pub use outbox::*;
pub use spoke::*;
