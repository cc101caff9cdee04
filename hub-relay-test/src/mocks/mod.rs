/// In-memory and mock connectors
pub mod connector;

/// Fee vault double and mock fee distributor
pub mod fees;

/// Recording and mock message receivers
pub mod receiver;

pub use connector::{ConnectorOffline, Envelope, InMemoryConnector, MockConnector};
pub use fees::{InMemoryFeeVault, MockFeeDistributor};
pub use receiver::{MockMessageReceiver, ReceivedCall, RecordingReceiver};
