pub use connector::*;
pub use encode::*;
pub use fees::*;
pub use receiver::*;

mod connector;
mod encode;
mod fees;
mod receiver;
