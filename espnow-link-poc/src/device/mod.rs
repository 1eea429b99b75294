//! Everything needed to exchange datagrams between peers using the physical
//! radio interface.

pub mod device;
pub mod frame;
pub mod peer;

pub use device::*;
