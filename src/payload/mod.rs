//! Application-layer parsing: data records, DIF/VIF interpretation and the
//! typed value decoders of EN 13757-3.

pub mod data;
pub mod dib;
pub mod record;
pub mod vif;
pub mod vif_tables;

pub use data::{MBusDate, MBusDateTime, MBusTime, MBusValue};
pub use dib::{Dib, MBusFunction};
pub use record::{
    decode_user_data, MBusDatagram, MBusIdentification, MBusRecord, MBusUserData, StatusByte,
};
pub use vif::{Transform, Vib};

use serde::Serialize;

/// Direction a frame or record travels in. Several DIF and VIF codes are
/// only legal in one direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Direction {
    MasterToSlave,
    SlaveToMaster,
}
