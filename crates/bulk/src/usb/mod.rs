//! USB backend
//!
//! Drives bulk endpoints of an already opened and claimed device through
//! rusb. Device discovery, opening and configuration are left to the caller.

pub mod backend;
pub mod transfers;

pub use backend::RusbBackend;
pub use transfers::{execute_bulk_transfer, map_rusb_error};
