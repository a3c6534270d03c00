//! Halting on protocol-design faults.
//!
//! A [`ProtocolFault`] means validation let through something delivery
//! cannot honor. The bridge never swallows one: it is logged at `error`
//! and the process panics.

use hubbridge_types::ProtocolFault;

/// Log `fault` and panic with its message.
#[track_caller]
pub fn halt(fault: ProtocolFault) -> ! {
    tracing::error!(%fault, "Protocol fault, halting");
    panic!("{fault}");
}
