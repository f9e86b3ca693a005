//! The heap checker's reporting sink.
//!
//! [`Heap::check_heap`](crate::Heap::check_heap) never repairs anything it
//! finds wrong; it only reports through a [`Diagnostics`] implementation,
//! matching the teacher's use of `log` throughout its address-space and
//! allocator code rather than unconditional `println!`-style debugging.

use crate::Offset;

/// Severity of a single diagnostic emitted by the heap checker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Informational trace, only emitted when verbose walking is requested.
    Trace,
    /// A genuine structural invariant violation.
    Error,
}

/// A sink for heap-checker output.
pub trait Diagnostics {
    /// Reports a single finding at the given severity.
    fn report(&mut self, severity: Severity, message: &str);

    /// Reports one block visited during a verbose walk. The default
    /// implementation routes through [`report`](Self::report) at
    /// [`Severity::Trace`].
    fn trace_block(&mut self, payload: Offset, size: u32, allocated: bool) {
        let _ = (payload, size, allocated);
    }
}

/// Default [`Diagnostics`] sink: routes everything through the `log` crate,
/// `warn!` for structural errors and `trace!` for per-block visits.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogDiagnostics;

impl Diagnostics for LogDiagnostics {
    fn report(&mut self, severity: Severity, message: &str) {
        match severity {
            Severity::Trace => log::trace!("{message}"),
            Severity::Error => log::warn!("heap check: {message}"),
        }
    }

    fn trace_block(&mut self, payload: Offset, size: u32, allocated: bool) {
        log::trace!("block {payload:?} size={size} allocated={allocated}");
    }
}
