//! Outcome of one unit of CPU stepping.
//!
//! A result starts out `Invalid` and must be finalized exactly once with
//! [`set_ok`](DispatchResult::set_ok), [`set_trap`](DispatchResult::set_trap)
//! or [`set_fatal`](DispatchResult::set_fatal) before anyone reads it. Reading
//! an unfinalized result, finalizing twice, or asking a non-trap result for
//! its trap details are programming errors and panic.

use std::fmt;

/// Status of a dispatch result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchStatus {
    /// Freshly constructed; never valid to observe.
    Invalid,
    /// The step completed normally.
    Ok,
    /// The step stopped at a diagnostic trap (debugger-style break).
    Trap,
    /// The step hit an unrecoverable condition.
    Fatal,
}

/// The result of a step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchResult {
    status: DispatchStatus,
    cycles: u64,
    message: String,
    address: u16,
    was_read_trap: bool,
}

impl Default for DispatchResult {
    fn default() -> Self {
        Self::new()
    }
}

impl DispatchResult {
    /// An unfinalized result.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            status: DispatchStatus::Invalid,
            cycles: 0,
            message: String::new(),
            address: 0,
            was_read_trap: false,
        }
    }

    #[must_use]
    pub fn ok(cycles: u64) -> Self {
        let mut result = Self::new();
        result.set_ok(cycles);
        result
    }

    #[must_use]
    pub fn trap(cycles: u64, message: impl Into<String>, address: u16, was_read_trap: bool) -> Self {
        let mut result = Self::new();
        result.set_trap(cycles, message, address, was_read_trap);
        result
    }

    #[must_use]
    pub fn fatal(cycles: u64) -> Self {
        let mut result = Self::new();
        result.set_fatal(cycles);
        result
    }

    /// The status. Panics if the result was never finalized.
    #[must_use]
    pub fn status(&self) -> DispatchStatus {
        self.assert_finalized();
        self.status
    }

    /// Cycles consumed. Panics if the result was never finalized.
    #[must_use]
    pub fn cycles(&self) -> u64 {
        self.assert_finalized();
        self.cycles
    }

    /// Trap message. Panics unless the status is `Trap`.
    #[must_use]
    pub fn message(&self) -> &str {
        self.assert_status(DispatchStatus::Trap);
        &self.message
    }

    /// Address that triggered the trap. Panics unless the status is `Trap`.
    #[must_use]
    pub fn address(&self) -> u16 {
        self.assert_status(DispatchStatus::Trap);
        self.address
    }

    /// Whether the trap fired on a read. Panics unless the status is `Trap`.
    #[must_use]
    pub fn was_read_trap(&self) -> bool {
        self.assert_status(DispatchStatus::Trap);
        self.was_read_trap
    }

    /// True for `Ok` and `Trap`: the emulated machine is still consistent.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self.status(), DispatchStatus::Ok | DispatchStatus::Trap)
    }

    pub fn set_ok(&mut self, cycles: u64) {
        self.assert_unfinalized();
        self.status = DispatchStatus::Ok;
        self.cycles = cycles;
    }

    pub fn set_trap(&mut self, cycles: u64, message: impl Into<String>, address: u16, was_read_trap: bool) {
        self.assert_unfinalized();
        self.status = DispatchStatus::Trap;
        self.cycles = cycles;
        self.message = message.into();
        self.address = address;
        self.was_read_trap = was_read_trap;
    }

    pub fn set_fatal(&mut self, cycles: u64) {
        self.assert_unfinalized();
        self.status = DispatchStatus::Fatal;
        self.cycles = cycles;
    }

    fn assert_status(&self, status: DispatchStatus) {
        assert!(
            self.status == status,
            "dispatch result is {:?}, expected {status:?}",
            self.status
        );
    }

    fn assert_finalized(&self) {
        assert!(
            self.status != DispatchStatus::Invalid,
            "dispatch result observed before it was finalized"
        );
    }

    fn assert_unfinalized(&self) {
        assert!(
            self.status == DispatchStatus::Invalid,
            "dispatch result already finalized as {:?}",
            self.status
        );
    }
}

impl fmt::Display for DispatchResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            DispatchStatus::Invalid => write!(f, "invalid"),
            DispatchStatus::Ok => write!(f, "ok ({} cycles)", self.cycles),
            DispatchStatus::Trap => {
                let access = if self.was_read_trap { "read" } else { "write" };
                write!(
                    f,
                    "trap: {} ({access} ${:04X}, {} cycles)",
                    self.message, self.address, self.cycles
                )
            }
            DispatchStatus::Fatal => write!(f, "fatal ({} cycles)", self.cycles),
        }
    }
}
