pub(crate) mod coil {
    /// u16 representation of COIL == ON on the wire
    pub(crate) const ON: u16 = 0xFF00;
    /// u16 representation of COIL == OFF on the wire
    pub(crate) const OFF: u16 = 0x0000;
}

pub(crate) mod link {
    use std::time::Duration;

    /// Delay before the single automatic reconnect attempt in persistent mode
    pub(crate) const RECONNECT_DELAY: Duration = Duration::from_secs(5);
    /// Default request/response round-trip timeout
    pub(crate) const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
}

pub(crate) mod limits {
    /// Bit positions within a register are 1-based, so this is the largest valid index
    pub(crate) const MAX_BIT_INDEX: u16 = 16;
}
