use core::fmt;
use core::ops::{Add, AddAssign, Sub};
use core::time::Duration;

/// A point on the simulation timeline, in nanoseconds since the start of
/// the simulation.
///
/// Simulated time only moves forward; subtracting a later instant from an
/// earlier one is an invariant violation and halts the program.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SimTime(u64);

impl SimTime {
    /// The start of the simulation.
    pub const ZERO: SimTime = SimTime(0);

    /// Build an instant from whole seconds.
    pub fn from_secs(secs: u64) -> Self {
        SimTime(secs * 1_000_000_000)
    }

    /// Build an instant from milliseconds.
    pub fn from_millis(millis: u64) -> Self {
        SimTime(millis * 1_000_000)
    }

    /// Build an instant from microseconds.
    pub fn from_micros(micros: u64) -> Self {
        SimTime(micros * 1_000)
    }

    /// Build an instant from nanoseconds.
    pub fn from_nanos(nanos: u64) -> Self {
        SimTime(nanos)
    }

    /// Nanoseconds since the start of the simulation.
    pub fn as_nanos(self) -> u64 {
        self.0
    }

    /// Seconds since the start of the simulation, as a float.
    pub fn as_secs_f64(self) -> f64 {
        self.0 as f64 / 1e9
    }
}

impl Add<Duration> for SimTime {
    type Output = SimTime;

    fn add(self, rhs: Duration) -> SimTime {
        SimTime(self.0 + rhs.as_nanos() as u64)
    }
}

impl AddAssign<Duration> for SimTime {
    fn add_assign(&mut self, rhs: Duration) {
        self.0 += rhs.as_nanos() as u64;
    }
}

impl Sub<SimTime> for SimTime {
    type Output = Duration;

    fn sub(self, rhs: SimTime) -> Duration {
        assert!(self.0 >= rhs.0, "simulation time went backwards");
        Duration::from_nanos(self.0 - rhs.0)
    }
}

impl fmt::Display for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6}s", self.as_secs_f64())
    }
}

/// A physical-layer bit rate, in bits per second.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataRate(u64);

impl DataRate {
    /// Build a rate from bits per second. Zero rates are rejected.
    pub fn from_bps(bps: u64) -> Self {
        assert!(bps > 0, "data rate must be non-zero");
        DataRate(bps)
    }

    /// The rate in bits per second.
    pub fn bits_per_sec(self) -> u64 {
        self.0
    }

    /// Time needed to push `bytes` onto the air at this rate.
    pub fn transfer_time(self, bytes: usize) -> Duration {
        Duration::from_nanos(bytes as u64 * 8 * 1_000_000_000 / self.0)
    }
}

impl fmt::Display for DataRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}bps", self.0)
    }
}
