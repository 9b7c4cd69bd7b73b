//! Configuration constants for the flicker controller.
//!
//! Everything here is fixed at build time. The controller copies the
//! runtime-relevant values into [`crate::Settings`] so tests can override
//! them without touching the constants.

// Light Detection
/// Photocell reading below which it is considered dark, in raw 10-bit ADC counts.
///
/// The photocell sits in a divider that pulls the input towards ground as
/// light falls, so small readings mean darkness.
pub const LIGHT_THRESHOLD: u16 = 10;

/// Conversions averaged into one light reading (after the warm-up conversion).
pub const SAMPLES_PER_READING: u32 = 8;

/// Right shift dividing the accumulated conversions by [`SAMPLES_PER_READING`].
pub const AVERAGING_SHIFT: u32 = 3;

// Flicker Configuration
/// Hold time between flicker iterations in milliseconds.
///
/// Sets the visible flicker rate; unrelated to the wake period.
pub const FLICKER_DELAY_MS: u32 = 6;

/// Seed loaded into the random generator at every boot.
pub const RANDOM_SEED: u16 = 10;

// Wake Timer Configuration
/// Period of the light check wakeup in seconds.
pub const WAKE_PERIOD_SECS: u32 = 8;

/// RTC kernel clock (LSE crystal) in Hz.
pub const RTC_CLOCK_HZ: u32 = 32_768;

/// Prescaler between RTCCLK and the wakeup timer counter (WUCKSEL = RTC/16).
pub const WAKE_CLOCK_DIVIDER: u32 = 16;

/// Auto-reload value for the RTC wakeup counter.
///
/// The counter fires once every `WUT + 1` ticks of RTCCLK / 16 (2048 Hz).
pub const WAKE_TIMER_RELOAD: u16 = (WAKE_PERIOD_SECS * RTC_CLOCK_HZ / WAKE_CLOCK_DIVIDER - 1) as u16;

// ADC Timing
/// ADC clock cycles per 10-bit conversion: 79.5 sampling + 10.5 conversion, rounded up.
///
/// The long sampling window lets the high-impedance photocell divider settle.
pub const CONVERSION_ADC_CYCLES: u32 = 91;

/// Core clock cycles per ADC clock cycle (ADC is clocked synchronously from PCLK / 1).
pub const ADC_CLOCK_DIVIDER: u32 = 1;

/// Upper bound on ready-flag polls while waiting for one ADC conversion.
///
/// Every poll costs at least one core cycle, so this covers four full
/// conversions before the wait is abandoned.
pub const CONVERSION_SPIN_LIMIT: u32 = CONVERSION_ADC_CYCLES * ADC_CLOCK_DIVIDER * 4;

/// Upper bound on polls while waiting for RTC or ADC control-register handshakes.
///
/// The slowest handshake (RTC wakeup write access) takes two RTCCLK periods,
/// which is a few core cycles at 65 kHz and ~130 at 2 MHz.
pub const REGISTER_SYNC_SPIN_LIMIT: u32 = 10_000;
