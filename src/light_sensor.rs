//! Averaged photocell sampling.
//!
//! The analog front end is powered up only for the duration of one
//! reading. The first conversion after enabling is unreliable and is
//! thrown away; the next [`SAMPLES_PER_READING`] conversions are averaged.

use crate::config::{AVERAGING_SHIFT, SAMPLES_PER_READING};

/// Register-level contract for the analog input feeding the photocell.
pub trait AnalogFrontEnd {
    /// Powers up and configures the converter.
    fn enable(&mut self);

    /// Starts a single conversion.
    fn start_conversion(&mut self);

    /// True once the conversion started last has finished.
    fn conversion_done(&mut self) -> bool;

    /// Raw result of the last finished conversion.
    fn read(&mut self) -> u16;

    /// Powers the converter down completely.
    fn disable(&mut self);
}

/// A bounded busy-wait gave up before its condition became true.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "debug-mode", derive(defmt::Format))]
pub struct SpinTimeout;

/// Polls `ready` until it returns true, at most `limit` times.
///
/// This is the only form of waiting on a hardware flag in the firmware.
pub fn spin_until(limit: u32, mut ready: impl FnMut() -> bool) -> Result<(), SpinTimeout> {
    for _ in 0..limit {
        if ready() {
            return Ok(());
        }
    }
    Err(SpinTimeout)
}

/// Control and status bits of an ADC with STM32L0-style enable, stop and
/// disable handshakes.
///
/// Setting a request bit does not take effect immediately; the matching
/// status bit has to be polled.
pub trait AdcHandshake {
    /// Switches the converter's voltage regulator (ADVREGEN).
    fn set_regulator(&mut self, on: bool);

    /// Starts a self-calibration (ADCAL).
    fn start_calibration(&mut self);

    /// Calibration still running.
    fn calibrating(&mut self) -> bool;

    /// Clears the ready flag (ADRDY).
    fn clear_ready(&mut self);

    /// Requests enable (ADEN).
    fn request_enable(&mut self);

    /// Converter enabled and ready to convert (ADRDY).
    fn ready(&mut self) -> bool;

    /// A conversion is in progress (ADSTART).
    fn converting(&mut self) -> bool;

    /// Requests an ongoing conversion to stop (ADSTP).
    fn request_stop(&mut self);

    /// Stop request still pending.
    fn stopping(&mut self) -> bool;

    /// Requests disable (ADDIS). Ignored while a conversion is in progress.
    fn request_disable(&mut self);

    /// Converter still enabled (ADEN).
    fn enabled(&mut self) -> bool;
}

/// Regulator on, calibrate, enable, wait for ready.
///
/// ADEN does not always latch right after calibration, so it is requested
/// again on every poll of the ready flag.
pub fn power_up(adc: &mut impl AdcHandshake, spin_limit: u32) -> Result<(), SpinTimeout> {
    adc.set_regulator(true);

    adc.start_calibration();
    let calibrated = spin_until(spin_limit, || !adc.calibrating());

    adc.clear_ready();
    let ready = spin_until(spin_limit, || {
        adc.request_enable();
        adc.ready()
    });

    calibrated.and(ready)
}

/// Stop any conversion, disable, then switch the regulator off.
///
/// The regulator is left on only if the converter refuses to disable,
/// since it must not be cut under an enabled converter.
pub fn power_down(adc: &mut impl AdcHandshake, spin_limit: u32) -> Result<(), SpinTimeout> {
    let mut stopped = Ok(());
    if adc.converting() {
        adc.request_stop();
        stopped = spin_until(spin_limit, || !adc.stopping());
    }

    adc.request_disable();
    let disabled = spin_until(spin_limit, || !adc.enabled());
    if disabled.is_ok() {
        adc.set_regulator(false);
    }

    stopped.and(disabled)
}

/// Averaging light sampler on top of an [`AnalogFrontEnd`].
pub struct LightSampler<A> {
    afe: A,
    spin_limit: u32,
}

impl<A: AnalogFrontEnd> LightSampler<A> {
    /// Creates a sampler that waits at most `spin_limit` polls per conversion.
    pub fn new(afe: A, spin_limit: u32) -> Self {
        Self { afe, spin_limit }
    }

    /// Takes one averaged reading in raw converter counts.
    ///
    /// The front end is always disabled again before returning, so the
    /// caller may go straight to sleep afterwards.
    pub fn sample(&mut self) -> u16 {
        self.afe.enable();

        // Warm-up conversion, result discarded
        self.convert();

        let sum: u32 = (0..SAMPLES_PER_READING)
            .map(|_| u32::from(self.convert()))
            .sum();

        self.afe.disable();

        (sum >> AVERAGING_SHIFT) as u16
    }

    /// Runs one conversion and returns its raw result.
    ///
    /// On timeout the data register is read anyway; there is nobody to
    /// report the failure to.
    fn convert(&mut self) -> u16 {
        self.afe.start_conversion();

        let afe = &mut self.afe;
        if let Err(_timeout) = spin_until(self.spin_limit, || afe.conversion_done()) {
            #[cfg(feature = "debug-mode")]
            defmt::warn!("ADC conversion timed out: {}", _timeout);
        }

        self.afe.read()
    }

    /// Gives the front end back, e.g. to inspect a mock.
    pub fn into_inner(self) -> A {
        self.afe
    }
}
