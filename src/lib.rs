//! Hardware-independent core of the fake fire flicker controller.
//!
//! The firmware binary wires these pieces to STM32L031 peripherals; the
//! host test suite wires them to recording mocks.
//!
//! # Module Organization
//!
//! - [`config`] - Timing, threshold and clock constants
//! - [`lfsr`] - 16-bit pseudo-random sequence generator
//! - [`light_sensor`] - Averaged photocell sampling and bounded spin-waits
//! - [`wake`] - Coalescing wake signal and the low-power sleep contract
//! - [`flame_controller`] - Duty-cycle state machine driving the four LEDs

#![cfg_attr(not(test), no_std)]

pub mod config;
pub mod flame_controller;
pub mod lfsr;
pub mod light_sensor;
pub mod wake;

pub use flame_controller::{Channel, FlameController, FlameOutputs, LightMode, OutputMask, Settings};
pub use lfsr::Lfsr16;
pub use light_sensor::{AdcHandshake, AnalogFrontEnd, LightSampler, SpinTimeout, spin_until};
pub use wake::{LowPower, WakeSignal};
