//! Firmware for a battery-powered, light-triggered fake fire.
//!
//! # Overview
//!
//! Four LEDs (two orange, two red) flicker like a small flame while it is
//! dark. A photocell is checked every ~8 seconds; while it is light the
//! LEDs are switched off and the MCU stays in STOP mode between checks.
//!
//! # Hardware
//!
//! - **MCU**: STM32L031G6U6 (Cortex-M0+, ultra-low-power)
//! - **LEDs**: 2x orange, 2x red, driven directly from GPIO
//! - **Light sensor**: photocell divider on ADC_IN0
//! - **RTC**: 32.768 kHz crystal clocking the wakeup timer in STOP mode
//!
//! # Low Power Operation
//!
//! - MSI oscillator at 66 kHz for minimal active current
//! - ADC powered only for the duration of a light reading
//! - LED pins in analog (high impedance) mode while it is light
//! - RTC wakeup timer wakes the MCU from STOP every 8 seconds
//!
//! # Module Organization
//!
//! - [`power`] - RTC wake timer and STOP mode sleep
//! - [`hardware`] - Pin mappings, LED and photocell drivers
//! - [`fake_fire`] - Flicker generator, light sampler and duty cycle

#![no_std]
#![no_main]

mod hardware;
mod power;

use cortex_m_rt::entry;
use embassy_stm32::{
    Config,
    rcc::{LsConfig, LseConfig, mux::ClockMux},
    time::Hertz,
};
use embassy_time::Delay;
use fake_fire::config::CONVERSION_SPIN_LIMIT;
use fake_fire::{FlameController, LightSampler, Settings};
use {defmt_rtt as _, panic_probe as _};

use hardware::Peripherals;
use power::{DeepSleep, WAKE_SIGNAL, setup_wake_timer};

/// Creates a low-power clock configuration for STM32L031.
///
/// # Clock Settings
///
/// - **MSI**: 66 kHz in normal mode, 2.097 MHz in debug mode (for reliable debugging)
/// - **System clock**: MSI (no PLL), also clocks the ADC through PCLK
/// - **LSE**: 32.768 kHz external crystal for RTC
/// - **Voltage scale**: Range 1 (1.8V core for low power)
///
/// MSI stays the system clock across STOP mode, so nothing needs to be
/// reconfigured after each wakeup.
///
/// # Returns
///
/// Configured RCC settings for embassy-stm32 initialization
fn create_low_power_config() -> embassy_stm32::rcc::Config {
    embassy_stm32::rcc::Config {
        #[cfg(feature = "debug-mode")]
        msi: Some(embassy_stm32::rcc::MSIRange::RANGE2M),
        #[cfg(not(feature = "debug-mode"))]
        msi: Some(embassy_stm32::rcc::MSIRange::RANGE66K),
        hsi: false,
        hse: None,
        pll: None,
        sys: embassy_stm32::rcc::Sysclk::MSI,
        ahb_pre: embassy_stm32::rcc::AHBPrescaler::DIV1,
        apb1_pre: embassy_stm32::rcc::APBPrescaler::DIV1,
        apb2_pre: embassy_stm32::rcc::APBPrescaler::DIV1,
        ls: LsConfig {
            rtc: embassy_stm32::rcc::RtcClockSource::LSE,
            lsi: false,
            lse: Some(LseConfig {
                frequency: Hertz::hz(32768),
                mode: embassy_stm32::rcc::LseMode::Oscillator(embassy_stm32::rcc::LseDrive::Low),
            }),
        },
        voltage_scale: embassy_stm32::rcc::VoltageScale::RANGE1,
        mux: ClockMux::default(),
    }
}

/// Main entry point for fake fire firmware.
///
/// # Initialization Sequence
///
/// 1. Configure clocks for low power operation (66 kHz MSI)
/// 2. Initialize STM32 peripherals
/// 3. Initialize GPIO, LEDs and photocell (everything high impedance)
/// 4. Configure STOP mode
/// 5. Request an immediate light check, then arm the RTC wake timer
/// 6. Hand control to the flame controller, which never returns
#[entry]
fn main() -> ! {
    let mut config = Config::default();
    config.rcc = create_low_power_config();

    let p = embassy_stm32::init(config);
    let mut core = cortex_m::Peripherals::take().unwrap();

    #[cfg(feature = "debug-mode")]
    defmt::info!("Fake fire firmware starting...");

    #[cfg(feature = "debug-mode")]
    defmt::info!("Initializing peripherals...");

    let peripherals = Peripherals::new(p);
    let sleeper = DeepSleep::new(&mut core.SCB);

    // Check the light level right away instead of after the first period
    WAKE_SIGNAL.notify();

    #[cfg(feature = "debug-mode")]
    defmt::info!("Setting up wake timer...");

    setup_wake_timer();

    #[cfg(feature = "debug-mode")]
    defmt::info!("Entering duty cycle loop...");

    FlameController::new(
        peripherals.leds,
        LightSampler::new(peripherals.photocell, CONVERSION_SPIN_LIMIT),
        sleeper,
        Delay,
        &WAKE_SIGNAL,
        Settings::default(),
    )
    .run()
}
