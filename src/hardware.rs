//! Hardware abstraction and peripheral initialization.
//!
//! This module defines the pin mappings for the fake fire board and the
//! STM32 implementations of the LED and photocell contracts.
//!
//! # Pin Assignments
//!
//! ## Flame LEDs (active high, 20 mA max each)
//! - **PA4**: LED_ORANGE1
//! - **PA5**: LED_ORANGE2
//! - **PA6**: LED_RED1
//! - **PA7**: LED_RED2
//!
//! ## Light Sensor
//! - **PA0**: PHOTO (ADC_IN0) - Photocell/resistor divider, low in the dark
//!
//! ## Low Power & RTC
//! - **PC14**: OSC32_IN - 32.768 kHz crystal input
//! - **PC15**: OSC32_OUT - 32.768 kHz crystal output
//!
//! ## Debug (SWD)
//! - **PA13**: SWDIO
//! - **PA14**: SWCLK

use embassy_stm32::gpio::{Flex, Speed};
use embassy_stm32::pac;
use embassy_stm32::pac::adc::vals::{Ckmode, Res, SampleTime};

use fake_fire::config::REGISTER_SYNC_SPIN_LIMIT;
use fake_fire::light_sensor::{AdcHandshake, power_down, power_up};
use fake_fire::{AnalogFrontEnd, Channel, FlameOutputs, OutputMask};

/// ADC channel wired to the photocell divider (PA0).
const PHOTO_ADC_CHANNEL: usize = 0;

/// Top-level peripheral container for the fake fire board.
pub struct Peripherals {
    /// The four flame LEDs
    pub leds: FlameLeds,
    /// Photocell analog input
    pub photocell: Photocell,
}

impl Peripherals {
    /// Initializes all peripherals from STM32 peripheral singleton.
    ///
    /// # Initial GPIO States
    ///
    /// - PA4..PA7 (LEDs): Analog (high impedance, output latch low)
    /// - PA0 (PHOTO): Analog
    ///
    /// # Arguments
    ///
    /// * `p` - STM32 peripheral singleton from embassy_stm32::init()
    pub fn new(p: embassy_stm32::Peripherals) -> Self {
        let mut photo = Flex::new(p.PA0);
        photo.set_as_analog();

        let mut leds = FlameLeds::new([
            Flex::new(p.PA4),
            Flex::new(p.PA5),
            Flex::new(p.PA6),
            Flex::new(p.PA7),
        ]);
        leds.release();

        Self {
            leds,
            photocell: Photocell { _pin: photo },
        }
    }
}

/// The four flame LED pins, indexed by [`Channel`].
pub struct FlameLeds {
    pins: [Flex<'static>; 4],
    /// Pins are currently push-pull outputs
    driven: bool,
}

impl FlameLeds {
    fn new(pins: [Flex<'static>; 4]) -> Self {
        Self {
            pins,
            driven: false,
        }
    }
}

impl FlameOutputs for FlameLeds {
    fn drive(&mut self) {
        if self.driven {
            return;
        }
        for pin in &mut self.pins {
            pin.set_low();
            pin.set_as_output(Speed::Low);
        }
        self.driven = true;
    }

    fn write(&mut self, mask: OutputMask) {
        for channel in Channel::ALL {
            let pin = &mut self.pins[channel.index()];
            if mask.is_on(channel) {
                pin.set_high();
            } else {
                pin.set_low();
            }
        }
    }

    /// Analog mode disconnects the input Schmitt trigger, which is the
    /// lowest-leakage pin state on STM32L0.
    fn release(&mut self) {
        for pin in &mut self.pins {
            pin.set_low();
            pin.set_as_analog();
        }
        self.driven = false;
    }
}

/// ADC1 reading the photocell on PA0.
///
/// The ADC is clocked from PCLK and only powered while a reading is in
/// progress. Registers are driven through the PAC so enable and teardown
/// happen exactly when the sampler asks for them.
pub struct Photocell {
    /// Held to keep PA0 in analog mode
    _pin: Flex<'static>,
}

impl AnalogFrontEnd for Photocell {
    /// Clocks, configures, calibrates and enables ADC1 for single
    /// conversions of ADC_IN0.
    fn enable(&mut self) {
        let adc = pac::ADC1;

        pac::RCC.apb2enr().modify(|w| w.set_adcen(true));

        // Synchronous PCLK clock; low frequency mode below 3.5 MHz
        adc.cfgr2().modify(|w| w.set_ckmode(Ckmode::PCLK));
        adc.ccr().modify(|w| w.set_lfmen(true));

        // 10-bit right aligned, single conversion, long sampling window
        adc.cfgr1().modify(|w| {
            w.set_res(Res::BITS10);
            w.set_cont(false);
        });
        adc.smpr().modify(|w| w.set_smp(SampleTime::CYCLES79_5));
        adc.chselr().write(|w| w.set_chsel_x(PHOTO_ADC_CHANNEL, true));

        if let Err(_timeout) = power_up(self, REGISTER_SYNC_SPIN_LIMIT) {
            #[cfg(feature = "debug-mode")]
            defmt::warn!("ADC power up timed out: {}", _timeout);
        }
    }

    fn start_conversion(&mut self) {
        let adc = pac::ADC1;
        adc.isr().modify(|w| w.set_eoc(true));
        adc.cr().modify(|w| w.set_adstart(true));
    }

    fn conversion_done(&mut self) -> bool {
        pac::ADC1.isr().read().eoc()
    }

    fn read(&mut self) -> u16 {
        pac::ADC1.dr().read().data()
    }

    /// Stops and disables ADC1, turns its regulator off and gates its bus clock.
    fn disable(&mut self) {
        if let Err(_timeout) = power_down(self, REGISTER_SYNC_SPIN_LIMIT) {
            #[cfg(feature = "debug-mode")]
            defmt::warn!("ADC power down timed out: {}", _timeout);
        }

        pac::ADC1.ccr().modify(|w| w.set_lfmen(false));
        pac::RCC.apb2enr().modify(|w| w.set_adcen(false));
    }
}

impl AdcHandshake for Photocell {
    fn set_regulator(&mut self, on: bool) {
        pac::ADC1.cr().modify(|w| w.set_advregen(on));
    }

    fn start_calibration(&mut self) {
        pac::ADC1.cr().modify(|w| w.set_adcal(true));
    }

    fn calibrating(&mut self) -> bool {
        pac::ADC1.cr().read().adcal()
    }

    /// ADRDY is cleared by writing 1
    fn clear_ready(&mut self) {
        pac::ADC1.isr().modify(|w| w.set_adrdy(true));
    }

    fn request_enable(&mut self) {
        pac::ADC1.cr().modify(|w| w.set_aden(true));
    }

    fn ready(&mut self) -> bool {
        pac::ADC1.isr().read().adrdy()
    }

    fn converting(&mut self) -> bool {
        pac::ADC1.cr().read().adstart()
    }

    fn request_stop(&mut self) {
        pac::ADC1.cr().modify(|w| w.set_adstp(true));
    }

    fn stopping(&mut self) -> bool {
        pac::ADC1.cr().read().adstp()
    }

    fn request_disable(&mut self) {
        pac::ADC1.cr().modify(|w| w.set_addis(true));
    }

    fn enabled(&mut self) -> bool {
        pac::ADC1.cr().read().aden()
    }
}
