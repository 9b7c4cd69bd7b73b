//! Duty-cycle controller for the four flame LEDs.
//!
//! Drives two orange and two red LEDs with a random flicker while it is
//! dark, and parks the MCU in its deepest sleep while it is light.
//!
//! # Duty Cycle
//!
//! ```text
//!            wake pending?
//!   ┌──────────── yes ──────────── sample photocell ─┐
//!   │                                                ▼
//!   │   Dark  (sample <  threshold): flicker, hold FLICKER_DELAY_MS
//!   │   Light (sample >= threshold): LEDs off, pins high-Z, sleep
//!   └────────────────────────────────────────────────┘
//! ```
//!
//! The light level is only re-checked when the wake timer fires (every
//! ~8 s), both while flickering and while asleep.

use embedded_hal::blocking::delay::DelayMs;

use crate::config::{FLICKER_DELAY_MS, LIGHT_THRESHOLD, RANDOM_SEED};
use crate::lfsr::Lfsr16;
use crate::light_sensor::{AnalogFrontEnd, LightSampler};
use crate::wake::{LowPower, WakeSignal};

/// One of the four flame LEDs, in toggle order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "debug-mode", derive(defmt::Format))]
pub enum Channel {
    Orange1,
    Orange2,
    Red1,
    Red2,
}

impl Channel {
    /// All channels, in the order their toggle decisions are drawn.
    pub const ALL: [Channel; 4] = [
        Channel::Orange1,
        Channel::Orange2,
        Channel::Red1,
        Channel::Red2,
    ];

    /// Bit position in [`OutputMask`].
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// On/off state of the four LEDs, one bit per [`Channel`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "debug-mode", derive(defmt::Format))]
pub struct OutputMask(u8);

impl OutputMask {
    /// Every LED off.
    pub const OFF: OutputMask = OutputMask(0);

    /// Flips the given LED.
    pub fn toggle(&mut self, channel: Channel) {
        self.0 ^= 1 << channel.index();
    }

    /// True if the given LED is lit.
    pub const fn is_on(self, channel: Channel) -> bool {
        self.0 & (1 << channel.index()) != 0
    }

    /// True if no LED is lit.
    pub const fn is_off(self) -> bool {
        self.0 == 0
    }

    /// Raw bits, channel `n` in bit `n`.
    pub const fn bits(self) -> u8 {
        self.0
    }
}

/// Ambient light classification, refreshed once per wake.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "debug-mode", derive(defmt::Format))]
pub enum LightMode {
    /// Below threshold: flicker the LEDs
    Dark,
    /// At or above threshold: LEDs off, sleep between checks
    #[default]
    Light,
}

impl LightMode {
    /// Classifies a light reading. The threshold itself counts as light.
    pub const fn classify(sample: u16, threshold: u16) -> Self {
        if sample < threshold {
            LightMode::Dark
        } else {
            LightMode::Light
        }
    }
}

/// Pin-level contract for the four flame LEDs.
pub trait FlameOutputs {
    /// Configures all four pins as driven outputs. Cheap when already driven.
    fn drive(&mut self);

    /// Sets every LED to its bit in `mask`.
    fn write(&mut self, mask: OutputMask);

    /// Returns all four pins to high impedance to stop leakage current.
    fn release(&mut self);
}

/// Tunables copied out of [`crate::config`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Settings {
    /// Readings below this are dark, in raw ADC counts
    pub light_threshold: u16,
    /// Hold time between flicker iterations in milliseconds
    pub flicker_delay_ms: u32,
    /// Boot seed for the flicker generator
    pub seed: u16,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            light_threshold: LIGHT_THRESHOLD,
            flicker_delay_ms: FLICKER_DELAY_MS,
            seed: RANDOM_SEED,
        }
    }
}

/// Owns every piece of state the duty cycle touches.
///
/// The wake signal is the only thing shared with interrupt context; it is
/// borrowed, everything else is owned.
pub struct FlameController<'a, O, A, S, D> {
    /// The four flame LEDs
    outputs: O,
    /// Photocell sampler
    sampler: LightSampler<A>,
    /// Low-power sleep primitive
    sleeper: S,
    /// Flicker-rate delay
    delay: D,
    /// Set by the wake timer interrupt
    wake: &'a WakeSignal,
    /// Flicker generator
    rng: Lfsr16,
    /// Result of the last light check
    mode: LightMode,
    /// Current LED state
    mask: OutputMask,
    settings: Settings,
}

impl<'a, O, A, S, D> FlameController<'a, O, A, S, D>
where
    O: FlameOutputs,
    A: AnalogFrontEnd,
    S: LowPower,
    D: DelayMs<u32>,
{
    /// Creates a controller in [`LightMode::Light`] with every LED off.
    ///
    /// No light check happens until `wake` is notified; the firmware
    /// notifies it once at boot so the first loop iteration samples.
    ///
    /// # Arguments
    ///
    /// * `outputs` - The four flame LEDs
    /// * `sampler` - Photocell sampler
    /// * `sleeper` - Low-power sleep primitive
    /// * `delay` - Delay provider for the flicker hold time
    /// * `wake` - Signal set by the wake timer interrupt
    /// * `settings` - Threshold, flicker delay and seed
    pub fn new(
        outputs: O,
        sampler: LightSampler<A>,
        sleeper: S,
        delay: D,
        wake: &'a WakeSignal,
        settings: Settings,
    ) -> Self {
        Self {
            outputs,
            sampler,
            sleeper,
            delay,
            wake,
            rng: Lfsr16::new(settings.seed),
            mode: LightMode::default(),
            mask: OutputMask::OFF,
            settings,
        }
    }

    /// Result of the most recent light check.
    pub fn mode(&self) -> LightMode {
        self.mode
    }

    /// Current LED state.
    pub fn mask(&self) -> OutputMask {
        self.mask
    }

    /// Runs the duty cycle forever.
    pub fn run(mut self) -> ! {
        loop {
            self.step();
        }
    }

    /// Runs one iteration of the duty cycle.
    ///
    /// Re-checks the light level if a wake is pending, then either does one
    /// flicker iteration (dark) or turns everything off and sleeps until the
    /// next wake (light).
    pub fn step(&mut self) {
        if self.wake.take() {
            let sample = self.sampler.sample();
            self.mode = LightMode::classify(sample, self.settings.light_threshold);

            #[cfg(feature = "debug-mode")]
            defmt::info!("Light sample {} -> {}", sample, self.mode);
        }

        match self.mode {
            LightMode::Dark => self.flicker(),
            LightMode::Light => self.rest(),
        }
    }

    /// One flicker iteration.
    ///
    /// Draws a reference value `j`, then toggles each LED in turn if its own
    /// draw is strictly greater than `j`.
    fn flicker(&mut self) {
        self.outputs.drive();

        let j = self.rng.next_u16();
        for channel in Channel::ALL {
            if self.rng.next_u16() > j {
                self.mask.toggle(channel);
            }
        }
        self.outputs.write(self.mask);

        self.delay.delay_ms(self.settings.flicker_delay_ms);
    }

    /// Turns the LEDs off, releases the pins and sleeps until the next wake.
    fn rest(&mut self) {
        self.mask = OutputMask::OFF;
        self.outputs.write(self.mask);
        self.outputs.release();

        #[cfg(feature = "debug-mode")]
        defmt::info!("Light out, sleeping until next wake");

        self.sleeper.sleep(self.wake);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    /// Everything the controller did to the hardware, in order.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    enum Event {
        Drive,
        Write(OutputMask),
        Release,
        Delay(u32),
        Sleep,
        Sample,
    }

    type Log = Rc<RefCell<Vec<Event>>>;

    struct MockLeds {
        log: Log,
    }

    impl FlameOutputs for MockLeds {
        fn drive(&mut self) {
            self.log.borrow_mut().push(Event::Drive);
        }

        fn write(&mut self, mask: OutputMask) {
            self.log.borrow_mut().push(Event::Write(mask));
        }

        fn release(&mut self) {
            self.log.borrow_mut().push(Event::Release);
        }
    }

    /// Converter returning a settable level on every conversion.
    struct MockPhotocell {
        level: Rc<Cell<u16>>,
        log: Log,
    }

    impl AnalogFrontEnd for MockPhotocell {
        fn enable(&mut self) {
            self.log.borrow_mut().push(Event::Sample);
        }

        fn start_conversion(&mut self) {}

        fn conversion_done(&mut self) -> bool {
            true
        }

        fn read(&mut self) -> u16 {
            self.level.get()
        }

        fn disable(&mut self) {}
    }

    struct MockSleep {
        log: Log,
    }

    impl LowPower for MockSleep {
        fn sleep(&mut self, _wake: &WakeSignal) {
            self.log.borrow_mut().push(Event::Sleep);
        }
    }

    struct MockDelay {
        log: Log,
    }

    impl DelayMs<u32> for MockDelay {
        fn delay_ms(&mut self, ms: u32) {
            self.log.borrow_mut().push(Event::Delay(ms));
        }
    }

    type TestController<'a> = FlameController<'a, MockLeds, MockPhotocell, MockSleep, MockDelay>;

    struct Harness {
        log: Log,
        level: Rc<Cell<u16>>,
    }

    impl Harness {
        fn new(level: u16) -> Self {
            Self {
                log: Rc::default(),
                level: Rc::new(Cell::new(level)),
            }
        }

        fn controller<'a>(&self, wake: &'a WakeSignal, settings: Settings) -> TestController<'a> {
            FlameController::new(
                MockLeds {
                    log: self.log.clone(),
                },
                LightSampler::new(
                    MockPhotocell {
                        level: self.level.clone(),
                        log: self.log.clone(),
                    },
                    4,
                ),
                MockSleep {
                    log: self.log.clone(),
                },
                MockDelay {
                    log: self.log.clone(),
                },
                wake,
                settings,
            )
        }

        fn drain(&self) -> Vec<Event> {
            self.log.borrow_mut().drain(..).collect()
        }
    }

    #[test]
    fn classify_boundary_is_light() {
        assert_eq!(LightMode::classify(9, 10), LightMode::Dark);
        assert_eq!(LightMode::classify(10, 10), LightMode::Light);
        assert_eq!(LightMode::classify(11, 10), LightMode::Light);
        assert_eq!(LightMode::classify(0, 0), LightMode::Light);
    }

    #[test]
    fn mask_toggles_independent_bits() {
        let mut mask = OutputMask::OFF;
        mask.toggle(Channel::Orange2);
        mask.toggle(Channel::Red2);
        assert_eq!(mask.bits(), 0b1010);
        assert!(mask.is_on(Channel::Orange2));
        assert!(!mask.is_on(Channel::Orange1));

        mask.toggle(Channel::Red2);
        assert_eq!(mask.bits(), 0b0010);
        mask.toggle(Channel::Orange2);
        assert!(mask.is_off());
    }

    #[test]
    fn no_light_check_without_wake() {
        let harness = Harness::new(0);
        let wake = WakeSignal::new();
        let mut controller = harness.controller(&wake, Settings::default());

        controller.step();

        assert_eq!(controller.mode(), LightMode::Light);
        assert!(!harness.drain().contains(&Event::Sample));
    }

    #[test]
    fn sample_at_threshold_sleeps() {
        let harness = Harness::new(LIGHT_THRESHOLD);
        let wake = WakeSignal::new();
        let mut controller = harness.controller(&wake, Settings::default());

        wake.notify();
        controller.step();

        assert_eq!(controller.mode(), LightMode::Light);
        assert_eq!(
            harness.drain(),
            [
                Event::Sample,
                Event::Write(OutputMask::OFF),
                Event::Release,
                Event::Sleep
            ]
        );
    }

    #[test]
    fn dark_sample_flickers_and_holds() {
        let harness = Harness::new(LIGHT_THRESHOLD - 1);
        let wake = WakeSignal::new();
        let mut controller = harness.controller(&wake, Settings::default());

        wake.notify();
        controller.step();

        assert_eq!(controller.mode(), LightMode::Dark);
        let events = harness.drain();
        assert_eq!(events[0], Event::Sample);
        assert_eq!(events[1], Event::Drive);
        assert!(matches!(events[2], Event::Write(_)));
        assert_eq!(events[3], Event::Delay(FLICKER_DELAY_MS));
        assert!(!events.contains(&Event::Sleep));
    }

    #[test]
    fn wake_is_consumed_by_the_light_check() {
        let harness = Harness::new(0);
        let wake = WakeSignal::new();
        let mut controller = harness.controller(&wake, Settings::default());

        wake.notify();
        controller.step();
        assert!(!wake.is_pending());

        // Later iterations keep flickering without re-sampling.
        harness.drain();
        controller.step();
        controller.step();
        assert!(!harness.drain().contains(&Event::Sample));
        assert_eq!(controller.mode(), LightMode::Dark);
    }

    #[test]
    fn toggles_follow_the_generator() {
        let harness = Harness::new(0);
        let wake = WakeSignal::new();
        let settings = Settings {
            seed: 0x1D2C,
            ..Settings::default()
        };
        let mut controller = harness.controller(&wake, settings);
        wake.notify();

        let mut reference = Lfsr16::new(0x1D2C);
        let mut expected = OutputMask::OFF;
        for _ in 0..50 {
            let j = reference.next_u16();
            for channel in Channel::ALL {
                if reference.next_u16() > j {
                    expected.toggle(channel);
                }
            }

            controller.step();
            assert_eq!(controller.mask(), expected);
        }
    }

    #[test]
    fn boot_seed_first_iteration() {
        // Seed 10 draws j = 21, then 42, 85, 170, 341: all greater, all toggle.
        let harness = Harness::new(0);
        let wake = WakeSignal::new();
        let mut controller = harness.controller(&wake, Settings::default());

        wake.notify();
        controller.step();
        assert_eq!(controller.mask().bits(), 0b1111);
    }

    #[test]
    fn boot_seed_mask_sequence() {
        let harness = Harness::new(0);
        let wake = WakeSignal::new();
        let mut controller = harness.controller(&wake, Settings::default());
        wake.notify();

        let masks: Vec<u8> = (0..7)
            .map(|_| {
                controller.step();
                controller.mask().bits()
            })
            .collect();
        assert_eq!(masks, [0b1111u8, 0b0000, 0b1111, 0b0101, 0b1010, 0b1110, 0b1001]);
    }

    #[test]
    fn leds_are_off_and_released_before_every_sleep() {
        let harness = Harness::new(0);
        let wake = WakeSignal::new();
        let mut controller = harness.controller(&wake, Settings::default());

        wake.notify();
        for _ in 0..7 {
            controller.step();
        }
        assert!(!controller.mask().is_off());

        harness.level.set(500);
        wake.notify();
        controller.step();
        controller.step();

        let events = harness.drain();
        for (i, event) in events.iter().enumerate() {
            if *event == Event::Sleep {
                assert_eq!(events[i - 1], Event::Release);
                assert_eq!(events[i - 2], Event::Write(OutputMask::OFF));
            }
        }
        assert_eq!(events.iter().filter(|e| **e == Event::Sleep).count(), 2);
        assert!(controller.mask().is_off());
    }

    #[test]
    fn threshold_can_be_overridden() {
        let harness = Harness::new(300);
        let wake = WakeSignal::new();
        let settings = Settings {
            light_threshold: 512,
            flicker_delay_ms: 1,
            ..Settings::default()
        };
        let mut controller = harness.controller(&wake, settings);

        wake.notify();
        controller.step();

        assert_eq!(controller.mode(), LightMode::Dark);
        assert!(harness.drain().contains(&Event::Delay(1)));
    }

    #[test]
    fn coalesced_wakes_trigger_one_check() {
        let harness = Harness::new(0);
        let wake = WakeSignal::new();
        let mut controller = harness.controller(&wake, Settings::default());

        wake.notify();
        wake.notify();
        wake.notify();
        controller.step();
        controller.step();

        let samples = harness
            .drain()
            .into_iter()
            .filter(|e| *e == Event::Sample)
            .count();
        assert_eq!(samples, 1);
    }

    #[test]
    fn hundred_alternating_wakes() {
        let harness = Harness::new(0);
        let wake = WakeSignal::new();
        let mut controller = harness.controller(&wake, Settings::default());

        for cycle in 0..100 {
            let dark = cycle % 2 == 0;
            harness
                .level
                .set(if dark { LIGHT_THRESHOLD - 5 } else { LIGHT_THRESHOLD + 5 });
            wake.notify();

            // A few iterations per wake period.
            for _ in 0..3 {
                controller.step();
            }

            let events = harness.drain();
            assert_eq!(events.iter().filter(|e| **e == Event::Sample).count(), 1);
            if dark {
                assert_eq!(controller.mode(), LightMode::Dark);
                assert!(!events.contains(&Event::Sleep));
                assert!(!events.contains(&Event::Release));
            } else {
                assert_eq!(controller.mode(), LightMode::Light);
                assert!(controller.mask().is_off());
                assert_eq!(events[1], Event::Write(OutputMask::OFF));
                assert_eq!(events[2], Event::Release);
                assert_eq!(events[3], Event::Sleep);
                assert!(!events.contains(&Event::Drive));
            }
        }
    }
}
