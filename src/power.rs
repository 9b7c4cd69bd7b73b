//! Wake timer and deep sleep for the fake fire board.
//!
//! The RTC wakeup timer, clocked from the 32.768 kHz LSE crystal, fires
//! every [`fake_fire::config::WAKE_PERIOD_SECS`] seconds. Its interrupt
//! wakes the MCU from STOP mode and sets [`WAKE_SIGNAL`], which tells the
//! main loop to re-check the light level.
//!
//! # RTC Wakeup Operation
//!
//! The wakeup timer is routed to EXTI line 20 (rising edge). It keeps
//! running in STOP mode and reloads itself, so once armed it never needs
//! to be touched again.

use cortex_m::peripheral::{NVIC, SCB};
use embassy_stm32::pac;
use pac::interrupt;

use fake_fire::config::{REGISTER_SYNC_SPIN_LIMIT, WAKE_TIMER_RELOAD};
use fake_fire::{LowPower, WakeSignal, spin_until};

/// EXTI line number for the RTC wakeup timer (fixed at line 20 on STM32L0)
const RTC_WAKEUP_EXTI_LINE: usize = 20;

/// IMR register index for EXTI line 20 (lines 0-31 are in IMR1)
const IMR1_REG_IDX: usize = 0;

/// RTC write protection unlock sequence
const RTC_UNLOCK_KEYS: [u8; 2] = [0xCA, 0x53];

/// Any other value re-locks the RTC registers
const RTC_LOCK_KEY: u8 = 0xFF;

/// Set by the RTC wakeup interrupt, consumed by the flame controller.
pub static WAKE_SIGNAL: WakeSignal = WakeSignal::new();

/// RTC wakeup interrupt handler (EXTI line 20).
///
/// Clears the wakeup flag and the EXTI pending bit, then signals the main
/// loop. Nothing else happens here.
#[interrupt]
fn RTC() {
    let rtc = pac::RTC;
    let exti = pac::EXTI;

    rtc.isr().modify(|w| w.set_wutf(false));

    // Clear pending interrupt on EXTI line 20
    exti.pr(IMR1_REG_IDX)
        .write(|w| w.set_line(RTC_WAKEUP_EXTI_LINE, true));

    WAKE_SIGNAL.notify();
}

/// Configures the RTC wakeup timer and its EXTI interrupt.
///
/// Arms a periodic timeout of [`fake_fire::config::WAKE_PERIOD_SECS`]
/// seconds and enables global interrupts as the last step.
///
/// # Configuration
///
/// - Wakeup clock: RTCCLK / 16 = 2048 Hz
/// - Reload: [`WAKE_TIMER_RELOAD`]
/// - EXTI line 20: Rising edge trigger
/// - NVIC: RTC interrupt unmasked
pub fn setup_wake_timer() {
    let pwr = pac::PWR;
    let rcc = pac::RCC;
    let rtc = pac::RTC;
    let exti = pac::EXTI;

    // RTC lives in the backup domain
    rcc.apb1enr().modify(|w| w.set_pwren(true));
    pwr.cr().modify(|w| w.set_dbp(true));
    rcc.csr().modify(|w| w.set_rtcen(true));

    for key in RTC_UNLOCK_KEYS {
        rtc.wpr().write(|w| w.set_key(key));
    }

    rtc.cr().modify(|w| {
        w.set_wutie(false);
        w.set_wute(false);
    });
    if let Err(_timeout) = spin_until(REGISTER_SYNC_SPIN_LIMIT, || rtc.isr().read().wutwf()) {
        #[cfg(feature = "debug-mode")]
        defmt::warn!("RTC wakeup timer write access timed out: {}", _timeout);
    }

    // Drop any timeout left over from before the reset
    rtc.isr().modify(|w| w.set_wutf(false));
    exti.pr(IMR1_REG_IDX)
        .write(|w| w.set_line(RTC_WAKEUP_EXTI_LINE, true));

    rtc.wutr().write(|w| w.set_wut(WAKE_TIMER_RELOAD));
    rtc.cr().modify(|w| {
        w.set_wucksel(pac::rtc::vals::Wucksel::DIV16);
        w.set_wutie(true);
        w.set_wute(true);
    });

    rtc.wpr().write(|w| w.set_key(RTC_LOCK_KEY));

    // Enable EXTI line 20 for the RTC wakeup timer
    exti.imr(IMR1_REG_IDX)
        .modify(|w| w.set_line(RTC_WAKEUP_EXTI_LINE, true));
    exti.rtsr(IMR1_REG_IDX)
        .modify(|w| w.set_line(RTC_WAKEUP_EXTI_LINE, true));

    #[cfg(feature = "debug-mode")]
    defmt::info!(
        "Wake timer armed: every {} s",
        fake_fire::config::WAKE_PERIOD_SECS
    );

    // SAFETY: the only state the RTC handler touches is WAKE_SIGNAL, a
    // const-initialized static, and the timer flags were cleared above.
    unsafe {
        NVIC::unmask(embassy_stm32::interrupt::RTC);
        cortex_m::interrupt::enable();
    };
}

/// STOP mode sleep, woken by the RTC wakeup interrupt.
pub struct DeepSleep;

impl DeepSleep {
    /// Configures the core and PWR for STOP mode on WFI.
    ///
    /// # Configuration
    ///
    /// - SLEEPDEEP: WFI enters STOP instead of SLEEP
    /// - PDDS cleared: STOP, not STANDBY (RAM and registers retained)
    /// - LPSDSR: regulator in low-power mode while stopped
    /// - ULP: VREFINT switched off while stopped
    pub fn new(scb: &mut SCB) -> Self {
        pac::PWR.cr().modify(|w| {
            w.set_pdds(pac::pwr::vals::Pdds::STOP_MODE);
            w.set_lpsdsr(pac::pwr::vals::Mode::LOW_POWER_MODE);
            w.set_ulp(true);
        });
        scb.set_sleepdeep();

        Self
    }
}

impl LowPower for DeepSleep {
    /// Stops the MCU until the wake timer fires.
    ///
    /// The pending check and the WFI happen with interrupts masked; WFI
    /// still wakes on a pending interrupt, which then runs once they are
    /// unmasked. Other interrupts send the core straight back to sleep.
    fn sleep(&mut self, wake: &WakeSignal) {
        while !wake.is_pending() {
            cortex_m::interrupt::free(|_| {
                if !wake.is_pending() {
                    // Clear the wakeup flag or STOP is left immediately
                    pac::PWR.cr().modify(|w| w.set_cwuf(true));
                    cortex_m::asm::wfi();
                }
            });
        }

        #[cfg(feature = "debug-mode")]
        defmt::info!("Woke from STOP");
    }
}
