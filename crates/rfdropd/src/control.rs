//! Status and control: mode switch, trigger button, status LED.
//!
//! The role is read once at startup. A sender waits for the trigger and
//! sends one file per press; a receiver listens for transfers forever.
//! The LED reports progress and outcome and plays no part in the protocol.

use std::path::PathBuf;
use std::time::Duration;

use embedded_hal::digital::{InputPin, StatefulOutputPin};

use rfdrop_core::config::TimingConfig;
use rfdrop_services::{
    receive_file, send_file, Clock, Link, RadioDriver, ReceiveError, ReceiveReport, Role,
    SendError, SendReport, TransferObserver,
};

/// Mode switch high selects receive, low selects send.
pub fn select_role<P: InputPin>(mode: &mut P) -> Result<Role, P::Error> {
    Ok(if mode.is_high()? {
        Role::Receiver
    } else {
        Role::Sender
    })
}

// ── Status LED ────────────────────────────────────────────────────────────────

/// Drives the status LED. Pin errors are logged, never returned.
pub struct StatusLed<P, C> {
    pin: P,
    clock: C,
    progress_every: u32,
    blink_toggles: u32,
    blink_interval: Duration,
}

impl<P: StatefulOutputPin, C: Clock> StatusLed<P, C> {
    pub fn new(pin: P, clock: C, timing: &TimingConfig) -> Self {
        Self {
            pin,
            clock,
            progress_every: timing.progress_every,
            blink_toggles: timing.blink_toggles,
            blink_interval: timing.blink_interval(),
        }
    }

    pub fn on(&mut self) {
        if let Err(e) = self.pin.set_high() {
            tracing::warn!(error = ?e, "status led write failed");
        }
    }

    pub fn off(&mut self) {
        if let Err(e) = self.pin.set_low() {
            tracing::warn!(error = ?e, "status led write failed");
        }
    }

    pub fn toggle(&mut self) {
        if let Err(e) = self.pin.toggle() {
            tracing::warn!(error = ?e, "status led toggle failed");
        }
    }

    /// Fast blink, then dark.
    pub fn failure(&mut self) {
        for _ in 0..self.blink_toggles {
            self.toggle();
            self.clock.sleep(self.blink_interval);
        }
        self.off();
    }
}

impl<P: StatefulOutputPin, C: Clock> TransferObserver for StatusLed<P, C> {
    fn session_started(&mut self, _declared_size: u32) {
        self.toggle();
    }

    fn fragment(&mut self, count: u32) {
        if self.progress_every > 0 && count % self.progress_every == 0 {
            self.toggle();
        }
    }
}

// ── Sender role ───────────────────────────────────────────────────────────────

pub struct SenderPanel<D, C, L, B> {
    link: Link<D, C>,
    led: StatusLed<L, C>,
    trigger: B,
    clock: C,
    tx_file: PathBuf,
    button_poll: Duration,
    debounce_poll: Duration,
}

impl<D, C, L, B> SenderPanel<D, C, L, B>
where
    D: RadioDriver,
    C: Clock + Clone,
    L: StatefulOutputPin,
    B: InputPin,
{
    pub fn new(
        link: Link<D, C>,
        led: StatusLed<L, C>,
        trigger: B,
        clock: C,
        tx_file: PathBuf,
        timing: &TimingConfig,
    ) -> Self {
        Self {
            link,
            led,
            trigger,
            clock,
            tx_file,
            button_poll: timing.button_poll(),
            debounce_poll: timing.debounce_poll(),
        }
    }

    #[cfg(test)]
    fn link_mut(&mut self) -> &mut Link<D, C> {
        &mut self.link
    }

    /// Trigger is active low. Read errors count as released.
    fn pressed(&mut self) -> bool {
        match self.trigger.is_low() {
            Ok(low) => low,
            Err(e) => {
                tracing::warn!(error = ?e, "trigger read failed");
                false
            }
        }
    }

    /// Check the trigger once. On a press, wait for release, then send the
    /// file and show the outcome. Returns the outcome if a send ran.
    pub fn poll_once(&mut self) -> Option<Result<SendReport, SendError>> {
        if !self.pressed() {
            return None;
        }
        tracing::info!("trigger pressed");
        while self.pressed() {
            self.clock.sleep(self.debounce_poll);
        }

        self.led.on();
        let result = send_file(&mut self.link, &self.tx_file, &mut self.led);
        match &result {
            Ok(report) => {
                tracing::info!(bytes = report.bytes, fragments = report.fragments, "send complete");
                self.led.on();
            }
            Err(e) => {
                tracing::error!(error = %e, "send failed");
                self.led.failure();
            }
        }
        Some(result)
    }

    pub fn run(mut self) -> ! {
        tracing::info!(path = %self.tx_file.display(), "sender ready, waiting for trigger");
        loop {
            let _ = self.poll_once();
            self.clock.sleep(self.button_poll);
        }
    }
}

// ── Receiver role ─────────────────────────────────────────────────────────────

pub struct ReceiverPanel<D, C, L> {
    link: Link<D, C>,
    led: StatusLed<L, C>,
    clock: C,
    rx_file: PathBuf,
    rearm_delay: Duration,
}

impl<D, C, L> ReceiverPanel<D, C, L>
where
    D: RadioDriver,
    C: Clock + Clone,
    L: StatefulOutputPin,
{
    pub fn new(
        link: Link<D, C>,
        led: StatusLed<L, C>,
        clock: C,
        rx_file: PathBuf,
        timing: &TimingConfig,
    ) -> Self {
        Self {
            link,
            led,
            clock,
            rx_file,
            rearm_delay: timing.rearm_delay(),
        }
    }

    /// Receive one transfer and show the outcome.
    pub fn cycle(&mut self) -> Result<ReceiveReport, ReceiveError> {
        let result = receive_file(&mut self.link, &self.rx_file, &mut self.led);
        match &result {
            Ok(report) if !report.is_consistent() => {
                tracing::warn!(
                    missing = report.missing,
                    fin_count = report.fin_count,
                    "transfer complete but inconsistent"
                );
                self.led.on();
            }
            Ok(_) => self.led.on(),
            Err(e) => {
                tracing::error!(error = %e, "receive failed");
                self.led.failure();
            }
        }
        self.clock.sleep(self.rearm_delay);
        result
    }

    pub fn run(mut self) -> ! {
        tracing::info!(path = %self.rx_file.display(), "receiver listening");
        loop {
            let _ = self.cycle();
        }
    }
}
