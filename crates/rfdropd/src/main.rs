//! rfdropd: single-file transfer over a 32-byte packet radio link.

use anyhow::{Context, Result};

use rfdrop_core::config::RfdropConfig;
use rfdrop_services::{Link, Role, SystemClock};

mod control;
mod gpio;
mod radio;

use control::{select_role, ReceiverPanel, SenderPanel, StatusLed};
use gpio::{Direction, SysfsPin};
use radio::UdpRadio;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // Load config
    if let Err(e) = RfdropConfig::write_default_if_missing() {
        tracing::warn!(error = %e, "failed to write default config");
    }
    let config = RfdropConfig::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "failed to load config, using defaults");
        RfdropConfig::default()
    });

    // GPIO
    let root = &config.gpio.root;
    let led_pin = SysfsPin::export(root, config.gpio.led_pin, Direction::Out)
        .context("failed to export status led")?;
    let button = SysfsPin::export(root, config.gpio.button_pin, Direction::In)
        .context("failed to export trigger button")?;
    let mut mode = SysfsPin::export(root, config.gpio.mode_pin, Direction::In)
        .context("failed to export mode switch")?;

    let clock = SystemClock;
    let mut led = StatusLed::new(led_pin, clock, &config.timing);
    led.on();

    let role = select_role(&mut mode).context("failed to read mode switch")?;
    tracing::info!(%role, channel = config.radio.channel, "rfdropd starting");

    // Radio
    let radio = UdpRadio::new(&config.radio);
    let addresses = [config.radio.pipe_address(0), config.radio.pipe_address(1)];
    let mut link = Link::new(radio, clock, addresses, config.timing.receive_poll());
    link.configure(role).context("failed to configure radio")?;

    match role {
        Role::Sender => {
            let tx_file = config.files.tx_file.clone();
            SenderPanel::new(link, led, button, clock, tx_file, &config.timing).run()
        }
        Role::Receiver => {
            if let Some(parent) = config.files.rx_file.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create {}", parent.display()))?;
            }
            ReceiverPanel::new(link, led, clock, config.files.rx_file.clone(), &config.timing).run()
        }
    }
}
