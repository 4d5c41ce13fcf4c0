//! LED commands
//! This module contains the commands that can be sent to the LED peripheral
//! and the toggles that track what each LED was last switched to.

use std::sync::{Arc, Mutex, PoisonError};

use anyhow::Result;
use log::{error, info};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::codec;
use crate::core::bluetooth::constants::{
    UUID_GREEN_LED_CHAR, UUID_LED_SERVICE, UUID_RED_LED_CHAR, UUID_YELLOW_LED_CHAR,
};
use crate::core::bluetooth::transport::BleTransport;

/// The three LEDs, each bound to one characteristic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LedChannel {
    Red,
    Green,
    Yellow,
}

impl LedChannel {
    pub const ALL: [LedChannel; 3] = [Self::Red, Self::Green, Self::Yellow];

    pub fn characteristic(self) -> Uuid {
        match self {
            Self::Red => UUID_RED_LED_CHAR,
            Self::Green => UUID_GREEN_LED_CHAR,
            Self::Yellow => UUID_YELLOW_LED_CHAR,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Red => "RED",
            Self::Green => "GREEN",
            Self::Yellow => "YELLOW",
        }
    }

    fn index(self) -> usize {
        match self {
            Self::Red => 0,
            Self::Green => 1,
            Self::Yellow => 2,
        }
    }
}

/// LED commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedCommand {
    /// Switch on ("1")
    On,
    /// Switch off ("0")
    Off,
}

impl LedCommand {
    pub fn turning(on: bool) -> Self {
        if on { Self::On } else { Self::Off }
    }

    pub fn payload(self) -> &'static str {
        match self {
            Self::On => "1",
            Self::Off => "0",
        }
    }

    /// Convert the command to its byte representation
    pub fn to_bytes(self) -> Vec<u8> {
        codec::encode(self.payload())
    }
}

/// Command sender trait
#[async_trait::async_trait]
pub trait CommandSender: Send + Sync {
    /// Send a command to one LED
    async fn send_command(&self, channel: LedChannel, command: LedCommand) -> Result<()>;
}

/// Writes LED commands to the fixed service of one peripheral
#[derive(Clone)]
pub struct TransportCommandSender {
    transport: Arc<dyn BleTransport>,
    peripheral_id: String,
    service: Uuid,
}

impl TransportCommandSender {
    pub fn new(transport: Arc<dyn BleTransport>, peripheral_id: impl Into<String>) -> Self {
        Self {
            transport,
            peripheral_id: peripheral_id.into(),
            service: UUID_LED_SERVICE,
        }
    }
}

#[async_trait::async_trait]
impl CommandSender for TransportCommandSender {
    async fn send_command(&self, channel: LedChannel, command: LedCommand) -> Result<()> {
        info!("Sending {:?} to {} LED", command, channel.label());
        self.transport
            .write(
                &self.peripheral_id,
                self.service,
                channel.characteristic(),
                &command.to_bytes(),
            )
            .await?;
        Ok(())
    }
}

/// Last confirmed state of each LED
#[derive(Debug, Default)]
pub struct LedToggles {
    states: Mutex<[bool; 3]>,
}

impl LedToggles {
    pub fn is_on(&self, channel: LedChannel) -> bool {
        self.snapshot()[channel.index()]
    }

    pub fn snapshot(&self) -> [bool; 3] {
        *self.states.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set(&self, channel: LedChannel, on: bool) {
        self.states.lock().unwrap_or_else(PoisonError::into_inner)[channel.index()] = on;
    }
}

/// Command executor for the LEDs
pub struct CommandExecutor<T: CommandSender> {
    command_sender: T,
    toggles: Arc<LedToggles>,
    // one toggle at a time, so two quick presses cannot both read the same state
    in_flight: tokio::sync::Mutex<()>,
}

impl<T: CommandSender> CommandExecutor<T> {
    /// Create a new CommandExecutor
    pub fn new(command_sender: T, toggles: Arc<LedToggles>) -> Self {
        Self {
            command_sender,
            toggles,
            in_flight: tokio::sync::Mutex::new(()),
        }
    }

    pub fn toggles(&self) -> Arc<LedToggles> {
        self.toggles.clone()
    }

    /// Flips one LED. The toggle only changes once the write succeeded.
    ///
    /// Returns the new state of the LED.
    pub async fn toggle(&self, channel: LedChannel) -> Result<bool> {
        let _guard = self.in_flight.lock().await;
        let target = !self.toggles.is_on(channel);
        let command = LedCommand::turning(target);

        match self.command_sender.send_command(channel, command).await {
            Ok(()) => {
                self.toggles.set(channel, target);
                info!("{} LED is now {}", channel.label(), if target { "on" } else { "off" });
                Ok(target)
            }
            Err(e) => {
                error!("Failed to switch {} LED: {}", channel.label(), e);
                Err(e)
            }
        }
    }
}
