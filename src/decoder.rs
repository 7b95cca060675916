//! Byte-level protocol decoder.
//!
//! Commands are one or two bytes long. The decoder is an explicit state
//! machine, so a command split across several socket reads decodes the same
//! as one delivered whole.
//!
//! | First byte | Second byte | Command |
//! |------------|-------------|---------|
//! | `0x0F` | train | reverse |
//! | `0x00`-`0x1E`, other | train | speed = low nibble, light = bit 4 |
//! | `0x1F` | any | invalid, reported and ignored |
//! | `0x20` | - | solenoid off, ignored |
//! | `0x21` | switch | straight |
//! | `0x22` | switch | curve |
//! | `0x85` | - | sensor report |
//! | anything else | - | ignored |
//!
//! Sensor replies pack one bit per sensor, most significant bit first.
//!
//! # Example
//!
//! ```rust
//! use marklin_sim::decoder::{Decoded, Decoder};
//! use marklin_sim::Command;
//!
//! let mut decoder = Decoder::new();
//! assert_eq!(decoder.feed(0x13), None);
//! assert_eq!(
//!     decoder.feed(7),
//!     Some(Decoded::Command(Command::SetSpeed { train: 7, speed: 3, light: true }))
//! );
//! ```

use crate::commands::{Command, CommandOutcome, SensorReport};
use crate::controller::Controller;
use crate::diagnostics::{Diagnostic, DiagnosticSink};
use crate::track::SwitchDirection;

/// Request for a sensor report.
pub const SENSOR_REQUEST: u8 = 0x85;

/// Single-byte code releasing switch solenoids.
pub const SOLENOID_OFF: u8 = 0x20;

/// Set switch straight.
pub const SWITCH_STRAIGHT: u8 = 0x21;

/// Set switch curved.
pub const SWITCH_CURVE: u8 = 0x22;

/// Reserved train code.
pub const INVALID_TRAIN_CODE: u8 = 0x1F;

/// First byte values that expect a second byte.
const TWO_BYTE_LIMIT: u8 = 0x23;

const TRAIN_LIMIT: u8 = 0x20;
const SPEED_MASK: u8 = 0x0F;
const LIGHT_BIT: u8 = 0x10;

/// Decoder state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DecoderState {
    /// Waiting for the first byte of a command.
    #[default]
    Idle,
    /// Holding the first byte of a two-byte command.
    AwaitingSecond(u8),
}

/// Result of feeding one byte.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decoded {
    /// A complete command.
    Command(Command),
    /// The reserved train code was received.
    Invalid {
        /// First byte.
        first: u8,
        /// Second byte.
        second: u8,
    },
}

/// Two-byte command state machine.
#[derive(Clone, Debug, Default)]
pub struct Decoder {
    state: DecoderState,
}

impl Decoder {
    /// Idle decoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state.
    pub fn state(&self) -> DecoderState {
        self.state
    }

    /// Drop any half-received command.
    pub fn reset(&mut self) {
        self.state = DecoderState::Idle;
    }

    /// Feed one byte. Returns a result once a command is complete.
    pub fn feed(&mut self, byte: u8) -> Option<Decoded> {
        match self.state {
            DecoderState::Idle => {
                if byte == SENSOR_REQUEST {
                    return Some(Decoded::Command(Command::RequestSensorReport));
                }
                if byte < TWO_BYTE_LIMIT && byte != SOLENOID_OFF {
                    self.state = DecoderState::AwaitingSecond(byte);
                }
                None
            }
            DecoderState::AwaitingSecond(first) => {
                self.state = DecoderState::Idle;
                Some(Self::decode_pair(first, byte))
            }
        }
    }

    fn decode_pair(first: u8, second: u8) -> Decoded {
        if first < TRAIN_LIMIT {
            let train = u32::from(second);
            if first == INVALID_TRAIN_CODE {
                Decoded::Invalid { first, second }
            } else if first & SPEED_MASK == SPEED_MASK {
                Decoded::Command(Command::Reverse(train))
            } else {
                Decoded::Command(Command::SetSpeed {
                    train,
                    speed: first & SPEED_MASK,
                    light: first & LIGHT_BIT != 0,
                })
            }
        } else {
            let direction = if first == SWITCH_STRAIGHT {
                SwitchDirection::Straight
            } else {
                SwitchDirection::Curve
            };
            Decoded::Command(Command::SetSwitch {
                switch: u32::from(second),
                direction,
            })
        }
    }

    /// Feed `bytes` and apply every decoded command to `controller`.
    ///
    /// Returns the sensor reports requested, in order. Invalid codes are
    /// reported to the controller's diagnostic sink.
    pub fn drive<D: DiagnosticSink>(
        &mut self,
        controller: &mut Controller<D>,
        bytes: &[u8],
    ) -> Vec<SensorReport> {
        let mut reports = Vec::new();
        for &byte in bytes {
            match self.feed(byte) {
                Some(Decoded::Command(command)) => {
                    if let CommandOutcome::SensorReport(report) = controller.apply_command(command)
                    {
                        reports.push(report);
                    }
                }
                Some(Decoded::Invalid { first, second }) => {
                    controller
                        .sink_mut()
                        .emit(Diagnostic::InvalidCode { first, second });
                }
                None => {}
            }
        }
        reports
    }
}

// ============================================================================
// Sensor bit packing
// ============================================================================

/// Pack sensor states into `ceil(n / 8)` bytes, bit `i` at byte `i / 8`,
/// bit `7 - i % 8`. Unused trailing bits are 0.
pub fn encode_sensors(states: &[bool]) -> Vec<u8> {
    let mut bytes = vec![0u8; states.len().div_ceil(8)];
    for (i, _) in states.iter().enumerate().filter(|(_, on)| **on) {
        bytes[i / 8] |= 0x80 >> (i % 8);
    }
    bytes
}

/// Unpack `count` sensor states from `bytes` (inverse of [`encode_sensors`]).
/// Missing bytes read as untriggered.
pub fn decode_sensors(bytes: &[u8], count: usize) -> Vec<bool> {
    (0..count)
        .map(|i| {
            bytes
                .get(i / 8)
                .is_some_and(|byte| byte & (0x80 >> (i % 8)) != 0)
        })
        .collect()
}
