use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::prelude::{Instrument, MeasureError, MeasureResult};

/// Bit 7 of the selector: set for the oscilloscope path, clear for the analyzer.
pub const SCOPE_PATH_BIT: u8 = 0x80;

/// Relay bank 0x50..=0x5F is dead on the routing board; those selectors are
/// moved up to 0x60..=0x6F.
const DEAD_BANK_MASK: u8 = 0x70;
const DEAD_BANK: u8 = 0x50;
const SPARE_BANK: u8 = 0x60;

/// Physical relay index per logical element for the 32-element catheter.
/// The two 16-pin flex rows are interleaved, the second one reversed.
const CLASS_32_REMAP: [u8; 32] = [
    0x00, 0x1F, 0x01, 0x1E, 0x02, 0x1D, 0x03, 0x1C,
    0x04, 0x1B, 0x05, 0x1A, 0x06, 0x19, 0x07, 0x18,
    0x08, 0x17, 0x09, 0x16, 0x0A, 0x15, 0x0B, 0x14,
    0x0C, 0x13, 0x0D, 0x12, 0x0E, 0x11, 0x0F, 0x10,
];

/// Physical relay index per logical element for the 64-element catheter.
/// Eight-element groups are pairwise swapped and wired back to front.
const CLASS_64_REMAP: [u8; 64] = [
    0x0F, 0x0E, 0x0D, 0x0C, 0x0B, 0x0A, 0x09, 0x08,
    0x07, 0x06, 0x05, 0x04, 0x03, 0x02, 0x01, 0x00,
    0x1F, 0x1E, 0x1D, 0x1C, 0x1B, 0x1A, 0x19, 0x18,
    0x17, 0x16, 0x15, 0x14, 0x13, 0x12, 0x11, 0x10,
    0x2F, 0x2E, 0x2D, 0x2C, 0x2B, 0x2A, 0x29, 0x28,
    0x27, 0x26, 0x25, 0x24, 0x23, 0x22, 0x21, 0x20,
    0x3F, 0x3E, 0x3D, 0x3C, 0x3B, 0x3A, 0x39, 0x38,
    0x37, 0x36, 0x35, 0x34, 0x33, 0x32, 0x31, 0x30,
];

/// Array size variant of the catheter under test.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(try_from = "usize", into = "usize")]
pub enum ChannelClass {
    C32,
    C64,
    C96,
}

impl ChannelClass {
    pub const ALL: [ChannelClass; 3] = [ChannelClass::C32, ChannelClass::C64, ChannelClass::C96];

    pub fn size(self) -> usize {
        match self {
            ChannelClass::C32 => 32,
            ChannelClass::C64 => 64,
            ChannelClass::C96 => 96,
        }
    }

    pub fn from_size(size: usize) -> Option<Self> {
        match size {
            32 => Some(ChannelClass::C32),
            64 => Some(ChannelClass::C64),
            96 => Some(ChannelClass::C96),
            _ => None,
        }
    }

    /// Wiring lookup for this class; `None` means logical and physical indices agree.
    pub fn remap_table(self) -> Option<&'static [u8]> {
        match self {
            ChannelClass::C32 => Some(&CLASS_32_REMAP),
            ChannelClass::C64 => Some(&CLASS_64_REMAP),
            ChannelClass::C96 => None,
        }
    }

    pub fn channels(self) -> std::ops::Range<usize> {
        0..self.size()
    }
}

impl fmt::Display for ChannelClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-element", self.size())
    }
}

impl TryFrom<usize> for ChannelClass {
    type Error = String;

    fn try_from(size: usize) -> Result<Self, Self::Error> {
        ChannelClass::from_size(size)
            .ok_or_else(|| format!("unsupported channel class {} (expected 32, 64 or 96)", size))
    }
}

impl From<ChannelClass> for usize {
    fn from(class: ChannelClass) -> Self {
        class.size()
    }
}

impl FromStr for ChannelClass {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let size: usize = value
            .trim()
            .parse()
            .map_err(|_| format!("channel class '{}' is not a number", value))?;
        ChannelClass::try_from(size)
    }
}

/// Byte written to the routing board to connect one element to one instrument.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct RelaySelector(u8);

impl RelaySelector {
    pub fn byte(self) -> u8 {
        self.0
    }

    pub fn instrument(self) -> Instrument {
        if self.0 & SCOPE_PATH_BIT != 0 {
            Instrument::Scope
        } else {
            Instrument::Vna
        }
    }

    /// Relay index with the signal-path bit stripped.
    pub fn relay_index(self) -> u8 {
        self.0 & !SCOPE_PATH_BIT
    }
}

impl fmt::Display for RelaySelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:02X}", self.0)
    }
}

/// Maps logical channels onto relay selector bytes.
pub struct ChannelRouter;

impl ChannelRouter {
    pub fn resolve(
        channel: usize,
        class: ChannelClass,
        instrument: Instrument,
    ) -> MeasureResult<RelaySelector> {
        if channel >= class.size() {
            return Err(MeasureError::InvalidChannel { channel, class });
        }

        let physical = match class.remap_table() {
            Some(table) => table[channel],
            None => channel as u8,
        };

        let mut byte = physical;
        if instrument == Instrument::Scope {
            byte |= SCOPE_PATH_BIT;
        }

        // Applied after the path bit so it sees the final low seven bits.
        if (byte & !SCOPE_PATH_BIT) & 0xF0 == DEAD_BANK {
            byte = (byte & !DEAD_BANK_MASK) | SPARE_BANK;
        }

        Ok(RelaySelector(byte))
    }

    /// Reverse lookup from a selector to the logical channel it routes.
    pub fn channel_for(selector: RelaySelector, class: ChannelClass) -> Option<usize> {
        let instrument = selector.instrument();
        class.channels().find(|&channel| {
            Self::resolve(channel, class, instrument)
                .map(|candidate| candidate == selector)
                .unwrap_or(false)
        })
    }
}
