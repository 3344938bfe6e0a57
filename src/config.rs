use fugit::{ExtU32, MillisDurationU32};

use crate::line::{LineId, Polarity};

/// Key-down code of KEY0. Key-up codes carry [`RELEASE_TAG`] on top of it.
pub const KEY0_VALUE: u8 = 0x01;
/// Published before any key has been classified.
pub const INVALID_KEY: u8 = 0xFF;
pub const RELEASE_TAG: u8 = 0x80;
/// Highest usable key code. Bit 7 is the release tag, and 0x7F released would
/// collide with [`INVALID_KEY`].
pub const MAX_KEY_CODE: u8 = 0x7E;

pub const SETTLE_DELAY_MS: u32 = 10;
pub const DEFAULT_PERIOD_MS: u32 = 1000;

/// GPIO1_IO03
pub const LED_GPIO: LineId = LineId(3);
/// GPIO5_IO01 (SNVS_TAMPER1)
pub const BEEP_GPIO: LineId = LineId(4 * 32 + 1);

/// One physical key input.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct KeyDesc {
    pub gpio: LineId,
    pub code: u8,
    pub name: &'static str,
}

impl KeyDesc {
    /// Both the press and the release of this key encode to distinct bytes.
    pub const fn has_valid_code(&self) -> bool {
        self.code <= MAX_KEY_CODE
    }
}

#[rustfmt::skip]
pub const KEY_TABLE: [KeyDesc; 1] = [
    // GPIO1_IO18
    KeyDesc { gpio: LineId(18), code: KEY0_VALUE, name: "KEY0" },
];

const _: () = {
    let mut i = 0;
    while i < KEY_TABLE.len() {
        assert!(KEY_TABLE[i].has_valid_code());
        i += 1;
    }
};

#[derive(Copy, Clone, Debug)]
pub struct DriverConfig {
    /// How long a line has to stay quiet after an edge before it is sampled.
    pub settle_delay: MillisDurationU32,
    /// Level at which keys read as pressed and LED/beep outputs are on.
    pub polarity: Polarity,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self { settle_delay: SETTLE_DELAY_MS.millis(), polarity: Polarity::ActiveLow }
    }
}
