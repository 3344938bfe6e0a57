use crate::config::{INVALID_KEY, RELEASE_TAG};

/// The classified state of a key as published by the debouncer.
///
/// On the wire this is a single byte: the key code for a press, the key code with
/// [`RELEASE_TAG`] set for a release, and [`INVALID_KEY`] when nothing usable has been
/// seen. Only codes up to [`MAX_KEY_CODE`](crate::config::MAX_KEY_CODE) survive the
/// trip through a byte.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum KeyValue {
    #[default]
    Unset,
    Pressed(u8),
    Released(u8),
    Invalid,
}

impl KeyValue {
    pub fn is_pressed(self) -> bool {
        matches!(self, KeyValue::Pressed(_))
    }

    pub fn code(self) -> Option<u8> {
        match self {
            KeyValue::Pressed(code) | KeyValue::Released(code) => Some(code),
            KeyValue::Unset | KeyValue::Invalid => None,
        }
    }
}

impl From<KeyValue> for u8 {
    fn from(value: KeyValue) -> Self {
        match value {
            KeyValue::Pressed(code) => code & !RELEASE_TAG,
            KeyValue::Released(code) => RELEASE_TAG | code,
            KeyValue::Unset | KeyValue::Invalid => INVALID_KEY,
        }
    }
}

impl From<u8> for KeyValue {
    fn from(byte: u8) -> Self {
        match byte {
            INVALID_KEY => KeyValue::Invalid,
            byte if byte & RELEASE_TAG != 0 => KeyValue::Released(byte & !RELEASE_TAG),
            code => KeyValue::Pressed(code),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::KEY0_VALUE;

    #[test]
    fn release_codes_carry_the_tag() {
        assert_eq!(u8::from(KeyValue::Pressed(KEY0_VALUE)), 0x01);
        assert_eq!(u8::from(KeyValue::Released(KEY0_VALUE)), 0x81);
        assert_eq!(KeyValue::from(0x81), KeyValue::Released(KEY0_VALUE));
        assert_eq!(KeyValue::from(0x01), KeyValue::Pressed(KEY0_VALUE));
    }

    #[test]
    fn nothing_classified_reads_as_invalid() {
        assert_eq!(u8::from(KeyValue::Unset), INVALID_KEY);
        assert_eq!(KeyValue::from(INVALID_KEY), KeyValue::Invalid);
        assert_eq!(KeyValue::Invalid.code(), None);
    }
}
