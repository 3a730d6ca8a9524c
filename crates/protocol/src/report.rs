//! HID boot-protocol mouse report
//!
//! Fixed 4-byte layout (USB HID Specification 1.11, Appendix B.2):
//! - Byte 0: buttons, bits 0..2
//! - Byte 1: X displacement (signed)
//! - Byte 2: Y displacement (signed)
//! - Byte 3: wheel displacement (signed)

use crate::error::{ProtocolError, Result};
use bitflags::bitflags;

/// Length of a boot mouse report with wheel
pub const BOOT_MOUSE_REPORT_LEN: usize = 4;

bitflags! {
    /// Mouse button states
    ///
    /// Only the three boot-protocol buttons are kept; higher bits of byte 0
    /// are vendor specific and dropped on decode.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct MouseButtons: u8 {
        /// Button 1 (left button)
        const LEFT   = 0b0000_0001;
        /// Button 2 (right button)
        const RIGHT  = 0b0000_0010;
        /// Button 3 (middle button / wheel click)
        const MIDDLE = 0b0000_0100;
    }
}

impl MouseButtons {
    /// Check if left button is pressed
    pub fn left(&self) -> bool {
        self.contains(Self::LEFT)
    }

    /// Check if right button is pressed
    pub fn right(&self) -> bool {
        self.contains(Self::RIGHT)
    }

    /// Check if middle button is pressed
    pub fn middle(&self) -> bool {
        self.contains(Self::MIDDLE)
    }
}

/// Decoded boot mouse report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MouseReport {
    /// Button states (3-bit mask)
    pub buttons: MouseButtons,
    /// X displacement
    pub x: i8,
    /// Y displacement
    pub y: i8,
    /// Wheel displacement
    pub wheel: i8,
}

impl MouseReport {
    /// Decode a report from raw bytes
    ///
    /// Requires at least [`BOOT_MOUSE_REPORT_LEN`] bytes; anything beyond is
    /// ignored.
    ///
    /// # Example
    ///
    /// ```
    /// use protocol::MouseReport;
    ///
    /// let report = MouseReport::parse(&[0x05, 10, 200, 0]).unwrap();
    /// assert!(report.buttons.left() && report.buttons.middle());
    /// assert_eq!(report.x, 10);
    /// assert_eq!(report.y as u8, 200);
    /// ```
    pub fn parse(data: &[u8]) -> Result<Self> {
        let [buttons, x, y, wheel, ..] = *data else {
            return Err(ProtocolError::ReportTooShort {
                needed: BOOT_MOUSE_REPORT_LEN,
                actual: data.len(),
            });
        };

        Ok(Self {
            buttons: MouseButtons::from_bits_truncate(buttons),
            x: x as i8,
            y: y as i8,
            wheel: wheel as i8,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_masks_high_button_bits() {
        let report = MouseReport::parse(&[0xFF, 0, 0, 0]).unwrap();
        assert_eq!(report.buttons.bits(), 0x07);
    }

    #[test]
    fn test_parse_signed_axes() {
        let report = MouseReport::parse(&[0x00, 0x05, 0xFB, 0x01]).unwrap();
        assert_eq!(report.x, 5);
        assert_eq!(report.y, -5);
        assert_eq!(report.wheel, 1);
    }

    #[test]
    fn test_parse_ignores_trailing_bytes() {
        let report = MouseReport::parse(&[0x02, 1, 2, 3, 0xAA, 0xBB]).unwrap();
        assert!(report.buttons.right());
        assert_eq!(report.wheel, 3);
    }

    #[test]
    fn test_parse_short_report() {
        let err = MouseReport::parse(&[0x01, 0x02, 0x03]).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::ReportTooShort {
                needed: 4,
                actual: 3
            }
        ));
    }
}
