/*
    MartyPC
    https://github.com/dbalsom/martypc

    Copyright 2022-2025 Daniel Balsom

    Permission is hereby granted, free of charge, to any person obtaining a
    copy of this software and associated documentation files (the “Software”),
    to deal in the Software without restriction, including without limitation
    the rights to use, copy, modify, merge, publish, distribute, sublicense,
    and/or sell copies of the Software, and to permit persons to whom the
    Software is furnished to do so, subject to the following conditions:

    The above copyright notice and this permission notice shall be included in
    all copies or substantial portions of the Software.

    THE SOFTWARE IS PROVIDED “AS IS”, WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
    IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
    FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
    AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
    LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING
    FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER
    DEALINGS IN THE SOFTWARE.

    --------------------------------------------------------------------------

    devices::fdc::status.rs

    Status register synthesis for the NEC µPD765
*/

//! Builds the ST0-ST3 status bytes a µPD765 reports in its result phase. Every host adapter,
//! including the Thomson controller, synthesizes status through this module so that the bit
//! patterns guest firmware sees do not depend on which adapter is in front of the core.

use crate::devices::floppy_drive::{DriveError, FloppyDiskDrive};
use thiserror::Error;

// Status Register 0
pub const ST0_DRIVE_MASK: u8 = 0b0000_0011;
pub const ST0_HEAD_ACTIVE: u8 = 0b0000_0100;
pub const ST0_NOT_READY: u8 = 0b0000_1000;
pub const ST0_UNIT_CHECK: u8 = 0b0001_0000;
pub const ST0_EQUIPMENT_CHECK: u8 = ST0_UNIT_CHECK;
pub const ST0_SEEK_END: u8 = 0b0010_0000;
pub const ST0_ABNORMAL_TERMINATION: u8 = 0b0100_0000;
pub const ST0_INVALID_OPCODE: u8 = 0b1000_0000;
pub const ST0_ABNORMAL_POLLING: u8 = 0b1100_0000;
pub const ST0_INTERRUPT_CODE_MASK: u8 = 0b1100_0000;

// Status Register 1
pub const ST1_NO_ID: u8 = 0b0000_0001;
pub const ST1_MISSING_ADDRESS_MARK: u8 = ST1_NO_ID;
pub const ST1_NOT_WRITEABLE: u8 = 0b0000_0010;
pub const ST1_NODATA: u8 = 0b0000_0100;
pub const ST1_OVERRUN: u8 = 0b0001_0000;
pub const ST1_CRC_ERROR: u8 = 0b0010_0000;
pub const ST1_END_OF_CYLINDER: u8 = 0b1000_0000;

// Status Register 2
pub const ST2_NO_DAM: u8 = 0b0000_0001;
pub const ST2_BAD_CYLINDER: u8 = 0b0000_0010;
pub const ST2_WRONG_CYLINDER: u8 = 0b0001_0000;
pub const ST2_DATA_CRC_ERROR: u8 = 0b0010_0000;
pub const ST2_CONTROL_MARK: u8 = 0b0100_0000;

// Status Register 3
pub const ST3_ESIG: u8 = 0b1000_0000;
pub const ST3_WRITE_PROTECT: u8 = 0b0100_0000;
pub const ST3_READY: u8 = 0b0010_0000;
pub const ST3_TRACK0: u8 = 0b0001_0000;
pub const ST3_DOUBLESIDED: u8 = 0b0000_1000;
pub const ST3_HEAD: u8 = 0b0000_0100;

/// Represents the possible values of the Interrupt Code field in Status Register 0.
/// InvalidCommand is returned for any command byte the controller does not decode.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum InterruptCode {
    #[default]
    NormalTermination,
    AbnormalTermination,
    InvalidCommand,
    AbnormalPolling,
}

impl InterruptCode {
    pub fn bits(&self) -> u8 {
        match self {
            InterruptCode::NormalTermination => 0,
            InterruptCode::AbnormalTermination => ST0_ABNORMAL_TERMINATION,
            InterruptCode::InvalidCommand => ST0_INVALID_OPCODE,
            InterruptCode::AbnormalPolling => ST0_ABNORMAL_POLLING,
        }
    }
}

/// The conditions that terminate a command abnormally. These never escape the controller as
/// Rust errors; they are folded into status bytes for the guest to interpret.
#[derive(Copy, Clone, Debug, Error, PartialEq, Eq)]
pub enum FdcError {
    #[error("drive not ready")]
    NotReady,
    #[error("sector not found")]
    NoData,
    #[error("medium is write protected")]
    NotWriteable,
    #[error("sector found on wrong cylinder")]
    WrongCylinder,
    #[error("sector found on bad cylinder")]
    BadCylinder,
    #[error("transfer ran past end of cylinder")]
    EndOfCylinder,
    #[error("no address mark found")]
    MissingAddressMark,
    #[error("track 0 not found")]
    EquipmentCheck,
    #[error("invalid command")]
    InvalidCommand,
}

impl From<DriveError> for FdcError {
    fn from(err: DriveError) -> Self {
        match err {
            DriveError::NoData | DriveError::NoMedia => FdcError::NoData,
            DriveError::NotWriteable => FdcError::NotWriteable,
        }
    }
}

/// The ST0, ST1 and ST2 registers as a unit.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct StatusRegisters {
    pub st0: u8,
    pub st1: u8,
    pub st2: u8,
}

impl StatusRegisters {
    /// Start a set of status registers for a command addressing `drive` on `head`, with a
    /// normal termination code.
    pub fn new(drive: usize, head: u8) -> Self {
        Self {
            st0: make_st0_byte(InterruptCode::NormalTermination, drive, head, false),
            st1: 0,
            st2: 0,
        }
    }

    /// The single byte reported for an undecodable command.
    pub fn invalid() -> Self {
        Self {
            st0: ST0_INVALID_OPCODE,
            ..Default::default()
        }
    }

    pub fn set_interrupt_code(&mut self, code: InterruptCode) {
        self.st0 = (self.st0 & !ST0_INTERRUPT_CODE_MASK) | code.bits();
    }

    pub fn set_seek_end(&mut self) {
        self.st0 |= ST0_SEEK_END;
    }

    /// Record a deleted (or, for Read Deleted Data, normal) data address mark.
    pub fn set_control_mark(&mut self) {
        self.st2 |= ST2_CONTROL_MARK;
    }

    /// Fold an error condition into the registers and mark the command as abnormally terminated.
    pub fn set_error(&mut self, err: FdcError) {
        match err {
            FdcError::NotReady => self.st0 |= ST0_NOT_READY,
            FdcError::NoData => self.st1 |= ST1_NODATA,
            FdcError::NotWriteable => self.st1 |= ST1_NOT_WRITEABLE,
            FdcError::WrongCylinder => {
                self.st1 |= ST1_NODATA;
                self.st2 |= ST2_WRONG_CYLINDER;
            }
            FdcError::BadCylinder => {
                self.st1 |= ST1_NODATA;
                self.st2 |= ST2_BAD_CYLINDER;
            }
            FdcError::EndOfCylinder => self.st1 |= ST1_END_OF_CYLINDER,
            FdcError::MissingAddressMark => self.st1 |= ST1_MISSING_ADDRESS_MARK | ST1_NODATA,
            FdcError::EquipmentCheck => self.st0 |= ST0_EQUIPMENT_CHECK,
            FdcError::InvalidCommand => {
                *self = StatusRegisters::invalid();
                return;
            }
        }
        self.set_interrupt_code(InterruptCode::AbnormalTermination);
    }

    /// Classify a stored sector ID that matched on record and head but not on cylinder.
    pub fn cylinder_mismatch(stored_c: u8) -> FdcError {
        if stored_c == 0xFF {
            FdcError::BadCylinder
        }
        else {
            FdcError::WrongCylinder
        }
    }

    pub fn to_bytes(&self) -> [u8; 3] {
        [self.st0, self.st1, self.st2]
    }
}

/// Create the ST0 status register bitfield with the given parameters.
pub fn make_st0_byte(interrupt_code: InterruptCode, drive_select: usize, head: u8, seek_end: bool) -> u8 {
    let mut st0 = (drive_select as u8) & ST0_DRIVE_MASK;
    if head & 0x01 != 0 {
        st0 |= ST0_HEAD_ACTIVE;
    }
    if seek_end {
        st0 |= ST0_SEEK_END;
    }
    st0 | interrupt_code.bits()
}

/// Generate the value of the ST3 Status Register for a drive.
/// ST3 is sent in response to Sense Drive Status.
pub fn make_st3_byte(drive: &FloppyDiskDrive, drive_select: usize, head: u8) -> u8 {
    let mut st3_byte = (drive_select as u8) & ST0_DRIVE_MASK;

    if head & 0x01 != 0 {
        st3_byte |= ST3_HEAD;
    }
    if drive.is_double_sided() {
        st3_byte |= ST3_DOUBLESIDED;
    }
    if drive.track_zero {
        st3_byte |= ST3_TRACK0;
    }
    if drive.is_ready() {
        st3_byte |= ST3_READY;
    }
    if drive.is_write_protected() {
        st3_byte |= ST3_WRITE_PROTECT;
    }
    if drive.fault {
        st3_byte |= ST3_ESIG;
    }
    st3_byte
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device_types::geometry::DriveGeometry;

    #[test]
    fn st0_carries_drive_head_and_code() {
        assert_eq!(make_st0_byte(InterruptCode::NormalTermination, 2, 1, false), 0x06);
        assert_eq!(make_st0_byte(InterruptCode::NormalTermination, 1, 0, true), 0x21);
        assert_eq!(make_st0_byte(InterruptCode::AbnormalPolling, 3, 0, false), 0xC3);
    }

    #[test]
    fn errors_map_to_status_bits() {
        let mut regs = StatusRegisters::new(0, 0);
        regs.set_error(FdcError::NotWriteable);
        assert_eq!(regs.to_bytes(), [0x40, ST1_NOT_WRITEABLE, 0]);

        let mut regs = StatusRegisters::new(1, 1);
        regs.set_error(StatusRegisters::cylinder_mismatch(0xFF));
        assert_eq!(regs.to_bytes(), [0x45, ST1_NODATA, ST2_BAD_CYLINDER]);

        let mut regs = StatusRegisters::new(0, 0);
        regs.set_error(StatusRegisters::cylinder_mismatch(7));
        assert_eq!(regs.st2, ST2_WRONG_CYLINDER);

        let mut regs = StatusRegisters::new(0, 0);
        regs.set_error(FdcError::NotReady);
        assert_eq!(regs.st0, ST0_ABNORMAL_TERMINATION | ST0_NOT_READY);

        let mut regs = StatusRegisters::new(3, 1);
        regs.set_error(FdcError::InvalidCommand);
        assert_eq!(regs.to_bytes(), [0x80, 0, 0]);
    }

    #[test]
    fn drive_errors_fold_into_no_data() {
        assert_eq!(FdcError::from(DriveError::NoMedia), FdcError::NoData);
        assert_eq!(FdcError::from(DriveError::NotWriteable), FdcError::NotWriteable);
    }

    #[test]
    fn st3_reflects_drive_lines() {
        let mut drive = FloppyDiskDrive::new(1);
        drive.set_geometry(DriveGeometry::new(80, 2, 9, 512));
        drive.set_ready_state(true, true);
        drive.set_write_protect(true);
        assert_eq!(
            make_st3_byte(&drive, 1, 1),
            0x01 | ST3_HEAD | ST3_DOUBLESIDED | ST3_TRACK0 | ST3_READY | ST3_WRITE_PROTECT
        );
        drive.seek(5).unwrap();
        assert_eq!(make_st3_byte(&drive, 1, 0) & ST3_TRACK0, 0);
    }
}
