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

    devices::fdc::command.rs

    Command decoding for the NEC µPD765
*/

//! Commands arrive over the data register as an opcode byte followed by a fixed number of
//! parameter bytes. [CommandKind::decode] identifies the opcode and its arity; once all parameter
//! bytes are collected, [Command::decode] builds a [Command] carrying its parameters.

use crate::device_types::chs::DiskChsn;
use modular_bitfield::{bitfield, prelude::*};

pub const COMMAND_MASK: u8 = 0b0001_1111;
pub const COMMAND_SKIP_BIT: u8 = 0b0010_0000;
pub const COMMAND_MFM_BIT: u8 = 0b0100_0000;
pub const COMMAND_MT_BIT: u8 = 0b1000_0000;

pub const COMMAND_READ_TRACK: u8 = 0x02;
pub const COMMAND_SPECIFY: u8 = 0x03;
pub const COMMAND_SENSE_DRIVE_STATUS: u8 = 0x04;
pub const COMMAND_WRITE_DATA: u8 = 0x05;
pub const COMMAND_READ_DATA: u8 = 0x06;
pub const COMMAND_RECALIBRATE: u8 = 0x07;
pub const COMMAND_SENSE_INT_STATUS: u8 = 0x08;
pub const COMMAND_WRITE_DELETED_DATA: u8 = 0x09;
pub const COMMAND_READ_ID: u8 = 0x0A;
pub const COMMAND_READ_DELETED_DATA: u8 = 0x0C;
pub const COMMAND_FORMAT_TRACK: u8 = 0x0D;
pub const COMMAND_SEEK: u8 = 0x0F;

#[bitfield]
#[derive(Copy, Clone)]
pub struct CommandByte {
    pub command: B5,
    pub skip: bool,
    pub mfm: bool,
    pub mt: bool,
}

#[bitfield]
#[derive(Copy, Clone)]
pub struct DriveHeadSelect {
    pub drive: B2,
    pub head:  B1,
    #[skip]
    unused:    B5,
}

#[bitfield]
#[derive(Copy, Clone)]
pub struct StepRateHeadUnload {
    pub head_unload: B4,
    pub step_rate:   B4,
}

#[bitfield]
#[derive(Copy, Clone)]
pub struct HeadLoadDma {
    pub non_dma:   bool,
    pub head_load: B7,
}

/// Identifies a command by opcode, before its parameters have been received.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, strum_macros::Display)]
pub enum CommandKind {
    #[default]
    NoCommand,
    ReadTrack,
    Specify,
    SenseDriveStatus,
    WriteData,
    ReadData,
    Recalibrate,
    SenseInterruptStatus,
    WriteDeletedData,
    ReadId,
    ReadDeletedData,
    FormatTrack,
    Seek,
    Invalid,
}

impl CommandKind {
    /// Decode the low five bits of an opcode byte.
    pub fn decode(byte: u8) -> CommandKind {
        match CommandByte::from_bytes([byte]).command() {
            COMMAND_READ_TRACK => CommandKind::ReadTrack,
            COMMAND_SPECIFY => CommandKind::Specify,
            COMMAND_SENSE_DRIVE_STATUS => CommandKind::SenseDriveStatus,
            COMMAND_WRITE_DATA => CommandKind::WriteData,
            COMMAND_READ_DATA => CommandKind::ReadData,
            COMMAND_RECALIBRATE => CommandKind::Recalibrate,
            COMMAND_SENSE_INT_STATUS => CommandKind::SenseInterruptStatus,
            COMMAND_WRITE_DELETED_DATA => CommandKind::WriteDeletedData,
            COMMAND_READ_ID => CommandKind::ReadId,
            COMMAND_READ_DELETED_DATA => CommandKind::ReadDeletedData,
            COMMAND_FORMAT_TRACK => CommandKind::FormatTrack,
            COMMAND_SEEK => CommandKind::Seek,
            _ => CommandKind::Invalid,
        }
    }

    /// The number of parameter bytes that follow the opcode byte.
    pub fn param_count(&self) -> usize {
        match self {
            CommandKind::ReadTrack
            | CommandKind::WriteData
            | CommandKind::ReadData
            | CommandKind::WriteDeletedData
            | CommandKind::ReadDeletedData => 8,
            CommandKind::FormatTrack => 5,
            CommandKind::Specify | CommandKind::Seek => 2,
            CommandKind::SenseDriveStatus | CommandKind::Recalibrate | CommandKind::ReadId => 1,
            CommandKind::NoCommand | CommandKind::SenseInterruptStatus | CommandKind::Invalid => 0,
        }
    }
}

/// Parameters shared by the data transfer commands.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TransferParams {
    pub mt: bool,
    pub mfm: bool,
    pub skip: bool,
    pub drive: usize,
    /// Physical head, from the drive/head select byte.
    pub head: u8,
    /// The sector ID to start with.
    pub id: DiskChsn,
    pub eot: u8,
    pub gpl: u8,
    pub dtl: u8,
}

impl TransferParams {
    /// Bytes transferred per sector. With N = 0 the DTL parameter sets the transfer length.
    pub fn sector_len(&self) -> usize {
        if self.id.n() == 0 && self.dtl != 0 && self.dtl < 0x80 {
            self.dtl as usize
        }
        else {
            self.id.n_size()
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct FormatParams {
    pub mfm: bool,
    pub drive: usize,
    pub head: u8,
    pub n: u8,
    /// Sectors per track.
    pub sc: u8,
    pub gpl: u8,
    pub filler: u8,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct SpecifyParams {
    pub step_rate: u8,
    pub head_unload: u8,
    pub head_load: u8,
    pub non_dma: bool,
}

/// A fully received command.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Command {
    ReadData(TransferParams),
    ReadDeletedData(TransferParams),
    WriteData(TransferParams),
    WriteDeletedData(TransferParams),
    ReadTrack(TransferParams),
    ReadId { mfm: bool, drive: usize, head: u8 },
    FormatTrack(FormatParams),
    Seek { drive: usize, head: u8, cylinder: u8 },
    Recalibrate { drive: usize },
    SenseInterruptStatus,
    SenseDriveStatus { drive: usize, head: u8 },
    Specify(SpecifyParams),
    Invalid(u8),
}

impl Command {
    /// Build a command from its opcode byte and parameter bytes. Missing parameter bytes read as 0.
    pub fn decode(opcode: u8, params: &[u8]) -> Command {
        let cb = CommandByte::from_bytes([opcode]);
        let p = |i: usize| params.get(i).copied().unwrap_or(0);
        let dhs = DriveHeadSelect::from_bytes([p(0)]);
        let drive = dhs.drive() as usize;
        let head = dhs.head();

        let transfer = || TransferParams {
            mt: cb.mt(),
            mfm: cb.mfm(),
            skip: cb.skip(),
            drive,
            head,
            id: DiskChsn::new(p(1), p(2), p(3), p(4)),
            eot: p(5),
            gpl: p(6),
            dtl: p(7),
        };

        match CommandKind::decode(opcode) {
            CommandKind::ReadData => Command::ReadData(transfer()),
            CommandKind::ReadDeletedData => Command::ReadDeletedData(transfer()),
            CommandKind::WriteData => Command::WriteData(transfer()),
            CommandKind::WriteDeletedData => Command::WriteDeletedData(transfer()),
            CommandKind::ReadTrack => Command::ReadTrack(transfer()),
            CommandKind::ReadId => Command::ReadId {
                mfm: cb.mfm(),
                drive,
                head,
            },
            CommandKind::FormatTrack => Command::FormatTrack(FormatParams {
                mfm: cb.mfm(),
                drive,
                head,
                n: p(1),
                sc: p(2),
                gpl: p(3),
                filler: p(4),
            }),
            CommandKind::Seek => Command::Seek {
                drive,
                head,
                cylinder: p(1),
            },
            CommandKind::Recalibrate => Command::Recalibrate { drive },
            CommandKind::SenseInterruptStatus => Command::SenseInterruptStatus,
            CommandKind::SenseDriveStatus => Command::SenseDriveStatus { drive, head },
            CommandKind::Specify => {
                let srhu = StepRateHeadUnload::from_bytes([p(0)]);
                let hld = HeadLoadDma::from_bytes([p(1)]);
                Command::Specify(SpecifyParams {
                    step_rate: srhu.step_rate(),
                    head_unload: srhu.head_unload(),
                    head_load: hld.head_load(),
                    non_dma: hld.non_dma(),
                })
            }
            CommandKind::NoCommand | CommandKind::Invalid => Command::Invalid(opcode),
        }
    }

    pub fn kind(&self) -> CommandKind {
        match self {
            Command::ReadData(_) => CommandKind::ReadData,
            Command::ReadDeletedData(_) => CommandKind::ReadDeletedData,
            Command::WriteData(_) => CommandKind::WriteData,
            Command::WriteDeletedData(_) => CommandKind::WriteDeletedData,
            Command::ReadTrack(_) => CommandKind::ReadTrack,
            Command::ReadId { .. } => CommandKind::ReadId,
            Command::FormatTrack(_) => CommandKind::FormatTrack,
            Command::Seek { .. } => CommandKind::Seek,
            Command::Recalibrate { .. } => CommandKind::Recalibrate,
            Command::SenseInterruptStatus => CommandKind::SenseInterruptStatus,
            Command::SenseDriveStatus { .. } => CommandKind::SenseDriveStatus,
            Command::Specify(_) => CommandKind::Specify,
            Command::Invalid(_) => CommandKind::Invalid,
        }
    }

    /// The drive a command addresses, if any.
    pub fn drive(&self) -> Option<usize> {
        match self {
            Command::ReadData(p)
            | Command::ReadDeletedData(p)
            | Command::WriteData(p)
            | Command::WriteDeletedData(p)
            | Command::ReadTrack(p) => Some(p.drive),
            Command::FormatTrack(p) => Some(p.drive),
            Command::ReadId { drive, .. }
            | Command::Seek { drive, .. }
            | Command::Recalibrate { drive }
            | Command::SenseDriveStatus { drive, .. } => Some(*drive),
            Command::SenseInterruptStatus | Command::Specify(_) | Command::Invalid(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opcode_flags_do_not_change_kind() {
        assert_eq!(CommandKind::decode(0x06), CommandKind::ReadData);
        assert_eq!(CommandKind::decode(0xE6), CommandKind::ReadData);
        assert_eq!(CommandKind::decode(0x4D), CommandKind::FormatTrack);
        assert_eq!(CommandKind::decode(0x4A), CommandKind::ReadId);
        assert_eq!(CommandKind::decode(0x11), CommandKind::Invalid, "Scan Equal is not decoded");
        assert_eq!(CommandKind::decode(0x00), CommandKind::Invalid);
    }

    #[test]
    fn arity_table() {
        assert_eq!(CommandKind::ReadData.param_count(), 8);
        assert_eq!(CommandKind::FormatTrack.param_count(), 5);
        assert_eq!(CommandKind::Seek.param_count(), 2);
        assert_eq!(CommandKind::Recalibrate.param_count(), 1);
        assert_eq!(CommandKind::SenseInterruptStatus.param_count(), 0);
    }

    #[test]
    fn read_data_params_decode() {
        let cmd = Command::decode(0xC6, &[0x05, 3, 1, 4, 2, 9, 0x2A, 0xFF]);
        let Command::ReadData(p) = cmd
        else {
            panic!("Expected ReadData, got {:?}", cmd);
        };
        assert!(p.mt && p.mfm && !p.skip);
        assert_eq!(p.drive, 1);
        assert_eq!(p.head, 1);
        assert_eq!(p.id, DiskChsn::new(3, 1, 4, 2));
        assert_eq!(p.eot, 9);
        assert_eq!(p.sector_len(), 512);
        assert_eq!(cmd.drive(), Some(1));
    }

    #[test]
    fn dtl_applies_only_with_n_zero() {
        let cmd = Command::decode(0x06, &[0, 0, 0, 1, 0, 1, 0x1B, 0x40]);
        let Command::ReadData(p) = cmd
        else {
            panic!("Expected ReadData");
        };
        assert_eq!(p.sector_len(), 0x40);
    }

    #[test]
    fn specify_decodes_non_dma() {
        let cmd = Command::decode(0x03, &[0xDF, 0x03]);
        assert_eq!(
            cmd,
            Command::Specify(SpecifyParams {
                step_rate: 0xD,
                head_unload: 0xF,
                head_load: 1,
                non_dma: true,
            })
        );
    }
}
