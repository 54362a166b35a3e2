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

    devices::thmfc1.rs

    Thomson THMFC1 floppy controller gate array
*/

//! The THMFC1 is the floppy controller of the Thomson TO8/TO9+ family. Its register block
//! bears no resemblance to the µPD765: the CPU loads a track and sector register, issues one of
//! three operations through CMD0, and moves bytes through a single data register while polling
//! STAT0. It shares the drive model and the status synthesizer with the µPD765 core, so error
//! conditions are detected and reported the same way.
//!
//! Register map, as offsets from the I/O base:
//!
//! | Offset | Write                                  | Read                         |
//! |--------|----------------------------------------|------------------------------|
//! | 0      | CMD0: operation                        | STAT0: transfer/error status |
//! | 1      | CMD1: density (bit 1 set = MFM)        | STAT1: drive status          |
//! | 2      | CMD2: drive (0-1), motor (2), side (4) | CMD2                         |
//! | 3      | WDATA                                  | RDATA                        |
//! | 5      | Sector register                        | Sector register              |
//! | 6      | Track register, seeks the drive        | Track register               |

use crate::{
    bus::{IoDevice, NO_IO_BYTE},
    device_types::{chs::DiskChsn, medium::SectorMatch},
    devices::{
        fdc::{
            data_adapter::{DataAdapter, TransferState},
            status::{
                make_st3_byte,
                FdcError,
                StatusRegisters,
                ST0_NOT_READY,
                ST1_MISSING_ADDRESS_MARK,
                ST1_NODATA,
                ST1_NOT_WRITEABLE,
                ST2_BAD_CYLINDER,
                ST2_WRONG_CYLINDER,
                ST3_READY,
                ST3_TRACK0,
                ST3_WRITE_PROTECT,
            },
        },
        floppy_drive::FloppyDiskDrive,
    },
};

pub const THMFC1_IO_BASE: u16 = 0xE7D0;
pub const THMFC1_MAX_DRIVES: usize = 4;

pub const THMFC1_CMD0: u16 = 0x00;
pub const THMFC1_CMD1: u16 = 0x01;
pub const THMFC1_CMD2: u16 = 0x02;
pub const THMFC1_DATA: u16 = 0x03;
pub const THMFC1_SECTOR: u16 = 0x05;
pub const THMFC1_TRACK: u16 = 0x06;

pub const CMD0_OP_MASK: u8 = 0b0000_0011;
pub const CMD0_RESET: u8 = 0x00;
pub const CMD0_WRITE_SECTOR: u8 = 0x01;
pub const CMD0_READ_ADDRESS: u8 = 0x02;
pub const CMD0_READ_SECTOR: u8 = 0x03;

pub const CMD1_MFM: u8 = 0b0000_0010;

pub const CMD2_DRIVE_MASK: u8 = 0b0000_0011;
pub const CMD2_MOTOR: u8 = 0b0000_0100;
pub const CMD2_SIDE: u8 = 0b0001_0000;

pub const STAT0_NOT_READY: u8 = 0b0000_0001;
pub const STAT0_WRITE_PROTECT: u8 = 0b0000_0010;
pub const STAT0_NOT_FOUND: u8 = 0b0000_0100;
pub const STAT0_DONE: u8 = 0b0000_1000;
pub const STAT0_NO_ADDRESS_MARK: u8 = 0b0001_0000;
pub const STAT0_BAD_TRACK: u8 = 0b0010_0000;
pub const STAT0_BYTE_READY: u8 = 0b1000_0000;

const STAT1_MASK: u8 = ST3_WRITE_PROTECT | ST3_READY | ST3_TRACK0;

/// Recording density selected through CMD1. The density fixes the sector size.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum Density {
    /// Single density, 128 byte sectors.
    Fm,
    /// Double density, 256 byte sectors.
    #[default]
    Mfm,
}

impl Density {
    pub fn size_code(&self) -> u8 {
        match self {
            Density::Fm => 0,
            Density::Mfm => 1,
        }
    }

    pub fn sector_size(&self) -> usize {
        DiskChsn::n_to_bytes(self.size_code())
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
enum Thmfc1Op {
    #[default]
    Idle,
    ReadSector,
    WriteSector,
    ReadAddress,
}

pub struct Thmfc1 {
    io_base: u16,
    drives: [FloppyDiskDrive; THMFC1_MAX_DRIVES],
    cmd2: u8,
    density: Density,
    track_reg: u8,
    sector_reg: u8,
    op: Thmfc1Op,
    data: DataAdapter,
    regs: StatusRegisters,
    done: bool,
}

impl Default for Thmfc1 {
    fn default() -> Self {
        Thmfc1::new(THMFC1_IO_BASE)
    }
}

impl Thmfc1 {
    pub fn new(io_base: u16) -> Self {
        Self {
            io_base,
            drives: [
                FloppyDiskDrive::new(0),
                FloppyDiskDrive::new(1),
                FloppyDiskDrive::new(2),
                FloppyDiskDrive::new(3),
            ],
            cmd2: 0,
            density: Density::default(),
            track_reg: 0,
            sector_reg: 1,
            op: Thmfc1Op::Idle,
            data: DataAdapter::default(),
            regs: StatusRegisters::default(),
            done: false,
        }
    }

    pub fn drive(&self, drive: usize) -> Option<&FloppyDiskDrive> {
        self.drives.get(drive)
    }

    pub fn drive_mut(&mut self, drive: usize) -> Option<&mut FloppyDiskDrive> {
        self.drives.get_mut(drive)
    }

    #[inline]
    pub fn density(&self) -> Density {
        self.density
    }

    #[inline]
    fn selected(&self) -> usize {
        (self.cmd2 & CMD2_DRIVE_MASK) as usize
    }

    #[inline]
    fn side(&self) -> u8 {
        (self.cmd2 & CMD2_SIDE != 0) as u8
    }

    pub fn reset(&mut self) {
        self.op = Thmfc1Op::Idle;
        self.data.reset();
        self.regs = StatusRegisters::default();
        self.done = false;
    }

    /// Read STAT0.
    pub fn stat0(&self) -> u8 {
        let mut byte = stat0_error_bits(&self.regs);
        if self.done {
            byte |= STAT0_DONE;
        }
        if self.op != Thmfc1Op::Idle && self.data.state() != TransferState::Idle && !self.data.is_complete() {
            byte |= STAT0_BYTE_READY;
        }
        byte
    }

    /// Read STAT1: the write protect, ready and track 0 lines of the selected drive, in the
    /// same bit positions as ST3.
    pub fn stat1(&self) -> u8 {
        let drive = self.selected();
        make_st3_byte(&self.drives[drive], drive, self.side()) & STAT1_MASK
    }

    pub fn cmd0_w(&mut self, data: u8) {
        self.reset();
        match data & CMD0_OP_MASK {
            CMD0_RESET => log::trace!("THMFC1: reset"),
            CMD0_WRITE_SECTOR => self.begin_write_sector(),
            CMD0_READ_ADDRESS => self.begin_read_address(),
            _ => self.begin_read_sector(),
        }
    }

    pub fn cmd1_w(&mut self, data: u8) {
        self.density = match data & CMD1_MFM != 0 {
            true => Density::Mfm,
            false => Density::Fm,
        };
        log::trace!("THMFC1: density {:?}", self.density);
    }

    pub fn cmd2_w(&mut self, data: u8) {
        self.cmd2 = data;
        let on = data & CMD2_MOTOR != 0;
        let (drive, side) = (self.selected(), self.side());
        for (i, d) in self.drives.iter_mut().enumerate() {
            d.set_motor_state(on && i == drive);
        }
        self.drives[drive].select_head(side);
    }

    /// Load the track register and step the selected drive's head to that track.
    pub fn track_w(&mut self, track: u8) {
        self.track_reg = track;
        let drive = self.selected();
        if self.drives[drive].seek(track).is_err() {
            log::warn!("THMFC1: seek on drive {} with no geometry", drive);
        }
    }

    pub fn sector_w(&mut self, sector: u8) {
        self.sector_reg = sector;
    }

    pub fn data_r(&mut self) -> u8 {
        if self.data.state() != TransferState::Reading {
            log::warn!("THMFC1: data read with no read in progress");
            return NO_IO_BYTE;
        }
        let byte = self.data.read_byte().unwrap_or(NO_IO_BYTE);
        if self.data.is_complete() {
            self.finish();
        }
        byte
    }

    pub fn data_w(&mut self, data: u8) {
        if self.data.state() != TransferState::Writing {
            log::warn!("THMFC1: data write with no write in progress: {:02X}", data);
            return;
        }
        self.data.write_byte(data);
        if self.data.is_complete() {
            self.commit_write();
        }
    }

    fn target_id(&self) -> DiskChsn {
        DiskChsn::new(self.track_reg, self.side(), self.sector_reg, self.density.size_code())
    }

    /// Check the selected drive can be accessed, recording an error if not.
    fn check_ready(&mut self, write: bool) -> bool {
        let drive = &self.drives[self.selected()];
        let err = if !drive.is_ready() {
            Some(FdcError::NotReady)
        }
        else if write && drive.is_write_protected() {
            Some(FdcError::NotWriteable)
        }
        else {
            None
        };
        if let Some(err) = err {
            self.fail(err);
            return false;
        }
        true
    }

    fn locate_sector(&self) -> Result<Vec<u8>, FdcError> {
        let drive = &self.drives[self.selected()];
        let id = self.target_id();
        match drive.find_sector(drive.current_track, self.side(), &id)? {
            SectorMatch::Found(sector) => Ok(sector.data().to_vec()),
            SectorMatch::WrongCylinder(sector) => Err(StatusRegisters::cylinder_mismatch(sector.id().c())),
            SectorMatch::NotFound => Err(FdcError::NoData),
        }
    }

    fn begin_read_sector(&mut self) {
        if !self.check_ready(false) {
            return;
        }
        match self.locate_sector() {
            Ok(mut data) => {
                log::trace!("THMFC1: read sector {}", self.target_id());
                data.resize(self.density.sector_size(), 0);
                self.op = Thmfc1Op::ReadSector;
                self.data.begin_read(data);
            }
            Err(err) => self.fail(err),
        }
    }

    fn begin_write_sector(&mut self) {
        if !self.check_ready(true) {
            return;
        }
        match self.locate_sector() {
            Ok(_) => {
                log::trace!("THMFC1: write sector {}", self.target_id());
                self.op = Thmfc1Op::WriteSector;
                self.data.begin_write(self.density.sector_size());
            }
            Err(err) => self.fail(err),
        }
    }

    /// Read the next ID field under the head: C, H, R, N.
    fn begin_read_address(&mut self) {
        if !self.check_ready(false) {
            return;
        }
        let drive = &self.drives[self.selected()];
        let first = drive
            .track_sectors(drive.current_track, self.side())
            .ok()
            .and_then(|sectors| sectors.first())
            .map(|s| s.id());
        match first {
            Some(id) => {
                let (c, h, r, n) = id.get();
                self.op = Thmfc1Op::ReadAddress;
                self.data.begin_read(vec![c, h, r, n]);
            }
            None => self.fail(FdcError::MissingAddressMark),
        }
    }

    fn commit_write(&mut self) {
        let data = self.data.take_data();
        let (drive, side, id) = (self.selected(), self.side(), self.target_id());
        let track = self.drives[drive].current_track;
        match self.drives[drive].write_sector(track, side, &id, &data, false) {
            Ok(()) => self.finish(),
            Err(e) => self.fail(e.into()),
        }
    }

    fn finish(&mut self) {
        log::trace!("THMFC1: {:?} complete", self.op);
        self.op = Thmfc1Op::Idle;
        self.data.reset();
        self.done = true;
    }

    fn fail(&mut self, err: FdcError) {
        log::trace!("THMFC1: {:?} failed: {}", self.op, err);
        self.regs = StatusRegisters::new(self.selected(), self.side());
        self.regs.set_error(err);
        self.finish();
    }
}

/// Fold µPD765 style status registers into the THMFC1 error bits.
fn stat0_error_bits(regs: &StatusRegisters) -> u8 {
    let mut byte = 0;
    if regs.st0 & ST0_NOT_READY != 0 {
        byte |= STAT0_NOT_READY;
    }
    if regs.st1 & ST1_NOT_WRITEABLE != 0 {
        byte |= STAT0_WRITE_PROTECT;
    }
    if regs.st1 & ST1_MISSING_ADDRESS_MARK != 0 {
        byte |= STAT0_NO_ADDRESS_MARK;
    }
    else if regs.st1 & ST1_NODATA != 0 {
        byte |= STAT0_NOT_FOUND;
    }
    if regs.st2 & (ST2_WRONG_CYLINDER | ST2_BAD_CYLINDER) != 0 {
        byte |= STAT0_BAD_TRACK;
    }
    byte
}

impl IoDevice for Thmfc1 {
    fn read_u8(&mut self, port: u16) -> u8 {
        match port.wrapping_sub(self.io_base) {
            THMFC1_CMD0 => self.stat0(),
            THMFC1_CMD1 => self.stat1(),
            THMFC1_CMD2 => self.cmd2,
            THMFC1_DATA => self.data_r(),
            THMFC1_SECTOR => self.sector_reg,
            THMFC1_TRACK => self.track_reg,
            _ => {
                log::warn!("THMFC1: Read from unmapped port {:04X}", port);
                NO_IO_BYTE
            }
        }
    }

    fn write_u8(&mut self, port: u16, data: u8) {
        match port.wrapping_sub(self.io_base) {
            THMFC1_CMD0 => self.cmd0_w(data),
            THMFC1_CMD1 => self.cmd1_w(data),
            THMFC1_CMD2 => self.cmd2_w(data),
            THMFC1_DATA => self.data_w(data),
            THMFC1_SECTOR => self.sector_w(data),
            THMFC1_TRACK => self.track_w(data),
            _ => log::warn!("THMFC1: Write to unmapped port {:04X}: {:02X}", port, data),
        }
    }

    fn port_list(&self) -> Vec<(String, u16)> {
        vec![
            (String::from("THMFC1 CMD0/STAT0"), self.io_base + THMFC1_CMD0),
            (String::from("THMFC1 CMD1/STAT1"), self.io_base + THMFC1_CMD1),
            (String::from("THMFC1 CMD2"), self.io_base + THMFC1_CMD2),
            (String::from("THMFC1 Data"), self.io_base + THMFC1_DATA),
            (String::from("THMFC1 Sector"), self.io_base + THMFC1_SECTOR),
            (String::from("THMFC1 Track"), self.io_base + THMFC1_TRACK),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device_types::{
        fdc::StandardGeometry,
        medium::{FloppyMedium, Sector},
    };

    const CMD0: u16 = THMFC1_IO_BASE + THMFC1_CMD0;
    const CMD1: u16 = THMFC1_IO_BASE + THMFC1_CMD1;
    const CMD2: u16 = THMFC1_IO_BASE + THMFC1_CMD2;
    const DATA: u16 = THMFC1_IO_BASE + THMFC1_DATA;
    const SECTOR: u16 = THMFC1_IO_BASE + THMFC1_SECTOR;
    const TRACK: u16 = THMFC1_IO_BASE + THMFC1_TRACK;

    fn thmfc1_with_disk() -> Thmfc1 {
        let mut fc = Thmfc1::default();
        let geometry = StandardGeometry::Thomson80.geometry();
        let mut medium = FloppyMedium::formatted(geometry, 0xE5);
        let pattern: Vec<u8> = (0..=255).collect();
        medium.write_sector(12, 0, &DiskChsn::new(12, 0, 7, 1), &pattern, false);
        let drive = fc.drive_mut(0).unwrap();
        drive.set_geometry(geometry);
        drive.insert_medium(medium);
        fc.write_u8(CMD1, CMD1_MFM);
        fc.write_u8(CMD2, CMD2_MOTOR);
        fc
    }

    #[test]
    fn read_sector_after_seek() {
        let mut fc = thmfc1_with_disk();
        fc.write_u8(TRACK, 12);
        fc.write_u8(SECTOR, 7);
        assert_eq!(fc.drive(0).map(|d| d.current_track), Some(12));

        fc.write_u8(CMD0, CMD0_READ_SECTOR);
        let mut data = Vec::new();
        while fc.read_u8(CMD0) & STAT0_BYTE_READY != 0 {
            data.push(fc.read_u8(DATA));
        }
        assert_eq!(data.len(), 256);
        assert_eq!(data[200], 200);
        assert_eq!(fc.read_u8(CMD0), STAT0_DONE);
    }

    #[test]
    fn write_sector_round_trip() {
        let mut fc = thmfc1_with_disk();
        fc.write_u8(TRACK, 3);
        fc.write_u8(SECTOR, 16);
        fc.write_u8(CMD0, CMD0_WRITE_SECTOR);
        assert_ne!(fc.read_u8(CMD0) & STAT0_BYTE_READY, 0);
        for _ in 0..256 {
            fc.write_u8(DATA, 0x42);
        }
        assert_eq!(fc.read_u8(CMD0), STAT0_DONE);

        let written = fc
            .drive(0)
            .and_then(|d| d.medium())
            .and_then(|m| m.read_sector(3, 0, 16))
            .map(|s| s.data().to_vec())
            .unwrap();
        assert!(written.iter().all(|&b| b == 0x42));
    }

    #[test]
    fn write_sector_matches_track_register() {
        let geometry = StandardGeometry::Thomson80.geometry();
        let mut medium = FloppyMedium::formatted(geometry, 0xE5);
        medium.set_track(
            4,
            0,
            vec![
                Sector::new(DiskChsn::new(40, 0, 1, 1), vec![0x11; 256], false),
                Sector::new(DiskChsn::new(4, 0, 1, 1), vec![0x22; 256], false),
            ],
        );
        let mut fc = Thmfc1::default();
        fc.drive_mut(0).unwrap().insert_medium(medium);
        fc.write_u8(CMD1, CMD1_MFM);
        fc.write_u8(CMD2, CMD2_MOTOR);

        fc.write_u8(TRACK, 4);
        fc.write_u8(SECTOR, 1);
        fc.write_u8(CMD0, CMD0_WRITE_SECTOR);
        for _ in 0..256 {
            fc.write_u8(DATA, 0x77);
        }
        assert_eq!(fc.read_u8(CMD0), STAT0_DONE);

        let track = fc.drive(0).and_then(|d| d.medium()).map(|m| m.track(4, 0).to_vec()).unwrap();
        assert_eq!(track[0].data()[0], 0x11);
        assert_eq!(track[1].data()[0], 0x77);
    }

    #[test]
    fn read_address_returns_id_field() {
        let mut fc = thmfc1_with_disk();
        fc.write_u8(TRACK, 9);
        fc.write_u8(CMD0, CMD0_READ_ADDRESS);
        let id: Vec<u8> = (0..4).map(|_| fc.read_u8(DATA)).collect();
        assert_eq!(id, vec![9, 0, 1, 1]);
        assert_eq!(fc.read_u8(CMD0) & STAT0_DONE, STAT0_DONE);
    }

    #[test]
    fn errors_use_shared_status() {
        let mut fc = thmfc1_with_disk();
        fc.write_u8(SECTOR, 20);
        fc.write_u8(CMD0, CMD0_READ_SECTOR);
        assert_eq!(fc.read_u8(CMD0), STAT0_DONE | STAT0_NOT_FOUND);

        fc.drive_mut(0).unwrap().set_write_protect(true);
        fc.write_u8(SECTOR, 1);
        fc.write_u8(CMD0, CMD0_WRITE_SECTOR);
        assert_eq!(fc.read_u8(CMD0), STAT0_DONE | STAT0_WRITE_PROTECT);

        fc.write_u8(CMD2, 0);
        fc.write_u8(CMD0, CMD0_READ_SECTOR);
        assert_eq!(fc.read_u8(CMD0), STAT0_DONE | STAT0_NOT_READY);

        fc.write_u8(CMD0, CMD0_RESET);
        assert_eq!(fc.read_u8(CMD0), 0);
    }

    #[test]
    fn stat1_reports_drive_lines() {
        let mut fc = thmfc1_with_disk();
        assert_eq!(fc.read_u8(CMD1), ST3_READY | ST3_TRACK0);
        fc.write_u8(TRACK, 1);
        assert_eq!(fc.read_u8(CMD1), ST3_READY);
        fc.write_u8(CMD2, 0x01 | CMD2_MOTOR);
        assert_eq!(fc.read_u8(CMD1), ST3_TRACK0, "Drive 1 is empty");
    }

    #[test]
    fn fm_density_uses_128_byte_sectors() {
        let mut fc = Thmfc1::default();
        let geometry = StandardGeometry::Thomson40Sd.geometry();
        fc.drive_mut(0).unwrap().insert_medium(FloppyMedium::formatted(geometry, 0x11));
        fc.write_u8(CMD1, 0);
        fc.write_u8(CMD2, CMD2_MOTOR);
        assert_eq!(fc.density(), Density::Fm);

        fc.write_u8(SECTOR, 2);
        fc.write_u8(CMD0, CMD0_READ_SECTOR);
        let mut count = 0;
        while fc.read_u8(CMD0) & STAT0_BYTE_READY != 0 {
            fc.read_u8(DATA);
            count += 1;
        }
        assert_eq!(count, 128);
    }
}
