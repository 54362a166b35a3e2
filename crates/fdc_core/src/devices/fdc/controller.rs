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

    devices::fdc::controller.rs

    Implements the NEC µPD765 Floppy Disk Controller
*/

//! [Upd765] is the controller core. It owns up to four [FloppyDiskDrive]s and the host
//! [FdcInterface] that receives its INT and DRQ lines, and it is driven entirely by calls from a
//! host adapter: register reads and writes, DMA acknowledges, the TC and RESET inputs, and a
//! periodic call to [Upd765::run].
//!
//! A command moves through four phases. Bytes written to the data register in the Idle phase
//! select a command; the CommandBytes phase collects the command's fixed number of parameter
//! bytes; data transfer commands then enter the Execution phase, where bytes move one `dack_r` or
//! `dack_w` at a time; finally the Result phase presents status bytes to be read back.

use std::collections::VecDeque;

use crate::{
    bus::NO_IO_BYTE,
    device_types::{
        chs::DiskChsn,
        fdc::{FdcVariant, StandardGeometry},
        geometry::DriveGeometry,
        medium::{FloppyMedium, SectorMatch},
    },
    devices::{
        fdc::{
            command::{Command, CommandKind, FormatParams, SpecifyParams, TransferParams},
            data_adapter::DataAdapter,
            signals::{DmaDirection, FdcInterface, Signal},
            status::{
                make_st3_byte,
                FdcError,
                InterruptCode,
                StatusRegisters,
                ST0_ABNORMAL_POLLING,
                ST0_DRIVE_MASK,
                ST0_HEAD_ACTIVE,
                ST0_INVALID_OPCODE,
                ST1_NODATA,
            },
        },
        floppy_drive::{FloppyDiskDrive, RECALIBRATE_MAX_STEPS},
    },
    machine_config::FloppyControllerConfig,
};

use fdc_common::HistoryBuffer;

pub const FDC_LOG_LEN: usize = 1000;
pub const FDC_MAX_DRIVES: usize = 4;
pub const FORMAT_BUFFER_SIZE: usize = 4;
pub const FDC_DEFAULT_SEEK_TIME: f64 = 0.0;

// Main Status Register Bit Definitions
// --------------------------------------------------------------------------------
// The first four bits encode which drives are in 'positioning' mode, ie whether
// they are moving their heads or being calibrated
pub const FDC_STATUS_FDD_A_BUSY: u8 = 0b0000_0001;
pub const FDC_STATUS_FDD_B_BUSY: u8 = 0b0000_0010;
pub const FDC_STATUS_FDD_C_BUSY: u8 = 0b0000_0100;
pub const FDC_STATUS_FDD_D_BUSY: u8 = 0b0000_1000;

// Command busy. Set while a command is being received or executed.
pub const FDC_STATUS_FDC_BUSY: u8 = 0b0001_0000;
// Execution mode. Set during the execution phase of a non-DMA transfer.
pub const FDC_STATUS_NON_DMA_MODE: u8 = 0b0010_0000;

// Direction bit is checked by firmware to tell if the FDC is expecting a read
// or a write to the Data register.
pub const FDC_STATUS_DIO: u8 = 0b0100_0000;

// MRQ (Main Request) is used to determine if the data port is ready to be
// written to or read.
pub const FDC_STATUS_MRQ: u8 = 0b1000_0000;

/// Represent the state of the DIO bit of the Main Status Register in a readable way.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum IoMode {
    ToCpu,
    #[default]
    FromCpu,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum DataMode {
    Pio,
    #[default]
    Dma,
}

/// The controller's top-level protocol state, as seen from outside.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, strum_macros::Display)]
pub enum ControllerPhase {
    #[default]
    Idle,
    CommandBytes,
    Execution,
    Result,
}

/// A queued reason for an interrupt, reported by Sense Interrupt Status.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct InterruptCause {
    pub st0: u8,
    pub pcn: u8,
}

#[derive(Copy, Clone, Debug)]
struct PendingSeek {
    st0: u8,
    pcn: u8,
    elapsed_us: f64,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum TransferKind {
    ReadData { deleted: bool },
    ReadTrack,
    WriteData { deleted: bool },
}

/// The state of a Read Data, Read Deleted Data, Read Track, Write Data or Write Deleted Data
/// command in its execution phase.
#[derive(Clone, Debug)]
struct TransferOp {
    kind: TransferKind,
    params: TransferParams,
    /// Physical track and head being read or written.
    track: u8,
    head: u8,
    /// ID of the sector currently being transferred.
    id: DiskChsn,
    /// Sectors completed so far by Read Track, and its position on the track.
    sectors_done: usize,
    track_index: usize,
    regs: StatusRegisters,
    /// End the command after the current sector.
    terminate_after: bool,
    /// The last byte of the current sector has been transferred and the next sector has not yet
    /// been located. Only held while a further sector follows.
    at_boundary: bool,
}

impl TransferOp {
    fn new(kind: TransferKind, params: TransferParams, track: u8) -> Self {
        Self {
            kind,
            params,
            track,
            head: params.head,
            id: params.id,
            sectors_done: 0,
            track_index: 0,
            regs: StatusRegisters::new(params.drive, params.head),
            terminate_after: false,
            at_boundary: false,
        }
    }

    fn direction(&self) -> DmaDirection {
        match self.kind {
            TransferKind::WriteData { .. } => DmaDirection::Write,
            _ => DmaDirection::Read,
        }
    }

    /// Step to the next sector of the transfer. Returns false if the transfer is already at its
    /// last sector.
    fn advance(&mut self) -> bool {
        if let TransferKind::ReadTrack = self.kind {
            if self.sectors_done + 1 >= self.params.eot as usize {
                return false;
            }
            self.sectors_done += 1;
            self.track_index += 1;
            self.id.set_r(self.id.r().wrapping_add(1));
            return true;
        }

        if self.id.r() != self.params.eot {
            self.id.set_r(self.id.r().wrapping_add(1));
            true
        }
        else if self.params.mt && self.head == 0 {
            self.head = 1;
            self.id = DiskChsn::new(self.id.c(), self.id.h() | 0x01, 1, self.id.n());
            self.regs.st0 |= ST0_HEAD_ACTIVE;
            true
        }
        else {
            false
        }
    }

    /// Return whether another sector follows the current one.
    fn has_next(&self) -> bool {
        match self.kind {
            TransferKind::ReadTrack => self.sectors_done + 1 < self.params.eot as usize,
            _ => self.id.r() != self.params.eot || (self.params.mt && self.head == 0),
        }
    }

    /// Finish with the current sector counted as transferred.
    fn complete_after_sector(&self) -> OpStep {
        OpStep::Complete(self.regs, self.id.next_result_id(self.params.eot, self.params.mt))
    }

    /// Finish without the current sector counted as transferred.
    fn complete_here(&self) -> OpStep {
        OpStep::Complete(self.regs, self.id)
    }
}

/// The state of a Format Track command in its execution phase.
#[derive(Clone, Debug)]
struct FormatOp {
    params: FormatParams,
    track: u8,
    ids: Vec<DiskChsn>,
    regs: StatusRegisters,
}

/// An [Operation] is initiated by any controller command that transfers data. It lives in the
/// execution phase until the transfer completes, TC is asserted, or the controller is reset.
#[derive(Clone, Debug)]
enum Operation {
    Transfer(TransferOp),
    Format(FormatOp),
}

impl Operation {
    fn direction(&self) -> DmaDirection {
        match self {
            Operation::Transfer(op) => op.direction(),
            Operation::Format(_) => DmaDirection::Write,
        }
    }
}

enum OpStep {
    Continue,
    Complete(StatusRegisters, DiskChsn),
}

#[derive(Clone, Debug, Default)]
enum Phase {
    #[default]
    Idle,
    CommandBytes {
        opcode: u8,
        kind: CommandKind,
        params: Vec<u8>,
    },
    Execution(Operation),
    Result {
        bytes: Vec<u8>,
        cursor: usize,
    },
}

impl Phase {
    fn kind(&self) -> ControllerPhase {
        match self {
            Phase::Idle => ControllerPhase::Idle,
            Phase::CommandBytes { .. } => ControllerPhase::CommandBytes,
            Phase::Execution(_) => ControllerPhase::Execution,
            Phase::Result { .. } => ControllerPhase::Result,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct FdcDebugState {
    pub intr: bool,
    pub drq: bool,
    pub dor: u8,
    pub reset: bool,
    pub variant: FdcVariant,
    pub phase: ControllerPhase,
    pub data_mode: DataMode,
    pub last_cmd: CommandKind,
    pub last_status: Vec<u8>,
    pub drive_select: usize,
    pub status_register: u8,
    pub pcn: [u8; FDC_MAX_DRIVES],
    pub pending_interrupts: usize,
    pub data_cursor: usize,
    pub last_data_read: u8,
    pub last_data_written: u8,
    pub dio: IoMode,
    pub st3: u8,
    pub cmd_log: Vec<String>,
}

pub struct Upd765<I: FdcInterface> {
    variant: FdcVariant,
    interface: I,
    phase: Phase,

    drives: [FloppyDiskDrive; FDC_MAX_DRIVES],
    drive_select: usize,
    pcn: [u8; FDC_MAX_DRIVES],
    pending_seeks: [Option<PendingSeek>; FDC_MAX_DRIVES],
    interrupt_causes: VecDeque<InterruptCause>,
    data: DataAdapter,
    specify: SpecifyParams,
    seek_time_us: f64,

    reset_asserted: bool,
    ready_on_reset: bool,
    ready_int: bool,
    int: Signal,
    drq: Signal,
    tc: Signal,
    drq_direction: DmaDirection,

    /// ST0-ST2 to report if TC arrives before the first result byte of a transfer that ran to
    /// End of Cylinder is read.
    late_tc: Option<[u8; 3]>,

    last_command: CommandKind,
    last_status_bytes: Vec<u8>,
    last_st3: u8,
    last_data_read: u8,
    last_data_written: u8,
    cmd_log: HistoryBuffer<String>,
}

impl<I: FdcInterface> Upd765<I> {
    pub fn new(variant: FdcVariant, interface: I) -> Self {
        Self {
            variant,
            interface,
            phase: Phase::Idle,
            drives: [
                FloppyDiskDrive::new(0),
                FloppyDiskDrive::new(1),
                FloppyDiskDrive::new(2),
                FloppyDiskDrive::new(3),
            ],
            drive_select: 0,
            pcn: [0; FDC_MAX_DRIVES],
            pending_seeks: [None; FDC_MAX_DRIVES],
            interrupt_causes: VecDeque::new(),
            data: DataAdapter::default(),
            specify: SpecifyParams::default(),
            seek_time_us: FDC_DEFAULT_SEEK_TIME,
            reset_asserted: false,
            ready_on_reset: false,
            ready_int: false,
            int: Signal::default(),
            drq: Signal::default(),
            tc: Signal::default(),
            drq_direction: DmaDirection::Read,
            late_tc: None,
            last_command: CommandKind::NoCommand,
            last_status_bytes: vec![0; 3],
            last_st3: 0,
            last_data_read: 0,
            last_data_written: 0,
            cmd_log: HistoryBuffer::new(FDC_LOG_LEN),
        }
    }

    /// Build a controller with its drives configured from a [FloppyControllerConfig].
    pub fn from_config(config: &FloppyControllerConfig, interface: I) -> Self {
        let mut fdc = Upd765::new(config.variant, interface);
        fdc.configure(config);
        fdc
    }

    /// Apply the seek time and drive entries of a [FloppyControllerConfig].
    pub fn configure(&mut self, config: &FloppyControllerConfig) {
        if let Some(seek_time) = config.seek_time_us {
            self.set_seek_time(seek_time);
        }

        if config.drive.len() > FDC_MAX_DRIVES {
            log::warn!(
                "Controller supports {} drives, ignoring {} extra drive entries",
                FDC_MAX_DRIVES,
                config.drive.len() - FDC_MAX_DRIVES
            );
        }
        for (drive, drive_config) in self.drives.iter_mut().zip(config.drive.iter()) {
            drive.apply_config(drive_config);
        }
    }

    #[inline]
    pub fn variant(&self) -> FdcVariant {
        self.variant
    }

    pub fn interface(&self) -> &I {
        &self.interface
    }

    pub fn interface_mut(&mut self) -> &mut I {
        &mut self.interface
    }

    #[inline]
    pub fn phase(&self) -> ControllerPhase {
        self.phase.kind()
    }

    #[inline]
    pub fn data_mode(&self) -> DataMode {
        self.data.mode()
    }

    /// The timing parameters from the last Specify command.
    #[inline]
    pub fn specify_params(&self) -> SpecifyParams {
        self.specify
    }

    #[inline]
    pub fn is_reset(&self) -> bool {
        self.reset_asserted
    }

    #[inline]
    pub fn int_state(&self) -> bool {
        self.int.get()
    }

    #[inline]
    pub fn drq_state(&self) -> bool {
        self.drq.get()
    }

    /// Set the time a Seek or Recalibrate takes to complete once accepted.
    pub fn set_seek_time(&mut self, us: f64) {
        self.seek_time_us = us.max(0.0);
    }

    /// When set, READY is held high on every drive while the controller is in reset, as on
    /// hosts whose reset logic pulls the line up. A reset release then always finds a ready drive.
    pub fn set_ready_on_reset(&mut self, state: bool) {
        self.ready_on_reset = state;
        if self.reset_asserted {
            for drive in self.drives.iter_mut() {
                drive.set_ready_held(state);
            }
        }
    }

    /// When set, a READY transition on any drive queues a polling interrupt cause and raises INT.
    pub fn set_ready_int(&mut self, state: bool) {
        self.ready_int = state;
    }

    pub fn drive(&self, drive: usize) -> Option<&FloppyDiskDrive> {
        self.drives.get(drive)
    }

    pub fn drive_mut(&mut self, drive: usize) -> Option<&mut FloppyDiskDrive> {
        self.drives.get_mut(drive)
    }

    /// Configure the geometry of a drive. Out-of-range units are ignored.
    pub fn set_geometry(&mut self, drive: usize, geometry: DriveGeometry) {
        match self.drives.get_mut(drive) {
            Some(d) => d.set_geometry(geometry),
            None => log::warn!("set_geometry(): no drive unit {}", drive),
        }
    }

    pub fn set_standard_geometry(&mut self, drive: usize, geometry: StandardGeometry) {
        self.set_geometry(drive, geometry.geometry());
    }

    pub fn set_write_protect(&mut self, drive: usize, write_protected: bool) {
        match self.drives.get_mut(drive) {
            Some(d) => d.set_write_protect(write_protected),
            None => log::warn!("set_write_protect(): no drive unit {}", drive),
        }
    }

    pub fn set_motor_state(&mut self, drive: usize, on: bool) {
        let Some(d) = self.drives.get_mut(drive)
        else {
            log::warn!("set_motor_state(): no drive unit {}", drive);
            return;
        };
        let was_ready = d.is_ready();
        d.set_motor_state(on);
        self.ready_changed(drive, was_ready);
    }

    /// Set a drive's READY line. See [FloppyDiskDrive::set_ready_state].
    pub fn set_ready_state(&mut self, drive: usize, ready: bool, force: bool) {
        let Some(d) = self.drives.get_mut(drive)
        else {
            log::warn!("set_ready_state(): no drive unit {}", drive);
            return;
        };
        let was_ready = d.is_ready();
        d.set_ready_state(ready, force);
        self.ready_changed(drive, was_ready);
    }

    /// Insert a medium into a drive.
    pub fn insert_medium(&mut self, drive: usize, medium: FloppyMedium) {
        let Some(d) = self.drives.get_mut(drive)
        else {
            log::warn!("insert_medium(): no drive unit {}", drive);
            return;
        };
        let was_ready = d.is_ready();
        d.insert_medium(medium);
        self.ready_changed(drive, was_ready);
    }

    /// Remove and return the medium in a drive.
    pub fn eject_medium(&mut self, drive: usize) -> Option<FloppyMedium> {
        let d = self.drives.get_mut(drive)?;
        let was_ready = d.is_ready();
        let medium = d.eject_medium();
        self.ready_changed(drive, was_ready);
        medium
    }

    fn ready_changed(&mut self, drive: usize, was_ready: bool) {
        let now_ready = self.drives[drive].is_ready();
        if !self.ready_int || self.reset_asserted || was_ready == now_ready {
            return;
        }
        let st0 = ST0_ABNORMAL_POLLING | (drive as u8 & ST0_DRIVE_MASK);
        self.log_str(&format!("Drive {} ready changed: {}", drive, now_ready));
        self.interrupt_causes.push_back(InterruptCause {
            st0,
            pcn: self.pcn[drive],
        });
        self.set_int(true);
    }

    fn set_int(&mut self, state: bool) {
        if self.int.set(state) {
            log::trace!("FDC INT: {}", state);
            self.interface.interrupt(state);
        }
    }

    fn set_drq(&mut self, state: bool) {
        if self.drq.set(state) {
            self.interface.dma_drq(state, self.drq_direction);
        }
    }

    /// Read the Main Status Register.
    pub fn status_r(&self) -> u8 {
        if self.reset_asserted {
            return 0;
        }

        let mut msr_byte = 0;
        for (i, drive) in self.drives.iter().enumerate() {
            if drive.positioning {
                msr_byte |= 0x01 << i;
            }
        }

        msr_byte |= match &self.phase {
            Phase::Idle => FDC_STATUS_MRQ,
            Phase::CommandBytes { .. } => FDC_STATUS_MRQ | FDC_STATUS_FDC_BUSY,
            Phase::Execution(op) => match self.data.mode() {
                DataMode::Dma => FDC_STATUS_FDC_BUSY,
                DataMode::Pio => {
                    let dio = match op.direction() {
                        DmaDirection::Read => FDC_STATUS_DIO,
                        DmaDirection::Write => 0,
                    };
                    FDC_STATUS_FDC_BUSY | FDC_STATUS_NON_DMA_MODE | FDC_STATUS_MRQ | dio
                }
            },
            Phase::Result { .. } => FDC_STATUS_MRQ | FDC_STATUS_DIO,
        };
        msr_byte
    }

    /// Read the data register. In the result phase this pops the next result byte; in a
    /// non-DMA execution phase it transfers the next data byte.
    pub fn data_r(&mut self) -> u8 {
        if self.reset_asserted {
            log::warn!("Data register read while FDC held in reset");
            return NO_IO_BYTE;
        }
        let byte = match self.phase {
            Phase::Result { .. } => self.read_result_byte(),
            Phase::Execution(_) if self.data.mode() == DataMode::Pio => self.transfer_read(),
            _ => {
                log::warn!("Data register read in {} phase", self.phase.kind());
                NO_IO_BYTE
            }
        };
        self.last_data_read = byte;
        byte
    }

    /// Write the data register. Outside the execution phase this feeds the command decoder.
    pub fn data_w(&mut self, data: u8) {
        if self.reset_asserted {
            log::warn!("Data register write while FDC held in reset: {:02X}", data);
            return;
        }
        self.last_data_written = data;

        match std::mem::take(&mut self.phase) {
            Phase::Idle => self.begin_command(data),
            Phase::CommandBytes {
                opcode,
                kind,
                mut params,
            } => {
                params.push(data);
                if params.len() >= kind.param_count() {
                    self.dispatch(Command::decode(opcode, &params));
                }
                else {
                    self.phase = Phase::CommandBytes { opcode, kind, params };
                }
            }
            phase @ Phase::Execution(_) => {
                self.phase = phase;
                if self.data.mode() == DataMode::Pio {
                    self.transfer_write(data);
                }
                else {
                    log::warn!("Data register write during DMA execution phase: {:02X}", data);
                }
            }
            phase @ Phase::Result { .. } => {
                self.phase = phase;
                log::warn!("Data register write during result phase: {:02X}", data);
            }
        }
    }

    /// DMA acknowledge, read cycle: transfer the next byte of a read operation.
    pub fn dack_r(&mut self) -> u8 {
        if self.reset_asserted {
            log::warn!("dack_r() while FDC held in reset");
            return NO_IO_BYTE;
        }
        if !matches!(self.phase, Phase::Execution(_)) {
            log::warn!("dack_r() in {} phase", self.phase.kind());
            return NO_IO_BYTE;
        }
        let byte = self.transfer_read();
        self.last_data_read = byte;
        byte
    }

    /// DMA acknowledge, write cycle: transfer the next byte of a write or format operation.
    pub fn dack_w(&mut self, data: u8) {
        if self.reset_asserted {
            log::warn!("dack_w() while FDC held in reset");
            return;
        }
        if !matches!(self.phase, Phase::Execution(_)) {
            log::warn!("dack_w() in {} phase", self.phase.kind());
            return;
        }
        self.last_data_written = data;
        self.transfer_write(data);
    }

    /// Drive the terminal count input. A rising edge during the execution phase ends the
    /// current command and enters the result phase.
    ///
    /// A transfer that runs to the end of its last sector enters the result phase with End of
    /// Cylinder at once. TC rising before the first result byte is read is taken as having
    /// arrived with the last byte, and the command reports normal termination instead.
    pub fn set_tc_state(&mut self, state: bool) {
        if !self.tc.set(state) || !state {
            return;
        }
        if self.reset_asserted {
            log::trace!("TC asserted during reset, ignored");
            return;
        }
        match self.phase {
            Phase::Execution(_) => {
                self.log_str("TC asserted, terminating operation");
                self.step_operation((), |fdc, op| (fdc.operation_terminate(op), ()));
            }
            Phase::Result { cursor: 0, .. } if self.late_tc.is_some() => self.accept_late_tc(),
            _ => log::trace!("TC asserted in {} phase, ignored", self.phase.kind()),
        }
    }

    fn accept_late_tc(&mut self) {
        let Some(regs) = self.late_tc.take()
        else {
            return;
        };
        let applied = match &mut self.phase {
            Phase::Result { bytes, cursor: 0 } => match bytes.get_mut(..3) {
                Some(status) => {
                    status.copy_from_slice(&regs);
                    true
                }
                None => false,
            },
            _ => false,
        };
        if applied {
            self.last_status_bytes = regs.to_vec();
            self.log_str(&format!("TC with last byte, result status: {:02X?}", regs));
        }
    }

    /// Drive the RESET input. While asserted the controller ignores the data register and
    /// reports a main status of 0. On release the controller returns to the idle phase and, if
    /// any drive is ready, queues a polling interrupt cause for each of the four drive units
    /// and raises INT.
    pub fn set_reset_state(&mut self, state: bool) {
        if state == self.reset_asserted {
            return;
        }

        if state {
            self.reset_asserted = true;
            self.abort_operation();
            self.interrupt_causes.clear();
            self.set_int(false);
            self.cmd_log.clear();
            if self.ready_on_reset {
                for drive in self.drives.iter_mut() {
                    drive.set_ready_held(true);
                }
            }
            self.log_str("FDC reset asserted");
            return;
        }

        self.reset_asserted = false;
        self.abort_operation();
        self.interrupt_causes.clear();
        self.last_status_bytes = vec![0; 3];
        let any_ready = self.drives.iter().any(|d| d.is_ready());
        for drive in self.drives.iter_mut() {
            drive.set_ready_held(false);
            drive.reset();
        }

        self.log_str(&format!("FDC reset released, drive ready: {}", any_ready));
        if any_ready {
            // The IBM 5160 BIOS issues four Sense Interrupt Status commands after a reset and
            // expects drive select bits 00 to 11 in the returned ST0 bytes.
            for d in 0..FDC_MAX_DRIVES {
                self.interrupt_causes.push_back(InterruptCause {
                    st0: ST0_ABNORMAL_POLLING | d as u8,
                    pcn: self.pcn[d],
                });
            }
            self.set_int(true);
        }
    }

    /// Pulse the RESET input.
    pub fn reset(&mut self) {
        self.set_reset_state(true);
        self.set_reset_state(false);
    }

    /// Abandon any command in progress and return to the idle phase.
    fn abort_operation(&mut self) {
        if !matches!(self.phase, Phase::Idle) {
            log::debug!("Aborting FDC {} phase", self.phase.kind());
        }
        self.phase = Phase::Idle;
        self.data.reset();
        self.late_tc = None;
        self.pending_seeks = [None; FDC_MAX_DRIVES];
        for drive in self.drives.iter_mut() {
            drive.positioning = false;
        }
        self.set_drq(false);
    }

    /// Run the controller for `us` microseconds. Completes seeks whose time has elapsed and
    /// resolves a transfer waiting at a sector boundary.
    pub fn run(&mut self, us: f64) {
        if self.reset_asserted {
            return;
        }

        if matches!(self.phase, Phase::Execution(_)) {
            self.step_operation((), |fdc, op| {
                let step = match op {
                    Operation::Transfer(t) if t.at_boundary => fdc.resolve_boundary(t),
                    _ => OpStep::Continue,
                };
                (step, ())
            });
        }

        let mut completed = false;
        for d in 0..FDC_MAX_DRIVES {
            let Some(seek) = self.pending_seeks[d].as_mut()
            else {
                continue;
            };
            seek.elapsed_us += us;
            if seek.elapsed_us < self.seek_time_us {
                continue;
            }
            let (st0, pcn) = (seek.st0, seek.pcn);
            self.pending_seeks[d] = None;
            self.drives[d].positioning = false;
            self.interrupt_causes.push_back(InterruptCause { st0, pcn });
            log::trace!("FDC Operation Seek/Calibrate complete on drive {}", d);
            completed = true;
        }
        if completed {
            self.set_int(true);
        }
    }

    fn begin_command(&mut self, opcode: u8) {
        self.late_tc = None;
        let kind = CommandKind::decode(opcode);
        log::trace!("Received {} command: {:02X}", kind, opcode);
        if kind.param_count() == 0 {
            self.dispatch(Command::decode(opcode, &[]));
        }
        else {
            self.phase = Phase::CommandBytes {
                opcode,
                kind,
                params: Vec::with_capacity(kind.param_count()),
            };
        }
    }

    fn dispatch(&mut self, command: Command) {
        self.last_command = command.kind();
        if let Some(drive) = command.drive() {
            self.drive_select = drive;
        }

        match command {
            Command::ReadData(p) => self.command_read(p, TransferKind::ReadData { deleted: false }),
            Command::ReadDeletedData(p) => self.command_read(p, TransferKind::ReadData { deleted: true }),
            Command::ReadTrack(p) => self.command_read(p, TransferKind::ReadTrack),
            Command::WriteData(p) => self.command_write(p, false),
            Command::WriteDeletedData(p) => self.command_write(p, true),
            Command::ReadId { drive, head, .. } => self.command_read_id(drive, head),
            Command::FormatTrack(p) => self.command_format_track(p),
            Command::Seek { drive, head, cylinder } => self.command_seek(drive, head, cylinder),
            Command::Recalibrate { drive } => self.command_recalibrate(drive),
            Command::SenseInterruptStatus => self.command_sense_interrupt(),
            Command::SenseDriveStatus { drive, head } => self.command_sense_drive_status(drive, head),
            Command::Specify(p) => self.command_specify(p),
            Command::Invalid(opcode) => self.command_invalid(opcode),
        }
    }

    /// Perform Read Data, Read Deleted Data or Read Track.
    fn command_read(&mut self, p: TransferParams, kind: TransferKind) {
        let func = "command_read";
        let log_str = format!(
            "drive:{} head:{} chsn:{} eot:{} gpl:{} dtl:{} mt:{} mfm:{} skip:{}",
            p.drive, p.head, p.id, p.eot, p.gpl, p.dtl, p.mt, p.mfm, p.skip
        );
        self.log_cmd(self.last_command, func, &log_str);

        let drive = &mut self.drives[p.drive];
        let mut op = TransferOp::new(kind, p, drive.current_track);
        if !drive.is_ready() {
            op.regs.set_error(FdcError::NotReady);
            self.send_results_phase(op.regs, p.id);
            return;
        }
        drive.select_head(p.head);

        let step = self.load_sector(&mut op);
        self.start_operation(Operation::Transfer(op), step);
    }

    /// Perform Write Data or Write Deleted Data.
    fn command_write(&mut self, p: TransferParams, deleted: bool) {
        let log_str = format!(
            "drive:{} head:{} chsn:{} eot:{} gpl:{} dtl:{} mt:{} deleted:{}",
            p.drive, p.head, p.id, p.eot, p.gpl, p.dtl, p.mt, deleted
        );
        self.log_cmd(self.last_command, "command_write_data", &log_str);

        let drive = &mut self.drives[p.drive];
        let mut op = TransferOp::new(TransferKind::WriteData { deleted }, p, drive.current_track);
        if !drive.is_ready() {
            op.regs.set_error(FdcError::NotReady);
            self.send_results_phase(op.regs, p.id);
            return;
        }
        // Write protection is checked before any byte is requested.
        if drive.is_write_protected() {
            op.regs.set_error(FdcError::NotWriteable);
            self.send_results_phase(op.regs, p.id);
            return;
        }
        drive.select_head(p.head);

        let step = self.load_sector(&mut op);
        self.start_operation(Operation::Transfer(op), step);
    }

    /// Perform Read ID. Reports the first ID field on the current track of the selected head.
    fn command_read_id(&mut self, drive_select: usize, head: u8) {
        let mut regs = StatusRegisters::new(drive_select, head);
        let drive = &mut self.drives[drive_select];
        let track = drive.current_track;
        let mut id = DiskChsn::new(track, head, 0, 0);

        if !drive.is_ready() {
            regs.set_error(FdcError::NotReady);
        }
        else {
            drive.select_head(head);
            match drive.track_sectors(track, head).ok().and_then(|s| s.first()) {
                Some(sector) => id = sector.id(),
                None => regs.set_error(FdcError::MissingAddressMark),
            }
        }

        let log_str = format!("drive_select: {} head: {} chsn: {}", drive_select, head, id);
        self.log_cmd(CommandKind::ReadId, "command_read_id", &log_str);
        self.send_results_phase(regs, id);
    }

    /// Perform Format Track. The host supplies a C, H, R, N ID field for each sector.
    fn command_format_track(&mut self, p: FormatParams) {
        let log_str = format!(
            "drive:{} head:{} n:{} sc:{} gpl:{} filler:{:02X}",
            p.drive, p.head, p.n, p.sc, p.gpl, p.filler
        );
        self.log_cmd(CommandKind::FormatTrack, "command_format_track", &log_str);

        let drive = &mut self.drives[p.drive];
        let track = drive.current_track;
        let mut op = FormatOp {
            params: p,
            track,
            ids: Vec::with_capacity(p.sc as usize),
            regs: StatusRegisters::new(p.drive, p.head),
        };

        if !drive.is_ready() {
            op.regs.set_error(FdcError::NotReady);
            self.send_results_phase(op.regs, DiskChsn::new(track, p.head, 0, p.n));
            return;
        }
        if drive.is_write_protected() {
            op.regs.set_error(FdcError::NotWriteable);
            self.send_results_phase(op.regs, DiskChsn::new(track, p.head, 0, p.n));
            return;
        }
        drive.select_head(p.head);

        let step = if p.sc == 0 {
            self.commit_format(&mut op)
        }
        else {
            self.data.begin_write(FORMAT_BUFFER_SIZE);
            OpStep::Continue
        };
        self.start_operation(Operation::Format(op), step);
    }

    /// Perform Seek. The head moves immediately; the interrupt is raised by run().
    fn command_seek(&mut self, drive_select: usize, head: u8, cylinder: u8) {
        let mut regs = StatusRegisters::new(drive_select, head);
        regs.set_seek_end();

        let drive = &mut self.drives[drive_select];
        drive.select_head(head);
        if !drive.is_ready() {
            regs.set_error(FdcError::NotReady);
        }
        else if drive.seek(cylinder).is_err() {
            regs.set_error(FdcError::EquipmentCheck);
        }
        else {
            self.pcn[drive_select] = cylinder;
        }

        let log_str = format!(
            "drive:{} head:{} cylinder:{} st0:{:02X}",
            drive_select, head, cylinder, regs.st0
        );
        self.log_cmd(CommandKind::Seek, "command_seek", &log_str);
        self.begin_positioning(drive_select, regs.st0);
    }

    /// Perform Recalibrate. Steps the head toward track 0; if track 0 is not found within the
    /// maximum step count the command ends with an equipment check.
    fn command_recalibrate(&mut self, drive_select: usize) {
        let mut regs = StatusRegisters::new(drive_select, 0);
        regs.set_seek_end();

        let drive = &mut self.drives[drive_select];
        if !drive.is_ready() {
            regs.set_error(FdcError::NotReady);
        }
        else {
            if !drive.recalibrate(RECALIBRATE_MAX_STEPS) {
                regs.set_error(FdcError::EquipmentCheck);
            }
            self.pcn[drive_select] = drive.current_track;
        }

        let log_str = format!("drive_select: {} st0:{:02X}", drive_select, regs.st0);
        self.log_cmd(CommandKind::Recalibrate, "command_recalibrate", &log_str);
        self.begin_positioning(drive_select, regs.st0);
    }

    /// Start the head positioning time for a Seek or Recalibrate. A seek still in flight on the
    /// same drive is completed immediately so its interrupt cause is not lost.
    fn begin_positioning(&mut self, drive_select: usize, st0: u8) {
        if let Some(prev) = self.pending_seeks[drive_select].take() {
            log::warn!(
                "Drive {} positioning command issued while a seek is in progress; completing previous seek",
                drive_select
            );
            self.interrupt_causes.push_back(InterruptCause {
                st0: prev.st0,
                pcn: prev.pcn,
            });
            self.set_int(true);
        }
        self.drives[drive_select].positioning = true;
        self.pending_seeks[drive_select] = Some(PendingSeek {
            st0,
            pcn: self.pcn[drive_select],
            elapsed_us: 0.0,
        });
        self.phase = Phase::Idle;
    }

    /// Perform Sense Interrupt Status. Reports and removes the oldest interrupt cause. With no
    /// cause pending, the command is treated as invalid.
    fn command_sense_interrupt(&mut self) {
        let bytes = match self.interrupt_causes.pop_front() {
            Some(cause) => vec![cause.st0, cause.pcn],
            None => {
                log::warn!("Sense interrupt received without pending interrupt");
                vec![ST0_INVALID_OPCODE]
            }
        };

        let log_str = format!("result: {:02X?}, remaining causes: {}", bytes, self.interrupt_causes.len());
        self.log_cmd(CommandKind::SenseInterruptStatus, "command_sense_interrupt", &log_str);

        self.last_status_bytes[0] = bytes[0];
        self.phase = Phase::Result { bytes, cursor: 0 };
        self.set_int(false);
    }

    /// Perform Sense Drive Status. This command returns the ST3 status register.
    fn command_sense_drive_status(&mut self, drive_select: usize, head: u8) {
        let drive = &mut self.drives[drive_select];
        drive.select_head(head);
        let st3 = make_st3_byte(drive, drive_select, head);
        self.last_st3 = st3;

        let log_str = format!("drive_select: {} st3: {:02X}", drive_select, st3);
        self.log_cmd(CommandKind::SenseDriveStatus, "command_sense_drive_status", &log_str);

        self.phase = Phase::Result {
            bytes: vec![st3],
            cursor: 0,
        };
    }

    /// Perform Specify. Timing values are stored but not simulated, except for the non-DMA bit
    /// which selects DMA or PIO transfers.
    fn command_specify(&mut self, p: SpecifyParams) {
        let log_str = format!(
            "step rate: {:04b} unload_time: {:04b}, head_load: {:07b} pio_mode: {}",
            p.step_rate, p.head_unload, p.head_load, p.non_dma
        );
        self.log_cmd(CommandKind::Specify, "command_specify", &log_str);

        self.specify = p;
        self.data.set_mode(match p.non_dma {
            true => DataMode::Pio,
            false => DataMode::Dma,
        });
        self.phase = Phase::Idle;
    }

    fn command_invalid(&mut self, opcode: u8) {
        log::warn!("Received invalid command byte: {:02X}", opcode);
        self.log_str(&format!("Invalid command: {:02X}", opcode));
        self.last_status_bytes = StatusRegisters::invalid().to_bytes().to_vec();
        self.phase = Phase::Result {
            bytes: vec![ST0_INVALID_OPCODE],
            cursor: 0,
        };
    }

    /// Enter the execution phase with `op`, or go straight to the result phase if it has
    /// already completed.
    fn start_operation(&mut self, op: Operation, step: OpStep) {
        match step {
            OpStep::Continue => {
                self.drq_direction = op.direction();
                self.phase = Phase::Execution(op);
                if self.data.mode() == DataMode::Dma {
                    self.set_drq(true);
                }
            }
            OpStep::Complete(regs, id) => self.send_results_phase(regs, id),
        }
    }

    /// Run `f` against the operation in the execution phase, then either keep it there or
    /// move to the result phase with the status it completed with.
    fn step_operation<T>(&mut self, default: T, f: impl FnOnce(&mut Self, &mut Operation) -> (OpStep, T)) -> T {
        let mut op = match std::mem::take(&mut self.phase) {
            Phase::Execution(op) => op,
            other => {
                self.phase = other;
                return default;
            }
        };
        let (step, value) = f(self, &mut op);
        match step {
            OpStep::Continue => self.phase = Phase::Execution(op),
            OpStep::Complete(regs, id) => self.send_results_phase(regs, id),
        }
        value
    }

    fn send_results_phase(&mut self, regs: StatusRegisters, id: DiskChsn) {
        self.data.reset();
        self.last_status_bytes = regs.to_bytes().to_vec();

        let log_str = format!(
            "Result Phase: ST0: {:08b}[{:02X}] ST1: {:08b}[{:02X}] ST2: {:08b}[{:02X}] chsn: {}",
            regs.st0, regs.st0, regs.st1, regs.st1, regs.st2, regs.st2, id
        );
        self.log_str(&log_str);

        let (c, h, r, n) = id.get();
        self.phase = Phase::Result {
            bytes: vec![regs.st0, regs.st1, regs.st2, c, h, r, n],
            cursor: 0,
        };
        self.set_drq(false);
        self.set_int(true);
    }

    fn read_result_byte(&mut self) -> u8 {
        self.late_tc = None;
        let (byte, done) = match &mut self.phase {
            Phase::Result { bytes, cursor } => {
                let byte = bytes.get(*cursor).copied().unwrap_or(NO_IO_BYTE);
                *cursor += 1;
                (byte, *cursor >= bytes.len())
            }
            _ => (NO_IO_BYTE, false),
        };
        if done {
            self.phase = Phase::Idle;
        }
        self.set_int(false);
        byte
    }

    fn transfer_read(&mut self) -> u8 {
        self.step_operation(NO_IO_BYTE, |fdc, op| match op {
            Operation::Transfer(t) if t.direction() == DmaDirection::Read => fdc.transfer_read_byte(t),
            _ => {
                log::warn!("Read of data during a write operation");
                (OpStep::Continue, NO_IO_BYTE)
            }
        })
    }

    fn transfer_write(&mut self, data: u8) {
        self.step_operation((), |fdc, op| {
            let step = match op {
                Operation::Transfer(t) if t.direction() == DmaDirection::Write => fdc.transfer_write_byte(t, data),
                Operation::Format(f) => fdc.format_write_byte(f, data),
                Operation::Transfer(_) => {
                    log::warn!("Write of data during a read operation: {:02X}", data);
                    OpStep::Continue
                }
            };
            (step, ())
        });
    }

    fn transfer_read_byte(&mut self, op: &mut TransferOp) -> (OpStep, u8) {
        if op.at_boundary {
            let step = self.resolve_boundary(op);
            if let OpStep::Complete(..) = step {
                return (step, NO_IO_BYTE);
            }
        }
        let byte = self.data.read_byte().unwrap_or(NO_IO_BYTE);
        if self.data.is_complete() {
            return (self.finish_sector(op), byte);
        }
        (OpStep::Continue, byte)
    }

    fn transfer_write_byte(&mut self, op: &mut TransferOp, byte: u8) -> OpStep {
        if op.at_boundary {
            let step = self.resolve_boundary(op);
            if let OpStep::Complete(..) = step {
                return step;
            }
        }
        self.data.write_byte(byte);
        if self.data.is_complete() {
            if !self.commit_write_sector(op) {
                return op.complete_here();
            }
            return self.finish_sector(op);
        }
        OpStep::Continue
    }

    /// The last byte of the current sector has moved. End the command if it was flagged to end
    /// or this was its last sector; otherwise wait at the sector boundary for the next data
    /// access, TC or run().
    fn finish_sector(&mut self, op: &mut TransferOp) -> OpStep {
        if op.terminate_after {
            op.regs.set_interrupt_code(InterruptCode::AbnormalTermination);
            return op.complete_after_sector();
        }
        if !op.has_next() {
            self.late_tc = Some(op.regs.to_bytes());
            op.regs.set_error(FdcError::EndOfCylinder);
            return op.complete_after_sector();
        }
        op.at_boundary = true;
        OpStep::Continue
    }

    /// Leave a sector boundary and load the next sector.
    fn resolve_boundary(&mut self, op: &mut TransferOp) -> OpStep {
        op.at_boundary = false;
        if !op.advance() {
            op.regs.set_error(FdcError::EndOfCylinder);
            return op.complete_after_sector();
        }
        self.load_sector(op)
    }

    fn load_sector(&mut self, op: &mut TransferOp) -> OpStep {
        match op.kind {
            TransferKind::ReadData { deleted } => self.load_read_sector(op, deleted),
            TransferKind::ReadTrack => self.load_track_sector(op),
            TransferKind::WriteData { .. } => self.locate_write_sector(op),
        }
    }

    /// Locate the sector for the current ID and load it for reading. Sectors whose data address
    /// mark does not match the command set Control Mark and are skipped when SK is set;
    /// otherwise the command ends after transferring them.
    fn load_read_sector(&mut self, op: &mut TransferOp, want_deleted: bool) -> OpStep {
        loop {
            let lookup = match self.drives[op.params.drive].find_sector(op.track, op.head, &op.id) {
                Ok(SectorMatch::Found(sector)) => Ok((sector.is_deleted(), sector.data().to_vec())),
                Ok(SectorMatch::WrongCylinder(sector)) => Err(StatusRegisters::cylinder_mismatch(sector.id().c())),
                Ok(SectorMatch::NotFound) => Err(FdcError::NoData),
                Err(e) => Err(FdcError::from(e)),
            };

            let (deleted, mut data) = match lookup {
                Ok(found) => found,
                Err(err) => {
                    log::trace!("load_read_sector(): {} at chsn: {}", err, op.id);
                    op.regs.set_error(err);
                    return op.complete_here();
                }
            };

            if deleted != want_deleted {
                op.regs.set_control_mark();
                if op.params.skip {
                    log::trace!("load_read_sector(): skipping sector {}", op.id);
                    if !op.advance() {
                        op.regs.set_error(FdcError::EndOfCylinder);
                        return op.complete_after_sector();
                    }
                    continue;
                }
                op.terminate_after = true;
            }

            data.resize(op.params.sector_len(), 0);
            self.data.begin_read(data);
            return OpStep::Continue;
        }
    }

    /// Load the next sector in physical order for Read Track. An ID field that does not match
    /// the expected ID sets No Data but does not stop the transfer.
    fn load_track_sector(&mut self, op: &mut TransferOp) -> OpStep {
        let sectors = self.drives[op.params.drive]
            .track_sectors(op.track, op.head)
            .unwrap_or(&[]);
        if sectors.is_empty() {
            op.regs.set_error(FdcError::MissingAddressMark);
            return op.complete_here();
        }

        let sector = &sectors[op.track_index % sectors.len()];
        let mismatch = sector.id() != op.id;
        let mut data = sector.data().to_vec();

        if mismatch {
            op.regs.st1 |= ST1_NODATA;
        }
        data.resize(op.params.sector_len(), 0);
        self.data.begin_read(data);
        OpStep::Continue
    }

    /// Locate the sector for the current ID and prepare to receive its data.
    fn locate_write_sector(&mut self, op: &mut TransferOp) -> OpStep {
        let lookup = match self.drives[op.params.drive].find_sector(op.track, op.head, &op.id) {
            Ok(SectorMatch::Found(_)) => Ok(()),
            Ok(SectorMatch::WrongCylinder(sector)) => Err(StatusRegisters::cylinder_mismatch(sector.id().c())),
            Ok(SectorMatch::NotFound) => Err(FdcError::NoData),
            Err(e) => Err(FdcError::from(e)),
        };

        match lookup {
            Ok(()) => {
                self.data.begin_write(op.params.sector_len());
                OpStep::Continue
            }
            Err(err) => {
                op.regs.set_error(err);
                op.complete_here()
            }
        }
    }

    /// Write the received sector to the drive. Bytes not received are written as 0. Returns
    /// false, with the error recorded, if the drive refused the write.
    fn commit_write_sector(&mut self, op: &mut TransferOp) -> bool {
        let data = self.data.take_data();
        let deleted = matches!(op.kind, TransferKind::WriteData { deleted: true });
        log::trace!("commit_write_sector(): chsn: {} bytes: {}", op.id, data.len());

        if let Err(e) =
            self.drives[op.params.drive].write_sector(op.track, op.head, &op.id, &data, deleted)
        {
            op.regs.set_error(e.into());
            return false;
        }
        true
    }

    fn format_write_byte(&mut self, op: &mut FormatOp, byte: u8) -> OpStep {
        self.data.write_byte(byte);
        if !self.data.is_complete() {
            return OpStep::Continue;
        }

        let id_bytes = self.data.take_data();
        if let Ok(id) = <[u8; FORMAT_BUFFER_SIZE]>::try_from(id_bytes.as_slice()) {
            op.ids.push(DiskChsn::from_bytes(&id));
        }
        if op.ids.len() >= op.params.sc as usize {
            return self.commit_format(op);
        }
        self.data.begin_write(FORMAT_BUFFER_SIZE);
        OpStep::Continue
    }

    fn commit_format(&mut self, op: &mut FormatOp) -> OpStep {
        self.data.reset();
        log::trace!(
            "commit_format(): track: {} head: {} sectors: {}",
            op.track,
            op.params.head,
            op.ids.len()
        );
        if let Err(e) =
            self.drives[op.params.drive].format_track(op.track, op.params.head, &op.ids, op.params.filler)
        {
            op.regs.set_error(e.into());
        }
        let id = op
            .ids
            .last()
            .copied()
            .unwrap_or_else(|| DiskChsn::new(op.track, op.params.head, 0, op.params.n));
        OpStep::Complete(op.regs, id)
    }

    /// End an operation on terminal count. A sector partially transferred counts as the last
    /// sector; a partially written sector is padded with 0.
    fn operation_terminate(&mut self, op: &mut Operation) -> OpStep {
        match op {
            Operation::Transfer(t) => {
                let transferred = t.at_boundary || !self.data.is_untouched();
                let partial_write = t.direction() == DmaDirection::Write && !t.at_boundary && transferred;
                if partial_write && !self.commit_write_sector(t) {
                    return t.complete_here();
                }
                self.data.reset();
                match transferred {
                    true => t.complete_after_sector(),
                    false => t.complete_here(),
                }
            }
            Operation::Format(f) => self.commit_format(f),
        }
    }

    pub fn log_cmd(&mut self, cmd: CommandKind, func: &str, s: &str) {
        self.cmd_log.push(format!("{:?}: {}", cmd, s));
        log::trace!("{}(): {}", func, s);
    }

    pub fn log_str(&mut self, s: &str) {
        self.cmd_log.push(s.to_string());
        log::trace!("{}", s);
    }

    pub fn get_debug_state(&self) -> FdcDebugState {
        let status_register = self.status_r();
        FdcDebugState {
            intr: self.int.get(),
            drq: self.drq.get(),
            dor: 0,
            reset: self.reset_asserted,
            variant: self.variant,
            phase: self.phase.kind(),
            data_mode: self.data.mode(),
            last_cmd: self.last_command,
            last_status: self.last_status_bytes.clone(),
            drive_select: self.drive_select,
            status_register,
            pcn: self.pcn,
            pending_interrupts: self.interrupt_causes.len(),
            data_cursor: self.data.cursor(),
            last_data_read: self.last_data_read,
            last_data_written: self.last_data_written,
            dio: match status_register & FDC_STATUS_DIO != 0 {
                true => IoMode::ToCpu,
                false => IoMode::FromCpu,
            },
            st3: self.last_st3,
            cmd_log: self.cmd_log.as_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        device_types::medium::Sector,
        devices::fdc::signals::LineRecorder,
    };

    fn fdc_with_medium(geometry: StandardGeometry, medium: FloppyMedium) -> Upd765<LineRecorder> {
        let mut fdc = Upd765::new(FdcVariant::Nec765A, LineRecorder::default());
        fdc.set_standard_geometry(0, geometry);
        fdc.insert_medium(0, medium);
        fdc.set_motor_state(0, true);
        fdc
    }

    fn ready_fdc() -> Upd765<LineRecorder> {
        let geometry = StandardGeometry::SingleSided40;
        fdc_with_medium(geometry, FloppyMedium::formatted(geometry.geometry(), 0xAA))
    }

    fn send(fdc: &mut Upd765<LineRecorder>, bytes: &[u8]) {
        for byte in bytes {
            fdc.data_w(*byte);
        }
    }

    fn results(fdc: &mut Upd765<LineRecorder>) -> Vec<u8> {
        let mut bytes = Vec::new();
        while fdc.phase() == ControllerPhase::Result {
            bytes.push(fdc.data_r());
        }
        bytes
    }

    fn dma_read(fdc: &mut Upd765<LineRecorder>, count: usize) -> Vec<u8> {
        (0..count).map(|_| fdc.dack_r()).collect()
    }

    fn pulse_tc(fdc: &mut Upd765<LineRecorder>) {
        fdc.set_tc_state(true);
        fdc.set_tc_state(false);
    }

    fn sense_interrupt(fdc: &mut Upd765<LineRecorder>) -> Vec<u8> {
        send(fdc, &[0x08]);
        results(fdc)
    }

    fn custom_track(sectors: Vec<Sector>) -> FloppyMedium {
        let mut medium = FloppyMedium::formatted(StandardGeometry::SingleSided40.geometry(), 0xAA);
        assert!(medium.set_track(0, 0, sectors));
        medium
    }

    #[test]
    fn full_track_dma_read_with_tc() {
        let mut fdc = ready_fdc();
        send(&mut fdc, &[0x46, 0x00, 0, 0, 1, 2, 9, 0x2A, 0xFF]);
        assert_eq!(fdc.phase(), ControllerPhase::Execution);
        assert_eq!(fdc.interface().drq_rises(), 1);
        assert_eq!(fdc.interface().drq_edges[0].1, DmaDirection::Read);

        let data = dma_read(&mut fdc, 9 * 512 - 1);
        assert!(data.iter().all(|&b| b == 0xAA));
        assert_eq!(fdc.interface().int_rises(), 0);

        assert_eq!(fdc.dack_r(), 0xAA);
        assert_eq!(fdc.phase(), ControllerPhase::Result);
        assert_eq!(fdc.interface().int_rises(), 1);
        assert!(!fdc.interface().drq_level());

        pulse_tc(&mut fdc);
        assert_eq!(fdc.interface().int_rises(), 1, "TC with the last byte raises no second interrupt");
        assert_eq!(results(&mut fdc), vec![0x00, 0x00, 0x00, 1, 0, 1, 2]);
        assert!(!fdc.interface().int_level(), "INT drops when the result is read");
        assert_eq!(fdc.phase(), ControllerPhase::Idle);
    }

    #[test]
    fn read_past_eot_ends_with_end_of_cylinder() {
        let mut fdc = ready_fdc();
        send(&mut fdc, &[0x46, 0x00, 0, 0, 1, 2, 9, 0x2A, 0xFF]);
        dma_read(&mut fdc, 9 * 512);
        assert_eq!(fdc.phase(), ControllerPhase::Result);
        assert_eq!(fdc.interface().int_rises(), 1);
        assert_eq!(results(&mut fdc), vec![0x40, 0x80, 0x00, 1, 0, 1, 2]);
    }

    #[test]
    fn tc_after_first_result_byte_is_ignored() {
        let mut fdc = ready_fdc();
        send(&mut fdc, &[0x46, 0x00, 0, 0, 9, 2, 9, 0x2A, 0xFF]);
        dma_read(&mut fdc, 512);
        assert_eq!(fdc.data_r(), 0x40);
        pulse_tc(&mut fdc);
        assert_eq!(results(&mut fdc), vec![0x80, 0x00, 1, 0, 1, 2]);
    }

    #[test]
    fn polled_read_stops_after_last_byte() {
        let mut fdc = ready_fdc();
        send(&mut fdc, &[0x03, 0xDF, 0x03]);
        send(&mut fdc, &[0x46, 0x00, 0, 0, 9, 2, 9, 0x2A, 0xFF]);

        let mut data = Vec::new();
        while fdc.status_r() & FDC_STATUS_NON_DMA_MODE != 0 {
            assert!(data.len() < 1024, "Execution phase did not end");
            data.push(fdc.data_r());
        }
        assert_eq!(data.len(), 512);
        assert!(data.iter().all(|&b| b == 0xAA));
        assert_eq!(fdc.status_r() & (FDC_STATUS_MRQ | FDC_STATUS_DIO), FDC_STATUS_MRQ | FDC_STATUS_DIO);
        assert_eq!(results(&mut fdc), vec![0x40, 0x80, 0x00, 1, 0, 1, 2]);
    }

    #[test]
    fn missing_later_sector_ends_multi_sector_read() {
        let medium = custom_track(vec![
            Sector::new(DiskChsn::new(0, 0, 1, 2), vec![0x01; 512], false),
            Sector::new(DiskChsn::new(0, 0, 3, 2), vec![0x03; 512], false),
        ]);
        let mut fdc = fdc_with_medium(StandardGeometry::SingleSided40, medium);
        send(&mut fdc, &[0x46, 0x00, 0, 0, 1, 2, 3, 0x2A, 0xFF]);

        let data = dma_read(&mut fdc, 512);
        assert!(data.iter().all(|&b| b == 0x01));
        assert_eq!(fdc.phase(), ControllerPhase::Execution);

        assert_eq!(fdc.dack_r(), NO_IO_BYTE);
        assert_eq!(fdc.phase(), ControllerPhase::Result);
        assert_eq!(fdc.interface().int_rises(), 1);
        assert_eq!(results(&mut fdc), vec![0x40, 0x04, 0x00, 0, 0, 2, 2]);
    }

    #[test]
    fn write_lands_on_matching_cylinder_id() {
        let medium = custom_track(vec![
            Sector::new(DiskChsn::new(5, 0, 1, 2), vec![0x11; 512], false),
            Sector::new(DiskChsn::new(0, 0, 1, 2), vec![0x22; 512], false),
        ]);
        let mut fdc = fdc_with_medium(StandardGeometry::SingleSided40, medium);
        send(&mut fdc, &[0x45, 0x00, 0, 0, 1, 2, 1, 0x2A, 0xFF]);
        for _ in 0..512 {
            fdc.dack_w(0x77);
        }
        pulse_tc(&mut fdc);
        assert_eq!(results(&mut fdc), vec![0x00, 0x00, 0x00, 1, 0, 1, 2]);

        let track = fdc.drive(0).and_then(|d| d.medium()).map(|m| m.track(0, 0).to_vec()).unwrap();
        assert!(track[0].data().iter().all(|&b| b == 0x11));
        assert!(track[1].data().iter().all(|&b| b == 0x77));
    }

    #[test]
    fn seek_interrupts_after_run() {
        let mut fdc = ready_fdc();
        send(&mut fdc, &[0x0F, 0x00, 20]);
        assert_eq!(fdc.phase(), ControllerPhase::Idle);
        assert_eq!(fdc.status_r(), FDC_STATUS_MRQ | FDC_STATUS_FDD_A_BUSY);

        assert_eq!(sense_interrupt(&mut fdc), vec![0x80], "No interrupt is pending yet");

        fdc.run(10.0);
        assert_eq!(fdc.interface().int_rises(), 1);
        assert_eq!(fdc.status_r(), FDC_STATUS_MRQ);
        assert_eq!(sense_interrupt(&mut fdc), vec![0x20, 20]);
        assert!(!fdc.interface().int_level());
        assert_eq!(sense_interrupt(&mut fdc), vec![0x80]);
        assert_eq!(fdc.drive(0).map(|d| d.current_track), Some(20));
    }

    #[test]
    fn superseded_seek_keeps_its_interrupt() {
        let mut fdc = ready_fdc();
        fdc.set_seek_time(1000.0);
        send(&mut fdc, &[0x0F, 0x00, 5]);
        send(&mut fdc, &[0x0F, 0x00, 9]);
        assert_eq!(fdc.interface().int_rises(), 1, "First seek completes when replaced");

        fdc.run(1000.0);
        assert_eq!(sense_interrupt(&mut fdc), vec![0x20, 5]);
        assert_eq!(sense_interrupt(&mut fdc), vec![0x20, 9]);
        assert_eq!(sense_interrupt(&mut fdc), vec![0x80]);
        assert_eq!(fdc.drive(0).map(|d| d.current_track), Some(9));
    }

    #[test]
    fn seek_waits_for_configured_time() {
        let mut fdc = ready_fdc();
        fdc.set_seek_time(1000.0);
        send(&mut fdc, &[0x0F, 0x00, 5]);
        fdc.run(600.0);
        assert_eq!(fdc.interface().int_rises(), 0);
        fdc.run(600.0);
        assert_eq!(fdc.interface().int_rises(), 1);
        assert_eq!(sense_interrupt(&mut fdc), vec![0x20, 5]);
    }

    #[test]
    fn write_protected_write_fails_without_drq() {
        let mut fdc = ready_fdc();
        fdc.set_write_protect(0, true);
        send(&mut fdc, &[0x45, 0x00, 0, 0, 1, 2, 9, 0x2A, 0xFF]);

        assert_eq!(fdc.phase(), ControllerPhase::Result);
        assert_eq!(fdc.interface().drq_rises(), 0);
        assert_eq!(fdc.interface().int_rises(), 1);
        assert_eq!(results(&mut fdc), vec![0x40, 0x02, 0x00, 0, 0, 1, 2]);
    }

    #[test]
    fn missing_sector_reports_no_data() {
        let mut fdc = ready_fdc();
        send(&mut fdc, &[0x46, 0x00, 0, 0, 12, 2, 12, 0x2A, 0xFF]);
        assert_eq!(fdc.interface().drq_rises(), 0);
        assert_eq!(results(&mut fdc), vec![0x40, 0x04, 0x00, 0, 0, 12, 2]);
    }

    #[test]
    fn reset_mid_read_is_idempotent() {
        let mut fdc = ready_fdc();
        send(&mut fdc, &[0x46, 0x00, 0, 0, 1, 2, 9, 0x2A, 0xFF]);
        dma_read(&mut fdc, 100);

        fdc.set_reset_state(true);
        assert_eq!(fdc.status_r(), 0);
        assert!(!fdc.interface().drq_level());
        fdc.set_reset_state(true);
        fdc.set_reset_state(false);
        fdc.set_reset_state(false);

        assert_eq!(fdc.phase(), ControllerPhase::Idle);
        assert_eq!(fdc.status_r(), FDC_STATUS_MRQ);
        assert_eq!(fdc.interface().int_rises(), 1);
        for drive in 0..4u8 {
            assert_eq!(sense_interrupt(&mut fdc), vec![0xC0 | drive, 0]);
        }
        assert_eq!(sense_interrupt(&mut fdc), vec![0x80]);
        assert_eq!(fdc.interface().int_rises(), 1);
    }

    #[test]
    fn reset_pulse_keeps_pcn() {
        let mut fdc = ready_fdc();
        send(&mut fdc, &[0x0F, 0x00, 12]);
        fdc.run(0.0);
        fdc.reset();
        assert_eq!(fdc.interface().int_rises(), 2, "Seek completion, then reset release");
        assert_eq!(sense_interrupt(&mut fdc), vec![0xC0, 12]);
    }

    #[test]
    fn reset_without_ready_drive_is_silent() {
        let mut fdc = Upd765::new(FdcVariant::Nec765B, LineRecorder::default());
        fdc.set_reset_state(true);
        fdc.set_reset_state(false);
        assert_eq!(fdc.interface().int_rises(), 0);
        assert_eq!(sense_interrupt(&mut fdc), vec![0x80]);
    }

    #[test]
    fn ignored_while_reset() {
        let mut fdc = ready_fdc();
        fdc.set_reset_state(true);
        send(&mut fdc, &[0x0F, 0x00, 5]);
        fdc.run(100.0);
        assert_eq!(fdc.data_r(), NO_IO_BYTE);
        assert_eq!(fdc.dack_r(), NO_IO_BYTE);
        fdc.set_reset_state(false);
        assert_eq!(fdc.phase(), ControllerPhase::Idle);
        assert_eq!(fdc.drive(0).map(|d| d.current_track), Some(0));
    }

    #[test]
    fn format_then_read_back() {
        let mut fdc = ready_fdc();
        send(&mut fdc, &[0x0F, 0x00, 5]);
        fdc.run(0.0);
        assert_eq!(sense_interrupt(&mut fdc), vec![0x20, 5]);

        send(&mut fdc, &[0x4D, 0x00, 2, 3, 0x54, 0xE5]);
        assert_eq!(fdc.phase(), ControllerPhase::Execution);
        assert_eq!(fdc.interface().drq_edges.last(), Some(&(true, DmaDirection::Write)));
        for r in [1u8, 3, 2] {
            for byte in [5, 0, r, 2] {
                fdc.dack_w(byte);
            }
        }
        assert_eq!(results(&mut fdc), vec![0x00, 0x00, 0x00, 5, 0, 2, 2]);

        let ids = fdc.drive(0).and_then(|d| d.medium()).map(|m| m.track_ids(5, 0));
        assert_eq!(
            ids,
            Some(vec![
                DiskChsn::new(5, 0, 1, 2),
                DiskChsn::new(5, 0, 3, 2),
                DiskChsn::new(5, 0, 2, 2)
            ])
        );

        send(&mut fdc, &[0x46, 0x00, 5, 0, 3, 2, 3, 0x2A, 0xFF]);
        let data = dma_read(&mut fdc, 512);
        assert!(data.iter().all(|&b| b == 0xE5));
        pulse_tc(&mut fdc);
        assert_eq!(results(&mut fdc), vec![0x00, 0x00, 0x00, 6, 0, 1, 2]);
    }

    #[test]
    fn format_with_tc_keeps_received_ids() {
        let mut fdc = ready_fdc();
        send(&mut fdc, &[0x4D, 0x00, 2, 9, 0x54, 0xF6]);
        for byte in [0, 0, 7, 2] {
            fdc.dack_w(byte);
        }
        pulse_tc(&mut fdc);
        assert_eq!(results(&mut fdc), vec![0x00, 0x00, 0x00, 0, 0, 7, 2]);
        let ids = fdc.drive(0).and_then(|d| d.medium()).map(|m| m.track_ids(0, 0));
        assert_eq!(ids, Some(vec![DiskChsn::new(0, 0, 7, 2)]));
    }

    #[test]
    fn busy_bit_tracks_phase() {
        let mut fdc = ready_fdc();
        assert_eq!(fdc.status_r(), FDC_STATUS_MRQ);

        fdc.data_w(0x46);
        assert_eq!(fdc.phase(), ControllerPhase::CommandBytes);
        assert_eq!(fdc.status_r(), FDC_STATUS_MRQ | FDC_STATUS_FDC_BUSY);

        send(&mut fdc, &[0x00, 0, 0, 1, 2, 1, 0x2A, 0xFF]);
        assert_eq!(fdc.status_r(), FDC_STATUS_FDC_BUSY);

        dma_read(&mut fdc, 512);
        pulse_tc(&mut fdc);
        assert_eq!(fdc.status_r(), FDC_STATUS_MRQ | FDC_STATUS_DIO);
        results(&mut fdc);
        assert_eq!(fdc.status_r(), FDC_STATUS_MRQ);
    }

    #[test]
    fn pio_read_uses_data_register() {
        let mut fdc = ready_fdc();
        send(&mut fdc, &[0x03, 0xDF, 0x03]);
        assert_eq!(fdc.data_mode(), DataMode::Pio);
        assert_eq!(fdc.specify_params().step_rate, 0x0D);

        send(&mut fdc, &[0x46, 0x00, 0, 0, 1, 2, 9, 0x2A, 0xFF]);
        assert_eq!(fdc.status_r(), 0xF0);
        assert_eq!(fdc.interface().drq_rises(), 0);

        let data: Vec<u8> = (0..512).map(|_| fdc.data_r()).collect();
        assert!(data.iter().all(|&b| b == 0xAA));
        pulse_tc(&mut fdc);
        assert_eq!(results(&mut fdc), vec![0x00, 0x00, 0x00, 0, 0, 2, 2]);
    }

    #[test]
    fn pio_write_uses_data_register() {
        let mut fdc = ready_fdc();
        send(&mut fdc, &[0x03, 0xDF, 0x03]);
        send(&mut fdc, &[0x45, 0x00, 0, 0, 3, 2, 3, 0x2A, 0xFF]);
        assert_eq!(fdc.status_r(), FDC_STATUS_MRQ | FDC_STATUS_NON_DMA_MODE | FDC_STATUS_FDC_BUSY);
        for i in 0..512 {
            fdc.data_w(i as u8);
        }
        assert_eq!(fdc.phase(), ControllerPhase::Result);
        assert_eq!(results(&mut fdc), vec![0x40, 0x80, 0x00, 1, 0, 1, 2]);
        let sector = fdc
            .drive(0)
            .and_then(|d| d.medium())
            .and_then(|m| m.read_sector(0, 0, 3))
            .map(|s| s.data().to_vec());
        assert_eq!(sector.map(|d| d[255]), Some(255));
    }

    #[test]
    fn write_then_read_back() {
        let mut fdc = ready_fdc();
        send(&mut fdc, &[0x45, 0x00, 0, 0, 2, 2, 9, 0x2A, 0xFF]);
        assert_eq!(fdc.interface().drq_edges.last(), Some(&(true, DmaDirection::Write)));
        for i in 0..512 {
            fdc.dack_w((i % 251) as u8);
        }
        pulse_tc(&mut fdc);
        assert_eq!(results(&mut fdc), vec![0x00, 0x00, 0x00, 0, 0, 3, 2]);

        send(&mut fdc, &[0x46, 0x00, 0, 0, 2, 2, 9, 0x2A, 0xFF]);
        let data = dma_read(&mut fdc, 512);
        pulse_tc(&mut fdc);
        assert_eq!(data[250], 250);
        assert_eq!(data[251], 0);
        assert_eq!(data[511], (511 % 251) as u8);
    }

    #[test]
    fn tc_mid_write_pads_sector() {
        let mut fdc = ready_fdc();
        send(&mut fdc, &[0x45, 0x00, 0, 0, 4, 2, 9, 0x2A, 0xFF]);
        for _ in 0..10 {
            fdc.dack_w(0x11);
        }
        pulse_tc(&mut fdc);
        assert_eq!(results(&mut fdc), vec![0x00, 0x00, 0x00, 0, 0, 5, 2]);

        let sector = fdc
            .drive(0)
            .and_then(|d| d.medium())
            .and_then(|m| m.read_sector(0, 0, 4))
            .map(|s| s.data().to_vec())
            .unwrap();
        assert_eq!(sector.len(), 512);
        assert!(sector[..10].iter().all(|&b| b == 0x11));
        assert!(sector[10..].iter().all(|&b| b == 0));
    }

    #[test]
    fn tc_before_any_byte_reports_current_sector() {
        let mut fdc = ready_fdc();
        send(&mut fdc, &[0x46, 0x00, 0, 0, 4, 2, 9, 0x2A, 0xFF]);
        pulse_tc(&mut fdc);
        assert_eq!(results(&mut fdc), vec![0x00, 0x00, 0x00, 0, 0, 4, 2]);
    }

    #[test]
    fn multi_track_read_crosses_to_head_1() {
        let geometry = StandardGeometry::DoubleSided40;
        let mut fdc = fdc_with_medium(geometry, FloppyMedium::formatted(geometry.geometry(), 0x5A));
        send(&mut fdc, &[0xC6, 0x00, 0, 0, 9, 2, 9, 0x2A, 0xFF]);
        let data = dma_read(&mut fdc, 1024);
        assert!(data.iter().all(|&b| b == 0x5A));
        pulse_tc(&mut fdc);
        assert_eq!(results(&mut fdc), vec![0x04, 0x00, 0x00, 0, 1, 2, 2]);
    }

    #[test]
    fn read_track_flags_mismatched_ids() {
        let medium = custom_track(vec![
            Sector::new(DiskChsn::new(0, 0, 1, 2), vec![0x01; 512], false),
            Sector::new(DiskChsn::new(0, 0, 5, 2), vec![0x05; 512], false),
        ]);
        let mut fdc = fdc_with_medium(StandardGeometry::SingleSided40, medium);
        send(&mut fdc, &[0x42, 0x00, 0, 0, 1, 2, 2, 0x2A, 0xFF]);

        let data = dma_read(&mut fdc, 1024);
        assert_eq!(data[0], 0x01);
        assert_eq!(data[512], 0x05);
        pulse_tc(&mut fdc);
        assert_eq!(results(&mut fdc), vec![0x00, 0x04, 0x00, 1, 0, 1, 2]);
    }

    #[test]
    fn skip_passes_over_deleted_sectors() {
        let medium = custom_track(vec![
            Sector::new(DiskChsn::new(0, 0, 1, 2), vec![0x01; 512], false),
            Sector::new(DiskChsn::new(0, 0, 2, 2), vec![0x02; 512], true),
            Sector::new(DiskChsn::new(0, 0, 3, 2), vec![0x03; 512], false),
        ]);
        let mut fdc = fdc_with_medium(StandardGeometry::SingleSided40, medium);
        send(&mut fdc, &[0x66, 0x00, 0, 0, 1, 2, 3, 0x2A, 0xFF]);

        let data = dma_read(&mut fdc, 1024);
        assert!(data[..512].iter().all(|&b| b == 0x01));
        assert!(data[512..].iter().all(|&b| b == 0x03));
        pulse_tc(&mut fdc);
        assert_eq!(results(&mut fdc), vec![0x00, 0x00, 0x40, 1, 0, 1, 2]);
    }

    #[test]
    fn control_mark_without_skip_ends_after_sector() {
        let medium = custom_track(vec![
            Sector::new(DiskChsn::new(0, 0, 1, 2), vec![0x01; 512], false),
            Sector::new(DiskChsn::new(0, 0, 2, 2), vec![0x02; 512], true),
            Sector::new(DiskChsn::new(0, 0, 3, 2), vec![0x03; 512], false),
        ]);
        let mut fdc = fdc_with_medium(StandardGeometry::SingleSided40, medium);
        send(&mut fdc, &[0x46, 0x00, 0, 0, 2, 2, 3, 0x2A, 0xFF]);

        let data = dma_read(&mut fdc, 512);
        assert!(data.iter().all(|&b| b == 0x02));
        assert_eq!(fdc.phase(), ControllerPhase::Result);
        assert_eq!(results(&mut fdc), vec![0x40, 0x00, 0x40, 0, 0, 3, 2]);
    }

    #[test]
    fn read_deleted_data_reads_deleted_sector() {
        let medium = custom_track(vec![Sector::new(DiskChsn::new(0, 0, 1, 2), vec![0x0D; 512], true)]);
        let mut fdc = fdc_with_medium(StandardGeometry::SingleSided40, medium);
        send(&mut fdc, &[0x4C, 0x00, 0, 0, 1, 2, 1, 0x2A, 0xFF]);
        assert!(dma_read(&mut fdc, 512).iter().all(|&b| b == 0x0D));
        pulse_tc(&mut fdc);
        assert_eq!(results(&mut fdc), vec![0x00, 0x00, 0x00, 1, 0, 1, 2]);
    }

    #[test]
    fn wrong_and_bad_cylinder() {
        let medium = custom_track(vec![
            Sector::new(DiskChsn::new(3, 0, 1, 2), vec![0; 512], false),
            Sector::new(DiskChsn::new(0xFF, 0, 2, 2), vec![0; 512], false),
        ]);
        let mut fdc = fdc_with_medium(StandardGeometry::SingleSided40, medium);

        send(&mut fdc, &[0x46, 0x00, 0, 0, 1, 2, 2, 0x2A, 0xFF]);
        assert_eq!(results(&mut fdc), vec![0x40, 0x04, 0x10, 0, 0, 1, 2]);

        send(&mut fdc, &[0x46, 0x00, 0, 0, 2, 2, 2, 0x2A, 0xFF]);
        assert_eq!(results(&mut fdc), vec![0x40, 0x04, 0x02, 0, 0, 2, 2]);
    }

    #[test]
    fn recalibrate_from_far_track_fails() {
        let geometry = StandardGeometry::DoubleSided80;
        let mut fdc = fdc_with_medium(geometry, FloppyMedium::formatted(geometry.geometry(), 0));
        send(&mut fdc, &[0x0F, 0x00, 79]);
        fdc.run(0.0);
        assert_eq!(sense_interrupt(&mut fdc), vec![0x20, 79]);

        send(&mut fdc, &[0x07, 0x00]);
        fdc.run(0.0);
        assert_eq!(sense_interrupt(&mut fdc), vec![0x70, 2]);

        send(&mut fdc, &[0x07, 0x00]);
        fdc.run(0.0);
        assert_eq!(sense_interrupt(&mut fdc), vec![0x20, 0]);
    }

    #[test]
    fn not_ready_drive() {
        let mut fdc = Upd765::new(FdcVariant::Nec765A, LineRecorder::default());
        fdc.set_standard_geometry(0, StandardGeometry::SingleSided40);
        send(&mut fdc, &[0x46, 0x00, 0, 0, 1, 2, 9, 0x2A, 0xFF]);
        assert_eq!(results(&mut fdc), vec![0x48, 0x00, 0x00, 0, 0, 1, 2]);

        send(&mut fdc, &[0x0F, 0x00, 10]);
        fdc.run(0.0);
        assert_eq!(sense_interrupt(&mut fdc), vec![0x68, 0]);
    }

    #[test]
    fn invalid_opcode_has_one_result_byte() {
        let mut fdc = ready_fdc();
        fdc.data_w(0x1F);
        assert_eq!(fdc.phase(), ControllerPhase::Result);
        assert_eq!(results(&mut fdc), vec![0x80]);
        assert_eq!(fdc.interface().int_rises(), 0);
        assert_eq!(fdc.get_debug_state().last_cmd, CommandKind::Invalid);
    }

    #[test]
    fn sense_drive_status_reports_st3() {
        let mut fdc = ready_fdc();
        fdc.set_write_protect(0, true);
        send(&mut fdc, &[0x04, 0x00]);
        assert_eq!(results(&mut fdc), vec![0x70]);
        assert_eq!(fdc.interface().int_rises(), 0);
    }

    #[test]
    fn read_id_reports_first_sector() {
        let mut fdc = ready_fdc();
        send(&mut fdc, &[0x4A, 0x00]);
        assert_eq!(fdc.interface().int_rises(), 1);
        assert_eq!(results(&mut fdc), vec![0x00, 0x00, 0x00, 0, 0, 1, 2]);

        let mut blank = fdc_with_medium(
            StandardGeometry::SingleSided40,
            FloppyMedium::new(StandardGeometry::SingleSided40.geometry()),
        );
        send(&mut blank, &[0x4A, 0x00]);
        assert_eq!(results(&mut blank), vec![0x40, 0x05, 0x00, 0, 0, 0, 0]);
    }

    #[test]
    fn ready_change_interrupts_when_enabled() {
        let geometry = StandardGeometry::SingleSided40;
        let mut fdc = Upd765::new(FdcVariant::Nec765A, LineRecorder::default());
        fdc.set_standard_geometry(0, geometry);
        fdc.insert_medium(0, FloppyMedium::formatted(geometry.geometry(), 0));
        fdc.set_ready_int(true);

        fdc.set_motor_state(0, true);
        assert_eq!(fdc.interface().int_rises(), 1);
        assert_eq!(sense_interrupt(&mut fdc), vec![0xC0, 0]);

        fdc.set_motor_state(0, true);
        assert_eq!(fdc.interface().int_rises(), 1, "No transition, no interrupt");
    }

    #[test]
    fn dack_outside_execution_is_ignored() {
        let mut fdc = ready_fdc();
        assert_eq!(fdc.dack_r(), NO_IO_BYTE);
        fdc.dack_w(0x12);
        assert_eq!(fdc.phase(), ControllerPhase::Idle);
        fdc.set_tc_state(true);
        assert_eq!(fdc.phase(), ControllerPhase::Idle);
    }

    #[test]
    fn debug_state_reflects_controller() {
        let mut fdc = ready_fdc();
        send(&mut fdc, &[0x0F, 0x00, 7]);
        fdc.run(0.0);
        let state = fdc.get_debug_state();
        assert!(state.intr);
        assert_eq!(state.pcn[0], 7);
        assert_eq!(state.pending_interrupts, 1);
        assert_eq!(state.last_cmd, CommandKind::Seek);
        assert!(!state.cmd_log.is_empty());
    }
}
