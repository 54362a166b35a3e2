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

    devices::fdc::pc_fdc.rs

    IBM PC/XT style floppy adapter with Digital Output Register
*/

//! The PC floppy adapter places a Digital Output Register in front of the µPD765. The DOR
//! drives the controller's RESET input, the four drive motors, and a gate on the DMA and IRQ
//! lines. With the gate closed the controller keeps running, but its INT and DRQ outputs never
//! reach the host and the DMA controller's TC never reaches the controller.

use crate::{
    bus::{IoDevice, NO_IO_BYTE},
    device_types::fdc::FdcVariant,
    devices::fdc::{
        controller::{FdcDebugState, Upd765, FDC_MAX_DRIVES},
        signals::{DmaDirection, FdcInterface, Signal},
    },
};

pub const PC_FDC_IO_BASE: u16 = 0x3F0;

pub const FDC_DIGITAL_OUTPUT_REGISTER: u16 = 0x02;
pub const FDC_STATUS_REGISTER: u16 = 0x04;
pub const FDC_DATA_REGISTER: u16 = 0x05;

pub const DOR_DRIVE_SELECT_MASK: u8 = 0b0000_0011;
pub const DOR_FDC_RESET: u8 = 0b0000_0100;
pub const DOR_DMA_ENABLED: u8 = 0b0000_1000;
pub const DOR_MOTOR_FDD_A: u8 = 0b0001_0000;
pub const DOR_MOTOR_FDD_B: u8 = 0b0010_0000;
pub const DOR_MOTOR_FDD_C: u8 = 0b0100_0000;
pub const DOR_MOTOR_FDD_D: u8 = 0b1000_0000;

const DOR_MOTOR_BITS: [u8; FDC_MAX_DRIVES] = [DOR_MOTOR_FDD_A, DOR_MOTOR_FDD_B, DOR_MOTOR_FDD_C, DOR_MOTOR_FDD_D];

/// Sits between the controller and the host's interrupt and DMA controllers. The controller's
/// output levels are always latched; they are only driven to the host while the gate is open.
pub struct PcLineGate<H: FdcInterface> {
    host: H,
    open: bool,
    int: bool,
    drq: bool,
    drq_direction: DmaDirection,
    host_int: Signal,
    host_drq: Signal,
}

impl<H: FdcInterface> PcLineGate<H> {
    pub fn new(host: H) -> Self {
        Self {
            host,
            open: false,
            int: false,
            drq: false,
            drq_direction: DmaDirection::Read,
            host_int: Signal::default(),
            host_drq: Signal::default(),
        }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    #[inline]
    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Open or close the gate. Opening it drives the host lines to the latched levels; closing
    /// it drives them low.
    pub fn set_open(&mut self, open: bool) {
        if self.open == open {
            return;
        }
        self.open = open;
        log::debug!("FDC DMA/IRQ gate {}", if open { "opened" } else { "closed" });
        self.drive_int(open && self.int);
        self.drive_drq(open && self.drq);
    }

    fn drive_int(&mut self, state: bool) {
        if self.host_int.set(state) {
            self.host.interrupt(state);
        }
    }

    fn drive_drq(&mut self, state: bool) {
        if self.host_drq.set(state) {
            self.host.dma_drq(state, self.drq_direction);
        }
    }
}

impl<H: FdcInterface> FdcInterface for PcLineGate<H> {
    fn interrupt(&mut self, state: bool) {
        self.int = state;
        if self.open {
            self.drive_int(state);
        }
    }

    fn dma_drq(&mut self, state: bool, direction: DmaDirection) {
        self.drq = state;
        self.drq_direction = direction;
        if self.open {
            self.drive_drq(state);
        }
    }
}

/// A µPD765 behind a PC-style Digital Output Register.
pub struct PcFdc<H: FdcInterface> {
    fdc: Upd765<PcLineGate<H>>,
    io_base: u16,
    dor: u8,
    tc: bool,
}

impl<H: FdcInterface> PcFdc<H> {
    pub fn new(variant: FdcVariant, host: H) -> Self {
        Self::with_io_base(variant, host, PC_FDC_IO_BASE)
    }

    /// Create an adapter at a non-standard I/O base. The DOR powers up as 0, holding the
    /// controller in reset with the gate closed and all motors off.
    pub fn with_io_base(variant: FdcVariant, host: H, io_base: u16) -> Self {
        let mut fdc = Upd765::new(variant, PcLineGate::new(host));
        // The adapter holds READY high while the DOR keeps the controller in reset, so every
        // reset release produces an interrupt. Outside reset READY follows the motor bits.
        fdc.set_ready_on_reset(true);
        fdc.set_reset_state(true);
        Self {
            fdc,
            io_base,
            dor: 0,
            tc: false,
        }
    }

    pub fn fdc(&self) -> &Upd765<PcLineGate<H>> {
        &self.fdc
    }

    pub fn fdc_mut(&mut self) -> &mut Upd765<PcLineGate<H>> {
        &mut self.fdc
    }

    pub fn host(&self) -> &H {
        self.fdc.interface().host()
    }

    pub fn host_mut(&mut self) -> &mut H {
        self.fdc.interface_mut().host_mut()
    }

    #[inline]
    pub fn dor(&self) -> u8 {
        self.dor
    }

    /// Handle a write to the Digital Output Register. Motors are updated first, then the
    /// DMA/IRQ gate, then the RESET line, so that a reset release in the same write delivers
    /// its interrupt through the new gate state.
    pub fn handle_dor_write(&mut self, data: u8) {
        log::trace!("DOR write: {:02X}", data);

        for (drive, bit) in DOR_MOTOR_BITS.iter().enumerate() {
            self.fdc.set_motor_state(drive, data & bit != 0);
        }

        let gate_open = data & DOR_DMA_ENABLED != 0;
        if gate_open != self.fdc.interface().is_open() {
            if !gate_open {
                self.fdc.set_tc_state(false);
            }
            self.fdc.interface_mut().set_open(gate_open);
            if gate_open && self.tc {
                self.fdc.set_tc_state(true);
            }
        }

        // Reset the FDC when the reset bit is *not* set
        let reset = data & DOR_FDC_RESET == 0;
        if reset && !self.fdc.is_reset() {
            log::debug!("FDC Reset requested: {:02X}", data);
        }
        self.fdc.set_reset_state(reset);

        log::trace!("Drive {} selected", data & DOR_DRIVE_SELECT_MASK);
        self.dor = data;
    }

    /// Drive the TC line from the DMA controller. TC only reaches the controller while the
    /// DOR gate is open.
    pub fn set_tc_state(&mut self, state: bool) {
        self.tc = state;
        if self.fdc.interface().is_open() {
            self.fdc.set_tc_state(state);
        }
    }

    pub fn dack_r(&mut self) -> u8 {
        self.fdc.dack_r()
    }

    pub fn dack_w(&mut self, data: u8) {
        self.fdc.dack_w(data)
    }

    pub fn run(&mut self, us: f64) {
        self.fdc.run(us);
    }

    pub fn get_debug_state(&self) -> FdcDebugState {
        FdcDebugState {
            dor: self.dor,
            ..self.fdc.get_debug_state()
        }
    }
}

/// IO Port handlers for the FDC
impl<H: FdcInterface> IoDevice for PcFdc<H> {
    fn read_u8(&mut self, port: u16) -> u8 {
        match port.wrapping_sub(self.io_base) {
            FDC_DIGITAL_OUTPUT_REGISTER => {
                log::warn!("Read from Write-only DOR register");
                NO_IO_BYTE
            }
            FDC_STATUS_REGISTER => self.fdc.status_r(),
            FDC_DATA_REGISTER => self.fdc.data_r(),
            _ => {
                log::warn!("FDC: Read from unmapped port {:04X}", port);
                NO_IO_BYTE
            }
        }
    }

    fn write_u8(&mut self, port: u16, data: u8) {
        match port.wrapping_sub(self.io_base) {
            FDC_DIGITAL_OUTPUT_REGISTER => self.handle_dor_write(data),
            FDC_STATUS_REGISTER => {
                log::warn!("Write to Read-only status register");
            }
            FDC_DATA_REGISTER => self.fdc.data_w(data),
            _ => {
                log::warn!("FDC: Write to unmapped port {:04X}: {:02X}", port, data);
            }
        }
    }

    fn port_list(&self) -> Vec<(String, u16)> {
        vec![
            (
                String::from("FDC Digital Output Register"),
                self.io_base + FDC_DIGITAL_OUTPUT_REGISTER,
            ),
            (String::from("FDC Status Register"), self.io_base + FDC_STATUS_REGISTER),
            (String::from("FDC Data Register"), self.io_base + FDC_DATA_REGISTER),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        device_types::{fdc::StandardGeometry, medium::FloppyMedium},
        devices::fdc::{controller::ControllerPhase, signals::LineRecorder},
    };

    const DATA: u16 = PC_FDC_IO_BASE + FDC_DATA_REGISTER;
    const MSR: u16 = PC_FDC_IO_BASE + FDC_STATUS_REGISTER;
    const DOR: u16 = PC_FDC_IO_BASE + FDC_DIGITAL_OUTPUT_REGISTER;

    fn pc_with_disk() -> PcFdc<LineRecorder> {
        let mut pc = PcFdc::new(FdcVariant::Nec765A, LineRecorder::default());
        let geometry = StandardGeometry::DoubleSided40;
        pc.fdc_mut().set_standard_geometry(0, geometry);
        pc.fdc_mut().insert_medium(0, FloppyMedium::formatted(geometry.geometry(), 0x3C));
        pc
    }

    fn send(pc: &mut PcFdc<LineRecorder>, bytes: &[u8]) {
        for byte in bytes {
            pc.write_u8(DATA, *byte);
        }
    }

    fn results(pc: &mut PcFdc<LineRecorder>) -> Vec<u8> {
        let mut bytes = Vec::new();
        while pc.fdc().phase() == ControllerPhase::Result {
            bytes.push(pc.read_u8(DATA));
        }
        bytes
    }

    /// Release reset and consume the four polling interrupts.
    fn boot(pc: &mut PcFdc<LineRecorder>) {
        pc.write_u8(DOR, 0x1C);
        for drive in 0..4u8 {
            send(pc, &[0x08]);
            assert_eq!(results(pc), vec![0xC0 | drive, 0]);
        }
    }

    #[test]
    fn powers_up_in_reset() {
        let mut pc = pc_with_disk();
        assert_eq!(pc.read_u8(MSR), 0);
        assert_eq!(pc.read_u8(DOR), NO_IO_BYTE);
        assert_eq!(pc.host().int_rises(), 0);
        assert!(pc.fdc().drive(0).unwrap().is_ready(), "READY held high in reset");
        assert!(pc.fdc().drive(3).unwrap().is_ready());
    }

    #[test]
    fn reset_release_interrupts_through_gate() {
        let mut pc = pc_with_disk();
        pc.write_u8(DOR, 0x0C);
        assert_eq!(pc.host().int_rises(), 1);
        assert_eq!(pc.read_u8(MSR), 0x80);
        assert!(!pc.fdc().drive(0).unwrap().is_ready(), "Motor is off");

        send(&mut pc, &[0x08]);
        assert_eq!(results(&mut pc), vec![0xC0, 0]);
        assert!(!pc.host().int_level());
    }

    #[test]
    fn reset_release_with_gate_closed_latches_interrupt() {
        let mut pc = pc_with_disk();
        pc.write_u8(DOR, 0x04);
        assert_eq!(pc.host().int_rises(), 0);
        assert!(pc.fdc().int_state());

        pc.write_u8(DOR, 0x0C);
        assert_eq!(pc.host().int_rises(), 1, "Latched INT replayed on gate open");
    }

    #[test]
    fn dor_controls_motors() {
        let mut pc = pc_with_disk();
        pc.write_u8(DOR, 0x1C);
        assert!(pc.fdc().drive(0).unwrap().is_ready());
        assert_eq!(pc.dor(), 0x1C);
        pc.write_u8(DOR, 0x0C);
        assert!(!pc.fdc().drive(0).unwrap().is_ready());
    }

    #[test]
    fn gate_masks_drq_mid_transfer() {
        let mut pc = pc_with_disk();
        boot(&mut pc);

        send(&mut pc, &[0x46, 0x00, 0, 0, 1, 2, 9, 0x2A, 0xFF]);
        assert!(pc.host().drq_level());
        let first: Vec<u8> = (0..100).map(|_| pc.dack_r()).collect();
        assert!(first.iter().all(|&b| b == 0x3C));

        pc.write_u8(DOR, 0x14);
        assert!(!pc.host().drq_level(), "DRQ masked by DOR");
        assert_eq!(pc.fdc().phase(), ControllerPhase::Execution);
        assert!(pc.fdc().drq_state(), "Controller still requests DMA");
        assert_eq!(pc.get_debug_state().data_cursor, 100);

        pc.set_tc_state(true);
        pc.set_tc_state(false);
        assert_eq!(pc.fdc().phase(), ControllerPhase::Execution, "TC masked by DOR");

        pc.write_u8(DOR, 0x1C);
        assert!(pc.host().drq_level());
        assert_eq!(pc.host().drq_rises(), 2);
        assert_eq!(pc.get_debug_state().data_cursor, 100);

        for _ in 0..412 {
            pc.dack_r();
        }
        pc.set_tc_state(true);
        assert_eq!(results(&mut pc), vec![0x00, 0x00, 0x00, 0, 0, 2, 2]);
        assert!(!pc.host().drq_level());
        assert_eq!(pc.get_debug_state().dor, 0x1C);
    }

    #[test]
    fn tc_held_across_gate_reopen_terminates() {
        let mut pc = pc_with_disk();
        boot(&mut pc);

        send(&mut pc, &[0x46, 0x00, 0, 0, 1, 2, 9, 0x2A, 0xFF]);
        for _ in 0..512 {
            pc.dack_r();
        }
        pc.write_u8(DOR, 0x14);
        pc.set_tc_state(true);
        assert_eq!(pc.fdc().phase(), ControllerPhase::Execution);
        pc.write_u8(DOR, 0x1C);
        assert_eq!(pc.fdc().phase(), ControllerPhase::Result);
    }

    #[test]
    fn reports_ports() {
        let pc = PcFdc::with_io_base(FdcVariant::Nec765B, LineRecorder::default(), 0x370);
        let ports: Vec<u16> = pc.port_list().into_iter().map(|(_, p)| p).collect();
        assert_eq!(ports, vec![0x372, 0x374, 0x375]);
    }
}
