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

    devices::fdc::direct.rs

    Direct-wired µPD765 adapters for Amstrad CPC, ZX Spectrum +3 and PCW
*/

//! On these machines the µPD765 sits directly on the CPU's I/O bus with no DMA controller in
//! between. The CPU polls the Main Status Register and moves execution phase bytes through the
//! data register itself, so data register accesses during the execution phase are routed to
//! the controller's DMA acknowledge inputs. INT is usually left unconnected.

use crate::{
    bus::{IoDevice, NO_IO_BYTE},
    device_types::fdc::FdcVariant,
    devices::fdc::{
        controller::{ControllerPhase, Upd765, FDC_MAX_DRIVES},
        signals::{FdcInterface, NullInterface},
    },
};

pub const CPC_FDC_STATUS_PORT: u16 = 0xFB7E;
pub const CPC_FDC_DATA_PORT: u16 = 0xFB7F;
pub const CPC_FDC_MOTOR_PORT: u16 = 0xFA7E;
pub const CPC_MOTOR_BIT: u8 = 0b0000_0001;

pub const P3_FDC_STATUS_PORT: u16 = 0x2FFD;
pub const P3_FDC_DATA_PORT: u16 = 0x3FFD;
pub const P3_SYSTEM_PORT: u16 = 0x1FFD;
pub const P3_MOTOR_BIT: u8 = 0b0000_1000;

pub const PCW_FDC_STATUS_PORT: u16 = 0x00;
pub const PCW_FDC_DATA_PORT: u16 = 0x01;
pub const PCW_SYSTEM_PORT: u16 = 0xF8;
pub const PCW_SYS_FDC_TC_ON: u8 = 5;
pub const PCW_SYS_FDC_TC_OFF: u8 = 6;
pub const PCW_SYS_MOTOR_ON: u8 = 9;
pub const PCW_SYS_MOTOR_OFF: u8 = 10;

#[derive(Copy, Clone, Debug, PartialEq, Eq, strum_macros::Display)]
pub enum DirectMachine {
    AmstradCpc,
    Spectrum3,
    Pcw,
}

impl DirectMachine {
    fn status_port(&self) -> u16 {
        match self {
            DirectMachine::AmstradCpc => CPC_FDC_STATUS_PORT,
            DirectMachine::Spectrum3 => P3_FDC_STATUS_PORT,
            DirectMachine::Pcw => PCW_FDC_STATUS_PORT,
        }
    }

    fn data_port(&self) -> u16 {
        match self {
            DirectMachine::AmstradCpc => CPC_FDC_DATA_PORT,
            DirectMachine::Spectrum3 => P3_FDC_DATA_PORT,
            DirectMachine::Pcw => PCW_FDC_DATA_PORT,
        }
    }

    fn control_port(&self) -> u16 {
        match self {
            DirectMachine::AmstradCpc => CPC_FDC_MOTOR_PORT,
            DirectMachine::Spectrum3 => P3_SYSTEM_PORT,
            DirectMachine::Pcw => PCW_SYSTEM_PORT,
        }
    }
}

pub struct DirectFdc<I: FdcInterface = NullInterface> {
    fdc: Upd765<I>,
    machine: DirectMachine,
    motor: bool,
}

impl DirectFdc<NullInterface> {
    /// Create an adapter with INT and DRQ left unconnected.
    pub fn new(machine: DirectMachine, variant: FdcVariant) -> Self {
        DirectFdc::with_interface(machine, variant, NullInterface)
    }
}

impl<I: FdcInterface> DirectFdc<I> {
    pub fn with_interface(machine: DirectMachine, variant: FdcVariant, interface: I) -> Self {
        Self {
            fdc: Upd765::new(variant, interface),
            machine,
            motor: false,
        }
    }

    #[inline]
    pub fn machine(&self) -> DirectMachine {
        self.machine
    }

    pub fn fdc(&self) -> &Upd765<I> {
        &self.fdc
    }

    pub fn fdc_mut(&mut self) -> &mut Upd765<I> {
        &mut self.fdc
    }

    #[inline]
    pub fn motor(&self) -> bool {
        self.motor
    }

    /// All drives share a single motor line on these machines.
    pub fn set_motor(&mut self, on: bool) {
        if self.motor != on {
            log::trace!("{}: drive motor {}", self.machine, if on { "on" } else { "off" });
        }
        self.motor = on;
        for drive in 0..FDC_MAX_DRIVES {
            self.fdc.set_motor_state(drive, on);
        }
    }

    pub fn run(&mut self, us: f64) {
        self.fdc.run(us);
    }

    fn read_data(&mut self) -> u8 {
        match self.fdc.phase() {
            ControllerPhase::Execution => self.fdc.dack_r(),
            _ => self.fdc.data_r(),
        }
    }

    fn write_data(&mut self, data: u8) {
        match self.fdc.phase() {
            ControllerPhase::Execution => self.fdc.dack_w(data),
            _ => self.fdc.data_w(data),
        }
    }

    fn write_control(&mut self, data: u8) {
        match self.machine {
            DirectMachine::AmstradCpc => self.set_motor(data & CPC_MOTOR_BIT != 0),
            // The remaining bits of 0x1FFD select memory paging and the printer strobe.
            DirectMachine::Spectrum3 => self.set_motor(data & P3_MOTOR_BIT != 0),
            DirectMachine::Pcw => match data {
                PCW_SYS_FDC_TC_ON => self.fdc.set_tc_state(true),
                PCW_SYS_FDC_TC_OFF => self.fdc.set_tc_state(false),
                PCW_SYS_MOTOR_ON => self.set_motor(true),
                PCW_SYS_MOTOR_OFF => self.set_motor(false),
                _ => log::trace!("PCW: system control command {} not handled by FDC", data),
            },
        }
    }
}

impl<I: FdcInterface> IoDevice for DirectFdc<I> {
    fn read_u8(&mut self, port: u16) -> u8 {
        if port == self.machine.status_port() {
            self.fdc.status_r()
        }
        else if port == self.machine.data_port() {
            self.read_data()
        }
        else {
            log::warn!("{}: Read from unmapped FDC port {:04X}", self.machine, port);
            NO_IO_BYTE
        }
    }

    fn write_u8(&mut self, port: u16, data: u8) {
        if port == self.machine.data_port() {
            self.write_data(data);
        }
        else if port == self.machine.control_port() {
            self.write_control(data);
        }
        else if port == self.machine.status_port() {
            log::warn!("{}: Write to Read-only status register: {:02X}", self.machine, data);
        }
        else {
            log::warn!("{}: Write to unmapped FDC port {:04X}: {:02X}", self.machine, port, data);
        }
    }

    fn port_list(&self) -> Vec<(String, u16)> {
        vec![
            (String::from("FDC Status Register"), self.machine.status_port()),
            (String::from("FDC Data Register"), self.machine.data_port()),
            (String::from("FDC Motor/System Control"), self.machine.control_port()),
        ]
    }
}
