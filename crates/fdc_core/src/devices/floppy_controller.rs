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

    devices::floppy_controller.rs

    Construction of the configured floppy controller.
*/

//! [FloppyController] builds the host adapter named by the `type` field of a
//! [FloppyControllerConfig] and presents it to a machine's I/O dispatcher as one device.

use crate::{
    bus::IoDevice,
    device_types::fdc::FdcType,
    devices::{
        fdc::{DirectFdc, DirectMachine, NullInterface, PcFdc},
        thmfc1::Thmfc1,
    },
    machine_config::FloppyControllerConfig,
};

pub enum FloppyController {
    Pc(PcFdc<NullInterface>),
    Direct(DirectFdc),
    Thmfc1(Thmfc1),
}

impl FloppyController {
    pub fn from_config(config: &FloppyControllerConfig) -> Self {
        log::debug!("Creating {} floppy controller ({})", config.fdc_type, config.variant);
        match config.fdc_type {
            FdcType::Pc => {
                let mut pc = PcFdc::new(config.variant, NullInterface);
                pc.fdc_mut().configure(config);
                FloppyController::Pc(pc)
            }
            FdcType::AmstradCpc => Self::direct(DirectMachine::AmstradCpc, config),
            FdcType::Spectrum3 => Self::direct(DirectMachine::Spectrum3, config),
            FdcType::Pcw => Self::direct(DirectMachine::Pcw, config),
            FdcType::Thmfc1 => {
                let mut thmfc1 = Thmfc1::default();
                for (i, drive_config) in config.drive.iter().enumerate() {
                    match thmfc1.drive_mut(i) {
                        Some(drive) => drive.apply_config(drive_config),
                        None => log::warn!("THMFC1: ignoring configuration for drive {}", i),
                    }
                }
                FloppyController::Thmfc1(thmfc1)
            }
        }
    }

    fn direct(machine: DirectMachine, config: &FloppyControllerConfig) -> Self {
        let mut direct = DirectFdc::new(machine, config.variant);
        direct.fdc_mut().configure(config);
        FloppyController::Direct(direct)
    }

    pub fn fdc_type(&self) -> FdcType {
        match self {
            FloppyController::Pc(_) => FdcType::Pc,
            FloppyController::Direct(direct) => match direct.machine() {
                DirectMachine::AmstradCpc => FdcType::AmstradCpc,
                DirectMachine::Spectrum3 => FdcType::Spectrum3,
                DirectMachine::Pcw => FdcType::Pcw,
            },
            FloppyController::Thmfc1(_) => FdcType::Thmfc1,
        }
    }

    /// Run the controller for `us` microseconds. The THMFC1 completes its operations on
    /// register access and has no timed work.
    pub fn run(&mut self, us: f64) {
        match self {
            FloppyController::Pc(pc) => pc.run(us),
            FloppyController::Direct(direct) => direct.run(us),
            FloppyController::Thmfc1(_) => {}
        }
    }
}

impl IoDevice for FloppyController {
    fn read_u8(&mut self, port: u16) -> u8 {
        match self {
            FloppyController::Pc(pc) => pc.read_u8(port),
            FloppyController::Direct(direct) => direct.read_u8(port),
            FloppyController::Thmfc1(thmfc1) => thmfc1.read_u8(port),
        }
    }

    fn write_u8(&mut self, port: u16, data: u8) {
        match self {
            FloppyController::Pc(pc) => pc.write_u8(port, data),
            FloppyController::Direct(direct) => direct.write_u8(port, data),
            FloppyController::Thmfc1(thmfc1) => thmfc1.write_u8(port, data),
        }
    }

    fn port_list(&self) -> Vec<(String, u16)> {
        match self {
            FloppyController::Pc(pc) => pc.port_list(),
            FloppyController::Direct(direct) => direct.port_list(),
            FloppyController::Thmfc1(thmfc1) => thmfc1.port_list(),
        }
    }
}
