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

    lib.rs

    NEC µPD765 floppy disk controller emulation core
*/

//! A register-level emulation of the NEC µPD765 floppy disk controller, with the drive and
//! medium model it operates on and the host adapters that place it on a machine's I/O bus:
//!
//! - [devices::fdc::Upd765], the controller core.
//! - [devices::fdc::PcFdc], the IBM PC adapter with its Digital Output Register.
//! - [devices::fdc::DirectFdc], the direct-wired Amstrad CPC, ZX Spectrum +3 and PCW hookups.
//! - [devices::thmfc1::Thmfc1], the Thomson THMFC1, which shares the drive model and status
//!   synthesis but not the command set.
//!
//! The host supplies media as [device_types::medium::FloppyMedium] sector stores and receives
//! INT and DRQ through an [devices::fdc::FdcInterface].

pub mod bus;
pub mod device_types;
pub mod devices;
pub mod machine_config;
