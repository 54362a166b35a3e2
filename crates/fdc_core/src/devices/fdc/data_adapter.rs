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

    devices::fdc::data_adapter.rs

    Execution phase byte channel.
*/

//! The DataAdapter abstracts away the differences between DMA and non-DMA (PIO) transfers. It
//! holds the sector (or format ID field) currently being transferred and a cursor into it. The
//! controller fills it with a sector to be read out, or sizes it for a sector to be written in,
//! and the transfer proceeds one byte per `dack` or data register access.

use crate::devices::fdc::controller::DataMode;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum TransferState {
    #[default]
    Idle,
    Reading,
    Writing,
}

#[derive(Clone, Debug, Default)]
pub struct DataAdapter {
    pub data_mode: DataMode,
    pub state: TransferState,
    pub data: Vec<u8>,
    pub data_cursor: usize,
}

impl DataAdapter {
    pub fn mode(&self) -> DataMode {
        self.data_mode
    }
    pub fn set_mode(&mut self, mode: DataMode) {
        self.data_mode = mode;
    }

    pub fn state(&self) -> TransferState {
        self.state
    }

    pub fn set_data(&mut self, data: Vec<u8>) {
        self.data = data;
        self.data_cursor = 0;
    }

    /// Load a buffer to be read out by the host.
    pub fn begin_read(&mut self, data: Vec<u8>) {
        self.set_data(data);
        self.state = TransferState::Reading;
    }

    /// Prepare a zeroed buffer of `len` bytes to be written in by the host.
    pub fn begin_write(&mut self, len: usize) {
        self.set_data(vec![0; len]);
        self.state = TransferState::Writing;
    }

    /// Return the next byte of a read transfer, or None if the buffer is exhausted.
    pub fn read_byte(&mut self) -> Option<u8> {
        let byte = self.data.get(self.data_cursor).copied()?;
        self.data_cursor += 1;
        Some(byte)
    }

    /// Store the next byte of a write transfer. Returns false if the buffer is already full.
    pub fn write_byte(&mut self, byte: u8) -> bool {
        match self.data.get_mut(self.data_cursor) {
            Some(slot) => {
                *slot = byte;
                self.data_cursor += 1;
                true
            }
            None => false,
        }
    }

    /// True once every byte of the buffer has been transferred.
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.data_cursor >= self.data.len()
    }

    /// True if no bytes of the buffer have been transferred yet.
    #[inline]
    pub fn is_untouched(&self) -> bool {
        self.data_cursor == 0
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.data_cursor)
    }

    #[inline]
    pub fn cursor(&self) -> usize {
        self.data_cursor
    }

    /// Take the buffer, leaving the adapter idle.
    pub fn take_data(&mut self) -> Vec<u8> {
        self.state = TransferState::Idle;
        self.data_cursor = 0;
        std::mem::take(&mut self.data)
    }

    pub fn reset(&mut self) {
        self.state = TransferState::Idle;
        self.data.clear();
        self.data_cursor = 0;
    }
}
