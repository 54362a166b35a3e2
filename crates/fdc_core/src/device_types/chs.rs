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

    device_types::chs.rs

    Sector ID (C/H/R/N) addressing as used by the µPD765 family.
*/

//! Define a [DiskChsn] that represents the four-byte ID field recorded in front of every
//! sector on a floppy track:
//!  - Cylinder (c)
//!  - Head (h)
//!  - Record, or sector id (r)
//!  - Size code (n), where the size in bytes is 128 << n
//!
//! The ID field is what the controller compares against; it usually, but not always, agrees
//! with the physical track and head the sector is recorded on.

use std::fmt::Display;

#[derive(Copy, Clone, Debug, Default, Hash, Eq, PartialEq)]
pub struct DiskChsn {
    pub(crate) c: u8,
    pub(crate) h: u8,
    pub(crate) r: u8,
    pub(crate) n: u8,
}

impl From<(u8, u8, u8, u8)> for DiskChsn {
    fn from((c, h, r, n): (u8, u8, u8, u8)) -> Self {
        Self { c, h, r, n }
    }
}

impl From<DiskChsn> for [u8; 4] {
    fn from(chsn: DiskChsn) -> Self {
        [chsn.c, chsn.h, chsn.r, chsn.n]
    }
}

impl Display for DiskChsn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[c:{:2} h:{} r:{:3} n:{}]", self.c, self.h, self.r, self.n)
    }
}

impl DiskChsn {
    /// Create a new `DiskChsn` structure from cylinder, head, sector id and size code components.
    pub fn new(c: u8, h: u8, r: u8, n: u8) -> Self {
        Self { c, h, r, n }
    }
    /// Build a `DiskChsn` from a four byte format buffer entry, as supplied during Format Track.
    pub fn from_bytes(bytes: &[u8; 4]) -> Self {
        Self::new(bytes[0], bytes[1], bytes[2], bytes[3])
    }
    /// Return the cylinder, head, sector id and size code components in a tuple.
    #[inline]
    pub fn get(&self) -> (u8, u8, u8, u8) {
        (self.c, self.h, self.r, self.n)
    }
    /// Return the cylinder (c) field.
    #[inline]
    pub fn c(&self) -> u8 {
        self.c
    }
    /// Return the head (h) field.
    #[inline]
    pub fn h(&self) -> u8 {
        self.h
    }
    /// Return the sector id (r) field.
    #[inline]
    pub fn r(&self) -> u8 {
        self.r
    }
    /// Return the size code (n) field.
    #[inline]
    pub fn n(&self) -> u8 {
        self.n
    }
    #[inline]
    pub fn set_r(&mut self, r: u8) {
        self.r = r;
    }

    /// Convert a size code into a sector size in bytes.
    pub fn n_to_bytes(n: u8) -> usize {
        match n {
            0x00 => 128,
            0x01 => 256,
            0x02 => 512,
            0x03 => 1024,
            0x04 => 2048,
            0x05 => 4096,
            0x06 => 8192,
            0x07 => 16384,
            _ => 32768,
        }
    }

    /// Convert a sector size in bytes into the smallest size code that holds it.
    pub fn bytes_to_n(size: usize) -> u8 {
        let mut n = 0;
        while n < 8 && DiskChsn::n_to_bytes(n) < size {
            n += 1;
        }
        n
    }

    /// Return the size in bytes described by this id's size code.
    #[inline]
    pub fn n_size(&self) -> usize {
        DiskChsn::n_to_bytes(self.n)
    }

    /// Return the id the controller reports after finishing a transfer whose last sector was
    /// this one, given the EOT parameter and the multi-track flag of the command.
    ///
    /// Not at EOT: R+1. At EOT without MT: C+1, R=1. At EOT with MT on head 0: H=1, R=1.
    /// At EOT with MT on head 1: C+1, H=0, R=1.
    pub fn next_result_id(&self, eot: u8, multi_track: bool) -> DiskChsn {
        if self.r != eot {
            return DiskChsn::new(self.c, self.h, self.r.wrapping_add(1), self.n);
        }

        if multi_track && self.h & 0x01 == 0 {
            DiskChsn::new(self.c, self.h | 0x01, 1, self.n)
        }
        else if multi_track {
            DiskChsn::new(self.c.wrapping_add(1), self.h & !0x01, 1, self.n)
        }
        else {
            DiskChsn::new(self.c.wrapping_add(1), self.h, 1, self.n)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_codes_match_sector_sizes() {
        assert_eq!(DiskChsn::n_to_bytes(0), 128);
        assert_eq!(DiskChsn::n_to_bytes(2), 512);
        assert_eq!(DiskChsn::n_to_bytes(0x20), 32768);
        assert_eq!(DiskChsn::bytes_to_n(256), 1);
        assert_eq!(DiskChsn::bytes_to_n(512), 2);
        assert_eq!(DiskChsn::bytes_to_n(300), 2);
    }

    #[test]
    fn result_id_follows_eot_table() {
        let mid = DiskChsn::new(4, 0, 3, 2);
        assert_eq!(mid.next_result_id(9, false), DiskChsn::new(4, 0, 4, 2));

        let at_eot = DiskChsn::new(4, 0, 9, 2);
        assert_eq!(at_eot.next_result_id(9, false), DiskChsn::new(5, 0, 1, 2));
        assert_eq!(at_eot.next_result_id(9, true), DiskChsn::new(4, 1, 1, 2));

        let at_eot_side1 = DiskChsn::new(4, 1, 9, 2);
        assert_eq!(at_eot_side1.next_result_id(9, true), DiskChsn::new(5, 0, 1, 2));
    }
}
