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

    device_types::geometry.rs

    Floppy drive geometry.
*/

//! Define a [DriveGeometry] that represents the track, head, and sector layout of a floppy
//! drive and the media it accepts.

use crate::device_types::chs::DiskChsn;
use std::fmt::Display;

/// A structure representing how sectors are laid out on a standard-format disk
///  - Tracks per side (tracks)
///  - Heads (heads)
///  - Sectors per track (sectors_per_track)
///  - Sector size in bytes (sector_size)
///
/// Sector ids on a standard-format track start at 1.
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq)]
pub struct DriveGeometry {
    pub(crate) tracks: u8,
    pub(crate) heads: u8,
    pub(crate) sectors_per_track: u8,
    pub(crate) sector_size: usize,
}

impl Default for DriveGeometry {
    fn default() -> Self {
        Self {
            tracks: 40,
            heads: 1,
            sectors_per_track: 9,
            sector_size: 512,
        }
    }
}

impl Display for DriveGeometry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[t:{:2} h:{} s:{:2} size:{}]",
            self.tracks, self.heads, self.sectors_per_track, self.sector_size
        )
    }
}

impl DriveGeometry {
    /// Create a new [DriveGeometry]. Head count is clamped to 1 or 2.
    pub fn new(tracks: u8, heads: u8, sectors_per_track: u8, sector_size: usize) -> Self {
        Self {
            tracks,
            heads: heads.clamp(1, 2),
            sectors_per_track,
            sector_size,
        }
    }
    pub fn get(&self) -> (u8, u8, u8, usize) {
        (self.tracks, self.heads, self.sectors_per_track, self.sector_size)
    }
    #[inline]
    pub fn tracks(&self) -> u8 {
        self.tracks
    }
    #[inline]
    pub fn heads(&self) -> u8 {
        self.heads
    }
    #[inline]
    pub fn sectors_per_track(&self) -> u8 {
        self.sectors_per_track
    }
    #[inline]
    pub fn sector_size(&self) -> usize {
        self.sector_size
    }
    #[inline]
    pub fn is_double_sided(&self) -> bool {
        self.heads > 1
    }
    /// Return the size code (N) for this geometry's sector size.
    #[inline]
    pub fn size_code(&self) -> u8 {
        DiskChsn::bytes_to_n(self.sector_size)
    }
    /// Return the number of sectors represented by a [DriveGeometry].
    pub fn total_sectors(&self) -> usize {
        (self.tracks as usize) * (self.heads as usize) * (self.sectors_per_track as usize)
    }
    /// Return the size in bytes of a raw sector dump of a disk with this geometry.
    pub fn raw_size(&self) -> usize {
        self.total_sectors() * self.sector_size
    }
    /// Return a boolean indicating whether the physical track and head lie within this geometry.
    pub fn contains(&self, track: u8, head: u8) -> bool {
        track < self.tracks && head < self.heads
    }
    /// Clamp a track number to the range of this geometry.
    pub fn clamp_track(&self, track: u8) -> u8 {
        track.min(self.tracks.saturating_sub(1))
    }
}
