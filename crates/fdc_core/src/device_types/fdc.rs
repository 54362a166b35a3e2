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

    device_types::fdc.rs

    Defines types common to implementations of a Floppy Disk Controller
*/

use crate::device_types::geometry::DriveGeometry;
use lazy_static::lazy_static;
use serde_derive::Deserialize;
use std::collections::HashMap;
use strum_macros::{Display, EnumIter, EnumString};

/// The controller chip variant. The variants share a command set; the variant is recorded for
/// debug display and for machines that want to report it.
#[derive(Copy, Clone, Debug, Default, Deserialize, Display, EnumIter, EnumString, Eq, PartialEq, Hash)]
#[strum(ascii_case_insensitive)]
pub enum FdcVariant {
    #[default]
    Nec765A,
    Nec765B,
    Smc37c78,
}

/// The host adapter a controller is wired behind.
#[derive(Copy, Clone, Debug, Deserialize, Display, EnumString, Eq, PartialEq, Hash)]
#[strum(ascii_case_insensitive)]
pub enum FdcType {
    Pc,
    AmstradCpc,
    Spectrum3,
    Pcw,
    Thmfc1,
}

/// Standard drive shapes a machine can request at init time.
#[derive(Copy, Clone, Debug, Default, Deserialize, Display, EnumIter, EnumString, Eq, PartialEq, Hash)]
#[strum(ascii_case_insensitive)]
pub enum StandardGeometry {
    /// 40 tracks, one side, 9 x 512 byte sectors (Amstrad CPC data format, Spectrum +3).
    #[default]
    SingleSided40,
    /// 40 tracks, two sides, 9 x 512 byte sectors (PC 360K).
    DoubleSided40,
    /// 80 tracks, one side, 9 x 512 byte sectors (PCW 8512 second drive).
    SingleSided80,
    /// 80 tracks, two sides, 9 x 512 byte sectors (PC 720K).
    DoubleSided80,
    /// 40 tracks, one side, 16 x 128 byte single-density sectors (Thomson 5.25" SD).
    Thomson40Sd,
    /// 80 tracks, one side, 16 x 256 byte double-density sectors (Thomson 3.5" DD).
    Thomson80,
}

impl StandardGeometry {
    pub fn geometry(&self) -> DriveGeometry {
        // Every variant has an entry in the table.
        STANDARD_GEOMETRIES.get(self).copied().unwrap_or_default()
    }
}

impl From<StandardGeometry> for DriveGeometry {
    fn from(value: StandardGeometry) -> Self {
        value.geometry()
    }
}

lazy_static! {
    /// Define the track, head and sector layout for each standard geometry.
    pub static ref STANDARD_GEOMETRIES: HashMap<StandardGeometry, DriveGeometry> = {
        HashMap::from([
            (StandardGeometry::SingleSided40, DriveGeometry::new(40, 1, 9, 512)),
            (StandardGeometry::DoubleSided40, DriveGeometry::new(40, 2, 9, 512)),
            (StandardGeometry::SingleSided80, DriveGeometry::new(80, 1, 9, 512)),
            (StandardGeometry::DoubleSided80, DriveGeometry::new(80, 2, 9, 512)),
            (StandardGeometry::Thomson40Sd, DriveGeometry::new(40, 1, 16, 128)),
            (StandardGeometry::Thomson80, DriveGeometry::new(80, 1, 16, 256)),
        ])
    };
}
