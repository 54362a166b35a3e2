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

    device_types::medium.rs

    A sector-addressable floppy medium.
*/

//! A [FloppyMedium] is the data recorded on an inserted disk. It stores the sectors of each
//! physical track in recorded order, keyed by (track, head). Each sector keeps its own ID field,
//! so media with non-sequential, duplicated or mislabelled sector ids can be represented.
//!
//! Loading container formats is left to the host. [FloppyMedium::from_raw] accepts headerless
//! sector dumps, which is all the controller core needs for testing and for plain images.

use crate::device_types::{chs::DiskChsn, geometry::DriveGeometry};
use anyhow::{anyhow, Error};
use fdc_common::FdcHashMap;

/// A single sector: its ID field, its data field and the kind of data address mark in front of it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Sector {
    pub(crate) id: DiskChsn,
    pub(crate) data: Vec<u8>,
    pub(crate) deleted: bool,
}

impl Sector {
    pub fn new(id: DiskChsn, data: Vec<u8>, deleted: bool) -> Self {
        Self { id, data, deleted }
    }
    #[inline]
    pub fn id(&self) -> DiskChsn {
        self.id
    }
    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.data
    }
    /// True if the sector was recorded with a deleted data address mark.
    #[inline]
    pub fn is_deleted(&self) -> bool {
        self.deleted
    }
}

/// The outcome of searching a track for a sector ID.
#[derive(Debug)]
pub enum SectorMatch<'a> {
    /// A sector with a matching cylinder, head and record field.
    Found(&'a Sector),
    /// A sector with matching head and record fields but a different cylinder field.
    WrongCylinder(&'a Sector),
    NotFound,
}

#[derive(Clone, Debug)]
pub struct FloppyMedium {
    geometry: DriveGeometry,
    tracks: FdcHashMap<(u8, u8), Vec<Sector>>,
    write_protected: bool,
    write_ct: u64,
}

impl FloppyMedium {
    /// Create an unformatted medium. Every track is empty until formatted or written with
    /// [FloppyMedium::set_track].
    pub fn new(geometry: DriveGeometry) -> Self {
        Self {
            geometry,
            tracks: FdcHashMap::default(),
            write_protected: false,
            write_ct: 0,
        }
    }

    /// Create a medium with every track formatted to the standard layout for the geometry:
    /// sector ids 1..=sectors_per_track, each filled with `filler`.
    pub fn formatted(geometry: DriveGeometry, filler: u8) -> Self {
        let mut medium = FloppyMedium::new(geometry);
        let n = geometry.size_code();
        for track in 0..geometry.tracks() {
            for head in 0..geometry.heads() {
                let sectors = (1..=geometry.sectors_per_track())
                    .map(|r| Sector::new(DiskChsn::new(track, head, r, n), vec![filler; geometry.sector_size()], false))
                    .collect();
                medium.tracks.insert((track, head), sectors);
            }
        }
        medium
    }

    /// Build a medium from a raw sector dump ordered by track, then head, then sector id.
    pub fn from_raw(data: &[u8], geometry: DriveGeometry) -> Result<Self, Error> {
        if data.len() != geometry.raw_size() {
            return Err(anyhow!(
                "Raw image size {} does not match geometry {} ({} bytes)",
                data.len(),
                geometry,
                geometry.raw_size()
            ));
        }

        let mut medium = FloppyMedium::new(geometry);
        let n = geometry.size_code();
        let mut chunks = data.chunks_exact(geometry.sector_size());
        for track in 0..geometry.tracks() {
            for head in 0..geometry.heads() {
                let mut sectors = Vec::with_capacity(geometry.sectors_per_track() as usize);
                for r in 1..=geometry.sectors_per_track() {
                    let chunk = chunks
                        .next()
                        .ok_or_else(|| anyhow!("Raw image ended early at track {} head {}", track, head))?;
                    sectors.push(Sector::new(DiskChsn::new(track, head, r, n), chunk.to_vec(), false));
                }
                medium.tracks.insert((track, head), sectors);
            }
        }

        log::debug!("Loaded raw floppy image, geometry: {}", geometry);
        Ok(medium)
    }

    /// Produce a raw sector dump in the same order [FloppyMedium::from_raw] reads. Sectors that
    /// are missing from the standard layout are emitted as zeros.
    pub fn to_raw(&self) -> Vec<u8> {
        let size = self.geometry.sector_size();
        let mut raw = Vec::with_capacity(self.geometry.raw_size());
        for track in 0..self.geometry.tracks() {
            for head in 0..self.geometry.heads() {
                for r in 1..=self.geometry.sectors_per_track() {
                    match self.read_sector(track, head, r) {
                        Some(sector) => {
                            let mut data = sector.data().to_vec();
                            data.resize(size, 0);
                            raw.extend_from_slice(&data);
                        }
                        None => raw.extend(std::iter::repeat(0).take(size)),
                    }
                }
            }
        }
        raw
    }

    #[inline]
    pub fn geometry(&self) -> DriveGeometry {
        self.geometry
    }

    #[inline]
    pub fn is_write_protected(&self) -> bool {
        self.write_protected
    }

    pub fn set_write_protected(&mut self, write_protected: bool) {
        self.write_protected = write_protected;
    }

    /// Return the number of write operations performed on this medium.
    /// A host can compare this with a previous value to know when to flush the image.
    #[inline]
    pub fn write_ct(&self) -> u64 {
        self.write_ct
    }

    /// Return the sectors on the specified physical track, in recorded order. Tracks outside the
    /// medium's geometry are always empty.
    pub fn track(&self, track: u8, head: u8) -> &[Sector] {
        if !self.geometry.contains(track, head) {
            return &[];
        }
        self.tracks.get(&(track, head)).map_or(&[], |sectors| sectors.as_slice())
    }

    /// Return the ID fields of the sectors on the specified physical track, in recorded order.
    pub fn track_ids(&self, track: u8, head: u8) -> Vec<DiskChsn> {
        self.track(track, head).iter().map(|s| s.id).collect()
    }

    /// Replace the contents of a physical track. Returns false if the track lies outside the
    /// medium's geometry.
    pub fn set_track(&mut self, track: u8, head: u8, sectors: Vec<Sector>) -> bool {
        if !self.geometry.contains(track, head) {
            return false;
        }
        self.tracks.insert((track, head), sectors);
        self.write_ct += 1;
        true
    }

    /// Search a physical track for a sector whose ID field matches `id` in its cylinder, head and
    /// record fields.
    pub fn find_sector(&self, track: u8, head: u8, id: &DiskChsn) -> SectorMatch {
        let mut wrong_cylinder = None;
        for sector in self.track(track, head) {
            if sector.id.r != id.r || sector.id.h != id.h {
                continue;
            }
            if sector.id.c == id.c {
                return SectorMatch::Found(sector);
            }
            wrong_cylinder.get_or_insert(sector);
        }
        match wrong_cylinder {
            Some(sector) => SectorMatch::WrongCylinder(sector),
            None => SectorMatch::NotFound,
        }
    }

    /// Return the first sector on the physical track with the given record (sector id) field.
    pub fn read_sector(&self, track: u8, head: u8, r: u8) -> Option<&Sector> {
        self.track(track, head).iter().find(|s| s.id.r == r)
    }

    /// Overwrite the data field of the first sector on the physical track whose ID field matches
    /// `id` in its cylinder, head and record fields, the same match [FloppyMedium::find_sector]
    /// makes. The data address mark is rewritten as normal or deleted. Returns false if no such
    /// sector exists.
    pub fn write_sector(&mut self, track: u8, head: u8, id: &DiskChsn, data: &[u8], deleted: bool) -> bool {
        if !self.geometry.contains(track, head) {
            return false;
        }
        let Some(sector) = self.tracks.get_mut(&(track, head)).and_then(|sectors| {
            sectors
                .iter_mut()
                .find(|s| s.id.c == id.c && s.id.h == id.h && s.id.r == id.r)
        })
        else {
            return false;
        };

        sector.data.clear();
        sector.data.extend_from_slice(data);
        sector.deleted = deleted;
        self.write_ct += 1;
        true
    }

    /// Lay down a new track: one sector per ID field in `ids`, each sized by its own size code and
    /// filled with `filler`. Returns false if the track lies outside the medium's geometry.
    pub fn format_track(&mut self, track: u8, head: u8, ids: &[DiskChsn], filler: u8) -> bool {
        let sectors = ids
            .iter()
            .map(|id| Sector::new(*id, vec![filler; id.n_size()], false))
            .collect();
        self.set_track(track, head, sectors)
    }
}
