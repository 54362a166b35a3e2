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

    devices::floppy_drive.rs

    Implements a floppy drive
*/

//! A [FloppyDiskDrive] models one physical drive unit attached to a controller: its geometry,
//! the motor, ready, write-protect and track 0 lines, the current head position, and the
//! inserted [FloppyMedium], if any.

use crate::{
    device_types::{
        chs::DiskChsn,
        geometry::DriveGeometry,
        medium::{FloppyMedium, Sector, SectorMatch},
    },
    machine_config::FloppyDriveConfig,
};
use thiserror::Error;

/// The maximum number of step pulses a Recalibrate issues before giving up on track 0.
pub const RECALIBRATE_MAX_STEPS: u8 = 77;

#[derive(Copy, Clone, Debug, Error, PartialEq, Eq)]
pub enum DriveError {
    #[error("Requested sector was not found")]
    NoData,
    #[error("Medium is write protected")]
    NotWriteable,
    #[error("No medium in drive")]
    NoMedia,
}

#[derive(Clone, Debug, Default)]
pub struct FloppyDiskDrive {
    unit_id: usize,
    geometry: Option<DriveGeometry>,
    medium: Option<FloppyMedium>,

    pub(crate) motor_on: bool,
    pub(crate) ready: bool,
    ready_forced: Option<bool>,
    /// READY held high by the host, overriding the motor and medium.
    ready_held: bool,
    pub(crate) write_protected: bool,
    pub(crate) track_zero: bool,
    pub(crate) current_track: u8,
    pub(crate) current_head: u8,
    pub(crate) positioning: bool,
    pub(crate) fault: bool,
}

impl FloppyDiskDrive {
    pub fn new(unit_id: usize) -> Self {
        Self {
            unit_id,
            track_zero: true,
            ..Default::default()
        }
    }

    /// Reset the drive's transient state. Geometry, medium, motor and any forced ready state
    /// are preserved.
    pub fn reset(&mut self) {
        self.positioning = false;
        self.fault = false;
        self.update_ready();
    }

    /// Apply a drive entry from a controller configuration.
    pub fn apply_config(&mut self, config: &FloppyDriveConfig) {
        self.set_geometry(config.drive_type.geometry());
        self.set_write_protect(config.write_protect.unwrap_or(false));
        if config.always_ready.unwrap_or(false) {
            self.set_ready_state(true, true);
        }
    }

    #[inline]
    pub fn unit_id(&self) -> usize {
        self.unit_id
    }

    #[inline]
    pub fn geometry(&self) -> Option<DriveGeometry> {
        self.geometry
    }

    pub fn set_geometry(&mut self, geometry: DriveGeometry) {
        log::debug!("Drive {}: geometry set to {}", self.unit_id, geometry);
        self.geometry = Some(geometry);
        self.current_track = geometry.clamp_track(self.current_track);
        self.track_zero = self.current_track == 0;
    }

    #[inline]
    pub fn disk_present(&self) -> bool {
        self.medium.is_some()
    }

    #[inline]
    pub fn medium(&self) -> Option<&FloppyMedium> {
        self.medium.as_ref()
    }

    /// Insert a medium into the drive. A drive without configured geometry adopts the medium's.
    pub fn insert_medium(&mut self, medium: FloppyMedium) {
        if self.geometry.is_none() {
            self.set_geometry(medium.geometry());
        }
        log::debug!("Drive {}: inserted medium, geometry: {}", self.unit_id, medium.geometry());
        self.medium = Some(medium);
        self.update_ready();
    }

    /// Remove and return the medium in the drive.
    pub fn eject_medium(&mut self) -> Option<FloppyMedium> {
        let medium = self.medium.take();
        if medium.is_some() {
            log::debug!("Drive {}: medium ejected", self.unit_id);
        }
        self.update_ready();
        medium
    }

    /// Turn the spindle motor on or off. With no forced ready state, the drive becomes ready
    /// when the motor is on and a medium is present.
    pub fn set_motor_state(&mut self, on: bool) {
        if self.motor_on != on {
            log::trace!("Drive {}: motor {}", self.unit_id, if on { "on" } else { "off" });
        }
        self.motor_on = on;
        self.update_ready();
    }

    /// Set the READY line.
    ///
    /// With `force` set, the line is pinned to `ready` regardless of motor and medium until the
    /// next non-forced call. Without it, any forced state is released and the line follows
    /// `ready` only while the motor is on and a medium is present.
    pub fn set_ready_state(&mut self, ready: bool, force: bool) {
        if force {
            self.ready_forced = Some(ready);
            self.ready = ready || self.ready_held;
        }
        else {
            self.ready_forced = None;
            self.ready = (ready && self.motor_on && self.medium.is_some()) || self.ready_held;
        }
    }

    /// Hold the READY line high regardless of motor and medium, or release it.
    pub(crate) fn set_ready_held(&mut self, held: bool) {
        self.ready_held = held;
        self.update_ready();
    }

    #[inline]
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    fn update_ready(&mut self) {
        self.ready = self.ready_held
            || match self.ready_forced {
                Some(forced) => forced,
                None => self.motor_on && self.medium.is_some(),
            };
    }

    /// Return whether writes to this drive are refused, either by the drive's own switch or by
    /// the medium's write-protect tab.
    pub fn is_write_protected(&self) -> bool {
        self.write_protected || self.medium.as_ref().is_some_and(|m| m.is_write_protected())
    }

    pub fn set_write_protect(&mut self, write_protected: bool) {
        self.write_protected = write_protected;
    }

    #[inline]
    pub fn is_double_sided(&self) -> bool {
        self.geometry.is_some_and(|g| g.is_double_sided())
    }

    pub fn select_head(&mut self, head: u8) {
        self.current_head = head & 0x01;
    }

    /// Move the head to `target_track`, clamped to the drive's track range. Fails only when
    /// the drive has no geometry configured.
    #[allow(clippy::result_unit_err)]
    pub fn seek(&mut self, target_track: u8) -> Result<(), ()> {
        let Some(geometry) = self.geometry
        else {
            return Err(());
        };
        self.current_track = geometry.clamp_track(target_track);
        self.track_zero = self.current_track == 0;
        log::trace!("Drive {}: head now at track {}", self.unit_id, self.current_track);
        Ok(())
    }

    /// Step the head toward track 0 until the track 0 sensor activates or `max_steps` pulses
    /// have been issued. Returns true if track 0 was reached.
    pub fn recalibrate(&mut self, max_steps: u8) -> bool {
        if self.geometry.is_none() {
            return false;
        }
        let mut steps = 0;
        while !self.track_zero && steps < max_steps {
            self.current_track = self.current_track.saturating_sub(1);
            self.track_zero = self.current_track == 0;
            steps += 1;
        }
        log::trace!(
            "Drive {}: recalibrate issued {} steps, track 0: {}",
            self.unit_id,
            steps,
            self.track_zero
        );
        self.track_zero
    }

    fn medium_ref(&self) -> Result<&FloppyMedium, DriveError> {
        self.medium.as_ref().ok_or(DriveError::NoMedia)
    }

    /// Search the physical track for a sector ID.
    pub fn find_sector(&self, track: u8, head: u8, id: &DiskChsn) -> Result<SectorMatch, DriveError> {
        Ok(self.medium_ref()?.find_sector(track, head, id))
    }

    /// Return the sectors of a physical track in recorded order.
    pub fn track_sectors(&self, track: u8, head: u8) -> Result<&[Sector], DriveError> {
        Ok(self.medium_ref()?.track(track, head))
    }

    /// Read the sector with record field `sector_id` from a physical track.
    pub fn read_sector(&self, track: u8, head: u8, sector_id: u8) -> Result<&[u8], DriveError> {
        self.medium_ref()?
            .read_sector(track, head, sector_id)
            .map(|s| s.data())
            .ok_or(DriveError::NoData)
    }

    /// Write the data field of the sector with ID field `id` on a physical track.
    pub fn write_sector(
        &mut self,
        track: u8,
        head: u8,
        id: &DiskChsn,
        data: &[u8],
        deleted: bool,
    ) -> Result<(), DriveError> {
        if self.is_write_protected() {
            return Err(DriveError::NotWriteable);
        }
        let medium = self.medium.as_mut().ok_or(DriveError::NoMedia)?;
        match medium.write_sector(track, head, id, data, deleted) {
            true => Ok(()),
            false => Err(DriveError::NoData),
        }
    }

    /// Rewrite a physical track with the given sector IDs.
    pub fn format_track(&mut self, track: u8, head: u8, ids: &[DiskChsn], filler: u8) -> Result<(), DriveError> {
        if self.is_write_protected() {
            return Err(DriveError::NotWriteable);
        }
        let medium = self.medium.as_mut().ok_or(DriveError::NoMedia)?;
        match medium.format_track(track, head, ids, filler) {
            true => Ok(()),
            false => Err(DriveError::NoData),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drive_with_disk() -> FloppyDiskDrive {
        let mut drive = FloppyDiskDrive::new(0);
        drive.set_geometry(DriveGeometry::new(40, 1, 9, 512));
        drive.insert_medium(FloppyMedium::formatted(DriveGeometry::new(40, 1, 9, 512), 0xAA));
        drive
    }

    #[test]
    fn ready_follows_motor_and_medium() {
        let mut drive = drive_with_disk();
        assert!(!drive.is_ready(), "Motor is off");
        drive.set_motor_state(true);
        assert!(drive.is_ready());
        drive.eject_medium();
        assert!(!drive.is_ready(), "No medium");
        drive.set_motor_state(false);
        assert!(!drive.is_ready());
    }

    #[test]
    fn held_ready_overrides_motor_until_released() {
        let mut drive = drive_with_disk();
        drive.set_ready_held(true);
        assert!(drive.is_ready());
        drive.set_motor_state(true);
        drive.set_motor_state(false);
        assert!(drive.is_ready(), "Held through motor changes");
        drive.set_ready_held(false);
        assert!(!drive.is_ready(), "Motor is off");
    }

    #[test]
    fn forced_ready_overrides_motor() {
        let mut drive = FloppyDiskDrive::new(1);
        drive.set_ready_state(true, true);
        assert!(drive.is_ready());
        drive.set_motor_state(false);
        assert!(drive.is_ready(), "Forced ready persists across motor changes");

        // A conditional request without motor or medium leaves the line low.
        drive.set_ready_state(true, false);
        assert!(!drive.is_ready());
    }

    #[test]
    fn seek_clamps_and_tracks_zero() {
        let mut drive = drive_with_disk();
        assert!(drive.seek(20).is_ok());
        assert_eq!(drive.current_track, 20);
        assert!(!drive.track_zero);
        assert!(drive.seek(90).is_ok());
        assert_eq!(drive.current_track, 39);
        assert!(drive.seek(0).is_ok());
        assert!(drive.track_zero);

        assert!(FloppyDiskDrive::new(2).seek(3).is_err(), "No geometry configured");
    }

    #[test]
    fn recalibrate_gives_up_after_max_steps() {
        let mut drive = FloppyDiskDrive::new(0);
        drive.set_geometry(DriveGeometry::new(80, 2, 9, 512));
        drive.seek(79).unwrap();
        assert!(!drive.recalibrate(RECALIBRATE_MAX_STEPS));
        assert_eq!(drive.current_track, 2);
        assert!(drive.recalibrate(RECALIBRATE_MAX_STEPS));
        assert_eq!(drive.current_track, 0);
    }

    #[test]
    fn sector_access_errors() {
        let mut drive = drive_with_disk();
        assert_eq!(drive.read_sector(0, 0, 1).unwrap().len(), 512);
        assert_eq!(drive.read_sector(0, 0, 10).unwrap_err(), DriveError::NoData);
        assert_eq!(drive.read_sector(50, 0, 1).unwrap_err(), DriveError::NoData);

        drive.set_write_protect(true);
        assert_eq!(drive.write_sector(0, 0, &DiskChsn::new(0, 0, 1, 2), &[0; 512], false), Err(DriveError::NotWriteable));
        drive.set_write_protect(false);
        assert_eq!(drive.write_sector(0, 0, &DiskChsn::new(0, 0, 1, 2), &[0x55; 512], false), Ok(()));
        assert_eq!(drive.read_sector(0, 0, 1).unwrap()[0], 0x55);

        drive.eject_medium();
        assert_eq!(drive.read_sector(0, 0, 1).unwrap_err(), DriveError::NoMedia);
    }
}
