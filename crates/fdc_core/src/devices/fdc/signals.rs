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

    devices::fdc::signals.rs

    Output lines from the controller core to its host.
*/

//! The controller drives two lines toward its host: INT and DRQ. A host adapter implements
//! [FdcInterface] to receive them. Lines are edge-triggered: the controller latches each line in
//! a [Signal] and only calls into the interface when the level actually changes.

/// The direction of a DMA transfer, from the point of view of system memory.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum DmaDirection {
    /// Controller to memory (a disk read).
    #[default]
    Read,
    /// Memory to controller (a disk write or format).
    Write,
}

/// Receives the controller's output lines. Callbacks are invoked after the controller has
/// finished mutating its state, so an implementation may inspect the controller's status
/// registers from within them.
pub trait FdcInterface {
    fn interrupt(&mut self, state: bool);
    fn dma_drq(&mut self, state: bool, direction: DmaDirection);
}

/// An interface with nothing connected. Used by polled hosts that never look at INT or DRQ.
#[derive(Copy, Clone, Debug, Default)]
pub struct NullInterface;

impl FdcInterface for NullInterface {
    fn interrupt(&mut self, _state: bool) {}
    fn dma_drq(&mut self, _state: bool, _direction: DmaDirection) {}
}

impl<T: FdcInterface + ?Sized> FdcInterface for Box<T> {
    fn interrupt(&mut self, state: bool) {
        (**self).interrupt(state)
    }
    fn dma_drq(&mut self, state: bool, direction: DmaDirection) {
        (**self).dma_drq(state, direction)
    }
}

/// The last driven level of a line.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Signal {
    state: bool,
}

impl Signal {
    /// Drive the line to `state`. Returns true if the level changed.
    #[inline]
    pub fn set(&mut self, state: bool) -> bool {
        let changed = self.state != state;
        self.state = state;
        changed
    }

    #[inline]
    pub fn get(&self) -> bool {
        self.state
    }
}

/// Records every edge delivered through [FdcInterface], for asserting exact edge counts.
#[cfg(test)]
#[derive(Clone, Debug, Default)]
pub(crate) struct LineRecorder {
    pub(crate) int_edges: Vec<bool>,
    pub(crate) drq_edges: Vec<(bool, DmaDirection)>,
}

#[cfg(test)]
impl LineRecorder {
    pub(crate) fn int_rises(&self) -> usize {
        self.int_edges.iter().filter(|&&s| s).count()
    }
    pub(crate) fn int_level(&self) -> bool {
        self.int_edges.last().copied().unwrap_or(false)
    }
    pub(crate) fn drq_rises(&self) -> usize {
        self.drq_edges.iter().filter(|(s, _)| *s).count()
    }
    pub(crate) fn drq_level(&self) -> bool {
        self.drq_edges.last().is_some_and(|(s, _)| *s)
    }
}

#[cfg(test)]
impl FdcInterface for LineRecorder {
    fn interrupt(&mut self, state: bool) {
        self.int_edges.push(state);
    }
    fn dma_drq(&mut self, state: bool, direction: DmaDirection) {
        self.drq_edges.push((state, direction));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signal_reports_changes_only() {
        let mut line = Signal::default();
        assert!(!line.set(false));
        assert!(line.set(true));
        assert!(!line.set(true));
        assert!(line.get());
        assert!(line.set(false));
    }

    #[test]
    fn boxed_interface_forwards() {
        let mut boxed: Box<dyn FdcInterface> = Box::new(NullInterface);
        boxed.interrupt(true);
        boxed.dma_drq(true, DmaDirection::Write);
    }
}
