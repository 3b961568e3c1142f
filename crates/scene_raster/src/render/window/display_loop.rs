//! Event-pumping iterator over a [`DisplaySurface`]

use std::iter::FusedIterator;

use super::DisplaySurface;

/// One pass of the display loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DisplayIteration {
    /// Dense iteration index starting at 0
    pub index: u64,
}

/// Iterator that pumps surface events once per iteration.
///
/// The first `next` yields iteration 0 without touching the surface. Every
/// later `next` reads `should_close` first and then polls events, so a close
/// delivered by that poll is observed one iteration later while a close
/// already pending ends the loop even though the poll still runs. Once the
/// loop has ended it stays ended and no longer polls.
#[derive(Debug)]
pub struct DisplayLoop<'s, S: DisplaySurface + ?Sized> {
    surface: &'s mut S,
    next_index: u64,
    started: bool,
    terminal: bool,
}

impl<'s, S: DisplaySurface + ?Sized> DisplayLoop<'s, S> {
    /// Loop over `surface`
    pub fn new(surface: &'s mut S) -> Self {
        Self {
            surface,
            next_index: 0,
            started: false,
            terminal: false,
        }
    }

    /// Whether the surface has signalled close
    pub fn is_terminal(&self) -> bool {
        self.terminal
    }

    /// Iterations emitted so far
    pub fn iterations(&self) -> u64 {
        self.next_index
    }

    /// The surface being pumped
    pub fn surface(&self) -> &S {
        &*self.surface
    }
}

impl<S: DisplaySurface + ?Sized> Iterator for DisplayLoop<'_, S> {
    type Item = DisplayIteration;

    fn next(&mut self) -> Option<DisplayIteration> {
        if self.terminal {
            return None;
        }

        if self.started {
            if self.surface.should_close() {
                log::debug!("Display surface closed after {} iterations", self.next_index);
                self.terminal = true;
            }
            self.surface.poll_events();
            if self.terminal {
                return None;
            }
        }

        self.started = true;
        let iteration = DisplayIteration {
            index: self.next_index,
        };
        self.next_index += 1;
        Some(iteration)
    }
}

impl<S: DisplaySurface + ?Sized> FusedIterator for DisplayLoop<'_, S> {}
