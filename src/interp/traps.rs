//! Event traps: `ON TIMER(n) GOSUB`, `ON KEY(n) GOSUB`, and the
//! `TIMER`/`KEY` `ON`/`OFF`/`STOP` state machine (§4.6).
//!
//! The original's event polling is woven into the ROM's keyboard and
//! timer interrupt handlers; there is no interrupt here, so traps are
//! polled cooperatively once per statement from [`super::runloop`].
//! `STOP` latches a firing condition as `pending` without transferring
//! control; the next `ON` re-arm fires immediately if a condition fired
//! while stopped, matching the documented GW-BASIC behavior.

use super::{GosubFrame, Interpreter, TrapKind, MAX_GOSUB_DEPTH};
use crate::error::{GwError, GwResult};
use crate::shims::{FileSystem, GraphicsSound, Terminal};

/// One trap's `enabled`/`stopped`/`pending` latch plus its GOSUB target.
#[derive(Debug, Clone, Copy)]
pub struct EventTrap {
    pub(crate) enabled: bool,
    pub(crate) stopped: bool,
    pub(crate) pending: bool,
    pub(crate) target_line: u16,
}

impl Default for EventTrap {
    fn default() -> Self {
        EventTrap { enabled: false, stopped: false, pending: false, target_line: 0 }
    }
}

impl EventTrap {
    fn arm(&mut self, target: u16) {
        self.target_line = target;
        self.enabled = false;
        self.stopped = false;
        self.pending = false;
    }

    fn set_on(&mut self) {
        self.enabled = true;
        self.stopped = false;
    }

    fn set_off(&mut self) {
        self.enabled = false;
        self.stopped = false;
        self.pending = false;
    }

    fn set_stop(&mut self) {
        self.stopped = true;
    }

    /// A condition fired: latch `pending` if stopped, otherwise report
    /// ready-to-transfer.
    fn fire(&mut self) -> bool {
        if !self.enabled {
            return false;
        }
        if self.stopped {
            self.pending = true;
            false
        } else {
            true
        }
    }

    /// On re-`ON`, a latched `pending` condition fires immediately.
    fn consume_pending(&mut self) -> bool {
        if self.enabled && !self.stopped && self.pending {
            self.pending = false;
            true
        } else {
            false
        }
    }
}

impl<T: Terminal, F: FileSystem, G: GraphicsSound> Interpreter<T, F, G> {
    pub(super) fn on_timer_gosub(&mut self, line: u16, interval_secs: f64) -> GwResult<()> {
        if !self.program.contains(line) {
            return Err(GwError::UndefinedLineNumber);
        }
        self.timer_trap.arm(line);
        self.timer_interval = std::time::Duration::from_secs_f64(interval_secs.max(0.01));
        self.timer_last = std::time::Instant::now();
        Ok(())
    }

    pub(super) fn timer_on(&mut self) {
        self.timer_trap.set_on();
    }
    pub(super) fn timer_off(&mut self) {
        self.timer_trap.set_off();
    }
    pub(super) fn timer_stop(&mut self) {
        self.timer_trap.set_stop();
    }

    pub(super) fn on_key_gosub(&mut self, key: usize, line: u16) -> GwResult<()> {
        if key == 0 || key > self.key_traps.len() {
            return Err(GwError::IllegalFunctionCall);
        }
        if !self.program.contains(line) {
            return Err(GwError::UndefinedLineNumber);
        }
        self.key_traps[key - 1].arm(line);
        Ok(())
    }

    pub(super) fn key_on(&mut self, key: usize) -> GwResult<()> {
        self.key_trap_mut(key)?.set_on();
        Ok(())
    }
    pub(super) fn key_off(&mut self, key: usize) -> GwResult<()> {
        self.key_trap_mut(key)?.set_off();
        Ok(())
    }
    pub(super) fn key_stop(&mut self, key: usize) -> GwResult<()> {
        self.key_trap_mut(key)?.set_stop();
        Ok(())
    }

    fn key_trap_mut(&mut self, key: usize) -> GwResult<&mut EventTrap> {
        self.key_traps.get_mut(key.wrapping_sub(1)).ok_or(GwError::IllegalFunctionCall)
    }

    /// Poll every trap once; called at each statement boundary by the
    /// run loop. Transfers control (as a GOSUB) on the first trap whose
    /// condition fires.
    pub(super) fn poll_traps(&mut self) -> GwResult<()> {
        if self.timer_trap.enabled
            && !self.timer_trap.stopped
            && self.timer_last.elapsed() >= self.timer_interval
        {
            self.timer_last = std::time::Instant::now();
            if self.timer_trap.fire() {
                return self.fire_trap(TrapKind::Timer, self.timer_trap.target_line);
            }
        } else if self.timer_trap.consume_pending() {
            return self.fire_trap(TrapKind::Timer, self.timer_trap.target_line);
        }

        for i in 0..self.key_traps.len() {
            if self.key_traps[i].enabled && !self.key_traps[i].stopped && self.terminal.key_ready() {
                if self.key_traps[i].fire() {
                    let target = self.key_traps[i].target_line;
                    return self.fire_trap(TrapKind::Key(i), target);
                }
            } else if self.key_traps[i].consume_pending() {
                let target = self.key_traps[i].target_line;
                return self.fire_trap(TrapKind::Key(i), target);
            }
        }
        Ok(())
    }

    fn fire_trap(&mut self, kind: TrapKind, target: u16) -> GwResult<()> {
        if self.gosub_stack.len() >= MAX_GOSUB_DEPTH {
            return Err(GwError::OutOfMemory);
        }
        self.gosub_stack.push(GosubFrame { ret_cursor: self.cur, trap: Some(kind) });
        self.goto_line(target)
    }

    /// Called on `RETURN`: clear whichever trap's GOSUB frame this was,
    /// letting it fire again.
    pub(super) fn clear_trap_latch(&mut self, kind: TrapKind) {
        match kind {
            TrapKind::Timer => self.timer_trap.pending = false,
            TrapKind::Key(i) => {
                if let Some(t) = self.key_traps.get_mut(i) {
                    t.pending = false;
                }
            }
        }
    }
}
