//! NEWSTT: the statement-at-a-time run loop, direct-mode execution, and
//! the point where an `Err` either becomes an `ON ERROR` transfer or is
//! reported and the run halts.

use super::{Interpreter, StepOutcome};
use crate::error::{GwError, GwResult};
use crate::program::{Cursor, LINE_DIRECT};
use crate::shims::{FileSystem, GraphicsSound, Terminal};
use crate::token::Token;

impl<T: Terminal, F: FileSystem, G: GraphicsSound> Interpreter<T, F, G> {
    /// Tokenize and execute one direct-mode line (no line number), then
    /// keep running statements out of the direct buffer — including a
    /// `RUN` that switches into program execution — until the buffer is
    /// exhausted or the program halts.
    pub(super) fn exec_direct(&mut self, tokens: Vec<u8>) -> GwResult<()> {
        self.direct_tokens = tokens;
        self.cur = Cursor::direct(0);
        self.refresh_cur_tokens();
        self.running = false;
        self.run_loop()
    }

    /// `RUN [line]`: reset variables/stacks, position at the first (or
    /// given) line, and enter the run loop.
    pub(super) fn do_run(&mut self, start_line: Option<u16>) -> GwResult<()> {
        self.reset_for_run();
        let first = match start_line {
            Some(n) => n,
            None => self.program.first_line_number().ok_or(GwError::UndefinedLineNumber)?,
        };
        self.do_run_from(first)
    }

    /// Positions at `first` and enters the run loop, without resetting
    /// variables/stacks first — `do_run` calls this right after its own
    /// reset; `CHAIN` calls it after reset-then-repopulating the
    /// variables its `COMMON` list carries forward.
    pub(super) fn do_run_from(&mut self, first: u16) -> GwResult<()> {
        self.goto_line(first)?;
        self.running = true;
        self.run_loop()
    }

    /// `CONT`: resume from the cursor `STOP`/`Ctrl+Break` left behind.
    pub(super) fn do_cont(&mut self) -> GwResult<()> {
        let cursor = self.cont_cursor.take().ok_or(GwError::CantContinue)?;
        self.cur = cursor;
        self.refresh_cur_tokens();
        self.running = true;
        self.run_loop()
    }

    /// The NEWSTT loop: skip whitespace/`:`/`ELSE`-at-top-level, dispatch
    /// one statement, poll event traps, advance past end-of-line, and
    /// repeat until direct mode runs off the end of its buffer or a
    /// running program `END`s, hits an unhandled error, or is left
    /// mid-line by `STOP`.
    fn run_loop(&mut self) -> GwResult<()> {
        loop {
            self.skip_spaces();
            match self.cur_byte() {
                0 => {
                    if self.cur.line == LINE_DIRECT || !self.advance_to_next_line() {
                        self.running = false;
                        return Ok(());
                    }
                    continue;
                }
                b':' => {
                    self.advance();
                    continue;
                }
                b if b == Token::Else as u8 => {
                    // A bare ELSE reached by falling off the THEN branch
                    // of an IF with no intervening transfer: skip the
                    // rest of this statement's ELSE clause entirely.
                    self.advance();
                    self.skip_to_stmt_end();
                    continue;
                }
                _ => {}
            }

            let stmt_cursor = self.cur;
            match self.exec_stmt() {
                Ok(StepOutcome::Continue) => {}
                Ok(StepOutcome::Halt) => {
                    self.running = false;
                    return Ok(());
                }
                Err(e) => {
                    if let Err(report_err) = self.handle_runtime_error(e, stmt_cursor) {
                        self.running = false;
                        return Err(report_err);
                    }
                    continue;
                }
            }

            if self.running {
                self.poll_traps()?;
            }
        }
    }

    /// On an unhandled statement error: if `ON ERROR GOTO` is armed and
    /// we are not already inside a handler, transfer there; otherwise
    /// propagate so the caller (direct-mode loop or CLI) reports it.
    fn handle_runtime_error(&mut self, err: GwError, stmt_cursor: Cursor) -> GwResult<()> {
        self.last_err_number = err.code().unwrap_or(21);
        self.last_err_line = if stmt_cursor.line == LINE_DIRECT { 0 } else { stmt_cursor.line };

        if self.on_error_line != 0 && !self.in_error_handler {
            self.err_resume_cursor = Some(stmt_cursor);
            self.in_error_handler = true;
            let target = self.on_error_line;
            self.goto_line(target)?;
            return Ok(());
        }
        Err(err)
    }

    /// Dispatch exactly one statement at the cursor, returning whether
    /// the loop should keep going or halt (`END`/`STOP`/falling off a
    /// direct-mode line that was not a `RUN`).
    fn exec_stmt(&mut self) -> GwResult<StepOutcome> {
        self.dispatch_stmt()
    }

    /// Called by `RETURN` to route control back either to the ordinary
    /// caller or, for a trap-initiated GOSUB, back to the interrupted
    /// statement with the trap's latch cleared.
    pub(super) fn do_return(&mut self) -> GwResult<()> {
        let frame = self.gosub_stack.pop().ok_or(GwError::ReturnWithoutGosub)?;
        if let Some(kind) = frame.trap {
            self.clear_trap_latch(kind);
        }
        self.cur = frame.ret_cursor;
        self.refresh_cur_tokens();
        Ok(())
    }
}
