//! The statement dispatcher: one arm per token, reimplementing
//! `gw_exec_stmt`'s big switch. PRINT/LET/control-flow/DIM/file I/O and
//! the graphics/sound/extended statements (§4.3) that only exist behind
//! this crate's `GraphicsSound`/`Terminal`/`FileSystem` shims.

use super::{ForFrame, GosubFrame, Interpreter, StepOutcome, WhileFrame, MAX_FOR_DEPTH, MAX_GOSUB_DEPTH, MAX_WHILE_DEPTH};
use crate::error::{GwError, GwResult};
use crate::program::Cursor;
use crate::shims::{FileMode, FileSystem, GraphicsSound, LineStyle, Terminal};
use crate::token::{self, Token, XStmtToken, PREFIX_XSTMT};
use crate::value::{Value, ValueType};
use crate::vars::VarName;

impl<T: Terminal, F: FileSystem, G: GraphicsSound> Interpreter<T, F, G> {
    pub(super) fn dispatch_stmt(&mut self) -> GwResult<StepOutcome> {
        let tok = self.cur_byte();

        if tok == PREFIX_XSTMT {
            self.advance();
            let xtok = self.cur_byte();
            self.advance();
            return self.dispatch_xstmt(xtok);
        }

        if Self::is_letter(tok) {
            self.assign_stmt()?;
            return Ok(StepOutcome::Continue);
        }

        let Ok(t) = Token::try_from(tok) else {
            return Err(GwError::SyntaxError);
        };

        match t {
            Token::End => {
                self.running = false;
                Ok(StepOutcome::Halt)
            }
            Token::Stop => {
                self.advance();
                self.cont_cursor = Some(self.cur);
                self.terminal.write_str(&format!("\r\nBreak in {}\r\n", self.cur.line));
                Ok(StepOutcome::Halt)
            }
            Token::Cont => {
                self.advance();
                self.do_cont()?;
                Ok(StepOutcome::Continue)
            }
            Token::New => {
                self.advance();
                self.program.clear();
                self.reset_for_run();
                Ok(StepOutcome::Continue)
            }
            Token::Clear => {
                self.advance();
                self.reset_for_run();
                Ok(StepOutcome::Continue)
            }
            Token::Run => {
                self.advance();
                self.skip_spaces();
                let start = if self.at_embedded_number() { Some(self.eval_uint16()?) } else { None };
                self.do_run(start)?;
                Ok(StepOutcome::Continue)
            }
            Token::List | Token::Llist => {
                self.advance();
                self.list_stmt();
                Ok(StepOutcome::Continue)
            }
            Token::Goto => {
                self.advance();
                let line = self.eval_uint16()?;
                self.goto_line(line)?;
                Ok(StepOutcome::Continue)
            }
            Token::Gosub => {
                self.advance();
                let line = self.eval_uint16()?;
                if self.gosub_stack.len() >= MAX_GOSUB_DEPTH {
                    return Err(GwError::OutOfMemory);
                }
                self.gosub_stack.push(GosubFrame { ret_cursor: self.cur, trap: None });
                self.goto_line(line)?;
                Ok(StepOutcome::Continue)
            }
            Token::Return => {
                self.advance();
                self.skip_spaces();
                if self.at_embedded_number() {
                    let line = self.eval_uint16()?;
                    self.do_return()?;
                    self.goto_line(line)?;
                } else {
                    self.do_return()?;
                }
                Ok(StepOutcome::Continue)
            }
            Token::For => {
                self.advance();
                self.for_stmt()?;
                Ok(StepOutcome::Continue)
            }
            Token::Next => {
                self.advance();
                self.next_stmt()?;
                Ok(StepOutcome::Continue)
            }
            Token::If => {
                self.advance();
                self.if_stmt()
            }
            Token::While => self.while_stmt(),
            Token::Wend => self.wend_stmt(),
            Token::On => {
                self.advance();
                self.on_stmt()?;
                Ok(StepOutcome::Continue)
            }
            Token::Dim => {
                self.advance();
                self.dim_stmt()?;
                Ok(StepOutcome::Continue)
            }
            Token::Erase => {
                self.advance();
                loop {
                    let (name, vtype) = self.parse_varname();
                    self.arrays.erase(name, vtype);
                    self.skip_spaces();
                    if self.cur_byte() == b',' {
                        self.advance();
                        continue;
                    }
                    break;
                }
                Ok(StepOutcome::Continue)
            }
            Token::Option => {
                self.advance();
                self.expect_keyword_base()?;
                let n = self.eval_int()?;
                if n != 0 && n != 1 {
                    return Err(GwError::SyntaxError);
                }
                self.arrays.option_base = n as usize;
                Ok(StepOutcome::Continue)
            }
            Token::Data => {
                self.skip_to_stmt_end();
                Ok(StepOutcome::Continue)
            }
            Token::Read => {
                self.advance();
                self.read_stmt()?;
                Ok(StepOutcome::Continue)
            }
            Token::Restore => {
                self.advance();
                self.skip_spaces();
                self.data_cursor = if self.at_embedded_number() {
                    Some(Cursor::new(self.eval_uint16()?, 0))
                } else {
                    None
                };
                self.data_ready = false;
                Ok(StepOutcome::Continue)
            }
            Token::Let => {
                self.advance();
                self.assign_stmt()?;
                Ok(StepOutcome::Continue)
            }
            Token::Print | Token::Lprint => {
                self.advance();
                self.print_stmt()?;
                Ok(StepOutcome::Continue)
            }
            Token::Input => {
                self.advance();
                self.input_stmt()?;
                Ok(StepOutcome::Continue)
            }
            Token::Line => {
                self.advance();
                self.line_stmt()?;
                Ok(StepOutcome::Continue)
            }
            Token::Swap => {
                self.advance();
                self.swap_stmt()?;
                Ok(StepOutcome::Continue)
            }
            Token::Tron => {
                self.advance();
                self.trace_on = true;
                Ok(StepOutcome::Continue)
            }
            Token::Troff => {
                self.advance();
                self.trace_on = false;
                Ok(StepOutcome::Continue)
            }
            Token::Randomize => {
                self.advance();
                self.skip_spaces();
                let seed = if !matches!(self.cur_byte(), 0 | b':') { self.eval_num()?.to_f64()? } else { 0.0 };
                self.seed_rnd(seed.to_bits() as u32 ^ (seed as i64 as u32));
                Ok(StepOutcome::Continue)
            }
            Token::Def => {
                self.advance();
                self.def_fn_stmt()?;
                Ok(StepOutcome::Continue)
            }
            Token::Defint | Token::Defsng | Token::Defdbl | Token::Defstr => {
                let vtype = match t {
                    Token::Defint => ValueType::Int,
                    Token::Defsng => ValueType::Sng,
                    Token::Defdbl => ValueType::Dbl,
                    _ => ValueType::Str,
                };
                self.advance();
                self.deftype_stmt(vtype)?;
                Ok(StepOutcome::Continue)
            }
            Token::Error => {
                self.advance();
                let n = self.eval_int()?;
                Err(GwError::from_code(n as u16))
            }
            Token::Resume => {
                self.resume_stmt()?;
                Ok(StepOutcome::Continue)
            }
            Token::Poke | Token::Out | Token::Wait | Token::Call => {
                self.skip_to_stmt_end();
                Ok(StepOutcome::Continue)
            }
            Token::Width => {
                self.advance();
                let _ = self.eval_int()?;
                Ok(StepOutcome::Continue)
            }
            Token::Locate => {
                self.advance();
                self.locate_stmt()?;
                Ok(StepOutcome::Continue)
            }
            Token::Color => {
                self.advance();
                self.color_stmt()?;
                Ok(StepOutcome::Continue)
            }
            Token::Screen => {
                self.advance();
                let mode = self.eval_int()?;
                self.graphics.screen_mode(mode);
                Ok(StepOutcome::Continue)
            }
            Token::Cls => {
                self.advance();
                self.terminal.cls();
                self.graphics.cls();
                Ok(StepOutcome::Continue)
            }
            Token::Pset | Token::Preset => {
                self.advance();
                self.pset_stmt(t == Token::Preset)?;
                Ok(StepOutcome::Continue)
            }
            Token::Beep => {
                self.advance();
                self.graphics.beep();
                Ok(StepOutcome::Continue)
            }
            Token::Sound => {
                self.advance();
                let freq = self.eval_num()?.to_f64()?;
                self.skip_spaces();
                self.expect(b',')?;
                let dur = self.eval_num()?.to_f64()?;
                self.graphics.tone(freq, dur * 1000.0 / 18.2);
                Ok(StepOutcome::Continue)
            }
            Token::Key => {
                self.advance();
                self.key_stmt()?;
                Ok(StepOutcome::Continue)
            }
            Token::Open => {
                self.advance();
                self.open_stmt()?;
                Ok(StepOutcome::Continue)
            }
            Token::Close => {
                self.advance();
                self.close_stmt()?;
                Ok(StepOutcome::Continue)
            }
            Token::Save | Token::Load | Token::Merge => {
                self.advance();
                self.save_load_stmt(t)?;
                Ok(StepOutcome::Continue)
            }
            Token::Write => {
                self.advance();
                self.write_stmt()?;
                Ok(StepOutcome::Continue)
            }
            Token::Rem | Token::Squote => {
                while self.cur_byte() != 0 {
                    self.advance();
                }
                Ok(StepOutcome::Continue)
            }
            Token::Motor | Token::Bsave | Token::Bload | Token::Usr | Token::Varptr | Token::Using
            | Token::Spc | Token::Tab => {
                self.skip_to_stmt_end();
                Ok(StepOutcome::Continue)
            }
            _ => Err(GwError::SyntaxError),
        }
    }

    fn expect_keyword_base(&mut self) -> GwResult<()> {
        // `OPTION BASE n`: BASE isn't a separate token, CRUNCH leaves it
        // as a plain identifier "BASE".
        self.expect_keyword_word(b"BASE")
    }

    // ---- assignment (explicit LET and implicit) ----

    fn assign_stmt(&mut self) -> GwResult<()> {
        if self.cur_byte() == token::PREFIX_FUNC {
            // MID$(var$, start[, len]) = expr
            let save = self.cur;
            self.advance();
            let func = self.cur_byte();
            if func == crate::token::FuncToken::Mid as u8 {
                self.advance();
                return self.mid_assign_stmt();
            }
            self.cur = save;
            self.refresh_cur_tokens();
        }

        let (name, vtype) = self.parse_varname();
        self.skip_spaces();
        if self.cur_byte() == b'(' {
            let indices = self.eval_array_indices()?;
            self.skip_spaces();
            self.expect(Token::Eq as u8)?;
            let value = self.eval()?.coerce(vtype)?;
            let arr = self.arrays.get_or_implicit_dim(name, vtype);
            let base = arr.option_base() as i16;
            let mut rel = Vec::with_capacity(indices.len());
            for i in &indices {
                let r = i - base;
                if r < 0 {
                    return Err(GwError::SubscriptOutOfRange);
                }
                rel.push(r as usize);
            }
            return arr.set(&rel, value);
        }
        self.expect(Token::Eq as u8)?;
        let value = self.eval()?;
        self.vars.assign(name, vtype, value)
    }

    fn mid_assign_stmt(&mut self) -> GwResult<()> {
        self.expect(b'(')?;
        let (name, vtype) = self.parse_varname();
        if vtype != ValueType::Str {
            return Err(GwError::TypeMismatch);
        }
        self.skip_spaces();
        self.expect(b',')?;
        let start = self.eval_int()?;
        self.skip_spaces();
        let mut len: Option<i16> = None;
        if self.cur_byte() == b',' {
            self.advance();
            len = Some(self.eval_int()?);
        }
        self.expect_rparen_pub()?;
        self.skip_spaces();
        self.expect(Token::Eq as u8)?;
        let replacement = self.eval_str()?;

        if start < 1 {
            return Err(GwError::IllegalFunctionCall);
        }
        let current = self.vars.get_or_create(name, vtype).clone();
        let mut bytes = current.as_str()?.to_vec();
        let from = (start as usize - 1).min(bytes.len());
        let max_len = len.map(|l| l as usize).unwrap_or(replacement.as_str()?.len());
        let n = max_len.min(replacement.as_str()?.len()).min(bytes.len().saturating_sub(from));
        bytes[from..from + n].copy_from_slice(&replacement.as_str()?[..n]);
        self.vars.assign(name, vtype, Value::Str(bytes))
    }

    fn expect_rparen_pub(&mut self) -> GwResult<()> {
        self.skip_spaces();
        if self.cur_byte() != b')' {
            return Err(GwError::SyntaxError);
        }
        self.advance();
        Ok(())
    }

    // ---- FOR / NEXT ----

    fn for_stmt(&mut self) -> GwResult<()> {
        let (var, vtype) = self.parse_varname();
        self.skip_spaces();
        self.expect(Token::Eq as u8)?;
        let start = self.eval_num()?.coerce(vtype)?;
        self.skip_spaces();
        self.expect(Token::To as u8)?;
        let limit = self.eval_num()?;
        self.skip_spaces();
        let step = if self.cur_byte() == Token::Step as u8 {
            self.advance();
            self.eval_num()?
        } else {
            Value::Int(1)
        };
        self.vars.assign(var, vtype, start)?;
        if self.for_stack.len() >= MAX_FOR_DEPTH {
            return Err(GwError::OutOfMemory);
        }
        self.for_stack.push(ForFrame { var, vtype, limit, step, loop_cursor: self.cur });
        Ok(())
    }

    fn next_stmt(&mut self) -> GwResult<()> {
        loop {
            self.skip_spaces();
            let explicit = if Self::is_letter(self.cur_byte()) { Some(self.parse_varname().0) } else { None };

            let frame = match explicit {
                Some(name) => {
                    let pos = self.for_stack.iter().rposition(|f| f.var == name).ok_or(GwError::NextWithoutFor)?;
                    self.for_stack.split_off(pos).into_iter().next().unwrap()
                }
                None => self.for_stack.pop().ok_or(GwError::NextWithoutFor)?,
            };

            let cur = self.vars.get(frame.var, frame.vtype).cloned().unwrap_or(Value::default_for(frame.vtype));
            let stepped = crate::value::promote(&cur, &frame.step)
                .and_then(|(a, b)| self.add_values(a, b))?
                .coerce(frame.vtype)?;
            self.vars.assign(frame.var, frame.vtype, stepped.clone())?;

            let step_neg = frame.step.to_f64()? < 0.0;
            let done = if step_neg { stepped.to_f64()? < frame.limit.to_f64()? } else { stepped.to_f64()? > frame.limit.to_f64()? };

            if !done {
                self.for_stack.push(frame.clone());
                self.cur = frame.loop_cursor;
                self.refresh_cur_tokens();
                return Ok(());
            }

            self.skip_spaces();
            if self.cur_byte() == b',' {
                self.advance();
                continue;
            }
            return Ok(());
        }
    }

    fn add_values(&self, a: Value, b: Value) -> GwResult<Value> {
        match (a, b) {
            (Value::Int(x), Value::Int(y)) => Ok(Value::Int(crate::value::int_add(x, y)?)),
            (Value::Sng(x), Value::Sng(y)) => Ok(Value::Sng(crate::value::fadd(x as f64, y as f64)? as f32)),
            (Value::Dbl(x), Value::Dbl(y)) => Ok(Value::Dbl(crate::value::fadd(x, y)?)),
            _ => Err(GwError::TypeMismatch),
        }
    }

    // ---- IF / THEN / ELSE ----

    fn if_stmt(&mut self) -> GwResult<StepOutcome> {
        let cond = self.eval_num()?.to_f64()? != 0.0;
        self.skip_spaces();
        self.expect(Token::Then as u8)?;
        self.skip_spaces();

        if cond {
            if self.at_embedded_number() {
                let line = self.eval_uint16()?;
                self.goto_line(line)?;
            }
            // Otherwise the cursor already sits at the THEN-clause's
            // first statement; the run loop dispatches it (and any
            // further `:`-separated statements) on its own next turn.
            return Ok(StepOutcome::Continue);
        }

        self.skip_to_else_or_eol();
        if self.cur_byte() == Token::Else as u8 {
            self.advance();
            self.skip_spaces();
            if self.at_embedded_number() {
                let line = self.eval_uint16()?;
                self.goto_line(line)?;
            }
        }
        Ok(StepOutcome::Continue)
    }

    /// Scan to this line's `ELSE` (depth-tracking nested `IF`s reached
    /// via `THEN <stmt>` that themselves start with `IF`) or to EOL.
    fn skip_to_else_or_eol(&mut self) {
        let mut depth = 0i32;
        loop {
            match self.cur_byte() {
                0 => return,
                b if b == Token::If as u8 => {
                    depth += 1;
                    self.advance();
                }
                b if b == Token::Else as u8 => {
                    if depth == 0 {
                        return;
                    }
                    depth -= 1;
                    self.advance();
                }
                _ => self.skip_one_lexeme(),
            }
        }
    }

    // ---- WHILE / WEND ----

    fn while_stmt(&mut self) -> GwResult<StepOutcome> {
        let while_cursor = self.cur;
        self.advance();
        let cond = self.eval_num()?.to_f64()? != 0.0;
        if cond {
            if self.while_stack.last().map(|f| f.while_cursor) != Some(while_cursor) {
                if self.while_stack.len() >= MAX_WHILE_DEPTH {
                    return Err(GwError::OutOfMemory);
                }
                self.while_stack.push(WhileFrame { while_cursor });
            }
        } else {
            if self.while_stack.last().map(|f| f.while_cursor) == Some(while_cursor) {
                self.while_stack.pop();
            }
            self.skip_to_matching_wend()?;
        }
        Ok(StepOutcome::Continue)
    }

    fn wend_stmt(&mut self) -> GwResult<StepOutcome> {
        self.advance();
        let frame = *self.while_stack.last().ok_or(GwError::WendWithoutWhile)?;
        self.cur = frame.while_cursor;
        self.refresh_cur_tokens();
        Ok(StepOutcome::Continue)
    }

    fn skip_to_matching_wend(&mut self) -> GwResult<()> {
        let mut depth = 0i32;
        loop {
            match self.cur_byte() {
                0 => {
                    if !self.advance_to_next_line() {
                        return Err(GwError::WhileWithoutWend);
                    }
                }
                b if b == Token::While as u8 => {
                    depth += 1;
                    self.advance();
                }
                b if b == Token::Wend as u8 => {
                    if depth == 0 {
                        self.advance();
                        return Ok(());
                    }
                    depth -= 1;
                    self.advance();
                }
                _ => self.skip_one_lexeme(),
            }
        }
    }

    // ---- ON ... GOTO/GOSUB, ON ERROR, ON TIMER/KEY ----

    fn on_stmt(&mut self) -> GwResult<()> {
        self.skip_spaces();
        if self.cur_byte() == Token::Error as u8 {
            self.advance();
            self.skip_spaces();
            self.expect(Token::Goto as u8)?;
            let line = self.eval_uint16()?;
            self.on_error_line = line;
            if line == 0 {
                self.in_error_handler = false;
            }
            return Ok(());
        }
        if self.cur_byte() == PREFIX_XSTMT {
            let save = self.cur;
            self.advance();
            let xtok = self.cur_byte();
            if xtok == XStmtToken::Timer as u8 {
                self.advance();
                self.expect(b'(')?;
                let interval = self.eval_num()?.to_f64()?;
                self.expect_rparen_pub()?;
                self.skip_spaces();
                self.expect_keyword_gosub()?;
                let line = self.eval_uint16()?;
                return self.on_timer_gosub(line, interval);
            }
            if xtok == Token::Key as u8 {
                // Token::Key itself isn't behind the xstmt prefix; fall
                // through to restore and let the plain-token path below
                // handle it.
            }
            self.cur = save;
            self.refresh_cur_tokens();
        }
        if self.cur_byte() == Token::Key as u8 {
            self.advance();
            self.expect(b'(')?;
            let key = self.eval_int()?;
            self.expect_rparen_pub()?;
            self.skip_spaces();
            self.expect_keyword_gosub()?;
            let line = self.eval_uint16()?;
            return self.on_key_gosub(key as usize, line);
        }

        let selector = self.eval_int()?;
        self.skip_spaces();
        let is_gosub = if self.cur_byte() == Token::Gosub as u8 {
            self.advance();
            true
        } else {
            self.expect(Token::Goto as u8)?;
            false
        };
        let lines = self.parse_line_list()?;
        let idx = selector as usize;
        if idx == 0 || idx > lines.len() {
            return Ok(());
        }
        let target = lines[idx - 1];
        if is_gosub {
            if self.gosub_stack.len() >= MAX_GOSUB_DEPTH {
                return Err(GwError::OutOfMemory);
            }
            self.gosub_stack.push(GosubFrame { ret_cursor: self.cur, trap: None });
        }
        self.goto_line(target)
    }

    fn expect_keyword_gosub(&mut self) -> GwResult<()> {
        self.expect(Token::Gosub as u8)
    }

    fn parse_line_list(&mut self) -> GwResult<Vec<u16>> {
        let mut out = Vec::new();
        loop {
            out.push(self.eval_uint16()?);
            self.skip_spaces();
            if self.cur_byte() == b',' {
                self.advance();
                continue;
            }
            break;
        }
        Ok(out)
    }

    // ---- DIM ----

    fn dim_stmt(&mut self) -> GwResult<()> {
        loop {
            let (name, vtype) = self.parse_varname();
            self.skip_spaces();
            self.expect(b'(')?;
            let mut extents = Vec::new();
            loop {
                let n = self.eval_int()?;
                if n < 0 {
                    return Err(GwError::IllegalFunctionCall);
                }
                extents.push(n as usize);
                self.skip_spaces();
                if self.cur_byte() == b',' {
                    self.advance();
                    continue;
                }
                break;
            }
            self.expect_rparen_pub()?;
            self.arrays.dim(name, vtype, &extents)?;
            self.skip_spaces();
            if self.cur_byte() == b',' {
                self.advance();
                continue;
            }
            break;
        }
        Ok(())
    }

    // ---- READ / DATA / RESTORE ----

    fn read_stmt(&mut self) -> GwResult<()> {
        loop {
            let (name, vtype) = self.parse_varname();
            self.skip_spaces();
            if self.cur_byte() == b'(' {
                let indices = self.eval_array_indices()?;
                let value = self.next_data_value()?.coerce(vtype)?;
                let arr = self.arrays.get_or_implicit_dim(name, vtype);
                let base = arr.option_base() as i16;
                let rel: Vec<usize> = indices.iter().map(|&i| (i - base).max(0) as usize).collect();
                arr.set(&rel, value)?;
            } else {
                let value = self.next_data_value()?;
                self.vars.assign(name, vtype, value)?;
            }
            self.skip_spaces();
            if self.cur_byte() == b',' {
                self.advance();
                continue;
            }
            break;
        }
        Ok(())
    }

    fn ensure_data_cursor(&mut self) -> GwResult<()> {
        if self.data_cursor.is_none() {
            let first = self.program.first_line_number().ok_or(GwError::OutOfData)?;
            self.data_cursor = Some(Cursor::new(first, 0));
        }
        Ok(())
    }

    /// READ's item supply. `data_cursor` walks independently of the
    /// execution cursor, so every call saves/restores `self.cur` around a
    /// temporary retarget — this lets item scanning reuse the same
    /// quote/embedded-constant-aware `skip_to_stmt_end`/`skip_one_lexeme`
    /// primitives the dispatcher already drives the execution cursor
    /// through, rather than re-deriving statement-boundary rules by hand.
    fn next_data_value(&mut self) -> GwResult<Value> {
        self.ensure_data_cursor()?;
        loop {
            let pos = self.data_cursor.unwrap();
            let saved_cur = self.cur;
            let saved_tokens = std::mem::take(&mut self.cur_tokens);
            self.cur = pos;
            self.refresh_cur_tokens();

            if !self.data_ready && !self.scan_to_data_clause() {
                self.cur = saved_cur;
                self.cur_tokens = saved_tokens;
                match self.program.next_line_number(Some(pos.line)) {
                    Some(n) => {
                        self.data_cursor = Some(Cursor::new(n, 0));
                        continue;
                    }
                    None => return Err(GwError::OutOfData),
                }
            }

            self.skip_spaces();
            let value = self.parse_data_item();
            self.skip_spaces();
            self.data_ready = self.cur_byte() == b',';
            if self.data_ready {
                self.advance();
                self.skip_spaces();
            }
            self.data_cursor = Some(self.cur);

            self.cur = saved_cur;
            self.cur_tokens = saved_tokens;
            return Ok(value);
        }
    }

    /// Walk statement boundaries on the current line, cursor already
    /// positioned on it, looking for one that starts with `DATA`. Leaves
    /// the cursor just past the `DATA` token on success.
    fn scan_to_data_clause(&mut self) -> bool {
        loop {
            self.skip_spaces();
            if self.cur_byte() == Token::Data as u8 {
                self.advance();
                return true;
            }
            if self.cur_byte() == 0 {
                return false;
            }
            if self.cur_byte() == b':' {
                self.advance();
                continue;
            }
            self.skip_to_stmt_end();
        }
    }

    /// Parse one literal DATA item (quoted or bare) at the cursor,
    /// stopping before its trailing `,`/`:`/end of line.
    fn parse_data_item(&mut self) -> Value {
        if self.cur_byte() == b'"' {
            self.advance();
            let mut s = Vec::new();
            while self.cur_byte() != 0 && self.cur_byte() != b'"' {
                s.push(self.cur_byte());
                self.advance();
            }
            if self.cur_byte() == b'"' {
                self.advance();
            }
            Value::Str(s)
        } else {
            let mut raw = Vec::new();
            while !matches!(self.cur_byte(), 0 | b',' | b':') {
                raw.push(self.cur_byte());
                self.advance();
            }
            let text = String::from_utf8_lossy(&raw).trim().to_string();
            match text.parse::<f64>() {
                Ok(n) => Value::Sng(n as f32),
                Err(_) => Value::Str(text.into_bytes()),
            }
        }
    }

    // ---- PRINT ----

    fn print_stmt(&mut self) -> GwResult<()> {
        let filenum = self.parse_opt_filenum()?;
        const ZONE_WIDTH: u16 = 14;
        let mut col = 0u16;
        loop {
            self.skip_spaces();
            match self.cur_byte() {
                0 | b':' => break,
                b';' => {
                    if self.at_trailing_print_separator() {
                        break;
                    }
                    self.advance();
                    continue;
                }
                b',' => {
                    if self.at_trailing_print_separator() {
                        break;
                    }
                    self.advance();
                    let target = (col / ZONE_WIDTH + 1) * ZONE_WIDTH;
                    if target >= self.terminal.width() {
                        self.emit(filenum, "\r\n");
                        col = 0;
                    } else {
                        self.emit(filenum, &" ".repeat((target - col) as usize));
                        col = target;
                    }
                    continue;
                }
                b if b == Token::Tab as u8 => {
                    self.advance();
                    self.expect(b'(')?;
                    let n = self.eval_int()?;
                    self.expect_rparen_pub()?;
                    if (n as u16) > col {
                        self.emit(filenum, &" ".repeat((n as u16 - col) as usize));
                        col = n as u16;
                    }
                    continue;
                }
                b if b == Token::Spc as u8 => {
                    self.advance();
                    self.expect(b'(')?;
                    let n = self.eval_int()?;
                    self.expect_rparen_pub()?;
                    self.emit(filenum, &" ".repeat(n.max(0) as usize));
                    col += n.max(0) as u16;
                    continue;
                }
                _ => {
                    let v = self.eval()?;
                    let text = crate::value::format_number(&v);
                    col += text.len() as u16;
                    self.emit(filenum, &text);
                }
            }
        }
        let suppress_newline = matches!(self.cur_byte(), b';' | b',');
        if suppress_newline {
            self.advance();
        } else {
            self.emit(filenum, "\r\n");
        }
        Ok(())
    }

    /// Peeks past the separator the cursor currently sits on (without
    /// consuming it) to see whether anything follows on this statement —
    /// a `;`/`,` right before end-of-statement suppresses PRINT's
    /// trailing newline instead of introducing another print item.
    fn at_trailing_print_separator(&mut self) -> bool {
        let save = self.cur;
        self.advance();
        self.skip_spaces();
        let trailing = matches!(self.cur_byte(), 0 | b':');
        self.cur = save;
        trailing
    }

    fn parse_opt_filenum(&mut self) -> GwResult<Option<i16>> {
        self.skip_spaces();
        if self.cur_byte() == b'#' {
            self.advance();
            let n = self.eval_int()?;
            self.skip_spaces();
            if self.cur_byte() == b',' {
                self.advance();
            }
            return Ok(Some(n));
        }
        Ok(None)
    }

    fn emit(&mut self, filenum: Option<i16>, text: &str) {
        match filenum {
            Some(n) => {
                let _ = self.with_file(n, |fs, h| fs.write_bytes(h, text.as_bytes()));
            }
            None => self.terminal.write_str(text),
        }
    }

    // ---- INPUT / LINE INPUT ----

    fn input_stmt(&mut self) -> GwResult<()> {
        let filenum = self.parse_opt_filenum()?;
        let prompt = self.maybe_prompt()?;

        if let Some(n) = filenum {
            return self.input_from_file(n);
        }

        if !prompt.1.is_empty() || prompt.0 {
            self.terminal.write_str(&prompt.1);
        }
        if prompt.0 {
            self.terminal.write_str("? ");
        }

        let line = self.terminal.read_line().unwrap_or_default();
        self.assign_input_values(&line)
    }

    /// Returns `(needs_question_mark, literal_prompt_text)`.
    fn maybe_prompt(&mut self) -> GwResult<(bool, String)> {
        self.skip_spaces();
        if self.cur_byte() == b'"' {
            let v = self.eval()?;
            self.skip_spaces();
            let wants_q = if self.cur_byte() == b';' {
                self.advance();
                true
            } else if self.cur_byte() == b',' {
                self.advance();
                false
            } else {
                true
            };
            return Ok((wants_q, String::from_utf8_lossy(v.as_str()?).into_owned()));
        }
        Ok((true, String::new()))
    }

    fn input_from_file(&mut self, filenum: i16) -> GwResult<()> {
        let line = self.with_file(filenum, |fs, h| fs.read_line(h))?.ok_or(GwError::InputPastEnd)?;
        self.assign_input_values(&line)
    }

    fn assign_input_values(&mut self, line: &str) -> GwResult<()> {
        let mut fields = line.split(',').map(|s| s.trim());
        loop {
            let (name, vtype) = self.parse_varname();
            let field = fields.next().unwrap_or("");
            let value = if vtype == ValueType::Str {
                Value::Str(field.as_bytes().to_vec())
            } else {
                Value::Sng(field.parse().unwrap_or(0.0))
            };
            self.vars.assign(name, vtype, value)?;
            self.skip_spaces();
            if self.cur_byte() == b',' {
                self.advance();
                continue;
            }
            break;
        }
        Ok(())
    }

    /// `LINE INPUT [#f,] ["prompt";] var$`
    fn line_stmt(&mut self) -> GwResult<()> {
        self.expect(Token::Input as u8)?;
        let filenum = self.parse_opt_filenum()?;
        let prompt = self.maybe_prompt()?;
        let text = match filenum {
            Some(n) => self.with_file(n, |fs, h| fs.read_line(h))?.ok_or(GwError::InputPastEnd)?,
            None => {
                if !prompt.1.is_empty() {
                    self.terminal.write_str(&prompt.1);
                }
                self.terminal.read_line().unwrap_or_default()
            }
        };
        let (name, vtype) = self.parse_varname();
        if vtype != ValueType::Str {
            return Err(GwError::TypeMismatch);
        }
        self.vars.assign(name, vtype, Value::Str(text.into_bytes()))
    }

    // ---- SWAP ----

    fn swap_stmt(&mut self) -> GwResult<()> {
        let (a, at) = self.parse_varname();
        self.skip_spaces();
        self.expect(b',')?;
        let (b, bt) = self.parse_varname();
        if at != bt {
            return Err(GwError::TypeMismatch);
        }
        let av = self.vars.get_or_create(a, at).clone();
        let bv = self.vars.get_or_create(b, bt).clone();
        self.vars.assign(a, at, bv)?;
        self.vars.assign(b, bt, av)
    }

    // ---- DEF FN / DEFtype ----

    fn def_fn_stmt(&mut self) -> GwResult<()> {
        self.expect(Token::Fn as u8)?;
        let letter = self.cur_byte().to_ascii_uppercase();
        if !letter.is_ascii_alphabetic() {
            return Err(GwError::SyntaxError);
        }
        self.advance();
        if matches!(self.cur_byte(), b'%' | b'!' | b'#' | b'$') {
            self.advance();
        }
        self.skip_spaces();
        let param = if self.cur_byte() == b'(' {
            self.advance();
            let p = self.parse_varname();
            self.expect_rparen_pub()?;
            Some(p)
        } else {
            None
        };
        self.skip_spaces();
        self.expect(Token::Eq as u8)?;
        let body_cursor = self.cur;
        self.skip_to_stmt_end();
        let idx = (letter - b'A') as usize;
        self.fn_defs[idx] = Some(super::FnDef { param, body_cursor });
        Ok(())
    }

    fn deftype_stmt(&mut self, vtype: ValueType) -> GwResult<()> {
        loop {
            self.skip_spaces();
            let from = self.cur_byte().to_ascii_uppercase();
            self.advance();
            let mut to = from;
            self.skip_spaces();
            if self.cur_byte() == b'-' {
                self.advance();
                to = self.cur_byte().to_ascii_uppercase();
                self.advance();
            }
            self.deftypes.set_range(from, to, vtype);
            self.skip_spaces();
            if self.cur_byte() == b',' {
                self.advance();
                continue;
            }
            break;
        }
        Ok(())
    }

    // ---- RESUME ----

    fn resume_stmt(&mut self) -> GwResult<()> {
        self.advance();
        let resume_at = self.err_resume_cursor.take().ok_or(GwError::ResumeWithoutError)?;
        self.skip_spaces();
        self.in_error_handler = false;
        if self.at_embedded_number() {
            let line = self.eval_uint16()?;
            self.goto_line(line)
        } else if self.cur_byte() == Token::Next as u8 {
            self.advance();
            self.cur = resume_at;
            self.refresh_cur_tokens();
            self.skip_to_stmt_end();
            if self.cur_byte() == b':' {
                self.advance();
            } else if !self.advance_to_next_line() {
                self.running = false;
            }
            Ok(())
        } else {
            self.cur = resume_at;
            self.refresh_cur_tokens();
            Ok(())
        }
    }

    // ---- terminal/graphics forwarding ----

    fn locate_stmt(&mut self) -> GwResult<()> {
        self.skip_spaces();
        let row = if !matches!(self.cur_byte(), b',' | 0 | b':') { self.eval_int()? } else { self.terminal.cursor_row() as i16 };
        let mut col = self.terminal.cursor_col() as i16;
        self.skip_spaces();
        if self.cur_byte() == b',' {
            self.advance();
            self.skip_spaces();
            if !matches!(self.cur_byte(), b',' | 0 | b':') {
                col = self.eval_int()?;
            }
            // further optional cursor/start/stop args are accepted and
            // ignored: this terminal has no blink-rate concept.
            while self.cur_byte() == b',' {
                self.advance();
                if !matches!(self.cur_byte(), b',' | 0 | b':') {
                    let _ = self.eval_int()?;
                }
            }
        }
        self.terminal.locate(row.max(1) as u16, col.max(1) as u16);
        Ok(())
    }

    fn color_stmt(&mut self) -> GwResult<()> {
        self.skip_spaces();
        let fg = if !matches!(self.cur_byte(), b',' | 0 | b':') { self.eval_int()? } else { 7 };
        let mut bg = None;
        self.skip_spaces();
        if self.cur_byte() == b',' {
            self.advance();
            self.skip_spaces();
            if !matches!(self.cur_byte(), b',' | 0 | b':') {
                bg = Some(self.eval_int()?);
            }
            if self.cur_byte() == b',' {
                self.advance();
                let _ = self.eval_int()?;
            }
        }
        self.graphics.set_color(fg, bg);
        Ok(())
    }

    fn pset_stmt(&mut self, is_preset: bool) -> GwResult<()> {
        self.expect(b'(')?;
        let x = self.eval_int()? as i32;
        self.skip_spaces();
        self.expect(b',')?;
        let y = self.eval_int()? as i32;
        self.expect_rparen_pub()?;
        self.skip_spaces();
        let color = if self.cur_byte() == b',' {
            self.advance();
            Some(self.eval_int()?)
        } else {
            None
        };
        if is_preset {
            self.graphics.pset(x, y, color.or(Some(0)));
        } else {
            self.graphics.pset(x, y, color);
        }
        Ok(())
    }

    /// `KEY(n) ON/OFF/STOP` arms an individual soft-key trap; bare `KEY
    /// ON`/`OFF`/`LIST` only toggle the function-key display line, which
    /// this terminal contract has no concept of, so those are accepted
    /// and otherwise ignored.
    fn key_stmt(&mut self) -> GwResult<()> {
        self.skip_spaces();
        if self.cur_byte() == b'(' {
            self.advance();
            let key = self.eval_int()? as usize;
            self.expect_rparen_pub()?;
            self.skip_spaces();
            if self.cur_byte() == Token::On as u8 {
                self.advance();
                return self.key_on(key);
            }
            if self.cur_byte() == Token::Off as u8 {
                self.advance();
                return self.key_off(key);
            }
            if self.cur_byte() == Token::Stop as u8 {
                self.advance();
                return self.key_stop(key);
            }
            return Err(GwError::SyntaxError);
        }
        if self.cur_byte() == Token::On as u8 {
            self.advance();
            return Ok(());
        }
        if self.cur_byte() == Token::Off as u8 {
            self.advance();
            return Ok(());
        }
        if self.cur_byte() == Token::List as u8 {
            self.advance();
            return Ok(());
        }
        if self.at_embedded_number() {
            let key = self.eval_int()? as usize;
            let _ = key;
            self.skip_spaces();
            self.expect(b',')?;
            let _text = self.eval_str()?;
            return Ok(());
        }
        Err(GwError::SyntaxError)
    }

    // ---- file I/O statements ----

    /// `OPEN "file" FOR INPUT|OUTPUT|APPEND|RANDOM AS [#]n [LEN = r]`.
    /// `INPUT` is itself a tokenized keyword (`Token::Input`); the other
    /// three mode words and `AS`/`LEN` never made the keyword table, so
    /// CRUNCH leaves them as literal ASCII and this scans them as text.
    fn open_stmt(&mut self) -> GwResult<()> {
        self.skip_spaces();
        let path_val = self.eval_str()?;
        let path = String::from_utf8_lossy(path_val.as_str()?).into_owned();
        self.skip_spaces();
        self.expect(Token::For as u8)?;
        self.skip_spaces();
        let mode = if self.cur_byte() == Token::Input as u8 {
            self.advance();
            FileMode::Input
        } else {
            let mut word = Vec::new();
            while self.cur_byte().is_ascii_alphabetic() {
                word.push(self.cur_byte().to_ascii_uppercase());
                self.advance();
            }
            match word.as_slice() {
                b"OUTPUT" => FileMode::Output,
                b"APPEND" => FileMode::Append,
                b"RANDOM" => FileMode::Random,
                _ => return Err(GwError::BadFileMode),
            }
        };
        self.skip_spaces();
        self.expect_keyword_word(b"AS")?;
        self.skip_spaces();
        if self.cur_byte() == b'#' {
            self.advance();
        }
        let n = self.eval_int()?;

        let mut reclen = None;
        self.skip_spaces();
        if self.cur_byte() == b',' {
            self.advance();
            self.skip_spaces();
            if self.cur_byte() == token::PREFIX_FUNC {
                self.advance();
                if self.cur_byte() == crate::token::FuncToken::Len as u8 {
                    self.advance();
                }
            }
            self.skip_spaces();
            self.expect(Token::Eq as u8)?;
            reclen = Some(self.eval_int()? as u16);
        }

        if n < 1 || n as usize > self.files.len() {
            return Err(GwError::BadFileNumber);
        }
        if self.files[n as usize - 1].is_some() {
            return Err(GwError::FileAlreadyOpen);
        }
        let record_len = reclen.unwrap_or(128);
        let handle = self.filesystem.open(&path, mode, reclen)?;
        self.files[n as usize - 1] = Some(super::FileSlot { handle, mode, record_len, buffer: Vec::new(), fields: Vec::new() });
        Ok(())
    }

    fn expect_keyword_word(&mut self, word: &[u8]) -> GwResult<()> {
        self.skip_spaces();
        let mut got = Vec::new();
        while self.cur_byte().is_ascii_alphabetic() {
            got.push(self.cur_byte().to_ascii_uppercase());
            self.advance();
        }
        if got != word {
            return Err(GwError::SyntaxError);
        }
        Ok(())
    }

    fn close_stmt(&mut self) -> GwResult<()> {
        self.skip_spaces();
        if matches!(self.cur_byte(), 0 | b':') {
            for slot in self.files.iter_mut() {
                if let Some(s) = slot.take() {
                    let mut s = s;
                    let _ = self.filesystem.close(&mut s.handle);
                }
            }
            return Ok(());
        }
        loop {
            if self.cur_byte() == b'#' {
                self.advance();
            }
            let n = self.eval_int()?;
            if n >= 1 && (n as usize) <= self.files.len() {
                if let Some(mut s) = self.files[n as usize - 1].take() {
                    let _ = self.filesystem.close(&mut s.handle);
                }
            }
            self.skip_spaces();
            if self.cur_byte() == b',' {
                self.advance();
                continue;
            }
            break;
        }
        Ok(())
    }

    fn write_stmt(&mut self) -> GwResult<()> {
        let filenum = self.parse_opt_filenum()?;
        let mut parts = Vec::new();
        loop {
            let v = self.eval()?;
            parts.push(match v {
                Value::Str(s) => format!("\"{}\"", String::from_utf8_lossy(&s)),
                other => crate::value::format_number(&other).trim().to_string(),
            });
            self.skip_spaces();
            if self.cur_byte() == b',' {
                self.advance();
                continue;
            }
            break;
        }
        let line = format!("{}\r\n", parts.join(","));
        self.emit(filenum, &line);
        Ok(())
    }

    fn save_load_stmt(&mut self, which: Token) -> GwResult<()> {
        let path_val = self.eval_str()?;
        let path = String::from_utf8_lossy(path_val.as_str()?).into_owned();
        match which {
            Token::Save => {
                let mut text = String::new();
                for (n, tokens) in self.program.iter() {
                    text.push_str(&n.to_string());
                    text.push(' ');
                    text.push_str(&crate::tokenizer::list_line(tokens));
                    text.push_str("\r\n");
                }
                let mut h = self.filesystem.open(&path, FileMode::Output, None)?;
                self.filesystem.write_bytes(&mut h, text.as_bytes())?;
                self.filesystem.close(&mut h)
            }
            Token::Merge => {
                let mut h = self.filesystem.open(&path, FileMode::Input, None)?;
                let mut text = String::new();
                while let Some(line) = self.filesystem.read_line(&mut h)? {
                    text.push_str(&line);
                    text.push('\n');
                }
                self.filesystem.close(&mut h)?;
                self.load_program_text(&text)
            }
            _ => {
                self.program.clear();
                let mut h = self.filesystem.open(&path, FileMode::Input, None)?;
                let mut text = String::new();
                while let Some(line) = self.filesystem.read_line(&mut h)? {
                    text.push_str(&line);
                    text.push('\n');
                }
                self.filesystem.close(&mut h)?;
                self.load_program_text(&text)
            }
        }
    }

    /// `CHAIN ["MERGE"] "file" [,[line][,ALL][,DELETE from-to]]`: loads a
    /// new program the way `save_load_stmt`'s LOAD/MERGE arms do, carries
    /// forward the variables named in `COMMON` (or every variable, under
    /// `ALL`), optionally deletes a line range from the current program
    /// first, and starts at the given line (or the new program's first).
    fn chain_stmt(&mut self) -> GwResult<()> {
        self.skip_spaces();
        let merge = self.peek_keyword_word(b"MERGE");
        if merge {
            self.expect_keyword_word(b"MERGE")?;
            self.skip_spaces();
        }
        let path_val = self.eval_str()?;
        let path = String::from_utf8_lossy(path_val.as_str()?).into_owned();

        let mut start_line = None;
        let mut preserve_all = false;
        let mut delete_range = None;

        self.skip_spaces();
        if self.cur_byte() == b',' {
            self.advance();
            self.skip_spaces();
            if self.at_embedded_number() {
                start_line = Some(self.eval_uint16()?);
            }
            self.skip_spaces();
            if self.cur_byte() == b',' {
                self.advance();
                self.skip_spaces();
                if self.peek_keyword_word(b"ALL") {
                    self.expect_keyword_word(b"ALL")?;
                    preserve_all = true;
                    self.skip_spaces();
                    if self.cur_byte() == b',' {
                        self.advance();
                        self.skip_spaces();
                        self.expect_keyword_word(b"DELETE")?;
                        delete_range = Some(self.parse_delete_range()?);
                    }
                } else {
                    self.expect_keyword_word(b"DELETE")?;
                    delete_range = Some(self.parse_delete_range()?);
                }
            }
        }

        if let Some((from, to)) = delete_range {
            self.program.delete_range(from, to);
        }

        let keep: Vec<(VarName, ValueType, Value)> = if preserve_all {
            self.vars.iter().map(|(n, t, v)| (n, t, v.clone())).collect()
        } else {
            self.common_list.iter().filter_map(|&(n, t)| self.vars.get(n, t).map(|v| (n, t, v.clone()))).collect()
        };

        let mut h = self.filesystem.open(&path, FileMode::Input, None)?;
        let mut text = String::new();
        while let Some(line) = self.filesystem.read_line(&mut h)? {
            text.push_str(&line);
            text.push('\n');
        }
        self.filesystem.close(&mut h)?;

        if !merge {
            self.program.clear();
        }
        self.load_program_text(&text)?;

        self.reset_for_run();
        for (name, vtype, value) in keep {
            self.vars.assign(name, vtype, value)?;
        }
        let first = match start_line {
            Some(n) => n,
            None => self.program.first_line_number().ok_or(GwError::UndefinedLineNumber)?,
        };
        self.do_run_from(first)
    }

    /// Looks at the upcoming alphabetic word without consuming it.
    fn peek_keyword_word(&mut self, word: &[u8]) -> bool {
        let save = self.cur;
        let mut got = Vec::new();
        while self.cur_byte().is_ascii_alphabetic() {
            got.push(self.cur_byte().to_ascii_uppercase());
            self.advance();
        }
        self.cur = save;
        got == word
    }

    fn parse_delete_range(&mut self) -> GwResult<(u16, u16)> {
        self.skip_spaces();
        let from = self.eval_uint16()?;
        self.skip_spaces();
        self.expect(b'-')?;
        self.skip_spaces();
        let to = self.eval_uint16()?;
        Ok((from, to))
    }

    // ---- FIELD / LSET / RSET / GET / PUT ----

    /// Validates a 1-based BASIC file number against `self.files` and
    /// returns its 0-based index; shared by `FIELD`/`GET`/`PUT` so a
    /// stray `#0` or out-of-range number errors instead of underflowing
    /// the `- 1` below.
    fn file_slot_index(&self, n: i16) -> GwResult<usize> {
        if n < 1 || n as usize > self.files.len() {
            return Err(GwError::BadFileNumber);
        }
        Ok(n as usize - 1)
    }

    fn field_stmt(&mut self) -> GwResult<()> {
        self.skip_spaces();
        if self.cur_byte() == b'#' {
            self.advance();
        }
        let n = self.eval_int()?;
        let idx = self.file_slot_index(n)?;
        let record_len = self.files[idx].as_ref().ok_or(GwError::BadFileNumber)?.record_len as usize;
        {
            let slot = self.files[idx].as_mut().unwrap();
            slot.fields.clear();
            slot.buffer = vec![b' '; record_len];
        }
        let mut offset = 0usize;
        loop {
            self.skip_spaces();
            self.expect(b',')?;
            self.skip_spaces();
            let width = self.eval_int()? as usize;
            self.skip_spaces();
            self.expect_keyword_word(b"AS")?;
            self.skip_spaces();
            let (name, vtype) = self.parse_varname();
            if offset + width > record_len {
                return Err(GwError::FieldOverflow);
            }
            self.files[idx].as_mut().unwrap().fields.push((name, vtype, offset, width));
            offset += width;
            self.skip_spaces();
            if self.cur_byte() != b',' {
                break;
            }
        }
        Ok(())
    }

    /// `LSET`/`RSET var$ = expr`: pads `expr` to the named field's width
    /// (space-padded on the right for LSET, the left for RSET) and
    /// writes it into both the field's slice of its file's record
    /// buffer and the ordinary variable table, matching how a field
    /// variable reads back as a plain string between `FIELD` and the
    /// next `GET`/`PUT`.
    fn lset_rset_stmt(&mut self, left: bool) -> GwResult<()> {
        self.skip_spaces();
        let (name, vtype) = self.parse_varname();
        self.skip_spaces();
        self.expect(Token::Eq as u8)?;
        let v = self.eval_str()?;
        let src = v.as_str()?.to_vec();

        let mut target = None;
        for (i, slot) in self.files.iter().enumerate() {
            if let Some(slot) = slot {
                if let Some(&(_, _, offset, width)) = slot.fields.iter().find(|(n, _, _, _)| *n == name) {
                    target = Some((i, offset, width));
                    break;
                }
            }
        }

        let text = match target {
            Some((i, offset, width)) => {
                let padded = pad_field(width, &src, left);
                self.files[i].as_mut().unwrap().buffer[offset..offset + width].copy_from_slice(&padded);
                padded
            }
            None => src,
        };
        self.vars.assign(name, vtype, Value::Str(text))?;
        Ok(())
    }

    fn get_stmt(&mut self) -> GwResult<()> {
        let (n, record_no) = self.parse_filenum_and_record()?;
        let idx = self.file_slot_index(n)?;
        let record_len = self.files[idx].as_ref().ok_or(GwError::BadFileNumber)?.record_len as usize;
        if record_len == 0 {
            return Err(GwError::FieldOverflow);
        }
        let mut buf = vec![0u8; record_len];
        self.with_file(n, |fs, h| fs.read_record(h, record_no, &mut buf))?;

        let fields = self.files[idx].as_ref().unwrap().fields.clone();
        self.files[idx].as_mut().unwrap().buffer = buf;
        let buffer = self.files[idx].as_ref().unwrap().buffer.clone();
        for (name, vtype, offset, width) in fields {
            self.vars.assign(name, vtype, Value::Str(buffer[offset..offset + width].to_vec()))?;
        }
        Ok(())
    }

    fn put_stmt(&mut self) -> GwResult<()> {
        let (n, record_no) = self.parse_filenum_and_record()?;
        let idx = self.file_slot_index(n)?;
        let buf = self.files[idx].as_ref().map(|s| s.buffer.clone()).ok_or(GwError::BadFileNumber)?;
        if buf.is_empty() {
            return Err(GwError::FieldOverflow);
        }
        self.with_file(n, |fs, h| fs.write_record(h, record_no, &buf))
    }

    /// `#n[, record]` shared by GET/PUT; an omitted record number means
    /// "the one after the last GET/PUT", taken from the file's current
    /// `LOC`.
    fn parse_filenum_and_record(&mut self) -> GwResult<(i16, u32)> {
        self.skip_spaces();
        if self.cur_byte() == b'#' {
            self.advance();
        }
        let n = self.eval_int()?;
        self.skip_spaces();
        let record_no = if self.cur_byte() == b',' {
            self.advance();
            self.skip_spaces();
            let given = self.eval_int()?;
            if given < 1 {
                return Err(GwError::BadRecordNumber);
            }
            given as u32 - 1
        } else {
            self.with_file(n, |fs, h| fs.loc(h))?
        };
        Ok((n, record_no))
    }

    // ---- LIST ----

    fn list_stmt(&mut self) {
        self.skip_spaces();
        let start = if self.at_embedded_number() { self.read_embedded_number().ok().and_then(|v| v.to_f64().ok()).map(|f| f as u16) } else { None };
        let mut end = start;
        self.skip_spaces();
        if self.cur_byte() == b'-' {
            self.advance();
            self.skip_spaces();
            end = if self.at_embedded_number() { self.read_embedded_number().ok().and_then(|v| v.to_f64().ok()).map(|f| f as u16) } else { None };
        }
        for line in self.program.list_range(start, end) {
            self.terminal.write_str(&line);
            self.terminal.write_str("\r\n");
        }
    }

    // ---- extended (0xFE) statements ----

    fn dispatch_xstmt(&mut self, xtok: u8) -> GwResult<StepOutcome> {
        let Ok(x) = XStmtToken::try_from(xtok) else {
            return Err(GwError::SyntaxError);
        };
        match x {
            XStmtToken::Circle => {
                self.circle_stmt()?;
                Ok(StepOutcome::Continue)
            }
            XStmtToken::Draw => {
                let v = self.eval_str()?;
                self.graphics.draw(&String::from_utf8_lossy(v.as_str()?));
                Ok(StepOutcome::Continue)
            }
            XStmtToken::Play => {
                let v = self.eval_str()?;
                self.graphics.play(&String::from_utf8_lossy(v.as_str()?));
                Ok(StepOutcome::Continue)
            }
            XStmtToken::Paint => {
                self.paint_stmt()?;
                Ok(StepOutcome::Continue)
            }
            XStmtToken::Common => {
                loop {
                    self.skip_spaces();
                    let v = self.parse_varname();
                    self.common_list.push(v);
                    self.skip_spaces();
                    if self.cur_byte() == b',' {
                        self.advance();
                        continue;
                    }
                    break;
                }
                Ok(StepOutcome::Continue)
            }
            XStmtToken::Timer => {
                self.skip_spaces();
                // ON/OFF/STOP are plain tokens (0x94/0xDB/0x8F), not
                // literal text, since CRUNCH tokenizes them unconditionally.
                if self.cur_byte() == Token::On as u8 {
                    self.advance();
                    self.timer_on();
                } else if self.cur_byte() == Token::Off as u8 {
                    self.advance();
                    self.timer_off();
                } else if self.cur_byte() == Token::Stop as u8 {
                    self.advance();
                    self.timer_stop();
                } else {
                    return Err(GwError::SyntaxError);
                }
                Ok(StepOutcome::Continue)
            }
            XStmtToken::View | XStmtToken::Window | XStmtToken::Pmap | XStmtToken::Palette => {
                self.skip_to_stmt_end();
                Ok(StepOutcome::Continue)
            }
            XStmtToken::Field => {
                self.field_stmt()?;
                Ok(StepOutcome::Continue)
            }
            XStmtToken::Lset => {
                self.lset_rset_stmt(true)?;
                Ok(StepOutcome::Continue)
            }
            XStmtToken::Rset => {
                self.lset_rset_stmt(false)?;
                Ok(StepOutcome::Continue)
            }
            XStmtToken::Get => {
                self.get_stmt()?;
                Ok(StepOutcome::Continue)
            }
            XStmtToken::Put => {
                self.put_stmt()?;
                Ok(StepOutcome::Continue)
            }
            XStmtToken::Files | XStmtToken::Kill | XStmtToken::Name | XStmtToken::Chdir | XStmtToken::Mkdir
            | XStmtToken::Rmdir => {
                self.skip_to_stmt_end();
                Err(GwError::NotImplemented("filesystem directory statement"))
            }
            XStmtToken::Chain => {
                self.chain_stmt()?;
                Ok(StepOutcome::Continue)
            }
            XStmtToken::Shell | XStmtToken::System | XStmtToken::Reset | XStmtToken::Com
            | XStmtToken::Erdev | XStmtToken::Ioctl | XStmtToken::Environ | XStmtToken::Lcopy | XStmtToken::Calls
            | XStmtToken::Date | XStmtToken::Time => {
                self.skip_to_stmt_end();
                Err(GwError::NotImplemented("host/OS-facing statement"))
            }
        }
    }

    fn circle_stmt(&mut self) -> GwResult<()> {
        self.expect(b'(')?;
        let x = self.eval_int()? as i32;
        self.skip_spaces();
        self.expect(b',')?;
        let y = self.eval_int()? as i32;
        self.expect_rparen_pub()?;
        self.skip_spaces();
        self.expect(b',')?;
        let radius = self.eval_int()? as i32;
        let mut color = None;
        let mut start = None;
        let mut end = None;
        let mut aspect = None;
        for slot in [&mut color, &mut start, &mut end, &mut aspect] {
            self.skip_spaces();
            if self.cur_byte() != b',' {
                break;
            }
            self.advance();
            self.skip_spaces();
            if !matches!(self.cur_byte(), b',' | 0 | b':') {
                *slot = Some(self.eval_num()?.to_f64()?);
            }
        }
        self.graphics.circle(x, y, radius, color.map(|c| c as i16), start, end, aspect);
        Ok(())
    }

    fn paint_stmt(&mut self) -> GwResult<()> {
        self.expect(b'(')?;
        let x = self.eval_int()? as i32;
        self.skip_spaces();
        self.expect(b',')?;
        let y = self.eval_int()? as i32;
        self.expect_rparen_pub()?;
        self.skip_spaces();
        let mut color = None;
        let mut border = None;
        if self.cur_byte() == b',' {
            self.advance();
            self.skip_spaces();
            if !matches!(self.cur_byte(), b',' | 0 | b':') {
                color = Some(self.eval_int()?);
            }
            self.skip_spaces();
            if self.cur_byte() == b',' {
                self.advance();
                border = Some(self.eval_int()?);
            }
        }
        self.graphics.paint(x, y, color, border);
        Ok(())
    }
}

/// Space-pads (or truncates) `src` to `width`: `LSET` aligns left,
/// `RSET` aligns right, matching `field_set`'s behavior in the original.
fn pad_field(width: usize, src: &[u8], left: bool) -> Vec<u8> {
    let mut out = vec![b' '; width];
    let n = src.len().min(width);
    if left {
        out[..n].copy_from_slice(&src[..n]);
    } else {
        out[width - n..].copy_from_slice(&src[..n]);
    }
    out
}
