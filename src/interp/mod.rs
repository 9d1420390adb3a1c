//! The interpreter core: program state, the statement dispatcher, the
//! expression evaluator, the run loop and event-trap polling.
//!
//! Split the way `interp.c` groups its own concerns, but the original's
//! single translation unit becomes four: [`eval`] (expression grammar),
//! [`dispatch`] (one function per statement), [`runloop`] (NEWSTT and
//! direct-mode execution) and [`traps`] (ON TIMER/ON KEY bookkeeping).
//! This module holds the `Interpreter` struct itself and the
//! byte-cursor primitives every other submodule drives it through.

mod dispatch;
mod eval;
mod runloop;
mod traps;

use byteorder::{LittleEndian, ReadBytesExt};
use crate::error::{GwError, GwResult};
use crate::program::{Cursor, ProgramStore, LINE_DIRECT};
use crate::shims::{FileMode, FileSystem, GraphicsSound, Terminal};
use crate::token::{self, CONST_DBL, CONST_INT2};
use crate::tokenizer;
use crate::value::Value;
use crate::vars::{ArrayTable, DefTypeTable, VarName, VarTable};

pub use traps::EventTrap;

/// What the run loop should do after one statement completes.
pub(super) enum StepOutcome {
    Continue,
    Halt,
}

/// `FOR`/`NEXT` stack entry; matches `for_entry_t`.
#[derive(Debug, Clone)]
struct ForFrame {
    var: VarName,
    vtype: crate::value::ValueType,
    limit: Value,
    step: Value,
    loop_cursor: Cursor,
}

/// `GOSUB`/`RETURN` stack entry.
#[derive(Debug, Clone, Copy)]
struct GosubFrame {
    ret_cursor: Cursor,
    /// Set when this frame was entered by an event trap firing, so
    /// `RETURN` can clear the trap's "running" latch (§4.6).
    trap: Option<TrapKind>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TrapKind {
    Timer,
    Key(usize),
}

/// `WHILE`/`WEND` stack entry: points at the `WHILE` token itself so
/// `WEND` can jump back and re-evaluate the condition.
#[derive(Debug, Clone, Copy)]
struct WhileFrame {
    while_cursor: Cursor,
}

/// One `DEF FN` definition: an optional single parameter and the saved
/// position of the function body expression.
#[derive(Debug, Clone)]
struct FnDef {
    param: Option<(VarName, crate::value::ValueType)>,
    body_cursor: Cursor,
}

struct FileSlot<H> {
    handle: H,
    mode: FileMode,
    /// Random-access record length (`LEN=`, default 128); also the
    /// `FIELD` buffer's size once a `FIELD` statement targets this file.
    record_len: u16,
    /// The most recent record read by `GET` or written by `PUT`; `FIELD`
    /// carves it into named slices, `LSET`/`RSET` write into those
    /// slices directly.
    buffer: Vec<u8>,
    /// `(name, type, offset, width)` per `FIELD`-declared variable, in
    /// declaration order.
    fields: Vec<(VarName, crate::value::ValueType, usize, usize)>,
}

/// Owns every piece of interpreter state and the three external-facing
/// shims (§6). Generic over the shim implementations so the CLI binary
/// wires up `PosixTerminal`/`StdFileSystem`/`NoopGraphicsSound` while
/// tests wire up their recording/no-op counterparts.
pub struct Interpreter<T: Terminal, F: FileSystem, G: GraphicsSound> {
    pub(crate) program: ProgramStore,
    pub(crate) vars: VarTable,
    pub(crate) arrays: ArrayTable,
    pub(crate) deftypes: DefTypeTable,

    for_stack: Vec<ForFrame>,
    gosub_stack: Vec<GosubFrame>,
    while_stack: Vec<WhileFrame>,
    fn_defs: [Option<FnDef>; 26],

    data_cursor: Option<Cursor>,
    /// `true` once `data_cursor` sits exactly on the next item's text
    /// (just past a `DATA` token or a separating comma); `false` means
    /// the next `READ` must first scan forward for a `DATA` clause.
    data_ready: bool,

    on_error_line: u16,
    in_error_handler: bool,
    err_resume_cursor: Option<Cursor>,
    pub(crate) last_err_number: u16,
    pub(crate) last_err_line: u16,

    cont_cursor: Option<Cursor>,

    common_list: Vec<(VarName, crate::value::ValueType)>,

    files: Vec<Option<FileSlot<F::Handle>>>,

    cur: Cursor,
    cur_tokens: Vec<u8>,
    direct_tokens: Vec<u8>,
    pub(crate) running: bool,
    trace_on: bool,

    rnd_seed: u32,
    rnd_last: f64,

    timer_trap: EventTrap,
    timer_interval: std::time::Duration,
    timer_last: std::time::Instant,
    key_traps: [EventTrap; 10],

    pub terminal: T,
    pub filesystem: F,
    pub graphics: G,
}

/// Up to 15 open file numbers (1..=15), matching the original's
/// `MAX_FILES`.
const MAX_FILES: usize = 15;
const MAX_FOR_DEPTH: usize = 16;
const MAX_GOSUB_DEPTH: usize = 24;
const MAX_WHILE_DEPTH: usize = 16;

impl<T: Terminal, F: FileSystem, G: GraphicsSound> Interpreter<T, F, G> {
    pub fn new(terminal: T, filesystem: F, graphics: G) -> Self {
        Interpreter {
            program: ProgramStore::new(),
            vars: VarTable::new(),
            arrays: ArrayTable::new(),
            deftypes: DefTypeTable::new(),
            for_stack: Vec::new(),
            gosub_stack: Vec::new(),
            while_stack: Vec::new(),
            fn_defs: std::array::from_fn(|_| None),
            data_cursor: None,
            data_ready: false,
            on_error_line: 0,
            in_error_handler: false,
            err_resume_cursor: None,
            last_err_number: 0,
            last_err_line: 0,
            cont_cursor: None,
            common_list: Vec::new(),
            files: (0..MAX_FILES).map(|_| None).collect(),
            cur: Cursor::direct(0),
            cur_tokens: Vec::new(),
            direct_tokens: Vec::new(),
            running: false,
            trace_on: false,
            rnd_seed: 1,
            rnd_last: 0.0,
            timer_trap: EventTrap::default(),
            timer_interval: std::time::Duration::from_secs(1),
            timer_last: std::time::Instant::now(),
            key_traps: std::array::from_fn(|_| EventTrap::default()),
            terminal,
            filesystem,
            graphics,
        }
    }

    /// Tokenize and store one numbered line, or a tokenized direct
    /// statement if `number` is `None` (§4.4/§4.5).
    pub fn enter_line(&mut self, number: Option<u16>, text: &str) -> GwResult<()> {
        let tokens = tokenizer::crunch(text)?;
        match number {
            Some(n) => {
                self.program.store_line(n, tokens);
                Ok(())
            }
            None => self.exec_direct(tokens),
        }
    }

    /// Load an entire program from its `LIST`-style text (one numbered
    /// line per line), replacing anything currently stored. Used by
    /// `LOAD`/`MERGE` and the CLI's file-argument autorun.
    pub fn load_program_text(&mut self, text: &str) -> GwResult<()> {
        for raw in text.lines() {
            let line = raw.trim_end();
            if line.is_empty() {
                continue;
            }
            let (num_text, rest) = split_leading_number(line);
            let number: u16 = num_text.parse().map_err(|_| GwError::SyntaxError)?;
            let tokens = tokenizer::crunch(rest.trim_start())?;
            self.program.store_line(number, tokens);
        }
        Ok(())
    }

    pub fn is_empty_program(&self) -> bool {
        self.program.is_empty()
    }

    // ---- byte-cursor primitives (CHRGET/CHRGOT family) ----

    fn cur_byte(&self) -> u8 {
        self.cur_tokens.get(self.cur.offset).copied().unwrap_or(0)
    }

    fn peek_byte(&self, ahead: usize) -> u8 {
        self.cur_tokens.get(self.cur.offset + ahead).copied().unwrap_or(0)
    }

    fn advance(&mut self) {
        if self.cur.offset < self.cur_tokens.len() {
            self.cur.offset += 1;
        }
    }

    fn chrget(&mut self) -> u8 {
        self.advance();
        self.cur_byte()
    }

    fn skip_spaces(&mut self) {
        while self.cur_byte() == b' ' {
            self.advance();
        }
    }

    fn expect(&mut self, token: u8) -> GwResult<()> {
        self.skip_spaces();
        if self.cur_byte() != token {
            return Err(GwError::SyntaxError);
        }
        self.advance();
        Ok(())
    }

    fn is_letter(b: u8) -> bool {
        b.is_ascii_alphabetic()
    }

    fn at_embedded_number(&self) -> bool {
        (CONST_INT2..=CONST_DBL).contains(&self.cur_byte())
    }

    /// Read an embedded numeric constant token (`0x0E`..`0x1F`) without
    /// going through the full expression grammar; used for line-number
    /// arguments and as the evaluator's numeric-literal atom.
    fn read_embedded_number(&mut self) -> GwResult<Value> {
        let b = self.cur_byte();
        match b {
            token::CONST_INT2 => {
                self.advance();
                let mut buf = [0u8; 2];
                for b in &mut buf {
                    *b = self.cur_byte();
                    self.advance();
                }
                Ok(Value::Int((&buf[..]).read_i16::<LittleEndian>().expect("buf is exactly 2 bytes")))
            }
            token::CONST_INT1 => {
                self.advance();
                let v = self.cur_byte();
                self.advance();
                Ok(Value::Int(v as i16))
            }
            token::CONST_SNG => {
                self.advance();
                let mut buf = [0u8; 4];
                for b in &mut buf {
                    *b = self.cur_byte();
                    self.advance();
                }
                Ok(Value::Sng((&buf[..]).read_f32::<LittleEndian>().expect("buf is exactly 4 bytes")))
            }
            token::CONST_DBL => {
                self.advance();
                let mut buf = [0u8; 8];
                for b in &mut buf {
                    *b = self.cur_byte();
                    self.advance();
                }
                Ok(Value::Dbl((&buf[..]).read_f64::<LittleEndian>().expect("buf is exactly 8 bytes")))
            }
            b if (token::LITERAL_INT_BASE..=token::LITERAL_INT_MAX).contains(&b) => {
                self.advance();
                Ok(Value::Int((b - token::LITERAL_INT_BASE) as i16))
            }
            _ => Err(GwError::SyntaxError),
        }
    }

    fn eval_uint16(&mut self) -> GwResult<u16> {
        let v = self.read_embedded_number()?;
        let f = v.to_f64()?;
        if !(0.0..=65529.0).contains(&f) {
            return Err(GwError::UndefinedLineNumber);
        }
        Ok(f as u16)
    }

    /// Parse a variable name directly out of the token stream: letters,
    /// digits and dots are significant to the tokenizer only up to two
    /// characters, but every character must still be consumed here so
    /// the cursor lands past the whole identifier; an optional trailing
    /// `%!#$` overrides the DEF-type default.
    fn parse_varname(&mut self) -> (VarName, crate::value::ValueType) {
        let mut raw = Vec::new();
        while self.cur_byte().is_ascii_alphanumeric() || self.cur_byte() == b'.' {
            raw.push(self.cur_byte());
            self.advance();
        }
        let explicit = match self.cur_byte() {
            b'%' => Some(crate::value::ValueType::Int),
            b'!' => Some(crate::value::ValueType::Sng),
            b'#' => Some(crate::value::ValueType::Dbl),
            b'$' => Some(crate::value::ValueType::Str),
            _ => None,
        };
        if explicit.is_some() {
            self.advance();
        }
        let b0 = raw.first().copied().unwrap_or(b' ').to_ascii_uppercase();
        let b1 = raw.get(1).copied().unwrap_or(0).to_ascii_uppercase();
        let name = VarName([b0, b1]);
        let vtype = explicit.unwrap_or_else(|| self.deftypes.get(b0));
        (name, vtype)
    }

    // ---- cursor navigation across lines ----

    fn refresh_cur_tokens(&mut self) {
        self.cur_tokens = if self.cur.line == LINE_DIRECT {
            self.direct_tokens.clone()
        } else {
            self.program.get(self.cur.line).map(|s| s.to_vec()).unwrap_or_default()
        };
    }

    fn goto_line(&mut self, line: u16) -> GwResult<()> {
        if !self.program.contains(line) {
            return Err(GwError::UndefinedLineNumber);
        }
        self.cur = Cursor::new(line, 0);
        self.refresh_cur_tokens();
        Ok(())
    }

    fn advance_to_next_line(&mut self) -> bool {
        match self.program.next_line_number(Some(self.cur.line)) {
            Some(n) => {
                self.cur = Cursor::new(n, 0);
                self.refresh_cur_tokens();
                true
            }
            None => false,
        }
    }

    /// Skip to the end of the current statement (`:`, `ELSE`, or end of
    /// line), honoring embedded constants and quoted strings so a
    /// literal `:` inside a string or float isn't mistaken for a
    /// separator.
    fn skip_to_stmt_end(&mut self) {
        loop {
            let ch = self.cur_byte();
            if ch == 0 || ch == b':' || ch == token::Token::Else as u8 {
                return;
            }
            self.skip_one_lexeme();
        }
    }

    fn skip_one_lexeme(&mut self) {
        let ch = self.cur_byte();
        match ch {
            token::CONST_INT2 => {
                for _ in 0..3 {
                    self.advance();
                }
            }
            token::CONST_INT1 => {
                for _ in 0..2 {
                    self.advance();
                }
            }
            token::CONST_SNG => {
                for _ in 0..5 {
                    self.advance();
                }
            }
            token::CONST_DBL => {
                for _ in 0..9 {
                    self.advance();
                }
            }
            b'"' => {
                self.advance();
                while self.cur_byte() != 0 && self.cur_byte() != b'"' {
                    self.advance();
                }
                if self.cur_byte() == b'"' {
                    self.advance();
                }
            }
            b if b == token::PREFIX_FUNC || b == token::PREFIX_XSTMT || b == token::PREFIX_XFUNC => {
                self.advance();
                self.advance();
            }
            _ => self.advance(),
        }
    }

    /// Run a closure against an open file's handle plus the filesystem
    /// shim, keyed by the 1-based BASIC file number. Disjoint-field
    /// borrow of `self.files`/`self.filesystem` avoids routing through
    /// a method that would otherwise tie up the whole `&mut self`.
    pub(crate) fn with_file<R>(
        &mut self,
        number: i16,
        f: impl FnOnce(&mut F, &mut F::Handle) -> GwResult<R>,
    ) -> GwResult<R> {
        if number < 1 || number as usize > self.files.len() {
            return Err(GwError::BadFileNumber);
        }
        let slot = self.files[number as usize - 1].as_mut().ok_or(GwError::BadFileNumber)?;
        f(&mut self.filesystem, &mut slot.handle)
    }

    pub(crate) fn file_mode(&self, number: i16) -> GwResult<FileMode> {
        if number < 1 || number as usize > self.files.len() {
            return Err(GwError::BadFileNumber);
        }
        self.files[number as usize - 1].as_ref().map(|s| s.mode).ok_or(GwError::BadFileNumber)
    }

    fn reset_for_run(&mut self) {
        self.vars.clear();
        self.arrays.clear();
        self.fn_defs = std::array::from_fn(|_| None);
        self.for_stack.clear();
        self.gosub_stack.clear();
        self.while_stack.clear();
        self.data_cursor = None;
        self.data_ready = false;
        self.cont_cursor = None;
        self.on_error_line = 0;
        self.in_error_handler = false;
    }
}

/// Split `"10 PRINT X"` into `("10", " PRINT X")`.
fn split_leading_number(line: &str) -> (&str, &str) {
    let end = line.find(|c: char| !c.is_ascii_digit()).unwrap_or(line.len());
    line.split_at(end)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shims::{NoopGraphicsSound, RecordingTerminal, StdFileSystem};

    fn run(program: &str) -> String {
        let mut interp = Interpreter::new(RecordingTerminal::new(), StdFileSystem, NoopGraphicsSound);
        interp.load_program_text(program).unwrap();
        interp.enter_line(None, "RUN").unwrap();
        interp.terminal.output.clone()
    }

    #[test]
    fn for_next_basic_loop() {
        let out = run("10 FOR I=1 TO 3\n20 PRINT I\n30 NEXT\n");
        assert_eq!(out, " 1 \r\n 2 \r\n 3 \r\n");
    }

    #[test]
    fn print_trailing_semicolon_suppresses_newline() {
        let out = run("10 FOR I=1 TO 3\n20 PRINT I;\n30 NEXT\n");
        assert_eq!(out, " 1  2  3 ");
    }

    #[test]
    fn print_comma_pads_to_next_print_zone() {
        let out = run("10 PRINT 1,2\n");
        let expected = format!(" 1 {}{}", " ".repeat(11), " 2 \r\n");
        assert_eq!(out, expected);
        assert!(!out.contains('\t'));
    }

    #[test]
    fn for_next_zero_trip() {
        let out = run("10 FOR I=1 TO 0\n20 PRINT I\n30 NEXT\n40 PRINT \"DONE\"\n");
        assert_eq!(out, "DONE\r\n");
    }

    #[test]
    fn for_next_negative_step_runs_twice() {
        let out = run("10 FOR I=1 TO 0 STEP -1\n20 PRINT I\n30 NEXT\n");
        assert_eq!(out, " 1 \r\n 0 \r\n");
    }

    #[test]
    fn integer_overflow_traps() {
        let out = run("10 PRINT 32767+1\n");
        assert!(out.contains("Overflow"), "output was {out:?}");
    }

    #[test]
    fn type_suffixes_are_distinct_variables() {
        let out = run("10 A%=5\n20 A!=2.5\n30 PRINT A%;A!\n");
        assert_eq!(out, " 5  2.5 \r\n");
    }

    #[test]
    fn resume_next_continues_at_following_statement() {
        let out = run(
            "10 ON ERROR GOTO 100\n20 PRINT 1/0\n30 END\n100 PRINT \"GOT\";ERR: RESUME NEXT\n",
        );
        assert_eq!(out, "GOT 11 \r\n");
    }

    #[test]
    fn if_then_else_chooses_the_false_branch() {
        let out = run("10 IF 0 THEN PRINT \"Y\" ELSE PRINT \"N\"\n");
        assert_eq!(out, "N\r\n");
    }

    #[test]
    fn def_fn_single_expression() {
        let out = run("10 DEF FN F(X) = X*X+1\n20 PRINT FN F(4)\n");
        assert_eq!(out, " 17 \r\n");
    }

    #[test]
    fn data_read_walks_items_in_source_order() {
        let out = run("10 DATA 1,\"hi\",3\n20 READ A,B$,C: PRINT A;B$;C\n");
        assert_eq!(out, " 1 hi 3 \r\n");
    }

    #[test]
    fn data_read_skips_over_unrelated_commas_on_the_same_line() {
        // the comma in `PRINT A,B` must not be mistaken for a DATA separator
        let out = run("10 A=9: B=8: PRINT A,B: DATA 1,2\n20 READ X,Y: PRINT X;Y\n");
        let expected = format!(" 9 {}{}\r\n 1  2 \r\n", " ".repeat(11), " 8 ");
        assert_eq!(out, expected);
    }

    #[test]
    fn data_read_spans_multiple_lines_and_exhausts() {
        let out = run(
            "10 DATA 1,2\n20 DATA 3\n30 READ A,B,C: PRINT A;B;C\n40 READ D\n",
        );
        assert!(out.contains(" 1  2  3 \r\n"), "output was {out:?}");
        assert!(out.contains("Out of DATA"), "output was {out:?}");
    }

    #[test]
    fn restore_resets_the_data_cursor() {
        let out = run(
            "10 DATA 1,2\n20 READ A,B: PRINT A;B\n30 RESTORE\n40 READ C: PRINT C\n",
        );
        assert_eq!(out, " 1  2 \r\n 1 \r\n");
    }

    #[test]
    fn field_lset_put_get_round_trip() {
        let path = std::env::temp_dir().join("gwbasic_field_round_trip.dat");
        let _ = std::fs::remove_file(&path);
        let program = format!(
            "10 OPEN \"{p}\" FOR RANDOM AS #1,LEN=10\n20 FIELD #1,10 AS A$\n30 LSET A$=\"HI\"\n40 PUT #1,1\n50 GET #1,1\n60 PRINT A$\n70 CLOSE #1\n",
            p = path.display()
        );
        let out = run(&program);
        let _ = std::fs::remove_file(&path);
        assert_eq!(out, format!("HI{}\r\n", " ".repeat(8)));
    }

    #[test]
    fn chain_preserves_common_variables() {
        let chained_path = std::env::temp_dir().join("gwbasic_chain_target.bas");
        std::fs::write(&chained_path, "100 PRINT X;Y\n").unwrap();
        let program = format!(
            "10 COMMON X\n20 X=1: Y=2\n30 CHAIN \"{p}\"\n",
            p = chained_path.display()
        );
        let out = run(&program);
        let _ = std::fs::remove_file(&chained_path);
        assert_eq!(out, " 1  0 \r\n");
    }
}
