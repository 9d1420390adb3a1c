//! CRUNCH (text → tokens) and LIST (tokens → text), reimplementing the
//! CRUNCH/LIST routines from IBMRES.ASM.
//!
//! ```text
//! PRINT 2+SIN(3.14)
//! becomes
//! 0x90 [space] 0x12 0xE7 0xFF 0x88 0x28 0x1C <4 ieee bytes> 0x29
//! ```

use crate::error::{GwError, GwResult};
use crate::token::{self, KEYWORDS, PREFIX_FUNC, PREFIX_XFUNC, PREFIX_XSTMT};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

/// Matches the original's fixed crunch-buffer size; a source line that
/// tokenizes past this raises Line buffer overflow.
pub const MAX_LINE_LEN: usize = 255;

/// Tokenize one line of BASIC text into its byte-stream form. Does not
/// include a trailing NUL — callers that need a sentinel byte should
/// rely on `Vec::len()` instead, since program storage (`crate::program`)
/// tracks length explicitly.
pub fn crunch(text: &str) -> GwResult<Vec<u8>> {
    let bytes = text.as_bytes();
    let mut out = Vec::with_capacity(bytes.len() + 4);
    let mut ip = 0usize;
    let mut in_rem = false;
    let mut in_data = false;
    let mut in_string = false;

    while ip < bytes.len() {
        if out.len() >= MAX_LINE_LEN {
            return Err(GwError::LineBufferOverflow);
        }
        let ch = bytes[ip];

        if in_string {
            out.push(ch);
            if ch == b'"' {
                in_string = false;
            }
            ip += 1;
            continue;
        }

        if in_rem {
            out.push(ch);
            ip += 1;
            continue;
        }
        if in_data {
            if ch == b':' {
                in_data = false;
            } else {
                out.push(ch);
                ip += 1;
                continue;
            }
        }

        if ch == b'"' {
            in_string = true;
            out.push(ch);
            ip += 1;
            continue;
        }

        if ch == b'\'' {
            out.push(token::Token::Squote as u8);
            ip += 1;
            in_rem = true;
            continue;
        }

        if ch == b':' {
            out.push(b':');
            ip += 1;
            continue;
        }

        let single_char_op = match ch {
            b'+' => Some(token::Token::Plus as u8),
            b'-' => Some(token::Token::Minus as u8),
            b'*' => Some(token::Token::Mul as u8),
            b'/' => Some(token::Token::Div as u8),
            b'^' => Some(token::Token::Pow as u8),
            b'\\' => Some(token::Token::Idiv as u8),
            b'>' => Some(token::Token::Gt as u8),
            b'=' => Some(token::Token::Eq as u8),
            b'<' => Some(token::Token::Lt as u8),
            _ => None,
        };
        if let Some(tok) = single_char_op {
            out.push(tok);
            ip += 1;
            continue;
        }

        if ch.is_ascii_alphabetic() {
            if let Some((klen, kw)) = try_keyword(bytes, ip) {
                if kw.prefix != 0 {
                    out.push(kw.prefix);
                }
                out.push(kw.token);
                ip += klen;
                if kw.prefix == 0 && kw.token == token::Token::Rem as u8 {
                    in_rem = true;
                }
                if kw.prefix == 0 && kw.token == token::Token::Data as u8 {
                    in_data = true;
                }
                continue;
            }

            // Not a keyword: copy the whole variable name, then an
            // optional single type-suffix character.
            while ip < bytes.len() && (bytes[ip].is_ascii_alphanumeric() || bytes[ip] == b'.') {
                out.push(bytes[ip]);
                ip += 1;
                if out.len() >= MAX_LINE_LEN {
                    break;
                }
            }
            if ip < bytes.len() && matches!(bytes[ip], b'%' | b'!' | b'#' | b'$') {
                out.push(bytes[ip]);
                ip += 1;
            }
            continue;
        }

        if ch == b'&' {
            let next = bytes.get(ip + 1).copied().unwrap_or(0).to_ascii_uppercase();
            if next == b'H' {
                ip += 2;
                let start = ip;
                while ip < bytes.len() && bytes[ip].is_ascii_hexdigit() {
                    ip += 1;
                }
                let text = std::str::from_utf8(&bytes[start..ip]).unwrap_or("0");
                let val = i64::from_str_radix(text, 16).unwrap_or(0) as i16;
                emit_int2(&mut out, val);
                continue;
            }
            if next == b'O' || next.is_ascii_digit() {
                ip += if next == b'O' { 2 } else { 1 };
                let start = ip;
                while ip < bytes.len() && (b'0'..=b'7').contains(&bytes[ip]) {
                    ip += 1;
                }
                let text = std::str::from_utf8(&bytes[start..ip]).unwrap_or("0");
                let val = i64::from_str_radix(text, 8).unwrap_or(0) as i16;
                emit_int2(&mut out, val);
                continue;
            }
            out.push(ch);
            ip += 1;
            continue;
        }

        if ch.is_ascii_digit() || ch == b'.' {
            ip += emit_numeric_constant(&mut out, bytes, ip);
            continue;
        }

        // Spaces and every other byte (parens, commas, punctuation)
        // pass through verbatim.
        out.push(ch);
        ip += 1;
    }

    Ok(out)
}

fn emit_int2(out: &mut Vec<u8>, val: i16) {
    out.push(token::CONST_INT2);
    out.write_i16::<LittleEndian>(val).expect("Vec<u8> writes are infallible");
}

fn try_keyword(bytes: &[u8], pos: usize) -> Option<(usize, &'static token::KeywordEntry)> {
    let mut best_len = 0usize;
    let mut best = None;
    for kw in KEYWORDS {
        let kwb = kw.name.as_bytes();
        // Single-character non-alphabetic "keywords" don't exist in our
        // table (operators are handled directly above), so every entry
        // here starts with a letter.
        if kwb.len() <= best_len {
            continue;
        }
        if pos + kwb.len() > bytes.len() {
            continue;
        }
        let matches = kwb
            .iter()
            .enumerate()
            .all(|(j, &c)| bytes[pos + j].to_ascii_uppercase() == c);
        if !matches {
            continue;
        }
        let last = *kwb.last().unwrap();
        if last != b'(' && last != b'$' {
            if let Some(&next) = bytes.get(pos + kwb.len()) {
                if next.is_ascii_alphanumeric() || next == b'.' {
                    continue;
                }
            }
        }
        best_len = kwb.len();
        best = Some(kw);
    }
    best.map(|kw| (best_len, kw))
}

/// Parse one numeric literal starting at `bytes[ip]`, emit its embedded
/// constant token(s) into `out`, and return the number of input bytes
/// consumed.
fn emit_numeric_constant(out: &mut Vec<u8>, bytes: &[u8], ip: usize) -> usize {
    let mut scan = 0usize;
    let mut nbuf = String::new();
    let mut is_double = false;
    while scan < 32 && ip + scan < bytes.len() {
        let c = bytes[ip + scan];
        let upper = c.to_ascii_uppercase();
        if !(c.is_ascii_digit() || c == b'.' || c == b'+' || c == b'-' || upper == b'E' || upper == b'D') {
            break;
        }
        if (c == b'+' || c == b'-')
            && scan > 0
            && !matches!(bytes[ip + scan - 1].to_ascii_uppercase(), b'E' | b'D')
        {
            break;
        }
        if upper == b'D' {
            is_double = true;
            nbuf.push('E');
        } else {
            nbuf.push(c as char);
        }
        scan += 1;
    }

    let val: f64 = nbuf.parse().unwrap_or(0.0);
    let nlen = scan;
    let is_float = nbuf.contains('.') || (!is_double && nbuf.to_ascii_uppercase().contains('E'));

    let suffix = bytes.get(ip + nlen).copied().unwrap_or(0).to_ascii_uppercase();
    let mut consumed = nlen;
    if matches!(suffix, b'!' | b'#' | b'%') {
        consumed += 1;
    }

    if !is_float && !is_double && suffix != b'!' && suffix != b'#' {
        let lval = val as i64;
        if (-32768..=32767).contains(&lval) {
            let ival = lval as i16;
            if (0..=9).contains(&ival) {
                out.push(token::LITERAL_INT_BASE + ival as u8);
            } else if (10..=255).contains(&ival) {
                out.push(token::CONST_INT1);
                out.push(ival as u8);
            } else {
                emit_int2(out, ival);
            }
            return consumed;
        }
    }

    if is_double || suffix == b'#' {
        out.push(token::CONST_DBL);
        out.write_f64::<LittleEndian>(val).expect("Vec<u8> writes are infallible");
    } else {
        let fval = val as f32;
        out.push(token::CONST_SNG);
        out.write_f32::<LittleEndian>(fval).expect("Vec<u8> writes are infallible");
    }
    consumed
}

/// De-tokenize a token stream back into its canonical source text.
pub fn list_line(tokens: &[u8]) -> String {
    let mut out = String::new();
    let mut ip = 0usize;

    while ip < tokens.len() {
        let ch = tokens[ip];
        ip += 1;

        if matches!(ch, PREFIX_FUNC | PREFIX_XSTMT | PREFIX_XFUNC) {
            if ip < tokens.len() {
                let tok = tokens[ip];
                ip += 1;
                if let Some(name) = token::token_name(ch, tok) {
                    space_before_if_needed(&mut out);
                    out.push_str(name);
                }
            }
            continue;
        }

        if ch == token::CONST_INT2 && ip + 1 < tokens.len() {
            let val = (&tokens[ip..ip + 2]).read_i16::<LittleEndian>().expect("length checked above");
            ip += 2;
            out.push_str(&val.to_string());
            continue;
        }

        if (token::LITERAL_INT_BASE..=token::LITERAL_INT_MAX).contains(&ch) {
            out.push((b'0' + (ch - token::LITERAL_INT_BASE)) as char);
            continue;
        }

        if ch == token::CONST_INT1 && ip < tokens.len() {
            out.push_str(&tokens[ip].to_string());
            ip += 1;
            continue;
        }

        if ch == token::CONST_SNG && ip + 3 < tokens.len() {
            let fval = (&tokens[ip..ip + 4]).read_f32::<LittleEndian>().expect("length checked above");
            ip += 4;
            out.push_str(&format_shortest(fval as f64));
            continue;
        }

        if ch == token::CONST_DBL && ip + 7 < tokens.len() {
            let dval = (&tokens[ip..ip + 8]).read_f64::<LittleEndian>().expect("length checked above");
            ip += 8;
            out.push_str(&format_shortest(dval));
            continue;
        }

        if ch >= 0x80 {
            if let Some(name) = token::token_name(0, ch) {
                let starts_alpha = name.as_bytes()[0].is_ascii_alphabetic();
                if starts_alpha {
                    space_before_if_needed(&mut out);
                }
                out.push_str(name);
                let last = *name.as_bytes().last().unwrap();
                if last.is_ascii_alphabetic() {
                    out.push(' ');
                }
            }
            continue;
        }

        out.push(ch as char);
    }

    out
}

fn space_before_if_needed(out: &mut String) {
    if let Some(last) = out.chars().last() {
        if last.is_ascii_alphanumeric() {
            out.push(' ');
        }
    }
}

fn format_shortest(v: f64) -> String {
    let mut s = format!("{}", v);
    if s.ends_with(".0") {
        s.truncate(s.len() - 2);
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crunch_emits_minimal_width_integer_constants() {
        for v in 0u8..=9 {
            let out = crunch(&v.to_string()).unwrap();
            assert_eq!(out.len(), 1, "literal {v} should be one byte");
        }
        for v in [10i32, 255] {
            let out = crunch(&v.to_string()).unwrap();
            assert_eq!(out.len(), 2, "value {v} should be two bytes");
        }
        for v in [256i32, 32767, -1, -32768] {
            let out = crunch(&v.to_string()).unwrap();
            assert_eq!(out.len(), 3, "value {v} should be three bytes");
        }
    }

    #[test]
    fn crunch_recognizes_print_keyword() {
        let out = crunch("PRINT 1").unwrap();
        assert_eq!(out[0], token::Token::Print as u8);
    }

    #[test]
    fn crunch_keyword_requires_word_boundary() {
        // PRINTER should tokenize as a variable name, not PRINT+ER.
        let out = crunch("PRINTER").unwrap();
        assert_ne!(out[0], token::Token::Print as u8);
    }

    #[test]
    fn tokenize_list_round_trip_preserves_statement() {
        let text = "PRINT 1+2";
        let tokens = crunch(text).unwrap();
        let listed = list_line(&tokens);
        let retok = crunch(&listed).unwrap();
        assert_eq!(tokens, retok);
    }

    #[test]
    fn data_items_are_copied_literally_until_colon() {
        let out = crunch("DATA 1,2:PRINT").unwrap();
        // "1,2" should appear as literal ASCII bytes, not embedded
        // integer constants, up to the terminating colon.
        let data_tok = token::Token::Data as u8;
        let start = out.iter().position(|&b| b == data_tok).unwrap() + 1;
        assert_eq!(&out[start..start + 3], b"1,2");
    }

    #[test]
    fn hex_literal_tokenizes_to_int2() {
        let out = crunch("&HFF").unwrap();
        assert_eq!(out[0], token::CONST_INT2);
        assert_eq!(i16::from_le_bytes([out[1], out[2]]), 255);
    }
}
