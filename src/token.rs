//! The token table: name↔byte mapping for keywords, operators and
//! built-in function names, across the four disjoint opcode spaces
//! plain (0x80..0xF9), and the three prefixed spaces reached through
//! 0xFD (extended functions), 0xFE (extended statements) and 0xFF
//! (built-in functions).
//!
//! Byte values are taken from the token table derived from IBMRES.ASM;
//! CRUNCH and LIST (`crate::tokenizer`) are the only consumers of the
//! lookup tables here.

use num_enum::{IntoPrimitive, TryFromPrimitive};

/// Prefix byte for the 0xFD-extended function space (CVI, MKI$, ...).
pub const PREFIX_XFUNC: u8 = 0xFD;
/// Prefix byte for the 0xFE-extended statement space (FILES, CIRCLE, ...).
pub const PREFIX_XSTMT: u8 = 0xFE;
/// Prefix byte for the 0xFF built-in function space (LEFT$, INSTR, ...).
pub const PREFIX_FUNC: u8 = 0xFF;

/// Statement separator. Not a tokenized opcode; passes through CRUNCH
/// verbatim.
pub const COLON: u8 = b':';

/// 2-byte embedded integer constant: token followed by little-endian i16.
pub const CONST_INT2: u8 = 0x0E;
/// 1-byte embedded integer constant 0..255.
pub const CONST_INT1: u8 = 0x0F;
/// Literal integers 0..9 occupy 0x11..0x1A with no trailing data byte.
pub const LITERAL_INT_BASE: u8 = 0x11;
pub const LITERAL_INT_MAX: u8 = 0x1A;
/// 4-byte IEEE-754 single-precision constant follows.
pub const CONST_SNG: u8 = 0x1C;
/// 8-byte IEEE-754 double-precision constant follows.
pub const CONST_DBL: u8 = 0x1F;

/// Plain single-byte opcodes: statements, non-statement keywords and
/// operators. Occupies 0x80..0xF2; the gaps (padding in the original
/// assembly table) are simply absent variants.
#[derive(Debug, Copy, Clone, Eq, PartialEq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
#[allow(clippy::upper_case_acronyms)]
pub enum Token {
    End = 0x80,
    For = 0x81,
    Next = 0x82,
    Data = 0x83,
    Input = 0x84,
    Dim = 0x85,
    Read = 0x86,
    Let = 0x87,
    Goto = 0x88,
    Run = 0x89,
    If = 0x8A,
    Restore = 0x8B,
    Gosub = 0x8C,
    Return = 0x8D,
    Rem = 0x8E,
    Stop = 0x8F,
    Print = 0x90,
    Clear = 0x91,
    List = 0x92,
    New = 0x93,
    On = 0x94,
    Wait = 0x95,
    Def = 0x96,
    Poke = 0x97,
    Cont = 0x98,
    Out = 0x9B,
    Lprint = 0x9C,
    Llist = 0x9D,
    Width = 0x9F,
    Else = 0xA0,
    Tron = 0xA1,
    Troff = 0xA2,
    Swap = 0xA3,
    Erase = 0xA4,
    Edit = 0xA5,
    Error = 0xA6,
    Resume = 0xA7,
    Delete = 0xA8,
    Auto = 0xA9,
    Renum = 0xAA,
    Defstr = 0xAB,
    Defint = 0xAC,
    Defsng = 0xAD,
    Defdbl = 0xAE,
    Line = 0xAF,
    While = 0xB0,
    Wend = 0xB1,
    Call = 0xB2,
    Write = 0xB6,
    Option = 0xB7,
    Randomize = 0xB8,
    Open = 0xB9,
    Close = 0xBA,
    Load = 0xBB,
    Merge = 0xBC,
    Save = 0xBD,
    Color = 0xBE,
    Cls = 0xBF,
    Motor = 0xC0,
    Bsave = 0xC1,
    Bload = 0xC2,
    Sound = 0xC3,
    Beep = 0xC4,
    Pset = 0xC5,
    Preset = 0xC6,
    Screen = 0xC7,
    Key = 0xC8,
    Locate = 0xC9,

    To = 0xCA,
    Then = 0xCB,
    Tab = 0xCC,
    Step = 0xCD,
    Usr = 0xCE,
    Fn = 0xCF,
    Spc = 0xD0,
    Not = 0xD1,
    Erl = 0xD2,
    Err = 0xD3,
    StringDollar = 0xD4,
    Using = 0xD5,
    Instr = 0xD6,
    Squote = 0xD7,
    Varptr = 0xD8,
    Csrlin = 0xD9,
    Point = 0xDA,
    Off = 0xDB,
    InkeyDollar = 0xDC,

    Gt = 0xE4,
    Eq = 0xE5,
    Lt = 0xE6,
    Plus = 0xE7,
    Minus = 0xE8,
    Mul = 0xE9,
    Div = 0xEA,
    Pow = 0xEB,
    And = 0xEC,
    Or = 0xED,
    Xor = 0xEE,
    Eqv = 0xEF,
    Imp = 0xF0,
    Mod = 0xF1,
    Idiv = 0xF2,
}

/// Built-in function tokens behind the 0xFF prefix.
#[derive(Debug, Copy, Clone, Eq, PartialEq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
#[allow(clippy::upper_case_acronyms)]
pub enum FuncToken {
    Left = 0x80,
    Right = 0x81,
    Mid = 0x82,
    Sgn = 0x83,
    Int = 0x84,
    Abs = 0x85,
    Sqr = 0x86,
    Rnd = 0x87,
    Sin = 0x88,
    Log = 0x89,
    Exp = 0x8A,
    Cos = 0x8B,
    Tan = 0x8C,
    Atn = 0x8D,
    Fre = 0x8E,
    Inp = 0x8F,
    Pos = 0x90,
    Len = 0x91,
    Str = 0x92,
    Val = 0x93,
    Asc = 0x94,
    Chr = 0x95,
    Peek = 0x96,
    Space = 0x97,
    Oct = 0x98,
    Hex = 0x99,
    Lpos = 0x9A,
    Cint = 0x9B,
    Csng = 0x9C,
    Cdbl = 0x9D,
    Fix = 0x9E,
    Pen = 0x9F,
    Stick = 0xA0,
    Strig = 0xA1,
    Eof = 0xA2,
    Loc = 0xA3,
    Lof = 0xA4,
}

/// Extended statement tokens behind the 0xFE prefix.
#[derive(Debug, Copy, Clone, Eq, PartialEq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
#[allow(clippy::upper_case_acronyms)]
pub enum XStmtToken {
    Files = 0x80,
    Field = 0x81,
    System = 0x82,
    Name = 0x83,
    Lset = 0x84,
    Rset = 0x85,
    Kill = 0x86,
    Put = 0x87,
    Get = 0x88,
    Reset = 0x89,
    Common = 0x8A,
    Chain = 0x8B,
    Date = 0x8C,
    Time = 0x8D,
    Paint = 0x8E,
    Com = 0x8F,
    Circle = 0x90,
    Draw = 0x91,
    Play = 0x92,
    Timer = 0x93,
    Erdev = 0x94,
    Ioctl = 0x95,
    Chdir = 0x96,
    Mkdir = 0x97,
    Rmdir = 0x98,
    Shell = 0x99,
    Environ = 0x9A,
    View = 0x9B,
    Window = 0x9C,
    Pmap = 0x9D,
    Palette = 0x9E,
    Lcopy = 0x9F,
    Calls = 0xA0,
}

/// Extended function tokens behind the 0xFD prefix; all MBF-file-I/O
/// facing (§6).
#[derive(Debug, Copy, Clone, Eq, PartialEq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
#[allow(clippy::upper_case_acronyms)]
pub enum XFuncToken {
    Cvi = 0x80,
    Cvs = 0x81,
    Cvd = 0x82,
    Mki = 0x83,
    Mks = 0x84,
    Mkd = 0x85,
}

/// One entry of the keyword lookup table: spelling, token byte and
/// prefix (0 for the plain space).
#[derive(Debug, Copy, Clone)]
pub struct KeywordEntry {
    pub name: &'static str,
    pub token: u8,
    pub prefix: u8,
}

macro_rules! kw {
    ($name:expr, $token:expr) => {
        KeywordEntry { name: $name, token: $token as u8, prefix: 0 }
    };
    ($name:expr, $token:expr, $prefix:expr) => {
        KeywordEntry { name: $name, token: $token as u8, prefix: $prefix }
    };
}

/// The full keyword table, in the longest-match-wins order CRUNCH
/// requires (the table is searched exhaustively for the longest
/// matching name, so declaration order does not matter for
/// correctness, only for readability here).
pub static KEYWORDS: &[KeywordEntry] = &[
    // Plain statement tokens.
    kw!("END", Token::End),
    kw!("FOR", Token::For),
    kw!("NEXT", Token::Next),
    kw!("DATA", Token::Data),
    kw!("INPUT", Token::Input),
    kw!("DIM", Token::Dim),
    kw!("READ", Token::Read),
    kw!("LET", Token::Let),
    kw!("GOTO", Token::Goto),
    kw!("RUN", Token::Run),
    kw!("IF", Token::If),
    kw!("RESTORE", Token::Restore),
    kw!("GOSUB", Token::Gosub),
    kw!("RETURN", Token::Return),
    kw!("REM", Token::Rem),
    kw!("STOP", Token::Stop),
    kw!("PRINT", Token::Print),
    kw!("CLEAR", Token::Clear),
    kw!("LIST", Token::List),
    kw!("NEW", Token::New),
    kw!("ON", Token::On),
    kw!("WAIT", Token::Wait),
    kw!("DEF", Token::Def),
    kw!("POKE", Token::Poke),
    kw!("CONT", Token::Cont),
    kw!("OUT", Token::Out),
    kw!("LPRINT", Token::Lprint),
    kw!("LLIST", Token::Llist),
    kw!("WIDTH", Token::Width),
    kw!("ELSE", Token::Else),
    kw!("TRON", Token::Tron),
    kw!("TROFF", Token::Troff),
    kw!("SWAP", Token::Swap),
    kw!("ERASE", Token::Erase),
    kw!("EDIT", Token::Edit),
    kw!("ERROR", Token::Error),
    kw!("RESUME", Token::Resume),
    kw!("DELETE", Token::Delete),
    kw!("AUTO", Token::Auto),
    kw!("RENUM", Token::Renum),
    kw!("DEFSTR", Token::Defstr),
    kw!("DEFINT", Token::Defint),
    kw!("DEFSNG", Token::Defsng),
    kw!("DEFDBL", Token::Defdbl),
    kw!("LINE", Token::Line),
    kw!("WHILE", Token::While),
    kw!("WEND", Token::Wend),
    kw!("CALL", Token::Call),
    kw!("WRITE", Token::Write),
    kw!("OPTION", Token::Option),
    kw!("RANDOMIZE", Token::Randomize),
    kw!("OPEN", Token::Open),
    kw!("CLOSE", Token::Close),
    kw!("LOAD", Token::Load),
    kw!("MERGE", Token::Merge),
    kw!("SAVE", Token::Save),
    kw!("COLOR", Token::Color),
    kw!("CLS", Token::Cls),
    kw!("MOTOR", Token::Motor),
    kw!("BSAVE", Token::Bsave),
    kw!("BLOAD", Token::Bload),
    kw!("SOUND", Token::Sound),
    kw!("BEEP", Token::Beep),
    kw!("PSET", Token::Pset),
    kw!("PRESET", Token::Preset),
    kw!("SCREEN", Token::Screen),
    kw!("KEY", Token::Key),
    kw!("LOCATE", Token::Locate),
    // Non-statement keywords.
    kw!("TO", Token::To),
    kw!("THEN", Token::Then),
    kw!("TAB(", Token::Tab),
    kw!("STEP", Token::Step),
    kw!("USR", Token::Usr),
    kw!("FN", Token::Fn),
    kw!("SPC(", Token::Spc),
    kw!("NOT", Token::Not),
    kw!("ERL", Token::Erl),
    kw!("ERR", Token::Err),
    kw!("STRING$", Token::StringDollar),
    kw!("USING", Token::Using),
    kw!("INSTR", Token::Instr),
    kw!("VARPTR", Token::Varptr),
    kw!("CSRLIN", Token::Csrlin),
    kw!("POINT", Token::Point),
    kw!("OFF", Token::Off),
    kw!("INKEY$", Token::InkeyDollar),
    // Logical/bitwise operators (alphabetic, so they go through the
    // keyword path rather than the single-char operator path).
    kw!("AND", Token::And),
    kw!("OR", Token::Or),
    kw!("XOR", Token::Xor),
    kw!("EQV", Token::Eqv),
    kw!("IMP", Token::Imp),
    kw!("MOD", Token::Mod),
    // Built-in functions (0xFF prefix).
    kw!("LEFT$", FuncToken::Left, PREFIX_FUNC),
    kw!("RIGHT$", FuncToken::Right, PREFIX_FUNC),
    kw!("MID$", FuncToken::Mid, PREFIX_FUNC),
    kw!("SGN", FuncToken::Sgn, PREFIX_FUNC),
    kw!("INT", FuncToken::Int, PREFIX_FUNC),
    kw!("ABS", FuncToken::Abs, PREFIX_FUNC),
    kw!("SQR", FuncToken::Sqr, PREFIX_FUNC),
    kw!("RND", FuncToken::Rnd, PREFIX_FUNC),
    kw!("SIN", FuncToken::Sin, PREFIX_FUNC),
    kw!("LOG", FuncToken::Log, PREFIX_FUNC),
    kw!("EXP", FuncToken::Exp, PREFIX_FUNC),
    kw!("COS", FuncToken::Cos, PREFIX_FUNC),
    kw!("TAN", FuncToken::Tan, PREFIX_FUNC),
    kw!("ATN", FuncToken::Atn, PREFIX_FUNC),
    kw!("FRE", FuncToken::Fre, PREFIX_FUNC),
    kw!("INP", FuncToken::Inp, PREFIX_FUNC),
    kw!("POS", FuncToken::Pos, PREFIX_FUNC),
    kw!("LEN", FuncToken::Len, PREFIX_FUNC),
    kw!("STR$", FuncToken::Str, PREFIX_FUNC),
    kw!("VAL", FuncToken::Val, PREFIX_FUNC),
    kw!("ASC", FuncToken::Asc, PREFIX_FUNC),
    kw!("CHR$", FuncToken::Chr, PREFIX_FUNC),
    kw!("PEEK", FuncToken::Peek, PREFIX_FUNC),
    kw!("SPACE$", FuncToken::Space, PREFIX_FUNC),
    kw!("OCT$", FuncToken::Oct, PREFIX_FUNC),
    kw!("HEX$", FuncToken::Hex, PREFIX_FUNC),
    kw!("LPOS", FuncToken::Lpos, PREFIX_FUNC),
    kw!("CINT", FuncToken::Cint, PREFIX_FUNC),
    kw!("CSNG", FuncToken::Csng, PREFIX_FUNC),
    kw!("CDBL", FuncToken::Cdbl, PREFIX_FUNC),
    kw!("FIX", FuncToken::Fix, PREFIX_FUNC),
    kw!("PEN", FuncToken::Pen, PREFIX_FUNC),
    kw!("STICK", FuncToken::Stick, PREFIX_FUNC),
    kw!("STRIG", FuncToken::Strig, PREFIX_FUNC),
    kw!("EOF", FuncToken::Eof, PREFIX_FUNC),
    kw!("LOC", FuncToken::Loc, PREFIX_FUNC),
    kw!("LOF", FuncToken::Lof, PREFIX_FUNC),
    // Extended statements (0xFE prefix).
    kw!("FILES", XStmtToken::Files, PREFIX_XSTMT),
    kw!("FIELD", XStmtToken::Field, PREFIX_XSTMT),
    kw!("SYSTEM", XStmtToken::System, PREFIX_XSTMT),
    kw!("NAME", XStmtToken::Name, PREFIX_XSTMT),
    kw!("LSET", XStmtToken::Lset, PREFIX_XSTMT),
    kw!("RSET", XStmtToken::Rset, PREFIX_XSTMT),
    kw!("KILL", XStmtToken::Kill, PREFIX_XSTMT),
    kw!("PUT", XStmtToken::Put, PREFIX_XSTMT),
    kw!("GET", XStmtToken::Get, PREFIX_XSTMT),
    kw!("RESET", XStmtToken::Reset, PREFIX_XSTMT),
    kw!("COMMON", XStmtToken::Common, PREFIX_XSTMT),
    kw!("CHAIN", XStmtToken::Chain, PREFIX_XSTMT),
    kw!("DATE$", XStmtToken::Date, PREFIX_XSTMT),
    kw!("TIME$", XStmtToken::Time, PREFIX_XSTMT),
    kw!("PAINT", XStmtToken::Paint, PREFIX_XSTMT),
    kw!("COM", XStmtToken::Com, PREFIX_XSTMT),
    kw!("CIRCLE", XStmtToken::Circle, PREFIX_XSTMT),
    kw!("DRAW", XStmtToken::Draw, PREFIX_XSTMT),
    kw!("PLAY", XStmtToken::Play, PREFIX_XSTMT),
    kw!("TIMER", XStmtToken::Timer, PREFIX_XSTMT),
    kw!("ERDEV", XStmtToken::Erdev, PREFIX_XSTMT),
    kw!("IOCTL", XStmtToken::Ioctl, PREFIX_XSTMT),
    kw!("CHDIR", XStmtToken::Chdir, PREFIX_XSTMT),
    kw!("MKDIR", XStmtToken::Mkdir, PREFIX_XSTMT),
    kw!("RMDIR", XStmtToken::Rmdir, PREFIX_XSTMT),
    kw!("SHELL", XStmtToken::Shell, PREFIX_XSTMT),
    kw!("ENVIRON$", XStmtToken::Environ, PREFIX_XSTMT),
    kw!("VIEW", XStmtToken::View, PREFIX_XSTMT),
    kw!("WINDOW", XStmtToken::Window, PREFIX_XSTMT),
    kw!("PMAP", XStmtToken::Pmap, PREFIX_XSTMT),
    kw!("PALETTE", XStmtToken::Palette, PREFIX_XSTMT),
    kw!("LCOPY", XStmtToken::Lcopy, PREFIX_XSTMT),
    kw!("CALLS", XStmtToken::Calls, PREFIX_XSTMT),
    // Extended functions (0xFD prefix).
    kw!("CVI", XFuncToken::Cvi, PREFIX_XFUNC),
    kw!("CVS", XFuncToken::Cvs, PREFIX_XFUNC),
    kw!("CVD", XFuncToken::Cvd, PREFIX_XFUNC),
    kw!("MKI$", XFuncToken::Mki, PREFIX_XFUNC),
    kw!("MKS$", XFuncToken::Mks, PREFIX_XFUNC),
    kw!("MKD$", XFuncToken::Mkd, PREFIX_XFUNC),
];

/// Look up a keyword's canonical text given its token byte and prefix
/// (0 for the plain space). Used by LIST.
pub fn token_name(prefix: u8, token: u8) -> Option<&'static str> {
    KEYWORDS
        .iter()
        .find(|k| k.prefix == prefix && k.token == token)
        .map(|k| k.name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_and_prefixed_spaces_stay_disjoint_by_construction() {
        // FUNC_LEN (0x91 under 0xFF) and TOK_CLEAR (0x91 plain) must
        // resolve to different keywords because prefix is part of the
        // lookup key.
        assert_eq!(token_name(0, 0x91), Some("CLEAR"));
        assert_eq!(token_name(PREFIX_FUNC, 0x91), Some("LEN"));
    }

    #[test]
    fn every_keyword_resolves_back_to_its_token() {
        for k in KEYWORDS {
            assert_eq!(token_name(k.prefix, k.token), Some(k.name));
        }
    }
}
