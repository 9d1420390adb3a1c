//! The GW-BASIC numbered error taxonomy and its propagation type.
//!
//! Error numbers and canonical messages match `ERRTAB` from the original
//! assembly-derived interpreter; see the numbered variants below.

use thiserror::Error;

/// Every fallible step in the interpreter returns `Result<T, GwError>`.
///
/// The run loop (`interp::runloop`) is the sole place an `Err` here is
/// turned into either an `ON ERROR` transfer or a direct-mode report,
/// per the non-local-unwind design note: it is the one anchor, cursors
/// are saved before each dispatch, and `in_handler` toggles around the
/// transfer.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GwError {
    #[error("NEXT without FOR")]
    NextWithoutFor,
    #[error("Syntax error")]
    SyntaxError,
    #[error("RETURN without GOSUB")]
    ReturnWithoutGosub,
    #[error("Out of DATA")]
    OutOfData,
    #[error("Illegal function call")]
    IllegalFunctionCall,
    #[error("Overflow")]
    Overflow,
    #[error("Out of memory")]
    OutOfMemory,
    #[error("Undefined line number")]
    UndefinedLineNumber,
    #[error("Subscript out of range")]
    SubscriptOutOfRange,
    #[error("Duplicate Definition")]
    DuplicateDefinition,
    #[error("Division by zero")]
    DivisionByZero,
    #[error("Illegal direct")]
    IllegalDirect,
    #[error("Type mismatch")]
    TypeMismatch,
    #[error("Out of string space")]
    OutOfStringSpace,
    #[error("String too long")]
    StringTooLong,
    #[error("String formula too complex")]
    StringFormulaTooComplex,
    #[error("Can't continue")]
    CantContinue,
    #[error("Undefined user function")]
    UndefinedUserFunction,
    #[error("No RESUME")]
    NoResume,
    #[error("RESUME without error")]
    ResumeWithoutError,
    #[error("Unprintable error")]
    UnprintableError,
    #[error("Missing operand")]
    MissingOperand,
    #[error("Line buffer overflow")]
    LineBufferOverflow,
    #[error("Device Timeout")]
    DeviceTimeout,
    #[error("Device Fault")]
    DeviceFault,
    #[error("FOR without NEXT")]
    ForWithoutNext,
    #[error("Out of Paper")]
    OutOfPaper,
    #[error("WHILE without WEND")]
    WhileWithoutWend,
    #[error("WEND without WHILE")]
    WendWithoutWhile,

    #[error("FIELD overflow")]
    FieldOverflow,
    #[error("Internal error")]
    InternalError,
    #[error("Bad file number")]
    BadFileNumber,
    #[error("File not found")]
    FileNotFound,
    #[error("Bad file mode")]
    BadFileMode,
    #[error("File already open")]
    FileAlreadyOpen,
    #[error("Device I/O Error")]
    DeviceIoError,
    #[error("File already exists")]
    FileAlreadyExists,
    #[error("Disk full")]
    DiskFull,
    #[error("Input past end")]
    InputPastEnd,
    #[error("Bad record number")]
    BadRecordNumber,
    #[error("Bad file name")]
    BadFileName,
    #[error("Direct statement in file")]
    DirectStatementInFile,
    #[error("Too many files")]
    TooManyFiles,
    #[error("Disk already exists")]
    DiskAlreadyExists,
    #[error("Path not found")]
    PathNotFound,

    /// A statement or function this crate deliberately does not implement
    /// at the core layer (e.g. a graphics primitive with no back end).
    #[error("not implemented: {0}")]
    NotImplemented(&'static str),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl GwError {
    /// The canonical `ERRTAB` number, or `None` for host-level variants
    /// that have no GW-BASIC error number (`ERROR n` cannot raise them).
    pub fn code(&self) -> Option<u16> {
        use GwError::*;
        Some(match self {
            NextWithoutFor => 1,
            SyntaxError => 2,
            ReturnWithoutGosub => 3,
            OutOfData => 4,
            IllegalFunctionCall => 5,
            Overflow => 6,
            OutOfMemory => 7,
            UndefinedLineNumber => 8,
            SubscriptOutOfRange => 9,
            DuplicateDefinition => 10,
            DivisionByZero => 11,
            IllegalDirect => 12,
            TypeMismatch => 13,
            OutOfStringSpace => 14,
            StringTooLong => 15,
            StringFormulaTooComplex => 16,
            CantContinue => 17,
            UndefinedUserFunction => 18,
            NoResume => 19,
            ResumeWithoutError => 20,
            UnprintableError => 21,
            MissingOperand => 22,
            LineBufferOverflow => 23,
            DeviceTimeout => 24,
            DeviceFault => 25,
            ForWithoutNext => 26,
            OutOfPaper => 27,
            WhileWithoutWend => 29,
            WendWithoutWhile => 30,
            FieldOverflow => 50,
            InternalError => 51,
            BadFileNumber => 52,
            FileNotFound => 53,
            BadFileMode => 54,
            FileAlreadyOpen => 56,
            DeviceIoError => 58,
            FileAlreadyExists => 60,
            DiskFull => 62,
            InputPastEnd => 63,
            BadRecordNumber => 64,
            BadFileName => 65,
            DirectStatementInFile => 67,
            TooManyFiles => 68,
            DiskAlreadyExists => 70,
            PathNotFound => 76,
            NotImplemented(_) | Io(_) => return None,
        })
    }

    /// Construct the error raised by `ERROR n` for a numeric code, or
    /// `UnprintableError` if `n` is not a member of the closed taxonomy.
    pub fn from_code(n: u16) -> GwError {
        use GwError::*;
        match n {
            1 => NextWithoutFor,
            2 => SyntaxError,
            3 => ReturnWithoutGosub,
            4 => OutOfData,
            5 => IllegalFunctionCall,
            6 => Overflow,
            7 => OutOfMemory,
            8 => UndefinedLineNumber,
            9 => SubscriptOutOfRange,
            10 => DuplicateDefinition,
            11 => DivisionByZero,
            12 => IllegalDirect,
            13 => TypeMismatch,
            14 => OutOfStringSpace,
            15 => StringTooLong,
            16 => StringFormulaTooComplex,
            17 => CantContinue,
            18 => UndefinedUserFunction,
            19 => NoResume,
            20 => ResumeWithoutError,
            21 => UnprintableError,
            22 => MissingOperand,
            23 => LineBufferOverflow,
            24 => DeviceTimeout,
            25 => DeviceFault,
            26 => ForWithoutNext,
            27 => OutOfPaper,
            29 => WhileWithoutWend,
            30 => WendWithoutWhile,
            50 => FieldOverflow,
            51 => InternalError,
            52 => BadFileNumber,
            53 => FileNotFound,
            54 => BadFileMode,
            56 => FileAlreadyOpen,
            58 => DeviceIoError,
            60 => FileAlreadyExists,
            62 => DiskFull,
            63 => InputPastEnd,
            64 => BadRecordNumber,
            65 => BadFileName,
            67 => DirectStatementInFile,
            68 => TooManyFiles,
            70 => DiskAlreadyExists,
            76 => PathNotFound,
            _ => UnprintableError,
        }
    }
}

pub type GwResult<T> = Result<T, GwError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_round_trips_through_from_code() {
        for n in [1u16, 6, 11, 13, 52, 76] {
            let err = GwError::from_code(n);
            assert_eq!(err.code(), Some(n));
        }
    }

    #[test]
    fn unknown_code_is_unprintable() {
        assert_eq!(GwError::from_code(99), GwError::UnprintableError);
    }

    #[test]
    fn host_errors_have_no_code() {
        assert_eq!(GwError::NotImplemented("PLAY").code(), None);
    }
}
