//! Diagnostic catalogue.
//!
//! Variant grouping and wording follow `BcStatus` in
//! `examples/original_source/include/bc.h` so that error text matches the
//! real `bc`/`dc` byte for byte. `CalcError` is the one error type used
//! throughout the number engine, lexer, parser, VM and library façade;
//! the library façade additionally maps it to a stable ordinal (`BcError`)
//! for ABI consumers (see `library.rs`).

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CalcError {
    // --- lexing ---
    #[error("bad character at line {line}")]
    LexInvalidToken { line: usize },
    #[error("string end could not be found")]
    LexNoStringEnd,
    #[error("comment end could not be found")]
    LexNoCommentEnd,
    #[error("end of file reached")]
    LexEof,

    // --- parsing ---
    #[error("bad token at line {line}")]
    ParseInvalidToken { line: usize },
    #[error("bad expression")]
    ParseInvalidExpr,
    #[error("bad print statement")]
    ParseInvalidPrint,
    #[error("bad function definition")]
    ParseInvalidFunc,
    #[error("bad assignment: left side must be variable, array element, or `ibase`/`obase`/`scale`/`last`")]
    ParseInvalidAssign,
    #[error("no auto variable found")]
    ParseNoAuto,
    #[error("quit")]
    ParseQuit,
    #[error("function parameters or auto variables have the same name")]
    ParseDuplicateLocal,
    #[error("unexpected end of file")]
    ParseEof,

    // --- math ---
    #[error("negative number")]
    MathNegative,
    #[error("non integer number")]
    MathNonInteger,
    #[error("overflow")]
    MathOverflow,
    #[error("divide by zero")]
    MathDivideByZero,
    #[error("square root of a negative number")]
    MathNegSqrt,
    #[error("invalid number string")]
    MathInvalidString,
    #[error("cannot truncate a number this way")]
    MathInvalidTruncate,

    // --- execution ---
    #[error("could not open file: {0}")]
    ExecFileErr(String),
    #[error("mismatched parameters")]
    ExecMismatchedParams,
    #[error("undefined function: {0}")]
    ExecUndefinedFunc(String),
    #[error("undefined variable: {0}")]
    ExecUndefinedVar(String),
    #[error("undefined array: {0}")]
    ExecUndefinedArray(String),
    #[error("invalid scale: must be in [0, {limit}]")]
    ExecInvalidScale { limit: u32 },
    #[error("invalid ibase: must be in [2, {limit}]")]
    ExecInvalidIbase { limit: u32 },
    #[error("invalid obase: must be in [2, {limit}]")]
    ExecInvalidObase { limit: u32 },
    #[error("invalid statement")]
    ExecInvalidStmt,
    #[error("invalid expression")]
    ExecInvalidExpr,
    #[error("string too long: must be less than {limit} characters")]
    ExecStringLen { limit: u32 },
    #[error("invalid name")]
    ExecInvalidName,
    #[error("array too long: must be less than {limit} items")]
    ExecArrayLength { limit: u32 },
    #[error("read() call inside of a read() call")]
    ExecRecursiveRead,
    #[error("could not print number")]
    ExecPrintErr,
    #[error("invalid lvalue")]
    ExecInvalidLvalue,
    #[error("stack has too few elements")]
    ExecInvalidStack,
    #[error("halt")]
    ExecHalt,
    #[error("wrong type of item on stack for this operation")]
    ExecInvalidType,
    #[error("invalid constant")]
    ExecInvalidConstant,
    #[error("invalid label")]
    ExecInvalidLabel,
    #[error("read() expression is not valid")]
    ExecInvalidReadExpr,
    #[error("return statement found outside function")]
    ExecInvalidReturn,

    // --- generic syntax errors, for parser/compiler diagnostics that
    // don't warrant their own BcStatus-shaped variant ---
    #[error("{0}")]
    Syntax(String),

    // --- POSIX warnings (strict mode, non-fatal unless -s) ---
    #[error("POSIX does not allow names longer than 1 character: {0}")]
    PosixNameLen(String),
    #[error("POSIX does not allow '#' script comments")]
    PosixScriptComment,
    #[error("POSIX does not allow the following keyword: {0}")]
    PosixInvalidKeyword(String),
    #[error("POSIX does not allow a period ('.') as a shortcut for `last`")]
    PosixDotLast,
    #[error("POSIX requires parentheses around return expressions")]
    PosixReturnParens,
    #[error("POSIX does not allow boolean operators")]
    PosixBoolOps,
    #[error("POSIX does not allow a relational operator outside of an `if`/`while`/`for` statement")]
    PosixRelOutside,
    #[error("POSIX does not allow more than one relational operator per expression")]
    PosixMultipleRel,
    #[error("POSIX requires an init clause in a `for` loop")]
    PosixMissingForInit,
    #[error("POSIX requires an condition clause in a `for` loop")]
    PosixMissingForCond,
    #[error("POSIX requires an update clause in a `for` loop")]
    PosixMissingForUpdate,

    // --- library / ABI (not in BcStatus, needed by the handle arena) ---
    #[error("invalid context")]
    InvalidContext,
    #[error("invalid number handle")]
    InvalidNum,
    #[error("signal received")]
    SignalReceived,
    #[error("allocation failed")]
    Fatal,
}

impl CalcError {
    /// Whether this corresponds to a POSIX-strict-mode warning rather
    /// than a hard error: under `-w` these are printed and execution
    /// continues, under `-s` they abort like any other error.
    pub fn is_posix_warning(&self) -> bool {
        matches!(
            self,
            CalcError::PosixNameLen(_)
                | CalcError::PosixScriptComment
                | CalcError::PosixInvalidKeyword(_)
                | CalcError::PosixDotLast
                | CalcError::PosixReturnParens
                | CalcError::PosixBoolOps
                | CalcError::PosixRelOutside
                | CalcError::PosixMultipleRel
                | CalcError::PosixMissingForInit
                | CalcError::PosixMissingForCond
                | CalcError::PosixMissingForUpdate
        )
    }
}

impl CalcError {
    /// Process exit code a standalone `bc`/`dc` driver should report for
    /// this error, per §6: 1 math, 2 parse, 3 exec, 4 fatal
    /// (alloc/IO/signal). POSIX warnings only reach here when running
    /// under `-s`, where they are treated as parse-time rejections.
    pub fn exit_code(&self) -> i32 {
        match self {
            CalcError::MathNegative
            | CalcError::MathNonInteger
            | CalcError::MathOverflow
            | CalcError::MathDivideByZero
            | CalcError::MathNegSqrt
            | CalcError::MathInvalidString
            | CalcError::MathInvalidTruncate => 1,

            CalcError::LexInvalidToken { .. }
            | CalcError::LexNoStringEnd
            | CalcError::LexNoCommentEnd
            | CalcError::LexEof
            | CalcError::ParseInvalidToken { .. }
            | CalcError::ParseInvalidExpr
            | CalcError::ParseInvalidPrint
            | CalcError::ParseInvalidFunc
            | CalcError::ParseInvalidAssign
            | CalcError::ParseNoAuto
            | CalcError::ParseQuit
            | CalcError::ParseDuplicateLocal
            | CalcError::ParseEof
            | CalcError::Syntax(_)
            | CalcError::PosixNameLen(_)
            | CalcError::PosixScriptComment
            | CalcError::PosixInvalidKeyword(_)
            | CalcError::PosixDotLast
            | CalcError::PosixReturnParens
            | CalcError::PosixBoolOps
            | CalcError::PosixRelOutside
            | CalcError::PosixMultipleRel
            | CalcError::PosixMissingForInit
            | CalcError::PosixMissingForCond
            | CalcError::PosixMissingForUpdate => 2,

            CalcError::ExecFileErr(_)
            | CalcError::ExecMismatchedParams
            | CalcError::ExecUndefinedFunc(_)
            | CalcError::ExecUndefinedVar(_)
            | CalcError::ExecUndefinedArray(_)
            | CalcError::ExecInvalidScale { .. }
            | CalcError::ExecInvalidIbase { .. }
            | CalcError::ExecInvalidObase { .. }
            | CalcError::ExecInvalidStmt
            | CalcError::ExecInvalidExpr
            | CalcError::ExecStringLen { .. }
            | CalcError::ExecInvalidName
            | CalcError::ExecArrayLength { .. }
            | CalcError::ExecRecursiveRead
            | CalcError::ExecPrintErr
            | CalcError::ExecInvalidLvalue
            | CalcError::ExecInvalidStack
            | CalcError::ExecHalt
            | CalcError::ExecInvalidType
            | CalcError::ExecInvalidConstant
            | CalcError::ExecInvalidLabel
            | CalcError::ExecInvalidReadExpr
            | CalcError::ExecInvalidReturn => 3,

            CalcError::InvalidContext | CalcError::InvalidNum | CalcError::SignalReceived | CalcError::Fatal => 4,
        }
    }
}

impl From<String> for CalcError {
    fn from(s: String) -> Self {
        CalcError::Syntax(s)
    }
}

pub type CalcResult<T> = Result<T, CalcError>;
