//! Shared environment/config plumbing for the `bc` and `dc` command-line
//! drivers (§6). Kept as a small hand-rolled helper module rather than an
//! argument-parsing crate: the CLI surface itself is an explicit Non-goal
//! of the core spec, so only as much of it is built as is needed to drive
//! the engine from a terminal.

use crate::vm::DEFAULT_LINE_LENGTH;

/// Reads `BC_LINE_LENGTH` from the environment: a decimal integer >= 2,
/// or 0 to disable wrapping entirely. Falls back to the documented
/// default (70) on anything unset or malformed, matching real `bc`'s
/// tolerance of a bad environment rather than refusing to start.
pub fn env_line_length() -> usize {
    match std::env::var("BC_LINE_LENGTH") {
        Ok(s) => match s.trim().parse::<usize>() {
            Ok(0) => 0,
            Ok(n) if n >= 2 => n,
            _ => DEFAULT_LINE_LENGTH,
        },
        Err(_) => DEFAULT_LINE_LENGTH,
    }
}

/// Splits `BC_ENV_ARGS` on whitespace into argv-style words. Real `bc`
/// supports quoting in this variable; this implementation covers the
/// common whitespace-separated-flags case and is not a full shell
/// word-splitter.
pub fn env_args() -> Vec<String> {
    std::env::var("BC_ENV_ARGS")
        .ok()
        .map(|s| s.split_whitespace().map(str::to_string).collect())
        .unwrap_or_default()
}

/// `POSIXLY_CORRECT` forces the same strict-POSIX behavior as `-s`.
pub fn posixly_correct() -> bool {
    std::env::var_os("POSIXLY_CORRECT").is_some()
}

/// Initializes `env_logger` iff `RUST_LOG` is set, so the CLI stays
/// silent by default and only turns on tracing when explicitly asked.
pub fn init_logging() {
    if std::env::var_os("RUST_LOG").is_some() {
        let _ = env_logger::try_init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_length_defaults_without_env() {
        std::env::remove_var("BC_LINE_LENGTH");
        assert_eq!(env_line_length(), DEFAULT_LINE_LENGTH);
    }

    #[test]
    fn env_args_splits_on_whitespace() {
        std::env::set_var("BC_ENV_ARGS", "-w  -l");
        assert_eq!(env_args(), vec!["-w".to_string(), "-l".to_string()]);
        std::env::remove_var("BC_ENV_ARGS");
    }
}
