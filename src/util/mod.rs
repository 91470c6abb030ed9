//! Shared utilities (output macros, connection settings, MySQL defaults-file parsing).

pub mod mysql;

/// Write a line to the given writer, converting io::Error to FixError.
macro_rules! wprintln {
    ($w:expr) => {
        writeln!($w).map_err(|e| $crate::FixError::Io(e.to_string()))
    };
    ($w:expr, $($arg:tt)*) => {
        writeln!($w, $($arg)*).map_err(|e| $crate::FixError::Io(e.to_string()))
    };
}

/// Write (without newline) to the given writer, converting io::Error to FixError.
macro_rules! wprint {
    ($w:expr, $($arg:tt)*) => {
        write!($w, $($arg)*).map_err(|e| $crate::FixError::Io(e.to_string()))
    };
}

pub(crate) use wprint;
pub(crate) use wprintln;
