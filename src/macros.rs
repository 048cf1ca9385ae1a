#![allow(unused_macros)]

/// Builds a [`crate::Error::Malformed`] carrying the source location of the
/// detection site.
///
/// ```rust, ignore
///  return Err(malformed_error!("Row count {} exceeds stream size", rows));
/// ```
macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// Shorthand for [`crate::Error::OutOfBounds`], used by the cursor and
/// byte-reading helpers.
macro_rules! out_of_bounds_error {
    () => {
        crate::Error::OutOfBounds
    };
}
