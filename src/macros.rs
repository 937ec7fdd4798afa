#![allow(unused_macros)]

/// Builds an [`crate::Error::Invariant`] carrying the source location it was raised from
///
/// ```rust, ignore
///  return Err(invariant_error!("phi {} lives outside of block {}", phi, block));
/// ```
macro_rules! invariant_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Invariant {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Invariant {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}
