//! Emission macros
//!
//! Each macro takes either `(logger, "fmt", args..)` or `("fmt", args..)`; the
//! second form writes to [`default_logger`](crate::default_logger). The call
//! site is recorded as the caller.

#[macro_export]
macro_rules! trace {
    ($fmt:literal $($arg:tt)*) => {
        $crate::default_logger().trace(::std::format_args!($fmt $($arg)*))
    };
    ($logger:expr, $fmt:literal $($arg:tt)*) => {
        $logger.trace(::std::format_args!($fmt $($arg)*))
    };
}

#[macro_export]
macro_rules! debug {
    ($fmt:literal $($arg:tt)*) => {
        $crate::default_logger().debug(::std::format_args!($fmt $($arg)*))
    };
    ($logger:expr, $fmt:literal $($arg:tt)*) => {
        $logger.debug(::std::format_args!($fmt $($arg)*))
    };
}

#[macro_export]
macro_rules! info {
    ($fmt:literal $($arg:tt)*) => {
        $crate::default_logger().info(::std::format_args!($fmt $($arg)*))
    };
    ($logger:expr, $fmt:literal $($arg:tt)*) => {
        $logger.info(::std::format_args!($fmt $($arg)*))
    };
}

#[macro_export]
macro_rules! warn {
    ($fmt:literal $($arg:tt)*) => {
        $crate::default_logger().warn(::std::format_args!($fmt $($arg)*))
    };
    ($logger:expr, $fmt:literal $($arg:tt)*) => {
        $logger.warn(::std::format_args!($fmt $($arg)*))
    };
}

#[macro_export]
macro_rules! error {
    ($fmt:literal $($arg:tt)*) => {
        $crate::default_logger().error(::std::format_args!($fmt $($arg)*))
    };
    ($logger:expr, $fmt:literal $($arg:tt)*) => {
        $logger.error(::std::format_args!($fmt $($arg)*))
    };
}

/// Logs, flushes, then panics with the message
#[macro_export]
macro_rules! panic {
    ($fmt:literal $($arg:tt)*) => {
        $crate::default_logger().panic(::std::format_args!($fmt $($arg)*))
    };
    ($logger:expr, $fmt:literal $($arg:tt)*) => {
        $logger.panic(::std::format_args!($fmt $($arg)*))
    };
}

/// Logs, flushes, then exits the process with status 1
#[macro_export]
macro_rules! fatal {
    ($fmt:literal $($arg:tt)*) => {
        $crate::default_logger().fatal(::std::format_args!($fmt $($arg)*))
    };
    ($logger:expr, $fmt:literal $($arg:tt)*) => {
        $logger.fatal(::std::format_args!($fmt $($arg)*))
    };
}
