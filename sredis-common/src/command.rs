//! # Command Builder
//!
//! Commands are a name followed by an ordered list of binary-safe arguments.
//! Every argument becomes one RESP bulk string, so argument count and order on
//! the wire are exactly what the caller built.

use std::fmt;

use bytes::{Bytes, BytesMut};

use crate::resp::encode_command;

/// Conversion into a single command argument.
pub trait ToArg {
    fn to_arg(&self) -> Bytes;
}

impl ToArg for str {
    fn to_arg(&self) -> Bytes {
        Bytes::copy_from_slice(self.as_bytes())
    }
}

impl ToArg for String {
    fn to_arg(&self) -> Bytes {
        Bytes::copy_from_slice(self.as_bytes())
    }
}

impl ToArg for [u8] {
    fn to_arg(&self) -> Bytes {
        Bytes::copy_from_slice(self)
    }
}

impl<const N: usize> ToArg for [u8; N] {
    fn to_arg(&self) -> Bytes {
        Bytes::copy_from_slice(self)
    }
}

impl ToArg for Vec<u8> {
    fn to_arg(&self) -> Bytes {
        Bytes::copy_from_slice(self)
    }
}

impl ToArg for Bytes {
    fn to_arg(&self) -> Bytes {
        self.clone()
    }
}

impl ToArg for f64 {
    fn to_arg(&self) -> Bytes {
        Bytes::from(self.to_string())
    }
}

macro_rules! integer_to_arg {
    ($($ty:ty),*) => {
        $(
            impl ToArg for $ty {
                fn to_arg(&self) -> Bytes {
                    Bytes::from(self.to_string())
                }
            }
        )*
    };
}

integer_to_arg!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

impl<T: ToArg + ?Sized> ToArg for &T {
    fn to_arg(&self) -> Bytes {
        (**self).to_arg()
    }
}

/// A command ready to be queued or sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    args: Vec<Bytes>,
}

impl Command {
    /// Starts a command with its name, e.g. `Command::new("SET")`.
    pub fn new<N: ToArg>(name: N) -> Self {
        Command {
            args: vec![name.to_arg()],
        }
    }

    /// Appends one argument.
    pub fn arg<A: ToArg>(mut self, arg: A) -> Self {
        self.args.push(arg.to_arg());
        self
    }

    /// Appends one argument in place.
    pub fn push_arg<A: ToArg>(&mut self, arg: A) -> &mut Self {
        self.args.push(arg.to_arg());
        self
    }

    /// Appends every item of `args`, in order.
    pub fn args<I>(mut self, args: I) -> Self
    where
        I: IntoIterator,
        I::Item: ToArg,
    {
        self.args.extend(args.into_iter().map(|arg| arg.to_arg()));
        self
    }

    /// Command name as sent (first argument).
    pub fn name(&self) -> &[u8] {
        &self.args[0]
    }

    /// Returns true when the name matches `name`, ignoring ASCII case.
    pub fn is(&self, name: &str) -> bool {
        self.name().eq_ignore_ascii_case(name.as_bytes())
    }

    /// All arguments including the name.
    pub fn as_args(&self) -> &[Bytes] {
        &self.args
    }

    /// Encodes the command as a RESP2 array of bulk strings.
    pub fn write_to(&self, out: &mut BytesMut) {
        encode_command(&self.args, out);
    }
}

/// Shows the name and argument count only, so secrets passed as arguments
/// (AUTH) never reach the logs.
impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({} args)",
            String::from_utf8_lossy(self.name()),
            self.args.len() - 1
        )
    }
}

/// Builds a [`Command`] from a name and a list of arguments.
///
/// ```rust
/// use sredis_common::cmd;
///
/// let command = cmd!("SET", "key", 42);
/// assert_eq!(command.as_args().len(), 3);
/// ```
#[macro_export]
macro_rules! cmd {
    ($name:expr $(, $arg:expr)* $(,)?) => {
        $crate::Command::new($name)$(.arg($arg))*
    };
}
