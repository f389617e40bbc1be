//! Command builder.
//!
//! A [`Command`] is an ordered, immutable-once-sent list of binary-safe
//! tokens: the command name followed by its arguments.
//!
//! ```ignore
//! let cmd = Command::new("BF.RESERVE").arg("filter").arg(0.01).arg(1000);
//! let same = cmd!("BF.RESERVE", "filter", 0.01, 1000);
//! ```

use std::fmt;

use bytes::Bytes;

/// Conversion into a single wire argument.
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

impl<T: ToArg + ?Sized> ToArg for &T {
    fn to_arg(&self) -> Bytes {
        (**self).to_arg()
    }
}

macro_rules! int_to_arg {
    ($($t:ty),*) => {$(
        impl ToArg for $t {
            fn to_arg(&self) -> Bytes {
                let mut buf = itoa::Buffer::new();
                Bytes::copy_from_slice(buf.format(*self).as_bytes())
            }
        }
    )*};
}

int_to_arg!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

impl ToArg for f64 {
    fn to_arg(&self) -> Bytes {
        if self.is_infinite() {
            let s: &'static [u8] = if *self > 0.0 { b"inf" } else { b"-inf" };
            return Bytes::from_static(s);
        }
        Bytes::from(self.to_string())
    }
}

impl ToArg for f32 {
    fn to_arg(&self) -> Bytes {
        f64::from(*self).to_arg()
    }
}

impl ToArg for bool {
    fn to_arg(&self) -> Bytes {
        Bytes::from_static(if *self { b"1" } else { b"0" })
    }
}

/// A command name plus its arguments, ready for encoding.
#[derive(Clone, PartialEq, Eq)]
pub struct Command {
    args: Vec<Bytes>,
}

impl Command {
    pub fn new(name: impl ToArg) -> Self {
        let mut args = Vec::with_capacity(4);
        args.push(name.to_arg());
        Self { args }
    }

    /// Append one argument.
    #[must_use]
    pub fn arg(mut self, arg: impl ToArg) -> Self {
        self.args.push(arg.to_arg());
        self
    }

    /// Append every item of `args`.
    #[must_use]
    pub fn args<I>(mut self, args: I) -> Self
    where
        I: IntoIterator,
        I::Item: ToArg,
    {
        self.args.extend(args.into_iter().map(|a| a.to_arg()));
        self
    }

    /// In-place variant of [`Command::arg`] for builders that branch.
    pub fn push(&mut self, arg: impl ToArg) {
        self.args.push(arg.to_arg());
    }

    /// Command name, upper-cased. Lossy for non-UTF-8 names.
    pub fn name(&self) -> String {
        String::from_utf8_lossy(&self.args[0]).to_ascii_uppercase()
    }

    /// All tokens including the name.
    pub fn tokens(&self) -> &[Bytes] {
        &self.args
    }

    /// Number of tokens including the name.
    pub fn len(&self) -> usize {
        self.args.len()
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut list = f.debug_list();
        for a in &self.args {
            list.entry(&String::from_utf8_lossy(a));
        }
        list.finish()
    }
}

/// Build a [`Command`] from a name and arguments.
///
/// ```ignore
/// let cmd = cmd!("SET", "key", 42);
/// ```
#[macro_export]
macro_rules! cmd {
    ($name:expr $(, $arg:expr)* $(,)?) => {{
        $crate::cmd::Command::new($name)$(.arg($arg))*
    }};
}

// ── Tests ──────────────────────────────────────────────────────────
