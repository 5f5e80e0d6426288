//! WASI preview1 error codes.

use std::io;

/// The subset of WASI preview1 `errno` values this shim produces. The
/// discriminants are the wire values written back to the guest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum Errno {
    Success = 0,
    TooBig = 1,
    Acces = 2,
    Again = 6,
    Badf = 8,
    Exist = 20,
    Fault = 21,
    Inval = 28,
    Io = 29,
    Isdir = 31,
    Noent = 44,
    Nospc = 51,
    Nosys = 52,
    Notdir = 54,
    Notempty = 55,
    Notsup = 58,
    Perm = 63,
    Spipe = 70,
}

impl Errno {
    /// The numeric code returned to the guest.
    pub fn code(self) -> u16 {
        self as u16
    }

    /// Collapse a handler result into the guest-visible code.
    pub fn from_result(result: Result<(), Errno>) -> u16 {
        match result {
            Ok(()) => Errno::Success.code(),
            Err(e) => e.code(),
        }
    }
}

impl From<io::Error> for Errno {
    fn from(err: io::Error) -> Errno {
        use io::ErrorKind;
        match err.kind() {
            ErrorKind::NotFound => Errno::Noent,
            ErrorKind::PermissionDenied => Errno::Acces,
            ErrorKind::AlreadyExists => Errno::Exist,
            ErrorKind::InvalidInput => Errno::Inval,
            ErrorKind::WouldBlock => Errno::Again,
            ErrorKind::DirectoryNotEmpty => Errno::Notempty,
            ErrorKind::IsADirectory => Errno::Isdir,
            ErrorKind::NotADirectory => Errno::Notdir,
            ErrorKind::StorageFull => Errno::Nospc,
            ErrorKind::Unsupported => Errno::Notsup,
            _ => Errno::Io,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_codes_match_preview1() {
        assert_eq!(Errno::Success.code(), 0);
        assert_eq!(Errno::Badf.code(), 8);
        assert_eq!(Errno::Fault.code(), 21);
        assert_eq!(Errno::Noent.code(), 44);
        assert_eq!(Errno::Notsup.code(), 58);
    }

    #[test]
    fn io_errors_map() {
        let err = io::Error::new(io::ErrorKind::NotFound, "gone");
        assert_eq!(Errno::from(err), Errno::Noent);
        let err = io::Error::other("anything");
        assert_eq!(Errno::from(err), Errno::Io);
    }

    #[test]
    fn results_collapse() {
        assert_eq!(Errno::from_result(Ok(())), 0);
        assert_eq!(Errno::from_result(Err(Errno::Inval)), 28);
    }
}
