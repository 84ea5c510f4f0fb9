use std::os::fd::{AsFd, BorrowedFd, OwnedFd};

use nix::fcntl::OFlag;
use nix::unistd;

use crate::error::{Error, Result};

/// A unidirectional anonymous byte channel.
///
/// Either end can be closed independently; a closed end reads back as `None`
/// from the accessors. `Process::launch` uses a close-on-exec pipe so a
/// successful exec in the child shows up as EOF on the parent's read end.
pub struct Pipe {
    read: Option<OwnedFd>,
    write: Option<OwnedFd>,
}

impl Pipe {
    const READ_BUFFER_SIZE: usize = 1024;

    pub fn new(close_on_exec: bool) -> Result<Self> {
        let flags = if close_on_exec {
            OFlag::O_CLOEXEC
        } else {
            OFlag::empty()
        };
        let (read, write) = unistd::pipe2(flags).map_err(|errno| Error::Pipe {
            context: "pipe creation failed",
            errno,
        })?;
        Ok(Self {
            read: Some(read),
            write: Some(write),
        })
    }

    /// Read up to one buffer's worth of bytes. Returns an empty chunk once
    /// every writer has closed.
    pub fn read(&mut self) -> Result<Vec<u8>> {
        let fd = self.read.as_ref().ok_or(Error::Pipe {
            context: "could not read from pipe",
            errno: nix::errno::Errno::EBADF,
        })?;
        let mut buf = [0u8; Self::READ_BUFFER_SIZE];
        let n = unistd::read(fd, &mut buf).map_err(|errno| Error::Pipe {
            context: "could not read from pipe",
            errno,
        })?;
        Ok(buf[..n].to_vec())
    }

    /// Write the whole byte slice or fail.
    pub fn write(&mut self, mut bytes: &[u8]) -> Result<()> {
        let fd = self.write.as_ref().ok_or(Error::Pipe {
            context: "could not write to pipe",
            errno: nix::errno::Errno::EBADF,
        })?;
        while !bytes.is_empty() {
            let n = unistd::write(fd, bytes).map_err(|errno| Error::Pipe {
                context: "could not write to pipe",
                errno,
            })?;
            bytes = &bytes[n..];
        }
        Ok(())
    }

    pub fn get_read(&self) -> Option<BorrowedFd<'_>> {
        self.read.as_ref().map(AsFd::as_fd)
    }

    pub fn get_write(&self) -> Option<BorrowedFd<'_>> {
        self.write.as_ref().map(AsFd::as_fd)
    }

    pub fn close_read(&mut self) {
        self.read = None;
    }

    pub fn close_write(&mut self) {
        self.write = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_bytes() {
        let mut pipe = Pipe::new(false).unwrap();
        pipe.write(b"hello there").unwrap();
        let chunk = pipe.read().unwrap();
        assert_eq!(chunk, b"hello there");
    }

    #[test]
    fn read_after_writer_closed_is_empty() {
        let mut pipe = Pipe::new(false).unwrap();
        pipe.write(b"last words").unwrap();
        pipe.close_write();

        assert_eq!(pipe.read().unwrap(), b"last words");
        assert!(pipe.read().unwrap().is_empty());
    }

    #[test]
    fn ends_close_independently() {
        let mut pipe = Pipe::new(true).unwrap();
        assert!(pipe.get_read().is_some());
        assert!(pipe.get_write().is_some());

        pipe.close_read();
        assert!(pipe.get_read().is_none());
        assert!(pipe.get_write().is_some());
        assert!(pipe.read().is_err());
    }
}
