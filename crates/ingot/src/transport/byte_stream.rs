// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! ByteStream trait for blocking stream transports.
//!
//! The writer drives its connection with blocking reads and writes, using
//! read deadlines only while draining acks on force-ack and close. The trait
//! therefore needs `Read + Write` plus deadline control and a shutdown hook,
//! nothing more.

use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream};
use std::time::Duration;

#[cfg(unix)]
use std::os::unix::net::UnixStream;

/// Abstraction over the blocking byte stream that carries the ingest
/// protocol.
///
/// Implementations must be in blocking mode; `set_read_timeout(Some(d))`
/// bounds how long a read may block, and `set_read_timeout(None)` restores
/// unbounded blocking.
pub trait ByteStream: Read + Write + Send {
    /// Shut down both directions of the stream.
    fn shutdown(&mut self) -> io::Result<()>;

    /// Set or clear the read deadline for subsequent reads.
    fn set_read_timeout(&self, dur: Option<Duration>) -> io::Result<()>;

    /// Set or clear the write deadline for subsequent writes.
    fn set_write_timeout(&self, dur: Option<Duration>) -> io::Result<()>;
}

impl ByteStream for TcpStream {
    fn shutdown(&mut self) -> io::Result<()> {
        TcpStream::shutdown(self, Shutdown::Both)
    }

    fn set_read_timeout(&self, dur: Option<Duration>) -> io::Result<()> {
        TcpStream::set_read_timeout(self, dur)
    }

    fn set_write_timeout(&self, dur: Option<Duration>) -> io::Result<()> {
        TcpStream::set_write_timeout(self, dur)
    }
}

#[cfg(unix)]
impl ByteStream for UnixStream {
    fn shutdown(&mut self) -> io::Result<()> {
        UnixStream::shutdown(self, Shutdown::Both)
    }

    fn set_read_timeout(&self, dur: Option<Duration>) -> io::Result<()> {
        UnixStream::set_read_timeout(self, dur)
    }

    fn set_write_timeout(&self, dur: Option<Duration>) -> io::Result<()> {
        UnixStream::set_write_timeout(self, dur)
    }
}

/// Type alias for a boxed ByteStream.
pub type BoxedByteStream = Box<dyn ByteStream>;

impl ByteStream for BoxedByteStream {
    fn shutdown(&mut self) -> io::Result<()> {
        (**self).shutdown()
    }

    fn set_read_timeout(&self, dur: Option<Duration>) -> io::Result<()> {
        (**self).set_read_timeout(dur)
    }

    fn set_write_timeout(&self, dur: Option<Duration>) -> io::Result<()> {
        (**self).set_write_timeout(dur)
    }
}

// ============================================================================
// Test mock stream
// ============================================================================


// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::mock::MockStream;
    use super::*;
    use std::thread;

    #[test]
    fn test_trait_is_object_safe() {
        fn _take(_s: &dyn ByteStream) {}
    }

    #[test]
    fn test_mock_feed_then_read() {
        let mut stream = MockStream::new();
        let handle = stream.clone();

        handle.feed(b"hello");
        let mut buf = [0u8; 16];
        let n = stream.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"hello");
    }

    #[test]
    fn test_mock_read_honors_deadline() {
        let mut stream = MockStream::new();
        stream
            .set_read_timeout(Some(Duration::from_millis(20)))
            .unwrap();

        let mut buf = [0u8; 4];
        let err = stream.read(&mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::TimedOut);
    }

    #[test]
    fn test_mock_read_blocks_until_fed() {
        let mut stream = MockStream::new();
        let handle = stream.clone();

        let feeder = thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            handle.feed(b"late");
        });

        let mut buf = [0u8; 8];
        let n = stream.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"late");
        feeder.join().unwrap();
    }

    #[test]
    fn test_mock_disconnect_is_eof() {
        let mut stream = MockStream::new();
        let handle = stream.clone();

        handle.feed(b"ab");
        handle.disconnect();

        let mut buf = [0u8; 8];
        assert_eq!(stream.read(&mut buf).unwrap(), 2);
        assert_eq!(stream.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn test_mock_write_capture() {
        let mut stream = MockStream::new();
        let handle = stream.clone();

        stream.write_all(b"one").unwrap();
        stream.write_all(b"two").unwrap();

        assert_eq!(handle.written(), b"onetwo");
        assert_eq!(handle.write_chunks(), vec![3, 3]);
    }

    #[test]
    fn test_mock_error_injection() {
        let mut stream = MockStream::new();
        let handle = stream.clone();

        handle.inject_read_error(io::ErrorKind::ConnectionReset);
        let mut buf = [0u8; 4];
        assert_eq!(
            stream.read(&mut buf).unwrap_err().kind(),
            io::ErrorKind::ConnectionReset
        );

        handle.inject_write_error(io::ErrorKind::BrokenPipe);
        assert_eq!(
            stream.write(b"x").unwrap_err().kind(),
            io::ErrorKind::BrokenPipe
        );

        // Errors fire once.
        handle.feed(b"ok");
        assert!(stream.read(&mut buf).is_ok());
        assert!(stream.write(b"y").is_ok());
    }
}
