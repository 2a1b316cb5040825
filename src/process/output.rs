//! Background draining of a child's redirected output.

use std::io::{ErrorKind, Read};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

/// Stop keeping output past this many bytes; the pipe is still drained
pub const MAX_CAPTURED_BYTES: usize = 1024 * 1024;

/// Read `reader` on a background thread until EOF, sending chunks over a channel.
///
/// Keeps reading after the receiver is dropped so the child never blocks on
/// a full pipe.
pub fn spawn_reader<R>(mut reader: R) -> Receiver<Vec<u8>>
where
    R: Read + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut buffer = [0u8; 4096];
        let mut sent = 0usize;
        loop {
            match reader.read(&mut buffer) {
                Ok(0) => break,
                Ok(size) => {
                    if sent < MAX_CAPTURED_BYTES {
                        let keep = size.min(MAX_CAPTURED_BYTES - sent);
                        sent += keep;
                        // receiver gone: keep draining
                        let _ = tx.send(buffer[..keep].to_vec());
                    }
                }
                Err(err) => match err.kind() {
                    ErrorKind::Interrupted => continue,
                    ErrorKind::WouldBlock => {
                        thread::sleep(Duration::from_millis(10));
                    }
                    _ => break,
                },
            }
        }
    });
    rx
}

/// Collect whatever the reader has produced, waiting at most `max_wait` for EOF
pub fn collect(rx: &Receiver<Vec<u8>>, max_wait: Duration) -> String {
    let deadline = Instant::now() + max_wait;
    let mut bytes = Vec::new();
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match rx.recv_timeout(remaining) {
            Ok(chunk) => bytes.extend_from_slice(&chunk),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    String::from_utf8_lossy(&bytes).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_collects_until_eof() {
        let rx = spawn_reader(Cursor::new(b"hello\nworld\n".to_vec()));
        assert_eq!(collect(&rx, Duration::from_secs(2)), "hello\nworld\n");
    }

    #[test]
    fn test_output_is_capped() {
        let rx = spawn_reader(Cursor::new(vec![b'x'; MAX_CAPTURED_BYTES + 10_000]));
        assert_eq!(collect(&rx, Duration::from_secs(5)).len(), MAX_CAPTURED_BYTES);
    }
}
