//! Serial link over stdio.
//!
//! `SerialLink::read_byte` must never block, but reading stdin does. A
//! detached reader thread pulls bytes from stdin and hands them over
//! through a bounded channel; the run loop drains whatever is available
//! each tick. The thread exits on stdin EOF and is not joined, matching
//! its detached lifetime.

use std::io::{Read, Write};

use crossbeam_channel::{Receiver, bounded};

use colorimeter_traits::SerialLink;

const CHANNEL_CAPACITY: usize = 4096;

pub struct StdioLink {
    rx: Receiver<u8>,
    out: std::io::Stdout,
}

impl StdioLink {
    pub fn new() -> Self {
        let (tx, rx) = bounded(CHANNEL_CAPACITY);
        std::thread::Builder::new()
            .name("stdin-reader".into())
            .spawn(move || {
                let mut stdin = std::io::stdin().lock();
                let mut buf = [0u8; 256];
                loop {
                    match stdin.read(&mut buf) {
                        Ok(0) => break,
                        Ok(n) => {
                            for &byte in &buf[..n] {
                                match tx.send(byte) {
                                    Ok(()) => {}
                                    Err(_) => return,
                                }
                            }
                        }
                        Err(e) => {
                            tracing::debug!(error = %e, "stdin read failed");
                            break;
                        }
                    }
                }
                tracing::debug!("stdin reader exiting");
            })
            .ok();
        StdioLink {
            rx,
            out: std::io::stdout(),
        }
    }
}

impl Default for StdioLink {
    fn default() -> Self {
        Self::new()
    }
}

impl SerialLink for StdioLink {
    fn read_byte(&mut self) -> Option<u8> {
        self.rx.try_recv().ok()
    }

    fn write_line(&mut self, line: &str) -> std::io::Result<()> {
        let mut out = self.out.lock();
        writeln!(out, "{line}")?;
        out.flush()
    }
}