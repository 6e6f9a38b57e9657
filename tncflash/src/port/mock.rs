//! Scripted in-memory port for protocol tests.
//!
//! The script is the sequence of read results the fake device produces, in
//! order: `Some(byte)` delivers a byte, `None` makes that read time out.
//! Once the script is exhausted every further read times out, unless the
//! port was built with [`MockPort::chattering`], which then produces the
//! same byte forever (a peer that never shuts up).

use std::collections::VecDeque;
use std::io::{Read, Write};
use std::time::Duration;

use crate::error::Result;
use crate::port::Port;

pub(crate) struct MockPort {
    script: VecDeque<Option<u8>>,
    chatter: Option<u8>,
    pub written: Vec<u8>,
    pub write_lens: Vec<usize>,
    pub reconnects: usize,
    pub input_discards: usize,
    timeout: Duration,
}

impl MockPort {
    pub fn new(script: &[Option<u8>]) -> Self {
        Self {
            script: script.iter().copied().collect(),
            chatter: None,
            written: Vec::new(),
            write_lens: Vec::new(),
            reconnects: 0,
            input_discards: 0,
            timeout: Duration::from_millis(10),
        }
    }

    /// A port whose peer transmits `byte` endlessly.
    pub fn chattering(byte: u8) -> Self {
        let mut port = Self::new(&[]);
        port.chatter = Some(byte);
        port
    }

    fn timed_out() -> std::io::Error {
        std::io::Error::new(std::io::ErrorKind::TimedOut, "no data")
    }
}

impl Read for MockPort {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let next = match self.script.pop_front() {
            Some(step) => step,
            None => self.chatter,
        };
        match next {
            Some(byte) if !buf.is_empty() => {
                buf[0] = byte;
                Ok(1)
            }
            _ => Err(Self::timed_out()),
        }
    }
}

impl Write for MockPort {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.written.extend_from_slice(buf);
        self.write_lens.push(buf.len());
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl Port for MockPort {
    fn set_timeout(&mut self, timeout: Duration) -> Result<()> {
        self.timeout = timeout;
        Ok(())
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn baud_rate(&self) -> u32 {
        57_600
    }

    fn bytes_to_read(&mut self) -> Result<u32> {
        if self.chatter.is_some() {
            return Ok(64);
        }
        let buffered = self
            .script
            .iter()
            .take_while(|step| step.is_some())
            .count();
        Ok(buffered as u32)
    }

    fn discard_input(&mut self) -> Result<()> {
        self.input_discards += 1;
        Ok(())
    }

    fn discard_output(&mut self) -> Result<()> {
        Ok(())
    }

    fn reconnect(&mut self) -> Result<()> {
        self.reconnects += 1;
        Ok(())
    }

    fn name(&self) -> &str {
        "mock"
    }
}
