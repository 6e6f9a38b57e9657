//! Link synchronizer: empties stale data from the serial channel in both
//! directions so prior session state cannot corrupt the handshake.

use std::time::Instant;

use log::{debug, trace};

use crate::error::{Error, Result};
use crate::port::Port;
use crate::protocol::command;
use crate::session::{LinkState, TncFlasher};

impl<P: Port> TncFlasher<P> {
    /// Quiet the serial channel.
    ///
    /// Discards both OS-side buffers, then reads and discards single bytes
    /// until one per-read wait elapses with nothing arriving. If the
    /// channel is still noisy partway into the wall-clock budget, the
    /// dump-all-state command is sent once so a device sitting on a large
    /// output backlog empties it in one go instead of trickling it out.
    /// Exhausting the budget means something else is transmitting on the
    /// channel, which is terminal.
    pub fn drain_channel(&mut self) -> Result<()> {
        debug!("quieting the serial channel");
        self.port.discard_output()?;
        self.port.discard_input()?;

        let started = Instant::now();
        let mut provoked = false;
        loop {
            if started.elapsed() >= self.config.drain_budget {
                self.state = LinkState::Failed;
                return Err(Error::ChannelBusy {
                    waited: started.elapsed(),
                });
            }

            match self.port.read_byte_within(self.config.drain_read_wait)? {
                Some(byte) => {
                    trace!("discarded stale byte {byte:#04x}");
                    if !provoked && started.elapsed() >= self.config.drain_provoke_after {
                        let backlog = self.port.bytes_to_read()?;
                        debug!(
                            "channel still noisy ({backlog} byte(s) buffered), \
                             provoking a device-side flush"
                        );
                        self.port.send(command::DUMP_STATE)?;
                        provoked = true;
                    }
                }
                None => {
                    debug!("channel quiet after {:.1?}", started.elapsed());
                    return Ok(());
                }
            }
        }
    }
}
