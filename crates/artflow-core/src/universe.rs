//! DMX universes
//!
//! A universe owns a 512 byte frame buffer and the non-overlapping channels
//! that write into it. The owning node ticks it once per frame and decides
//! from its last-sent snapshot whether the frame has to go out.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use crate::channel::{Channel, ChannelHandle, UNIVERSE_SIZE};
use crate::correction::{apply_optional, OutputCorrection};
use crate::error::{CoreError, Result};

/// Highest universe number accepted in a configuration
pub const MAX_UNIVERSE: u16 = 1024;

/// A frame buffer and the channels feeding it
#[derive(Debug)]
pub struct Universe {
    number: u16,
    buffer: [u8; UNIVERSE_SIZE],
    /// Channels keyed by start address
    channels: BTreeMap<u16, ChannelHandle>,
    correction: Option<OutputCorrection>,
    frame_len: usize,
    last_sent: Option<[u8; UNIVERSE_SIZE]>,
    last_sent_at: Option<Instant>,
}

impl Universe {
    /// Create an empty universe
    pub fn new(number: u16) -> Result<Self> {
        if number > MAX_UNIVERSE {
            return Err(CoreError::UniverseRange(number));
        }
        Ok(Self {
            number,
            buffer: [0; UNIVERSE_SIZE],
            channels: BTreeMap::new(),
            correction: None,
            frame_len: 2,
            last_sent: None,
            last_sent_at: None,
        })
    }

    pub fn number(&self) -> u16 {
        self.number
    }

    pub fn correction(&self) -> Option<OutputCorrection> {
        self.correction
    }

    /// Set the correction applied after each channel's own correction
    pub fn set_correction(&mut self, correction: Option<OutputCorrection>) {
        self.correction = correction;
    }

    /// Add a channel covering `start..start + width`.
    ///
    /// Rejects ranges outside 1-512 and ranges that intersect an existing
    /// channel.
    pub fn add_channel(
        &mut self,
        start: u16,
        width: u16,
        name: impl Into<String>,
    ) -> Result<ChannelHandle> {
        let channel = Channel::new(self.number, start, width, name)?;
        let end = channel.end();

        if let Some(existing) = self
            .channels
            .values()
            .find(|c| c.lock().overlaps(start, end))
        {
            return Err(CoreError::ChannelOverlap {
                name: channel.name().to_string(),
                start,
                end,
                existing: existing.lock().name().to_string(),
            });
        }

        tracing::info!(
            "Universe {}: added channel {} at {}-{}",
            self.number,
            channel.name(),
            start,
            end
        );

        // ArtDmx data length: even, at least 2
        let used = end as usize;
        self.frame_len = self.frame_len.max(used + used % 2);

        let handle = channel.into_handle();
        self.channels.insert(start, handle.clone());
        Ok(handle)
    }

    /// Look up a channel by name
    pub fn channel(&self, name: &str) -> Option<ChannelHandle> {
        self.channels
            .values()
            .find(|c| c.lock().name() == name)
            .cloned()
    }

    /// Channels ordered by start address
    pub fn channels(&self) -> impl Iterator<Item = &ChannelHandle> {
        self.channels.values()
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Advance every channel to `now` and rebuild the frame buffer.
    ///
    /// Channel correction is applied first, then the universe correction.
    pub fn tick(&mut self, now: Instant) {
        for handle in self.channels.values() {
            let mut channel = handle.lock();
            channel.tick(now);

            let offset = channel.start() as usize - 1;
            for (slot, value) in self.buffer[offset..]
                .iter_mut()
                .zip(channel.corrected_values())
            {
                *slot = apply_optional(self.correction, value);
            }
        }
    }

    /// Full 512 byte buffer
    pub fn buffer(&self) -> &[u8; UNIVERSE_SIZE] {
        &self.buffer
    }

    /// Bytes to transmit: up to the last used slot, padded to even length
    pub fn frame(&self) -> &[u8] {
        &self.buffer[..self.frame_len]
    }

    /// Compare the buffer with the last transmitted one
    pub fn has_changed_since_last_send(&self) -> bool {
        self.last_sent.as_ref() != Some(&self.buffer)
    }

    /// Decide whether the frame must be sent at `now`.
    ///
    /// True when the buffer changed, or when `refresh` is set and at least
    /// that much time passed since the last send.
    pub fn needs_send(&self, now: Instant, refresh: Option<Duration>) -> bool {
        if self.has_changed_since_last_send() {
            return true;
        }
        match (refresh, self.last_sent_at) {
            (Some(refresh), Some(sent)) => now.saturating_duration_since(sent) >= refresh,
            (Some(_), None) => true,
            (None, _) => false,
        }
    }

    /// Record a successful transmission of the current buffer
    pub fn mark_sent(&mut self, now: Instant) {
        self.last_sent = Some(self.buffer);
        self.last_sent_at = Some(now);
    }

    /// Time of the last successful transmission
    pub fn last_sent_at(&self) -> Option<Instant> {
        self.last_sent_at
    }
}
