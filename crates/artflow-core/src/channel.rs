//! DMX channels: a fixture's contiguous slice of a universe
//!
//! A [`Channel`] owns the current values of its slots and at most one
//! active [`Fade`]. Channels are shared between the node loop, which ticks
//! them, and callers that install fades, so they are handed out as
//! [`ChannelHandle`]s.

use crossbeam_channel::{Sender, TrySendError};
use parking_lot::Mutex;
use std::ops::RangeInclusive;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::correction::{apply_optional, OutputCorrection};
use crate::curve::ValueCurve;
use crate::error::{CoreError, Result};
use crate::fade::Fade;

/// Number of slots in a DMX universe
pub const UNIVERSE_SIZE: usize = 512;

/// Minimum time between two "value changed" notifications of one channel
pub const DEFAULT_NOTIFY_INTERVAL: Duration = Duration::from_millis(1100);

/// Shared, lockable channel
pub type ChannelHandle = Arc<Mutex<Channel>>;

/// Channel values at the moment an event was emitted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelSnapshot {
    /// Universe the channel belongs to
    pub universe: u16,
    /// First DMX address (1-based)
    pub start: u16,
    /// Channel name
    pub name: String,
    /// Uncorrected slot values
    pub values: Vec<u8>,
}

/// Notification emitted while ticking a channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    /// Values moved during a fade (rate limited)
    ValueChanged(ChannelSnapshot),
    /// The active fade reached its target
    FadeFinished(ChannelSnapshot),
}

impl ChannelEvent {
    /// Snapshot carried by the event
    pub fn snapshot(&self) -> &ChannelSnapshot {
        match self {
            ChannelEvent::ValueChanged(s) | ChannelEvent::FadeFinished(s) => s,
        }
    }
}

/// A contiguous range of slots within a universe
#[derive(Debug)]
pub struct Channel {
    universe: u16,
    start: u16,
    width: u16,
    name: String,
    values: Vec<u8>,
    correction: Option<OutputCorrection>,
    fade: Option<Fade>,
    events: Option<Sender<ChannelEvent>>,
    notify_interval: Duration,
    last_notified: Vec<u8>,
    last_value_event: Option<Instant>,
}

impl Channel {
    /// Create a channel covering `start..start + width` (1-based addresses).
    ///
    /// Fails when the range does not fit into 1-512.
    pub fn new(universe: u16, start: u16, width: u16, name: impl Into<String>) -> Result<Self> {
        let end = u32::from(start) + u32::from(width);
        if start == 0 || width == 0 || end - 1 > UNIVERSE_SIZE as u32 {
            return Err(CoreError::ChannelRange { start, width });
        }

        Ok(Self {
            universe,
            start,
            width,
            name: name.into(),
            values: vec![0; width as usize],
            correction: None,
            fade: None,
            events: None,
            notify_interval: DEFAULT_NOTIFY_INTERVAL,
            last_notified: vec![0; width as usize],
            last_value_event: None,
        })
    }

    /// Wrap the channel for sharing
    pub fn into_handle(self) -> ChannelHandle {
        Arc::new(Mutex::new(self))
    }

    pub fn universe(&self) -> u16 {
        self.universe
    }

    /// First DMX address (1-based)
    pub fn start(&self) -> u16 {
        self.start
    }

    /// Last DMX address (1-based, inclusive)
    pub fn end(&self) -> u16 {
        self.start + self.width - 1
    }

    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// DMX addresses covered by the channel
    pub fn addresses(&self) -> RangeInclusive<u16> {
        self.start..=self.end()
    }

    /// Check whether two address ranges intersect
    pub fn overlaps(&self, start: u16, end: u16) -> bool {
        self.start <= end && start <= self.end()
    }

    /// Current uncorrected values
    pub fn values(&self) -> &[u8] {
        &self.values
    }

    /// Owned copy of the current values
    pub fn get_values(&self) -> Vec<u8> {
        self.values.clone()
    }

    /// Overwrite the values immediately, dropping any running fade
    pub fn set_values(&mut self, values: &[u8]) -> Result<()> {
        self.check_width(values.len())?;
        self.fade = None;
        self.values.copy_from_slice(values);
        Ok(())
    }

    pub fn correction(&self) -> Option<OutputCorrection> {
        self.correction
    }

    pub fn set_correction(&mut self, correction: Option<OutputCorrection>) {
        self.correction = correction;
    }

    /// Values after the channel's own output correction
    pub fn corrected_values(&self) -> impl Iterator<Item = u8> + '_ {
        self.values
            .iter()
            .map(move |&v| apply_optional(self.correction, v))
    }

    /// Route notifications to `sender`
    pub fn subscribe(&mut self, sender: Sender<ChannelEvent>) {
        self.events = Some(sender);
    }

    /// Change the minimum spacing of "value changed" notifications
    pub fn set_notify_interval(&mut self, interval: Duration) {
        self.notify_interval = interval;
    }

    pub fn is_fading(&self) -> bool {
        self.fade.is_some()
    }

    /// Currently running fade
    pub fn fade(&self) -> Option<&Fade> {
        self.fade.as_ref()
    }

    /// Install a fade starting now
    pub fn add_fade(&mut self, target: &[u8], duration: Duration, curve: ValueCurve) -> Result<()> {
        self.add_fade_at(target, duration, curve, Instant::now())
    }

    /// Install a fade that starts at `now`.
    ///
    /// The start state is the channel's current value, so replacing a
    /// running fade continues from wherever the old one had got to.
    pub fn add_fade_at(
        &mut self,
        target: &[u8],
        duration: Duration,
        curve: ValueCurve,
        now: Instant,
    ) -> Result<()> {
        self.check_width(target.len())?;

        if self.fade.is_some() {
            tracing::debug!("Channel {} replaces running fade", self.name);
        }
        tracing::debug!(
            "Channel {} fading {:?} -> {:?} over {:?} ({})",
            self.name,
            self.values,
            target,
            duration,
            curve.name()
        );

        self.fade = Some(Fade::new(
            self.values.clone(),
            target.to_vec(),
            duration,
            now,
            curve,
        ));
        Ok(())
    }

    /// Advance the active fade to `now`.
    ///
    /// Emits a rate limited "value changed" event when the values moved
    /// and a "fade finished" event when the fade completes, after which the
    /// fade is removed. Returns whether any value changed.
    pub fn tick(&mut self, now: Instant) -> bool {
        let Some(fade) = &self.fade else {
            return false;
        };

        let before = self.values.clone();
        let finished = fade.advance(now, &mut self.values);
        let changed = before != self.values;

        if finished {
            self.fade = None;
            self.last_notified.copy_from_slice(&self.values);
            self.last_value_event = Some(now);
            self.emit(ChannelEvent::FadeFinished(self.snapshot()));
        } else if self.values != self.last_notified && self.value_event_due(now) {
            self.last_notified.copy_from_slice(&self.values);
            self.last_value_event = Some(now);
            self.emit(ChannelEvent::ValueChanged(self.snapshot()));
        }

        changed
    }

    /// Current state as an event payload
    pub fn snapshot(&self) -> ChannelSnapshot {
        ChannelSnapshot {
            universe: self.universe,
            start: self.start,
            name: self.name.clone(),
            values: self.values.clone(),
        }
    }

    fn value_event_due(&self, now: Instant) -> bool {
        self.last_value_event
            .map_or(true, |last| now.saturating_duration_since(last) > self.notify_interval)
    }

    fn emit(&self, event: ChannelEvent) {
        let Some(sender) = &self.events else {
            return;
        };
        // Never blocks: a full queue or a gone receiver drops the event
        match sender.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                tracing::trace!("Event queue full, dropping event of channel {}", self.name);
            }
            Err(TrySendError::Disconnected(_)) => {
                tracing::trace!("No listener for channel {} events", self.name);
            }
        }
    }

    fn check_width(&self, len: usize) -> Result<()> {
        if len != self.width as usize {
            return Err(CoreError::FadeWidthMismatch {
                channel: self.name.clone(),
                expected: self.width as usize,
                actual: len,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn test_range_validation() {
        assert!(Channel::new(0, 1, 512, "full").is_ok());
        assert!(Channel::new(0, 512, 1, "last").is_ok());
        assert!(Channel::new(0, 0, 1, "zero").is_err());
        assert!(Channel::new(0, 1, 0, "empty").is_err());
        assert!(Channel::new(0, 510, 4, "spill").is_err());
    }

    #[test]
    fn test_addresses() {
        let ch = Channel::new(0, 10, 4, "rgbw").unwrap();
        assert_eq!(ch.end(), 13);
        assert_eq!(ch.addresses().collect::<Vec<_>>(), vec![10, 11, 12, 13]);
        assert!(ch.overlaps(13, 15));
        assert!(ch.overlaps(5, 10));
        assert!(!ch.overlaps(14, 20));
        assert!(!ch.overlaps(1, 9));
    }

    #[test]
    fn test_tick_without_fade_is_noop() {
        let mut ch = Channel::new(0, 1, 3, "rgb").unwrap();
        ch.set_values(&[1, 2, 3]).unwrap();
        assert!(!ch.tick(Instant::now()));
        assert_eq!(ch.values(), &[1, 2, 3]);
    }

    #[test]
    fn test_fade_width_mismatch() {
        let mut ch = Channel::new(0, 1, 3, "rgb").unwrap();
        let err = ch
            .add_fade(&[255, 255], ms(100), ValueCurve::Linear)
            .unwrap_err();
        assert!(matches!(
            err,
            CoreError::FadeWidthMismatch {
                expected: 3,
                actual: 2,
                ..
            }
        ));
        assert!(!ch.is_fading());
    }

    #[test]
    fn test_fade_runs_to_target_and_retires() {
        let t0 = Instant::now();
        let mut ch = Channel::new(0, 1, 1, "dimmer").unwrap();
        ch.add_fade_at(&[200], ms(1000), ValueCurve::Linear, t0)
            .unwrap();

        assert!(ch.tick(t0 + ms(500)));
        assert_eq!(ch.values(), &[100]);
        assert!(ch.is_fading());

        assert!(ch.tick(t0 + ms(1000)));
        assert_eq!(ch.values(), &[200]);
        assert!(!ch.is_fading());
    }

    #[test]
    fn test_replacement_starts_from_current_values() {
        let t0 = Instant::now();
        let mut ch = Channel::new(0, 1, 1, "dimmer").unwrap();
        ch.add_fade_at(&[200], ms(1000), ValueCurve::Linear, t0)
            .unwrap();
        ch.tick(t0 + ms(500));
        assert_eq!(ch.values(), &[100]);

        let t1 = t0 + ms(500);
        ch.add_fade_at(&[0], ms(1000), ValueCurve::Linear, t1)
            .unwrap();
        assert_eq!(ch.fade().unwrap().start_values(), &[100]);

        ch.tick(t1 + ms(500));
        assert_eq!(ch.values(), &[50]);
    }

    #[test]
    fn test_zero_duration_applies_on_next_tick() {
        let t0 = Instant::now();
        let mut ch = Channel::new(0, 1, 2, "ww").unwrap();
        ch.add_fade_at(&[10, 20], Duration::ZERO, ValueCurve::Linear, t0)
            .unwrap();
        assert_eq!(ch.values(), &[0, 0]);
        ch.tick(t0);
        assert_eq!(ch.values(), &[10, 20]);
        assert!(!ch.is_fading());
    }

    #[test]
    fn test_set_values_cancels_fade() {
        let mut ch = Channel::new(0, 1, 1, "dimmer").unwrap();
        ch.add_fade(&[255], ms(1000), ValueCurve::Linear).unwrap();
        ch.set_values(&[7]).unwrap();
        assert!(!ch.is_fading());
        assert_eq!(ch.get_values(), vec![7]);
    }

    #[test]
    fn test_corrected_values() {
        let mut ch = Channel::new(0, 1, 2, "ww").unwrap();
        ch.set_values(&[128, 255]).unwrap();
        ch.set_correction(Some(OutputCorrection::Quadratic));
        assert_eq!(ch.corrected_values().collect::<Vec<_>>(), vec![64, 255]);
    }

    #[test]
    fn test_events_are_rate_limited() {
        let (tx, rx) = unbounded();
        let t0 = Instant::now();
        let mut ch = Channel::new(3, 5, 1, "dimmer").unwrap();
        ch.subscribe(tx);
        ch.add_fade_at(&[255], ms(3000), ValueCurve::Linear, t0)
            .unwrap();

        ch.tick(t0 + ms(100));
        ch.tick(t0 + ms(200));
        ch.tick(t0 + ms(300));
        let events: Vec<_> = rx.try_iter().collect();
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], ChannelEvent::ValueChanged(_)));
        assert_eq!(events[0].snapshot().universe, 3);
        assert_eq!(events[0].snapshot().start, 5);

        ch.tick(t0 + ms(1300));
        assert_eq!(rx.try_iter().count(), 1);

        ch.tick(t0 + ms(3000));
        let events: Vec<_> = rx.try_iter().collect();
        assert_eq!(events.len(), 1);
        match &events[0] {
            ChannelEvent::FadeFinished(s) => assert_eq!(s.values, vec![255]),
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_dropped_receiver_is_ignored() {
        let (tx, rx) = unbounded();
        drop(rx);
        let mut ch = Channel::new(0, 1, 1, "dimmer").unwrap();
        ch.subscribe(tx);
        ch.add_fade(&[10], Duration::ZERO, ValueCurve::Linear).unwrap();
        ch.tick(Instant::now());
        assert_eq!(ch.values(), &[10]);
    }

    #[test]
    fn test_full_queue_drops_events() {
        let (tx, rx) = crossbeam_channel::bounded(1);
        let t0 = Instant::now();
        let mut ch = Channel::new(0, 1, 1, "dimmer").unwrap();
        ch.subscribe(tx);

        for i in 0..5u8 {
            ch.add_fade_at(&[i * 10], Duration::ZERO, ValueCurve::Linear, t0)
                .unwrap();
            ch.tick(t0);
        }
        assert_eq!(ch.values(), &[40]);

        let events: Vec<_> = rx.try_iter().collect();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].snapshot().values, vec![0]);
    }
}
