// SPDX-License-Identifier: MIT OR Apache-2.0
//! Timeline shot tracks.
//!
//! A [`ShotTrack`] is a list of camera clips on a timeline. Playing it through
//! a [`ShotTrackPlayer`] drives one blend override on a director channel, so a
//! cutscene can take over a channel and hand it back when it ends.

use crate::blender::OverrideId;
use crate::camera::CameraId;
use crate::channel::ChannelId;
use crate::director::CameraDirector;
use crate::error::DirectorError;

/// A camera shown for a span of timeline time
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShotClip {
    /// Camera to show
    pub camera: CameraId,
    /// Start time in seconds
    pub start: f32,
    /// End time in seconds
    pub end: f32,
    /// Seconds spent blending in from the channel's own camera
    pub ease_in: f32,
    /// Seconds spent blending back out
    pub ease_out: f32,
}

impl ShotClip {
    /// Create a clip with no easing
    pub fn new(camera: CameraId, start: f32, end: f32) -> Self {
        Self {
            camera,
            start,
            end: end.max(start),
            ease_in: 0.0,
            ease_out: 0.0,
        }
    }

    /// Set ease in and ease out durations
    pub fn with_ease(mut self, ease_in: f32, ease_out: f32) -> Self {
        self.ease_in = ease_in.max(0.0);
        self.ease_out = ease_out.max(0.0);
        self
    }

    /// Whether the clip covers `time`
    pub fn contains(&self, time: f32) -> bool {
        time >= self.start && time < self.end
    }

    fn ease_weight(&self, time: f32) -> f32 {
        let ease_in = if self.ease_in > 0.0 {
            ((time - self.start) / self.ease_in).clamp(0.0, 1.0)
        } else {
            1.0
        };
        let ease_out = if self.ease_out > 0.0 {
            ((self.end - time) / self.ease_out).clamp(0.0, 1.0)
        } else {
            1.0
        };
        ease_in.min(ease_out)
    }
}

/// Override parameters for one point on a shot track
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShotSample {
    /// Camera at weight 0; `None` blends from the channel's own camera
    pub cam_a: Option<CameraId>,
    /// Camera at weight 1
    pub cam_b: Option<CameraId>,
    /// Weight of `cam_b`
    pub weight_b: f32,
}

/// Camera clips ordered by start time
#[derive(Debug, Clone, Default)]
pub struct ShotTrack {
    clips: Vec<ShotClip>,
}

impl ShotTrack {
    /// Create an empty track
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a clip
    pub fn add_clip(&mut self, clip: ShotClip) {
        self.clips.push(clip);
        self.clips.sort_by(|a, b| a.start.total_cmp(&b.start));
    }

    /// Clips, earliest first
    pub fn clips(&self) -> &[ShotClip] {
        &self.clips
    }

    /// End of the last clip
    pub fn duration(&self) -> f32 {
        self.clips.iter().map(|clip| clip.end).fold(0.0, f32::max)
    }

    /// Override parameters at `time`, or `None` when no clip covers it.
    ///
    /// Where clips overlap, the two latest-starting ones blend: the later one
    /// is `cam_b` and its weight is its progress through the overlap.
    pub fn evaluate(&self, time: f32) -> Option<ShotSample> {
        let mut active = self.clips.iter().rev().filter(|clip| clip.contains(time));
        let newest = active.next()?;

        let Some(previous) = active.next() else {
            return Some(ShotSample {
                cam_a: None,
                cam_b: Some(newest.camera),
                weight_b: newest.ease_weight(time),
            });
        };

        let overlap = previous.end.min(newest.end) - newest.start;
        let weight_b = if overlap > 0.0 {
            ((time - newest.start) / overlap).clamp(0.0, 1.0)
        } else {
            1.0
        };
        Some(ShotSample {
            cam_a: Some(previous.camera),
            cam_b: Some(newest.camera),
            weight_b,
        })
    }
}

/// Playback state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackState {
    /// Stopped; the player holds no override
    #[default]
    Stopped,
    /// Playing forward
    Playing,
    /// Paused; the override stays where it is
    Paused,
}

/// Plays a shot track into a director channel through one override slot
#[derive(Debug)]
pub struct ShotTrackPlayer {
    track: ShotTrack,
    /// Current playback time
    pub time: f32,
    /// Playback state
    pub state: PlaybackState,
    /// Playback speed multiplier
    pub speed: f32,
    /// Whether playback wraps at the end of the track
    pub looping: bool,
    held: Option<(ChannelId, OverrideId)>,
}

impl ShotTrackPlayer {
    /// Create a stopped player for a track
    pub fn new(track: ShotTrack) -> Self {
        Self {
            track,
            time: 0.0,
            state: PlaybackState::Stopped,
            speed: 1.0,
            looping: false,
            held: None,
        }
    }

    /// Track being played
    pub fn track(&self) -> &ShotTrack {
        &self.track
    }

    /// Mutable track being played
    pub fn track_mut(&mut self) -> &mut ShotTrack {
        &mut self.track
    }

    /// Advance playback time
    pub fn update(&mut self, delta_time: f32) {
        if self.state != PlaybackState::Playing {
            return;
        }

        self.time += delta_time * self.speed;
        let end = self.track.duration();
        if self.time >= end {
            if self.looping && end > 0.0 {
                self.time %= end;
            } else {
                self.time = end;
                self.state = PlaybackState::Stopped;
            }
        }
    }

    /// Play from the current position
    pub fn play(&mut self) {
        self.state = PlaybackState::Playing;
    }

    /// Pause playback
    pub fn pause(&mut self) {
        if self.state == PlaybackState::Playing {
            self.state = PlaybackState::Paused;
        }
    }

    /// Stop and rewind
    pub fn stop(&mut self) {
        self.state = PlaybackState::Stopped;
        self.time = 0.0;
    }

    /// Seek to a specific time
    pub fn seek(&mut self, time: f32) {
        self.time = time.max(0.0);
    }

    /// Whether playback is running
    pub fn is_playing(&self) -> bool {
        self.state == PlaybackState::Playing
    }

    /// Override currently held, if any
    pub fn held_override(&self) -> Option<(ChannelId, OverrideId)> {
        self.held
    }

    /// Push the current sample to `channel`, or release the override when
    /// the player is stopped or no clip covers the current time.
    pub fn apply(
        &mut self,
        director: &mut CameraDirector,
        channel: ChannelId,
    ) -> Result<Option<ShotSample>, DirectorError> {
        let sample = match self.state {
            PlaybackState::Stopped => None,
            PlaybackState::Playing | PlaybackState::Paused => self.track.evaluate(self.time),
        };

        let Some(sample) = sample else {
            self.release(director)?;
            return Ok(None);
        };

        let reuse = match self.held {
            Some((held_channel, id)) if held_channel == channel => Some(id),
            Some(_) => {
                self.release(director)?;
                None
            }
            None => None,
        };
        let id = director.set_override(channel, reuse, sample.cam_a, sample.cam_b, sample.weight_b)?;
        self.held = Some((channel, id));
        Ok(Some(sample))
    }

    /// Release the held override, if any
    pub fn release(&mut self, director: &mut CameraDirector) -> Result<(), DirectorError> {
        if let Some((channel, id)) = self.held.take() {
            director.release_override(channel, id)?;
        }
        Ok(())
    }
}

impl Drop for ShotTrackPlayer {
    fn drop(&mut self) {
        if let Some((channel, id)) = self.held {
            tracing::warn!("Shot player dropped while holding override {:?} on {}", id, channel);
        }
    }
}
