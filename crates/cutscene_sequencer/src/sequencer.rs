// SPDX-License-Identifier: MIT OR Apache-2.0
//! The sequencer clock.
//!
//! A host calls [`Sequencer::update`] once per tick. The sequencer scales the
//! delta by its playback rate, processes every container at the clamped sample
//! time and then handles the end of the range: loop, ping-pong or finish.
//! A skip requested with [`Sequencer::skip_timeline_to`] is deferred to the
//! end of the next update so it never interleaves with regular firing.

use crate::binding::SharedTarget;
use crate::container::{ContainerId, TrackContainer};
use crate::error::{Result, SequencerError};

/// Host tick length in seconds at a time scale of 1
pub const SEQUENCE_UPDATE_RATE: f32 = 0.01;

/// Lowest accepted playback rate
pub const MIN_PLAYBACK_RATE: f32 = -100.0;

/// Highest accepted playback rate
pub const MAX_PLAYBACK_RATE: f32 = 100.0;

/// Shortest allowed sequence
pub const MIN_DURATION: f32 = 0.1;

/// Duration of a new sequence
pub const DEFAULT_DURATION: f32 = 10.0;

/// Most loop wraps handled inside a single update
pub const MAX_LOOP_WRAPS: usize = 64;

/// Tick length for a global time multiplier
pub fn update_rate(time_scale: f32) -> f32 {
    SEQUENCE_UPDATE_RATE * time_scale
}

/// Playback notification sent to listeners
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlaybackEvent {
    /// `play` was called
    Started,
    /// `stop` was called, directly or by a loop wrap
    Stopped,
    /// `pause` was called
    Paused,
    /// The end of the range was reached
    Finished,
    /// About to process containers
    BeforeUpdate {
        /// Unclamped running time
        running_time: f32,
    },
    /// Containers were processed
    AfterUpdate {
        /// Unclamped running time
        running_time: f32,
    },
    /// The running time was set directly
    RunningTimeSet {
        /// New running time
        running_time: f32,
    },
}

/// Handle returned by [`Sequencer::add_listener`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Box<dyn FnMut(&PlaybackEvent)>;

/// Coarse playback state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    /// Fresh, at time zero
    Stopped,
    /// Advancing on update
    Playing,
    /// Started but not advancing
    Paused,
    /// Reached the end without looping
    Complete,
}

impl PlaybackState {
    /// Get the display name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Stopped => "Stopped",
            Self::Playing => "Playing",
            Self::Paused => "Paused",
            Self::Complete => "Complete",
        }
    }
}

/// Timeline clock driving a set of track containers
pub struct Sequencer {
    running_time: f32,
    playback_rate: f32,
    duration: f32,
    looping: bool,
    ping_pong: bool,
    playing: bool,
    fresh: bool,
    pending_skip: Option<f32>,
    containers: Vec<TrackContainer>,
    listeners: Vec<(ListenerId, Listener)>,
    next_listener: u64,
}

impl Default for Sequencer {
    fn default() -> Self {
        Self::new(DEFAULT_DURATION)
    }
}

impl Sequencer {
    /// Create a stopped sequencer
    pub fn new(duration: f32) -> Self {
        Self {
            running_time: 0.0,
            playback_rate: 1.0,
            duration: duration.max(MIN_DURATION),
            looping: false,
            ping_pong: false,
            playing: false,
            fresh: true,
            pending_skip: None,
            containers: Vec::new(),
            listeners: Vec::new(),
            next_listener: 0,
        }
    }

    // Clock

    /// Current running time
    pub fn running_time(&self) -> f32 {
        self.running_time
    }

    /// Sequence length
    pub fn duration(&self) -> f32 {
        self.duration
    }

    /// Set the sequence length, floored to [`MIN_DURATION`]
    pub fn set_duration(&mut self, duration: f32) {
        self.duration = duration.max(MIN_DURATION);
    }

    /// Current playback rate; negative plays in reverse
    pub fn playback_rate(&self) -> f32 {
        self.playback_rate
    }

    /// Set the playback rate, clamped to the accepted range
    pub fn set_playback_rate(&mut self, rate: f32) {
        self.playback_rate = rate.clamp(MIN_PLAYBACK_RATE, MAX_PLAYBACK_RATE);
    }

    /// Whether the sequence is advancing
    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// Whether the sequence reached its end and stopped advancing
    pub fn is_complete(&self) -> bool {
        !self.playing && self.running_time >= self.duration
    }

    /// Whether tracks have been started since the last stop
    pub fn has_sequence_been_started(&self) -> bool {
        !self.fresh
    }

    /// Whether the sequence restarts at the end
    pub fn is_looping(&self) -> bool {
        self.looping
    }

    /// Enable or disable looping
    pub fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
    }

    /// Whether the sequence bounces at either end
    pub fn is_ping_ponging(&self) -> bool {
        self.ping_pong
    }

    /// Enable or disable ping-pong
    pub fn set_ping_ponging(&mut self, ping_pong: bool) {
        self.ping_pong = ping_pong;
    }

    /// Coarse playback state
    pub fn state(&self) -> PlaybackState {
        if self.playing {
            PlaybackState::Playing
        } else if self.is_complete() {
            PlaybackState::Complete
        } else if self.fresh {
            PlaybackState::Stopped
        } else {
            PlaybackState::Paused
        }
    }

    // Listeners

    /// Register a playback listener
    pub fn add_listener(&mut self, listener: impl FnMut(&PlaybackEvent) + 'static) -> ListenerId {
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Unregister a playback listener; returns whether it was registered
    pub fn remove_listener(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(listener, _)| *listener != id);
        self.listeners.len() != before
    }

    fn notify(&mut self, event: PlaybackEvent) {
        for (_, listener) in &mut self.listeners {
            listener(&event);
        }
    }

    // Playback

    /// Start from fresh or resume
    pub fn play(&mut self) {
        self.notify(PlaybackEvent::Started);

        let running_time = self.running_time;
        if self.fresh {
            tracing::debug!("Starting sequence at {}", running_time);
            for container in &mut self.containers {
                container.start_timelines(running_time, true);
            }
            self.fresh = false;
        } else {
            tracing::debug!("Resuming sequence at {}", running_time);
            for container in &mut self.containers {
                container.resume_timelines(running_time, true);
            }
        }
        self.playing = true;
    }

    /// Stop advancing, keeping every track's state
    pub fn pause(&mut self) {
        self.notify(PlaybackEvent::Paused);
        self.playing = false;

        let running_time = self.running_time;
        tracing::debug!("Pausing sequence at {}", running_time);
        for container in &mut self.containers {
            container.pause_timelines(running_time, false);
        }
    }

    /// Unwind every track and return to time zero
    pub fn stop(&mut self) {
        self.notify(PlaybackEvent::Stopped);

        let running_time = self.running_time;
        tracing::debug!("Stopping sequence at {}", running_time);
        for container in &mut self.containers {
            container.stop_timelines(running_time, false);
        }
        self.fresh = true;
        self.playing = false;
        self.running_time = 0.0;
    }

    /// Pause when playing, play otherwise
    pub fn toggle_playback(&mut self) {
        if self.playing {
            self.pause();
        } else {
            self.play();
        }
    }

    fn end(&mut self) {
        self.notify(PlaybackEvent::Finished);
        if self.looping || self.ping_pong {
            return;
        }

        let running_time = self.running_time;
        tracing::debug!("Sequence finished at {}", running_time);
        for container in &mut self.containers {
            container.end_timelines(running_time, false);
        }
    }

    fn has_reached_end(&self) -> bool {
        (self.playback_rate > 0.0 && self.running_time >= self.duration)
            || (self.playback_rate < 0.0 && self.running_time <= 0.0)
    }

    fn wrapped_time(&self) -> f32 {
        if self.playback_rate > 0.0 {
            self.running_time - self.duration
        } else {
            self.duration + self.running_time
        }
    }

    fn process_containers(&mut self) {
        let sample_time = self.running_time.clamp(0.0, self.duration);
        let running_time = self.running_time;

        self.notify(PlaybackEvent::BeforeUpdate { running_time });
        let (rate, playing) = (self.playback_rate, self.playing);
        for container in &mut self.containers {
            container.process_tracks(sample_time, rate, playing);
        }
        self.notify(PlaybackEvent::AfterUpdate { running_time });
    }

    /// Advance by `delta_time` host seconds
    pub fn update(&mut self, delta_time: f32) {
        if self.playing {
            self.running_time += delta_time * self.playback_rate;
            self.advance();
        }
        self.apply_pending_skip();
    }

    fn advance(&mut self) {
        let mut wraps = 0;
        loop {
            self.process_containers();
            if !self.has_reached_end() {
                return;
            }

            if self.looping {
                if wraps == MAX_LOOP_WRAPS {
                    let folded = self.running_time.rem_euclid(self.duration);
                    tracing::warn!(
                        "Loop wrapped {} times in one update, folding running time {} to {}",
                        MAX_LOOP_WRAPS,
                        self.running_time,
                        folded
                    );
                    self.restart_at(folded);
                    self.process_containers();
                    return;
                }
                wraps += 1;
                let wrapped = self.wrapped_time();
                tracing::debug!("Looping sequence to {}", wrapped);
                self.restart_at(wrapped);
                continue;
            }

            if self.ping_pong {
                self.running_time = if self.playback_rate > 0.0 {
                    self.duration + (self.duration - self.running_time)
                } else {
                    -self.running_time
                };
                self.playback_rate = -self.playback_rate;
                tracing::debug!(
                    "Ping-pong at {} with rate {}",
                    self.running_time,
                    self.playback_rate
                );
                return;
            }

            self.playing = false;
            self.end();
            return;
        }
    }

    fn restart_at(&mut self, time: f32) {
        self.stop();
        self.running_time = time;
        self.play();
    }

    fn apply_pending_skip(&mut self) {
        let Some(time) = self.pending_skip.take() else {
            return;
        };
        if time <= 0.0 {
            tracing::debug!("Ignoring skip to {}", time);
            return;
        }
        let time = time.min(self.duration);
        tracing::debug!("Skipping sequence to {}", time);

        let (running_time, playing) = (self.running_time, self.playing);
        for container in &mut self.containers {
            container.skip_timeline_to(time, running_time, playing);
        }
        self.running_time = time;
    }

    /// Jump to `time` on the next update, firing only fire-on-skip events.
    ///
    /// Only positive times are honored; a skip to zero or below still starts
    /// a fresh sequence but leaves the running time alone. Use [`stop`] or
    /// [`set_running_time`] to return to the start.
    ///
    /// [`stop`]: Self::stop
    /// [`set_running_time`]: Self::set_running_time
    pub fn skip_timeline_to(&mut self, time: f32) {
        if self.running_time <= 0.0 && !self.playing {
            self.play();
        }
        self.pending_skip = Some(time);
    }

    /// Time a deferred skip will jump to
    pub fn pending_skip(&self) -> Option<f32> {
        self.pending_skip
    }

    /// Scrub to `time`, processing every track there
    pub fn set_running_time(&mut self, time: f32) {
        self.running_time = time.clamp(0.0, self.duration);
        let running_time = self.running_time;

        if self.fresh {
            for container in &mut self.containers {
                container.start_timelines(running_time, self.playing);
            }
            self.fresh = false;
        }

        let (rate, playing) = (self.playback_rate, self.playing);
        for container in &mut self.containers {
            container.manually_set_time(running_time, playing);
            container.process_tracks(running_time, rate, playing);
        }

        self.notify(PlaybackEvent::RunningTimeSet { running_time });
    }

    // Containers

    /// Create a container for `target`, ordered after every existing one
    pub fn create_container(&mut self, target: &SharedTarget) -> &mut TrackContainer {
        let mut container = TrackContainer::with_target(target);
        container.index = self.next_index();
        self.push_container(container)
    }

    /// Add a prepared container; an index of 0 is replaced by the next free one
    pub fn add_container(&mut self, mut container: TrackContainer) -> ContainerId {
        if container.index == 0 {
            container.index = self.next_index();
        }
        self.push_container(container).id()
    }

    fn push_container(&mut self, container: TrackContainer) -> &mut TrackContainer {
        tracing::debug!("Added container '{}'", container.name);
        let index = self.containers.len();
        self.containers.push(container);
        &mut self.containers[index]
    }

    fn next_index(&self) -> i32 {
        self.containers.iter().map(|c| c.index).max().unwrap_or(0) + 1
    }

    /// Get a container
    pub fn container(&self, id: ContainerId) -> Option<&TrackContainer> {
        self.containers.iter().find(|c| c.id() == id)
    }

    /// Get a mutable container
    pub fn container_mut(&mut self, id: ContainerId) -> Option<&mut TrackContainer> {
        self.containers.iter_mut().find(|c| c.id() == id)
    }

    /// Container bound to `target`
    pub fn container_for(&self, target: &SharedTarget) -> Option<&TrackContainer> {
        self.containers.iter().find(|c| c.is_bound_to(target))
    }

    /// Mutable container bound to `target`
    pub fn container_for_mut(&mut self, target: &SharedTarget) -> Option<&mut TrackContainer> {
        self.containers.iter_mut().find(|c| c.is_bound_to(target))
    }

    /// Whether any container is bound to `target`
    pub fn has_container_for(&self, target: &SharedTarget) -> bool {
        self.container_for(target).is_some()
    }

    /// Remove a container
    pub fn remove_container(&mut self, id: ContainerId) -> Result<TrackContainer> {
        let index = self
            .containers
            .iter()
            .position(|c| c.id() == id)
            .ok_or_else(|| SequencerError::ContainerNotFound(id.0.to_string()))?;
        Ok(self.containers.remove(index))
    }

    /// Containers in processing order
    pub fn containers(&self) -> &[TrackContainer] {
        &self.containers
    }

    /// Containers ordered by their index, for display
    pub fn sorted_containers(&self) -> Vec<&TrackContainer> {
        let mut sorted: Vec<&TrackContainer> = self.containers.iter().collect();
        sorted.sort_by_key(|c| c.index);
        sorted
    }
}

impl std::fmt::Debug for Sequencer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sequencer")
            .field("running_time", &self.running_time)
            .field("playback_rate", &self.playback_rate)
            .field("duration", &self.duration)
            .field("looping", &self.looping)
            .field("ping_pong", &self.ping_pong)
            .field("playing", &self.playing)
            .field("fresh", &self.fresh)
            .field("pending_skip", &self.pending_skip)
            .field("containers", &self.containers)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
