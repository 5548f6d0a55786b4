// SPDX-License-Identifier: MIT OR Apache-2.0
//! Event tracks and the event firing policy.
//!
//! The policy compares the previous and the new elapsed time of a track
//! against each event's fire time and window:
//!
//! - fire: `(prev < fire || prev <= 0) && new >= fire`, forward playback only
//! - process: `fire < new <= fire + duration`
//! - end: `prev < fire + duration && new >= fire + duration`
//! - undo: `prev >= fire && new < fire`
//!
//! Events with a duration of zero or less are fire-and-forget: they have no
//! process window and never end. Moving forward evaluates events in ascending
//! fire-time order; rewinding evaluates them descending so that later events
//! are undone first.

use crate::binding::{MemberPath, TargetRef};
use crate::error::{Result, SequencerError};
use crate::track::{Track, TrackContext, TrackId, TrackType};
use crate::value::PropertyValue;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;
use uuid::Uuid;

/// Unique identifier for an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventId(pub Uuid);

impl EventId {
    /// Create a new random event ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

/// When an event fires and how long it lasts
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EventTiming {
    /// Fire time in seconds
    pub fire_time: f32,
    /// Window length; zero or less means fire-and-forget
    pub duration: f32,
    /// Whether skipping past the event fires it
    #[serde(default)]
    pub fire_on_skip: bool,
}

impl EventTiming {
    /// Fire-and-forget timing
    pub fn instant(fire_time: f32) -> Self {
        Self {
            fire_time,
            duration: -1.0,
            fire_on_skip: false,
        }
    }

    /// Timing with a process window
    pub fn windowed(fire_time: f32, duration: f32) -> Self {
        Self {
            fire_time,
            duration,
            fire_on_skip: false,
        }
    }

    /// Set the fire-on-skip flag
    pub fn with_fire_on_skip(mut self, fire_on_skip: bool) -> Self {
        self.fire_on_skip = fire_on_skip;
        self
    }

    /// Whether the event has no window
    pub fn is_fire_and_forget(&self) -> bool {
        self.duration <= 0.0
    }

    /// End of the window
    pub fn end_time(&self) -> f32 {
        self.fire_time + self.duration.max(0.0)
    }
}

/// Lifecycle state of an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EventState {
    /// Not fired
    #[default]
    Idle,
    /// Fired, window not yet entered
    Fired,
    /// Inside its window
    Processing,
    /// Window finished
    Ended,
}

/// Transitions an event takes in one step
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EventTransitions {
    /// Fire the event
    pub fire: bool,
    /// Process with this delta (time since fire)
    pub process: Option<f32>,
    /// Process one last time with this delta, then end
    pub end: Option<f32>,
    /// Undo the event
    pub undo: bool,
}

impl EventTransitions {
    /// Whether nothing happens
    pub fn is_empty(&self) -> bool {
        !self.fire && self.process.is_none() && self.end.is_none() && !self.undo
    }
}

/// Decide which transitions an event takes moving from `prev` to `new`.
///
/// `sequence_time` is the absolute time handed to process/end deltas. No event
/// fires while `playback_rate` is negative; undo, process and end still apply.
pub fn evaluate_transitions(
    timing: &EventTiming,
    prev: f32,
    new: f32,
    sequence_time: f32,
    playback_rate: f32,
) -> EventTransitions {
    let fire_time = timing.fire_time;
    let mut transitions = EventTransitions::default();

    if playback_rate >= 0.0 && (prev < fire_time || prev <= 0.0) && new >= fire_time {
        transitions.fire = true;
    }

    if !timing.is_fire_and_forget() {
        let end_time = fire_time + timing.duration;
        let delta = sequence_time - fire_time;
        if prev < end_time && new >= end_time {
            transitions.end = Some(delta);
        } else if new > fire_time && new <= end_time {
            transitions.process = Some(delta);
        }
    }

    if prev >= fire_time && new < fire_time {
        transitions.undo = true;
    }

    transitions
}

/// What an event action sees when it is invoked
#[derive(Debug, Clone, Copy)]
pub struct EventContext<'a> {
    /// The container's target
    pub target: &'a TargetRef,
    /// Event timing
    pub timing: EventTiming,
    /// Event name
    pub name: &'a str,
}

/// Behaviour attached to an event
pub trait EventAction {
    /// The event fired
    fn fire(&mut self, ctx: &EventContext<'_>);

    /// Inside the window; `delta_time` is time since the fire time
    fn process(&mut self, _ctx: &EventContext<'_>, _delta_time: f32) {}

    /// The window finished
    fn end(&mut self, _ctx: &EventContext<'_>) {}

    /// Reverse whatever fire/process applied
    fn undo(&mut self, _ctx: &EventContext<'_>) {}

    /// The sequence stopped after this event fired
    fn stop(&mut self, ctx: &EventContext<'_>) {
        self.undo(ctx);
    }

    /// Playback paused
    fn pause(&mut self, _ctx: &EventContext<'_>) {}

    /// Playback resumed inside the window
    fn resume(&mut self, _ctx: &EventContext<'_>) {}

    /// Preview time set; `delta_time` is time since the fire time
    fn manually_set_time(&mut self, _ctx: &EventContext<'_>, _delta_time: f32) {}
}

/// A timed event with its action
pub struct SequenceEvent {
    id: EventId,
    /// Event name
    pub name: String,
    timing: EventTiming,
    state: EventState,
    action: Box<dyn EventAction>,
}

impl SequenceEvent {
    /// Create an event
    pub fn new(
        name: impl Into<String>,
        timing: EventTiming,
        action: impl EventAction + 'static,
    ) -> Self {
        Self {
            id: EventId::new(),
            name: name.into(),
            timing,
            state: EventState::Idle,
            action: Box::new(action),
        }
    }

    /// Event ID
    pub fn id(&self) -> EventId {
        self.id
    }

    /// Event timing
    pub fn timing(&self) -> EventTiming {
        self.timing
    }

    /// Fire time
    pub fn fire_time(&self) -> f32 {
        self.timing.fire_time
    }

    /// Current state
    pub fn state(&self) -> EventState {
        self.state
    }

    fn invoke(
        &mut self,
        target: &TargetRef,
        f: impl FnOnce(&mut dyn EventAction, &EventContext<'_>),
    ) {
        let ctx = EventContext {
            target,
            timing: self.timing,
            name: &self.name,
        };
        f(self.action.as_mut(), &ctx);
    }

    /// Fire from `Idle` only; a fired event has to be undone or stopped first
    fn fire(&mut self, target: &TargetRef) {
        if self.state != EventState::Idle {
            return;
        }
        tracing::trace!("Fire event '{}' at {}", self.name, self.timing.fire_time);
        let ctx = EventContext {
            target,
            timing: self.timing,
            name: &self.name,
        };
        self.action.fire(&ctx);
        self.state = EventState::Fired;
    }

    fn apply(&mut self, target: &TargetRef, transitions: EventTransitions) {
        if transitions.fire {
            self.fire(target);
        }
        let ctx = EventContext {
            target,
            timing: self.timing,
            name: &self.name,
        };
        if let Some(delta) = transitions.process {
            self.action.process(&ctx, delta);
            self.state = EventState::Processing;
        }
        if let Some(delta) = transitions.end {
            tracing::trace!("End event '{}'", self.name);
            self.action.process(&ctx, delta);
            self.action.end(&ctx);
            self.state = EventState::Ended;
        }
        if transitions.undo {
            tracing::trace!("Undo event '{}'", self.name);
            self.action.undo(&ctx);
            self.state = EventState::Idle;
        }
    }
}

impl std::fmt::Debug for SequenceEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SequenceEvent")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("timing", &self.timing)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

/// Track of discrete events, kept in fire-time order
#[derive(Debug)]
pub struct EventTrack {
    id: TrackId,
    name: String,
    elapsed_time: f32,
    events: Vec<SequenceEvent>,
}

impl EventTrack {
    /// Create an empty event track
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: TrackId::new(),
            name: name.into(),
            elapsed_time: 0.0,
            events: Vec::new(),
        }
    }

    /// Add an event, keeping fire-time order
    pub fn add_event(&mut self, event: SequenceEvent) -> EventId {
        let id = event.id;
        let index = self
            .events
            .partition_point(|e| e.timing.fire_time <= event.timing.fire_time);
        self.events.insert(index, event);
        id
    }

    /// Remove an event
    pub fn remove_event(&mut self, id: EventId) -> Result<SequenceEvent> {
        let index = self
            .events
            .iter()
            .position(|e| e.id == id)
            .ok_or_else(|| SequencerError::EventNotFound(id.0.to_string()))?;
        Ok(self.events.remove(index))
    }

    /// Move an event in time, keeping order
    pub fn set_fire_time(&mut self, id: EventId, fire_time: f32) -> Result<()> {
        let mut event = self.remove_event(id)?;
        event.timing.fire_time = fire_time.max(0.0);
        self.add_event(event);
        Ok(())
    }

    /// Get an event
    pub fn event(&self, id: EventId) -> Option<&SequenceEvent> {
        self.events.iter().find(|e| e.id == id)
    }

    /// All events in fire-time order
    pub fn events(&self) -> &[SequenceEvent] {
        &self.events
    }

    /// Number of events
    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    /// Elapsed time as last seen by the track
    pub fn elapsed_time(&self) -> f32 {
        self.elapsed_time
    }
}

impl Track for EventTrack {
    fn id(&self) -> TrackId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn track_type(&self) -> TrackType {
        TrackType::Event
    }

    fn process(&mut self, ctx: &TrackContext<'_>, sequence_time: f32, playback_rate: f32) {
        let prev = self.elapsed_time;
        self.elapsed_time = sequence_time;
        let new = self.elapsed_time;

        let Some(target) = ctx.live_target() else {
            return;
        };

        let mut visit = |event: &mut SequenceEvent| {
            let transitions =
                evaluate_transitions(&event.timing, prev, new, sequence_time, playback_rate);
            if !transitions.is_empty() {
                event.apply(target, transitions);
            }
        };
        if prev < new {
            self.events.iter_mut().for_each(&mut visit);
        } else {
            self.events.iter_mut().rev().for_each(&mut visit);
        }
    }

    fn pause_timeline(&mut self, ctx: &TrackContext<'_>) {
        let Some(target) = ctx.live_target() else {
            return;
        };
        for event in &mut self.events {
            event.invoke(target, |action, ctx| action.pause(ctx));
        }
    }

    fn resume_timeline(&mut self, ctx: &TrackContext<'_>) {
        let Some(target) = ctx.live_target() else {
            return;
        };
        let running_time = ctx.running_time;
        for event in &mut self.events {
            let timing = event.timing;
            if timing.is_fire_and_forget() {
                continue;
            }
            let end_time = timing.fire_time + timing.duration;
            if running_time > timing.fire_time && running_time < end_time {
                event.invoke(target, |action, ctx| action.resume(ctx));
            }
        }
    }

    fn stop_timeline(&mut self, ctx: &TrackContext<'_>) {
        let prev = self.elapsed_time;
        self.elapsed_time = 0.0;

        let Some(target) = ctx.live_target() else {
            return;
        };
        for event in self.events.iter_mut().rev() {
            if event.timing.fire_time > prev {
                continue;
            }
            event.invoke(target, |action, ctx| action.stop(ctx));
            event.state = EventState::Idle;
        }
    }

    fn skip_timeline_to(&mut self, ctx: &TrackContext<'_>, time: f32) {
        let prev = self.elapsed_time;
        self.elapsed_time = time;

        let Some(target) = ctx.live_target() else {
            return;
        };
        if !ctx.is_playing {
            return;
        }
        for event in &mut self.events {
            let timing = event.timing;
            if !timing.is_fire_and_forget() || !timing.fire_on_skip {
                continue;
            }
            if (prev < timing.fire_time || prev <= 0.0) && time > timing.fire_time {
                event.fire(target);
            }
        }
    }

    fn manually_set_time(&mut self, ctx: &TrackContext<'_>, time: f32) {
        let Some(target) = ctx.live_target() else {
            return;
        };
        for event in &mut self.events {
            let delta = time - event.timing.fire_time;
            event.invoke(target, |action, ctx| action.manually_set_time(ctx, delta));
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Sets a member when fired and puts the old value back on undo
#[derive(Debug, Clone)]
pub struct SetPropertyAction {
    path: MemberPath,
    value: PropertyValue,
    previous: Option<PropertyValue>,
}

impl SetPropertyAction {
    /// Create the action
    pub fn new(path: MemberPath, value: PropertyValue) -> Self {
        Self {
            path,
            value,
            previous: None,
        }
    }
}

impl EventAction for SetPropertyAction {
    fn fire(&mut self, ctx: &EventContext<'_>) {
        if self.previous.is_none() {
            self.previous = ctx.target.get(&self.path);
        }
        if let Err(e) = ctx.target.set(&self.path, self.value) {
            tracing::warn!("Event '{}' could not set {}: {}", ctx.name, self.path, e);
        }
    }

    fn undo(&mut self, ctx: &EventContext<'_>) {
        if let Some(previous) = self.previous.take() {
            if let Err(e) = ctx.target.set(&self.path, previous) {
                tracing::warn!("Event '{}' could not restore {}: {}", ctx.name, self.path, e);
            }
        }
    }
}

/// How a message event was reached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageKind {
    /// Fired
    Fired,
    /// Window finished
    Ended,
    /// Undone by rewinding or stopping
    Undone,
}

/// A message posted by a [`MessageAction`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventMessage {
    /// Event name
    pub name: String,
    /// Fire time of the event
    pub fire_time: f32,
    /// Transition that posted it
    pub kind: MessageKind,
}

/// Shared outbox the host drains after each update
pub type MessageSink = Rc<RefCell<Vec<EventMessage>>>;

/// Posts a message to the host on fire, end and undo
#[derive(Debug, Clone)]
pub struct MessageAction {
    sink: MessageSink,
}

impl MessageAction {
    /// Create the action
    pub fn new(sink: MessageSink) -> Self {
        Self { sink }
    }

    fn post(&self, ctx: &EventContext<'_>, kind: MessageKind) {
        self.sink.borrow_mut().push(EventMessage {
            name: ctx.name.to_string(),
            fire_time: ctx.timing.fire_time,
            kind,
        });
    }
}

impl EventAction for MessageAction {
    fn fire(&mut self, ctx: &EventContext<'_>) {
        self.post(ctx, MessageKind::Fired);
    }

    fn end(&mut self, ctx: &EventContext<'_>) {
        self.post(ctx, MessageKind::Ended);
    }

    fn undo(&mut self, ctx: &EventContext<'_>) {
        self.post(ctx, MessageKind::Undone);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::{shared, PropertyBag, SharedTarget};

    type Log = Rc<RefCell<Vec<String>>>;

    struct Recorder {
        log: Log,
    }

    impl EventAction for Recorder {
        fn fire(&mut self, ctx: &EventContext<'_>) {
            self.log.borrow_mut().push(format!("fire {}", ctx.name));
        }

        fn process(&mut self, ctx: &EventContext<'_>, delta_time: f32) {
            self.log.borrow_mut().push(format!("process {} {delta_time}", ctx.name));
        }

        fn end(&mut self, ctx: &EventContext<'_>) {
            self.log.borrow_mut().push(format!("end {}", ctx.name));
        }

        fn undo(&mut self, ctx: &EventContext<'_>) {
            self.log.borrow_mut().push(format!("undo {}", ctx.name));
        }

        fn stop(&mut self, ctx: &EventContext<'_>) {
            self.log.borrow_mut().push(format!("stop {}", ctx.name));
        }
    }

    fn fixture() -> (SharedTarget, TargetRef, Log) {
        let target = shared(PropertyBag::new("Actor"));
        let handle = TargetRef::new(&target);
        (target, handle, Rc::new(RefCell::new(Vec::new())))
    }

    fn ctx(target: &TargetRef) -> TrackContext<'_> {
        TrackContext {
            target: Some(target),
            running_time: 0.0,
            is_playing: true,
        }
    }

    fn count(log: &Log, prefix: &str) -> usize {
        log.borrow().iter().filter(|l| l.starts_with(prefix)).count()
    }

    #[test]
    fn test_fire_once_forward() {
        let (_target, handle, log) = fixture();
        let mut track = EventTrack::new("Events");
        track.add_event(SequenceEvent::new(
            "boom",
            EventTiming::windowed(2.0, 0.0),
            Recorder { log: log.clone() },
        ));

        let ctx = ctx(&handle);
        let mut fired_at = None;
        for step in 1..=10 {
            let time = step as f32 * 0.5;
            let before = count(&log, "fire");
            track.process(&ctx, time, 1.0);
            if count(&log, "fire") > before {
                fired_at.get_or_insert(time);
            }
        }
        assert_eq!(count(&log, "fire"), 1);
        assert_eq!(fired_at, Some(2.0));
        assert_eq!(track.events()[0].state(), EventState::Fired);
    }

    #[test]
    fn test_event_at_zero_fires_once() {
        let (_target, handle, log) = fixture();
        let mut track = EventTrack::new("Events");
        track.add_event(SequenceEvent::new(
            "open",
            EventTiming::instant(0.0),
            Recorder { log: log.clone() },
        ));

        let ctx = ctx(&handle);
        track.process(&ctx, 0.0, 1.0);
        assert_eq!(count(&log, "fire"), 1);
        track.process(&ctx, 0.1, 1.0);
        track.process(&ctx, 0.2, 1.0);
        assert_eq!(count(&log, "fire"), 1);
        assert_eq!(track.events()[0].state(), EventState::Fired);

        track.stop_timeline(&ctx);
        track.process(&ctx, 0.0, 1.0);
        track.process(&ctx, 0.1, 1.0);
        assert_eq!(count(&log, "fire"), 2);
    }

    #[test]
    fn test_undo_on_rewind() {
        let (_target, handle, log) = fixture();
        let mut track = EventTrack::new("Events");
        track.add_event(SequenceEvent::new(
            "boom",
            EventTiming::windowed(2.0, 0.0),
            Recorder { log: log.clone() },
        ));

        let ctx = ctx(&handle);
        track.process(&ctx, 0.5, 1.0);
        track.process(&ctx, 2.5, 1.0);
        assert_eq!(count(&log, "fire"), 1);

        track.process(&ctx, 1.0, 1.0);
        assert_eq!(count(&log, "undo"), 1);
        assert_eq!(count(&log, "fire"), 1);
        assert_eq!(track.events()[0].state(), EventState::Idle);
    }

    #[test]
    fn test_windowed_event_processes_and_ends() {
        let (_target, handle, log) = fixture();
        let mut track = EventTrack::new("Events");
        track.add_event(SequenceEvent::new(
            "fade",
            EventTiming::windowed(1.0, 1.0),
            Recorder { log: log.clone() },
        ));

        let ctx = ctx(&handle);
        track.process(&ctx, 0.5, 1.0);
        track.process(&ctx, 1.0, 1.0);
        assert_eq!(track.events()[0].state(), EventState::Fired);
        track.process(&ctx, 1.5, 1.0);
        assert_eq!(track.events()[0].state(), EventState::Processing);
        track.process(&ctx, 2.5, 1.0);
        assert_eq!(track.events()[0].state(), EventState::Ended);
        track.process(&ctx, 3.0, 1.0);

        assert_eq!(
            *log.borrow(),
            vec![
                "fire fade".to_string(),
                "process fade 0.5".to_string(),
                "process fade 1.5".to_string(),
                "end fade".to_string(),
            ]
        );
    }

    #[test]
    fn test_rewind_undoes_later_events_first() {
        let (_target, handle, log) = fixture();
        let mut track = EventTrack::new("Events");
        for (name, time) in [("a", 1.0), ("b", 2.0), ("c", 3.0)] {
            track.add_event(SequenceEvent::new(
                name,
                EventTiming::instant(time),
                Recorder { log: log.clone() },
            ));
        }

        let ctx = ctx(&handle);
        track.process(&ctx, 4.0, 1.0);
        log.borrow_mut().clear();

        track.process(&ctx, 0.5, 1.0);
        assert_eq!(
            *log.borrow(),
            vec!["undo c".to_string(), "undo b".to_string(), "undo a".to_string()]
        );
    }

    #[test]
    fn test_reverse_playback_does_not_fire() {
        let transitions = evaluate_transitions(&EventTiming::instant(2.0), 1.0, 3.0, 3.0, -1.0);
        assert!(!transitions.fire);

        let transitions = evaluate_transitions(&EventTiming::instant(2.0), 3.0, 1.0, 1.0, -1.0);
        assert!(transitions.undo);
    }

    #[test]
    fn test_no_transition_is_noop() {
        let transitions =
            evaluate_transitions(&EventTiming::windowed(5.0, 1.0), 1.0, 2.0, 2.0, 1.0);
        assert!(transitions.is_empty());
    }

    #[test]
    fn test_skip_fires_only_fire_on_skip_instant_events() {
        let (_target, handle, log) = fixture();
        let mut track = EventTrack::new("Events");
        track.add_event(SequenceEvent::new(
            "instant",
            EventTiming::instant(1.5).with_fire_on_skip(true),
            Recorder { log: log.clone() },
        ));
        track.add_event(SequenceEvent::new(
            "windowed",
            EventTiming::windowed(2.0, 1.0).with_fire_on_skip(true),
            Recorder { log: log.clone() },
        ));
        track.add_event(SequenceEvent::new(
            "quiet",
            EventTiming::instant(2.5),
            Recorder { log: log.clone() },
        ));

        track.skip_timeline_to(&ctx(&handle), 3.0);
        assert_eq!(*log.borrow(), vec!["fire instant".to_string()]);
        assert_eq!(track.elapsed_time(), 3.0);
    }

    #[test]
    fn test_skip_while_not_playing_fires_nothing() {
        let (_target, handle, log) = fixture();
        let mut track = EventTrack::new("Events");
        track.add_event(SequenceEvent::new(
            "instant",
            EventTiming::instant(1.5).with_fire_on_skip(true),
            Recorder { log: log.clone() },
        ));

        let ctx = TrackContext {
            target: Some(&handle),
            running_time: 0.0,
            is_playing: false,
        };
        track.skip_timeline_to(&ctx, 3.0);
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn test_stop_unwinds_in_reverse_order() {
        let (_target, handle, log) = fixture();
        let mut track = EventTrack::new("Events");
        for (name, time) in [("a", 1.0), ("b", 2.0), ("c", 5.0)] {
            track.add_event(SequenceEvent::new(
                name,
                EventTiming::instant(time),
                Recorder { log: log.clone() },
            ));
        }

        let ctx = ctx(&handle);
        track.process(&ctx, 3.0, 1.0);
        log.borrow_mut().clear();

        track.stop_timeline(&ctx);
        assert_eq!(*log.borrow(), vec!["stop b".to_string(), "stop a".to_string()]);
        assert_eq!(track.elapsed_time(), 0.0);
    }

    #[test]
    fn test_set_property_action_undo_restores() {
        let path = MemberPath::new("", "visible");
        let target =
            shared(PropertyBag::new("Door").with(path.clone(), PropertyValue::Bool(false)));
        let handle = TargetRef::new(&target);

        let mut track = EventTrack::new("Events");
        track.add_event(SequenceEvent::new(
            "show",
            EventTiming::instant(1.0),
            SetPropertyAction::new(path.clone(), PropertyValue::Bool(true)),
        ));

        let ctx = ctx(&handle);
        track.process(&ctx, 1.5, 1.0);
        assert_eq!(target.borrow().get(&path), Some(PropertyValue::Bool(true)));
        track.process(&ctx, 0.5, 1.0);
        assert_eq!(target.borrow().get(&path), Some(PropertyValue::Bool(false)));
    }

    #[test]
    fn test_message_action_posts() {
        let (_target, handle, _log) = fixture();
        let sink: MessageSink = Rc::new(RefCell::new(Vec::new()));
        let mut track = EventTrack::new("Events");
        track.add_event(SequenceEvent::new(
            "cue",
            EventTiming::instant(1.0),
            MessageAction::new(sink.clone()),
        ));

        let ctx = ctx(&handle);
        track.process(&ctx, 2.0, 1.0);
        track.process(&ctx, 0.0, 1.0);
        let kinds: Vec<_> = sink.borrow().iter().map(|m| m.kind).collect();
        assert_eq!(kinds, vec![MessageKind::Fired, MessageKind::Undone]);
    }

    #[test]
    fn test_events_stay_sorted() {
        let (_target, _handle, log) = fixture();
        let mut track = EventTrack::new("Events");
        let recorder = Recorder { log: log.clone() };
        let late = track.add_event(SequenceEvent::new("late", EventTiming::instant(4.0), recorder));
        let recorder = Recorder { log: log.clone() };
        track.add_event(SequenceEvent::new("early", EventTiming::instant(1.0), recorder));
        assert_eq!(track.events()[0].name, "early");

        track.set_fire_time(late, 0.5).unwrap();
        assert_eq!(track.events()[0].name, "late");
        assert!(track.remove_event(EventId::new()).is_err());
    }
}
