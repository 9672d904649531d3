//! The whiteboard session: one owned object per mounted board.
//!
//! [`Whiteboard`] wires the leaf modules together. Host input goes through
//! the [`InputRouter`], whose intents are applied to the [`Camera`] or the
//! [`DrawingStore`]; local mutations are mirrored out over the sync channel
//! and remote ones are applied as they are drained. [`Whiteboard::tick`] is
//! one animation frame.
//!
//! Lifecycle: construction generates the session id, connects the channel,
//! registers the listeners and starts the animation loop. [`Whiteboard::teardown`]
//! undoes all of it and can be called any number of times.

#[cfg(test)]
#[path = "session_test.rs"]
mod session_test;

use std::cell::Cell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

use frames::{Envelope, Positions, SyncMessage, WirePoint};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::camera::{Camera, Point, Viewport};
use crate::config::BoardConfig;
use crate::doc::{DrawingStore, Stroke, StrokeMeta};
use crate::input::{Button, InputRouter, Intent, Tool};
use crate::layout::{Placement, layout_notes};
use crate::notes::{ContentRecord, StickyNote, records_or_fallback};
use crate::render::{RenderError, RenderTarget, Scene};
use crate::sync::{ChannelConfig, SyncChannel};

// =============================================================================
// CLOCK
// =============================================================================

/// Wall-clock source for stroke and envelope timestamps.
pub trait Clock {
    /// Milliseconds since the Unix epoch.
    fn now_ms(&self) -> i64;
}

/// The operating system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
            .unwrap_or(0)
    }
}

/// A clock that only moves when told to. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<i64>>,
}

impl ManualClock {
    #[must_use]
    pub fn new(start_ms: i64) -> Self {
        Self { now: Rc::new(Cell::new(start_ms)) }
    }

    pub fn set(&self, now_ms: i64) {
        self.now.set(now_ms);
    }

    pub fn advance(&self, by_ms: i64) {
        self.now.set(self.now.get() + by_ms);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.now.get()
    }
}

// =============================================================================
// SESSION STATE
// =============================================================================

/// Where the session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Active,
    /// The render target is gone and the animation loop stopped. Teardown
    /// still works.
    ContextLost,
    TornDown,
}

/// Host events the session listens to. The host attaches one handler per
/// entry at construction and removes them all when [`Whiteboard::listeners`]
/// comes back empty after teardown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Listener {
    PointerDown,
    PointerMove,
    PointerUp,
    PointerLeave,
    TouchStart,
    TouchMove,
    TouchEnd,
    Wheel,
    Resize,
    SyncNotification,
}

const LISTENERS: [Listener; 10] = [
    Listener::PointerDown,
    Listener::PointerMove,
    Listener::PointerUp,
    Listener::PointerLeave,
    Listener::TouchStart,
    Listener::TouchMove,
    Listener::TouchEnd,
    Listener::Wheel,
    Listener::Resize,
    Listener::SyncNotification,
];

#[derive(Debug, Clone, Copy, PartialEq)]
enum Intro {
    Idle,
    /// Notes loaded; focus on the first one next frame.
    Pending(Point),
    Focused { since_ms: i64 },
    Done,
}

// =============================================================================
// WHITEBOARD
// =============================================================================

/// `(timestamp, session)` of a note placement. Placements are last-write-wins
/// in this order; the session id breaks timestamp ties.
type PositionStamp = (i64, String);

/// One whiteboard session.
pub struct Whiteboard {
    config: BoardConfig,
    session_id: String,
    clock: Box<dyn Clock>,
    camera: Camera,
    viewport: Viewport,
    router: InputRouter,
    store: DrawingStore,
    scene: Scene,
    notes: Vec<StickyNote>,
    /// Note positions known this session, from our own layout or from sync.
    positions: BTreeMap<String, Point>,
    /// Who last placed each note, and when.
    position_stamps: BTreeMap<String, PositionStamp>,
    channel: Option<Box<dyn SyncChannel>>,
    target: Box<dyn RenderTarget>,
    status: SessionStatus,
    listeners: Vec<Listener>,
    animating: bool,
    connected_users: u32,
    intro: Intro,
    last_heartbeat_ms: i64,
    rng: StdRng,
    stroke_seq: u64,
    envelope_seq: u64,
}

impl fmt::Debug for Whiteboard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Whiteboard")
            .field("session_id", &self.session_id)
            .field("status", &self.status)
            .field("strokes", &self.store.len())
            .field("notes", &self.notes.len())
            .field("synced", &self.channel.is_some())
            .finish_non_exhaustive()
    }
}

impl Whiteboard {
    /// Create and start a session.
    ///
    /// A medium that cannot be reached leaves the session offline; drawing
    /// and panning still work.
    #[must_use]
    pub fn new(
        config: BoardConfig,
        viewport: Viewport,
        channel: &ChannelConfig,
        target: Box<dyn RenderTarget>,
        clock: Box<dyn Clock>,
    ) -> Self {
        let uuid = Uuid::new_v4();
        let session_id = format!("session-{}", uuid.simple());
        let now = clock.now_ms();

        let channel = match channel.connect(&session_id, now) {
            Ok(channel) => channel,
            Err(e) => {
                debug!(session = %session_id, error = %e, "sync unavailable; running offline");
                None
            }
        };

        let camera = Camera::new(config.zoom);
        let scene = Scene::new(viewport, &camera);
        let router = InputRouter::new(config.touch_pan_damping);
        info!(session = %session_id, synced = channel.is_some(), "whiteboard session started");

        Self {
            config,
            session_id,
            clock,
            camera,
            viewport,
            router,
            store: DrawingStore::new(),
            scene,
            notes: Vec::new(),
            positions: BTreeMap::new(),
            position_stamps: BTreeMap::new(),
            channel,
            target,
            status: SessionStatus::Active,
            listeners: LISTENERS.to_vec(),
            animating: true,
            connected_users: 1,
            intro: Intro::Idle,
            last_heartbeat_ms: now,
            rng: StdRng::seed_from_u64(uuid.as_u64_pair().0),
            stroke_seq: 0,
            envelope_seq: 0,
        }
    }

    // --- Accessors ---

    #[must_use]
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    #[must_use]
    pub fn config(&self) -> &BoardConfig {
        &self.config
    }

    #[must_use]
    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    #[must_use]
    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    #[must_use]
    pub fn store(&self) -> &DrawingStore {
        &self.store
    }

    #[must_use]
    pub fn notes(&self) -> &[StickyNote] {
        &self.notes
    }

    #[must_use]
    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    #[must_use]
    pub fn status(&self) -> SessionStatus {
        self.status
    }

    #[must_use]
    pub fn tool(&self) -> Tool {
        self.router.tool()
    }

    /// Sessions on the medium, this one included.
    #[must_use]
    pub fn connected_users(&self) -> u32 {
        self.connected_users
    }

    #[must_use]
    pub fn listeners(&self) -> &[Listener] {
        &self.listeners
    }

    /// Whether frames are still presented. False after context loss.
    #[must_use]
    pub fn is_animating(&self) -> bool {
        self.animating
    }

    #[must_use]
    pub fn is_synced(&self) -> bool {
        self.channel.is_some()
    }

    fn is_torn_down(&self) -> bool {
        self.status == SessionStatus::TornDown
    }

    // --- Controls ---

    pub fn set_tool(&mut self, tool: Tool) {
        if self.is_torn_down() {
            return;
        }
        let intents = self.router.set_tool(tool);
        self.apply_intents(intents);
    }

    /// Clear every committed stroke here and on every peer.
    pub fn clear(&mut self) {
        if self.is_torn_down() {
            return;
        }
        let removed = self.store.clear();
        debug!(session = %self.session_id, removed, "canvas cleared");
        self.publish(SyncMessage::ClearCanvas);
    }

    /// Stop the loop, detach listeners and close the channel. Idempotent.
    pub fn teardown(&mut self) {
        if self.is_torn_down() {
            return;
        }
        self.animating = false;
        self.listeners.clear();
        self.store.discard_in_progress();
        if let Some(mut channel) = self.channel.take() {
            channel.close();
        }
        self.status = SessionStatus::TornDown;
        info!(session = %self.session_id, "whiteboard session torn down");
    }

    /// Resize. An unusable viewport (zero or non-finite) is ignored.
    pub fn set_viewport(&mut self, viewport: Viewport) {
        if self.is_torn_down() || !viewport.is_usable() {
            return;
        }
        self.viewport = viewport;
        self.scene.resize(viewport, &self.camera);
    }

    // --- Input ---

    pub fn pointer_down(&mut self, screen: Point, button: Button) {
        if self.is_torn_down() {
            return;
        }
        let intents = self.router.pointer_down(screen, button, &self.camera, self.viewport);
        self.apply_intents(intents);
    }

    pub fn pointer_move(&mut self, screen: Point) {
        if self.is_torn_down() {
            return;
        }
        let intents = self.router.pointer_move(screen, &self.camera, self.viewport);
        self.apply_intents(intents);
    }

    pub fn pointer_up(&mut self) {
        if self.is_torn_down() {
            return;
        }
        let intents = self.router.pointer_up();
        self.apply_intents(intents);
    }

    /// The pointer left the surface; ends the gesture like a release.
    pub fn pointer_leave(&mut self) {
        self.pointer_up();
    }

    pub fn touch_start(&mut self, touches: &[Point]) {
        if self.is_torn_down() {
            return;
        }
        let intents = self.router.touch_start(touches, &self.camera, self.viewport);
        self.apply_intents(intents);
    }

    pub fn touch_move(&mut self, touches: &[Point]) {
        if self.is_torn_down() {
            return;
        }
        let intents = self.router.touch_move(touches, &self.camera, self.viewport);
        self.apply_intents(intents);
    }

    /// Touches lifted; `remaining` are the ones still down.
    pub fn touch_end(&mut self, remaining: &[Point]) {
        if self.is_torn_down() {
            return;
        }
        let intents = self.router.touch_end(remaining, &self.camera, self.viewport);
        self.apply_intents(intents);
    }

    pub fn wheel(&mut self, delta_y: f64) {
        if self.is_torn_down() {
            return;
        }
        let intents = self.router.wheel(delta_y);
        self.apply_intents(intents);
    }

    fn apply_intents(&mut self, intents: Vec<Intent>) {
        for intent in intents {
            self.apply_intent(intent);
        }
    }

    fn apply_intent(&mut self, intent: Intent) {
        match intent {
            Intent::BeginStroke(point) => {
                self.store.begin(point);
                self.publish(SyncMessage::DrawingStart { point: point.into() });
            }
            Intent::ExtendStroke(point) => {
                if self.store.extend(point) {
                    self.publish(SyncMessage::CursorPosition { point: point.into(), drawing: true });
                }
            }
            Intent::FinishStroke => {
                let meta = self.next_stroke_meta();
                if let Some(stroke) = self.store.promote_in_progress(meta) {
                    debug!(id = %stroke.id, points = stroke.points.len(), "stroke committed");
                    self.publish(SyncMessage::StrokeCommitted { stroke: (&stroke).into() });
                }
                self.publish(SyncMessage::DrawingEnd);
            }
            Intent::CancelStroke => {
                if self.store.in_progress().is_some() {
                    self.store.discard_in_progress();
                    self.publish(SyncMessage::DrawingEnd);
                }
            }
            Intent::Pan { dx, dy } => self.camera.pan(dx, dy),
            Intent::SetZoom(zoom) => self.camera.set_zoom(zoom),
            Intent::ZoomStep(delta_y) => self.camera.zoom_step(delta_y, self.config.wheel_zoom_step),
        }
    }

    fn next_stroke_meta(&mut self) -> StrokeMeta {
        let now = self.clock.now_ms();
        let seq = self.stroke_seq;
        self.stroke_seq += 1;
        StrokeMeta {
            id: format!("{}-{now}-{seq}", self.session_id),
            created_at: now,
            color: self.config.stroke_color.clone(),
            author: self.session_id.clone(),
        }
    }

    // --- Content ---

    /// Lay out the content records, or the fallback note when loading failed.
    /// Notes already on the board keep their position.
    pub fn load_content<E: fmt::Display>(&mut self, result: Result<Vec<ContentRecord>, E>) {
        if self.is_torn_down() {
            return;
        }
        let records = records_or_fallback(result);
        let placed = layout_notes(&records, self.viewport, &self.positions, &self.config.layout, &mut self.rng);
        let now = self.clock.now_ms();

        let mut announced = Positions::new();
        for item in placed {
            let note = item.note;
            if !matches!(item.placement, Placement::Cached) {
                self.positions.insert(note.id.clone(), note.position);
                self.position_stamps.insert(note.id.clone(), (now, self.session_id.clone()));
                announced.insert(note.id.clone(), note.position.into());
            }
            if !self.scene.add_note(&note) {
                self.scene.move_note(&note.id, note.position);
            }
            match self.notes.iter_mut().find(|n| n.id == note.id) {
                Some(existing) => *existing = note,
                None => self.notes.push(note),
            }
        }
        info!(session = %self.session_id, notes = self.notes.len(), "content laid out");

        if self.config.intro.enabled {
            if let Some(first) = self.notes.first() {
                self.intro = Intro::Pending(first.position);
            }
        }
        if !announced.is_empty() {
            self.publish_at(SyncMessage::StickyPositionsUpdated { positions: announced }, now);
        }
    }

    /// Apply synced note positions and return the ids where our own newer
    /// placement won. Without a stamp (a snapshot) positions only fill notes
    /// this session has no placement for.
    fn apply_positions(&mut self, positions: &Positions, stamp: Option<&PositionStamp>) -> Vec<String> {
        let mut kept = Vec::new();
        for (id, p) in positions {
            let point = Point::from(*p);
            if !point.is_finite() {
                continue;
            }
            let current = self.position_stamps.get(id).cloned();
            match (current, stamp) {
                (Some(current), Some(incoming)) if current >= *incoming => {
                    if current.1 == self.session_id {
                        kept.push(id.clone());
                    }
                    continue;
                }
                (Some(_), None) => continue,
                (_, Some(incoming)) => {
                    self.position_stamps.insert(id.clone(), incoming.clone());
                }
                (None, None) => {}
            }
            self.move_note(id, point);
        }
        kept
    }

    fn move_note(&mut self, id: &str, point: Point) {
        self.positions.insert(id.to_owned(), point);
        self.scene.move_note(id, point);
        if let Some(note) = self.notes.iter_mut().find(|n| n.id == id) {
            note.position = point;
        }
    }

    /// Re-announce our placement of `ids` after a peer announced an older one,
    /// so the medium's stored positions end on the winning layout.
    fn reassert_positions(&mut self, ids: &[String]) {
        let now = self.clock.now_ms();
        let mut positions = Positions::new();
        for id in ids {
            if let Some(point) = self.positions.get(id) {
                positions.insert(id.clone(), WirePoint::from(*point));
                self.position_stamps.insert(id.clone(), (now, self.session_id.clone()));
            }
        }
        debug!(session = %self.session_id, notes = positions.len(), "reasserting note positions");
        self.publish_at(SyncMessage::StickyPositionsUpdated { positions }, now);
    }

    // --- Sync ---

    fn publish(&mut self, message: SyncMessage) {
        let now = self.clock.now_ms();
        self.publish_at(message, now);
    }

    fn publish_at(&mut self, message: SyncMessage, ts: i64) {
        let Some(channel) = self.channel.as_mut() else {
            return;
        };
        self.envelope_seq += 1;
        let envelope = Envelope::new(format!("{}-e{}", self.session_id, self.envelope_seq), &self.session_id, ts, message);
        if let Err(e) = channel.send(&envelope) {
            debug!(kind = envelope.message.kind(), error = %e, "sync send failed");
        }
    }

    /// Apply one envelope from the medium. Our own echoes are ignored.
    pub fn apply_remote(&mut self, envelope: Envelope) {
        if self.is_torn_down() || envelope.is_from(&self.session_id) {
            return;
        }
        let (ts, from) = (envelope.ts, envelope.from);
        match envelope.message {
            SyncMessage::StrokeCommitted { stroke } => {
                self.store.commit_stroke(Stroke::from(stroke));
            }
            SyncMessage::ClearCanvas => {
                self.store.clear();
            }
            SyncMessage::CursorPosition { point, drawing } => {
                self.scene.set_cursor(&from, point.into(), drawing);
            }
            SyncMessage::DrawingStart { point } => {
                self.scene.set_cursor(&from, point.into(), true);
            }
            SyncMessage::DrawingEnd => self.scene.set_cursor_drawing(&from, false),
            SyncMessage::StickyPositionsUpdated { positions } => {
                let kept = self.apply_positions(&positions, Some(&(ts, from)));
                if !kept.is_empty() {
                    self.reassert_positions(&kept);
                }
            }
            SyncMessage::Snapshot { strokes, positions } => {
                let mut merged = 0_usize;
                for stroke in strokes {
                    if self.store.commit_stroke(Stroke::from(stroke)) {
                        merged += 1;
                    }
                }
                debug!(merged, "snapshot merged");
                self.apply_positions(&positions, None);
            }
            SyncMessage::Presence { sessions } => {
                self.connected_users = sessions.max(1);
            }
        }
    }

    fn pump(&mut self) {
        let incoming = match self.channel.as_mut() {
            Some(channel) => channel.drain(),
            None => return,
        };
        for envelope in incoming {
            self.apply_remote(envelope);
        }
    }

    fn heartbeat(&mut self, now_ms: i64) {
        if now_ms - self.last_heartbeat_ms < self.config.heartbeat_interval_ms {
            return;
        }
        self.last_heartbeat_ms = now_ms;
        if let Some(channel) = self.channel.as_mut() {
            if let Err(e) = channel.heartbeat(now_ms) {
                debug!(error = %e, "heartbeat failed");
            }
        }
    }

    // --- Frame ---

    fn advance_intro(&mut self, now_ms: i64) {
        let intro = self.config.intro;
        match self.intro {
            Intro::Pending(first) => {
                self.camera.look_at(first);
                self.camera.set_zoom(intro.focus_zoom);
                self.intro = Intro::Focused { since_ms: now_ms };
            }
            Intro::Focused { since_ms } if now_ms - since_ms >= intro.delay_ms => {
                self.camera.look_at(Point::new(0.0, 0.0));
                self.camera.set_zoom(intro.overview_zoom);
                self.intro = Intro::Done;
            }
            _ => {}
        }
    }

    /// One animation frame: pump sync, heartbeat, intro, rebuild, present.
    /// After the render context is lost only sync keeps running; after
    /// teardown nothing does.
    pub fn tick(&mut self, now_ms: i64) {
        if self.is_torn_down() {
            return;
        }
        self.pump();
        self.heartbeat(now_ms);
        if !self.animating {
            return;
        }
        self.advance_intro(now_ms);
        self.scene.sync_strokes(&self.store, &self.config.stroke_color);

        match self.scene.present(self.target.as_mut(), &self.camera) {
            Ok(()) => {}
            Err(RenderError::ContextLost) => {
                warn!(session = %self.session_id, "render context lost; stopping rendering");
                self.status = SessionStatus::ContextLost;
                self.animating = false;
            }
            Err(e) => warn!(session = %self.session_id, error = %e, "frame dropped"),
        }
    }

    /// Position of a note id as last known to this session.
    #[must_use]
    pub fn note_position(&self, id: &str) -> Option<Point> {
        self.positions.get(id).copied()
    }

    /// Positions announced for every laid-out note, in wire form.
    #[must_use]
    pub fn wire_positions(&self) -> Positions {
        self.positions.iter().map(|(id, p)| (id.clone(), WirePoint::from(*p))).collect()
    }
}

impl Drop for Whiteboard {
    fn drop(&mut self) {
        self.teardown();
    }
}
