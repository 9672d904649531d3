//! Browser bindings, compiled with the `web` feature.
//!
//! - [`StorageChannel`] syncs tabs of the same origin through `localStorage`:
//!   each envelope is written to a broadcast key and the other tabs pick it up
//!   from their `storage` event.
//! - [`Canvas2dTarget`] presents the scene on a `<canvas>` 2D context.
//! - [`WebWhiteboard`] is the `wasm_bindgen` entry point. It owns the session,
//!   attaches the DOM listeners and drives `requestAnimationFrame`, and
//!   removes all of it on `teardown`.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::rc::Rc;

use frames::{Envelope, Positions, RELAY_SENDER, SideStore, SyncMessage, WireStroke, envelope_from_json, envelope_to_json};
use tracing::{debug, warn};
use wasm_bindgen::prelude::*;
use wasm_bindgen::{Clamped, JsCast};
use web_sys::{
    CanvasRenderingContext2d, Event, EventTarget, HtmlCanvasElement, ImageData, MouseEvent, Storage, StorageEvent,
    TouchEvent, WheelEvent, Window,
};

use crate::camera::{Camera, Point, Viewport};
use crate::config::BoardConfig;
use crate::consts::PRESENCE_TIMEOUT_MS;
use crate::input::{Button, Tool};
use crate::notes::parse_records;
use crate::render::{Billboard, FrameRequest, FrameView, GhostCursor, RenderError, RenderTarget, StrokeMesh};
use crate::session::{Clock, Listener, SessionStatus, Whiteboard};
use crate::sync::{ChannelConfig, Connector, SyncChannel, SyncError};

const BROADCAST_KEY: &str = "corkboard:broadcast";
const STROKES_KEY: &str = "corkboard:strokes";
const POSITIONS_KEY: &str = "corkboard:positions";
const PRESENCE_KEY: &str = "corkboard:presence";

fn js_error(e: &JsValue) -> String {
    e.as_string().unwrap_or_else(|| format!("{e:?}"))
}

/// `Date.now()`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DateClock;

impl Clock for DateClock {
    #[allow(clippy::cast_possible_truncation)]
    fn now_ms(&self) -> i64 {
        js_sys::Date::now() as i64
    }
}

// =============================================================================
// STORAGE CHANNEL
// =============================================================================

fn read_json<T: serde::de::DeserializeOwned + Default>(storage: &Storage, key: &str) -> T {
    match storage.get_item(key) {
        Ok(Some(text)) => serde_json::from_str(&text).unwrap_or_default(),
        Ok(None) => T::default(),
        Err(e) => {
            debug!(key, error = %js_error(&e), "storage read failed");
            T::default()
        }
    }
}

fn write_json<T: serde::Serialize>(storage: &Storage, key: &str, value: &T) -> Result<(), SyncError> {
    let text = serde_json::to_string(value).map_err(|e| SyncError::Transport(e.to_string()))?;
    storage.set_item(key, &text).map_err(|e| SyncError::Transport(js_error(&e)))
}

fn load_side_store(storage: &Storage) -> SideStore {
    let mut store = SideStore::new();
    for stroke in read_json::<Vec<WireStroke>>(storage, STROKES_KEY) {
        store.apply(&SyncMessage::StrokeCommitted { stroke });
    }
    store.apply(&SyncMessage::StickyPositionsUpdated { positions: read_json::<Positions>(storage, POSITIONS_KEY) });
    store
}

fn presence_count(presence: &BTreeMap<String, i64>) -> u32 {
    u32::try_from(presence.len()).unwrap_or(u32::MAX)
}

/// Opens [`StorageChannel`]s on the window's `localStorage`.
#[derive(Debug, Clone)]
pub struct StorageConnector {
    window: Window,
    presence_timeout_ms: i64,
}

impl StorageConnector {
    #[must_use]
    pub fn new(window: Window, presence_timeout_ms: i64) -> Self {
        Self { window, presence_timeout_ms }
    }
}

impl Connector for StorageConnector {
    fn connect(&self, session: &str, now_ms: i64) -> Result<Box<dyn SyncChannel>, SyncError> {
        let channel: Box<dyn SyncChannel> =
            Box::new(StorageChannel::connect(&self.window, session, now_ms, self.presence_timeout_ms)?);
        Ok(channel)
    }
}

/// A sync channel over `localStorage` broadcast keys.
pub struct StorageChannel {
    window: Window,
    storage: Storage,
    session: String,
    inbox: Rc<RefCell<VecDeque<Envelope>>>,
    on_storage: Option<Closure<dyn FnMut(StorageEvent)>>,
    presence_timeout_ms: i64,
    seq: u64,
}

impl StorageChannel {
    /// # Errors
    ///
    /// [`SyncError::Unavailable`] when `localStorage` is disabled.
    pub fn connect(window: &Window, session: &str, now_ms: i64, presence_timeout_ms: i64) -> Result<Self, SyncError> {
        let storage = match window.local_storage() {
            Ok(Some(storage)) => storage,
            Ok(None) => return Err(SyncError::Unavailable),
            Err(e) => {
                debug!(error = %js_error(&e), "localStorage blocked");
                return Err(SyncError::Unavailable);
            }
        };

        let inbox = Rc::new(RefCell::new(VecDeque::new()));
        let sink = Rc::clone(&inbox);
        let on_storage = Closure::<dyn FnMut(StorageEvent)>::new(move |event: StorageEvent| {
            let (Some(key), Some(value)) = (event.key(), event.new_value()) else {
                return;
            };
            let envelope = match key.as_str() {
                BROADCAST_KEY => match envelope_from_json(&value) {
                    Ok(envelope) => envelope,
                    Err(e) => {
                        debug!(error = %e, "ignoring malformed broadcast");
                        return;
                    }
                },
                PRESENCE_KEY => {
                    let presence: BTreeMap<String, i64> = serde_json::from_str(&value).unwrap_or_default();
                    let message = SyncMessage::Presence { sessions: presence_count(&presence) };
                    Envelope::new(format!("{RELAY_SENDER}-presence"), RELAY_SENDER, 0, message)
                }
                _ => return,
            };
            if let Ok(mut inbox) = sink.try_borrow_mut() {
                inbox.push_back(envelope);
            }
        });
        window
            .add_event_listener_with_callback("storage", on_storage.as_ref().unchecked_ref())
            .map_err(|e| SyncError::Transport(js_error(&e)))?;

        let mut channel = Self {
            window: window.clone(),
            storage,
            session: session.to_owned(),
            inbox,
            on_storage: Some(on_storage),
            presence_timeout_ms,
            seq: 0,
        };
        let snapshot = load_side_store(&channel.storage).snapshot();
        channel.push_local(snapshot, now_ms);
        channel.heartbeat(now_ms)?;
        Ok(channel)
    }

    fn push_local(&mut self, message: SyncMessage, now_ms: i64) {
        self.seq += 1;
        let envelope = Envelope::new(format!("{RELAY_SENDER}-{}", self.seq), RELAY_SENDER, now_ms, message);
        if let Ok(mut inbox) = self.inbox.try_borrow_mut() {
            inbox.push_back(envelope);
        }
    }

    fn persist(&self, message: &SyncMessage) -> Result<bool, SyncError> {
        let mut store = load_side_store(&self.storage);
        if !store.apply(message) {
            return Ok(false);
        }
        match message {
            SyncMessage::StrokeCommitted { .. } | SyncMessage::ClearCanvas => {
                write_json(&self.storage, STROKES_KEY, &store.strokes())?;
            }
            SyncMessage::StickyPositionsUpdated { .. } => {
                write_json(&self.storage, POSITIONS_KEY, store.positions())?;
            }
            _ => {}
        }
        Ok(true)
    }

    fn is_closed(&self) -> bool {
        self.on_storage.is_none()
    }
}

impl SyncChannel for StorageChannel {
    fn send(&mut self, envelope: &Envelope) -> Result<(), SyncError> {
        if self.is_closed() {
            return Err(SyncError::Closed);
        }
        if envelope.message.is_medium_only() {
            return Ok(());
        }
        if !self.persist(&envelope.message)? {
            return Ok(());
        }
        let text = envelope_to_json(envelope)?;
        self.storage.set_item(BROADCAST_KEY, &text).map_err(|e| SyncError::Transport(js_error(&e)))
    }

    fn drain(&mut self) -> Vec<Envelope> {
        match self.inbox.try_borrow_mut() {
            Ok(mut inbox) => inbox.drain(..).collect(),
            Err(_) => Vec::new(),
        }
    }

    fn heartbeat(&mut self, now_ms: i64) -> Result<(), SyncError> {
        if self.is_closed() {
            return Err(SyncError::Closed);
        }
        let mut presence: BTreeMap<String, i64> = read_json(&self.storage, PRESENCE_KEY);
        let before = presence_count(&presence);
        let timeout = self.presence_timeout_ms;
        presence.retain(|_, seen| now_ms - *seen <= timeout);
        presence.insert(self.session.clone(), now_ms);
        write_json(&self.storage, PRESENCE_KEY, &presence)?;

        let after = presence_count(&presence);
        if after != before {
            self.push_local(SyncMessage::Presence { sessions: after }, now_ms);
        }
        Ok(())
    }

    fn close(&mut self) {
        let Some(on_storage) = self.on_storage.take() else {
            return;
        };
        if let Err(e) =
            self.window.remove_event_listener_with_callback("storage", on_storage.as_ref().unchecked_ref())
        {
            debug!(error = %js_error(&e), "failed to detach storage listener");
        }
        let mut presence: BTreeMap<String, i64> = read_json(&self.storage, PRESENCE_KEY);
        if presence.remove(&self.session).is_some() {
            if let Err(e) = write_json(&self.storage, PRESENCE_KEY, &presence) {
                debug!(error = %e, "failed to drop presence entry");
            }
        }
    }
}

impl Drop for StorageChannel {
    fn drop(&mut self) {
        self.close();
    }
}

// =============================================================================
// CANVAS 2D TARGET
// =============================================================================

/// Presents the scene on a 2D canvas context.
pub struct Canvas2dTarget {
    canvas: HtmlCanvasElement,
    ctx: CanvasRenderingContext2d,
    /// Offscreen canvases holding each note's baked texture.
    textures: HashMap<String, HtmlCanvasElement>,
    view: Option<(Viewport, Camera)>,
}

impl Canvas2dTarget {
    /// # Errors
    ///
    /// Fails when the canvas has no 2D context.
    pub fn new(canvas: HtmlCanvasElement) -> Result<Self, JsValue> {
        let ctx = canvas
            .get_context("2d")?
            .ok_or_else(|| JsValue::from_str("2d context unavailable"))?
            .dyn_into::<CanvasRenderingContext2d>()?;
        Ok(Self { canvas, ctx, textures: HashMap::new(), view: None })
    }

    fn project(&self, p: Point) -> Point {
        match self.view {
            Some((viewport, camera)) => camera.world_to_screen(p, viewport),
            None => p,
        }
    }

    /// Screen pixels per world unit.
    fn scale(&self) -> f64 {
        self.view.map_or(1.0, |(_, camera)| 1.0 / camera.world_per_pixel())
    }

    fn texture_canvas(&mut self, billboard: &Billboard) -> Result<HtmlCanvasElement, RenderError> {
        if let Some(canvas) = self.textures.get(&billboard.note_id) {
            return Ok(canvas.clone());
        }
        let backend = |e: JsValue| RenderError::Backend(js_error(&e));
        let document = self.canvas.owner_document().ok_or(RenderError::ContextLost)?;
        let offscreen = document.create_element("canvas").map_err(backend)?.dyn_into::<HtmlCanvasElement>().map_err(
            |_| RenderError::Backend("not a canvas".to_owned()),
        )?;
        let (w, h) = billboard.texture.dimensions();
        offscreen.set_width(w);
        offscreen.set_height(h);
        let ctx = offscreen
            .get_context("2d")
            .map_err(backend)?
            .ok_or(RenderError::ContextLost)?
            .dyn_into::<CanvasRenderingContext2d>()
            .map_err(|_| RenderError::Backend("not a 2d context".to_owned()))?;
        let data = ImageData::new_with_u8_clamped_array_and_sh(Clamped(billboard.texture.as_raw().as_slice()), w, h)
            .map_err(backend)?;
        ctx.put_image_data(&data, 0.0, 0.0).map_err(backend)?;
        self.textures.insert(billboard.note_id.clone(), offscreen.clone());
        Ok(offscreen)
    }
}

impl RenderTarget for Canvas2dTarget {
    fn begin_frame(&mut self, view: &FrameView<'_>) -> Result<(), RenderError> {
        if !self.canvas.is_connected() {
            return Err(RenderError::ContextLost);
        }
        // The backing store follows the viewport; resizing it also clears it.
        if let Some((width, height)) = view.viewport.pixel_size() {
            if self.canvas.width() != width || self.canvas.height() != height {
                self.canvas.set_width(width);
                self.canvas.set_height(height);
            }
        }
        self.view = Some((view.viewport, view.camera));
        self.ctx.set_fill_style_str(view.background);
        self.ctx.fill_rect(0.0, 0.0, view.viewport.width, view.viewport.height);
        Ok(())
    }

    fn draw_dots(&mut self, dots: &[Point], color: &str, _depth: f64) -> Result<(), RenderError> {
        self.ctx.set_fill_style_str(color);
        for dot in dots {
            let p = self.project(*dot);
            self.ctx.fill_rect(p.x - 1.0, p.y - 1.0, 2.0, 2.0);
        }
        Ok(())
    }

    fn draw_billboard(&mut self, billboard: &Billboard) -> Result<(), RenderError> {
        let texture = self.texture_canvas(billboard)?;
        let center = self.project(billboard.position);
        let scale = self.scale();
        let (w, h) = (billboard.width * scale, billboard.height * scale);
        let backend = |e: JsValue| RenderError::Backend(js_error(&e));

        self.ctx.save();
        self.ctx.translate(center.x, center.y).map_err(backend)?;
        self.ctx.rotate(-billboard.rotation_deg.to_radians()).map_err(backend)?;
        self.ctx
            .draw_image_with_html_canvas_element_and_dw_and_dh(&texture, -w / 2.0, -h / 2.0, w, h)
            .map_err(backend)?;
        self.ctx.restore();
        Ok(())
    }

    fn draw_polyline(&mut self, mesh: &StrokeMesh) -> Result<(), RenderError> {
        let mut points = mesh.points.iter().map(|p| self.project(*p));
        let Some(first) = points.next() else {
            return Ok(());
        };
        self.ctx.begin_path();
        self.ctx.move_to(first.x, first.y);
        for p in points {
            self.ctx.line_to(p.x, p.y);
        }
        self.ctx.set_stroke_style_str(&mesh.color);
        self.ctx.set_line_width(2.0);
        self.ctx.stroke();
        Ok(())
    }

    fn draw_cursor(&mut self, cursor: &GhostCursor) -> Result<(), RenderError> {
        let p = self.project(cursor.position);
        let radius = if cursor.drawing { 6.0 } else { 4.0 };
        self.ctx.begin_path();
        self.ctx
            .arc(p.x, p.y, radius, 0.0, std::f64::consts::TAU)
            .map_err(|e| RenderError::Backend(js_error(&e)))?;
        self.ctx.set_fill_style_str(if cursor.drawing { "#e53935" } else { "#1e88e5" });
        self.ctx.fill();
        Ok(())
    }
}

// =============================================================================
// WEB WHITEBOARD
// =============================================================================

struct Attached {
    target: EventTarget,
    event: &'static str,
    closure: Closure<dyn FnMut(Event)>,
}

fn dom_event(listener: Listener) -> Option<(&'static str, bool)> {
    // (event name, attached to the window rather than the canvas)
    match listener {
        Listener::PointerDown => Some(("mousedown", false)),
        Listener::PointerMove => Some(("mousemove", false)),
        Listener::PointerUp => Some(("mouseup", false)),
        Listener::PointerLeave => Some(("mouseleave", false)),
        Listener::TouchStart => Some(("touchstart", false)),
        Listener::TouchMove => Some(("touchmove", false)),
        Listener::TouchEnd => Some(("touchend", false)),
        Listener::Wheel => Some(("wheel", false)),
        Listener::Resize => Some(("resize", true)),
        // Owned by the storage channel.
        Listener::SyncNotification => None,
    }
}

fn touch_points(list: &web_sys::TouchList) -> Vec<Point> {
    (0..list.length())
        .filter_map(|i| list.item(i))
        .map(|t| Point::new(f64::from(t.client_x()), f64::from(t.client_y())))
        .collect()
}

fn cancel_frame(window: &Window, id: i32) {
    if let Err(e) = window.cancel_animation_frame(id) {
        debug!(id, error = %js_error(&e), "cancelAnimationFrame failed");
    }
}

fn window_viewport(window: &Window) -> Viewport {
    let read = |v: Result<JsValue, JsValue>| v.map_or(0.0, |v| v.as_f64().unwrap_or(0.0));
    Viewport::new(read(window.inner_width()), read(window.inner_height()))
}

fn handle_event(board: &mut Whiteboard, event: &Event, window: &Window) {
    match event.type_().as_str() {
        "mousedown" => {
            if let Some(e) = event.dyn_ref::<MouseEvent>() {
                board.pointer_down(Point::new(f64::from(e.client_x()), f64::from(e.client_y())), Button::from_dom(e.button()));
            }
        }
        "mousemove" => {
            if let Some(e) = event.dyn_ref::<MouseEvent>() {
                board.pointer_move(Point::new(f64::from(e.client_x()), f64::from(e.client_y())));
            }
        }
        "mouseup" => board.pointer_up(),
        "mouseleave" => board.pointer_leave(),
        "touchstart" | "touchmove" | "touchend" => {
            let Some(e) = event.dyn_ref::<TouchEvent>() else {
                return;
            };
            event.prevent_default();
            let touches = touch_points(&e.touches());
            match event.type_().as_str() {
                "touchstart" => board.touch_start(&touches),
                "touchmove" => board.touch_move(&touches),
                _ => board.touch_end(&touches),
            }
        }
        "wheel" => {
            if let Some(e) = event.dyn_ref::<WheelEvent>() {
                event.prevent_default();
                board.wheel(e.delta_y());
            }
        }
        "resize" => board.set_viewport(window_viewport(window)),
        _ => {}
    }
}

/// The whiteboard as seen from JavaScript.
#[wasm_bindgen]
pub struct WebWhiteboard {
    board: Rc<RefCell<Whiteboard>>,
    attached: Vec<Attached>,
    frame: Rc<RefCell<Option<Closure<dyn FnMut(f64)>>>>,
    request: Rc<FrameRequest>,
    window: Window,
}

#[wasm_bindgen]
impl WebWhiteboard {
    /// Mount on `canvas`. `config_json` may be empty for defaults; `sync`
    /// turns on cross-tab sync through `localStorage`.
    ///
    /// # Errors
    ///
    /// Fails when there is no window, the canvas has no 2D context, the
    /// config does not parse, or a listener cannot be attached.
    #[wasm_bindgen(constructor)]
    pub fn new(canvas: HtmlCanvasElement, config_json: &str, sync: bool) -> Result<WebWhiteboard, JsValue> {
        let window = web_sys::window().ok_or_else(|| JsValue::from_str("no window"))?;
        let config = if config_json.trim().is_empty() {
            BoardConfig::default()
        } else {
            BoardConfig::from_json(config_json).map_err(|e| JsValue::from_str(&e.to_string()))?
        };
        let channel = if sync {
            let timeout = if config.presence_timeout_ms > 0 { config.presence_timeout_ms } else { PRESENCE_TIMEOUT_MS };
            ChannelConfig::Custom(Box::new(StorageConnector::new(window.clone(), timeout)))
        } else {
            ChannelConfig::Offline
        };

        let viewport = window_viewport(&window);
        let target = Canvas2dTarget::new(canvas.clone())?;
        let board = Whiteboard::new(config, viewport, &channel, Box::new(target), Box::new(DateClock));
        let board = Rc::new(RefCell::new(board));

        let mut web = Self {
            board,
            attached: Vec::new(),
            frame: Rc::new(RefCell::new(None)),
            request: Rc::new(FrameRequest::default()),
            window,
        };
        let listeners = web.board.borrow().listeners().to_vec();
        for listener in listeners {
            if let Some((name, on_window)) = dom_event(listener) {
                let target: EventTarget = if on_window { web.window.clone().into() } else { canvas.clone().into() };
                web.attach(target, name)?;
            }
        }
        web.start_loop()?;
        Ok(web)
    }

    fn attach(&mut self, target: EventTarget, event: &'static str) -> Result<(), JsValue> {
        let board = Rc::clone(&self.board);
        let window = self.window.clone();
        let closure = Closure::<dyn FnMut(Event)>::new(move |e: Event| {
            if let Ok(mut board) = board.try_borrow_mut() {
                handle_event(&mut board, &e, &window);
            }
        });
        target.add_event_listener_with_callback(event, closure.as_ref().unchecked_ref())?;
        self.attached.push(Attached { target, event, closure });
        Ok(())
    }

    fn start_loop(&mut self) -> Result<(), JsValue> {
        let board = Rc::clone(&self.board);
        let slot = Rc::clone(&self.frame);
        let request = Rc::clone(&self.request);
        let window = self.window.clone();
        let callback = Closure::<dyn FnMut(f64)>::new(move |_timestamp: f64| {
            request.fired();
            if request.is_stopped() {
                return;
            }
            // Frames keep coming after a context loss so sync is still pumped.
            let running = match board.try_borrow_mut() {
                Ok(mut board) => {
                    board.tick(DateClock.now_ms());
                    board.status() != SessionStatus::TornDown
                }
                Err(_) => true,
            };
            if !running {
                return;
            }
            let next = match slot.borrow().as_ref() {
                Some(next) => window.request_animation_frame(next.as_ref().unchecked_ref()),
                None => return,
            };
            match next {
                Ok(id) if !request.scheduled(id) => cancel_frame(&window, id),
                Ok(_) => {}
                Err(e) => warn!(error = %js_error(&e), "requestAnimationFrame failed"),
            }
        });
        let id = self.window.request_animation_frame(callback.as_ref().unchecked_ref())?;
        self.request.scheduled(id);
        *self.frame.borrow_mut() = Some(callback);
        Ok(())
    }

    #[wasm_bindgen(js_name = setTool)]
    pub fn set_tool(&self, tool: &str) {
        let tool = if tool == "draw" { Tool::Draw } else { Tool::Pan };
        self.board.borrow_mut().set_tool(tool);
    }

    pub fn clear(&self) {
        self.board.borrow_mut().clear();
    }

    /// Hand over the content API response body.
    #[wasm_bindgen(js_name = loadContent)]
    pub fn load_content(&self, body: &str) {
        self.board.borrow_mut().load_content(parse_records(body));
    }

    /// The content request failed (non-2xx or network error).
    #[wasm_bindgen(js_name = contentFailed)]
    pub fn content_failed(&self, reason: &str) {
        self.board.borrow_mut().load_content::<String>(Err(reason.to_owned()));
    }

    #[wasm_bindgen(js_name = sessionId)]
    #[must_use]
    pub fn session_id(&self) -> String {
        self.board.borrow().session_id().to_owned()
    }

    #[wasm_bindgen(js_name = connectedUsers)]
    #[must_use]
    pub fn connected_users(&self) -> u32 {
        self.board.borrow().connected_users()
    }

    #[must_use]
    pub fn status(&self) -> String {
        match self.board.borrow().status() {
            SessionStatus::Active => "active",
            SessionStatus::ContextLost => "context-lost",
            SessionStatus::TornDown => "torn-down",
        }
        .to_owned()
    }

    /// Stop the loop and detach every listener. Safe to call repeatedly.
    pub fn teardown(&mut self) {
        for attached in self.attached.drain(..) {
            if let Err(e) = attached
                .target
                .remove_event_listener_with_callback(attached.event, attached.closure.as_ref().unchecked_ref())
            {
                debug!(event = attached.event, error = %js_error(&e), "failed to detach listener");
            }
        }
        // The pending frame must be cancelled before its callback is dropped.
        if let Some(id) = self.request.stop() {
            cancel_frame(&self.window, id);
        }
        if let Ok(mut slot) = self.frame.try_borrow_mut() {
            slot.take();
        }
        if let Ok(mut board) = self.board.try_borrow_mut() {
            board.teardown();
        }
    }
}

impl Drop for WebWhiteboard {
    fn drop(&mut self) {
        self.teardown();
    }
}
