use anyhow::Result;
use tracing::{debug, info, warn};
use x11rb::connection::Connection;
use x11rb::protocol::xproto::{
    AtomEnum, ButtonIndex, ButtonPressEvent, ChangeWindowAttributesAux, ClientMessageData,
    ClientMessageEvent, ConfigureRequestEvent, ConfigureWindowAux, ConnectionExt,
    CreateWindowAux, EventMask, ExposeEvent, GrabMode, InputFocus, KeyButMask, KeyPressEvent,
    MapRequestEvent, MotionNotifyEvent, PropMode, SetMode, StackMode, UnmapNotifyEvent, Window,
    WindowClass, CLIENT_MESSAGE_EVENT,
};
use x11rb::protocol::Event;
use x11rb::wrapper::ConnectionExt as _;

use crate::core::context::Context;
use crate::util::geometry::{Position, Size};
use crate::window::cursors::Cursors;
use crate::window::draw::draw_frame_title;
use crate::window::error::{check_reply, check_void, log_warn, Severity, WmError};
use crate::window::frame::{
    advertises_protocol, frame_event_mask, frame_title, should_manage_existing, BORDER_WIDTH,
    FRAME_BG_COLOR, FRAME_BORDER_COLOR, FRAME_ICON_NAME,
};
use crate::window::registry::ClientRegistry;

/// Close binding: Mod1+F4.
pub const KEYCODE_F4: u8 = 70;
/// Switch binding: Tab, under the Ctrl any-key grab.
pub const KEYCODE_TAB: u8 = 23;

/// Snapshot taken at button-press time; valid for one drag gesture. The
/// held button (reported in each motion event's state mask) decides whether
/// the gesture moves or resizes.
#[derive(Debug, Clone, Copy)]
pub struct DragState {
    pub start_pointer: Position,
    pub start_frame_pos: Position,
    pub start_frame_size: Size,
}

/// Destination frame position for a move gesture. Only the latest pointer
/// position matters, so coalesced motion events are last-write-wins.
pub fn move_destination(drag: &DragState, pointer: Position) -> Position {
    drag.start_frame_pos + (pointer - drag.start_pointer)
}

/// Destination frame size for a resize gesture, with each dimension floored
/// at zero.
pub fn resize_destination(drag: &DragState, pointer: Position) -> Size {
    let delta = pointer - drag.start_pointer;
    drag.start_frame_size + delta.clamp_against(drag.start_frame_size)
}

pub struct WindowManager {
    pub ctx: Context,
    registry: ClientRegistry,
    drag: Option<DragState>,
    /// Non-motion event pulled off the queue while coalescing; dispatched
    /// on the next loop iteration.
    pending: Option<Event>,
    cursors: Cursors,
}

impl WindowManager {
    pub fn new(ctx: Context) -> Result<Self> {
        let cursors = Cursors::new(&ctx.conn, ctx.screen_num)?;
        log_warn(
            ctx.conn.change_window_attributes(
                ctx.root_window,
                &ChangeWindowAttributesAux::new().cursor(cursors.normal),
            ),
            "set root cursor",
        );

        Ok(Self {
            ctx,
            registry: ClientRegistry::new(),
            drag: None,
            pending: None,
            cursors,
        })
    }

    /// Frame every top-level window that existed before the manager
    /// started. The server stays grabbed for the duration so no window can
    /// appear or vanish between the tree query and the framing pass.
    pub fn scan_windows(&mut self) -> Result<(), WmError> {
        check_void(self.ctx.conn.grab_server(), "grab server")?;

        let tree = check_reply(self.ctx.conn.query_tree(self.ctx.root_window), "query root tree")?;
        info!("Scanning {} existing windows...", tree.children.len());
        for &win in &tree.children {
            self.frame_window(win, true)?;
        }

        check_void(self.ctx.conn.ungrab_server(), "ungrab server")?;
        self.ctx.conn.flush().map_err(|e| WmError::send("flush", e))?;
        Ok(())
    }

    /// Wrap a client window in a new frame. For pre-existing windows the
    /// skip rule applies and `Ok(None)` means the window was left alone.
    /// Framing is all-or-nothing: any request failure propagates before the
    /// registry is touched, so a registered client always has a live frame.
    pub fn frame_window(
        &mut self,
        client: Window,
        preexisting: bool,
    ) -> Result<Option<Window>, WmError> {
        assert!(!self.registry.contains(client), "window {client} framed twice");

        let attrs = check_reply(
            self.ctx.conn.get_window_attributes(client),
            "get window attributes",
        )?;
        if preexisting && !should_manage_existing(attrs.override_redirect, attrs.map_state) {
            debug!(
                "Skipping window {} (override_redirect={}, map_state={:?})",
                client, attrs.override_redirect, attrs.map_state
            );
            return Ok(None);
        }

        let geom = check_reply(self.ctx.conn.get_geometry(client), "get client geometry")?;

        let frame = self
            .ctx
            .conn
            .generate_id()
            .map_err(|e| WmError::id("allocate frame id", e))?;
        let values = CreateWindowAux::new()
            .background_pixel(FRAME_BG_COLOR)
            .border_pixel(FRAME_BORDER_COLOR)
            .event_mask(frame_event_mask());
        check_void(
            self.ctx.conn.create_window(
                geom.depth,
                frame,
                self.ctx.root_window,
                geom.x,
                geom.y,
                geom.width,
                geom.height,
                BORDER_WIDTH,
                WindowClass::COPY_FROM_PARENT,
                0,
                &values,
            ),
            "create frame",
        )?;

        let title = frame_title(client);
        check_void(
            self.ctx.conn.change_property8(
                PropMode::REPLACE,
                frame,
                AtomEnum::WM_NAME,
                AtomEnum::STRING,
                title.as_bytes(),
            ),
            "set frame name",
        )?;
        check_void(
            self.ctx.conn.change_property8(
                PropMode::REPLACE,
                frame,
                AtomEnum::WM_ICON_NAME,
                AtomEnum::STRING,
                FRAME_ICON_NAME.as_bytes(),
            ),
            "set frame icon name",
        )?;

        // Save set: if this process dies, the server reparents the client
        // back to root instead of leaving it orphaned inside the frame.
        check_void(
            self.ctx.conn.change_save_set(SetMode::INSERT, client),
            "add client to save set",
        )?;
        check_void(
            self.ctx.conn.reparent_window(client, frame, 0, 0),
            "reparent client into frame",
        )?;
        check_void(self.ctx.conn.map_window(frame), "map frame")?;

        self.registry.register(client, frame);

        // Passive async grabs on the client: the manager observes the
        // chords without blocking the client's own event processing.
        let pointer_mask =
            EventMask::BUTTON_PRESS | EventMask::BUTTON_RELEASE | EventMask::BUTTON_MOTION;
        check_void(
            self.ctx.conn.grab_button(
                false,
                client,
                pointer_mask,
                GrabMode::ASYNC,
                GrabMode::ASYNC,
                x11rb::NONE,
                self.cursors.move_,
                ButtonIndex::M1,
                x11rb::protocol::xproto::ModMask::M1,
            ),
            "grab move button",
        )?;
        check_void(
            self.ctx.conn.grab_button(
                false,
                client,
                pointer_mask,
                GrabMode::ASYNC,
                GrabMode::ASYNC,
                x11rb::NONE,
                self.cursors.resize,
                ButtonIndex::M3,
                x11rb::protocol::xproto::ModMask::M1,
            ),
            "grab resize button",
        )?;
        check_void(
            self.ctx.conn.grab_button(
                false,
                client,
                pointer_mask,
                GrabMode::ASYNC,
                GrabMode::ASYNC,
                x11rb::NONE,
                self.cursors.normal,
                ButtonIndex::M2,
                x11rb::protocol::xproto::ModMask::M1,
            ),
            "grab kill button",
        )?;
        check_void(
            self.ctx.conn.grab_key(
                false,
                client,
                x11rb::protocol::xproto::ModMask::M1,
                KEYCODE_F4,
                GrabMode::ASYNC,
                GrabMode::ASYNC,
            ),
            "grab close key",
        )?;
        // Keycode 0 = AnyKey; the switch chord is matched in the handler.
        check_void(
            self.ctx.conn.grab_key(
                true,
                client,
                x11rb::protocol::xproto::ModMask::CONTROL,
                0,
                GrabMode::ASYNC,
                GrabMode::ASYNC,
            ),
            "grab switch modifier",
        )?;

        info!("Framed window {} [{}]", client, frame);
        Ok(Some(frame))
    }

    /// Reverse of `frame_window`. The client is reparented back to root
    /// before the frame is destroyed, otherwise destroying the frame would
    /// take the client with it.
    pub fn unframe_window(&mut self, client: Window) -> Result<(), WmError> {
        let frame = self
            .registry
            .lookup(client)
            .expect("unframe requested for unregistered window");

        check_void(self.ctx.conn.unmap_window(frame), "unmap frame")?;
        check_void(
            self.ctx.conn.reparent_window(client, self.ctx.root_window, 0, 0),
            "reparent client to root",
        )?;
        check_void(
            self.ctx.conn.change_save_set(SetMode::DELETE, client),
            "remove client from save set",
        )?;
        check_void(self.ctx.conn.destroy_window(frame), "destroy frame")?;

        self.registry.unregister(client);
        info!("Unframed window {} [{}]", client, frame);
        Ok(())
    }

    /// Event loop. Blocks in `wait_for_event`, dispatches each event to
    /// exactly one handler, and applies the error policy to the result.
    /// Returns when the transport reports that the connection is gone.
    pub fn run(&mut self) -> Result<(), WmError> {
        loop {
            self.ctx.conn.flush().map_err(|e| WmError::send("flush", e))?;

            let event = match self.pending.take() {
                Some(event) => event,
                None => match self.ctx.conn.wait_for_event() {
                    Ok(event) => event,
                    Err(e) => {
                        info!("Event stream ended: {}", e);
                        return Ok(());
                    }
                },
            };

            if let Err(err) = self.dispatch(event) {
                match err.severity() {
                    Severity::Fatal => return Err(err),
                    Severity::Ignorable => warn!("Ignoring: {}", err),
                }
            }
        }
    }

    fn dispatch(&mut self, event: Event) -> Result<(), WmError> {
        match event {
            Event::MapRequest(ev) => self.handle_map_request(ev),
            Event::UnmapNotify(ev) => self.handle_unmap_notify(ev),
            Event::ConfigureRequest(ev) => self.handle_configure_request(ev),
            Event::ButtonPress(ev) => self.handle_button_press(ev),
            Event::ButtonRelease(ev) => {
                debug!("Button {} released in window {}", ev.detail, ev.event);
                self.drag = None;
                Ok(())
            }
            Event::MotionNotify(ev) => self.handle_motion_notify(ev),
            Event::KeyPress(ev) => self.handle_key_press(ev),
            Event::Expose(ev) => self.handle_expose(ev),
            // Deferred errors from fire-and-forget requests go through the
            // same classification as checked ones.
            Event::Error(e) => Err(WmError::protocol("asynchronous request", &e)),
            Event::EnterNotify(ev) => {
                debug!("Pointer entered window {}", ev.event);
                Ok(())
            }
            Event::LeaveNotify(ev) => {
                debug!("Pointer left window {}", ev.event);
                Ok(())
            }
            Event::CreateNotify(ev) => {
                debug!("CreateNotify for window {}", ev.window);
                Ok(())
            }
            Event::DestroyNotify(ev) => {
                debug!("DestroyNotify for window {}", ev.window);
                Ok(())
            }
            Event::MapNotify(ev) => {
                debug!("MapNotify for window {}", ev.window);
                Ok(())
            }
            Event::ReparentNotify(ev) => {
                debug!("ReparentNotify for window {}", ev.window);
                Ok(())
            }
            Event::ConfigureNotify(ev) => {
                debug!("ConfigureNotify for window {}", ev.window);
                Ok(())
            }
            Event::FocusIn(ev) => {
                debug!("FocusIn for window {}", ev.event);
                Ok(())
            }
            Event::FocusOut(ev) => {
                debug!("FocusOut for window {}", ev.event);
                Ok(())
            }
            Event::KeyRelease(ev) => {
                debug!("Key released in window {}", ev.event);
                Ok(())
            }
            other => {
                debug!("Unhandled event: {:?}", other);
                Ok(())
            }
        }
    }

    fn handle_map_request(&mut self, ev: MapRequestEvent) -> Result<(), WmError> {
        if !self.registry.contains(ev.window) {
            self.frame_window(ev.window, false)?;
        }
        check_void(self.ctx.conn.map_window(ev.window), "map client")
    }

    fn handle_unmap_notify(&mut self, ev: UnmapNotifyEvent) -> Result<(), WmError> {
        if !self.registry.contains(ev.window) {
            debug!("Ignore UnmapNotify for non-client window {}", ev.window);
            return Ok(());
        }
        // Root-sourced unmaps are fallout from our own reparenting of
        // pre-existing windows, not the client withdrawing itself.
        if ev.event == self.ctx.root_window {
            debug!("Ignore UnmapNotify for reparented pre-existing window {}", ev.window);
            return Ok(());
        }
        self.unframe_window(ev.window)
    }

    fn handle_configure_request(&mut self, ev: ConfigureRequestEvent) -> Result<(), WmError> {
        assert!(
            self.registry.contains(ev.window),
            "configure request for unmanaged window {}",
            ev.window
        );
        let frame = self.registry.lookup(ev.window).unwrap();

        // Honor the request on the frame first, then the client, keeping
        // the requested field set and order intact.
        let aux = ConfigureWindowAux::from_configure_request(&ev);
        check_void(self.ctx.conn.configure_window(frame, &aux), "configure frame")?;
        check_void(self.ctx.conn.configure_window(ev.window, &aux), "configure client")?;
        debug!(
            "Configured window {} and frame {} to {}x{}",
            ev.window, frame, ev.width, ev.height
        );
        Ok(())
    }

    fn handle_button_press(&mut self, ev: ButtonPressEvent) -> Result<(), WmError> {
        // The passive grabs live on the client, so the grab window reported
        // in `event` is always the client id, never the frame.
        let client = ev.event;
        assert!(
            self.registry.contains(client),
            "button press for unmanaged window {client}"
        );

        if ev.detail == 2 {
            info!("Force-killing client {} (Mod1+Button2)", client);
            return check_void(self.ctx.conn.kill_client(client), "kill client");
        }

        let frame = self.registry.lookup(client).unwrap();

        // Snapshot the gesture origin. The frame position is resolved with
        // a coordinate translation against its parent rather than trusted
        // from the geometry reply.
        let geom = check_reply(self.ctx.conn.get_geometry(frame), "get frame geometry")?;
        let tree = check_reply(self.ctx.conn.query_tree(frame), "query frame parent")?;
        let trans = check_reply(
            self.ctx.conn.translate_coordinates(frame, tree.parent, 0, 0),
            "translate frame origin",
        )?;
        self.drag = Some(DragState {
            start_pointer: Position::new(ev.root_x, ev.root_y),
            start_frame_pos: Position::new(trans.dst_x, trans.dst_y),
            start_frame_size: Size::from_extent(geom.width, geom.height),
        });

        check_void(
            self.ctx.conn.configure_window(
                frame,
                &ConfigureWindowAux::new().stack_mode(StackMode::ABOVE),
            ),
            "raise frame",
        )
    }

    fn handle_motion_notify(&mut self, ev: MotionNotifyEvent) -> Result<(), WmError> {
        // Coalesce: drain queued motion events for the same window and keep
        // only the newest one. Intermediate positions are redundant because
        // the destination depends only on the latest delta. Anything else
        // pulled off the queue is stashed for the next loop iteration.
        let mut ev = ev;
        loop {
            match self
                .ctx
                .conn
                .poll_for_event()
                .map_err(|e| WmError::send("poll queued event", e))?
            {
                Some(Event::MotionNotify(next)) if next.event == ev.event => ev = next,
                Some(other) => {
                    self.pending = Some(other);
                    break;
                }
                None => break,
            }
        }

        let drag = match self.drag {
            Some(drag) => drag,
            None => return Ok(()),
        };
        let client = ev.event;
        assert!(
            self.registry.contains(client),
            "motion event for unmanaged window {client}"
        );
        let frame = self.registry.lookup(client).unwrap();
        let pointer = Position::new(ev.root_x, ev.root_y);

        if ev.state.contains(KeyButMask::BUTTON1) {
            let dest = move_destination(&drag, pointer);
            check_void(
                self.ctx.conn.configure_window(
                    frame,
                    &ConfigureWindowAux::new().x(dest.x as i32).y(dest.y as i32),
                ),
                "move frame",
            )?;
        } else if ev.state.contains(KeyButMask::BUTTON3) {
            let size = resize_destination(&drag, pointer);
            let aux = ConfigureWindowAux::new()
                .width(size.width as u32)
                .height(size.height as u32);
            check_void(self.ctx.conn.configure_window(frame, &aux), "resize frame")?;
            check_void(self.ctx.conn.configure_window(client, &aux), "resize client")?;
        }
        Ok(())
    }

    fn handle_key_press(&mut self, ev: KeyPressEvent) -> Result<(), WmError> {
        let client = ev.event;
        assert!(
            self.registry.contains(client),
            "key press for unmanaged window {client}"
        );

        if ev.state.contains(KeyButMask::MOD1) && ev.detail == KEYCODE_F4 {
            self.close_window(client)
        } else if ev.state.contains(KeyButMask::CONTROL) && ev.detail == KEYCODE_TAB {
            self.switch_window(client)
        } else {
            debug!("Unbound key {} pressed in window {}", ev.detail, client);
            Ok(())
        }
    }

    /// Graceful-vs-forced close: clients advertising WM_DELETE_WINDOW in
    /// their WM_PROTOCOLS list get a client message and may clean up;
    /// everything else has its connection killed.
    fn close_window(&self, client: Window) -> Result<(), WmError> {
        let protocols = check_reply(
            self.ctx.conn.get_property(
                false,
                client,
                self.ctx.atoms.WM_PROTOCOLS,
                AtomEnum::ATOM,
                0,
                64,
            ),
            "read WM_PROTOCOLS",
        )?;
        if advertises_protocol(&protocols, self.ctx.atoms.WM_DELETE_WINDOW) {
            info!("Asking client {} to close itself", client);
            let event = ClientMessageEvent {
                response_type: CLIENT_MESSAGE_EVENT,
                format: 32,
                sequence: 0,
                window: client,
                type_: self.ctx.atoms.WM_PROTOCOLS,
                data: ClientMessageData::from([
                    self.ctx.atoms.WM_DELETE_WINDOW,
                    x11rb::CURRENT_TIME,
                    0,
                    0,
                    0,
                ]),
            };
            check_void(
                self.ctx.conn.send_event(false, client, EventMask::NO_EVENT, event),
                "send delete message",
            )
        } else {
            info!("Client {} has no delete protocol, killing it", client);
            check_void(self.ctx.conn.kill_client(client), "kill client")
        }
    }

    /// Raise and focus the cyclic successor of `current` in registry order.
    fn switch_window(&self, current: Window) -> Result<(), WmError> {
        let next = match self.registry.next_after(current) {
            Some(next) => next,
            None => return Ok(()),
        };
        let frame = self.registry.lookup(next).unwrap();

        check_void(
            self.ctx.conn.configure_window(
                frame,
                &ConfigureWindowAux::new().stack_mode(StackMode::ABOVE),
            ),
            "raise next frame",
        )?;
        check_void(
            self.ctx
                .conn
                .set_input_focus(InputFocus::POINTER_ROOT, next, x11rb::CURRENT_TIME),
            "focus next window",
        )?;
        debug!("Switched focus from {} to {}", current, next);
        Ok(())
    }

    fn handle_expose(&mut self, ev: ExposeEvent) -> Result<(), WmError> {
        if ev.count != 0 {
            return Ok(());
        }
        if let Some((client, frame)) = self.registry.iter().find(|&(_, f)| f == ev.window) {
            log_warn(
                draw_frame_title(&self.ctx, frame, &frame_title(client)),
                "draw frame title",
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drag(px: i16, py: i16, fx: i16, fy: i16, w: i16, h: i16) -> DragState {
        DragState {
            start_pointer: Position::new(px, py),
            start_frame_pos: Position::new(fx, fy),
            start_frame_size: Size::new(w, h),
        }
    }

    #[test]
    fn move_tracks_pointer_delta() {
        let d = drag(500, 500, 100, 150, 200, 100);
        assert_eq!(move_destination(&d, Position::new(530, 480)), Position::new(130, 130));
    }

    #[test]
    fn move_is_last_write_wins() {
        // Applying only the final delta gives the same destination as
        // walking the whole pointer path, so dropping intermediate motion
        // events is safe.
        let d = drag(0, 0, 40, 60, 200, 100);
        let path = [
            Position::new(5, 5),
            Position::new(17, -3),
            Position::new(90, 12),
            Position::new(33, 44),
        ];
        let mut last = Position::default();
        for p in path {
            last = move_destination(&d, p);
        }
        assert_eq!(last, move_destination(&d, Position::new(33, 44)));
        assert_eq!(last, Position::new(73, 104));
    }

    #[test]
    fn resize_grows_with_positive_delta() {
        let d = drag(0, 0, 0, 0, 200, 100);
        assert_eq!(resize_destination(&d, Position::new(50, 25)), Size::new(250, 125));
    }

    #[test]
    fn resize_never_goes_negative() {
        let d = drag(0, 0, 0, 0, 200, 100);
        // Deltas more negative than -size floor the dimension at exactly 0.
        assert_eq!(resize_destination(&d, Position::new(-1000, -1000)), Size::new(0, 0));
        assert_eq!(resize_destination(&d, Position::new(-201, -50)), Size::new(0, 50));
    }

    #[test]
    fn resize_shrinks_within_bounds() {
        let d = drag(10, 10, 0, 0, 200, 100);
        assert_eq!(resize_destination(&d, Position::new(-40, -30)), Size::new(150, 60));
    }
}
