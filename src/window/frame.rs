use x11rb::protocol::xproto::{Atom, EventMask, GetPropertyReply, MapState, Window};

/// Width of the decorative border drawn around each client.
pub const BORDER_WIDTH: u16 = 5;

pub const FRAME_BG_COLOR: u32 = 0x0000ff;
pub const FRAME_BORDER_COLOR: u32 = 0xff0000;

/// Event selection for frame windows: structure changes, enter/leave, and
/// exposure so the title gets redrawn when the frame becomes visible.
///
/// Input events (button/key) are deliberately absent. The frame is
/// geometrically larger than the client, so it would intercept pointer
/// events first and the handlers would see frame ids where they expect the
/// client id carried by the passive grabs.
pub fn frame_event_mask() -> EventMask {
    EventMask::SUBSTRUCTURE_NOTIFY
        | EventMask::SUBSTRUCTURE_REDIRECT
        | EventMask::ENTER_WINDOW
        | EventMask::LEAVE_WINDOW
        | EventMask::EXPOSURE
}

/// Skip rule for windows that existed before the manager started: an
/// override-redirect window has opted out of management (menus, tooltips,
/// another manager's decorations), and a non-viewable window is not meant
/// to be shown right now.
pub fn should_manage_existing(override_redirect: bool, map_state: MapState) -> bool {
    !override_redirect && map_state == MapState::VIEWABLE
}

/// Whether a WM_PROTOCOLS reply advertises `protocol`. Clients that do get
/// a client message and may clean up; everything else is force-killed.
/// A missing property or one with the wrong format counts as not advertised.
pub fn advertises_protocol(protocols: &GetPropertyReply, protocol: Atom) -> bool {
    protocols
        .value32()
        .map(|mut atoms| atoms.any(|a| a == protocol))
        .unwrap_or(false)
}

/// Diagnostic WM_NAME for a frame, derived from the client it wraps.
pub fn frame_title(client: Window) -> String {
    format!("WID: {}", client)
}

pub const FRAME_ICON_NAME: &str = "winm (iconified)";

#[cfg(test)]
mod tests {
    use super::*;
    use x11rb::protocol::xproto::AtomEnum;

    #[test]
    fn viewable_plain_window_is_managed() {
        assert!(should_manage_existing(false, MapState::VIEWABLE));
    }

    #[test]
    fn override_redirect_is_skipped() {
        assert!(!should_manage_existing(true, MapState::VIEWABLE));
    }

    #[test]
    fn non_viewable_is_skipped() {
        assert!(!should_manage_existing(false, MapState::UNMAPPED));
        assert!(!should_manage_existing(false, MapState::UNVIEWABLE));
        assert!(!should_manage_existing(true, MapState::UNMAPPED));
    }

    #[test]
    fn frame_title_names_the_client() {
        assert_eq!(frame_title(0x2a), "WID: 42");
    }

    #[test]
    fn frame_mask_excludes_input_events() {
        let mask = frame_event_mask();
        assert!(!mask.contains(EventMask::BUTTON_PRESS));
        assert!(!mask.contains(EventMask::KEY_PRESS));
        assert!(mask.contains(EventMask::SUBSTRUCTURE_NOTIFY));
    }

    #[test]
    fn frame_mask_selects_exposure() {
        assert!(frame_event_mask().contains(EventMask::EXPOSURE));
    }

    const WM_DELETE_WINDOW: Atom = 0x1c1;

    fn protocols_reply(format: u8, atoms: &[Atom]) -> GetPropertyReply {
        GetPropertyReply {
            format,
            sequence: 0,
            length: 0,
            type_: AtomEnum::ATOM.into(),
            bytes_after: 0,
            value_len: atoms.len() as u32,
            value: atoms.iter().flat_map(|a| a.to_ne_bytes()).collect(),
        }
    }

    #[test]
    fn delete_protocol_advertised_means_graceful_close() {
        let reply = protocols_reply(32, &[0x1c0, WM_DELETE_WINDOW]);
        assert!(advertises_protocol(&reply, WM_DELETE_WINDOW));
    }

    #[test]
    fn delete_protocol_absent_means_kill() {
        let reply = protocols_reply(32, &[0x1c0, 0x1c2]);
        assert!(!advertises_protocol(&reply, WM_DELETE_WINDOW));
        let empty = protocols_reply(32, &[]);
        assert!(!advertises_protocol(&empty, WM_DELETE_WINDOW));
    }

    #[test]
    fn delete_protocol_wrong_format_means_kill() {
        let reply = protocols_reply(8, &[WM_DELETE_WINDOW]);
        assert!(!advertises_protocol(&reply, WM_DELETE_WINDOW));
    }
}
