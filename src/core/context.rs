use anyhow::{Context as _, Result};
use x11rb::connection::Connection;
use x11rb::protocol::xproto::ConnectionExt;
use x11rb::rust_connection::RustConnection;

use crate::core::atoms::AtomCollection;

pub struct Context {
    pub conn: RustConnection,
    pub screen_num: usize,
    pub root_window: u32,
    pub atoms: AtomCollection,
}

impl Context {
    pub fn new(display: Option<&str>) -> Result<Self> {
        let (conn, screen_num) =
            x11rb::connect(display).context("failed to open X connection")?;
        let screen = &conn.setup().roots[screen_num];
        let root_window = screen.root;

        let atoms = AtomCollection::new(&conn)?.reply()?;

        // Select substructure redirection on the root window. Only one client
        // may hold this mask at a time, so a BadAccess reply means another
        // window manager owns the screen.
        use x11rb::protocol::xproto::{ChangeWindowAttributesAux, EventMask};
        let values = ChangeWindowAttributesAux::new()
            .event_mask(EventMask::SUBSTRUCTURE_REDIRECT | EventMask::SUBSTRUCTURE_NOTIFY);
        conn.change_window_attributes(root_window, &values)?
            .check()
            .context("another window manager is already running")?;

        Ok(Self { conn, screen_num, root_window, atoms })
    }
}
