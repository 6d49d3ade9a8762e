use anyhow::Result;
use x11rb::connection::Connection;
use x11rb::cursor::Handle;
use x11rb::protocol::xproto::Cursor;
use x11rb::resource_manager::new_from_default;

pub struct Cursors {
    pub normal: Cursor,
    pub move_: Cursor,
    pub resize: Cursor,
}

impl Cursors {
    pub fn new<C: Connection>(conn: &C, screen_num: usize) -> Result<Self> {
        let db = new_from_default(conn)?;
        let handle = Handle::new(conn, screen_num, &db)?.reply()?;

        let load = |name: &str| -> Result<Cursor> {
            Ok(handle.load_cursor(conn, name)?)
        };

        Ok(Self {
            normal: load("left_ptr")?,
            move_: load("fleur")?,
            resize: load("bottom_right_corner")?,
        })
    }
}
