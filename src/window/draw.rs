use anyhow::Result;
use tracing::debug;
use x11rb::connection::Connection;
use x11rb::protocol::xproto::{ConnectionExt, CreateGCAux, Window};

use crate::core::context::Context;

/// Redraw a frame's diagnostic title after an Expose. Purely cosmetic, so
/// callers treat failures as ignorable.
pub fn draw_frame_title(ctx: &Context, frame: Window, title: &str) -> Result<()> {
    if title.is_empty() {
        return Ok(());
    }

    let gc = ctx.conn.generate_id()?;
    let font = ctx.conn.generate_id()?;

    let mut font_opened = true;
    if ctx.conn.open_font(font, b"7x13")?.check().is_err() {
        if let Err(e) = ctx.conn.open_font(font, b"fixed")?.check() {
            debug!("Failed to open font 'fixed': {}. Skipping title text.", e);
            font_opened = false;
        }
    }

    if font_opened {
        let screen = &ctx.conn.setup().roots[ctx.screen_num];
        let values = CreateGCAux::new()
            .foreground(screen.black_pixel)
            .background(screen.white_pixel)
            .font(font);
        // Free the server-side GC and font even when drawing fails partway.
        let drawn = ctx
            .conn
            .create_gc(gc, frame, &values)
            .and_then(|_| ctx.conn.image_text8(frame, gc, 10, 13, title.as_bytes()));
        let _ = ctx.conn.free_gc(gc);
        let _ = ctx.conn.close_font(font);
        drawn?;
    }

    Ok(())
}
