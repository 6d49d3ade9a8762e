x11rb::atom_manager! {
    /// Atoms the manager needs for the graceful-close handshake.
    pub AtomCollection: AtomCollectionCookie {
        WM_PROTOCOLS,
        WM_DELETE_WINDOW,
    }
}
