use std::collections::HashMap;
use x11rb::protocol::xproto::Window;

/// The authoritative client → frame mapping. Every handler consults this
/// before treating a window id as a managed client; nothing else decides
/// "managed" status. Access is confined to the dispatch thread.
///
/// Insertion order is kept alongside the map so window switching has a
/// deterministic cycle.
#[derive(Debug, Default)]
pub struct ClientRegistry {
    frames: HashMap<Window, Window>,
    order: Vec<Window>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a newly framed client. Double registration is a dispatcher
    /// bug, not a runtime condition.
    pub fn register(&mut self, client: Window, frame: Window) {
        assert!(
            self.frames.insert(client, frame).is_none(),
            "window {client} framed twice"
        );
        self.order.push(client);
    }

    pub fn lookup(&self, client: Window) -> Option<Window> {
        self.frames.get(&client).copied()
    }

    pub fn contains(&self, client: Window) -> bool {
        self.frames.contains_key(&client)
    }

    /// Drop a client, returning its frame. Unregistering an unknown window
    /// means a handler ran without checking the registry first.
    pub fn unregister(&mut self, client: Window) -> Window {
        let frame = self
            .frames
            .remove(&client)
            .unwrap_or_else(|| panic!("window {client} is not registered"));
        self.order.retain(|&w| w != client);
        frame
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// (client, frame) pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (Window, Window)> + '_ {
        self.order.iter().map(move |&c| (c, self.frames[&c]))
    }

    /// Cyclic successor of `client` in insertion order, wrapping from the
    /// last entry to the first. `None` if `client` is not registered.
    pub fn next_after(&self, client: Window) -> Option<Window> {
        let idx = self.order.iter().position(|&w| w == client)?;
        Some(self.order[(idx + 1) % self.order.len()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_lookup_unregister() {
        let mut reg = ClientRegistry::new();
        reg.register(100, 200);
        reg.register(101, 201);
        assert_eq!(reg.lookup(100), Some(200));
        assert_eq!(reg.lookup(101), Some(201));
        assert_eq!(reg.lookup(102), None);
        assert_eq!(reg.len(), 2);

        assert_eq!(reg.unregister(100), 200);
        assert!(!reg.contains(100));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    #[should_panic(expected = "framed twice")]
    fn double_register_panics() {
        let mut reg = ClientRegistry::new();
        reg.register(100, 200);
        reg.register(100, 300);
    }

    #[test]
    #[should_panic(expected = "not registered")]
    fn double_unregister_panics() {
        let mut reg = ClientRegistry::new();
        reg.register(100, 200);
        reg.unregister(100);
        reg.unregister(100);
    }

    #[test]
    fn iteration_follows_insertion_order() {
        let mut reg = ClientRegistry::new();
        reg.register(5, 50);
        reg.register(3, 30);
        reg.register(9, 90);
        let pairs: Vec<_> = reg.iter().collect();
        assert_eq!(pairs, vec![(5, 50), (3, 30), (9, 90)]);
    }

    #[test]
    fn switch_order_is_cyclic() {
        let mut reg = ClientRegistry::new();
        reg.register(5, 50);
        reg.register(3, 30);
        reg.register(9, 90);
        assert_eq!(reg.next_after(5), Some(3));
        assert_eq!(reg.next_after(3), Some(9));
        // Last entry wraps back to the first.
        assert_eq!(reg.next_after(9), Some(5));
        assert_eq!(reg.next_after(7), None);
    }

    #[test]
    fn unregister_keeps_cycle_consistent() {
        let mut reg = ClientRegistry::new();
        reg.register(1, 10);
        reg.register(2, 20);
        reg.register(3, 30);
        reg.unregister(2);
        assert_eq!(reg.next_after(1), Some(3));
        assert_eq!(reg.next_after(3), Some(1));
    }
}
