//! Named multi-subscriber signals.
//!
//! Every interesting state change is announced on the bus under a
//! `class::event` name. Native callbacks run first in registration order,
//! then the payload is forwarded to script subscribers over the IPC seam.
//!
//! Emission points are terminal: an operation emits as its last step, and a
//! callback that holds on to entity ids must revalidate them before use.
//! Entries are never vacated once created; a name survives its last
//! unsubscribe.

use std::collections::HashMap;
use std::rc::Rc;

use serde_json::json;
use tracing::error;

use crate::container::ContainerId;
use crate::output::OutputId;
use crate::shell::ToplevelId;
use crate::Server;

/// Payload argument, always an entity handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalArg {
    Toplevel(ToplevelId),
    Container(ContainerId),
    Output(OutputId),
}

impl SignalArg {
    fn to_json(self) -> serde_json::Value {
        match self {
            SignalArg::Toplevel(id) => json!({ "type": "client", "id": id.0 }),
            SignalArg::Container(id) => json!({ "type": "container", "id": id.0 }),
            SignalArg::Output(id) => json!({ "type": "screen", "id": id.0 }),
        }
    }
}

/// Ordered argument tuple passed to every subscriber.
#[derive(Debug, Clone, Default)]
pub struct SignalArgs(pub Vec<SignalArg>);

impl SignalArgs {
    pub fn none() -> Self {
        Self(Vec::new())
    }

    pub fn one(arg: SignalArg) -> Self {
        Self(vec![arg])
    }

    pub fn toplevel(&self) -> Option<ToplevelId> {
        self.0.iter().find_map(|a| match a {
            SignalArg::Toplevel(id) => Some(*id),
            _ => None,
        })
    }

    pub fn container(&self) -> Option<ContainerId> {
        self.0.iter().find_map(|a| match a {
            SignalArg::Container(id) => Some(*id),
            _ => None,
        })
    }

    pub fn output(&self) -> Option<OutputId> {
        self.0.iter().find_map(|a| match a {
            SignalArg::Output(id) => Some(*id),
            _ => None,
        })
    }
}

pub type SignalCallback = Rc<dyn Fn(&mut Server, &SignalArgs)>;

/// Token returned by [`SignalBus::connect`], used to disconnect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignalHandle(u64);

struct SignalEntry {
    callbacks: Vec<(SignalHandle, SignalCallback)>,
    /// Number of live script-side subscriptions for this name.
    script_refs: usize,
}

impl SignalEntry {
    fn new() -> Self {
        Self {
            callbacks: Vec::new(),
            script_refs: 0,
        }
    }
}

#[derive(Default)]
pub struct SignalBus {
    entries: HashMap<String, SignalEntry>,
    next_handle: u64,
}

impl SignalBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&mut self, name: &str) -> &mut SignalEntry {
        self.entries
            .entry(name.to_string())
            .or_insert_with(SignalEntry::new)
    }

    /// Register a native listener. Listeners run in registration order.
    pub fn connect(&mut self, name: &str, callback: SignalCallback) -> SignalHandle {
        self.next_handle += 1;
        let handle = SignalHandle(self.next_handle);
        self.entry(name).callbacks.push((handle, callback));
        handle
    }

    pub fn disconnect(&mut self, name: &str, handle: SignalHandle) {
        self.entry(name).callbacks.retain(|(h, _)| *h != handle);
    }

    /// Track a script-side subscription for this name.
    pub fn subscribe_script(&mut self, name: &str) {
        self.entry(name).script_refs += 1;
    }

    pub fn unsubscribe_script(&mut self, name: &str) {
        let entry = self.entry(name);
        entry.script_refs = entry.script_refs.saturating_sub(1);
    }

    fn collect(&self, name: &str) -> (Vec<SignalCallback>, bool) {
        match self.entries.get(name) {
            Some(entry) => (
                entry.callbacks.iter().map(|(_, cb)| cb.clone()).collect(),
                entry.script_refs > 0,
            ),
            None => (Vec::new(), false),
        }
    }
}

impl Server {
    /// Emit `name` to every subscriber: native callbacks first, then the
    /// script side as a queued IPC event.
    pub fn emit_signal(&mut self, name: &str, args: SignalArgs) {
        let (callbacks, wants_script) = self.signals.collect(name);
        for callback in callbacks {
            callback(self, &args);
        }
        if wants_script {
            let payload = json!({
                "event": "signal",
                "signal": name,
                "args": args.0.iter().map(|a| a.to_json()).collect::<Vec<_>>(),
            });
            self.script_events.push_back(payload);
        }
    }

    /// Convenience for the common one-object payload.
    pub fn emit_signal_simple(&mut self, name: &str, arg: SignalArg) {
        self.emit_signal(name, SignalArgs::one(arg));
    }

    /// Run a scripted callback result, logging failures without removing the
    /// subscriber.
    pub fn report_script_error(&self, name: &str, message: &str) {
        error!("error when executing script callback for {name}: {message}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Fixture;
    use std::cell::RefCell;

    #[test]
    fn callbacks_run_in_registration_order() {
        let mut fixture = Fixture::new();
        let order = Rc::new(RefCell::new(Vec::new()));
        for tag in ["first", "second", "third"] {
            let order = order.clone();
            fixture.server.signals.connect(
                "test::order",
                Rc::new(move |_, _| order.borrow_mut().push(tag)),
            );
        }
        fixture.server.emit_signal("test::order", SignalArgs::none());
        assert_eq!(*order.borrow(), vec!["first", "second", "third"]);
    }

    #[test]
    fn disconnect_removes_only_the_handle() {
        let mut fixture = Fixture::new();
        let count = Rc::new(RefCell::new(0));
        let c1 = count.clone();
        let keep = fixture
            .server
            .signals
            .connect("test::x", Rc::new(move |_, _| *c1.borrow_mut() += 1));
        let c2 = count.clone();
        let drop_me = fixture
            .server
            .signals
            .connect("test::x", Rc::new(move |_, _| *c2.borrow_mut() += 10));
        fixture.server.signals.disconnect("test::x", drop_me);
        fixture.server.emit_signal("test::x", SignalArgs::none());
        assert_eq!(*count.borrow(), 1);
        fixture.server.signals.disconnect("test::x", keep);
        fixture.server.emit_signal("test::x", SignalArgs::none());
        assert_eq!(*count.borrow(), 1);
    }

    #[test]
    fn script_subscription_queues_events() {
        let mut fixture = Fixture::new();
        fixture.server.signals.subscribe_script("client::focus");
        fixture
            .server
            .emit_signal("client::focus", SignalArgs::none());
        let event = fixture.server.script_events.pop_front().unwrap();
        assert_eq!(event["signal"], "client::focus");
        fixture.server.signals.unsubscribe_script("client::focus");
        fixture
            .server
            .emit_signal("client::focus", SignalArgs::none());
        assert!(fixture.server.script_events.is_empty());
    }
}
