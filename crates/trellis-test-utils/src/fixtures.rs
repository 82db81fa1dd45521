//! Reusable element and component fixtures.
//!
//! - [`item`] / [`list`]: keyed `<li>` rows under a `<ul>`.
//! - [`counter`]: a stateful component rendering `count` in a `<span>`.
//! - [`RenderTracker`]: a component that counts its renders.
//! - [`FailSwitch`]: a component whose render fails while armed.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use trellis_core::{value_map, Component, ComponentError, Element, Node, Value};

/// `<li key={key}>{key}</li>`.
pub fn item(key: &str) -> Node {
    Element::host("li").key(key).text(key).into()
}

/// `<ul>` holding one [`item`] per key, in order.
pub fn list(keys: &[&str]) -> Node {
    Element::host("ul")
        .children(keys.iter().map(|k| item(k)))
        .into()
}

/// A component with state `count`, starting from its `start` prop (or
/// zero), that renders `<span>{count}</span>`.
pub fn counter() -> Component {
    Component::new("Counter", |cx| {
        let count = cx.state().get("count").and_then(Value::as_int).unwrap_or(0);
        Element::host("span").text(count.to_string()).into()
    })
    .with_initial_state(|props| {
        let start = props.get("start").and_then(Value::as_int).unwrap_or(0);
        value_map([("count", start)])
    })
}

/// A component that renders its children and counts how often it ran.
pub struct RenderTracker {
    renders: Arc<AtomicUsize>,
    component: Component,
}

impl RenderTracker {
    pub fn new(name: &str) -> Self {
        let renders = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&renders);
        let component = Component::new(name.to_string(), move |cx| {
            counter.fetch_add(1, Ordering::SeqCst);
            cx.children().clone()
        });
        Self { renders, component }
    }

    pub fn component(&self) -> &Component {
        &self.component
    }

    /// Renders so far.
    pub fn renders(&self) -> usize {
        self.renders.load(Ordering::SeqCst)
    }
}

/// A component that fails to render while armed and otherwise renders
/// `<p>ok</p>`.
pub struct FailSwitch {
    armed: Arc<AtomicBool>,
    component: Component,
}

impl FailSwitch {
    pub fn new() -> Self {
        let armed = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&armed);
        let component = Component::fallible("Fails", move |_| {
            if flag.load(Ordering::SeqCst) {
                Err(ComponentError::new("armed"))
            } else {
                Ok(Element::host("p").text("ok").into())
            }
        });
        Self { armed, component }
    }

    pub fn arm(&self) {
        self.armed.store(true, Ordering::SeqCst);
    }

    pub fn disarm(&self) {
        self.armed.store(false, Ordering::SeqCst);
    }

    pub fn component(&self) -> &Component {
        &self.component
    }
}

impl Default for FailSwitch {
    fn default() -> Self {
        Self::new()
    }
}

/// Route `tracing` output through the test harness. Safe to call from
/// every test; only the first call installs the subscriber.
pub fn init_test_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}
