//! Test utilities and mock hosts for Trellis development.
//!
//! Provides a [`RecordingHost`] that keeps an in-memory node tree and a
//! log of every host call, and a [`ManualScheduler`] whose clock and
//! yield decisions are driven by the test.

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod fixtures;

use std::collections::HashMap;
use std::fmt::Write as _;

use trellis_core::{
    HostConfig, HostError, HostHandle, Node, PriorityLevel, Props, Scheduler, TaskId,
    UpdatePayload, Value, ValueMap,
};

// ── RecordingHost ───────────────────────────────────────────────

/// One call made by the engine into the host.
#[derive(Clone, Debug, PartialEq)]
pub enum HostOp {
    CreateInstance {
        handle: HostHandle,
        element_type: String,
    },
    CreateText {
        handle: HostHandle,
        text: String,
    },
    AppendInitialChild {
        parent: HostHandle,
        child: HostHandle,
    },
    AppendChild {
        parent: HostHandle,
        child: HostHandle,
    },
    InsertBefore {
        parent: HostHandle,
        child: HostHandle,
        before: HostHandle,
    },
    RemoveChild {
        parent: HostHandle,
        child: HostHandle,
    },
    CommitUpdate {
        handle: HostHandle,
        changes: Vec<(String, Option<Value>)>,
    },
    CommitText {
        handle: HostHandle,
        text: String,
    },
    ResetText {
        handle: HostHandle,
    },
}

impl HostOp {
    /// The host method this op records.
    pub fn name(&self) -> &'static str {
        match self {
            Self::CreateInstance { .. } => "create_instance",
            Self::CreateText { .. } => "create_text_instance",
            Self::AppendInitialChild { .. } => "append_initial_child",
            Self::AppendChild { .. } => "append_child",
            Self::InsertBefore { .. } => "insert_before",
            Self::RemoveChild { .. } => "remove_child",
            Self::CommitUpdate { .. } => "commit_update",
            Self::CommitText { .. } => "commit_text_update",
            Self::ResetText { .. } => "reset_text_content",
        }
    }

    /// Whether the op changes attached, user-visible nodes. Creation and
    /// initial assembly of detached nodes do not.
    pub fn is_mutation(&self) -> bool {
        !matches!(
            self,
            Self::CreateInstance { .. } | Self::CreateText { .. } | Self::AppendInitialChild { .. }
        )
    }
}

#[derive(Clone, Debug)]
enum NodeKind {
    Container,
    Element {
        tag: String,
        attributes: ValueMap,
        text: Option<String>,
    },
    Text(String),
}

#[derive(Clone, Debug)]
struct HostNode {
    kind: NodeKind,
    parent: Option<HostHandle>,
    children: Vec<HostHandle>,
}

/// An in-memory host with DOM-like move semantics.
///
/// Appending or inserting a node that already has a parent moves it.
/// Every call is appended to an op log that tests can inspect.
#[derive(Debug, Default)]
pub struct RecordingHost {
    nodes: HashMap<HostHandle, HostNode>,
    next_handle: u64,
    ops: Vec<HostOp>,
    direct_text: bool,
    fail_on: Option<&'static str>,
}

impl RecordingHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Elements whose only child is text render it directly instead of
    /// through a text node.
    pub fn with_direct_text(mut self) -> Self {
        self.direct_text = true;
        self
    }

    /// Allocate a container to render a root into.
    pub fn create_container(&mut self) -> HostHandle {
        self.insert(NodeKind::Container)
    }

    /// Make the next and all later calls to `operation` fail.
    pub fn fail_on(&mut self, operation: &'static str) {
        self.fail_on = Some(operation);
    }

    pub fn clear_failure(&mut self) {
        self.fail_on = None;
    }

    pub fn ops(&self) -> &[HostOp] {
        &self.ops
    }

    /// Ops that touched attached nodes.
    pub fn mutations(&self) -> Vec<&HostOp> {
        self.ops.iter().filter(|op| op.is_mutation()).collect()
    }

    pub fn take_ops(&mut self) -> Vec<HostOp> {
        std::mem::take(&mut self.ops)
    }

    pub fn clear_ops(&mut self) {
        self.ops.clear();
    }

    pub fn children_of(&self, handle: HostHandle) -> &[HostHandle] {
        self.nodes
            .get(&handle)
            .map(|n| n.children.as_slice())
            .unwrap_or(&[])
    }

    pub fn parent_of(&self, handle: HostHandle) -> Option<HostHandle> {
        self.nodes.get(&handle).and_then(|n| n.parent)
    }

    /// Text of a text node, or direct text of an element.
    pub fn text_of(&self, handle: HostHandle) -> Option<&str> {
        match &self.nodes.get(&handle)?.kind {
            NodeKind::Text(t) => Some(t),
            NodeKind::Element { text, .. } => text.as_deref(),
            NodeKind::Container => None,
        }
    }

    pub fn attribute(&self, handle: HostHandle, name: &str) -> Option<&Value> {
        match &self.nodes.get(&handle)?.kind {
            NodeKind::Element { attributes, .. } => attributes.get(name),
            _ => None,
        }
    }

    /// Number of nodes ever created, containers included.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Serialize the children of `handle` as markup, e.g.
    /// `<ul><li id="1">A</li></ul>`.
    pub fn markup(&self, handle: HostHandle) -> String {
        let mut out = String::new();
        for child in self.children_of(handle) {
            self.write_markup(*child, &mut out);
        }
        out
    }

    fn write_markup(&self, handle: HostHandle, out: &mut String) {
        let Some(node) = self.nodes.get(&handle) else {
            return;
        };
        match &node.kind {
            NodeKind::Text(t) => out.push_str(t),
            NodeKind::Container => {
                for child in &node.children {
                    self.write_markup(*child, out);
                }
            }
            NodeKind::Element {
                tag,
                attributes,
                text,
            } => {
                out.push('<');
                out.push_str(tag);
                for (name, value) in attributes {
                    let _ = write!(out, " {name}=\"{}\"", format_value(value));
                }
                out.push('>');
                if let Some(text) = text {
                    out.push_str(text);
                }
                for child in &node.children {
                    self.write_markup(*child, out);
                }
                let _ = write!(out, "</{tag}>");
            }
        }
    }

    fn insert(&mut self, kind: NodeKind) -> HostHandle {
        self.next_handle += 1;
        let handle = HostHandle(self.next_handle);
        self.nodes.insert(
            handle,
            HostNode {
                kind,
                parent: None,
                children: Vec::new(),
            },
        );
        handle
    }

    fn check(&self, operation: &'static str) -> Result<(), HostError> {
        match self.fail_on {
            Some(op) if op == operation => Err(HostError::new(operation, "injected failure")),
            _ => Ok(()),
        }
    }

    fn node_mut(&mut self, operation: &'static str, handle: HostHandle) -> Result<&mut HostNode, HostError> {
        self.nodes
            .get_mut(&handle)
            .ok_or_else(|| HostError::new(operation, format!("unknown node {handle}")))
    }

    fn detach(&mut self, child: HostHandle) {
        let parent = self.nodes.get(&child).and_then(|n| n.parent);
        if let Some(parent) = parent {
            if let Some(p) = self.nodes.get_mut(&parent) {
                p.children.retain(|c| *c != child);
            }
        }
        if let Some(c) = self.nodes.get_mut(&child) {
            c.parent = None;
        }
    }

    fn attach(
        &mut self,
        operation: &'static str,
        parent: HostHandle,
        child: HostHandle,
        before: Option<HostHandle>,
    ) -> Result<(), HostError> {
        self.node_mut(operation, child)?;
        self.node_mut(operation, parent)?;
        self.detach(child);
        let parent_node = self.node_mut(operation, parent)?;
        match before {
            None => parent_node.children.push(child),
            Some(before) => {
                let Some(pos) = parent_node.children.iter().position(|c| *c == before) else {
                    return Err(HostError::new(
                        operation,
                        format!("{before} is not a child of {parent}"),
                    ));
                };
                parent_node.children.insert(pos, child);
            }
        }
        self.node_mut(operation, child)?.parent = Some(parent);
        Ok(())
    }
}

fn format_value(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Int(i) => i.to_string(),
        Value::Float(f) => f.to_string(),
        Value::Str(s) => s.to_string(),
        Value::Node(_) => "[node]".to_string(),
    }
}

impl HostConfig for RecordingHost {
    fn create_instance(&mut self, element_type: &str, props: &Props) -> Result<HostHandle, HostError> {
        self.check("create_instance")?;
        let text = if self.should_set_text_content(element_type, props) {
            props.text_content().map(str::to_string)
        } else {
            None
        };
        let handle = self.insert(NodeKind::Element {
            tag: element_type.to_string(),
            attributes: props.attributes().clone(),
            text,
        });
        self.ops.push(HostOp::CreateInstance {
            handle,
            element_type: element_type.to_string(),
        });
        Ok(handle)
    }

    fn create_text_instance(&mut self, text: &str) -> Result<HostHandle, HostError> {
        self.check("create_text_instance")?;
        let handle = self.insert(NodeKind::Text(text.to_string()));
        self.ops.push(HostOp::CreateText {
            handle,
            text: text.to_string(),
        });
        Ok(handle)
    }

    fn append_initial_child(&mut self, parent: HostHandle, child: HostHandle) -> Result<(), HostError> {
        self.check("append_initial_child")?;
        self.attach("append_initial_child", parent, child, None)?;
        self.ops.push(HostOp::AppendInitialChild { parent, child });
        Ok(())
    }

    fn should_set_text_content(&self, _element_type: &str, props: &Props) -> bool {
        self.direct_text && matches!(props.children(), Node::Text(_))
    }

    fn append_child(&mut self, parent: HostHandle, child: HostHandle) -> Result<(), HostError> {
        self.check("append_child")?;
        self.attach("append_child", parent, child, None)?;
        self.ops.push(HostOp::AppendChild { parent, child });
        Ok(())
    }

    fn insert_before(
        &mut self,
        parent: HostHandle,
        child: HostHandle,
        before: HostHandle,
    ) -> Result<(), HostError> {
        self.check("insert_before")?;
        self.attach("insert_before", parent, child, Some(before))?;
        self.ops.push(HostOp::InsertBefore {
            parent,
            child,
            before,
        });
        Ok(())
    }

    fn remove_child(&mut self, parent: HostHandle, child: HostHandle) -> Result<(), HostError> {
        self.check("remove_child")?;
        let attached = self
            .nodes
            .get(&child)
            .is_some_and(|n| n.parent == Some(parent));
        if !attached {
            return Err(HostError::new(
                "remove_child",
                format!("{child} is not a child of {parent}"),
            ));
        }
        self.detach(child);
        self.ops.push(HostOp::RemoveChild { parent, child });
        Ok(())
    }

    fn commit_update(
        &mut self,
        instance: HostHandle,
        payload: &UpdatePayload,
        _element_type: &str,
        _old_props: &Props,
        _new_props: &Props,
    ) -> Result<(), HostError> {
        self.check("commit_update")?;
        let node = self.node_mut("commit_update", instance)?;
        if let NodeKind::Element {
            attributes, text, ..
        } = &mut node.kind
        {
            for change in payload.iter() {
                if &*change.name == "children" {
                    *text = change
                        .value
                        .as_ref()
                        .and_then(Value::as_str)
                        .map(str::to_string);
                    continue;
                }
                match &change.value {
                    Some(value) => {
                        attributes.insert(change.name.clone(), value.clone());
                    }
                    None => {
                        attributes.shift_remove(&change.name);
                    }
                }
            }
        }
        self.ops.push(HostOp::CommitUpdate {
            handle: instance,
            changes: payload
                .iter()
                .map(|c| (c.name.to_string(), c.value.clone()))
                .collect(),
        });
        Ok(())
    }

    fn commit_text_update(
        &mut self,
        instance: HostHandle,
        _old_text: &str,
        new_text: &str,
    ) -> Result<(), HostError> {
        self.check("commit_text_update")?;
        let node = self.node_mut("commit_text_update", instance)?;
        if let NodeKind::Text(t) = &mut node.kind {
            *t = new_text.to_string();
        }
        self.ops.push(HostOp::CommitText {
            handle: instance,
            text: new_text.to_string(),
        });
        Ok(())
    }

    fn reset_text_content(&mut self, instance: HostHandle) -> Result<(), HostError> {
        self.check("reset_text_content")?;
        let node = self.node_mut("reset_text_content", instance)?;
        if let NodeKind::Element { text, .. } = &mut node.kind {
            *text = None;
        }
        self.ops.push(HostOp::ResetText { handle: instance });
        Ok(())
    }
}

// ── ManualScheduler ─────────────────────────────────────────────

/// A callback request recorded by [`ManualScheduler`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScheduledTask {
    pub id: TaskId,
    pub priority: PriorityLevel,
    pub timeout_ms: Option<u64>,
}

/// A scheduler the test drives by hand.
///
/// Time only moves through [`advance`](ManualScheduler::advance). Yield
/// decisions follow a budget: with `Some(n)` the first `n` checks say
/// "keep going" and every later check says "yield".
#[derive(Debug, Default)]
pub struct ManualScheduler {
    now_ms: u64,
    yield_budget: Option<usize>,
    yield_checks: usize,
    next_task: u64,
    tasks: Vec<ScheduledTask>,
    cancelled: Vec<TaskId>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&mut self, ms: u64) {
        self.now_ms += ms;
    }

    /// `None` never yields.
    pub fn set_yield_budget(&mut self, budget: Option<usize>) {
        self.yield_budget = budget;
    }

    /// How many times the engine asked whether to yield.
    pub fn yield_checks(&self) -> usize {
        self.yield_checks
    }

    /// Outstanding (not cancelled, not taken) tasks.
    pub fn tasks(&self) -> &[ScheduledTask] {
        &self.tasks
    }

    pub fn cancelled(&self) -> &[TaskId] {
        &self.cancelled
    }

    /// Remove and return the most urgent outstanding task.
    pub fn take_next_task(&mut self) -> Option<ScheduledTask> {
        let index = self
            .tasks
            .iter()
            .enumerate()
            .min_by_key(|(_, t)| (t.priority, t.id))
            .map(|(i, _)| i)?;
        Some(self.tasks.remove(index))
    }
}

impl Scheduler for ManualScheduler {
    fn now_ms(&self) -> u64 {
        self.now_ms
    }

    fn should_yield(&mut self) -> bool {
        self.yield_checks += 1;
        match &mut self.yield_budget {
            None => false,
            Some(0) => true,
            Some(n) => {
                *n -= 1;
                false
            }
        }
    }

    fn schedule_callback(&mut self, priority: PriorityLevel, timeout_ms: Option<u64>) -> TaskId {
        self.next_task += 1;
        let id = TaskId(self.next_task);
        self.tasks.push(ScheduledTask {
            id,
            priority,
            timeout_ms,
        });
        id
    }

    fn cancel_callback(&mut self, task: TaskId) {
        self.tasks.retain(|t| t.id != task);
        self.cancelled.push(task);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_moves_attached_nodes() {
        let mut host = RecordingHost::new();
        let a = host.create_container();
        let b = host.create_container();
        let t = host.create_text_instance("x").unwrap();
        host.append_child(a, t).unwrap();
        host.append_child(b, t).unwrap();
        assert!(host.children_of(a).is_empty());
        assert_eq!(host.children_of(b), &[t]);
        assert_eq!(host.parent_of(t), Some(b));
    }

    #[test]
    fn insert_before_orders_children() {
        let mut host = RecordingHost::new();
        let c = host.create_container();
        let x = host.create_text_instance("x").unwrap();
        let y = host.create_text_instance("y").unwrap();
        host.append_child(c, y).unwrap();
        host.insert_before(c, x, y).unwrap();
        assert_eq!(host.markup(c), "xy");
    }

    #[test]
    fn injected_failure_is_reported() {
        let mut host = RecordingHost::new();
        let c = host.create_container();
        host.fail_on("append_child");
        let t = host.create_text_instance("x").unwrap();
        let err = host.append_child(c, t).unwrap_err();
        assert_eq!(err.operation, "append_child");
    }

    #[test]
    fn yield_budget_counts_down() {
        let mut s = ManualScheduler::new();
        assert!(!s.should_yield());
        s.set_yield_budget(Some(2));
        assert!(!s.should_yield());
        assert!(!s.should_yield());
        assert!(s.should_yield());
        assert!(s.should_yield());
        assert_eq!(s.yield_checks(), 5);
    }

    #[test]
    fn tasks_come_out_most_urgent_first() {
        let mut s = ManualScheduler::new();
        let normal = s.schedule_callback(PriorityLevel::Normal, Some(5000));
        let urgent = s.schedule_callback(PriorityLevel::UserBlocking, Some(100));
        assert_eq!(s.take_next_task().map(|t| t.id), Some(urgent));
        s.cancel_callback(normal);
        assert!(s.take_next_task().is_none());
        assert_eq!(s.cancelled(), &[normal]);
    }
}
