//! Element descriptions: the immutable input a render produces.
//!
//! A [`Node`] is what a component returns and what a root is asked to
//! display. Descriptions are cheap to clone (everything is behind an
//! `Arc`) and are compared by identity where the engine needs a fast
//! "nothing changed" check: [`Props::ptr_eq`] drives bailout and
//! [`Node::ptr_eq`] lets a root skip reconciliation when the same
//! element is scheduled twice.

use std::fmt;
use std::sync::Arc;

use crate::error::ComponentError;
use crate::id::{HostHandle, InstanceId};
use crate::value::{Value, ValueMap};

/// Callback receiving a host handle on attach and `None` on detach.
pub type RefCallback = Arc<dyn Fn(Option<HostHandle>) + Send + Sync>;

/// Callback invoked once an update has been committed.
pub type Callback = Arc<dyn Fn() + Send + Sync>;

type RenderFn = dyn Fn(&RenderContext<'_>) -> Result<Node, ComponentError> + Send + Sync;
type InitialStateFn = dyn Fn(&Props) -> ValueMap + Send + Sync;

// ── Node ────────────────────────────────────────────────────────

/// A description of zero or more children.
#[derive(Clone, Default)]
pub enum Node {
    /// Renders nothing.
    #[default]
    Empty,
    /// A text node.
    Text(Arc<str>),
    /// A single element.
    Element(Element),
    /// An ordered list of children. Nested lists become fragments.
    List(Arc<[Node]>),
}

impl Node {
    /// A text node.
    pub fn text(s: impl Into<Arc<str>>) -> Self {
        Self::Text(s.into())
    }

    /// A list node.
    pub fn list(items: impl IntoIterator<Item = Node>) -> Self {
        Self::List(items.into_iter().collect())
    }

    /// Whether this is [`Node::Empty`].
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// The text payload, if this is [`Node::Text`].
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// The element payload, if this is [`Node::Element`].
    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Self::Element(e) => Some(e),
            _ => None,
        }
    }

    /// Identity comparison: true only when both sides share storage.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Empty, Self::Empty) => true,
            (Self::Text(a), Self::Text(b)) => Arc::ptr_eq(a, b),
            (Self::Element(a), Self::Element(b)) => a.ptr_eq(b),
            (Self::List(a), Self::List(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Empty, Self::Empty) => true,
            (Self::Text(a), Self::Text(b)) => a == b,
            (Self::Element(a), Self::Element(b)) => a.ptr_eq(b),
            (Self::List(a), Self::List(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "Empty"),
            Self::Text(s) => write!(f, "{s:?}"),
            Self::Element(e) => fmt::Debug::fmt(e, f),
            Self::List(items) => f.debug_list().entries(items.iter()).finish(),
        }
    }
}

impl From<Element> for Node {
    fn from(e: Element) -> Self {
        Self::Element(e)
    }
}

impl From<ElementBuilder> for Node {
    fn from(b: ElementBuilder) -> Self {
        Self::Element(b.build())
    }
}

impl From<&str> for Node {
    fn from(s: &str) -> Self {
        Self::Text(Arc::from(s))
    }
}

impl From<String> for Node {
    fn from(s: String) -> Self {
        Self::Text(Arc::from(s))
    }
}

impl From<Vec<Node>> for Node {
    fn from(items: Vec<Node>) -> Self {
        Self::List(items.into())
    }
}

impl FromIterator<Node> for Node {
    fn from_iter<I: IntoIterator<Item = Node>>(iter: I) -> Self {
        Self::list(iter)
    }
}

// ── Key ─────────────────────────────────────────────────────────

/// Caller-supplied identity of a child among its siblings.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Key(Arc<str>);

impl Key {
    /// The key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Self(Arc::from(s))
    }
}

impl From<String> for Key {
    fn from(s: String) -> Self {
        Self(Arc::from(s))
    }
}

impl From<Arc<str>> for Key {
    fn from(s: Arc<str>) -> Self {
        Self(s)
    }
}

impl From<u64> for Key {
    fn from(v: u64) -> Self {
        Self(Arc::from(v.to_string()))
    }
}

impl From<usize> for Key {
    fn from(v: usize) -> Self {
        Self(Arc::from(v.to_string()))
    }
}

// ── Props ───────────────────────────────────────────────────────

struct PropsData {
    attributes: ValueMap,
    children: Node,
}

/// Immutable element properties: attributes plus children.
///
/// Two `Props` are "the same" for bailout purposes only when they share
/// storage ([`Props::ptr_eq`]); structurally equal props built twice
/// still count as a change.
#[derive(Clone)]
pub struct Props(Arc<PropsData>);

impl Props {
    /// Props with the given attributes and children.
    pub fn new(attributes: ValueMap, children: Node) -> Self {
        Self(Arc::new(PropsData {
            attributes,
            children,
        }))
    }

    /// Props with no attributes and no children.
    pub fn empty() -> Self {
        Self::new(ValueMap::new(), Node::Empty)
    }

    /// Props holding only children.
    pub fn from_children(children: Node) -> Self {
        Self::new(ValueMap::new(), children)
    }

    /// Props of a text node.
    pub fn text(text: impl Into<Arc<str>>) -> Self {
        Self::from_children(Node::Text(text.into()))
    }

    /// Attribute map.
    pub fn attributes(&self) -> &ValueMap {
        &self.0.attributes
    }

    /// Children description.
    pub fn children(&self) -> &Node {
        &self.0.children
    }

    /// Look up one attribute.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.attributes.get(name)
    }

    /// The children when they are a single text node.
    pub fn text_content(&self) -> Option<&str> {
        self.0.children.as_text()
    }

    /// Identity comparison.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Default for Props {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for Props {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Props")
            .field("attributes", &self.0.attributes)
            .field("children", &self.0.children)
            .finish()
    }
}

// ── Component ───────────────────────────────────────────────────

/// A user component: a named render function.
///
/// Type identity is the render function's allocation. Clones of one
/// `Component` are the same type; two components built from identical
/// closures are not.
#[derive(Clone)]
pub struct Component {
    name: Arc<str>,
    render: Arc<RenderFn>,
    initial_state: Option<Arc<InitialStateFn>>,
}

impl Component {
    /// A component whose render cannot fail.
    pub fn new<F>(name: impl Into<Arc<str>>, render: F) -> Self
    where
        F: Fn(&RenderContext<'_>) -> Node + Send + Sync + 'static,
    {
        Self::fallible(name, move |cx| Ok(render(cx)))
    }

    /// A component whose render may return an error.
    pub fn fallible<F>(name: impl Into<Arc<str>>, render: F) -> Self
    where
        F: Fn(&RenderContext<'_>) -> Result<Node, ComponentError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            render: Arc::new(render),
            initial_state: None,
        }
    }

    /// Attach a function producing the state a new instance starts with.
    pub fn with_initial_state<F>(mut self, init: F) -> Self
    where
        F: Fn(&Props) -> ValueMap + Send + Sync + 'static,
    {
        self.initial_state = Some(Arc::new(init));
        self
    }

    /// Display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Invoke the render function.
    pub fn render(&self, cx: &RenderContext<'_>) -> Result<Node, ComponentError> {
        (self.render)(cx)
    }

    /// State for a freshly mounted instance.
    pub fn initial_state(&self, props: &Props) -> ValueMap {
        match &self.initial_state {
            Some(init) => init(props),
            None => ValueMap::new(),
        }
    }

    /// Whether both handles refer to the same component type.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.render, &other.render)
    }

    /// Start building an element of this component.
    pub fn element(&self) -> ElementBuilder {
        Element::component(self)
    }
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Component")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Everything a component can read while rendering.
pub struct RenderContext<'a> {
    props: &'a Props,
    state: &'a ValueMap,
    root_context: Option<&'a ValueMap>,
    instance: InstanceId,
}

impl<'a> RenderContext<'a> {
    /// Assemble a context. Called by the engine before each render.
    pub fn new(
        props: &'a Props,
        state: &'a ValueMap,
        root_context: Option<&'a ValueMap>,
        instance: InstanceId,
    ) -> Self {
        Self {
            props,
            state,
            root_context,
            instance,
        }
    }

    /// Props of the element being rendered.
    pub fn props(&self) -> &'a Props {
        self.props
    }

    /// Children passed to the element.
    pub fn children(&self) -> &'a Node {
        self.props.children()
    }

    /// Current state of this instance.
    pub fn state(&self) -> &'a ValueMap {
        self.state
    }

    /// Context value attached to the root, if any.
    pub fn root_context(&self) -> Option<&'a ValueMap> {
        self.root_context
    }

    /// Stable identity of this instance, usable as an update target.
    pub fn instance(&self) -> InstanceId {
        self.instance
    }
}

// ── Element ─────────────────────────────────────────────────────

/// What kind of thing an element creates.
#[derive(Clone, Debug)]
pub enum ElementType {
    /// A host element with the given tag name.
    Host(Arc<str>),
    /// A user component.
    Component(Component),
    /// A grouping element with no host representation.
    Fragment,
}

impl ElementType {
    /// Whether two element types may share a fiber.
    pub fn is_same_type(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Host(a), Self::Host(b)) => a == b,
            (Self::Component(a), Self::Component(b)) => a.ptr_eq(b),
            (Self::Fragment, Self::Fragment) => true,
            _ => false,
        }
    }

    /// Tag or component name.
    pub fn name(&self) -> &str {
        match self {
            Self::Host(tag) => tag,
            Self::Component(c) => c.name(),
            Self::Fragment => "Fragment",
        }
    }
}

struct ElementData {
    element_type: ElementType,
    key: Option<Key>,
    props: Props,
    ref_callback: Option<RefCallback>,
}

/// An immutable element description.
#[derive(Clone)]
pub struct Element(Arc<ElementData>);

impl Element {
    /// Start building a host element.
    pub fn host(tag: impl Into<Arc<str>>) -> ElementBuilder {
        ElementBuilder::new(ElementType::Host(tag.into()))
    }

    /// Start building a component element.
    pub fn component(component: &Component) -> ElementBuilder {
        ElementBuilder::new(ElementType::Component(component.clone()))
    }

    /// Start building a fragment element.
    pub fn fragment() -> ElementBuilder {
        ElementBuilder::new(ElementType::Fragment)
    }

    /// The element's type.
    pub fn element_type(&self) -> &ElementType {
        &self.0.element_type
    }

    /// The element's key, if any.
    pub fn key(&self) -> Option<&Key> {
        self.0.key.as_ref()
    }

    /// The element's props.
    pub fn props(&self) -> &Props {
        &self.0.props
    }

    /// The element's ref callback, if any.
    pub fn ref_callback(&self) -> Option<&RefCallback> {
        self.0.ref_callback.as_ref()
    }

    /// Whether this is a fragment element.
    pub fn is_fragment(&self) -> bool {
        matches!(self.0.element_type, ElementType::Fragment)
    }

    /// Identity comparison.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("Element");
        s.field("type", &self.0.element_type.name());
        if let Some(key) = &self.0.key {
            s.field("key", key);
        }
        s.field("props", &self.0.props).finish()
    }
}

/// Incremental constructor for [`Element`].
pub struct ElementBuilder {
    element_type: ElementType,
    key: Option<Key>,
    attributes: ValueMap,
    children: Vec<Node>,
    ref_callback: Option<RefCallback>,
}

impl ElementBuilder {
    fn new(element_type: ElementType) -> Self {
        Self {
            element_type,
            key: None,
            attributes: ValueMap::new(),
            children: Vec::new(),
            ref_callback: None,
        }
    }

    /// Set the key.
    pub fn key(mut self, key: impl Into<Key>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Set one attribute.
    pub fn attr(mut self, name: impl Into<Arc<str>>, value: impl Into<Value>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Append one child.
    pub fn child(mut self, child: impl Into<Node>) -> Self {
        self.children.push(child.into());
        self
    }

    /// Append several children.
    pub fn children<I, N>(mut self, children: I) -> Self
    where
        I: IntoIterator<Item = N>,
        N: Into<Node>,
    {
        self.children.extend(children.into_iter().map(Into::into));
        self
    }

    /// Append a text child.
    pub fn text(self, text: impl Into<Arc<str>>) -> Self {
        self.child(Node::Text(text.into()))
    }

    /// Attach a ref callback.
    pub fn ref_callback<F>(mut self, f: F) -> Self
    where
        F: Fn(Option<HostHandle>) + Send + Sync + 'static,
    {
        self.ref_callback = Some(Arc::new(f));
        self
    }

    /// Attach an existing shared ref callback.
    pub fn with_ref(mut self, r: RefCallback) -> Self {
        self.ref_callback = Some(r);
        self
    }

    /// Finish the element.
    ///
    /// A single child is stored as-is; several become a [`Node::List`].
    pub fn build(self) -> Element {
        let mut children = self.children;
        let children = match children.len() {
            0 => Node::Empty,
            1 => children.pop().unwrap_or_default(),
            _ => Node::List(children.into()),
        };
        Element(Arc::new(ElementData {
            element_type: self.element_type,
            key: self.key,
            props: Props::new(self.attributes, children),
            ref_callback: self.ref_callback,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_child_is_not_wrapped() {
        let el = Element::host("p").text("hi").build();
        assert_eq!(el.props().text_content(), Some("hi"));
    }

    #[test]
    fn many_children_become_a_list() {
        let el = Element::host("ul").child("a").child("b").build();
        match el.props().children() {
            Node::List(items) => assert_eq!(items.len(), 2),
            other => panic!("expected list, got {other:?}"),
        }
    }

    #[test]
    fn component_identity_follows_the_render_fn() {
        let a = Component::new("A", |_| Node::Empty);
        let b = Component::new("A", |_| Node::Empty);
        assert!(ElementType::Component(a.clone()).is_same_type(&ElementType::Component(a.clone())));
        assert!(!ElementType::Component(a).is_same_type(&ElementType::Component(b)));
    }

    #[test]
    fn host_types_compare_by_tag() {
        let a = ElementType::Host("div".into());
        let b = ElementType::Host("div".into());
        let c = ElementType::Host("span".into());
        assert!(a.is_same_type(&b));
        assert!(!a.is_same_type(&c));
        assert!(!a.is_same_type(&ElementType::Fragment));
    }

    #[test]
    fn props_identity_is_by_allocation() {
        let a = Props::empty();
        let b = Props::empty();
        assert!(a.ptr_eq(&a.clone()));
        assert!(!a.ptr_eq(&b));
    }

    #[test]
    fn node_ptr_eq_on_shared_element() {
        let el: Node = Element::host("div").build().into();
        assert!(el.ptr_eq(&el.clone()));
        let other: Node = Element::host("div").build().into();
        assert!(!el.ptr_eq(&other));
    }
}
