//! In-memory document and driver.
//!
//! `MemoryDocument` is a small DOM: tagged nodes with attributes, text, form
//! values and visibility flags, plus a selector evaluator covering every
//! [`Selector`] variant and a css subset (tags, `#id`, `.class`, attribute
//! tests, descendant and child combinators).
//!
//! `MemoryDriver` implements [`PageDriver`] over a shared document. An
//! optional [`Behavior`] plays the part of the application under test: it
//! reacts to navigation, clicks and dialog resolution, and can defer
//! document changes to simulate asynchronous re-rendering. Deferred changes
//! are applied lazily on the next driver call once their due time (tokio
//! clock) has passed, so tests run deterministically under a paused clock.

use crate::dialog::{Dialog, DialogHandler};
use crate::driver::{DriverLauncher, ElementHandle, ElementState, PageDriver};
use crate::locator::Selector;
use crate::result::{SondaError, SondaResult};
use async_trait::async_trait;
use regex::Regex;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};
use tokio::time::{Duration, Instant};

// =============================================================================
// DOCUMENT
// =============================================================================

/// Index of a node inside a [`MemoryDocument`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    /// Handle a driver hands out for this node
    #[must_use]
    pub fn handle(self) -> ElementHandle {
        ElementHandle::new(format!("n{}", self.0))
    }

    /// Parse a handle produced by [`NodeId::handle`]
    #[must_use]
    pub fn from_handle(handle: &ElementHandle) -> Option<Self> {
        handle.id.strip_prefix('n')?.parse().ok().map(Self)
    }
}

/// Description of a node to insert
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeSpec {
    tag: String,
    attrs: BTreeMap<String, String>,
    text: String,
    value: Option<String>,
    hidden: bool,
    disabled: bool,
    obscured: bool,
}

impl NodeSpec {
    /// New element with a tag name
    #[must_use]
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into().to_ascii_lowercase(),
            ..Default::default()
        }
    }

    /// Set the `id` attribute
    #[must_use]
    pub fn id(self, id: impl Into<String>) -> Self {
        self.attr("id", id)
    }

    /// Add a class
    #[must_use]
    pub fn class(mut self, class: impl Into<String>) -> Self {
        let class = class.into();
        let classes = self.attrs.entry("class".to_string()).or_default();
        if !classes.is_empty() {
            classes.push(' ');
        }
        classes.push_str(&class);
        self
    }

    /// Set an attribute
    #[must_use]
    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.insert(name.into(), value.into());
        self
    }

    /// Set own text
    #[must_use]
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    /// Set the form value (makes the node a form control)
    #[must_use]
    pub fn value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    /// Not rendered
    #[must_use]
    pub const fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    /// Disabled control
    #[must_use]
    pub const fn disabled(mut self) -> Self {
        self.disabled = true;
        self
    }

    /// Covered by another element
    #[must_use]
    pub const fn obscured(mut self) -> Self {
        self.obscured = true;
        self
    }

    fn is_form_control(&self) -> bool {
        self.value.is_some() || matches!(self.tag.as_str(), "input" | "textarea" | "select")
    }
}

#[derive(Debug, Clone)]
struct Node {
    spec: NodeSpec,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// Arena-backed DOM; removed nodes are never reused, so stale handles stay stale
#[derive(Debug, Clone)]
pub struct MemoryDocument {
    nodes: Vec<Option<Node>>,
    root: NodeId,
}

impl Default for MemoryDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDocument {
    /// Empty document with a `body` root
    #[must_use]
    pub fn new() -> Self {
        Self {
            nodes: vec![Some(Node {
                spec: NodeSpec::new("body"),
                parent: None,
                children: Vec::new(),
            })],
            root: NodeId(0),
        }
    }

    /// Root node
    #[must_use]
    pub const fn root(&self) -> NodeId {
        self.root
    }

    fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0).and_then(Option::as_ref)
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.0).and_then(Option::as_mut)
    }

    /// Append a child; detached if `parent` no longer exists
    pub fn append(&mut self, parent: NodeId, spec: NodeSpec) -> NodeId {
        let id = NodeId(self.nodes.len());
        let parent_exists = self.node(parent).is_some();
        self.nodes.push(Some(Node {
            spec,
            parent: parent_exists.then_some(parent),
            children: Vec::new(),
        }));
        if let Some(p) = self.node_mut(parent) {
            p.children.push(id);
        }
        id
    }

    /// Remove a node and its subtree
    pub fn remove(&mut self, id: NodeId) {
        if id == self.root {
            return;
        }
        if let Some(parent) = self.node(id).and_then(|n| n.parent) {
            if let Some(p) = self.node_mut(parent) {
                p.children.retain(|c| *c != id);
            }
        }
        self.drop_subtree(id);
    }

    fn drop_subtree(&mut self, id: NodeId) {
        let children = self.node(id).map(|n| n.children.clone()).unwrap_or_default();
        for child in children {
            self.drop_subtree(child);
        }
        if let Some(slot) = self.nodes.get_mut(id.0) {
            *slot = None;
        }
    }

    /// Remove every child of a node
    pub fn clear_children(&mut self, id: NodeId) {
        let children = self.node(id).map(|n| n.children.clone()).unwrap_or_default();
        for child in children {
            self.remove(child);
        }
    }

    /// Swap a node for an identical copy with fresh ids, as a re-render would
    pub fn replace_with_clone(&mut self, id: NodeId) -> Option<NodeId> {
        let parent = self.node(id)?.parent?;
        let position = self.node(parent)?.children.iter().position(|c| *c == id)?;
        let copy = self.clone_subtree(id, parent)?;
        if let Some(p) = self.node_mut(parent) {
            p.children.retain(|c| *c != copy);
            p.children.insert(position, copy);
        }
        self.remove(id);
        Some(copy)
    }

    fn clone_subtree(&mut self, id: NodeId, parent: NodeId) -> Option<NodeId> {
        let node = self.node(id)?.clone();
        let copy = self.append(parent, node.spec);
        for child in node.children {
            self.clone_subtree(child, copy);
        }
        Some(copy)
    }

    /// Node whose `id` attribute matches
    #[must_use]
    pub fn find_by_id(&self, element_id: &str) -> Option<NodeId> {
        self.descendants(self.root)
            .into_iter()
            .find(|n| self.attr(*n, "id") == Some(element_id))
    }

    /// Node exists and is connected to the root
    #[must_use]
    pub fn is_attached(&self, id: NodeId) -> bool {
        let mut current = id;
        loop {
            if current == self.root {
                return true;
            }
            match self.node(current).and_then(|n| n.parent) {
                Some(parent) => current = parent,
                None => return false,
            }
        }
    }

    /// Children in order
    #[must_use]
    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        self.node(id).map(|n| n.children.clone()).unwrap_or_default()
    }

    /// Tag name
    #[must_use]
    pub fn tag(&self, id: NodeId) -> Option<&str> {
        self.node(id).map(|n| n.spec.tag.as_str())
    }

    /// Attribute value
    #[must_use]
    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        self.node(id)
            .and_then(|n| n.spec.attrs.get(name))
            .map(String::as_str)
    }

    /// Whether the class list contains a class
    #[must_use]
    pub fn has_class(&self, id: NodeId, class: &str) -> bool {
        self.attr(id, "class")
            .is_some_and(|c| c.split_whitespace().any(|x| x == class))
    }

    /// Form value
    #[must_use]
    pub fn value(&self, id: NodeId) -> Option<&str> {
        self.node(id).and_then(|n| n.spec.value.as_deref())
    }

    /// Replace own text
    pub fn set_text(&mut self, id: NodeId, text: impl Into<String>) {
        if let Some(n) = self.node_mut(id) {
            n.spec.text = text.into();
        }
    }

    /// Replace form value
    pub fn set_value(&mut self, id: NodeId, value: impl Into<String>) {
        if let Some(n) = self.node_mut(id) {
            n.spec.value = Some(value.into());
        }
    }

    /// Show or hide
    pub fn set_hidden(&mut self, id: NodeId, hidden: bool) {
        if let Some(n) = self.node_mut(id) {
            n.spec.hidden = hidden;
        }
    }

    /// Enable or disable
    pub fn set_disabled(&mut self, id: NodeId, disabled: bool) {
        if let Some(n) = self.node_mut(id) {
            n.spec.disabled = disabled;
        }
    }

    /// Cover or uncover
    pub fn set_obscured(&mut self, id: NodeId, obscured: bool) {
        if let Some(n) = self.node_mut(id) {
            n.spec.obscured = obscured;
        }
    }

    /// Set an attribute
    pub fn set_attr(&mut self, id: NodeId, name: impl Into<String>, value: impl Into<String>) {
        if let Some(n) = self.node_mut(id) {
            n.spec.attrs.insert(name.into(), value.into());
        }
    }

    /// Pre-order descendants, excluding the node itself
    #[must_use]
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).into_iter().rev().collect();
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.children(next).into_iter().rev());
        }
        out
    }

    /// Node and every ancestor are rendered
    #[must_use]
    pub fn is_displayed(&self, id: NodeId) -> bool {
        if !self.is_attached(id) {
            return false;
        }
        let mut current = Some(id);
        while let Some(c) = current {
            match self.node(c) {
                Some(n) if n.spec.hidden => return false,
                Some(n) => current = n.parent,
                None => return false,
            }
        }
        true
    }

    /// All text beneath the node regardless of visibility
    #[must_use]
    pub fn text_content(&self, id: NodeId) -> String {
        self.collect_text(id, false)
    }

    /// Text a user would see; empty when the node is not displayed
    #[must_use]
    pub fn rendered_text(&self, id: NodeId) -> String {
        if !self.is_displayed(id) {
            return String::new();
        }
        self.collect_text(id, true)
    }

    fn collect_text(&self, id: NodeId, visible_only: bool) -> String {
        let Some(node) = self.node(id) else {
            return String::new();
        };
        if visible_only && node.spec.hidden {
            return String::new();
        }
        let mut parts = vec![node.spec.text.trim().to_string()];
        parts.extend(
            node.children
                .iter()
                .map(|c| self.collect_text(*c, visible_only)),
        );
        parts.retain(|p| !p.is_empty());
        parts.join(" ")
    }

    /// Observable state, `None` when detached
    #[must_use]
    pub fn state(&self, id: NodeId) -> Option<ElementState> {
        if !self.is_attached(id) {
            return None;
        }
        let node = self.node(id)?;
        Some(ElementState {
            displayed: self.is_displayed(id),
            enabled: !node.spec.disabled,
            obscured: node.spec.obscured,
            text: self.rendered_text(id),
            value: node.spec.value.clone(),
        })
    }

    /// Evaluate a selector beneath `root` in document order
    pub fn query(&self, selector: &Selector, root: NodeId) -> SondaResult<Vec<NodeId>> {
        let candidates = self.descendants(root);
        let found = match selector {
            Selector::Id(id) => candidates
                .into_iter()
                .filter(|n| self.attr(*n, "id") == Some(id.as_str()))
                .collect(),
            Selector::Css(css) => {
                let parsed = CssSelector::parse(css)?;
                candidates
                    .into_iter()
                    .filter(|n| parsed.matches(self, *n))
                    .collect()
            }
            Selector::Text { css, text } => {
                let parsed = CssSelector::parse(css)?;
                candidates
                    .into_iter()
                    .filter(|n| parsed.matches(self, *n) && self.text_content(*n).contains(text))
                    .collect()
            }
            Selector::Link {
                href_fragment,
                class,
            } => candidates
                .into_iter()
                .filter(|n| {
                    self.tag(*n) == Some("a")
                        && self
                            .attr(*n, "href")
                            .is_some_and(|h| h.contains(href_fragment.as_str()))
                        && self.has_class(*n, class)
                })
                .collect(),
            Selector::Button { label } => candidates
                .into_iter()
                .filter(|n| self.tag(*n) == Some("button") && self.text_content(*n).contains(label))
                .collect(),
            Selector::Row { texts } => candidates
                .into_iter()
                .filter(|n| {
                    self.tag(*n) == Some("tr")
                        && self.descendants(*n).iter().any(|cell| {
                            self.tag(*cell) == Some("td") && {
                                let text = self.text_content(*cell);
                                texts.iter().any(|t| text.contains(t.as_str()))
                            }
                        })
                })
                .collect(),
            Selector::Within {
                scope: outer,
                inner,
            } => {
                let mut seen = HashSet::new();
                let mut out = Vec::new();
                for parent in self.query(outer, root)? {
                    for found in self.query(inner, parent)? {
                        if seen.insert(found) {
                            out.push(found);
                        }
                    }
                }
                out
            }
        };
        Ok(found)
    }
}

// =============================================================================
// CSS SUBSET
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
enum AttrTest {
    Exists,
    Equals(String),
    Contains(String),
    Prefix(String),
    Suffix(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attrs: Vec<(String, AttrTest)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Combinator {
    Descendant,
    Child,
}

/// Parsed css selector: compounds joined by combinators
#[derive(Debug, Clone, PartialEq, Eq)]
struct CssSelector {
    // (combinator to the previous compound, compound); the first combinator is unused
    parts: Vec<(Combinator, Compound)>,
}

fn compound_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\*|[A-Za-z][\w-]*)?((?:#[\w-]+|\.[\w-]+|\[[^\]]+\])*)$").ok())
        .as_ref()
}

fn piece_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r#"#([\w-]+)|\.([\w-]+)|\[\s*([\w-]+)\s*(?:([*^$]?=)\s*(?:'([^']*)'|"([^"]*)"|([^\]\s'"]*)))?\s*\]"#,
        )
        .ok()
    })
    .as_ref()
}

impl CssSelector {
    fn parse(css: &str) -> SondaResult<Self> {
        let malformed = |message: String| SondaError::MalformedQuery {
            query: css.to_string(),
            message,
        };
        let (Some(compound_re), Some(piece_re)) = (compound_re(), piece_re()) else {
            return Err(malformed("selector grammar unavailable".to_string()));
        };

        let mut parts = Vec::new();
        let mut combinator = Combinator::Descendant;
        for token in tokenize(css) {
            if token == ">" {
                if parts.is_empty() || combinator == Combinator::Child {
                    return Err(malformed("misplaced `>`".to_string()));
                }
                combinator = Combinator::Child;
                continue;
            }
            let caps = compound_re.captures(&token).ok_or_else(|| {
                malformed(format!("unsupported compound `{token}`"))
            })?;
            let mut compound = Compound {
                tag: caps
                    .get(1)
                    .map(|m| m.as_str())
                    .filter(|t| *t != "*")
                    .map(str::to_ascii_lowercase),
                ..Default::default()
            };
            let rest = caps.get(2).map_or("", |m| m.as_str());
            for piece in piece_re.captures_iter(rest) {
                if let Some(id) = piece.get(1) {
                    compound.id = Some(id.as_str().to_string());
                } else if let Some(class) = piece.get(2) {
                    compound.classes.push(class.as_str().to_string());
                } else if let Some(name) = piece.get(3) {
                    let value = piece
                        .get(5)
                        .or_else(|| piece.get(6))
                        .or_else(|| piece.get(7))
                        .map_or(String::new(), |m| m.as_str().to_string());
                    let test = match piece.get(4).map(|m| m.as_str()) {
                        None => AttrTest::Exists,
                        Some("=") => AttrTest::Equals(value),
                        Some("*=") => AttrTest::Contains(value),
                        Some("^=") => AttrTest::Prefix(value),
                        Some(_) => AttrTest::Suffix(value),
                    };
                    compound.attrs.push((name.as_str().to_string(), test));
                }
            }
            parts.push((combinator, compound));
            combinator = Combinator::Descendant;
        }
        if parts.is_empty() || combinator == Combinator::Child {
            return Err(malformed("incomplete selector".to_string()));
        }
        Ok(Self { parts })
    }

    fn matches(&self, doc: &MemoryDocument, node: NodeId) -> bool {
        self.matches_from(doc, node, self.parts.len() - 1)
    }

    fn matches_from(&self, doc: &MemoryDocument, node: NodeId, index: usize) -> bool {
        let (combinator, compound) = &self.parts[index];
        if !compound.matches(doc, node) {
            return false;
        }
        if index == 0 {
            return true;
        }
        let mut ancestor = doc.node(node).and_then(|n| n.parent);
        while let Some(a) = ancestor {
            if self.matches_from(doc, a, index - 1) {
                return true;
            }
            if *combinator == Combinator::Child {
                return false;
            }
            ancestor = doc.node(a).and_then(|n| n.parent);
        }
        false
    }
}

impl Compound {
    fn matches(&self, doc: &MemoryDocument, node: NodeId) -> bool {
        if let Some(tag) = &self.tag {
            if doc.tag(node) != Some(tag.as_str()) {
                return false;
            }
        }
        if let Some(id) = &self.id {
            if doc.attr(node, "id") != Some(id.as_str()) {
                return false;
            }
        }
        if !self.classes.iter().all(|c| doc.has_class(node, c)) {
            return false;
        }
        self.attrs.iter().all(|(name, test)| {
            let Some(actual) = doc.attr(node, name) else {
                return false;
            };
            match test {
                AttrTest::Exists => true,
                AttrTest::Equals(v) => actual == v,
                AttrTest::Contains(v) => actual.contains(v.as_str()),
                AttrTest::Prefix(v) => actual.starts_with(v.as_str()),
                AttrTest::Suffix(v) => actual.ends_with(v.as_str()),
            }
        })
    }
}

/// Split on whitespace outside brackets and quotes; `>` becomes its own token
fn tokenize(css: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut depth = 0_u32;
    let mut quote: Option<char> = None;
    for c in css.chars() {
        match (quote, c) {
            (Some(q), _) => {
                current.push(c);
                if c == q {
                    quote = None;
                }
            }
            (None, '\'' | '"') => {
                quote = Some(c);
                current.push(c);
            }
            (None, '[') => {
                depth += 1;
                current.push(c);
            }
            (None, ']') => {
                depth = depth.saturating_sub(1);
                current.push(c);
            }
            (None, '>') if depth == 0 => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
                tokens.push(">".to_string());
            }
            (None, c) if c.is_whitespace() && depth == 0 => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            (None, _) => current.push(c),
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

// =============================================================================
// DRIVER
// =============================================================================

type Change = Box<dyn FnOnce(&mut MemoryDocument) + Send>;

struct Deferred {
    due: Instant,
    seq: u64,
    change: Change,
}

/// Simulated application reacting to driver input
pub trait Behavior: Send {
    /// Page load; typically rebuilds the document
    fn navigate(&mut self, url: &str, page: &mut PageContext<'_>);

    /// A click landed on `node`
    fn click(&mut self, node: NodeId, page: &mut PageContext<'_>) {
        let _ = (node, page);
    }

    /// The open dialog was accepted or dismissed
    fn dialog_closed(&mut self, dialog: &Dialog, accepted: bool, page: &mut PageContext<'_>) {
        let _ = (dialog, accepted, page);
    }
}

/// Mutable view of the page handed to a [`Behavior`]
pub struct PageContext<'a> {
    /// Live document
    pub document: &'a mut MemoryDocument,
    url: &'a str,
    deferred: &'a mut Vec<Deferred>,
    next_seq: &'a mut u64,
    dialogs: &'a DialogHandler,
}

impl fmt::Debug for PageContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageContext")
            .field("url", &self.url)
            .field("pending", &self.deferred.len())
            .field("dialog_open", &self.dialogs.has_pending())
            .finish_non_exhaustive()
    }
}

impl PageContext<'_> {
    /// Current URL
    #[must_use]
    pub fn url(&self) -> &str {
        self.url
    }

    /// Apply a change once `delay_ms` of (tokio) time has passed
    pub fn defer<F>(&mut self, delay_ms: u64, change: F)
    where
        F: FnOnce(&mut MemoryDocument) + Send + 'static,
    {
        *self.next_seq += 1;
        self.deferred.push(Deferred {
            due: Instant::now() + Duration::from_millis(delay_ms),
            seq: *self.next_seq,
            change: Box::new(change),
        });
    }

    /// Replace the document and drop pending changes, as a full page load does
    pub fn reload(&mut self, document: MemoryDocument) {
        *self.document = document;
        self.deferred.clear();
    }

    /// Open a native dialog
    pub fn open_dialog(&mut self, dialog: Dialog) {
        self.dialogs.record(dialog);
    }
}

struct MemoryState {
    document: MemoryDocument,
    behavior: Option<Box<dyn Behavior>>,
    deferred: Vec<Deferred>,
    next_seq: u64,
    dialogs: DialogHandler,
    history: Vec<String>,
    url: String,
    stale_clicks: u32,
    closed: bool,
}

impl MemoryState {
    fn settle(&mut self) {
        let now = Instant::now();
        let mut due: Vec<Deferred> = Vec::new();
        let mut index = 0;
        while index < self.deferred.len() {
            if self.deferred[index].due <= now {
                due.push(self.deferred.remove(index));
            } else {
                index += 1;
            }
        }
        due.sort_by_key(|d| (d.due, d.seq));
        for deferred in due {
            (deferred.change)(&mut self.document);
        }
    }

    fn with_behavior<F>(&mut self, f: F)
    where
        F: FnOnce(&mut dyn Behavior, &mut PageContext<'_>),
    {
        let Some(mut behavior) = self.behavior.take() else {
            return;
        };
        let mut ctx = PageContext {
            document: &mut self.document,
            url: &self.url,
            deferred: &mut self.deferred,
            next_seq: &mut self.next_seq,
            dialogs: &self.dialogs,
        };
        f(behavior.as_mut(), &mut ctx);
        self.behavior = Some(behavior);
    }

    fn attached(&self, handle: &ElementHandle) -> SondaResult<NodeId> {
        NodeId::from_handle(handle)
            .filter(|id| self.document.is_attached(*id))
            .ok_or_else(|| SondaError::StaleElement {
                handle: handle.id.clone(),
            })
    }

    fn ensure_open(&self) -> SondaResult<()> {
        if self.closed {
            return Err(SondaError::page("session is closed"));
        }
        Ok(())
    }

    fn editable(&self, handle: &ElementHandle) -> SondaResult<NodeId> {
        let id = self.attached(handle)?;
        let state = self.document.state(id).unwrap_or_default();
        let control = self
            .document
            .node(id)
            .is_some_and(|n| n.spec.is_form_control());
        if !control {
            return Err(SondaError::Interaction {
                query: handle.to_string(),
                message: "element is not a form control".to_string(),
            });
        }
        if !state.displayed || !state.enabled {
            return Err(SondaError::Interaction {
                query: handle.to_string(),
                message: "element is not interactable".to_string(),
            });
        }
        Ok(id)
    }
}

/// [`PageDriver`] over a shared [`MemoryDocument`]; clones share the page
#[derive(Clone)]
pub struct MemoryDriver {
    state: Arc<Mutex<MemoryState>>,
}

impl fmt::Debug for MemoryDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (url, closed) = self
            .state
            .lock()
            .map(|s| (s.url.clone(), s.closed))
            .unwrap_or_default();
        f.debug_struct("MemoryDriver")
            .field("url", &url)
            .field("closed", &closed)
            .finish_non_exhaustive()
    }
}

impl Default for MemoryDriver {
    fn default() -> Self {
        Self::new(MemoryDocument::new())
    }
}

impl MemoryDriver {
    /// Driver over a static document
    #[must_use]
    pub fn new(document: MemoryDocument) -> Self {
        Self {
            state: Arc::new(Mutex::new(MemoryState {
                document,
                behavior: None,
                deferred: Vec::new(),
                next_seq: 0,
                dialogs: DialogHandler::new(),
                history: Vec::new(),
                url: String::from("about:blank"),
                stale_clicks: 0,
                closed: false,
            })),
        }
    }

    /// Driver whose page is produced by a simulated application
    #[must_use]
    pub fn with_behavior(behavior: impl Behavior + 'static) -> Self {
        let driver = Self::default();
        if let Ok(mut state) = driver.state.lock() {
            state.behavior = Some(Box::new(behavior));
        }
        driver
    }

    fn lock(&self) -> SondaResult<MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|_| SondaError::page("memory document lock poisoned"))
    }

    /// Mutate the document directly
    pub fn update<R>(&self, f: impl FnOnce(&mut MemoryDocument) -> R) -> SondaResult<R> {
        let mut state = self.lock()?;
        Ok(f(&mut state.document))
    }

    /// Read the document after applying due changes
    pub fn inspect_document<R>(&self, f: impl FnOnce(&MemoryDocument) -> R) -> SondaResult<R> {
        let mut state = self.lock()?;
        state.settle();
        Ok(f(&state.document))
    }

    /// Schedule a document change `delay_ms` from now
    pub fn defer<F>(&self, delay_ms: u64, change: F) -> SondaResult<()>
    where
        F: FnOnce(&mut MemoryDocument) + Send + 'static,
    {
        let mut state = self.lock()?;
        state.next_seq += 1;
        let seq = state.next_seq;
        state.deferred.push(Deferred {
            due: Instant::now() + Duration::from_millis(delay_ms),
            seq,
            change: Box::new(change),
        });
        Ok(())
    }

    /// Open a native dialog
    pub fn open_dialog(&self, dialog: Dialog) -> SondaResult<()> {
        self.lock()?.dialogs.record(dialog);
        Ok(())
    }

    /// Re-render the target of each of the next `count` clicks just before dispatch
    pub fn rerender_before_clicks(&self, count: u32) -> SondaResult<()> {
        self.lock()?.stale_clicks = count;
        Ok(())
    }

    /// Dialog record shared with the page
    #[must_use]
    pub fn dialogs(&self) -> DialogHandler {
        self.state
            .lock()
            .map(|s| s.dialogs.clone())
            .unwrap_or_default()
    }

    /// Calls made so far, e.g. `navigate:<url>`, `query:<selector>`, `click:<n3>`
    #[must_use]
    pub fn history(&self) -> Vec<String> {
        self.state
            .lock()
            .map(|s| s.history.clone())
            .unwrap_or_default()
    }

    /// Check if a call with this prefix was made
    #[must_use]
    pub fn was_called(&self, prefix: &str) -> bool {
        self.history().iter().any(|c| c.starts_with(prefix))
    }

    /// Whether `close` has run
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state.lock().map(|s| s.closed).unwrap_or(false)
    }
}

#[async_trait]
impl PageDriver for MemoryDriver {
    async fn navigate(&mut self, url: &str) -> SondaResult<()> {
        let mut state = self.lock()?;
        state.ensure_open()?;
        state.history.push(format!("navigate:{url}"));
        state.url = url.to_string();
        let url = url.to_string();
        state.with_behavior(|behavior, page| behavior.navigate(&url, page));
        Ok(())
    }

    async fn query(
        &self,
        selector: &Selector,
        scope: Option<&ElementHandle>,
    ) -> SondaResult<Vec<ElementHandle>> {
        let mut state = self.lock()?;
        state.ensure_open()?;
        state.settle();
        state.history.push(format!("query:{selector}"));
        let root = match scope {
            Some(handle) => state.attached(handle)?,
            None => state.document.root(),
        };
        Ok(state
            .document
            .query(selector, root)?
            .into_iter()
            .map(NodeId::handle)
            .collect())
    }

    async fn inspect(&self, handle: &ElementHandle) -> SondaResult<Option<ElementState>> {
        let mut state = self.lock()?;
        state.ensure_open()?;
        state.settle();
        Ok(NodeId::from_handle(handle).and_then(|id| state.document.state(id)))
    }

    async fn click(&mut self, handle: &ElementHandle) -> SondaResult<()> {
        let mut state = self.lock()?;
        state.ensure_open()?;
        state.settle();
        let id = state.attached(handle)?;
        if state.stale_clicks > 0 {
            state.stale_clicks -= 1;
            state.document.replace_with_clone(id);
            state.history.push(format!("stale:{handle}"));
            return Err(SondaError::StaleElement {
                handle: handle.id.clone(),
            });
        }
        let clickable = state
            .document
            .state(id)
            .is_some_and(|s| s.is_clickable());
        if !clickable {
            return Err(SondaError::Interaction {
                query: handle.to_string(),
                message: "element is not clickable".to_string(),
            });
        }
        state.history.push(format!("click:{}", handle.id));
        state.with_behavior(|behavior, page| behavior.click(id, page));
        Ok(())
    }

    async fn send_keys(&mut self, handle: &ElementHandle, text: &str) -> SondaResult<()> {
        let mut state = self.lock()?;
        state.ensure_open()?;
        state.settle();
        let id = state.editable(handle)?;
        let mut value = state.document.value(id).unwrap_or_default().to_string();
        value.push_str(text);
        state.document.set_value(id, value);
        state.history.push(format!("type:{}:{text}", handle.id));
        Ok(())
    }

    async fn clear(&mut self, handle: &ElementHandle) -> SondaResult<()> {
        let mut state = self.lock()?;
        state.ensure_open()?;
        state.settle();
        let id = state.editable(handle)?;
        state.document.set_value(id, "");
        state.history.push(format!("clear:{}", handle.id));
        Ok(())
    }

    async fn pending_dialog(&self) -> SondaResult<Option<Dialog>> {
        let mut state = self.lock()?;
        state.ensure_open()?;
        state.settle();
        Ok(state.dialogs.pending())
    }

    async fn resolve_dialog(&mut self, accept: bool) -> SondaResult<Dialog> {
        let mut state = self.lock()?;
        state.ensure_open()?;
        let dialog = state
            .dialogs
            .resolve(accept)
            .ok_or_else(|| SondaError::dialog("no dialog is open"))?;
        state.history.push(format!(
            "{}:{}",
            if accept { "accept" } else { "dismiss" },
            dialog.dialog_type()
        ));
        state.with_behavior(|behavior, page| behavior.dialog_closed(&dialog, accept, page));
        Ok(dialog)
    }

    async fn current_url(&self) -> SondaResult<String> {
        Ok(self.lock()?.url.clone())
    }

    async fn screenshot(&self) -> SondaResult<Vec<u8>> {
        Ok(Vec::new())
    }

    async fn close(&mut self) -> SondaResult<()> {
        let mut state = self.lock()?;
        state.history.push("close".to_string());
        state.closed = true;
        Ok(())
    }
}

// =============================================================================
// LAUNCHER
// =============================================================================

type Factory = Box<dyn Fn() -> MemoryDriver + Send + Sync>;

/// Launcher producing a fresh [`MemoryDriver`] per session
pub struct MemoryLauncher {
    factory: Factory,
    launched: Arc<Mutex<Vec<MemoryDriver>>>,
    fail_launch: bool,
}

impl fmt::Debug for MemoryLauncher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryLauncher")
            .field("launched", &self.launched().len())
            .field("fail_launch", &self.fail_launch)
            .finish_non_exhaustive()
    }
}

impl MemoryLauncher {
    /// Launcher calling `factory` for each session
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn() -> MemoryDriver + Send + Sync + 'static,
    {
        Self {
            factory: Box::new(factory),
            launched: Arc::new(Mutex::new(Vec::new())),
            fail_launch: false,
        }
    }

    /// Make every launch fail
    #[must_use]
    pub const fn failing(mut self) -> Self {
        self.fail_launch = true;
        self
    }

    /// Every driver handed out so far
    #[must_use]
    pub fn launched(&self) -> Vec<MemoryDriver> {
        self.launched.lock().map(|l| l.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl DriverLauncher for MemoryLauncher {
    type Driver = MemoryDriver;

    async fn launch(&self) -> SondaResult<MemoryDriver> {
        if self.fail_launch {
            return Err(SondaError::BrowserLaunch {
                message: "launch disabled for this launcher".to_string(),
            });
        }
        let driver = (self.factory)();
        if let Ok(mut launched) = self.launched.lock() {
            launched.push(driver.clone());
        }
        Ok(driver)
    }
}
