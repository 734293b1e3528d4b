//! Element locators with ordered fallbacks.
//!
//! A [`Selector`] is a symbolic query: a stable identifier, a css-like
//! selector, text containment, or a structural path built with
//! [`Selector::within`]. A [`Locator`] is an ordered list of selectors tried
//! in sequence. Resolution short-circuits on the first selector that matches
//! anything, so a fallback is only ever consulted when everything before it
//! matched nothing.
//!
//! ```
//! use sonda::{Locator, Selector};
//!
//! let edit = Locator::new(
//!     Selector::id("tbody-alunos")
//!         .within(Selector::row(["João Teste Selenium"]))
//!         .within(Selector::button("Editar")),
//! )
//! .or(Selector::id("tbody-alunos").within(Selector::button("Editar")));
//!
//! assert_eq!(edit.queries().count(), 2);
//! ```

use crate::driver::{ElementHandle, PageDriver};
use crate::result::{SondaError, SondaResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, warn};

/// Symbolic element query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Selector {
    /// Element whose `id` attribute equals the value
    Id(String),
    /// CSS selector
    Css(String),
    /// Elements matching `css` whose text contains `text`
    Text {
        /// CSS selector
        css: String,
        /// Text to contain
        text: String,
    },
    /// Anchor whose href contains a fragment and whose class list has a class
    Link {
        /// Substring of the `href` attribute
        href_fragment: String,
        /// Required class
        class: String,
    },
    /// Button whose text contains a label
    Button {
        /// Label text
        label: String,
    },
    /// Table row with a cell containing any of the texts
    Row {
        /// Candidate cell texts
        texts: Vec<String>,
    },
    /// `inner` resolved beneath every element matched by `scope`
    Within {
        /// Outer query
        scope: Box<Selector>,
        /// Query evaluated inside each scope match
        inner: Box<Selector>,
    },
}

impl Selector {
    /// Select by identifier
    #[must_use]
    pub fn id(id: impl Into<String>) -> Self {
        Self::Id(id.into())
    }

    /// Select by CSS
    #[must_use]
    pub fn css(selector: impl Into<String>) -> Self {
        Self::Css(selector.into())
    }

    /// Select by CSS with text containment
    #[must_use]
    pub fn text(css: impl Into<String>, text: impl Into<String>) -> Self {
        Self::Text {
            css: css.into(),
            text: text.into(),
        }
    }

    /// Select an anchor by href fragment and class membership
    #[must_use]
    pub fn link(href_fragment: impl Into<String>, class: impl Into<String>) -> Self {
        Self::Link {
            href_fragment: href_fragment.into(),
            class: class.into(),
        }
    }

    /// Select a button by label
    #[must_use]
    pub fn button(label: impl Into<String>) -> Self {
        Self::Button {
            label: label.into(),
        }
    }

    /// Select table rows containing any of the texts
    #[must_use]
    pub fn row<I, S>(texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Row {
            texts: texts.into_iter().map(Into::into).collect(),
        }
    }

    /// Resolve `inner` beneath each match of `self`
    #[must_use]
    pub fn within(self, inner: Self) -> Self {
        Self::Within {
            scope: Box::new(self),
            inner: Box::new(inner),
        }
    }

    /// Reject queries that can never be evaluated
    pub fn validate(&self) -> SondaResult<()> {
        let malformed = |message: &str| SondaError::MalformedQuery {
            query: self.to_string(),
            message: message.to_string(),
        };
        match self {
            Self::Id(id) => {
                if id.is_empty() {
                    return Err(malformed("empty identifier"));
                }
                if id.chars().any(char::is_whitespace) {
                    return Err(malformed("identifier contains whitespace"));
                }
            }
            Self::Css(css) => check_css(css).map_err(|m| malformed(m))?,
            Self::Text { css, text } => {
                check_css(css).map_err(|m| malformed(m))?;
                if text.is_empty() {
                    return Err(malformed("empty text"));
                }
            }
            Self::Link {
                href_fragment,
                class,
            } => {
                if href_fragment.is_empty() || class.is_empty() {
                    return Err(malformed("link needs both an href fragment and a class"));
                }
            }
            Self::Button { label } => {
                if label.is_empty() {
                    return Err(malformed("empty button label"));
                }
            }
            Self::Row { texts } => {
                if texts.is_empty() || texts.iter().any(String::is_empty) {
                    return Err(malformed("row needs at least one non-empty text"));
                }
            }
            Self::Within { scope, inner } => {
                scope.validate()?;
                inner.validate()?;
            }
        }
        Ok(())
    }

    /// JavaScript function `(root) => Element[]` evaluating this selector
    #[must_use]
    pub fn to_js(&self) -> String {
        const TEXT: &str = "(el.innerText || el.textContent || '')";
        match self {
            Self::Id(id) => format!(
                "(root) => {{ const el = document.getElementById({}); \
                 return el && el !== root && (root === document || root.contains(el)) ? [el] : []; }}",
                js_str(id)
            ),
            Self::Css(css) => format!(
                "(root) => Array.from(root.querySelectorAll({}))",
                js_str(css)
            ),
            Self::Text { css, text } => format!(
                "(root) => Array.from(root.querySelectorAll({})).filter((el) => {TEXT}.includes({}))",
                js_str(css),
                js_str(text)
            ),
            Self::Link {
                href_fragment,
                class,
            } => format!(
                "(root) => Array.from(root.querySelectorAll('a')).filter((el) => \
                 (el.getAttribute('href') || '').includes({}) && el.classList.contains({}))",
                js_str(href_fragment),
                js_str(class)
            ),
            Self::Button { label } => format!(
                "(root) => Array.from(root.querySelectorAll('button')).filter((el) => {TEXT}.includes({}))",
                js_str(label)
            ),
            Self::Row { texts } => {
                let list = serde_json::Value::from(texts.clone()).to_string();
                format!(
                    "(root) => Array.from(root.querySelectorAll('tr')).filter((tr) => \
                     Array.from(tr.querySelectorAll('td')).some((el) => \
                     {list}.some((t) => {TEXT}.includes(t))))"
                )
            }
            Self::Within { scope, inner } => format!(
                "(root) => {{ const seen = new Set(); \
                 return ({})(root).flatMap((s) => ({})(s)).filter((el) => !seen.has(el) && seen.add(el)); }}",
                scope.to_js(),
                inner.to_js()
            ),
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "#{id}"),
            Self::Css(css) => write!(f, "{css}"),
            Self::Text { css, text } => write!(f, "{css}:has-text({text:?})"),
            Self::Link {
                href_fragment,
                class,
            } => write!(f, "a.{class}[href*={href_fragment:?}]"),
            Self::Button { label } => write!(f, "button:has-text({label:?})"),
            Self::Row { texts } => write!(f, "tr:has-text({})", texts.join("|")),
            Self::Within { scope, inner } => write!(f, "{scope} >> {inner}"),
        }
    }
}

/// JavaScript string literal
pub(crate) fn js_str(value: &str) -> String {
    serde_json::Value::String(value.to_owned()).to_string()
}

fn check_css(css: &str) -> Result<(), &'static str> {
    if css.trim().is_empty() {
        return Err("empty selector");
    }
    let mut depth_bracket = 0_i32;
    let mut depth_paren = 0_i32;
    let mut quote: Option<char> = None;
    for c in css.chars() {
        if let Some(q) = quote {
            if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' => quote = Some(c),
            '[' => depth_bracket += 1,
            ']' => depth_bracket -= 1,
            '(' => depth_paren += 1,
            ')' => depth_paren -= 1,
            _ => {}
        }
        if depth_bracket < 0 || depth_paren < 0 {
            return Err("unbalanced brackets");
        }
    }
    if quote.is_some() {
        return Err("unterminated string");
    }
    if depth_bracket != 0 || depth_paren != 0 {
        return Err("unbalanced brackets");
    }
    let dangling = css
        .trim_end()
        .ends_with(|c| matches!(c, '>' | '+' | '~' | ','));
    if dangling {
        return Err("dangling combinator");
    }
    Ok(())
}

// =============================================================================
// LOCATOR
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
struct Strategy {
    selector: Selector,
    unique: bool,
}

/// Ordered selector chain: a primary query followed by fallbacks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locator {
    strategies: Vec<Strategy>,
}

/// Successful resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match {
    /// First element matched by the winning query
    pub handle: ElementHandle,
    /// Index of the winning query (0 = primary)
    pub strategy_index: usize,
    /// Number of elements the winning query matched
    pub match_count: usize,
}

impl Match {
    /// Whether a fallback query produced this match
    #[must_use]
    pub const fn used_fallback(&self) -> bool {
        self.strategy_index > 0
    }
}

impl Locator {
    /// Locator with a single primary query
    #[must_use]
    pub fn new(selector: Selector) -> Self {
        Self {
            strategies: vec![Strategy {
                selector,
                unique: false,
            }],
        }
    }

    /// Append a fallback query
    #[must_use]
    pub fn or(mut self, selector: Selector) -> Self {
        self.strategies.push(Strategy {
            selector,
            unique: false,
        });
        self
    }

    /// Append a fallback accepted only when it matches exactly one element
    #[must_use]
    pub fn or_unique(mut self, selector: Selector) -> Self {
        self.strategies.push(Strategy {
            selector,
            unique: true,
        });
        self
    }

    /// Primary query
    #[must_use]
    pub fn primary(&self) -> &Selector {
        &self.strategies[0].selector
    }

    /// All queries in resolution order
    pub fn queries(&self) -> impl Iterator<Item = &Selector> {
        self.strategies.iter().map(|s| &s.selector)
    }

    /// Validate every query in the chain
    pub fn validate(&self) -> SondaResult<()> {
        self.strategies.iter().try_for_each(|s| s.selector.validate())
    }

    /// Resolve against the live document; `Ok(None)` when nothing matched
    pub async fn find<D: PageDriver + ?Sized>(
        &self,
        driver: &D,
        scope: Option<&ElementHandle>,
    ) -> SondaResult<Option<Match>> {
        Ok(self.resolve(driver, scope).await?.ok())
    }

    /// Resolve against the live document, reporting the last failed query
    pub async fn locate<D: PageDriver + ?Sized>(
        &self,
        driver: &D,
        scope: Option<&ElementHandle>,
    ) -> SondaResult<Match> {
        self.resolve(driver, scope)
            .await?
            .map_err(|query| SondaError::NotFound { query })
    }

    async fn resolve<D: PageDriver + ?Sized>(
        &self,
        driver: &D,
        scope: Option<&ElementHandle>,
    ) -> SondaResult<Result<Match, String>> {
        self.validate()?;
        let mut last_failure = String::new();
        for (index, strategy) in self.strategies.iter().enumerate() {
            let handles = driver.query(&strategy.selector, scope).await?;
            let match_count = handles.len();
            if match_count == 0 {
                last_failure = strategy.selector.to_string();
                continue;
            }
            if strategy.unique && match_count != 1 {
                warn!(
                    query = %strategy.selector,
                    matches = match_count,
                    "fallback rejected: expected exactly one match"
                );
                last_failure = format!(
                    "{} (matched {match_count}, expected exactly one)",
                    strategy.selector
                );
                continue;
            }
            if index > 0 {
                debug!(primary = %self.primary(), fallback = %strategy.selector, "resolved via fallback");
            }
            let Some(handle) = handles.into_iter().next() else {
                continue;
            };
            return Ok(Ok(Match {
                handle,
                strategy_index: index,
                match_count,
            }));
        }
        Ok(Err(last_failure))
    }
}

impl From<Selector> for Locator {
    fn from(selector: Selector) -> Self {
        Self::new(selector)
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.primary())?;
        for strategy in &self.strategies[1..] {
            write!(f, " || {}", strategy.selector)?;
        }
        Ok(())
    }
}
