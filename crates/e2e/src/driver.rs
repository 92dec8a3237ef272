//! Browser driver abstraction
//!
//! Page objects never talk to Playwright directly. They build [`Selector`]s
//! and hand them to a [`Driver`], which resolves them fresh on every call.
//! Two drivers exist: [`crate::playwright::PlaywrightDriver`] for real
//! browsers and [`crate::mock::MockDriver`] for offline tests.

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::E2eResult;

/// ARIA role used by role-based queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AriaRole {
    Alert,
    Button,
    Cell,
    Checkbox,
    Combobox,
    Dialog,
    Heading,
    Link,
    Menu,
    Menuitem,
    Navigation,
    Option,
    Row,
    Status,
    Switch,
    Tab,
    Table,
    Textbox,
}

impl AriaRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            AriaRole::Alert => "alert",
            AriaRole::Button => "button",
            AriaRole::Cell => "cell",
            AriaRole::Checkbox => "checkbox",
            AriaRole::Combobox => "combobox",
            AriaRole::Dialog => "dialog",
            AriaRole::Heading => "heading",
            AriaRole::Link => "link",
            AriaRole::Menu => "menu",
            AriaRole::Menuitem => "menuitem",
            AriaRole::Navigation => "navigation",
            AriaRole::Option => "option",
            AriaRole::Row => "row",
            AriaRole::Status => "status",
            AriaRole::Switch => "switch",
            AriaRole::Tab => "tab",
            AriaRole::Table => "table",
            AriaRole::Textbox => "textbox",
        }
    }
}

/// How a text-based query matches element text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum TextMatch {
    /// Case-insensitive substring, whitespace normalized
    Substring { value: String },
    /// Full string, case-sensitive, whitespace normalized
    Exact { value: String },
    /// JavaScript-compatible regular expression
    Pattern { source: String, flags: String },
}

impl TextMatch {
    pub fn exact(value: impl Into<String>) -> Self {
        TextMatch::Exact {
            value: value.into(),
        }
    }

    pub fn regex(source: impl Into<String>) -> Self {
        TextMatch::Pattern {
            source: source.into(),
            flags: String::new(),
        }
    }

    /// Case-insensitive regular expression
    pub fn regex_ci(source: impl Into<String>) -> Self {
        TextMatch::Pattern {
            source: source.into(),
            flags: "i".to_string(),
        }
    }

    /// Evaluate the match against already-extracted text
    pub fn matches(&self, text: &str) -> E2eResult<bool> {
        let normalized = normalize_whitespace(text);
        Ok(match self {
            TextMatch::Substring { value } => normalized
                .to_lowercase()
                .contains(&normalize_whitespace(value).to_lowercase()),
            TextMatch::Exact { value } => normalized == normalize_whitespace(value),
            TextMatch::Pattern { source, flags } => {
                let source = if flags.contains('i') {
                    format!("(?i){}", source)
                } else {
                    source.clone()
                };
                Regex::new(&source)?.is_match(text)
            }
        })
    }
}

impl From<&str> for TextMatch {
    fn from(value: &str) -> Self {
        TextMatch::Substring {
            value: value.to_string(),
        }
    }
}

impl From<String> for TextMatch {
    fn from(value: String) -> Self {
        TextMatch::Substring { value }
    }
}

impl From<&Regex> for TextMatch {
    fn from(re: &Regex) -> Self {
        TextMatch::regex(re.as_str())
    }
}

impl std::fmt::Display for TextMatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TextMatch::Substring { value } => write!(f, "{:?}", value),
            TextMatch::Exact { value } => write!(f, "{:?}s", value),
            TextMatch::Pattern { source, flags } => write!(f, "/{}/{}", source, flags),
        }
    }
}

fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// One hop in a locator chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SelectorPart {
    Css { css: String },
    TestId { id: String },
    Role { role: AriaRole, name: Option<TextMatch> },
    Text { text: TextMatch },
    Label { text: TextMatch },
    Placeholder { text: TextMatch },
    HasText { text: TextMatch },
    First,
    Last,
    Nth { index: usize },
}

impl std::fmt::Display for SelectorPart {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SelectorPart::Css { css } => write!(f, "css={}", css),
            SelectorPart::TestId { id } => write!(f, "testid={}", id),
            SelectorPart::Role { role, name: None } => write!(f, "role={}", role.as_str()),
            SelectorPart::Role {
                role,
                name: Some(name),
            } => write!(f, "role={}[name={}]", role.as_str(), name),
            SelectorPart::Text { text } => write!(f, "text={}", text),
            SelectorPart::Label { text } => write!(f, "label={}", text),
            SelectorPart::Placeholder { text } => write!(f, "placeholder={}", text),
            SelectorPart::HasText { text } => write!(f, "has-text={}", text),
            SelectorPart::First => write!(f, "nth=0"),
            SelectorPart::Last => write!(f, "nth=-1"),
            SelectorPart::Nth { index } => write!(f, "nth={}", index),
        }
    }
}

/// A chain of query parts, resolved by the driver on each use
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Selector {
    parts: Vec<SelectorPart>,
}

impl Selector {
    fn single(part: SelectorPart) -> Self {
        Self { parts: vec![part] }
    }

    pub fn css(css: impl Into<String>) -> Self {
        Self::single(SelectorPart::Css { css: css.into() })
    }

    pub fn test_id(id: impl Into<String>) -> Self {
        Self::single(SelectorPart::TestId { id: id.into() })
    }

    pub fn role(role: AriaRole) -> Self {
        Self::single(SelectorPart::Role { role, name: None })
    }

    pub fn role_named(role: AriaRole, name: impl Into<TextMatch>) -> Self {
        Self::single(SelectorPart::Role {
            role,
            name: Some(name.into()),
        })
    }

    pub fn text(text: impl Into<TextMatch>) -> Self {
        Self::single(SelectorPart::Text { text: text.into() })
    }

    pub fn label(text: impl Into<TextMatch>) -> Self {
        Self::single(SelectorPart::Label { text: text.into() })
    }

    pub fn placeholder(text: impl Into<TextMatch>) -> Self {
        Self::single(SelectorPart::Placeholder { text: text.into() })
    }

    /// Scope `child` inside this selector
    pub fn then(&self, child: &Selector) -> Self {
        let mut parts = self.parts.clone();
        parts.extend(child.parts.iter().cloned());
        Self { parts }
    }

    fn push(&self, part: SelectorPart) -> Self {
        let mut parts = self.parts.clone();
        parts.push(part);
        Self { parts }
    }

    pub fn has_text(&self, text: impl Into<TextMatch>) -> Self {
        self.push(SelectorPart::HasText { text: text.into() })
    }

    pub fn first(&self) -> Self {
        self.push(SelectorPart::First)
    }

    pub fn last(&self) -> Self {
        self.push(SelectorPart::Last)
    }

    pub fn nth(&self, index: usize) -> Self {
        self.push(SelectorPart::Nth { index })
    }

    pub fn parts(&self) -> &[SelectorPart] {
        &self.parts
    }
}

impl std::fmt::Display for Selector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let rendered: Vec<String> = self.parts.iter().map(|p| p.to_string()).collect();
        f.write_str(&rendered.join(" >> "))
    }
}

/// Page load milestones
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadState {
    #[default]
    Load,
    #[serde(rename = "domcontentloaded")]
    DomContentLoaded,
    #[serde(rename = "networkidle")]
    NetworkIdle,
}

/// Interaction performed on a resolved element
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ElementAction {
    Click,
    Fill { value: String },
    Clear,
    SelectOption { value: String },
    Check,
    Uncheck,
    Press { key: String },
    Hover,
    Focus,
}

impl std::fmt::Display for ElementAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ElementAction::Click => write!(f, "click"),
            ElementAction::Fill { .. } => write!(f, "fill"),
            ElementAction::Clear => write!(f, "clear"),
            ElementAction::SelectOption { value } => write!(f, "select:{}", value),
            ElementAction::Check => write!(f, "check"),
            ElementAction::Uncheck => write!(f, "uncheck"),
            ElementAction::Press { key } => write!(f, "press:{}", key),
            ElementAction::Hover => write!(f, "hover"),
            ElementAction::Focus => write!(f, "focus"),
        }
    }
}

/// Network response filter: URL substring plus optional HTTP method
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseMatcher {
    pub url_contains: String,
    #[serde(default)]
    pub method: Option<String>,
}

impl ResponseMatcher {
    pub fn new(url_contains: impl Into<String>) -> Self {
        Self {
            url_contains: url_contains.into(),
            method: None,
        }
    }

    pub fn method(mut self, method: &str) -> Self {
        self.method = Some(method.to_uppercase());
        self
    }

    pub fn matches(&self, url: &str, method: &str) -> bool {
        url.contains(&self.url_contains)
            && self
                .method
                .as_deref()
                .map(|m| m.eq_ignore_ascii_case(method))
                .unwrap_or(true)
    }
}

impl std::fmt::Display for ResponseMatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.method {
            Some(m) => write!(f, "{} *{}*", m, self.url_contains),
            None => write!(f, "*{}*", self.url_contains),
        }
    }
}

/// Handle for a response wait armed before the triggering action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseWaiter(pub u64);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseInfo {
    pub url: String,
    pub method: String,
    pub status: u16,
}

impl ResponseInfo {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// What to do with the next native `alert`/`confirm` dialog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DialogAction {
    Accept,
    Dismiss,
}

/// Minimal browser capability surface required by the page objects.
///
/// Query methods (`count`, `is_visible`, ...) answer immediately. Actions
/// go through [`Driver::perform`], which auto-waits for the element up to
/// `timeout` the way Playwright actions do. Waiting for *conditions* is
/// done by the callers, see [`crate::expect`].
#[async_trait]
pub trait Driver: Send + Sync {
    async fn goto(&self, url: &str, wait_until: LoadState) -> E2eResult<()>;

    async fn current_url(&self) -> E2eResult<String>;

    async fn title(&self) -> E2eResult<String>;

    async fn wait_for_load_state(&self, state: LoadState, timeout: Duration) -> E2eResult<()>;

    async fn count(&self, selector: &Selector) -> E2eResult<usize>;

    async fn is_visible(&self, selector: &Selector) -> E2eResult<bool>;

    async fn is_checked(&self, selector: &Selector) -> E2eResult<bool>;

    async fn text_content(&self, selector: &Selector) -> E2eResult<Option<String>>;

    async fn input_value(&self, selector: &Selector) -> E2eResult<String>;

    async fn get_attribute(&self, selector: &Selector, name: &str) -> E2eResult<Option<String>>;

    async fn perform(
        &self,
        selector: &Selector,
        action: &ElementAction,
        timeout: Duration,
    ) -> E2eResult<()>;

    /// Keyboard press on whatever has focus
    async fn press_key(&self, key: &str) -> E2eResult<()>;

    /// Start listening for a response before triggering it
    async fn arm_response(&self, matcher: &ResponseMatcher) -> E2eResult<ResponseWaiter>;

    async fn await_response(
        &self,
        waiter: ResponseWaiter,
        timeout: Duration,
    ) -> E2eResult<ResponseInfo>;

    /// Drop an armed waiter whose triggering action never ran
    async fn disarm_response(&self, waiter: ResponseWaiter) -> E2eResult<()>;

    /// Register a single-use handler for the next native dialog
    async fn handle_next_dialog(&self, action: DialogAction) -> E2eResult<()>;

    async fn screenshot(&self, path: &Path, full_page: bool) -> E2eResult<()>;

    async fn close(&self) -> E2eResult<()>;
}

/// Opens one isolated browser session per scenario
#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn open(&self) -> E2eResult<std::sync::Arc<dyn Driver>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selector_display() {
        let sel = Selector::test_id("orders-table")
            .then(&Selector::role(AriaRole::Row))
            .has_text("buyer@example.com")
            .first();
        assert_eq!(
            sel.to_string(),
            r#"testid=orders-table >> role=row >> has-text="buyer@example.com" >> nth=0"#
        );
    }

    #[test]
    fn test_selector_serializes_as_part_list() {
        let sel = Selector::role_named(AriaRole::Button, TextMatch::regex_ci("^save"));
        let json = serde_json::to_value(&sel).unwrap();
        assert_eq!(json[0]["kind"], "role");
        assert_eq!(json[0]["role"], "button");
        assert_eq!(json[0]["name"]["mode"], "pattern");
        assert_eq!(json[0]["name"]["flags"], "i");
    }

    #[test]
    fn test_text_match() {
        assert!(TextMatch::from("sign  IN").matches("Please Sign in now").unwrap());
        assert!(TextMatch::exact("Save").matches("  Save ").unwrap());
        assert!(!TextMatch::exact("Save").matches("Save changes").unwrap());
        assert!(TextMatch::regex_ci("^refund").matches("Refunded").unwrap());
        assert!(!TextMatch::regex("^refund").matches("Refunded").unwrap());
    }

    #[test]
    fn test_response_matcher() {
        let matcher = ResponseMatcher::new("/rest/v1/promo_codes").method("post");
        assert!(matcher.matches("https://x.supabase.co/rest/v1/promo_codes?select=*", "POST"));
        assert!(!matcher.matches("https://x.supabase.co/rest/v1/promo_codes", "GET"));
        assert!(ResponseMatcher::new("orders").matches("/api/orders", "DELETE"));
    }
}
