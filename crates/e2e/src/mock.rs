//! In-memory scripted browser
//!
//! [`MockDriver`] stands in for a real browser when testing page objects
//! offline. Elements are registered under the exact [`Selector`] a page
//! object uses, usually by asking the page object for its locator. Click,
//! key press and navigation handlers mutate the fake page the way the real
//! app would respond. Timers fire on the tokio clock, so tests running
//! with a paused clock step through delayed UI changes deterministically.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::driver::{
    DialogAction, Driver, ElementAction, LoadState, ResponseInfo, ResponseMatcher,
    ResponseWaiter, Selector, SelectorPart, SessionFactory,
};
use crate::error::{E2eError, E2eResult};
use crate::expect::poll_for;

pub type Handler = Arc<dyn Fn(&mut MockState) + Send + Sync>;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MockElement {
    pub text: String,
    pub visible: bool,
    pub value: String,
    pub checked: bool,
    pub attributes: HashMap<String, String>,
}

impl MockElement {
    pub fn visible(text: &str) -> Self {
        Self {
            text: text.to_string(),
            visible: true,
            ..Default::default()
        }
    }

    pub fn hidden(text: &str) -> Self {
        Self {
            text: text.to_string(),
            visible: false,
            ..Default::default()
        }
    }
}

/// Mutable fake page, handed to handlers
pub struct MockState {
    url: String,
    title: String,
    elements: HashMap<String, MockElement>,
    handlers: HashMap<String, Handler>,
    routes: HashMap<String, Handler>,
    timers: Vec<(Instant, Handler)>,
    responses: Vec<ResponseInfo>,
    waiters: HashMap<u64, (ResponseMatcher, usize)>,
    next_waiter: u64,
    pending_dialog: Option<DialogAction>,
    actions: Vec<(String, ElementAction)>,
    visits: Vec<String>,
    screenshots: Vec<PathBuf>,
}

fn key(selector: &Selector) -> String {
    selector.to_string()
}

fn handler_key(selector: &Selector, trigger: &str) -> String {
    format!("{}#{}", key(selector), trigger)
}

fn path_of(url: &str) -> String {
    match reqwest::Url::parse(url) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => url.split('?').next().unwrap_or(url).to_string(),
    }
}

impl MockState {
    fn new() -> Self {
        Self {
            url: "about:blank".to_string(),
            title: String::new(),
            elements: HashMap::new(),
            handlers: HashMap::new(),
            routes: HashMap::new(),
            timers: Vec::new(),
            responses: Vec::new(),
            waiters: HashMap::new(),
            next_waiter: 1,
            pending_dialog: None,
            actions: Vec::new(),
            visits: Vec::new(),
            screenshots: Vec::new(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn set_url(&mut self, url: &str) {
        self.url = url.to_string();
    }

    pub fn set_title(&mut self, title: &str) {
        self.title = title.to_string();
    }

    pub fn insert(&mut self, selector: &Selector, element: MockElement) {
        self.elements.insert(key(selector), element);
    }

    pub fn show(&mut self, selector: &Selector, text: &str) {
        self.insert(selector, MockElement::visible(text));
    }

    pub fn hide(&mut self, selector: &Selector) {
        if let Some(el) = self.lookup_mut(selector) {
            el.visible = false;
        }
    }

    pub fn remove(&mut self, selector: &Selector) {
        let k = self.resolve_key(selector);
        if let Some(k) = k {
            self.elements.remove(&k);
        }
    }

    pub fn set_text(&mut self, selector: &Selector, text: &str) {
        match self.lookup_mut(selector) {
            Some(el) => el.text = text.to_string(),
            None => self.show(selector, text),
        }
    }

    pub fn element(&self, selector: &Selector) -> Option<&MockElement> {
        self.resolve_key(selector).and_then(|k| self.elements.get(&k))
    }

    /// Current value of an input, as typed by the page object
    pub fn value_of(&self, selector: &Selector) -> Option<String> {
        self.element(selector).map(|el| el.value.clone())
    }

    pub fn push_response(&mut self, url: &str, method: &str, status: u16) {
        self.responses.push(ResponseInfo {
            url: url.to_string(),
            method: method.to_uppercase(),
            status,
        });
    }

    /// Consume the armed dialog handler. Without one the dialog is
    /// dismissed, as a real browser would do.
    pub fn take_dialog(&mut self) -> DialogAction {
        self.pending_dialog.take().unwrap_or(DialogAction::Dismiss)
    }

    /// Run `handler` once `delay` has passed on the tokio clock
    pub fn after(&mut self, delay: Duration, handler: impl Fn(&mut MockState) + Send + Sync + 'static) {
        self.timers.push((Instant::now() + delay, Arc::new(handler)));
    }

    fn resolve_key(&self, selector: &Selector) -> Option<String> {
        let exact = key(selector);
        if self.elements.contains_key(&exact) {
            return Some(exact);
        }
        // `.first()` on a registered locator resolves to the same element
        match selector.parts().last() {
            Some(SelectorPart::First) | Some(SelectorPart::Nth { index: 0 }) => {
                let stripped = exact.trim_end_matches(" >> nth=0").to_string();
                self.elements.contains_key(&stripped).then_some(stripped)
            }
            _ => None,
        }
    }

    fn lookup_mut(&mut self, selector: &Selector) -> Option<&mut MockElement> {
        let k = self.resolve_key(selector)?;
        self.elements.get_mut(&k)
    }
}

/// Scripted [`Driver`] for offline tests
pub struct MockDriver {
    state: Mutex<MockState>,
}

impl Default for MockDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDriver {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState::new()),
        }
    }

    pub fn with_state<R>(&self, f: impl FnOnce(&mut MockState) -> R) -> R {
        f(&mut self.state.lock())
    }

    pub fn insert(&self, selector: &Selector, element: MockElement) {
        self.state.lock().insert(selector, element);
    }

    pub fn show(&self, selector: &Selector, text: &str) {
        self.state.lock().show(selector, text);
    }

    pub fn on_click(&self, selector: &Selector, handler: impl Fn(&mut MockState) + Send + Sync + 'static) {
        self.state
            .lock()
            .handlers
            .insert(handler_key(selector, "click"), Arc::new(handler));
    }

    pub fn on_press(
        &self,
        selector: &Selector,
        key: &str,
        handler: impl Fn(&mut MockState) + Send + Sync + 'static,
    ) {
        self.state
            .lock()
            .handlers
            .insert(handler_key(selector, &format!("press:{}", key)), Arc::new(handler));
    }

    /// Run `handler` after every navigation to `path`
    pub fn on_navigate(&self, path: &str, handler: impl Fn(&mut MockState) + Send + Sync + 'static) {
        self.state
            .lock()
            .routes
            .insert(path.to_string(), Arc::new(handler));
    }

    pub fn url(&self) -> String {
        self.state.lock().url.clone()
    }

    pub fn set_url(&self, url: &str) {
        self.state.lock().set_url(url);
    }

    pub fn actions(&self) -> Vec<(String, ElementAction)> {
        self.state.lock().actions.clone()
    }

    pub fn visits(&self) -> Vec<String> {
        self.state.lock().visits.clone()
    }

    pub fn screenshots(&self) -> Vec<PathBuf> {
        self.state.lock().screenshots.clone()
    }

    /// Response waiters armed but not yet awaited or disarmed
    pub fn armed_waiters(&self) -> usize {
        self.state.lock().waiters.len()
    }

    pub fn clicked(&self, selector: &Selector) -> bool {
        let k = key(selector);
        self.state
            .lock()
            .actions
            .iter()
            .any(|(s, a)| *s == k && *a == ElementAction::Click)
    }

    /// Lock the state after firing any timers that are due
    fn tick(&self) -> parking_lot::MutexGuard<'_, MockState> {
        let mut state = self.state.lock();
        let now = Instant::now();
        let (due, pending): (Vec<_>, Vec<_>) =
            state.timers.drain(..).partition(|(at, _)| *at <= now);
        state.timers = pending;
        for (_, handler) in due {
            handler(&mut *state);
        }
        state
    }

    fn run_handler(state: &mut MockState, handler_key: &str) {
        if let Some(handler) = state.handlers.get(handler_key).cloned() {
            handler(state);
        }
    }
}

#[async_trait]
impl Driver for MockDriver {
    async fn goto(&self, url: &str, _wait_until: LoadState) -> E2eResult<()> {
        let mut state = self.tick();
        state.url = url.to_string();
        state.visits.push(url.to_string());
        if let Some(handler) = state.routes.get(&path_of(url)).cloned() {
            handler(&mut *state);
        }
        Ok(())
    }

    async fn current_url(&self) -> E2eResult<String> {
        Ok(self.tick().url.clone())
    }

    async fn title(&self) -> E2eResult<String> {
        Ok(self.tick().title.clone())
    }

    async fn wait_for_load_state(&self, _state: LoadState, _timeout: Duration) -> E2eResult<()> {
        drop(self.tick());
        Ok(())
    }

    async fn count(&self, selector: &Selector) -> E2eResult<usize> {
        Ok(self.tick().element(selector).map(|_| 1).unwrap_or(0))
    }

    async fn is_visible(&self, selector: &Selector) -> E2eResult<bool> {
        Ok(self
            .tick()
            .element(selector)
            .map(|el| el.visible)
            .unwrap_or(false))
    }

    async fn is_checked(&self, selector: &Selector) -> E2eResult<bool> {
        Ok(self
            .tick()
            .element(selector)
            .map(|el| el.checked)
            .unwrap_or(false))
    }

    async fn text_content(&self, selector: &Selector) -> E2eResult<Option<String>> {
        Ok(self.tick().element(selector).map(|el| el.text.clone()))
    }

    async fn input_value(&self, selector: &Selector) -> E2eResult<String> {
        self.tick()
            .value_of(selector)
            .ok_or_else(|| E2eError::ElementNotFound(selector.to_string()))
    }

    async fn get_attribute(&self, selector: &Selector, name: &str) -> E2eResult<Option<String>> {
        Ok(self
            .tick()
            .element(selector)
            .and_then(|el| el.attributes.get(name).cloned()))
    }

    async fn perform(
        &self,
        selector: &Selector,
        action: &ElementAction,
        timeout: Duration,
    ) -> E2eResult<()> {
        let mut state = self.tick();
        let actionable = state.element(selector).map(|el| el.visible).unwrap_or(false);
        if !actionable {
            return Err(E2eError::timeout(
                format!("{} to be actionable for {}", selector, action),
                timeout,
            ));
        }
        state.actions.push((key(selector), action.clone()));

        match action {
            ElementAction::Click => Self::run_handler(&mut state, &handler_key(selector, "click")),
            ElementAction::Fill { value } | ElementAction::SelectOption { value } => {
                if let Some(el) = state.lookup_mut(selector) {
                    el.value = value.clone();
                }
            }
            ElementAction::Clear => {
                if let Some(el) = state.lookup_mut(selector) {
                    el.value.clear();
                }
            }
            ElementAction::Check | ElementAction::Uncheck => {
                let checked = *action == ElementAction::Check;
                if let Some(el) = state.lookup_mut(selector) {
                    el.checked = checked;
                }
            }
            ElementAction::Press { key } => {
                Self::run_handler(&mut state, &handler_key(selector, &format!("press:{}", key)))
            }
            ElementAction::Hover | ElementAction::Focus => {}
        }
        Ok(())
    }

    async fn press_key(&self, key: &str) -> E2eResult<()> {
        self.tick()
            .actions
            .push(("keyboard".to_string(), ElementAction::Press { key: key.to_string() }));
        Ok(())
    }

    async fn arm_response(&self, matcher: &ResponseMatcher) -> E2eResult<ResponseWaiter> {
        let mut state = self.tick();
        let id = state.next_waiter;
        state.next_waiter += 1;
        let seen = state.responses.len();
        state.waiters.insert(id, (matcher.clone(), seen));
        Ok(ResponseWaiter(id))
    }

    async fn await_response(
        &self,
        waiter: ResponseWaiter,
        timeout: Duration,
    ) -> E2eResult<ResponseInfo> {
        let (matcher, seen) = self
            .tick()
            .waiters
            .remove(&waiter.0)
            .ok_or_else(|| E2eError::Driver(format!("no armed response waiter {}", waiter.0)))?;
        poll_for(&format!("response {}", matcher), timeout, || {
            let found = self.tick().responses[seen..]
                .iter()
                .find(|r| matcher.matches(&r.url, &r.method))
                .cloned();
            async move { Ok(found) }
        })
        .await
    }

    async fn disarm_response(&self, waiter: ResponseWaiter) -> E2eResult<()> {
        self.tick().waiters.remove(&waiter.0);
        Ok(())
    }

    async fn handle_next_dialog(&self, action: DialogAction) -> E2eResult<()> {
        self.tick().pending_dialog = Some(action);
        Ok(())
    }

    async fn screenshot(&self, path: &Path, _full_page: bool) -> E2eResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        image::RgbaImage::from_pixel(8, 8, image::Rgba([255, 255, 255, 255])).save(path)?;
        self.tick().screenshots.push(path.to_path_buf());
        Ok(())
    }

    async fn close(&self) -> E2eResult<()> {
        Ok(())
    }
}

/// Hands out a fresh [`MockDriver`] per session, scripted by `setup`
pub struct MockSessions {
    setup: Box<dyn Fn(&MockDriver) + Send + Sync>,
    opened: Mutex<Vec<Arc<MockDriver>>>,
}

impl MockSessions {
    pub fn new(setup: impl Fn(&MockDriver) + Send + Sync + 'static) -> Self {
        Self {
            setup: Box::new(setup),
            opened: Mutex::new(Vec::new()),
        }
    }

    /// Every driver opened so far, oldest first
    pub fn opened(&self) -> Vec<Arc<MockDriver>> {
        self.opened.lock().clone()
    }
}

#[async_trait]
impl SessionFactory for MockSessions {
    async fn open(&self) -> E2eResult<Arc<dyn Driver>> {
        let driver = Arc::new(MockDriver::new());
        (self.setup)(&driver);
        self.opened.lock().push(driver.clone());
        Ok(driver)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::AriaRole;

    #[tokio::test]
    async fn test_click_handler_mutates_page() {
        let mock = MockDriver::new();
        let button = Selector::role_named(AriaRole::Button, "Save");
        let toast = Selector::test_id("toast");
        mock.show(&button, "Save");
        mock.on_click(&button, {
            let toast = toast.clone();
            move |state| state.show(&toast, "Saved")
        });

        assert!(!mock.is_visible(&toast).await.unwrap());
        mock.perform(&button, &ElementAction::Click, Duration::from_secs(1))
            .await
            .unwrap();
        assert!(mock.is_visible(&toast).await.unwrap());
        assert!(mock.clicked(&button));
    }

    #[tokio::test]
    async fn test_hidden_element_is_not_actionable() {
        let mock = MockDriver::new();
        let button = Selector::test_id("ghost");
        mock.insert(&button, MockElement::hidden("Boo"));
        let err = mock
            .perform(&button, &ElementAction::Click, Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(err.is_timeout());
    }

    #[tokio::test]
    async fn test_first_resolves_registered_locator() {
        let mock = MockDriver::new();
        let row = Selector::role(AriaRole::Row).has_text("SAVE10");
        mock.show(&row, "SAVE10 25%");
        assert!(mock.is_visible(&row.first()).await.unwrap());
        assert_eq!(mock.count(&row.nth(1)).await.unwrap(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timers_fire_on_tokio_clock() {
        let mock = MockDriver::new();
        let badge = Selector::test_id("badge");
        mock.with_state(|s| {
            let badge = badge.clone();
            s.after(Duration::from_secs(2), move |s| s.show(&badge, "done"));
        });
        assert!(!mock.is_visible(&badge).await.unwrap());
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(mock.is_visible(&badge).await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_response_waiter_sees_only_later_responses() {
        let mock = MockDriver::new();
        mock.with_state(|s| s.push_response("/rest/v1/orders", "GET", 200));
        let waiter = mock
            .arm_response(&ResponseMatcher::new("/rest/v1/orders"))
            .await
            .unwrap();
        let err = mock
            .await_response(waiter, Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(mock.armed_waiters(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_response_waiter_sees_delayed_response() {
        let mock = MockDriver::new();
        let waiter = mock
            .arm_response(&ResponseMatcher::new("/rest/v1/orders").method("PATCH"))
            .await
            .unwrap();
        mock.with_state(|s| {
            s.after(Duration::from_secs(3), |s| {
                s.push_response("http://api/rest/v1/orders?id=eq.7", "PATCH", 204)
            })
        });

        let started = Instant::now();
        let response = mock
            .await_response(waiter, Duration::from_secs(10))
            .await
            .unwrap();
        assert_eq!(response.status, 204);
        assert!(started.elapsed() >= Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_response_timeout_takes_full_budget() {
        let mock = MockDriver::new();
        let waiter = mock
            .arm_response(&ResponseMatcher::new("/rest/v1/orders"))
            .await
            .unwrap();
        let started = Instant::now();
        let err = mock
            .await_response(waiter, Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(err.is_timeout());
        assert!(started.elapsed() >= Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_navigation_handler() {
        let mock = MockDriver::new();
        let heading = Selector::role(AriaRole::Heading);
        mock.on_navigate("/login", {
            let heading = heading.clone();
            move |s| s.show(&heading, "Sign in")
        });
        mock.goto("http://localhost:3000/login?next=/x", LoadState::Load)
            .await
            .unwrap();
        assert_eq!(mock.text_content(&heading).await.unwrap().as_deref(), Some("Sign in"));
        assert_eq!(mock.visits().len(), 1);
    }
}
