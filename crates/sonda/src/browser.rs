//! Browser control over the Chrome `DevTools` Protocol.
//!
//! [`BrowserConfig`] is always available so configuration files parse the
//! same with or without the `browser` feature. The feature adds
//! [`ChromiumDriver`] and [`ChromiumLauncher`], built on chromiumoxide.

use serde::{Deserialize, Serialize};

/// Browser configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// Run in headless mode
    pub headless: bool,
    /// Viewport width
    pub viewport_width: u32,
    /// Viewport height
    pub viewport_height: u32,
    /// Path to chromium binary (None = auto-detect)
    pub chromium_path: Option<String>,
    /// Sandbox mode (disable for containers)
    pub sandbox: bool,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            viewport_width: 1366,
            viewport_height: 768,
            chromium_path: None,
            sandbox: true,
        }
    }
}

impl BrowserConfig {
    /// Set viewport dimensions
    #[must_use]
    pub const fn with_viewport(mut self, width: u32, height: u32) -> Self {
        self.viewport_width = width;
        self.viewport_height = height;
        self
    }

    /// Set headless mode
    #[must_use]
    pub const fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    /// Set chromium path
    #[must_use]
    pub fn with_chromium_path(mut self, path: impl Into<String>) -> Self {
        self.chromium_path = Some(path.into());
        self
    }

    /// Disable sandbox (for containers/CI)
    #[must_use]
    pub const fn with_no_sandbox(mut self) -> Self {
        self.sandbox = false;
        self
    }
}

// ============================================================================
// Real CDP Implementation (when `browser` feature is enabled)
// ============================================================================

#[cfg(feature = "browser")]
#[allow(
    clippy::significant_drop_tightening,
    clippy::missing_errors_doc,
    clippy::items_after_statements
)]
mod cdp {
    use super::BrowserConfig;
    use crate::dialog::{Dialog, DialogHandler, DialogType};
    use crate::driver::{DriverLauncher, ElementHandle, ElementState, PageDriver};
    use crate::locator::Selector;
    use crate::result::{SondaError, SondaResult};
    use async_trait::async_trait;
    use chromiumoxide::browser::{Browser as CdpBrowser, BrowserConfig as CdpConfig};
    use chromiumoxide::cdp::browser_protocol::page::{
        CaptureScreenshotFormat, CaptureScreenshotParams, DialogType as CdpDialogType,
        EventJavascriptDialogOpening, HandleJavaScriptDialogParams,
    };
    use chromiumoxide::cdp::js_protocol::runtime::{
        CallArgument, CallFunctionOnParams, EvaluateParams, GetPropertiesParams,
        ReleaseObjectGroupParams, RemoteObjectId,
    };
    use chromiumoxide::error::CdpError;
    use chromiumoxide::page::Page as CdpPage;
    use futures::StreamExt;
    use serde_json::Value;
    use tokio::task::JoinHandle;
    use tracing::{debug, info, warn};

    /// Object group holding every node a query hands out; released on navigation
    const QUERY_GROUP: &str = "sonda-query";

    fn page_err(e: impl std::fmt::Display) -> SondaError {
        SondaError::page(e.to_string())
    }

    /// The remote object behind a handle no longer exists
    fn is_gone(message: &str) -> bool {
        message.contains("Could not find object") || message.contains("Cannot find context")
    }

    fn remote_id(handle: &ElementHandle) -> RemoteObjectId {
        RemoteObjectId::new(handle.id.clone())
    }

    /// Function run with the query root as `this`, answering an array of nodes
    /// or `null` when the root left the document
    fn query_function(selector: &Selector) -> String {
        format!(
            "function() {{ if (!this.isConnected) return null; return ({})(this); }}",
            selector.to_js()
        )
    }

    /// Function run with the handle's node as `this`; answers `stale` for a
    /// detached node, otherwise whatever `body` returns
    fn handle_function(params: &str, body: &str) -> String {
        format!(
            "function({params}) {{ if (!this.isConnected) return 'stale'; const el = this; {body} }}"
        )
    }

    /// Array entries in index order, as handles
    fn indexed_handles(
        entries: impl IntoIterator<Item = (String, Option<RemoteObjectId>)>,
    ) -> Vec<ElementHandle> {
        let mut indexed: Vec<(usize, RemoteObjectId)> = entries
            .into_iter()
            .filter_map(|(name, id)| Some((name.parse().ok()?, id?)))
            .collect();
        indexed.sort_by_key(|(index, _)| *index);
        indexed
            .into_iter()
            .map(|(_, id)| ElementHandle::new(id.inner().clone()))
            .collect()
    }

    const fn dialog_type(kind: &CdpDialogType) -> DialogType {
        match kind {
            CdpDialogType::Alert => DialogType::Alert,
            CdpDialogType::Confirm => DialogType::Confirm,
            CdpDialogType::Prompt => DialogType::Prompt,
            CdpDialogType::Beforeunload => DialogType::BeforeUnload,
        }
    }

    /// One Chromium page driven over CDP
    ///
    /// Element handles are CDP remote object ids. Nothing is written into the
    /// page to track them; a node that was re-rendered or detached reports
    /// [`SondaError::StaleElement`] through `isConnected`.
    #[derive(Debug)]
    pub struct ChromiumDriver {
        browser: CdpBrowser,
        page: CdpPage,
        dialogs: DialogHandler,
        handler_task: JoinHandle<()>,
        dialog_task: JoinHandle<()>,
        closed: bool,
    }

    impl ChromiumDriver {
        /// Launch a browser and open a blank page
        pub async fn launch(config: &BrowserConfig) -> SondaResult<Self> {
            let mut builder =
                CdpConfig::builder().window_size(config.viewport_width, config.viewport_height);

            if !config.headless {
                builder = builder.with_head();
            }

            if !config.sandbox {
                builder = builder.no_sandbox();
            }

            if let Some(ref path) = config.chromium_path {
                builder = builder.chrome_executable(path);
            }

            let cdp_config = builder
                .build()
                .map_err(|message| SondaError::BrowserLaunch { message })?;

            let (browser, mut handler) =
                CdpBrowser::launch(cdp_config)
                    .await
                    .map_err(|e| SondaError::BrowserLaunch {
                        message: e.to_string(),
                    })?;

            let handler_task = tokio::spawn(async move {
                while let Some(h) = handler.next().await {
                    if h.is_err() {
                        break;
                    }
                }
            });

            let page = browser.new_page("about:blank").await.map_err(page_err)?;

            let dialogs = DialogHandler::new();
            let mut events = page
                .event_listener::<EventJavascriptDialogOpening>()
                .await
                .map_err(page_err)?;
            let recorder = dialogs.clone();
            let dialog_task = tokio::spawn(async move {
                while let Some(event) = events.next().await {
                    recorder.record(
                        Dialog::new(dialog_type(&event.r#type), event.message.clone())
                            .with_default_value(event.default_prompt.clone()),
                    );
                }
            });

            info!(
                headless = config.headless,
                width = config.viewport_width,
                height = config.viewport_height,
                "chromium launched"
            );
            Ok(Self {
                browser,
                page,
                dialogs,
                handler_task,
                dialog_task,
                closed: false,
            })
        }

        /// Dialogs seen by this page
        #[must_use]
        pub fn dialogs(&self) -> &DialogHandler {
            &self.dialogs
        }

        /// Remote object for the current document
        async fn document(&self) -> SondaResult<RemoteObjectId> {
            let params = EvaluateParams::builder()
                .expression("document")
                .object_group(QUERY_GROUP)
                .build()
                .map_err(page_err)?;
            let response = self.page.execute(params).await.map_err(page_err)?;
            response
                .result
                .result
                .object_id
                .clone()
                .ok_or_else(|| SondaError::page("document has no remote object"))
        }

        /// Call `function` on the handle's node and return its JSON result
        async fn call_on(
            &self,
            handle: &ElementHandle,
            function: String,
            args: Vec<Value>,
        ) -> SondaResult<Value> {
            let params = CallFunctionOnParams::builder()
                .object_id(remote_id(handle))
                .function_declaration(function)
                .arguments(
                    args.into_iter()
                        .map(|value| CallArgument::builder().value(value).build())
                        .collect::<Vec<_>>(),
                )
                .return_by_value(true)
                .build()
                .map_err(page_err)?;
            let response = self.page.execute(params).await.map_err(|e| match e {
                CdpError::Chrome(ref err) if is_gone(&err.message) => SondaError::StaleElement {
                    handle: handle.id.clone(),
                },
                other => page_err(other),
            })?;
            if let Some(ref details) = response.result.exception_details {
                return Err(SondaError::Interaction {
                    query: handle.to_string(),
                    message: details.text.clone(),
                });
            }
            Ok(response.result.result.value.clone().unwrap_or(Value::Null))
        }

        /// Run a handle function that answers `ok`, `stale` or another failure word
        async fn act(
            &self,
            handle: &ElementHandle,
            action: &str,
            function: String,
            args: Vec<Value>,
        ) -> SondaResult<()> {
            let outcome = self.call_on(handle, function, args).await?;
            match outcome.as_str() {
                Some("ok") => Ok(()),
                Some("stale") => Err(SondaError::StaleElement {
                    handle: handle.id.clone(),
                }),
                other => Err(SondaError::Interaction {
                    query: handle.to_string(),
                    message: format!("{action} rejected: {}", other.unwrap_or("no answer")),
                }),
            }
        }
    }

    const SET_VALUE_JS: &str = "const proto = el instanceof HTMLTextAreaElement \
        ? HTMLTextAreaElement.prototype : HTMLInputElement.prototype; \
        const setter = Object.getOwnPropertyDescriptor(proto, 'value'); \
        if (setter && setter.set) { setter.set.call(el, next); } else { el.value = next; } \
        el.dispatchEvent(new Event('input', { bubbles: true })); \
        el.dispatchEvent(new Event('change', { bubbles: true })); \
        return 'ok';";

    const EDITABLE_JS: &str = "if (!('value' in el) || el.disabled || el.readOnly) \
        return 'not-editable'; el.focus();";

    const INSPECT_JS: &str = "function() { if (!this.isConnected) return null; const el = this; \
        const style = window.getComputedStyle(el); \
        const rect = el.getBoundingClientRect(); \
        let displayed = rect.width > 0 && rect.height > 0 \
          && style.visibility !== 'hidden' && style.display !== 'none'; \
        if (displayed && typeof el.checkVisibility === 'function') \
          displayed = el.checkVisibility({ visibilityProperty: true }); \
        let obscured = false; \
        if (displayed) { \
          const x = rect.left + rect.width / 2; const y = rect.top + rect.height / 2; \
          if (x >= 0 && y >= 0 && x <= window.innerWidth && y <= window.innerHeight) { \
            const top = document.elementFromPoint(x, y); \
            obscured = top !== null && top !== el && !el.contains(top); \
          } \
        } \
        const control = ['INPUT', 'TEXTAREA', 'SELECT'].includes(el.tagName); \
        return { displayed, enabled: !el.disabled, obscured, \
          text: displayed ? (el.innerText || '') : '', \
          value: control ? el.value : null }; }";

    #[async_trait]
    impl PageDriver for ChromiumDriver {
        async fn navigate(&mut self, url: &str) -> SondaResult<()> {
            debug!(url, "navigate");
            if let Err(e) = self
                .page
                .execute(ReleaseObjectGroupParams::new(QUERY_GROUP))
                .await
            {
                debug!(error = %e, "releasing queried nodes failed");
            }
            self.page
                .goto(url)
                .await
                .map_err(|e| SondaError::Navigation {
                    url: url.to_string(),
                    message: e.to_string(),
                })?;
            Ok(())
        }

        async fn query(
            &self,
            selector: &Selector,
            scope: Option<&ElementHandle>,
        ) -> SondaResult<Vec<ElementHandle>> {
            if let (Selector::Css(css), None) = (selector, scope) {
                return match self.page.find_elements(css.as_str()).await {
                    Ok(found) => Ok(found
                        .into_iter()
                        .map(|el| ElementHandle::new(el.remote_object_id.inner().clone()))
                        .collect()),
                    Err(e) => {
                        debug!(%selector, error = %e, "query found nothing");
                        Ok(Vec::new())
                    }
                };
            }

            let root = match scope {
                Some(scope) => remote_id(scope),
                None => self.document().await?,
            };
            let params = CallFunctionOnParams::builder()
                .object_id(root)
                .function_declaration(query_function(selector))
                .object_group(QUERY_GROUP)
                .build()
                .map_err(page_err)?;
            let response = self.page.execute(params).await;
            let array = match (response, scope) {
                (Ok(response), _) => response.result.result.object_id.clone(),
                (Err(CdpError::Chrome(ref err)), Some(_)) if is_gone(&err.message) => None,
                (Err(e), _) => return Err(page_err(e)),
            };
            let Some(array) = array else {
                return match scope {
                    Some(scope) => Err(SondaError::StaleElement {
                        handle: scope.id.clone(),
                    }),
                    None => Ok(Vec::new()),
                };
            };

            let params = GetPropertiesParams::builder()
                .object_id(array)
                .own_properties(true)
                .build()
                .map_err(page_err)?;
            let properties = self.page.execute(params).await.map_err(page_err)?;
            Ok(indexed_handles(properties.result.result.iter().map(|p| {
                (
                    p.name.clone(),
                    p.value.as_ref().and_then(|v| v.object_id.clone()),
                )
            })))
        }

        async fn inspect(&self, handle: &ElementHandle) -> SondaResult<Option<ElementState>> {
            match self.call_on(handle, INSPECT_JS.to_string(), Vec::new()).await {
                Ok(value) => Ok(serde_json::from_value(value)?),
                Err(SondaError::StaleElement { .. }) => Ok(None),
                Err(e) => Err(e),
            }
        }

        async fn click(&mut self, handle: &ElementHandle) -> SondaResult<()> {
            debug!(%handle, "click");
            // deferred so a confirm() opened by the handler cannot block this call
            let function = handle_function(
                "",
                "el.scrollIntoView({ block: 'center' }); setTimeout(() => el.click(), 0); return 'ok';",
            );
            self.act(handle, "click", function, Vec::new()).await
        }

        async fn send_keys(&mut self, handle: &ElementHandle, text: &str) -> SondaResult<()> {
            let function = handle_function(
                "text",
                &format!("{EDITABLE_JS} const next = (el.value || '') + text; {SET_VALUE_JS}"),
            );
            self.act(handle, "typing", function, vec![Value::from(text)])
                .await
        }

        async fn clear(&mut self, handle: &ElementHandle) -> SondaResult<()> {
            let function =
                handle_function("", &format!("{EDITABLE_JS} const next = ''; {SET_VALUE_JS}"));
            self.act(handle, "clear", function, Vec::new()).await
        }

        async fn pending_dialog(&self) -> SondaResult<Option<Dialog>> {
            Ok(self.dialogs.pending())
        }

        async fn resolve_dialog(&mut self, accept: bool) -> SondaResult<Dialog> {
            if !self.dialogs.has_pending() {
                return Err(SondaError::dialog("no dialog is open"));
            }
            self.page
                .execute(HandleJavaScriptDialogParams::new(accept))
                .await
                .map_err(|e| SondaError::dialog(e.to_string()))?;
            self.dialogs
                .resolve(accept)
                .ok_or_else(|| SondaError::dialog("dialog vanished before it was resolved"))
        }

        async fn current_url(&self) -> SondaResult<String> {
            Ok(self
                .page
                .url()
                .await
                .map_err(page_err)?
                .unwrap_or_else(|| "about:blank".to_string()))
        }

        async fn screenshot(&self) -> SondaResult<Vec<u8>> {
            let params = CaptureScreenshotParams::builder()
                .format(CaptureScreenshotFormat::Png)
                .build();

            let screenshot = self.page.execute(params).await.map_err(page_err)?;

            use base64::Engine;
            base64::engine::general_purpose::STANDARD
                .decode(&screenshot.data)
                .map_err(page_err)
        }

        async fn close(&mut self) -> SondaResult<()> {
            if self.closed {
                return Ok(());
            }
            self.closed = true;
            self.dialog_task.abort();
            let result = self.browser.close().await;
            if let Err(ref e) = result {
                warn!(error = %e, "browser close failed");
            }
            if let Err(e) = self.browser.wait().await {
                warn!(error = %e, "browser process did not exit cleanly");
            }
            self.handler_task.abort();
            result.map(|_| ()).map_err(|e| SondaError::BrowserLaunch {
                message: format!("close failed: {e}"),
            })
        }
    }

    /// Launches one Chromium per scenario
    #[derive(Debug, Clone, Default)]
    pub struct ChromiumLauncher {
        config: BrowserConfig,
    }

    impl ChromiumLauncher {
        /// Launcher for a browser configuration
        #[must_use]
        pub const fn new(config: BrowserConfig) -> Self {
            Self { config }
        }

        /// Browser configuration
        #[must_use]
        pub const fn config(&self) -> &BrowserConfig {
            &self.config
        }
    }

    #[async_trait]
    impl DriverLauncher for ChromiumLauncher {
        type Driver = ChromiumDriver;

        async fn launch(&self) -> SondaResult<ChromiumDriver> {
            ChromiumDriver::launch(&self.config).await
        }
    }

}

#[cfg(feature = "browser")]
pub use cdp::{ChromiumDriver, ChromiumLauncher};
