use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::element::Element;
use chromiumoxide::Page;
use futures::StreamExt;
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::error::DriverError;
use crate::traits::{Driver, ElementId};

/// DOM安定判定のインターバル（ミリ秒）
const STABLE_CHECK_INTERVAL_MS: u64 = 300;
/// 連続してHTML長が変わらなければ安定とみなす回数
const REQUIRED_STABLE_CHECKS: u32 = 3;
/// DOM安定待機のタイムアウト（ミリ秒）
const STABLE_TIMEOUT_MS: u64 = 10000;

/// chromiumoxide ドライバ設定
#[derive(Debug, Clone)]
pub struct CdpConfig {
    pub headless: bool,
    pub window_size: (u32, u32),
    /// Chrome 実行ファイル。`None` なら `CHROME_PATH` / `CHROMIUM_PATH` を参照
    pub chrome_path: Option<PathBuf>,
    pub request_timeout: Duration,
    pub stable_interval: Duration,
    pub stable_checks: u32,
    pub stable_timeout: Duration,
}

impl Default for CdpConfig {
    fn default() -> Self {
        Self {
            headless: true,
            window_size: (1280, 800),
            chrome_path: None,
            request_timeout: Duration::from_secs(60),
            stable_interval: Duration::from_millis(STABLE_CHECK_INTERVAL_MS),
            stable_checks: REQUIRED_STABLE_CHECKS,
            stable_timeout: Duration::from_millis(STABLE_TIMEOUT_MS),
        }
    }
}

impl CdpConfig {
    pub fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    pub fn with_chrome_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.chrome_path = Some(path.into());
        self
    }

    pub fn with_stable_timeout(mut self, timeout: Duration) -> Self {
        self.stable_timeout = timeout;
        self
    }

    fn resolve_chrome_path(&self) -> Option<PathBuf> {
        self.chrome_path.clone().or_else(|| {
            std::env::var("CHROME_PATH")
                .or_else(|_| std::env::var("CHROMIUM_PATH"))
                .ok()
                .map(PathBuf::from)
        })
    }
}

/// DOM安定判定の状態
#[derive(Debug)]
struct StableTracker {
    required: u32,
    last_html_len: Option<usize>,
    stable_count: u32,
    last_error: Option<String>,
}

impl StableTracker {
    fn new(required: u32) -> Self {
        Self {
            required,
            last_html_len: None,
            stable_count: 0,
            last_error: None,
        }
    }

    /// 1回分の確認結果を反映し、安定したら `true`
    fn observe(&mut self, result: Result<usize, String>) -> bool {
        match result {
            Ok(current_len) => {
                self.last_error = None;
                match self.last_html_len {
                    Some(last) if last == current_len => self.stable_count += 1,
                    _ => self.stable_count = 0,
                }
                self.last_html_len = Some(current_len);
                self.stable_count >= self.required
            }
            Err(e) => {
                debug!("Page stable check error: {}", e);
                self.stable_count = 0;
                self.last_error = Some(e);
                false
            }
        }
    }

    fn timed_out(self, elapsed: Duration) -> Result<(), DriverError> {
        if let Some(e) = self.last_error {
            return Err(DriverError::Wait(format!(
                "page not responding after {:?}: {}",
                elapsed, e
            )));
        }
        warn!("Page stable timeout after {:?}, proceeding anyway", elapsed);
        Ok(())
    }
}

/// chromiumoxide の要素ハンドル
#[derive(Clone)]
pub struct CdpElement {
    inner: Arc<Element>,
}

impl CdpElement {
    pub fn new(element: Element) -> Self {
        Self {
            inner: Arc::new(element),
        }
    }

    pub fn element(&self) -> &Element {
        &self.inner
    }
}

impl fmt::Debug for CdpElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CdpElement")
            .field("backend_node_id", self.inner.backend_node_id.inner())
            .finish()
    }
}

/// Chrome DevTools Protocol 経由のドライバ
pub struct CdpDriver {
    config: CdpConfig,
    browser: Mutex<Option<Browser>>,
    page: Arc<Page>,
}

impl CdpDriver {
    /// ブラウザを起動して空のページを開く
    pub async fn launch(config: CdpConfig) -> Result<Self, DriverError> {
        info!("Launching browser...");

        let mut builder = BrowserConfig::builder()
            .window_size(config.window_size.0, config.window_size.1)
            .request_timeout(config.request_timeout)
            .no_sandbox()
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-dev-shm-usage");

        if let Some(path) = config.resolve_chrome_path() {
            builder = builder.chrome_executable(path);
        }
        if !config.headless {
            builder = builder.with_head();
        }

        let browser_config = builder
            .build()
            .map_err(|e| DriverError::Browser(format!("browser config: {}", e)))?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| DriverError::Browser(e.to_string()))?;

        // ブラウザイベントハンドラをバックグラウンドで実行
        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                debug!("Browser event: {:?}", event);
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| DriverError::Browser(e.to_string()))?;

        info!("Browser launched");
        Ok(Self {
            config,
            browser: Mutex::new(Some(browser)),
            page: Arc::new(page),
        })
    }

    /// 起動済みのブラウザ（DevTools WebSocket URL）に接続し、最初のタブを使う
    pub async fn connect(ws_url: &str, config: CdpConfig) -> Result<Self, DriverError> {
        info!("Connecting to browser: {}", ws_url);

        let (browser, mut handler) = Browser::connect(ws_url)
            .await
            .map_err(|e| DriverError::Browser(e.to_string()))?;

        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                debug!("Browser event: {:?}", event);
            }
        });

        let pages = browser
            .pages()
            .await
            .map_err(|e| DriverError::Browser(e.to_string()))?;
        let page = match pages.into_iter().next() {
            Some(page) => page,
            None => browser
                .new_page("about:blank")
                .await
                .map_err(|e| DriverError::Browser(e.to_string()))?,
        };

        Ok(Self {
            config,
            browser: Mutex::new(Some(browser)),
            page: Arc::new(page),
        })
    }

    /// 既存のページを使う（ブラウザの寿命は呼び出し側が管理する）
    pub fn from_page(page: Arc<Page>, config: CdpConfig) -> Self {
        Self {
            config,
            browser: Mutex::new(None),
            page,
        }
    }

    pub fn page(&self) -> &Arc<Page> {
        &self.page
    }

    /// ブラウザを終了（`from_page` で作った場合は何もしない）
    pub async fn close(&self) -> Result<(), DriverError> {
        if let Some(mut browser) = self.browser.lock().await.take() {
            info!("Closing browser...");
            browser
                .close()
                .await
                .map_err(|e| DriverError::Browser(e.to_string()))?;
            info!("Browser closed");
        }
        Ok(())
    }
}

#[async_trait]
impl Driver for CdpDriver {
    type Element = CdpElement;

    async fn navigate(&self, url: &str) -> Result<(), DriverError> {
        info!("Navigating to {}", url);
        self.page
            .goto(url)
            .await
            .map_err(|e| DriverError::Navigation(e.to_string()))?;
        self.page
            .wait_for_navigation()
            .await
            .map_err(|e| DriverError::Navigation(e.to_string()))?;
        Ok(())
    }

    /// HTMLの長さが一定回数連続で変わらなくなるまで待機
    ///
    /// 長さが落ち着かないままタイムアウトした場合は警告を出して続行する。
    /// 最後の確認自体が失敗していればページが応答していないのでエラーにする。
    async fn wait_stable(&self) -> Result<(), DriverError> {
        let start = Instant::now();
        let mut tracker = StableTracker::new(self.config.stable_checks);

        while start.elapsed() < self.config.stable_timeout {
            let result = self
                .page
                .evaluate("document.documentElement.outerHTML.length")
                .await
                .map(|val| val.into_value::<usize>().unwrap_or(0))
                .map_err(|e| e.to_string());

            if tracker.observe(result) {
                debug!(
                    "Page stable after {:?} ({} consecutive checks)",
                    start.elapsed(),
                    tracker.stable_count
                );
                return Ok(());
            }

            sleep(self.config.stable_interval).await;
        }

        tracker.timed_out(start.elapsed())
    }

    async fn query_children(
        &self,
        scope: Option<&CdpElement>,
        selector: &str,
    ) -> Result<Vec<CdpElement>, DriverError> {
        let elements = match scope {
            Some(scope) => scope.inner.find_elements(selector).await,
            None => self.page.find_elements(selector).await,
        }
        .map_err(|e| DriverError::Query(format!("{}: {}", selector, e)))?;

        Ok(elements.into_iter().map(CdpElement::new).collect())
    }

    async fn scroll_into_view(&self, element: &CdpElement) -> Result<(), DriverError> {
        element
            .inner
            .scroll_into_view()
            .await
            .map_err(|e| DriverError::Scroll(e.to_string()))?;
        Ok(())
    }

    /// バックエンドノードIDはクエリをまたいでも同じDOMノードで一致する
    fn identity(&self, element: &CdpElement) -> ElementId {
        ElementId::from(*element.inner.backend_node_id.inner())
    }

    async fn text(&self, element: &CdpElement) -> Result<Option<String>, DriverError> {
        element
            .inner
            .inner_text()
            .await
            .map_err(|e| DriverError::Extraction(e.to_string()))
    }

    async fn attribute(
        &self,
        element: &CdpElement,
        name: &str,
    ) -> Result<Option<String>, DriverError> {
        element
            .inner
            .attribute(name)
            .await
            .map_err(|e| DriverError::Extraction(format!("{}: {}", name, e)))
    }
}
