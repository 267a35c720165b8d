use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::sync::Mutex;
use tower::Service;
use tracing::info;

use crate::config::ProcessorConfig;
use crate::error::ProcessorError;
use crate::processor::{Hooks, Processor, RunStats};
use crate::traits::Driver;

/// 走査リクエスト
#[derive(Debug, Clone, Default)]
pub struct ScrollRequest {
    /// 読み込むURL。`None` なら現在のページをそのまま走査
    pub url: Option<String>,
    pub scroll_max: i64,
}

impl ScrollRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_scroll_max(mut self, scroll_max: i64) -> Self {
        self.scroll_max = scroll_max;
        self
    }
}

/// 走査結果
///
/// 途中で失敗した場合も、それまでのレコードを `error` と一緒に返す。
#[derive(Debug, Clone)]
pub struct ScrollOutcome<I> {
    pub records: Vec<I>,
    pub stats: RunStats,
    pub error: Option<ProcessorError>,
}

impl<I> ScrollOutcome<I> {
    pub fn is_complete(&self) -> bool {
        self.error.is_none()
    }
}

/// tower::Serviceを実装した走査サービス
///
/// リクエストごとに `make_hooks` でフックを作り、新しいエンジンで走査する。
/// ページはクローンを含む全リクエストで共有するため、走査は1件ずつ順番に行う。
pub struct ScrollService<D: Driver, F> {
    page: Arc<D>,
    container: Option<D::Element>,
    make_hooks: Arc<F>,
    /// ページ単位の走査ロック
    running: Arc<Mutex<()>>,
}

impl<D: Driver, F> Clone for ScrollService<D, F> {
    fn clone(&self) -> Self {
        Self {
            page: Arc::clone(&self.page),
            container: self.container.clone(),
            make_hooks: Arc::clone(&self.make_hooks),
            running: Arc::clone(&self.running),
        }
    }
}

impl<D: Driver, F> ScrollService<D, F> {
    pub fn new(page: Arc<D>, make_hooks: F) -> Self {
        Self {
            page,
            container: None,
            make_hooks: Arc::new(make_hooks),
            running: Arc::new(Mutex::new(())),
        }
    }

    pub fn with_container(mut self, container: D::Element) -> Self {
        self.container = Some(container);
        self
    }
}

impl<D, H, F> Service<ScrollRequest> for ScrollService<D, F>
where
    D: Driver,
    H: Hooks<D> + 'static,
    F: Fn() -> H + Send + Sync + 'static,
{
    type Response = ScrollOutcome<H::Info>;
    type Error = ProcessorError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: ScrollRequest) -> Self::Future {
        info!(
            "scroll request received: url={:?}, scroll_max={}",
            req.url, req.scroll_max
        );

        let mut config = ProcessorConfig::shared(Arc::clone(&self.page))
            .with_scroll_max(req.scroll_max)
            .with_collect_info(true);
        if let Some(url) = req.url {
            config = config.with_url(url);
        }
        if let Some(container) = &self.container {
            config = config.with_container(container.clone());
        }
        let hooks = (*self.make_hooks)();
        let running = Arc::clone(&self.running);

        Box::pin(async move {
            let mut processor = Processor::new(config, hooks)?;

            // 同じページを使う走査が終わるまで待つ
            let guard = running.lock_owned().await;
            // 失敗してもレコードは返す
            let result = processor.run().await;
            drop(guard);
            let stats = processor.stats().clone();
            let records = processor.into_results().into_vec();

            info!(
                "scroll request done: records={}, rounds={}, failed={}",
                records.len(),
                stats.rounds,
                result.is_err()
            );

            Ok(ScrollOutcome {
                records,
                stats,
                error: result.err(),
            })
        })
    }
}
