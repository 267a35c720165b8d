//! X.com フィード走査デモ
//!
//! 起動済みの Chrome (remote-debugging) のタブでタイムラインをスクロールし、
//! 投稿者と本文を一覧表示する。
//!
//! 実行方法:
//! ```
//! chromium --remote-debugging-port=9222
//! XFEED_WS_URL=ws://127.0.0.1:9222/devtools/browser/<id> cargo run --example x_feed
//! ```

use std::fmt;

use async_trait::async_trait;
use scroll_processor::cdp::{CdpConfig, CdpDriver, CdpElement};
use scroll_processor::{
    Driver, HookContext, Hooks, Info, MatchState, PrintMode, Processor, ProcessorConfig,
    ProcessorError, Round, Stage,
};
use serde::Serialize;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

/// 投稿
#[derive(Debug, Clone, Default, Serialize)]
struct FeedInfo {
    #[serde(skip)]
    state: MatchState,
    user: String,
    text: String,
}

impl fmt::Display for FeedInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.user, self.text)
    }
}

impl Info for FeedInfo {
    fn match_state(&self) -> &MatchState {
        &self.state
    }

    fn match_state_mut(&mut self) -> &mut MatchState {
        &mut self.state
    }
}

/// フィード用フック
struct FeedHooks {
    /// 本文にこの語を含む投稿を一致とする（空なら全件一致）
    keyword: String,
}

impl FeedHooks {
    async fn read_info(
        &self,
        page: &CdpDriver,
        element: &CdpElement,
    ) -> Result<FeedInfo, scroll_processor::DriverError> {
        let mut info = FeedInfo::default();

        // ユーザー名
        if let Some(name) = page.find_child(element, "[data-testid='User-Name']").await? {
            if let Some(link) = page.find_child(&name, "a").await? {
                info.user = page.text(&link).await?.unwrap_or_default();
            }
        }

        // 本文
        if let Some(text) = page.find_child(element, "[data-testid='tweetText']").await? {
            info.text = page.text(&text).await?.unwrap_or_default();
        }

        Ok(info)
    }
}

#[async_trait]
impl Hooks<CdpDriver> for FeedHooks {
    type Info = FeedInfo;

    async fn discover_elements(
        &mut self,
        ctx: &HookContext<'_, CdpDriver>,
        round: &mut Round<'_, CdpElement, FeedInfo>,
    ) -> Result<(), ProcessorError> {
        let es = ctx
            .page
            .query_children(ctx.container, "article")
            .await
            .map_err(|e| ProcessorError::from_driver(Stage::Discover, e))?;
        round.current.set_elements(Some(es));
        Ok(())
    }

    async fn extract_info(
        &mut self,
        ctx: &HookContext<'_, CdpDriver>,
        round: &mut Round<'_, CdpElement, FeedInfo>,
    ) {
        let Some(element) = round.current.current_element.as_ref() else {
            return;
        };
        match self.read_info(ctx.page, element).await {
            Ok(info) => {
                debug!("info: {}", serde_json::to_string(&info).unwrap_or_default());
                round.current.current_info = Some(info);
            }
            Err(e) => {
                warn!(index = round.current.current_index, "skip article: {}", e);
            }
        }
    }

    fn classify_match(
        &mut self,
        _ctx: &HookContext<'_, CdpDriver>,
        round: &mut Round<'_, CdpElement, FeedInfo>,
    ) {
        let matched = self.keyword.is_empty()
            || round
                .current
                .current_info
                .as_ref()
                .is_some_and(|i| i.text.contains(&self.keyword));
        round.current.current_matched = matched;
        round.current.current_matched_reason = if matched && !self.keyword.is_empty() {
            format!("contains '{}'", self.keyword)
        } else {
            String::new()
        };
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // ログ設定
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let ws_url = std::env::var("XFEED_WS_URL").expect("XFEED_WS_URL not set");
    let keyword = std::env::var("XFEED_KEYWORD").unwrap_or_default();

    let driver = CdpDriver::connect(&ws_url, CdpConfig::default()).await?;

    let config = ProcessorConfig::new(driver)
        .with_url("https://x.com/home")
        .with_scroll_max(5)
        .with_collect_info(true);

    let mut processor = Processor::new(config, FeedHooks { keyword })?;
    let result = processor.run().await;

    println!("=== X Feed ===");
    processor.info_list().log(PrintMode::All);
    println!(
        "rounds: {}, records: {}",
        processor.stats().rounds,
        processor.results().len()
    );

    result?;
    Ok(())
}
