//! 設定ファイルから走査するデモ
//!
//! 実行方法:
//! ```
//! cargo run --example settings_run -- settings.json "li.item"
//! ```
//!
//! settings.json の例:
//! ```json
//! { "url": "https://example.com/list", "url_load": true, "scroll_max": -1, "collect_info": true }
//! ```

use std::fmt;

use async_trait::async_trait;
use scroll_processor::cdp::{CdpConfig, CdpDriver, CdpElement};
use scroll_processor::{
    Driver, HookContext, Hooks, Info, MatchState, PrintMode, Processor, ProcessorConfig,
    ProcessorError, ProcessorSettings, Round, Stage,
};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Default)]
struct TextInfo {
    state: MatchState,
    text: String,
}

impl fmt::Display for TextInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl Info for TextInfo {
    fn match_state(&self) -> &MatchState {
        &self.state
    }

    fn match_state_mut(&mut self) -> &mut MatchState {
        &mut self.state
    }
}

/// セレクタに一致する要素のテキストを集める
struct TextHooks {
    selector: String,
}

#[async_trait]
impl Hooks<CdpDriver> for TextHooks {
    type Info = TextInfo;

    async fn discover_elements(
        &mut self,
        ctx: &HookContext<'_, CdpDriver>,
        round: &mut Round<'_, CdpElement, TextInfo>,
    ) -> Result<(), ProcessorError> {
        let es = ctx
            .page
            .query_children(ctx.container, &self.selector)
            .await
            .map_err(|e| ProcessorError::from_driver(Stage::Discover, e))?;
        round
            .current
            .set_elements(if es.is_empty() { None } else { Some(es) });
        Ok(())
    }

    async fn extract_info(
        &mut self,
        ctx: &HookContext<'_, CdpDriver>,
        round: &mut Round<'_, CdpElement, TextInfo>,
    ) {
        let Some(element) = round.current.current_element.as_ref() else {
            return;
        };
        if let Ok(Some(text)) = ctx.page.text(element).await {
            round.current.current_info = Some(TextInfo {
                text: text.trim().to_string(),
                ..Default::default()
            });
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let path = args.next().expect("usage: settings_run <settings.json> <selector>");
    let selector = args.next().expect("usage: settings_run <settings.json> <selector>");

    let settings = ProcessorSettings::from_json(&std::fs::read_to_string(path)?)?;

    let driver = CdpDriver::launch(CdpConfig::default()).await?;
    let config = settings.apply_to(ProcessorConfig::new(driver));
    let mut processor = Processor::new(config, TextHooks { selector })?;

    let result = processor.run().await;
    processor.info_list().log(PrintMode::All);
    if let Some(page) = processor.config().page.as_ref() {
        page.close().await?;
    }

    result?;
    Ok(())
}
