//! 走査ループの拡張ポイント
//!
//! [`Hooks`] の各メソッドは既定の実装を持ち、必要なものだけ上書きする。
//! 呼び出し順（ラウンド / 要素ごと）:
//!
//! 1. `load_page`
//! 2. `resolve_container`
//! 3. `discover_elements`: **要上書き**
//! 4. `extract_info`: **要上書き**
//! 5. `classify_match`
//! 6. `on_matched` / `on_unmatched`
//! 7. `on_element_processed`
//! 8. `is_scroll_anchor`
//! 9. `on_element_round_end`
//! 10. `compute_continue_scroll`
//! 11. `on_round_end`
//! 12. `should_start_next_round`
//!
//! フック同士は [`Round`] の `current` に書き込むことで値を受け渡す。

use async_trait::async_trait;
use tracing::{debug, trace};

use crate::config::ProcessorConfig;
use crate::error::{ProcessorError, Stage};
use crate::info::Info;
use crate::traits::Driver;

use super::state::Round;

/// フックから参照できる実行環境
pub struct HookContext<'a, D: Driver> {
    pub page: &'a D,
    pub config: &'a ProcessorConfig<D>,
    /// `resolve_container` の結果。それ以前のフックでは `None`
    pub container: Option<&'a D::Element>,
}

impl<'a, D: Driver> HookContext<'a, D> {
    pub fn new(page: &'a D, config: &'a ProcessorConfig<D>) -> Self {
        Self {
            page,
            config,
            container: None,
        }
    }

    pub fn with_container(mut self, container: Option<&'a D::Element>) -> Self {
        self.container = container;
        self
    }
}

#[async_trait]
pub trait Hooks<D: Driver>: Send {
    /// 抽出レコードの型
    type Info: Info;

    /// `url` を読み込む
    ///
    /// 失敗するとエンジンはどの発見処理も行わずに終了する。
    async fn load_page(&mut self, ctx: &HookContext<'_, D>) -> Result<(), ProcessorError> {
        load_page(ctx).await
    }

    /// 発見処理の範囲となる要素を返す
    ///
    /// 既定は設定の `container`。
    async fn resolve_container(
        &mut self,
        ctx: &HookContext<'_, D>,
    ) -> Result<Option<D::Element>, ProcessorError> {
        trace!("resolve_container(base): return configured container");
        Ok(ctx.config.container.clone())
    }

    /// `round.current.elements` を設定する
    ///
    /// 既定は何もしない（発見要素なし）。
    async fn discover_elements(
        &mut self,
        _ctx: &HookContext<'_, D>,
        _round: &mut Round<'_, D::Element, Self::Info>,
    ) -> Result<(), ProcessorError> {
        trace!("discover_elements(base): do nothing");
        Ok(())
    }

    /// `round.current.current_element` から `round.current.current_info` を作る
    ///
    /// 抽出に失敗した要素はレコード無しにする。エラーは返さない。
    async fn extract_info(
        &mut self,
        _ctx: &HookContext<'_, D>,
        _round: &mut Round<'_, D::Element, Self::Info>,
    ) {
        trace!("extract_info(base): do nothing");
    }

    /// `current_matched` / `current_matched_reason` を設定する
    ///
    /// 既定は常に一致、理由は空。
    fn classify_match(
        &mut self,
        _ctx: &HookContext<'_, D>,
        round: &mut Round<'_, D::Element, Self::Info>,
    ) {
        trace!("classify_match(base): matched");
        round.current.current_matched = true;
        round.current.current_matched_reason.clear();
    }

    async fn on_matched(
        &mut self,
        _ctx: &HookContext<'_, D>,
        _round: &mut Round<'_, D::Element, Self::Info>,
    ) -> Result<(), ProcessorError> {
        trace!("on_matched(base): do nothing");
        Ok(())
    }

    async fn on_unmatched(
        &mut self,
        _ctx: &HookContext<'_, D>,
        _round: &mut Round<'_, D::Element, Self::Info>,
    ) -> Result<(), ProcessorError> {
        trace!("on_unmatched(base): do nothing");
        Ok(())
    }

    /// 一致・不一致に関係なく要素ごとに呼ばれる
    async fn on_element_processed(
        &mut self,
        _ctx: &HookContext<'_, D>,
        _round: &mut Round<'_, D::Element, Self::Info>,
    ) -> Result<(), ProcessorError> {
        trace!("on_element_processed(base): do nothing");
        Ok(())
    }

    /// 処理中の要素を次のスクロール対象にするか
    fn is_scroll_anchor(
        &mut self,
        _ctx: &HookContext<'_, D>,
        _round: &Round<'_, D::Element, Self::Info>,
    ) -> bool {
        trace!("is_scroll_anchor(base): true");
        true
    }

    async fn on_element_round_end(
        &mut self,
        _ctx: &HookContext<'_, D>,
        _round: &mut Round<'_, D::Element, Self::Info>,
    ) -> Result<(), ProcessorError> {
        trace!("on_element_round_end(base): do nothing");
        Ok(())
    }

    /// `round.current.continue_scroll` を設定する
    ///
    /// 表示中の要素がスクロールと同時に削除されるリストでは既定の判定は誤ることがある。
    /// その場合はこのフックを上書きする。
    fn compute_continue_scroll(
        &mut self,
        ctx: &HookContext<'_, D>,
        round: &mut Round<'_, D::Element, Self::Info>,
    ) {
        round.current.continue_scroll = continue_scroll(ctx.page, round);
    }

    async fn on_round_end(
        &mut self,
        _ctx: &HookContext<'_, D>,
        _round: &mut Round<'_, D::Element, Self::Info>,
    ) -> Result<(), ProcessorError> {
        trace!("on_round_end(base): do nothing");
        Ok(())
    }

    /// 次のラウンドを開始するか
    fn should_start_next_round(
        &mut self,
        ctx: &HookContext<'_, D>,
        round: &Round<'_, D::Element, Self::Info>,
    ) -> bool {
        let next = within_budget(
            round.current.continue_scroll,
            round.current.round_number,
            ctx.config.scroll_max,
        );
        trace!(
            state = %serde_json::to_string(&round.current.summary()).unwrap_or_default(),
            scroll_max = ctx.config.scroll_max,
            next,
            "should_start_next_round(base)"
        );
        next
    }
}

/// 既定のページ読み込み
pub async fn load_page<D: Driver>(ctx: &HookContext<'_, D>) -> Result<(), ProcessorError> {
    if !ctx.config.url_load {
        trace!("load_page(base): url_load disabled");
        return Ok(());
    }

    debug!("load_page(base): url={}", ctx.config.url);
    ctx.page
        .navigate(&ctx.config.url)
        .await
        .map_err(|e| ProcessorError::from_driver(Stage::LoadPage, e))?;
    ctx.page
        .wait_stable()
        .await
        .map_err(|e| ProcessorError::from_driver(Stage::LoadPage, e))?;
    debug!("load_page(base): page stable");

    Ok(())
}

/// 既定のスクロール継続判定
///
/// 次のどちらかで停止する:
/// - このラウンドにスクロール対象が無い
/// - スクロール対象が前のラウンドと同一（スクロールしても進まなかった）
///
/// 同一性は [`Driver::identity`] で比較する。
pub fn continue_scroll<D: Driver, I>(page: &D, round: &Round<'_, D::Element, I>) -> bool {
    let Some(anchor) = round.current.scrollable_element.as_ref() else {
        debug!(round = round.current.round_number, "no scroll anchor, stop scrolling");
        return false;
    };

    if let Some(previous) = round.previous.scrollable_element.as_ref() {
        let id = page.identity(anchor);
        if page.identity(previous) == id {
            debug!(
                round = round.current.round_number,
                anchor = %id,
                "scroll anchor unchanged, stop scrolling"
            );
            return false;
        }
    }

    round.current.continue_scroll
}

/// スクロール回数の上限判定。`scroll_max` が負数なら無制限
pub fn within_budget(continue_scroll: bool, round_number: u64, scroll_max: i64) -> bool {
    continue_scroll && (scroll_max < 0 || round_number < scroll_max as u64)
}
