//! 無限スクロール走査エンジン

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info, trace};

use crate::config::ProcessorConfig;
use crate::error::{ProcessorError, Stage};
use crate::info::{Info, InfoList};
use crate::traits::Driver;

use super::hooks::{HookContext, Hooks};
use super::state::{Phase, Round, RunStats, State};

type RoundState<D, H> = State<<D as Driver>::Element, <H as Hooks<D>>::Info>;

/// 走査エンジン
///
/// スクロールで新しい要素を出現させ、前のラウンドから増えた要素だけを
/// フック経由で処理する。同一インスタンスで `run` を並行に呼ぶことはできない。
pub struct Processor<D: Driver, H: Hooks<D>> {
    config: ProcessorConfig<D>,
    page: Arc<D>,
    hooks: H,
    phase: Phase,
    previous: Option<RoundState<D, H>>,
    current: Option<RoundState<D, H>>,
    results: InfoList<H::Info>,
    stats: RunStats,
    error: Option<ProcessorError>,
}

impl<D: Driver, H: Hooks<D>> Processor<D, H> {
    /// 設定を検証してエンジンを作成
    pub fn new(config: ProcessorConfig<D>, hooks: H) -> Result<Self, ProcessorError> {
        let page = config
            .page
            .clone()
            .ok_or_else(|| ProcessorError::ConfigInvalid("page/tab cannot be empty".into()))?;

        if config.url_load && config.url.trim().is_empty() {
            return Err(ProcessorError::ConfigInvalid(
                "url_load is set but url is empty".into(),
            ));
        }

        trace!("Processor::new: done");
        Ok(Self {
            config,
            page,
            hooks,
            phase: Phase::Idle,
            previous: None,
            current: None,
            results: InfoList::new(),
            stats: RunStats::default(),
            error: None,
        })
    }

    pub fn config(&self) -> &ProcessorConfig<D> {
        &self.config
    }

    pub fn hooks(&self) -> &H {
        &self.hooks
    }

    pub fn hooks_mut(&mut self) -> &mut H {
        &mut self.hooks
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// 蓄積されたレコード（発見順）。`collect_info` が無効なら常に空
    pub fn results(&self) -> &[H::Info] {
        self.results.as_slice()
    }

    pub fn info_list(&self) -> &InfoList<H::Info> {
        &self.results
    }

    pub fn into_results(self) -> InfoList<H::Info> {
        self.results
    }

    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    pub fn error(&self) -> Option<&ProcessorError> {
        self.error.as_ref()
    }

    pub fn previous_round(&self) -> Option<&RoundState<D, H>> {
        self.previous.as_ref()
    }

    pub fn current_round(&self) -> Option<&RoundState<D, H>> {
        self.current.as_ref()
    }

    /// ページを処理する
    ///
    /// 失敗した場合も、それまでに蓄積したレコードは [`Processor::results`] に残る。
    /// エラーは戻り値と [`Processor::error`] の両方で参照できる。
    pub async fn run(&mut self) -> Result<(), ProcessorError> {
        self.previous = None;
        self.current = None;
        self.error = None;
        self.stats = RunStats {
            started_at: Some(Utc::now()),
            ..Default::default()
        };
        info!(
            url_load = self.config.url_load,
            url = %self.config.url,
            scroll_max = self.config.scroll_max,
            "scroll processor started"
        );

        let result = self.drive().await;
        self.stats.finished_at = Some(Utc::now());

        match &result {
            Ok(()) => {
                transition(&mut self.phase, Phase::Done);
                info!(
                    rounds = self.stats.rounds,
                    scrolls = self.stats.scrolls,
                    records = self.stats.records,
                    "scroll processor finished"
                );
            }
            Err(e) => {
                transition(&mut self.phase, Phase::Failed);
                error!(
                    rounds = self.stats.rounds,
                    records = self.stats.records,
                    "scroll processor failed: {}",
                    e
                );
                self.error = Some(e.clone());
            }
        }

        result
    }

    async fn drive(&mut self) -> Result<(), ProcessorError> {
        let Self {
            config,
            page,
            hooks,
            phase,
            previous,
            current,
            results,
            stats,
            ..
        } = self;
        let page: &D = page;
        let config: &ProcessorConfig<D> = config;

        transition(phase, Phase::Loading);
        let ctx = HookContext::new(page, config);
        hooks.load_page(&ctx).await?;
        let container = hooks.resolve_container(&ctx).await?;
        let ctx = ctx.with_container(container.as_ref());

        let empty = State::empty();
        loop {
            // -- ラウンド開始
            transition(phase, Phase::RoundStart);
            if let Some(done) = current.take() {
                *previous = Some(done);
            }
            let prev = previous.as_ref().unwrap_or(&empty);
            if let Some(anchor) = prev.scrollable_element.as_ref() {
                scroll_to(page, anchor).await?;
                stats.scrolls += 1;
            }
            let cur = current.insert(State::next(previous.as_ref()));
            let mut round = Round::new(prev, cur);

            // -- 要素取得
            transition(phase, Phase::Discovering);
            hooks.discover_elements(&ctx, &mut round).await?;
            round.current.sync_count();

            let discovered = round.current.elements.is_some();
            if !discovered {
                // 要素なし = スクロールしない
                debug!(round = round.current.round_number, "no elements discovered");
                round.current.continue_scroll = false;
            } else {
                debug!(
                    round = round.current.round_number,
                    elements = round.current.elements_count,
                    previous = round.previous.elements_count,
                    "elements discovered"
                );

                transition(phase, Phase::ElementLoop);
                for index in round.current.new_range(round.previous) {
                    let Some(element) = round
                        .current
                        .elements
                        .as_ref()
                        .and_then(|es| es.get(index))
                        .cloned()
                    else {
                        break;
                    };
                    round.current.begin_element(index, element);
                    stats.elements_visited += 1;
                    trace!(round = round.current.round_number, index, "element start");

                    hooks.extract_info(&ctx, &mut round).await;
                    hooks.classify_match(&ctx, &mut round);
                    let matched = round.current.current_matched;
                    if let Some(info) = round.current.current_info.as_mut() {
                        info.set_matched(matched);
                        info.set_matched_reason(round.current.current_matched_reason.clone());
                    }

                    if matched {
                        hooks.on_matched(&ctx, &mut round).await?;
                    } else {
                        hooks.on_unmatched(&ctx, &mut round).await?;
                    }

                    if let Some(info) = round.current.current_info.as_ref() {
                        stats.records += 1;
                        if config.collect_info {
                            results.push(info.clone());
                        }
                    }

                    hooks.on_element_processed(&ctx, &mut round).await?;
                    if hooks.is_scroll_anchor(&ctx, &round) {
                        round.current.mark_scrollable();
                    }
                    hooks.on_element_round_end(&ctx, &mut round).await?;
                }
            }

            // -- ラウンド終了
            transition(phase, Phase::RoundEnd);
            if discovered {
                hooks.compute_continue_scroll(&ctx, &mut round);
            }
            hooks.on_round_end(&ctx, &mut round).await?;
            stats.rounds += 1;

            if !hooks.should_start_next_round(&ctx, &round) {
                break;
            }
        }

        Ok(())
    }
}

/// 前のラウンドのスクロール対象を表示し、DOMが落ち着くまで待つ
async fn scroll_to<D: Driver>(page: &D, anchor: &D::Element) -> Result<(), ProcessorError> {
    trace!(anchor = %page.identity(anchor), "scroll_to: start");
    page.scroll_into_view(anchor)
        .await
        .map_err(|e| ProcessorError::from_driver(Stage::Scroll, e))?;
    page.wait_stable()
        .await
        .map_err(|e| ProcessorError::from_driver(Stage::Scroll, e))?;
    trace!("scroll_to: done");
    Ok(())
}

fn transition(phase: &mut Phase, next: Phase) {
    if *phase != next {
        trace!("phase: {} -> {}", phase, next);
        *phase = next;
    }
}
