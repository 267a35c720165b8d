//! テスト用のドライバとフック

use std::collections::VecDeque;
use std::fmt;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{DriverError, ProcessorError, Stage};
use crate::info::{Info, MatchState};
use crate::processor::{continue_scroll, within_budget, HookContext, Hooks, Round};
use crate::traits::{Driver, ElementId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeElement {
    pub id: String,
    pub text: String,
}

pub fn element(id: &str) -> FakeElement {
    FakeElement {
        id: id.to_string(),
        text: format!("text of {}", id),
    }
}

/// `e{from}` から `e{to}` までの要素
pub fn items(from: usize, to: usize) -> Vec<FakeElement> {
    (from..=to).map(|i| element(&format!("e{}", i))).collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Navigate(String),
    WaitStable,
    Query,
    Scroll(String),
}

/// 要素取得ごとに用意したフレームを順に返すドライバ
///
/// フレームを使い切ったら最後のフレームを返し続ける。
#[derive(Default)]
pub struct ScriptedDriver {
    frames: Mutex<VecDeque<Vec<FakeElement>>>,
    last: Mutex<Vec<FakeElement>>,
    calls: Mutex<Vec<Call>>,
    /// 要素取得の範囲要素ID（`None` はページ全体）
    scopes: Mutex<Vec<Option<String>>>,
    /// 各呼び出しの前に他のタスクへ制御を渡す
    yielding: bool,
    fail_navigation: bool,
    fail_query_at: Option<usize>,
    fail_scroll: bool,
    fail_wait: bool,
}

impl ScriptedDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_frame(self, frame: Vec<FakeElement>) -> Self {
        self.frames.lock().unwrap().push_back(frame);
        self
    }

    pub fn yielding(mut self) -> Self {
        self.yielding = true;
        self
    }

    pub fn failing_navigation(mut self) -> Self {
        self.fail_navigation = true;
        self
    }

    /// `n` 回目（0始まり）の要素取得を失敗させる
    pub fn failing_query_at(mut self, n: usize) -> Self {
        self.fail_query_at = Some(n);
        self
    }

    pub fn failing_scroll(mut self) -> Self {
        self.fail_scroll = true;
        self
    }

    pub fn failing_wait(mut self) -> Self {
        self.fail_wait = true;
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn scrolls(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Scroll(id) => Some(id),
                _ => None,
            })
            .collect()
    }

    pub fn scopes(&self) -> Vec<Option<String>> {
        self.scopes.lock().unwrap().clone()
    }

    async fn pause(&self) {
        if self.yielding {
            tokio::task::yield_now().await;
        }
    }

    pub fn query_count(&self) -> usize {
        self.calls().iter().filter(|c| **c == Call::Query).count()
    }
}

#[async_trait]
impl Driver for ScriptedDriver {
    type Element = FakeElement;

    async fn navigate(&self, url: &str) -> Result<(), DriverError> {
        self.pause().await;
        self.calls.lock().unwrap().push(Call::Navigate(url.to_string()));
        if self.fail_navigation {
            return Err(DriverError::Navigation(format!("cannot open {}", url)));
        }
        Ok(())
    }

    async fn wait_stable(&self) -> Result<(), DriverError> {
        self.pause().await;
        self.calls.lock().unwrap().push(Call::WaitStable);
        if self.fail_wait {
            return Err(DriverError::Wait("dom never settled".into()));
        }
        Ok(())
    }

    async fn query_children(
        &self,
        scope: Option<&FakeElement>,
        _selector: &str,
    ) -> Result<Vec<FakeElement>, DriverError> {
        self.pause().await;
        let n = self.query_count();
        self.calls.lock().unwrap().push(Call::Query);
        self.scopes
            .lock()
            .unwrap()
            .push(scope.map(|e| e.id.clone()));
        if self.fail_query_at == Some(n) {
            return Err(DriverError::Query("target closed".into()));
        }

        let mut last = self.last.lock().unwrap();
        if let Some(frame) = self.frames.lock().unwrap().pop_front() {
            *last = frame;
        }
        Ok(last.clone())
    }

    async fn scroll_into_view(&self, element: &FakeElement) -> Result<(), DriverError> {
        self.pause().await;
        self.calls.lock().unwrap().push(Call::Scroll(element.id.clone()));
        if self.fail_scroll {
            return Err(DriverError::Scroll("element detached".into()));
        }
        Ok(())
    }

    fn identity(&self, element: &FakeElement) -> ElementId {
        ElementId::new(element.id.clone())
    }

    async fn text(&self, element: &FakeElement) -> Result<Option<String>, DriverError> {
        Ok(Some(element.text.clone()))
    }

    async fn attribute(
        &self,
        element: &FakeElement,
        name: &str,
    ) -> Result<Option<String>, DriverError> {
        Ok((name == "id").then(|| element.id.clone()))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Post {
    pub state: MatchState,
    pub id: String,
    pub text: String,
}

impl fmt::Display for Post {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.id, self.text)
    }
}

impl Info for Post {
    fn match_state(&self) -> &MatchState {
        &self.state
    }

    fn match_state_mut(&mut self) -> &mut MatchState {
        &mut self.state
    }
}

/// 呼び出しを記録するフック
#[derive(Default)]
pub struct FeedHooks {
    pub events: Vec<String>,
    /// 一致とみなすID
    pub match_ids: Option<Vec<String>>,
    /// スクロール対象にするID
    pub anchor_ids: Option<Vec<String>>,
    /// レコードを作らないID
    pub skip_ids: Vec<String>,
    /// 空の取得結果を「要素なし」として扱う
    pub empty_as_absent: bool,
    pub fail_on_matched: bool,
    /// 設定の `container` の代わりに使う範囲要素
    pub container: Option<FakeElement>,
    pub fail_resolve: bool,
    /// アンカーが変わらなくても要素がある限りスクロールを続ける
    pub keep_scrolling: bool,
    /// スクロール可否と上限を無視して、このラウンド数だけ実行する
    pub round_limit: Option<u64>,
}

impl FeedHooks {
    pub fn new() -> Self {
        Self {
            empty_as_absent: true,
            ..Default::default()
        }
    }

    pub fn events_named(&self, prefix: &str) -> Vec<String> {
        self.events
            .iter()
            .filter(|e| e.starts_with(prefix))
            .cloned()
            .collect()
    }
}

fn current_id(round: &Round<'_, FakeElement, Post>) -> String {
    round
        .current
        .current_element
        .as_ref()
        .map(|e| e.id.clone())
        .unwrap_or_default()
}

#[async_trait]
impl Hooks<ScriptedDriver> for FeedHooks {
    type Info = Post;

    async fn resolve_container(
        &mut self,
        ctx: &HookContext<'_, ScriptedDriver>,
    ) -> Result<Option<FakeElement>, ProcessorError> {
        self.events.push("resolve".to_string());
        if self.fail_resolve {
            return Err(ProcessorError::from_driver(
                Stage::ResolveContainer,
                DriverError::Query("#feed not found".into()),
            ));
        }
        Ok(self.container.clone().or_else(|| ctx.config.container.clone()))
    }

    async fn discover_elements(
        &mut self,
        ctx: &HookContext<'_, ScriptedDriver>,
        round: &mut Round<'_, FakeElement, Post>,
    ) -> Result<(), ProcessorError> {
        let es = ctx
            .page
            .query_children(ctx.container, "article")
            .await
            .map_err(|e| ProcessorError::from_driver(Stage::Discover, e))?;
        self.events
            .push(format!("discover:{}:{}", round.current.round_number, es.len()));
        if es.is_empty() && self.empty_as_absent {
            round.current.set_elements(None);
        } else {
            round.current.set_elements(Some(es));
        }
        Ok(())
    }

    async fn extract_info(
        &mut self,
        ctx: &HookContext<'_, ScriptedDriver>,
        round: &mut Round<'_, FakeElement, Post>,
    ) {
        let id = current_id(round);
        self.events.push(format!("extract:{}", id));
        if self.skip_ids.contains(&id) {
            return;
        }
        let Some(element) = round.current.current_element.as_ref() else {
            return;
        };
        let text = ctx.page.text(element).await.ok().flatten().unwrap_or_default();
        round.current.current_info = Some(Post {
            id,
            text,
            ..Default::default()
        });
    }

    fn classify_match(
        &mut self,
        _ctx: &HookContext<'_, ScriptedDriver>,
        round: &mut Round<'_, FakeElement, Post>,
    ) {
        let id = current_id(round);
        self.events.push(format!("classify:{}", id));
        let matched = self.match_ids.as_ref().map_or(true, |ids| ids.contains(&id));
        round.current.current_matched = matched;
        round.current.current_matched_reason = if matched {
            format!("{} listed", id)
        } else {
            String::new()
        };
    }

    async fn on_matched(
        &mut self,
        _ctx: &HookContext<'_, ScriptedDriver>,
        round: &mut Round<'_, FakeElement, Post>,
    ) -> Result<(), ProcessorError> {
        self.events.push(format!("matched:{}", current_id(round)));
        if self.fail_on_matched {
            return Err(ProcessorError::HookFailed {
                hook: "on_matched",
                reason: "sink full".into(),
            });
        }
        Ok(())
    }

    async fn on_unmatched(
        &mut self,
        _ctx: &HookContext<'_, ScriptedDriver>,
        round: &mut Round<'_, FakeElement, Post>,
    ) -> Result<(), ProcessorError> {
        self.events.push(format!("unmatched:{}", current_id(round)));
        Ok(())
    }

    async fn on_element_processed(
        &mut self,
        _ctx: &HookContext<'_, ScriptedDriver>,
        round: &mut Round<'_, FakeElement, Post>,
    ) -> Result<(), ProcessorError> {
        self.events.push(format!("processed:{}", current_id(round)));
        Ok(())
    }

    fn is_scroll_anchor(
        &mut self,
        _ctx: &HookContext<'_, ScriptedDriver>,
        round: &Round<'_, FakeElement, Post>,
    ) -> bool {
        let id = current_id(round);
        self.events.push(format!("anchor:{}", id));
        self.anchor_ids.as_ref().map_or(true, |ids| ids.contains(&id))
    }

    async fn on_element_round_end(
        &mut self,
        _ctx: &HookContext<'_, ScriptedDriver>,
        round: &mut Round<'_, FakeElement, Post>,
    ) -> Result<(), ProcessorError> {
        self.events.push(format!("element_end:{}", current_id(round)));
        Ok(())
    }

    async fn on_round_end(
        &mut self,
        _ctx: &HookContext<'_, ScriptedDriver>,
        round: &mut Round<'_, FakeElement, Post>,
    ) -> Result<(), ProcessorError> {
        self.events.push(format!(
            "round_end:{}:{}",
            round.current.round_number, round.current.continue_scroll
        ));
        Ok(())
    }

    fn compute_continue_scroll(
        &mut self,
        ctx: &HookContext<'_, ScriptedDriver>,
        round: &mut Round<'_, FakeElement, Post>,
    ) {
        round.current.continue_scroll = if self.keep_scrolling {
            round.current.elements.is_some()
        } else {
            continue_scroll(ctx.page, round)
        };
    }

    fn should_start_next_round(
        &mut self,
        ctx: &HookContext<'_, ScriptedDriver>,
        round: &Round<'_, FakeElement, Post>,
    ) -> bool {
        match self.round_limit {
            Some(limit) => round.current.round_number + 1 < limit,
            None => within_budget(
                round.current.continue_scroll,
                round.current.round_number,
                ctx.config.scroll_max,
            ),
        }
    }
}
