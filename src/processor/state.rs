//! ラウンド単位の状態

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// エンジンの状態遷移
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Phase {
    Idle,
    Loading,
    RoundStart,
    Discovering,
    ElementLoop,
    RoundEnd,
    Done,
    Failed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// 1ラウンド分の状態
///
/// ラウンド中はエンジンとフックが書き込み、次のラウンドが始まると
/// `previous` として読み取り専用になる。
#[derive(Debug, Clone)]
pub struct State<E, I> {
    /// `discover_elements` の結果。`None` は発見要素なし
    pub elements: Option<Vec<E>>,
    pub elements_count: usize,

    // -- 処理中の要素
    pub current_element: Option<E>,
    pub current_index: usize,
    pub current_info: Option<I>,
    pub current_matched: bool,
    pub current_matched_reason: String,

    // -- このラウンドで最後にスクロール対象と判定された要素
    pub scrollable_element: Option<E>,
    pub scrollable_index: Option<usize>,
    pub scrollable_info: Option<I>,

    pub continue_scroll: bool,
    /// 0始まり。直前のラウンド + 1
    pub round_number: u64,
}

impl<E: Clone, I: Clone> State<E, I> {
    /// 最初のラウンドの `previous` として使う空の状態
    pub fn empty() -> Self {
        Self {
            elements: None,
            elements_count: 0,
            current_element: None,
            current_index: 0,
            current_info: None,
            current_matched: true,
            current_matched_reason: String::new(),
            scrollable_element: None,
            scrollable_index: None,
            scrollable_info: None,
            // 初期値は false にしない（最初のラウンドはスクロール継続扱い）
            continue_scroll: true,
            round_number: 0,
        }
    }

    /// 直前のラウンドから次のラウンドの状態を作成
    pub fn next(previous: Option<&Self>) -> Self {
        Self {
            round_number: previous.map_or(0, |p| p.round_number + 1),
            ..Self::empty()
        }
    }

    /// 発見要素を設定し、件数を合わせる
    pub fn set_elements(&mut self, elements: Option<Vec<E>>) {
        self.elements_count = elements.as_ref().map_or(0, Vec::len);
        self.elements = elements;
    }

    pub(crate) fn sync_count(&mut self) {
        self.elements_count = self.elements.as_ref().map_or(0, Vec::len);
    }

    pub(crate) fn begin_element(&mut self, index: usize, element: E) {
        self.current_element = Some(element);
        self.current_index = index;
        self.current_info = None;
        self.current_matched = true;
        self.current_matched_reason.clear();
    }

    /// 処理中の要素を次のスクロール対象として記録
    pub(crate) fn mark_scrollable(&mut self) {
        self.scrollable_element = self.current_element.clone();
        self.scrollable_index = Some(self.current_index);
        self.scrollable_info = self.current_info.clone();
    }

    /// 新しく現れた要素の範囲（縮んだ場合は空）
    pub fn new_range(&self, previous: &Self) -> std::ops::Range<usize> {
        previous.elements_count..self.elements_count.max(previous.elements_count)
    }

    pub fn summary(&self) -> StateSummary {
        StateSummary {
            round_number: self.round_number,
            elements: self.elements.is_some(),
            elements_count: self.elements_count,
            current_index: self.current_index,
            scrollable_index: self.scrollable_index,
            continue_scroll: self.continue_scroll,
        }
    }
}

/// トレースログ用の状態要約
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StateSummary {
    pub round_number: u64,
    pub elements: bool,
    pub elements_count: usize,
    pub current_index: usize,
    pub scrollable_index: Option<usize>,
    pub continue_scroll: bool,
}

/// フックに渡すラウンドの組
pub struct Round<'a, E, I> {
    pub previous: &'a State<E, I>,
    pub current: &'a mut State<E, I>,
}

impl<'a, E, I> Round<'a, E, I> {
    pub fn new(previous: &'a State<E, I>, current: &'a mut State<E, I>) -> Self {
        Self { previous, current }
    }
}

/// 実行統計
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    pub rounds: u64,
    pub elements_visited: u64,
    /// 抽出で得られたレコード数（一覧への蓄積有無に関係なく数える）
    pub records: u64,
    pub scrolls: u64,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl RunStats {
    pub fn elapsed(&self) -> Option<chrono::Duration> {
        Some(self.finished_at? - self.started_at?)
    }
}
