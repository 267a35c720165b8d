//! 抽出レコードとレコード一覧

use std::fmt;

use tracing::info;

/// 一致判定の保持領域
///
/// [`Info`] 実装側の構造体に埋め込んで使う。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchState {
    matched: bool,
    matched_reason: String,
}

/// 要素から抽出したレコード
///
/// 一致判定の読み書きはデフォルト実装で提供されるため、実装側は
/// `match_state` / `match_state_mut` と `Display` だけ用意すればよい。
pub trait Info: fmt::Display + Clone + Send + Sync + 'static {
    fn match_state(&self) -> &MatchState;

    fn match_state_mut(&mut self) -> &mut MatchState;

    fn matched(&self) -> bool {
        self.match_state().matched
    }

    fn matched_reason(&self) -> &str {
        &self.match_state().matched_reason
    }

    fn set_matched(&mut self, matched: bool) {
        self.match_state_mut().matched = matched;
    }

    fn set_matched_reason(&mut self, reason: impl Into<String>) {
        self.match_state_mut().matched_reason = reason.into();
    }
}

/// 一覧出力モード
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PrintMode {
    #[default]
    All,
    Matched,
    Unmatched,
}

/// 抽出レコードの一覧（発見順・追記のみ）
#[derive(Debug, Clone)]
pub struct InfoList<I> {
    items: Vec<I>,
}

impl<I> Default for InfoList<I> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<I: Info> InfoList<I> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, info: I) {
        self.items.push(info);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, I> {
        self.items.iter()
    }

    pub fn as_slice(&self) -> &[I] {
        &self.items
    }

    pub fn into_vec(self) -> Vec<I> {
        self.items
    }

    pub fn matched(&self) -> impl Iterator<Item = &I> {
        self.items.iter().filter(|i| i.matched())
    }

    pub fn unmatched(&self) -> impl Iterator<Item = &I> {
        self.items.iter().filter(|i| !i.matched())
    }

    /// 表示用の行を生成
    ///
    /// 番号は一覧全体での1始まりの位置（モードで絞り込んでも振り直さない）。
    pub fn lines(&self, mode: PrintMode) -> Vec<String> {
        self.items
            .iter()
            .enumerate()
            .filter(|(_, info)| match mode {
                PrintMode::All => true,
                PrintMode::Matched => info.matched(),
                PrintMode::Unmatched => !info.matched(),
            })
            .map(|(i, info)| {
                let mark = if info.matched() { " [X] " } else { " [ ] " };
                format!("{}{}{}", i + 1, mark, info)
            })
            .collect()
    }

    pub fn log(&self, mode: PrintMode) {
        for line in self.lines(mode) {
            info!("{}", line);
        }
    }
}

impl<'a, I> IntoIterator for &'a InfoList<I> {
    type Item = &'a I;
    type IntoIter = std::slice::Iter<'a, I>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
