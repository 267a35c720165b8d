use std::fmt;

use async_trait::async_trait;

use crate::error::DriverError;

/// 要素の同一性トークン
///
/// ハンドルはDOM変更をまたいで同一とは限らないため、比較はこのトークンで行う。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementId(String);

impl ElementId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ElementId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ElementId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<i64> for ElementId {
    fn from(id: i64) -> Self {
        Self(id.to_string())
    }
}

/// ブラウザ操作の抽象
///
/// エンジンはこのトレイト経由でのみブラウザに触れる。各呼び出しは逐次に待たれ、
/// 重なって発行されることはない。
#[async_trait]
pub trait Driver: Send + Sync + 'static {
    /// 要素ハンドル
    type Element: Clone + fmt::Debug + Send + Sync + 'static;

    /// URLへ遷移
    async fn navigate(&self, url: &str) -> Result<(), DriverError>;

    /// DOMが落ち着くまで待機
    async fn wait_stable(&self) -> Result<(), DriverError>;

    /// `scope`（`None` ならページ全体）配下で `selector` に一致する要素を列挙
    async fn query_children(
        &self,
        scope: Option<&Self::Element>,
        selector: &str,
    ) -> Result<Vec<Self::Element>, DriverError>;

    /// 要素を表示領域へスクロール
    async fn scroll_into_view(&self, element: &Self::Element) -> Result<(), DriverError>;

    /// 要素の同一性トークン
    fn identity(&self, element: &Self::Element) -> ElementId;

    // --- 以下は抽出フック用。エンジン本体は使わない

    /// 要素配下の最初の一致要素
    async fn find_child(
        &self,
        element: &Self::Element,
        selector: &str,
    ) -> Result<Option<Self::Element>, DriverError> {
        Ok(self
            .query_children(Some(element), selector)
            .await?
            .into_iter()
            .next())
    }

    /// 要素のテキスト
    async fn text(&self, element: &Self::Element) -> Result<Option<String>, DriverError>;

    /// 要素の属性値
    async fn attribute(
        &self,
        element: &Self::Element,
        name: &str,
    ) -> Result<Option<String>, DriverError>;
}
