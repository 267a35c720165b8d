use std::fmt;

use thiserror::Error;

/// ドライバ層（ブラウザ側）で発生したエラー
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DriverError {
    #[error("ナビゲーションエラー: {0}")]
    Navigation(String),

    #[error("要素取得エラー: {0}")]
    Query(String),

    #[error("スクロールエラー: {0}")]
    Scroll(String),

    #[error("DOM安定待機エラー: {0}")]
    Wait(String),

    #[error("情報抽出エラー: {0}")]
    Extraction(String),

    #[error("ブラウザエラー: {0}")]
    Browser(String),
}

/// エラーが発生した処理段階
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    LoadPage,
    /// 既定の `resolve_container` は失敗しない。独自のフックが範囲要素を探す際に使う
    ResolveContainer,
    Discover,
    Scroll,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::LoadPage => "load_page",
            Stage::ResolveContainer => "resolve_container",
            Stage::Discover => "discover",
            Stage::Scroll => "scroll",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 走査エンジンのエラー
///
/// ドライバ由来のエラーは発生段階 [`Stage`] 付きで包まれる。
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProcessorError {
    #[error("設定エラー: {0}")]
    ConfigInvalid(String),

    #[error("[{stage}] ページ読み込み失敗: {source}")]
    NavigationFailed {
        stage: Stage,
        #[source]
        source: DriverError,
    },

    #[error("[{stage}] 要素取得失敗: {source}")]
    QueryFailed {
        stage: Stage,
        #[source]
        source: DriverError,
    },

    #[error("[{stage}] スクロール失敗: {source}")]
    ScrollFailed {
        stage: Stage,
        #[source]
        source: DriverError,
    },

    #[error("[{stage}] DOM安定待機失敗: {source}")]
    WaitFailed {
        stage: Stage,
        #[source]
        source: DriverError,
    },

    #[error("フック {hook} 失敗: {reason}")]
    HookFailed { hook: &'static str, reason: String },
}

impl ProcessorError {
    /// ドライバエラーを段階名付きのエンジンエラーへ変換
    ///
    /// 種別が段階と結び付かないもの（抽出・ブラウザ）は段階から種別を決める。
    pub fn from_driver(stage: Stage, source: DriverError) -> Self {
        match source {
            DriverError::Navigation(_) => ProcessorError::NavigationFailed { stage, source },
            DriverError::Query(_) => ProcessorError::QueryFailed { stage, source },
            DriverError::Scroll(_) => ProcessorError::ScrollFailed { stage, source },
            DriverError::Wait(_) => ProcessorError::WaitFailed { stage, source },
            DriverError::Extraction(_) | DriverError::Browser(_) => match stage {
                Stage::LoadPage => ProcessorError::NavigationFailed { stage, source },
                Stage::ResolveContainer | Stage::Discover => {
                    ProcessorError::QueryFailed { stage, source }
                }
                Stage::Scroll => ProcessorError::ScrollFailed { stage, source },
            },
        }
    }

    /// 段階情報（設定エラー・フックエラーには無い）
    pub fn stage(&self) -> Option<Stage> {
        match self {
            ProcessorError::NavigationFailed { stage, .. }
            | ProcessorError::QueryFailed { stage, .. }
            | ProcessorError::ScrollFailed { stage, .. }
            | ProcessorError::WaitFailed { stage, .. } => Some(*stage),
            ProcessorError::ConfigInvalid(_) | ProcessorError::HookFailed { .. } => None,
        }
    }
}
