//! 無限スクロール走査ライブラリ
//!
//! - スクロールで要素を出現させ、前回から増えた要素だけを処理する
//! - 要素の発見・情報抽出・一致判定はフックとして差し替える
//! - ブラウザ操作は [`Driver`] トレイトで抽象化（chromiumoxide 実装付き）
//!
//! # 使用例
//!
//! ```rust,ignore
//! use scroll_processor::cdp::{CdpConfig, CdpDriver};
//! use scroll_processor::{ProcessorConfig, Processor, PrintMode};
//!
//! #[tokio::main]
//! async fn main() {
//!     let driver = CdpDriver::launch(CdpConfig::default()).await.unwrap();
//!
//!     let config = ProcessorConfig::new(driver)
//!         .with_url("https://example.com/feed")
//!         .with_scroll_max(5)
//!         .with_collect_info(true);
//!
//!     // FeedHooks: discover_elements / extract_info を実装した型
//!     let mut processor = Processor::new(config, FeedHooks::default()).unwrap();
//!     processor.run().await.unwrap();
//!     processor.info_list().log(PrintMode::All);
//! }
//! ```

pub mod cdp;
pub mod config;
pub mod error;
pub mod info;
pub mod processor;
pub mod service;
pub mod traits;

#[cfg(test)]
pub(crate) mod testing;

// 主要な型をリエクスポート
pub use config::{ProcessorConfig, ProcessorSettings};
pub use error::{DriverError, ProcessorError, Stage};
pub use info::{Info, InfoList, MatchState, PrintMode};
pub use processor::{HookContext, Hooks, Phase, Processor, Round, RunStats, State};
pub use service::{ScrollOutcome, ScrollRequest, ScrollService};
pub use traits::{Driver, ElementId};
