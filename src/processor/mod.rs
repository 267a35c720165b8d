//! 無限スクロール走査
//!
//! 状態 ([`State`])、拡張ポイント ([`Hooks`])、エンジン ([`Processor`]) で構成する。

mod engine;
mod hooks;
mod state;


pub use engine::Processor;
pub use hooks::{continue_scroll, load_page, within_budget, HookContext, Hooks};
pub use state::{Phase, Round, RunStats, State, StateSummary};
