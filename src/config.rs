use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::traits::Driver;

/// 走査エンジンの設定
///
/// `page` は必須。無い場合は [`crate::Processor::new`] が `ConfigInvalid` を返す。
pub struct ProcessorConfig<D: Driver> {
    pub page: Option<Arc<D>>,
    /// 繰り返し要素を含む最も外側の要素。`None` ならページ全体
    pub container: Option<D::Element>,
    /// `run` 開始時に `url` を読み込むか
    pub url_load: bool,
    pub url: String,
    /// 最大スクロール回数。負数なら無制限
    pub scroll_max: i64,
    /// 抽出レコードを一覧に蓄積するか
    pub collect_info: bool,
}

impl<D: Driver> Default for ProcessorConfig<D> {
    fn default() -> Self {
        Self {
            page: None,
            container: None,
            url_load: false,
            url: String::new(),
            scroll_max: 0,
            collect_info: false,
        }
    }
}

impl<D: Driver> Clone for ProcessorConfig<D> {
    fn clone(&self) -> Self {
        Self {
            page: self.page.clone(),
            container: self.container.clone(),
            url_load: self.url_load,
            url: self.url.clone(),
            scroll_max: self.scroll_max,
            collect_info: self.collect_info,
        }
    }
}

impl<D: Driver> ProcessorConfig<D> {
    pub fn new(page: D) -> Self {
        Self::shared(Arc::new(page))
    }

    /// 他の処理と共有するページから作成
    pub fn shared(page: Arc<D>) -> Self {
        Self {
            page: Some(page),
            ..Default::default()
        }
    }

    pub fn with_page(mut self, page: Arc<D>) -> Self {
        self.page = Some(page);
        self
    }

    pub fn with_container(mut self, container: D::Element) -> Self {
        self.container = Some(container);
        self
    }

    /// URLを設定し、読み込みを有効にする
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self.url_load = true;
        self
    }

    pub fn with_url_load(mut self, url_load: bool) -> Self {
        self.url_load = url_load;
        self
    }

    pub fn with_scroll_max(mut self, scroll_max: i64) -> Self {
        self.scroll_max = scroll_max;
        self
    }

    pub fn with_collect_info(mut self, collect_info: bool) -> Self {
        self.collect_info = collect_info;
        self
    }
}

/// ファイル等から読み込む、ドライバに依存しない設定値
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessorSettings {
    pub url: Option<String>,
    pub url_load: bool,
    pub scroll_max: i64,
    pub collect_info: bool,
}

impl ProcessorSettings {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn apply_to<D: Driver>(&self, mut config: ProcessorConfig<D>) -> ProcessorConfig<D> {
        if let Some(url) = &self.url {
            config.url = url.clone();
        }
        config.url_load = self.url_load;
        config.scroll_max = self.scroll_max;
        config.collect_info = self.collect_info;
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedDriver;

    #[test]
    fn test_config_builder() {
        let config = ProcessorConfig::new(ScriptedDriver::new())
            .with_url("https://example.com/feed")
            .with_scroll_max(5)
            .with_collect_info(true);

        assert!(config.page.is_some());
        assert!(config.url_load);
        assert_eq!(config.url, "https://example.com/feed");
        assert_eq!(config.scroll_max, 5);
        assert!(config.collect_info);
        assert!(config.container.is_none());
    }

    #[test]
    fn test_config_default_has_no_page() {
        let config: ProcessorConfig<ScriptedDriver> = ProcessorConfig::default();
        assert!(config.page.is_none());
        assert!(!config.url_load);
        assert_eq!(config.scroll_max, 0);
    }

    #[test]
    fn test_settings_from_json() {
        let settings = ProcessorSettings::from_json(
            r#"{"url": "https://example.com", "url_load": true, "scroll_max": -1}"#,
        )
        .unwrap();

        assert_eq!(settings.url.as_deref(), Some("https://example.com"));
        assert!(settings.url_load);
        assert_eq!(settings.scroll_max, -1);
        assert!(!settings.collect_info);
    }

    #[test]
    fn test_settings_apply_to() {
        let settings = ProcessorSettings {
            url: Some("https://example.com".into()),
            url_load: true,
            scroll_max: 3,
            collect_info: true,
        };
        let config = settings.apply_to(ProcessorConfig::new(ScriptedDriver::new()));

        assert_eq!(config.url, "https://example.com");
        assert!(config.url_load);
        assert_eq!(config.scroll_max, 3);
        assert!(config.collect_info);
    }
}
