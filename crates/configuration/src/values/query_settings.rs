use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// How read requests are paged and counted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuerySettings {
    /// The page size used when a request does not ask for one.
    #[serde(default = "default_page_size_default")]
    pub default_page_size: u32,
    /// The largest page size a request may ask for. Unlimited when absent.
    #[serde(default)]
    pub max_page_size: Option<u32>,
    /// Run a second statement counting all matching resources.
    #[serde(default)]
    pub include_total_resource_count: bool,
}

impl QuerySettings {
    pub fn is_default(&self) -> bool {
        self == &QuerySettings::default()
    }
}

impl Default for QuerySettings {
    fn default() -> Self {
        QuerySettings {
            default_page_size: default_page_size_default(),
            max_page_size: None,
            include_total_resource_count: false,
        }
    }
}

fn default_page_size_default() -> u32 {
    10
}
