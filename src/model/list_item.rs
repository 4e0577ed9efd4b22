use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One entry of the household shopping list.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListItem {
    pub item_id: String,
    pub text: String,
    #[serde(default)]
    pub deleted: bool,
    /// Remaining fields of the remote record, sent back untouched on update.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Body of the list endpoint. `values` is absent when the list is empty.
#[derive(Debug, Deserialize)]
pub struct ListResponse {
    #[serde(default)]
    pub values: Vec<ListItem>,
}
