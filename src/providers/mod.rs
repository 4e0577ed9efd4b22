pub mod alexa;
pub mod trello;

use anyhow::Result;
use async_trait::async_trait;

use crate::model::card::CreatedCard;
use crate::model::list_item::ListItem;

/// Where shopping list items come from.
#[async_trait]
pub trait ListSource: Send + Sync {
    fn name(&self) -> &str;
    async fn fetch_items(&self) -> Result<Vec<ListItem>>;
    /// Mark each item deleted upstream. Failures are logged per item, never returned.
    /// Returns how many items were deleted.
    async fn delete_items(&self, items: Vec<ListItem>) -> usize;
    async fn logout(&self) {}
}

/// Where mirrored cards go.
#[async_trait]
pub trait CardSink: Send + Sync {
    fn name(&self) -> &str;
    async fn create_card(
        &self,
        name: &str,
        list_id: &str,
        desc: Option<&str>,
    ) -> Result<CreatedCard>;
}
