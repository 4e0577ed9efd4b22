pub mod card;
pub mod list_item;
