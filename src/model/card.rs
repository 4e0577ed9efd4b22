use serde::{Deserialize, Serialize};

/// Body of a Trello create-card request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCard {
    pub name: String,
    pub id_list: String,
    pub desc: Option<String>,
}

/// The parts of Trello's create-card response worth logging.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedCard {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub short_url: Option<String>,
}
