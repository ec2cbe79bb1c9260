//! Response shapes shared by several routes

use hypha_store::entity::{people, spaces};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonView {
    pub id: i32,
    pub slug: String,
    pub name: Option<String>,
    pub surname: Option<String>,
    pub nickname: Option<String>,
    pub avatar_url: Option<String>,
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_delegate: Option<bool>,
}

impl From<people::Model> for PersonView {
    fn from(person: people::Model) -> Self {
        Self {
            id: person.id,
            slug: person.slug,
            name: person.name,
            surname: person.surname,
            nickname: person.nickname,
            avatar_url: person.avatar_url,
            address: person.address,
            is_delegate: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpaceView {
    pub id: i32,
    pub slug: String,
    pub title: String,
    pub description: Option<String>,
    pub logo_url: Option<String>,
    pub address: Option<String>,
    pub web3_space_id: Option<i64>,
    pub parent_id: Option<i32>,
}

impl From<spaces::Model> for SpaceView {
    fn from(space: spaces::Model) -> Self {
        Self {
            id: space.id,
            slug: space.slug,
            title: space.title,
            description: space.description,
            logo_url: space.logo_url,
            address: space.address,
            web3_space_id: space.web3_space_id,
            parent_id: space.parent_id,
        }
    }
}
