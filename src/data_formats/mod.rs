mod request;
mod response;
mod wrapper;

pub use request::*;
pub use response::*;
pub use wrapper::*;

use serde::{Deserialize, Serialize};

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct ArticleQueryParams {
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default = "get_default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy)]
pub struct FeedQueryParams {
    #[serde(default = "get_default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
}

fn get_default_limit() -> u32 {
    20
}

impl Default for ArticleQueryParams {
    fn default() -> Self {
        ArticleQueryParams {
            tag: None,
            author: None,
            limit: get_default_limit(),
            offset: 0,
        }
    }
}

impl Default for FeedQueryParams {
    fn default() -> Self {
        FeedQueryParams {
            limit: get_default_limit(),
            offset: 0,
        }
    }
}
