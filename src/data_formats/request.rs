use serde::{Deserialize, Serialize};

// ----------------- Article Requests -----------------
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct CreateArticleRequest {
    pub title: String,
    pub description: String,
    pub body: String,
    #[serde(rename = "tagList", default)]
    pub tag_list: Option<Vec<String>>,
}

#[derive(Deserialize, Serialize, Debug, Clone, Default)]
#[serde(default)]
pub struct UpdateArticleRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub body: Option<String>,
}

// ----------------- Comment Request -----------------
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct CommentRequest {
    pub body: String,
}
