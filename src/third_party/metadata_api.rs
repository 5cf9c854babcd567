//! 作品元数据 API（なろう小説 API 形式）。
//!
//! 请求：`GET <api_url>?ncode=<ncode>&of=<fields>&out=json`；
//! 响应是 JSON 数组，第一个元素是 `allcount`，第二个元素才是作品数据。

use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue, USER_AGENT};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

/// 只取作品类型。
pub const FIELDS_NOVEL_TYPE: &str = "nt";
/// 短篇需要的字段：简介、首次发布、最后更新。
pub const FIELDS_SHORT_STORY: &str = "s-gf-nu";

#[derive(Debug, thiserror::Error)]
pub enum MetadataError {
    #[error("metadata request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("invalid metadata response: {0}")]
    Json(#[from] serde_json::Error),
    #[error("作品 {ncode} 在元数据 API 中不存在")]
    Missing { ncode: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct NovelMetadata {
    #[serde(default, rename = "noveltype")]
    pub novel_type: Option<u8>,
    #[serde(default)]
    pub story: Option<String>,
    #[serde(default)]
    pub general_firstup: Option<String>,
    #[serde(default)]
    pub novelupdated_at: Option<String>,
}

pub trait MetadataApi {
    fn fetch(&self, api_url: &str, ncode: &str, fields: &str)
    -> Result<NovelMetadata, MetadataError>;
}

pub fn parse_response(body: &str, ncode: &str) -> Result<NovelMetadata, MetadataError> {
    let mut items: Vec<Value> = serde_json::from_str(body)?;
    if items.len() < 2 {
        return Err(MetadataError::Missing {
            ncode: ncode.to_string(),
        });
    }
    Ok(serde_json::from_value(items.swap_remove(1))?)
}

pub struct NarouApiClient {
    client: Client,
}

impl NarouApiClient {
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self, MetadataError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(user_agent).unwrap_or(HeaderValue::from_static("Mozilla/5.0")),
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }
}

impl MetadataApi for NarouApiClient {
    fn fetch(
        &self,
        api_url: &str,
        ncode: &str,
        fields: &str,
    ) -> Result<NovelMetadata, MetadataError> {
        debug!(target: "metadata_api", ncode, fields, "查询元数据");
        let body = self
            .client
            .get(api_url)
            .query(&[("ncode", ncode), ("of", fields), ("out", "json")])
            .send()?
            .error_for_status()?
            .text()?;
        parse_response(&body, ncode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn second_element_carries_the_work() {
        let body = r#"[{"allcount":1},{"noveltype":2,"story":"あらすじ","general_firstup":"2013-01-01 10:00:00","novelupdated_at":"2013-02-01 10:00:00"}]"#;
        let meta = parse_response(body, "n0001a").unwrap();
        assert_eq!(meta.novel_type, Some(2));
        assert_eq!(meta.story.as_deref(), Some("あらすじ"));
        assert_eq!(meta.novelupdated_at.as_deref(), Some("2013-02-01 10:00:00"));
    }

    #[test]
    fn unknown_work_is_missing() {
        let err = parse_response(r#"[{"allcount":0}]"#, "n9999z").unwrap_err();
        assert!(matches!(err, MetadataError::Missing { .. }));
        assert!(matches!(
            parse_response("not json", "n0001a"),
            Err(MetadataError::Json(_))
        ));
    }

    #[test]
    fn client_sends_narou_style_query() {
        let server = tiny_http::Server::http("127.0.0.1:0").unwrap();
        let api_url = format!("http://{}/novelapi/api/", server.server_addr());
        let handle = thread::spawn(move || {
            let request = server.recv().unwrap();
            let url = request.url().to_string();
            let response =
                tiny_http::Response::from_string(r#"[{"allcount":1},{"noveltype":1}]"#);
            request.respond(response).unwrap();
            url
        });

        let client = NarouApiClient::new(Duration::from_secs(5), "test").unwrap();
        let meta = client.fetch(&api_url, "n0001a", FIELDS_NOVEL_TYPE).unwrap();
        assert_eq!(meta.novel_type, Some(1));
        assert_eq!(
            handle.join().unwrap(),
            "/novelapi/api/?ncode=n0001a&of=nt&out=json"
        );
    }
}
