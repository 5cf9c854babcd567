//! 页面抓取：503 有限重试、404 识别、重定向检测。

use std::time::Duration;

use reqwest::StatusCode;
use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, ACCEPT_ENCODING, CONNECTION, HeaderMap, HeaderValue, USER_AGENT};
use tracing::{debug, warn};

use crate::base_system::context::Config;
use crate::book_parser::html_utils::pretreatment_source;

#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub request_timeout: Duration,
    /// 503 时的重试次数上限。
    pub retry_max: u32,
    /// 503 时每次重试前的等待时间。
    pub retry_wait: Duration,
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            retry_max: 5,
            retry_wait: Duration::from_secs(20),
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120 Safari/537.36".to_string(),
        }
    }
}

impl FetchConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            request_timeout: Duration::from_secs(config.request_timeout.max(1)),
            retry_max: config.retry_max_for_503,
            retry_wait: Duration::from_secs(config.retry_wait_for_503),
            user_agent: config.user_agent.clone(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("[404] {url} 不存在（作品可能已被删除）")]
    NotFound { url: String },
    #[error("{url} 已重试 {attempts} 次仍返回 503")]
    RetriesExhausted { url: String, attempts: u32 },
    #[error("HTTP {status}: {url}")]
    Status { url: String, status: u16 },
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

/// 一次成功抓取的结果。`text` 已经过实体还原与换行清理。
#[derive(Debug, Clone)]
pub struct Fetched {
    pub text: String,
    /// 被重定向到其他地址时的最终 URL。
    pub redirected_to: Option<String>,
}

pub trait PageFetch {
    fn fetch(&self, url: &str, encoding: &str) -> Result<Fetched, FetchError>;
}

pub struct RetryingFetcher {
    client: Client,
    config: FetchConfig,
}

impl RetryingFetcher {
    pub fn new(config: FetchConfig) -> Result<Self, FetchError> {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("identity"));
        default_headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));
        default_headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            ),
        );
        default_headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent)
                .unwrap_or(HeaderValue::from_static("Mozilla/5.0")),
        );

        let client = Client::builder()
            .default_headers(default_headers)
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self { client, config })
    }
}

impl PageFetch for RetryingFetcher {
    fn fetch(&self, url: &str, encoding: &str) -> Result<Fetched, FetchError> {
        let mut retry_left = self.config.retry_max;
        loop {
            debug!("GET {}", url);
            let resp = self.client.get(url).send()?;
            let status = resp.status();

            if status == StatusCode::SERVICE_UNAVAILABLE {
                if retry_left == 0 {
                    return Err(FetchError::RetriesExhausted {
                        url: url.to_string(),
                        attempts: self.config.retry_max,
                    });
                }
                retry_left -= 1;
                warn!(
                    "server message: 503 Service Unavailable ({})，{} 秒后重试（剩余 {} 次）",
                    url,
                    self.config.retry_wait.as_secs(),
                    retry_left
                );
                std::thread::sleep(self.config.retry_wait);
                continue;
            }
            if status == StatusCode::NOT_FOUND {
                return Err(FetchError::NotFound {
                    url: url.to_string(),
                });
            }
            if !status.is_success() {
                return Err(FetchError::Status {
                    url: url.to_string(),
                    status: status.as_u16(),
                });
            }

            let redirected_to = redirected_url(url, resp.url());
            if let Some(to) = redirected_to.as_deref() {
                debug!("{} 被重定向到 {}", url, to);
            }
            let raw = resp.text_with_charset(encoding)?;
            return Ok(Fetched {
                text: pretreatment_source(&raw),
                redirected_to,
            });
        }
    }
}

fn redirected_url(requested: &str, effective: &reqwest::Url) -> Option<String> {
    let same = match reqwest::Url::parse(requested) {
        Ok(parsed) => &parsed == effective,
        Err(_) => requested == effective.as_str(),
    };
    if same {
        None
    } else {
        Some(effective.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    /// 本地桩服务器：`/busy/<n>` 前 n 次返回 503，`/gone` 返回 404，
    /// `/old` 302 跳转到 `/new`，其余返回 200。
    fn spawn_server() -> (String, Arc<AtomicUsize>) {
        let server = tiny_http::Server::http("127.0.0.1:0").expect("start tiny_http server");
        let base = format!("http://{}", server.server_addr());
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);

        thread::spawn(move || {
            for request in server.incoming_requests() {
                let path = request.url().to_string();
                let seen = counter.fetch_add(1, Ordering::SeqCst);
                let response = if let Some(n) = path.strip_prefix("/busy/") {
                    let n: usize = n.parse().unwrap_or(0);
                    if seen < n {
                        tiny_http::Response::from_string("busy").with_status_code(503)
                    } else {
                        tiny_http::Response::from_string("&lt;ok&gt;\r\n")
                    }
                } else if path == "/gone" {
                    tiny_http::Response::from_string("missing").with_status_code(404)
                } else if path == "/forbidden" {
                    tiny_http::Response::from_string("no").with_status_code(403)
                } else if path == "/old" {
                    let location =
                        tiny_http::Header::from_bytes(&b"Location"[..], &b"/new"[..]).unwrap();
                    tiny_http::Response::from_string("")
                        .with_status_code(302)
                        .with_header(location)
                } else {
                    tiny_http::Response::from_string(format!("page {path}"))
                };
                let _ = request.respond(response);
            }
        });

        (base, hits)
    }

    fn fetcher(retry_max: u32) -> RetryingFetcher {
        RetryingFetcher::new(FetchConfig {
            request_timeout: Duration::from_secs(5),
            retry_max,
            retry_wait: Duration::ZERO,
            user_agent: "webnovel-mirror-test".to_string(),
        })
        .unwrap()
    }

    #[test]
    fn retries_503_until_success_and_pretreats_text() {
        let (base, hits) = spawn_server();
        let fetched = fetcher(5).fetch(&format!("{base}/busy/3"), "UTF-8").unwrap();
        assert_eq!(fetched.text, "<ok>\n");
        assert!(fetched.redirected_to.is_none());
        assert_eq!(hits.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn gives_up_after_retry_budget() {
        let (base, hits) = spawn_server();
        let err = fetcher(2).fetch(&format!("{base}/busy/100"), "UTF-8").unwrap_err();
        assert!(matches!(err, FetchError::RetriesExhausted { attempts: 2, .. }));
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn not_found_is_not_retried() {
        let (base, hits) = spawn_server();
        let err = fetcher(5).fetch(&format!("{base}/gone"), "UTF-8").unwrap_err();
        assert!(matches!(err, FetchError::NotFound { .. }));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn other_status_propagates() {
        let (base, _) = spawn_server();
        let err = fetcher(5).fetch(&format!("{base}/forbidden"), "UTF-8").unwrap_err();
        assert!(matches!(err, FetchError::Status { status: 403, .. }));
    }

    #[test]
    fn redirect_is_surfaced() {
        let (base, _) = spawn_server();
        let fetched = fetcher(5).fetch(&format!("{base}/old"), "UTF-8").unwrap();
        assert_eq!(fetched.redirected_to.as_deref(), Some(format!("{base}/new").as_str()));
        assert_eq!(fetched.text, "page /new");
    }
}
