use once_cell::sync::Lazy;
use reqwest::{Client, RequestBuilder, Response};
use std::time::Duration;
use thiserror::Error;

const TIMEOUT_SECONDS: u64 = 15;

const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// 豆瓣移动端接口只接受手机 UA
pub const MOBILE_USER_AGENT: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 14_0 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/14.0 Mobile/15E148 Safari/604.1";

/// 全局 HTTP 客户端
pub static HTTP_CLIENT: Lazy<Client> = Lazy::new(|| {
    Client::builder()
        .timeout(Duration::from_secs(TIMEOUT_SECONDS))
        .user_agent(USER_AGENT)
        .gzip(true)
        .brotli(true)
        .build()
        .expect("Failed to create HTTP client")
});

#[derive(Debug, Error)]
pub enum HttpClientError {
    #[error("请求超时")]
    Timeout,
    #[error("请求失败: {0}")]
    RequestFailed(String),
    #[error("响应异常状态码: {0}")]
    BadStatus(u16),
}

impl From<reqwest::Error> for HttpClientError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            HttpClientError::Timeout
        } else {
            HttpClientError::RequestFailed(e.to_string())
        }
    }
}

/// 附加通用请求头后发送，非 2xx 视为错误
pub async fn send(req: RequestBuilder) -> Result<Response, HttpClientError> {
    let response = req
        .header("Accept-Language", "zh-CN,zh;q=0.9,en;q=0.8")
        .header("Connection", "keep-alive")
        .send()
        .await?;

    if !response.status().is_success() {
        return Err(HttpClientError::BadStatus(response.status().as_u16()));
    }

    Ok(response)
}

/// GET 请求
pub async fn get(
    url: &str,
    referer: Option<&str>,
    user_agent: Option<&str>,
) -> Result<Response, HttpClientError> {
    let mut req = HTTP_CLIENT.get(url);

    if let Some(ref_url) = referer {
        req = req.header("Referer", ref_url);
    }
    if let Some(ua) = user_agent {
        req = req.header("User-Agent", ua);
    }

    send(req).await
}

/// GET 请求并返回文本
pub async fn get_text(
    url: &str,
    referer: Option<&str>,
    user_agent: Option<&str>,
) -> Result<String, HttpClientError> {
    let response = get(url, referer, user_agent).await?;
    response
        .text()
        .await
        .map_err(|e| HttpClientError::RequestFailed(e.to_string()))
}
