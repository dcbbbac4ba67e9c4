use crate::fetch::client::HttpClient;
use async_trait::async_trait;

/// An [`HttpClient`] wrapper that appends an API key as a URL query parameter.
///
/// `param_name` is the query parameter name (e.g. `"api_key"`) and `key` is
/// the channel's read key.
pub struct UrlParam<C> {
    pub inner: C,
    pub param_name: String,
    pub key: String,
}

impl<C> UrlParam<C> {
    fn apply(&self, req: &mut reqwest::Request) {
        req.url_mut()
            .query_pairs_mut()
            .append_pair(&self.param_name, &self.key);
    }
}

#[async_trait]
impl<C: HttpClient> HttpClient for UrlParam<C> {
    async fn execute(&self, mut req: reqwest::Request) -> reqwest::Result<reqwest::Response> {
        self.apply(&mut req);
        self.inner.execute(req).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::BasicClient;

    #[test]
    fn test_apply_appends_key() {
        let auth = UrlParam {
            inner: BasicClient::new().unwrap(),
            param_name: "api_key".to_string(),
            key: "READ123".to_string(),
        };
        let mut req = reqwest::Request::new(
            reqwest::Method::GET,
            "https://example.com/channels/1/feeds.csv?results=10"
                .parse()
                .unwrap(),
        );

        auth.apply(&mut req);

        assert_eq!(
            req.url().as_str(),
            "https://example.com/channels/1/feeds.csv?results=10&api_key=READ123"
        );
    }
}
