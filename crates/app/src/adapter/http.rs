//! Storefront AJAX cart client.
//!
//! The storefront keys the cart on a `cart` cookie, so every request goes
//! through one cookie jar. Passing a cart token attaches to an existing cart.

use std::sync::Arc;

use async_trait::async_trait;
use cartwatch::cart::CartSnapshot;
use reqwest::{Client, Response, Url, cookie::Jar};
use serde::Deserialize;
use serde_json::json;

use crate::adapter::{AdapterError, CartAdapter, CartMutation};

/// [`CartAdapter`] over a storefront's `/cart/*.js` endpoints.
#[derive(Debug, Clone)]
pub struct HttpCartAdapter {
    base_url: String,
    http: Client,
}

impl HttpCartAdapter {
    /// Create a client for the storefront at `base_url`, e.g. `"https://shop.example"`.
    ///
    /// With a `cart_token` the client starts on that cart; otherwise it
    /// follows whichever cart the storefront assigns on the first response.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::InvalidUrl`] for an unparseable `base_url` and
    /// [`AdapterError::Http`] if the client cannot be built.
    pub fn new(base_url: impl Into<String>, cart_token: Option<&str>) -> Result<Self, AdapterError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();

        let url = Url::parse(&base_url).map_err(|error| AdapterError::InvalidUrl {
            url: base_url.clone(),
            reason: error.to_string(),
        })?;

        let jar = Jar::default();

        if let Some(token) = cart_token.map(str::trim).filter(|token| !token.is_empty()) {
            jar.add_cookie_str(&format!("cart={token}; Path=/"), &url);
        }

        let http = Client::builder().cookie_provider(Arc::new(jar)).build()?;

        Ok(Self { base_url, http })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn post(&self, path: &str, body: serde_json::Value) -> Result<(), AdapterError> {
        let response = self.http.post(self.url(path)).json(&body).send().await?;

        check(response).await.map(drop)
    }
}

#[async_trait]
impl CartAdapter for HttpCartAdapter {
    async fn fetch_cart(&self) -> Result<CartSnapshot, AdapterError> {
        let response = self.http.get(self.url("/cart.js")).send().await?;
        let body = check(response).await?;

        CartSnapshot::from_json(&body).map_err(AdapterError::Decode)
    }

    async fn clear_cart(&self) -> Result<(), AdapterError> {
        self.post("/cart/clear.js", json!({})).await
    }

    async fn mutate(&self, mutation: CartMutation) -> Result<(), AdapterError> {
        if !mutation.items.is_empty() {
            self.post("/cart/add.js", json!({ "items": mutation.items }))
                .await?;
        }

        if mutation.updates_cart() {
            self.post(
                "/cart/update.js",
                json!({ "note": mutation.note, "attributes": mutation.attributes }),
            )
            .await?;
        }

        Ok(())
    }
}

#[derive(Debug, Default, Deserialize)]
struct StorefrontError {
    #[serde(default)]
    description: Option<String>,

    #[serde(default)]
    message: Option<String>,
}

async fn check(response: Response) -> Result<String, AdapterError> {
    let status = response.status();
    let body = response.text().await?;

    if status.is_success() {
        return Ok(body);
    }

    Err(rejection(status.as_u16(), body))
}

fn rejection(status: u16, body: String) -> AdapterError {
    let parsed: StorefrontError = serde_json::from_str(&body).unwrap_or_default();

    match parsed.description.or(parsed.message) {
        Some(message) if !message.trim().is_empty() => AdapterError::Rejected(message),
        _ => AdapterError::Status { status, body },
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::BTreeMap,
        sync::atomic::{AtomicI64, Ordering},
    };

    use testresult::TestResult;
    use tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        net::{TcpListener, TcpStream},
    };

    use crate::adapter::MutationItem;

    use super::*;

    #[test]
    fn prefers_description_over_message() {
        let error = rejection(
            422,
            r#"{"status":422,"message":"Cart Error","description":"You can only add 5"}"#.into(),
        );

        assert!(
            matches!(&error, AdapterError::Rejected(message) if message == "You can only add 5"),
            "expected Rejected, got {error:?}"
        );
    }

    #[test]
    fn falls_back_to_message() {
        let error = rejection(422, r#"{"message":"Cart Error"}"#.into());

        assert!(
            matches!(&error, AdapterError::Rejected(message) if message == "Cart Error"),
            "expected Rejected, got {error:?}"
        );
    }

    #[test]
    fn non_json_body_keeps_status() {
        let error = rejection(502, "Bad Gateway".into());

        assert!(
            matches!(&error, AdapterError::Status { status: 502, body } if body == "Bad Gateway"),
            "expected Status, got {error:?}"
        );
    }

    #[test]
    fn trims_trailing_slash() -> TestResult {
        let adapter = HttpCartAdapter::new("https://shop.example/", None)?;

        assert_eq!(adapter.url("/cart.js"), "https://shop.example/cart.js");

        Ok(())
    }

    #[test]
    fn rejects_unparseable_url() {
        let result = HttpCartAdapter::new("not a url", None);

        assert!(
            matches!(result, Err(AdapterError::InvalidUrl { .. })),
            "expected InvalidUrl, got {result:?}"
        );
    }

    /// A storefront that keeps one cart, reachable only with `cart=abc`.
    /// Requests without the cookie see an empty cart and are handed it.
    struct CookieStorefront {
        quantity: AtomicI64,
    }

    impl CookieStorefront {
        async fn serve(quantity: i64) -> Result<String, std::io::Error> {
            let listener = TcpListener::bind("127.0.0.1:0").await?;
            let address = listener.local_addr()?;
            let storefront = Arc::new(Self {
                quantity: AtomicI64::new(quantity),
            });

            tokio::spawn(async move {
                while let Ok((stream, _)) = listener.accept().await {
                    tokio::spawn(Arc::clone(&storefront).handle(stream));
                }
            });

            Ok(format!("http://{address}"))
        }

        async fn handle(self: Arc<Self>, mut stream: TcpStream) {
            let Ok(request) = read_request(&mut stream).await else {
                return;
            };

            let has_cart = request.lines().any(|line| {
                line.split_once(':').is_some_and(|(name, value)| {
                    name.eq_ignore_ascii_case("cookie") && value.contains("cart=abc")
                })
            });
            let path = request.split_whitespace().nth(1).unwrap_or_default();

            let body = match (path, has_cart) {
                ("/cart/clear.js", true) => {
                    self.quantity.store(0, Ordering::SeqCst);
                    "{}".to_string()
                }
                ("/cart/add.js", true) => {
                    self.quantity.fetch_add(1, Ordering::SeqCst);
                    "{}".to_string()
                }
                ("/cart.js", true) => Self::cart_json(self.quantity.load(Ordering::SeqCst)),
                ("/cart.js", false) => Self::cart_json(0),
                _ => "{}".to_string(),
            };

            let response = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\
                 Set-Cookie: cart=abc; Path=/\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );

            let _ = stream.write_all(response.as_bytes()).await;
            let _ = stream.shutdown().await;
        }

        fn cart_json(quantity: i64) -> String {
            let items = if quantity > 0 {
                serde_json::json!([{ "key": "1:a", "id": 1, "quantity": quantity }])
            } else {
                serde_json::json!([])
            };

            serde_json::json!({ "item_count": quantity, "currency": "GBP", "items": items })
                .to_string()
        }
    }

    async fn read_request(stream: &mut TcpStream) -> Result<String, std::io::Error> {
        let mut buffer = Vec::new();
        let mut chunk = [0u8; 1024];

        loop {
            let read = stream.read(&mut chunk).await?;

            if read == 0 {
                break;
            }

            buffer.extend(chunk.iter().take(read));

            let text = String::from_utf8_lossy(&buffer);

            if let Some(end) = text.find("\r\n\r\n") {
                let length = text
                    .lines()
                    .take_while(|line| !line.is_empty())
                    .find_map(|line| {
                        let (name, value) = line.split_once(':')?;

                        name.eq_ignore_ascii_case("content-length")
                            .then(|| value.trim().parse::<usize>().ok())
                            .flatten()
                    })
                    .unwrap_or(0);

                if buffer.len() >= end + 4 + length {
                    break;
                }
            }
        }

        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }

    #[tokio::test]
    async fn follows_the_assigned_cart_across_requests() -> TestResult {
        let base_url = CookieStorefront::serve(0).await?;
        let adapter = HttpCartAdapter::new(base_url, None)?;

        adapter.clear_cart().await?;
        adapter
            .mutate(CartMutation::add([MutationItem {
                id: 1,
                quantity: 1,
                properties: BTreeMap::new(),
                selling_plan: None,
            }]))
            .await?;

        assert_eq!(adapter.fetch_cart().await?.quantity_total(), 1);

        Ok(())
    }

    #[tokio::test]
    async fn cart_token_attaches_to_existing_cart() -> TestResult {
        let base_url = CookieStorefront::serve(2).await?;

        let attached = HttpCartAdapter::new(base_url.clone(), Some("abc"))?;
        let anonymous = HttpCartAdapter::new(base_url, None)?;

        assert_eq!(attached.fetch_cart().await?.quantity_total(), 2);
        assert_eq!(anonymous.fetch_cart().await?.quantity_total(), 0);

        Ok(())
    }
}
