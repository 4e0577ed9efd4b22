use std::future::Future;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE, ORIGIN, REFERER, USER_AGENT};
use reqwest::{Method, RequestBuilder, StatusCode, Url};

use super::ListSource;
use crate::config::PortalEndpoints;
use crate::error::SyncError;
use crate::model::list_item::{ListItem, ListResponse};
use crate::util::html_form::{parse_login_form, LoginForm};

const BROWSER_AGENT: &str = "Mozilla/5.0 (X11; U; Linux x86_64; en-US; rv:1.9.2.13) \
                             Gecko/20101206 Ubuntu/10.10 (maverick) Firefox/3.6.13";
const LIST_ACCEPT: &str = "application/json, text/javascript, */*; q=0.01";
const CSRF_COOKIE: &str = "csrf";

/// Authenticated portal state: an HTTP client, the cookie jar it writes to,
/// and the `Referer` sent on list requests after sign-in.
pub struct Session {
    client: reqwest::Client,
    cookies: Arc<Jar>,
    referer: Url,
}

impl Session {
    pub fn new(client: reqwest::Client, cookies: Arc<Jar>, referer: Url) -> Self {
        Self {
            client,
            cookies,
            referer,
        }
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    pub fn referer(&self) -> &Url {
        &self.referer
    }

    /// Value of the named cookie as it would be sent to the first matching URL.
    pub fn cookie(&self, name: &str, urls: &[&Url]) -> Option<String> {
        urls.iter().find_map(|url| {
            let header = self.cookies.cookies(url)?;
            let header = header.to_str().ok()?;
            header.split(';').find_map(|pair| {
                let (key, value) = pair.split_once('=')?;
                (key.trim() == name).then(|| value.trim().to_string())
            })
        })
    }
}

/// Produces a logged-in [`Session`] for the household list portal.
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn login(&self) -> Result<Session>;
}

/// Signs in by scraping the portal's landing page form and posting it back.
pub struct FormLogin {
    email: String,
    password: String,
    portal: Url,
}

impl FormLogin {
    pub fn new(email: String, password: String, portal: Url) -> Self {
        Self {
            email,
            password,
            portal,
        }
    }

    fn default_headers(&self) -> Result<HeaderMap> {
        let origin = self.portal.origin().ascii_serialization();
        let referer = self
            .portal
            .join("/spa/index.html")
            .context("Portal URL cannot carry a path")?;

        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_AGENT));
        headers.insert("Charset", HeaderValue::from_static("utf-8"));
        headers.insert(ORIGIN, HeaderValue::from_str(&origin)?);
        headers.insert(REFERER, HeaderValue::from_str(referer.as_str())?);
        Ok(headers)
    }
}

#[async_trait]
impl Authenticator for FormLogin {
    async fn login(&self) -> Result<Session> {
        let cookies = Arc::new(Jar::default());
        let client = reqwest::Client::builder()
            .default_headers(self.default_headers()?)
            .cookie_provider(cookies.clone())
            .build()
            .context("Failed to build portal HTTP client")?;

        let landing = client
            .get(self.portal.clone())
            .send()
            .await
            .context("Failed to load Alexa login page")?;
        let status = landing.status();
        let page_url = landing.url().clone();
        let page = landing
            .text()
            .await
            .context("Failed to read Alexa login page")?;

        let (action, form) = sign_in_form(status, &page_url, &page)?;
        let params = form.params(&self.email, &self.password);
        tracing::debug!(%action, fields = params.len(), "Posting sign-in form");

        let resp = client
            .post(action)
            .header(REFERER, self.portal.as_str())
            .form(&params)
            .send()
            .await
            .context("Alexa sign-in request failed")?;

        let status = resp.status();
        if !status.is_success() {
            return Err(SyncError::LoginFailed { status }.into());
        }

        tracing::info!("Logged in to Alexa");
        Ok(Session::new(client, cookies, self.portal.clone()))
    }
}

/// Find the sign-in form on the landing page and resolve its action against
/// the URL that served the page, which may differ from the portal after redirects.
fn sign_in_form(status: StatusCode, page_url: &Url, page: &str) -> Result<(Url, LoginForm)> {
    if !status.is_success() {
        return Err(SyncError::LoginFailed { status }.into());
    }
    let form = parse_login_form(page).ok_or(SyncError::LoginFormMissing)?;
    let action = page_url
        .join(&form.action)
        .with_context(|| format!("Login form action {:?} is not a valid URL", form.action))?;
    Ok((action, form))
}

/// Household shopping list behind an authenticated portal session.
pub struct AlexaListClient {
    session: Session,
    endpoints: PortalEndpoints,
}

impl AlexaListClient {
    /// Log in through `auth` and keep the resulting session.
    pub async fn connect(auth: &dyn Authenticator, endpoints: PortalEndpoints) -> Result<Self> {
        let session = auth.login().await?;
        Ok(Self { session, endpoints })
    }

    /// A request against the list endpoint, carrying the post-login `Referer`.
    fn list_request(&self, method: Method) -> RequestBuilder {
        self.session
            .client()
            .request(method, self.endpoints.list.clone())
            .header(REFERER, self.session.referer().as_str())
    }

    fn csrf_token(&self) -> Option<String> {
        self.session
            .cookie(CSRF_COOKIE, &[&self.endpoints.list, &self.endpoints.portal])
    }
}

#[async_trait]
impl ListSource for AlexaListClient {
    fn name(&self) -> &str {
        "Alexa"
    }

    async fn fetch_items(&self) -> Result<Vec<ListItem>> {
        let resp = self
            .list_request(Method::GET)
            .send()
            .await
            .context("Alexa list request failed")?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(SyncError::Api {
                service: "Alexa",
                status,
                body,
            }
            .into());
        }

        let list: ListResponse = resp
            .json()
            .await
            .context("Failed to parse Alexa list response")?;
        tracing::debug!("Fetched {} list items", list.values.len());
        Ok(list.values)
    }

    async fn delete_items(&self, items: Vec<ListItem>) -> usize {
        let csrf = self.csrf_token();
        if csrf.is_none() {
            tracing::warn!("No csrf cookie in session, deleting without it");
        }

        put_each(items, |item| {
            let mut request = self
                .list_request(Method::PUT)
                .header(CONTENT_TYPE, "application/json")
                .header(ACCEPT, LIST_ACCEPT)
                .json(item);
            if let Some(token) = &csrf {
                request = request.header(CSRF_COOKIE, token);
            }
            async move {
                let resp = request.send().await?;
                Ok::<_, anyhow::Error>(resp.status())
            }
        })
        .await
    }

    /// Sent with the client's default SPA `Referer`, not the post-login one.
    async fn logout(&self) {
        let result = self
            .session
            .client()
            .get(self.endpoints.logout.clone())
            .send()
            .await;
        match result {
            Ok(resp) => tracing::debug!("Logged out of Alexa ({})", resp.status()),
            Err(e) => tracing::debug!("Logout failed, ignoring: {e}"),
        }
    }
}

/// Mark every item deleted and hand it to `put`, logging failures and moving on.
async fn put_each<F, Fut>(items: Vec<ListItem>, mut put: F) -> usize
where
    F: FnMut(&ListItem) -> Fut,
    Fut: Future<Output = Result<StatusCode>>,
{
    let mut deleted = 0;
    for mut item in items {
        item.deleted = true;
        match put(&item).await {
            Ok(status) if status.is_success() => deleted += 1,
            Ok(status) => {
                tracing::error!(item_id = %item.item_id, %status, "Error deleting item");
            }
            Err(e) => {
                tracing::error!(item_id = %item.item_id, "Error deleting item: {e:#}");
            }
        }
    }
    deleted
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;
    use std::sync::Mutex;

    fn item(id: &str, text: &str) -> ListItem {
        ListItem {
            item_id: id.into(),
            text: text.into(),
            deleted: false,
            extra: Map::new(),
        }
    }

    fn endpoints() -> PortalEndpoints {
        PortalEndpoints {
            portal: Url::parse("https://alexa.amazon.com").unwrap(),
            list: Url::parse("https://api.amazonalexa.com/v2/householdlists/x/active").unwrap(),
            logout: Url::parse("https://alexa.amazon.com/logout").unwrap(),
        }
    }

    #[tokio::test]
    async fn failed_delete_is_logged_and_the_rest_continue() {
        let seen = Mutex::new(Vec::new());
        let items = vec![item("1", "milk"), item("2", "eggs"), item("3", "bread")];

        let deleted = put_each(items, |item| {
            seen.lock().unwrap().push((item.item_id.clone(), item.deleted));
            let status = if item.item_id == "2" {
                StatusCode::FORBIDDEN
            } else {
                StatusCode::OK
            };
            async move { Ok::<_, anyhow::Error>(status) }
        })
        .await;

        assert_eq!(deleted, 2);
        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                ("1".to_string(), true),
                ("2".to_string(), true),
                ("3".to_string(), true)
            ]
        );
    }

    #[tokio::test]
    async fn transport_error_does_not_stop_deletes() {
        let mut calls = 0;
        let deleted = put_each(vec![item("1", "a"), item("2", "b")], |_| {
            calls += 1;
            let first = calls == 1;
            async move {
                if first {
                    anyhow::bail!("connection reset");
                }
                Ok::<_, anyhow::Error>(StatusCode::OK)
            }
        })
        .await;
        assert_eq!(deleted, 1);
        assert_eq!(calls, 2);
    }

    #[test]
    fn csrf_cookie_is_found_on_any_portal_url() {
        let endpoints = endpoints();
        let jar = Arc::new(Jar::default());
        jar.add_cookie_str("session-id=s1; Domain=amazon.com", &endpoints.portal);
        jar.add_cookie_str("csrf=123456; Domain=amazon.com", &endpoints.portal);

        let session = Session::new(reqwest::Client::new(), jar, endpoints.portal.clone());
        assert_eq!(
            session.cookie(CSRF_COOKIE, &[&endpoints.list, &endpoints.portal]),
            Some("123456".to_string())
        );
        assert_eq!(session.cookie("missing", &[&endpoints.portal]), None);
    }

    struct RejectingLogin;

    #[async_trait]
    impl Authenticator for RejectingLogin {
        async fn login(&self) -> Result<Session> {
            Err(SyncError::LoginFailed {
                status: StatusCode::UNAUTHORIZED,
            }
            .into())
        }
    }

    struct AcceptingLogin;

    #[async_trait]
    impl Authenticator for AcceptingLogin {
        async fn login(&self) -> Result<Session> {
            Ok(Session::new(
                reqwest::Client::new(),
                Arc::new(Jar::default()),
                Url::parse("https://alexa.amazon.com").unwrap(),
            ))
        }
    }

    #[tokio::test]
    async fn connect_surfaces_login_failure() {
        let err = AlexaListClient::connect(&RejectingLogin, endpoints())
            .await
            .err()
            .unwrap();
        match err.downcast_ref::<SyncError>() {
            Some(SyncError::LoginFailed { status }) => assert_eq!(*status, StatusCode::UNAUTHORIZED),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn connect_keeps_the_session() {
        let client = AlexaListClient::connect(&AcceptingLogin, endpoints())
            .await
            .unwrap();
        assert_eq!(client.name(), "Alexa");
        assert!(client.csrf_token().is_none());
    }

    const REDIRECTED_PAGE: &str = r#"<form method="post" action="signin">
        <input type="hidden" name="appActionToken" value="tok"></form>"#;

    #[test]
    fn relative_action_resolves_against_the_redirected_page() {
        let page_url = Url::parse("https://www.amazon.com/ap/page?openid.mode=checkid").unwrap();
        let (action, form) = sign_in_form(StatusCode::OK, &page_url, REDIRECTED_PAGE).unwrap();
        assert_eq!(action.as_str(), "https://www.amazon.com/ap/signin");
        assert_eq!(form.hidden.len(), 1);
    }

    #[test]
    fn root_relative_action_keeps_the_redirected_host() {
        let page_url = Url::parse("http://127.0.0.1:8080/ap/page").unwrap();
        let page = r#"<form action="/ap/signin"></form>"#;
        let (action, _) = sign_in_form(StatusCode::OK, &page_url, page).unwrap();
        assert_eq!(action.as_str(), "http://127.0.0.1:8080/ap/signin");
    }

    #[test]
    fn landing_page_error_status_is_a_login_failure() {
        let page_url = Url::parse("https://alexa.amazon.com/").unwrap();
        let err = sign_in_form(
            StatusCode::SERVICE_UNAVAILABLE,
            &page_url,
            "<html><body>Down for maintenance</body></html>",
        )
        .unwrap_err();
        match err.downcast_ref::<SyncError>() {
            Some(SyncError::LoginFailed { status }) => {
                assert_eq!(*status, StatusCode::SERVICE_UNAVAILABLE)
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn landing_page_without_form_is_reported() {
        let page_url = Url::parse("https://alexa.amazon.com/").unwrap();
        let err = sign_in_form(StatusCode::OK, &page_url, "<p>hello</p>").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SyncError>(),
            Some(SyncError::LoginFormMissing)
        ));
    }

    #[tokio::test]
    async fn list_requests_carry_the_post_login_referer() {
        let client = AlexaListClient::connect(&AcceptingLogin, endpoints())
            .await
            .unwrap();
        for method in [Method::GET, Method::PUT] {
            let request = client.list_request(method).build().unwrap();
            assert_eq!(request.headers()[REFERER], "https://alexa.amazon.com/");
            assert_eq!(request.url(), &endpoints().list);
        }
    }

    #[test]
    fn browser_headers_follow_the_portal() {
        let login = FormLogin::new(
            "me@example.com".into(),
            "pw".into(),
            Url::parse("http://alexa.amazon.com").unwrap(),
        );
        let headers = login.default_headers().unwrap();
        assert_eq!(headers[ORIGIN], "http://alexa.amazon.com");
        assert_eq!(headers[REFERER], "http://alexa.amazon.com/spa/index.html");
        assert!(headers[USER_AGENT].to_str().unwrap().starts_with("Mozilla/5.0"));
    }
}
