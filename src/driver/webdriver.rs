//! W3C WebDriver session driver.
//!
//! Talks to a chromedriver-compatible endpoint over HTTP with reqwest.
//! Each worker gets a persistent Chrome profile under the configured
//! profile root, so logins survive across runs per worker.

use super::{ElementHandle, SessionDriver, SessionFactory, Target};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// JSON key carrying an element reference in W3C WebDriver payloads.
const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

/// Poll interval for `wait_for` / `wait_loaded`.
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Quote a string as an XPath literal, including strings containing quotes.
fn xpath_literal(s: &str) -> String {
    if !s.contains('\'') {
        return format!("'{s}'");
    }
    if !s.contains('"') {
        return format!("\"{s}\"");
    }
    // Mixed quotes need concat()
    let parts: Vec<String> = s
        .split('\'')
        .map(|p| format!("'{p}'"))
        .collect();
    format!("concat({})", parts.join(", \"'\", "))
}

/// Translate a target descriptor into an XPath query.
///
/// `scoped` selects the relative form used when searching under a row.
fn target_xpath(target: &Target, scoped: bool) -> String {
    let prefix = if scoped { "./descendant::" } else { "//" };
    match target {
        Target::Text(t) => {
            format!(
                "{prefix}*[text()[contains(normalize-space(.), {})]]",
                xpath_literal(t)
            )
        }
        Target::ExactText(t) => {
            format!("{prefix}*[normalize-space(text())={}]", xpath_literal(t))
        }
        Target::Role { role, name } => {
            format!(
                "{prefix}*[@role={} and (@aria-label={} or normalize-space(.)={})]",
                xpath_literal(role),
                xpath_literal(name),
                xpath_literal(name)
            )
        }
        Target::ButtonWithText(t) => {
            format!(
                "{prefix}div[@role='button'][contains(normalize-space(.), {})]",
                xpath_literal(t)
            )
        }
        Target::CollapsedTreeItem(label) => {
            format!(
                "{prefix}div[@role='treeitem'][@aria-label={}][@aria-expanded='false']",
                xpath_literal(label)
            )
        }
        Target::TreeItemContaining(model) => {
            format!(
                "{prefix}div[@role='treeitem'][contains(normalize-space(.), {})]",
                xpath_literal(model)
            )
        }
        Target::ExpandToggle => format!(
            "{prefix}material-icon[contains(concat(' ', normalize-space(@class), ' '), ' zippy ')][@role='button']"
        ),
        Target::Checkbox => format!("{prefix}material-checkbox[@role='checkbox']"),
    }
}

/// Opens WebDriver sessions against one chromedriver endpoint, with one
/// persistent profile directory per worker.
pub struct WebDriverFactory {
    endpoint: Url,
    profile_root: PathBuf,
    client: reqwest::Client,
}

impl WebDriverFactory {
    pub fn new(mut endpoint: Url, profile_root: PathBuf) -> Result<Self> {
        // Url::join drops the last path segment without this.
        if !endpoint.path().ends_with('/') {
            let path = format!("{}/", endpoint.path());
            endpoint.set_path(&path);
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .context("Failed to build HTTP client for WebDriver")?;

        Ok(Self {
            endpoint,
            profile_root,
            client,
        })
    }
}

#[async_trait]
impl SessionFactory for WebDriverFactory {
    type Driver = WebDriverSession;

    async fn open(&self, worker_id: usize) -> Result<WebDriverSession> {
        let profile = self.profile_root.join(format!("worker_{worker_id}"));
        tokio::fs::create_dir_all(&profile)
            .await
            .with_context(|| format!("Could not create profile dir {}", profile.display()))?;

        let body = json!({
            "capabilities": {
                "alwaysMatch": {
                    "browserName": "chrome",
                    "goog:chromeOptions": {
                        "args": [
                            format!("--user-data-dir={}", profile.display()),
                            "--start-maximized",
                        ]
                    }
                }
            }
        });

        let session_url = self.endpoint.join("session")?;
        let resp: Value = self
            .client
            .post(session_url)
            .json(&body)
            .send()
            .await
            .context("WebDriver endpoint unreachable")?
            .error_for_status()
            .context("WebDriver session creation rejected")?
            .json()
            .await?;

        let session_id = resp
            .pointer("/value/sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow::anyhow!("WebDriver response missing sessionId: {resp}"))?
            .to_string();

        debug!(worker_id, %session_id, "WebDriver session opened");

        Ok(WebDriverSession {
            client: self.client.clone(),
            endpoint: self.endpoint.clone(),
            session_id,
        })
    }
}

/// One live WebDriver session.
pub struct WebDriverSession {
    client: reqwest::Client,
    endpoint: Url,
    session_id: String,
}

impl WebDriverSession {
    fn session_url(&self, suffix: &str) -> Result<Url> {
        Ok(self
            .endpoint
            .join(&format!("session/{}/{}", self.session_id, suffix))?)
    }

    async fn post(&self, suffix: &str, body: Value) -> Result<Value> {
        let url = self.session_url(suffix)?;
        let resp = self.client.post(url).json(&body).send().await?;
        Self::unwrap_value(suffix, resp).await
    }

    async fn get(&self, suffix: &str) -> Result<Value> {
        let url = self.session_url(suffix)?;
        let resp = self.client.get(url).send().await?;
        Self::unwrap_value(suffix, resp).await
    }

    async fn unwrap_value(suffix: &str, resp: reqwest::Response) -> Result<Value> {
        let status = resp.status();
        let body: Value = resp
            .json()
            .await
            .with_context(|| format!("Non-JSON WebDriver response for {suffix}"))?;

        if !status.is_success() {
            let err = body
                .pointer("/value/error")
                .and_then(Value::as_str)
                .unwrap_or("unknown");
            let msg = body
                .pointer("/value/message")
                .and_then(Value::as_str)
                .unwrap_or("");
            return Err(anyhow::anyhow!("WebDriver {suffix} failed: {err}: {msg}"));
        }

        Ok(body["value"].clone())
    }

    async fn execute(&self, script: &str, args: Value) -> Result<Value> {
        self.post("execute/sync", json!({ "script": script, "args": args }))
            .await
    }

    /// Find all matches for `target`, scoped under `within` when given.
    async fn find_all(
        &self,
        within: Option<&ElementHandle>,
        target: &Target,
    ) -> Result<Vec<ElementHandle>> {
        let (suffix, xpath) = match within {
            Some(el) => (
                format!("element/{}/elements", el.0),
                target_xpath(target, true),
            ),
            None => ("elements".to_string(), target_xpath(target, false)),
        };

        let value = self
            .post(&suffix, json!({ "using": "xpath", "value": xpath }))
            .await?;

        let handles = value
            .as_array()
            .map(|arr| {
                arr.iter()
                    .filter_map(|v| v.get(ELEMENT_KEY))
                    .filter_map(Value::as_str)
                    .map(|id| ElementHandle(id.to_string()))
                    .collect()
            })
            .unwrap_or_default();

        Ok(handles)
    }
}

#[async_trait]
impl SessionDriver for WebDriverSession {
    async fn navigate(&mut self, url: &Url) -> Result<()> {
        self.post("url", json!({ "url": url.as_str() }))
            .await
            .with_context(|| format!("Navigation to {url} failed"))?;
        Ok(())
    }

    async fn wait_loaded(&mut self, timeout: Duration) -> Result<()> {
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            let state = self
                .execute("return document.readyState", json!([]))
                .await?;
            if matches!(state.as_str(), Some("interactive") | Some("complete")) {
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(anyhow::anyhow!(
                    "Page did not finish loading within {timeout:?}"
                ));
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn wait_for(&mut self, target: &Target, timeout: Duration) -> Result<ElementHandle> {
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            if let Some(el) = self.find(None, target).await? {
                if self.is_visible(&el).await.unwrap_or(false) {
                    return Ok(el);
                }
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(anyhow::anyhow!(
                    "Timed out after {timeout:?} waiting for {target:?}"
                ));
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn find(
        &mut self,
        within: Option<&ElementHandle>,
        target: &Target,
    ) -> Result<Option<ElementHandle>> {
        let mut handles = self.find_all(within, target).await?;
        if handles.is_empty() {
            Ok(None)
        } else {
            Ok(Some(handles.remove(0)))
        }
    }

    async fn is_visible(&mut self, el: &ElementHandle) -> Result<bool> {
        let value = self.get(&format!("element/{}/displayed", el.0)).await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    async fn attr(&mut self, el: &ElementHandle, name: &str) -> Result<Option<String>> {
        let value = self
            .get(&format!("element/{}/attribute/{name}", el.0))
            .await?;
        Ok(value.as_str().map(str::to_string))
    }

    async fn click(&mut self, el: &ElementHandle) -> Result<()> {
        self.post(&format!("element/{}/click", el.0), json!({}))
            .await?;
        Ok(())
    }

    async fn scroll_into_view(&mut self, el: &ElementHandle) -> Result<()> {
        self.execute(
            "arguments[0].scrollIntoView({block: 'center'})",
            json!([{ ELEMENT_KEY: el.0 }]),
        )
        .await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        let url = self.session_url("")?;
        // session/{id}/ with trailing slash is rejected by some drivers
        let url = Url::parse(url.as_str().trim_end_matches('/'))?;
        self.client
            .delete(url)
            .send()
            .await
            .context("Failed to delete WebDriver session")?;
        debug!(session_id = %self.session_id, "WebDriver session closed");
        Ok(())
    }
}
