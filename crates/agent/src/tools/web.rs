//! Web capabilities: web_search and web_fetch.

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use serde_json::json;
use std::sync::OnceLock;
use tracing::debug;

use super::ToolTrait;

const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36";

/// Web search via the Brave Search API
pub struct WebSearchTool {
    api_key: String,
    max_results: u32,
}

impl WebSearchTool {
    pub fn new(api_key: Option<String>, max_results: u32) -> Self {
        let api_key = api_key
            .or_else(|| std::env::var("BRAVE_API_KEY").ok())
            .unwrap_or_default();
        Self {
            api_key,
            max_results,
        }
    }
}

#[derive(Deserialize)]
struct WebSearchArgs {
    query: String,
    count: Option<u32>,
}

#[async_trait]
impl ToolTrait for WebSearchTool {
    fn name(&self) -> &str {
        "web_search"
    }
    fn description(&self) -> &str {
        "Search the web. Returns titles, URLs, and snippets."
    }
    fn parameters(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "Search query" },
                "count": { "type": "integer", "description": "Number of results (1-10)", "minimum": 1, "maximum": 10 }
            },
            "required": ["query"]
        })
    }
    async fn execute(
        &self,
        args: serde_json::Value,
    ) -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
        if self.api_key.is_empty() {
            return Ok("Error: no search API key configured".to_string());
        }
        let args: WebSearchArgs = serde_json::from_value(args)?;
        let count = args.count.unwrap_or(self.max_results).clamp(1, 10);
        debug!("web search: {}", args.query);

        let client = reqwest::Client::new();
        let response = client
            .get("https://api.search.brave.com/res/v1/web/search")
            .query(&[("q", &args.query), ("count", &count.to_string())])
            .header("Accept", "application/json")
            .header("X-Subscription-Token", &self.api_key)
            .timeout(std::time::Duration::from_secs(10))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Ok(format!("Error: search API returned {}", status));
        }

        let data: serde_json::Value = response.json().await?;
        let results = data
            .get("web")
            .and_then(|w| w.get("results"))
            .and_then(|r| r.as_array());

        let Some(results) = results.filter(|r| !r.is_empty()) else {
            return Ok(format!("No results for: {}", args.query));
        };

        let mut lines = vec![format!("Results for: {}", args.query)];
        for (i, item) in results.iter().take(count as usize).enumerate() {
            let title = item.get("title").and_then(|t| t.as_str()).unwrap_or("");
            let url = item.get("url").and_then(|u| u.as_str()).unwrap_or("");
            let desc = item
                .get("description")
                .and_then(|d| d.as_str())
                .unwrap_or("");
            lines.push(format!("{}. {}", i + 1, title));
            lines.push(format!("   {}", url));
            if !desc.is_empty() {
                lines.push(format!("   {}", desc));
            }
        }
        Ok(lines.join("\n"))
    }
}

/// Fetch a URL and extract readable text
pub struct WebFetchTool {
    max_chars: usize,
}

impl WebFetchTool {
    pub fn new(max_chars: usize) -> Self {
        Self { max_chars }
    }
}

impl Default for WebFetchTool {
    fn default() -> Self {
        Self::new(50000)
    }
}

#[derive(Deserialize)]
struct WebFetchArgs {
    url: String,
    max_chars: Option<usize>,
}

#[async_trait]
impl ToolTrait for WebFetchTool {
    fn name(&self) -> &str {
        "web_fetch"
    }
    fn description(&self) -> &str {
        "Fetch a URL and extract readable content."
    }
    fn parameters(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "url": { "type": "string", "description": "URL to fetch" },
                "max_chars": { "type": "integer", "description": "Truncate content to this many characters", "minimum": 100 }
            },
            "required": ["url"]
        })
    }
    async fn execute(
        &self,
        args: serde_json::Value,
    ) -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
        let args: WebFetchArgs = serde_json::from_value(args)?;
        let max_chars = args.max_chars.unwrap_or(self.max_chars);
        debug!("fetching {}", args.url);

        let client = reqwest::Client::new();
        let response = client
            .get(&args.url)
            .header("User-Agent", USER_AGENT)
            .timeout(std::time::Duration::from_secs(30))
            .send()
            .await?;

        let status = response.status();
        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        let text = response.text().await?;

        let content = if content_type.contains("application/json") {
            text
        } else if content_type.contains("text/html") {
            extract_text(&text)
        } else {
            text
        };

        let total = content.chars().count();
        let truncated = total > max_chars;
        let content: String = content.chars().take(max_chars).collect();

        Ok(json!({
            "url": args.url,
            "status": status.as_u16(),
            "truncated": truncated,
            "length": total,
            "text": content
        })
        .to_string())
    }
}

/// Strip markup and decode entities, keeping block boundaries as newlines
fn extract_text(html: &str) -> String {
    static NOISE: OnceLock<Regex> = OnceLock::new();
    static BLOCK: OnceLock<Regex> = OnceLock::new();
    static TAG: OnceLock<Regex> = OnceLock::new();
    static BLANKS: OnceLock<Regex> = OnceLock::new();

    let noise = NOISE.get_or_init(|| {
        Regex::new(r"(?is)<script[\s\S]*?</script>|<style[\s\S]*?</style>|<nav[\s\S]*?</nav>|<header[\s\S]*?</header>|<footer[\s\S]*?</footer>|<!--[\s\S]*?-->").unwrap()
    });
    let block = BLOCK.get_or_init(|| {
        Regex::new(r"(?i)</?(p|div|section|article|h[1-6]|li|tr|br|blockquote|pre)[^>]*>").unwrap()
    });
    let tag = TAG.get_or_init(|| Regex::new(r"<[^>]+>").unwrap());
    let blanks = BLANKS.get_or_init(|| Regex::new(r"\n{3,}").unwrap());

    let text = noise.replace_all(html, "");
    let text = block.replace_all(&text, "\n");
    let text = tag.replace_all(&text, "");
    let text = decode_entities(&text);
    let text = blanks.replace_all(&text, "\n\n");
    text.trim().to_string()
}

fn decode_entities(text: &str) -> String {
    text.replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&nbsp;", " ")
}
