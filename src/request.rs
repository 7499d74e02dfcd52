//! Weibo HTTP client: the trending-topics listing and the paged search
//! endpoint the harvest loop feeds on.
//!
//! Authentication rides on a cached `Cookie` header read from
//! `<cache_dir>/cookies.txt` (exported from a signed-in browser session).
//! A 403 triggers one re-read of that file before giving up, so an operator
//! can drop in fresh cookies while a long harvest keeps running.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use reqwest::StatusCode;
use serde::Deserialize;

use crate::model::{Post, Topic};
use crate::parse::parse_posts;
use crate::{Error, Result};

const HOT_SEARCH_URL: &str = "https://weibo.com/ajax/side/hotSearch";
const SEARCH_URL: &str = "https://s.weibo.com/weibo";
const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/18.5 Safari/605.1.15";
/// Query used to probe whether the session is signed in.
const PROBE_QUERY: &str = "我和佛祖打CS";
/// Responses shorter than this are the signed-out/no-results sentinel page.
const EMPTY_BODY_LEN: usize = 100;

pub struct Client {
    http: reqwest::Client,
    cookies_path: PathBuf,
    cookie_header: RwLock<String>,
}

impl Client {
    pub fn new(cache_dir: impl AsRef<Path>) -> Result<Self> {
        let cache_dir = cache_dir.as_ref();
        if !cache_dir.exists() {
            fs::create_dir_all(cache_dir)?;
        }
        let cookies_path = cache_dir.join("cookies.txt");
        let cookie_header = read_cookies(&cookies_path)?;
        let http = reqwest::Client::builder().user_agent(USER_AGENT).build()?;

        Ok(Self {
            http,
            cookies_path,
            cookie_header: RwLock::new(cookie_header),
        })
    }

    /// Fetches the current hot-search listing.
    pub async fn top_topics(&self) -> Result<Vec<Topic>> {
        #[derive(Deserialize)]
        struct HotSearch {
            data: HotSearchData,
        }
        #[derive(Deserialize)]
        struct HotSearchData {
            realtime: Vec<RealtimeItem>,
        }
        #[derive(Deserialize)]
        struct RealtimeItem {
            word: String,
            #[serde(default)]
            rank: u32,
            #[serde(default)]
            num: u64,
        }

        let response = self
            .http
            .get(HOT_SEARCH_URL)
            .header("accept", "application/json")
            .send()
            .await?;
        let listing: HotSearch = response.json().await?;

        Ok(listing
            .data
            .realtime
            .into_iter()
            .map(|item| Topic {
                name: item.word,
                rank: item.rank,
                count_posts: item.num,
            })
            .collect())
    }

    pub async fn is_signed_in(&self) -> Result<bool> {
        let response = self.search_request(PROBE_QUERY, 1).await?;
        Ok(response.status() == StatusCode::OK)
    }

    /// Fetches one page of search results for `query`. `None` is the sentinel
    /// "nothing here" page; a real page can still parse to an empty list.
    pub async fn search(&self, query: &str, page: i32) -> Result<Option<Vec<Post>>> {
        let mut response = self.search_request(query, page).await?;
        if response.status() == StatusCode::FORBIDDEN {
            // One shot at recovering with freshly cached cookies.
            self.reload_cookies()?;
            response = self.search_request(query, page).await?;
            if response.status() == StatusCode::FORBIDDEN {
                return Err(Error::SignedOut);
            }
        }

        let body = response.text().await?;
        if body.len() < EMPTY_BODY_LEN {
            return Ok(None);
        }
        parse_posts(body).await.map(Some)
    }

    async fn search_request(&self, query: &str, page: i32) -> Result<reqwest::Response> {
        let cookies = self
            .cookie_header
            .read()
            .expect("cookie lock poisoned")
            .clone();
        let page = page.to_string();

        let mut request = self
            .http
            .get(SEARCH_URL)
            .query(&[("q", query), ("page", page.as_str()), ("t", "31")])
            .header("Host", "s.weibo.com")
            .header(
                "Accept",
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            )
            .header("Sec-Fetch-Dest", "document")
            .header("Sec-Fetch-Mode", "navigate")
            .header("Sec-Fetch-Site", "none");
        if !cookies.is_empty() {
            request = request.header("Cookie", cookies);
        }

        Ok(request.send().await?)
    }

    fn reload_cookies(&self) -> Result<()> {
        let fresh = read_cookies(&self.cookies_path)?;
        *self.cookie_header.write().expect("cookie lock poisoned") = fresh;
        Ok(())
    }
}

/// One line of raw `Cookie` header text; missing file means anonymous.
fn read_cookies(path: &Path) -> Result<String> {
    if !path.exists() {
        return Ok(String::new());
    }
    Ok(fs::read_to_string(path)?.trim().to_owned())
}
