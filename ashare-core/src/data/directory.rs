//! Stock names and name search.
//!
//! Independent of bar fetching: a failed lookup here never affects quotes.

use super::http::{build_client, get_text, get_text_with, parse_json};
use super::provider::ProviderError;
use crate::config::{AshareConfig, Endpoints};
use crate::domain::CanonicalSymbol;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

/// Market nodes searched, Shenzhen first.
const SEARCH_NODES: [&str; 2] = ["sz_a", "sh_a"];
/// Rows requested per node listing.
const NODE_PAGE_SIZE: usize = 3000;
/// Sina's realtime quote rejects requests without a finance.sina referer.
const SINA_REFERER: &str = "https://finance.sina.com.cn";

/// One search hit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockListing {
    pub code: String,
    pub name: String,
}

pub struct StockDirectory {
    client: reqwest::blocking::Client,
    endpoints: Endpoints,
}

impl StockDirectory {
    pub fn new(client: reqwest::blocking::Client, endpoints: Endpoints) -> Self {
        Self { client, endpoints }
    }

    pub fn from_config(config: &AshareConfig) -> reqwest::Result<Self> {
        Ok(Self::new(build_client(&config.http)?, config.endpoints.clone()))
    }

    /// Display name of `symbol`, trying Tencent then Sina. `None` if neither
    /// knows it or both are unreachable.
    pub fn stock_name(&self, symbol: &CanonicalSymbol) -> Option<String> {
        let url = format!("{}{symbol}", self.endpoints.tencent_quote);
        match get_text(&self.client, &url) {
            Ok(body) => {
                if let Some(name) = parse_tencent_name(&body) {
                    return Some(name);
                }
                debug!(%symbol, "tencent quote has no name");
            }
            Err(e) => warn!(%symbol, error = %e, "tencent quote lookup failed"),
        }

        let url = format!("{}{symbol}", self.endpoints.sina_quote);
        let request = self.client.get(&url).header("Referer", SINA_REFERER);
        match get_text_with(request, &url) {
            Ok(body) => parse_sina_name(&body),
            Err(e) => {
                warn!(%symbol, error = %e, "sina quote lookup failed");
                None
            }
        }
    }

    /// Listed A-shares whose name contains `keyword`, ignoring case.
    /// Shenzhen hits come before Shanghai hits.
    pub fn search(&self, keyword: &str) -> Vec<StockListing> {
        let mut hits = Vec::new();
        for node in SEARCH_NODES {
            let url = self.node_url(node);
            let listings = get_text(&self.client, &url).and_then(|body| parse_node_listing(&body));
            match listings {
                Ok(listings) => hits.extend(filter_by_name(listings, keyword)),
                Err(e) => warn!(node, error = %e, "market node listing failed, skipping"),
            }
        }
        hits
    }

    fn node_url(&self, node: &str) -> String {
        format!(
            "{}?page=1&num={NODE_PAGE_SIZE}&sort=symbol&asc=1&node={node}",
            self.endpoints.sina_market_node
        )
    }
}

/// `v_sz300718="51~长盛轴承~300718~..."`: the name is field 1.
pub fn parse_tencent_name(body: &str) -> Option<String> {
    let name = body.split('~').nth(1)?.trim();
    (!name.is_empty()).then(|| name.to_string())
}

/// `var hq_str_sz300718="长盛轴承,22.10,...";`: the name is the first field
/// inside the quotes. An unknown symbol yields an empty string.
pub fn parse_sina_name(body: &str) -> Option<String> {
    let quoted = body.split('"').nth(1)?;
    let name = quoted.split(',').next()?.trim();
    (!name.is_empty()).then(|| name.to_string())
}

/// A node listing is a JSON array of objects; entries without both `symbol`
/// and `name` are skipped. A `null` listing is empty.
pub fn parse_node_listing(body: &str) -> Result<Vec<StockListing>, ProviderError> {
    let items = match parse_json(body)? {
        Value::Array(items) => items,
        Value::Null => Vec::new(),
        _ => return Err(ProviderError::parse("listing is not an array")),
    };

    Ok(items
        .iter()
        .filter_map(|item| {
            Some(StockListing {
                code: item.get("symbol")?.as_str()?.to_string(),
                name: item.get("name")?.as_str()?.to_string(),
            })
        })
        .collect())
}

pub fn filter_by_name(listings: Vec<StockListing>, keyword: &str) -> Vec<StockListing> {
    let needle = keyword.to_lowercase();
    listings
        .into_iter()
        .filter(|l| l.name.to_lowercase().contains(&needle))
        .collect()
}
