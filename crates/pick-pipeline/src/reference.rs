//! Static reference data behind every deterministic fallback.

use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceQuote {
    pub price: f64,
    pub name: String,
    pub sector: String,
    pub market_cap: f64,
}

#[derive(Debug, Clone)]
pub struct ReferenceData {
    quotes: HashMap<String, ReferenceQuote>,
    discovery_lists: HashMap<String, Vec<String>>,
    default_discovery: Vec<String>,
    us_listed: HashSet<String>,
}

const BUILTIN_QUOTES: &[(&str, f64, &str, &str, f64)] = &[
    ("AAPL", 195.0, "Apple Inc.", "Technology", 3.0e12),
    ("MSFT", 420.0, "Microsoft Corporation", "Technology", 3.1e12),
    ("NVDA", 880.0, "NVIDIA Corporation", "Technology", 2.2e12),
    ("GOOGL", 170.0, "Alphabet Inc.", "Communication Services", 2.1e12),
    ("AMZN", 185.0, "Amazon.com Inc.", "Consumer Cyclical", 1.9e12),
    ("META", 500.0, "Meta Platforms Inc.", "Communication Services", 1.3e12),
    ("TSLA", 175.0, "Tesla Inc.", "Consumer Cyclical", 5.6e11),
    ("AMD", 160.0, "Advanced Micro Devices Inc.", "Technology", 2.6e11),
    ("JPM", 200.0, "JPMorgan Chase & Co.", "Financial Services", 5.7e11),
    ("V", 275.0, "Visa Inc.", "Financial Services", 5.6e11),
    ("UNH", 490.0, "UnitedHealth Group Inc.", "Healthcare", 4.5e11),
    ("JNJ", 155.0, "Johnson & Johnson", "Healthcare", 3.7e11),
    ("XOM", 115.0, "Exxon Mobil Corporation", "Energy", 4.6e11),
    ("NFLX", 620.0, "Netflix Inc.", "Communication Services", 2.7e11),
    ("CRM", 290.0, "Salesforce Inc.", "Technology", 2.8e11),
    ("PLTR", 24.0, "Palantir Technologies Inc.", "Technology", 5.2e10),
    ("SOFI", 8.0, "SoFi Technologies Inc.", "Financial Services", 8.5e9),
    ("TSM", 145.0, "Taiwan Semiconductor Manufacturing", "Technology", 7.5e11),
    ("ASML", 950.0, "ASML Holding N.V.", "Technology", 3.7e11),
    ("NVO", 125.0, "Novo Nordisk A/S", "Healthcare", 5.6e11),
    ("SAP", 190.0, "SAP SE", "Technology", 2.2e11),
    ("SONY", 85.0, "Sony Group Corporation", "Technology", 1.1e11),
    ("TM", 235.0, "Toyota Motor Corporation", "Consumer Cyclical", 3.2e11),
    ("BABA", 78.0, "Alibaba Group Holding Ltd.", "Consumer Cyclical", 1.9e11),
    ("MELI", 1700.0, "MercadoLibre Inc.", "Consumer Cyclical", 8.6e10),
    ("SE", 60.0, "Sea Limited", "Communication Services", 3.4e10),
    ("SHEL", 70.0, "Shell plc", "Energy", 2.2e11),
];

const BUILTIN_DISCOVERY: &[(&str, &[&str])] = &[
    ("international-plays", &["TSM", "ASML", "NVO"]),
    ("government-trades", &["NVDA", "MSFT", "AMZN"]),
    ("sector-rotation", &["XOM", "JPM", "UNH"]),
    ("small-cap-growth", &["PLTR", "SOFI", "SE"]),
];

const DEFAULT_DISCOVERY: &[&str] = &["AAPL", "MSFT", "NVDA"];

/// Large US listings rejected by the international-plays filter
const US_LISTED: &[&str] = &[
    "AAPL", "MSFT", "NVDA", "GOOGL", "GOOG", "AMZN", "META", "TSLA", "AMD", "INTC",
    "JPM", "BAC", "WFC", "GS", "MS", "V", "MA", "PYPL", "JNJ", "PFE",
    "UNH", "MRK", "ABBV", "LLY", "XOM", "CVX", "DIS", "NFLX", "CRM", "ORCL",
    "ADBE", "CSCO", "PEP", "KO", "WMT", "HD", "COST", "NKE", "MCD", "BA",
    "CAT", "GE", "IBM", "QCOM", "AVGO", "TXN", "MU", "UBER", "PLTR", "COIN",
    "T", "VZ",
];

const ADR_STYLE_PRICE: f64 = 25.0;
const SHORT_TICKER_PRICE: f64 = 150.0;
const DEFAULT_PRICE: f64 = 75.0;

impl Default for ReferenceData {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ReferenceData {
    pub fn builtin() -> Self {
        let quotes = BUILTIN_QUOTES
            .iter()
            .map(|(ticker, price, name, sector, cap)| {
                (
                    ticker.to_string(),
                    ReferenceQuote {
                        price: *price,
                        name: name.to_string(),
                        sector: sector.to_string(),
                        market_cap: *cap,
                    },
                )
            })
            .collect();
        let discovery_lists = BUILTIN_DISCOVERY
            .iter()
            .map(|(method, tickers)| {
                (method.to_string(), tickers.iter().map(|t| t.to_string()).collect())
            })
            .collect();

        Self {
            quotes,
            discovery_lists,
            default_discovery: DEFAULT_DISCOVERY.iter().map(|t| t.to_string()).collect(),
            us_listed: US_LISTED.iter().map(|t| t.to_string()).collect(),
        }
    }

    pub fn empty() -> Self {
        Self {
            quotes: HashMap::new(),
            discovery_lists: HashMap::new(),
            default_discovery: Vec::new(),
            us_listed: HashSet::new(),
        }
    }

    pub fn with_quote(mut self, ticker: &str, quote: ReferenceQuote) -> Self {
        self.quotes.insert(ticker.to_uppercase(), quote);
        self
    }

    pub fn with_discovery_list(mut self, method: &str, tickers: &[&str]) -> Self {
        self.discovery_lists.insert(
            method.to_lowercase(),
            tickers.iter().map(|t| t.to_uppercase()).collect(),
        );
        self
    }

    pub fn with_default_discovery(mut self, tickers: &[&str]) -> Self {
        self.default_discovery = tickers.iter().map(|t| t.to_uppercase()).collect();
        self
    }

    pub fn with_us_listed(mut self, tickers: &[&str]) -> Self {
        self.us_listed.extend(tickers.iter().map(|t| t.to_uppercase()));
        self
    }

    pub fn quote(&self, ticker: &str) -> Option<&ReferenceQuote> {
        self.quotes.get(&ticker.to_uppercase())
    }

    /// Deterministic price for a ticker the vendor could not quote: the table
    /// value if known, otherwise a shape heuristic.
    pub fn fallback_price(&self, ticker: &str) -> f64 {
        if let Some(quote) = self.quote(ticker) {
            return quote.price;
        }
        if ticker.contains('.') {
            ADR_STYLE_PRICE
        } else if ticker.len() <= 3 {
            SHORT_TICKER_PRICE
        } else {
            DEFAULT_PRICE
        }
    }

    pub fn discovery_fallback(&self, method: &str) -> &[String] {
        self.discovery_lists
            .get(&method.to_lowercase())
            .unwrap_or(&self.default_discovery)
    }

    pub fn is_us_listed(&self, ticker: &str) -> bool {
        self.us_listed.contains(&ticker.to_uppercase())
    }
}

/// Market-cap bucket for a dollar capitalization
pub fn market_cap_bucket(market_cap: f64) -> &'static str {
    if market_cap >= 10e9 {
        "large"
    } else if market_cap >= 2e9 {
        "mid"
    } else {
        "small"
    }
}
