use once_cell::sync::Lazy;
use std::collections::HashMap;

/// One supported cryptocurrency: the canonical provider id plus the
/// spellings users actually type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoinEntry {
    pub id: &'static str,
    pub symbol: &'static str,
    pub name: &'static str,
    pub aliases: &'static [&'static str],
}

pub static COINS: &[CoinEntry] = &[
    CoinEntry { id: "bitcoin", symbol: "BTC", name: "Bitcoin", aliases: &["bitcoin", "btc"] },
    CoinEntry { id: "ethereum", symbol: "ETH", name: "Ethereum", aliases: &["ethereum", "eth"] },
    CoinEntry { id: "cardano", symbol: "ADA", name: "Cardano", aliases: &["cardano", "ada"] },
    CoinEntry { id: "solana", symbol: "SOL", name: "Solana", aliases: &["solana", "sol"] },
    CoinEntry { id: "polkadot", symbol: "DOT", name: "Polkadot", aliases: &["polkadot", "dot"] },
    // CoinGecko lists Polygon under matic-network, not polygon.
    CoinEntry { id: "matic-network", symbol: "MATIC", name: "Polygon", aliases: &["polygon", "matic"] },
    CoinEntry { id: "chainlink", symbol: "LINK", name: "Chainlink", aliases: &["chainlink", "link"] },
    CoinEntry { id: "uniswap", symbol: "UNI", name: "Uniswap", aliases: &["uniswap", "uni"] },
    CoinEntry { id: "litecoin", symbol: "LTC", name: "Litecoin", aliases: &["litecoin", "ltc"] },
    CoinEntry { id: "ripple", symbol: "XRP", name: "XRP", aliases: &["ripple", "xrp"] },
    CoinEntry { id: "binancecoin", symbol: "BNB", name: "BNB", aliases: &["binancecoin", "bnb"] },
    CoinEntry { id: "dogecoin", symbol: "DOGE", name: "Dogecoin", aliases: &["dogecoin", "doge"] },
    CoinEntry { id: "shiba-inu", symbol: "SHIB", name: "Shiba Inu", aliases: &["shiba-inu", "shib", "shiba"] },
    CoinEntry { id: "avalanche-2", symbol: "AVAX", name: "Avalanche", aliases: &["avalanche", "avax"] },
];

static ALIAS_INDEX: Lazy<HashMap<&'static str, &'static CoinEntry>> = Lazy::new(|| {
    let mut index = HashMap::new();
    for entry in COINS {
        index.insert(entry.id, entry);
        for alias in entry.aliases {
            index.insert(*alias, entry);
        }
    }
    index
});

/// Resolve a user-typed alias or a canonical id to its registry entry.
pub fn lookup(term: &str) -> Option<&'static CoinEntry> {
    ALIAS_INDEX.get(term.to_lowercase().trim()).copied()
}

/// Every spelling that should count as "a coin was mentioned".
pub fn all_aliases() -> impl Iterator<Item = &'static str> {
    COINS.iter().flat_map(|entry| entry.aliases.iter().copied())
}
