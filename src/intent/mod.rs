use crate::coins;
use std::fmt;

/// Closed set of message intents. Classification is total: anything that
/// matches no rule is `NonWeb3`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntentKind {
    PriceQuery,
    WalletQuery,
    Web3Chat,
    NonWeb3,
}

impl IntentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntentKind::PriceQuery => "price_query",
            IntentKind::WalletQuery => "wallet_query",
            IntentKind::Web3Chat => "web3_chat",
            IntentKind::NonWeb3 => "non_web3",
        }
    }
}

impl fmt::Display for IntentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Intent {
    pub kind: IntentKind,
    /// Canonical coin id when a rule extracted one (price queries).
    pub coin: Option<String>,
    /// Advisory only; nothing downstream branches on it.
    pub confidence: f32,
}

const PRICE_KEYWORDS: &[&str] = &["price", "worth", "cost", "value", "rate", "how much"];

const WALLET_KEYWORDS: &[&str] = &["wallet", "balance", "portfolio", "account", "my address"];

const WEB3_VOCAB: &[&str] = &[
    "defi",
    "decentralized finance",
    "blockchain",
    "web3",
    "nft",
    "non-fungible",
    "smart contract",
    "dapp",
    "dao",
    "yield farming",
    "liquidity",
    "amm",
    "staking",
    "mining",
    "gas",
    "layer 2",
    "rollup",
    "consensus",
    "token",
    "altcoin",
    "stablecoin",
    "crypto",
    "cryptocurrency",
];

type RuleFn = fn(&str) -> Option<Intent>;

/// Priority-ordered rule table, first match wins: price > wallet > web3_chat,
/// with `non_web3` as the fallback when nothing matches. The order is the
/// tie-break: a message matching both price and wallet vocabulary classifies
/// as a price query.
const RULES: &[(IntentKind, RuleFn)] = &[
    (IntentKind::PriceQuery, price_rule),
    (IntentKind::WalletQuery, wallet_rule),
    (IntentKind::Web3Chat, web3_rule),
];

pub fn classify(text: &str) -> Intent {
    let normalized = normalize(text);
    for (_, rule) in RULES {
        if let Some(intent) = rule(&normalized) {
            return intent;
        }
    }
    Intent { kind: IntentKind::NonWeb3, coin: None, confidence: 0.6 }
}

/// Lowercase, strip punctuation, and pad with spaces so that multi-word
/// phrases and single tokens can both be matched on word boundaries.
fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push(' ');
    for c in text.chars() {
        if c.is_alphanumeric() || c == '-' {
            for lower in c.to_lowercase() {
                out.push(lower);
            }
        } else {
            out.push(' ');
        }
    }
    out.push(' ');
    out
}

fn contains_term(normalized: &str, term: &str) -> bool {
    normalized.contains(&format!(" {} ", term))
}

fn first_coin(normalized: &str) -> Option<&'static coins::CoinEntry> {
    for alias in coins::all_aliases() {
        if contains_term(normalized, alias) {
            return coins::lookup(alias);
        }
    }
    None
}

fn price_rule(normalized: &str) -> Option<Intent> {
    let entry = first_coin(normalized)?;
    let keyword_hits = PRICE_KEYWORDS
        .iter()
        .filter(|kw| contains_term(normalized, kw))
        .count();
    if keyword_hits == 0 {
        return None;
    }
    Some(Intent {
        kind: IntentKind::PriceQuery,
        coin: Some(entry.id.to_string()),
        confidence: (0.8 + 0.05 * (keyword_hits as f32)).min(0.95),
    })
}

fn wallet_rule(normalized: &str) -> Option<Intent> {
    let matched = WALLET_KEYWORDS.iter().any(|kw| contains_term(normalized, kw));
    if !matched {
        return None;
    }
    Some(Intent { kind: IntentKind::WalletQuery, coin: None, confidence: 0.85 })
}

fn web3_rule(normalized: &str) -> Option<Intent> {
    let vocab_hits = WEB3_VOCAB
        .iter()
        .filter(|term| contains_term(normalized, term))
        .count();
    let coin_hits = coins
        ::all_aliases()
        .filter(|alias| contains_term(normalized, alias))
        .count();
    let matches = vocab_hits + coin_hits;
    if matches == 0 {
        return None;
    }
    let words = normalized.split_whitespace().count().max(1);
    let density = (matches as f32) / (words as f32);
    Some(Intent {
        kind: IntentKind::Web3Chat,
        coin: None,
        confidence: (0.4 + density).min(0.95),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coin_plus_price_keyword_is_price_query() {
        let intent = classify("What's the price of ETH?");
        assert_eq!(intent.kind, IntentKind::PriceQuery);
        assert_eq!(intent.coin.as_deref(), Some("ethereum"));
    }

    #[test]
    fn how_much_phrase_counts_as_price_keyword() {
        let intent = classify("how much is solana right now");
        assert_eq!(intent.kind, IntentKind::PriceQuery);
        assert_eq!(intent.coin.as_deref(), Some("solana"));
    }

    #[test]
    fn price_dominates_general_crypto_vocabulary() {
        // "blockchain" and "defi" also match the web3 rule; price wins.
        let intent = classify("bitcoin price vs defi blockchain tokens");
        assert_eq!(intent.kind, IntentKind::PriceQuery);
        assert_eq!(intent.coin.as_deref(), Some("bitcoin"));
    }

    #[test]
    fn price_dominates_wallet_vocabulary() {
        let intent = classify("what is the btc price in my wallet");
        assert_eq!(intent.kind, IntentKind::PriceQuery);
    }

    #[test]
    fn wallet_keywords_classify_as_wallet_query() {
        assert_eq!(classify("show my wallet balance").kind, IntentKind::WalletQuery);
        assert_eq!(classify("check my address").kind, IntentKind::WalletQuery);
    }

    #[test]
    fn web3_vocabulary_classifies_as_web3_chat() {
        let intent = classify("What is DeFi?");
        assert_eq!(intent.kind, IntentKind::Web3Chat);
        assert!(intent.coin.is_none());
    }

    #[test]
    fn coin_mention_without_price_keyword_is_web3_chat() {
        assert_eq!(classify("tell me about ethereum staking").kind, IntentKind::Web3Chat);
    }

    #[test]
    fn unmatched_input_is_non_web3() {
        let intent = classify("what should I cook for dinner tonight");
        assert_eq!(intent.kind, IntentKind::NonWeb3);
    }

    #[test]
    fn classification_is_total_on_degenerate_input() {
        assert_eq!(classify("").kind, IntentKind::NonWeb3);
        assert_eq!(classify("???!!!").kind, IntentKind::NonWeb3);
    }

    #[test]
    fn price_keyword_without_coin_is_not_price_query() {
        // "gas price" has no coin entity; falls through to the web3 rule.
        assert_eq!(classify("why is the gas price so high").kind, IntentKind::Web3Chat);
    }

    #[test]
    fn coin_alias_matches_on_word_boundaries_only() {
        // "ethic" contains "eth" but must not read as a coin mention.
        assert_eq!(classify("is it ethic to cost cut").kind, IntentKind::NonWeb3);
    }

    #[test]
    fn confidence_stays_in_unit_interval() {
        for text in ["btc price", "my wallet", "defi nft dao gas staking", "hello there"] {
            let c = classify(text).confidence;
            assert!((0.0..=1.0).contains(&c), "confidence {} out of range for {:?}", c, text);
        }
    }
}
