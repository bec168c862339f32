//! Keyword-scoring fallback for product search.
//!
//! When the backend's own search returns nothing, the search tool falls
//! back to ranking the product list client-side: tokenize the query, score
//! each product by weighted token overlap against its name and description,
//! and return the best matches. Self-contained and synchronous over
//! already-fetched data.

use serde_json::Value;

/// Minimum token length considered meaningful.
const MIN_TOKEN_LENGTH: usize = 2;

/// Splits text into lowercase alphanumeric tokens.
#[must_use]
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() >= MIN_TOKEN_LENGTH)
        .map(ToString::to_string)
        .collect()
}

/// Scores one product against the query tokens.
///
/// Exact token matches in the name weigh heaviest, then exact matches in
/// the description, then prefix matches anywhere.
fn score_product(query_tokens: &[String], product: &Value) -> usize {
    let name_tokens = tokenize(field(product, "name"));
    let description_tokens = tokenize(field(product, "description"));

    let mut score = 0;
    for token in query_tokens {
        if name_tokens.iter().any(|t| t == token) {
            score += 4;
        } else if description_tokens.iter().any(|t| t == token) {
            score += 2;
        } else if name_tokens
            .iter()
            .chain(description_tokens.iter())
            .any(|t| t.starts_with(token.as_str()))
        {
            score += 1;
        }
    }
    score
}

fn field<'a>(product: &'a Value, key: &str) -> &'a str {
    product.get(key).and_then(Value::as_str).unwrap_or("")
}

/// Ranks `products` against `query`, best first, dropping non-matches.
#[must_use]
pub fn rank_products(query: &str, products: &[Value], limit: usize) -> Vec<Value> {
    let query_tokens = tokenize(query);
    if query_tokens.is_empty() {
        return Vec::new();
    }

    let mut scored: Vec<(usize, &Value)> = products
        .iter()
        .map(|p| (score_product(&query_tokens, p), p))
        .filter(|(score, _)| *score > 0)
        .collect();

    // Stable sort keeps backend order for equal scores.
    scored.sort_by(|a, b| b.0.cmp(&a.0));

    scored
        .into_iter()
        .take(limit)
        .map(|(_, p)| p.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn products() -> Vec<Value> {
        vec![
            json!({"id": 1, "name": "Red Ceramic Mug", "description": "A sturdy red mug"}),
            json!({"id": 2, "name": "Blue T-Shirt", "description": "Cotton shirt in blue"}),
            json!({"id": 3, "name": "Mug Rack", "description": "Holds six mugs"}),
        ]
    }

    #[test]
    fn tokenize_lowercases_and_splits() {
        assert_eq!(tokenize("Red Ceramic-Mug!"), vec!["red", "ceramic", "mug"]);
        assert!(tokenize("a !").is_empty());
    }

    #[test]
    fn name_match_outranks_description_match() {
        let ranked = rank_products("mug", &products(), 10);
        assert_eq!(ranked.len(), 2);
        // "Mug Rack" and "Red Ceramic Mug" both match in the name; "Blue
        // T-Shirt" does not match at all.
        assert!(ranked.iter().all(|p| p["id"] != 2));
    }

    #[test]
    fn prefix_match_counts() {
        let ranked = rank_products("cer", &products(), 10);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0]["id"], 1);
    }

    #[test]
    fn no_match_yields_empty() {
        assert!(rank_products("bicycle", &products(), 10).is_empty());
        assert!(rank_products("", &products(), 10).is_empty());
    }

    #[test]
    fn limit_respected() {
        let ranked = rank_products("mug", &products(), 1);
        assert_eq!(ranked.len(), 1);
    }
}
