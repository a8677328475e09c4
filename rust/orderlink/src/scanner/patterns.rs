//! Pattern table - order identifier rules
//!
//! Each rule is a (matcher, url builder, label builder) triple. Matchers are
//! case-insensitive with two capture groups: the label prefix (group 1) and
//! the digit run (group 2). Ids stay opaque strings so arbitrarily long ids
//! survive verbatim.
//!
//! `Regex` keeps no search position between calls, so every scan starts from
//! a clean matcher.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

// ==================== TYPE DEFINITIONS ====================

/// Which order system a rule addresses
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OrderKind {
    Pickup,
    SalesOrder,
    ConnectOrder,
}

impl OrderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderKind::Pickup => "pickup",
            OrderKind::SalesOrder => "sales_order",
            OrderKind::ConnectOrder => "connect_order",
        }
    }
}

/// Builds a string from (prefix, id)
pub type Builder = fn(&str, &str) -> String;

/// One identifier definition
#[derive(Clone, Debug)]
pub struct PatternRule {
    pub kind: OrderKind,
    matcher: Regex,
    url: Builder,
    label: Builder,
}

impl PatternRule {
    /// Compile a rule. `pattern` must define the prefix and id capture groups.
    pub fn new(kind: OrderKind, pattern: &str, url: Builder, label: Builder) -> Result<Self, regex::Error> {
        Ok(Self {
            kind,
            matcher: Regex::new(pattern)?,
            url,
            label,
        })
    }

    pub fn matcher(&self) -> &Regex {
        &self.matcher
    }

    pub fn url(&self, prefix: &str, id: &str) -> String {
        (self.url)(prefix, id)
    }

    pub fn label(&self, prefix: &str, id: &str) -> String {
        (self.label)(prefix, id)
    }
}

// ==================== BUILT-IN TABLE ====================

// `[0-9]` rather than `\d`: only ASCII digits form an id. Word boundaries
// are ASCII-only (`(?-u:\b)`), so an id touching CJK or accented letters
// still matches; `\s` stays Unicode so NBSP separates prefix and id.
const PICKUP_PATTERN: &str =
    r"(?i)(?-u:\b)(pick\s*up|pickup|pick-up|pu/ex|puex|pu)\s?:?#?-?\s?([0-9]{6,})(?-u:\b)";
const SALES_ORDER_PATTERN: &str = r"(?i)(?-u:\b)(SO|sales order)\s?#?:?-?\s?([0-9]{7,})(?-u:\b)";
const CONNECT_ORDER_PATTERN: &str = r"(?i)(?-u:\b)(CO|connect order|connect)\s?#?:?-?\s?([0-9]{6,})(?-u:\b)";

fn pickup_url(_prefix: &str, id: &str) -> String {
    format!("https://brightree.net/OrderEntry/frmPuExPopup.aspx?PuExKey={}&Edit=1", id)
}

fn pickup_label(prefix: &str, id: &str) -> String {
    format!("{} {}", prefix.to_uppercase(), id)
}

fn sales_order_url(_prefix: &str, id: &str) -> String {
    format!(
        "https://brightree.net/OrderEntry/frmSOOrder.aspx?SalesOrderKey={}&Edit=1&ShowAck=1",
        id
    )
}

fn sales_order_label(prefix: &str, id: &str) -> String {
    if prefix.to_lowercase() == "sales order" {
        format!("Sales Order {}", id)
    } else {
        format!("{} {}", prefix.to_uppercase(), id)
    }
}

fn connect_order_url(_prefix: &str, id: &str) -> String {
    format!("https://bhcconnect.com/app/orders/{}", id)
}

/// Case-sensitive against the captured prefix, unlike the sales-order rule.
/// Either branch yields the prefix exactly as written.
fn connect_order_label(prefix: &str, id: &str) -> String {
    if prefix != "CO" {
        format!("{} {}", prefix, id)
    } else {
        format!("{} {}", prefix.to_uppercase(), id)
    }
}

fn build_default_rules() -> Vec<PatternRule> {
    vec![
        PatternRule::new(OrderKind::Pickup, PICKUP_PATTERN, pickup_url, pickup_label)
            .expect("pickup pattern compiles"),
        PatternRule::new(
            OrderKind::SalesOrder,
            SALES_ORDER_PATTERN,
            sales_order_url,
            sales_order_label,
        )
        .expect("sales order pattern compiles"),
        PatternRule::new(
            OrderKind::ConnectOrder,
            CONNECT_ORDER_PATTERN,
            connect_order_url,
            connect_order_label,
        )
        .expect("connect order pattern compiles"),
    ]
}

/// The built-in rules, in declaration order. Compiled once per process.
pub fn default_rules() -> &'static [PatternRule] {
    static RULES: OnceLock<Vec<PatternRule>> = OnceLock::new();
    RULES.get_or_init(build_default_rules)
}

// ==================== TESTS ====================

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(kind: OrderKind) -> &'static PatternRule {
        default_rules().iter().find(|r| r.kind == kind).unwrap()
    }

    fn captures(kind: OrderKind, text: &str) -> Option<(String, String)> {
        let cap = rule(kind).matcher().captures(text)?;
        Some((cap[1].to_string(), cap[2].to_string()))
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(OrderKind::Pickup.as_str(), "pickup");
        assert_eq!(OrderKind::SalesOrder.as_str(), "sales_order");
        assert_eq!(OrderKind::ConnectOrder.as_str(), "connect_order");
    }

    #[test]
    fn test_declaration_order() {
        let kinds: Vec<_> = default_rules().iter().map(|r| r.kind).collect();
        assert_eq!(
            kinds,
            vec![OrderKind::Pickup, OrderKind::SalesOrder, OrderKind::ConnectOrder]
        );
    }

    #[test]
    fn test_pickup_prefix_variants() {
        for (text, prefix) in [
            ("PU 123456", "PU"),
            ("pu#123456", "pu"),
            ("Pick Up: 123456", "Pick Up"),
            ("pickup:123456", "pickup"),
            ("pick-up 123456", "pick-up"),
            ("PU/EX 123456", "PU/EX"),
            ("puex-123456", "puex"),
        ] {
            let (p, id) = captures(OrderKind::Pickup, text).unwrap_or_else(|| panic!("no match: {}", text));
            assert_eq!(p, prefix, "prefix for {}", text);
            assert_eq!(id, "123456");
        }
    }

    #[test]
    fn test_pickup_minimum_digits() {
        assert!(captures(OrderKind::Pickup, "PU 12345").is_none());
        assert!(captures(OrderKind::Pickup, "PU 123456").is_some());
    }

    #[test]
    fn test_sales_order_minimum_digits() {
        assert!(captures(OrderKind::SalesOrder, "SO 123456").is_none());
        assert_eq!(
            captures(OrderKind::SalesOrder, "so#1234567"),
            Some(("so".to_string(), "1234567".to_string()))
        );
    }

    #[test]
    fn test_separator_order_differs_per_rule() {
        // pickup takes `:` before `#`, sales order `#` before `:`
        assert!(captures(OrderKind::Pickup, "PU:#123456").is_some());
        assert!(captures(OrderKind::Pickup, "PU#:123456").is_none());
        assert!(captures(OrderKind::SalesOrder, "SO#:1234567").is_some());
        assert!(captures(OrderKind::SalesOrder, "SO:#1234567").is_none());
    }

    #[test]
    fn test_word_boundaries() {
        assert!(captures(OrderKind::SalesOrder, "ALSO 1234567").is_none());
        assert!(captures(OrderKind::Pickup, "PU 1234567a").is_none());
        assert!(captures(OrderKind::ConnectOrder, "DECO 123456").is_none());
    }

    #[test]
    fn test_non_ascii_letters_are_not_word_characters() {
        assert_eq!(
            captures(OrderKind::SalesOrder, "订单SO 1234567"),
            Some(("SO".to_string(), "1234567".to_string()))
        );
        assert_eq!(
            captures(OrderKind::SalesOrder, "SO 1234567号"),
            Some(("SO".to_string(), "1234567".to_string()))
        );
        assert_eq!(
            captures(OrderKind::Pickup, "éPU 123456"),
            Some(("PU".to_string(), "123456".to_string()))
        );
        assert!(captures(OrderKind::ConnectOrder, "Réf.CO 123456é").is_some());
    }

    #[test]
    fn test_nbsp_separates_prefix_and_id() {
        assert_eq!(
            captures(OrderKind::SalesOrder, "SO\u{a0}1234567"),
            Some(("SO".to_string(), "1234567".to_string()))
        );
        assert!(captures(OrderKind::Pickup, "pick\u{a0}up 123456").is_some());
    }

    #[test]
    fn test_connect_prefers_longest_listed_alternative() {
        assert_eq!(
            captures(OrderKind::ConnectOrder, "connect order 123456"),
            Some(("connect order".to_string(), "123456".to_string()))
        );
        assert_eq!(
            captures(OrderKind::ConnectOrder, "connect 654321"),
            Some(("connect".to_string(), "654321".to_string()))
        );
    }

    #[test]
    fn test_urls_are_exact() {
        assert_eq!(
            rule(OrderKind::Pickup).url("PU", "123456"),
            "https://brightree.net/OrderEntry/frmPuExPopup.aspx?PuExKey=123456&Edit=1"
        );
        assert_eq!(
            rule(OrderKind::SalesOrder).url("SO", "1234567"),
            "https://brightree.net/OrderEntry/frmSOOrder.aspx?SalesOrderKey=1234567&Edit=1&ShowAck=1"
        );
        assert_eq!(
            rule(OrderKind::ConnectOrder).url("CO", "123456"),
            "https://bhcconnect.com/app/orders/123456"
        );
    }

    #[test]
    fn test_labels() {
        assert_eq!(rule(OrderKind::Pickup).label("pickup", "789012"), "PICKUP 789012");
        assert_eq!(rule(OrderKind::SalesOrder).label("SO", "1234567"), "SO 1234567");
        assert_eq!(rule(OrderKind::SalesOrder).label("so", "1234567"), "SO 1234567");
        assert_eq!(
            rule(OrderKind::SalesOrder).label("SALES ORDER", "9876543"),
            "Sales Order 9876543"
        );
        assert_eq!(rule(OrderKind::ConnectOrder).label("CO", "123456"), "CO 123456");
        assert_eq!(rule(OrderKind::ConnectOrder).label("co", "123456"), "co 123456");
        assert_eq!(rule(OrderKind::ConnectOrder).label("connect", "654321"), "connect 654321");
    }

    #[test]
    fn test_long_ids_stay_verbatim() {
        let id = "000012345678901234567890";
        let text = format!("SO {}", id);
        let (_, captured) = captures(OrderKind::SalesOrder, &text).unwrap();
        assert_eq!(captured, id);
        assert!(rule(OrderKind::SalesOrder).url("SO", &captured).contains(id));
    }

    #[test]
    fn test_custom_rule() {
        let custom = PatternRule::new(
            OrderKind::Pickup,
            r"(?i)\b(ref)\s?([0-9]{4,})\b",
            |_, id| format!("https://example.test/{}", id),
            |p, id| format!("{}-{}", p, id),
        )
        .unwrap();
        let cap = custom.matcher().captures("see REF 4242").unwrap();
        assert_eq!(custom.label(&cap[1], &cap[2]), "REF-4242");
    }

    #[test]
    fn test_invalid_pattern_is_error() {
        assert!(PatternRule::new(OrderKind::Pickup, "(unclosed", pickup_url, pickup_label).is_err());
    }
}
