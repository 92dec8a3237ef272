//! Payment test cards, discounts and order statuses

use serde::Serialize;
use std::str::FromStr;

use crate::error::{FixtureError, FixtureResult};

/// What the payment processor does with a card
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CardOutcome {
    Succeeds,
    Declined,
    InsufficientFunds,
    RequiresAuthentication,
}

/// A Stripe test-mode card
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TestCard {
    pub number: &'static str,
    pub expiry: &'static str,
    pub cvc: &'static str,
    pub postal_code: &'static str,
    pub outcome: CardOutcome,
}

const fn card(number: &'static str, outcome: CardOutcome) -> TestCard {
    TestCard {
        number,
        expiry: "12/34",
        cvc: "123",
        postal_code: "12345",
        outcome,
    }
}

impl TestCard {
    pub const SUCCESS: TestCard = card("4242424242424242", CardOutcome::Succeeds);
    pub const DECLINED: TestCard = card("4000000000000002", CardOutcome::Declined);
    pub const INSUFFICIENT_FUNDS: TestCard =
        card("4000000000009995", CardOutcome::InsufficientFunds);
    pub const REQUIRES_AUTH: TestCard =
        card("4000002500003155", CardOutcome::RequiresAuthentication);

    /// Look a card up by the outcome it produces (`success`, `declined`, ...)
    pub fn named(name: &str) -> FixtureResult<TestCard> {
        match name.trim().to_lowercase().replace('-', "_").as_str() {
            "success" | "succeeds" => Ok(TestCard::SUCCESS),
            "declined" => Ok(TestCard::DECLINED),
            "insufficient_funds" => Ok(TestCard::INSUFFICIENT_FUNDS),
            "requires_auth" | "requires_authentication" | "3ds" => Ok(TestCard::REQUIRES_AUTH),
            _ => Err(FixtureError::UnknownCard(name.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscountType {
    Percentage,
    Fixed,
}

impl DiscountType {
    /// Value of the discount type `<select>` option
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscountType::Percentage => "percentage",
            DiscountType::Fixed => "fixed",
        }
    }

    /// Visible label of the option in the discount type dropdown
    pub fn label(&self) -> &'static str {
        match self {
            DiscountType::Percentage => "Percentage",
            DiscountType::Fixed => "Fixed Amount",
        }
    }
}

impl FromStr for DiscountType {
    type Err = FixtureError;

    fn from_str(s: &str) -> FixtureResult<Self> {
        match s.to_lowercase().as_str() {
            "percentage" | "percent" => Ok(DiscountType::Percentage),
            "fixed" | "fixed_amount" => Ok(DiscountType::Fixed),
            _ => Err(FixtureError::UnknownDiscountType(s.to_string())),
        }
    }
}

/// How the promo code list renders a discount: `25%` or `$15.00`
pub fn format_discount(discount_type: DiscountType, value: &str) -> FixtureResult<String> {
    let amount: f64 = value
        .trim()
        .parse()
        .map_err(|_| FixtureError::InvalidDiscountValue {
            value: value.to_string(),
            reason: "not a number".to_string(),
        })?;
    if !amount.is_finite() || amount < 0.0 {
        return Err(FixtureError::InvalidDiscountValue {
            value: value.to_string(),
            reason: "must be a non-negative number".to_string(),
        });
    }

    Ok(match discount_type {
        DiscountType::Percentage => {
            if amount > 100.0 {
                return Err(FixtureError::InvalidDiscountValue {
                    value: value.to_string(),
                    reason: "percentage above 100".to_string(),
                });
            }
            let rendered = format!("{:.2}", amount);
            let rendered = rendered.trim_end_matches('0').trim_end_matches('.');
            format!("{}%", rendered)
        }
        DiscountType::Fixed => format!("${:.2}", amount),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Completed,
    Refunded,
    PartiallyRefunded,
    Cancelled,
    Failed,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Completed => "completed",
            OrderStatus::Refunded => "refunded",
            OrderStatus::PartiallyRefunded => "partially_refunded",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Failed => "failed",
        }
    }

    /// Only a completed order can be refunded
    pub fn can_refund(&self) -> bool {
        matches!(self, OrderStatus::Completed)
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = FixtureError;

    /// Accepts badge text as rendered (`Partially Refunded`) as well as the
    /// stored value.
    fn from_str(s: &str) -> FixtureResult<Self> {
        let normalized = s.trim().to_lowercase().replace([' ', '-'], "_");
        match normalized.as_str() {
            "pending" => Ok(OrderStatus::Pending),
            "completed" | "paid" => Ok(OrderStatus::Completed),
            "refunded" => Ok(OrderStatus::Refunded),
            "partially_refunded" => Ok(OrderStatus::PartiallyRefunded),
            "cancelled" | "canceled" => Ok(OrderStatus::Cancelled),
            "failed" => Ok(OrderStatus::Failed),
            _ => Err(FixtureError::UnknownOrderStatus(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(DiscountType::Percentage, "25", "25%")]
    #[test_case(DiscountType::Percentage, "12.5", "12.5%")]
    #[test_case(DiscountType::Percentage, "100.00", "100%")]
    #[test_case(DiscountType::Fixed, "15.00", "$15.00")]
    #[test_case(DiscountType::Fixed, "5", "$5.00")]
    #[test_case(DiscountType::Fixed, " 7.5 ", "$7.50")]
    fn test_format_discount(discount_type: DiscountType, value: &str, expected: &str) {
        assert_eq!(format_discount(discount_type, value).unwrap(), expected);
    }

    #[test]
    fn test_format_discount_rejects_garbage() {
        assert!(format_discount(DiscountType::Fixed, "abc").is_err());
        assert!(format_discount(DiscountType::Fixed, "-1").is_err());
        assert!(format_discount(DiscountType::Percentage, "150").is_err());
    }

    #[test]
    fn test_only_completed_orders_refund() {
        assert!(OrderStatus::Completed.can_refund());
        assert!(!OrderStatus::Refunded.can_refund());
        assert!(!OrderStatus::Pending.can_refund());
    }

    #[test]
    fn test_status_parse_badge_text() {
        assert_eq!(
            "Partially Refunded".parse::<OrderStatus>().unwrap(),
            OrderStatus::PartiallyRefunded
        );
        assert_eq!("COMPLETED".parse::<OrderStatus>().unwrap(), OrderStatus::Completed);
        assert!("lost".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn test_cards() {
        assert_eq!(TestCard::SUCCESS.outcome, CardOutcome::Succeeds);
        assert_eq!(TestCard::DECLINED.number.len(), 16);
        assert_eq!(TestCard::named("3ds").unwrap(), TestCard::REQUIRES_AUTH);
        assert_eq!(TestCard::named("Insufficient-Funds").unwrap(), TestCard::INSUFFICIENT_FUNDS);
        assert!(TestCard::named("amex").is_err());
    }
}
