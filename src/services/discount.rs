use async_trait::async_trait;
use rust_decimal::Decimal;
use uuid::Uuid;

/// A priced order line as handed to discount validation.
#[derive(Debug, Clone)]
pub struct PricedLine {
    pub ticket_type_id: Uuid,
    pub quantity: i32,
    pub unit_price: Decimal,
}

#[derive(Debug, Clone)]
pub struct DiscountOutcome {
    pub valid: bool,
    pub amount: Decimal,
    pub message: String,
}

impl DiscountOutcome {
    pub fn none() -> Self {
        Self {
            valid: true,
            amount: Decimal::ZERO,
            message: String::new(),
        }
    }
}

/// External collaborator seam. The real rule engine lives outside this
/// core; checkout only needs a yes/no and an amount.
#[async_trait]
pub trait DiscountValidator: Send + Sync {
    async fn validate_and_calculate(&self, code: &str, items: &[PricedLine]) -> DiscountOutcome;
}

/// Default validator: accepts no codes, discounts nothing.
pub struct NoDiscount;

#[async_trait]
impl DiscountValidator for NoDiscount {
    async fn validate_and_calculate(&self, code: &str, _items: &[PricedLine]) -> DiscountOutcome {
        DiscountOutcome {
            valid: false,
            amount: Decimal::ZERO,
            message: format!("Unknown discount code '{code}'"),
        }
    }
}
