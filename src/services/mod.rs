pub mod discount;
pub mod orders;
pub mod reservation;

pub use discount::{DiscountOutcome, DiscountValidator, NoDiscount, PricedLine};
pub use orders::{CancelOutcome, LineItem, OrderService};
pub use reservation::ReservationManager;
