pub mod hold;
pub mod order;
pub mod seat;
pub mod ticket;
pub mod ticket_type;

pub use hold::{Hold, HoldState, SeatHoldRow};
pub use order::{Order, OrderStatus};
pub use seat::{Seat, SeatStatus};
pub use ticket::{Ticket, TicketStatus};
pub use ticket_type::TicketType;
