// orderflow/src/model/mod.rs

//! Order, order item and status ledger types, plus the status enums for both axes.

pub mod history;
pub mod order;
pub mod order_item;
pub mod status;

pub use history::{latest_status, Actor, NewHistoryEntry, StatusHistoryEntry};
pub use order::{CustomerContact, NewOrder, Order, ShippingAddress};
pub use order_item::{NewOrderItem, OrderItem};
pub use status::{AxisStatus, OrderStatus, PaymentMethod, PaymentStatus, ReminderLevel, StatusAxis, StatusType};
