//! Orders and checkout stock accounting.

pub mod ledger;
pub mod line;
pub mod order;

pub use ledger::{OrderLineError, ProductStock, StockLedger, VariantStock};
pub use line::{OrderLine, OrderLineInput, OrderRequest};
pub use order::{Order, OrderItem, OrderParts, OrderTarget};
