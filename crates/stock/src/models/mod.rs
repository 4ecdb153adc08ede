//! Domain models for the stock engine.

pub mod allocation;
pub mod device;
pub mod purchase;
pub mod receipt;
pub mod stock_ledger;

pub use allocation::{
    Allocation, AllocationOutcome, BatchSnapshot, ConsumptionOrder, ParseConsumptionOrderError,
};
pub use device::{Device, NewDevice, ResolvedDevice, SkuSpec};
pub use purchase::{
    NewPurchaseLine, NewPurchaseOrder, PurchaseFilter, PurchaseLine, PurchaseLineWithReceived,
    PurchaseOrder, PurchaseOrderDetail, PurchaseOrderSummary,
};
pub use receipt::{OverReceipt, ReceiptRecord, ReceiveItem, ReceiveRequest, ReceiveSummary};
pub use stock_ledger::StockLedgerEntry;
