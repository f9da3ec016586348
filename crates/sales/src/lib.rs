//! Sales Orders domain module (event-sourced).
//!
//! Business rules for sales orders as deterministic domain logic (no IO, no
//! storage). Quotations start in draft, may be marked sent, and become sales
//! orders on confirmation.

pub mod order;

pub use order::{
    AddLine, CarrierAssigned, CarrierId, ConfirmOrder, CreateSalesOrder, LineAdded, MarkSent,
    OrderConfirmed, OrderLine, OrderSent, PaymentModeId, PaymentTermId, SalesOrder,
    SalesOrderCommand, SalesOrderCreated, SalesOrderEvent, SalesOrderHeader, SalesOrderId,
    SalesOrderStatus, SetCarrier,
};
