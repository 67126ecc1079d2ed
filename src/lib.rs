pub mod allocation;
pub mod arrears;
pub mod bulk;
pub mod config;
pub mod decimal;
pub mod engine;
pub mod errors;
pub mod events;
pub mod generator;
pub mod invoice;
pub mod lock;
pub mod member;
pub mod period;
pub mod receipt;
pub mod store;
pub mod types;

// re-export key types
pub use allocation::{Allocation, AllocationOutcome, AllocationRequest, PaymentAllocator};
pub use arrears::{ArrearsAggregator, ArrearsSummary, PeriodBalance};
pub use bulk::{BulkCollector, BulkFailure, BulkReport, Selection};
pub use config::{AdvancePolicy, BillingConfig, DueDatePolicy};
pub use decimal::Money;
pub use engine::{BillingEngine, BillingEngineBuilder};
pub use errors::{BillingError, Result};
pub use events::{Event, EventStore};
pub use generator::{GenerationFailure, GenerationReport, InvoiceGenerator};
pub use invoice::{Invoice, Payment};
pub use lock::MemberLocks;
pub use member::{Member, MemberDirectory, MemoryDirectory};
pub use period::{Period, PeriodCalendar};
pub use receipt::{ReceiptData, ReceiptLine, ReceiptSequence, SequentialReceipts};
pub use store::{InvoiceStore, MemoryStore, StoreTxn};
pub use types::{
    BillingFrequency, InvoiceId, InvoiceStatus, MemberId, PaymentId, PaymentMeta, PaymentMethod,
};

// re-export external dependencies that users will need
pub use chrono;
pub use hourglass_rs::{SafeTimeProvider, TimeSource};
pub use rust_decimal::Decimal;
pub use uuid::Uuid;
