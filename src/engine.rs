use chrono::{DateTime, Utc};
use hourglass_rs::{SafeTimeProvider, TimeSource};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::info_span;

use crate::allocation::{AllocationOutcome, AllocationRequest, PaymentAllocator};
use crate::arrears::{ArrearsAggregator, ArrearsSummary};
use crate::bulk::{BulkCollector, BulkReport, Selection};
use crate::config::BillingConfig;
use crate::errors::Result;
use crate::events::{Event, EventStore};
use crate::generator::{GenerationReport, InvoiceGenerator};
use crate::invoice::Invoice;
use crate::lock::MemberLocks;
use crate::member::{MemberDirectory, MemoryDirectory};
use crate::period::Period;
use crate::receipt::{ReceiptSequence, SequentialReceipts};
use crate::store::{InvoiceStore, MemoryStore};
use crate::types::{MemberId, PaymentMeta};

/// the billing engine facade
///
/// Wires the store, member directory, receipt sequence, clock, per-member
/// locks, and event log behind the engine's operations. All methods take
/// `&self`; callers may share one engine across threads.
pub struct BillingEngine {
    store: Arc<dyn InvoiceStore>,
    directory: Arc<dyn MemberDirectory>,
    receipts: Arc<dyn ReceiptSequence>,
    config: BillingConfig,
    time: SafeTimeProvider,
    locks: MemberLocks,
    events: Mutex<EventStore>,
}

impl BillingEngine {
    pub fn builder() -> BillingEngineBuilder {
        BillingEngineBuilder::new()
    }

    pub fn config(&self) -> &BillingConfig {
        &self.config
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.time.now()
    }

    /// the calendar period containing the engine's current time
    pub fn current_period(&self) -> Period {
        Period::from_date(self.now().date_naive())
    }

    /// create invoices for every eligible active member in the period
    pub fn generate_for_period(&self, period: Period) -> Result<GenerationReport> {
        let _span = info_span!("generate_for_period", %period).entered();
        let members = self.directory.active_members()?;
        let generator = InvoiceGenerator::new(
            self.store.as_ref(),
            self.receipts.as_ref(),
            &self.locks,
            &self.config,
        );
        let mut events = self.events.lock();
        Ok(generator.generate_for_period(&members, period, self.now(), &mut events))
    }

    /// convenience for the scheduled monthly run
    pub fn generate_current_period(&self) -> Result<GenerationReport> {
        self.generate_for_period(self.current_period())
    }

    /// distribute one payment across the member's arrears, oldest first
    pub fn allocate(&self, request: &AllocationRequest) -> Result<AllocationOutcome> {
        let _span = info_span!("allocate", member = %request.member_id).entered();
        let allocator = PaymentAllocator::new(
            self.store.as_ref(),
            self.receipts.as_ref(),
            &self.locks,
            &self.config,
        );
        let mut events = self.events.lock();
        allocator.allocate(request, self.now(), &mut events)
    }

    pub fn arrears_for(&self, member_id: MemberId) -> Result<ArrearsSummary> {
        ArrearsAggregator::new(self.store.as_ref()).arrears_for(member_id)
    }

    pub fn arrears_for_all(&self) -> Result<Vec<ArrearsSummary>> {
        ArrearsAggregator::new(self.store.as_ref()).arrears_for_all()
    }

    /// collect a payment-matrix submission, one receipt per member-batch
    pub fn bulk_allocate(&self, selections: &[Selection], meta: PaymentMeta) -> BulkReport {
        let _span = info_span!("bulk_allocate", cells = selections.len()).entered();
        let collector = BulkCollector::new(
            self.store.as_ref(),
            self.directory.as_ref(),
            self.receipts.as_ref(),
            &self.locks,
            &self.config,
        );
        let mut events = self.events.lock();
        collector.bulk_allocate(selections, meta, self.now(), &mut events)
    }

    /// the member's open invoices in allocation order, for previews
    pub fn pending_invoices_for(&self, member_id: MemberId) -> Result<Vec<Invoice>> {
        self.store.open_invoices(member_id)
    }

    /// drain the events accumulated by operations since the last call
    pub fn take_events(&self) -> Vec<Event> {
        self.events.lock().take_events()
    }
}

/// builder for the engine; every collaborator has an in-memory default
pub struct BillingEngineBuilder {
    store: Option<Arc<dyn InvoiceStore>>,
    directory: Option<Arc<dyn MemberDirectory>>,
    receipts: Option<Arc<dyn ReceiptSequence>>,
    config: BillingConfig,
    time_source: TimeSource,
}

impl BillingEngineBuilder {
    pub fn new() -> Self {
        Self {
            store: None,
            directory: None,
            receipts: None,
            config: BillingConfig::default(),
            time_source: TimeSource::System,
        }
    }

    pub fn store(mut self, store: Arc<dyn InvoiceStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn directory(mut self, directory: Arc<dyn MemberDirectory>) -> Self {
        self.directory = Some(directory);
        self
    }

    pub fn receipts(mut self, receipts: Arc<dyn ReceiptSequence>) -> Self {
        self.receipts = Some(receipts);
        self
    }

    pub fn config(mut self, config: BillingConfig) -> Self {
        self.config = config;
        self
    }

    pub fn time_source(mut self, source: TimeSource) -> Self {
        self.time_source = source;
        self
    }

    pub fn build(self) -> BillingEngine {
        BillingEngine {
            store: self
                .store
                .unwrap_or_else(|| Arc::new(MemoryStore::new())),
            directory: self
                .directory
                .unwrap_or_else(|| Arc::new(MemoryDirectory::new())),
            receipts: self
                .receipts
                .unwrap_or_else(|| Arc::new(SequentialReceipts::new("SND"))),
            config: self.config,
            time: SafeTimeProvider::new(self.time_source),
            locks: MemberLocks::new(),
            events: Mutex::new(EventStore::new()),
        }
    }
}

impl Default for BillingEngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
