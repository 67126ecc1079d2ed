use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::decimal::Money;
use crate::period::Period;
use crate::types::{InvoiceId, InvoiceStatus, MemberId, PaymentId, PaymentMethod};

/// all events emitted by engine operations
///
/// Consumers (receipt printers, dashboards, audit trails) read these after an
/// operation returns; the engine itself performs no I/O on them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    // generation events
    InvoiceGenerated {
        invoice_id: InvoiceId,
        member_id: MemberId,
        period: Period,
        amount_due: Money,
        due_date: NaiveDate,
    },
    GenerationCompleted {
        period: Period,
        generated: u32,
        skipped: u32,
        failed: u32,
        timestamp: DateTime<Utc>,
    },

    // payment events
    PaymentReceived {
        payment_id: PaymentId,
        invoice_id: InvoiceId,
        member_id: MemberId,
        amount: Money,
        method: PaymentMethod,
        receipt_no: String,
        timestamp: DateTime<Utc>,
    },
    InvoiceStatusChanged {
        invoice_id: InvoiceId,
        member_id: MemberId,
        old_status: InvoiceStatus,
        new_status: InvoiceStatus,
        timestamp: DateTime<Utc>,
    },
    InvoiceSettled {
        invoice_id: InvoiceId,
        member_id: MemberId,
        period: Period,
        timestamp: DateTime<Utc>,
    },

    // advance events
    AdvanceRetained {
        member_id: MemberId,
        amount: Money,
        stored_as_credit: bool,
        timestamp: DateTime<Utc>,
    },
    CreditApplied {
        member_id: MemberId,
        invoice_id: InvoiceId,
        amount: Money,
        remaining_credit: Money,
        timestamp: DateTime<Utc>,
    },

    // collection events
    ReceiptIssued {
        receipt_no: String,
        member_id: MemberId,
        total: Money,
        periods: Vec<Period>,
        timestamp: DateTime<Utc>,
    },
}

/// event store for collecting events during operations
#[derive(Debug, Default)]
pub struct EventStore {
    events: Vec<Event>,
}

impl EventStore {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub fn emit(&mut self, event: Event) {
        self.events.push(event);
    }

    pub fn take_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}
