use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

use crate::api_connection::connection::{ApiConnectionError, FoodLookup};
use crate::api_connection::endpoints::FoodRecord;

/// A busy flag allowing one in-flight operation at a time.
#[derive(Debug, Default)]
pub struct SingleFlight {
    busy: AtomicBool,
}

/// Releases the flag when dropped, on success, error or cancellation alike.
#[must_use]
pub struct FlightGuard<'a> {
    flag: &'a AtomicBool,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

impl SingleFlight {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn try_acquire(&self) -> Option<FlightGuard<'_>> {
        self.busy
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .ok()
            .map(|_| FlightGuard { flag: &self.busy })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

#[derive(Debug)]
pub enum LookupOutcome<T> {
    Found(T),
    NotFound,
    /// Another lookup was already running; nothing was sent.
    Busy,
}

impl<T> LookupOutcome<T> {
    pub fn found(self) -> Option<T> {
        match self {
            LookupOutcome::Found(v) => Some(v),
            _ => None,
        }
    }
}

pub struct BarcodeScanner<L: FoodLookup> {
    lookup: Arc<L>,
    flight: SingleFlight,
}

impl<L: FoodLookup> BarcodeScanner<L> {
    pub fn new(lookup: Arc<L>) -> Self {
        Self {
            lookup,
            flight: SingleFlight::new(),
        }
    }

    /// Handles one scan event. Blank codes are `NotFound` without a request.
    pub async fn scan(&self, code: &str) -> Result<LookupOutcome<FoodRecord>, ApiConnectionError> {
        let Some(_guard) = self.flight.try_acquire() else {
            debug!(code, "Scan ignored, lookup already running");
            return Ok(LookupOutcome::Busy);
        };
        let code = code.trim();
        if code.is_empty() {
            return Ok(LookupOutcome::NotFound);
        }
        match self.lookup.lookup_barcode(code).await? {
            Some(food) => {
                info!(code, fdc_id = ?food.fdc_id, "Barcode matched");
                Ok(LookupOutcome::Found(food))
            }
            None => Ok(LookupOutcome::NotFound),
        }
    }
}

/// Fetches a full food record by id, one request at a time.
pub struct FoodDetailLoader<L: FoodLookup> {
    lookup: Arc<L>,
    flight: SingleFlight,
}

impl<L: FoodLookup> FoodDetailLoader<L> {
    pub fn new(lookup: Arc<L>) -> Self {
        Self {
            lookup,
            flight: SingleFlight::new(),
        }
    }

    pub async fn load(&self, fdc_id: u64) -> Result<LookupOutcome<FoodRecord>, ApiConnectionError> {
        let Some(_guard) = self.flight.try_acquire() else {
            return Ok(LookupOutcome::Busy);
        };
        let food = self.lookup.get_food(fdc_id).await?;
        Ok(LookupOutcome::Found(food))
    }
}
