use consilium_core::{Entry, RecordParseError};

use crate::errors::{PublishError, TransientApiError};

/// One published record as fetched from the host.
#[derive(Debug, Clone, PartialEq)]
pub struct ExternalRecord {
    /// Host-assigned record id (comment id).
    pub record_id: u64,
    /// Event the record was posted on, as reported by the host.
    pub event_id_hint: Option<u64>,
    /// The carried entry, or why it could not be read.
    pub parsed: Result<Entry, RecordParseError>,
}

/// Read access to published records.
pub trait RecordSource {
    /// Every record in publication order, optionally only those after `after`.
    ///
    /// A record that fails to parse is returned with its error; it does not
    /// abort the fetch.
    fn fetch_all_records(&self, after: Option<u64>)
        -> Result<Vec<ExternalRecord>, TransientApiError>;

    /// The record already published for `event_id`, if any.
    fn existing_record(&self, event_id: u64) -> Result<Option<ExternalRecord>, TransientApiError>;

    /// Id of the record already published for `event_id`, if any.
    fn find_existing_record(&self, event_id: u64) -> Result<Option<u64>, TransientApiError> {
        Ok(self.existing_record(event_id)?.map(|record| record.record_id))
    }
}

/// Write access to the host.
pub trait Publisher {
    /// Publishes `entry`, returning the new record id.
    fn publish(&self, entry: &Entry) -> Result<u64, PublishError>;
}

impl<T: RecordSource + ?Sized> RecordSource for &T {
    fn fetch_all_records(
        &self,
        after: Option<u64>,
    ) -> Result<Vec<ExternalRecord>, TransientApiError> {
        (**self).fetch_all_records(after)
    }

    fn existing_record(&self, event_id: u64) -> Result<Option<ExternalRecord>, TransientApiError> {
        (**self).existing_record(event_id)
    }

    fn find_existing_record(&self, event_id: u64) -> Result<Option<u64>, TransientApiError> {
        (**self).find_existing_record(event_id)
    }
}

impl<T: Publisher + ?Sized> Publisher for &T {
    fn publish(&self, entry: &Entry) -> Result<u64, PublishError> {
        (**self).publish(entry)
    }
}
