//! Series publisher that records every signal.

use crate::collector::templates::BoundSeries;
use crate::collector::traits::SeriesPublisher;

/// A recorded publisher call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublisherEvent {
    /// Series id of a declared series.
    Declared(String),
    /// Entity whose series were retracted.
    Retracted(String),
}

#[derive(Debug, Clone, Default)]
pub struct RecordingPublisher {
    events: Vec<PublisherEvent>,
}

impl RecordingPublisher {
    pub fn events(&self) -> &[PublisherEvent] {
        &self.events
    }

    /// Ids of declared series, in declaration order.
    pub fn declared_ids(&self) -> Vec<&str> {
        self.events
            .iter()
            .filter_map(|e| match e {
                PublisherEvent::Declared(id) => Some(id.as_str()),
                PublisherEvent::Retracted(_) => None,
            })
            .collect()
    }

    /// Entities whose series were retracted, in order.
    pub fn retracted(&self) -> Vec<&str> {
        self.events
            .iter()
            .filter_map(|e| match e {
                PublisherEvent::Retracted(entity) => Some(entity.as_str()),
                PublisherEvent::Declared(_) => None,
            })
            .collect()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

impl SeriesPublisher for RecordingPublisher {
    fn declare_series(&mut self, series: &BoundSeries) {
        self.events
            .push(PublisherEvent::Declared(series.id().to_string()));
    }

    fn retract_series(&mut self, entity: &str) {
        self.events
            .push(PublisherEvent::Retracted(entity.to_string()));
    }
}
