pub mod measurement;

pub use measurement::{
    sequence_number_of, MalformedRecord, Measurement, MeasurementDraft, NonFiniteField,
};
