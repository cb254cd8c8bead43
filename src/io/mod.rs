//! Marshalling and unmarshalling engines

pub mod marshaller;
pub mod unmarshaller;

pub use marshaller::{Marshaller, MarshallingContext, marshall_with};
pub use unmarshaller::{Unmarshaller, UnmarshallingContext, unmarshall_with};
