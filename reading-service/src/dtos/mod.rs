pub mod readings;

pub use readings::{KundaliForm, KundaliResponse, PalmRequest, PalmResponse, UploadedFile};
