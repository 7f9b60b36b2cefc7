//! localzone scans chat messages for informally written clock times
//! ("9pm berlin", "14:30 gmt"), resolves the trailing token to an IANA
//! timezone, converts the stated time to UTC, and later re-localizes that
//! UTC instant into another reader's saved timezone.

pub mod aliases;
pub mod config;
pub mod convert;
pub mod error;
pub mod pipeline;
pub mod preferences;
pub mod providers;
pub mod resolver;
pub mod scanner;

// Re-export commonly used types
pub use aliases::AliasTable;
pub use config::Config;
pub use convert::{CallbackToken, ResolvedInstant};
pub use error::{PipelineError, ProviderError, ResolveError};
pub use pipeline::{LocalizedTime, Pipeline};
pub use preferences::{
    JsonPreferenceStore, MemoryPreferenceStore, Preference, PreferenceStore, UserId,
};
pub use resolver::{GeoPoint, GeoTimezoneProvider, GeocodeProvider, TimezoneResolver};
pub use scanner::{Meridiem, TimeExpression, TimeScanner};
