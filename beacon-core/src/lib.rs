#![cfg_attr(not(test), no_std)]

mod fmt;

pub mod advertising;
pub mod battery;
pub mod bcd;
pub mod beacon;
pub mod config;
pub mod flash;
pub mod history;
pub mod lifecycle;
pub mod radio;
pub mod status;
pub mod temperature;

pub use advertising::{AdvertisementEncoder, LetterHistoryEncoder, NameServiceEncoder, Snapshot};
pub use battery::BatteryMonitor;
pub use beacon::{Beacon, UpdateTimer};
pub use config::BeaconConfig;
pub use flash::{FlashController, FlashEvent, FlashStore};
pub use history::{HistoryBuffer, TrendLog};
pub use lifecycle::AdvertisingLifecycle;
pub use radio::{RadioStack, StackError, StackEvent};
pub use status::{Blink, BlinkCode, StatusLeds, StatusReporter, SystemControl};
pub use temperature::{SensorError, TemperatureSource, TenthsF};
