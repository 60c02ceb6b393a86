//! The application context: everything one update cycle touches, built
//! once at boot and driven by the update timer and stack events.

use crate::advertising::{AdvertisementEncoder, Snapshot};
use crate::battery::{self, BatteryMonitor};
use crate::config::{BeaconConfig, TREND_LEN};
use crate::flash::{FlashController, FlashStore, LetterSelector};
use crate::history::TrendLog;
use crate::lifecycle::AdvertisingLifecycle;
use crate::radio::{RadioStack, StackEvent};
use crate::status::{StatusLeds, SystemControl};
use crate::temperature::{TemperatureSource, TenthsF};

use beacon_hal::AdcRead;

/// The periodic update timer.
pub trait UpdateTimer {
    /// (Re)start, firing every `interval_ms`.
    fn start(&mut self, interval_ms: u32);

    fn stop(&mut self);
}

impl<T: UpdateTimer> UpdateTimer for &mut T {
    fn start(&mut self, interval_ms: u32) {
        T::start(self, interval_ms)
    }

    fn stop(&mut self) {
        T::stop(self)
    }
}

pub struct Beacon<S, A, F, R, L, Y, E> {
    config: BeaconConfig,
    sensor: S,
    battery: BatteryMonitor<A>,
    store: FlashStore<F>,
    advertising: AdvertisingLifecycle<R, L, Y>,
    encoder: E,
    trend: TrendLog<TREND_LEN>,
    /// Successful readings, wrapping at 10000.
    counter: u16,
    /// Readings since the last trend entry.
    since_trend: u16,
    reading: TenthsF,
}

impl<S, A, F, R, L, Y, E> Beacon<S, A, F, R, L, Y, E>
where
    S: TemperatureSource,
    A: AdcRead,
    F: FlashController,
    R: RadioStack,
    L: StatusLeds,
    Y: SystemControl,
    E: AdvertisementEncoder,
{
    pub fn new(
        config: BeaconConfig,
        sensor: S,
        adc: A,
        flash: F,
        advertising: AdvertisingLifecycle<R, L, Y>,
        encoder: E,
    ) -> Self {
        Self {
            battery: BatteryMonitor::new(adc, config.battery_every),
            store: FlashStore::new(flash, config.name_slot),
            config,
            sensor,
            advertising,
            encoder,
            trend: TrendLog::new(),
            counter: 0,
            since_trend: 0,
            reading: TenthsF::FAILED,
        }
    }

    /// Boot: show we're alive, load the name, advertise the first reading
    /// and start the timer.
    pub fn init(&mut self, timer: &mut impl UpdateTimer) {
        info!("beacon init {:#x}", self.config.beacon_id);
        self.advertising.status_mut().alive();
        self.store.init(self.config.default_name);
        self.update();
        timer.start(self.config.update_interval_ms);
    }

    /// One cycle: read, fold into the trend, sample the battery when due,
    /// persist a pending name and readvertise.
    pub fn update(&mut self) {
        self.reading = match self.sensor.read() {
            Ok(reading) => {
                self.counter = (self.counter + 1) % 10_000;
                self.since_trend += 1;
                if self.since_trend >= self.config.trend_every {
                    self.since_trend = 0;
                    if let Some(average) = self.sensor.average() {
                        debug!("trend {}", average.0);
                        self.trend.push(average.0);
                    }
                }
                reading
            }
            Err(e) => {
                warn!("reading failed: {:?}", e);
                TenthsF::FAILED
            }
        };
        let millivolts = self.battery.update();

        let snapshot = Snapshot {
            reading: self.reading,
            millivolts,
            counter: self.counter,
            beacon_id: self.config.beacon_id,
            trend: self.trend.as_slice(),
            name: self.store.read_name(),
        };
        let encoder = &mut self.encoder;
        self.advertising.update_with(
            |buf| encoder.encode(&snapshot, buf),
            battery::is_ok(millivolts),
        );
    }

    pub fn handle_event(&mut self, event: StackEvent, timer: &mut impl UpdateTimer) {
        match event {
            StackEvent::Connected => {
                info!("connected");
                timer.stop();
                self.advertising.connected();
            }
            StackEvent::Disconnected => {
                info!("disconnected");
                self.advertising.disconnected();
                self.update();
                timer.start(self.config.update_interval_ms);
            }
            StackEvent::PhyUpdateRequest => self.advertising.phy_update_request(),
            StackEvent::DeviceNameWritten(name) => {
                info!("device name written: {}", name.as_str());
                self.store.update_name(&name);
            }
            StackEvent::Flash(event) => self.store.on_flash_event(event),
            StackEvent::Unknown(id) => self.advertising.unknown_event(id),
        }
    }

    /// Button press: `A` first, then the letter after the stored one.
    /// Persisted on the next update.
    pub fn next_letter(&mut self) -> char {
        let mut selector = LetterSelector::new(self.store.name());
        let mut buf = [0; 4];
        let letter = if self.store.name() == &*selector.letter().encode_utf8(&mut buf) {
            selector.advance()
        } else {
            selector.letter()
        };
        selector.apply(&mut self.store);
        letter
    }

    pub fn reading(&self) -> TenthsF {
        self.reading
    }

    pub fn counter(&self) -> u16 {
        self.counter
    }

    pub fn trend(&self) -> &[i16] {
        self.trend.as_slice()
    }

    pub fn config(&self) -> &BeaconConfig {
        &self.config
    }

    pub fn store(&self) -> &FlashStore<F> {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut FlashStore<F> {
        &mut self.store
    }

    pub fn advertising(&self) -> &AdvertisingLifecycle<R, L, Y> {
        &self.advertising
    }

    pub fn advertising_mut(&mut self) -> &mut AdvertisingLifecycle<R, L, Y> {
        &mut self.advertising
    }
}
