#![no_std]
#![no_main]

#[macro_use]
mod pinout;
mod board;
mod softdevice;

use beacon_core::config::HISTORY_LEN;
use beacon_core::lifecycle::AdvertisingLifecycle;
use beacon_core::{Beacon, BeaconConfig, FlashEvent, StackEvent, StatusReporter};
use beacon_hal::mmio::VolatileBlock;
use beacon_hal::saadc::{ChannelConfig, Input as AdcInput, SAADC_BASE};
use beacon_hal::{AdcChannel, Saadc};
use defmt::{info, warn};
use embassy_executor::Spawner;
use embassy_futures::select::{select, Either};
use embassy_nrf::gpio::{AnyPin, Input, Pin, Pull};
use embassy_nrf::interrupt::Priority;
use embassy_sync::blocking_mutex::raw::ThreadModeRawMutex;
use embassy_sync::mutex::Mutex;
use embassy_time::Timer;
use nrf_softdevice::ble::gatt_server;
use nrf_softdevice::{SocEvent, Softdevice};
use static_cell::StaticCell;
use {defmt_rtt as _, panic_probe as _};

use crate::board::{Leds, System, UpdateSignal, UPDATE_TIMER};
use crate::softdevice::{
    AdvertiseCommand, NameServer, SoftdeviceFlash, SoftdeviceRadio, ADVERTISE, STACK_EVENTS,
};

#[cfg(feature = "_nrf52810")]
const NAME_SLOT: u32 = beacon_core::config::NRF52810_NAME_SLOT;
#[cfg(feature = "_nrf52810")]
const TX_LEVELS: &[i8] = &beacon_core::radio::S112_TX_LEVELS;

#[cfg(feature = "_nrf52840")]
const NAME_SLOT: u32 = beacon_core::config::NRF52840_NAME_SLOT;
#[cfg(feature = "_nrf52840")]
const TX_LEVELS: &[i8] = &beacon_core::radio::S140_TX_LEVELS;

#[cfg(any(feature = "_tmp117", feature = "_si7051"))]
type Bus = beacon_hal::BusMaster<VolatileBlock, VolatileBlock>;

#[cfg(feature = "_tmp117")]
type Sensor = beacon_core::temperature::Tmp117Source<Bus, embassy_time::Delay, HISTORY_LEN>;
#[cfg(feature = "_si7051")]
type Sensor = beacon_core::temperature::Si7051Source<Bus, embassy_time::Delay, HISTORY_LEN>;
#[cfg(feature = "_die")]
type Sensor = beacon_core::temperature::InternalDie<softdevice::SoftdeviceDie, HISTORY_LEN>;

#[cfg(feature = "service-data")]
type Encoder = beacon_core::NameServiceEncoder;
#[cfg(not(feature = "service-data"))]
type Encoder = beacon_core::LetterHistoryEncoder;

type App = Beacon<
    Sensor,
    AdcChannel<VolatileBlock>,
    SoftdeviceFlash,
    SoftdeviceRadio,
    Leds,
    System,
    Encoder,
>;
type SharedApp = Mutex<ThreadModeRawMutex, App>;

static APP: StaticCell<SharedApp> = StaticCell::new();
static SERVER: NameServer = NameServer;

#[cfg(any(feature = "_tmp117", feature = "_si7051"))]
fn sensor(_sd: &Softdevice) -> Sensor {
    use beacon_hal::gpio::{Port, P0_BASE};
    use beacon_hal::twim::TWIM0_BASE;
    use beacon_hal::TwimPins;

    let pins = TwimPins {
        scl: pinout!(scl),
        sda: pinout!(sda),
        power: pinout!(sensor_power),
    };
    // SAFETY: TWIM0 and the P0 pins above are used by nothing else.
    let bus = unsafe {
        Bus::new(
            VolatileBlock::new(TWIM0_BASE),
            Port::new(VolatileBlock::new(P0_BASE)),
            pins,
        )
    };
    Sensor::new(bus, embassy_time::Delay, Default::default())
}

#[cfg(feature = "_die")]
fn sensor(sd: &Softdevice) -> Sensor {
    Sensor::new(softdevice::SoftdeviceDie::new(sd))
}

fn battery_adc() -> AdcChannel<VolatileBlock> {
    // SAFETY: the SAADC is used by nothing else.
    let saadc = Saadc::new(unsafe { VolatileBlock::new(SAADC_BASE) });
    saadc.channel(0, AdcInput::Vdd, ChannelConfig::battery())
}

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("boot");
    let mut config = embassy_nrf::config::Config::default();
    // Priorities 0, 1 and 4 belong to the SoftDevice.
    config.gpiote_interrupt_priority = Priority::P2;
    config.time_interrupt_priority = Priority::P2;
    let p = embassy_nrf::init(config);

    let leds = Leds::new(pinout!(p.led_red), pinout!(p.led_green), pinout!(led_on));
    let button = Input::new(pinout!(p.sw1).degrade(), Pull::Up);

    let sd: &'static Softdevice = Softdevice::enable(&softdevice::config());

    let beacon_config = BeaconConfig {
        name_slot: NAME_SLOT,
        ..Default::default()
    };
    let advertising = AdvertisingLifecycle::new(
        SoftdeviceRadio::new(),
        StatusReporter::new(leds, System),
        &beacon_config,
        TX_LEVELS,
    );
    let app: &'static SharedApp = APP.init(Mutex::new(Beacon::new(
        beacon_config,
        sensor(sd),
        battery_adc(),
        SoftdeviceFlash,
        advertising,
        Encoder::default(),
    )));

    spawner.must_spawn(softdevice_task(sd));
    spawner.must_spawn(advertiser_task(sd));
    spawner.must_spawn(update_task(app));
    spawner.must_spawn(event_task(app));
    spawner.must_spawn(button_task(app, button));

    let mut app = app.lock().await;
    app.init(&mut UpdateSignal);
    let result = softdevice::set_device_name(app.store().name());
    app.advertising_mut().status_mut().check(result, true);
    let result = softdevice::set_preferred_conn_params();
    app.advertising_mut().status_mut().check(result, true);
    info!("boot done");
}

#[embassy_executor::task]
async fn softdevice_task(sd: &'static Softdevice) -> ! {
    sd.run_with_callback(|event: SocEvent| match event {
        SocEvent::FlashOperationSuccess => softdevice::post(StackEvent::Flash(FlashEvent::Success)),
        SocEvent::FlashOperationError => softdevice::post(StackEvent::Flash(FlashEvent::Error)),
        _ => {}
    })
    .await
}

#[embassy_executor::task]
async fn advertiser_task(sd: &'static Softdevice) {
    let mut command = ADVERTISE.wait().await;
    loop {
        let AdvertiseCommand::Start(adv) = command else {
            command = ADVERTISE.wait().await;
            continue;
        };
        match select(softdevice::advertise(sd, &adv), ADVERTISE.wait()).await {
            Either::First(Ok(Some(conn))) => {
                softdevice::post(StackEvent::Connected);
                gatt_server::run(&conn, &SERVER, |()| {}).await;
                softdevice::post(StackEvent::Disconnected);
                command = ADVERTISE.wait().await;
            }
            Either::First(Ok(None)) => command = ADVERTISE.wait().await,
            Either::First(Err(e)) => {
                warn!("advertising ended: {:?}", e);
                command = ADVERTISE.wait().await;
            }
            Either::Second(next) => command = next,
        }
    }
}

#[embassy_executor::task]
async fn update_task(app: &'static SharedApp) {
    let mut interval = UPDATE_TIMER.wait().await;
    loop {
        let Some(ms) = interval else {
            interval = UPDATE_TIMER.wait().await;
            continue;
        };
        match select(Timer::after_millis(ms.into()), UPDATE_TIMER.wait()).await {
            Either::First(()) => app.lock().await.update(),
            Either::Second(next) => interval = next,
        }
    }
}

#[embassy_executor::task]
async fn event_task(app: &'static SharedApp) {
    loop {
        let event = STACK_EVENTS.receive().await;
        app.lock().await.handle_event(event, &mut UpdateSignal);
    }
}

#[embassy_executor::task]
async fn button_task(app: &'static SharedApp, mut button: Input<'static, AnyPin>) {
    loop {
        button.wait_for_low().await;
        let letter = app.lock().await.next_letter();
        info!("letter {}", letter);
        Timer::after_millis(50).await;
        button.wait_for_high().await;
    }
}
