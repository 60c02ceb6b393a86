//! The beacon's view of the SoftDevice: advertising requests go to the
//! advertiser task, flash and die temperature are raw `sd_*` calls, and
//! everything coming back is queued as a [`StackEvent`].

use beacon_core::advertising::PAYLOAD_LEN;
use beacon_core::flash::{DeviceName, NAME_CAPACITY, PAGE_SIZE, SLOT_LEN, SLOT_WORDS};
use beacon_core::radio::{AdvertisingKind, AdvertisingParams};
use beacon_core::temperature::DieThermometer;
use beacon_core::{FlashController, RadioStack, SensorError, StackError, StackEvent};
use defmt::{debug, warn};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_sync::signal::Signal;
use heapless::Vec;
use nrf_softdevice::ble::gatt_server::{self, WriteOp};
use nrf_softdevice::ble::peripheral::{self, AdvertiseError};
use nrf_softdevice::ble::{Connection, TxPower};
use nrf_softdevice::{raw, Softdevice};

pub static STACK_EVENTS: Channel<CriticalSectionRawMutex, StackEvent, 8> = Channel::new();

pub static ADVERTISE: Signal<CriticalSectionRawMutex, AdvertiseCommand> = Signal::new();

/// Queue an event for the event task. Dropped with a warning when full.
pub fn post(event: StackEvent) {
    if STACK_EVENTS.try_send(event).is_err() {
        warn!("stack event queue full, event dropped");
    }
}

fn check(ret: u32) -> Result<(), StackError> {
    match ret {
        raw::NRF_SUCCESS => Ok(()),
        code => Err(StackError(code)),
    }
}

pub fn config() -> nrf_softdevice::Config {
    const DEFAULT_NAME: &[u8] = b"NoName";
    nrf_softdevice::Config {
        clock: Some(raw::nrf_clock_lf_cfg_t {
            source: raw::NRF_CLOCK_LF_SRC_RC as u8,
            rc_ctiv: 16,
            rc_temp_ctiv: 2,
            accuracy: raw::NRF_CLOCK_LF_ACCURACY_500_PPM as u8,
        }),
        conn_gap: Some(raw::ble_gap_conn_cfg_t {
            conn_count: 1,
            event_length: 6,
        }),
        gap_role_count: Some(raw::ble_gap_cfg_role_count_t {
            adv_set_count: 1,
            periph_role_count: 1,
            #[cfg(feature = "_nrf52840")]
            central_role_count: 0,
            #[cfg(feature = "_nrf52840")]
            central_sec_count: 0,
            // S112 has no central role and no QoS channel survey.
            #[cfg(feature = "_nrf52840")]
            _bitfield_1: raw::ble_gap_cfg_role_count_t::new_bitfield_1(0),
        }),
        gap_device_name: Some(raw::ble_gap_cfg_device_name_t {
            p_value: DEFAULT_NAME.as_ptr() as _,
            current_len: DEFAULT_NAME.len() as u16,
            max_len: NAME_CAPACITY as u16,
            write_perm: open_security(),
            _bitfield_1: raw::ble_gap_cfg_device_name_t::new_bitfield_1(
                raw::BLE_GATTS_VLOC_STACK as u8,
            ),
        }),
        ..Default::default()
    }
}

/// Security mode 1 level 1, anyone may write.
fn open_security() -> raw::ble_gap_conn_sec_mode_t {
    raw::ble_gap_conn_sec_mode_t {
        _bitfield_1: raw::ble_gap_conn_sec_mode_t::new_bitfield_1(1, 1),
    }
}

/// What a connecting phone sees in the GAP Device Name characteristic.
pub fn set_device_name(name: &str) -> Result<(), StackError> {
    let mode = open_security();
    // SAFETY: the stack copies the name before returning.
    check(unsafe { raw::sd_ble_gap_device_name_set(&mode, name.as_ptr(), name.len() as u16) })
}

fn device_name() -> Option<DeviceName> {
    let mut buf = [0u8; NAME_CAPACITY];
    let mut len = buf.len() as u16;
    // SAFETY: `len` holds the buffer size on entry.
    let ret = unsafe { raw::sd_ble_gap_device_name_get(buf.as_mut_ptr(), &mut len) };
    if let Err(e) = check(ret) {
        warn!("device name get failed: {}", e.0);
        return None;
    }
    let name = core::str::from_utf8(&buf[..len as usize]).ok()?;
    DeviceName::try_from(name).ok()
}

/// 100 to 200 ms interval, no latency, 4 s supervision timeout.
pub fn set_preferred_conn_params() -> Result<(), StackError> {
    let params = raw::ble_gap_conn_params_t {
        min_conn_interval: 80,
        max_conn_interval: 160,
        slave_latency: 0,
        conn_sup_timeout: 400,
    };
    // SAFETY: copied by the stack.
    check(unsafe { raw::sd_ble_gap_ppcp_set(&params) })
}

#[derive(Clone, Debug)]
pub struct Advertisement {
    payload: Vec<u8, PAYLOAD_LEN>,
    params: AdvertisingParams,
    dbm: i8,
}

pub enum AdvertiseCommand {
    Start(Advertisement),
    Stop,
}

/// Requests are picked up by the advertiser task the next time the executor
/// gets to it. A stop followed by a start before then is just the start.
pub struct SoftdeviceRadio {
    next: Advertisement,
    active: bool,
}

impl SoftdeviceRadio {
    pub fn new() -> Self {
        Self {
            next: Advertisement {
                payload: Vec::new(),
                params: AdvertisingParams {
                    kind: AdvertisingKind::NonConnectableNonScannableUndirected,
                    interval: 4800,
                },
                dbm: 0,
            },
            active: false,
        }
    }
}

impl RadioStack for SoftdeviceRadio {
    fn configure(&mut self, payload: &[u8], params: &AdvertisingParams) -> Result<(), StackError> {
        self.next.payload.clear();
        self.next
            .payload
            .extend_from_slice(payload)
            .map_err(|()| StackError(raw::NRF_ERROR_DATA_SIZE))?;
        self.next.params = *params;
        Ok(())
    }

    fn start(&mut self) -> Result<(), StackError> {
        self.active = true;
        ADVERTISE.signal(AdvertiseCommand::Start(self.next.clone()));
        Ok(())
    }

    fn stop(&mut self) -> Result<(), StackError> {
        self.active = false;
        ADVERTISE.signal(AdvertiseCommand::Stop);
        Ok(())
    }

    fn set_tx_power(&mut self, dbm: i8) -> Result<(), StackError> {
        self.next.dbm = dbm;
        if self.active {
            ADVERTISE.signal(AdvertiseCommand::Start(self.next.clone()));
        }
        Ok(())
    }

    // nrf-softdevice answers PHY requests itself.
    fn reply_phy_auto(&mut self) -> Result<(), StackError> {
        Ok(())
    }

    // No connection parameter negotiation is running to stop.
    fn stop_conn_params(&mut self) -> Result<(), StackError> {
        Ok(())
    }
}

fn tx_power(dbm: i8) -> TxPower {
    match dbm {
        i8::MIN..=-40 => TxPower::Minus40dBm,
        -39..=-20 => TxPower::Minus20dBm,
        -19..=-16 => TxPower::Minus16dBm,
        -15..=-12 => TxPower::Minus12dBm,
        -11..=-8 => TxPower::Minus8dBm,
        -7..=-4 => TxPower::Minus4dBm,
        -3..=0 => TxPower::ZerodBm,
        #[cfg(feature = "_nrf52840")]
        1..=2 => TxPower::Plus2dBm,
        #[cfg(feature = "_nrf52840")]
        3 => TxPower::Plus3dBm,
        #[cfg(not(feature = "_nrf52840"))]
        1..=3 => TxPower::Plus3dBm,
        #[cfg(feature = "_nrf52840")]
        4 => TxPower::Plus4dBm,
        #[cfg(feature = "_nrf52840")]
        5 => TxPower::Plus5dBm,
        #[cfg(feature = "_nrf52840")]
        6 => TxPower::Plus6dBm,
        #[cfg(feature = "_nrf52840")]
        7 => TxPower::Plus7dBm,
        #[cfg(feature = "_nrf52840")]
        8..=i8::MAX => TxPower::Plus8dBm,
        #[cfg(not(feature = "_nrf52840"))]
        4..=i8::MAX => TxPower::Plus4dBm,
    }
}

/// Advertise until a central connects (`Some`) or the stack gives up.
pub async fn advertise(
    sd: &Softdevice,
    adv: &Advertisement,
) -> Result<Option<Connection>, AdvertiseError> {
    let config = peripheral::Config {
        interval: adv.params.interval,
        tx_power: tx_power(adv.dbm),
        ..Default::default()
    };
    debug!("advertising {} bytes, {:?}", adv.payload.len(), adv.params.kind);
    match adv.params.kind {
        AdvertisingKind::ConnectableScannableUndirected => {
            let adv = peripheral::ConnectableAdvertisement::ScannableUndirected {
                adv_data: &adv.payload,
                scan_data: &[],
            };
            peripheral::advertise_connectable(sd, adv, &config)
                .await
                .map(Some)
        }
        AdvertisingKind::NonConnectableNonScannableUndirected => {
            let adv = peripheral::NonconnectableAdvertisement::NonscannableUndirected {
                adv_data: &adv.payload,
            };
            peripheral::advertise(sd, adv, &config).await.map(|()| None)
        }
    }
}

/// No services of its own. Writes on the link can only be the GAP Device
/// Name, which the stack has already stored.
pub struct NameServer;

impl gatt_server::Server for NameServer {
    type Event = ();

    fn on_write(
        &self,
        _conn: &Connection,
        handle: u16,
        _op: WriteOp,
        _offset: usize,
        _data: &[u8],
    ) -> Option<()> {
        debug!("write to handle {}", handle);
        if let Some(name) = device_name() {
            post(StackEvent::DeviceNameWritten(name));
        }
        None
    }
}

/// The name page through `sd_flash_*`. Completion arrives as a SoC event.
pub struct SoftdeviceFlash;

impl FlashController for SoftdeviceFlash {
    type Error = StackError;

    fn read(&self, address: u32, buf: &mut [u8; SLOT_LEN]) {
        // SAFETY: `address` is inside the on-chip flash, which is mapped
        // for reading.
        *buf = unsafe { core::ptr::read_volatile(address as *const [u8; SLOT_LEN]) };
    }

    fn request_erase(&mut self, page_address: u32) -> Result<(), StackError> {
        check(unsafe { raw::sd_flash_page_erase(page_address / PAGE_SIZE) })
    }

    fn request_write(&mut self, address: u32, words: &[u32; SLOT_WORDS]) -> Result<(), StackError> {
        // SAFETY: `words` is the store's staging buffer, which lives in the
        // static application context and is left alone until completion.
        check(unsafe {
            raw::sd_flash_write(address as *mut u32, words.as_ptr(), SLOT_WORDS as u32)
        })
    }
}

/// The die sensor belongs to the stack while it's enabled.
pub struct SoftdeviceDie;

impl SoftdeviceDie {
    pub fn new(_sd: &Softdevice) -> Self {
        Self
    }
}

impl DieThermometer for SoftdeviceDie {
    fn quarter_celsius(&mut self) -> Result<i32, SensorError> {
        let mut quarters = 0i32;
        check(unsafe { raw::sd_temp_get(&mut quarters) }).map_err(|_| SensorError::Bus)?;
        Ok(quarters)
    }
}
