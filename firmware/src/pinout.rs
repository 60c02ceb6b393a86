// TWIM and sensor power pins are raw P0 numbers, the bus driver owns them
// through the port registers. LEDs and the button go through embassy-nrf.

#[cfg(any(feature = "bl651-tmp117", feature = "bl651-si7051"))]
macro_rules! pinout {
    ($p:ident . led_red) => ($p.P0_07);
    ($p:ident . led_green) => ($p.P0_08);
    ($p:ident . sw1) => ($p.P0_27); // active low
    (led_on) => (embassy_nrf::gpio::Level::High);
    (sda) => (13);
    (scl) => (15);
    (sensor_power) => (Some(17));
}

#[cfg(feature = "pca10059")]
macro_rules! pinout {
    ($p:ident . led_red) => ($p.P0_08); // LED2 red
    ($p:ident . led_green) => ($p.P1_09); // LED2 green
    ($p:ident . sw1) => ($p.P1_06); // active low
    (led_on) => (embassy_nrf::gpio::Level::Low);
    // Header pins, nothing is fitted on the dongle.
    (sda) => (26);
    (scl) => (27);
    (sensor_power) => (None);
}
