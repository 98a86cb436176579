//! Board wiring and compile-time constants.
//!
//! | Function              | GPIO       | Notes                              |
//! |-----------------------|------------|------------------------------------|
//! | UART0 TX / RX         | 16 / 17    | link towards the host (upstream)   |
//! | UART1 TX / RX         | 4 / 5      | link to the next board (downstream)|
//! | I2C0 SDA / SCL        | 8 / 9      | ADC bank 0 + EEPROM                |
//! | I2C1 SDA / SCL        | 6 / 7      | ADC bank 1                         |
//! | 74HC595 LATCH/CLK/DATA| 10 / 11 / 12 | button LEDs                      |
//! | 74HC165 PL/CLK/DATA   | 13 / 14 / 15 | buttons                          |
//! | Indicator LEDs        | 2, 3, 22, 26 | active high                      |
//! | Board id jumpers      | 21, 20, 19, 18 | bit 0..3, active low           |
//!
//! Pin numbers are documentation only: `embassy_rp` peripherals are typed,
//! so the actual selection happens in `main`.

/// Baud rate of both ring UARTs.
pub const RING_BAUD_RATE: u32 = 380_400;

/// I2C clock for both buses.
pub const I2C_FREQUENCY: u32 = 400_000;

/// 7-bit address of both ADS1015 converters.
pub const ADC_ADDRESS: u8 = 0x48;

/// 7-bit address of the 24LC32 configuration EEPROM.
pub const EEPROM_ADDRESS: u8 = 0x50;

/// Depth of the outbound control event queue.
pub const EVENT_QUEUE_DEPTH: usize = 300;

/// Depth of the remote command queue feeding the control task.
pub const COMMAND_QUEUE_DEPTH: usize = 4;

/// Button and knob polling period.
pub const SAMPLE_PERIOD_MS: u64 = 1;

/// Stack size of the core 1 executor.
pub const CORE1_STACK_SIZE: usize = 8192;

/// Whether the EEPROM is reformatted at boot.
pub const FORCE_CONFIG_INIT: bool = cfg!(feature = "force-config-init");
