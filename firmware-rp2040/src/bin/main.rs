#![no_std]
#![no_main]

use core::cell::RefCell;

use defmt::{error, info, warn};
use defmt_rtt as _;
use embassy_embedded_hal::shared_bus::blocking::i2c::I2cDevice;
use embassy_executor::Executor;
use embassy_futures::select::{select, Either};
use embassy_rp::bind_interrupts;
use embassy_rp::gpio::{Input, Level, Output, Pull};
use embassy_rp::i2c::{self, Blocking, I2c};
use embassy_rp::multicore::{spawn_core1, Stack};
use embassy_rp::peripherals::{UART0, UART1, USB};
use embassy_rp::uart::{self, Async, Config as UartConfig, Uart, UartRx, UartTx};
use embassy_rp::usb::Driver;
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embassy_sync::blocking_mutex::Mutex as BlockingMutex;
use embassy_sync::mutex::Mutex;
use embassy_time::{Delay, Duration, Instant, Ticker};
use embassy_usb::class::cdc_acm::State;
use embassy_usb::{Builder, Config as UsbConfig};
use portable_atomic::{AtomicU32, Ordering};
use rainpots_core::types::BANK_START_INDEX;
use rainpots_core::{CalibrationStore, Controller, PotBank};
use rainpots_proto::{Addressing, AssemblerEvent, CommandAssembler, DataFormatter, PacketCollector};
use rainpots_rp2040::board::{
    ADC_ADDRESS, CORE1_STACK_SIZE, EEPROM_ADDRESS, FORCE_CONFIG_INIT, I2C_FREQUENCY,
    RING_BAUD_RATE, SAMPLE_PERIOD_MS,
};
use rainpots_rp2040::startup::{play_startup_sequence, read_board_index};
use rainpots_rp2040::{
    configure_usb_cdc, Ads1015, BoardLeds, ButtonShiftIn, CommandSource, Eeprom24lc32, KnobAdc,
    LedShiftOut, RemoteCommand, SharedI2c0, SharedI2c0Bus, UsbCommandLink, COMMANDS, EVENTS,
    USB_COMMAND_DONE,
};
use static_cell::StaticCell;

#[cfg(feature = "dev-panic")]
use panic_probe as _;
#[cfg(feature = "prod-panic")]
use panic_reset as _;

bind_interrupts!(struct Irqs {
    UART0_IRQ => uart::InterruptHandler<UART0>;
    UART1_IRQ => uart::InterruptHandler<UART1>;
    USBCTRL_IRQ => embassy_rp::usb::InterruptHandler<USB>;
});

type BoardController = Controller<Eeprom24lc32<SharedI2c0>, KnobAdc, BoardLeds<'static>, Delay>;

/// Upstream UART TX, shared by the two relay tasks on core 1.
type UpstreamTx = Mutex<NoopRawMutex, UartTx<'static, Async>>;

static mut CORE1_STACK: Stack<CORE1_STACK_SIZE> = Stack::new();
static EXECUTOR0: StaticCell<Executor> = StaticCell::new();
static EXECUTOR1: StaticCell<Executor> = StaticCell::new();

/// USB device configuration buffer.
static CONFIG_DESCRIPTOR: StaticCell<[u8; 256]> = StaticCell::new();
static BOS_DESCRIPTOR: StaticCell<[u8; 256]> = StaticCell::new();
static MSOS_DESCRIPTOR: StaticCell<[u8; 256]> = StaticCell::new();
static CONTROL_BUF: StaticCell<[u8; 64]> = StaticCell::new();

/// CDC-ACM state.
static CDC_STATE: StaticCell<State> = StaticCell::new();

static I2C0_BUS: StaticCell<SharedI2c0Bus> = StaticCell::new();
static UPSTREAM_TX: StaticCell<UpstreamTx> = StaticCell::new();

/// UART receive errors on either ring link since boot.
static UART_ERRORS: AtomicU32 = AtomicU32::new(0);

fn log_uart_error(link: &str, e: uart::Error) {
    let total = UART_ERRORS.fetch_add(1, Ordering::Relaxed) + 1;
    warn!("{} uart error: {:?} ({} total)", link, e, total);
}

#[cortex_m_rt::entry]
fn main() -> ! {
    info!("RainPots starting...");

    let p = embassy_rp::init(embassy_rp::config::Config::default());

    // --- Board index ---
    let jumpers = [
        Input::new(p.PIN_21, Pull::Up),
        Input::new(p.PIN_20, Pull::Up),
        Input::new(p.PIN_19, Pull::Up),
        Input::new(p.PIN_18, Pull::Up),
    ];
    let board = read_board_index(&jumpers);
    info!("board index {}", board);

    // --- I2C Setup ---
    let mut i2c_config = i2c::Config::default();
    i2c_config.frequency = I2C_FREQUENCY;

    let i2c0 = I2c::new_blocking(p.I2C0, p.PIN_9, p.PIN_8, i2c_config.clone());
    let i2c0_bus: &'static SharedI2c0Bus = I2C0_BUS.init(BlockingMutex::new(RefCell::new(i2c0)));
    let i2c1: I2c<'static, _, Blocking> = I2c::new_blocking(p.I2C1, p.PIN_7, p.PIN_6, i2c_config);

    let eeprom = Eeprom24lc32::new(I2cDevice::new(i2c0_bus), EEPROM_ADDRESS);
    let bank0 = KnobAdc::Bank0(Ads1015::new(I2cDevice::new(i2c0_bus), ADC_ADDRESS));
    let bank1 = KnobAdc::Bank1(Ads1015::new(i2c1, ADC_ADDRESS));

    // --- Shift registers and LEDs ---
    let buttons = ButtonShiftIn::new(
        Output::new(p.PIN_13, Level::High), // PL
        Output::new(p.PIN_14, Level::Low),  // CLK
        Input::new(p.PIN_15, Pull::None),   // DATA
    );
    let button_leds = LedShiftOut::new(
        Output::new(p.PIN_10, Level::Low), // LATCH
        Output::new(p.PIN_11, Level::Low), // CLK
        Output::new(p.PIN_12, Level::Low), // DATA
    );
    let indicators = [
        Output::new(p.PIN_2, Level::Low),
        Output::new(p.PIN_3, Level::Low),
        Output::new(p.PIN_22, Level::Low),
        Output::new(p.PIN_26, Level::Low),
    ];
    let leds = BoardLeds::new(button_leds, indicators);

    // --- UART Setup ---
    let mut uart_config = UartConfig::default();
    uart_config.baudrate = RING_BAUD_RATE;

    let upstream = Uart::new(
        p.UART0,
        p.PIN_16, // TX
        p.PIN_17, // RX
        Irqs,
        p.DMA_CH0,
        p.DMA_CH1,
        uart_config,
    );
    let (upstream_tx, upstream_rx) = upstream.split();

    let downstream = Uart::new(
        p.UART1,
        p.PIN_4, // TX
        p.PIN_5, // RX
        Irqs,
        p.DMA_CH2,
        p.DMA_CH3,
        uart_config,
    );
    let (downstream_tx, downstream_rx) = downstream.split();

    // --- USB Setup ---
    let usb_driver = Driver::new(p.USB, Irqs);

    let mut usb_config = UsbConfig::new(0x1209, 0x0001); // pid.codes test VID/PID
    usb_config.manufacturer = Some("RainPots");
    usb_config.product = Some("RainPots Controller");
    usb_config.serial_number = Some("001");
    usb_config.max_power = 100;
    usb_config.max_packet_size_0 = 64;

    let config_descriptor = CONFIG_DESCRIPTOR.init([0; 256]);
    let bos_descriptor = BOS_DESCRIPTOR.init([0; 256]);
    let msos_descriptor = MSOS_DESCRIPTOR.init([0; 256]);
    let control_buf = CONTROL_BUF.init([0; 64]);

    let mut builder = Builder::new(
        usb_driver,
        usb_config,
        config_descriptor,
        bos_descriptor,
        msos_descriptor,
        control_buf,
    );

    let cdc_state = CDC_STATE.init(State::new());
    let usb_link = UsbCommandLink::new(configure_usb_cdc(&mut builder, cdc_state));
    let usb_device = builder.build();

    // --- Core 1: relay towards the host ---
    spawn_core1(
        p.CORE1,
        unsafe { &mut *core::ptr::addr_of_mut!(CORE1_STACK) },
        move || {
            let upstream_tx: &'static UpstreamTx = UPSTREAM_TX.init(Mutex::new(upstream_tx));
            let executor1 = EXECUTOR1.init(Executor::new());
            executor1.run(|spawner| {
                spawner.spawn(event_relay_task(DataFormatter::new(board), upstream_tx).unwrap());
                spawner.spawn(downstream_relay_task(downstream_rx, upstream_tx).unwrap());
            });
        },
    );

    // --- Core 0: control, USB, upstream commands ---
    let executor0 = EXECUTOR0.init(Executor::new());
    executor0.run(|spawner| {
        spawner.spawn(usb_task(usb_device).unwrap());
        spawner.spawn(usb_command_task(usb_link).unwrap());
        spawner.spawn(upstream_reader_task(board, upstream_rx, downstream_tx).unwrap());
        spawner.spawn(control_task(eeprom, [bank0, bank1], leds, buttons, board).unwrap());
    });
}

/// USB device task - runs the USB stack.
#[embassy_executor::task]
async fn usb_task(mut device: embassy_usb::UsbDevice<'static, Driver<'static, USB>>) {
    device.run().await;
}

/// USB command task - frames commands from the host tool and acknowledges
/// each one after the control task has executed it.
#[embassy_executor::task]
async fn usb_command_task(mut link: UsbCommandLink<'static>) {
    loop {
        link.wait_connected().await;
        info!("USB command link connected");

        loop {
            let frame = match link.next_command().await {
                Ok(frame) => frame,
                Err(e) => {
                    warn!("USB link error: {:?}", e);
                    break;
                }
            };

            USB_COMMAND_DONE.reset();
            COMMANDS
                .send(RemoteCommand {
                    source: CommandSource::Usb,
                    frame,
                })
                .await;
            USB_COMMAND_DONE.wait().await;

            if let Err(e) = link.acknowledge().await {
                warn!("USB link error: {:?}", e);
                break;
            }
        }
    }
}

/// Upstream reader - passes every byte from the host side down the ring
/// and queues the commands addressed to this board.
#[embassy_executor::task]
async fn upstream_reader_task(
    board: u8,
    mut rx: UartRx<'static, Async>,
    mut downstream: UartTx<'static, Async>,
) {
    let mut assembler = CommandAssembler::new(Addressing::Board(board));
    let mut byte = [0u8; 1];

    loop {
        if let Err(e) = rx.read(&mut byte).await {
            log_uart_error("upstream", e);
            assembler.reset();
            continue;
        }

        if let Err(e) = downstream.write(&byte).await {
            error!("downstream forward failed: {:?}", e);
        }

        if let AssemblerEvent::Complete(frame) = assembler.push_byte(byte[0]) {
            COMMANDS
                .send(RemoteCommand {
                    source: CommandSource::Ring,
                    frame,
                })
                .await;
        }
    }
}

/// Control task - owns the controller and drives it from the sample ticker
/// and the command queue.
#[embassy_executor::task]
async fn control_task(
    eeprom: Eeprom24lc32<SharedI2c0>,
    adcs: [KnobAdc; 2],
    mut leds: BoardLeds<'static>,
    mut buttons: ButtonShiftIn<'static>,
    board: u8,
) {
    play_startup_sequence(&mut leds, board).await;

    let mut store = CalibrationStore::new(eeprom);
    match store.prepare(FORCE_CONFIG_INIT) {
        Ok(true) => info!("configuration storage formatted"),
        Ok(false) => {}
        Err(e) => error!("configuration storage unavailable: {:?}", e),
    }

    let [adc0, adc1] = adcs;
    let banks = [
        PotBank::new(adc0, BANK_START_INDEX[0]),
        PotBank::new(adc1, BANK_START_INDEX[1]),
    ];
    let mut controller: BoardController = Controller::new(store, banks, leds, Delay);
    controller.init();
    info!("RainPots initialized, board {}", board);

    let mut ticker = Ticker::every(Duration::from_millis(SAMPLE_PERIOD_MS));
    loop {
        match select(ticker.next(), COMMANDS.receive()).await {
            Either::First(()) => {
                let now = Instant::now().as_millis();
                controller.sample_buttons(buttons.read(), now);
                controller.poll_long_press(now);
                controller.poll_knobs();
            }
            Either::Second(command) => {
                controller.execute_remote_command(&command.frame);
                if command.source == CommandSource::Usb {
                    USB_COMMAND_DONE.signal(());
                }
            }
        }

        // Blocks sampling while the relay queue is full.
        while let Some(event) = controller.pop_event() {
            EVENTS.send(event).await;
        }
    }
}

/// Event relay - formats queued control events and sends them upstream.
#[embassy_executor::task]
async fn event_relay_task(formatter: DataFormatter, upstream: &'static UpstreamTx) {
    loop {
        let event = EVENTS.receive().await;
        let packet = formatter.format(event.index, event.value);
        if let Err(e) = upstream.lock().await.write(&packet).await {
            error!("upstream write failed: {:?}", e);
        }
    }
}

/// Downstream relay - forwards complete packets from the next board
/// upstream unchanged.
#[embassy_executor::task]
async fn downstream_relay_task(mut rx: UartRx<'static, Async>, upstream: &'static UpstreamTx) {
    let mut collector = PacketCollector::new();
    let mut byte = [0u8; 1];

    loop {
        if let Err(e) = rx.read(&mut byte).await {
            log_uart_error("downstream", e);
            continue;
        }

        if let Some(packet) = collector.push_byte(byte[0]) {
            if let Err(e) = upstream.lock().await.write(&packet).await {
                error!("upstream write failed: {:?}", e);
            }
        }
    }
}
