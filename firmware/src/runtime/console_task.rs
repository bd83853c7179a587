use embassy_futures::select::{Either, select};
use embassy_stm32 as hal;
use embassy_stm32::Peri;
use embassy_stm32::usart::{BufferedUart, Config as UartConfig, DataBits, Parity, StopBits};
use embedded_io_async::{Read, Write};
use static_cell::StaticCell;

use ecu_core::console::{ConsoleError, LineAssembler};

use super::{LINE_QUEUE, REPLY_QUEUE};

const CONSOLE_BAUD: u32 = 115_200;
const UART_BUFFER_SIZE: usize = 256;

static TX_BUFFER: StaticCell<[u8; UART_BUFFER_SIZE]> = StaticCell::new();
static RX_BUFFER: StaticCell<[u8; UART_BUFFER_SIZE]> = StaticCell::new();

embassy_stm32::bind_interrupts!(struct UartIrqs {
    USART2_LPUART2 => embassy_stm32::usart::BufferedInterruptHandler<hal::peripherals::USART2>;
});

/// Feeds operator input to the control task and writes rendered replies and
/// telemetry back out the same UART.
#[embassy_executor::task]
pub async fn run(
    usart: Peri<'static, hal::peripherals::USART2>,
    tx_pin: Peri<'static, hal::peripherals::PA2>,
    rx_pin: Peri<'static, hal::peripherals::PA3>,
) -> ! {
    let mut config = UartConfig::default();
    config.baudrate = CONSOLE_BAUD;
    config.data_bits = DataBits::DataBits8;
    config.stop_bits = StopBits::STOP1;
    config.parity = Parity::ParityNone;

    let uart = BufferedUart::new(
        usart,
        rx_pin,
        tx_pin,
        TX_BUFFER.init([0; UART_BUFFER_SIZE]),
        RX_BUFFER.init([0; UART_BUFFER_SIZE]),
        UartIrqs,
        config,
    )
    .expect("failed to initialize console UART");

    let (mut uart_tx, mut uart_rx) = uart.split();
    let mut assembler = LineAssembler::new();
    let mut ingress = [0u8; 32];

    loop {
        match select(uart_rx.read(&mut ingress), REPLY_QUEUE.receive()).await {
            Either::First(Ok(count)) => {
                for byte in &ingress[..count] {
                    match assembler.ingest(*byte) {
                        Ok(Some(line)) => {
                            // Queue full means the control loop is behind;
                            // dropping the line beats blocking the UART.
                            let _ = LINE_QUEUE.try_send(line);
                        }
                        Ok(None) => {}
                        Err(ConsoleError::LineOverflow) => {
                            defmt::warn!("console: line overflow, input dropped");
                        }
                        Err(ConsoleError::InvalidUtf8) => {
                            defmt::warn!("console: non-utf8 input dropped");
                        }
                    }
                }
            }
            Either::First(Err(_)) => {
                defmt::warn!("console: uart read error");
            }
            Either::Second(reply) => {
                if uart_tx.write_all(reply.as_bytes()).await.is_ok() {
                    let _ = uart_tx.write_all(b"\r\n").await;
                }
            }
        }
    }
}
