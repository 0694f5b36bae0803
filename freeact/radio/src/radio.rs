//! Transceiver interface consumed by the RA-02 active object

use core::fmt;

/// A half-duplex LoRa transceiver.
///
/// Completion of a transmission and arrival of a frame are signalled by
/// the transceiver's DIO0 interrupt, which the board code turns into
/// `TxDone` and `RxReady` events for the active object.
pub trait LoRaRadio: Send + 'static {
    type Error: fmt::Debug;

    /// Reset and configure the transceiver
    fn startup(&mut self) -> Result<(), Self::Error>;

    /// Enter continuous receive mode
    fn start_receiving(&mut self) -> Result<(), Self::Error>;

    /// Copy a received frame into `buf` and return its length.
    ///
    /// `WouldBlock` when no complete frame is waiting.
    fn receive(&mut self, buf: &mut [u8]) -> nb::Result<usize, Self::Error>;

    /// Begin sending `frame`.
    ///
    /// `WouldBlock` when the transceiver is still busy with an earlier
    /// transmission.
    fn transmit(&mut self, frame: &[u8]) -> nb::Result<(), Self::Error>;
}

/// Consumer of packets received by the radio
pub trait PacketSink: Send + 'static {
    fn deliver(&mut self, packet: crate::Packet);
}
